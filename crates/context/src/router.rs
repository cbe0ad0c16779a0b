//! Channel-keyed dispatch for pub/sub deliveries.
//!
//! The base context routes every subscription delivery by looking the
//! channel up in this table. Handlers come in a synchronous and an
//! asynchronous flavour; the dispatcher awaits only the async kind.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use futures::future::BoxFuture;
use tracing::warn;

use shunt_fabric::paths::{decode_path, encode_path};
use shunt_fabric::FabricError;

pub type HandlerError = Box<dyn std::error::Error + Send + Sync>;
pub type SyncHandlerFn = dyn Fn(&[u8]) -> Result<(), HandlerError> + Send + Sync;
pub type AsyncHandlerFn =
    dyn Fn(Vec<u8>) -> BoxFuture<'static, Result<(), HandlerError>> + Send + Sync;

/// A subscription handler: blocking or suspending.
#[derive(Clone)]
pub enum SubscribeHandler {
    Sync(Arc<SyncHandlerFn>),
    Async(Arc<AsyncHandlerFn>),
}

impl SubscribeHandler {
    pub fn sync<F>(handler: F) -> Self
    where
        F: Fn(&[u8]) -> Result<(), HandlerError> + Send + Sync + 'static,
    {
        Self::Sync(Arc::new(handler))
    }

    pub fn asynchronous<F, Fut>(handler: F) -> Self
    where
        F: Fn(Vec<u8>) -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<Output = Result<(), HandlerError>> + Send + 'static,
    {
        Self::Async(Arc::new(move |data| Box::pin(handler(data))))
    }
}

/// Maps encoded channel keys to their handlers.
#[derive(Default)]
pub struct SubscribeRouter {
    handlers: Mutex<HashMap<Vec<u8>, SubscribeHandler>>,
}

impl SubscribeRouter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, path: &str, handler: SubscribeHandler) -> Result<(), FabricError> {
        let key = encode_path(path)?;
        self.handlers
            .lock()
            .expect("router lock poisoned")
            .insert(key, handler);
        Ok(())
    }

    /// Channels this router wants subscribed.
    pub fn channels(&self) -> Vec<String> {
        self.handlers
            .lock()
            .expect("router lock poisoned")
            .keys()
            .map(|key| decode_path(key))
            .collect()
    }

    /// Dispatch one delivery. Unknown channels log a warning.
    pub async fn dispatch(&self, channel: &[u8], data: Vec<u8>) -> Result<(), HandlerError> {
        let handler = {
            let handlers = self.handlers.lock().expect("router lock poisoned");
            handlers.get(channel).cloned()
        };
        match handler {
            Some(SubscribeHandler::Sync(f)) => f(&data),
            Some(SubscribeHandler::Async(f)) => f(data).await,
            None => {
                warn!(channel = %decode_path(channel), "no handler for subscription channel");
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    #[tokio::test]
    async fn dispatches_sync_and_async_handlers() {
        let router = SubscribeRouter::new();
        let sync_hits = Arc::new(AtomicUsize::new(0));
        let async_hits = Arc::new(AtomicUsize::new(0));

        let hits = sync_hits.clone();
        router
            .insert(
                "/osom/api/broadcast",
                SubscribeHandler::sync(move |_data| {
                    hits.fetch_add(1, Ordering::SeqCst);
                    Ok(())
                }),
            )
            .unwrap();

        let hits = async_hits.clone();
        router
            .insert(
                "/osom/api/register/worker",
                SubscribeHandler::asynchronous(move |_data| {
                    let hits = hits.clone();
                    async move {
                        hits.fetch_add(1, Ordering::SeqCst);
                        Ok(())
                    }
                }),
            )
            .unwrap();

        router
            .dispatch(b"/osom/api/broadcast", vec![1])
            .await
            .unwrap();
        router
            .dispatch(b"/osom/api/register/worker", vec![2])
            .await
            .unwrap();

        assert_eq!(sync_hits.load(Ordering::SeqCst), 1);
        assert_eq!(async_hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn unknown_channel_is_not_an_error() {
        let router = SubscribeRouter::new();
        assert!(router.dispatch(b"/osom/api/unknown", vec![]).await.is_ok());
    }

    #[test]
    fn channels_reflect_registrations() {
        let router = SubscribeRouter::new();
        router
            .insert("/osom/api/broadcast", SubscribeHandler::sync(|_| Ok(())))
            .unwrap();
        assert_eq!(router.channels(), vec!["/osom/api/broadcast".to_string()]);
    }
}
