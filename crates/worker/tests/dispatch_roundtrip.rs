//! End-to-end dispatch over an in-memory fabric: a worker node hosting
//! the default module and an endpoint runtime exchanging real encoded
//! packets, no broker process required.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{Mutex, Notify};

use shunt_core::DispatchConfig;
use shunt_endpoint::EndpointRuntime;
use shunt_fabric::client::FabricClient;
use shunt_fabric::msg::{MsgProvider, MsgRequest};
use shunt_fabric::paths::{REGISTER_WORKER_PATH, UNREGISTER_WORKER_PATH};
use shunt_fabric::FabricError;
use shunt_worker::{ModuleContext, ModuleRegistry, WorkerRuntime};

/// Queue-backed fabric: left-push/blocking-right-pop FIFO semantics and
/// a recorded publish stream the test replays into the endpoint.
#[derive(Default)]
struct MemoryFabric {
    queues: Mutex<HashMap<String, VecDeque<Vec<u8>>>>,
    notify: Notify,
    published: Mutex<Vec<(String, Vec<u8>)>>,
}

impl MemoryFabric {
    async fn take_published(&self, key: &str) -> Vec<Vec<u8>> {
        let mut published = self.published.lock().await;
        let mut taken = Vec::new();
        published.retain(|(k, data)| {
            if k == key {
                taken.push(data.clone());
                false
            } else {
                true
            }
        });
        taken
    }
}

#[async_trait]
impl FabricClient for MemoryFabric {
    async fn publish(&self, key: &str, data: &[u8]) -> Result<(), FabricError> {
        self.published
            .lock()
            .await
            .push((key.to_string(), data.to_vec()));
        Ok(())
    }

    async fn lpush_bytes(
        &self,
        key: &str,
        data: &[u8],
        _expire: Option<u64>,
    ) -> Result<(), FabricError> {
        self.queues
            .lock()
            .await
            .entry(key.to_string())
            .or_default()
            .push_front(data.to_vec());
        self.notify.notify_waiters();
        Ok(())
    }

    async fn brpop_bytes(
        &self,
        key: &str,
        timeout: u64,
    ) -> Result<Option<(Vec<u8>, Vec<u8>)>, FabricError> {
        let deadline = (timeout > 0).then(|| tokio::time::Instant::now() + Duration::from_secs(timeout));
        loop {
            let notified = self.notify.notified();
            if let Some(data) = self
                .queues
                .lock()
                .await
                .get_mut(key)
                .and_then(VecDeque::pop_back)
            {
                return Ok(Some((key.as_bytes().to_vec(), data)));
            }
            match deadline {
                None => notified.await,
                Some(deadline) => {
                    if tokio::time::timeout_at(deadline, notified).await.is_err() {
                        return Ok(None);
                    }
                }
            }
        }
    }

    async fn ping(&self, _timeout: Option<Duration>) -> bool {
        true
    }

    async fn exists(&self, key: &str) -> Result<bool, FabricError> {
        Ok(self
            .queues
            .lock()
            .await
            .get(key)
            .is_some_and(|q| !q.is_empty()))
    }

    async fn get_bytes(&self, _key: &str) -> Result<Option<Vec<u8>>, FabricError> {
        Ok(None)
    }

    async fn set_bytes(&self, _key: &str, _value: &[u8]) -> Result<(), FabricError> {
        Ok(())
    }
}

fn module_context(fabric: Arc<MemoryFabric>) -> Arc<ModuleContext> {
    Arc::new(ModuleContext {
        provider: MsgProvider::Worker,
        command_prefix: "/".to_string(),
        debug: false,
        verbose: 0,
        fabric,
        uploader: None,
    })
}

async fn start_worker(fabric: Arc<MemoryFabric>) -> Arc<WorkerRuntime> {
    let registry = ModuleRegistry::with_builtins();
    let mut host = registry.load("default", false).unwrap();
    host.init(&[]).unwrap();

    let runtime = Arc::new(WorkerRuntime::new(fabric.clone(), host, 1.0, 8.0));
    runtime.open_module(module_context(fabric)).await.unwrap();
    runtime.publish_descriptor().await.unwrap();
    runtime
}

fn endpoint(fabric: Arc<MemoryFabric>) -> Arc<EndpointRuntime> {
    Arc::new(EndpointRuntime::new(
        fabric,
        MsgProvider::Telegram,
        &DispatchConfig::default(),
        shunt_core::version(),
    ))
}

#[tokio::test]
async fn echo_round_trip() {
    let fabric = Arc::new(MemoryFabric::default());
    let worker = start_worker(fabric.clone()).await;
    let endpoint = endpoint(fabric.clone());

    // Replay the membership traffic into the endpoint's fold.
    for packet in fabric.take_published(REGISTER_WORKER_PATH).await {
        endpoint.on_register_worker(&packet);
    }

    let poller = {
        let worker = worker.clone();
        tokio::spawn(async move { worker.poll_loop().await })
    };

    let request = MsgRequest::new(MsgProvider::Telegram, "/echo hello world");
    let response = endpoint.do_message(&request).await.expect("a reply");

    assert_eq!(response.msg_uuid, request.msg_uuid);
    assert_eq!(response.reply_content(), "hello world");
    assert!(!response.has_error());

    poller.abort();
}

#[tokio::test]
async fn typed_chat_command_round_trip() {
    let fabric = Arc::new(MemoryFabric::default());
    let worker = start_worker(fabric.clone()).await;
    let endpoint = endpoint(fabric.clone());

    for packet in fabric.take_published(REGISTER_WORKER_PATH).await {
        endpoint.on_register_worker(&packet);
    }

    let poller = {
        let worker = worker.clone();
        tokio::spawn(async move { worker.poll_loop().await })
    };

    let request = MsgRequest::new(MsgProvider::Telegram, "/chat,model=gpt-4o,n=2 hi");
    let response = endpoint.do_message(&request).await.expect("a reply");
    assert_eq!(response.reply_content(), "gpt-4o-2");

    poller.abort();
}

#[tokio::test]
async fn worker_errors_come_back_as_error_responses() {
    let fabric = Arc::new(MemoryFabric::default());
    let worker = start_worker(fabric.clone()).await;
    let endpoint = endpoint(fabric.clone());

    for packet in fabric.take_published(REGISTER_WORKER_PATH).await {
        endpoint.on_register_worker(&packet);
    }

    let poller = {
        let worker = worker.clone();
        tokio::spawn(async move { worker.poll_loop().await })
    };

    // The chat command rejects an unparsable count at bind time.
    let request = MsgRequest::new(MsgProvider::Telegram, "/chat,n=abc hi");
    let response = endpoint.do_message(&request).await.expect("a reply");
    assert!(response.has_error());
    assert_eq!(response.msg_uuid, request.msg_uuid);

    poller.abort();
}

#[tokio::test]
async fn unregister_removes_the_worker_commands() {
    let fabric = Arc::new(MemoryFabric::default());
    let worker = start_worker(fabric.clone()).await;
    let endpoint = endpoint(fabric.clone());

    for packet in fabric.take_published(REGISTER_WORKER_PATH).await {
        endpoint.on_register_worker(&packet);
    }

    worker.shutdown().await;
    for packet in fabric.take_published(UNREGISTER_WORKER_PATH).await {
        endpoint.on_unregister_worker(&packet);
    }

    // With the worker gone, nothing is pushed and nothing replies.
    let request = MsgRequest::new(MsgProvider::Telegram, "/echo hello");
    assert!(endpoint.do_message(&request).await.is_none());
}
