//! The endpoint's dispatch core.
//!
//! Subscribes to the membership channels, keeps the command table
//! current, and for each chat message: parse, resolve, forward over the
//! fabric, and await the correlated reply. Built-ins (`version`,
//! `help`) are answered locally.

use std::sync::{Arc, Mutex as StdMutex};

use tracing::{debug, error, info, warn};

use shunt_context::{BaseContext, SubscribeHandler};
use shunt_core::DispatchConfig;
use shunt_fabric::client::FabricClient;
use shunt_fabric::codec;
use shunt_fabric::msg::{MsgProvider, MsgRequest, MsgResponse, MsgWorker};
use shunt_fabric::paths::{
    make_response_path, BROADCAST_PATH, REGISTER_WORKER_PATH, REGISTER_WORKER_REQUEST_PATH,
    UNREGISTER_WORKER_PATH,
};
use shunt_store::MsgUploader;

use crate::error::EndpointError;
use crate::state::{CommandTarget, EndpointState};

pub struct EndpointRuntime {
    fabric: Arc<dyn FabricClient>,
    state: Arc<StdMutex<EndpointState>>,
    provider: MsgProvider,
    command_prefix: String,
    version: String,
    /// Reply wait, floored to whole seconds.
    response_timeout: u64,
    request_expire: u64,
    uploader: Option<Arc<MsgUploader>>,
    verbose: u8,
}

impl EndpointRuntime {
    pub fn new(
        fabric: Arc<dyn FabricClient>,
        provider: MsgProvider,
        dispatch: &DispatchConfig,
        version: impl Into<String>,
    ) -> Self {
        Self {
            fabric,
            state: Arc::new(StdMutex::new(EndpointState::new())),
            provider,
            command_prefix: dispatch.command_prefix.clone(),
            version: version.into(),
            response_timeout: dispatch.response_timeout.max(0.0).floor() as u64,
            request_expire: dispatch.request_expire,
            uploader: None,
            verbose: 0,
        }
    }

    pub fn with_uploader(mut self, uploader: Option<Arc<MsgUploader>>) -> Self {
        self.uploader = uploader;
        self
    }

    pub fn with_verbose(mut self, verbose: u8) -> Self {
        self.verbose = verbose;
        self
    }

    pub fn provider(&self) -> MsgProvider {
        self.provider
    }

    /// Register the membership handlers and the on-connect solicitation
    /// on a base context. Call before `context.open()`.
    pub fn install(self: &Arc<Self>, context: &BaseContext) -> Result<(), EndpointError> {
        context
            .add_subscribe_handler(
                BROADCAST_PATH,
                SubscribeHandler::sync(|data| {
                    debug!(bytes = data.len(), "broadcast received");
                    Ok(())
                }),
            )
            .map_err(|e| EndpointError::Provider(e.to_string()))?;

        let runtime = self.clone();
        context
            .add_subscribe_handler(
                REGISTER_WORKER_PATH,
                SubscribeHandler::sync(move |data| {
                    runtime.on_register_worker(data);
                    Ok(())
                }),
            )
            .map_err(|e| EndpointError::Provider(e.to_string()))?;

        let runtime = self.clone();
        context
            .add_subscribe_handler(
                UNREGISTER_WORKER_PATH,
                SubscribeHandler::sync(move |data| {
                    runtime.on_unregister_worker(data);
                    Ok(())
                }),
            )
            .map_err(|e| EndpointError::Provider(e.to_string()))?;

        let runtime = self.clone();
        context.set_on_connect(Arc::new(move || {
            let runtime = runtime.clone();
            Box::pin(async move {
                runtime.publish_register_request().await?;
                Ok(())
            })
        }));

        Ok(())
    }

    /// Solicit descriptors from every live worker.
    pub async fn publish_register_request(&self) -> Result<(), EndpointError> {
        self.fabric
            .publish(REGISTER_WORKER_REQUEST_PATH, &self.provider.encode_name())
            .await?;
        info!("published a packet requesting worker information");
        Ok(())
    }

    /// Fold a register event into the membership table.
    pub fn on_register_worker(&self, data: &[u8]) {
        let worker: MsgWorker = match codec::decode(data) {
            Ok(worker) => worker,
            Err(e) => {
                error!(error = %e, "failed to decode worker descriptor");
                return;
            }
        };
        self.state
            .lock()
            .expect("endpoint state poisoned")
            .register_worker(worker);
    }

    /// Fold an unregister event; the payload is a UTF-8 worker name.
    pub fn on_unregister_worker(&self, data: &[u8]) {
        let name = match std::str::from_utf8(data) {
            Ok(name) => name,
            Err(e) => {
                error!(error = %e, "unregister payload is not UTF-8");
                return;
            }
        };
        let removed = self
            .state
            .lock()
            .expect("endpoint state poisoned")
            .unregister_worker(name);
        if removed {
            info!(worker = %name, "unregister worker");
        } else {
            warn!(worker = %name, "unregister worker (but does not exist)");
        }
    }

    /// Handle one chat message. `None` means nothing is said back:
    /// not a command, or a command nobody implements.
    pub async fn do_message(&self, request: &MsgRequest) -> Option<MsgResponse> {
        let msg_uuid = &request.msg_uuid;
        info!(msg_uuid = %msg_uuid, provider = %request.provider, "message received");

        let cmd = match request.parse_command_with(&self.command_prefix) {
            Some(cmd) => cmd,
            None => {
                debug!(msg_uuid = %msg_uuid, "not a command");
                return None;
            }
        };

        let target = {
            let state = self.state.lock().expect("endpoint state poisoned");
            state.target(&cmd.command).cloned()
        };

        let target = match target {
            Some(target) => target,
            None => {
                warn!(msg_uuid = %msg_uuid, command = %cmd.command, "unregistered command");
                return None;
            }
        };

        if self.verbose >= 1 {
            info!(msg_uuid = %msg_uuid, command = %cmd.command, "run command");
        }

        let response = match target {
            CommandTarget::Version => MsgResponse::new(msg_uuid, &self.version),
            CommandTarget::Help => {
                let help = self
                    .state
                    .lock()
                    .expect("endpoint state poisoned")
                    .render_help(&self.command_prefix);
                MsgResponse::new(msg_uuid, help)
            }
            CommandTarget::Worker { path } => match self.forward_to_worker(request, &path).await {
                Ok(response) => response,
                Err(e) => {
                    error!(msg_uuid = %msg_uuid, error = %e, "command dispatch failed");
                    MsgResponse::error(msg_uuid, e.to_string())
                }
            },
        };

        Some(response)
    }

    /// Persist (when configured), push onto the worker queue, and wait
    /// for the correlated reply.
    async fn forward_to_worker(
        &self,
        request: &MsgRequest,
        path: &str,
    ) -> Result<MsgResponse, EndpointError> {
        if let Some(uploader) = &self.uploader {
            uploader
                .upload_request(request)
                .await
                .map_err(|source| EndpointError::Upload {
                    msg_uuid: request.msg_uuid.clone(),
                    source,
                })?;
        }

        let packet = codec::encode(request)?;
        self.fabric
            .lpush_bytes(path, &packet, Some(self.request_expire))
            .await?;

        let response_path = make_response_path(&request.msg_uuid);
        let popped = self
            .fabric
            .brpop_bytes(&response_path, self.response_timeout)
            .await?;

        let Some((_key, data)) = popped else {
            return Err(EndpointError::ResponseTimeout {
                msg_uuid: request.msg_uuid.clone(),
                timeout: self.response_timeout,
            });
        };

        Ok(codec::decode(&data)?)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::time::Duration;

    use async_trait::async_trait;
    use tokio::sync::Mutex;

    use shunt_fabric::msg::CmdDesc;
    use shunt_fabric::FabricError;

    use super::*;

    /// Mock fabric that records pushes and serves queued pop results.
    #[derive(Default)]
    struct MockFabric {
        published: Mutex<Vec<(String, Vec<u8>)>>,
        pushed: Mutex<Vec<(String, Vec<u8>, Option<u64>)>>,
        pops: Mutex<HashMap<String, Vec<u8>>>,
    }

    impl MockFabric {
        async fn queue_response(&self, key: &str, data: Vec<u8>) {
            self.pops.lock().await.insert(key.to_string(), data);
        }

        async fn push_count(&self) -> usize {
            self.pushed.lock().await.len()
        }
    }

    #[async_trait]
    impl FabricClient for MockFabric {
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
            expire: Option<u64>,
        ) -> Result<(), FabricError> {
            self.pushed
                .lock()
                .await
                .push((key.to_string(), data.to_vec(), expire));
            Ok(())
        }

        async fn brpop_bytes(
            &self,
            key: &str,
            _timeout: u64,
        ) -> Result<Option<(Vec<u8>, Vec<u8>)>, FabricError> {
            Ok(self
                .pops
                .lock()
                .await
                .remove(key)
                .map(|data| (key.as_bytes().to_vec(), data)))
        }

        async fn ping(&self, _timeout: Option<Duration>) -> bool {
            true
        }

        async fn exists(&self, _key: &str) -> Result<bool, FabricError> {
            Ok(false)
        }

        async fn get_bytes(&self, _key: &str) -> Result<Option<Vec<u8>>, FabricError> {
            Ok(None)
        }

        async fn set_bytes(&self, _key: &str, _value: &[u8]) -> Result<(), FabricError> {
            Ok(())
        }
    }

    fn runtime_with(fabric: Arc<MockFabric>) -> EndpointRuntime {
        EndpointRuntime::new(
            fabric,
            MsgProvider::Telegram,
            &DispatchConfig::default(),
            "1.2.3",
        )
    }

    fn descriptor(name: &str, keys: &[(&str, &str)]) -> MsgWorker {
        let mut worker = MsgWorker::new(name, "0.1.0", format!("{name} worker"));
        worker.cmds = keys
            .iter()
            .map(|(key, doc)| CmdDesc::new(*key, *doc))
            .collect();
        worker
    }

    #[tokio::test]
    async fn non_command_messages_are_ignored() {
        let fabric = Arc::new(MockFabric::default());
        let runtime = runtime_with(fabric.clone());
        let request = MsgRequest::new(MsgProvider::Telegram, "just chatting");
        assert!(runtime.do_message(&request).await.is_none());
        assert_eq!(fabric.push_count().await, 0);
    }

    #[tokio::test]
    async fn unknown_commands_produce_no_outbound_push() {
        let fabric = Arc::new(MockFabric::default());
        let runtime = runtime_with(fabric.clone());
        let request = MsgRequest::new(MsgProvider::Telegram, "/nope anything");
        assert!(runtime.do_message(&request).await.is_none());
        assert_eq!(fabric.push_count().await, 0);
    }

    #[tokio::test]
    async fn version_is_answered_locally() {
        let fabric = Arc::new(MockFabric::default());
        let runtime = runtime_with(fabric.clone());
        let request = MsgRequest::new(MsgProvider::Telegram, "/version");
        let response = runtime.do_message(&request).await.unwrap();
        assert_eq!(response.reply_content(), "1.2.3");
        assert_eq!(fabric.push_count().await, 0);
    }

    #[tokio::test]
    async fn help_lists_registered_workers() {
        let fabric = Arc::new(MockFabric::default());
        let runtime = Arc::new(runtime_with(fabric));
        let a = codec::encode(&descriptor("A", &[("x", "do X")])).unwrap();
        let b = codec::encode(&descriptor("B", &[("y", "do Y")])).unwrap();
        runtime.on_register_worker(&a);
        runtime.on_register_worker(&b);

        let request = MsgRequest::new(MsgProvider::Telegram, "/help");
        let response = runtime.do_message(&request).await.unwrap();
        let help = response.reply_content();
        assert!(help.contains("/version"));
        assert!(help.contains("/help"));
        assert!(help.contains("/x - do X"));
        assert!(help.contains("/y - do Y"));
    }

    #[tokio::test]
    async fn forwarded_commands_roundtrip_through_the_fabric() {
        let fabric = Arc::new(MockFabric::default());
        let runtime = Arc::new(runtime_with(fabric.clone()));
        runtime.on_register_worker(&codec::encode(&descriptor("default", &[("echo", "")])).unwrap());

        let request = MsgRequest::new(MsgProvider::Telegram, "/echo hello world");
        let reply = MsgResponse::new(&request.msg_uuid, "hello world");
        fabric
            .queue_response(
                &make_response_path(&request.msg_uuid),
                codec::encode(&reply).unwrap(),
            )
            .await;

        let response = runtime.do_message(&request).await.unwrap();
        assert_eq!(response.reply_content(), "hello world");

        let pushed = fabric.pushed.lock().await;
        assert_eq!(pushed.len(), 1);
        assert_eq!(pushed[0].0, "/osom/api/request/default");
        assert_eq!(pushed[0].2, Some(30));
        let forwarded: MsgRequest = codec::decode(&pushed[0].1).unwrap();
        assert_eq!(forwarded, request);
    }

    #[tokio::test]
    async fn missing_reply_becomes_a_timeout_error_response() {
        let fabric = Arc::new(MockFabric::default());
        let runtime = Arc::new(runtime_with(fabric));
        runtime.on_register_worker(&codec::encode(&descriptor("default", &[("echo", "")])).unwrap());

        let request = MsgRequest::new(MsgProvider::Telegram, "/echo hello");
        let response = runtime.do_message(&request).await.unwrap();
        assert!(response.has_error());
        assert!(response.reply_content().contains(&request.msg_uuid));
    }

    #[tokio::test]
    async fn undecodable_reply_becomes_an_error_response() {
        let fabric = Arc::new(MockFabric::default());
        let runtime = Arc::new(runtime_with(fabric.clone()));
        runtime.on_register_worker(&codec::encode(&descriptor("default", &[("echo", "")])).unwrap());

        let request = MsgRequest::new(MsgProvider::Telegram, "/echo hello");
        fabric
            .queue_response(&make_response_path(&request.msg_uuid), b"garbage".to_vec())
            .await;

        let response = runtime.do_message(&request).await.unwrap();
        assert!(response.has_error());
    }

    #[tokio::test]
    async fn garbage_register_events_are_ignored() {
        let fabric = Arc::new(MockFabric::default());
        let runtime = Arc::new(runtime_with(fabric));
        runtime.on_register_worker(b"not a descriptor");
        runtime.on_unregister_worker(&[0xFF, 0xFE]);

        let request = MsgRequest::new(MsgProvider::Telegram, "/help");
        let response = runtime.do_message(&request).await.unwrap();
        assert!(!response.has_error());
    }
}
