//! The worker node's polling loop.
//!
//! One iteration: blocking-pop the request queue, decode, dispatch to
//! the hosted module, push the encoded response onto the per-message
//! response queue with a short expiry. Handler failures never leave the
//! loop — they come back to the user as error responses. Only transport
//! failures or cancellation end the loop.

use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

use shunt_fabric::client::FabricClient;
use shunt_fabric::codec;
use shunt_fabric::msg::{MsgRequest, MsgResponse, MsgWorker};
use shunt_fabric::paths::{
    make_response_path, REGISTER_WORKER_PATH, UNREGISTER_WORKER_PATH,
};

use crate::error::WorkerError;
use crate::module::{ModuleContext, ModuleHost};

pub struct WorkerRuntime {
    fabric: Arc<dyn FabricClient>,
    host: Mutex<ModuleHost>,
    descriptor: MsgWorker,
    /// BRPOP wait per iteration, floored to whole seconds.
    blocking_timeout: u64,
    /// Expiry for pushed responses, floored to whole seconds.
    response_expire: u64,
}

impl WorkerRuntime {
    pub fn new(
        fabric: Arc<dyn FabricClient>,
        host: ModuleHost,
        blocking_timeout: f64,
        response_expire: f64,
    ) -> Self {
        let descriptor = host.descriptor();
        Self {
            fabric,
            host: Mutex::new(host),
            descriptor,
            blocking_timeout: blocking_timeout.max(0.0).floor() as u64,
            response_expire: response_expire.max(0.0).floor() as u64,
        }
    }

    pub fn descriptor(&self) -> &MsgWorker {
        &self.descriptor
    }

    pub async fn open_module(&self, context: Arc<ModuleContext>) -> Result<(), WorkerError> {
        self.host.lock().await.open(context).await
    }

    pub async fn close_module(&self) -> Result<(), WorkerError> {
        self.host.lock().await.close().await
    }

    /// Announce this worker to every listening endpoint.
    pub async fn publish_descriptor(&self) -> Result<(), WorkerError> {
        let data = codec::encode(&self.descriptor)?;
        self.fabric.publish(REGISTER_WORKER_PATH, &data).await?;
        info!(worker = %self.descriptor.name, "worker descriptor published");
        Ok(())
    }

    /// Announce a clean departure so endpoints drop this worker's commands.
    pub async fn publish_unregister(&self) -> Result<(), WorkerError> {
        self.fabric
            .publish(UNREGISTER_WORKER_PATH, self.descriptor.name.as_bytes())
            .await?;
        info!(worker = %self.descriptor.name, "worker unregister published");
        Ok(())
    }

    /// Poll until cancelled or the transport fails.
    pub async fn poll_loop(&self) -> Result<(), WorkerError> {
        info!(path = %self.descriptor.path, "Start polling ...");
        loop {
            self.poll_once().await?;
        }
    }

    /// One iteration of the polling loop.
    ///
    /// Timeouts and requests without a correlation id are silent;
    /// decode failures and module errors abandon the iteration only.
    pub async fn poll_once(&self) -> Result<(), WorkerError> {
        let popped = self
            .fabric
            .brpop_bytes(&self.descriptor.path, self.blocking_timeout)
            .await?;

        let Some((_key, data)) = popped else {
            return Ok(());
        };

        let request: MsgRequest = match codec::decode(&data) {
            Ok(request) => request,
            Err(e) => {
                error!(error = %e, "failed to decode request packet");
                return Ok(());
            }
        };

        if request.msg_uuid.is_empty() {
            // No correlation id means no reply channel exists.
            debug!("request without msg uuid dropped");
            return Ok(());
        }

        debug!(msg_uuid = %request.msg_uuid, "request received");

        let response = match self.host.lock().await.run(&request).await {
            Ok(response) => response,
            Err(e) => {
                error!(msg_uuid = %request.msg_uuid, error = %e, "module run failed");
                MsgResponse::error(&request.msg_uuid, e.to_string())
            }
        };

        if response.msg_uuid != request.msg_uuid {
            let violation = WorkerError::UuidMismatch {
                request: request.msg_uuid.clone(),
                response: response.msg_uuid.clone(),
            };
            error!(error = %violation, "dropping response");
            return Ok(());
        }

        let packet = match codec::encode(&response) {
            Ok(packet) => packet,
            Err(e) => {
                debug!(msg_uuid = %request.msg_uuid, error = %e, "failed to encode response");
                return Ok(());
            }
        };

        let response_path = make_response_path(&request.msg_uuid);
        if let Err(e) = self
            .fabric
            .lpush_bytes(&response_path, &packet, Some(self.response_expire))
            .await
        {
            error!(msg_uuid = %request.msg_uuid, error = %e, "failed to push response");
        }
        Ok(())
    }

    /// Clean shutdown: unregister, then close the module. Failures are
    /// logged; shutdown keeps going.
    pub async fn shutdown(&self) {
        if let Err(e) = self.publish_unregister().await {
            warn!(error = %e, "failed to publish unregister");
        }
        if let Err(e) = self.close_module().await {
            warn!(error = %e, "failed to close module");
        }
    }
}
