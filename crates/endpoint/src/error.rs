use thiserror::Error;

use shunt_fabric::FabricError;
use shunt_store::StoreError;

/// Errors raised by the endpoint runtime and its chat glue.
#[derive(Debug, Error)]
pub enum EndpointError {
    #[error("no worker reply for {msg_uuid} within {timeout}s")]
    ResponseTimeout { msg_uuid: String, timeout: u64 },

    #[error("failed to persist message {msg_uuid}: {source}")]
    Upload {
        msg_uuid: String,
        #[source]
        source: StoreError,
    },

    #[error(transparent)]
    Fabric(#[from] FabricError),

    #[error("chat provider error: {0}")]
    Provider(String),
}
