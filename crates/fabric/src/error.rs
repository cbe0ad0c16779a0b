use thiserror::Error;

/// Errors that can occur in the shunt messaging layer.
#[derive(Debug, Error)]
pub enum FabricError {
    #[error("serialization error: {0}")]
    Encode(#[from] rmp_serde::encode::Error),

    #[error("deserialization error: {0}")]
    Decode(#[from] rmp_serde::decode::Error),

    #[error("compression error: {0}")]
    Compression(#[from] std::io::Error),

    #[error("redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("connection timeout after {0:?}")]
    Timeout(std::time::Duration),

    #[error("broker URL is not configured")]
    NotConfigured,

    #[error("invalid path: {0}")]
    Path(String),

    #[error("cannot coerce argument '{key}' value {value:?} to {expected}")]
    Coerce {
        key: String,
        value: String,
        expected: &'static str,
    },
}
