use thiserror::Error;

/// Errors raised by the persistence layer.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("blob store error: {0}")]
    Blob(#[from] object_store::Error),

    #[error("blob path error: {0}")]
    BlobPath(#[from] object_store::path::Error),

    #[error("{0} is not configured")]
    NotConfigured(&'static str),

    #[error("insert into '{0}' affected no rows")]
    Insert(&'static str),
}
