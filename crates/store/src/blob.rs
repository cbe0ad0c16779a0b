//! Blob storage for message attachments.
//!
//! Files live under `/msg/{provider}/{file_uuid}`; after a successful
//! upload the metadata row is the source of truth and the in-memory
//! bytes are dropped.

use std::sync::Arc;

use object_store::aws::AmazonS3Builder;
use object_store::path::Path;
use object_store::{ObjectStore, PutPayload};
use tracing::{debug, info};

use shunt_core::config::StorageConfig;
use shunt_fabric::msg::MsgProvider;

use crate::error::StoreError;

pub struct StorageClient {
    store: Arc<dyn ObjectStore>,
    bucket: String,
}

impl StorageClient {
    pub fn connect(config: &StorageConfig) -> Result<Self, StoreError> {
        if !config.is_configured() {
            return Err(StoreError::NotConfigured("storage"));
        }

        let bucket = config.bucket.clone().unwrap_or_default();
        let mut builder = AmazonS3Builder::new()
            .with_region(config.region.clone())
            .with_bucket_name(bucket.clone());
        if let Some(endpoint) = &config.endpoint {
            builder = builder.with_endpoint(endpoint.clone()).with_allow_http(true);
        }
        if let Some(access_key) = &config.access_key {
            builder = builder.with_access_key_id(access_key.clone());
        }
        if let Some(secret_key) = &config.secret_key {
            builder = builder.with_secret_access_key(secret_key.clone());
        }

        let store = builder.build()?;
        info!(bucket = %bucket, "blob store connected");
        Ok(Self {
            store: Arc::new(store),
            bucket,
        })
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    /// Canonical storage key for a message attachment.
    pub fn msg_file_key(provider: MsgProvider, file_uuid: &str) -> String {
        format!("/msg/{}/{}", provider.as_str(), file_uuid)
    }

    pub async fn put(&self, key: &str, data: Vec<u8>) -> Result<(), StoreError> {
        let path = Path::parse(key.trim_start_matches('/'))?;
        let size = data.len();
        self.store.put(&path, PutPayload::from(data)).await?;
        debug!(key = %key, bytes = size, "blob stored");
        Ok(())
    }

    pub async fn get(&self, key: &str) -> Result<Vec<u8>, StoreError> {
        let path = Path::parse(key.trim_start_matches('/'))?;
        let result = self.store.get(&path).await?;
        Ok(result.bytes().await?.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn msg_file_key_layout() {
        assert_eq!(
            StorageClient::msg_file_key(MsgProvider::Telegram, "F1"),
            "/msg/telegram/F1"
        );
        assert_eq!(
            StorageClient::msg_file_key(MsgProvider::Discord, "a-b-c"),
            "/msg/discord/a-b-c"
        );
    }

    #[test]
    fn unconfigured_storage_is_an_error() {
        let config = StorageConfig {
            endpoint: None,
            access_key: None,
            secret_key: None,
            region: "us-east-1".into(),
            bucket: None,
        };
        assert!(matches!(
            StorageClient::connect(&config),
            Err(StoreError::NotConfigured("storage"))
        ));
    }
}
