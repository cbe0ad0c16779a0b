//! Message persistence helper.
//!
//! Called by the endpoint before forwarding a request, and by worker
//! modules that opt in for their responses. Per attachment: blob upload
//! first, then the file metadata row, then the link row. Every failure
//! propagates — the caller decides whether the flow continues.

use std::sync::Arc;

use tracing::debug;

use shunt_fabric::msg::{MsgFile, MsgFlow, MsgRequest, MsgResponse};

use crate::blob::StorageClient;
use crate::db::DbClient;
use crate::error::StoreError;

pub struct MsgUploader {
    db: Arc<DbClient>,
    storage: Arc<StorageClient>,
}

impl MsgUploader {
    pub fn new(db: Arc<DbClient>, storage: Arc<StorageClient>) -> Self {
        Self { db, storage }
    }

    /// Persist an inbound request: the message row, then every attached
    /// file with a `request` link.
    pub async fn upload_request(&self, request: &MsgRequest) -> Result<(), StoreError> {
        self.db.insert_msg(request).await?;
        for file in &request.files {
            self.upload_file(&request.msg_uuid, file, MsgFlow::Request)
                .await?;
        }
        debug!(msg_uuid = %request.msg_uuid, files = request.files.len(), "request persisted");
        Ok(())
    }

    /// Persist a worker response's attachments with `response` links.
    pub async fn upload_response(&self, response: &MsgResponse) -> Result<(), StoreError> {
        for file in &response.files {
            self.upload_file(&response.msg_uuid, file, MsgFlow::Response)
                .await?;
        }
        debug!(msg_uuid = %response.msg_uuid, files = response.files.len(), "response persisted");
        Ok(())
    }

    async fn upload_file(
        &self,
        msg_uuid: &str,
        file: &MsgFile,
        flow: MsgFlow,
    ) -> Result<(), StoreError> {
        let key = StorageClient::msg_file_key(file.provider, &file.file_uuid);
        if let Some(content) = &file.content {
            self.storage.put(&key, content.clone()).await?;
        }
        self.db.insert_file(file, &key).await?;
        self.db
            .insert_msg2file(msg_uuid, &file.file_uuid, flow)
            .await?;
        Ok(())
    }
}
