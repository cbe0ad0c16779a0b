//! Relational persistence for messages and file metadata.
//!
//! Three tables back the audit trail: `msg` (one row per user message),
//! `file` (one row per uploaded attachment), and `msg2file` (links a
//! message to its files with a request/response flow tag).

use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tracing::{debug, info};

use shunt_core::config::PostgresConfig;
use shunt_fabric::msg::{MsgFile, MsgFlow, MsgRequest};

use crate::error::StoreError;

pub struct DbClient {
    pool: PgPool,
}

impl DbClient {
    pub async fn connect(config: &PostgresConfig) -> Result<Self, StoreError> {
        if !config.is_configured() {
            return Err(StoreError::NotConfigured("postgres"));
        }
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .connect(&config.connection_string())
            .await?;
        info!(host = %config.host, database = %config.database, "database connected");
        Ok(Self { pool })
    }

    pub async fn close(&self) {
        self.pool.close().await;
        debug!("database pool closed");
    }

    pub async fn insert_msg(&self, request: &MsgRequest) -> Result<(), StoreError> {
        let result = sqlx::query(
            "INSERT INTO msg (id, provider, message_id, channel_id, username, nickname, content, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
        )
        .bind(&request.msg_uuid)
        .bind(request.provider.as_str())
        .bind(request.message_id)
        .bind(request.channel_id)
        .bind(&request.username)
        .bind(&request.nickname)
        .bind(&request.content)
        .bind(request.created_at)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::Insert("msg"));
        }
        Ok(())
    }

    pub async fn insert_file(&self, file: &MsgFile, storage_key: &str) -> Result<(), StoreError> {
        let result = sqlx::query(
            "INSERT INTO file (id, provider, storage, name, content_type, native_id, width, height, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)",
        )
        .bind(&file.file_uuid)
        .bind(file.provider.as_str())
        .bind(storage_key)
        .bind(&file.name)
        .bind(&file.content_type)
        .bind(&file.native_id)
        .bind(file.width)
        .bind(file.height)
        .bind(file.created_at)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::Insert("file"));
        }
        Ok(())
    }

    pub async fn insert_msg2file(
        &self,
        msg_uuid: &str,
        file_uuid: &str,
        flow: MsgFlow,
    ) -> Result<(), StoreError> {
        let result = sqlx::query("INSERT INTO msg2file (msg, file, flow) VALUES ($1, $2, $3)")
            .bind(msg_uuid)
            .bind(file_uuid)
            .bind(flow.as_str())
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::Insert("msg2file"));
        }
        Ok(())
    }
}
