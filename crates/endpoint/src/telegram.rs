//! Telegram Bot API glue: long-polled updates in, `sendMessage` out.

use std::collections::VecDeque;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use tracing::{debug, info, warn};

use shunt_fabric::msg::{MsgFile, MsgProvider, MsgRequest, MsgResponse};

use crate::error::EndpointError;
use crate::gateway::ChatGateway;

const API_BASE: &str = "https://api.telegram.org";

pub struct TelegramGateway {
    http: reqwest::Client,
    bot_token: String,
    poll_timeout: u64,
    offset: i64,
    pending: VecDeque<MsgRequest>,
}

impl TelegramGateway {
    pub fn new(bot_token: impl Into<String>, poll_timeout: u64) -> Result<Self, EndpointError> {
        let bot_token = bot_token.into();
        if bot_token.is_empty() {
            return Err(EndpointError::Provider(
                "Telegram bot token must not be empty".into(),
            ));
        }
        Ok(Self {
            http: reqwest::Client::new(),
            bot_token,
            poll_timeout,
            offset: 0,
            pending: VecDeque::new(),
        })
    }

    fn method_url(&self, method: &str) -> String {
        format!("{API_BASE}/bot{}/{method}", self.bot_token)
    }

    async fn call(&self, method: &str, body: Value) -> Result<Value, EndpointError> {
        let response = self
            .http
            .post(self.method_url(method))
            .json(&body)
            .send()
            .await
            .map_err(|e| EndpointError::Provider(format!("Telegram request failed: {e}")))?;

        let payload: Value = response
            .json()
            .await
            .map_err(|e| EndpointError::Provider(format!("Telegram response unreadable: {e}")))?;

        if payload.get("ok") != Some(&Value::Bool(true)) {
            let description = payload
                .get("description")
                .and_then(Value::as_str)
                .unwrap_or("Unknown Telegram API error");
            return Err(EndpointError::Provider(format!(
                "Telegram API error: {description}"
            )));
        }
        Ok(payload)
    }

    async fn poll_updates(&mut self) -> Result<(), EndpointError> {
        let payload = self
            .call(
                "getUpdates",
                serde_json::json!({
                    "timeout": self.poll_timeout,
                    "offset": self.offset + 1,
                    "allowed_updates": ["message"],
                }),
            )
            .await?;

        let updates = payload["result"].as_array().cloned().unwrap_or_default();
        for update in updates {
            if let Some(update_id) = update["update_id"].as_i64() {
                self.offset = self.offset.max(update_id);
            }
            if let Some(request) = convert_message(&update["message"]) {
                debug!(msg_uuid = %request.msg_uuid, "telegram message ingested");
                self.pending.push_back(request);
            }
        }
        Ok(())
    }
}

/// Map one Telegram message object onto a request. `None` for payloads
/// that carry nothing we dispatch on (service messages and the like).
fn convert_message(message: &Value) -> Option<MsgRequest> {
    if message.is_null() {
        return None;
    }

    let content = message["text"]
        .as_str()
        .or_else(|| message["caption"].as_str())
        .unwrap_or_default();

    let mut files = Vec::new();
    // Photos arrive as a size ladder; the last entry is the original.
    if let Some(photo) = message["photo"].as_array().and_then(|sizes| sizes.last()) {
        if let Some(file_id) = photo["file_id"].as_str() {
            let mut file = MsgFile::new(MsgProvider::Telegram, file_id, Vec::new());
            file.content = None;
            file.native_id = Some(file_id.to_string());
            file.width = photo["width"].as_i64().map(|w| w as i32);
            file.height = photo["height"].as_i64().map(|h| h as i32);
            files.push(file);
        }
    }
    if let Some(file_id) = message["document"]["file_id"].as_str() {
        let name = message["document"]["file_name"]
            .as_str()
            .unwrap_or(file_id);
        let mut file = MsgFile::new(MsgProvider::Telegram, name, Vec::new());
        file.content = None;
        file.native_id = Some(file_id.to_string());
        file.content_type = message["document"]["mime_type"]
            .as_str()
            .map(str::to_string);
        files.push(file);
    }

    if content.is_empty() && files.is_empty() {
        return None;
    }

    let mut request = MsgRequest::new(MsgProvider::Telegram, content);
    request.message_id = message["message_id"].as_i64();
    request.channel_id = message["chat"]["id"].as_i64();
    request.username = message["from"]["username"].as_str().map(str::to_string);
    request.nickname = message["from"]["first_name"].as_str().map(str::to_string);
    request.files = files;
    if let Some(date) = message["date"].as_i64() {
        if let Some(created_at) = DateTime::<Utc>::from_timestamp(date, 0) {
            request.created_at = created_at;
        }
    }
    Some(request)
}

#[async_trait]
impl ChatGateway for TelegramGateway {
    async fn next_event(&mut self) -> Result<Option<MsgRequest>, EndpointError> {
        loop {
            if let Some(request) = self.pending.pop_front() {
                return Ok(Some(request));
            }
            self.poll_updates().await?;
        }
    }

    async fn send_reply(
        &self,
        request: &MsgRequest,
        reply: &MsgResponse,
    ) -> Result<(), EndpointError> {
        let Some(chat_id) = request.channel_id else {
            warn!(msg_uuid = %request.msg_uuid, "no chat id to reply to");
            return Ok(());
        };

        let text = reply.reply_content();
        if text.is_empty() {
            debug!(msg_uuid = %request.msg_uuid, "empty reply suppressed");
            return Ok(());
        }

        self.call(
            "sendMessage",
            serde_json::json!({
                "chat_id": chat_id,
                "text": text,
            }),
        )
        .await?;
        info!(msg_uuid = %request.msg_uuid, chat_id, "telegram reply sent");
        Ok(())
    }
}
