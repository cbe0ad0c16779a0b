use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::cmd::{MsgCmd, COMMAND_PREFIX};
use super::file::MsgFile;
use super::provider::MsgProvider;

/// A user message ingested by an endpoint.
///
/// `msg_uuid` is generated once at the endpoint and stays the
/// correlation identifier until the reply is delivered.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MsgRequest {
    pub msg_uuid: String,
    pub provider: MsgProvider,
    pub message_id: Option<i64>,
    pub channel_id: Option<i64>,
    pub content: String,
    pub username: Option<String>,
    pub nickname: Option<String>,
    pub files: Vec<MsgFile>,
    pub created_at: DateTime<Utc>,
}

impl MsgRequest {
    pub fn new(provider: MsgProvider, content: impl Into<String>) -> Self {
        Self {
            msg_uuid: Uuid::new_v4().to_string(),
            provider,
            message_id: None,
            channel_id: None,
            content: content.into(),
            username: None,
            nickname: None,
            files: Vec::new(),
            created_at: Utc::now(),
        }
    }

    pub fn is_command(&self) -> bool {
        self.is_command_with(COMMAND_PREFIX)
    }

    pub fn is_command_with(&self, prefix: &str) -> bool {
        self.content.starts_with(prefix)
    }

    /// Parse the content as a command. `None` when the prefix is absent.
    pub fn parse_command(&self) -> Option<MsgCmd> {
        self.parse_command_with(COMMAND_PREFIX)
    }

    pub fn parse_command_with(&self, prefix: &str) -> Option<MsgCmd> {
        MsgCmd::from_text(&self.content, prefix)
    }

    /// The command token, when the content is a command.
    pub fn command(&self) -> Option<String> {
        self.parse_command().map(|cmd| cmd.command)
    }
}

impl std::fmt::Display for MsgRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "MsgRequest<{}>", self.msg_uuid)
    }
}
