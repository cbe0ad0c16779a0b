use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::file::MsgFile;

/// A worker's reply, correlated to the request by `msg_uuid`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MsgResponse {
    pub msg_uuid: String,
    pub content: Option<String>,
    pub error: Option<String>,
    pub files: Vec<MsgFile>,
    pub created_at: DateTime<Utc>,
}

impl MsgResponse {
    pub fn new(msg_uuid: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            msg_uuid: msg_uuid.into(),
            content: Some(content.into()),
            error: None,
            files: Vec::new(),
            created_at: Utc::now(),
        }
    }

    pub fn error(msg_uuid: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            msg_uuid: msg_uuid.into(),
            content: None,
            error: Some(error.into()),
            files: Vec::new(),
            created_at: Utc::now(),
        }
    }

    pub fn empty(msg_uuid: impl Into<String>) -> Self {
        Self {
            msg_uuid: msg_uuid.into(),
            content: None,
            error: None,
            files: Vec::new(),
            created_at: Utc::now(),
        }
    }

    pub fn has_error(&self) -> bool {
        self.error.is_some()
    }

    /// What the chat user sees: the error if set, else the content,
    /// else the empty string.
    pub fn reply_content(&self) -> &str {
        if let Some(error) = &self.error {
            error
        } else if let Some(content) = &self.content {
            content
        } else {
            ""
        }
    }
}

impl std::fmt::Display for MsgResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "MsgResponse<{}>", self.msg_uuid)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{decode, encode};

    #[test]
    fn reply_content_prefers_error() {
        let ok = MsgResponse::new("M1", "hello");
        assert_eq!(ok.reply_content(), "hello");
        assert!(!ok.has_error());

        let failed = MsgResponse::error("M1", "boom");
        assert_eq!(failed.reply_content(), "boom");
        assert!(failed.has_error());

        let mut both = MsgResponse::new("M1", "hello");
        both.error = Some("boom".into());
        assert_eq!(both.reply_content(), "boom");

        assert_eq!(MsgResponse::empty("M1").reply_content(), "");
    }

    #[test]
    fn response_roundtrip() {
        let response = MsgResponse::new("M1", "hello world");
        let decoded: MsgResponse = decode(&encode(&response).unwrap()).unwrap();
        assert_eq!(decoded, response);
    }
}
