//! Handler return values.
//!
//! A handler may reply with text, files, both, or nothing; fallible
//! handlers return `Result` and their error becomes the user-visible
//! error string.

use shunt_fabric::msg::MsgFile;

use crate::error::CommandError;

/// The normalized outcome of a command handler.
#[derive(Debug, Default)]
pub struct Reply {
    pub content: Option<String>,
    pub files: Vec<MsgFile>,
}

pub trait IntoReply: Send {
    fn into_reply(self) -> Result<Reply, CommandError>;
}

impl IntoReply for Reply {
    fn into_reply(self) -> Result<Reply, CommandError> {
        Ok(self)
    }
}

impl IntoReply for () {
    fn into_reply(self) -> Result<Reply, CommandError> {
        Ok(Reply::default())
    }
}

impl IntoReply for String {
    fn into_reply(self) -> Result<Reply, CommandError> {
        Ok(Reply {
            content: Some(self),
            files: Vec::new(),
        })
    }
}

impl IntoReply for &'static str {
    fn into_reply(self) -> Result<Reply, CommandError> {
        self.to_string().into_reply()
    }
}

impl IntoReply for Option<String> {
    fn into_reply(self) -> Result<Reply, CommandError> {
        Ok(Reply {
            content: self,
            files: Vec::new(),
        })
    }
}

impl IntoReply for MsgFile {
    fn into_reply(self) -> Result<Reply, CommandError> {
        Ok(Reply {
            content: None,
            files: vec![self],
        })
    }
}

impl IntoReply for Vec<MsgFile> {
    fn into_reply(self) -> Result<Reply, CommandError> {
        Ok(Reply {
            content: None,
            files: self,
        })
    }
}

impl IntoReply for (String, Vec<MsgFile>) {
    fn into_reply(self) -> Result<Reply, CommandError> {
        Ok(Reply {
            content: Some(self.0),
            files: self.1,
        })
    }
}

impl<T: IntoReply> IntoReply for Result<T, CommandError> {
    fn into_reply(self) -> Result<Reply, CommandError> {
        self.and_then(IntoReply::into_reply)
    }
}
