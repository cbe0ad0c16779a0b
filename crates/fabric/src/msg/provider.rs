use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::FabricError;

/// Identifies the node role or chat provider a request originated from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MsgProvider {
    Master,
    Worker,
    Discord,
    Telegram,
    Tester,
}

impl MsgProvider {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Master => "master",
            Self::Worker => "worker",
            Self::Discord => "discord",
            Self::Telegram => "telegram",
            Self::Tester => "tester",
        }
    }

    /// Payload bytes published on the register-request channel.
    ///
    /// That channel is reserved for bare provider identifiers; nothing
    /// else may be sent on it.
    pub fn encode_name(&self) -> Vec<u8> {
        self.as_str().as_bytes().to_vec()
    }
}

impl fmt::Display for MsgProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MsgProvider {
    type Err = FabricError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "master" => Ok(Self::Master),
            "worker" => Ok(Self::Worker),
            "discord" => Ok(Self::Discord),
            "telegram" => Ok(Self::Telegram),
            "tester" => Ok(Self::Tester),
            other => Err(FabricError::Transport(format!("unknown provider: {other}"))),
        }
    }
}

/// Direction of a persisted message/file link.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MsgFlow {
    Request,
    Response,
}

impl MsgFlow {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Request => "request",
            Self::Response => "response",
        }
    }
}

impl fmt::Display for MsgFlow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
