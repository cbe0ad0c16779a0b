//! Worker membership metadata.
//!
//! A worker publishes its [`MsgWorker`] descriptor on the register
//! channel so endpoints can build their command tables. The descriptor
//! is created once at worker startup and never changes for the worker's
//! lifetime.

use serde::{Deserialize, Serialize};

use super::cmd::ParamValue;
use crate::paths::make_request_path;

/// A configurable parameter of a worker command.
///
/// `default == Null` means "no default; the value is null when absent".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParamDesc {
    pub key: String,
    pub doc: String,
    pub default: ParamValue,
}

impl ParamDesc {
    pub fn new(key: impl Into<String>, doc: impl Into<String>, default: ParamValue) -> Self {
        Self {
            key: key.into(),
            doc: doc.into(),
            default,
        }
    }
}

/// One command a worker implements. `key` is unique within the worker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CmdDesc {
    pub key: String,
    pub doc: String,
    pub params: Vec<ParamDesc>,
}

impl CmdDesc {
    pub fn new(key: impl Into<String>, doc: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            doc: doc.into(),
            params: Vec::new(),
        }
    }
}

/// The metadata a worker publishes for endpoint command tables.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MsgWorker {
    pub name: String,
    pub version: String,
    pub doc: String,
    /// Canonical request queue key, conventionally `/osom/api/request/{name}`.
    pub path: String,
    pub cmds: Vec<CmdDesc>,
}

impl MsgWorker {
    pub fn new(name: impl Into<String>, version: impl Into<String>, doc: impl Into<String>) -> Self {
        let name = name.into();
        let path = make_request_path(&name);
        Self {
            name,
            version: version.into(),
            doc: doc.into(),
            path,
            cmds: Vec::new(),
        }
    }

    /// One help line per command, in declaration order.
    pub fn as_help(&self, command_prefix: &str) -> String {
        let mut buffer = String::new();
        for cmd in &self.cmds {
            buffer.push_str(&format!("{command_prefix}{} - {}\n", cmd.key, cmd.doc));
        }
        buffer.trim_end().to_string()
    }

    /// Verbose listing: name, version, doc, and every parameter.
    pub fn as_details(&self, command_prefix: &str) -> String {
        let mut buffer = format!("{} ({})\n{}\n", self.name, self.version, self.doc);
        for cmd in &self.cmds {
            buffer.push_str(&format!("  {command_prefix}{} - {}\n", cmd.key, cmd.doc));
            for param in &cmd.params {
                buffer.push_str(&format!(
                    "    - {}[{}] - {}\n",
                    param.key, param.default, param.doc
                ));
            }
        }
        buffer.trim_end().to_string()
    }
}

impl std::fmt::Display for MsgWorker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "MsgWorker<{}>", self.name)
    }
}
