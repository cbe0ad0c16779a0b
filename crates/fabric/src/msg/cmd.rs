//! Command-string parsing and typed argument retrieval.
//!
//! The user-facing syntax is `{prefix}{command}[,{k}={v}...] [body]`:
//! the head is split from the body on the first space, the head splits
//! on commas into the command token and `key=value` items, and the body
//! is the trimmed remainder.

use std::fmt;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::error::FabricError;

pub const COMMAND_PREFIX: &str = "/";
pub const CONTENT_SEPARATOR: char = ' ';
pub const ARGUMENT_SEPARATOR: char = ',';
pub const KV_SEPARATOR: char = '=';

/// Tokens recognised as `true` by boolean coercion; anything else is false.
pub fn string_to_boolean(text: &str) -> bool {
    matches!(
        text.to_ascii_lowercase().as_str(),
        "true" | "1" | "yes" | "on"
    )
}

/// A typed command-argument value.
///
/// Doubles as the domain of parameter defaults: the default's variant
/// decides how raw kwarg text is coerced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    Null,
    Text(String),
    Bool(bool),
    Int(i64),
    Float(f64),
}

impl ParamValue {
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Text(_) => "text",
            Self::Bool(_) => "bool",
            Self::Int(_) => "int",
            Self::Float(_) => "float",
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => Ok(()),
            Self::Text(s) => f.write_str(s),
            Self::Bool(b) => write!(f, "{b}"),
            Self::Int(i) => write!(f, "{i}"),
            Self::Float(x) => write!(f, "{x}"),
        }
    }
}

impl From<&str> for ParamValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for ParamValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<bool> for ParamValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i64> for ParamValue {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<f64> for ParamValue {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

/// The structured form of a command string.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MsgCmd {
    pub command: String,
    pub kwargs: IndexMap<String, String>,
    pub body: String,
}

impl MsgCmd {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            kwargs: IndexMap::new(),
            body: String::new(),
        }
    }

    /// Parse a command string. Returns `None` when `text` does not start
    /// with `prefix` — plain chat messages never produce a command.
    pub fn from_text(text: &str, prefix: &str) -> Option<Self> {
        if !text.starts_with(prefix) {
            return None;
        }

        let (head, body) = match text.split_once(CONTENT_SEPARATOR) {
            Some((head, body)) => (head, body.trim().to_string()),
            None => (text, String::new()),
        };

        let mut items = head.split(ARGUMENT_SEPARATOR);
        let command = items
            .next()
            .map(|token| token[prefix.len()..].to_string())
            .unwrap_or_default();

        let mut kwargs = IndexMap::new();
        for item in items {
            match item.split_once(KV_SEPARATOR) {
                Some((key, value)) => kwargs.insert(key.to_string(), value.to_string()),
                None => kwargs.insert(item.to_string(), String::new()),
            };
        }

        Some(Self {
            command,
            kwargs,
            body,
        })
    }

    /// Re-serialise into the command syntax. Parsing the result yields
    /// a value equal to `self`.
    pub fn to_text(&self, prefix: &str) -> String {
        let mut out = format!("{prefix}{}", self.command);
        for (key, value) in &self.kwargs {
            out.push(ARGUMENT_SEPARATOR);
            out.push_str(key);
            out.push(KV_SEPARATOR);
            out.push_str(value);
        }
        if !self.body.is_empty() {
            out.push(CONTENT_SEPARATOR);
            out.push_str(&self.body);
        }
        out
    }

    /// Raw kwarg lookup.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.kwargs.get(key).map(String::as_str)
    }

    /// Typed kwarg lookup: coerce the stored text to the type of
    /// `default`, falling back to `default` itself when the key is
    /// absent. A `Null` default returns the raw text untyped.
    pub fn get_with(&self, key: &str, default: &ParamValue) -> Result<ParamValue, FabricError> {
        let raw = match self.kwargs.get(key) {
            Some(raw) => raw,
            None => return Ok(default.clone()),
        };

        match default {
            ParamValue::Null | ParamValue::Text(_) => Ok(ParamValue::Text(raw.clone())),
            ParamValue::Bool(_) => Ok(ParamValue::Bool(string_to_boolean(raw))),
            ParamValue::Int(_) => raw
                .parse()
                .map(ParamValue::Int)
                .map_err(|_| FabricError::Coerce {
                    key: key.to_string(),
                    value: raw.clone(),
                    expected: "int",
                }),
            ParamValue::Float(_) => raw
                .parse()
                .map(ParamValue::Float)
                .map_err(|_| FabricError::Coerce {
                    key: key.to_string(),
                    value: raw.clone(),
                    expected: "float",
                }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_command_kwargs_and_body() {
        let cmd = MsgCmd::from_text("/chat,model=x,n=2 hello", COMMAND_PREFIX).unwrap();
        assert_eq!(cmd.command, "chat");
        assert_eq!(cmd.get("model"), Some("x"));
        assert_eq!(cmd.get("n"), Some("2"));
        assert_eq!(cmd.body, "hello");
    }

    #[test]
    fn non_command_text_yields_none() {
        assert!(MsgCmd::from_text("hello world", COMMAND_PREFIX).is_none());
        assert!(MsgCmd::from_text("", COMMAND_PREFIX).is_none());
    }

    #[test]
    fn bare_key_maps_to_empty_text() {
        let cmd = MsgCmd::from_text("/run,force,level=3", COMMAND_PREFIX).unwrap();
        assert_eq!(cmd.get("force"), Some(""));
        assert_eq!(cmd.get("level"), Some("3"));
        assert_eq!(cmd.body, "");
    }

    #[test]
    fn body_is_trimmed_and_split_once() {
        let cmd = MsgCmd::from_text("/echo   hello world  ", COMMAND_PREFIX).unwrap();
        assert_eq!(cmd.command, "echo");
        assert_eq!(cmd.body, "hello world");
    }

    #[test]
    fn reparse_is_a_fixed_point() {
        for text in [
            "/chat,model=gpt-4o,n=2 hi",
            "/echo hello world",
            "/run,force",
            "/version",
        ] {
            let parsed = MsgCmd::from_text(text, COMMAND_PREFIX).unwrap();
            let reparsed =
                MsgCmd::from_text(&parsed.to_text(COMMAND_PREFIX), COMMAND_PREFIX).unwrap();
            assert_eq!(reparsed, parsed, "not a fixed point for {text:?}");
        }
    }

    #[test]
    fn typed_get_coerces_by_default_type() {
        let cmd = MsgCmd::from_text("/chat,n=2,deep=yes,t=0.5 hi", COMMAND_PREFIX).unwrap();
        assert_eq!(
            cmd.get_with("n", &ParamValue::Int(1)).unwrap(),
            ParamValue::Int(2)
        );
        assert_eq!(
            cmd.get_with("deep", &ParamValue::Bool(false)).unwrap(),
            ParamValue::Bool(true)
        );
        assert_eq!(
            cmd.get_with("t", &ParamValue::Float(1.0)).unwrap(),
            ParamValue::Float(0.5)
        );
        assert_eq!(
            cmd.get_with("model", &ParamValue::from("gpt-4o")).unwrap(),
            ParamValue::from("gpt-4o")
        );
    }

    #[test]
    fn null_default_returns_raw_text() {
        let cmd = MsgCmd::from_text("/x,k=v", COMMAND_PREFIX).unwrap();
        assert_eq!(
            cmd.get_with("k", &ParamValue::Null).unwrap(),
            ParamValue::from("v")
        );
        assert_eq!(cmd.get_with("missing", &ParamValue::Null).unwrap(), ParamValue::Null);
    }

    #[test]
    fn unparsable_int_is_a_coercion_error() {
        let cmd = MsgCmd::from_text("/x,n=abc", COMMAND_PREFIX).unwrap();
        assert!(cmd.get_with("n", &ParamValue::Int(1)).is_err());
    }

    #[test]
    fn boolean_tokens() {
        for token in ["true", "TRUE", "1", "yes", "On"] {
            assert!(string_to_boolean(token), "{token} should be truthy");
        }
        for token in ["false", "0", "no", "off", "2", ""] {
            assert!(!string_to_boolean(token), "{token} should be falsy");
        }
    }
}
