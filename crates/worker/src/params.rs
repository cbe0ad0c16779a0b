//! Handler parameter types and their binding rules.
//!
//! A handler argument is either **runtime** — synthesized from the
//! request itself — or **configurable** — looked up in the parsed
//! command's kwargs through a declared [`ParamDesc`]. Runtime types
//! carry no descriptor and are invisible to callers; configurable
//! arguments use the [`Arg`] wrapper.

use chrono::{DateTime, Utc};

use shunt_fabric::msg::{MsgCmd, MsgFile, MsgRequest, ParamDesc, ParamValue};

use crate::error::BindError;

/// One binding step of a command handler.
pub trait CommandParam: Sized + Send {
    /// Whether this parameter consumes a declared [`ParamDesc`].
    fn configurable() -> bool {
        false
    }

    /// Whether a declared default fits this parameter type.
    /// Only consulted for configurable parameters.
    fn matches_default(_default: &ParamValue) -> bool {
        true
    }

    fn bind(
        request: &MsgRequest,
        cmd: &MsgCmd,
        desc: Option<&ParamDesc>,
    ) -> Result<Self, BindError>;
}

// ── Runtime parameters ───────────────────────────────────────────────

/// The command body (everything after the first space).
pub struct Body(pub String);

/// The raw message content.
pub struct Content(pub String);

/// The first attached file, when any.
pub struct FileParam(pub Option<MsgFile>);

/// Every attached file.
pub struct FilesParam(pub Vec<MsgFile>);

/// The sender's username; `None` when the provider never set it.
pub struct Username(pub Option<String>);

/// The sender's nickname; `None` when the provider never set it.
pub struct Nickname(pub Option<String>);

/// When the user message was created.
pub struct CreatedAt(pub DateTime<Utc>);

/// The correlation identifier.
pub struct MsgUuid(pub String);

impl CommandParam for Body {
    fn bind(_r: &MsgRequest, cmd: &MsgCmd, _d: Option<&ParamDesc>) -> Result<Self, BindError> {
        Ok(Self(cmd.body.clone()))
    }
}

impl CommandParam for Content {
    fn bind(request: &MsgRequest, _c: &MsgCmd, _d: Option<&ParamDesc>) -> Result<Self, BindError> {
        Ok(Self(request.content.clone()))
    }
}

impl CommandParam for FileParam {
    fn bind(request: &MsgRequest, _c: &MsgCmd, _d: Option<&ParamDesc>) -> Result<Self, BindError> {
        Ok(Self(request.files.first().cloned()))
    }
}

impl CommandParam for FilesParam {
    fn bind(request: &MsgRequest, _c: &MsgCmd, _d: Option<&ParamDesc>) -> Result<Self, BindError> {
        Ok(Self(request.files.clone()))
    }
}

impl CommandParam for Username {
    fn bind(request: &MsgRequest, _c: &MsgCmd, _d: Option<&ParamDesc>) -> Result<Self, BindError> {
        Ok(Self(request.username.clone()))
    }
}

impl CommandParam for Nickname {
    fn bind(request: &MsgRequest, _c: &MsgCmd, _d: Option<&ParamDesc>) -> Result<Self, BindError> {
        Ok(Self(request.nickname.clone()))
    }
}

impl CommandParam for CreatedAt {
    fn bind(request: &MsgRequest, _c: &MsgCmd, _d: Option<&ParamDesc>) -> Result<Self, BindError> {
        Ok(Self(request.created_at))
    }
}

impl CommandParam for MsgUuid {
    fn bind(request: &MsgRequest, _c: &MsgCmd, _d: Option<&ParamDesc>) -> Result<Self, BindError> {
        Ok(Self(request.msg_uuid.clone()))
    }
}

impl CommandParam for MsgRequest {
    fn bind(request: &MsgRequest, _c: &MsgCmd, _d: Option<&ParamDesc>) -> Result<Self, BindError> {
        Ok(request.clone())
    }
}

// ── Configurable parameters ──────────────────────────────────────────

/// A configurable handler argument backed by a declared [`ParamDesc`].
pub struct Arg<T: ArgValue>(pub T);

/// The value domain of configurable arguments.
pub trait ArgValue: Sized + Send {
    fn matches(default: &ParamValue) -> bool;
    fn from_value(value: ParamValue) -> Option<Self>;
}

impl ArgValue for String {
    fn matches(default: &ParamValue) -> bool {
        matches!(default, ParamValue::Text(_))
    }

    fn from_value(value: ParamValue) -> Option<Self> {
        match value {
            ParamValue::Text(s) => Some(s),
            _ => None,
        }
    }
}

impl ArgValue for Option<String> {
    fn matches(default: &ParamValue) -> bool {
        matches!(default, ParamValue::Null)
    }

    fn from_value(value: ParamValue) -> Option<Self> {
        match value {
            ParamValue::Null => Some(None),
            ParamValue::Text(s) => Some(Some(s)),
            _ => None,
        }
    }
}

impl ArgValue for bool {
    fn matches(default: &ParamValue) -> bool {
        matches!(default, ParamValue::Bool(_))
    }

    fn from_value(value: ParamValue) -> Option<Self> {
        match value {
            ParamValue::Bool(b) => Some(b),
            _ => None,
        }
    }
}

impl ArgValue for i64 {
    fn matches(default: &ParamValue) -> bool {
        matches!(default, ParamValue::Int(_))
    }

    fn from_value(value: ParamValue) -> Option<Self> {
        match value {
            ParamValue::Int(i) => Some(i),
            _ => None,
        }
    }
}

impl ArgValue for f64 {
    fn matches(default: &ParamValue) -> bool {
        matches!(default, ParamValue::Float(_))
    }

    fn from_value(value: ParamValue) -> Option<Self> {
        match value {
            ParamValue::Float(x) => Some(x),
            _ => None,
        }
    }
}

impl<T: ArgValue> CommandParam for Arg<T> {
    fn configurable() -> bool {
        true
    }

    fn matches_default(default: &ParamValue) -> bool {
        T::matches(default)
    }

    fn bind(_r: &MsgRequest, cmd: &MsgCmd, desc: Option<&ParamDesc>) -> Result<Self, BindError> {
        let desc = desc.ok_or(BindError::MissingSpec)?;
        let value = cmd.get_with(&desc.key, &desc.default)?;
        T::from_value(value)
            .map(Arg)
            .ok_or_else(|| BindError::TypeMismatch {
                key: desc.key.clone(),
            })
    }
}

#[cfg(test)]
mod tests {
    use shunt_fabric::msg::MsgProvider;

    use super::*;

    fn request_and_cmd(content: &str) -> (MsgRequest, MsgCmd) {
        let mut request = MsgRequest::new(MsgProvider::Tester, content);
        request.username = Some("user".into());
        let cmd = request.parse_command().expect("content is a command");
        (request, cmd)
    }

    #[test]
    fn runtime_params_bind_from_the_request() {
        let (request, cmd) = request_and_cmd("/echo hello world");
        let Body(body) = Body::bind(&request, &cmd, None).unwrap();
        assert_eq!(body, "hello world");

        let Content(content) = Content::bind(&request, &cmd, None).unwrap();
        assert_eq!(content, "/echo hello world");

        let MsgUuid(uuid) = MsgUuid::bind(&request, &cmd, None).unwrap();
        assert_eq!(uuid, request.msg_uuid);

        let Username(username) = Username::bind(&request, &cmd, None).unwrap();
        assert_eq!(username.as_deref(), Some("user"));

        // Never set by this provider: binds to None, not an error.
        let Nickname(nickname) = Nickname::bind(&request, &cmd, None).unwrap();
        assert!(nickname.is_none());

        let FileParam(file) = FileParam::bind(&request, &cmd, None).unwrap();
        assert!(file.is_none());
    }

    #[test]
    fn configurable_arg_coerces_through_its_desc() {
        let (request, cmd) = request_and_cmd("/chat,n=2 hi");
        let desc = ParamDesc::new("n", "", ParamValue::Int(1));
        let Arg(n) = Arg::<i64>::bind(&request, &cmd, Some(&desc)).unwrap();
        assert_eq!(n, 2);

        let desc = ParamDesc::new("model", "", ParamValue::from("gpt-4o"));
        let Arg(model) = Arg::<String>::bind(&request, &cmd, Some(&desc)).unwrap();
        assert_eq!(model, "gpt-4o");
    }

    #[test]
    fn configurable_arg_without_spec_is_an_error() {
        let (request, cmd) = request_and_cmd("/chat hi");
        assert!(Arg::<i64>::bind(&request, &cmd, None).is_err());
    }
}
