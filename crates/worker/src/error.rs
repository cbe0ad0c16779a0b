use thiserror::Error;

use shunt_fabric::FabricError;

/// Boxed cause for module hook failures.
pub type HookError = Box<dyn std::error::Error + Send + Sync>;

/// Errors raised by the worker node: module lifecycle, registration,
/// and the polling loop.
#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("runtime error in {module}.{hook}")]
    Hook {
        module: String,
        hook: &'static str,
        #[source]
        source: HookError,
    },

    #[error("invalid state for {module}.{hook}: expected {expected}, actual {actual}")]
    State {
        module: String,
        hook: &'static str,
        expected: &'static str,
        actual: &'static str,
    },

    #[error("unknown module path: {0}")]
    UnknownModule(String),

    #[error("response uuid {response:?} does not match request uuid {request:?}")]
    UuidMismatch { request: String, response: String },

    #[error(transparent)]
    Registration(#[from] RegistrationError),

    #[error(transparent)]
    Fabric(#[from] FabricError),
}

/// Errors raised while registering a command handler.
#[derive(Debug, Error)]
pub enum RegistrationError {
    #[error("command key must not be empty")]
    EmptyKey,

    #[error("configurable parameter at position {index} has no declared spec")]
    MissingSpec { index: usize },

    #[error("{count} declared spec(s) have no matching handler parameter")]
    UnusedSpecs { count: usize },

    #[error("default for '{key}' does not match the handler parameter type")]
    DefaultMismatch { key: String },
}

/// Errors raised while binding a parsed command to a handler call.
#[derive(Debug, Error)]
pub enum BindError {
    #[error("configurable parameter bound without a spec")]
    MissingSpec,

    #[error(transparent)]
    Coerce(#[from] FabricError),

    #[error("coerced value for '{key}' does not fit the parameter type")]
    TypeMismatch { key: String },
}

/// Errors surfaced by command execution. Converted to a user-visible
/// error response, never propagated out of the polling loop.
#[derive(Debug, Error)]
pub enum CommandError {
    #[error("{0}")]
    Message(String),

    #[error("not a command request: {0}")]
    NotACommand(String),

    #[error("unregistered command: {0}")]
    UnknownCommand(String),

    #[error(transparent)]
    Bind(#[from] BindError),
}

impl CommandError {
    pub fn msg(message: impl Into<String>) -> Self {
        Self::Message(message.into())
    }
}
