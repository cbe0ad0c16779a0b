pub mod command;
pub mod error;
pub mod module;
pub mod modules;
pub mod params;
pub mod registry;
pub mod reply;
pub mod runtime;

pub use command::{param, CommandSet, Handler, ParamSpec, WorkerCommand};
pub use error::{BindError, CommandError, HookError, RegistrationError, WorkerError};
pub use module::{ModuleContext, ModuleHost, ModuleState, WorkerModule};
pub use params::{
    Arg, ArgValue, Body, CommandParam, Content, CreatedAt, FileParam, FilesParam, MsgUuid,
    Nickname, Username,
};
pub use registry::{ModuleFactory, ModuleRegistry};
pub use reply::{IntoReply, Reply};
pub use runtime::WorkerRuntime;
