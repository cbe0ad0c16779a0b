pub mod cmd;
pub mod file;
pub mod provider;
pub mod request;
pub mod response;
pub mod worker;

pub use cmd::{string_to_boolean, MsgCmd, ParamValue};
pub use file::MsgFile;
pub use provider::{MsgFlow, MsgProvider};
pub use request::MsgRequest;
pub use response::MsgResponse;
pub use worker::{CmdDesc, MsgWorker, ParamDesc};
