pub mod error;
pub mod gateway;
pub mod runtime;
pub mod state;
pub mod telegram;

pub use error::EndpointError;
pub use gateway::ChatGateway;
pub use runtime::EndpointRuntime;
pub use state::{CommandTarget, EndpointState, HELP_COMMAND, VERSION_COMMAND};
pub use telegram::TelegramGateway;
