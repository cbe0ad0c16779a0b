pub mod config;
pub mod logging;

pub use config::{load_dotenv, Config, DispatchConfig, PostgresConfig, StorageConfig};
pub use logging::init_logging;

/// Version string shared by every node binary.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
