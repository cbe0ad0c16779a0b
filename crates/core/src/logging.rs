use tracing_subscriber::EnvFilter;

/// Initialize structured logging for a node binary.
///
/// `RUST_LOG` always wins. Otherwise `debug` raises the default level to
/// `debug`, and `verbose >= 2` to `trace`.
pub fn init_logging(debug: bool, verbose: u8) {
    let default = if verbose >= 2 {
        "trace"
    } else if debug || verbose >= 1 {
        "debug"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default)),
        )
        .init();
}
