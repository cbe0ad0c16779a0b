//! shunt-worker — hosts a pluggable command module against the fabric.
//!
//! # Usage
//!
//! ```bash
//! # Host the default module
//! SHUNT_REDIS_URL=redis://localhost:6379/0 shunt-worker --module-path default
//!
//! # Host the gpt module with trailing module options
//! shunt-worker --module-path gpt -- --openai-api-key sk-...
//! ```

use std::sync::Arc;

use clap::Parser;

use shunt_context::{BaseContext, SubscribeHandler};
use shunt_core::config::load_dotenv;
use shunt_core::Config;
use shunt_fabric::client::BrokerConfig;
use shunt_fabric::msg::MsgProvider;
use shunt_fabric::paths::{BROADCAST_PATH, REGISTER_WORKER_REQUEST_PATH};
use shunt_worker::{ModuleContext, ModuleRegistry, WorkerRuntime};

/// Worker node: poll a request queue and run a command module.
#[derive(Parser, Debug)]
#[command(name = "shunt-worker", version, about)]
struct Cli {
    /// Module to host (a registry path, e.g. "default" or "gpt").
    #[arg(long, env = "SHUNT_MODULE_PATH")]
    module_path: String,

    /// Isolate the module load from the shared namespace.
    #[arg(long, env = "SHUNT_MODULE_ISOLATE", default_value_t = false)]
    module_isolate: bool,

    /// Node identity for membership traffic.
    #[arg(long, env = "SHUNT_PROVIDER", default_value = "worker")]
    provider: MsgProvider,

    /// Raise log detail.
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Enable debug logging.
    #[arg(long)]
    debug: bool,

    /// Free-form options passed to the module's init hook.
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    opts: Vec<String>,
}

impl Cli {
    /// Options after a leading `--` separator, if present.
    fn module_arguments(&self) -> &[String] {
        match self.opts.first() {
            Some(first) if first == "--" => &self.opts[1..],
            _ => &self.opts,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    load_dotenv();
    let cli = Cli::parse();

    let config = Config::from_env();
    shunt_core::init_logging(cli.debug || config.debug, cli.verbose.max(config.verbose));
    tracing::info!(module = %cli.module_path, "starting shunt-worker");
    config.log_summary();

    let broker = BrokerConfig::from_env();

    // Load and initialize the module before touching the network.
    let registry = ModuleRegistry::with_builtins();
    let mut host = registry.load(&cli.module_path, cli.module_isolate)?;
    host.init(cli.module_arguments())?;

    let context = Arc::new(BaseContext::connect(cli.provider, &config, &broker).await?);
    let runtime = Arc::new(WorkerRuntime::new(
        context.fabric(),
        host,
        broker.blocking_timeout,
        broker.expire_medium,
    ));

    context.add_subscribe_handler(
        BROADCAST_PATH,
        SubscribeHandler::sync(|data| {
            tracing::debug!(bytes = data.len(), "broadcast received");
            Ok(())
        }),
    )?;

    // A register-request from any endpoint re-announces this worker.
    {
        let runtime = runtime.clone();
        context.add_subscribe_handler(
            REGISTER_WORKER_REQUEST_PATH,
            SubscribeHandler::asynchronous(move |data| {
                let runtime = runtime.clone();
                async move {
                    tracing::info!(
                        requester = %String::from_utf8_lossy(&data),
                        "register request received"
                    );
                    runtime.publish_descriptor().await?;
                    Ok(())
                }
            }),
        )?;
    }

    {
        let runtime = runtime.clone();
        context.set_on_connect(Arc::new(move || {
            let runtime = runtime.clone();
            Box::pin(async move {
                runtime.publish_descriptor().await?;
                Ok(())
            })
        }));
    }

    context.open().await?;
    runtime
        .open_module(Arc::new(ModuleContext::from_base(&context)))
        .await?;

    let exit = tokio::select! {
        result = runtime.poll_loop() => result.map_err(Into::into),
        _ = shutdown_signal() => {
            tracing::info!("shutdown signal received");
            Ok(())
        }
    };

    runtime.shutdown().await;
    context.close().await?;

    tracing::info!("shunt-worker exited cleanly");
    exit
}

/// Wait for SIGINT or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();

    #[cfg(unix)]
    {
        let mut sigterm =
            tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
                .expect("failed to register SIGTERM handler");
        tokio::select! {
            _ = ctrl_c => {},
            _ = sigterm.recv() => {},
        }
    }

    #[cfg(not(unix))]
    {
        ctrl_c.await.expect("failed to listen for ctrl_c");
    }
}
