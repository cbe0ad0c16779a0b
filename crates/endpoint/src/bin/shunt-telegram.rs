//! shunt-telegram — Telegram endpoint node.
//!
//! Long-polls the Bot API, parses commands, dispatches them over the
//! fabric, and posts worker replies back to the chat.
//!
//! ```bash
//! SHUNT_REDIS_URL=redis://localhost:6379/0 \
//! SHUNT_TELEGRAM_BOT_TOKEN=123456:ABC-DEF \
//! shunt-telegram
//! ```

use std::sync::Arc;

use clap::Parser;

use shunt_context::BaseContext;
use shunt_core::config::load_dotenv;
use shunt_core::Config;
use shunt_endpoint::{ChatGateway, EndpointRuntime, TelegramGateway};
use shunt_fabric::client::BrokerConfig;
use shunt_fabric::msg::MsgProvider;

/// Telegram endpoint node for the shunt dispatch fabric.
#[derive(Parser, Debug)]
#[command(name = "shunt-telegram", version, about)]
struct Cli {
    /// Telegram bot token.
    #[arg(long, env = "SHUNT_TELEGRAM_BOT_TOKEN", hide_env_values = true)]
    bot_token: String,

    /// Long-poll wait in seconds for getUpdates.
    #[arg(long, env = "SHUNT_TELEGRAM_POLL_TIMEOUT", default_value_t = 30)]
    poll_timeout: u64,

    /// Raise log detail.
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Enable debug logging.
    #[arg(long)]
    debug: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    load_dotenv();
    let cli = Cli::parse();

    let config = Config::from_env();
    shunt_core::init_logging(cli.debug || config.debug, cli.verbose.max(config.verbose));
    tracing::info!("starting shunt-telegram");
    config.log_summary();

    let broker = BrokerConfig::from_env();
    let context =
        Arc::new(BaseContext::connect(MsgProvider::Telegram, &config, &broker).await?);

    let runtime = Arc::new(
        EndpointRuntime::new(
            context.fabric(),
            MsgProvider::Telegram,
            &config.dispatch,
            shunt_core::version(),
        )
        .with_uploader(context.uploader())
        .with_verbose(config.verbose),
    );
    runtime.install(&context)?;
    context.open().await?;

    let mut gateway = TelegramGateway::new(cli.bot_token, cli.poll_timeout)?;

    let exit = tokio::select! {
        result = drive(&mut gateway, &runtime) => result,
        _ = shutdown_signal() => {
            tracing::info!("shutdown signal received");
            Ok(())
        }
    };

    context.close().await?;
    tracing::info!("shunt-telegram exited cleanly");
    exit
}

/// Pump provider events through the dispatch core.
async fn drive(
    gateway: &mut TelegramGateway,
    runtime: &Arc<EndpointRuntime>,
) -> anyhow::Result<()> {
    loop {
        let request = match gateway.next_event().await {
            Ok(Some(request)) => request,
            Ok(None) => return Ok(()),
            Err(e) => {
                tracing::warn!(error = %e, "provider poll failed, retrying");
                tokio::time::sleep(std::time::Duration::from_secs(2)).await;
                continue;
            }
        };

        if let Some(response) = runtime.do_message(&request).await {
            if let Err(e) = gateway.send_reply(&request, &response).await {
                tracing::error!(msg_uuid = %request.msg_uuid, error = %e, "failed to post reply");
            }
        }
    }
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
