//! shunt-master — HTTP surface over the dispatch fabric.
//!
//! Reuses the endpoint dispatch core: commands POSTed to `/msg` are
//! forwarded to workers exactly like chat commands, with the same
//! correlation, expiry, and timeout rules.
//!
//! ```bash
//! SHUNT_REDIS_URL=redis://localhost:6379/0 shunt-master --port 8080
//! curl -X POST localhost:8080/msg -H 'content-type: application/json' \
//!      -d '{"content": "/echo hello"}'
//! ```

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use clap::Parser;
use serde::{Deserialize, Serialize};

use shunt_context::BaseContext;
use shunt_core::config::load_dotenv;
use shunt_core::Config;
use shunt_endpoint::EndpointRuntime;
use shunt_fabric::client::BrokerConfig;
use shunt_fabric::msg::{MsgProvider, MsgRequest};

/// Master node: HTTP API over the shunt dispatch fabric.
#[derive(Parser, Debug)]
#[command(name = "shunt-master", version, about)]
struct Cli {
    /// Bind address.
    #[arg(long, env = "SHUNT_MASTER_HOST", default_value = "0.0.0.0")]
    host: String,

    /// Bind port.
    #[arg(long, env = "SHUNT_MASTER_PORT", default_value_t = 8080)]
    port: u16,

    /// Raise log detail.
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Enable debug logging.
    #[arg(long)]
    debug: bool,
}

#[derive(Clone)]
struct AppState {
    context: Arc<BaseContext>,
    runtime: Arc<EndpointRuntime>,
}

#[derive(Debug, Deserialize)]
struct MsgBody {
    content: String,
    #[serde(default)]
    username: Option<String>,
    #[serde(default)]
    nickname: Option<String>,
}

#[derive(Debug, Serialize)]
struct MsgReply {
    msg_uuid: String,
    content: Option<String>,
    error: Option<String>,
    reply: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    load_dotenv();
    let cli = Cli::parse();

    let config = Config::from_env();
    shunt_core::init_logging(cli.debug || config.debug, cli.verbose.max(config.verbose));
    tracing::info!("starting shunt-master");
    config.log_summary();

    let broker = BrokerConfig::from_env();
    let context = Arc::new(BaseContext::connect(MsgProvider::Master, &config, &broker).await?);

    let runtime = Arc::new(
        EndpointRuntime::new(
            context.fabric(),
            MsgProvider::Master,
            &config.dispatch,
            shunt_core::version(),
        )
        .with_uploader(context.uploader())
        .with_verbose(config.verbose),
    );
    runtime.install(&context)?;
    context.open().await?;

    let state = AppState {
        context: context.clone(),
        runtime,
    };
    let app = Router::new()
        .route("/health", get(health))
        .route("/version", get(version))
        .route("/msg", post(msg))
        .with_state(state);

    let addr = format!("{}:{}", cli.host, cli.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(addr = %addr, "HTTP surface bound");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    context.close().await?;
    tracing::info!("shunt-master exited cleanly");
    Ok(())
}

async fn health(State(state): State<AppState>) -> StatusCode {
    let healthy = state
        .context
        .fabric()
        .ping(Some(std::time::Duration::from_secs(2)))
        .await;
    if healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    }
}

async fn version() -> &'static str {
    shunt_core::version()
}

async fn msg(
    State(state): State<AppState>,
    Json(body): Json<MsgBody>,
) -> Result<Json<MsgReply>, StatusCode> {
    let mut request = MsgRequest::new(MsgProvider::Master, body.content);
    request.username = body.username;
    request.nickname = body.nickname;

    let response = state
        .runtime
        .do_message(&request)
        .await
        .ok_or(StatusCode::NOT_FOUND)?;

    Ok(Json(MsgReply {
        msg_uuid: response.msg_uuid.clone(),
        content: response.content.clone(),
        error: response.error.clone(),
        reply: response.reply_content().to_string(),
    }))
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
