mod routes;
mod state;

use anyhow::{Context, Result};
use core_runtime::config::{load_dotenv, BrokerConfig};
use core_runtime::logging::{init_logging, LogFormat, LoggingConfig};
use core_service::BrokerService;
use std::net::SocketAddr;
use tracing::info;

use crate::state::{AppState, DEFAULT_FRONTEND_URL, DEFAULT_PORT};

fn logging_from_env() -> Result<LoggingConfig> {
    let mut logging = LoggingConfig::default();
    if let Ok(format) = std::env::var("LOG_FORMAT") {
        logging = logging.with_format(format.parse::<LogFormat>()?);
    }
    if let Ok(filter) = std::env::var("RUST_LOG") {
        logging = logging.with_filter(filter);
    }
    Ok(logging)
}

fn port_from_env() -> Result<u16> {
    match std::env::var("PORT") {
        Ok(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("PORT must be a port number, got '{}'", raw)),
        Err(_) => Ok(DEFAULT_PORT),
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for ctrl-c");
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    load_dotenv();
    init_logging(logging_from_env()?)?;

    let config = BrokerConfig::builder().with_env()?.build()?;
    let service = BrokerService::start(config).await?;

    let frontend_url =
        std::env::var("FRONTEND_URL").unwrap_or_else(|_| DEFAULT_FRONTEND_URL.to_string());
    let app = routes::app(AppState::new(service.clone(), frontend_url));

    let host = if std::env::var("BIND_ALL").is_ok() {
        [0, 0, 0, 0]
    } else {
        [127, 0, 0, 1]
    };
    let addr = SocketAddr::from((host, port_from_env()?));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    info!(addr = %addr, "broker-server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    service.shutdown().await;
    Ok(())
}
