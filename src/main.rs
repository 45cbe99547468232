use axum::Router;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use step_relay::{config::RelayConfig, routes, state::AppState};

#[tokio::main]
async fn main() {
    // .env is optional; a malformed one is worth a warning
    if let Err(e) = dotenvy::dotenv() {
        if !matches!(e, dotenvy::Error::Io(_)) {
            eprintln!("Warning: Failed to load .env file: {}", e);
        }
    }

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "step_relay=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting step relay...");

    let config = RelayConfig::from_env();
    if config.echo_automation_steps {
        tracing::info!("Automation results will be relayed as steps");
    }

    let http_addr = config.http_addr();
    let ws_addr = config.ws_addr();
    let state = Arc::new(AppState::from_config(config));

    let http = serve(http_addr, routes::http_router(state.clone()), "HTTP");
    let native = serve(ws_addr, routes::ws_router(state), "WebSocket");

    tokio::select! {
        result = http => {
            if let Err(e) = result {
                tracing::error!("HTTP server failed: {}", e);
            }
        }
        result = native => {
            if let Err(e) = result {
                tracing::error!("WebSocket server failed: {}", e);
            }
        }
    }
    std::process::exit(1);
}

async fn serve(addr: SocketAddr, app: Router, label: &str) -> std::io::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("{} listening on {}", label, addr);
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await
}
