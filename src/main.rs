use std::net::SocketAddr;
use std::sync::Arc;

use axum::{Router, routing::get};
use jamlink::common::logger;
use jamlink::common::types::AnyResult;
use jamlink::configs::Config;
use jamlink::server::AppState;
use jamlink::transport;
use tower_http::cors::CorsLayer;
use tracing::info;

#[tokio::main]
async fn main() -> AnyResult<()> {
    let config = Config::load()?;
    logger::init(&config);

    info!(
        "jamlink {} (commit {})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_COMMIT")
    );

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;
    let shared_state = Arc::new(AppState::new(config));

    let app = Router::new()
        .route("/ws", get(transport::websocket_server::websocket_handler))
        .with_state(shared_state)
        .layer(CorsLayer::permissive())
        .layer(tower_http::trace::TraceLayer::new_for_http());

    info!("Jam relay listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
    }
    info!("Shutting down");
}
