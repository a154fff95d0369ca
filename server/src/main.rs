mod config;
mod routes;
mod services;
mod state;

use tracing::{error, info};

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt::init();

    let port: u16 = config::env_parse("PORT", 3000);

    let config = config::ChatConfig::from_env();
    info!(
        ttl_ms = config.typing_ttl_ms(),
        interval = ?config.expiry_interval,
        connection_buffer = config.connection_buffer,
        "presence configured"
    );
    let state = state::AppState::new(config);

    // Spawn the typing expiry task once, before serving any request.
    let expiry = services::expiry::spawn_expiry_task(state.clone());

    let app = routes::app(state.clone());
    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{port}"))
        .await
        .expect("failed to bind");

    info!(%port, "chat server listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(state))
        .await
        .expect("server failed");

    if let Some(expiry) = expiry {
        expiry.shutdown().await;
    }
    info!("chat server stopped");
}

/// Resolve on ctrl-c, then close every stream so graceful shutdown is not
/// held up by bodies that never end on their own.
async fn shutdown_signal(state: state::AppState) {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    let closed = state.registry.close_all();
    info!(closed, "shutdown: closed streaming connections");
}
