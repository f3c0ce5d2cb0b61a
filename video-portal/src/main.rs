use dotenvy::dotenv;
use service_core::observability::logging::init_tracing;
use tokio_util::sync::CancellationToken;
use tracing::info;
use video_portal::config::get_configuration;
use video_portal::startup::{build_router, spawn_session_watcher};
use video_portal::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();

    let configuration = get_configuration().map_err(|e| {
        eprintln!("Failed to read configuration: {}", e);
        anyhow::anyhow!("Configuration error: {}", e)
    })?;

    init_tracing(
        "video-portal",
        &configuration.telemetry.log_level,
        configuration.telemetry.otlp_endpoint.as_deref(),
    );

    video_portal::services::metrics::init_metrics();

    let state = AppState::new(&configuration).map_err(|e| {
        tracing::error!("Failed to build API client: {}", e);
        anyhow::anyhow!("Client setup error: {}", e)
    })?;

    let shutdown = CancellationToken::new();
    let watcher = spawn_session_watcher(state.clone(), shutdown.clone());
    let poller = state
        .library
        .clone()
        .spawn_polling(configuration.library.poll_interval(), shutdown.clone());

    let app = build_router(state.clone());

    let address = format!(
        "{}:{}",
        configuration.server.host, configuration.server.port
    );
    let listener = tokio::net::TcpListener::bind(&address).await.map_err(|e| {
        tracing::error!("Failed to bind TCP listener to {}: {}", address, e);
        anyhow::anyhow!("Failed to bind to address {}: {}", address, e)
    })?;

    info!(
        api = %configuration.api.base_url,
        "Starting video-portal on {}", address
    );
    let result = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await;

    shutdown.cancel();
    state.uploads.cancel();
    let _ = tokio::join!(watcher, poller);

    result.map_err(|e| {
        tracing::error!("Server error: {}", e);
        anyhow::anyhow!("Server error: {}", e)
    })
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
