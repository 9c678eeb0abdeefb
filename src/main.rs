use std::sync::Arc;
use std::time::Duration;

use offer_tracker::api;
use offer_tracker::client::http::HttpOrderApi;
use offer_tracker::config::Config;
use offer_tracker::engine::tracker::TrackerHandle;
use offer_tracker::error::AppError;
use offer_tracker::observability::metrics::Metrics;
use offer_tracker::state::AppState;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), AppError> {
    let config = Config::from_env()?;

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(config.log_level.clone()))
        .with_target(false)
        .compact()
        .init();

    let orders_api = HttpOrderApi::new(
        &config.orders_api_url,
        config.orders_api_token.clone(),
        Duration::from_secs(config.http_timeout_secs),
    )
    .map_err(|err| AppError::Internal(format!("failed to build orders client: {err}")))?;

    let metrics = Metrics::new();
    let tracker = TrackerHandle::spawn(Arc::new(orders_api), config.tracker.clone(), metrics.clone());

    if config.start_online {
        tracker.set_online(true).await?;
    }

    let shared_state = Arc::new(AppState::new(tracker.clone(), metrics));
    let app = api::rest::router(shared_state);

    let bind_addr = format!("0.0.0.0:{}", config.http_port);
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .map_err(|err| AppError::Internal(format!("failed to bind {bind_addr}: {err}")))?;

    tracing::info!(
        http_port = config.http_port,
        orders_api = %config.orders_api_url,
        "http server started"
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|err| AppError::Internal(format!("server error: {err}")))?;

    tracker.shutdown().await;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "failed to listen for shutdown signal");
    }
}
