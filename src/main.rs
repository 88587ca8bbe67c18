//! Relay server - accepts source images, runs FaceFusion jobs and forwards the videos.

use fusion_relay::adapters::http::{router, AppState};
use fusion_relay::{build_pipeline, init_tracing, RelayConfig};
use std::sync::Arc;

#[tokio::main]
async fn main() {
    init_tracing();

    let config = match RelayConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            tracing::error!("{}", e);
            std::process::exit(1);
        }
    };

    if let Err(e) = serve(config).await {
        tracing::error!("Server failed: {}", e);
        std::process::exit(1);
    }
}

async fn serve(config: RelayConfig) -> fusion_relay::Result<()> {
    config.ensure_dirs().await?;

    let pipeline = Arc::new(build_pipeline(&config)?);
    let state = AppState::new(&config, pipeline);
    let app = router(state, config.max_upload_bytes);

    let listener = tokio::net::TcpListener::bind(format!("{}:{}", config.addr, config.port)).await?;
    tracing::info!(
        "Listening at {}:{}, forwarding results to {}",
        config.addr,
        config.port,
        config.upload_url
    );
    axum::serve(listener, app).await?;
    Ok(())
}
