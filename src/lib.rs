//! fusion-relay - FaceFusion job relay
//!
//! Hexagonal Architecture:
//! - domain/: job template drafting, session state
//! - ports/: Trait definitions (tool runner, result forwarder)
//! - adapters/: subprocess runner, HTTP forwarder, filesystem helpers, HTTP API
//! - application/: the draft, run, wait and forward pipeline
//! - config: Environment configuration
//!
//! # Features
//! - `probe`: inspect produced videos with libav (ffmpeg-next) before forwarding

pub mod adapters;
pub mod application;
pub mod config;
pub mod domain;
pub mod error;
pub mod ports;

pub use application::pipeline::{PipelineService, PipelineSettings};
pub use config::RelayConfig;
pub use error::{RelayError, Result};

use std::sync::Arc;

/// Pipeline wired to the real FaceFusion CLI and HTTP forwarder.
pub fn build_pipeline(config: &RelayConfig) -> Result<PipelineService> {
    let runner = Arc::new(adapters::cmd::FaceFusionCli::from_config(config));
    let forwarder = Arc::new(adapters::forward::HttpForwarder::from_config(config)?);
    Ok(PipelineService::new(
        runner,
        forwarder,
        PipelineSettings::from(config),
    ))
}

/// Install the `tracing` subscriber, honouring `RUST_LOG`.
pub fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}
