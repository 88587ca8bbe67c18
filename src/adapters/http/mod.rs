//! HTTP inbound adapter.
//!
//! `POST /run_ai/` takes a multipart form with an `index` and the source
//! image, runs the matching job and forwards the result.

pub mod auth;
pub mod run_ai;

use crate::application::pipeline::PipelineService;
use crate::config::RelayConfig;
use crate::domain::session::Session;
use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{json, Value};
use std::path::PathBuf;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<PipelineService>,
    pub session: Arc<Session>,
    pub api_key: Option<String>,
    pub upload_dir: PathBuf,
    pub output_dir: PathBuf,
    pub target_paths: Arc<Vec<PathBuf>>,
}

impl AppState {
    pub fn new(config: &RelayConfig, pipeline: Arc<PipelineService>) -> Self {
        Self {
            pipeline,
            session: Arc::new(Session::new()),
            api_key: config.api_key.clone(),
            upload_dir: config.upload_dir.clone(),
            output_dir: config.output_dir.clone(),
            target_paths: Arc::new(config.target_paths.clone()),
        }
    }
}

pub fn router(state: AppState, max_upload_bytes: usize) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/run_ai/", post(run_ai::handle))
        .route("/run_ai", post(run_ai::handle))
        .route("/health", get(health))
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}
