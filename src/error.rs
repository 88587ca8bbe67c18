use axum::extract::multipart::MultipartError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RelayError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Job file error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Forward request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Invalid job template {path:?}: {message}")]
    Template { path: PathBuf, message: String },

    #[error("{step} failed for job {job_id} (exit code {code:?}): {stderr}")]
    Tool {
        step: &'static str,
        job_id: String,
        code: Option<i32>,
        stderr: String,
    },

    #[error("Output {path:?} not produced within {timeout:?}")]
    OutputTimeout { path: PathBuf, timeout: Duration },

    #[error("Result server answered {status}")]
    Forward { status: u16 },

    #[error("Invalid output video {path:?}: {message}")]
    Probe { path: PathBuf, message: String },

    #[error("Upload rejected: {0}")]
    Upload(#[from] MultipartError),

    #[error("Unauthorized")]
    Unauthorized,

    #[error("{0}")]
    BadRequest(String),
}

pub type Result<T> = std::result::Result<T, RelayError>;

impl RelayError {
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Unauthorized => StatusCode::FORBIDDEN,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Upload(e) => e.status(),
            Self::OutputTimeout { .. } => StatusCode::GATEWAY_TIMEOUT,
            Self::Http(_) | Self::Forward { .. } => StatusCode::BAD_GATEWAY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for RelayError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!("request failed: {}", self);
        }
        (status, Json(json!({ "detail": self.to_string() }))).into_response()
    }
}
