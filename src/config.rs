//! Configuration for the relay server and the job CLI.

use crate::domain::job::{ExecutionSettings, FaceSettings};
use crate::error::{RelayError, Result};
use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// Everything needed to stage, run and forward a FaceFusion job.
#[derive(Clone, Debug)]
pub struct RelayConfig {
    /// HTTP server bind address
    pub addr: String,
    /// HTTP server port
    pub port: String,
    /// Where finished videos are posted
    pub upload_url: String,
    /// Shared secret expected in `X-API-KEY`, and sent when forwarding
    pub api_key: Option<String>,
    /// Source images received from clients
    pub upload_dir: PathBuf,
    /// Videos produced by the tool
    pub output_dir: PathBuf,
    /// Working directory of the FaceFusion checkout
    pub facefusion_dir: PathBuf,
    pub facefusion_script: String,
    pub python_bin: String,
    pub job_template: PathBuf,
    pub drafted_dir: PathBuf,
    /// Target videos, addressed by the request `index`
    pub target_paths: Vec<PathBuf>,
    pub face: FaceSettings,
    pub execution: ExecutionSettings,
    pub job_id_length: usize,
    pub max_concurrent_jobs: usize,
    pub output_wait: Duration,
    pub forward_timeout: Duration,
    pub max_upload_bytes: usize,
}

impl RelayConfig {
    /// Load configuration from environment variables (and `.env`).
    pub fn from_env() -> Result<Self> {
        dotenv::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build configuration from any key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let upload_url = match get("MAIN_SERVER_UPLOAD_URL") {
            Some(url) => url,
            None => {
                let host = get("MAIN_SERVER_IP_URL").ok_or_else(|| {
                    RelayError::config("MAIN_SERVER_IP_URL environment variable is not set")
                })?;
                let port = get("MAIN_SERVER_PORT").unwrap_or_else(|| String::from("8000"));
                format!("http://{}:{}/upload_result/", host, port)
            }
        };

        let facefusion_dir = PathBuf::from(
            get("FACEFUSION_DIR").unwrap_or_else(|| String::from("facefusion")),
        );
        let job_template = get("JOB_TEMPLATE")
            .map(PathBuf::from)
            .unwrap_or_else(|| facefusion_dir.join(".jobs").join("queued").join("basic.json"));
        let drafted_dir = get("DRAFTED_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|| facefusion_dir.join(".jobs").join("drafted"));

        let target_paths: Vec<PathBuf> = split_list(
            &get("TARGET_PATHS").unwrap_or_else(|| String::from("target.mp4")),
        )
        .into_iter()
        .map(PathBuf::from)
        .collect();
        if target_paths.is_empty() {
            return Err(RelayError::config("TARGET_PATHS must list at least one video"));
        }

        let processors = match lookup("PROCESSORS") {
            Some(list) => split_list(&list),
            None => vec![String::from("face_swapper"), String::from("face_enhancer")],
        };

        let face = FaceSettings {
            processors,
            face_swapper_model: model(&lookup, "FACE_SWAPPER_MODEL", "inswapper_128_fp16"),
            face_enhancer_model: model(&lookup, "FACE_ENHANCER_MODEL", "gfpgan_1.4"),
            face_detector_model: model(&lookup, "FACE_DETECTOR_MODEL", "scrfd"),
        };

        let execution = ExecutionSettings {
            device_id: parse(&get, "EXECUTION_DEVICE_ID")?,
            providers: match lookup("EXECUTION_PROVIDERS") {
                Some(v) if v.trim().is_empty() => None,
                Some(v) => Some(v.trim().to_string()),
                None => Some(String::from("cuda")),
            },
            thread_count: parse(&get, "EXECUTION_THREAD_COUNT")?,
            queue_count: parse(&get, "EXECUTION_QUEUE_COUNT")?,
        };

        let job_id_length: usize = parse(&get, "JOB_ID_LENGTH")?.unwrap_or(32);
        if !(1..=32).contains(&job_id_length) {
            return Err(RelayError::config("JOB_ID_LENGTH must be between 1 and 32"));
        }

        let max_concurrent_jobs: usize = parse(&get, "MAX_CONCURRENT_JOBS")?.unwrap_or(1);
        if max_concurrent_jobs == 0 {
            return Err(RelayError::config("MAX_CONCURRENT_JOBS must be at least 1"));
        }

        Ok(Self {
            addr: get("ADDR").unwrap_or_else(|| String::from("127.0.0.1")),
            port: get("PORT").unwrap_or_else(|| String::from("3000")),
            upload_url,
            api_key: get("API_KEY"),
            upload_dir: PathBuf::from(get("UPLOAD_DIR").unwrap_or_else(|| String::from("uploads/"))),
            output_dir: PathBuf::from(get("OUTPUT_DIR").unwrap_or_else(|| String::from("outputs/"))),
            facefusion_dir,
            facefusion_script: get("FACEFUSION_SCRIPT")
                .unwrap_or_else(|| String::from("facefusion.py")),
            python_bin: get("PYTHON_BIN").unwrap_or_else(|| String::from("python")),
            job_template,
            drafted_dir,
            target_paths,
            face,
            execution,
            job_id_length,
            max_concurrent_jobs,
            output_wait: Duration::from_secs(parse(&get, "OUTPUT_WAIT_SECS")?.unwrap_or(300)),
            forward_timeout: Duration::from_secs(
                parse(&get, "FORWARD_TIMEOUT_SECS")?.unwrap_or(200),
            ),
            max_upload_bytes: parse(&get, "MAX_UPLOAD_BYTES")?.unwrap_or(50 * 1024 * 1024),
        })
    }

    /// Create the upload and output directories.
    pub async fn ensure_dirs(&self) -> Result<()> {
        tokio::fs::create_dir_all(&self.upload_dir).await?;
        tokio::fs::create_dir_all(&self.output_dir).await?;
        Ok(())
    }

    /// Output location for the target at `index`.
    pub fn output_path(&self, index: usize) -> PathBuf {
        self.output_dir.join(format!("output_{}.mp4", index))
    }
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

// Unset falls back to the default, an empty value keeps the template's model.
fn model<F>(lookup: &F, key: &str, default: &str) -> Option<String>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        None => Some(default.to_string()),
        Some(v) if v.trim().is_empty() => None,
        Some(v) => Some(v.trim().to_string()),
    }
}

fn parse<T, F>(get: &F, key: &str) -> Result<Option<T>>
where
    T: FromStr,
    F: Fn(&str) -> Option<String>,
{
    match get(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| RelayError::config(format!("{} has an invalid value: {}", key, raw))),
        None => Ok(None),
    }
}
