use crate::error::{RelayError, Result};
use serde::{Deserialize, Serialize};
use serde_json::ser::PrettyFormatter;
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};

/// Processors and models written into a drafted job.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FaceSettings {
    pub processors: Vec<String>,
    pub face_swapper_model: Option<String>,
    pub face_enhancer_model: Option<String>,
    pub face_detector_model: Option<String>,
}

/// Flags passed to `job-run`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExecutionSettings {
    pub device_id: Option<u32>,
    pub providers: Option<String>,
    pub thread_count: Option<u32>,
    pub queue_count: Option<u32>,
}

impl ExecutionSettings {
    /// Command line flags in the order the tool documents them.
    pub fn to_args(&self) -> Vec<String> {
        let mut args = Vec::new();
        if let Some(id) = self.device_id {
            args.push(String::from("--execution-device-id"));
            args.push(id.to_string());
        }
        if let Some(providers) = &self.providers {
            args.push(String::from("--execution-providers"));
            args.push(providers.clone());
        }
        if let Some(count) = self.thread_count {
            args.push(String::from("--execution-thread-count"));
            args.push(count.to_string());
        }
        if let Some(count) = self.queue_count {
            args.push(String::from("--execution-queue-count"));
            args.push(count.to_string());
        }
        args
    }
}

/// Paths and settings for one drafted job.
#[derive(Debug, Clone)]
pub struct JobRequest {
    pub source_path: PathBuf,
    pub target_path: PathBuf,
    pub output_path: PathBuf,
    pub face: FaceSettings,
}

/// Random hex job id, `len` characters long (at most 32).
pub fn new_job_id(len: usize) -> String {
    let mut id = uuid::Uuid::new_v4().simple().to_string();
    id.truncate(len.clamp(1, 32));
    id
}

/// Copy the template into `drafted_dir/<job_id>.json` with the request's
/// paths and settings filled into the first step.
pub async fn draft_job(
    template: &Path,
    drafted_dir: &Path,
    job_id: &str,
    request: &JobRequest,
) -> Result<PathBuf> {
    let raw = tokio::fs::read_to_string(template)
        .await
        .map_err(|e| RelayError::Template {
            path: template.to_path_buf(),
            message: e.to_string(),
        })?;
    let mut job: Value = serde_json::from_str(&raw).map_err(|e| RelayError::Template {
        path: template.to_path_buf(),
        message: e.to_string(),
    })?;

    let resolved = JobRequest {
        source_path: absolutize(&request.source_path)?,
        target_path: absolutize(&request.target_path)?,
        output_path: absolutize(&request.output_path)?,
        face: request.face.clone(),
    };
    apply_request(&mut job, &resolved).map_err(|message| RelayError::Template {
        path: template.to_path_buf(),
        message,
    })?;

    tokio::fs::create_dir_all(drafted_dir).await?;
    let job_path = drafted_dir.join(format!("{}.json", job_id));
    tokio::fs::write(&job_path, to_pretty_json(&job)?).await?;

    tracing::info!("Job file created at {:?}", job_path);
    Ok(job_path)
}

/// Overwrite the keys of `steps[0].args` this service owns.
fn apply_request(job: &mut Value, request: &JobRequest) -> std::result::Result<(), String> {
    let args = job
        .get_mut("steps")
        .and_then(Value::as_array_mut)
        .and_then(|steps| steps.first_mut())
        .and_then(|step| step.get_mut("args"))
        .and_then(Value::as_object_mut)
        .ok_or_else(|| String::from("missing steps[0].args object"))?;

    let source = path_value(&request.source_path);
    let has_source = args
        .get("source_paths")
        .and_then(Value::as_array)
        .is_some_and(|paths| !paths.is_empty());
    if has_source {
        args["source_paths"][0] = source;
    } else {
        args.insert(String::from("source_paths"), Value::Array(vec![source]));
    }
    args.insert(String::from("target_path"), path_value(&request.target_path));
    args.insert(String::from("output_path"), path_value(&request.output_path));

    let face = &request.face;
    if !face.processors.is_empty() {
        args.insert(
            String::from("processors"),
            Value::Array(face.processors.iter().cloned().map(Value::String).collect()),
        );
    }
    set_model(args, "face_swapper_model", &face.face_swapper_model);
    set_model(args, "face_enhancer_model", &face.face_enhancer_model);
    set_model(args, "face_detector_model", &face.face_detector_model);
    Ok(())
}

fn set_model(args: &mut Map<String, Value>, key: &str, model: &Option<String>) {
    if let Some(model) = model {
        args.insert(key.to_string(), Value::String(model.clone()));
    }
}

fn path_value(path: &Path) -> Value {
    Value::String(path.to_string_lossy().into_owned())
}

fn absolutize(path: &Path) -> Result<PathBuf> {
    if path.is_absolute() {
        Ok(path.to_path_buf())
    } else {
        Ok(std::env::current_dir()?.join(path))
    }
}

fn to_pretty_json(value: &Value) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    let mut ser = serde_json::Serializer::with_formatter(&mut buf, PrettyFormatter::with_indent(b"    "));
    value.serialize(&mut ser)?;
    Ok(buf)
}
