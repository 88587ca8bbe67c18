use super::auth::verify_api_key;
use super::AppState;
use crate::adapters::fs::{remove_if_exists, sanitize_file_name, stream_to_file};
use crate::domain::job::new_job_id;
use crate::error::{RelayError, Result};
use axum::extract::multipart::MultipartError;
use axum::extract::{Multipart, State};
use axum::http::HeaderMap;
use axum::Json;
use serde_json::{json, Value};
use std::path::{Path, PathBuf};

/// Index a client sends once it has nothing more to process.
pub const DONE_INDEX: i64 = -1;

/// Upload written to a scratch name until we know whether it becomes the source.
#[derive(Debug)]
struct StagedUpload {
    staging: PathBuf,
    file_name: String,
}

#[derive(Debug, Default)]
struct RunAiForm {
    index: Option<String>,
    upload: Option<StagedUpload>,
}

impl RunAiForm {
    async fn read(multipart: &mut Multipart, upload_dir: &Path) -> Result<Self> {
        let mut form = RunAiForm::default();
        while let Some(field) = multipart.next_field().await? {
            let name = field.name().map(str::to_owned);
            match name.as_deref() {
                Some("index") => {
                    form.index = Some(field.text().await?);
                }
                Some("file") => {
                    // browsers send an empty part when no file was picked
                    let file_name = match field.file_name() {
                        Some(name) if !name.is_empty() => sanitize_file_name(name),
                        _ => continue,
                    };
                    let staging = upload_dir.join(format!(".incoming-{}", new_job_id(32)));
                    if let Err(e) = stream_to_file(&staging, field).await {
                        remove_if_exists(&staging).await.ok();
                        return Err(upload_failure(e));
                    }
                    if let Some(previous) = form.upload.replace(StagedUpload { staging, file_name }) {
                        remove_if_exists(&previous.staging).await.ok();
                    }
                }
                _ => continue,
            }
        }
        Ok(form)
    }
}

/// A failed file write may wrap the multipart error (e.g. body over the
/// size limit); surface it so the client gets its status.
fn upload_failure(error: RelayError) -> RelayError {
    match error {
        RelayError::Io(e) if e.get_ref().is_some_and(|inner| inner.is::<MultipartError>()) => {
            match e.into_inner().map(|inner| inner.downcast::<MultipartError>()) {
                Some(Ok(multipart)) => RelayError::Upload(*multipart),
                _ => RelayError::BadRequest(String::from("upload failed")),
            }
        }
        other => other,
    }
}

fn parse_index(raw: Option<&str>) -> Result<i64> {
    let raw = raw.ok_or_else(|| RelayError::BadRequest(String::from("index is required")))?;
    raw.trim()
        .parse()
        .map_err(|_| RelayError::BadRequest(String::from("index must be an integer")))
}

pub async fn handle(
    State(state): State<AppState>,
    headers: HeaderMap,
    mut multipart: Multipart,
) -> Result<Json<Value>> {
    verify_api_key(&headers, state.api_key.as_deref())?;

    let form = RunAiForm::read(&mut multipart, &state.upload_dir).await?;
    let result = dispatch(&state, form.index.as_deref(), form.upload.as_ref()).await;

    // an adopted upload has been renamed away already
    if let Some(upload) = &form.upload {
        remove_if_exists(&upload.staging).await.ok();
    }
    result.map(Json)
}

async fn dispatch(state: &AppState, index: Option<&str>, upload: Option<&StagedUpload>) -> Result<Value> {
    let index = parse_index(index)?;

    if index == DONE_INDEX {
        if let Some(source) = state.session.reset().await {
            tracing::info!("DONE signal received, releasing source {:?}. Going idle", source);
        } else {
            tracing::info!("DONE signal received. Going idle");
        }
        return Ok(json!({ "status": "idle" }));
    }

    let upload = upload.ok_or_else(|| {
        RelayError::BadRequest(String::from("File is required for processing."))
    })?;

    let staging = &upload.staging;
    let destination = &state.upload_dir.join(&upload.file_name);
    let (source, adopted) = state
        .session
        .adopt_with(move || async move {
            tokio::fs::rename(staging, destination).await?;
            Ok::<_, RelayError>(destination.clone())
        })
        .await?;
    if adopted {
        tracing::info!("Source image saved at {:?}", source);
    }
    tracing::info!("index number is {}", index);

    let slot = usize::try_from(index)
        .ok()
        .filter(|&i| i < state.target_paths.len())
        .ok_or_else(|| RelayError::BadRequest(String::from("Invalid index.")))?;

    let target = &state.target_paths[slot];
    let output = state.output_dir.join(format!("output_{}.mp4", slot));

    state.pipeline.process(&source, target, &output).await?;

    Ok(json!({ "status": format!("completed index {}", index) }))
}
