#![cfg(unix)]

use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use fusion_relay::adapters::http::{router, AppState};
use fusion_relay::{build_pipeline, RelayConfig};
use httpmock::prelude::*;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;
use tower::ServiceExt;

const BOUNDARY: &str = "----relay-integration";

/// Lay out a fake FaceFusion checkout whose "interpreter" is `sh`.
fn fake_facefusion(dir: &Path, script_body: &str) -> HashMap<String, String> {
    let tool_dir = dir.join("facefusion");
    let queued = tool_dir.join(".jobs").join("queued");
    std::fs::create_dir_all(&queued).unwrap();
    std::fs::write(
        queued.join("basic.json"),
        json!({
            "version": "1",
            "steps": [{
                "args": {
                    "source_paths": ["placeholder.png"],
                    "target_path": "placeholder.mp4",
                    "output_path": "placeholder_out.mp4",
                    "output_video_fps": 25
                },
                "status": "drafted"
            }]
        })
        .to_string(),
    )
    .unwrap();
    std::fs::write(tool_dir.join("fake_facefusion.sh"), script_body).unwrap();

    let mut vars = HashMap::new();
    let mut set = |k: &str, v: String| {
        vars.insert(k.to_string(), v);
    };
    set("FACEFUSION_DIR", tool_dir.display().to_string());
    set("FACEFUSION_SCRIPT", String::from("fake_facefusion.sh"));
    set("PYTHON_BIN", String::from("sh"));
    set("UPLOAD_DIR", dir.join("uploads").display().to_string());
    set("OUTPUT_DIR", dir.join("outputs").display().to_string());
    set("TARGET_PATHS", String::from("/videos/target1.mp4,/videos/target2.mp4"));
    set("EXECUTION_PROVIDERS", String::from("cpu"));
    set("API_KEY", String::from("secret"));
    set("OUTPUT_WAIT_SECS", String::from("2"));
    set("JOB_ID_LENGTH", String::from("5"));
    vars
}

async fn app(vars: HashMap<String, String>) -> (axum::Router, AppState) {
    let config = RelayConfig::from_lookup(|key| vars.get(key).cloned()).unwrap();
    config.ensure_dirs().await.unwrap();
    let pipeline = Arc::new(build_pipeline(&config).unwrap());
    let state = AppState::new(&config, pipeline);
    (router(state.clone(), config.max_upload_bytes), state)
}

fn run_ai_request(index: &str, file: Option<(&str, &str)>) -> Request<Body> {
    let mut body = format!(
        "--{}\r\nContent-Disposition: form-data; name=\"index\"\r\n\r\n{}\r\n",
        BOUNDARY, index
    );
    if let Some((name, content)) = file {
        body.push_str(&format!(
            "--{}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"{}\"\r\nContent-Type: image/png\r\n\r\n{}\r\n",
            BOUNDARY, name, content
        ));
    }
    body.push_str(&format!("--{}--\r\n", BOUNDARY));

    Request::builder()
        .method("POST")
        .uri("/run_ai/")
        .header("x-api-key", "secret")
        .header(
            "content-type",
            format!("multipart/form-data; boundary={}", BOUNDARY),
        )
        .body(Body::from(body))
        .unwrap()
}

async fn call(app: axum::Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, serde_json::from_slice(&bytes).unwrap())
}

#[tokio::test]
#[cfg_attr(feature = "probe", ignore)]
async fn test_upload_runs_tool_and_forwards_result() {
    let dir = TempDir::new().unwrap();
    let log = dir.path().join("tool.log");
    let output = dir.path().join("outputs").join("output_1.mp4");
    let script = format!(
        "case \"$1\" in\n  job-submit) echo \"$*\" >> '{log}' ;;\n  job-run) echo \"$*\" >> '{log}'; printf 'fake video' > '{out}' ;;\n  *) exit 3 ;;\nesac\n",
        log = log.display(),
        out = output.display()
    );

    let server = MockServer::start_async().await;
    let upload = server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/upload_result/")
                .header("x-api-key", "secret")
                .body_contains("filename=\"output_1.mp4\"")
                .body_contains("fake video");
            then.status(200).json_body(json!({ "ok": true }));
        })
        .await;

    let mut vars = fake_facefusion(dir.path(), &script);
    vars.insert(
        String::from("MAIN_SERVER_UPLOAD_URL"),
        server.url("/upload_result/"),
    );
    let (app, state) = app(vars).await;

    let (status, body) = call(app, run_ai_request("1", Some(("face.png", "png bytes")))).await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(body["status"], "completed index 1");
    upload.assert_async().await;

    // tool saw submit then run, with the execution flags
    let calls = std::fs::read_to_string(&log).unwrap();
    let lines: Vec<&str> = calls.lines().collect();
    assert_eq!(lines.len(), 2);
    assert!(lines[0].starts_with("job-submit "));
    assert!(lines[1].starts_with("job-run "));
    assert!(lines[1].ends_with("--execution-providers cpu"));

    // drafted job points at the stored source and the chosen target
    let job_id = lines[0].trim_start_matches("job-submit ").trim();
    let drafted = dir
        .path()
        .join("facefusion/.jobs/drafted")
        .join(format!("{}.json", job_id));
    let job: Value = serde_json::from_str(&std::fs::read_to_string(drafted).unwrap()).unwrap();
    let args = &job["steps"][0]["args"];
    assert_eq!(
        args["source_paths"][0],
        dir.path().join("uploads/face.png").display().to_string()
    );
    assert_eq!(args["target_path"], "/videos/target2.mp4");
    assert_eq!(args["output_path"], output.display().to_string());
    assert_eq!(args["processors"], json!(["face_swapper", "face_enhancer"]));
    assert_eq!(args["face_swapper_model"], "inswapper_128_fp16");
    assert_eq!(args["output_video_fps"], 25);

    assert_eq!(
        state.session.source().await,
        Some(dir.path().join("uploads/face.png"))
    );
}

#[tokio::test]
async fn test_failing_tool_is_reported() {
    let dir = TempDir::new().unwrap();
    let script = "echo 'no CUDA device' >&2\nexit 1\n";

    let server = MockServer::start_async().await;
    let upload = server
        .mock_async(|when, then| {
            when.method(POST).path("/upload_result/");
            then.status(200);
        })
        .await;

    let mut vars = fake_facefusion(dir.path(), script);
    vars.insert(
        String::from("MAIN_SERVER_UPLOAD_URL"),
        server.url("/upload_result/"),
    );
    let (app, _) = app(vars).await;

    let (status, body) = call(app, run_ai_request("0", Some(("face.png", "png")))).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    let detail = body["detail"].as_str().unwrap();
    assert!(detail.contains("job-submit failed"));
    assert!(detail.contains("no CUDA device"));
    upload.assert_hits_async(0).await;
}

#[tokio::test]
async fn test_done_signal_then_new_source() {
    let dir = TempDir::new().unwrap();
    let mut vars = fake_facefusion(dir.path(), "exit 0\n");
    vars.insert(
        String::from("MAIN_SERVER_UPLOAD_URL"),
        String::from("http://127.0.0.1:9/upload_result/"),
    );
    let (app, state) = app(vars).await;

    // out of range index: the upload is still kept as the session source
    let (status, body) = call(app.clone(), run_ai_request("5", Some(("first.png", "1")))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["detail"], "Invalid index.");
    assert_eq!(
        state.session.source().await,
        Some(dir.path().join("uploads/first.png"))
    );

    let (status, body) = call(app.clone(), run_ai_request("-1", None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "idle");
    assert_eq!(state.session.source().await, None);

    let (status, _) = call(app, run_ai_request("9", Some(("second.png", "2")))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(
        state.session.source().await,
        Some(dir.path().join("uploads/second.png"))
    );
}
