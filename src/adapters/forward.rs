use crate::error::{RelayError, Result};
use crate::ports::forwarder::ResultForwarder;
use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::{Body, Client};
use std::path::Path;
use std::time::Duration;
use tokio::fs::File;
use tokio_util::io::ReaderStream;

pub const API_KEY_HEADER: &str = "x-api-key";

/// Posts finished videos to the main server as a multipart `file` field.
#[derive(Clone)]
pub struct HttpForwarder {
    client: Client,
    upload_url: String,
    api_key: Option<String>,
}

impl HttpForwarder {
    pub fn new(upload_url: String, api_key: Option<String>, timeout: Duration) -> Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            upload_url,
            api_key,
        })
    }

    pub fn from_config(config: &crate::config::RelayConfig) -> Result<Self> {
        Self::new(
            config.upload_url.clone(),
            config.api_key.clone(),
            config.forward_timeout,
        )
    }
}

#[async_trait]
impl ResultForwarder for HttpForwarder {
    async fn forward(&self, path: &Path) -> Result<u16> {
        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| String::from("output.mp4"));

        let file = File::open(path).await?;
        let length = file.metadata().await?.len();
        let body = Body::wrap_stream(ReaderStream::new(file));
        let part = Part::stream_with_length(body, length)
            .file_name(file_name)
            .mime_str("video/mp4")?;
        let form = Form::new().part("file", part);

        let mut request = self.client.post(&self.upload_url).multipart(form);
        if let Some(key) = &self.api_key {
            request = request.header(API_KEY_HEADER, key);
        }

        tracing::debug!("Forwarding {:?} ({} bytes) to {}", path, length, self.upload_url);
        let response = request.send().await?;
        let status = response.status();
        tracing::info!("Sent result to main server, status code: {}", status);

        if !status.is_success() {
            return Err(RelayError::Forward {
                status: status.as_u16(),
            });
        }
        Ok(status.as_u16())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;
    use tempfile::tempdir;

    fn output_file(dir: &Path) -> std::path::PathBuf {
        let path = dir.join("output_0.mp4");
        std::fs::write(&path, b"not really a video").unwrap();
        path
    }

    #[tokio::test]
    async fn test_forward_sends_file_and_key() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/upload_result/")
                    .header(API_KEY_HEADER, "secret")
                    .body_contains("name=\"file\"")
                    .body_contains("filename=\"output_0.mp4\"")
                    .body_contains("not really a video");
                then.status(200);
            })
            .await;

        let dir = tempdir().unwrap();
        let forwarder = HttpForwarder::new(
            server.url("/upload_result/"),
            Some("secret".into()),
            Duration::from_secs(5),
        )
        .unwrap();

        let status = forwarder.forward(&output_file(dir.path())).await.unwrap();
        assert_eq!(status, 200);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_forward_rejected_status() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/upload_result/");
                then.status(403);
            })
            .await;

        let dir = tempdir().unwrap();
        let forwarder =
            HttpForwarder::new(server.url("/upload_result/"), None, Duration::from_secs(5)).unwrap();

        let err = forwarder.forward(&output_file(dir.path())).await.unwrap_err();
        assert!(matches!(err, RelayError::Forward { status: 403 }));
    }

    #[tokio::test]
    async fn test_forward_missing_file() {
        let dir = tempdir().unwrap();
        let forwarder = HttpForwarder::new(
            String::from("http://127.0.0.1:9/upload_result/"),
            None,
            Duration::from_secs(1),
        )
        .unwrap();

        let err = forwarder
            .forward(&dir.path().join("nothing.mp4"))
            .await
            .unwrap_err();
        assert!(matches!(err, RelayError::Io(_)));
    }
}
