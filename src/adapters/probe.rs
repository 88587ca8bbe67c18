use crate::error::{RelayError, Result};
use ffmpeg_next as ffmpeg;
use std::path::Path;

/// What libav reports about a produced video.
#[derive(Debug, Clone, PartialEq)]
pub struct VideoInfo {
    pub duration_secs: f64,
    pub width: u32,
    pub height: u32,
}

/// Open the output with libav and make sure it holds a decodable video stream.
pub async fn probe_video(path: &Path) -> Result<VideoInfo> {
    let source = path.to_path_buf();
    let invalid = |message: String| RelayError::Probe {
        path: path.to_path_buf(),
        message,
    };

    tokio::task::spawn_blocking(move || -> std::result::Result<VideoInfo, String> {
        ffmpeg::init().map_err(|e| e.to_string())?;

        let ictx = ffmpeg::format::input(&source).map_err(|e| e.to_string())?;
        let stream = ictx
            .streams()
            .best(ffmpeg::media::Type::Video)
            .ok_or_else(|| String::from("no video stream"))?;

        let context = ffmpeg::codec::context::Context::from_parameters(stream.parameters())
            .map_err(|e| e.to_string())?;
        let decoder = context.decoder().video().map_err(|e| e.to_string())?;

        let duration = ictx.duration();
        let duration_secs = if duration > 0 {
            duration as f64 / f64::from(ffmpeg::ffi::AV_TIME_BASE)
        } else {
            0.0
        };

        Ok(VideoInfo {
            duration_secs,
            width: decoder.width(),
            height: decoder.height(),
        })
    })
    .await
    .map_err(|e| invalid(e.to_string()))?
    .map_err(invalid)
}
