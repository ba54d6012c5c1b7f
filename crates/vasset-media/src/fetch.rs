//! Video metadata fetch and download using yt-dlp.

use serde::Deserialize;
use std::path::Path;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tracing::{info, warn};

use crate::error::{MediaError, MediaResult};

/// Metadata fetch timeout.
const FETCH_TIMEOUT_SECS: u64 = 60;

/// Download timeout; long videos on slow links take a while.
const DOWNLOAD_TIMEOUT_SECS: u64 = 1800;

/// Metadata returned by the fetcher, with the raw response preserved so
/// the caller can persist it as provenance.
#[derive(Debug, Clone)]
pub struct FetchedMetadata {
    pub id: String,
    pub title: String,
    pub description: String,
    pub uploader: String,
    pub duration_seconds: f64,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub webpage_url: String,
    /// Verbatim fetcher response (pretty-printed JSON)
    pub raw: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct DumpJson {
    id: String,
    title: Option<String>,
    description: Option<String>,
    uploader: Option<String>,
    duration: Option<f64>,
    width: Option<u32>,
    height: Option<u32>,
    webpage_url: Option<String>,
}

/// Fetch metadata for a video URL without downloading the stream.
///
/// Uses `yt-dlp --dump-json`. A structured failure is returned rather
/// than a panic; the caller records it as provenance and decides whether
/// ingest can proceed.
pub async fn fetch_metadata(url: &str) -> MediaResult<FetchedMetadata> {
    which::which("yt-dlp").map_err(|_| MediaError::YtDlpNotFound)?;

    info!(url = %url, "Fetching video metadata");

    let run = Command::new("yt-dlp")
        .args(["--dump-json", "--no-download", "--no-warnings"])
        .arg(url)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .output();

    let output = match tokio::time::timeout(Duration::from_secs(FETCH_TIMEOUT_SECS), run).await {
        Ok(result) => result?,
        Err(_) => {
            return Err(MediaError::Timeout {
                tool: "yt-dlp",
                seconds: FETCH_TIMEOUT_SECS,
            });
        }
    };

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(MediaError::metadata_failed(stderr.trim().to_string()));
    }

    let raw: serde_json::Value = serde_json::from_slice(&output.stdout)?;
    let parsed: DumpJson = serde_json::from_value(raw.clone())?;

    Ok(FetchedMetadata {
        id: parsed.id,
        title: parsed.title.unwrap_or_default(),
        description: parsed.description.unwrap_or_default(),
        uploader: parsed.uploader.unwrap_or_default(),
        duration_seconds: parsed.duration.unwrap_or(0.0),
        width: parsed.width,
        height: parsed.height,
        webpage_url: parsed.webpage_url.unwrap_or_else(|| url.to_string()),
        raw,
    })
}

/// Download a video to `output_path` using yt-dlp.
///
/// An existing non-empty file at the destination is reused. Failures are
/// descriptive and never retried here; retry is the caller's decision.
pub async fn download_video(url: &str, output_path: impl AsRef<Path>) -> MediaResult<()> {
    let output_path = output_path.as_ref();

    if output_path.exists() {
        if let Ok(metadata) = output_path.metadata() {
            if metadata.len() > 0 {
                info!("Using existing video file: {}", output_path.display());
                return Ok(());
            }
            warn!(
                "Existing file {} is empty, re-downloading",
                output_path.display()
            );
            tokio::fs::remove_file(output_path).await?;
        }
    }

    which::which("yt-dlp").map_err(|_| MediaError::YtDlpNotFound)?;

    if let Some(parent) = output_path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }

    info!(url = %url, dest = %output_path.display(), "Downloading video");

    let output_path_str = output_path.to_string_lossy().to_string();
    let run = Command::new("yt-dlp")
        .args([
            "--no-warnings",
            "-f",
            "bestvideo[ext=mp4]+bestaudio[ext=m4a]/best[ext=mp4]/best",
            "-o",
            &output_path_str,
        ])
        .arg(url)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .output();

    let output = match tokio::time::timeout(Duration::from_secs(DOWNLOAD_TIMEOUT_SECS), run).await
    {
        Ok(result) => result?,
        Err(_) => {
            return Err(MediaError::Timeout {
                tool: "yt-dlp",
                seconds: DOWNLOAD_TIMEOUT_SECS,
            });
        }
    };

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(MediaError::download_failed(stderr.trim().to_string()));
    }

    if !output_path.exists() {
        return Err(MediaError::download_failed(format!(
            "yt-dlp reported success but {} does not exist",
            output_path.display()
        )));
    }

    Ok(())
}
