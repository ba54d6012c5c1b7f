//! Error types for external tool operations.

use std::path::PathBuf;
use thiserror::Error;

/// Result type for media operations.
pub type MediaResult<T> = Result<T, MediaError>;

/// Errors that can occur at the external tool boundary.
#[derive(Debug, Error)]
pub enum MediaError {
    #[error("FFmpeg not found in PATH")]
    FfmpegNotFound,

    #[error("FFprobe not found in PATH")]
    FfprobeNotFound,

    #[error("yt-dlp not found in PATH")]
    YtDlpNotFound,

    #[error("tesseract not found in PATH")]
    TesseractNotFound,

    #[error("{tool} command failed: {message}")]
    CommandFailed {
        tool: &'static str,
        message: String,
        stderr: Option<String>,
        exit_code: Option<i32>,
    },

    #[error("{tool} timed out after {seconds} seconds")]
    Timeout { tool: &'static str, seconds: u64 },

    #[error("Download failed: {0}")]
    DownloadFailed(String),

    #[error("Metadata fetch failed: {0}")]
    MetadataFailed(String),

    #[error("Transcription failed: {0}")]
    TranscriptionFailed(String),

    #[error("Transcription quota exceeded: {0}")]
    TranscriptionQuota(String),

    #[error("File not found: {0}")]
    FileNotFound(PathBuf),

    #[error("Invalid video file: {0}")]
    InvalidVideo(String),

    #[error("Audio exceeds provider size limit: {0}")]
    AudioTooLarge(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON parse error: {0}")]
    JsonParse(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

impl MediaError {
    /// Create a command failure error.
    pub fn command_failed(
        tool: &'static str,
        message: impl Into<String>,
        stderr: Option<String>,
        exit_code: Option<i32>,
    ) -> Self {
        Self::CommandFailed {
            tool,
            message: message.into(),
            stderr,
            exit_code,
        }
    }

    pub fn download_failed(message: impl Into<String>) -> Self {
        Self::DownloadFailed(message.into())
    }

    pub fn metadata_failed(message: impl Into<String>) -> Self {
        Self::MetadataFailed(message.into())
    }

    /// True for quota/billing failures that must not be confused with
    /// "no speech detected".
    pub fn is_quota(&self) -> bool {
        matches!(self, MediaError::TranscriptionQuota(_))
    }
}
