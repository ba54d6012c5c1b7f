//! Audio extraction for transcription.
//!
//! Extracts a mono 16 kHz AAC track, stepping down a bitrate ladder until
//! the file fits the transcription provider's upload limit.

use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::command::FfmpegCommand;
use crate::error::{MediaError, MediaResult};

/// Audio extraction timeout.
const AUDIO_TIMEOUT_SECS: u64 = 120;

/// Bitrate ladder in kbps, tried highest first.
const BITRATE_TIERS: [u32; 2] = [24, 16];

/// Result of adaptive audio extraction.
#[derive(Debug, Clone)]
pub struct ExtractedAudio {
    pub path: PathBuf,
    pub bitrate_kbps: u32,
    pub size_bytes: u64,
}

/// Extract the audio track, re-encoding at lower bitrates until the
/// output fits `max_bytes`.
pub async fn extract_audio_adaptive(
    video_path: &Path,
    audio_dir: &Path,
    max_bytes: u64,
) -> MediaResult<ExtractedAudio> {
    if !video_path.exists() {
        return Err(MediaError::FileNotFound(video_path.to_path_buf()));
    }

    tokio::fs::create_dir_all(audio_dir).await?;
    let final_path = audio_dir.join("audio.m4a");

    let mut sizes: Vec<String> = Vec::new();
    for bitrate in BITRATE_TIERS {
        let candidate = audio_dir.join(format!("audio_{}k.m4a", bitrate));
        extract_audio(video_path, &candidate, bitrate).await?;

        let size_bytes = tokio::fs::metadata(&candidate).await?.len();
        if size_bytes <= max_bytes {
            tokio::fs::rename(&candidate, &final_path).await?;
            info!(
                bitrate_kbps = bitrate,
                size_bytes, "Extracted audio for transcription"
            );
            return Ok(ExtractedAudio {
                path: final_path,
                bitrate_kbps: bitrate,
                size_bytes,
            });
        }

        debug!(bitrate_kbps = bitrate, size_bytes, "Audio over size cap");
        sizes.push(format!("{}kbps={} bytes", bitrate, size_bytes));
        let _ = tokio::fs::remove_file(&candidate).await;
    }

    Err(MediaError::AudioTooLarge(format!(
        "exceeds {} bytes even at the lowest bitrate ({})",
        max_bytes,
        sizes.join(", ")
    )))
}

/// Extract mono 16 kHz AAC audio at a fixed bitrate.
async fn extract_audio(video_path: &Path, audio_path: &Path, bitrate_kbps: u32) -> MediaResult<()> {
    FfmpegCommand::new(video_path, audio_path)
        .no_video()
        .output_args(["-ac", "1", "-ar", "16000"])
        .audio_codec("aac")
        .audio_bitrate(format!("{}k", bitrate_kbps))
        .run(AUDIO_TIMEOUT_SECS)
        .await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_extract_audio_missing_video() {
        let dir = tempfile::TempDir::new().unwrap();
        let err = extract_audio_adaptive(
            Path::new("/nonexistent/video.mp4"),
            dir.path(),
            5 * 1024 * 1024,
        )
        .await
        .unwrap_err();
        assert!(matches!(err, MediaError::FileNotFound(_)));
    }
}
