//! Pipeline configuration from environment variables.

use std::path::PathBuf;

/// Default uniform sampling interval in seconds.
pub const DEFAULT_INTERVAL_SEC: f64 = 3.0;
/// Default timeline bucket width in seconds.
pub const DEFAULT_BUCKET_SEC: u32 = 15;
/// Default number of top buckets the selector draws from.
pub const DEFAULT_TOP_BUCKETS: usize = 10;
/// Default selection cap.
pub const DEFAULT_MAX_SELECTED: usize = 30;
/// Default OCR confidence floor (0-100).
pub const DEFAULT_OCR_MIN_CONF: f32 = 40.0;
/// Default transcription upload cap (5 MB, the provider limit).
pub const DEFAULT_AUDIO_MAX_BYTES: u64 = 5 * 1024 * 1024;

/// Pipeline configuration.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Root data directory; assets and the evidence database live here
    pub data_dir: PathBuf,
    /// Uniform sampling interval in seconds
    pub interval_sec: f64,
    /// Scene-change threshold; set selects scene mode over uniform
    pub scene_thresh: Option<f64>,
    /// Cap on retained (non-duplicate) frames
    pub max_frames: Option<usize>,
    /// Timeline bucket width in seconds
    pub bucket_sec: u32,
    /// Number of top-scoring buckets the selector draws from
    pub top_buckets: usize,
    /// Selection size cap
    pub max_selected: usize,
    /// Tesseract language pack(s)
    pub ocr_lang: String,
    /// Tesseract page segmentation mode
    pub ocr_psm: u8,
    /// Minimum span confidence kept by the normalizer
    pub ocr_min_conf: f32,
    /// Transcript merge budget in characters; 0 disables merging
    pub merge_max_chars: usize,
    /// Transcription endpoint; transcription is unavailable when unset
    pub transcribe_endpoint: Option<String>,
    pub transcribe_api_key: Option<String>,
    pub transcribe_model: String,
    /// Audio upload size cap for the transcription provider
    pub audio_max_bytes: u64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./data"),
            interval_sec: DEFAULT_INTERVAL_SEC,
            scene_thresh: None,
            max_frames: None,
            bucket_sec: DEFAULT_BUCKET_SEC,
            top_buckets: DEFAULT_TOP_BUCKETS,
            max_selected: DEFAULT_MAX_SELECTED,
            ocr_lang: "eng".to_string(),
            ocr_psm: 6,
            ocr_min_conf: DEFAULT_OCR_MIN_CONF,
            merge_max_chars: 0,
            transcribe_endpoint: None,
            transcribe_api_key: None,
            transcribe_model: "whisper-1".to_string(),
            audio_max_bytes: DEFAULT_AUDIO_MAX_BYTES,
        }
    }
}

impl PipelineConfig {
    /// Build config from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            data_dir: std::env::var("VASSET_DATA_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.data_dir),
            interval_sec: env_parse("VASSET_INTERVAL_SEC").unwrap_or(defaults.interval_sec),
            scene_thresh: env_parse("VASSET_SCENE_THRESH"),
            max_frames: env_parse("VASSET_MAX_FRAMES"),
            bucket_sec: env_parse("VASSET_BUCKET_SEC").unwrap_or(defaults.bucket_sec),
            top_buckets: env_parse("VASSET_TOP_BUCKETS").unwrap_or(defaults.top_buckets),
            max_selected: env_parse("VASSET_MAX_SELECTED").unwrap_or(defaults.max_selected),
            ocr_lang: std::env::var("VASSET_OCR_LANG").unwrap_or(defaults.ocr_lang),
            ocr_psm: env_parse("VASSET_OCR_PSM").unwrap_or(defaults.ocr_psm),
            ocr_min_conf: env_parse("VASSET_OCR_MIN_CONF").unwrap_or(defaults.ocr_min_conf),
            merge_max_chars: env_parse("VASSET_MERGE_MAX_CHARS").unwrap_or(defaults.merge_max_chars),
            transcribe_endpoint: std::env::var("VASSET_TRANSCRIBE_ENDPOINT").ok(),
            transcribe_api_key: std::env::var("VASSET_TRANSCRIBE_API_KEY").ok(),
            transcribe_model: std::env::var("VASSET_TRANSCRIBE_MODEL")
                .unwrap_or(defaults.transcribe_model),
            audio_max_bytes: env_parse("VASSET_AUDIO_MAX_BYTES").unwrap_or(defaults.audio_max_bytes),
        }
    }

    /// Directory holding per-asset artifact trees.
    pub fn assets_dir(&self) -> PathBuf {
        self.data_dir.join("assets")
    }

    /// Path to the shared evidence database.
    pub fn db_path(&self) -> PathBuf {
        self.data_dir.join("vasset.db")
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|s| s.parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_paths() {
        let config = PipelineConfig::default();
        assert_eq!(config.assets_dir(), PathBuf::from("./data/assets"));
        assert_eq!(config.db_path(), PathBuf::from("./data/vasset.db"));
    }
}
