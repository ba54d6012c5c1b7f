//! On-disk layout of a single asset directory.
//!
//! All artifact paths are addressed relative to the asset directory so
//! manifests stay valid when the data directory moves.

use std::path::{Path, PathBuf};

use vasset_models::AssetId;

/// Manifest file name.
pub const MANIFEST_FILE: &str = "manifest.json";
/// Normalized ingest metadata.
pub const METADATA_FILE: &str = "metadata.json";
/// Raw collaborator responses (provenance).
pub const SOURCE_API_DIR: &str = "source_api";
/// Materialized source video.
pub const SOURCE_VIDEO: &str = "source/video.mp4";
/// Sampled candidate frames.
pub const FRAMES_DIR: &str = "frames";
/// Frame records, kept and duplicate rows both.
pub const FRAMES_FILE: &str = "frames.jsonl";
/// Timeline buckets.
pub const TIMELINE_FILE: &str = "timeline.json";
/// Per-frame density scores.
pub const SCORES_FILE: &str = "frame_scores.jsonl";
/// Copies of the selected frames.
pub const SELECTED_DIR: &str = "frames_selected";
/// Selection record.
pub const SELECTION_FILE: &str = "selection.json";
/// Raw recognition spans per frame.
pub const OCR_FILE: &str = "frames_ocr.jsonl";
/// Normalized per-frame text.
pub const OCR_TEXT_FILE: &str = "ocr_text.jsonl";
/// Extracted audio track.
pub const AUDIO_DIR: &str = "audio";
/// Transcript segments.
pub const TRANSCRIPT_FILE: &str = "transcript.jsonl";

/// Path accessor for one asset's directory tree.
#[derive(Debug, Clone)]
pub struct AssetLayout {
    root: PathBuf,
}

impl AssetLayout {
    pub fn new(assets_dir: &Path, asset_id: &AssetId) -> Self {
        Self {
            root: assets_dir.join(asset_id.as_str()),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve an asset-relative artifact reference.
    pub fn resolve(&self, rel: &str) -> PathBuf {
        self.root.join(rel)
    }

    pub fn manifest_path(&self) -> PathBuf {
        self.root.join(MANIFEST_FILE)
    }

    pub fn metadata_path(&self) -> PathBuf {
        self.root.join(METADATA_FILE)
    }

    pub fn source_api_dir(&self) -> PathBuf {
        self.root.join(SOURCE_API_DIR)
    }

    pub fn source_video_path(&self) -> PathBuf {
        self.root.join(SOURCE_VIDEO)
    }

    pub fn frames_dir(&self) -> PathBuf {
        self.root.join(FRAMES_DIR)
    }

    pub fn frames_file(&self) -> PathBuf {
        self.root.join(FRAMES_FILE)
    }

    pub fn timeline_file(&self) -> PathBuf {
        self.root.join(TIMELINE_FILE)
    }

    pub fn scores_file(&self) -> PathBuf {
        self.root.join(SCORES_FILE)
    }

    pub fn selected_dir(&self) -> PathBuf {
        self.root.join(SELECTED_DIR)
    }

    pub fn selection_file(&self) -> PathBuf {
        self.root.join(SELECTION_FILE)
    }

    pub fn ocr_file(&self) -> PathBuf {
        self.root.join(OCR_FILE)
    }

    pub fn ocr_text_file(&self) -> PathBuf {
        self.root.join(OCR_TEXT_FILE)
    }

    pub fn audio_dir(&self) -> PathBuf {
        self.root.join(AUDIO_DIR)
    }

    pub fn transcript_file(&self) -> PathBuf {
        self.root.join(TRANSCRIPT_FILE)
    }
}
