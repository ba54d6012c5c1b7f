//! Error types for persistence operations.

use std::path::PathBuf;
use thiserror::Error;

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors that can occur in the manifest store or evidence database.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Asset not found: {0}")]
    AssetNotFound(String),

    #[error("Manifest corrupt for asset {asset_id}: {reason}")]
    ManifestCorrupt { asset_id: String, reason: String },

    #[error("Claimed artifact missing: {path}")]
    ArtifactMissing { path: PathBuf },

    #[error("Unsafe path refused: {0}")]
    UnsafePath(String),

    #[error("Database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl StoreError {
    pub fn manifest_corrupt(asset_id: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::ManifestCorrupt {
            asset_id: asset_id.into(),
            reason: reason.into(),
        }
    }
}
