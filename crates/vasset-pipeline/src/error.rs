//! Pipeline error types and classification.
//!
//! Four kinds matter to callers: configuration errors surface immediately
//! with no partial write; collaborator errors are recorded into the
//! manifest as stage ERROR and the run continues; integrity errors demote
//! a stage instead of trusting stale state; not-found errors surface with
//! no state change.

use thiserror::Error;

pub type PipelineResult<T> = Result<T, PipelineError>;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Asset not found: {0}")]
    NotFound(String),

    #[error("Data integrity error: {0}")]
    DataIntegrity(String),

    #[error("Stage precondition not met: {0}")]
    Precondition(String),

    #[error("Collaborator error: {0}")]
    Media(#[from] vasset_media::MediaError),

    #[error("Store error: {0}")]
    Store(vasset_store::StoreError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl From<vasset_store::StoreError> for PipelineError {
    fn from(e: vasset_store::StoreError) -> Self {
        match e {
            vasset_store::StoreError::AssetNotFound(id) => PipelineError::NotFound(id),
            vasset_store::StoreError::ManifestCorrupt { asset_id, reason } => {
                PipelineError::DataIntegrity(format!("manifest for {}: {}", asset_id, reason))
            }
            vasset_store::StoreError::ArtifactMissing { path } => {
                PipelineError::DataIntegrity(format!("artifact missing: {}", path.display()))
            }
            other => PipelineError::Store(other),
        }
    }
}

impl PipelineError {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub fn precondition(msg: impl Into<String>) -> Self {
        Self::Precondition(msg.into())
    }

    /// Fatal before any state is written; never recorded into a manifest.
    pub fn is_config(&self) -> bool {
        matches!(self, PipelineError::Config(_))
    }

    /// Surfaced to the caller with no state change.
    pub fn is_not_found(&self) -> bool {
        matches!(self, PipelineError::NotFound(_))
    }

    /// Demotes a DONE stage rather than trusting stale output.
    pub fn is_data_integrity(&self) -> bool {
        matches!(self, PipelineError::DataIntegrity(_))
    }
}
