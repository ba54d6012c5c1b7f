//! Asset identity and normalized ingest metadata.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Stable identifier for an asset: the external video identifier reported
/// by the metadata fetcher (e.g. the platform's own video id).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AssetId(pub String);

impl AssetId {
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AssetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for AssetId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for AssetId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Lifecycle status of an asset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum AssetStatus {
    /// Created but metadata not yet persisted
    #[default]
    Pending,
    /// Metadata fetched and asset directory laid out
    Ingested,
    /// Ingest failed; manifest records the error
    Failed,
}

impl AssetStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AssetStatus::Pending => "pending",
            AssetStatus::Ingested => "ingested",
            AssetStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for AssetStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Normalized video metadata persisted as `metadata.json`.
///
/// The raw fetcher response is kept verbatim under `source_api/` as
/// provenance; this struct holds only the fields the pipeline consumes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssetMetadata {
    pub asset_id: AssetId,
    pub source_url: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub uploader: String,
    /// Duration in seconds as reported by the fetcher
    pub duration_seconds: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub height: Option<u32>,
    pub ingested_at: DateTime<Utc>,
}

impl AssetMetadata {
    pub fn new(asset_id: AssetId, source_url: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            asset_id,
            source_url: source_url.into(),
            title: title.into(),
            description: String::new(),
            uploader: String::new(),
            duration_seconds: 0.0,
            width: None,
            height: None,
            ingested_at: Utc::now(),
        }
    }
}
