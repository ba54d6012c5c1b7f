//! Frame records produced by the sampler and deduplicator.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Stable frame identifier, monotonically assigned in sampling order
/// (`KF_000001`, `KF_000002`, ...).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FrameId(pub String);

impl FrameId {
    /// Build the id for the 1-based candidate index.
    pub fn from_index(index: usize) -> Self {
        Self(format!("KF_{:06}", index))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for FrameId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// How a candidate frame was produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FrameSource {
    /// Uniform interval sampling
    Uniform,
    /// Scene-change triggered sampling
    Scene,
}

/// One sampled frame, kept or collapsed as a duplicate.
///
/// A duplicate always references a prior retained frame (dedup looks
/// backward, never forward) and its file is removed from disk.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FrameRecord {
    pub frame_id: FrameId,
    /// Milliseconds from video start; null when the sampler cannot infer
    /// an offset (scene mode)
    pub ts_ms: Option<i64>,
    /// Asset-relative image path; null once a duplicate's file is deleted
    pub path: Option<String>,
    /// blake3 hex digest of the image file bytes
    pub digest: String,
    pub source: FrameSource,
    pub is_duplicate: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duplicate_of: Option<FrameId>,
}

impl FrameRecord {
    pub fn is_retained(&self) -> bool {
        !self.is_duplicate
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_id_format() {
        assert_eq!(FrameId::from_index(1).as_str(), "KF_000001");
        assert_eq!(FrameId::from_index(42).as_str(), "KF_000042");
    }

    #[test]
    fn test_frame_record_roundtrip() {
        let record = FrameRecord {
            frame_id: FrameId::from_index(2),
            ts_ms: Some(3000),
            path: None,
            digest: "deadbeef".into(),
            source: FrameSource::Uniform,
            is_duplicate: true,
            duplicate_of: Some(FrameId::from_index(1)),
        };
        let json = serde_json::to_string(&record).unwrap();
        let back: FrameRecord = serde_json::from_str(&json).unwrap();
        assert!(back.is_duplicate);
        assert_eq!(back.duplicate_of, Some(FrameId::from_index(1)));
    }
}
