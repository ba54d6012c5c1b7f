//! Transcript segments returned by the transcription provider.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Stable transcript segment identifier (`SEG_000001`, ...).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SegmentId(pub String);

impl SegmentId {
    /// Build the id for the 1-based segment index.
    pub fn from_index(index: usize) -> Self {
        Self(format!("SEG_{:06}", index))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SegmentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One timestamped transcript segment (`transcript.jsonl`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscriptSegment {
    pub segment_id: SegmentId,
    pub start_ms: i64,
    pub end_ms: i64,
    pub text: String,
}
