//! Info-density timeline: per-frame scores aggregated into time buckets.

use serde::{Deserialize, Serialize};

use crate::frame::FrameId;

/// Density score for one retained frame.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FrameScore {
    pub frame_id: FrameId,
    pub ts_ms: Option<i64>,
    pub score: f64,
}

/// One fixed-width time window over the asset's duration.
///
/// Buckets partition `[0, duration)` contiguously; a bucket with no
/// sampled frames is retained with score 0.0 so indices stay contiguous.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimelineBucket {
    pub index: u64,
    pub start_ms: i64,
    pub end_ms: i64,
    pub score: f64,
    /// Up to the top 3 member frames by density score
    #[serde(default)]
    pub top_frames: Vec<FrameId>,
}

impl TimelineBucket {
    pub fn is_empty(&self) -> bool {
        self.top_frames.is_empty()
    }
}

/// The full timeline artifact (`timeline.json`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Timeline {
    pub bucket_sec: u32,
    pub buckets: Vec<TimelineBucket>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timeline_roundtrip() {
        let timeline = Timeline {
            bucket_sec: 15,
            buckets: vec![TimelineBucket {
                index: 0,
                start_ms: 0,
                end_ms: 15000,
                score: 0.42,
                top_frames: vec![FrameId::from_index(1)],
            }],
        };
        let json = serde_json::to_string(&timeline).unwrap();
        let back: Timeline = serde_json::from_str(&json).unwrap();
        assert_eq!(back.buckets.len(), 1);
        assert_eq!(back.buckets[0].end_ms, 15000);
    }
}
