//! Frame selection drawn from the top timeline buckets.

use serde::{Deserialize, Serialize};

use crate::frame::FrameId;

/// One selected frame with the context it was chosen in.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SelectedFrame {
    pub frame_id: FrameId,
    pub ts_ms: Option<i64>,
    pub score: f64,
    /// Asset-relative path of the copied image under `frames_selected/`
    pub path: String,
    /// Index of the timeline bucket this frame was drawn from
    pub bucket_index: u64,
}

/// The selection artifact (`selection.json`).
///
/// Ordered by timestamp ascending, then frame id; deterministic for
/// fixed inputs and parameters. Empty is a valid outcome.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Selection {
    pub frames: Vec<SelectedFrame>,
    /// Indices of the buckets the selection was drawn from, rank order
    pub source_buckets: Vec<u64>,
    pub top_buckets: usize,
    pub max_frames: usize,
}

impl Selection {
    pub fn empty(top_buckets: usize, max_frames: usize) -> Self {
        Self {
            frames: Vec::new(),
            source_buckets: Vec::new(),
            top_buckets,
            max_frames,
        }
    }

    pub fn frame_ids(&self) -> Vec<FrameId> {
        self.frames.iter().map(|f| f.frame_id.clone()).collect()
    }
}
