//! OCR records: raw recognition spans and normalized per-frame text.

use serde::{Deserialize, Serialize};

use crate::frame::FrameId;

/// One recognized text span with its bounding box and confidence, as
/// reported by the recognition engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OcrSpan {
    pub text: String,
    pub left: i32,
    pub top: i32,
    pub width: i32,
    pub height: i32,
    /// Recognition confidence 0-100; None when the engine reports -1
    #[serde(skip_serializing_if = "Option::is_none")]
    pub conf: Option<f32>,
}

impl OcrSpan {
    /// Vertical center of the bounding box, used for line clustering.
    pub fn v_center(&self) -> f32 {
        self.top as f32 + self.height as f32 / 2.0
    }
}

/// Raw recognition output for one frame (`frames_ocr.jsonl`).
///
/// A blank frame is recorded with zero spans, never skipped.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FrameOcr {
    pub frame_id: FrameId,
    pub ts_ms: Option<i64>,
    #[serde(default)]
    pub spans: Vec<OcrSpan>,
}

/// Normalized text for one frame (`ocr_text.jsonl`).
///
/// `text` may be empty when every span fell below the confidence
/// threshold; the record is still emitted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NormalizedOcr {
    pub frame_id: FrameId,
    pub ts_ms: Option<i64>,
    pub text: String,
    pub line_count: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_span_vertical_center() {
        let span = OcrSpan {
            text: "hello".into(),
            left: 10,
            top: 20,
            width: 50,
            height: 10,
            conf: Some(91.0),
        };
        assert_eq!(span.v_center(), 25.0);
    }
}
