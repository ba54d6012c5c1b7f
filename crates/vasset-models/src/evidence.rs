//! Indexed evidence units and query results.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::asset::AssetId;
use crate::timefmt::format_ms;

/// Origin of an evidence unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EvidenceKind {
    Transcript,
    OcrFrame,
}

impl EvidenceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EvidenceKind::Transcript => "transcript",
            EvidenceKind::OcrFrame => "ocr_frame",
        }
    }

    pub fn from_db_str(s: &str) -> Option<Self> {
        match s {
            "transcript" => Some(EvidenceKind::Transcript),
            "ocr_frame" => Some(EvidenceKind::OcrFrame),
            _ => None,
        }
    }
}

impl fmt::Display for EvidenceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One indexed, citable chunk of transcript or OCR text.
///
/// `source_id` resolves back to a `SegmentId` (transcript) or `FrameId`
/// (ocr_frame). Units are immutable once indexed; re-indexing replaces
/// the asset's whole set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvidenceUnit {
    pub asset_id: AssetId,
    pub kind: EvidenceKind,
    pub source_id: String,
    pub start_ms: i64,
    /// End of the cited span; None for frame evidence
    pub end_ms: Option<i64>,
    pub text: String,
}

impl EvidenceUnit {
    /// Render the citation string, e.g. `[seg:SEG_000001 t=0:00-0:28]`
    /// or `[frame:KF_000003 t=0:18]`.
    pub fn citation(&self) -> String {
        citation(self.kind, &self.source_id, self.start_ms, self.end_ms)
    }
}

/// Format a citation for an evidence reference.
pub fn citation(kind: EvidenceKind, source_id: &str, start_ms: i64, end_ms: Option<i64>) -> String {
    match kind {
        EvidenceKind::Transcript => match end_ms {
            Some(end) => format!(
                "[seg:{} t={}-{}]",
                source_id,
                format_ms(start_ms),
                format_ms(end)
            ),
            None => format!("[seg:{} t={}]", source_id, format_ms(start_ms)),
        },
        EvidenceKind::OcrFrame => {
            format!("[frame:{} t={}]", source_id, format_ms(start_ms))
        }
    }
}

/// One ranked retrieval hit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvidenceHit {
    pub kind: EvidenceKind,
    pub source_id: String,
    pub start_ms: i64,
    pub end_ms: Option<i64>,
    /// Full indexed text of the unit
    pub text: String,
    /// Truncated display snippet
    pub snippet: String,
    pub score: f64,
    pub citation: String,
}

/// Ephemeral result of a retrieval query; never persisted unless the
/// caller explicitly writes it out.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvidencePack {
    pub asset_id: AssetId,
    pub query: String,
    pub items: Vec<EvidenceHit>,
    /// Matches in the index beyond the returned top-k
    pub total_count: usize,
}

impl EvidencePack {
    pub fn empty(asset_id: AssetId, query: impl Into<String>) -> Self {
        Self {
            asset_id,
            query: query.into(),
            items: Vec::new(),
            total_count: 0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transcript_citation_with_range() {
        let unit = EvidenceUnit {
            asset_id: AssetId::new("a1"),
            kind: EvidenceKind::Transcript,
            source_id: "SEG_000001".into(),
            start_ms: 0,
            end_ms: Some(28_000),
            text: "hello".into(),
        };
        assert_eq!(unit.citation(), "[seg:SEG_000001 t=0:00-0:28]");
    }

    #[test]
    fn test_frame_citation() {
        let unit = EvidenceUnit {
            asset_id: AssetId::new("a1"),
            kind: EvidenceKind::OcrFrame,
            source_id: "KF_000003".into(),
            start_ms: 18_000,
            end_ms: None,
            text: "slide".into(),
        };
        assert_eq!(unit.citation(), "[frame:KF_000003 t=0:18]");
    }

    #[test]
    fn test_kind_db_roundtrip() {
        assert_eq!(
            EvidenceKind::from_db_str(EvidenceKind::OcrFrame.as_str()),
            Some(EvidenceKind::OcrFrame)
        );
        assert_eq!(EvidenceKind::from_db_str("embedding"), None);
    }
}
