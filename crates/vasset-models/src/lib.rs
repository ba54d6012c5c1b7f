//! Shared data models for the vasset pipeline.
//!
//! This crate provides Serde-serializable types for:
//! - Assets and normalized ingest metadata
//! - The per-asset manifest, stage records, and provenance trail
//! - Frames, the info-density timeline, and frame selections
//! - OCR spans, transcript segments, and indexed evidence

pub mod asset;
pub mod evidence;
pub mod fingerprint;
pub mod frame;
pub mod manifest;
pub mod ocr;
pub mod selection;
pub mod stage;
pub mod timefmt;
pub mod timeline;
pub mod transcript;

// Re-export common types
pub use asset::{AssetId, AssetMetadata, AssetStatus};
pub use evidence::{citation, EvidenceHit, EvidenceKind, EvidencePack, EvidenceUnit};
pub use fingerprint::fingerprint_params;
pub use frame::{FrameId, FrameRecord, FrameSource};
pub use manifest::{Manifest, ProvenanceEvent};
pub use ocr::{FrameOcr, NormalizedOcr, OcrSpan};
pub use selection::{SelectedFrame, Selection};
pub use stage::{Stage, StageRecord, StageStatus};
pub use timefmt::format_ms;
pub use timeline::{FrameScore, Timeline, TimelineBucket};
pub use transcript::{SegmentId, TranscriptSegment};
