//! The vasset orchestration core.
//!
//! Everything here is manifest-driven: the stage runner decides whether a
//! stage is cached, stale, or due, invokes its producer, and records the
//! outcome and provenance. The stage implementations cover sampling,
//! dedup, density scoring, selection, OCR normalization, transcription,
//! and evidence indexing; retrieval and the asset-level services (status,
//! clean, query) round out the crate.

pub mod clean;
pub mod config;
pub mod density;
pub mod error;
pub mod pipeline;
pub mod query;
pub mod runner;
pub mod stages;
pub mod status;

pub use config::PipelineConfig;
pub use error::{PipelineError, PipelineResult};
pub use pipeline::{run_pipeline, PipelineOptions, PipelineRun};
pub use runner::{run_stage, PipelineContext, StageLocks, StageOutcome, StageOutput};
