//! Pipeline stages and per-stage manifest records.
//!
//! Stages form a closed set with a fixed execution order. Dispatch goes
//! through this enum everywhere; there is no string-keyed stage lookup.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// One named, idempotent step of the extraction pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Source,
    Frames,
    Timeline,
    Select,
    Ocr,
    OcrNormalize,
    Transcript,
    Index,
}

impl Stage {
    /// Pipeline execution order. Each stage's output feeds the next.
    pub const ORDER: [Stage; 8] = [
        Stage::Source,
        Stage::Frames,
        Stage::Timeline,
        Stage::Select,
        Stage::Ocr,
        Stage::OcrNormalize,
        Stage::Transcript,
        Stage::Index,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Source => "source",
            Stage::Frames => "frames",
            Stage::Timeline => "timeline",
            Stage::Select => "select",
            Stage::Ocr => "ocr",
            Stage::OcrNormalize => "ocr_normalize",
            Stage::Transcript => "transcript",
            Stage::Index => "index",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Stage {
    type Err = UnknownStage;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "source" => Ok(Stage::Source),
            "frames" => Ok(Stage::Frames),
            "timeline" => Ok(Stage::Timeline),
            "select" => Ok(Stage::Select),
            "ocr" => Ok(Stage::Ocr),
            "ocr_normalize" => Ok(Stage::OcrNormalize),
            "transcript" => Ok(Stage::Transcript),
            "index" => Ok(Stage::Index),
            other => Err(UnknownStage(other.to_string())),
        }
    }
}

/// Error for an unrecognized stage name.
#[derive(Debug, Clone, thiserror::Error)]
#[error("unknown stage: {0}")]
pub struct UnknownStage(pub String);

/// Status of a stage as recorded in the manifest.
///
/// The manifest is the only writer of this status; later stages never
/// infer completion from file existence alone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum StageStatus {
    /// Stage has never run
    #[default]
    Missing,
    /// Stage is currently running
    Pending,
    /// Stage completed; artifacts and fingerprint recorded
    Done,
    /// Stage failed; error message recorded
    Error,
}

impl StageStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            StageStatus::Missing => "missing",
            StageStatus::Pending => "pending",
            StageStatus::Done => "done",
            StageStatus::Error => "error",
        }
    }
}

impl fmt::Display for StageStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Per-stage record stored in the manifest.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageRecord {
    pub status: StageStatus,
    /// Fingerprint over the parameters the stage last ran with
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params_fingerprint: Option<String>,
    /// Asset-relative paths to the artifacts this stage owns
    #[serde(default)]
    pub output_refs: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Free-form metrics from the last successful run (counts, file names)
    #[serde(default, skip_serializing_if = "serde_json::Value::is_null")]
    pub metrics: serde_json::Value,
    pub started_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl StageRecord {
    pub fn pending(fingerprint: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            status: StageStatus::Pending,
            params_fingerprint: Some(fingerprint.into()),
            output_refs: Vec::new(),
            error: None,
            metrics: serde_json::Value::Null,
            started_at: now,
            updated_at: now,
        }
    }

    pub fn is_done(&self) -> bool {
        self.status == StageStatus::Done
    }
}
