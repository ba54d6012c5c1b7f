//! The per-asset manifest: stage state machine plus provenance trail.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

use crate::asset::{AssetId, AssetStatus};
use crate::stage::{Stage, StageRecord, StageStatus};

/// Outcome of a stage transition, recorded in the provenance trail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProvenanceOutcome {
    Started,
    Completed,
    CacheHit,
    Failed,
    Demoted,
}

/// One append-only provenance entry: what ran, when, with what
/// parameters, and how it ended. The trail is only ever extended.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProvenanceEvent {
    pub event_id: Uuid,
    pub stage: Stage,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fingerprint: Option<String>,
    pub outcome: ProvenanceOutcome,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub at: DateTime<Utc>,
}

impl ProvenanceEvent {
    pub fn new(stage: Stage, fingerprint: Option<String>, outcome: ProvenanceOutcome) -> Self {
        Self {
            event_id: Uuid::new_v4(),
            stage,
            fingerprint,
            outcome,
            message: None,
            at: Utc::now(),
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }
}

/// Asset manifest: the single source of truth for stage status.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Manifest {
    pub asset_id: AssetId,
    pub source_url: String,
    pub status: AssetStatus,
    /// Fingerprint over the stable ingest metadata fields
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fingerprint: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Stage name -> record. BTreeMap keeps serialization stable.
    #[serde(default)]
    pub stages: BTreeMap<String, StageRecord>,
    #[serde(default)]
    pub provenance: Vec<ProvenanceEvent>,
}

impl Manifest {
    pub fn new(asset_id: AssetId, source_url: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            asset_id,
            source_url: source_url.into(),
            status: AssetStatus::Pending,
            fingerprint: None,
            created_at: now,
            updated_at: now,
            stages: BTreeMap::new(),
            provenance: Vec::new(),
        }
    }

    pub fn stage(&self, stage: Stage) -> Option<&StageRecord> {
        self.stages.get(stage.as_str())
    }

    pub fn stage_status(&self, stage: Stage) -> StageStatus {
        self.stage(stage).map(|r| r.status).unwrap_or_default()
    }

    pub fn set_stage(&mut self, stage: Stage, record: StageRecord) {
        self.stages.insert(stage.as_str().to_string(), record);
        self.updated_at = Utc::now();
    }

    /// Append a provenance event. The trail is never truncated.
    pub fn record_event(&mut self, event: ProvenanceEvent) {
        self.provenance.push(event);
        self.updated_at = Utc::now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_stage_defaults_to_missing_status() {
        let manifest = Manifest::new(AssetId::new("a1"), "https://example.com/v/a1");
        assert_eq!(manifest.stage_status(Stage::Frames), StageStatus::Missing);
    }

    #[test]
    fn test_provenance_is_append_only_through_api() {
        let mut manifest = Manifest::new(AssetId::new("a1"), "https://example.com/v/a1");
        manifest.record_event(ProvenanceEvent::new(
            Stage::Source,
            None,
            ProvenanceOutcome::Started,
        ));
        manifest.record_event(
            ProvenanceEvent::new(Stage::Source, None, ProvenanceOutcome::Failed)
                .with_message("download failed"),
        );
        assert_eq!(manifest.provenance.len(), 2);
        assert_eq!(manifest.provenance[0].outcome, ProvenanceOutcome::Started);
        assert_eq!(
            manifest.provenance[1].message.as_deref(),
            Some("download failed")
        );
    }

    #[test]
    fn test_manifest_roundtrip() {
        let mut manifest = Manifest::new(AssetId::new("a1"), "https://example.com/v/a1");
        manifest.set_stage(Stage::Frames, StageRecord::pending("abc"));
        let json = serde_json::to_string(&manifest).unwrap();
        let back: Manifest = serde_json::from_str(&json).unwrap();
        assert_eq!(back.stage_status(Stage::Frames), StageStatus::Pending);
        assert_eq!(
            back.stage(Stage::Frames).unwrap().params_fingerprint.as_deref(),
            Some("abc")
        );
    }
}
