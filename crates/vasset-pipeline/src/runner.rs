//! The generic stage runner: idempotency, staleness, and provenance.
//!
//! Every extraction step goes through [`run_stage`]. The runner decides
//! whether to reuse a cached result, demote a stale record, or invoke the
//! producer, and it is the only code that writes stage status. Producer
//! failures are caught here, recorded as stage ERROR, and never unwind
//! further; the caller always receives a definite [`StageOutcome`].

use serde::Serialize;
use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex};
use tracing::{info, warn};

use vasset_models::{
    fingerprint_params,
    manifest::{ProvenanceEvent, ProvenanceOutcome},
    AssetId, Stage, StageRecord, StageStatus,
};
use vasset_store::ManifestStore;

use crate::config::PipelineConfig;
use crate::error::{PipelineError, PipelineResult};

/// What a producer hands back on success.
#[derive(Debug, Clone, Default)]
pub struct StageOutput {
    /// Asset-relative paths of the artifacts this run owns
    pub output_refs: Vec<String>,
    /// Free-form metrics recorded in the stage record
    pub metrics: serde_json::Value,
}

impl StageOutput {
    pub fn new(output_refs: Vec<String>, metrics: serde_json::Value) -> Self {
        Self {
            output_refs,
            metrics,
        }
    }
}

/// Definite result of a stage invocation.
#[derive(Debug, Clone)]
pub struct StageOutcome {
    pub stage: Stage,
    pub status: StageStatus,
    /// True when the cached result was reused without running the producer
    pub cached: bool,
    pub fingerprint: String,
    pub output_refs: Vec<String>,
    pub metrics: serde_json::Value,
    pub error: Option<String>,
}

impl StageOutcome {
    pub fn succeeded(&self) -> bool {
        self.status == StageStatus::Done
    }
}

/// Per-(asset, stage) async locks enforcing at-most-one active run.
///
/// A second invocation for the same pair blocks until the first
/// completes; writes to the same manifest entry never interleave.
#[derive(Default)]
pub struct StageLocks {
    inner: Mutex<HashMap<(AssetId, Stage), Arc<tokio::sync::Mutex<()>>>>,
}

impl StageLocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn acquire(
        &self,
        asset_id: &AssetId,
        stage: Stage,
    ) -> tokio::sync::OwnedMutexGuard<()> {
        let lock = {
            let mut map = self.inner.lock().expect("stage lock registry poisoned");
            map.entry((asset_id.clone(), stage))
                .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(())))
                .clone()
        };
        lock.lock_owned().await
    }
}

/// Shared handles the pipeline operates on. Injected, never global.
pub struct PipelineContext {
    pub config: PipelineConfig,
    pub store: ManifestStore,
    pub locks: StageLocks,
}

impl PipelineContext {
    pub fn new(config: PipelineConfig) -> Self {
        let store = ManifestStore::new(config.assets_dir());
        Self {
            config,
            store,
            locks: StageLocks::new(),
        }
    }
}

/// Run one stage with idempotency and provenance.
///
/// - cached: record is DONE, fingerprint matches, `force` is false, and
///   every claimed artifact exists → return without invoking the producer
///   (and without touching the manifest).
/// - stale: DONE with a different fingerprint, or an artifact missing →
///   demote (provenance records it) and recompute.
/// - error: the producer failed → ERROR record with the message; prior
///   DONE artifacts on disk stay as the producer left them.
pub async fn run_stage<P, Fut>(
    ctx: &PipelineContext,
    asset_id: &AssetId,
    stage: Stage,
    params: &impl Serialize,
    force: bool,
    producer: P,
) -> PipelineResult<StageOutcome>
where
    P: FnOnce() -> Fut,
    Fut: Future<Output = PipelineResult<StageOutput>>,
{
    let _guard = ctx.locks.acquire(asset_id, stage).await;

    let mut manifest = ctx.store.load(asset_id)?;
    let fingerprint = fingerprint_params(params)?;

    if !force {
        // A DONE record is trusted only when its fingerprint matches and
        // every claimed artifact is still on disk.
        let mut cached: Option<(Vec<String>, serde_json::Value)> = None;
        let mut demote_reason: Option<String> = None;

        if let Some(record) = manifest.stage(stage) {
            if record.is_done() {
                if record.params_fingerprint.as_deref() == Some(fingerprint.as_str()) {
                    match ctx.store.verify_outputs(asset_id, record) {
                        Ok(()) => {
                            cached = Some((record.output_refs.clone(), record.metrics.clone()))
                        }
                        Err(e) => demote_reason = Some(e.to_string()),
                    }
                } else {
                    demote_reason = Some("params fingerprint mismatch".to_string());
                }
            }
        }

        if let Some((output_refs, metrics)) = cached {
            info!(asset_id = %asset_id, stage = %stage, "Stage cached, skipping");
            return Ok(StageOutcome {
                stage,
                status: StageStatus::Done,
                cached: true,
                fingerprint,
                output_refs,
                metrics,
                error: None,
            });
        }
        if let Some(reason) = demote_reason {
            warn!(
                asset_id = %asset_id,
                stage = %stage,
                reason = %reason,
                "Demoting stale DONE stage"
            );
            manifest.record_event(
                ProvenanceEvent::new(stage, Some(fingerprint.clone()), ProvenanceOutcome::Demoted)
                    .with_message(reason),
            );
        }
    }

    // Mark pending before the producer runs; the manifest is the single
    // source of truth for "a run is in flight".
    manifest.record_event(ProvenanceEvent::new(
        stage,
        Some(fingerprint.clone()),
        ProvenanceOutcome::Started,
    ));
    manifest.set_stage(stage, StageRecord::pending(fingerprint.clone()));
    ctx.store.save(&manifest)?;

    info!(asset_id = %asset_id, stage = %stage, "Stage started");

    match producer().await {
        Ok(output) => {
            let mut manifest = ctx.store.load(asset_id)?;
            let mut record = StageRecord::pending(fingerprint.clone());
            record.status = StageStatus::Done;
            record.output_refs = output.output_refs.clone();
            record.metrics = output.metrics.clone();
            record.updated_at = chrono::Utc::now();
            manifest.set_stage(stage, record);
            manifest.record_event(ProvenanceEvent::new(
                stage,
                Some(fingerprint.clone()),
                ProvenanceOutcome::Completed,
            ));
            ctx.store.save(&manifest)?;

            info!(asset_id = %asset_id, stage = %stage, "Stage completed");
            Ok(StageOutcome {
                stage,
                status: StageStatus::Done,
                cached: false,
                fingerprint,
                output_refs: output.output_refs,
                metrics: output.metrics,
                error: None,
            })
        }
        Err(e) => {
            let message = e.to_string();
            warn!(asset_id = %asset_id, stage = %stage, error = %message, "Stage failed");

            let mut manifest = ctx.store.load(asset_id)?;
            let mut record = StageRecord::pending(fingerprint.clone());
            record.status = StageStatus::Error;
            record.error = Some(message.clone());
            record.updated_at = chrono::Utc::now();
            manifest.set_stage(stage, record);
            manifest.record_event(
                ProvenanceEvent::new(stage, Some(fingerprint.clone()), ProvenanceOutcome::Failed)
                    .with_message(message.clone()),
            );
            ctx.store.save(&manifest)?;

            Ok(StageOutcome {
                stage,
                status: StageStatus::Error,
                cached: false,
                fingerprint,
                output_refs: Vec::new(),
                metrics: serde_json::Value::Null,
                error: Some(message),
            })
        }
    }
}

/// Load a manifest and require a prior stage to be DONE.
///
/// Used by producers to check their inputs; the failure message lands in
/// the manifest as this stage's error.
pub fn require_stage_done(
    store: &ManifestStore,
    asset_id: &AssetId,
    stage: Stage,
) -> PipelineResult<StageRecord> {
    let manifest = store.load(asset_id)?;
    match manifest.stage(stage) {
        Some(record) if record.is_done() => Ok(record.clone()),
        Some(record) => Err(PipelineError::precondition(format!(
            "stage {} is {}, run it first",
            stage, record.status
        ))),
        None => Err(PipelineError::precondition(format!(
            "stage {} has not run, run it first",
            stage
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Serialize;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::TempDir;
    use vasset_models::Manifest;

    #[derive(Serialize)]
    struct Params {
        knob: u32,
    }

    fn context() -> (TempDir, PipelineContext) {
        let dir = TempDir::new().unwrap();
        let config = PipelineConfig {
            data_dir: dir.path().to_path_buf(),
            ..PipelineConfig::default()
        };
        let ctx = PipelineContext::new(config);
        (dir, ctx)
    }

    fn seed_asset(ctx: &PipelineContext, id: &str) -> AssetId {
        let asset_id = AssetId::new(id);
        let manifest = Manifest::new(asset_id.clone(), "https://example.com/v");
        ctx.store.save(&manifest).unwrap();
        asset_id
    }

    #[tokio::test]
    async fn test_run_stage_is_idempotent() {
        let (_dir, ctx) = context();
        let asset_id = seed_asset(&ctx, "a1");
        let runs = AtomicUsize::new(0);

        let artifact = ctx.store.layout(&asset_id).resolve("out.json");
        for _ in 0..2 {
            let outcome = run_stage(
                &ctx,
                &asset_id,
                Stage::Frames,
                &Params { knob: 1 },
                false,
                || async {
                    runs.fetch_add(1, Ordering::SeqCst);
                    std::fs::write(&artifact, b"{}").unwrap();
                    Ok(StageOutput::new(
                        vec!["out.json".to_string()],
                        serde_json::json!({"count": 1}),
                    ))
                },
            )
            .await
            .unwrap();
            assert!(outcome.succeeded());
        }

        assert_eq!(runs.load(Ordering::SeqCst), 1, "second call must not recompute");

        let manifest = ctx.store.load(&asset_id).unwrap();
        let record = manifest.stage(Stage::Frames).unwrap();
        assert_eq!(record.status, StageStatus::Done);
        // Cache hits leave the manifest untouched: one Started, one Completed.
        assert_eq!(manifest.provenance.len(), 2);
    }

    #[tokio::test]
    async fn test_fingerprint_change_forces_recompute() {
        let (_dir, ctx) = context();
        let asset_id = seed_asset(&ctx, "a1");
        let runs = AtomicUsize::new(0);
        let artifact = ctx.store.layout(&asset_id).resolve("out.json");

        for knob in [1u32, 2] {
            run_stage(&ctx, &asset_id, Stage::Frames, &Params { knob }, false, || async {
                runs.fetch_add(1, Ordering::SeqCst);
                std::fs::write(&artifact, b"{}").unwrap();
                Ok(StageOutput::new(vec!["out.json".to_string()], serde_json::Value::Null))
            })
            .await
            .unwrap();
        }

        assert_eq!(runs.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_force_always_recomputes() {
        let (_dir, ctx) = context();
        let asset_id = seed_asset(&ctx, "a1");
        let runs = AtomicUsize::new(0);
        let artifact = ctx.store.layout(&asset_id).resolve("out.json");

        for _ in 0..2 {
            run_stage(&ctx, &asset_id, Stage::Frames, &Params { knob: 1 }, true, || async {
                runs.fetch_add(1, Ordering::SeqCst);
                std::fs::write(&artifact, b"{}").unwrap();
                Ok(StageOutput::new(vec!["out.json".to_string()], serde_json::Value::Null))
            })
            .await
            .unwrap();
        }

        assert_eq!(runs.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_missing_artifact_demotes_done_stage() {
        let (_dir, ctx) = context();
        let asset_id = seed_asset(&ctx, "a1");
        let runs = AtomicUsize::new(0);
        let artifact = ctx.store.layout(&asset_id).resolve("out.json");

        run_stage(&ctx, &asset_id, Stage::Frames, &Params { knob: 1 }, false, || async {
            runs.fetch_add(1, Ordering::SeqCst);
            std::fs::write(&artifact, b"{}").unwrap();
            Ok(StageOutput::new(vec!["out.json".to_string()], serde_json::Value::Null))
        })
        .await
        .unwrap();

        // Delete the claimed artifact behind the manifest's back.
        std::fs::remove_file(&artifact).unwrap();

        run_stage(&ctx, &asset_id, Stage::Frames, &Params { knob: 1 }, false, || async {
            runs.fetch_add(1, Ordering::SeqCst);
            std::fs::write(&artifact, b"{}").unwrap();
            Ok(StageOutput::new(vec!["out.json".to_string()], serde_json::Value::Null))
        })
        .await
        .unwrap();

        assert_eq!(runs.load(Ordering::SeqCst), 2, "DONE without artifacts must demote");
    }

    #[tokio::test]
    async fn test_producer_failure_is_recorded_not_thrown() {
        let (_dir, ctx) = context();
        let asset_id = seed_asset(&ctx, "a1");

        let outcome = run_stage(
            &ctx,
            &asset_id,
            Stage::Transcript,
            &Params { knob: 1 },
            false,
            || async { Err(PipelineError::precondition("source not materialized")) },
        )
        .await
        .unwrap();

        assert_eq!(outcome.status, StageStatus::Error);
        assert!(outcome.error.as_deref().unwrap().contains("source"));

        let manifest = ctx.store.load(&asset_id).unwrap();
        let record = manifest.stage(Stage::Transcript).unwrap();
        assert_eq!(record.status, StageStatus::Error);
        assert!(record.error.is_some());
    }

    #[tokio::test]
    async fn test_unknown_asset_is_not_found() {
        let (_dir, ctx) = context();
        let err = run_stage(
            &ctx,
            &AssetId::new("ghost"),
            Stage::Frames,
            &Params { knob: 1 },
            false,
            || async { Ok(StageOutput::default()) },
        )
        .await
        .unwrap_err();
        assert!(err.is_not_found());
    }
}
