//! Asset status reporting.

use chrono::{DateTime, Utc};

use vasset_models::{AssetId, AssetMetadata, AssetStatus, Stage, StageStatus};

use crate::error::PipelineResult;
use crate::runner::PipelineContext;

/// One stage's line in the status report.
#[derive(Debug, Clone)]
pub struct StageStatusRow {
    pub stage: Stage,
    pub status: StageStatus,
    pub fingerprint: Option<String>,
    pub error: Option<String>,
    pub updated_at: Option<DateTime<Utc>>,
}

/// Summary of one asset's pipeline state.
#[derive(Debug, Clone)]
pub struct AssetStatusReport {
    pub asset_id: AssetId,
    pub status: AssetStatus,
    pub title: Option<String>,
    pub duration_seconds: Option<f64>,
    pub stages: Vec<StageStatusRow>,
    pub provenance_events: usize,
}

/// Build a status report for one asset.
pub fn show_status(ctx: &PipelineContext, asset_id: &AssetId) -> PipelineResult<AssetStatusReport> {
    let manifest = ctx.store.load(asset_id)?;
    let layout = ctx.store.layout(asset_id);

    let metadata: Option<AssetMetadata> = ctx.store.read_json(&layout.metadata_path()).ok();

    let stages = Stage::ORDER
        .iter()
        .map(|&stage| {
            let record = manifest.stage(stage);
            StageStatusRow {
                stage,
                status: record.map(|r| r.status).unwrap_or_default(),
                fingerprint: record.and_then(|r| r.params_fingerprint.clone()),
                error: record.and_then(|r| r.error.clone()),
                updated_at: record.map(|r| r.updated_at),
            }
        })
        .collect();

    Ok(AssetStatusReport {
        asset_id: asset_id.clone(),
        status: manifest.status,
        title: metadata.as_ref().map(|m| m.title.clone()),
        duration_seconds: metadata.as_ref().map(|m| m.duration_seconds),
        stages,
        provenance_events: manifest.provenance.len(),
    })
}

/// List all assets in the store.
pub fn list_assets(ctx: &PipelineContext) -> PipelineResult<Vec<AssetId>> {
    Ok(ctx.store.list_assets()?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PipelineConfig;
    use tempfile::TempDir;
    use vasset_models::{Manifest, StageRecord};

    #[test]
    fn test_status_covers_all_stages() {
        let dir = TempDir::new().unwrap();
        let config = PipelineConfig {
            data_dir: dir.path().to_path_buf(),
            ..PipelineConfig::default()
        };
        let ctx = PipelineContext::new(config);

        let asset_id = AssetId::new("a1");
        let mut manifest = Manifest::new(asset_id.clone(), "https://example.com/v");
        manifest.set_stage(Stage::Source, StageRecord::pending("fp"));
        ctx.store.save(&manifest).unwrap();

        let report = show_status(&ctx, &asset_id).unwrap();
        assert_eq!(report.stages.len(), Stage::ORDER.len());
        assert_eq!(report.stages[0].status, StageStatus::Pending);
        assert_eq!(report.stages[1].status, StageStatus::Missing);
    }
}
