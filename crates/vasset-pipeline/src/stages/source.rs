//! Source stage: materialize a playable video file for the asset.
//!
//! Either copies a caller-provided local file or downloads the source
//! URL. The file lands at `source/video.mp4` via an atomic move and is
//! probed to confirm it decodes.

use serde::Serialize;
use serde_json::json;
use std::path::PathBuf;

use vasset_media::fetch::download_video;
use vasset_media::fs_utils::move_file;
use vasset_media::probe::probe_video;
use vasset_models::{AssetId, Stage};
use vasset_store::layout::SOURCE_VIDEO;

use crate::error::{PipelineError, PipelineResult};
use crate::runner::{run_stage, PipelineContext, StageOutcome, StageOutput};

/// Source materialization parameters.
#[derive(Debug, Clone, Serialize)]
pub struct SourceParams {
    /// Copy this local file instead of downloading
    pub local_file: Option<PathBuf>,
}

/// Run the source stage.
pub async fn run(
    ctx: &PipelineContext,
    asset_id: &AssetId,
    params: SourceParams,
    force: bool,
) -> PipelineResult<StageOutcome> {
    let layout = ctx.store.layout(asset_id);
    let manifest = ctx.store.load(asset_id)?;
    let source_url = manifest.source_url.clone();
    let params_ref = &params;

    run_stage(ctx, asset_id, Stage::Source, &params, force, || async move {
        let dest = layout.source_video_path();

        match &params_ref.local_file {
            Some(local) => {
                validate_local_file(local, ctx)?;
                // Stage through a temp name so the destination only ever
                // appears complete.
                let staging = dest.with_extension("staging");
                tokio::fs::create_dir_all(dest.parent().expect("source dir")).await?;
                tokio::fs::copy(local, &staging).await?;
                move_file(&staging, &dest).await?;
            }
            None => {
                let staging = dest.with_extension("staging");
                download_video(&source_url, &staging).await?;
                move_file(&staging, &dest).await?;
            }
        }

        let info = probe_video(&dest).await?;
        Ok(StageOutput::new(
            vec![SOURCE_VIDEO.to_string()],
            json!({
                "duration": info.duration,
                "width": info.width,
                "height": info.height,
            }),
        ))
    })
    .await
}

/// Refuse unreadable files and files already inside the assets tree
/// (copying a managed artifact over itself corrupts the asset).
fn validate_local_file(local: &PathBuf, ctx: &PipelineContext) -> PipelineResult<()> {
    if !local.is_file() {
        return Err(PipelineError::precondition(format!(
            "local file not found: {}",
            local.display()
        )));
    }

    let local_resolved = local.canonicalize()?;
    if let Ok(assets_resolved) = ctx.store.assets_dir().canonicalize() {
        if local_resolved.starts_with(&assets_resolved) {
            return Err(PipelineError::precondition(format!(
                "refusing to copy a file from inside the assets directory: {}",
                local.display()
            )));
        }
    }
    Ok(())
}
