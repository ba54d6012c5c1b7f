//! Full-pipeline driver: the stages in order, with stop-after and
//! stop-on-error control.
//!
//! A failed stage is recorded and the run continues by default: later
//! stages see the missing input and record their own failures, so a
//! partial asset is still inspectable. `stop_on_error` halts at the
//! first failure instead.

use std::path::PathBuf;

use vasset_media::transcribe::Transcriber;
use vasset_models::{AssetId, Stage};

use crate::error::{PipelineError, PipelineResult};
use crate::runner::{PipelineContext, StageOutcome};
use crate::stages;

/// Options for a full pipeline run.
#[derive(Debug, Clone, Default)]
pub struct PipelineOptions {
    /// Materialize this local file instead of downloading
    pub local_file: Option<PathBuf>,
    /// Stop after this stage completes
    pub until: Option<Stage>,
    /// Halt at the first failed stage instead of continuing
    pub stop_on_error: bool,
    /// Recompute every stage regardless of fingerprints
    pub force: bool,
}

/// Result of a full pipeline run.
#[derive(Debug)]
pub struct PipelineRun {
    pub asset_id: AssetId,
    /// True when every executed stage completed
    pub completed: bool,
    pub failed_stages: Vec<Stage>,
    pub outcomes: Vec<StageOutcome>,
}

/// Run the extraction pipeline for an ingested asset.
///
/// The transcription provider is checked up front when the run will
/// reach the transcript stage, so a missing configuration surfaces
/// before any stage writes state.
pub async fn run_pipeline(
    ctx: &PipelineContext,
    asset_id: &AssetId,
    transcriber: Option<&dyn Transcriber>,
    options: PipelineOptions,
) -> PipelineResult<PipelineRun> {
    if !ctx.store.asset_exists(asset_id) {
        return Err(PipelineError::NotFound(asset_id.to_string()));
    }

    let reaches = |stage: Stage| -> bool {
        match options.until {
            None => true,
            Some(until) => stage_position(stage) <= stage_position(until),
        }
    };

    if reaches(Stage::Transcript) && transcriber.is_none() {
        return Err(PipelineError::config(
            "transcription provider not configured (set VASSET_TRANSCRIBE_ENDPOINT) \
             or stop the pipeline earlier with --until",
        ));
    }

    let config = &ctx.config;
    let mut outcomes: Vec<StageOutcome> = Vec::new();
    let mut failed_stages: Vec<Stage> = Vec::new();

    for stage in Stage::ORDER {
        if !reaches(stage) {
            break;
        }

        let outcome = match stage {
            Stage::Source => {
                stages::source::run(
                    ctx,
                    asset_id,
                    stages::source::SourceParams {
                        local_file: options.local_file.clone(),
                    },
                    options.force,
                )
                .await?
            }
            Stage::Frames => {
                stages::frames::run(
                    ctx,
                    asset_id,
                    stages::frames::FramesParams {
                        interval_sec: config.interval_sec,
                        scene_thresh: config.scene_thresh,
                        max_frames: config.max_frames,
                    },
                    options.force,
                )
                .await?
            }
            Stage::Timeline => {
                stages::timeline::run(
                    ctx,
                    asset_id,
                    stages::timeline::TimelineParams {
                        bucket_sec: config.bucket_sec,
                    },
                    options.force,
                )
                .await?
            }
            Stage::Select => {
                stages::select::run(
                    ctx,
                    asset_id,
                    stages::select::SelectParams {
                        top_buckets: config.top_buckets,
                        max_frames: config.max_selected,
                    },
                    options.force,
                )
                .await?
            }
            Stage::Ocr => {
                stages::ocr::run(
                    ctx,
                    asset_id,
                    stages::ocr::OcrStageParams {
                        lang: config.ocr_lang.clone(),
                        psm: config.ocr_psm,
                    },
                    options.force,
                )
                .await?
            }
            Stage::OcrNormalize => {
                stages::ocr_normalize::run(
                    ctx,
                    asset_id,
                    stages::ocr_normalize::OcrNormalizeParams {
                        min_conf: config.ocr_min_conf,
                    },
                    options.force,
                )
                .await?
            }
            Stage::Transcript => {
                let transcriber = transcriber.expect("checked above");
                stages::transcript::run(
                    ctx,
                    asset_id,
                    stages::transcript::TranscriptParams {
                        provider: transcriber.provider_name().to_string(),
                        model: config.transcribe_model.clone(),
                    },
                    transcriber,
                    options.force,
                )
                .await?
            }
            Stage::Index => {
                stages::index::run(
                    ctx,
                    asset_id,
                    stages::index::IndexParams {
                        merge_max_chars: config.merge_max_chars,
                    },
                    options.force,
                )
                .await?
            }
        };

        let succeeded = outcome.succeeded();
        outcomes.push(outcome);

        if !succeeded {
            failed_stages.push(stage);
            if options.stop_on_error {
                break;
            }
        }

        if options.until == Some(stage) {
            break;
        }
    }

    Ok(PipelineRun {
        asset_id: asset_id.clone(),
        completed: failed_stages.is_empty(),
        failed_stages,
        outcomes,
    })
}

fn stage_position(stage: Stage) -> usize {
    Stage::ORDER
        .iter()
        .position(|s| *s == stage)
        .expect("stage in ORDER")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_position_follows_order() {
        assert!(stage_position(Stage::Source) < stage_position(Stage::Frames));
        assert!(stage_position(Stage::Transcript) < stage_position(Stage::Index));
    }
}
