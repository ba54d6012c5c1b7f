//! Transcript stage: extract audio and call the transcription provider.
//!
//! Quota exhaustion is a recorded failure; a provider that finds no
//! speech is a successful run with zero segments. The provider's raw
//! response timing lives in the segments themselves; the audio file is
//! kept as provenance for reruns.

use serde::Serialize;
use serde_json::json;

use vasset_media::audio::extract_audio_adaptive;
use vasset_media::transcribe::Transcriber;
use vasset_models::{AssetId, Stage};
use vasset_store::layout::{AUDIO_DIR, TRANSCRIPT_FILE};

use crate::error::{PipelineError, PipelineResult};
use crate::runner::{require_stage_done, run_stage, PipelineContext, StageOutcome, StageOutput};

/// Transcription stage parameters.
#[derive(Debug, Clone, Serialize)]
pub struct TranscriptParams {
    /// Provider name, part of the fingerprint so switching providers
    /// re-runs the stage
    pub provider: String,
    pub model: String,
}

/// Run the transcript stage with the given provider.
///
/// A missing provider configuration is a configuration error surfaced
/// before any state is written.
pub async fn run(
    ctx: &PipelineContext,
    asset_id: &AssetId,
    params: TranscriptParams,
    transcriber: &dyn Transcriber,
    force: bool,
) -> PipelineResult<StageOutcome> {
    let layout = ctx.store.layout(asset_id);

    run_stage(ctx, asset_id, Stage::Transcript, &params, force, || async move {
        require_stage_done(&ctx.store, asset_id, Stage::Source)?;

        let video_path = layout.source_video_path();
        if !video_path.exists() {
            return Err(PipelineError::DataIntegrity(format!(
                "source video missing: {}",
                video_path.display()
            )));
        }

        let audio = extract_audio_adaptive(
            &video_path,
            &layout.audio_dir(),
            ctx.config.audio_max_bytes,
        )
        .await?;

        let segments = transcriber.transcribe(&audio.path).await?;
        ctx.store.write_jsonl(&layout.transcript_file(), &segments)?;

        let audio_ref = format!("{}/audio.m4a", AUDIO_DIR);
        Ok(StageOutput::new(
            vec![TRANSCRIPT_FILE.to_string(), audio_ref],
            json!({
                "segment_count": segments.len(),
                "audio_bitrate_kbps": audio.bitrate_kbps,
                "audio_bytes": audio.size_bytes,
            }),
        ))
    })
    .await
}
