//! OCR stage: run the recognition engine over the selected frames.
//!
//! Raw spans are recorded per frame, including frames where the engine
//! found nothing; "no text" is an outcome, not an omission.

use serde::Serialize;
use serde_json::json;

use vasset_media::ocr::{recognize_spans, OcrParams};
use vasset_models::{AssetId, FrameOcr, Selection, Stage};
use vasset_store::layout::OCR_FILE;

use crate::error::PipelineResult;
use crate::runner::{require_stage_done, run_stage, PipelineContext, StageOutcome, StageOutput};

/// Recognition stage parameters.
#[derive(Debug, Clone, Serialize)]
pub struct OcrStageParams {
    pub lang: String,
    pub psm: u8,
}

/// Run the OCR stage.
pub async fn run(
    ctx: &PipelineContext,
    asset_id: &AssetId,
    params: OcrStageParams,
    force: bool,
) -> PipelineResult<StageOutcome> {
    let layout = ctx.store.layout(asset_id);
    let params_ref = &params;

    run_stage(ctx, asset_id, Stage::Ocr, &params, force, || async move {
        require_stage_done(&ctx.store, asset_id, Stage::Select)?;

        let selection: Selection = ctx.store.read_json(&layout.selection_file())?;
        let engine_params = OcrParams {
            lang: params_ref.lang.clone(),
            psm: params_ref.psm,
        };

        // Empty selection propagates as zero records, not a failure.
        let mut records = Vec::with_capacity(selection.frames.len());
        for frame in &selection.frames {
            let image_path = layout.resolve(&frame.path);
            let spans = recognize_spans(&image_path, &engine_params).await?;
            records.push(FrameOcr {
                frame_id: frame.frame_id.clone(),
                ts_ms: frame.ts_ms,
                spans,
            });
        }

        ctx.store.write_jsonl(&layout.ocr_file(), &records)?;

        let with_text = records.iter().filter(|r| !r.spans.is_empty()).count();
        Ok(StageOutput::new(
            vec![OCR_FILE.to_string()],
            json!({
                "frames": records.len(),
                "frames_with_text": with_text,
            }),
        ))
    })
    .await
}
