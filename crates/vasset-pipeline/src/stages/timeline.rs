//! Timeline stage: score retained frames and aggregate into buckets.
//!
//! Scoring never touches OCR or ASR output, so this stage only depends on
//! the frames stage. Buckets partition `[0, duration)` contiguously;
//! windows with no sampled frame are kept with score 0.0.

use serde::Serialize;
use serde_json::json;

use vasset_models::{
    AssetId, AssetMetadata, FrameRecord, FrameScore, Stage, Timeline, TimelineBucket,
};
use vasset_store::layout::{SCORES_FILE, TIMELINE_FILE};

use crate::density::score_image;
use crate::error::{PipelineError, PipelineResult};
use crate::runner::{require_stage_done, run_stage, PipelineContext, StageOutcome, StageOutput};

/// Frames per bucket recorded as that bucket's top members.
const TOP_FRAMES_PER_BUCKET: usize = 3;

/// Timeline parameters.
#[derive(Debug, Clone, Serialize)]
pub struct TimelineParams {
    pub bucket_sec: u32,
}

/// Run the timeline stage.
pub async fn run(
    ctx: &PipelineContext,
    asset_id: &AssetId,
    params: TimelineParams,
    force: bool,
) -> PipelineResult<StageOutcome> {
    if params.bucket_sec == 0 {
        return Err(PipelineError::config("bucket_sec must be positive"));
    }

    let layout = ctx.store.layout(asset_id);
    let params_ref = &params;

    run_stage(ctx, asset_id, Stage::Timeline, &params, force, || async move {
        require_stage_done(&ctx.store, asset_id, Stage::Frames)?;

        let records: Vec<FrameRecord> = ctx.store.read_jsonl(&layout.frames_file())?;

        // Score retained frames only; duplicates have no file to score.
        let mut scores = Vec::new();
        for record in records.iter().filter(|r| r.is_retained()) {
            let Some(rel) = &record.path else { continue };
            let image_path = layout.resolve(rel);
            if !image_path.exists() {
                return Err(PipelineError::DataIntegrity(format!(
                    "frame file missing: {}",
                    image_path.display()
                )));
            }
            scores.push(FrameScore {
                frame_id: record.frame_id.clone(),
                ts_ms: record.ts_ms,
                score: score_image(&image_path),
            });
        }

        if scores.is_empty() {
            return Err(PipelineError::precondition("no scoreable frames found"));
        }

        let metadata: AssetMetadata = ctx.store.read_json(&layout.metadata_path())?;
        let duration_ms = (metadata.duration_seconds * 1000.0) as i64;

        let buckets = build_buckets(&scores, params_ref.bucket_sec, duration_ms);
        let timeline = Timeline {
            bucket_sec: params_ref.bucket_sec,
            buckets,
        };

        ctx.store.write_json(&layout.timeline_file(), &timeline)?;
        ctx.store.write_jsonl(&layout.scores_file(), &scores)?;

        Ok(StageOutput::new(
            vec![TIMELINE_FILE.to_string(), SCORES_FILE.to_string()],
            json!({
                "bucket_count": timeline.buckets.len(),
                "scored_frames": scores.len(),
            }),
        ))
    })
    .await
}

/// Partition `[0, duration_ms)` into contiguous fixed-width buckets and
/// aggregate frame scores into them.
///
/// A frame belongs to exactly one bucket (`ts_ms / bucket_ms`; frames
/// without a timestamp land in bucket 0). A bucket's score is the mean
/// of its top member scores; empty buckets score 0.0 and keep their
/// slot. The bucket range always covers every frame even if a timestamp
/// exceeds the reported duration.
pub fn build_buckets(scores: &[FrameScore], bucket_sec: u32, duration_ms: i64) -> Vec<TimelineBucket> {
    let bucket_ms = bucket_sec as i64 * 1000;

    let mut bucket_count = if duration_ms > 0 {
        // ceil(duration / bucket) without floats
        ((duration_ms + bucket_ms - 1) / bucket_ms) as usize
    } else {
        0
    };

    // Membership first, extending the range for out-of-duration frames.
    let mut members: Vec<(usize, &FrameScore)> = Vec::with_capacity(scores.len());
    for score in scores {
        let ts = score.ts_ms.unwrap_or(0).max(0);
        let index = (ts / bucket_ms) as usize;
        if index + 1 > bucket_count {
            bucket_count = index + 1;
        }
        members.push((index, score));
    }

    let mut buckets: Vec<TimelineBucket> = (0..bucket_count)
        .map(|index| TimelineBucket {
            index: index as u64,
            start_ms: index as i64 * bucket_ms,
            end_ms: (index as i64 + 1) * bucket_ms,
            score: 0.0,
            top_frames: Vec::new(),
        })
        .collect();

    let mut per_bucket: Vec<Vec<&FrameScore>> = vec![Vec::new(); bucket_count];
    for (index, score) in members {
        per_bucket[index].push(score);
    }

    for (index, mut frames) in per_bucket.into_iter().enumerate() {
        if frames.is_empty() {
            continue;
        }
        // Score descending; ties to the earlier frame id for determinism.
        frames.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.frame_id.cmp(&b.frame_id))
        });

        let top: Vec<_> = frames.iter().take(TOP_FRAMES_PER_BUCKET).collect();
        let mean = top.iter().map(|f| f.score).sum::<f64>() / top.len() as f64;

        buckets[index].score = (mean * 10000.0).round() / 10000.0;
        buckets[index].top_frames = top.iter().map(|f| f.frame_id.clone()).collect();
    }

    buckets
}
