//! Select stage: pick representative frames from the top buckets.
//!
//! Rank buckets by score (ties to the earlier window), take each top
//! bucket's best frame first, then fill to the cap in score order.
//! Selected images are copied to `frames_selected/` so later stages
//! never reach into the raw sample pool.

use serde::Serialize;
use serde_json::json;
use std::collections::HashMap;
use std::fs;

use vasset_models::{
    AssetId, FrameRecord, FrameScore, SelectedFrame, Selection, Stage, Timeline, TimelineBucket,
};
use vasset_store::layout::{SELECTED_DIR, SELECTION_FILE};

use crate::error::PipelineResult;
use crate::runner::{require_stage_done, run_stage, PipelineContext, StageOutcome, StageOutput};

/// Selection parameters.
#[derive(Debug, Clone, Serialize)]
pub struct SelectParams {
    /// How many highest-scoring buckets to draw from
    pub top_buckets: usize,
    /// Selection size cap
    pub max_frames: usize,
}

/// Run the select stage.
pub async fn run(
    ctx: &PipelineContext,
    asset_id: &AssetId,
    params: SelectParams,
    force: bool,
) -> PipelineResult<StageOutcome> {
    let layout = ctx.store.layout(asset_id);
    let params_ref = &params;

    run_stage(ctx, asset_id, Stage::Select, &params, force, || async move {
        require_stage_done(&ctx.store, asset_id, Stage::Timeline)?;

        let timeline: Timeline = ctx.store.read_json(&layout.timeline_file())?;
        let scores: Vec<FrameScore> = ctx.store.read_jsonl(&layout.scores_file())?;
        let records: Vec<FrameRecord> = ctx.store.read_jsonl(&layout.frames_file())?;

        let mut selection = select_frames(
            &timeline.buckets,
            &scores,
            &records,
            params_ref.top_buckets,
            params_ref.max_frames,
        );

        // Copy the winners into their own directory. An empty selection
        // is a valid outcome, not a failure.
        let selected_dir = layout.selected_dir();
        if selected_dir.exists() {
            fs::remove_dir_all(&selected_dir)?;
        }
        fs::create_dir_all(&selected_dir)?;

        let source_paths: HashMap<&str, &str> = records
            .iter()
            .filter_map(|r| {
                r.path
                    .as_deref()
                    .map(|p| (r.frame_id.as_str(), p))
            })
            .collect();

        for frame in &mut selection.frames {
            let Some(src_rel) = source_paths.get(frame.frame_id.as_str()) else {
                continue;
            };
            let src = layout.resolve(src_rel);
            let file_name = src
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_default();
            let dest_rel = format!("{}/{}", SELECTED_DIR, file_name);
            fs::copy(&src, layout.resolve(&dest_rel))?;
            frame.path = dest_rel;
        }

        ctx.store.write_json(&layout.selection_file(), &selection)?;

        Ok(StageOutput::new(
            vec![SELECTION_FILE.to_string(), SELECTED_DIR.to_string()],
            json!({
                "selected": selection.frames.len(),
                "source_buckets": selection.source_buckets.len(),
            }),
        ))
    })
    .await
}

/// Deterministic selection from the top-scoring buckets.
///
/// First pass takes each chosen bucket's best member (bucket rank
/// order); the second pass fills remaining capacity from those buckets'
/// other members in score order, ties to the earlier timestamp then
/// frame id. The final list is time-ordered.
pub fn select_frames(
    buckets: &[TimelineBucket],
    scores: &[FrameScore],
    records: &[FrameRecord],
    top_buckets: usize,
    max_frames: usize,
) -> Selection {
    let score_by_id: HashMap<&str, &FrameScore> =
        scores.iter().map(|s| (s.frame_id.as_str(), s)).collect();
    let record_by_id: HashMap<&str, &FrameRecord> =
        records.iter().map(|r| (r.frame_id.as_str(), r)).collect();

    // Rank buckets: score descending, ties to the lower index.
    let mut ranked: Vec<&TimelineBucket> = buckets.iter().filter(|b| !b.is_empty()).collect();
    ranked.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.index.cmp(&b.index))
    });
    ranked.truncate(top_buckets);

    let mut selection = Selection::empty(top_buckets, max_frames);
    selection.source_buckets = ranked.iter().map(|b| b.index).collect();

    let candidate = |bucket: &TimelineBucket, frame_id: &str| -> Option<SelectedFrame> {
        let score = score_by_id.get(frame_id)?;
        // Only frames with a file on disk can be selected.
        record_by_id.get(frame_id)?.path.as_deref()?;
        Some(SelectedFrame {
            frame_id: score.frame_id.clone(),
            ts_ms: score.ts_ms,
            score: score.score,
            path: String::new(),
            bucket_index: bucket.index,
        })
    };

    let mut chosen: Vec<SelectedFrame> = Vec::new();
    let mut taken: std::collections::HashSet<String> = std::collections::HashSet::new();

    // Pass 1: one representative per bucket, bucket rank order.
    for bucket in &ranked {
        if chosen.len() >= max_frames {
            break;
        }
        if let Some(best) = bucket
            .top_frames
            .iter()
            .filter_map(|id| candidate(bucket, id.as_str()))
            .next()
        {
            if taken.insert(best.frame_id.as_str().to_string()) {
                chosen.push(best);
            }
        }
    }

    // Pass 2: fill with the remaining pool in score order.
    let mut pool: Vec<SelectedFrame> = ranked
        .iter()
        .flat_map(|bucket| {
            bucket
                .top_frames
                .iter()
                .filter_map(|id| candidate(bucket, id.as_str()))
        })
        .filter(|f| !taken.contains(f.frame_id.as_str()))
        .collect();
    pool.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.ts_ms.unwrap_or(0).cmp(&b.ts_ms.unwrap_or(0)))
            .then_with(|| a.frame_id.cmp(&b.frame_id))
    });
    for frame in pool {
        if chosen.len() >= max_frames {
            break;
        }
        if taken.insert(frame.frame_id.as_str().to_string()) {
            chosen.push(frame);
        }
    }

    // Time-ordered output.
    chosen.sort_by(|a, b| {
        a.ts_ms
            .unwrap_or(0)
            .cmp(&b.ts_ms.unwrap_or(0))
            .then_with(|| a.frame_id.cmp(&b.frame_id))
    });
    selection.frames = chosen;
    selection
}

#[cfg(test)]
mod tests {
    use super::*;
    use vasset_models::{FrameId, FrameSource};

    fn fixture(
        bucket_frames: &[(u64, f64, &[(usize, i64, f64)])],
    ) -> (Vec<TimelineBucket>, Vec<FrameScore>, Vec<FrameRecord>) {
        let mut buckets = Vec::new();
        let mut scores = Vec::new();
        let mut records = Vec::new();

        for (index, bucket_score, frames) in bucket_frames {
            let mut sorted: Vec<_> = frames.to_vec();
            sorted.sort_by(|a, b| b.2.partial_cmp(&a.2).unwrap());
            buckets.push(TimelineBucket {
                index: *index,
                start_ms: *index as i64 * 15_000,
                end_ms: (*index as i64 + 1) * 15_000,
                score: *bucket_score,
                top_frames: sorted.iter().map(|(i, _, _)| FrameId::from_index(*i)).collect(),
            });
            for (i, ts, score) in frames.iter() {
                scores.push(FrameScore {
                    frame_id: FrameId::from_index(*i),
                    ts_ms: Some(*ts),
                    score: *score,
                });
                records.push(FrameRecord {
                    frame_id: FrameId::from_index(*i),
                    ts_ms: Some(*ts),
                    path: Some(format!("frames/frame_{:06}.png", i)),
                    digest: format!("digest{}", i),
                    source: FrameSource::Uniform,
                    is_duplicate: false,
                    duplicate_of: None,
                });
            }
        }
        (buckets, scores, records)
    }

    #[test]
    fn test_one_representative_per_bucket_first() {
        let (buckets, scores, records) = fixture(&[
            (0, 0.9, &[(1, 0, 0.9), (2, 1_000, 0.8)]),
            (1, 0.5, &[(3, 15_000, 0.5)]),
            (2, 0.3, &[(4, 30_000, 0.3)]),
        ]);

        let selection = select_frames(&buckets, &scores, &records, 3, 3);

        // Every bucket is represented before any bucket doubles up.
        let bucket_indices: std::collections::HashSet<u64> =
            selection.frames.iter().map(|f| f.bucket_index).collect();
        assert_eq!(bucket_indices.len(), 3);
        assert_eq!(selection.frames.len(), 3);
    }

    #[test]
    fn test_fill_pass_respects_cap() {
        let (buckets, scores, records) = fixture(&[
            (0, 0.9, &[(1, 0, 0.9), (2, 1_000, 0.8), (3, 2_000, 0.7)]),
            (1, 0.5, &[(4, 15_000, 0.5)]),
        ]);

        let selection = select_frames(&buckets, &scores, &records, 2, 3);

        assert_eq!(selection.frames.len(), 3);
        // The fill frame is the best leftover (frame 2), not frame 3.
        let ids: Vec<&str> = selection.frames.iter().map(|f| f.frame_id.as_str()).collect();
        assert!(ids.contains(&"KF_000002"));
        assert!(!ids.contains(&"KF_000003"));
    }

    #[test]
    fn test_every_selected_frame_is_from_a_top_bucket() {
        let (buckets, scores, records) = fixture(&[
            (0, 0.2, &[(1, 0, 0.2)]),
            (1, 0.9, &[(2, 15_000, 0.9)]),
            (2, 0.8, &[(3, 30_000, 0.8)]),
        ]);

        let selection = select_frames(&buckets, &scores, &records, 2, 10);

        assert_eq!(selection.source_buckets, vec![1, 2]);
        for frame in &selection.frames {
            assert!(selection.source_buckets.contains(&frame.bucket_index));
        }
    }

    #[test]
    fn test_bucket_ties_break_to_earlier_window() {
        let (buckets, scores, records) = fixture(&[
            (0, 0.5, &[(1, 0, 0.5)]),
            (1, 0.5, &[(2, 15_000, 0.5)]),
            (2, 0.5, &[(3, 30_000, 0.5)]),
        ]);

        let selection = select_frames(&buckets, &scores, &records, 2, 10);
        assert_eq!(selection.source_buckets, vec![0, 1]);
    }

    #[test]
    fn test_selection_is_deterministic() {
        let (buckets, scores, records) = fixture(&[
            (0, 0.9, &[(1, 0, 0.9), (2, 1_000, 0.9)]),
            (1, 0.7, &[(3, 15_000, 0.7)]),
        ]);

        let a = select_frames(&buckets, &scores, &records, 2, 3);
        let b = select_frames(&buckets, &scores, &records, 2, 3);
        assert_eq!(a.frame_ids(), b.frame_ids());
    }

    #[test]
    fn test_output_is_time_ordered() {
        let (buckets, scores, records) = fixture(&[
            (0, 0.3, &[(1, 0, 0.3)]),
            (3, 0.9, &[(4, 45_000, 0.9)]),
            (1, 0.6, &[(2, 15_000, 0.6)]),
        ]);

        let selection = select_frames(&buckets, &scores, &records, 3, 10);
        let timestamps: Vec<i64> = selection.frames.iter().map(|f| f.ts_ms.unwrap()).collect();
        let mut sorted = timestamps.clone();
        sorted.sort();
        assert_eq!(timestamps, sorted);
    }

    #[test]
    fn test_empty_input_yields_empty_selection() {
        let selection = select_frames(&[], &[], &[], 5, 10);
        assert!(selection.frames.is_empty());
        assert!(selection.source_buckets.is_empty());
    }
}
