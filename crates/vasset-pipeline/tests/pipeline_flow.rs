//! Cross-stage flows driven through the stage runner with stub
//! producers; no external binaries, no network.

use tempfile::TempDir;

use vasset_models::{
    AssetId, AssetMetadata, EvidenceKind, FrameId, Manifest, NormalizedOcr, SegmentId, Stage,
    StageStatus, TranscriptSegment,
};
use vasset_pipeline::query::{gather_evidence, query_asset};
use vasset_pipeline::stages::index::{self, IndexParams};
use vasset_pipeline::{run_stage, PipelineConfig, PipelineContext, StageOutput};

fn context() -> (TempDir, PipelineContext) {
    let dir = TempDir::new().unwrap();
    let config = PipelineConfig {
        data_dir: dir.path().to_path_buf(),
        ..PipelineConfig::default()
    };
    (dir, PipelineContext::new(config))
}

fn seed_asset(ctx: &PipelineContext, id: &str) -> AssetId {
    let asset_id = AssetId::new(id);
    let manifest = Manifest::new(asset_id.clone(), "https://example.com/v");
    ctx.store.save(&manifest).unwrap();

    let metadata = AssetMetadata::new(asset_id.clone(), "https://example.com/v", "Test video");
    ctx.store
        .write_json(&ctx.store.layout(&asset_id).metadata_path(), &metadata)
        .unwrap();
    asset_id
}

fn segments(count: usize) -> Vec<TranscriptSegment> {
    (1..=count)
        .map(|i| TranscriptSegment {
            segment_id: SegmentId::from_index(i),
            start_ms: (i as i64 - 1) * 5000,
            end_ms: (i as i64) * 5000,
            text: format!("segment {} mentions rust pipelines", i),
        })
        .collect()
}

/// Mark the transcript stage DONE through the runner, writing the given
/// segments as its artifact.
async fn complete_transcript_stage(
    ctx: &PipelineContext,
    asset_id: &AssetId,
    segs: Vec<TranscriptSegment>,
    knob: u32,
) {
    let layout = ctx.store.layout(asset_id);
    let outcome = run_stage(
        ctx,
        asset_id,
        Stage::Transcript,
        &serde_json::json!({ "provider": "stub", "knob": knob }),
        false,
        || async {
            ctx.store
                .write_jsonl(&layout.transcript_file(), &segs)
                .unwrap();
            Ok(StageOutput::new(
                vec!["transcript.jsonl".to_string()],
                serde_json::json!({ "segment_count": segs.len() }),
            ))
        },
    )
    .await
    .unwrap();
    assert_eq!(outcome.status, StageStatus::Done);
}

#[tokio::test]
async fn test_index_then_query_roundtrip() {
    let (_dir, ctx) = context();
    let asset_id = seed_asset(&ctx, "a1");

    complete_transcript_stage(&ctx, &asset_id, segments(3), 1).await;

    // One OCR frame alongside the transcript.
    let layout = ctx.store.layout(&asset_id);
    ctx.store
        .write_jsonl(
            &layout.ocr_text_file(),
            &[NormalizedOcr {
                frame_id: FrameId::from_index(2),
                ts_ms: Some(18_000),
                text: "slide about evidence retrieval".to_string(),
                line_count: 1,
            }],
        )
        .unwrap();

    let outcome = index::run(&ctx, &asset_id, IndexParams { merge_max_chars: 0 }, false)
        .await
        .unwrap();
    assert_eq!(outcome.status, StageStatus::Done);
    assert_eq!(outcome.metrics["transcript_units"], 3);
    assert_eq!(outcome.metrics["ocr_units"], 1);

    let pack = query_asset(&ctx, &asset_id, "rust pipelines", 8).unwrap();
    assert_eq!(pack.items.len(), 3);
    for item in &pack.items {
        assert!(!item.citation.is_empty());
        assert_eq!(item.kind, EvidenceKind::Transcript);
        assert!(item.citation.starts_with("[seg:SEG_"));
    }

    // Scores come back descending.
    for window in pack.items.windows(2) {
        assert!(window[0].score >= window[1].score);
    }

    let ocr_pack = query_asset(&ctx, &asset_id, "retrieval", 8).unwrap();
    assert_eq!(ocr_pack.items.len(), 1);
    assert_eq!(ocr_pack.items[0].citation, "[frame:KF_000002 t=0:18]");
}

#[tokio::test]
async fn test_reindex_replaces_stale_units() {
    let (_dir, ctx) = context();
    let asset_id = seed_asset(&ctx, "a1");

    complete_transcript_stage(&ctx, &asset_id, segments(10), 1).await;
    index::run(&ctx, &asset_id, IndexParams { merge_max_chars: 0 }, false)
        .await
        .unwrap();

    // Transcript grows from 10 to 12 segments; re-run and re-index.
    complete_transcript_stage(&ctx, &asset_id, segments(12), 2).await;
    let outcome = index::run(&ctx, &asset_id, IndexParams { merge_max_chars: 0 }, true)
        .await
        .unwrap();
    assert_eq!(outcome.metrics["transcript_units"], 12);

    let db = vasset_store::EvidenceDb::open_or_create(&ctx.config.db_path()).unwrap();
    let count = db
        .count_for_asset(&asset_id, EvidenceKind::Transcript)
        .unwrap();
    assert_eq!(count, 12, "exactly 12 units, no stale 10 remaining");
}

#[tokio::test]
async fn test_index_without_transcript_records_failure() {
    let (_dir, ctx) = context();
    let asset_id = seed_asset(&ctx, "a1");

    let outcome = index::run(&ctx, &asset_id, IndexParams { merge_max_chars: 0 }, false)
        .await
        .unwrap();

    assert_eq!(outcome.status, StageStatus::Error);
    let manifest = ctx.store.load(&asset_id).unwrap();
    let record = manifest.stage(Stage::Index).unwrap();
    assert_eq!(record.status, StageStatus::Error);
    assert!(record.error.as_deref().unwrap().contains("transcript"));
}

#[tokio::test]
async fn test_query_time_ordered_evidence() {
    let (_dir, ctx) = context();
    let asset_id = seed_asset(&ctx, "a1");

    // Reverse-salience segments: the best match is the latest one.
    let segs = vec![
        TranscriptSegment {
            segment_id: SegmentId::from_index(1),
            start_ms: 0,
            end_ms: 5000,
            text: "an aside".to_string(),
        },
        TranscriptSegment {
            segment_id: SegmentId::from_index(2),
            start_ms: 5000,
            end_ms: 10_000,
            text: "keyword mentioned once".to_string(),
        },
        TranscriptSegment {
            segment_id: SegmentId::from_index(3),
            start_ms: 10_000,
            end_ms: 15_000,
            text: "keyword keyword keyword".to_string(),
        },
    ];
    complete_transcript_stage(&ctx, &asset_id, segs, 1).await;
    index::run(&ctx, &asset_id, IndexParams { merge_max_chars: 0 }, false)
        .await
        .unwrap();

    let pack = gather_evidence(&ctx, &asset_id, "keyword", 8).unwrap();
    assert_eq!(pack.items.len(), 2);
    assert!(pack.items[0].start_ms <= pack.items[1].start_ms);
}

#[tokio::test]
async fn test_transcript_rerun_with_same_params_is_cached() {
    let (_dir, ctx) = context();
    let asset_id = seed_asset(&ctx, "a1");

    complete_transcript_stage(&ctx, &asset_id, segments(2), 7).await;
    let manifest_before = ctx.store.load(&asset_id).unwrap();

    // Same params: the runner must skip the producer and leave the
    // manifest untouched.
    let outcome = run_stage(
        &ctx,
        &asset_id,
        Stage::Transcript,
        &serde_json::json!({ "provider": "stub", "knob": 7 }),
        false,
        || async {
            panic!("producer must not run on a cache hit");
            #[allow(unreachable_code)]
            Ok(StageOutput::default())
        },
    )
    .await
    .unwrap();

    assert!(outcome.cached);
    let manifest_after = ctx.store.load(&asset_id).unwrap();
    assert_eq!(
        manifest_before.provenance.len(),
        manifest_after.provenance.len()
    );
}
