//! Index stage: chunk transcript and OCR text into evidence units and
//! persist them, replacing any prior units for the asset.

use serde::Serialize;
use serde_json::json;

use vasset_models::{
    AssetId, EvidenceKind, EvidenceUnit, NormalizedOcr, Stage, TranscriptSegment,
};
use vasset_store::EvidenceDb;

use crate::error::{PipelineError, PipelineResult};
use crate::runner::{require_stage_done, run_stage, PipelineContext, StageOutcome, StageOutput};

/// Index parameters.
#[derive(Debug, Clone, Serialize)]
pub struct IndexParams {
    /// Merge adjacent transcript segments up to this many characters;
    /// 0 indexes one unit per segment
    pub merge_max_chars: usize,
}

/// Run the index stage.
pub async fn run(
    ctx: &PipelineContext,
    asset_id: &AssetId,
    params: IndexParams,
    force: bool,
) -> PipelineResult<StageOutcome> {
    let layout = ctx.store.layout(asset_id);
    let params_ref = &params;

    run_stage(ctx, asset_id, Stage::Index, &params, force, || async move {
        require_stage_done(&ctx.store, asset_id, Stage::Transcript)?;

        let segments: Vec<TranscriptSegment> = ctx.store.read_jsonl(&layout.transcript_file())?;

        // OCR text is optional evidence; a missing file means the OCR
        // stages were skipped or failed, and indexing proceeds without.
        let ocr_records: Vec<NormalizedOcr> = if layout.ocr_text_file().exists() {
            ctx.store.read_jsonl(&layout.ocr_text_file())?
        } else {
            Vec::new()
        };

        let mut units = chunk_transcript(asset_id, &segments, params_ref.merge_max_chars);
        let transcript_count = units.len();
        units.extend(chunk_ocr(asset_id, &ocr_records));
        let ocr_count = units.len() - transcript_count;

        if units.is_empty() {
            return Err(PipelineError::precondition(
                "no content to index (transcript and OCR both empty)",
            ));
        }

        let mut db = EvidenceDb::open_or_create(&ctx.config.db_path())?;
        let indexed = db.replace_asset_evidence(asset_id, &units)?;

        Ok(StageOutput::new(
            Vec::new(),
            json!({
                "indexed": indexed,
                "transcript_units": transcript_count,
                "ocr_units": ocr_count,
            }),
        ))
    })
    .await
}

/// Build transcript evidence units, optionally merging adjacent short
/// segments up to a character budget.
///
/// A merged unit spans the first segment's start to the last segment's
/// end and keeps the first segment's id as its source reference.
pub fn chunk_transcript(
    asset_id: &AssetId,
    segments: &[TranscriptSegment],
    merge_max_chars: usize,
) -> Vec<EvidenceUnit> {
    let mut units: Vec<EvidenceUnit> = Vec::new();

    for segment in segments {
        let text = segment.text.trim();
        if text.is_empty() {
            continue;
        }

        if merge_max_chars > 0 {
            if let Some(last) = units.last_mut() {
                let combined_len = last.text.chars().count() + 1 + text.chars().count();
                if combined_len <= merge_max_chars {
                    last.text.push(' ');
                    last.text.push_str(text);
                    last.end_ms = Some(segment.end_ms);
                    continue;
                }
            }
        }

        units.push(EvidenceUnit {
            asset_id: asset_id.clone(),
            kind: EvidenceKind::Transcript,
            source_id: segment.segment_id.as_str().to_string(),
            start_ms: segment.start_ms,
            end_ms: Some(segment.end_ms),
            text: text.to_string(),
        });
    }

    units
}

/// Build OCR evidence units: one per frame with non-empty text.
pub fn chunk_ocr(asset_id: &AssetId, records: &[NormalizedOcr]) -> Vec<EvidenceUnit> {
    records
        .iter()
        .filter(|record| !record.text.trim().is_empty())
        .map(|record| EvidenceUnit {
            asset_id: asset_id.clone(),
            kind: EvidenceKind::OcrFrame,
            source_id: record.frame_id.as_str().to_string(),
            start_ms: record.ts_ms.unwrap_or(0),
            end_ms: None,
            text: record.text.trim().to_string(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use vasset_models::{FrameId, SegmentId};

    fn segment(index: usize, start_ms: i64, end_ms: i64, text: &str) -> TranscriptSegment {
        TranscriptSegment {
            segment_id: SegmentId::from_index(index),
            start_ms,
            end_ms,
            text: text.to_string(),
        }
    }

    #[test]
    fn test_no_merge_one_unit_per_segment() {
        let asset = AssetId::new("a1");
        let segments = vec![
            segment(1, 0, 2000, "first"),
            segment(2, 2000, 4000, "second"),
        ];

        let units = chunk_transcript(&asset, &segments, 0);

        assert_eq!(units.len(), 2);
        assert_eq!(units[0].source_id, "SEG_000001");
        assert_eq!(units[0].end_ms, Some(2000));
    }

    #[test]
    fn test_merge_respects_character_budget() {
        let asset = AssetId::new("a1");
        let segments = vec![
            segment(1, 0, 2000, "short"),
            segment(2, 2000, 4000, "also short"),
            segment(3, 4000, 6000, &"x".repeat(50)),
        ];

        let units = chunk_transcript(&asset, &segments, 20);

        // 1 and 2 merge (5 + 1 + 10 = 16 <= 20); 3 is too big to join.
        assert_eq!(units.len(), 2);
        assert_eq!(units[0].text, "short also short");
        assert_eq!(units[0].source_id, "SEG_000001");
        assert_eq!(units[0].start_ms, 0);
        assert_eq!(units[0].end_ms, Some(4000));
    }

    #[test]
    fn test_empty_segments_skipped() {
        let asset = AssetId::new("a1");
        let segments = vec![segment(1, 0, 2000, "   "), segment(2, 2000, 4000, "kept")];

        let units = chunk_transcript(&asset, &segments, 0);
        assert_eq!(units.len(), 1);
        assert_eq!(units[0].source_id, "SEG_000002");
    }

    #[test]
    fn test_ocr_chunking_skips_empty_frames() {
        let asset = AssetId::new("a1");
        let records = vec![
            NormalizedOcr {
                frame_id: FrameId::from_index(1),
                ts_ms: Some(18_000),
                text: "slide text".to_string(),
                line_count: 1,
            },
            NormalizedOcr {
                frame_id: FrameId::from_index(2),
                ts_ms: Some(21_000),
                text: String::new(),
                line_count: 0,
            },
        ];

        let units = chunk_ocr(&asset, &records);

        assert_eq!(units.len(), 1);
        assert_eq!(units[0].kind, EvidenceKind::OcrFrame);
        assert_eq!(units[0].source_id, "KF_000001");
        assert_eq!(units[0].start_ms, 18_000);
        assert_eq!(units[0].end_ms, None);
    }

    #[test]
    fn test_every_unit_has_resolvable_reference() {
        let asset = AssetId::new("a1");
        let units = chunk_transcript(&asset, &[segment(1, 0, 1000, "t")], 0);
        for unit in units {
            assert!(!unit.source_id.is_empty());
            assert!(unit.citation().starts_with("[seg:"));
        }
    }
}
