//! OCR normalization: raw spans to clean, deduplicated per-frame text.
//!
//! Spans below the confidence floor are dropped; survivors cluster into
//! lines by vertical position, read top-to-bottom and left-to-right.
//! Every input frame yields exactly one output record, an empty one
//! when nothing survives the filter.

use regex::Regex;
use serde::Serialize;
use serde_json::json;
use std::sync::OnceLock;

use vasset_models::{AssetId, FrameOcr, NormalizedOcr, OcrSpan, Stage};
use vasset_store::layout::OCR_TEXT_FILE;

use crate::error::PipelineResult;
use crate::runner::{require_stage_done, run_stage, PipelineContext, StageOutcome, StageOutput};

/// Normalization parameters.
#[derive(Debug, Clone, Serialize)]
pub struct OcrNormalizeParams {
    /// Minimum recognition confidence (0-100) a span must reach
    pub min_conf: f32,
}

/// Run the ocr_normalize stage.
pub async fn run(
    ctx: &PipelineContext,
    asset_id: &AssetId,
    params: OcrNormalizeParams,
    force: bool,
) -> PipelineResult<StageOutcome> {
    let layout = ctx.store.layout(asset_id);
    let params_ref = &params;

    run_stage(ctx, asset_id, Stage::OcrNormalize, &params, force, || async move {
        require_stage_done(&ctx.store, asset_id, Stage::Ocr)?;

        let raw: Vec<FrameOcr> = ctx.store.read_jsonl(&layout.ocr_file())?;

        let records: Vec<NormalizedOcr> = raw
            .iter()
            .map(|frame| normalize_frame(frame, params_ref.min_conf))
            .collect();

        ctx.store.write_jsonl(&layout.ocr_text_file(), &records)?;

        let non_empty = records.iter().filter(|r| !r.text.is_empty()).count();
        Ok(StageOutput::new(
            vec![OCR_TEXT_FILE.to_string()],
            json!({
                "frames": records.len(),
                "frames_with_text": non_empty,
            }),
        ))
    })
    .await
}

/// Normalize one frame's spans into a single text record.
pub fn normalize_frame(frame: &FrameOcr, min_conf: f32) -> NormalizedOcr {
    let kept: Vec<&OcrSpan> = frame
        .spans
        .iter()
        .filter(|span| span.conf.map(|c| c >= min_conf).unwrap_or(false))
        .filter(|span| !span.text.trim().is_empty())
        .collect();

    let lines = cluster_lines(&kept);
    let line_texts = normalize_lines(&lines);
    let line_count = line_texts.len();
    let text = dehyphenate(&line_texts);

    NormalizedOcr {
        frame_id: frame.frame_id.clone(),
        ts_ms: frame.ts_ms,
        text,
        line_count,
    }
}

/// Group spans into lines by vertical-center proximity.
///
/// Spans sort by vertical center; a span joins the current line when its
/// center sits within half the larger of the two heights. Within a line
/// spans read left-to-right. No randomized tie-breaking anywhere, so
/// reruns on unchanged input are stable.
fn cluster_lines<'a>(spans: &[&'a OcrSpan]) -> Vec<Vec<&'a OcrSpan>> {
    let mut sorted: Vec<&OcrSpan> = spans.to_vec();
    sorted.sort_by(|a, b| {
        a.v_center()
            .partial_cmp(&b.v_center())
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.left.cmp(&b.left))
    });

    let mut lines: Vec<Vec<&OcrSpan>> = Vec::new();
    let mut current_center = 0.0f32;

    for span in sorted {
        let tolerance = span.height.max(
            lines
                .last()
                .and_then(|line| line.last())
                .map(|s| s.height)
                .unwrap_or(0),
        ) as f32
            / 2.0;

        match lines.last_mut() {
            Some(line) if (span.v_center() - current_center).abs() <= tolerance => {
                line.push(span);
            }
            _ => {
                lines.push(vec![span]);
                current_center = span.v_center();
            }
        }
    }

    for line in &mut lines {
        line.sort_by(|a, b| a.left.cmp(&b.left));
    }
    lines
}

/// Join each line's spans, collapse whitespace, drop empties and
/// consecutive repeats.
fn normalize_lines(lines: &[Vec<&OcrSpan>]) -> Vec<String> {
    let ws = whitespace_re();
    let mut out: Vec<String> = Vec::new();

    for line in lines {
        let joined = line
            .iter()
            .map(|span| span.text.as_str())
            .collect::<Vec<_>>()
            .join(" ");
        let cleaned = ws.replace_all(joined.trim(), " ").to_string();
        if cleaned.is_empty() {
            continue;
        }
        if out.last().map(|prev| prev == &cleaned).unwrap_or(false) {
            continue;
        }
        out.push(cleaned);
    }
    out
}

/// Join lines into one text, merging hyphenated line breaks.
fn dehyphenate(lines: &[String]) -> String {
    let mut out: Vec<String> = Vec::new();
    let mut i = 0;
    while i < lines.len() {
        let current = &lines[i];
        if current.ends_with('-') && i + 1 < lines.len() {
            let next = &lines[i + 1];
            if next.chars().next().map(|c| c.is_alphanumeric()).unwrap_or(false) {
                out.push(format!("{}{}", &current[..current.len() - 1], next));
                i += 2;
                continue;
            }
        }
        out.push(current.clone());
        i += 1;
    }

    let joined = out.join(" ");
    whitespace_re().replace_all(joined.trim(), " ").to_string()
}

fn whitespace_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\s+").expect("valid regex"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use vasset_models::FrameId;

    fn span(text: &str, left: i32, top: i32, height: i32, conf: f32) -> OcrSpan {
        OcrSpan {
            text: text.to_string(),
            left,
            top,
            width: 40,
            height,
            conf: Some(conf),
        }
    }

    fn frame(spans: Vec<OcrSpan>) -> FrameOcr {
        FrameOcr {
            frame_id: FrameId::from_index(1),
            ts_ms: Some(18_000),
            spans,
        }
    }

    #[test]
    fn test_lines_read_top_to_bottom_left_to_right() {
        // Second line first in input; within line one, "world" before "hello".
        let f = frame(vec![
            span("below", 10, 40, 12, 90.0),
            span("world", 60, 10, 12, 90.0),
            span("hello", 10, 11, 12, 90.0),
        ]);

        let normalized = normalize_frame(&f, 40.0);
        assert_eq!(normalized.text, "hello world below");
        assert_eq!(normalized.line_count, 2);
    }

    #[test]
    fn test_low_confidence_spans_dropped() {
        let f = frame(vec![
            span("keep", 10, 10, 12, 80.0),
            span("drop", 60, 10, 12, 10.0),
        ]);

        let normalized = normalize_frame(&f, 40.0);
        assert_eq!(normalized.text, "keep");
    }

    #[test]
    fn test_all_dropped_yields_empty_record_not_omission() {
        let f = frame(vec![span("noise", 10, 10, 12, 5.0)]);

        let normalized = normalize_frame(&f, 40.0);
        assert_eq!(normalized.text, "");
        assert_eq!(normalized.line_count, 0);
        assert_eq!(normalized.frame_id, FrameId::from_index(1));
    }

    #[test]
    fn test_consecutive_duplicate_lines_collapse() {
        let f = frame(vec![
            span("SUBSCRIBE", 10, 10, 12, 90.0),
            span("SUBSCRIBE", 10, 40, 12, 90.0),
        ]);

        let normalized = normalize_frame(&f, 40.0);
        assert_eq!(normalized.text, "SUBSCRIBE");
        assert_eq!(normalized.line_count, 1);
    }

    #[test]
    fn test_dehyphenation_joins_broken_words() {
        let f = frame(vec![
            span("transcrip-", 10, 10, 12, 90.0),
            span("tion", 10, 40, 12, 90.0),
        ]);

        let normalized = normalize_frame(&f, 40.0);
        assert_eq!(normalized.text, "transcription");
    }

    #[test]
    fn test_normalization_is_stable() {
        let f = frame(vec![
            span("b", 60, 10, 12, 90.0),
            span("a", 10, 10, 12, 90.0),
            span("c", 10, 40, 12, 90.0),
        ]);

        let first = normalize_frame(&f, 40.0);
        let second = normalize_frame(&f, 40.0);
        assert_eq!(first.text, second.text);
        assert_eq!(first.text, "a b c");
    }

    #[test]
    fn test_unscored_spans_are_dropped() {
        let mut unscored = span("ghost", 10, 10, 12, 0.0);
        unscored.conf = None;
        let f = frame(vec![unscored, span("real", 10, 40, 12, 90.0)]);

        let normalized = normalize_frame(&f, 40.0);
        assert_eq!(normalized.text, "real");
    }
}
