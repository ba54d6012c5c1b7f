//! Text recognition via tesseract's TSV output.
//!
//! The engine contract: given an image, return recognized spans with
//! bounding boxes and confidence. A blank frame yields an empty span
//! list, never an error.

use std::path::Path;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;

use vasset_models::OcrSpan;

use crate::error::{MediaError, MediaResult};

/// Per-image recognition timeout.
const OCR_TIMEOUT_SECS: u64 = 30;

/// Recognition parameters passed through to tesseract.
#[derive(Debug, Clone)]
pub struct OcrParams {
    /// Language pack(s), e.g. `eng` or `eng+chi_sim`
    pub lang: String,
    /// Page segmentation mode
    pub psm: u8,
}

impl Default for OcrParams {
    fn default() -> Self {
        Self {
            lang: "eng".to_string(),
            psm: 6,
        }
    }
}

/// Recognize text spans in a single image.
pub async fn recognize_spans(image_path: &Path, params: &OcrParams) -> MediaResult<Vec<OcrSpan>> {
    if !image_path.exists() {
        return Err(MediaError::FileNotFound(image_path.to_path_buf()));
    }

    which::which("tesseract").map_err(|_| MediaError::TesseractNotFound)?;

    let run = Command::new("tesseract")
        .arg(image_path)
        .arg("stdout")
        .args(["-l", &params.lang, "--psm", &params.psm.to_string(), "tsv"])
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .output();

    let output = match tokio::time::timeout(Duration::from_secs(OCR_TIMEOUT_SECS), run).await {
        Ok(result) => result?,
        Err(_) => {
            return Err(MediaError::Timeout {
                tool: "tesseract",
                seconds: OCR_TIMEOUT_SECS,
            });
        }
    };

    if !output.status.success() {
        return Err(MediaError::command_failed(
            "tesseract",
            "recognition failed",
            Some(String::from_utf8_lossy(&output.stderr).to_string()),
            output.status.code(),
        ));
    }

    Ok(parse_tsv(&String::from_utf8_lossy(&output.stdout)))
}

/// Parse tesseract TSV output into word-level spans.
///
/// Level-5 rows are words; everything else (pages, blocks, paragraphs,
/// lines) is structural and skipped. A confidence of -1 marks structural
/// rows that leaked through and maps to None.
pub fn parse_tsv(tsv: &str) -> Vec<OcrSpan> {
    let mut rows = tsv.lines();

    // Tolerate output with or without the header row.
    let first = match rows.next() {
        Some(line) => line,
        None => return Vec::new(),
    };
    let mut spans = Vec::new();
    if !first.starts_with("level") {
        if let Some(span) = parse_tsv_row(first) {
            spans.push(span);
        }
    }

    for row in rows {
        if let Some(span) = parse_tsv_row(row) {
            spans.push(span);
        }
    }

    spans
}

fn parse_tsv_row(row: &str) -> Option<OcrSpan> {
    // level page block par line word left top width height conf text
    let fields: Vec<&str> = row.splitn(12, '\t').collect();
    if fields.len() < 12 {
        return None;
    }

    let level: u8 = fields[0].parse().ok()?;
    if level != 5 {
        return None;
    }

    let text = fields[11].trim();
    if text.is_empty() {
        return None;
    }

    let conf: f32 = fields[10].parse().ok()?;
    Some(OcrSpan {
        text: text.to_string(),
        left: fields[6].parse().ok()?,
        top: fields[7].parse().ok()?,
        width: fields[8].parse().ok()?,
        height: fields[9].parse().ok()?,
        conf: if conf >= 0.0 { Some(conf) } else { None },
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const HEADER: &str =
        "level\tpage_num\tblock_num\tpar_num\tline_num\tword_num\tleft\ttop\twidth\theight\tconf\ttext";

    fn word_row(line: u32, word: u32, left: i32, top: i32, conf: f32, text: &str) -> String {
        format!("5\t1\t1\t1\t{line}\t{word}\t{left}\t{top}\t40\t12\t{conf}\t{text}")
    }

    #[test]
    fn test_parse_tsv_extracts_words_only() {
        let tsv = [
            HEADER.to_string(),
            "1\t1\t0\t0\t0\t0\t0\t0\t768\t432\t-1\t".to_string(),
            "4\t1\t1\t1\t1\t0\t10\t20\t200\t14\t-1\t".to_string(),
            word_row(1, 1, 10, 20, 95.2, "Hello"),
            word_row(1, 2, 60, 20, 91.0, "world"),
        ]
        .join("\n");

        let spans = parse_tsv(&tsv);
        assert_eq!(spans.len(), 2);
        assert_eq!(spans[0].text, "Hello");
        assert_eq!(spans[0].left, 10);
        assert!((spans[0].conf.unwrap() - 95.2).abs() < 0.01);
    }

    #[test]
    fn test_parse_tsv_blank_frame() {
        let tsv = format!("{}\n1\t1\t0\t0\t0\t0\t0\t0\t768\t432\t-1\t", HEADER);
        assert!(parse_tsv(&tsv).is_empty());
    }

    #[test]
    fn test_parse_tsv_skips_empty_words() {
        let tsv = format!("{}\n5\t1\t1\t1\t1\t1\t10\t20\t40\t12\t80\t  ", HEADER);
        assert!(parse_tsv(&tsv).is_empty());
    }

    #[test]
    fn test_parse_tsv_handles_missing_header() {
        let tsv = word_row(1, 1, 10, 20, 88.0, "headerless");
        let spans = parse_tsv(&tsv);
        assert_eq!(spans.len(), 1);
        assert_eq!(spans[0].text, "headerless");
    }
}
