//! Transcription provider client.
//!
//! The provider contract: given an audio file, return timestamped
//! segments. Quota exhaustion must be distinguishable from "no speech
//! detected"; the former is an error, the latter an empty success.

use async_trait::async_trait;
use serde::Deserialize;
use std::path::Path;
use tracing::info;

use vasset_models::{SegmentId, TranscriptSegment};

use crate::error::{MediaError, MediaResult};

/// A speech-to-text provider.
#[async_trait]
pub trait Transcriber: Send + Sync {
    /// Transcribe an audio file into timestamped segments.
    ///
    /// Returns an empty vector when the provider finds no speech.
    async fn transcribe(&self, audio_path: &Path) -> MediaResult<Vec<TranscriptSegment>>;

    /// Provider name, recorded in stage parameters and provenance.
    fn provider_name(&self) -> &str;
}

/// Whisper-style HTTP transcription endpoint.
///
/// Posts the audio as multipart form data and expects a verbose JSON
/// response with a `segments` array of `{start, end, text}` entries
/// (times in seconds).
pub struct HttpTranscriber {
    endpoint: String,
    api_key: Option<String>,
    model: String,
    client: reqwest::Client,
}

#[derive(Debug, Deserialize)]
struct TranscribeResponse {
    #[serde(default)]
    segments: Vec<ResponseSegment>,
}

#[derive(Debug, Deserialize)]
struct ResponseSegment {
    start: f64,
    end: f64,
    text: String,
}

impl HttpTranscriber {
    pub fn new(endpoint: impl Into<String>, api_key: Option<String>, model: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            api_key,
            model: model.into(),
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl Transcriber for HttpTranscriber {
    async fn transcribe(&self, audio_path: &Path) -> MediaResult<Vec<TranscriptSegment>> {
        if !audio_path.exists() {
            return Err(MediaError::FileNotFound(audio_path.to_path_buf()));
        }

        let bytes = tokio::fs::read(audio_path).await?;
        let file_name = audio_path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| "audio.m4a".to_string());

        info!(
            endpoint = %self.endpoint,
            size_bytes = bytes.len(),
            "Submitting audio for transcription"
        );

        let part = reqwest::multipart::Part::bytes(bytes).file_name(file_name);
        let form = reqwest::multipart::Form::new()
            .part("file", part)
            .text("model", self.model.clone())
            .text("response_format", "verbose_json");

        let mut request = self.client.post(&self.endpoint).multipart(form);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await?;
        let status = response.status();

        // 402/429 are quota/billing conditions; everything else non-2xx
        // is a provider failure.
        if status.as_u16() == 429 || status.as_u16() == 402 {
            let body = response.text().await.unwrap_or_default();
            return Err(MediaError::TranscriptionQuota(body));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(MediaError::TranscriptionFailed(format!(
                "HTTP {}: {}",
                status, body
            )));
        }

        let parsed: TranscribeResponse = response.json().await?;
        Ok(segments_from_response(parsed.segments))
    }

    fn provider_name(&self) -> &str {
        "http"
    }
}

/// Assign stable segment ids and convert provider times to milliseconds.
fn segments_from_response(segments: Vec<ResponseSegment>) -> Vec<TranscriptSegment> {
    segments
        .into_iter()
        .filter(|s| !s.text.trim().is_empty())
        .enumerate()
        .map(|(i, s)| TranscriptSegment {
            segment_id: SegmentId::from_index(i + 1),
            start_ms: (s.start * 1000.0) as i64,
            end_ms: (s.end * 1000.0) as i64,
            text: s.text.trim().to_string(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_segments_from_response_assigns_ids_and_ms() {
        let segments = segments_from_response(vec![
            ResponseSegment {
                start: 0.0,
                end: 2.5,
                text: " hello there ".into(),
            },
            ResponseSegment {
                start: 2.5,
                end: 4.0,
                text: "".into(),
            },
            ResponseSegment {
                start: 4.0,
                end: 6.0,
                text: "second".into(),
            },
        ]);

        assert_eq!(segments.len(), 2);
        assert_eq!(segments[0].segment_id.as_str(), "SEG_000001");
        assert_eq!(segments[0].start_ms, 0);
        assert_eq!(segments[0].end_ms, 2500);
        assert_eq!(segments[0].text, "hello there");
        assert_eq!(segments[1].segment_id.as_str(), "SEG_000002");
    }
}
