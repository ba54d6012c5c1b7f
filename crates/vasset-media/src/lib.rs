//! External tool boundary for the vasset pipeline.
//!
//! Every collaborator the core depends on lives behind a narrow interface
//! in this crate:
//! - ffmpeg/ffprobe command building and timeout-bounded execution
//! - yt-dlp metadata fetch and video download
//! - frame sampling (uniform interval or scene-change triggered)
//! - audio extraction with a bitrate ladder
//! - tesseract TSV recognition
//! - an HTTP transcription provider
//!
//! The orchestration core never spawns a process or opens a socket
//! directly; it calls these functions and records their outcomes.

pub mod audio;
pub mod command;
pub mod error;
pub mod fetch;
pub mod fs_utils;
pub mod ocr;
pub mod probe;
pub mod sample;
pub mod transcribe;

pub use command::{check_ffmpeg, check_ffprobe, check_tesseract, check_ytdlp, FfmpegCommand};
pub use error::{MediaError, MediaResult};
pub use fetch::{download_video, fetch_metadata, FetchedMetadata};
pub use probe::{probe_video, VideoInfo};
pub use sample::{sample_frames, SampleMode, SampledFrame};
pub use transcribe::{HttpTranscriber, Transcriber};
