//! Frame sampling: uniform interval or scene-change triggered.

use std::path::{Path, PathBuf};
use tracing::info;

use crate::command::FfmpegCommand;
use crate::error::{MediaError, MediaResult};

/// Sampling timeout; covers long videos on slow disks.
const SAMPLE_TIMEOUT_SECS: u64 = 600;

/// Candidates are scaled to this maximum width before fingerprinting, so
/// duplicate detection is robust to re-encoding artifacts and storage
/// stays bounded.
pub const MAX_FRAME_WIDTH: u32 = 768;

/// Sampling strategy. The two modes are mutually exclusive.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SampleMode {
    /// One candidate every `interval_sec` seconds from 0 up to duration.
    Uniform { interval_sec: f64 },
    /// One candidate per detected scene change; lower thresholds yield
    /// more candidates.
    Scene { threshold: f64 },
}

/// One candidate frame emitted by the sampler.
#[derive(Debug, Clone)]
pub struct SampledFrame {
    /// 1-based candidate index in emission order
    pub index: usize,
    pub path: PathBuf,
    /// Inferred offset; None in scene mode, where ffmpeg does not report
    /// per-frame timestamps through the image2 muxer
    pub ts_ms: Option<i64>,
}

/// Sample candidate frames from `video_path` into `output_dir`.
///
/// Emits `frame_%06d.png` files and returns them in emission order.
/// Uniform-mode candidates carry `ts_ms = index * interval_sec * 1000`
/// (frame N is the sample at the Nth interval boundary).
pub async fn sample_frames(
    video_path: &Path,
    output_dir: &Path,
    mode: SampleMode,
) -> MediaResult<Vec<SampledFrame>> {
    if !video_path.exists() {
        return Err(MediaError::FileNotFound(video_path.to_path_buf()));
    }

    tokio::fs::create_dir_all(output_dir).await?;

    let mut filter_parts: Vec<String> = Vec::new();
    match mode {
        SampleMode::Uniform { interval_sec } => {
            filter_parts.push(format!("fps=1/{}", interval_sec));
        }
        SampleMode::Scene { threshold } => {
            filter_parts.push(format!("select='gt(scene,{})'", threshold));
        }
    }
    filter_parts.push(format!("scale='min({},iw):-2'", MAX_FRAME_WIDTH));

    let pattern = output_dir.join("frame_%06d.png");
    let mut cmd = FfmpegCommand::new(video_path, &pattern)
        .video_filter(filter_parts.join(","))
        .output_args(["-f", "image2"]);

    // Scene select drops frames; variable frame rate keeps the muxer from
    // duplicating the survivors.
    if matches!(mode, SampleMode::Scene { .. }) {
        cmd = cmd.output_args(["-vsync", "vfr"]);
    }

    cmd.run(SAMPLE_TIMEOUT_SECS).await?;

    let frames = collect_sampled(output_dir, mode).await?;
    info!(
        count = frames.len(),
        dir = %output_dir.display(),
        "Sampled candidate frames"
    );
    Ok(frames)
}

/// List emitted frame files in index order and attach inferred offsets.
async fn collect_sampled(output_dir: &Path, mode: SampleMode) -> MediaResult<Vec<SampledFrame>> {
    let mut names: Vec<String> = Vec::new();
    let mut entries = tokio::fs::read_dir(output_dir).await?;
    while let Some(entry) = entries.next_entry().await? {
        let name = entry.file_name().to_string_lossy().to_string();
        if name.starts_with("frame_") && name.ends_with(".png") {
            names.push(name);
        }
    }
    names.sort();

    let frames = names
        .into_iter()
        .enumerate()
        .map(|(i, name)| {
            let index = i + 1;
            let ts_ms = match mode {
                SampleMode::Uniform { interval_sec } => {
                    Some(((index as f64 - 1.0) * interval_sec * 1000.0) as i64)
                }
                SampleMode::Scene { .. } => None,
            };
            SampledFrame {
                index,
                path: output_dir.join(name),
                ts_ms,
            }
        })
        .collect();

    Ok(frames)
}
