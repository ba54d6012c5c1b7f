//! Frames stage: sample candidate frames and collapse exact duplicates.
//!
//! Candidates are sampled into a staging directory, deduplicated by
//! blake3 digest in timestamp order, capped, and only then swapped into
//! the final `frames/` directory, so a failed run never disturbs the last
//! good frame set.

use serde::Serialize;
use serde_json::json;
use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::Path;

use vasset_media::sample::{sample_frames, SampleMode, SampledFrame};
use vasset_models::{AssetId, FrameId, FrameRecord, FrameSource, Stage};
use vasset_store::layout::{FRAMES_DIR, FRAMES_FILE};

use crate::error::{PipelineError, PipelineResult};
use crate::runner::{require_stage_done, run_stage, PipelineContext, StageOutcome, StageOutput};

/// Frame sampling parameters. `interval_sec` and `scene_thresh` are
/// mutually exclusive; changing either invalidates the whole stage.
#[derive(Debug, Clone, Serialize)]
pub struct FramesParams {
    pub interval_sec: f64,
    pub scene_thresh: Option<f64>,
    pub max_frames: Option<usize>,
}

impl FramesParams {
    fn mode(&self) -> SampleMode {
        match self.scene_thresh {
            Some(threshold) => SampleMode::Scene { threshold },
            None => SampleMode::Uniform {
                interval_sec: self.interval_sec,
            },
        }
    }
}

/// Run the frames stage.
pub async fn run(
    ctx: &PipelineContext,
    asset_id: &AssetId,
    params: FramesParams,
    force: bool,
) -> PipelineResult<StageOutcome> {
    let layout = ctx.store.layout(asset_id);
    let params_ref = &params;

    run_stage(ctx, asset_id, Stage::Frames, &params, force, || async move {
        require_stage_done(&ctx.store, asset_id, Stage::Source)?;

        let video_path = layout.source_video_path();
        if !video_path.exists() {
            return Err(PipelineError::DataIntegrity(format!(
                "source video missing: {}",
                video_path.display()
            )));
        }

        // Sample into a staging directory beside the final one.
        let staging_dir = layout.root().join("frames.staging");
        if staging_dir.exists() {
            fs::remove_dir_all(&staging_dir)?;
        }
        let sampled = sample_frames(&video_path, &staging_dir, params_ref.mode()).await?;
        if sampled.is_empty() {
            return Err(PipelineError::precondition(
                "sampler produced no candidate frames",
            ));
        }

        let source = match params_ref.mode() {
            SampleMode::Uniform { .. } => FrameSource::Uniform,
            SampleMode::Scene { .. } => FrameSource::Scene,
        };
        let mut records = dedup_frames(&sampled, source, FRAMES_DIR)?;
        if let Some(cap) = params_ref.max_frames {
            records = apply_frame_cap(records, cap, &staging_dir);
        }

        // Swap staging into place, then write the records.
        let frames_dir = layout.frames_dir();
        if frames_dir.exists() {
            fs::remove_dir_all(&frames_dir)?;
        }
        fs::rename(&staging_dir, &frames_dir)?;
        ctx.store.write_jsonl(&layout.frames_file(), &records)?;

        let retained = records.iter().filter(|r| r.is_retained()).count();
        let duplicates = records.len() - retained;
        Ok(StageOutput::new(
            vec![FRAMES_FILE.to_string(), FRAMES_DIR.to_string()],
            json!({
                "candidates": records.len(),
                "retained": retained,
                "duplicates": duplicates,
            }),
        ))
    })
    .await
}

/// Assign ids and collapse exact-digest duplicates.
///
/// Candidates are scanned in emission (timestamp) order. A candidate
/// whose digest matches any previously retained frame is marked duplicate
/// referencing that earlier frame, and its file is deleted. Dedup looks
/// backward, never forward.
pub fn dedup_frames(
    sampled: &[SampledFrame],
    source: FrameSource,
    frames_dir_name: &str,
) -> PipelineResult<Vec<FrameRecord>> {
    let mut seen: HashMap<String, FrameId> = HashMap::new();
    let mut records = Vec::with_capacity(sampled.len());

    for frame in sampled {
        let frame_id = FrameId::from_index(frame.index);
        let digest = digest_file(&frame.path)?;

        if let Some(original) = seen.get(&digest) {
            // Best-effort delete; the record is authoritative either way.
            let _ = fs::remove_file(&frame.path);
            records.push(FrameRecord {
                frame_id,
                ts_ms: frame.ts_ms,
                path: None,
                digest,
                source,
                is_duplicate: true,
                duplicate_of: Some(original.clone()),
            });
        } else {
            seen.insert(digest.clone(), frame_id.clone());
            let file_name = frame
                .path
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_default();
            records.push(FrameRecord {
                frame_id,
                ts_ms: frame.ts_ms,
                path: Some(format!("{}/{}", frames_dir_name, file_name)),
                digest,
                source,
                is_duplicate: false,
                duplicate_of: None,
            });
        }
    }

    Ok(records)
}

/// Cap retained frames, keeping the earliest. Duplicates whose original
/// is dropped go with it; files of dropped frames are deleted.
pub fn apply_frame_cap(
    records: Vec<FrameRecord>,
    cap: usize,
    staging_dir: &Path,
) -> Vec<FrameRecord> {
    let kept_ids: HashSet<FrameId> = records
        .iter()
        .filter(|r| r.is_retained())
        .take(cap)
        .map(|r| r.frame_id.clone())
        .collect();

    records
        .into_iter()
        .filter(|record| {
            let keep = if record.is_duplicate {
                record
                    .duplicate_of
                    .as_ref()
                    .map(|original| kept_ids.contains(original))
                    .unwrap_or(false)
            } else {
                kept_ids.contains(&record.frame_id)
            };

            if !keep {
                if let Some(rel) = &record.path {
                    if let Some(name) = Path::new(rel).file_name() {
                        let _ = fs::remove_file(staging_dir.join(name));
                    }
                }
            }
            keep
        })
        .collect()
}

/// blake3 digest of a file's bytes, streamed.
fn digest_file(path: &Path) -> PipelineResult<String> {
    let mut hasher = blake3::Hasher::new();
    let mut file = fs::File::open(path)?;
    std::io::copy(&mut file, &mut hasher)?;
    Ok(hasher.finalize().to_hex().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write_candidates(dir: &Path, contents: &[&[u8]]) -> Vec<SampledFrame> {
        contents
            .iter()
            .enumerate()
            .map(|(i, bytes)| {
                let index = i + 1;
                let path = dir.join(format!("frame_{:06}.png", index));
                fs::write(&path, bytes).unwrap();
                SampledFrame {
                    index,
                    path,
                    ts_ms: Some((i as i64) * 3000),
                }
            })
            .collect()
    }

    #[test]
    fn test_dedup_collapses_exact_repeats() {
        let dir = TempDir::new().unwrap();
        // [A, B, A', C]: A' is byte-identical to A.
        let sampled = write_candidates(dir.path(), &[b"aaaa", b"bbbb", b"aaaa", b"cccc"]);

        let records = dedup_frames(&sampled, FrameSource::Uniform, "frames").unwrap();

        assert_eq!(records.len(), 4);
        let retained: Vec<_> = records.iter().filter(|r| r.is_retained()).collect();
        assert_eq!(retained.len(), 3);

        let dup = &records[2];
        assert!(dup.is_duplicate);
        assert_eq!(dup.duplicate_of, Some(FrameId::from_index(1)));
        assert!(dup.path.is_none());
        assert!(!dir.path().join("frame_000003.png").exists());
        // The duplicate points backward to an earlier timestamp.
        assert!(records[0].ts_ms.unwrap() <= dup.ts_ms.unwrap());
    }

    #[test]
    fn test_dedup_retained_digests_are_unique() {
        let dir = TempDir::new().unwrap();
        let sampled = write_candidates(dir.path(), &[b"a", b"b", b"a", b"b", b"c"]);

        let records = dedup_frames(&sampled, FrameSource::Uniform, "frames").unwrap();
        let digests: HashSet<_> = records
            .iter()
            .filter(|r| r.is_retained())
            .map(|r| r.digest.clone())
            .collect();
        assert_eq!(digests.len(), 3);
    }

    #[test]
    fn test_dedup_is_deterministic() {
        let dir = TempDir::new().unwrap();
        let sampled = write_candidates(dir.path(), &[b"x", b"y", b"z"]);

        let first = dedup_frames(&sampled, FrameSource::Uniform, "frames").unwrap();
        let second = dedup_frames(&sampled, FrameSource::Uniform, "frames").unwrap();

        let pairs =
            |rs: &[FrameRecord]| -> Vec<(FrameId, String)> {
                rs.iter().map(|r| (r.frame_id.clone(), r.digest.clone())).collect()
            };
        assert_eq!(pairs(&first), pairs(&second));
    }

    #[test]
    fn test_cap_keeps_earliest_and_linked_duplicates() {
        let dir = TempDir::new().unwrap();
        // A, B, A-dup, C, D -> retained A, B, C, D; cap 2 keeps A, B and
        // the duplicate of A, drops C and D.
        let sampled = write_candidates(dir.path(), &[b"a", b"b", b"a", b"c", b"d"]);
        let records = dedup_frames(&sampled, FrameSource::Uniform, "frames").unwrap();

        let capped = apply_frame_cap(records, 2, dir.path());

        let ids: Vec<&str> = capped.iter().map(|r| r.frame_id.as_str()).collect();
        assert_eq!(ids, vec!["KF_000001", "KF_000002", "KF_000003"]);
        assert!(!dir.path().join("frame_000004.png").exists());
        assert!(!dir.path().join("frame_000005.png").exists());
        assert!(dir.path().join("frame_000001.png").exists());
    }

    #[test]
    fn test_twenty_candidates_one_duplicate_pair() {
        let dir = TempDir::new().unwrap();
        // 60-second video at interval_sec=3 -> 20 uniform candidates.
        let mut contents: Vec<Vec<u8>> = (0..20u8).map(|i| vec![i]).collect();
        contents[7] = contents[3].clone(); // one exact duplicate pair
        let refs: Vec<&[u8]> = contents.iter().map(|c| c.as_slice()).collect();
        let sampled = write_candidates(dir.path(), &refs);
        assert_eq!(sampled.len(), 20);

        let records = dedup_frames(&sampled, FrameSource::Uniform, "frames").unwrap();
        let retained = records.iter().filter(|r| r.is_retained()).count();
        assert_eq!(retained, 19);
    }
}
