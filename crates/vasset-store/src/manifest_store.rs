//! Manifest persistence and JSONL artifact IO.
//!
//! All writes go through a temp-file-plus-rename so readers never observe
//! a partially written manifest or artifact.

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs;
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use tracing::debug;

use vasset_models::{AssetId, Manifest, Stage, StageRecord};

use crate::error::{StoreError, StoreResult};
use crate::layout::AssetLayout;

/// Filesystem store for asset manifests and artifacts.
///
/// One instance per data directory; injected into the pipeline rather
/// than reached through a global.
#[derive(Debug, Clone)]
pub struct ManifestStore {
    assets_dir: PathBuf,
}

impl ManifestStore {
    pub fn new(assets_dir: impl Into<PathBuf>) -> Self {
        Self {
            assets_dir: assets_dir.into(),
        }
    }

    pub fn assets_dir(&self) -> &Path {
        &self.assets_dir
    }

    pub fn layout(&self, asset_id: &AssetId) -> AssetLayout {
        AssetLayout::new(&self.assets_dir, asset_id)
    }

    pub fn asset_exists(&self, asset_id: &AssetId) -> bool {
        self.layout(asset_id).manifest_path().exists()
    }

    /// List asset ids present in the store, sorted.
    pub fn list_assets(&self) -> StoreResult<Vec<AssetId>> {
        if !self.assets_dir.exists() {
            return Ok(Vec::new());
        }
        let mut ids = Vec::new();
        for entry in fs::read_dir(&self.assets_dir)? {
            let entry = entry?;
            if !entry.file_type()?.is_dir() {
                continue;
            }
            let name = entry.file_name().to_string_lossy().to_string();
            if name.starts_with('.') {
                continue;
            }
            ids.push(AssetId::new(name));
        }
        ids.sort();
        Ok(ids)
    }

    /// Load an asset's manifest.
    ///
    /// A missing manifest is `AssetNotFound`; an unreadable one is
    /// `ManifestCorrupt`; the distinction matters for error handling.
    pub fn load(&self, asset_id: &AssetId) -> StoreResult<Manifest> {
        let path = self.layout(asset_id).manifest_path();
        if !path.exists() {
            return Err(StoreError::AssetNotFound(asset_id.to_string()));
        }
        let bytes = fs::read(&path)?;
        serde_json::from_slice(&bytes)
            .map_err(|e| StoreError::manifest_corrupt(asset_id.as_str(), e.to_string()))
    }

    /// Save a manifest atomically.
    pub fn save(&self, manifest: &Manifest) -> StoreResult<()> {
        let layout = self.layout(&manifest.asset_id);
        fs::create_dir_all(layout.root())?;
        let bytes = serde_json::to_vec_pretty(manifest)?;
        write_atomic(&layout.manifest_path(), &bytes)?;
        debug!(asset_id = %manifest.asset_id, "Saved manifest");
        Ok(())
    }

    /// Write any serializable value as pretty JSON, atomically.
    pub fn write_json<T: Serialize>(&self, path: &Path, value: &T) -> StoreResult<()> {
        let bytes = serde_json::to_vec_pretty(value)?;
        write_atomic(path, &bytes)
    }

    /// Read a JSON artifact.
    pub fn read_json<T: DeserializeOwned>(&self, path: &Path) -> StoreResult<T> {
        let bytes = fs::read(path)?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    /// Write records as JSONL (one compact JSON object per line),
    /// atomically.
    pub fn write_jsonl<T: Serialize>(&self, path: &Path, records: &[T]) -> StoreResult<()> {
        let mut buf = Vec::new();
        for record in records {
            serde_json::to_writer(&mut buf, record)?;
            buf.write_all(b"\n")?;
        }
        write_atomic(path, &buf)
    }

    /// Read JSONL records, skipping blank lines.
    pub fn read_jsonl<T: DeserializeOwned>(&self, path: &Path) -> StoreResult<Vec<T>> {
        let file = fs::File::open(path)?;
        let reader = BufReader::new(file);
        let mut records = Vec::new();
        for line in reader.lines() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            records.push(serde_json::from_str(&line)?);
        }
        Ok(records)
    }

    /// Verify that every artifact a DONE record claims actually exists.
    ///
    /// Returns the first missing path, which the runner turns into a
    /// demotion rather than trusting the stale DONE.
    pub fn verify_outputs(
        &self,
        asset_id: &AssetId,
        record: &StageRecord,
    ) -> StoreResult<()> {
        let layout = self.layout(asset_id);
        for rel in &record.output_refs {
            let path = layout.resolve(rel);
            if !path.exists() {
                return Err(StoreError::ArtifactMissing { path });
            }
        }
        Ok(())
    }

    /// Remove a stage's recorded artifacts before a forced re-run.
    pub fn remove_outputs(&self, asset_id: &AssetId, stage: Stage) -> StoreResult<()> {
        let manifest = self.load(asset_id)?;
        let layout = self.layout(asset_id);
        if let Some(record) = manifest.stage(stage) {
            for rel in &record.output_refs {
                let path = layout.resolve(rel);
                if path.is_dir() {
                    let _ = fs::remove_dir_all(&path);
                } else if path.exists() {
                    let _ = fs::remove_file(&path);
                }
            }
        }
        Ok(())
    }
}

/// Write bytes to a temp file beside the destination, then rename.
fn write_atomic(dst: &Path, bytes: &[u8]) -> StoreResult<()> {
    if let Some(parent) = dst.parent() {
        fs::create_dir_all(parent)?;
    }
    let tmp = dst.with_extension("tmp");
    fs::write(&tmp, bytes)?;
    if let Err(e) = fs::rename(&tmp, dst) {
        let _ = fs::remove_file(&tmp);
        return Err(StoreError::from(e));
    }
    Ok(())
}
