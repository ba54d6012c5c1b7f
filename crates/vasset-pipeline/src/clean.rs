//! Destructive clean: remove an asset's database rows and artifact tree.
//!
//! The only operation that deletes asset state. Path safety is validated
//! before anything is touched; the database is cleaned first so a
//! half-finished clean leaves orphaned files, never orphaned rows.

use std::path::Path;

use vasset_models::AssetId;
use vasset_store::EvidenceDb;

use crate::error::{PipelineError, PipelineResult};
use crate::runner::PipelineContext;

/// Result of a clean operation.
#[derive(Debug, Default)]
pub struct CleanReport {
    pub deleted: Vec<AssetId>,
    pub errors: Vec<String>,
}

/// Delete one asset: evidence rows, asset row, artifact directory.
pub fn clean_asset(ctx: &PipelineContext, asset_id: &AssetId) -> PipelineResult<CleanReport> {
    let mut report = CleanReport::default();
    let layout = ctx.store.layout(asset_id);

    validate_path_safety(layout.root(), ctx.store.assets_dir())?;

    let db_path = ctx.config.db_path();
    if db_path.exists() {
        match EvidenceDb::open_or_create(&db_path) {
            Ok(mut db) => {
                if let Err(e) = db.delete_asset(asset_id) {
                    report.errors.push(format!("database: {}", e));
                }
            }
            Err(e) => report.errors.push(format!("database: {}", e)),
        }
    }

    if layout.root().exists() {
        match std::fs::remove_dir_all(layout.root()) {
            Ok(()) => report.deleted.push(asset_id.clone()),
            Err(e) => report
                .errors
                .push(format!("failed to delete {}: {}", layout.root().display(), e)),
        }
    } else if report.errors.is_empty() {
        // Directory already gone; the database rows were still cleaned.
        report.deleted.push(asset_id.clone());
    }

    Ok(report)
}

/// Delete every asset in the store.
pub fn clean_all(ctx: &PipelineContext) -> PipelineResult<CleanReport> {
    let mut report = CleanReport::default();
    for asset_id in ctx.store.list_assets()? {
        let single = clean_asset(ctx, &asset_id)?;
        report.deleted.extend(single.deleted);
        report.errors.extend(single.errors);
    }
    Ok(report)
}

/// Refuse to delete anything outside the assets directory.
fn validate_path_safety(target: &Path, assets_dir: &Path) -> PipelineResult<()> {
    if target.as_os_str().is_empty() {
        return Err(PipelineError::config("target path cannot be empty"));
    }

    // Canonicalize what exists; a missing target is checked lexically.
    let target_resolved = target.canonicalize().unwrap_or_else(|_| target.to_path_buf());
    let assets_resolved = assets_dir
        .canonicalize()
        .unwrap_or_else(|_| assets_dir.to_path_buf());

    if target_resolved == assets_resolved || !target_resolved.starts_with(&assets_resolved) {
        return Err(PipelineError::config(format!(
            "refusing to delete {} outside assets directory {}",
            target_resolved.display(),
            assets_resolved.display()
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PipelineConfig;
    use tempfile::TempDir;
    use vasset_models::Manifest;

    fn context() -> (TempDir, PipelineContext) {
        let dir = TempDir::new().unwrap();
        let config = PipelineConfig {
            data_dir: dir.path().to_path_buf(),
            ..PipelineConfig::default()
        };
        (dir, PipelineContext::new(config))
    }

    #[test]
    fn test_clean_removes_directory() {
        let (_dir, ctx) = context();
        let asset_id = AssetId::new("a1");
        ctx.store
            .save(&Manifest::new(asset_id.clone(), "https://example.com/v"))
            .unwrap();
        assert!(ctx.store.asset_exists(&asset_id));

        let report = clean_asset(&ctx, &asset_id).unwrap();
        assert_eq!(report.deleted, vec![asset_id.clone()]);
        assert!(report.errors.is_empty());
        assert!(!ctx.store.asset_exists(&asset_id));
    }

    #[test]
    fn test_path_safety_rejects_escapes() {
        let dir = TempDir::new().unwrap();
        let assets = dir.path().join("assets");
        std::fs::create_dir_all(&assets).unwrap();

        assert!(validate_path_safety(dir.path(), &assets).is_err());
        assert!(validate_path_safety(&assets, &assets).is_err());
        assert!(validate_path_safety(&assets.join("a1"), &assets).is_ok());
    }
}
