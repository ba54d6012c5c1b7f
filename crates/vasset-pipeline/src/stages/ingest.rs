//! Ingest: fetch metadata, lay out the asset directory, create the
//! manifest, and register the asset in the evidence database.
//!
//! Ingest is not a pipeline stage; it creates the manifest the stage
//! runner needs. The fetcher's raw response is persisted as provenance
//! whether or not it parses cleanly, and ingest never blocks on the
//! stream being playable.

use tracing::{info, warn};

use vasset_media::fetch::fetch_metadata;
use vasset_models::{fingerprint_params, AssetId, AssetMetadata, AssetStatus, Manifest};
use vasset_store::EvidenceDb;

use crate::error::PipelineResult;
use crate::runner::PipelineContext;

/// Result of an ingest operation.
#[derive(Debug, Clone)]
pub struct IngestReport {
    pub asset_id: AssetId,
    pub status: AssetStatus,
    /// True when an existing ingested asset was reused
    pub cached: bool,
    pub title: String,
    pub errors: Vec<String>,
}

/// Stable fields the ingest fingerprint is computed over; stats and
/// view counts are deliberately excluded.
#[derive(serde::Serialize)]
struct IngestFingerprint<'a> {
    id: &'a str,
    title: &'a str,
    duration: f64,
    uploader: &'a str,
}

/// Ingest a video URL.
pub async fn ingest(ctx: &PipelineContext, url: &str, force: bool) -> PipelineResult<IngestReport> {
    let fetched = match fetch_metadata(url).await {
        Ok(fetched) => fetched,
        Err(e) => {
            warn!(url = %url, error = %e, "Metadata fetch failed");
            return Ok(IngestReport {
                asset_id: AssetId::new(""),
                status: AssetStatus::Failed,
                cached: false,
                title: String::new(),
                errors: vec![e.to_string()],
            });
        }
    };

    let asset_id = AssetId::new(fetched.id.clone());
    let fingerprint = fingerprint_params(&IngestFingerprint {
        id: &fetched.id,
        title: &fetched.title,
        duration: fetched.duration_seconds,
        uploader: &fetched.uploader,
    })?;

    // Reuse an existing ingest when the stable fields haven't changed.
    if !force {
        if let Ok(existing) = ctx.store.load(&asset_id) {
            if existing.status == AssetStatus::Ingested
                && existing.fingerprint.as_deref() == Some(fingerprint.as_str())
            {
                info!(asset_id = %asset_id, "Asset already ingested, reusing");
                return Ok(IngestReport {
                    asset_id,
                    status: AssetStatus::Ingested,
                    cached: true,
                    title: fetched.title,
                    errors: Vec::new(),
                });
            }
        }
    }

    let layout = ctx.store.layout(&asset_id);
    std::fs::create_dir_all(layout.source_api_dir())?;

    // Raw response first: provenance survives even if the rest fails.
    ctx.store
        .write_json(&layout.source_api_dir().join("metadata.json"), &fetched.raw)?;

    let mut metadata = AssetMetadata::new(asset_id.clone(), &fetched.webpage_url, &fetched.title);
    metadata.description = fetched.description.clone();
    metadata.uploader = fetched.uploader.clone();
    metadata.duration_seconds = fetched.duration_seconds;
    metadata.width = fetched.width;
    metadata.height = fetched.height;
    ctx.store.write_json(&layout.metadata_path(), &metadata)?;

    // Carry forward stage history on re-ingest; artifacts on disk are
    // still governed by their own fingerprints.
    let mut manifest = match ctx.store.load(&asset_id) {
        Ok(existing) => existing,
        Err(_) => Manifest::new(asset_id.clone(), fetched.webpage_url.clone()),
    };
    manifest.status = AssetStatus::Ingested;
    manifest.fingerprint = Some(fingerprint.clone());
    ctx.store.save(&manifest)?;

    let db = EvidenceDb::open_or_create(&ctx.config.db_path())?;
    db.upsert_asset(
        &asset_id,
        &fetched.webpage_url,
        Some(&fingerprint),
        AssetStatus::Ingested.as_str(),
    )?;

    info!(asset_id = %asset_id, title = %fetched.title, "Asset ingested");
    Ok(IngestReport {
        asset_id,
        status: AssetStatus::Ingested,
        cached: false,
        title: fetched.title,
        errors: Vec::new(),
    })
}
