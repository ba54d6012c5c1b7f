//! Retrieval: ranked queries and citation-annotated evidence packs.

use vasset_models::{AssetId, EvidencePack};
use vasset_store::EvidenceDb;

use crate::error::{PipelineError, PipelineResult};
use crate::runner::PipelineContext;

/// Default number of hits returned.
pub const DEFAULT_TOP_K: usize = 8;

/// Ranked lexical query over an asset's indexed evidence.
///
/// Items are ordered by score descending (ties by original chunk
/// order). Zero matches yields an empty pack, not an error, and callers
/// render "insufficient evidence" rather than inventing content.
pub fn query_asset(
    ctx: &PipelineContext,
    asset_id: &AssetId,
    query: &str,
    top_k: usize,
) -> PipelineResult<EvidencePack> {
    let query = query.trim();
    if query.is_empty() {
        return Err(PipelineError::config("query cannot be empty"));
    }
    if !ctx.store.asset_exists(asset_id) {
        return Err(PipelineError::NotFound(asset_id.to_string()));
    }

    let db_path = ctx.config.db_path();
    if !db_path.exists() {
        // Nothing indexed anywhere yet; an empty pack, not an error.
        return Ok(EvidencePack::empty(asset_id.clone(), query));
    }

    let db = EvidenceDb::open_or_create(&db_path)?;
    let (items, total_count) = db.search(asset_id, query, top_k)?;

    Ok(EvidencePack {
        asset_id: asset_id.clone(),
        query: query.to_string(),
        items,
        total_count,
    })
}

/// Evidence pack for reading: same hits as [`query_asset`], re-ordered
/// by start time so the pack reads chronologically.
pub fn gather_evidence(
    ctx: &PipelineContext,
    asset_id: &AssetId,
    query: &str,
    top_k: usize,
) -> PipelineResult<EvidencePack> {
    let mut pack = query_asset(ctx, asset_id, query, top_k)?;
    pack.items.sort_by(|a, b| {
        a.start_ms
            .cmp(&b.start_ms)
            .then_with(|| a.source_id.cmp(&b.source_id))
    });
    Ok(pack)
}
