//! Shared SQLite evidence database.
//!
//! One database file holds indexed evidence across all assets, keyed by
//! asset id. FTS5 with bm25 ranking serves lexical retrieval; WAL mode
//! lets concurrent readers proceed while one asset's evidence is being
//! replaced inside a transaction.

use rusqlite::{params, Connection};
use std::path::Path;
use tracing::{debug, info};

use vasset_models::{citation, AssetId, EvidenceHit, EvidenceKind, EvidenceUnit};

use crate::error::{StoreError, StoreResult};

/// Display snippet budget in characters.
const SNIPPET_MAX_CHARS: usize = 160;

const SCHEMA_SQL: &str = "
CREATE TABLE IF NOT EXISTS assets (
    asset_id TEXT PRIMARY KEY,
    source_url TEXT NOT NULL,
    fingerprint TEXT,
    status TEXT NOT NULL DEFAULT 'pending',
    created_at TEXT NOT NULL DEFAULT (datetime('now')),
    updated_at TEXT NOT NULL DEFAULT (datetime('now'))
);

CREATE TABLE IF NOT EXISTS evidence (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    asset_id TEXT NOT NULL,
    kind TEXT NOT NULL CHECK (kind IN ('transcript', 'ocr_frame')),
    source_id TEXT NOT NULL,
    start_ms INTEGER NOT NULL,
    end_ms INTEGER,
    text TEXT NOT NULL,
    UNIQUE(asset_id, kind, source_id)
);

CREATE INDEX IF NOT EXISTS idx_evidence_asset ON evidence(asset_id);

CREATE VIRTUAL TABLE IF NOT EXISTS evidence_fts USING fts5(
    text,
    content='evidence',
    content_rowid='id',
    tokenize='unicode61 remove_diacritics 2'
);

-- Keep FTS5 in sync via triggers
CREATE TRIGGER IF NOT EXISTS evidence_ai AFTER INSERT ON evidence BEGIN
    INSERT INTO evidence_fts(rowid, text) VALUES (new.id, new.text);
END;

CREATE TRIGGER IF NOT EXISTS evidence_ad AFTER DELETE ON evidence BEGIN
    INSERT INTO evidence_fts(evidence_fts, rowid, text)
    VALUES ('delete', old.id, old.text);
END;
";

/// Handle to the shared evidence database.
pub struct EvidenceDb {
    conn: Connection,
}

impl EvidenceDb {
    /// Open or create the database file with full schema.
    pub fn open_or_create(path: &Path) -> StoreResult<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        let db = Self { conn };
        db.apply_pragmas()?;
        db.conn.execute_batch(SCHEMA_SQL)?;
        Ok(db)
    }

    /// In-memory database for tests.
    pub fn open_in_memory() -> StoreResult<Self> {
        let conn = Connection::open_in_memory()?;
        let db = Self { conn };
        db.conn.execute_batch(SCHEMA_SQL)?;
        Ok(db)
    }

    fn apply_pragmas(&self) -> StoreResult<()> {
        self.conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA synchronous = NORMAL;
             PRAGMA busy_timeout = 5000;",
        )?;
        Ok(())
    }

    /// Insert or refresh the asset row.
    pub fn upsert_asset(
        &self,
        asset_id: &AssetId,
        source_url: &str,
        fingerprint: Option<&str>,
        status: &str,
    ) -> StoreResult<()> {
        self.conn.execute(
            "INSERT INTO assets (asset_id, source_url, fingerprint, status)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(asset_id) DO UPDATE SET
                 source_url = excluded.source_url,
                 fingerprint = excluded.fingerprint,
                 status = excluded.status,
                 updated_at = datetime('now')",
            params![asset_id.as_str(), source_url, fingerprint, status],
        )?;
        Ok(())
    }

    /// Replace all evidence for an asset in one transaction.
    ///
    /// Either the whole prior set is swapped for the new one, or (if any
    /// insert fails) the transaction rolls back and the prior set stays
    /// fully intact. Partial replacement is never observable.
    pub fn replace_asset_evidence(
        &mut self,
        asset_id: &AssetId,
        units: &[EvidenceUnit],
    ) -> StoreResult<usize> {
        let tx = self.conn.transaction()?;
        tx.execute(
            "DELETE FROM evidence WHERE asset_id = ?1",
            params![asset_id.as_str()],
        )?;

        let mut inserted = 0usize;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO evidence (asset_id, kind, source_id, start_ms, end_ms, text)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            )?;
            for unit in units {
                if unit.text.trim().is_empty() {
                    continue;
                }
                stmt.execute(params![
                    unit.asset_id.as_str(),
                    unit.kind.as_str(),
                    unit.source_id,
                    unit.start_ms,
                    unit.end_ms,
                    unit.text,
                ])?;
                inserted += 1;
            }
        }
        tx.commit()?;

        info!(asset_id = %asset_id, count = inserted, "Replaced evidence units");
        Ok(inserted)
    }

    /// Count indexed units for an asset, by kind.
    pub fn count_for_asset(&self, asset_id: &AssetId, kind: EvidenceKind) -> StoreResult<usize> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM evidence WHERE asset_id = ?1 AND kind = ?2",
            params![asset_id.as_str(), kind.as_str()],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }

    /// Ranked lexical search within one asset's evidence.
    ///
    /// Returns `(hits, total_match_count)`. bm25 scores are negated to
    /// positive "higher is better" values; ties break on insertion order
    /// (rowid). An empty or operator-only query returns no hits.
    pub fn search(
        &self,
        asset_id: &AssetId,
        query: &str,
        top_k: usize,
    ) -> StoreResult<(Vec<EvidenceHit>, usize)> {
        let match_query = sanitize_match_query(query);
        if match_query.is_empty() {
            return Ok((Vec::new(), 0));
        }

        debug!(asset_id = %asset_id, query = %match_query, "Evidence search");

        let mut stmt = self.conn.prepare(
            "SELECT e.kind, e.source_id, e.start_ms, e.end_ms, e.text,
                    bm25(evidence_fts) AS rank_score
             FROM evidence_fts
             JOIN evidence e ON evidence_fts.rowid = e.id
             WHERE evidence_fts MATCH ?1 AND e.asset_id = ?2
             ORDER BY rank_score ASC, e.id ASC
             LIMIT ?3",
        )?;

        let hits = stmt
            .query_map(
                params![match_query, asset_id.as_str(), top_k as i64],
                |row| {
                    let kind_str: String = row.get(0)?;
                    let source_id: String = row.get(1)?;
                    let start_ms: i64 = row.get(2)?;
                    let end_ms: Option<i64> = row.get(3)?;
                    let text: String = row.get(4)?;
                    let score: f64 = row.get(5)?;
                    Ok((kind_str, source_id, start_ms, end_ms, text, score))
                },
            )?
            .collect::<Result<Vec<_>, _>>()?
            .into_iter()
            .filter_map(|(kind_str, source_id, start_ms, end_ms, text, score)| {
                let kind = EvidenceKind::from_db_str(&kind_str)?;
                Some(EvidenceHit {
                    kind,
                    citation: citation(kind, &source_id, start_ms, end_ms),
                    snippet: truncate_snippet(&text, SNIPPET_MAX_CHARS),
                    source_id,
                    start_ms,
                    end_ms,
                    text,
                    // bm25 returns negative scores
                    score: score.abs(),
                })
            })
            .collect::<Vec<_>>();

        let total: i64 = self.conn.query_row(
            "SELECT COUNT(*)
             FROM evidence_fts
             JOIN evidence e ON evidence_fts.rowid = e.id
             WHERE evidence_fts MATCH ?1 AND e.asset_id = ?2",
            params![sanitize_match_query(query), asset_id.as_str()],
            |row| row.get(0),
        )?;

        Ok((hits, total as usize))
    }

    /// Delete the asset row and all its evidence.
    pub fn delete_asset(&mut self, asset_id: &AssetId) -> StoreResult<()> {
        let tx = self.conn.transaction()?;
        tx.execute(
            "DELETE FROM evidence WHERE asset_id = ?1",
            params![asset_id.as_str()],
        )?;
        tx.execute(
            "DELETE FROM assets WHERE asset_id = ?1",
            params![asset_id.as_str()],
        )?;
        tx.commit()?;
        Ok(())
    }
}

/// Sanitize a user query for FTS5 MATCH syntax.
///
/// Each whitespace-separated token is stripped of quotes and wrapped in
/// double quotes, which neutralizes FTS operators (`NEAR`, `-`, `*`, ...)
/// while keeping plain term matching.
pub fn sanitize_match_query(query: &str) -> String {
    query
        .split_whitespace()
        .map(|token| token.replace(['"', '\''], ""))
        .filter(|token| !token.is_empty())
        .map(|token| format!("\"{}\"", token))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Truncate to a word boundary with an ellipsis.
fn truncate_snippet(text: &str, max_chars: usize) -> String {
    let collapsed = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if collapsed.chars().count() <= max_chars {
        return collapsed;
    }

    let truncated: String = collapsed.chars().take(max_chars).collect();
    let cut = match truncated.rfind(' ') {
        Some(pos) if pos > max_chars / 2 => &truncated[..pos],
        _ => truncated.as_str(),
    };
    format!("{}...", cut.trim_end())
}
