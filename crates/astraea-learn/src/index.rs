//! The semantic index.
//!
//! Two named collections, `approved_mappings` and `corrections`, each row
//! carrying the prose embedding text, a metadata JSON object, and the f32
//! embedding BLOB. Queries are domain-filtered cosine top-k scans; at the
//! scale of mapping corpora (thousands of rows) a linear scan is exact and
//! instant.

use std::path::Path;

use rusqlite::{Connection, params};
use serde_json::Value;

use crate::embed::{cosine, embed, from_blob, to_blob};
use crate::error::LearnError;

/// Collection of approved mappings.
pub const COLLECTION_APPROVED: &str = "approved_mappings";
/// Collection of reviewer corrections.
pub const COLLECTION_CORRECTIONS: &str = "corrections";

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS semantic_entries (
    entry_id TEXT PRIMARY KEY,
    collection TEXT NOT NULL,
    domain TEXT NOT NULL,
    text TEXT NOT NULL,
    metadata TEXT NOT NULL,
    embedding BLOB NOT NULL,
    invalidated INTEGER NOT NULL DEFAULT 0
);
CREATE INDEX IF NOT EXISTS idx_semantic_collection
    ON semantic_entries (collection, domain);
";

/// One indexed entry.
#[derive(Debug, Clone)]
pub struct IndexEntry {
    pub entry_id: String,
    pub collection: String,
    pub domain: String,
    /// Natural-language prose, the embedded text.
    pub text: String,
    pub metadata: Value,
    pub invalidated: bool,
}

/// A scored query hit.
#[derive(Debug, Clone)]
pub struct IndexHit {
    pub entry: IndexEntry,
    pub score: f32,
}

/// SQLite-backed semantic index with in-process cosine scoring.
pub struct SemanticIndex {
    conn: Connection,
}

impl SemanticIndex {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, LearnError> {
        let conn = Connection::open(path)?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self { conn })
    }

    pub fn in_memory() -> Result<Self, LearnError> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self { conn })
    }

    /// Idempotent upsert; the embedding is recomputed from `text`.
    pub fn upsert(&self, entry: &IndexEntry) -> Result<(), LearnError> {
        let embedding = to_blob(&embed(&entry.text));
        let metadata = serde_json::to_string(&entry.metadata)?;
        self.conn.execute(
            "INSERT INTO semantic_entries
                (entry_id, collection, domain, text, metadata, embedding, invalidated)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
             ON CONFLICT(entry_id) DO UPDATE SET
                text = excluded.text,
                metadata = excluded.metadata,
                embedding = excluded.embedding,
                invalidated = excluded.invalidated",
            params![
                entry.entry_id,
                entry.collection,
                entry.domain,
                entry.text,
                metadata,
                embedding,
                entry.invalidated as i64,
            ],
        )?;
        Ok(())
    }

    /// Propagate a correction invalidation into the index.
    pub fn mark_invalidated(&self, entry_id: &str) -> Result<(), LearnError> {
        self.conn.execute(
            "UPDATE semantic_entries SET invalidated = 1 WHERE entry_id = ?1",
            params![entry_id],
        )?;
        Ok(())
    }

    /// Domain-filtered top-k cosine query. Invalidated entries never
    /// surface.
    pub fn query(
        &self,
        collection: &str,
        domain: Option<&str>,
        query_text: &str,
        k: usize,
    ) -> Result<Vec<IndexHit>, LearnError> {
        let query_embedding = embed(query_text);
        let mut stmt = self.conn.prepare(
            "SELECT entry_id, collection, domain, text, metadata, embedding, invalidated
             FROM semantic_entries
             WHERE collection = ?1 AND invalidated = 0
               AND (?2 IS NULL OR domain = ?2)",
        )?;
        let rows = stmt.query_map(params![collection, domain], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, String>(3)?,
                row.get::<_, String>(4)?,
                row.get::<_, Vec<u8>>(5)?,
                row.get::<_, i64>(6)?,
            ))
        })?;

        let mut hits = Vec::new();
        for row in rows {
            let (entry_id, collection, domain, text, metadata, embedding_blob, invalidated) = row?;
            let score = cosine(&query_embedding, &from_blob(&embedding_blob));
            hits.push(IndexHit {
                entry: IndexEntry {
                    entry_id,
                    collection,
                    domain,
                    text,
                    metadata: serde_json::from_str(&metadata)?,
                    invalidated: invalidated != 0,
                },
                score,
            });
        }
        hits.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.entry.entry_id.cmp(&b.entry.entry_id))
        });
        hits.truncate(k);
        Ok(hits)
    }

    /// Row count for one collection.
    pub fn collection_len(&self, collection: &str) -> Result<usize, LearnError> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM semantic_entries WHERE collection = ?1",
            params![collection],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn entry(id: &str, domain: &str, text: &str) -> IndexEntry {
        IndexEntry {
            entry_id: id.to_string(),
            collection: COLLECTION_APPROVED.to_string(),
            domain: domain.to_string(),
            text: text.to_string(),
            metadata: json!({"variable": "X"}),
            invalidated: false,
        }
    }

    #[test]
    fn query_is_domain_filtered_and_ranked() {
        let index = SemanticIndex::in_memory().unwrap();
        index
            .upsert(&entry("1", "AE", "adverse event severity lookup recode"))
            .unwrap();
        index
            .upsert(&entry("2", "AE", "adverse event start date iso 8601 reformat"))
            .unwrap();
        index
            .upsert(&entry("3", "LB", "laboratory hemoglobin result"))
            .unwrap();

        let hits = index
            .query(COLLECTION_APPROVED, Some("AE"), "severity recode for adverse events", 2)
            .unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].entry.entry_id, "1");
        assert!(hits.iter().all(|h| h.entry.domain == "AE"));
    }

    #[test]
    fn invalidated_entries_never_surface() {
        let index = SemanticIndex::in_memory().unwrap();
        index.upsert(&entry("1", "AE", "some text")).unwrap();
        index.mark_invalidated("1").unwrap();
        let hits = index
            .query(COLLECTION_APPROVED, Some("AE"), "some text", 5)
            .unwrap();
        assert!(hits.is_empty());
    }
}
