//! SQLite persistence for review sessions.
//!
//! Three tables: `sessions`, `domain_reviews`, `corrections`. Domain
//! reviews and corrections store their full payload as JSON; the indexed
//! columns exist for lookup only. The store is component-private: nothing
//! outside the review gate writes here.

use std::path::Path;

use rusqlite::{Connection, OptionalExtension, params};
use sha2::{Digest, Sha256};

use astraea_model::{DomainReview, HumanCorrection, ReviewSession, SessionStatus};

use crate::error::ReviewError;

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS sessions (
    session_id TEXT PRIMARY KEY,
    study_id TEXT NOT NULL,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    status TEXT NOT NULL,
    payload TEXT NOT NULL
);
CREATE TABLE IF NOT EXISTS domain_reviews (
    session_id TEXT NOT NULL,
    domain TEXT NOT NULL,
    status TEXT NOT NULL,
    payload TEXT NOT NULL,
    PRIMARY KEY (session_id, domain)
);
CREATE TABLE IF NOT EXISTS corrections (
    correction_id TEXT PRIMARY KEY,
    session_id TEXT NOT NULL,
    domain TEXT NOT NULL,
    sdtm_variable TEXT NOT NULL,
    payload TEXT NOT NULL
);
";

/// Review persistence.
pub struct ReviewStore {
    conn: Connection,
}

impl ReviewStore {
    /// Open (or create) the store at a path.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, ReviewError> {
        let conn = Connection::open(path)?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self { conn })
    }

    /// In-memory store for tests.
    pub fn in_memory() -> Result<Self, ReviewError> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self { conn })
    }

    /// Insert or update a session.
    pub fn save_session(&self, session: &ReviewSession) -> Result<(), ReviewError> {
        let payload = serde_json::to_string(session)?;
        self.conn.execute(
            "INSERT INTO sessions (session_id, study_id, created_at, updated_at, status, payload)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)
             ON CONFLICT(session_id) DO UPDATE SET
                updated_at = excluded.updated_at,
                status = excluded.status,
                payload = excluded.payload",
            params![
                session.session_id,
                session.study_id,
                session.created_at.to_rfc3339(),
                session.updated_at.to_rfc3339(),
                session.status.as_str(),
                payload,
            ],
        )?;
        Ok(())
    }

    /// Load a session by id.
    pub fn load_session(&self, session_id: &str) -> Result<Option<ReviewSession>, ReviewError> {
        let payload: Option<String> = self
            .conn
            .query_row(
                "SELECT payload FROM sessions WHERE session_id = ?1",
                params![session_id],
                |row| row.get(0),
            )
            .optional()?;
        payload
            .map(|p| serde_json::from_str(&p).map_err(ReviewError::from))
            .transpose()
    }

    /// The most recently updated in-progress session, if any.
    pub fn latest_in_progress(&self) -> Result<Option<ReviewSession>, ReviewError> {
        let payload: Option<String> = self
            .conn
            .query_row(
                "SELECT payload FROM sessions WHERE status = ?1
                 ORDER BY updated_at DESC LIMIT 1",
                params![SessionStatus::InProgress.as_str()],
                |row| row.get(0),
            )
            .optional()?;
        payload
            .map(|p| serde_json::from_str(&p).map_err(ReviewError::from))
            .transpose()
    }

    /// All sessions, most recent first.
    pub fn list_sessions(&self) -> Result<Vec<ReviewSession>, ReviewError> {
        let mut stmt = self
            .conn
            .prepare("SELECT payload FROM sessions ORDER BY updated_at DESC")?;
        let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;
        let mut sessions = Vec::new();
        for payload in rows {
            sessions.push(serde_json::from_str(&payload?)?);
        }
        Ok(sessions)
    }

    /// Persist a domain review (full payload replace).
    pub fn save_domain_review(&self, review: &DomainReview) -> Result<(), ReviewError> {
        let payload = serde_json::to_string(review)?;
        self.conn.execute(
            "INSERT INTO domain_reviews (session_id, domain, status, payload)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(session_id, domain) DO UPDATE SET
                status = excluded.status,
                payload = excluded.payload",
            params![
                review.session_id,
                review.domain,
                review.status.as_str(),
                payload,
            ],
        )?;
        Ok(())
    }

    /// Load one domain review.
    pub fn load_domain_review(
        &self,
        session_id: &str,
        domain: &str,
    ) -> Result<Option<DomainReview>, ReviewError> {
        let payload: Option<String> = self
            .conn
            .query_row(
                "SELECT payload FROM domain_reviews WHERE session_id = ?1 AND domain = ?2",
                params![session_id, domain],
                |row| row.get(0),
            )
            .optional()?;
        payload
            .map(|p| serde_json::from_str(&p).map_err(ReviewError::from))
            .transpose()
    }

    /// Persist one correction under its deterministic id.
    pub fn save_correction(&self, correction: &HumanCorrection) -> Result<(), ReviewError> {
        let id = correction_id(correction);
        let payload = serde_json::to_string(correction)?;
        self.conn.execute(
            "INSERT INTO corrections (correction_id, session_id, domain, sdtm_variable, payload)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(correction_id) DO UPDATE SET payload = excluded.payload",
            params![
                id,
                correction.session_id,
                correction.domain,
                correction.sdtm_variable,
                payload,
            ],
        )?;
        Ok(())
    }

    /// All corrections recorded for a session.
    pub fn load_corrections(&self, session_id: &str) -> Result<Vec<HumanCorrection>, ReviewError> {
        let mut stmt = self.conn.prepare(
            "SELECT payload FROM corrections WHERE session_id = ?1 ORDER BY correction_id",
        )?;
        let rows = stmt.query_map(params![session_id], |row| row.get::<_, String>(0))?;
        let mut corrections = Vec::new();
        for payload in rows {
            corrections.push(serde_json::from_str(&payload?)?);
        }
        Ok(corrections)
    }
}

/// Deterministic correction id over (session, domain, variable, type).
pub fn correction_id(correction: &HumanCorrection) -> String {
    let mut hasher = Sha256::new();
    hasher.update(correction.session_id.as_bytes());
    hasher.update(b"|");
    hasher.update(correction.domain.as_bytes());
    hasher.update(b"|");
    hasher.update(correction.sdtm_variable.as_bytes());
    hasher.update(b"|");
    hasher.update(correction.correction_type.as_str().as_bytes());
    format!("{:x}", hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn session(id: &str, status: SessionStatus) -> ReviewSession {
        ReviewSession {
            session_id: id.to_string(),
            study_id: "PHA001".to_string(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
            status,
            domains: vec!["DM".to_string(), "AE".to_string()],
            current_domain_index: 0,
        }
    }

    #[test]
    fn session_round_trip() {
        let store = ReviewStore::in_memory().unwrap();
        store.save_session(&session("s1", SessionStatus::InProgress)).unwrap();
        let loaded = store.load_session("s1").unwrap().unwrap();
        assert_eq!(loaded.domains, vec!["DM", "AE"]);
        assert!(store.load_session("missing").unwrap().is_none());
    }

    #[test]
    fn latest_in_progress_prefers_recent() {
        let store = ReviewStore::in_memory().unwrap();
        let mut older = session("s1", SessionStatus::InProgress);
        older.updated_at = Utc::now() - chrono::Duration::hours(2);
        store.save_session(&older).unwrap();
        store.save_session(&session("s2", SessionStatus::InProgress)).unwrap();
        store.save_session(&session("s3", SessionStatus::Completed)).unwrap();
        let latest = store.latest_in_progress().unwrap().unwrap();
        assert_eq!(latest.session_id, "s2");
    }
}
