//! The structured learning store.
//!
//! SQLite tables `examples`, `corrections`, `study_metrics`, `templates`.
//! Every write is an upsert keyed by a content-addressed id, so ingesting
//! the same review twice changes nothing. Corrections can be invalidated
//! (reviewers make mistakes too) without losing the audit trail.

use std::path::Path;

use rusqlite::{Connection, OptionalExtension, params};
use sha2::{Digest, Sha256};

use astraea_model::{CorrectionRecord, DomainTemplate, MappingExample, StudyDomainMetrics};

use crate::error::LearnError;

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS examples (
    example_id TEXT PRIMARY KEY,
    study_id TEXT NOT NULL,
    domain TEXT NOT NULL,
    sdtm_variable TEXT NOT NULL,
    payload TEXT NOT NULL
);
CREATE TABLE IF NOT EXISTS corrections (
    correction_id TEXT PRIMARY KEY,
    study_id TEXT NOT NULL,
    domain TEXT NOT NULL,
    sdtm_variable TEXT NOT NULL,
    invalidated INTEGER NOT NULL DEFAULT 0,
    payload TEXT NOT NULL
);
CREATE TABLE IF NOT EXISTS study_metrics (
    study_id TEXT NOT NULL,
    domain TEXT NOT NULL,
    payload TEXT NOT NULL,
    PRIMARY KEY (study_id, domain)
);
CREATE TABLE IF NOT EXISTS templates (
    domain TEXT PRIMARY KEY,
    payload TEXT NOT NULL
);
";

/// Structured store for examples, corrections, metrics, and templates.
pub struct LearningStore {
    conn: Connection,
}

impl LearningStore {
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

    /// Idempotent example upsert.
    pub fn upsert_example(&self, example: &MappingExample) -> Result<(), LearnError> {
        let payload = serde_json::to_string(example)?;
        self.conn.execute(
            "INSERT INTO examples (example_id, study_id, domain, sdtm_variable, payload)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(example_id) DO UPDATE SET payload = excluded.payload",
            params![
                example.example_id,
                example.study_id,
                example.domain,
                example.sdtm_variable,
                payload,
            ],
        )?;
        Ok(())
    }

    /// Idempotent correction upsert.
    pub fn upsert_correction(&self, correction: &CorrectionRecord) -> Result<(), LearnError> {
        let payload = serde_json::to_string(correction)?;
        self.conn.execute(
            "INSERT INTO corrections
                (correction_id, study_id, domain, sdtm_variable, invalidated, payload)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)
             ON CONFLICT(correction_id) DO UPDATE SET
                invalidated = excluded.invalidated,
                payload = excluded.payload",
            params![
                correction.correction_id,
                correction.study_id,
                correction.domain,
                correction.sdtm_variable,
                correction.invalidated as i64,
                payload,
            ],
        )?;
        Ok(())
    }

    /// Invalidate a correction (the correction itself was wrong).
    pub fn invalidate_correction(&self, correction_id: &str) -> Result<bool, LearnError> {
        let changed = self.conn.execute(
            "UPDATE corrections SET invalidated = 1 WHERE correction_id = ?1",
            params![correction_id],
        )?;
        Ok(changed > 0)
    }

    /// Examples for a domain, all studies.
    pub fn examples_for_domain(&self, domain: &str) -> Result<Vec<MappingExample>, LearnError> {
        let mut stmt = self
            .conn
            .prepare("SELECT payload FROM examples WHERE domain = ?1 ORDER BY example_id")?;
        let rows = stmt.query_map(params![domain], |row| row.get::<_, String>(0))?;
        let mut examples = Vec::new();
        for payload in rows {
            examples.push(serde_json::from_str(&payload?)?);
        }
        Ok(examples)
    }

    /// Valid (non-invalidated) corrections for a domain.
    pub fn corrections_for_domain(
        &self,
        domain: &str,
    ) -> Result<Vec<CorrectionRecord>, LearnError> {
        let mut stmt = self.conn.prepare(
            "SELECT payload FROM corrections
             WHERE domain = ?1 AND invalidated = 0 ORDER BY correction_id",
        )?;
        let rows = stmt.query_map(params![domain], |row| row.get::<_, String>(0))?;
        let mut corrections = Vec::new();
        for payload in rows {
            corrections.push(serde_json::from_str(&payload?)?);
        }
        Ok(corrections)
    }

    /// Upsert per-(study, domain) review metrics.
    pub fn upsert_metrics(&self, metrics: &StudyDomainMetrics) -> Result<(), LearnError> {
        let payload = serde_json::to_string(metrics)?;
        self.conn.execute(
            "INSERT INTO study_metrics (study_id, domain, payload) VALUES (?1, ?2, ?3)
             ON CONFLICT(study_id, domain) DO UPDATE SET payload = excluded.payload",
            params![metrics.study_id, metrics.domain, payload],
        )?;
        Ok(())
    }

    /// All metrics rows.
    pub fn all_metrics(&self) -> Result<Vec<StudyDomainMetrics>, LearnError> {
        let mut stmt = self
            .conn
            .prepare("SELECT payload FROM study_metrics ORDER BY domain, study_id")?;
        let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;
        let mut metrics = Vec::new();
        for payload in rows {
            metrics.push(serde_json::from_str(&payload?)?);
        }
        Ok(metrics)
    }

    /// Load one domain template.
    pub fn load_template(&self, domain: &str) -> Result<Option<DomainTemplate>, LearnError> {
        let payload: Option<String> = self
            .conn
            .query_row(
                "SELECT payload FROM templates WHERE domain = ?1",
                params![domain],
                |row| row.get(0),
            )
            .optional()?;
        payload
            .map(|p| serde_json::from_str(&p).map_err(LearnError::from))
            .transpose()
    }

    /// Replace one domain template.
    pub fn save_template(&self, template: &DomainTemplate) -> Result<(), LearnError> {
        let payload = serde_json::to_string(template)?;
        self.conn.execute(
            "INSERT INTO templates (domain, payload) VALUES (?1, ?2)
             ON CONFLICT(domain) DO UPDATE SET payload = excluded.payload",
            params![template.domain, payload],
        )?;
        Ok(())
    }
}

/// Content-addressed example id.
pub fn example_id(study_id: &str, domain: &str, sdtm_variable: &str) -> String {
    hash_parts(&[study_id, domain, sdtm_variable])
}

/// Content-addressed correction id.
pub fn correction_record_id(
    session_id: &str,
    domain: &str,
    sdtm_variable: &str,
    correction_type: &str,
) -> String {
    hash_parts(&[session_id, domain, sdtm_variable, correction_type])
}

fn hash_parts(parts: &[&str]) -> String {
    let mut hasher = Sha256::new();
    for (index, part) in parts.iter().enumerate() {
        if index > 0 {
            hasher.update(b"|");
        }
        hasher.update(part.as_bytes());
    }
    format!("{:x}", hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use astraea_model::MappingPattern;

    fn example() -> MappingExample {
        MappingExample {
            example_id: example_id("PHA001", "AE", "AESEV"),
            study_id: "PHA001".to_string(),
            domain: "AE".to_string(),
            sdtm_variable: "AESEV".to_string(),
            mapping_pattern: MappingPattern::LookupRecode,
            mapping_logic: "recode severity".to_string(),
            source_variable: Some("AESEV_STD".to_string()),
            source_dataset: Some("ae.csv".to_string()),
            confidence: 0.92,
            was_corrected: false,
            final_mapping_json: "{}".to_string(),
        }
    }

    #[test]
    fn example_upsert_is_idempotent() {
        let store = LearningStore::in_memory().unwrap();
        store.upsert_example(&example()).unwrap();
        store.upsert_example(&example()).unwrap();
        assert_eq!(store.examples_for_domain("AE").unwrap().len(), 1);
    }

    #[test]
    fn invalidated_corrections_are_filtered() {
        let store = LearningStore::in_memory().unwrap();
        let correction = CorrectionRecord {
            correction_id: correction_record_id("s1", "AE", "AESEV", "source_change"),
            session_id: "s1".to_string(),
            study_id: "PHA001".to_string(),
            domain: "AE".to_string(),
            sdtm_variable: "AESEV".to_string(),
            correction_type: astraea_model::CorrectionType::SourceChange,
            original_mapping_json: "{}".to_string(),
            corrected_mapping_json: Some("{}".to_string()),
            reason: "wrong column".to_string(),
            reviewer: "tester".to_string(),
            timestamp: chrono::Utc::now(),
            invalidated: false,
        };
        store.upsert_correction(&correction).unwrap();
        assert_eq!(store.corrections_for_domain("AE").unwrap().len(), 1);

        assert!(store.invalidate_correction(&correction.correction_id).unwrap());
        assert!(store.corrections_for_domain("AE").unwrap().is_empty());
    }
}
