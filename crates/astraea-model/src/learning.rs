//! Learning substrate records.
//!
//! Approved mappings become [`MappingExample`]s, reviewer corrections become
//! [`CorrectionRecord`]s, and both accumulate into per-domain
//! [`DomainTemplate`]s. Identifiers are content-addressed so repeated
//! ingestion of the same review is a no-op.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::enums::{CorrectionType, MappingPattern};

/// One approved (or corrected-then-approved) mapping, stored for few-shot reuse.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MappingExample {
    /// Deterministic id: sha256 over (study_id, domain, sdtm_variable).
    pub example_id: String,
    pub study_id: String,
    pub domain: String,
    pub sdtm_variable: String,
    pub mapping_pattern: MappingPattern,
    pub mapping_logic: String,
    #[serde(default)]
    pub source_variable: Option<String>,
    #[serde(default)]
    pub source_dataset: Option<String>,
    pub confidence: f64,
    pub was_corrected: bool,
    /// The final mapping as approved, serialised for replay.
    pub final_mapping_json: String,
}

/// A stored correction, queryable as a negative example.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorrectionRecord {
    /// Deterministic id: sha256 over (session_id, domain, variable, correction_type).
    pub correction_id: String,
    pub session_id: String,
    pub study_id: String,
    pub domain: String,
    pub sdtm_variable: String,
    pub correction_type: CorrectionType,
    pub original_mapping_json: String,
    #[serde(default)]
    pub corrected_mapping_json: Option<String>,
    pub reason: String,
    pub reviewer: String,
    pub timestamp: DateTime<Utc>,
    pub invalidated: bool,
}

/// Per-variable abstraction within a domain template.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VariablePattern {
    pub sdtm_variable: String,
    pub mapping_pattern: MappingPattern,
    /// Keywords from contributing source column names (lowercased).
    pub source_keywords: BTreeSet<String>,
    /// Representative derivation rule, when one exists.
    #[serde(default)]
    pub derivation_template: Option<String>,
    /// How many studies contributed this pattern.
    pub occurrences: usize,
}

/// Accumulated mapping shape for one domain across studies.
///
/// Exactly one template exists per domain; updates are incremental with
/// accuracy weighted by the number of contributing studies.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DomainTemplate {
    pub domain: String,
    pub pattern_distribution: BTreeMap<MappingPattern, usize>,
    pub variable_patterns: Vec<VariablePattern>,
    pub source_study_ids: BTreeSet<String>,
    pub accuracy_rate: f64,
}

impl DomainTemplate {
    pub fn new(domain: impl Into<String>) -> Self {
        Self {
            domain: domain.into(),
            pattern_distribution: BTreeMap::new(),
            variable_patterns: Vec::new(),
            source_study_ids: BTreeSet::new(),
            accuracy_rate: 0.0,
        }
    }
}

/// Per-(study, domain) review accuracy.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StudyDomainMetrics {
    pub study_id: String,
    pub domain: String,
    pub total: usize,
    pub approved_unchanged: usize,
    pub corrected: usize,
    pub rejected: usize,
    pub added: usize,
    pub completed_at: DateTime<Utc>,
}

impl StudyDomainMetrics {
    /// approved_unchanged / total, or 0 for an empty review.
    pub fn accuracy_rate(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            self.approved_unchanged as f64 / self.total as f64
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accuracy_rate_handles_empty_review() {
        let metrics = StudyDomainMetrics {
            study_id: "S1".to_string(),
            domain: "DM".to_string(),
            total: 0,
            approved_unchanged: 0,
            corrected: 0,
            rejected: 0,
            added: 0,
            completed_at: Utc::now(),
        };
        assert_eq!(metrics.accuracy_rate(), 0.0);
    }
}
