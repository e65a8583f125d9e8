//! The learning substrate.
//!
//! Completed reviews feed two component-private stores written together: a
//! structured SQLite store of examples, corrections, and per-domain
//! metrics, and a semantic index answering domain-filtered similarity
//! queries for the context builder. Deterministic content-addressed ids
//! make every ingestion idempotent.

pub mod embed;
pub mod error;
pub mod index;
pub mod ingest;
pub mod program;
pub mod retriever;
pub mod store;
pub mod templates;

pub use crate::embed::{EMBED_DIM, cosine, embed};
pub use crate::error::LearnError;
pub use crate::index::{
    COLLECTION_APPROVED, COLLECTION_CORRECTIONS, IndexEntry, IndexHit, SemanticIndex,
};
pub use crate::ingest::{IngestStats, LearningSubstrate, mapping_prose};
pub use crate::program::{COMPILED_PROGRAM_FILE, CompiledProgram};
pub use crate::retriever::{DEFAULT_MAX_EXAMPLES, LearningRetriever};
pub use crate::store::{LearningStore, correction_record_id, example_id};
pub use crate::templates::update_template;

use astraea_model::StudyDomainMetrics;

/// One line of the cross-study improvement report.
#[derive(Debug, Clone, PartialEq)]
pub struct DomainImprovement {
    pub domain: String,
    pub first_accuracy: f64,
    pub latest_accuracy: f64,
    pub delta: f64,
    pub studies: usize,
}

/// Group metrics by domain (ordered by completion time) and report
/// first/latest/delta accuracy per domain.
pub fn improvement_report(metrics: &[StudyDomainMetrics]) -> Vec<DomainImprovement> {
    use std::collections::BTreeMap;

    let mut by_domain: BTreeMap<&str, Vec<&StudyDomainMetrics>> = BTreeMap::new();
    for row in metrics {
        by_domain.entry(row.domain.as_str()).or_default().push(row);
    }

    by_domain
        .into_iter()
        .map(|(domain, mut rows)| {
            rows.sort_by_key(|r| r.completed_at);
            let first = rows.first().map(|r| r.accuracy_rate()).unwrap_or(0.0);
            let latest = rows.last().map(|r| r.accuracy_rate()).unwrap_or(0.0);
            DomainImprovement {
                domain: domain.to_string(),
                first_accuracy: first,
                latest_accuracy: latest,
                delta: latest - first,
                studies: rows.len(),
            }
        })
        .collect()
}
