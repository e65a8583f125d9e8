//! Review ingestion into both learning stores.
//!
//! Called after a domain review completes. Writes one example per surviving
//! mapping and one correction record per reviewer correction, in both the
//! structured store and the semantic index, plus the per-(study, domain)
//! metrics row. Deterministic ids make ingestion idempotent; non-completed
//! reviews are silently skipped.

use chrono::Utc;
use serde_json::json;
use tracing::{debug, info};

use astraea_model::{
    CorrectionRecord, CorrectionType, DecisionStatus, DomainReview, MappingExample, ReviewStatus,
    StudyDomainMetrics, VariableMapping,
};

use crate::error::LearnError;
use crate::index::{COLLECTION_APPROVED, COLLECTION_CORRECTIONS, IndexEntry, SemanticIndex};
use crate::store::{LearningStore, correction_record_id, example_id};

/// What one ingestion wrote.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct IngestStats {
    pub examples: usize,
    pub corrections: usize,
    pub skipped: bool,
}

/// Both learning stores, written together.
pub struct LearningSubstrate {
    pub store: LearningStore,
    pub index: SemanticIndex,
}

impl LearningSubstrate {
    pub fn new(store: LearningStore, index: SemanticIndex) -> Self {
        Self { store, index }
    }

    /// Ingest one completed domain review.
    pub fn ingest_review(&self, review: &DomainReview) -> Result<IngestStats, LearnError> {
        if review.status != ReviewStatus::Completed {
            debug!(
                domain = review.domain.as_str(),
                status = review.status.as_str(),
                "skipping ingestion of non-completed review"
            );
            return Ok(IngestStats {
                skipped: true,
                ..IngestStats::default()
            });
        }

        let study_id = &review.original_spec.study_id;
        let mut stats = IngestStats::default();
        let mut approved_unchanged = 0usize;
        let mut corrected = 0usize;
        let mut rejected = 0usize;
        let mut added = 0usize;

        for mapping in &review.original_spec.variable_mappings {
            let decision = review.decisions.get(&mapping.sdtm_variable);
            let (final_mapping, was_corrected) = match decision {
                Some(decision) if decision.status == DecisionStatus::Corrected => {
                    match &decision.corrected_mapping {
                        Some(corrected_mapping) => {
                            corrected += 1;
                            (corrected_mapping, true)
                        }
                        None => {
                            rejected += 1;
                            continue;
                        }
                    }
                }
                Some(decision) if decision.status == DecisionStatus::Approved => {
                    approved_unchanged += 1;
                    (mapping, false)
                }
                _ => (mapping, false), // skipped mappings are kept as proposed
            };
            self.write_example(study_id, &review.domain, final_mapping, was_corrected)?;
            stats.examples += 1;
        }

        // Additions are examples too.
        for decision in review.decisions.values() {
            if decision.correction_type == Some(CorrectionType::Add) {
                if let Some(mapping) = &decision.corrected_mapping {
                    added += 1;
                    self.write_example(study_id, &review.domain, mapping, true)?;
                    stats.examples += 1;
                }
            }
        }

        for correction in &review.corrections {
            let record = CorrectionRecord {
                correction_id: correction_record_id(
                    &correction.session_id,
                    &correction.domain,
                    &correction.sdtm_variable,
                    correction.correction_type.as_str(),
                ),
                session_id: correction.session_id.clone(),
                study_id: correction.study_id.clone(),
                domain: correction.domain.clone(),
                sdtm_variable: correction.sdtm_variable.clone(),
                correction_type: correction.correction_type,
                original_mapping_json: serde_json::to_string(&correction.original_mapping)?,
                corrected_mapping_json: correction
                    .corrected_mapping
                    .as_ref()
                    .map(serde_json::to_string)
                    .transpose()?,
                reason: correction.reason.clone(),
                reviewer: correction.reviewer.clone(),
                timestamp: correction.timestamp,
                invalidated: correction.invalidated,
            };
            self.store.upsert_correction(&record)?;

            let text = correction_prose(&record, &correction.original_mapping);
            self.index.upsert(&IndexEntry {
                entry_id: record.correction_id.clone(),
                collection: COLLECTION_CORRECTIONS.to_string(),
                domain: record.domain.clone(),
                text,
                metadata: json!({
                    "study_id": record.study_id,
                    "domain": record.domain,
                    "sdtm_variable": record.sdtm_variable,
                    "correction_type": record.correction_type.as_str(),
                    "reason": record.reason,
                    "original_mapping": serde_json::from_str::<serde_json::Value>(
                        &record.original_mapping_json
                    )?,
                    "corrected_mapping": record
                        .corrected_mapping_json
                        .as_deref()
                        .map(serde_json::from_str::<serde_json::Value>)
                        .transpose()?,
                }),
                invalidated: record.invalidated,
            })?;
            stats.corrections += 1;
        }

        let metrics = StudyDomainMetrics {
            study_id: study_id.clone(),
            domain: review.domain.clone(),
            total: review.original_spec.variable_mappings.len(),
            approved_unchanged,
            corrected,
            rejected,
            added,
            completed_at: Utc::now(),
        };
        self.store.upsert_metrics(&metrics)?;

        info!(
            domain = review.domain.as_str(),
            examples = stats.examples,
            corrections = stats.corrections,
            accuracy = metrics.accuracy_rate(),
            "review ingested"
        );
        Ok(stats)
    }

    fn write_example(
        &self,
        study_id: &str,
        domain: &str,
        mapping: &VariableMapping,
        was_corrected: bool,
    ) -> Result<(), LearnError> {
        let example = MappingExample {
            example_id: example_id(study_id, domain, &mapping.sdtm_variable),
            study_id: study_id.to_string(),
            domain: domain.to_string(),
            sdtm_variable: mapping.sdtm_variable.clone(),
            mapping_pattern: mapping.mapping_pattern,
            mapping_logic: mapping.mapping_logic.clone(),
            source_variable: mapping.source_variable.clone(),
            source_dataset: mapping.source_dataset.clone(),
            confidence: mapping.confidence,
            was_corrected,
            final_mapping_json: serde_json::to_string(mapping)?,
        };
        self.store.upsert_example(&example)?;

        self.index.upsert(&IndexEntry {
            entry_id: example.example_id.clone(),
            collection: COLLECTION_APPROVED.to_string(),
            domain: domain.to_string(),
            text: mapping_prose(domain, mapping),
            metadata: json!({
                "study_id": study_id,
                "domain": domain,
                "sdtm_variable": mapping.sdtm_variable,
                "mapping_pattern": mapping.mapping_pattern.as_str(),
                "was_corrected": was_corrected,
                "final_mapping": serde_json::from_str::<serde_json::Value>(
                    &example.final_mapping_json
                )?,
            }),
            invalidated: false,
        })?;
        Ok(())
    }
}

/// Natural-language prose for the semantic index. Small sentence models
/// are trained on prose, not JSON, so this is what gets embedded.
pub fn mapping_prose(domain: &str, mapping: &VariableMapping) -> String {
    let mut text = format!(
        "SDTM domain {domain} variable {}. Mapping pattern {}. Logic: {}.",
        mapping.sdtm_variable, mapping.mapping_pattern, mapping.mapping_logic
    );
    if let Some(source) = &mapping.source_variable {
        text.push_str(&format!(" Source variable {source}."));
    }
    if let Some(dataset) = &mapping.source_dataset {
        text.push_str(&format!(" Source dataset {dataset}."));
    }
    text
}

fn correction_prose(record: &CorrectionRecord, original: &VariableMapping) -> String {
    format!(
        "SDTM domain {} variable {}. Reviewer correction of type {}. \
         Original pattern {} with logic: {}. Reason: {}.",
        record.domain,
        record.sdtm_variable,
        record.correction_type.as_str(),
        original.mapping_pattern,
        original.mapping_logic,
        record.reason
    )
}
