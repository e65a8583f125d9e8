//! Mapping proposals and enriched mapping specifications.
//!
//! [`DomainMappingProposal`] is the raw, schema-constrained LLM output:
//! minimal fields, nothing the model cannot know. [`VariableMapping`] and
//! [`DomainMappingSpec`] are what the engine produces after validating the
//! proposal against the reference store and computing confidence levels.
//! The proposal types derive `JsonSchema` because the schema is submitted
//! to the transport as a hard output constraint.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::enums::{
    ConfidenceLevel, CoreDesignation, DomainClass, MappingPattern, SuppOrigin, VariableDataType,
    VariableOrigin,
};

/// One proposed variable mapping, as emitted by the model.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct VariableMappingProposal {
    /// Target SDTM variable name (e.g. "AESTDTC").
    pub sdtm_variable: String,

    /// Source dataset filename stem, when the mapping reads source data.
    #[serde(default)]
    pub source_dataset: Option<String>,

    /// Source column name, when the mapping reads a single column.
    #[serde(default)]
    pub source_variable: Option<String>,

    /// Which handler materialises this variable.
    pub mapping_pattern: MappingPattern,

    /// Prose description of the transformation.
    pub mapping_logic: String,

    /// Derivation-rule mini-DSL string, for REFORMAT/SPLIT/COMBINE/DERIVATION.
    #[serde(default)]
    pub derivation_rule: Option<String>,

    /// Constant value, for ASSIGN.
    #[serde(default)]
    pub assigned_value: Option<String>,

    /// NCI codelist code the value is recoded against, for LOOKUP_RECODE.
    #[serde(default)]
    pub codelist_code: Option<String>,

    /// Model self-assessed confidence in [0, 1].
    pub confidence: f64,

    /// Why the model chose this mapping.
    pub rationale: String,
}

/// A proposed supplemental qualifier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct SuppVariable {
    /// Qualifier name: uppercase alphanumeric, at most 8 characters.
    pub qnam: String,

    /// Qualifier label, at most 40 characters.
    pub qlabel: String,

    /// Source column the value is read from.
    pub source_col: String,

    /// Origin of the qualifier value.
    pub qorig: SuppOrigin,

    /// Evaluator (e.g. "INVESTIGATOR"), when applicable.
    #[serde(default)]
    pub qeval: Option<String>,
}

/// The complete schema-constrained LLM output for one domain.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct DomainMappingProposal {
    /// Proposed mappings, one per target variable.
    pub variable_mappings: Vec<VariableMappingProposal>,

    /// Source columns the model could not place.
    #[serde(default)]
    pub unmapped_source_variables: Vec<String>,

    /// Non-standard source columns worth carrying as SUPPQUAL.
    #[serde(default)]
    pub suppqual_candidates: Vec<SuppVariable>,
}

/// A variable mapping after validation and enrichment.
///
/// Invariant: `origin` is always set; `confidence_level` is consistent with
/// `confidence` at the 0.85 / 0.60 thresholds after adjustment.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct VariableMapping {
    pub sdtm_variable: String,
    pub sdtm_label: String,
    pub sdtm_data_type: VariableDataType,
    pub core: CoreDesignation,
    #[serde(default)]
    pub source_dataset: Option<String>,
    #[serde(default)]
    pub source_variable: Option<String>,
    pub mapping_pattern: MappingPattern,
    pub mapping_logic: String,
    #[serde(default)]
    pub derivation_rule: Option<String>,
    #[serde(default)]
    pub assigned_value: Option<String>,
    #[serde(default)]
    pub codelist_code: Option<String>,
    #[serde(default)]
    pub codelist_name: Option<String>,
    pub origin: VariableOrigin,
    pub confidence: f64,
    pub confidence_level: ConfidenceLevel,
    /// Flagged when a Req variable lands below the mandatory-review floor.
    #[serde(default)]
    pub needs_review: bool,
    pub rationale: String,
    /// Position within the domain, from the reference spec.
    pub order: u32,
    /// Enrichment notes: CT misses, unknown source columns, adjustments.
    #[serde(default)]
    pub notes: Vec<String>,
}

/// Per-spec mapping counts.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct MappingSummary {
    pub total: usize,
    pub required_mapped: usize,
    pub expected_mapped: usize,
    pub high_count: usize,
    pub medium_count: usize,
    pub low_count: usize,
}

impl MappingSummary {
    /// Recompute counts from a mapping list. The sole constructor, so the
    /// summary can never drift from the mappings it describes.
    pub fn from_mappings(mappings: &[VariableMapping]) -> Self {
        let mut summary = Self {
            total: mappings.len(),
            ..Self::default()
        };
        for mapping in mappings {
            match mapping.core {
                CoreDesignation::Required => summary.required_mapped += 1,
                CoreDesignation::Expected => summary.expected_mapped += 1,
                CoreDesignation::Permissible => {}
            }
            match mapping.confidence_level {
                ConfidenceLevel::High => summary.high_count += 1,
                ConfidenceLevel::Medium => summary.medium_count += 1,
                ConfidenceLevel::Low => summary.low_count += 1,
            }
        }
        summary
    }
}

/// The enriched mapping specification for one domain.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DomainMappingSpec {
    pub domain: String,
    pub domain_label: String,
    pub domain_class: DomainClass,
    pub structure: String,
    pub study_id: String,
    /// Source dataset stems this spec reads from.
    pub source_datasets: Vec<String>,
    /// Other domains the spec reaches into (e.g. EX for RFSTDTC).
    #[serde(default)]
    pub cross_domain_sources: Vec<String>,
    pub variable_mappings: Vec<VariableMapping>,
    #[serde(default)]
    pub unmapped_source_variables: Vec<String>,
    #[serde(default)]
    pub suppqual_candidates: Vec<SuppVariable>,
    pub summary: MappingSummary,
    pub mapping_timestamp: DateTime<Utc>,
    pub model_used: String,
}

impl DomainMappingSpec {
    /// Find a mapping by target variable name, case-insensitive.
    pub fn find_mapping(&self, sdtm_variable: &str) -> Option<&VariableMapping> {
        self.variable_mappings
            .iter()
            .find(|m| m.sdtm_variable.eq_ignore_ascii_case(sdtm_variable))
    }

    /// Rebuild the summary after mutating the mapping list.
    pub fn refresh_summary(&mut self) {
        self.summary = MappingSummary::from_mappings(&self.variable_mappings);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mapping(name: &str, core: CoreDesignation, confidence: f64) -> VariableMapping {
        VariableMapping {
            sdtm_variable: name.to_string(),
            sdtm_label: name.to_string(),
            sdtm_data_type: VariableDataType::Char,
            core,
            source_dataset: None,
            source_variable: None,
            mapping_pattern: MappingPattern::Assign,
            mapping_logic: String::new(),
            derivation_rule: None,
            assigned_value: Some("X".to_string()),
            codelist_code: None,
            codelist_name: None,
            origin: VariableOrigin::Assigned,
            confidence,
            confidence_level: ConfidenceLevel::from_confidence(confidence),
            needs_review: false,
            rationale: String::new(),
            order: 1,
            notes: Vec::new(),
        }
    }

    #[test]
    fn summary_counts_by_core_and_level() {
        let mappings = vec![
            mapping("STUDYID", CoreDesignation::Required, 0.99),
            mapping("AESEV", CoreDesignation::Expected, 0.7),
            mapping("AEREL", CoreDesignation::Permissible, 0.3),
        ];
        let summary = MappingSummary::from_mappings(&mappings);
        assert_eq!(summary.total, 3);
        assert_eq!(summary.required_mapped, 1);
        assert_eq!(summary.expected_mapped, 1);
        assert_eq!(summary.high_count, 1);
        assert_eq!(summary.medium_count, 1);
        assert_eq!(summary.low_count, 1);
    }
}
