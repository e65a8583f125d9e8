//! Few-shot retrieval for the mapping prompt.
//!
//! Corrections come first (they carry the strongest signal: what the model
//! got wrong last time), then approved examples, capped at five total.
//! Cold start returns `None` and the mapping prompt is unchanged.

use serde_json::Value;

use astraea_model::DatasetProfile;

use crate::error::LearnError;
use crate::index::{COLLECTION_APPROVED, COLLECTION_CORRECTIONS, SemanticIndex};

/// Maximum corrections shown per prompt.
const MAX_CORRECTIONS: usize = 3;
/// Default total example cap.
pub const DEFAULT_MAX_EXAMPLES: usize = 5;

/// Retrieves learned examples for the context builder.
pub struct LearningRetriever<'a> {
    index: &'a SemanticIndex,
}

impl<'a> LearningRetriever<'a> {
    pub fn new(index: &'a SemanticIndex) -> Self {
        Self { index }
    }

    /// Build the learned-examples prompt section for a domain.
    ///
    /// Returns `None` when neither collection has anything relevant.
    pub fn examples_section(
        &self,
        domain: &str,
        source_profiles: &[DatasetProfile],
        max_examples: usize,
    ) -> Result<Option<String>, LearnError> {
        let query = query_text(domain, source_profiles);

        let corrections =
            self.index
                .query(COLLECTION_CORRECTIONS, Some(domain), &query, MAX_CORRECTIONS)?;
        let approved_slots = max_examples.saturating_sub(corrections.len());
        let approved =
            self.index
                .query(COLLECTION_APPROVED, Some(domain), &query, approved_slots)?;

        if corrections.is_empty() && approved.is_empty() {
            return Ok(None);
        }

        let mut section = String::new();
        for (number, hit) in corrections.iter().enumerate() {
            section.push_str(&format!("### Correction Example {}\n", number + 1));
            let metadata = &hit.entry.metadata;
            section.push_str(&format!(
                "WRONG: {}\n",
                summarise_mapping(metadata.get("original_mapping"))
            ));
            match metadata.get("corrected_mapping").filter(|v| !v.is_null()) {
                Some(corrected) => {
                    section.push_str(&format!("CORRECT: {}\n", summarise_mapping(Some(corrected))));
                }
                None => section.push_str("CORRECT: (mapping rejected entirely)\n"),
            }
            if let Some(reason) = metadata.get("reason").and_then(Value::as_str) {
                section.push_str(&format!("Reason: {reason}\n"));
            }
            section.push('\n');
        }

        for (number, hit) in approved.iter().enumerate() {
            section.push_str(&format!("### Approved Example {}\n", number + 1));
            section.push_str(&format!(
                "{}\n\n",
                summarise_mapping(hit.entry.metadata.get("final_mapping"))
            ));
        }

        Ok(Some(section.trim_end().to_string()))
    }
}

fn query_text(domain: &str, source_profiles: &[DatasetProfile]) -> String {
    let mut text = format!("SDTM domain {domain} mapping.");
    for profile in source_profiles {
        text.push_str(&format!(" Source dataset {} with columns", profile.filename));
        for variable in profile.clinical_variables().take(25) {
            text.push(' ');
            text.push_str(&variable.name);
            if let Some(label) = &variable.label {
                text.push(' ');
                text.push_str(label);
            }
        }
        text.push('.');
    }
    text
}

fn summarise_mapping(mapping: Option<&Value>) -> String {
    let Some(mapping) = mapping else {
        return "(unknown mapping)".to_string();
    };
    let variable = mapping
        .get("sdtm_variable")
        .and_then(Value::as_str)
        .unwrap_or("?");
    let pattern = mapping
        .get("mapping_pattern")
        .and_then(Value::as_str)
        .unwrap_or("?");
    let logic = mapping
        .get("mapping_logic")
        .and_then(Value::as_str)
        .unwrap_or("");
    let source = mapping
        .get("source_variable")
        .and_then(Value::as_str)
        .map(|s| format!(" from {s}"))
        .unwrap_or_default();
    format!("{variable}: {pattern}{source}; logic: {logic}")
}
