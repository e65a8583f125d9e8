//! Domain template library.
//!
//! One template per domain, abstracting the approved specs seen so far:
//! which patterns the domain uses, which source-name keywords feed each
//! variable, and a study-count-weighted accuracy. Updated incrementally as
//! reviews complete.

use std::collections::BTreeSet;

use astraea_model::{DomainMappingSpec, DomainTemplate, VariablePattern};

use crate::error::LearnError;
use crate::store::LearningStore;

/// Incrementally fold one approved spec into the domain's template.
pub fn update_template(
    store: &LearningStore,
    spec: &DomainMappingSpec,
    accuracy_rate: f64,
) -> Result<DomainTemplate, LearnError> {
    let mut template = store
        .load_template(&spec.domain)?
        .unwrap_or_else(|| DomainTemplate::new(spec.domain.clone()));

    // Re-ingesting the same study replaces nothing and reweights nothing.
    let fresh_study = template.source_study_ids.insert(spec.study_id.clone());
    if fresh_study {
        let previous_count = (template.source_study_ids.len() - 1) as f64;
        template.accuracy_rate = if previous_count == 0.0 {
            accuracy_rate
        } else {
            (template.accuracy_rate * previous_count + accuracy_rate) / (previous_count + 1.0)
        };
    }

    for mapping in &spec.variable_mappings {
        *template
            .pattern_distribution
            .entry(mapping.mapping_pattern)
            .or_insert(0) += usize::from(fresh_study);

        let keywords: BTreeSet<String> = mapping
            .source_variable
            .iter()
            .flat_map(|s| {
                s.to_lowercase()
                    .split(|c: char| !c.is_ascii_alphanumeric())
                    .filter(|t| t.len() > 1)
                    .map(str::to_string)
                    .collect::<Vec<_>>()
            })
            .collect();

        match template
            .variable_patterns
            .iter_mut()
            .find(|p| p.sdtm_variable == mapping.sdtm_variable)
        {
            Some(pattern) => {
                pattern.source_keywords.extend(keywords);
                if fresh_study {
                    pattern.occurrences += 1;
                }
                if pattern.derivation_template.is_none() {
                    pattern.derivation_template = mapping.derivation_rule.clone();
                }
            }
            None => template.variable_patterns.push(VariablePattern {
                sdtm_variable: mapping.sdtm_variable.clone(),
                mapping_pattern: mapping.mapping_pattern,
                source_keywords: keywords,
                derivation_template: mapping.derivation_rule.clone(),
                occurrences: 1,
            }),
        }
    }

    store.save_template(&template)?;
    Ok(template)
}
