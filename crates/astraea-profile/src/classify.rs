//! Heuristic domain classification.
//!
//! Two signals per (dataset, domain) pair: the filename stem and the
//! fraction of domain-specific variables visible in the profile. The final
//! score is the max of the two; datasets scoring below the floor against
//! every domain land in the UNCLASSIFIED bucket. Datasets sharing a top
//! domain become a merge-group candidate (multi-source domains like DS).

use std::collections::BTreeMap;

use tracing::debug;

use astraea_model::DatasetProfile;
use astraea_reference::ReferenceStore;

/// Scores below this go to UNCLASSIFIED.
pub const CLASSIFICATION_FLOOR: f64 = 0.3;

const FILENAME_EXACT_SCORE: f64 = 1.0;
const FILENAME_SEGMENT_SCORE: f64 = 0.7;

/// Score of one dataset against one domain.
#[derive(Debug, Clone, PartialEq)]
pub struct DomainScore {
    pub domain: String,
    pub score: f64,
}

/// The classifier's proposal for a study's raw inputs.
#[derive(Debug, Clone, Default)]
pub struct ClassificationPlan {
    /// Best domain per dataset, for datasets above the floor.
    pub assignments: BTreeMap<String, DomainScore>,
    /// Datasets per domain; entries with more than one dataset are
    /// multi-source merge candidates.
    pub merge_groups: BTreeMap<String, Vec<String>>,
    /// Datasets no domain claimed.
    pub unclassified: Vec<String>,
}

/// Classify every profile against every bundled domain.
pub fn classify_profiles(
    profiles: &[DatasetProfile],
    reference: &ReferenceStore,
) -> ClassificationPlan {
    let mut plan = ClassificationPlan::default();

    for profile in profiles {
        let mut best: Option<DomainScore> = None;
        for code in reference.domain_codes() {
            let Ok(domain) = reference.get_domain_spec(code) else {
                continue;
            };
            let filename = filename_score(&profile.stem(), code);
            let overlap = variable_overlap_score(profile, &domain.specific_variable_names());
            let score = filename.max(overlap);
            debug!(
                dataset = profile.filename.as_str(),
                domain = code,
                filename_score = filename,
                overlap_score = overlap,
                "classifier signal"
            );
            if best.as_ref().is_none_or(|b| score > b.score) {
                best = Some(DomainScore {
                    domain: code.to_string(),
                    score,
                });
            }
        }

        match best {
            Some(score) if score.score >= CLASSIFICATION_FLOOR => {
                plan.merge_groups
                    .entry(score.domain.clone())
                    .or_default()
                    .push(profile.filename.clone());
                plan.assignments.insert(profile.filename.clone(), score);
            }
            _ => plan.unclassified.push(profile.filename.clone()),
        }
    }

    plan
}

/// Filename signal: exact two-letter stem scores 1.0; a domain code on a
/// segment boundary (`_`/`-`/string edge) scores 0.7; anything else 0.
pub fn filename_score(stem: &str, domain_code: &str) -> f64 {
    let stem = stem.to_uppercase();
    let code = domain_code.to_uppercase();
    if stem == code {
        return FILENAME_EXACT_SCORE;
    }
    for segment in stem.split(['_', '-']) {
        if segment == code {
            return FILENAME_SEGMENT_SCORE;
        }
        // Leading code inside a longer segment (e.g. "AELOG").
        if segment.len() > code.len() && segment.starts_with(&code) {
            return FILENAME_SEGMENT_SCORE;
        }
    }
    0.0
}

/// Variable-overlap signal: the fraction of domain-specific variables whose
/// name is a prefix of some profile column (uppercased).
pub fn variable_overlap_score(profile: &DatasetProfile, domain_variables: &[&str]) -> f64 {
    if domain_variables.is_empty() {
        return 0.0;
    }
    let columns: Vec<String> = profile
        .variables
        .iter()
        .map(|v| v.name.to_uppercase())
        .collect();
    let matched = domain_variables
        .iter()
        .filter(|var| {
            let var = var.to_uppercase();
            columns.iter().any(|col| col == &var || col.starts_with(&var))
        })
        .count();
    matched as f64 / domain_variables.len() as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use astraea_model::VariableProfile;

    fn profile(filename: &str, columns: &[&str]) -> DatasetProfile {
        DatasetProfile {
            filename: filename.to_string(),
            row_count: 10,
            variables: columns
                .iter()
                .map(|name| VariableProfile {
                    name: (*name).to_string(),
                    label: None,
                    dtype: "str".to_string(),
                    n_unique: 5,
                    n_missing: 0,
                    sample_values: Vec::new(),
                    is_edc_system_column: false,
                })
                .collect(),
            is_sdtm_preformatted: false,
            domain_metadata: BTreeMap::new(),
        }
    }

    #[test]
    fn filename_signal_tiers() {
        assert_eq!(filename_score("AE", "AE"), 1.0);
        assert_eq!(filename_score("ae_log", "AE"), 0.7);
        assert_eq!(filename_score("study_ae", "AE"), 0.7);
        assert_eq!(filename_score("demography", "AE"), 0.0);
    }

    #[test]
    fn merge_groups_collect_same_domain() {
        let reference = ReferenceStore::load().unwrap();
        let profiles = vec![
            profile("ds.csv", &["DSDECOD", "DSTERM", "DSSTDTC"]),
            profile("ds2.csv", &["DSDECOD2", "DSTERM2"]),
            profile("mystery.csv", &["FOO", "BAR"]),
        ];
        let plan = classify_profiles(&profiles, &reference);
        assert_eq!(
            plan.merge_groups.get("DS"),
            Some(&vec!["ds.csv".to_string(), "ds2.csv".to_string()])
        );
        assert_eq!(plan.unclassified, vec!["mystery.csv".to_string()]);
    }

    #[test]
    fn overlap_signal_counts_prefix_matches() {
        let p = profile("x.csv", &["AETERM_STD", "AESEV", "OTHER"]);
        let score = variable_overlap_score(&p, &["AETERM", "AESEV", "AEOUT", "AESER"]);
        assert!((score - 0.5).abs() < 1e-9);
    }
}
