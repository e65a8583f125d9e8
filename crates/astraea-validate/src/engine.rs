//! The validation engine.
//!
//! Runs the per-domain registry over every executed frame, then the
//! cross-domain registry over the whole map, then (when the caller supplies
//! an output directory and study id) the FDA technical-rejection
//! pre-checks. Findings come back severity-tagged and sorted, most severe
//! first; ERROR findings block submission packaging by default.

use std::collections::BTreeMap;
use std::path::Path;

use tracing::info;

use astraea_model::{RuleResult, severity_counts};
use astraea_reference::ReferenceStore;

use crate::checks::{cross::cross_rules, domain::domain_rules, trc::trc_rules};
use crate::registry::{DomainInput, RuleContext};

/// The validation engine over the bundled reference data.
pub struct ValidationEngine<'a> {
    reference: &'a ReferenceStore,
}

impl<'a> ValidationEngine<'a> {
    pub fn new(reference: &'a ReferenceStore) -> Self {
        Self { reference }
    }

    /// Validate every domain, then the cross-domain invariants, then the
    /// TRC pre-checks when `output_dir` and `study_id` are both supplied.
    pub fn validate_all(
        &self,
        domains: &BTreeMap<String, DomainInput<'_>>,
        output_dir: Option<&Path>,
        study_id: Option<&str>,
    ) -> Vec<RuleResult> {
        let ctx = RuleContext {
            reference: self.reference,
        };
        let mut results = Vec::new();

        for input in domains.values() {
            for rule in domain_rules() {
                results.extend((rule.evaluate)(&rule, &ctx, input));
            }
        }

        for rule in cross_rules() {
            results.extend((rule.evaluate)(&rule, &ctx, domains));
        }

        if let (Some(output_dir), Some(study_id)) = (output_dir, study_id) {
            for rule in trc_rules() {
                results.extend((rule.evaluate)(&rule, &ctx, domains, output_dir, study_id));
            }
        }

        results.sort_by(|a, b| {
            a.severity
                .cmp(&b.severity)
                .then_with(|| a.domain.cmp(&b.domain))
                .then_with(|| a.rule_id.cmp(&b.rule_id))
        });

        let (errors, warnings, notices, informational) = severity_counts(&results);
        info!(
            errors,
            warnings, notices, informational, "validation complete"
        );
        results
    }
}
