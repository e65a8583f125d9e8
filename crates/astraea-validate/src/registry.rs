//! Rule definitions and the registry.
//!
//! A rule is a static definition (id, description, category, nominal
//! severity, P21 equivalent) plus an evaluation function. Per-domain rules
//! see one executed frame; cross-domain rules see the whole study map.
//! FDA technical-rejection pre-checks additionally see the output
//! directory and study id.

use std::collections::BTreeMap;
use std::path::Path;

use astraea_exec::frame::DomainFrame;
use astraea_model::{DomainMappingSpec, RuleCategory, RuleResult, RuleSeverity};
use astraea_reference::ReferenceStore;

/// One domain's validation input.
pub struct DomainInput<'a> {
    pub frame: &'a DomainFrame,
    /// The reviewed spec, when the domain came through the mapping flow.
    pub spec: Option<&'a DomainMappingSpec>,
}

/// Shared evaluation context.
pub struct RuleContext<'a> {
    pub reference: &'a ReferenceStore,
}

/// A per-domain rule.
pub struct RuleDef {
    pub rule_id: &'static str,
    pub description: &'static str,
    pub category: RuleCategory,
    pub severity: RuleSeverity,
    pub p21_equivalent: Option<&'static str>,
    pub evaluate: fn(&RuleDef, &RuleContext<'_>, &DomainInput<'_>) -> Vec<RuleResult>,
}

/// A cross-domain rule over the full study map.
pub struct CrossRuleDef {
    pub rule_id: &'static str,
    pub description: &'static str,
    pub category: RuleCategory,
    pub severity: RuleSeverity,
    pub p21_equivalent: Option<&'static str>,
    pub evaluate:
        fn(&CrossRuleDef, &RuleContext<'_>, &BTreeMap<String, DomainInput<'_>>) -> Vec<RuleResult>,
}

/// A technical-rejection pre-check over the serialised output tree.
pub struct TrcRuleDef {
    pub rule_id: &'static str,
    pub description: &'static str,
    pub severity: RuleSeverity,
    pub evaluate: fn(
        &TrcRuleDef,
        &RuleContext<'_>,
        &BTreeMap<String, DomainInput<'_>>,
        &Path,
        &str,
    ) -> Vec<RuleResult>,
}

impl RuleDef {
    /// Build a finding under this rule's identity.
    pub fn finding(
        &self,
        domain: &str,
        variable: Option<&str>,
        message: String,
        affected_count: usize,
    ) -> RuleResult {
        self.finding_with_severity(self.severity, domain, variable, message, affected_count)
    }

    /// Build a finding with an overriding severity (extensible-codelist
    /// misses downgrade to warnings under the same rule family).
    pub fn finding_with_severity(
        &self,
        severity: RuleSeverity,
        domain: &str,
        variable: Option<&str>,
        message: String,
        affected_count: usize,
    ) -> RuleResult {
        RuleResult {
            rule_id: self.rule_id.to_string(),
            rule_description: self.description.to_string(),
            category: self.category,
            severity,
            domain: domain.to_string(),
            variable: variable.map(str::to_string),
            message,
            affected_count,
            fix_suggestion: None,
            p21_equivalent: self.p21_equivalent.map(str::to_string),
        }
    }
}

impl CrossRuleDef {
    pub fn finding(
        &self,
        domain: &str,
        variable: Option<&str>,
        message: String,
        affected_count: usize,
    ) -> RuleResult {
        RuleResult {
            rule_id: self.rule_id.to_string(),
            rule_description: self.description.to_string(),
            category: self.category,
            severity: self.severity,
            domain: domain.to_string(),
            variable: variable.map(str::to_string),
            message,
            affected_count,
            fix_suggestion: None,
            p21_equivalent: self.p21_equivalent.map(str::to_string),
        }
    }
}

impl TrcRuleDef {
    pub fn finding(&self, domain: &str, message: String) -> RuleResult {
        RuleResult {
            rule_id: self.rule_id.to_string(),
            rule_description: self.description.to_string(),
            category: RuleCategory::FdaTrc,
            severity: self.severity,
            domain: domain.to_string(),
            variable: None,
            message,
            affected_count: 1,
            fix_suggestion: None,
            p21_equivalent: None,
        }
    }
}
