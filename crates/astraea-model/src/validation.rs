//! Validation findings.

use serde::{Deserialize, Serialize};

use crate::enums::{RuleCategory, RuleSeverity};

/// One validation finding from one rule.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RuleResult {
    /// Stable rule identifier (e.g. "CT001", "TRC002").
    pub rule_id: String,
    pub rule_description: String,
    pub category: RuleCategory,
    pub severity: RuleSeverity,
    pub domain: String,
    #[serde(default)]
    pub variable: Option<String>,
    pub message: String,
    /// How many rows/values the finding covers.
    pub affected_count: usize,
    #[serde(default)]
    pub fix_suggestion: Option<String>,
    /// Conventional Pinnacle 21 rule id, where one exists (e.g. "SD0007").
    #[serde(default)]
    pub p21_equivalent: Option<String>,
}

impl RuleResult {
    pub fn is_error(&self) -> bool {
        self.severity == RuleSeverity::Error
    }
}

/// Count findings at each severity.
pub fn severity_counts(results: &[RuleResult]) -> (usize, usize, usize, usize) {
    let mut counts = (0, 0, 0, 0);
    for result in results {
        match result.severity {
            RuleSeverity::Error => counts.0 += 1,
            RuleSeverity::Warning => counts.1 += 1,
            RuleSeverity::Notice => counts.2 += 1,
            RuleSeverity::Informational => counts.3 += 1,
        }
    }
    counts
}
