//! Review session state.
//!
//! A [`ReviewSession`] walks an ordered list of domains; each domain gets a
//! [`DomainReview`] accumulating one [`ReviewDecision`] per variable. Every
//! decision is persisted as soon as it is made, so a crash loses at most
//! one decision. The review gate is the sole mutator of these records.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::enums::{CorrectionType, DecisionStatus, ReviewStatus, SessionStatus};
use crate::mapping::{DomainMappingSpec, VariableMapping};

/// One reviewer decision about one variable mapping.
///
/// Invariant: `status == Corrected` implies `correction_type` is set, and
/// `corrected_mapping` is set unless the correction is a rejection.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ReviewDecision {
    pub sdtm_variable: String,
    pub status: DecisionStatus,
    #[serde(default)]
    pub correction_type: Option<CorrectionType>,
    #[serde(default)]
    pub corrected_mapping: Option<VariableMapping>,
}

impl ReviewDecision {
    pub fn approved(sdtm_variable: impl Into<String>) -> Self {
        Self {
            sdtm_variable: sdtm_variable.into(),
            status: DecisionStatus::Approved,
            correction_type: None,
            corrected_mapping: None,
        }
    }

    pub fn skipped(sdtm_variable: impl Into<String>) -> Self {
        Self {
            sdtm_variable: sdtm_variable.into(),
            status: DecisionStatus::Skipped,
            correction_type: None,
            corrected_mapping: None,
        }
    }

    pub fn corrected(
        sdtm_variable: impl Into<String>,
        correction_type: CorrectionType,
        corrected_mapping: Option<VariableMapping>,
    ) -> Self {
        Self {
            sdtm_variable: sdtm_variable.into(),
            status: DecisionStatus::Corrected,
            correction_type: Some(correction_type),
            corrected_mapping,
        }
    }
}

/// A captured human correction: the learning signal.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HumanCorrection {
    pub session_id: String,
    pub study_id: String,
    pub domain: String,
    pub sdtm_variable: String,
    pub correction_type: CorrectionType,
    pub original_mapping: VariableMapping,
    #[serde(default)]
    pub corrected_mapping: Option<VariableMapping>,
    pub reason: String,
    pub reviewer: String,
    pub timestamp: DateTime<Utc>,
    /// Set when the correction itself was later found wrong.
    #[serde(default)]
    pub invalidated: bool,
}

/// Review state for one domain within a session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DomainReview {
    pub session_id: String,
    pub domain: String,
    pub status: ReviewStatus,
    pub original_spec: DomainMappingSpec,
    /// Decisions keyed by SDTM variable name.
    pub decisions: BTreeMap<String, ReviewDecision>,
    pub corrections: Vec<HumanCorrection>,
}

impl DomainReview {
    pub fn new(session_id: impl Into<String>, spec: DomainMappingSpec) -> Self {
        Self {
            session_id: session_id.into(),
            domain: spec.domain.clone(),
            status: ReviewStatus::Pending,
            original_spec: spec,
            decisions: BTreeMap::new(),
            corrections: Vec::new(),
        }
    }

    /// True once every mapping in the original spec has a decision.
    pub fn all_decided(&self) -> bool {
        self.original_spec
            .variable_mappings
            .iter()
            .all(|m| self.decisions.contains_key(&m.sdtm_variable))
    }

    /// Whether this variable already has a recorded decision.
    pub fn is_decided(&self, sdtm_variable: &str) -> bool {
        self.decisions.contains_key(sdtm_variable)
    }
}

/// One interactive review run over an ordered list of domains.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReviewSession {
    pub session_id: String,
    pub study_id: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub status: SessionStatus,
    /// Domains in review order.
    pub domains: Vec<String>,
    /// Index of the domain currently under review.
    pub current_domain_index: usize,
}

impl ReviewSession {
    /// The domain the cursor is on, if the session is not exhausted.
    pub fn current_domain(&self) -> Option<&str> {
        self.domains
            .get(self.current_domain_index)
            .map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decision_constructors_satisfy_invariant() {
        let approved = ReviewDecision::approved("AESEV");
        assert!(approved.correction_type.is_none());

        let rejected = ReviewDecision::corrected("AESEV", CorrectionType::Reject, None);
        assert_eq!(rejected.status, DecisionStatus::Corrected);
        assert_eq!(rejected.correction_type, Some(CorrectionType::Reject));
        assert!(rejected.corrected_mapping.is_none());
    }
}
