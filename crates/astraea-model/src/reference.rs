//! SDTM-IG domain specifications and controlled terminology.
//!
//! These types mirror the bundled reference data: one [`ReferenceDomain`]
//! per SDTM domain with its ordered variable list, and one [`Codelist`] per
//! NCI codelist with case-insensitive term lookup.
//!
//! # SDTMIG Reference
//!
//! - Domain tables: SDTMIG v3.4 Chapters 5-8
//! - Controlled terminology: SDTM CT (NCI EVS) quarterly releases

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::enums::{CoreDesignation, DomainClass, VariableDataType};

/// A single variable definition within a domain specification.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReferenceVariable {
    /// Variable name, at most 8 characters (e.g. "USUBJID", "AEDECOD").
    pub name: String,

    /// Label, at most 40 characters.
    pub label: String,

    /// Char or Num.
    pub data_type: VariableDataType,

    /// Req, Exp, or Perm.
    pub core: CoreDesignation,

    /// NCI codelist code when the variable is CT-bound (e.g. "C66731").
    #[serde(default)]
    pub codelist_code: Option<String>,

    /// Position within the domain; unique per domain.
    pub order: u32,
}

/// An SDTM domain specification.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReferenceDomain {
    /// Two-letter domain code (e.g. "DM", "AE").
    pub code: String,

    /// Human-readable label (e.g. "Demographics").
    pub label: String,

    /// Dataset class.
    pub class: DomainClass,

    /// Structure note (e.g. "One record per subject").
    pub structure_note: String,

    /// Natural key variables, in key order.
    #[serde(default)]
    pub key_variables: Vec<String>,

    /// Variables in submission order.
    pub variables: Vec<ReferenceVariable>,
}

impl ReferenceDomain {
    /// Find a variable by name, case-insensitive.
    pub fn find_variable(&self, name: &str) -> Option<&ReferenceVariable> {
        self.variables
            .iter()
            .find(|v| v.name.eq_ignore_ascii_case(name))
    }

    /// Variables with core designation Req, in order.
    pub fn required_variables(&self) -> impl Iterator<Item = &ReferenceVariable> {
        self.variables.iter().filter(|v| v.core.is_required())
    }

    /// Variables with core designation Exp, in order.
    pub fn expected_variables(&self) -> impl Iterator<Item = &ReferenceVariable> {
        self.variables
            .iter()
            .filter(|v| v.core == CoreDesignation::Expected)
    }

    /// The domain's sequence variable name (e.g. "AESEQ"), if defined.
    pub fn seq_variable(&self) -> Option<&str> {
        let expected = format!("{}SEQ", self.code);
        self.find_variable(&expected).map(|v| v.name.as_str())
    }

    /// Domain-specific variable names, excluding the shared identifier set.
    ///
    /// Used by the heuristic classifier for variable-overlap scoring.
    pub fn specific_variable_names(&self) -> Vec<&str> {
        const SHARED: [&str; 5] = ["STUDYID", "DOMAIN", "USUBJID", "SUBJID", "SITEID"];
        self.variables
            .iter()
            .map(|v| v.name.as_str())
            .filter(|name| !SHARED.contains(&name.to_uppercase().as_str()))
            .collect()
    }
}

/// Metadata for one term within a codelist.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TermMetadata {
    /// The permissible value as it appears in datasets (e.g. "M").
    pub submission_value: String,

    /// NCI concept code for the term (e.g. "C20197").
    #[serde(default)]
    pub nci_code: Option<String>,

    /// Alternative spellings that normalise to the submission value.
    #[serde(default)]
    pub synonyms: Vec<String>,

    /// Decode / preferred term (e.g. "Male").
    #[serde(default)]
    pub decode: Option<String>,
}

/// A controlled-terminology codelist.
///
/// Terms are keyed by uppercase submission value so membership checks and
/// recodes are case-insensitive.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Codelist {
    /// NCI codelist code (e.g. "C66731").
    pub code: String,

    /// Codelist name (e.g. "Sex").
    pub name: String,

    /// Whether sponsors may extend the value set.
    /// Non-extensible misses are validation errors; extensible misses warn.
    pub extensible: bool,

    /// Terms keyed by uppercase submission value.
    pub terms: BTreeMap<String, TermMetadata>,

    /// SDTM variable names this codelist binds to (e.g. ["SEX"]).
    #[serde(default)]
    pub variable_mappings: Vec<String>,
}

impl Codelist {
    /// Check membership, case-insensitive over submission values and synonyms.
    pub fn is_valid(&self, value: &str) -> bool {
        let key = value.trim().to_uppercase();
        if self.terms.contains_key(&key) {
            return true;
        }
        self.terms
            .values()
            .any(|t| t.synonyms.iter().any(|s| s.eq_ignore_ascii_case(value.trim())))
    }

    /// Recode a raw value to its canonical submission value.
    ///
    /// Returns `None` on miss; never errors.
    pub fn recode(&self, value: &str) -> Option<&str> {
        let key = value.trim().to_uppercase();
        if let Some(term) = self.terms.get(&key) {
            return Some(term.submission_value.as_str());
        }
        self.terms
            .values()
            .find(|t| t.synonyms.iter().any(|s| s.eq_ignore_ascii_case(value.trim())))
            .map(|t| t.submission_value.as_str())
    }

    /// Submission values in deterministic (BTreeMap key) order.
    pub fn submission_values(&self) -> Vec<&str> {
        self.terms
            .values()
            .map(|t| t.submission_value.as_str())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sex_codelist() -> Codelist {
        let mut terms = BTreeMap::new();
        terms.insert(
            "F".to_string(),
            TermMetadata {
                submission_value: "F".to_string(),
                nci_code: Some("C16576".to_string()),
                synonyms: vec!["Female".to_string()],
                decode: Some("Female".to_string()),
            },
        );
        terms.insert(
            "M".to_string(),
            TermMetadata {
                submission_value: "M".to_string(),
                nci_code: Some("C20197".to_string()),
                synonyms: vec!["Male".to_string()],
                decode: Some("Male".to_string()),
            },
        );
        Codelist {
            code: "C66731".to_string(),
            name: "Sex".to_string(),
            extensible: false,
            terms,
            variable_mappings: vec!["SEX".to_string()],
        }
    }

    #[test]
    fn recode_is_case_insensitive() {
        let cl = sex_codelist();
        assert_eq!(cl.recode("m"), Some("M"));
        assert_eq!(cl.recode("FEMALE"), Some("F"));
        assert_eq!(cl.recode("Other"), None);
    }

    #[test]
    fn membership_checks_synonyms() {
        let cl = sex_codelist();
        assert!(cl.is_valid("Male"));
        assert!(cl.is_valid("f"));
        assert!(!cl.is_valid("X"));
    }
}
