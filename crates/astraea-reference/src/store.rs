//! The reference store: domain specs, codelists, and the reverse index.
//!
//! Construction parses the bundled JSON once, validates structural
//! invariants (unique variable order per domain, unique submission values
//! per codelist), and builds the reverse `variable -> codelists` index.
//! The store is read-only for its lifetime and may be freely shared.

use std::collections::BTreeMap;

use tracing::warn;

use astraea_model::{Codelist, ReferenceDomain};

use crate::error::ReferenceError;

const DOMAINS_JSON: &str = include_str!("../data/domains.json");
const CODELISTS_JSON: &str = include_str!("../data/codelists.json");

/// Read-only store over the bundled SDTM-IG and CT resources.
#[derive(Debug)]
pub struct ReferenceStore {
    domains: BTreeMap<String, ReferenceDomain>,
    codelists: BTreeMap<String, Codelist>,
    /// Reverse index: uppercase variable name -> codelist codes.
    ///
    /// Multi-valued because some variables legitimately appear in more
    /// than one codelist (specimen type vs. specimen condition being the
    /// known collision class). Collisions are logged, never resolved
    /// arbitrarily.
    variable_index: BTreeMap<String, Vec<String>>,
}

impl ReferenceStore {
    /// Load the bundled resources. Fails fast on malformed data.
    pub fn load() -> Result<Self, ReferenceError> {
        Self::from_json(DOMAINS_JSON, CODELISTS_JSON)
    }

    /// Load from explicit JSON strings (exposed for tests).
    pub fn from_json(domains_json: &str, codelists_json: &str) -> Result<Self, ReferenceError> {
        let domain_list: Vec<ReferenceDomain> =
            serde_json::from_str(domains_json).map_err(|source| ReferenceError::Malformed {
                resource: "domains.json",
                source,
            })?;
        let codelist_list: Vec<Codelist> =
            serde_json::from_str(codelists_json).map_err(|source| ReferenceError::Malformed {
                resource: "codelists.json",
                source,
            })?;

        let mut domains = BTreeMap::new();
        for domain in domain_list {
            validate_domain(&domain)?;
            if domains.insert(domain.code.to_uppercase(), domain).is_some() {
                return Err(ReferenceError::Inconsistent(
                    "duplicate domain code in bundle".to_string(),
                ));
            }
        }

        let mut codelists = BTreeMap::new();
        let mut variable_index: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for codelist in codelist_list {
            for variable in &codelist.variable_mappings {
                variable_index
                    .entry(variable.to_uppercase())
                    .or_default()
                    .push(codelist.code.clone());
            }
            if codelists
                .insert(codelist.code.to_uppercase(), codelist)
                .is_some()
            {
                return Err(ReferenceError::Inconsistent(
                    "duplicate codelist code in bundle".to_string(),
                ));
            }
        }

        Ok(Self {
            domains,
            codelists,
            variable_index,
        })
    }

    /// Domain spec by two-letter code.
    pub fn get_domain_spec(&self, code: &str) -> Result<&ReferenceDomain, ReferenceError> {
        self.domains
            .get(&code.to_uppercase())
            .ok_or_else(|| ReferenceError::UnknownDomain(code.to_string()))
    }

    /// True when the code names a bundled domain.
    pub fn is_known_domain(&self, code: &str) -> bool {
        self.domains.contains_key(&code.to_uppercase())
    }

    /// All bundled domain codes, sorted.
    pub fn domain_codes(&self) -> Vec<&str> {
        self.domains.values().map(|d| d.code.as_str()).collect()
    }

    /// Codelist by NCI code.
    pub fn lookup_codelist(&self, code: &str) -> Option<&Codelist> {
        self.codelists.get(&code.to_uppercase())
    }

    /// Every codelist bound to a variable name.
    pub fn get_codelists_for_variable(&self, name: &str) -> Vec<&Codelist> {
        self.variable_index
            .get(&name.to_uppercase())
            .map(|codes| {
                codes
                    .iter()
                    .filter_map(|code| self.codelists.get(&code.to_uppercase()))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// First codelist bound to a variable name.
    ///
    /// Logs a warning when the variable binds to more than one codelist.
    pub fn get_codelist_for_variable(&self, name: &str) -> Option<&Codelist> {
        let matches = self.get_codelists_for_variable(name);
        if matches.len() >= 2 {
            warn!(
                variable = name,
                codelists = ?matches.iter().map(|c| c.code.as_str()).collect::<Vec<_>>(),
                "variable binds to multiple codelists; using the first"
            );
        }
        matches.first().copied()
    }

    /// Whether a value is a member of a codelist (case-insensitive).
    ///
    /// Unknown codelist codes validate as false.
    pub fn validate_term(&self, codelist_code: &str, value: &str) -> bool {
        self.lookup_codelist(codelist_code)
            .is_some_and(|cl| cl.is_valid(value))
    }
}

fn validate_domain(domain: &ReferenceDomain) -> Result<(), ReferenceError> {
    let mut seen_orders = BTreeMap::new();
    for variable in &domain.variables {
        if variable.name.len() > 8 {
            return Err(ReferenceError::Inconsistent(format!(
                "{}.{}: variable name exceeds 8 characters",
                domain.code, variable.name
            )));
        }
        if variable.label.len() > 40 {
            return Err(ReferenceError::Inconsistent(format!(
                "{}.{}: label exceeds 40 characters",
                domain.code, variable.name
            )));
        }
        if let Some(previous) = seen_orders.insert(variable.order, variable.name.clone()) {
            return Err(ReferenceError::Inconsistent(format!(
                "{}: variables {} and {} share order {}",
                domain.code, previous, variable.name, variable.order
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bundled_data_loads() {
        let store = ReferenceStore::load().expect("bundled data");
        assert!(store.is_known_domain("DM"));
        assert!(store.is_known_domain("ae"));
        assert!(!store.is_known_domain("ZZ"));
    }

    #[test]
    fn duplicate_order_is_rejected() {
        let domains = r#"[{
            "code": "XX", "label": "Test", "class": "Events",
            "structure_note": "one record per thing",
            "variables": [
                {"name": "A", "label": "A", "data_type": "Char", "core": "Req", "order": 1},
                {"name": "B", "label": "B", "data_type": "Char", "core": "Req", "order": 1}
            ]
        }]"#;
        let err = ReferenceStore::from_json(domains, "[]").unwrap_err();
        assert!(matches!(err, ReferenceError::Inconsistent(_)));
    }

    #[test]
    fn sex_terms_validate() {
        let store = ReferenceStore::load().expect("bundled data");
        assert!(store.validate_term("C66731", "F"));
        assert!(store.validate_term("C66731", "m"));
        assert!(!store.validate_term("C66731", "Other"));
    }
}
