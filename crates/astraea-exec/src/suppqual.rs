//! SUPPQUAL generation.
//!
//! Supplemental qualifiers are generated deterministically from the
//! finalised parent domain, never by the model. One record per parent row
//! per qualifier with a non-null, non-empty source value, addressed back to
//! the parent via its sequence variable. Referential integrity is checked
//! in a post-step here and again by the validator.

use polars::prelude::{Column, DataFrame};
use tracing::{debug, warn};

use astraea_model::SuppVariable;

use crate::context::string_at;
use crate::error::ExecutionError;
use crate::frame::DomainFrame;
use crate::handlers::find_column;

/// Dataset code for a parent domain's supplemental dataset.
pub fn suppqual_domain_code(parent: &str) -> String {
    format!("SUPP{}", parent.to_uppercase())
}

/// Build the SUPP-- dataset for a finalised parent domain.
///
/// Returns `Ok(None)` when no qualifier produces any record.
pub fn build_suppqual(
    parent: &DomainFrame,
    candidates: &[SuppVariable],
    study_id: &str,
) -> Result<Option<DomainFrame>, ExecutionError> {
    if candidates.is_empty() {
        return Ok(None);
    }
    let parent_code = parent.domain_code.to_uppercase();
    let seq_name = format!("{parent_code}SEQ");
    let usubjid = find_column(&parent.data, "USUBJID");
    let seq = find_column(&parent.data, &seq_name);

    let mut studyid_values = Vec::new();
    let mut rdomain_values = Vec::new();
    let mut usubjid_values = Vec::new();
    let mut idvar_values = Vec::new();
    let mut idvarval_values = Vec::new();
    let mut qnam_values = Vec::new();
    let mut qlabel_values = Vec::new();
    let mut qval_values = Vec::new();
    let mut qorig_values = Vec::new();
    let mut qeval_values = Vec::new();

    for candidate in candidates {
        let Some(source) = find_column(&parent.data, &candidate.source_col) else {
            warn!(
                qnam = candidate.qnam.as_str(),
                source = candidate.source_col.as_str(),
                "suppqual source column missing from parent; skipped"
            );
            continue;
        };
        for row in 0..parent.data.height() {
            let Some(value) = string_at(source, row) else {
                continue;
            };
            let subject = usubjid.and_then(|c| string_at(c, row)).unwrap_or_default();
            let seq_value = seq.and_then(|c| string_at(c, row)).unwrap_or_default();
            studyid_values.push(study_id.to_string());
            rdomain_values.push(parent_code.clone());
            usubjid_values.push(subject);
            idvar_values.push(if seq_value.is_empty() {
                String::new()
            } else {
                seq_name.clone()
            });
            idvarval_values.push(seq_value);
            qnam_values.push(candidate.qnam.to_uppercase());
            qlabel_values.push(candidate.qlabel.clone());
            qval_values.push(value);
            qorig_values.push(candidate.qorig.as_str().to_string());
            qeval_values.push(candidate.qeval.clone().unwrap_or_default());
        }
    }

    if qnam_values.is_empty() {
        return Ok(None);
    }

    let data = DataFrame::new(vec![
        Column::new("STUDYID".into(), studyid_values),
        Column::new("RDOMAIN".into(), rdomain_values),
        Column::new("USUBJID".into(), usubjid_values),
        Column::new("IDVAR".into(), idvar_values),
        Column::new("IDVARVAL".into(), idvarval_values),
        Column::new("QNAM".into(), qnam_values),
        Column::new("QLABEL".into(), qlabel_values),
        Column::new("QVAL".into(), qval_values),
        Column::new("QORIG".into(), qorig_values),
        Column::new("QEVAL".into(), qeval_values),
    ])?;

    debug!(
        parent = parent_code.as_str(),
        records = data.height(),
        "suppqual generated"
    );
    Ok(Some(DomainFrame::new(
        suppqual_domain_code(&parent.domain_code),
        format!("Supplemental Qualifiers for {parent_code}"),
        data,
    )))
}

/// Post-generation referential-integrity check.
///
/// Every record must address an existing parent row via
/// (USUBJID, IDVAR value), and (USUBJID, IDVARVAL, QNAM) must be unique.
/// Violations are returned as messages; the validator re-registers them
/// as findings, nothing is silently corrected.
pub fn check_suppqual_integrity(parent: &DomainFrame, supp: &DomainFrame) -> Vec<String> {
    use std::collections::BTreeSet;

    let mut violations = Vec::new();
    let parent_seq_name = format!("{}SEQ", parent.domain_code.to_uppercase());
    let parent_usubjid = find_column(&parent.data, "USUBJID");
    let parent_seq = find_column(&parent.data, &parent_seq_name);

    let mut parent_keys: BTreeSet<(String, String)> = BTreeSet::new();
    for row in 0..parent.data.height() {
        let subject = parent_usubjid
            .and_then(|c| string_at(c, row))
            .unwrap_or_default();
        let seq = parent_seq
            .and_then(|c| string_at(c, row))
            .unwrap_or_default();
        parent_keys.insert((subject, seq));
    }

    let columns = (
        find_column(&supp.data, "USUBJID"),
        find_column(&supp.data, "IDVARVAL"),
        find_column(&supp.data, "QNAM"),
    );
    let (Some(usubjid), Some(idvarval), Some(qnam)) = columns else {
        return vec!["SUPP dataset is missing USUBJID/IDVARVAL/QNAM".to_string()];
    };

    let mut seen: BTreeSet<(String, String, String)> = BTreeSet::new();
    for row in 0..supp.data.height() {
        let subject = string_at(usubjid, row).unwrap_or_default();
        let id_value = string_at(idvarval, row).unwrap_or_default();
        let qualifier = string_at(qnam, row).unwrap_or_default();

        if !parent_keys.contains(&(subject.clone(), id_value.clone())) {
            violations.push(format!(
                "SUPP record ({subject}, {id_value}, {qualifier}) has no parent row"
            ));
        }
        if !seen.insert((subject.clone(), id_value.clone(), qualifier.clone())) {
            violations.push(format!(
                "duplicate SUPP key ({subject}, {id_value}, {qualifier})"
            ));
        }
    }
    violations
}

#[cfg(test)]
mod tests {
    use super::*;
    use astraea_model::SuppOrigin;

    fn parent() -> DomainFrame {
        let data = DataFrame::new(vec![
            Column::new("STUDYID".into(), ["PHA001", "PHA001"]),
            Column::new("USUBJID".into(), ["PHA-001-01", "PHA-001-02"]),
            Column::new("AESEQ".into(), ["1", "1"]),
            Column::new("AETERM".into(), ["Headache", "Nausea"]),
            Column::new("AESOURCE".into(), ["Diary", ""]),
        ])
        .unwrap();
        DomainFrame::new("AE", "Adverse Events", data)
    }

    fn candidate() -> SuppVariable {
        SuppVariable {
            qnam: "AESOURCE".to_string(),
            qlabel: "Source of AE Report".to_string(),
            source_col: "AESOURCE".to_string(),
            qorig: SuppOrigin::Crf,
            qeval: None,
        }
    }

    #[test]
    fn empty_values_produce_no_records() {
        let supp = build_suppqual(&parent(), &[candidate()], "PHA001")
            .unwrap()
            .unwrap();
        assert_eq!(supp.domain_code, "SUPPAE");
        // Only subject 01 has a non-empty source value.
        assert_eq!(supp.data.height(), 1);
        let idvar = supp.data.column("IDVAR").unwrap();
        assert_eq!(string_at(idvar, 0).as_deref(), Some("AESEQ"));
    }

    #[test]
    fn integrity_check_passes_for_generated_supp() {
        let parent = parent();
        let supp = build_suppqual(&parent, &[candidate()], "PHA001")
            .unwrap()
            .unwrap();
        assert!(check_suppqual_integrity(&parent, &supp).is_empty());
    }

    #[test]
    fn integrity_check_catches_orphans() {
        let parent = parent();
        let supp_data = DataFrame::new(vec![
            Column::new("USUBJID".into(), ["PHA-001-99"]),
            Column::new("IDVARVAL".into(), ["1"]),
            Column::new("QNAM".into(), ["AESOURCE"]),
        ])
        .unwrap();
        let supp = DomainFrame::new("SUPPAE", "Supp", supp_data);
        let violations = check_suppqual_integrity(&parent, &supp);
        assert_eq!(violations.len(), 1);
        assert!(violations[0].contains("no parent row"));
    }

    #[test]
    fn no_candidates_is_none() {
        assert!(build_suppqual(&parent(), &[], "PHA001").unwrap().is_none());
    }
}
