//! Validation engine behavior over literal frames.

use std::collections::BTreeMap;

use polars::prelude::{Column, DataFrame};

use astraea_exec::frame::DomainFrame;
use astraea_model::{RuleSeverity, severity_counts};
use astraea_reference::ReferenceStore;
use astraea_validate::{DomainInput, ValidationEngine};

fn dm_frame(sex: &[&str]) -> DomainFrame {
    let height = sex.len();
    let subjects: Vec<String> = (0..height).map(|i| format!("PHA-001-{i:02}")).collect();
    let data = DataFrame::new(vec![
        Column::new("STUDYID".into(), vec!["PHA001"; height]),
        Column::new("DOMAIN".into(), vec!["DM"; height]),
        Column::new("USUBJID".into(), subjects.clone()),
        Column::new("SUBJID".into(), subjects),
        Column::new("SITEID".into(), vec!["001"; height]),
        Column::new("SEX".into(), sex.to_vec()),
        Column::new("COUNTRY".into(), vec!["USA"; height]),
        Column::new("ARM".into(), vec!["Active"; height]),
        Column::new("ARMCD".into(), vec!["A"; height]),
        Column::new("ACTARM".into(), vec!["Active"; height]),
        Column::new("ACTARMCD".into(), vec!["A"; height]),
        Column::new("RFSTDTC".into(), vec!["2020-01-15"; height]),
    ])
    .unwrap();
    DomainFrame::new("DM", "Demographics", data)
}

#[test]
fn invalid_sex_value_is_exactly_one_ct_error() {
    let reference = ReferenceStore::load().unwrap();
    let engine = ValidationEngine::new(&reference);

    let dm = dm_frame(&["F", "M", "Other"]);
    let mut domains = BTreeMap::new();
    domains.insert(
        "DM".to_string(),
        DomainInput {
            frame: &dm,
            spec: None,
        },
    );
    let results = engine.validate_all(&domains, None, None);

    let sex_ct_errors: Vec<_> = results
        .iter()
        .filter(|r| {
            r.rule_id == "CT001"
                && r.domain == "DM"
                && r.variable.as_deref() == Some("SEX")
        })
        .collect();
    assert_eq!(sex_ct_errors.len(), 1);
    let finding = sex_ct_errors[0];
    assert_eq!(finding.severity, RuleSeverity::Error);
    assert_eq!(finding.affected_count, 1);
    assert!(finding.message.contains("C66731"));

    // The FDA demographics rule fires on the same value.
    assert!(results.iter().any(|r| r.rule_id == "FDAB001"));
}

#[test]
fn duplicate_dm_subjects_are_an_error() {
    let reference = ReferenceStore::load().unwrap();
    let engine = ValidationEngine::new(&reference);

    let data = DataFrame::new(vec![
        Column::new("STUDYID".into(), ["PHA001", "PHA001"]),
        Column::new("DOMAIN".into(), ["DM", "DM"]),
        Column::new("USUBJID".into(), ["PHA-001-01", "PHA-001-01"]),
    ])
    .unwrap();
    let dm = DomainFrame::new("DM", "Demographics", data);
    let mut domains = BTreeMap::new();
    domains.insert(
        "DM".to_string(),
        DomainInput {
            frame: &dm,
            spec: None,
        },
    );
    let results = engine.validate_all(&domains, None, None);
    assert!(results.iter().any(|r| {
        r.rule_id == "DM001"
            && r.severity == RuleSeverity::Error
            && r.p21_equivalent.as_deref() == Some("SD0007")
    }));
}

#[test]
fn subjects_outside_dm_are_flagged_cross_domain() {
    let reference = ReferenceStore::load().unwrap();
    let engine = ValidationEngine::new(&reference);

    let dm = dm_frame(&["F"]);
    let ae_data = DataFrame::new(vec![
        Column::new("STUDYID".into(), ["PHA001"]),
        Column::new("DOMAIN".into(), ["AE"]),
        Column::new("USUBJID".into(), ["PHA-001-99"]),
        Column::new("AETERM".into(), ["Headache"]),
    ])
    .unwrap();
    let ae = DomainFrame::new("AE", "Adverse Events", ae_data);

    let mut domains = BTreeMap::new();
    domains.insert(
        "DM".to_string(),
        DomainInput {
            frame: &dm,
            spec: None,
        },
    );
    domains.insert(
        "AE".to_string(),
        DomainInput {
            frame: &ae,
            spec: None,
        },
    );
    let results = engine.validate_all(&domains, None, None);
    let stray = results.iter().find(|r| r.rule_id == "CONS001").unwrap();
    assert_eq!(stray.domain, "AE");
    assert!(stray.message.contains("PHA-001-99"));
}

#[test]
fn non_iso_dates_and_zero_study_days_are_errors() {
    let reference = ReferenceStore::load().unwrap();
    let engine = ValidationEngine::new(&reference);

    let ae_data = DataFrame::new(vec![
        Column::new("STUDYID".into(), ["PHA001"]),
        Column::new("DOMAIN".into(), ["AE"]),
        Column::new("USUBJID".into(), ["PHA-001-01"]),
        Column::new("AESTDTC".into(), ["15 Jan 2020"]),
        Column::new("AESTDY".into(), [0.0]),
    ])
    .unwrap();
    let ae = DomainFrame::new("AE", "Adverse Events", ae_data);
    let mut domains = BTreeMap::new();
    domains.insert(
        "AE".to_string(),
        DomainInput {
            frame: &ae,
            spec: None,
        },
    );
    let results = engine.validate_all(&domains, None, None);
    assert!(results.iter().any(|r| r.rule_id == "FMT001"));
    assert!(results.iter().any(|r| r.rule_id == "FDAB008"));
}

#[test]
fn lc_structural_copy_warns_once() {
    let reference = ReferenceStore::load().unwrap();
    let engine = ValidationEngine::new(&reference);

    let lc_data = DataFrame::new(vec![
        Column::new("STUDYID".into(), ["PHA001"]),
        Column::new("DOMAIN".into(), ["LC"]),
        Column::new("USUBJID".into(), ["PHA-001-01"]),
    ])
    .unwrap();
    let mut lc = DomainFrame::new("LC", "Laboratory Test Results (Conventional)", lc_data);
    lc.lc_unit_conversion_performed = Some(false);

    let mut domains = BTreeMap::new();
    domains.insert(
        "LC".to_string(),
        DomainInput {
            frame: &lc,
            spec: None,
        },
    );
    let results = engine.validate_all(&domains, None, None);
    let lc_findings: Vec<_> = results.iter().filter(|r| r.rule_id == "FDAB013").collect();
    assert_eq!(lc_findings.len(), 1);
    assert_eq!(lc_findings[0].severity, RuleSeverity::Warning);
}

#[test]
fn trc_checks_run_only_with_output_context() {
    let reference = ReferenceStore::load().unwrap();
    let engine = ValidationEngine::new(&reference);

    let dm = dm_frame(&["F"]);
    let mut domains = BTreeMap::new();
    domains.insert(
        "DM".to_string(),
        DomainInput {
            frame: &dm,
            spec: None,
        },
    );

    let without = engine.validate_all(&domains, None, None);
    assert!(without.iter().all(|r| !r.rule_id.starts_with("TRC")));

    let dir = tempfile::tempdir().unwrap();
    let with = engine.validate_all(&domains, Some(dir.path()), Some("PHA001"));
    // TS is absent, define.xml is absent.
    assert!(with.iter().any(|r| r.rule_id == "TRC002"));
    assert!(with.iter().any(|r| r.rule_id == "TRC007"));
    let (errors, _, _, _) = severity_counts(&with);
    assert!(errors >= 2);
}

#[test]
fn results_are_sorted_most_severe_first() {
    let reference = ReferenceStore::load().unwrap();
    let engine = ValidationEngine::new(&reference);

    let dm = dm_frame(&["F", "Other"]);
    let mut domains = BTreeMap::new();
    domains.insert(
        "DM".to_string(),
        DomainInput {
            frame: &dm,
            spec: None,
        },
    );
    let results = engine.validate_all(&domains, None, None);
    let severities: Vec<RuleSeverity> = results.iter().map(|r| r.severity).collect();
    let mut sorted = severities.clone();
    sorted.sort();
    assert_eq!(severities, sorted);
}
