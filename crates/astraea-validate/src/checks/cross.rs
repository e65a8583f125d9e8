//! Cross-domain rules over the full study map.

use std::collections::{BTreeMap, BTreeSet};

use astraea_model::{RuleCategory, RuleResult, RuleSeverity};
use astraea_transforms::study_day_from_strings;

use crate::registry::{CrossRuleDef, DomainInput, RuleContext};
use crate::util::{has_column, values_of};

/// The cross-domain rule registry.
pub fn cross_rules() -> Vec<CrossRuleDef> {
    vec![
        CrossRuleDef {
            rule_id: "CONS001",
            description: "Subjects outside DM",
            category: RuleCategory::Consistency,
            severity: RuleSeverity::Error,
            p21_equivalent: Some("SD0086"),
            evaluate: check_usubjid_subset_of_dm,
        },
        CrossRuleDef {
            rule_id: "CONS002",
            description: "STUDYID must be constant across domains",
            category: RuleCategory::Consistency,
            severity: RuleSeverity::Error,
            p21_equivalent: None,
            evaluate: check_studyid_constant,
        },
        CrossRuleDef {
            rule_id: "CONS003",
            description: "Study day sign must agree with date versus reference start",
            category: RuleCategory::Consistency,
            severity: RuleSeverity::Warning,
            p21_equivalent: None,
            evaluate: check_dy_sign,
        },
        CrossRuleDef {
            rule_id: "SUPP001",
            description: "SUPP record must address an existing parent record",
            category: RuleCategory::Suppqual,
            severity: RuleSeverity::Error,
            p21_equivalent: None,
            evaluate: check_supp_parents,
        },
        CrossRuleDef {
            rule_id: "SUPP002",
            description: "QNAM must be uppercase alphanumeric, at most 8 characters",
            category: RuleCategory::Suppqual,
            severity: RuleSeverity::Error,
            p21_equivalent: None,
            evaluate: check_supp_qnam,
        },
        CrossRuleDef {
            rule_id: "SUPP003",
            description: "Duplicate supplemental qualifier key",
            category: RuleCategory::Suppqual,
            severity: RuleSeverity::Error,
            p21_equivalent: None,
            evaluate: check_supp_duplicates,
        },
    ]
}

fn dm_subjects(domains: &BTreeMap<String, DomainInput<'_>>) -> Option<BTreeSet<String>> {
    domains.get("DM").map(|dm| {
        values_of(&dm.frame.data, "USUBJID")
            .into_iter()
            .map(|(_, v)| v)
            .collect()
    })
}

fn check_usubjid_subset_of_dm(
    def: &CrossRuleDef,
    _ctx: &RuleContext<'_>,
    domains: &BTreeMap<String, DomainInput<'_>>,
) -> Vec<RuleResult> {
    let Some(dm_subjects) = dm_subjects(domains) else {
        return Vec::new();
    };
    let mut results = Vec::new();
    for (code, input) in domains {
        if code == "DM" || !has_column(&input.frame.data, "USUBJID") {
            continue;
        }
        let strays: BTreeSet<String> = values_of(&input.frame.data, "USUBJID")
            .into_iter()
            .map(|(_, v)| v)
            .filter(|subject| !dm_subjects.contains(subject))
            .collect();
        if !strays.is_empty() {
            results.push(def.finding(
                code,
                Some("USUBJID"),
                format!(
                    "{} subject(s) not present in DM: {}",
                    strays.len(),
                    strays.iter().take(5).cloned().collect::<Vec<_>>().join(", ")
                ),
                strays.len(),
            ));
        }
    }
    results
}

fn check_studyid_constant(
    def: &CrossRuleDef,
    _ctx: &RuleContext<'_>,
    domains: &BTreeMap<String, DomainInput<'_>>,
) -> Vec<RuleResult> {
    let mut study_ids: BTreeSet<String> = BTreeSet::new();
    for input in domains.values() {
        study_ids.extend(
            values_of(&input.frame.data, "STUDYID")
                .into_iter()
                .map(|(_, v)| v),
        );
    }
    if study_ids.len() <= 1 {
        Vec::new()
    } else {
        vec![def.finding(
            "ALL",
            Some("STUDYID"),
            format!(
                "multiple STUDYID values across domains: {}",
                study_ids.iter().cloned().collect::<Vec<_>>().join(", ")
            ),
            study_ids.len(),
        )]
    }
}

fn check_dy_sign(
    def: &CrossRuleDef,
    _ctx: &RuleContext<'_>,
    domains: &BTreeMap<String, DomainInput<'_>>,
) -> Vec<RuleResult> {
    let Some(dm) = domains.get("DM") else {
        return Vec::new();
    };
    let subjects: BTreeMap<usize, String> =
        values_of(&dm.frame.data, "USUBJID").into_iter().collect();
    let starts: BTreeMap<usize, String> =
        values_of(&dm.frame.data, "RFSTDTC").into_iter().collect();
    let rfstdtc: BTreeMap<&String, &String> = subjects
        .iter()
        .filter_map(|(idx, subject)| starts.get(idx).map(|start| (subject, start)))
        .collect();

    let mut results = Vec::new();
    for (code, input) in domains {
        let subject_rows: BTreeMap<usize, String> =
            values_of(&input.frame.data, "USUBJID").into_iter().collect();
        for column in input.frame.data.get_columns() {
            let name = column.name().to_uppercase();
            let Some(prefix) = name.strip_suffix("DY") else {
                continue;
            };
            let dtc_name = format!("{prefix}DTC");
            let dtc_rows: BTreeMap<usize, String> =
                values_of(&input.frame.data, &dtc_name).into_iter().collect();
            let mut mismatches = 0usize;
            for (idx, dy_text) in crate::util::column_values(column) {
                let Ok(dy) = dy_text.parse::<f64>() else {
                    continue;
                };
                let expected = subject_rows
                    .get(&idx)
                    .and_then(|subject| rfstdtc.get(subject))
                    .and_then(|reference| {
                        dtc_rows
                            .get(&idx)
                            .and_then(|dtc| study_day_from_strings(dtc, reference))
                    });
                if let Some(expected) = expected {
                    if (expected > 0) != (dy > 0.0) {
                        mismatches += 1;
                    }
                }
            }
            if mismatches > 0 {
                results.push(def.finding(
                    code,
                    Some(name.as_str()),
                    format!("{mismatches} study day value(s) disagree in sign with {dtc_name}"),
                    mismatches,
                ));
            }
        }
    }
    results
}

fn supp_pairs<'a>(
    domains: &'a BTreeMap<String, DomainInput<'a>>,
) -> Vec<(&'a str, &'a DomainInput<'a>, &'a DomainInput<'a>)> {
    domains
        .iter()
        .filter_map(|(code, supp)| {
            let parent_code = code.strip_prefix("SUPP")?;
            let parent = domains.get(parent_code)?;
            Some((parent_code, parent, supp))
        })
        .collect()
}

fn check_supp_parents(
    def: &CrossRuleDef,
    _ctx: &RuleContext<'_>,
    domains: &BTreeMap<String, DomainInput<'_>>,
) -> Vec<RuleResult> {
    let mut results = Vec::new();
    for (parent_code, parent, supp) in supp_pairs(domains) {
        let seq_name = format!("{parent_code}SEQ");
        let parent_subjects: BTreeMap<usize, String> =
            values_of(&parent.frame.data, "USUBJID").into_iter().collect();
        let parent_seqs: BTreeMap<usize, String> =
            values_of(&parent.frame.data, &seq_name).into_iter().collect();
        let parent_keys: BTreeSet<(String, String)> = parent_subjects
            .iter()
            .map(|(idx, subject)| {
                (
                    subject.clone(),
                    parent_seqs.get(idx).cloned().unwrap_or_default(),
                )
            })
            .collect();

        let supp_subjects: BTreeMap<usize, String> =
            values_of(&supp.frame.data, "USUBJID").into_iter().collect();
        let supp_idvarvals: BTreeMap<usize, String> =
            values_of(&supp.frame.data, "IDVARVAL").into_iter().collect();
        let orphans = supp_subjects
            .iter()
            .filter(|(idx, subject)| {
                let id_value = supp_idvarvals.get(idx).cloned().unwrap_or_default();
                !parent_keys.contains(&((*subject).clone(), id_value))
            })
            .count();
        if orphans > 0 {
            results.push(def.finding(
                &format!("SUPP{parent_code}"),
                Some("IDVARVAL"),
                format!("{orphans} record(s) address no parent {parent_code} row"),
                orphans,
            ));
        }
    }
    results
}

fn check_supp_qnam(
    def: &CrossRuleDef,
    _ctx: &RuleContext<'_>,
    domains: &BTreeMap<String, DomainInput<'_>>,
) -> Vec<RuleResult> {
    let mut results = Vec::new();
    for (code, input) in domains {
        if !code.starts_with("SUPP") {
            continue;
        }
        let invalid = values_of(&input.frame.data, "QNAM")
            .iter()
            .filter(|(_, qnam)| {
                qnam.len() > 8
                    || qnam.is_empty()
                    || !qnam
                        .chars()
                        .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit())
            })
            .count();
        if invalid > 0 {
            results.push(def.finding(
                code,
                Some("QNAM"),
                format!("{invalid} QNAM value(s) violate the naming pattern"),
                invalid,
            ));
        }
    }
    results
}

fn check_supp_duplicates(
    def: &CrossRuleDef,
    _ctx: &RuleContext<'_>,
    domains: &BTreeMap<String, DomainInput<'_>>,
) -> Vec<RuleResult> {
    let mut results = Vec::new();
    for (code, input) in domains {
        if !code.starts_with("SUPP") {
            continue;
        }
        let subjects: BTreeMap<usize, String> =
            values_of(&input.frame.data, "USUBJID").into_iter().collect();
        let id_values: BTreeMap<usize, String> =
            values_of(&input.frame.data, "IDVARVAL").into_iter().collect();
        let mut seen: BTreeSet<(String, String, String)> = BTreeSet::new();
        let mut duplicates = 0usize;
        for (idx, qnam) in values_of(&input.frame.data, "QNAM") {
            let key = (
                subjects.get(&idx).cloned().unwrap_or_default(),
                id_values.get(&idx).cloned().unwrap_or_default(),
                qnam,
            );
            if !seen.insert(key) {
                duplicates += 1;
            }
        }
        if duplicates > 0 {
            results.push(def.finding(
                code,
                Some("QNAM"),
                format!("{duplicates} duplicate (USUBJID, IDVARVAL, QNAM) key(s)"),
                duplicates,
            ));
        }
    }
    results
}
