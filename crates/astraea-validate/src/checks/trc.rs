//! FDA technical-rejection pre-checks.
//!
//! These gate the serialised submission tree: a failure here means the
//! gateway rejects the package before any reviewer sees it. They run only
//! when the caller supplies the output directory and study id.

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use astraea_model::{RuleResult, RuleSeverity};

use crate::registry::{DomainInput, RuleContext, TrcRuleDef};
use crate::util::values_of;

/// Trial summary parameters whose absence is rejection-critical.
const TRC_TS_PARAMS: &[(&str, &str)] = &[
    ("SSTDTC", "TRC003"),
    ("SDTMVER", "TRC004"),
    ("STYPE", "TRC005"),
    ("TITLE", "TRC006"),
];

/// The technical-rejection rule registry.
pub fn trc_rules() -> Vec<TrcRuleDef> {
    vec![
        TrcRuleDef {
            rule_id: "TRC001",
            description: "DM dataset must be present",
            severity: RuleSeverity::Error,
            evaluate: check_dm_present,
        },
        TrcRuleDef {
            rule_id: "TRC002",
            description: "TS dataset must be present with rejection-critical parameters",
            severity: RuleSeverity::Error,
            evaluate: check_ts_parameters,
        },
        TrcRuleDef {
            rule_id: "TRC007",
            description: "define.xml must accompany the datasets",
            severity: RuleSeverity::Error,
            evaluate: check_define_xml_present,
        },
        TrcRuleDef {
            rule_id: "TRC008",
            description: "STUDYID must match the declared study",
            severity: RuleSeverity::Error,
            evaluate: check_studyid_matches,
        },
        TrcRuleDef {
            rule_id: "TRC009",
            description: "Dataset filenames must be lowercase transport files",
            severity: RuleSeverity::Error,
            evaluate: check_filenames,
        },
    ]
}

fn check_dm_present(
    def: &TrcRuleDef,
    _ctx: &RuleContext<'_>,
    domains: &BTreeMap<String, DomainInput<'_>>,
    _output_dir: &Path,
    _study_id: &str,
) -> Vec<RuleResult> {
    if domains.contains_key("DM") {
        Vec::new()
    } else {
        vec![def.finding("DM", "DM dataset is missing from the submission".to_string())]
    }
}

fn check_ts_parameters(
    def: &TrcRuleDef,
    _ctx: &RuleContext<'_>,
    domains: &BTreeMap<String, DomainInput<'_>>,
    _output_dir: &Path,
    _study_id: &str,
) -> Vec<RuleResult> {
    let Some(ts) = domains.get("TS") else {
        return vec![def.finding("TS", "TS dataset is missing from the submission".to_string())];
    };
    let present: BTreeSet<String> = values_of(&ts.frame.data, "TSPARMCD")
        .into_iter()
        .map(|(_, v)| v)
        .collect();
    TRC_TS_PARAMS
        .iter()
        .filter(|(code, _)| !present.contains(*code))
        .map(|(code, rule_id)| {
            let mut finding =
                def.finding("TS", format!("rejection-critical TS parameter {code} is missing"));
            finding.rule_id = (*rule_id).to_string();
            finding
        })
        .collect()
}

fn check_define_xml_present(
    def: &TrcRuleDef,
    _ctx: &RuleContext<'_>,
    _domains: &BTreeMap<String, DomainInput<'_>>,
    output_dir: &Path,
    _study_id: &str,
) -> Vec<RuleResult> {
    if output_dir.join("define.xml").is_file() {
        Vec::new()
    } else {
        vec![def.finding(
            "ALL",
            format!("define.xml not found in {}", output_dir.display()),
        )]
    }
}

fn check_studyid_matches(
    def: &TrcRuleDef,
    _ctx: &RuleContext<'_>,
    domains: &BTreeMap<String, DomainInput<'_>>,
    _output_dir: &Path,
    study_id: &str,
) -> Vec<RuleResult> {
    let mut results = Vec::new();
    for (code, input) in domains {
        let mismatched: BTreeSet<String> = values_of(&input.frame.data, "STUDYID")
            .into_iter()
            .map(|(_, v)| v)
            .filter(|v| v != study_id)
            .collect();
        if !mismatched.is_empty() {
            results.push(def.finding(
                code,
                format!(
                    "STUDYID value(s) {} do not match declared study {study_id}",
                    mismatched.iter().cloned().collect::<Vec<_>>().join(", ")
                ),
            ));
        }
    }
    results
}

fn check_filenames(
    def: &TrcRuleDef,
    _ctx: &RuleContext<'_>,
    _domains: &BTreeMap<String, DomainInput<'_>>,
    output_dir: &Path,
    _study_id: &str,
) -> Vec<RuleResult> {
    let Ok(entries) = std::fs::read_dir(output_dir) else {
        return vec![def.finding(
            "ALL",
            format!("output directory {} is unreadable", output_dir.display()),
        )];
    };
    let mut results = Vec::new();
    for entry in entries.flatten() {
        let name = entry.file_name().to_string_lossy().to_string();
        if name == "define.xml" || entry.path().is_dir() {
            continue;
        }
        let lowercase_transport = name
            .strip_suffix(".xpt")
            .map(|stem| stem.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit()))
            .unwrap_or(false);
        if !lowercase_transport {
            results.push(def.finding(
                "ALL",
                format!("{name} is not a lowercase .xpt transport filename"),
            ));
        }
    }
    results
}
