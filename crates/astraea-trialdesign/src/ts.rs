//! TS (Trial Summary) builder and completeness checks.
//!
//! One row per parameter value from configuration, plus SSTDTC/SENDTC
//! derived from the executed DM. The FDA-expected parameter set is
//! reported as warnings when incomplete; only the four-code technical
//! rejection subset escalates to errors, and that escalation lives in the
//! validation engine's TRC rules.

use polars::prelude::{Column, DataFrame};

use astraea_exec::context::string_at;
use astraea_exec::frame::DomainFrame;
use astraea_exec::handlers::find_column;
use astraea_model::{RuleCategory, RuleResult, RuleSeverity};

use crate::config::{TsConfig, TsParameter};

/// The FDA-expected trial summary parameters (common submission set).
pub const TS_FDA_PARAMS: &[(&str, &str)] = &[
    ("ACTSUB", "Actual Number of Subjects"),
    ("ADAPT", "Adaptive Design"),
    ("AGEMAX", "Planned Maximum Age of Subjects"),
    ("AGEMIN", "Planned Minimum Age of Subjects"),
    ("DCUTDTC", "Data Cutoff Date"),
    ("FCNTRY", "Planned Country of Investigational Sites"),
    ("INDIC", "Trial Disease/Condition Indication"),
    ("INTMODEL", "Intervention Model"),
    ("INTTYPE", "Intervention Type"),
    ("LENGTH", "Trial Length"),
    ("NARMS", "Planned Number of Arms"),
    ("OBJPRIM", "Trial Primary Objective"),
    ("OBJSEC", "Trial Secondary Objective"),
    ("PLANSUB", "Planned Number of Subjects"),
    ("RANDOM", "Trial is Randomized"),
    ("SDTMVER", "SDTM Version"),
    ("SENDTC", "Study End Date"),
    ("SEXPOP", "Sex of Participants"),
    ("SPONSOR", "Clinical Study Sponsor"),
    ("SSTDTC", "Study Start Date"),
    ("STYPE", "Study Type"),
    ("TBLIND", "Trial Blinding Schema"),
    ("TCNTRL", "Control Type"),
    ("TITLE", "Trial Title"),
    ("TPHASE", "Trial Phase Classification"),
    ("TRT", "Investigational Therapy or Treatment"),
];

/// Parameters whose absence triggers technical rejection.
pub const TS_TRC_CRITICAL: &[&str] = &["SSTDTC", "SDTMVER", "STYPE", "TITLE"];

/// Build the TS dataset from configuration plus DM-derived study dates.
pub fn build_ts(config: &TsConfig, dm: Option<&DataFrame>, study_id: &str) -> DomainFrame {
    let mut parameters: Vec<TsParameter> = config.parameters.clone();

    // SSTDTC / SENDTC derive from DM reference dates unless configured.
    if let Some(dm) = dm {
        if !parameters.iter().any(|p| p.parmcd == "SSTDTC") {
            if let Some(start) = column_extreme(dm, "RFSTDTC", true) {
                parameters.push(TsParameter {
                    parmcd: "SSTDTC".to_string(),
                    parm: "Study Start Date".to_string(),
                    value: start,
                });
            }
        }
        if !parameters.iter().any(|p| p.parmcd == "SENDTC") {
            if let Some(end) = column_extreme(dm, "RFENDTC", false) {
                parameters.push(TsParameter {
                    parmcd: "SENDTC".to_string(),
                    parm: "Study End Date".to_string(),
                    value: end,
                });
            }
        }
    }

    parameters.sort_by(|a, b| a.parmcd.cmp(&b.parmcd));

    let height = parameters.len();
    let mut seq = Vec::with_capacity(height);
    let mut last_parmcd: Option<&str> = None;
    let mut counter = 0.0f64;
    for parameter in &parameters {
        if last_parmcd == Some(parameter.parmcd.as_str()) {
            counter += 1.0;
        } else {
            counter = 1.0;
            last_parmcd = Some(parameter.parmcd.as_str());
        }
        seq.push(counter);
    }

    let data = DataFrame::new(vec![
        Column::new("STUDYID".into(), vec![study_id; height]),
        Column::new("DOMAIN".into(), vec!["TS"; height]),
        Column::new("TSSEQ".into(), seq),
        Column::new(
            "TSPARMCD".into(),
            parameters.iter().map(|p| p.parmcd.clone()).collect::<Vec<_>>(),
        ),
        Column::new(
            "TSPARM".into(),
            parameters.iter().map(|p| p.parm.clone()).collect::<Vec<_>>(),
        ),
        Column::new(
            "TSVAL".into(),
            parameters.iter().map(|p| p.value.clone()).collect::<Vec<_>>(),
        ),
    ])
    .expect("ts columns share one length");

    DomainFrame::new("TS", "Trial Summary", data)
}

/// Report FDA-expected parameters missing from a built TS dataset.
pub fn validate_ts_completeness(ts: &DataFrame) -> Vec<RuleResult> {
    let present: Vec<String> = find_column(ts, "TSPARMCD")
        .map(|column| {
            (0..ts.height())
                .filter_map(|idx| string_at(column, idx))
                .collect()
        })
        .unwrap_or_default();

    TS_FDA_PARAMS
        .iter()
        .filter(|(code, _)| !present.iter().any(|p| p == code))
        .map(|(code, label)| RuleResult {
            rule_id: "TS001".to_string(),
            rule_description: "FDA-expected trial summary parameter missing".to_string(),
            category: RuleCategory::Presence,
            severity: RuleSeverity::Warning,
            domain: "TS".to_string(),
            variable: Some("TSPARMCD".to_string()),
            message: format!("TS is missing {code} ({label})"),
            affected_count: 1,
            fix_suggestion: Some(format!("add a TS parameter row for {code}")),
            p21_equivalent: None,
        })
        .collect()
}

fn column_extreme(df: &DataFrame, name: &str, min: bool) -> Option<String> {
    let column = find_column(df, name)?;
    let mut best: Option<String> = None;
    for idx in 0..df.height() {
        let Some(value) = string_at(column, idx) else {
            continue;
        };
        let replace = match &best {
            None => true,
            Some(current) => {
                if min {
                    value < *current
                } else {
                    value > *current
                }
            }
        };
        if replace {
            best = Some(value);
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ts_derives_study_dates_from_dm() {
        let dm = DataFrame::new(vec![
            Column::new("USUBJID".into(), ["S1", "S2"]),
            Column::new("RFSTDTC".into(), ["2020-02-01", "2020-01-15"]),
            Column::new("RFENDTC".into(), ["2020-06-30", "2020-07-15"]),
        ])
        .unwrap();
        let config = TsConfig {
            parameters: vec![TsParameter {
                parmcd: "TITLE".to_string(),
                parm: "Trial Title".to_string(),
                value: "A Study".to_string(),
            }],
        };
        let ts = build_ts(&config, Some(&dm), "PHA001");
        let codes: Vec<String> = {
            let column = ts.data.column("TSPARMCD").unwrap();
            (0..ts.data.height())
                .filter_map(|i| string_at(column, i))
                .collect()
        };
        assert!(codes.contains(&"SSTDTC".to_string()));
        assert!(codes.contains(&"SENDTC".to_string()));

        let values: Vec<String> = {
            let column = ts.data.column("TSVAL").unwrap();
            (0..ts.data.height())
                .filter_map(|i| string_at(column, i))
                .collect()
        };
        assert!(values.contains(&"2020-01-15".to_string()));
        assert!(values.contains(&"2020-07-15".to_string()));
    }

    #[test]
    fn completeness_reports_missing_fda_parameters_as_warnings() {
        let config = TsConfig {
            parameters: vec![TsParameter {
                parmcd: "TITLE".to_string(),
                parm: "Trial Title".to_string(),
                value: "A Study".to_string(),
            }],
        };
        let ts = build_ts(&config, None, "PHA001");
        let findings = validate_ts_completeness(&ts.data);
        assert_eq!(findings.len(), TS_FDA_PARAMS.len() - 1);
        assert!(findings.iter().all(|f| f.severity == RuleSeverity::Warning));
    }
}
