//! Dataset profiling.
//!
//! Reads one raw dataset (already materialised as a polars frame by the
//! external reader) plus its column metadata and produces the
//! [`DatasetProfile`] every downstream stage works from. Raw data never
//! travels further than this; the mapping prompt sees profiles only.

use std::collections::BTreeMap;

use polars::prelude::{AnyValue, DataFrame};

use astraea_model::{DatasetProfile, VariableProfile};

/// Vendor bookkeeping column names, matched case-insensitively.
///
/// EDC exports interleave system identifiers with clinical data; these are
/// flagged so the context builder can keep them out of the model's view.
const EDC_SYSTEM_COLUMNS: &[&str] = &[
    "projectid",
    "project",
    "environmentname",
    "studyenvsitenumber",
    "subjectid",
    "studysiteid",
    "siteid_edc",
    "instanceid",
    "instancename",
    "instancerepeatnumber",
    "folderid",
    "folder",
    "foldername",
    "folderseq",
    "targetdays",
    "datapageid",
    "datapagename",
    "pagerepeatnumber",
    "recorddate",
    "recordid",
    "recordposition",
    "mincreated",
    "maxupdated",
    "savets",
];

/// Findings suffixes used for pre-formatted SDTM detection.
const FINDINGS_SUFFIXES: &[&str] = &["TESTCD", "TEST", "ORRES", "STRESC", "STRESN"];

/// Maximum sample values captured per column.
const SAMPLE_LIMIT: usize = 5;

/// True when a column name is vendor bookkeeping, not clinical data.
pub fn is_edc_system_column(name: &str) -> bool {
    let lowered = name.trim().to_lowercase();
    EDC_SYSTEM_COLUMNS.contains(&lowered.as_str())
}

/// Profile one raw dataset.
///
/// `metadata` maps column name to (label, declared dtype) from the source
/// reader; columns without metadata fall back to the frame's dtype.
/// `known_domains` is the bundled domain-code list, used for pre-formatted
/// SDTM detection.
pub fn profile_dataset(
    filename: &str,
    df: &DataFrame,
    metadata: &BTreeMap<String, (String, String)>,
    known_domains: &[&str],
) -> DatasetProfile {
    let mut variables = Vec::with_capacity(df.width());

    for column in df.get_columns() {
        let name = column.name().to_string();
        let series = column.as_materialized_series();
        let n_unique = series.n_unique().unwrap_or(0);

        let mut n_missing = 0usize;
        let mut samples = Vec::new();
        for idx in 0..series.len() {
            let value = series.get(idx).unwrap_or(AnyValue::Null);
            let rendered = render_value(&value);
            match rendered {
                None => n_missing += 1,
                Some(text) => {
                    if samples.len() < SAMPLE_LIMIT {
                        samples.push(text);
                    }
                }
            }
        }

        let (label, dtype) = metadata
            .get(&name)
            .cloned()
            .unwrap_or_else(|| (String::new(), series.dtype().to_string()));

        variables.push(VariableProfile {
            is_edc_system_column: is_edc_system_column(&name),
            label: if label.is_empty() { None } else { Some(label) },
            dtype,
            n_unique,
            n_missing,
            sample_values: samples,
            name,
        });
    }

    let is_sdtm_preformatted = detect_preformatted(df, &variables, known_domains);

    DatasetProfile {
        filename: filename.to_string(),
        row_count: df.height(),
        variables,
        is_sdtm_preformatted,
        domain_metadata: BTreeMap::new(),
    }
}

fn render_value(value: &AnyValue) -> Option<String> {
    match value {
        AnyValue::Null => None,
        AnyValue::String(s) => {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                None
            } else {
                Some(trimmed.to_string())
            }
        }
        AnyValue::StringOwned(s) => {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                None
            } else {
                Some(trimmed.to_string())
            }
        }
        other => Some(other.to_string()),
    }
}

/// A dataset counts as pre-formatted SDTM when it carries a DOMAIN column
/// holding a valid code, or at least three Findings suffixes under a common
/// two-letter prefix.
fn detect_preformatted(
    df: &DataFrame,
    variables: &[VariableProfile],
    known_domains: &[&str],
) -> bool {
    if let Ok(column) = df.column("DOMAIN") {
        let series = column.as_materialized_series();
        for idx in 0..series.len().min(50) {
            if let Ok(value) = series.get(idx) {
                let text = render_value(&value);
                if let Some(code) = text {
                    if known_domains
                        .iter()
                        .any(|d| d.eq_ignore_ascii_case(code.trim()))
                    {
                        return true;
                    }
                }
            }
        }
    }

    // Findings suffix families: count distinct suffixes per 2-letter prefix.
    let mut prefix_suffixes: BTreeMap<String, Vec<&str>> = BTreeMap::new();
    for variable in variables {
        let upper = variable.name.to_uppercase();
        for suffix in FINDINGS_SUFFIXES {
            if upper.len() == 2 + suffix.len() && upper.ends_with(suffix) {
                let prefix = upper[..2].to_string();
                let entry = prefix_suffixes.entry(prefix).or_default();
                if !entry.contains(suffix) {
                    entry.push(suffix);
                }
            }
        }
    }
    prefix_suffixes.values().any(|suffixes| suffixes.len() >= 3)
}

#[cfg(test)]
mod tests {
    use super::*;
    use polars::prelude::Column;

    fn frame() -> DataFrame {
        DataFrame::new(vec![
            Column::new("Subject".into(), ["01", "02", ""]),
            Column::new("projectid".into(), ["P1", "P1", "P1"]),
            Column::new("SEX_STD".into(), ["F", "M", "F"]),
        ])
        .unwrap()
    }

    #[test]
    fn profiles_columns_with_missing_counts() {
        let profile = profile_dataset("dm.csv", &frame(), &BTreeMap::new(), &["DM"]);
        assert_eq!(profile.row_count, 3);
        let subject = &profile.variables[0];
        assert_eq!(subject.n_missing, 1);
        assert_eq!(subject.sample_values, vec!["01", "02"]);
        assert!(!subject.is_edc_system_column);
        assert!(profile.variables[1].is_edc_system_column);
    }

    #[test]
    fn preformat_detection_by_domain_column() {
        let df = DataFrame::new(vec![
            Column::new("DOMAIN".into(), ["AE", "AE"]),
            Column::new("AETERM".into(), ["Headache", "Nausea"]),
        ])
        .unwrap();
        let profile = profile_dataset("ae.csv", &df, &BTreeMap::new(), &["AE", "DM"]);
        assert!(profile.is_sdtm_preformatted);
    }

    #[test]
    fn preformat_detection_by_findings_suffixes() {
        let df = DataFrame::new(vec![
            Column::new("LBTESTCD".into(), ["HGB"]),
            Column::new("LBTEST".into(), ["Hemoglobin"]),
            Column::new("LBORRES".into(), ["13.5"]),
        ])
        .unwrap();
        let profile = profile_dataset("labs.csv", &df, &BTreeMap::new(), &["DM"]);
        assert!(profile.is_sdtm_preformatted);

        let df2 = DataFrame::new(vec![
            Column::new("LBTESTCD".into(), ["HGB"]),
            Column::new("LBTEST".into(), ["Hemoglobin"]),
        ])
        .unwrap();
        let profile2 = profile_dataset("labs.csv", &df2, &BTreeMap::new(), &["DM"]);
        assert!(!profile2.is_sdtm_preformatted);
    }
}
