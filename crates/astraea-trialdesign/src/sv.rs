//! SV (Subject Visits) builder.
//!
//! Actual visits are reconstructed from the visit bookkeeping the EDC
//! embeds in every raw file: the folder (visit) name, the folder sequence
//! number, and the collection dates on the page. One SV row per subject
//! per visit, with SVSTDTC/SVENDTC the earliest and latest date observed
//! at that visit.

use std::collections::BTreeMap;

use polars::prelude::{Column, DataFrame};
use tracing::debug;

use astraea_exec::context::string_at;
use astraea_exec::frame::DomainFrame;
use astraea_exec::handlers::find_column;
use astraea_transforms::parse_string_date_to_iso;

/// Column names the EDC uses for the visit name, in preference order.
const VISIT_NAME_COLUMNS: &[&str] = &["FolderName", "Folder", "InstanceName"];
/// Column names carrying the visit ordinal.
const VISIT_SEQ_COLUMNS: &[&str] = &["FolderSeq", "InstanceRepeatNumber"];

#[derive(Default)]
struct VisitAccumulator {
    folder_seq: Option<f64>,
    min_date: Option<String>,
    max_date: Option<String>,
}

/// Build SV by scanning every raw frame for visit bookkeeping.
///
/// `subject_col` names the subject identifier column in the raw files;
/// USUBJID is composed with the study prefix the way DM composed it.
pub fn build_sv(
    raw: &BTreeMap<String, DataFrame>,
    study_id: &str,
    subject_col: &str,
    site_col: Option<&str>,
) -> DomainFrame {
    // (usubjid, visit name) -> accumulated dates.
    let mut visits: BTreeMap<(String, String), VisitAccumulator> = BTreeMap::new();

    for (name, frame) in raw {
        let Some(subject) = find_column(frame, subject_col) else {
            continue;
        };
        let Some(visit_name) = VISIT_NAME_COLUMNS
            .iter()
            .find_map(|c| find_column(frame, c))
        else {
            continue;
        };
        let visit_seq = VISIT_SEQ_COLUMNS.iter().find_map(|c| find_column(frame, c));
        let site = site_col.and_then(|c| find_column(frame, c));

        // Any column whose name carries DAT is a candidate date.
        let date_columns: Vec<&Column> = frame
            .get_columns()
            .iter()
            .filter(|c| c.name().to_uppercase().contains("DAT"))
            .collect();
        if date_columns.is_empty() {
            continue;
        }
        debug!(source = name.as_str(), "scanning for subject visits");

        for row in 0..frame.height() {
            let Some(subject_value) = string_at(subject, row) else {
                continue;
            };
            let Some(visit_value) = string_at(visit_name, row) else {
                continue;
            };
            let site_value = site.and_then(|c| string_at(c, row));
            let usubjid = match site_value {
                Some(site) => format!("{study_id}-{site}-{subject_value}"),
                None => format!("{study_id}-{subject_value}"),
            };

            let entry = visits.entry((usubjid, visit_value)).or_default();
            if entry.folder_seq.is_none() {
                entry.folder_seq = visit_seq
                    .and_then(|c| string_at(c, row))
                    .and_then(|v| v.parse::<f64>().ok());
            }
            for date_column in &date_columns {
                let Some(iso) = string_at(date_column, row)
                    .and_then(|v| parse_string_date_to_iso(&v))
                else {
                    continue;
                };
                // Partial dates cannot bound a visit.
                if iso.len() < 10 {
                    continue;
                }
                if entry.min_date.as_deref().is_none_or(|d| iso.as_str() < d) {
                    entry.min_date = Some(iso.clone());
                }
                if entry.max_date.as_deref().is_none_or(|d| iso.as_str() > d) {
                    entry.max_date = Some(iso);
                }
            }
        }
    }

    let mut usubjid_values = Vec::with_capacity(visits.len());
    let mut visitnum_values = Vec::with_capacity(visits.len());
    let mut visit_values = Vec::with_capacity(visits.len());
    let mut start_values = Vec::with_capacity(visits.len());
    let mut end_values = Vec::with_capacity(visits.len());

    for ((usubjid, visit), accumulated) in &visits {
        usubjid_values.push(usubjid.clone());
        visit_values.push(visit.clone());
        visitnum_values.push(accumulated.folder_seq);
        start_values.push(accumulated.min_date.clone());
        end_values.push(accumulated.max_date.clone());
    }

    let height = usubjid_values.len();
    let data = DataFrame::new(vec![
        Column::new("STUDYID".into(), vec![study_id; height]),
        Column::new("DOMAIN".into(), vec!["SV"; height]),
        Column::new("USUBJID".into(), usubjid_values),
        Column::new("VISITNUM".into(), visitnum_values),
        Column::new("VISIT".into(), visit_values),
        Column::new("SVSTDTC".into(), start_values),
        Column::new("SVENDTC".into(), end_values),
    ])
    .expect("sv columns share one length");

    DomainFrame::new("SV", "Subject Visits", data)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sv_bounds_each_visit_by_observed_dates() {
        let vs = DataFrame::new(vec![
            Column::new("Subject".into(), ["01", "01", "01", "02"]),
            Column::new(
                "FolderName".into(),
                ["Screening", "Screening", "Week 4", "Screening"],
            ),
            Column::new("FolderSeq".into(), [1.0, 1.0, 4.0, 1.0]),
            Column::new(
                "VSDAT".into(),
                ["2020-01-10", "2020-01-12", "2020-02-05", "2020-01-11"],
            ),
        ])
        .unwrap();
        let mut raw = BTreeMap::new();
        raw.insert("vs.csv".to_string(), vs);

        let sv = build_sv(&raw, "PHA", "Subject", None);
        assert_eq!(sv.data.height(), 3);

        let usubjid = sv.data.column("USUBJID").unwrap();
        let start = sv.data.column("SVSTDTC").unwrap();
        let end = sv.data.column("SVENDTC").unwrap();
        let visit = sv.data.column("VISIT").unwrap();

        let mut seen = false;
        for idx in 0..sv.data.height() {
            if string_at(usubjid, idx).as_deref() == Some("PHA-01")
                && string_at(visit, idx).as_deref() == Some("Screening")
            {
                assert_eq!(string_at(start, idx).as_deref(), Some("2020-01-10"));
                assert_eq!(string_at(end, idx).as_deref(), Some("2020-01-12"));
                seen = true;
            }
        }
        assert!(seen);
    }
}
