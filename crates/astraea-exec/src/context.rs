//! Cross-domain execution context.
//!
//! Built once after DM is materialised (and SE/TV when present), then
//! shared immutably by every other domain's execution: study-day needs the
//! RFSTDTC lookup, EPOCH needs the subject element ranges, VISITNUM needs
//! the planned-visit map. DM must therefore execute first; the pipeline
//! enforces that ordering.

use std::collections::BTreeMap;

use polars::prelude::{AnyValue, DataFrame};

use astraea_transforms::{ElementRange, VisitMap, date_of};

/// Immutable cross-domain lookups.
#[derive(Debug, Clone, Default)]
pub struct CrossDomainContext {
    /// USUBJID -> RFSTDTC (ISO date string).
    pub rfstdtc: BTreeMap<String, String>,
    /// USUBJID -> actual element ranges, from SE.
    pub se_elements: BTreeMap<String, Vec<ElementRange>>,
    /// Planned visits, from TV.
    pub tv_visits: VisitMap,
    /// The executed DM frame, for subject-subset checks downstream.
    pub dm: Option<DataFrame>,
}

impl CrossDomainContext {
    /// Build the context from an executed DM frame.
    pub fn from_dm(dm: &DataFrame) -> Self {
        let mut rfstdtc = BTreeMap::new();
        if let (Ok(usubjid), Ok(rf)) = (dm.column("USUBJID"), dm.column("RFSTDTC")) {
            for idx in 0..dm.height() {
                let subject = string_at(usubjid, idx);
                let reference = string_at(rf, idx);
                if let (Some(subject), Some(reference)) = (subject, reference) {
                    rfstdtc.insert(subject, reference);
                }
            }
        }
        Self {
            rfstdtc,
            se_elements: BTreeMap::new(),
            tv_visits: VisitMap::default(),
            dm: Some(dm.clone()),
        }
    }

    /// Attach subject element ranges from an executed SE frame.
    pub fn with_se(mut self, se: &DataFrame) -> Self {
        let columns = (
            se.column("USUBJID"),
            se.column("ETCD"),
            se.column("EPOCH"),
            se.column("SESTDTC"),
            se.column("SEENDTC"),
        );
        if let (Ok(usubjid), Ok(etcd), Ok(epoch), Ok(start), Ok(end)) = columns {
            for idx in 0..se.height() {
                let subject = string_at(usubjid, idx);
                let start_date = string_at(start, idx).and_then(|s| date_of(&s));
                let (Some(subject), Some(start_date)) = (subject, start_date) else {
                    continue;
                };
                let range = ElementRange {
                    etcd: string_at(etcd, idx).unwrap_or_default(),
                    epoch: string_at(epoch, idx).unwrap_or_default(),
                    start: start_date,
                    end: string_at(end, idx).and_then(|s| date_of(&s)),
                };
                self.se_elements.entry(subject).or_default().push(range);
            }
        }
        self
    }

    /// Attach the planned-visit map from an executed TV frame.
    pub fn with_tv(mut self, tv: &DataFrame) -> Self {
        let columns = (tv.column("VISIT"), tv.column("VISITNUM"));
        if let (Ok(visit), Ok(visitnum)) = columns {
            let mut entries = Vec::new();
            for idx in 0..tv.height() {
                let name = string_at(visit, idx);
                let number = match visitnum.get(idx).unwrap_or(AnyValue::Null) {
                    AnyValue::Float64(v) => Some(v),
                    AnyValue::Int64(v) => Some(v as f64),
                    AnyValue::Int32(v) => Some(f64::from(v)),
                    AnyValue::String(s) => s.parse().ok(),
                    AnyValue::StringOwned(s) => s.parse().ok(),
                    _ => None,
                };
                if let (Some(name), Some(number)) = (name, number) {
                    entries.push((name.clone(), number, name));
                }
            }
            self.tv_visits = VisitMap::from_entries(entries);
        }
        self
    }

    /// Reference start date for a subject.
    pub fn rfstdtc_for(&self, usubjid: &str) -> Option<&str> {
        self.rfstdtc.get(usubjid).map(String::as_str)
    }

    /// Element ranges for a subject.
    pub fn elements_for(&self, usubjid: &str) -> &[ElementRange] {
        self.se_elements
            .get(usubjid)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }
}

/// Render a cell to a trimmed non-empty string.
pub fn string_at(column: &polars::prelude::Column, idx: usize) -> Option<String> {
    match column.get(idx).ok()? {
        AnyValue::Null => None,
        AnyValue::String(s) => {
            let trimmed = s.trim();
            (!trimmed.is_empty()).then(|| trimmed.to_string())
        }
        AnyValue::StringOwned(s) => {
            let trimmed = s.trim();
            (!trimmed.is_empty()).then(|| trimmed.to_string())
        }
        AnyValue::Float64(v) => Some(format_numeric(v)),
        AnyValue::Float32(v) => Some(format_numeric(f64::from(v))),
        AnyValue::Int64(v) => Some(v.to_string()),
        AnyValue::Int32(v) => Some(v.to_string()),
        AnyValue::Boolean(b) => Some(if b { "1".to_string() } else { "0".to_string() }),
        other => Some(other.to_string()),
    }
}

/// Integral floats render without the trailing `.0`.
pub fn format_numeric(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        value.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use polars::prelude::Column;

    #[test]
    fn context_builds_rfstdtc_lookup() {
        let dm = DataFrame::new(vec![
            Column::new("USUBJID".into(), ["PHA-001-01", "PHA-001-02"]),
            Column::new("RFSTDTC".into(), ["2020-01-15", ""]),
        ])
        .unwrap();
        let ctx = CrossDomainContext::from_dm(&dm);
        assert_eq!(ctx.rfstdtc_for("PHA-001-01"), Some("2020-01-15"));
        assert_eq!(ctx.rfstdtc_for("PHA-001-02"), None);
    }

    #[test]
    fn numeric_cells_render_cleanly() {
        assert_eq!(format_numeric(3.0), "3");
        assert_eq!(format_numeric(3.5), "3.5");
    }
}
