//! Visit name/number mapping.
//!
//! Built either from the TV (Trial Visits) domain rows or from a supplied
//! mapping. Lookup keys are normalised so "Week 4", "WEEK_4", and "week 4"
//! resolve to the same planned visit.

use std::collections::BTreeMap;

/// One planned visit.
#[derive(Debug, Clone, PartialEq)]
pub struct PlannedVisit {
    pub visitnum: f64,
    pub visit: String,
}

/// Lookup from collected visit labels to planned visit number/name.
#[derive(Debug, Clone, Default)]
pub struct VisitMap {
    entries: BTreeMap<String, PlannedVisit>,
}

impl VisitMap {
    /// Build from (label, visitnum, visit-name) triples, e.g. TV rows.
    pub fn from_entries<I, S>(entries: I) -> Self
    where
        I: IntoIterator<Item = (S, f64, S)>,
        S: Into<String>,
    {
        let mut map = BTreeMap::new();
        for (label, visitnum, visit) in entries {
            let visit = visit.into();
            map.insert(
                normalize_visit_label(&label.into()),
                PlannedVisit { visitnum, visit },
            );
        }
        Self { entries: map }
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Resolve a collected label (folder name, instance name) to its visit.
    pub fn lookup(&self, label: &str) -> Option<&PlannedVisit> {
        self.entries.get(&normalize_visit_label(label))
    }
}

fn normalize_visit_label(label: &str) -> String {
    label
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .collect::<String>()
        .to_uppercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_normalises_labels() {
        let map = VisitMap::from_entries(vec![
            ("Screening", 1.0, "SCREENING"),
            ("Week 4", 4.0, "WEEK 4"),
        ]);
        assert_eq!(map.lookup("WEEK_4").map(|v| v.visitnum), Some(4.0));
        assert_eq!(map.lookup("week 4").map(|v| v.visit.as_str()), Some("WEEK 4"));
        assert_eq!(map.lookup("Unscheduled"), None);
    }
}
