//! EPOCH assignment from subject element ranges.
//!
//! The SE domain records the actual elements a subject passed through; each
//! element carries an epoch name and a date range. A `--DTC` value falls
//! into the latest-starting element that covers it, so a date sitting on
//! the shared boundary of two adjacent elements belongs to the later one.
//! Two elements overlap only under strict inequality of their ranges;
//! sharing a boundary date is not an overlap.

use chrono::NaiveDate;

use crate::datetime::date_of;

/// One subject element with its epoch and date range.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElementRange {
    /// Element code (ETCD).
    pub etcd: String,
    /// Epoch name this element belongs to (e.g. "TREATMENT").
    pub epoch: String,
    /// Element start date.
    pub start: NaiveDate,
    /// Element end date; open-ended when `None`.
    pub end: Option<NaiveDate>,
}

impl ElementRange {
    fn covers(&self, date: NaiveDate) -> bool {
        date >= self.start && self.end.is_none_or(|end| date <= end)
    }
}

/// Assign an epoch to a `--DTC` value.
///
/// Returns the epoch of the latest-starting covering element, or `None`
/// when the date is outside every element or lacks day precision.
pub fn assign_epoch(dtc: &str, elements: &[ElementRange]) -> Option<String> {
    let date = date_of(dtc)?;
    elements
        .iter()
        .filter(|element| element.covers(date))
        .max_by_key(|element| element.start)
        .map(|element| element.epoch.clone())
}

/// Detect genuinely overlapping element pairs.
///
/// Overlap requires strict inequality on both sides; adjacent elements
/// sharing a boundary date are fine.
pub fn overlapping_elements(elements: &[ElementRange]) -> Vec<(usize, usize)> {
    let mut overlaps = Vec::new();
    for i in 0..elements.len() {
        for j in (i + 1)..elements.len() {
            let (a, b) = (&elements[i], &elements[j]);
            let a_end = a.end.unwrap_or(NaiveDate::MAX);
            let b_end = b.end.unwrap_or(NaiveDate::MAX);
            if a.start < b_end && b.start < a_end {
                overlaps.push((i, j));
            }
        }
    }
    overlaps
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn ranges() -> Vec<ElementRange> {
        vec![
            ElementRange {
                etcd: "SCRN".to_string(),
                epoch: "SCREENING".to_string(),
                start: d(2020, 1, 1),
                end: Some(d(2020, 1, 15)),
            },
            ElementRange {
                etcd: "TRT".to_string(),
                epoch: "TREATMENT".to_string(),
                start: d(2020, 1, 15),
                end: Some(d(2020, 6, 30)),
            },
            ElementRange {
                etcd: "FU".to_string(),
                epoch: "FOLLOW-UP".to_string(),
                start: d(2020, 6, 30),
                end: None,
            },
        ]
    }

    #[test]
    fn boundary_date_belongs_to_later_element() {
        assert_eq!(
            assign_epoch("2020-01-15", &ranges()).as_deref(),
            Some("TREATMENT")
        );
        assert_eq!(
            assign_epoch("2020-01-10", &ranges()).as_deref(),
            Some("SCREENING")
        );
        assert_eq!(
            assign_epoch("2020-08-01", &ranges()).as_deref(),
            Some("FOLLOW-UP")
        );
    }

    #[test]
    fn outside_all_elements_is_none() {
        assert_eq!(assign_epoch("2019-12-31", &ranges()), None);
        assert_eq!(assign_epoch("2020-01", &ranges()), None);
    }

    #[test]
    fn shared_boundary_is_not_an_overlap() {
        // Closed-end adjacency shares the boundary date without overlapping.
        let adjacent = vec![
            ElementRange {
                etcd: "A".to_string(),
                epoch: "SCREENING".to_string(),
                start: d(2020, 1, 1),
                end: Some(d(2020, 1, 15)),
            },
            ElementRange {
                etcd: "B".to_string(),
                epoch: "TREATMENT".to_string(),
                start: d(2020, 1, 15),
                end: Some(d(2020, 2, 1)),
            },
        ];
        assert!(overlapping_elements(&adjacent).is_empty());

        let overlapping = vec![
            ElementRange {
                etcd: "A".to_string(),
                epoch: "SCREENING".to_string(),
                start: d(2020, 1, 1),
                end: Some(d(2020, 1, 20)),
            },
            ElementRange {
                etcd: "B".to_string(),
                epoch: "TREATMENT".to_string(),
                start: d(2020, 1, 15),
                end: Some(d(2020, 2, 1)),
            },
        ];
        assert_eq!(overlapping_elements(&overlapping), vec![(0, 1)]);
    }
}
