//! Study day calculation per SDTMIG 4.4.4.
//!
//! Day 1 is the reference start date itself; days before are negative.
//! Day 0 does not exist.

use chrono::NaiveDate;

use crate::datetime::date_of;

/// Study day of `event` relative to `reference`.
pub fn study_day(event: NaiveDate, reference: NaiveDate) -> i32 {
    let days = (event - reference).num_days() as i32;
    if days >= 0 { days + 1 } else { days }
}

/// Study day from a `--DTC` string and a reference start (RFSTDTC) string.
///
/// Both must carry at least day precision; partial dates yield `None`.
pub fn study_day_from_strings(dtc: &str, reference: &str) -> Option<i32> {
    Some(study_day(date_of(dtc)?, date_of(reference)?))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn day_one_is_reference_date() {
        assert_eq!(study_day(d(2020, 1, 15), d(2020, 1, 15)), 1);
        assert_eq!(study_day(d(2020, 1, 16), d(2020, 1, 15)), 2);
    }

    #[test]
    fn no_day_zero() {
        assert_eq!(study_day(d(2020, 1, 14), d(2020, 1, 15)), -1);
        assert_eq!(study_day(d(2020, 1, 12), d(2020, 1, 15)), -3);
    }

    #[test]
    fn partial_dates_are_rejected() {
        assert_eq!(study_day_from_strings("2020-01", "2020-01-15"), None);
        assert_eq!(study_day_from_strings("2020-01-20", "2020-01-15"), Some(6));
        assert_eq!(
            study_day_from_strings("2020-01-20T08:30", "2020-01-15"),
            Some(6)
        );
    }
}
