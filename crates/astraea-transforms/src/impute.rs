//! Partial-date imputation and imputation flags.
//!
//! Analysis needs a full calendar date even when only a year or year-month
//! was collected. Imputation fills the missing components; the paired
//! `--DTF` flag records the most significant component that was filled.

use chrono::NaiveDate;

use crate::datetime::{DateForm, parse_date_form};

/// Which end of the unknown interval to impute toward.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImputeMethod {
    /// Earliest possible date (Jan 1 / day 1).
    First,
    /// Latest possible date (Dec 31 / calendar last day of month).
    Last,
    /// Midpoint (Jul 1 / day 15).
    Mid,
}

/// Impute a partial date to a full YYYY-MM-DD.
///
/// Full dates pass through unchanged; unparseable input returns `None`.
pub fn impute_partial_date(raw: &str, method: ImputeMethod) -> Option<String> {
    let form = parse_date_form(raw)?;
    let date = match form {
        DateForm::Date(date) => date,
        DateForm::DateTime(dt) | DateForm::DateTimeTz { datetime: dt, .. } => dt.date(),
        DateForm::YearMonth { year, month } => match method {
            ImputeMethod::First => NaiveDate::from_ymd_opt(year, month, 1)?,
            ImputeMethod::Last => last_day_of_month(year, month)?,
            ImputeMethod::Mid => NaiveDate::from_ymd_opt(year, month, 15)?,
        },
        DateForm::Year(year) => match method {
            ImputeMethod::First => NaiveDate::from_ymd_opt(year, 1, 1)?,
            ImputeMethod::Last => NaiveDate::from_ymd_opt(year, 12, 31)?,
            ImputeMethod::Mid => NaiveDate::from_ymd_opt(year, 7, 1)?,
        },
    };
    Some(date.format("%Y-%m-%d").to_string())
}

/// The `--DTF` date-imputation flag for an original value.
///
/// `D` when only the day was imputed, `M` when month and day were,
/// `Y` when the whole date was unknown. Full dates carry no flag.
pub fn date_imputation_flag(raw: &str) -> Option<&'static str> {
    match parse_date_form(raw)? {
        DateForm::YearMonth { .. } => Some("D"),
        DateForm::Year(_) => Some("M"),
        DateForm::Date(_) | DateForm::DateTime(_) | DateForm::DateTimeTz { .. } => None,
    }
}

/// The `--TMF` time-imputation flag: `H` whenever the value had no time part.
pub fn time_imputation_flag(raw: &str) -> Option<&'static str> {
    match parse_date_form(raw)? {
        DateForm::DateTime(_) | DateForm::DateTimeTz { .. } => None,
        DateForm::Date(_) | DateForm::YearMonth { .. } | DateForm::Year(_) => Some("H"),
    }
}

fn last_day_of_month(year: i32, month: u32) -> Option<NaiveDate> {
    let (next_year, next_month) = if month == 12 {
        (year + 1, 1)
    } else {
        (year, month + 1)
    };
    NaiveDate::from_ymd_opt(next_year, next_month, 1)?.pred_opt()
}
