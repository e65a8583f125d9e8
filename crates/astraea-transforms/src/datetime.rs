//! Date/time parsing to ISO 8601 with precision preservation.
//!
//! Per SDTMIG 4.4.4, date/time values are submitted in ISO 8601 extended
//! format at the precision they were collected. Vendor exports write dates
//! as "15 Jan 2022", "un Jun 2019" (unknown day), or "un UNK 2020" (unknown
//! day and month); the parser maps each to the narrowest ISO form the input
//! supports. Already-valid ISO strings pass through unchanged.

use chrono::{NaiveDate, NaiveDateTime};

/// A parsed date/time at its collected precision.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DateForm {
    /// YYYY
    Year(i32),
    /// YYYY-MM
    YearMonth { year: i32, month: u32 },
    /// YYYY-MM-DD
    Date(NaiveDate),
    /// YYYY-MM-DDTHH:MM[:SS]
    DateTime(NaiveDateTime),
    /// Datetime plus a timezone suffix (`Z` or `±HH:MM`), preserved verbatim.
    DateTimeTz { datetime: NaiveDateTime, suffix: String },
}

impl DateForm {
    /// Render as the narrowest ISO 8601 string for this precision.
    pub fn to_iso8601(&self) -> String {
        match self {
            Self::Year(year) => format!("{year:04}"),
            Self::YearMonth { year, month } => format!("{year:04}-{month:02}"),
            Self::Date(date) => date.format("%Y-%m-%d").to_string(),
            Self::DateTime(dt) => {
                // Seconds are rendered only when they carry information.
                if dt.second_is_zero() {
                    dt.format("%Y-%m-%dT%H:%M").to_string()
                } else {
                    dt.format("%Y-%m-%dT%H:%M:%S").to_string()
                }
            }
            Self::DateTimeTz { datetime, suffix } => {
                format!("{}{}", DateForm::DateTime(*datetime).to_iso8601(), suffix)
            }
        }
    }

    /// The calendar date, when the form carries one at day precision.
    pub fn date(&self) -> Option<NaiveDate> {
        match self {
            Self::Date(date) => Some(*date),
            Self::DateTime(dt) | Self::DateTimeTz { datetime: dt, .. } => Some(dt.date()),
            Self::Year(_) | Self::YearMonth { .. } => None,
        }
    }
}

trait SecondIsZero {
    fn second_is_zero(&self) -> bool;
}

impl SecondIsZero for NaiveDateTime {
    fn second_is_zero(&self) -> bool {
        use chrono::Timelike;
        self.second() == 0
    }
}

/// Parse a raw date string and return its precision-preserving form.
///
/// Returns `None` for empty or unparseable input.
pub fn parse_date_form(raw: &str) -> Option<DateForm> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }

    if let Some(form) = parse_iso(trimmed) {
        return Some(form);
    }
    if let Some(form) = parse_dmy_text(trimmed) {
        return Some(form);
    }
    None
}

/// Parse a raw date string to its narrowest ISO 8601 rendering.
pub fn parse_string_date_to_iso(raw: &str) -> Option<String> {
    parse_date_form(raw).map(|form| form.to_iso8601())
}

/// Extract a day-precision date from a raw or ISO string.
pub fn date_of(raw: &str) -> Option<NaiveDate> {
    parse_date_form(raw).and_then(|form| form.date())
}

fn parse_iso(value: &str) -> Option<DateForm> {
    let bytes = value.as_bytes();
    if bytes.len() < 4 || !bytes[..4].iter().all(u8::is_ascii_digit) {
        return None;
    }
    let year: i32 = value[..4].parse().ok()?;

    if bytes.len() == 4 {
        return Some(DateForm::Year(year));
    }
    if bytes[4] != b'-' {
        return None;
    }
    if bytes.len() == 7 {
        let month: u32 = value[5..7].parse().ok()?;
        if (1..=12).contains(&month) {
            return Some(DateForm::YearMonth { year, month });
        }
        return None;
    }
    if bytes.len() == 10 {
        let date = NaiveDate::parse_from_str(value, "%Y-%m-%d").ok()?;
        return Some(DateForm::Date(date));
    }
    if bytes.len() > 10 && bytes[10] == b'T' {
        // Split an optional timezone suffix off the end.
        let (body, suffix) = split_tz_suffix(value);
        let datetime = NaiveDateTime::parse_from_str(body, "%Y-%m-%dT%H:%M:%S")
            .or_else(|_| NaiveDateTime::parse_from_str(body, "%Y-%m-%dT%H:%M"))
            .ok()?;
        return Some(match suffix {
            Some(suffix) => DateForm::DateTimeTz {
                datetime,
                suffix: suffix.to_string(),
            },
            None => DateForm::DateTime(datetime),
        });
    }
    None
}

fn split_tz_suffix(value: &str) -> (&str, Option<&str>) {
    if let Some(stripped) = value.strip_suffix('Z') {
        return (stripped, Some("Z"));
    }
    // ±HH:MM after the time component (position > 10 skips the date hyphens).
    if value.len() > 16 {
        let tail = &value[value.len() - 6..];
        let mut chars = tail.chars();
        let sign = chars.next();
        if matches!(sign, Some('+') | Some('-'))
            && tail[1..3].bytes().all(|b| b.is_ascii_digit())
            && tail.as_bytes()[3] == b':'
            && tail[4..6].bytes().all(|b| b.is_ascii_digit())
        {
            return (&value[..value.len() - 6], Some(tail));
        }
    }
    (value, None)
}

/// Parse "DD Mon YYYY" style vendor dates, with "un" for an unknown day and
/// "UNK" for an unknown month, optionally followed by "HH:MM[:SS]".
fn parse_dmy_text(value: &str) -> Option<DateForm> {
    let mut parts = value.split_whitespace();
    let day_token = parts.next()?;
    let month_token = parts.next()?;
    let year_token = parts.next()?;
    let time_token = parts.next();
    if parts.next().is_some() {
        return None;
    }

    let year: i32 = year_token.parse().ok()?;
    if !(1900..=2100).contains(&year) {
        return None;
    }

    let day_unknown = day_token.eq_ignore_ascii_case("un");
    let month = parse_month(month_token);

    match (day_unknown, month) {
        (true, None) if month_token.eq_ignore_ascii_case("unk") => Some(DateForm::Year(year)),
        (true, Some(month)) => Some(DateForm::YearMonth { year, month }),
        (false, Some(month)) => {
            let day: u32 = day_token.parse().ok()?;
            let date = NaiveDate::from_ymd_opt(year, month, day)?;
            match time_token {
                Some(time) => {
                    let datetime = parse_time_on(date, time)?;
                    Some(DateForm::DateTime(datetime))
                }
                None => Some(DateForm::Date(date)),
            }
        }
        _ => None,
    }
}

fn parse_time_on(date: NaiveDate, time: &str) -> Option<NaiveDateTime> {
    let with_seconds = chrono::NaiveTime::parse_from_str(time, "%H:%M:%S").ok();
    let parsed = with_seconds.or_else(|| chrono::NaiveTime::parse_from_str(time, "%H:%M").ok())?;
    Some(date.and_time(parsed))
}

fn parse_month(token: &str) -> Option<u32> {
    match token.to_uppercase().as_str() {
        "JAN" | "JANUARY" => Some(1),
        "FEB" | "FEBRUARY" => Some(2),
        "MAR" | "MARCH" => Some(3),
        "APR" | "APRIL" => Some(4),
        "MAY" => Some(5),
        "JUN" | "JUNE" => Some(6),
        "JUL" | "JULY" => Some(7),
        "AUG" | "AUGUST" => Some(8),
        "SEP" | "SEPT" | "SEPTEMBER" => Some(9),
        "OCT" | "OCTOBER" => Some(10),
        "NOV" | "NOVEMBER" => Some(11),
        "DEC" | "DECEMBER" => Some(12),
        _ => None,
    }
}

/// Validate an ISO 8601 string at any SDTM precision.
///
/// Returns false for anything the narrowing parser would not emit,
/// including a timezone suffix without a time component.
pub fn is_valid_iso8601(value: &str) -> bool {
    parse_iso(value).is_some()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vendor_dates_narrow_correctly() {
        assert_eq!(parse_string_date_to_iso("15 Jan 2022").as_deref(), Some("2022-01-15"));
        assert_eq!(parse_string_date_to_iso("un Jun 2019").as_deref(), Some("2019-06"));
        assert_eq!(parse_string_date_to_iso("un UNK 2020").as_deref(), Some("2020"));
        assert_eq!(
            parse_string_date_to_iso("15 Jan 2022 10:30").as_deref(),
            Some("2022-01-15T10:30")
        );
        assert_eq!(
            parse_string_date_to_iso("15 Jan 2022 10:30:45").as_deref(),
            Some("2022-01-15T10:30:45")
        );
    }

    #[test]
    fn iso_passes_through() {
        assert_eq!(parse_string_date_to_iso("2020").as_deref(), Some("2020"));
        assert_eq!(parse_string_date_to_iso("2020-06").as_deref(), Some("2020-06"));
        assert_eq!(
            parse_string_date_to_iso("2020-01-15").as_deref(),
            Some("2020-01-15")
        );
        assert_eq!(
            parse_string_date_to_iso("2020-01-15T08:00:00Z").as_deref(),
            Some("2020-01-15T08:00Z")
        );
        assert_eq!(
            parse_string_date_to_iso("2020-01-15T08:00:30+02:00").as_deref(),
            Some("2020-01-15T08:00:30+02:00")
        );
    }

    #[test]
    fn garbage_is_rejected() {
        assert_eq!(parse_string_date_to_iso(""), None);
        assert_eq!(parse_string_date_to_iso("not a date"), None);
        assert_eq!(parse_string_date_to_iso("32 Jan 2022"), None);
        assert_eq!(parse_string_date_to_iso("2020-13"), None);
    }

    #[test]
    fn iso_validation() {
        assert!(is_valid_iso8601("2020"));
        assert!(is_valid_iso8601("2020-06"));
        assert!(is_valid_iso8601("2020-01-15T10:30:45"));
        assert!(is_valid_iso8601("2020-01-15T10:30:45Z"));
        assert!(!is_valid_iso8601("15 Jan 2022"));
        assert!(!is_valid_iso8601("2020/01/15"));
    }
}
