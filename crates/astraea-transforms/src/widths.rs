//! Character column width optimisation.
//!
//! The transport format stores character variables at a fixed byte width;
//! padding every column to the maximum wastes most of the file. Width is
//! computed per column from the data and capped at the 200-byte transport
//! limit. Values longer than the cap are a validation error, not a
//! truncation.

/// Transport-format limit on character values, in bytes.
pub const MAX_CHAR_BYTES: usize = 200;

/// Minimum byte width holding every value, capped at [`MAX_CHAR_BYTES`].
///
/// Empty columns get width 1 so the column still materialises.
pub fn optimal_width<'a>(values: impl IntoIterator<Item = &'a str>) -> u16 {
    let max = values
        .into_iter()
        .map(str::len)
        .max()
        .unwrap_or(0)
        .clamp(1, MAX_CHAR_BYTES);
    max as u16
}

/// Indices of values whose byte length exceeds the transport cap.
pub fn width_violations<'a>(values: impl IntoIterator<Item = &'a str>) -> Vec<usize> {
    values
        .into_iter()
        .enumerate()
        .filter(|(_, v)| v.len() > MAX_CHAR_BYTES)
        .map(|(idx, _)| idx)
        .collect()
}

/// True when every character is ASCII.
pub fn is_ascii_clean(value: &str) -> bool {
    value.is_ascii()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn width_is_max_len_capped() {
        assert_eq!(optimal_width(["a", "abc", "ab"]), 3);
        assert_eq!(optimal_width([] as [&str; 0]), 1);
        let long = "x".repeat(300);
        assert_eq!(optimal_width([long.as_str()]), MAX_CHAR_BYTES as u16);
    }

    #[test]
    fn violations_report_indices() {
        let long = "x".repeat(201);
        let values = ["ok", long.as_str(), "fine"];
        assert_eq!(width_violations(values), vec![1]);
    }
}
