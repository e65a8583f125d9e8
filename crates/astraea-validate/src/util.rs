//! Column access helpers shared by rule bodies.

use polars::prelude::{Column, DataFrame};

use astraea_exec::context::string_at;
use astraea_exec::handlers::find_column;

/// Non-null trimmed values of a column, with original row positions.
pub fn values_of(df: &DataFrame, name: &str) -> Vec<(usize, String)> {
    let Some(column) = find_column(df, name) else {
        return Vec::new();
    };
    column_values(column)
}

/// Non-null trimmed values with row positions.
pub fn column_values(column: &Column) -> Vec<(usize, String)> {
    (0..column.len())
        .filter_map(|idx| string_at(column, idx).map(|v| (idx, v)))
        .collect()
}

/// Count of null or empty cells in a column; `None` when absent.
pub fn missing_count(df: &DataFrame, name: &str) -> Option<usize> {
    let column = find_column(df, name)?;
    Some(column.len() - column_values(column).len())
}

/// True when the frame carries the column at all.
pub fn has_column(df: &DataFrame, name: &str) -> bool {
    find_column(df, name).is_some()
}

/// The two-character domain prefix of an executed frame's variables.
pub fn domain_prefix(domain: &str) -> String {
    domain.chars().take(2).collect::<String>().to_uppercase()
}
