//! Wide-to-tall transpose for Findings sources.
//!
//! Vendor lab exports put one test per column; SDTM Findings domains want
//! one test per row. The transpose spec names the id columns carried to
//! every output row and, per value column, the TESTCD/TEST/unit triple it
//! becomes. Rows with a null result are dropped.
//!
//! Rule grammar (one line, brackets required):
//!
//! ```text
//! TRANSPOSE(id_vars: [Subject, VISIT], value_map: [HGB_RES -> HGB | Hemoglobin | g/dL, ...])
//! ```

use polars::prelude::{Column, DataFrame};
use tracing::debug;

use crate::context::string_at;
use crate::dsl::split_top_level;
use crate::error::ExecutionError;

/// One value-column mapping.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransposeValue {
    pub source_col: String,
    pub testcd: String,
    pub test: String,
    pub unit: Option<String>,
}

/// A parsed transpose configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransposeSpec {
    pub id_vars: Vec<String>,
    pub values: Vec<TransposeValue>,
}

/// Parse a TRANSPOSE derivation rule. `None` when malformed.
pub fn parse_transpose_rule(rule: &str) -> Option<TransposeSpec> {
    let trimmed = rule.trim();
    let upper = trimmed.to_uppercase();
    if !upper.starts_with("TRANSPOSE(") || !trimmed.ends_with(')') {
        return None;
    }
    let inner = &trimmed["TRANSPOSE(".len()..trimmed.len() - 1];

    let mut id_vars = Vec::new();
    let mut values = Vec::new();
    for part in split_top_level(inner) {
        let Some((key, body)) = part.split_once(':') else {
            continue;
        };
        let body = body.trim();
        let body = body.strip_prefix('[')?.strip_suffix(']')?;
        match key.trim().to_lowercase().as_str() {
            "id_vars" => {
                id_vars = body
                    .split(',')
                    .map(|v| v.trim().to_string())
                    .filter(|v| !v.is_empty())
                    .collect();
            }
            "value_map" => {
                for entry in split_top_level(body) {
                    let (source, target) = entry.split_once("->")?;
                    let mut fields = target.split('|').map(str::trim);
                    let testcd = fields.next()?.to_string();
                    let test = fields.next().unwrap_or(&testcd).to_string();
                    let unit = fields.next().filter(|u| !u.is_empty()).map(str::to_string);
                    values.push(TransposeValue {
                        source_col: source.trim().to_string(),
                        testcd,
                        test,
                        unit,
                    });
                }
            }
            _ => {}
        }
    }

    if values.is_empty() {
        return None;
    }
    Some(TransposeSpec { id_vars, values })
}

/// Apply the transpose, producing a tall frame with staging columns named
/// `{prefix}TESTCD`, `{prefix}TEST`, `{prefix}ORRES`, `{prefix}ORRESU`
/// alongside the id columns. Null results are dropped.
pub fn apply_transpose(
    df: &DataFrame,
    spec: &TransposeSpec,
    domain_prefix: &str,
) -> Result<DataFrame, ExecutionError> {
    let id_columns: Vec<(&str, &Column)> = spec
        .id_vars
        .iter()
        .filter_map(|name| {
            df.get_columns()
                .iter()
                .find(|c| c.name().eq_ignore_ascii_case(name))
                .map(|c| (name.as_str(), c))
        })
        .collect();

    let mut out_ids: Vec<Vec<Option<String>>> = vec![Vec::new(); id_columns.len()];
    let mut testcd = Vec::new();
    let mut test = Vec::new();
    let mut orres = Vec::new();
    let mut orresu = Vec::new();

    for row in 0..df.height() {
        for value in &spec.values {
            let source = df
                .get_columns()
                .iter()
                .find(|c| c.name().eq_ignore_ascii_case(&value.source_col));
            let Some(source) = source else { continue };
            let Some(result) = string_at(source, row) else {
                continue; // null result rows are dropped
            };
            for (slot, (_, column)) in out_ids.iter_mut().zip(&id_columns) {
                slot.push(string_at(column, row));
            }
            testcd.push(Some(value.testcd.clone()));
            test.push(Some(value.test.clone()));
            orres.push(Some(result));
            orresu.push(value.unit.clone());
        }
    }

    let mut columns = Vec::with_capacity(id_columns.len() + 4);
    for ((name, _), values) in id_columns.iter().zip(out_ids) {
        columns.push(Column::new((*name).into(), values));
    }
    columns.push(Column::new(format!("{domain_prefix}TESTCD").into(), testcd));
    columns.push(Column::new(format!("{domain_prefix}TEST").into(), test));
    columns.push(Column::new(format!("{domain_prefix}ORRES").into(), orres));
    columns.push(Column::new(format!("{domain_prefix}ORRESU").into(), orresu));

    let out = DataFrame::new(columns)?;
    debug!(
        rows_in = df.height(),
        rows_out = out.height(),
        "transpose applied"
    );
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_the_rule_grammar() {
        let spec = parse_transpose_rule(
            "TRANSPOSE(id_vars: [Subject, VISIT], value_map: [HGB_RES -> HGB | Hemoglobin | g/dL, WBC_RES -> WBC | Leukocytes | 10^9/L])",
        )
        .unwrap();
        assert_eq!(spec.id_vars, vec!["Subject", "VISIT"]);
        assert_eq!(spec.values.len(), 2);
        assert_eq!(spec.values[0].testcd, "HGB");
        assert_eq!(spec.values[1].unit.as_deref(), Some("10^9/L"));
    }

    #[test]
    fn transpose_drops_null_results() {
        let df = DataFrame::new(vec![
            Column::new("Subject".into(), ["01", "02"]),
            Column::new("HGB_RES".into(), ["13.5", ""]),
            Column::new("WBC_RES".into(), ["6.1", "5.8"]),
        ])
        .unwrap();
        let spec = parse_transpose_rule(
            "TRANSPOSE(id_vars: [Subject], value_map: [HGB_RES -> HGB | Hemoglobin | g/dL, WBC_RES -> WBC | Leukocytes | 10^9/L])",
        )
        .unwrap();
        let tall = apply_transpose(&df, &spec, "LB").unwrap();
        // Subject 02 has no HGB result, so 3 rows instead of 4.
        assert_eq!(tall.height(), 3);
        let testcd = tall.column("LBTESTCD").unwrap();
        let codes: Vec<String> = (0..3).map(|i| string_at(testcd, i).unwrap()).collect();
        assert_eq!(codes, vec!["HGB", "WBC", "WBC"]);
    }
}
