//! The derivation-rule mini-DSL.
//!
//! Keyword plus comma-separated arguments, with quoted strings opaque:
//!
//! ```text
//! ASSIGN("DM")
//! DIRECT(dm.Subject)
//! CONCAT(STUDYID, "-", dm.SiteNumber, "-", dm.Subject)
//! ISO8601(ae.AESTDAT)
//! MIN(ex.EXSTDTC WHERE EXYN_STD = "Y" JOIN ON Subject)
//! SUBSTRING(col, 0, 2)
//! ```
//!
//! There is no expression grammar: one keyword, flat arguments, optional
//! WHERE/JOIN ON clauses on the first argument. Unknown keywords are the
//! caller's concern (handlers fall back to source pass-through).

/// One parsed argument.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DslArg {
    /// A quoted string or bare number.
    Literal(String),
    /// A column reference, optionally dataset-qualified (`ds.col`).
    Column {
        dataset: Option<String>,
        column: String,
    },
}

impl DslArg {
    /// The column name, when this argument references one.
    pub fn column_name(&self) -> Option<&str> {
        match self {
            Self::Column { column, .. } => Some(column),
            Self::Literal(_) => None,
        }
    }
}

/// A parsed derivation call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DerivationCall {
    /// Uppercased keyword (e.g. "CONCAT", "MIN").
    pub keyword: String,
    pub args: Vec<DslArg>,
    /// `WHERE col = "value"` filter, when present.
    pub where_clause: Option<(String, String)>,
    /// `JOIN ON col` key, when present.
    pub join_on: Option<String>,
}

/// Parse a derivation rule. Returns `None` when the string is not even
/// `KEYWORD(...)`-shaped; unknown keywords still parse.
pub fn parse_rule(rule: &str) -> Option<DerivationCall> {
    let trimmed = rule.trim();
    let open = trimmed.find('(')?;
    if !trimmed.ends_with(')') {
        return None;
    }
    let keyword = trimmed[..open].trim().to_uppercase();
    if keyword.is_empty() || !keyword.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return None;
    }
    let inner = &trimmed[open + 1..trimmed.len() - 1];

    let (inner, join_on) = split_clause(inner, " JOIN ON ");
    let (inner, where_raw) = split_clause(&inner, " WHERE ");

    let where_clause = where_raw.and_then(|raw| {
        let (column, value) = raw.split_once('=')?;
        Some((column.trim().to_string(), unquote(value.trim())))
    });

    let args = split_top_level(&inner)
        .into_iter()
        .map(|raw| parse_arg(&raw))
        .collect();

    Some(DerivationCall {
        keyword,
        args,
        where_clause,
        join_on: join_on.map(|j| j.trim().to_string()),
    })
}

/// Split `text` at the first occurrence of `marker` outside quotes.
fn split_clause(text: &str, marker: &str) -> (String, Option<String>) {
    let mut in_quotes = false;
    let bytes = text.as_bytes();
    let marker_bytes = marker.as_bytes();
    for i in 0..bytes.len() {
        if bytes[i] == b'"' {
            in_quotes = !in_quotes;
        }
        if !in_quotes
            && bytes.len() - i >= marker_bytes.len()
            && bytes[i..i + marker_bytes.len()].eq_ignore_ascii_case(marker_bytes)
        {
            return (
                text[..i].to_string(),
                Some(text[i + marker_bytes.len()..].to_string()),
            );
        }
    }
    (text.to_string(), None)
}

/// Split on commas outside quotes and brackets.
pub fn split_top_level(text: &str) -> Vec<String> {
    let mut parts = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut bracket_depth = 0usize;
    for ch in text.chars() {
        match ch {
            '"' => {
                in_quotes = !in_quotes;
                current.push(ch);
            }
            '[' if !in_quotes => {
                bracket_depth += 1;
                current.push(ch);
            }
            ']' if !in_quotes => {
                bracket_depth = bracket_depth.saturating_sub(1);
                current.push(ch);
            }
            ',' if !in_quotes && bracket_depth == 0 => {
                parts.push(current.trim().to_string());
                current.clear();
            }
            _ => current.push(ch),
        }
    }
    if !current.trim().is_empty() {
        parts.push(current.trim().to_string());
    }
    parts
}

fn parse_arg(raw: &str) -> DslArg {
    let trimmed = raw.trim();
    if trimmed.starts_with('"') {
        return DslArg::Literal(unquote(trimmed));
    }
    if trimmed.parse::<f64>().is_ok() {
        return DslArg::Literal(trimmed.to_string());
    }
    match trimmed.split_once('.') {
        Some((dataset, column)) if !dataset.is_empty() && !column.is_empty() => DslArg::Column {
            dataset: Some(dataset.trim().to_string()),
            column: column.trim().to_string(),
        },
        _ => DslArg::Column {
            dataset: None,
            column: trimmed.to_string(),
        },
    }
}

/// Strip one layer of double quotes, if present.
pub fn unquote(raw: &str) -> String {
    let trimmed = raw.trim();
    if trimmed.len() >= 2 && trimmed.starts_with('"') && trimmed.ends_with('"') {
        trimmed[1..trimmed.len() - 1].to_string()
    } else {
        trimmed.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_simple_calls() {
        let call = parse_rule("ASSIGN(\"DM\")").unwrap();
        assert_eq!(call.keyword, "ASSIGN");
        assert_eq!(call.args, vec![DslArg::Literal("DM".to_string())]);

        let call = parse_rule("DIRECT(dm.Subject)").unwrap();
        assert_eq!(
            call.args,
            vec![DslArg::Column {
                dataset: Some("dm".to_string()),
                column: "Subject".to_string()
            }]
        );
    }

    #[test]
    fn concat_keeps_quoted_commas_opaque() {
        let call = parse_rule("CONCAT(a, \"x,y\", b)").unwrap();
        assert_eq!(call.args.len(), 3);
        assert_eq!(call.args[1], DslArg::Literal("x,y".to_string()));
    }

    #[test]
    fn min_with_where_and_join() {
        let call = parse_rule("MIN(ex.EXSTDTC WHERE EXYN_STD = \"Y\" JOIN ON Subject)").unwrap();
        assert_eq!(call.keyword, "MIN");
        assert_eq!(
            call.args,
            vec![DslArg::Column {
                dataset: Some("ex".to_string()),
                column: "EXSTDTC".to_string()
            }]
        );
        assert_eq!(
            call.where_clause,
            Some(("EXYN_STD".to_string(), "Y".to_string()))
        );
        assert_eq!(call.join_on.as_deref(), Some("Subject"));
    }

    #[test]
    fn substring_args_are_literals() {
        let call = parse_rule("SUBSTRING(col, 0, 2)").unwrap();
        assert_eq!(call.args.len(), 3);
        assert_eq!(call.args[1], DslArg::Literal("0".to_string()));
    }

    #[test]
    fn malformed_rules_are_none() {
        assert!(parse_rule("no parens").is_none());
        assert!(parse_rule("OPEN(unclosed").is_none());
        assert!(parse_rule("(no keyword)").is_none());
    }

    #[test]
    fn unknown_keywords_still_parse() {
        let call = parse_rule("FROBNICATE(col)").unwrap();
        assert_eq!(call.keyword, "FROBNICATE");
    }
}
