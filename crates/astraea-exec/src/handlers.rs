//! Per-pattern mapping handlers.
//!
//! One handler per [`MappingPattern`], each a pure function of its inputs
//! producing one output column at the working frame's height. The dispatch
//! table is a single exhaustive `match`; TRANSPOSE is dataset-scoped and
//! handled by the engine before per-variable dispatch reaches it.
//!
//! Failure semantics: a handler returns `Err` only when it cannot produce a
//! column at all; the engine converts that to a null column and a logged
//! warning. Inside a column, individual unconvertible values become nulls.

use std::collections::BTreeMap;

use polars::prelude::{Column, DataFrame};
use regex::Regex;
use tracing::warn;

use astraea_model::{MappingPattern, StudyMetadata, VariableMapping};
use astraea_reference::ReferenceStore;
use astraea_transforms::{
    TransformRegistry, assign_epoch, compose_usubjid, country_alpha3, parse_string_date_to_iso,
    study_day_from_strings,
};

use crate::context::{CrossDomainContext, string_at};
use crate::dsl::{DerivationCall, DslArg, parse_rule};
use crate::error::HandlerError;

/// Everything a handler may read. No handler mutates any of it.
pub struct HandlerContext<'a> {
    /// The preprocessed (filtered/aligned/transposed) source frame.
    pub working: &'a DataFrame,
    /// Output columns dispatched so far, for derivations that read them.
    pub produced: &'a DataFrame,
    /// All raw source frames, keyed by dataset stem, for cross-dataset
    /// aggregates (MIN/MAX ... JOIN ON).
    pub raw_sources: &'a BTreeMap<String, DataFrame>,
    pub reference: &'a ReferenceStore,
    pub transforms: &'a TransformRegistry,
    pub cross: Option<&'a CrossDomainContext>,
    pub study: &'a StudyMetadata,
}

/// Dispatch one mapping to its pattern handler.
pub fn apply_mapping(
    ctx: &HandlerContext<'_>,
    mapping: &VariableMapping,
) -> Result<Column, HandlerError> {
    match mapping.mapping_pattern {
        MappingPattern::Assign => handle_assign(ctx, mapping),
        MappingPattern::Direct | MappingPattern::Rename => handle_direct(ctx, mapping),
        MappingPattern::Reformat => handle_reformat(ctx, mapping),
        MappingPattern::Split => handle_split(ctx, mapping),
        MappingPattern::Combine => handle_combine(ctx, mapping),
        MappingPattern::Derivation => handle_derivation(ctx, mapping),
        MappingPattern::LookupRecode => handle_lookup_recode(ctx, mapping),
        MappingPattern::Transpose => Err(HandlerError::BadRule(
            "TRANSPOSE is dataset-scoped and applied before dispatch".to_string(),
        )),
    }
}

fn handle_assign(
    ctx: &HandlerContext<'_>,
    mapping: &VariableMapping,
) -> Result<Column, HandlerError> {
    let value = mapping
        .assigned_value
        .as_deref()
        .ok_or(HandlerError::MissingField("assigned_value"))?;
    Ok(constant_column(
        &mapping.sdtm_variable,
        value,
        ctx.working.height(),
    ))
}

fn handle_direct(
    ctx: &HandlerContext<'_>,
    mapping: &VariableMapping,
) -> Result<Column, HandlerError> {
    let source = mapping
        .source_variable
        .as_deref()
        .ok_or(HandlerError::MissingField("source_variable"))?;
    let column = find_column(ctx.working, source)
        .ok_or_else(|| HandlerError::ColumnNotFound(source.to_string()))?;
    Ok(string_column_from(column, &mapping.sdtm_variable))
}

fn handle_reformat(
    ctx: &HandlerContext<'_>,
    mapping: &VariableMapping,
) -> Result<Column, HandlerError> {
    let call = mapping.derivation_rule.as_deref().and_then(parse_rule);
    let (keyword, source_name) = match &call {
        Some(call) => (
            call.keyword.clone(),
            call.args
                .first()
                .and_then(DslArg::column_name)
                .map(str::to_string)
                .or_else(|| mapping.source_variable.clone()),
        ),
        None => ("ISO8601".to_string(), mapping.source_variable.clone()),
    };
    let source_name = source_name.ok_or(HandlerError::MissingField("source_variable"))?;
    let column = find_column(ctx.working, &source_name)
        .ok_or_else(|| HandlerError::ColumnNotFound(source_name.clone()))?;

    let transform = ctx
        .transforms
        .get(&keyword)
        .or_else(|| ctx.transforms.get(&format!("{keyword}_FIRST")));
    let Some(transform) = transform else {
        warn!(
            variable = mapping.sdtm_variable.as_str(),
            keyword = keyword.as_str(),
            "unknown reformat keyword; passing source through"
        );
        return Ok(string_column_from(column, &mapping.sdtm_variable));
    };

    let values: Vec<Option<String>> = (0..ctx.working.height())
        .map(|idx| string_at(column, idx).and_then(|v| transform(&v)))
        .collect();
    Ok(Column::new(mapping.sdtm_variable.as_str().into(), values))
}

fn handle_split(
    ctx: &HandlerContext<'_>,
    mapping: &VariableMapping,
) -> Result<Column, HandlerError> {
    let rule = mapping
        .derivation_rule
        .as_deref()
        .ok_or(HandlerError::MissingField("derivation_rule"))?;
    let call =
        parse_rule(rule).ok_or_else(|| HandlerError::BadRule(rule.to_string()))?;
    let source_name = call
        .args
        .first()
        .and_then(DslArg::column_name)
        .map(str::to_string)
        .or_else(|| mapping.source_variable.clone())
        .ok_or(HandlerError::MissingField("source_variable"))?;
    let column = find_column(ctx.working, &source_name)
        .ok_or_else(|| HandlerError::ColumnNotFound(source_name.clone()))?;

    let values: Vec<Option<String>> = match call.keyword.as_str() {
        "SUBSTRING" => {
            let start = literal_usize(&call, 1)?;
            let end = literal_usize(&call, 2)?;
            (0..ctx.working.height())
                .map(|idx| {
                    string_at(column, idx).map(|v| {
                        let chars: Vec<char> = v.chars().collect();
                        let end = end.min(chars.len());
                        let start = start.min(end);
                        chars[start..end].iter().collect()
                    })
                })
                .collect()
        }
        "DELIMITER_PART" => {
            let delimiter = literal_string(&call, 1)?;
            let index = literal_usize(&call, 2)?;
            (0..ctx.working.height())
                .map(|idx| {
                    string_at(column, idx)
                        .and_then(|v| v.split(&delimiter).nth(index).map(str::to_string))
                })
                .collect()
        }
        "REGEX_GROUP" => {
            let pattern = literal_string(&call, 1)?;
            let group = literal_usize(&call, 2)?;
            let regex =
                Regex::new(&pattern).map_err(|e| HandlerError::BadRule(e.to_string()))?;
            (0..ctx.working.height())
                .map(|idx| {
                    string_at(column, idx).and_then(|v| {
                        regex
                            .captures(&v)
                            .and_then(|c| c.get(group))
                            .map(|m| m.as_str().to_string())
                    })
                })
                .collect()
        }
        other => {
            // Unknown split keywords pass the source through, never a
            // null column.
            warn!(
                variable = mapping.sdtm_variable.as_str(),
                keyword = other,
                "unknown split keyword; passing source through"
            );
            return Ok(string_column_from(column, &mapping.sdtm_variable));
        }
    };
    Ok(Column::new(mapping.sdtm_variable.as_str().into(), values))
}

fn handle_combine(
    ctx: &HandlerContext<'_>,
    mapping: &VariableMapping,
) -> Result<Column, HandlerError> {
    let rule = mapping
        .derivation_rule
        .as_deref()
        .ok_or(HandlerError::MissingField("derivation_rule"))?;
    let call = parse_rule(rule).ok_or_else(|| HandlerError::BadRule(rule.to_string()))?;
    if call.keyword != "CONCAT" {
        return Err(HandlerError::BadRule(format!(
            "COMBINE expects CONCAT, got {}",
            call.keyword
        )));
    }

    enum Part<'c> {
        Literal(String),
        Column(&'c Column),
        StudyId,
    }
    let mut parts = Vec::with_capacity(call.args.len());
    for arg in &call.args {
        match arg {
            DslArg::Literal(text) => parts.push(Part::Literal(text.clone())),
            DslArg::Column { column, .. } => match find_column(ctx.working, column)
                .or_else(|| find_column(ctx.produced, column))
            {
                Some(col) => parts.push(Part::Column(col)),
                None if column.eq_ignore_ascii_case("STUDYID") => parts.push(Part::StudyId),
                None => return Err(HandlerError::ColumnNotFound(column.clone())),
            },
        }
    }

    let values: Vec<Option<String>> = (0..ctx.working.height())
        .map(|idx| {
            let mut built = String::new();
            for part in &parts {
                match part {
                    Part::Literal(text) => built.push_str(text),
                    Part::StudyId => built.push_str(&ctx.study.study_id),
                    Part::Column(column) => match string_at(column, idx) {
                        Some(value) => built.push_str(&value),
                        None => return None,
                    },
                }
            }
            Some(built)
        })
        .collect();
    Ok(Column::new(mapping.sdtm_variable.as_str().into(), values))
}

fn handle_derivation(
    ctx: &HandlerContext<'_>,
    mapping: &VariableMapping,
) -> Result<Column, HandlerError> {
    let rule = mapping
        .derivation_rule
        .as_deref()
        .ok_or(HandlerError::MissingField("derivation_rule"))?;
    let call = parse_rule(rule).ok_or_else(|| HandlerError::BadRule(rule.to_string()))?;
    let height = ctx.working.height();

    let values: Vec<Option<String>> = match call.keyword.as_str() {
        "USUBJID" => {
            let site = call
                .args
                .first()
                .filter(|_| call.args.len() >= 2)
                .and_then(DslArg::column_name)
                .and_then(|name| find_column(ctx.working, name));
            let subject_arg = if call.args.len() >= 2 {
                call.args.get(1)
            } else {
                call.args.first()
            };
            let subject = subject_arg
                .and_then(DslArg::column_name)
                .and_then(|name| find_column(ctx.working, name))
                .ok_or(HandlerError::MissingField("subject column"))?;
            (0..height)
                .map(|idx| {
                    let site_value = site.and_then(|c| string_at(c, idx));
                    let subject_value = string_at(subject, idx);
                    compose_usubjid(
                        &ctx.study.study_id,
                        site_value.as_deref(),
                        subject_value.as_deref(),
                    )
                })
                .collect()
        }
        "MIN" | "MAX" => cross_dataset_aggregate(ctx, &call, height)?,
        "RACE_CHECKBOX" => race_checkbox(ctx, &call, height)?,
        "COUNTRY_ISO3166" => single_column_map(ctx, &call, mapping, |v| {
            country_alpha3(v).map(str::to_string)
        })?,
        "ISO8601" => single_column_map(ctx, &call, mapping, |v| parse_string_date_to_iso(v))?,
        "PARTIAL_DATE" => partial_date_from_components(ctx, &call, height)?,
        "STUDY_DAY" => study_day_derivation(ctx, &call, height)?,
        "EPOCH" => epoch_derivation(ctx, &call, height)?,
        other => {
            warn!(
                variable = mapping.sdtm_variable.as_str(),
                keyword = other,
                "unknown derivation keyword; passing source through"
            );
            let source = call
                .args
                .first()
                .and_then(DslArg::column_name)
                .map(str::to_string)
                .or_else(|| mapping.source_variable.clone())
                .ok_or(HandlerError::MissingField("source_variable"))?;
            let column = find_column(ctx.working, &source)
                .ok_or_else(|| HandlerError::ColumnNotFound(source.clone()))?;
            return Ok(string_column_from(column, &mapping.sdtm_variable));
        }
    };
    Ok(Column::new(mapping.sdtm_variable.as_str().into(), values))
}

fn handle_lookup_recode(
    ctx: &HandlerContext<'_>,
    mapping: &VariableMapping,
) -> Result<Column, HandlerError> {
    let source = mapping
        .source_variable
        .as_deref()
        .ok_or(HandlerError::MissingField("source_variable"))?;

    // Prefer the vendor's _STD companion: it already carries submission
    // values.
    let std_name = format!("{source}_STD");
    let column = if !source.to_uppercase().ends_with("_STD") {
        find_column(ctx.working, &std_name).or_else(|| find_column(ctx.working, source))
    } else {
        find_column(ctx.working, source)
    }
    .ok_or_else(|| HandlerError::ColumnNotFound(source.to_string()))?;

    let codelist = mapping
        .codelist_code
        .as_deref()
        .and_then(|code| ctx.reference.lookup_codelist(code));
    let Some(codelist) = codelist else {
        warn!(
            variable = mapping.sdtm_variable.as_str(),
            codelist = mapping.codelist_code.as_deref().unwrap_or("<none>"),
            "codelist not bundled; passing source through"
        );
        return Ok(string_column_from(column, &mapping.sdtm_variable));
    };

    // Numeric inputs are coerced to string before lookup; misses are null.
    let values: Vec<Option<String>> = (0..ctx.working.height())
        .map(|idx| {
            string_at(column, idx)
                .and_then(|v| codelist.recode(&v).map(str::to_string))
        })
        .collect();
    Ok(Column::new(mapping.sdtm_variable.as_str().into(), values))
}

// ---- derivation helpers ----

fn cross_dataset_aggregate(
    ctx: &HandlerContext<'_>,
    call: &DerivationCall,
    height: usize,
) -> Result<Vec<Option<String>>, HandlerError> {
    let (dataset, column_name) = match call.args.first() {
        Some(DslArg::Column {
            dataset: Some(dataset),
            column,
        }) => (dataset.clone(), column.clone()),
        _ => {
            return Err(HandlerError::BadRule(
                "MIN/MAX needs a dataset-qualified column".to_string(),
            ));
        }
    };
    let source = ctx
        .raw_sources
        .iter()
        .find(|(key, _)| {
            crate::preprocess::stem_of(key).eq_ignore_ascii_case(&dataset)
        })
        .map(|(_, frame)| frame)
        .ok_or_else(|| HandlerError::ColumnNotFound(format!("{dataset}.*")))?;

    let value_column = find_column(source, &column_name)
        .ok_or_else(|| HandlerError::ColumnNotFound(column_name.clone()))?;
    let join_key = call
        .join_on
        .as_deref()
        .ok_or(HandlerError::MissingField("JOIN ON"))?;
    let source_key = find_column(source, join_key)
        .ok_or_else(|| HandlerError::ColumnNotFound(join_key.to_string()))?;
    let filter = match &call.where_clause {
        Some((column, value)) => Some((
            find_column(source, column)
                .ok_or_else(|| HandlerError::ColumnNotFound(column.clone()))?,
            value.clone(),
        )),
        None => None,
    };

    // Aggregate per join key; ISO-normalised dates compare correctly as
    // strings within equal precision.
    let mut aggregated: BTreeMap<String, String> = BTreeMap::new();
    for idx in 0..source.height() {
        if let Some((flag_column, wanted)) = &filter {
            let flag = string_at(flag_column, idx);
            if flag.as_deref() != Some(wanted.as_str()) {
                continue;
            }
        }
        let (Some(key), Some(raw)) = (string_at(source_key, idx), string_at(value_column, idx))
        else {
            continue;
        };
        let value = parse_string_date_to_iso(&raw).unwrap_or(raw);
        aggregated
            .entry(key)
            .and_modify(|current| {
                let replace = match call.keyword.as_str() {
                    "MIN" => value < *current,
                    _ => value > *current,
                };
                if replace {
                    *current = value.clone();
                }
            })
            .or_insert(value);
    }

    let working_key = find_column(ctx.working, join_key)
        .or_else(|| find_column(ctx.produced, join_key))
        .ok_or_else(|| HandlerError::ColumnNotFound(join_key.to_string()))?;
    Ok((0..height)
        .map(|idx| {
            string_at(working_key, idx).and_then(|key| aggregated.get(&key).cloned())
        })
        .collect())
}

fn race_checkbox(
    ctx: &HandlerContext<'_>,
    call: &DerivationCall,
    height: usize,
) -> Result<Vec<Option<String>>, HandlerError> {
    fn race_term(column_name: &str) -> Option<&'static str> {
        let upper = column_name.to_uppercase();
        let stem = upper.strip_prefix("RACE").unwrap_or(&upper);
        match stem.trim_end_matches("_STD") {
            "WHI" | "WHITE" => Some("WHITE"),
            "BLK" | "BLACK" => Some("BLACK OR AFRICAN AMERICAN"),
            "ASN" | "ASIAN" => Some("ASIAN"),
            "AIA" | "AIAN" => Some("AMERICAN INDIAN OR ALASKA NATIVE"),
            "NHP" | "NHOPI" => Some("NATIVE HAWAIIAN OR OTHER PACIFIC ISLANDER"),
            "OTH" | "OTHER" => Some("OTHER"),
            _ => None,
        }
    }

    let mut checkboxes = Vec::new();
    for arg in &call.args {
        let Some(name) = arg.column_name() else { continue };
        let Some(column) = find_column(ctx.working, name) else {
            continue;
        };
        let Some(term) = race_term(name) else {
            warn!(column = name, "race checkbox column not recognised");
            continue;
        };
        checkboxes.push((column, term));
    }
    if checkboxes.is_empty() {
        return Err(HandlerError::MissingField("race checkbox columns"));
    }

    Ok((0..height)
        .map(|idx| {
            let selected: Vec<&str> = checkboxes
                .iter()
                .filter(|(column, _)| {
                    string_at(column, idx)
                        .map(|v| matches!(v.as_str(), "1" | "1.0" | "Y"))
                        .unwrap_or(false)
                })
                .map(|(_, term)| *term)
                .collect();
            match selected.as_slice() {
                [] => None,
                [single] => Some((*single).to_string()),
                _ => Some("MULTIPLE".to_string()),
            }
        })
        .collect())
}

fn single_column_map(
    ctx: &HandlerContext<'_>,
    call: &DerivationCall,
    mapping: &VariableMapping,
    transform: impl Fn(&str) -> Option<String>,
) -> Result<Vec<Option<String>>, HandlerError> {
    let source = call
        .args
        .first()
        .and_then(DslArg::column_name)
        .map(str::to_string)
        .or_else(|| mapping.source_variable.clone())
        .ok_or(HandlerError::MissingField("source_variable"))?;
    let column = find_column(ctx.working, &source)
        .ok_or_else(|| HandlerError::ColumnNotFound(source.clone()))?;
    Ok((0..ctx.working.height())
        .map(|idx| string_at(column, idx).and_then(|v| transform(&v)))
        .collect())
}

/// Build the narrowest ISO date from separate year/month/day columns.
fn partial_date_from_components(
    ctx: &HandlerContext<'_>,
    call: &DerivationCall,
    height: usize,
) -> Result<Vec<Option<String>>, HandlerError> {
    let mut components = Vec::new();
    for arg in &call.args {
        if let Some(name) = arg.column_name() {
            components.push(find_column(ctx.working, name));
        }
    }
    let year = components
        .first()
        .copied()
        .flatten()
        .ok_or(HandlerError::MissingField("year column"))?;
    let month = components.get(1).copied().flatten();
    let day = components.get(2).copied().flatten();

    // Vendor exports often carry year/month/day as floats ("1960.0").
    fn component(value: &str) -> Option<u32> {
        value.parse::<f64>().ok().map(|v| v as u32)
    }

    Ok((0..height)
        .map(|idx| {
            let year = component(&string_at(year, idx)?)? as i32;
            let month = month
                .and_then(|c| string_at(c, idx))
                .and_then(|v| component(&v))
                .filter(|m| (1..=12).contains(m));
            match month {
                None => Some(format!("{year:04}")),
                Some(month) => {
                    let day = day
                        .and_then(|c| string_at(c, idx))
                        .and_then(|v| component(&v))
                        .filter(|d| (1..=31).contains(d));
                    match day {
                        None => Some(format!("{year:04}-{month:02}")),
                        Some(day) => Some(format!("{year:04}-{month:02}-{day:02}")),
                    }
                }
            }
        })
        .collect())
}

fn study_day_derivation(
    ctx: &HandlerContext<'_>,
    call: &DerivationCall,
    height: usize,
) -> Result<Vec<Option<String>>, HandlerError> {
    let cross = ctx
        .cross
        .ok_or(HandlerError::MissingField("cross-domain context"))?;
    let dtc_name = call
        .args
        .first()
        .and_then(DslArg::column_name)
        .ok_or(HandlerError::MissingField("dtc column"))?;
    let dtc = find_column(ctx.produced, dtc_name)
        .or_else(|| find_column(ctx.working, dtc_name))
        .ok_or_else(|| HandlerError::ColumnNotFound(dtc_name.to_string()))?;
    let usubjid = find_column(ctx.produced, "USUBJID")
        .or_else(|| find_column(ctx.working, "USUBJID"))
        .ok_or_else(|| HandlerError::ColumnNotFound("USUBJID".to_string()))?;

    Ok((0..height)
        .map(|idx| {
            let subject = string_at(usubjid, idx)?;
            let reference = cross.rfstdtc_for(&subject)?;
            let dtc_value = string_at(dtc, idx)?;
            study_day_from_strings(&dtc_value, reference).map(|day| day.to_string())
        })
        .collect())
}

fn epoch_derivation(
    ctx: &HandlerContext<'_>,
    call: &DerivationCall,
    height: usize,
) -> Result<Vec<Option<String>>, HandlerError> {
    let cross = ctx
        .cross
        .ok_or(HandlerError::MissingField("cross-domain context"))?;
    let dtc_name = call
        .args
        .first()
        .and_then(DslArg::column_name)
        .ok_or(HandlerError::MissingField("dtc column"))?;
    let dtc = find_column(ctx.produced, dtc_name)
        .or_else(|| find_column(ctx.working, dtc_name))
        .ok_or_else(|| HandlerError::ColumnNotFound(dtc_name.to_string()))?;
    let usubjid = find_column(ctx.produced, "USUBJID")
        .or_else(|| find_column(ctx.working, "USUBJID"))
        .ok_or_else(|| HandlerError::ColumnNotFound("USUBJID".to_string()))?;

    Ok((0..height)
        .map(|idx| {
            let subject = string_at(usubjid, idx)?;
            let dtc_value = string_at(dtc, idx)?;
            assign_epoch(&dtc_value, cross.elements_for(&subject))
        })
        .collect())
}

// ---- shared helpers ----

/// Case-insensitive column lookup.
pub fn find_column<'d>(df: &'d DataFrame, name: &str) -> Option<&'d Column> {
    df.get_columns()
        .iter()
        .find(|c| c.name().eq_ignore_ascii_case(name))
}

/// A constant string column.
pub fn constant_column(name: &str, value: &str, height: usize) -> Column {
    Column::new(name.into(), vec![value; height])
}

/// Re-render any column as a string column under a new name.
pub fn string_column_from(column: &Column, name: &str) -> Column {
    let values: Vec<Option<String>> = (0..column.len()).map(|idx| string_at(column, idx)).collect();
    Column::new(name.into(), values)
}

fn literal_string(call: &DerivationCall, index: usize) -> Result<String, HandlerError> {
    match call.args.get(index) {
        Some(DslArg::Literal(text)) => Ok(text.clone()),
        Some(DslArg::Column { column, .. }) => Ok(column.clone()),
        None => Err(HandlerError::BadRule(format!(
            "missing argument {index} for {}",
            call.keyword
        ))),
    }
}

fn literal_usize(call: &DerivationCall, index: usize) -> Result<usize, HandlerError> {
    literal_string(call, index)?
        .parse()
        .map_err(|_| HandlerError::BadRule(format!("argument {index} is not an integer")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use astraea_model::{
        ConfidenceLevel, CoreDesignation, VariableDataType, VariableOrigin,
    };

    fn mapping(pattern: MappingPattern) -> VariableMapping {
        VariableMapping {
            sdtm_variable: "OUT".to_string(),
            sdtm_label: "Out".to_string(),
            sdtm_data_type: VariableDataType::Char,
            core: CoreDesignation::Permissible,
            source_dataset: None,
            source_variable: None,
            mapping_pattern: pattern,
            mapping_logic: String::new(),
            derivation_rule: None,
            assigned_value: None,
            codelist_code: None,
            codelist_name: None,
            origin: VariableOrigin::Crf,
            confidence: 0.9,
            confidence_level: ConfidenceLevel::High,
            needs_review: false,
            rationale: String::new(),
            order: 1,
            notes: Vec::new(),
        }
    }

    fn ctx<'a>(
        working: &'a DataFrame,
        produced: &'a DataFrame,
        raw: &'a BTreeMap<String, DataFrame>,
        reference: &'a ReferenceStore,
        transforms: &'a TransformRegistry,
        study: &'a StudyMetadata,
    ) -> HandlerContext<'a> {
        HandlerContext {
            working,
            produced,
            raw_sources: raw,
            reference,
            transforms,
            cross: None,
            study,
        }
    }

    #[test]
    fn split_keywords() {
        let working = DataFrame::new(vec![Column::new(
            "CODE".into(),
            ["AB-123", "CD-456", ""],
        )])
        .unwrap();
        let produced = DataFrame::empty();
        let raw = BTreeMap::new();
        let reference = ReferenceStore::load().unwrap();
        let transforms = TransformRegistry::standard();
        let study = StudyMetadata::new("PHA001");
        let ctx = ctx(&working, &produced, &raw, &reference, &transforms, &study);

        let mut m = mapping(MappingPattern::Split);
        m.derivation_rule = Some("DELIMITER_PART(CODE, \"-\", 1)".to_string());
        let column = apply_mapping(&ctx, &m).unwrap();
        assert_eq!(string_at(&column, 0).as_deref(), Some("123"));
        assert_eq!(string_at(&column, 2), None);

        let mut m = mapping(MappingPattern::Split);
        m.derivation_rule = Some("SUBSTRING(CODE, 0, 2)".to_string());
        let column = apply_mapping(&ctx, &m).unwrap();
        assert_eq!(string_at(&column, 1).as_deref(), Some("CD"));

        let mut m = mapping(MappingPattern::Split);
        m.derivation_rule = Some("REGEX_GROUP(CODE, \"([A-Z]+)-(\\d+)\", 2)".to_string());
        let column = apply_mapping(&ctx, &m).unwrap();
        assert_eq!(string_at(&column, 0).as_deref(), Some("123"));
    }

    #[test]
    fn unknown_split_keyword_passes_through() {
        let working =
            DataFrame::new(vec![Column::new("CODE".into(), ["X", "Y"])]).unwrap();
        let produced = DataFrame::empty();
        let raw = BTreeMap::new();
        let reference = ReferenceStore::load().unwrap();
        let transforms = TransformRegistry::standard();
        let study = StudyMetadata::new("PHA001");
        let ctx = ctx(&working, &produced, &raw, &reference, &transforms, &study);

        let mut m = mapping(MappingPattern::Split);
        m.derivation_rule = Some("MYSTERY_OP(CODE, 1)".to_string());
        let column = apply_mapping(&ctx, &m).unwrap();
        assert_eq!(string_at(&column, 0).as_deref(), Some("X"));
        assert_eq!(string_at(&column, 1).as_deref(), Some("Y"));
    }

    #[test]
    fn lookup_recode_prefers_std_column_and_nulls_misses() {
        let working = DataFrame::new(vec![
            Column::new("SEX".into(), ["Female", "Male", "Other"]),
            Column::new("SEX_STD".into(), ["F", "M", "Other"]),
        ])
        .unwrap();
        let produced = DataFrame::empty();
        let raw = BTreeMap::new();
        let reference = ReferenceStore::load().unwrap();
        let transforms = TransformRegistry::standard();
        let study = StudyMetadata::new("PHA001");
        let ctx = ctx(&working, &produced, &raw, &reference, &transforms, &study);

        let mut m = mapping(MappingPattern::LookupRecode);
        m.source_variable = Some("SEX".to_string());
        m.codelist_code = Some("C66731".to_string());
        let column = apply_mapping(&ctx, &m).unwrap();
        assert_eq!(string_at(&column, 0).as_deref(), Some("F"));
        assert_eq!(string_at(&column, 1).as_deref(), Some("M"));
        assert_eq!(string_at(&column, 2), None);
    }

    #[test]
    fn min_aggregate_with_where_and_join() {
        let working =
            DataFrame::new(vec![Column::new("Subject".into(), ["01", "02"])]).unwrap();
        let produced = DataFrame::empty();
        let mut raw = BTreeMap::new();
        raw.insert(
            "ex.csv".to_string(),
            DataFrame::new(vec![
                Column::new("Subject".into(), ["01", "01", "02"]),
                Column::new("EXSTDTC".into(), ["2020-06-30", "2020-01-15", "2020-02-01"]),
                Column::new("EXYN_STD".into(), ["Y", "Y", "N"]),
            ])
            .unwrap(),
        );
        let reference = ReferenceStore::load().unwrap();
        let transforms = TransformRegistry::standard();
        let study = StudyMetadata::new("PHA001");
        let ctx = ctx(&working, &produced, &raw, &reference, &transforms, &study);

        let mut m = mapping(MappingPattern::Derivation);
        m.derivation_rule =
            Some("MIN(ex.EXSTDTC WHERE EXYN_STD = \"Y\" JOIN ON Subject)".to_string());
        let column = apply_mapping(&ctx, &m).unwrap();
        assert_eq!(string_at(&column, 0).as_deref(), Some("2020-01-15"));
        // Subject 02's only row fails the WHERE filter.
        assert_eq!(string_at(&column, 1), None);
    }

    #[test]
    fn race_checkbox_single_and_multiple() {
        let working = DataFrame::new(vec![
            Column::new("RACEWHI".into(), ["1", "0", "1"]),
            Column::new("RACEBLK".into(), ["0", "1", "1"]),
        ])
        .unwrap();
        let produced = DataFrame::empty();
        let raw = BTreeMap::new();
        let reference = ReferenceStore::load().unwrap();
        let transforms = TransformRegistry::standard();
        let study = StudyMetadata::new("PHA001");
        let ctx = ctx(&working, &produced, &raw, &reference, &transforms, &study);

        let mut m = mapping(MappingPattern::Derivation);
        m.derivation_rule = Some("RACE_CHECKBOX(RACEWHI, RACEBLK)".to_string());
        let column = apply_mapping(&ctx, &m).unwrap();
        assert_eq!(string_at(&column, 0).as_deref(), Some("WHITE"));
        assert_eq!(
            string_at(&column, 1).as_deref(),
            Some("BLACK OR AFRICAN AMERICAN")
        );
        assert_eq!(string_at(&column, 2).as_deref(), Some("MULTIPLE"));
    }

    #[test]
    fn partial_date_narrows_to_available_components() {
        let working = DataFrame::new(vec![
            Column::new("BRTHYR".into(), ["1960", "1975", ""]),
            Column::new("BRTHMO".into(), ["", "6", "3"]),
        ])
        .unwrap();
        let produced = DataFrame::empty();
        let raw = BTreeMap::new();
        let reference = ReferenceStore::load().unwrap();
        let transforms = TransformRegistry::standard();
        let study = StudyMetadata::new("PHA001");
        let ctx = ctx(&working, &produced, &raw, &reference, &transforms, &study);

        let mut m = mapping(MappingPattern::Derivation);
        m.derivation_rule = Some("PARTIAL_DATE(BRTHYR, BRTHMO)".to_string());
        let column = apply_mapping(&ctx, &m).unwrap();
        assert_eq!(string_at(&column, 0).as_deref(), Some("1960"));
        assert_eq!(string_at(&column, 1).as_deref(), Some("1975-06"));
        assert_eq!(string_at(&column, 2), None);
    }
}
