//! The execution engine: a deterministic mapping-spec interpreter.
//!
//! Per domain: select and string-cast the raw sources, apply the domain row
//! filters and multi-source alignment, transpose Findings sources, dispatch
//! every variable mapping to its handler, run the cross-domain derivations
//! (study day, epoch, visit), assign sequence numbers, enforce the
//! reference column order and types, and generate SUPPQUAL off the
//! finalised parent. Handler failures degrade to null columns with logged
//! warnings; only missing sources invalidate the domain.
//!
//! Given the same reviewed spec and raw inputs, output is byte-identical.

use std::collections::BTreeMap;
use std::path::Path;

use polars::prelude::{Column, DataFrame, IdxCa};
use tracing::{info, warn};

use astraea_model::{
    CoreDesignation, DomainMappingSpec, MappingPattern, StudyMetadata, VariableDataType,
};
use astraea_reference::ReferenceStore;
use astraea_transforms::{MAX_CHAR_BYTES, TransformRegistry};

use crate::context::{CrossDomainContext, string_at};
use crate::error::ExecutionError;
use crate::frame::{DatasetWriter, DomainFrame};
use crate::handlers::{HandlerContext, apply_mapping, find_column};
use crate::preprocess::{align_and_concat, filter_ex_rows, select_sources, to_string_frame};
use crate::suppqual::{build_suppqual, check_suppqual_integrity};
use crate::transpose::{apply_transpose, parse_transpose_rule};

/// An executed domain plus its supplemental dataset and any degradations.
#[derive(Debug)]
pub struct ExecutedDomain {
    pub frame: DomainFrame,
    pub supp: Option<DomainFrame>,
    /// Handler failures, dropped columns, width and integrity issues.
    /// The validator turns the data-visible ones into findings.
    pub warnings: Vec<String>,
}

/// Deterministic spec interpreter.
pub struct ExecutionEngine<'a> {
    reference: &'a ReferenceStore,
    transforms: TransformRegistry,
}

impl<'a> ExecutionEngine<'a> {
    pub fn new(reference: &'a ReferenceStore) -> Self {
        Self {
            reference,
            transforms: TransformRegistry::standard(),
        }
    }

    /// Materialise one domain from its reviewed spec.
    pub fn execute(
        &self,
        spec: &DomainMappingSpec,
        raw: &BTreeMap<String, DataFrame>,
        cross: Option<&CrossDomainContext>,
        study: &StudyMetadata,
    ) -> Result<ExecutedDomain, ExecutionError> {
        let domain_spec = self.reference.get_domain_spec(&spec.domain)?;
        let mut warnings = Vec::new();

        // String-cast every raw frame once; handlers reason over collected
        // values, typing happens at the end.
        let mut raw_strings = BTreeMap::new();
        for (name, frame) in raw {
            raw_strings.insert(name.clone(), to_string_frame(frame)?);
        }

        // 1. Source selection, row filtering, multi-source alignment.
        let mut sources = select_sources(&spec.domain, &spec.source_datasets, &raw_strings)?;
        if spec.domain.eq_ignore_ascii_case("EX") {
            for (_, frame) in &mut sources {
                *frame = filter_ex_rows(frame)?;
            }
        }
        let reference_names: Vec<String> = domain_spec
            .variables
            .iter()
            .map(|v| v.name.clone())
            .collect();
        let mut working = align_and_concat(&spec.domain, &sources, &reference_names)?;

        // 2. Transpose, when the spec carries one.
        if let Some(transpose_mapping) = spec
            .variable_mappings
            .iter()
            .find(|m| m.mapping_pattern == MappingPattern::Transpose)
        {
            match transpose_mapping
                .derivation_rule
                .as_deref()
                .and_then(parse_transpose_rule)
            {
                Some(transpose_spec) => {
                    working = apply_transpose(&working, &transpose_spec, &spec.domain)?;
                }
                None => {
                    warnings.push(format!(
                        "transpose rule unparseable for {}; sources left wide",
                        spec.domain
                    ));
                    warn!(domain = spec.domain.as_str(), "transpose rule unparseable");
                }
            }
        }

        // 3. Per-variable dispatch, in order. Failures become null columns.
        let mut produced_columns: Vec<Column> = Vec::new();
        for mapping in &spec.variable_mappings {
            if mapping.mapping_pattern == MappingPattern::Transpose {
                continue;
            }
            let produced = DataFrame::new(produced_columns.clone())?;
            let ctx = HandlerContext {
                working: &working,
                produced: &produced,
                raw_sources: &raw_strings,
                reference: self.reference,
                transforms: &self.transforms,
                cross,
                study,
            };
            let column = match apply_mapping(&ctx, mapping) {
                Ok(column) => column,
                Err(error) => {
                    warn!(
                        domain = spec.domain.as_str(),
                        variable = mapping.sdtm_variable.as_str(),
                        %error,
                        "handler failed; emitting null column"
                    );
                    warnings.push(format!(
                        "{}.{}: {error}",
                        spec.domain, mapping.sdtm_variable
                    ));
                    null_column(&mapping.sdtm_variable, working.height())
                }
            };
            upsert_column(&mut produced_columns, column);
        }

        // 4. Cross-domain derivations the dispatch did not already fill.
        if let Some(cross) = cross {
            self.derive_study_days(domain_spec, &mut produced_columns, cross);
            self.derive_epoch(domain_spec, &mut produced_columns, cross, &spec.domain);
            self.derive_visits(domain_spec, &mut produced_columns, cross);
        }

        // 5. Sequence numbers, with rows ordered by subject and key.
        let mut produced = DataFrame::new(produced_columns)?;
        produced = self.assign_seq(domain_spec, produced, &mut working)?;

        // 6. Reference column order, width cap, type coercion.
        let (final_frame, mut order_warnings) =
            self.order_and_type(domain_spec, &produced)?;
        warnings.append(&mut order_warnings);

        let mut frame = DomainFrame::new(
            domain_spec.code.clone(),
            domain_spec.label.clone(),
            final_frame,
        );

        // 7. SUPPQUAL off the finalised parent. Non-standard source columns
        // live in the working frame; append them to an augmented parent so
        // each record still addresses its parent row by sequence number.
        let supp = if spec.suppqual_candidates.is_empty() {
            None
        } else {
            let augmented = augment_with_sources(&frame, &working, spec)?;
            let supp = build_suppqual(&augmented, &spec.suppqual_candidates, &study.study_id)?;
            if let Some(supp) = &supp {
                for violation in check_suppqual_integrity(&frame, supp) {
                    warnings.push(violation);
                }
            }
            supp
        };

        if spec.domain.eq_ignore_ascii_case("LC") {
            frame.lc_unit_conversion_performed = Some(false);
        }

        info!(
            domain = spec.domain.as_str(),
            rows = frame.data.height(),
            columns = frame.data.width(),
            warnings = warnings.len(),
            "domain executed"
        );
        Ok(ExecutedDomain {
            frame,
            supp,
            warnings,
        })
    }

    /// Execute and serialise through the pluggable writer.
    pub fn execute_to_file(
        &self,
        spec: &DomainMappingSpec,
        raw: &BTreeMap<String, DataFrame>,
        cross: Option<&CrossDomainContext>,
        study: &StudyMetadata,
        writer: &dyn DatasetWriter,
        output_dir: &Path,
    ) -> Result<ExecutedDomain, ExecutionError> {
        let executed = self.execute(spec, raw, cross, study)?;
        let path = output_dir.join(format!(
            "{}.{}",
            executed.frame.domain_code.to_lowercase(),
            writer.extension()
        ));
        writer.write(&executed.frame, &path)?;
        if let Some(supp) = &executed.supp {
            let supp_path = output_dir.join(format!(
                "{}.{}",
                supp.domain_code.to_lowercase(),
                writer.extension()
            ));
            writer.write(supp, &supp_path)?;
        }
        Ok(executed)
    }

    /// `--DY` from `--DTC` + RFSTDTC, for every DY variable in the
    /// reference spec whose column is absent or still all null.
    fn derive_study_days(
        &self,
        domain_spec: &astraea_model::ReferenceDomain,
        columns: &mut Vec<Column>,
        cross: &CrossDomainContext,
    ) {
        let produced = DataFrame::new(columns.clone()).unwrap_or_else(|_| DataFrame::empty());
        let Some(usubjid) = find_column(&produced, "USUBJID").cloned() else {
            return;
        };
        for variable in &domain_spec.variables {
            let name = variable.name.to_uppercase();
            let Some(prefix) = name.strip_suffix("DY") else {
                continue;
            };
            if column_has_values(&produced, &name) {
                continue;
            }
            let dtc_name = format!("{prefix}DTC");
            let Some(dtc) = find_column(&produced, &dtc_name) else {
                continue;
            };
            let values: Vec<Option<String>> = (0..produced.height())
                .map(|idx| {
                    let subject = string_at(&usubjid, idx)?;
                    let reference = cross.rfstdtc_for(&subject)?;
                    let dtc_value = string_at(dtc, idx)?;
                    astraea_transforms::study_day_from_strings(&dtc_value, reference)
                        .map(|d| d.to_string())
                })
                .collect();
            upsert_column(columns, Column::new(variable.name.as_str().into(), values));
        }
    }

    /// EPOCH from SE element ranges, off the domain's start date.
    fn derive_epoch(
        &self,
        domain_spec: &astraea_model::ReferenceDomain,
        columns: &mut Vec<Column>,
        cross: &CrossDomainContext,
        domain: &str,
    ) {
        if cross.se_elements.is_empty() || domain_spec.find_variable("EPOCH").is_none() {
            return;
        }
        let produced = DataFrame::new(columns.clone()).unwrap_or_else(|_| DataFrame::empty());
        if column_has_values(&produced, "EPOCH") {
            return;
        }
        let Some(usubjid) = find_column(&produced, "USUBJID") else {
            return;
        };
        let timing = [format!("{domain}STDTC"), format!("{domain}DTC")]
            .iter()
            .find_map(|name| find_column(&produced, name).cloned());
        let Some(dtc) = timing else {
            return;
        };
        let values: Vec<Option<String>> = (0..produced.height())
            .map(|idx| {
                let subject = string_at(usubjid, idx)?;
                let dtc_value = string_at(&dtc, idx)?;
                astraea_transforms::assign_epoch(&dtc_value, cross.elements_for(&subject))
            })
            .collect();
        upsert_column(columns, Column::new("EPOCH".into(), values));
    }

    /// VISITNUM (and canonical VISIT spelling) from the TV planned visits.
    fn derive_visits(
        &self,
        domain_spec: &astraea_model::ReferenceDomain,
        columns: &mut Vec<Column>,
        cross: &CrossDomainContext,
    ) {
        if cross.tv_visits.is_empty() || domain_spec.find_variable("VISITNUM").is_none() {
            return;
        }
        let produced = DataFrame::new(columns.clone()).unwrap_or_else(|_| DataFrame::empty());
        if column_has_values(&produced, "VISITNUM") {
            return;
        }
        let Some(visit) = find_column(&produced, "VISIT").cloned() else {
            return;
        };
        let mut numbers: Vec<Option<String>> = Vec::with_capacity(produced.height());
        let mut names: Vec<Option<String>> = Vec::with_capacity(produced.height());
        for idx in 0..produced.height() {
            match string_at(&visit, idx).and_then(|label| cross.tv_visits.lookup(&label).cloned()) {
                Some(planned) => {
                    numbers.push(Some(crate::context::format_numeric(planned.visitnum)));
                    names.push(Some(planned.visit));
                }
                None => {
                    numbers.push(None);
                    names.push(string_at(&visit, idx));
                }
            }
        }
        upsert_column(columns, Column::new("VISITNUM".into(), numbers));
        upsert_column(columns, Column::new("VISIT".into(), names));
    }

    /// Sort by USUBJID plus the domain's key variables and assign 1..N per
    /// subject when the reference spec expects a sequence variable.
    fn assign_seq(
        &self,
        domain_spec: &astraea_model::ReferenceDomain,
        produced: DataFrame,
        working: &mut DataFrame,
    ) -> Result<DataFrame, ExecutionError> {
        let Some(seq_name) = domain_spec.seq_variable().map(str::to_string) else {
            return Ok(produced);
        };
        let seq_core = domain_spec
            .find_variable(&seq_name)
            .map(|v| v.core)
            .unwrap_or(CoreDesignation::Permissible);
        if seq_core == CoreDesignation::Permissible {
            return Ok(produced);
        }
        let Some(usubjid) = find_column(&produced, "USUBJID").cloned() else {
            return Ok(produced);
        };

        let secondary: Vec<Column> = domain_spec
            .key_variables
            .iter()
            .filter(|k| !k.eq_ignore_ascii_case("STUDYID") && !k.eq_ignore_ascii_case("USUBJID"))
            .filter_map(|k| find_column(&produced, k).cloned())
            .collect();

        let mut order: Vec<usize> = (0..produced.height()).collect();
        order.sort_by_key(|&idx| {
            let mut key = vec![string_at(&usubjid, idx).unwrap_or_default()];
            for column in &secondary {
                key.push(string_at(column, idx).unwrap_or_default());
            }
            key
        });

        let idx = IdxCa::from_vec(
            "idx".into(),
            order.iter().map(|&i| i as u32).collect::<Vec<u32>>(),
        );
        let mut sorted = produced.take(&idx)?;
        // Keep row identity with the working frame for SUPPQUAL sources.
        *working = working.take(&idx)?;

        let Some(sorted_usubjid) = find_column(&sorted, "USUBJID").cloned() else {
            return Ok(sorted);
        };
        let mut seq_values: Vec<Option<f64>> = Vec::with_capacity(sorted.height());
        let mut current_subject: Option<String> = None;
        let mut counter = 0u32;
        for idx in 0..sorted.height() {
            let subject = string_at(&sorted_usubjid, idx);
            if subject != current_subject {
                current_subject = subject;
                counter = 0;
            }
            counter += 1;
            seq_values.push(Some(f64::from(counter)));
        }
        sorted.with_column(Column::new(seq_name.as_str().into(), seq_values))?;
        Ok(sorted)
    }

    /// Enforce reference variable order, cap character widths, coerce types.
    fn order_and_type(
        &self,
        domain_spec: &astraea_model::ReferenceDomain,
        produced: &DataFrame,
    ) -> Result<(DataFrame, Vec<String>), ExecutionError> {
        let mut warnings = Vec::new();
        let mut columns: Vec<Column> = Vec::new();

        for variable in &domain_spec.variables {
            let Some(column) = find_column(produced, &variable.name) else {
                continue;
            };
            let column = match variable.data_type {
                VariableDataType::Num => numeric_column(column, &variable.name),
                VariableDataType::Char => {
                    let values: Vec<Option<String>> = (0..column.len())
                        .map(|idx| string_at(column, idx))
                        .collect();
                    let over_cap = values
                        .iter()
                        .flatten()
                        .filter(|v| v.len() > MAX_CHAR_BYTES)
                        .count();
                    if over_cap > 0 {
                        warnings.push(format!(
                            "{}.{}: {} value(s) exceed the {}-byte transport cap",
                            domain_spec.code, variable.name, over_cap, MAX_CHAR_BYTES
                        ));
                    }
                    Column::new(variable.name.as_str().into(), values)
                }
            };
            columns.push(column);
        }

        for column in produced.get_columns() {
            if domain_spec.find_variable(column.name()).is_none() {
                warnings.push(format!(
                    "{}: dropping non-standard column {} (SUPPQUAL is the place for it)",
                    domain_spec.code,
                    column.name()
                ));
            }
        }

        Ok((DataFrame::new(columns)?, warnings))
    }
}

fn null_column(name: &str, height: usize) -> Column {
    let values: Vec<Option<String>> = vec![None; height];
    Column::new(name.into(), values)
}

/// Insert or replace a produced column by name.
fn upsert_column(columns: &mut Vec<Column>, column: Column) {
    match columns
        .iter()
        .position(|c| c.name().eq_ignore_ascii_case(column.name().as_str()))
    {
        Some(idx) => columns[idx] = column,
        None => columns.push(column),
    }
}

fn column_has_values(df: &DataFrame, name: &str) -> bool {
    find_column(df, name)
        .map(|column| (0..column.len()).any(|idx| string_at(column, idx).is_some()))
        .unwrap_or(false)
}

fn numeric_column(column: &Column, name: &str) -> Column {
    let values: Vec<Option<f64>> = (0..column.len())
        .map(|idx| string_at(column, idx).and_then(|v| v.parse::<f64>().ok()))
        .collect();
    Column::new(name.into(), values)
}

/// Append SUPPQUAL source columns (taken from the working frame) to the
/// finalised parent, preserving row identity.
fn augment_with_sources(
    frame: &DomainFrame,
    working: &DataFrame,
    spec: &DomainMappingSpec,
) -> Result<DomainFrame, ExecutionError> {
    let mut data = frame.data.clone();
    for candidate in &spec.suppqual_candidates {
        if find_column(&data, &candidate.source_col).is_some() {
            continue;
        }
        if let Some(source) = find_column(working, &candidate.source_col) {
            if source.len() == data.height() {
                data.with_column(source.clone())?;
            }
        }
    }
    Ok(DomainFrame::new(
        frame.domain_code.clone(),
        frame.label.clone(),
        data,
    ))
}
