//! Table and panel rendering for the interactive review.

use comfy_table::{ContentArrangement, Table};

use astraea_model::{DomainMappingSpec, DomainReview, VariableMapping};

/// Render the spec overview table shown before the domain action prompt.
///
/// The status column shows `--` until a decision exists.
pub fn render_spec_table(spec: &DomainMappingSpec, review: &DomainReview) -> String {
    let mut table = Table::new();
    table
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec![
            "Variable", "Core", "Pattern", "Source", "Conf", "Level", "Status",
        ]);
    for mapping in &spec.variable_mappings {
        let source = match (&mapping.source_dataset, &mapping.source_variable) {
            (Some(ds), Some(var)) => format!("{ds}.{var}"),
            (None, Some(var)) => var.clone(),
            _ => mapping.assigned_value.clone().unwrap_or_default(),
        };
        let status = review
            .decisions
            .get(&mapping.sdtm_variable)
            .map_or("--", |d| d.status.as_str());
        table.add_row(vec![
            mapping.sdtm_variable.clone(),
            mapping.core.as_code().to_string(),
            mapping.mapping_pattern.to_string(),
            source,
            format!("{:.2}", mapping.confidence),
            mapping.confidence_level.to_string(),
            status.to_string(),
        ]);
    }
    table.to_string()
}

/// Render the full detail panel for one mapping.
pub fn render_variable_panel(mapping: &VariableMapping) -> String {
    let mut lines = vec![
        format!(
            "{} - {} ({}, {})",
            mapping.sdtm_variable, mapping.sdtm_label, mapping.sdtm_data_type, mapping.core
        ),
        format!("  pattern:    {}", mapping.mapping_pattern),
    ];
    if let Some(ds) = &mapping.source_dataset {
        lines.push(format!("  source:     {}.{}", ds, mapping.source_variable.as_deref().unwrap_or("?")));
    } else if let Some(var) = &mapping.source_variable {
        lines.push(format!("  source:     {var}"));
    }
    if let Some(value) = &mapping.assigned_value {
        lines.push(format!("  assigned:   {value}"));
    }
    lines.push(format!("  logic:      {}", mapping.mapping_logic));
    if let Some(rule) = &mapping.derivation_rule {
        lines.push(format!("  derivation: {rule}"));
    }
    if let Some(code) = &mapping.codelist_code {
        let name = mapping.codelist_name.as_deref().unwrap_or("unbundled");
        lines.push(format!("  codelist:   {code} ({name})"));
    }
    lines.push(format!(
        "  confidence: {:.2} ({})",
        mapping.confidence, mapping.confidence_level
    ));
    lines.push(format!("  rationale:  {}", mapping.rationale));
    for note in &mapping.notes {
        lines.push(format!("  note:       {note}"));
    }
    lines.join("\n")
}
