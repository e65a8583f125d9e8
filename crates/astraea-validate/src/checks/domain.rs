//! Per-domain rules.

use std::collections::{BTreeMap, BTreeSet};

use astraea_model::{RuleCategory, RuleResult, RuleSeverity};
use astraea_transforms::{MAX_CHAR_BYTES, is_valid_iso8601};

use crate::registry::{DomainInput, RuleContext, RuleDef};
use crate::util::{domain_prefix, has_column, missing_count, values_of};

/// The per-domain rule registry, in evaluation order.
pub fn domain_rules() -> Vec<RuleDef> {
    vec![
        RuleDef {
            rule_id: "CT001",
            description: "Value not in bound controlled terminology",
            category: RuleCategory::Terminology,
            severity: RuleSeverity::Error,
            p21_equivalent: Some("CT2001"),
            evaluate: check_controlled_terminology,
        },
        RuleDef {
            rule_id: "PRES001",
            description: "Required variable missing from dataset",
            category: RuleCategory::Presence,
            severity: RuleSeverity::Error,
            p21_equivalent: Some("SD0056"),
            evaluate: check_required_present,
        },
        RuleDef {
            rule_id: "PRES002",
            description: "Expected variable missing from dataset",
            category: RuleCategory::Presence,
            severity: RuleSeverity::Warning,
            p21_equivalent: Some("SD0057"),
            evaluate: check_expected_present,
        },
        RuleDef {
            rule_id: "PRES003",
            description: "USUBJID must be populated on every record",
            category: RuleCategory::Presence,
            severity: RuleSeverity::Error,
            p21_equivalent: Some("SD0002"),
            evaluate: check_usubjid_populated,
        },
        RuleDef {
            rule_id: "PRES004",
            description: "Domain contains no records",
            category: RuleCategory::Presence,
            severity: RuleSeverity::Warning,
            p21_equivalent: None,
            evaluate: check_nonempty,
        },
        RuleDef {
            rule_id: "DM001",
            description: "Exactly one DM record per subject",
            category: RuleCategory::Consistency,
            severity: RuleSeverity::Error,
            p21_equivalent: Some("SD0007"),
            evaluate: check_dm_one_row_per_subject,
        },
        RuleDef {
            rule_id: "DM002",
            description: "Arm variables present in DM",
            category: RuleCategory::Presence,
            severity: RuleSeverity::Error,
            p21_equivalent: None,
            evaluate: check_dm_arm_variables,
        },
        RuleDef {
            rule_id: "DM003",
            description: "ACTARM identical to ARM for all subjects",
            category: RuleCategory::Consistency,
            severity: RuleSeverity::Warning,
            p21_equivalent: None,
            evaluate: check_dm_actarm_differs,
        },
        RuleDef {
            rule_id: "LIM001",
            description: "Variable name exceeds 8 characters",
            category: RuleCategory::Limits,
            severity: RuleSeverity::Error,
            p21_equivalent: None,
            evaluate: check_name_length,
        },
        RuleDef {
            rule_id: "LIM002",
            description: "Variable label exceeds 40 characters",
            category: RuleCategory::Limits,
            severity: RuleSeverity::Error,
            p21_equivalent: None,
            evaluate: check_label_length,
        },
        RuleDef {
            rule_id: "LIM003",
            description: "Character value exceeds 200 bytes",
            category: RuleCategory::Limits,
            severity: RuleSeverity::Error,
            p21_equivalent: None,
            evaluate: check_value_width,
        },
        RuleDef {
            rule_id: "FMT001",
            description: "Date/time variable not in ISO 8601 format",
            category: RuleCategory::Format,
            severity: RuleSeverity::Error,
            p21_equivalent: Some("SD0003"),
            evaluate: check_dtc_iso8601,
        },
        RuleDef {
            rule_id: "FMT002",
            description: "Character data must be ASCII",
            category: RuleCategory::Format,
            severity: RuleSeverity::Error,
            p21_equivalent: None,
            evaluate: check_ascii,
        },
        RuleDef {
            rule_id: "FMT003",
            description: "Domain code must serialise to a valid filename",
            category: RuleCategory::Format,
            severity: RuleSeverity::Error,
            p21_equivalent: None,
            evaluate: check_domain_filename,
        },
        RuleDef {
            rule_id: "SEQ001",
            description: "Sequence number must be unique within subject",
            category: RuleCategory::Consistency,
            severity: RuleSeverity::Error,
            p21_equivalent: Some("SD0005"),
            evaluate: check_seq_unique,
        },
        RuleDef {
            rule_id: "ORD001",
            description: "Column order should match the reference specification",
            category: RuleCategory::Ordering,
            severity: RuleSeverity::Warning,
            p21_equivalent: None,
            evaluate: check_column_order,
        },
        RuleDef {
            rule_id: "FDAB001",
            description: "SEX must be a C66731 submission value",
            category: RuleCategory::FdaBusiness,
            severity: RuleSeverity::Error,
            p21_equivalent: None,
            evaluate: |def, ctx, input| strict_ct(def, ctx, input, "SEX", "C66731"),
        },
        RuleDef {
            rule_id: "FDAB002",
            description: "ETHNIC must be a C66790 submission value",
            category: RuleCategory::FdaBusiness,
            severity: RuleSeverity::Error,
            p21_equivalent: None,
            evaluate: |def, ctx, input| strict_ct(def, ctx, input, "ETHNIC", "C66790"),
        },
        RuleDef {
            rule_id: "FDAB003",
            description: "RACE should be a C74457 submission value",
            category: RuleCategory::FdaBusiness,
            severity: RuleSeverity::Warning,
            p21_equivalent: None,
            evaluate: |def, ctx, input| strict_ct(def, ctx, input, "RACE", "C74457"),
        },
        RuleDef {
            rule_id: "FDAB004",
            description: "AE causality must be populated",
            category: RuleCategory::FdaBusiness,
            severity: RuleSeverity::Error,
            p21_equivalent: None,
            evaluate: check_aerel_populated,
        },
        RuleDef {
            rule_id: "FDAB005",
            description: "AE start date must not follow its end date",
            category: RuleCategory::FdaBusiness,
            severity: RuleSeverity::Warning,
            p21_equivalent: Some("SD0012"),
            evaluate: check_ae_date_order,
        },
        RuleDef {
            rule_id: "FDAB006",
            description: "COUNTRY should be an ISO 3166-1 alpha-3 code",
            category: RuleCategory::FdaBusiness,
            severity: RuleSeverity::Warning,
            p21_equivalent: None,
            evaluate: check_country_alpha3,
        },
        RuleDef {
            rule_id: "FDAB007",
            description: "VISITNUM must be numeric",
            category: RuleCategory::FdaBusiness,
            severity: RuleSeverity::Error,
            p21_equivalent: None,
            evaluate: check_visitnum_numeric,
        },
        RuleDef {
            rule_id: "FDAB008",
            description: "Study day variables must never be zero",
            category: RuleCategory::FdaBusiness,
            severity: RuleSeverity::Error,
            p21_equivalent: None,
            evaluate: check_dy_nonzero,
        },
        RuleDef {
            rule_id: "FDAB009",
            description: "Treatment topic variables must be populated",
            category: RuleCategory::FdaBusiness,
            severity: RuleSeverity::Error,
            p21_equivalent: None,
            evaluate: check_treatment_populated,
        },
        RuleDef {
            rule_id: "FDAB010",
            description: "Results and their units must be paired",
            category: RuleCategory::FdaBusiness,
            severity: RuleSeverity::Warning,
            p21_equivalent: None,
            evaluate: check_result_unit_pairing,
        },
        RuleDef {
            rule_id: "FDAB011",
            description: "TESTCD and TEST must map one-to-one",
            category: RuleCategory::FdaBusiness,
            severity: RuleSeverity::Error,
            p21_equivalent: None,
            evaluate: check_testcd_test_bijection,
        },
        RuleDef {
            rule_id: "FDAB012",
            description: "Standard units should be consistent per test code",
            category: RuleCategory::FdaBusiness,
            severity: RuleSeverity::Warning,
            p21_equivalent: None,
            evaluate: check_stresu_consistency,
        },
        RuleDef {
            rule_id: "FDAB013",
            description: "LC emitted without unit conversion",
            category: RuleCategory::FdaBusiness,
            severity: RuleSeverity::Warning,
            p21_equivalent: None,
            evaluate: check_lc_unit_conversion,
        },
        RuleDef {
            rule_id: "FDAB014",
            description: "Population flags do not belong in DM",
            category: RuleCategory::FdaBusiness,
            severity: RuleSeverity::Error,
            p21_equivalent: None,
            evaluate: check_no_population_flags_in_dm,
        },
    ]
}

fn check_controlled_terminology(
    def: &RuleDef,
    ctx: &RuleContext<'_>,
    input: &DomainInput<'_>,
) -> Vec<RuleResult> {
    let domain = &input.frame.domain_code;
    let Ok(spec) = ctx.reference.get_domain_spec(domain) else {
        return Vec::new();
    };
    let mut results = Vec::new();
    for variable in &spec.variables {
        let Some(code) = variable.codelist_code.as_deref() else {
            continue;
        };
        let Some(codelist) = ctx.reference.lookup_codelist(code) else {
            continue;
        };
        let invalid: BTreeSet<String> = values_of(&input.frame.data, &variable.name)
            .into_iter()
            .map(|(_, v)| v)
            .filter(|v| !codelist.is_valid(v))
            .collect();
        if invalid.is_empty() {
            continue;
        }
        let severity = if codelist.extensible {
            RuleSeverity::Warning
        } else {
            RuleSeverity::Error
        };
        results.push(def.finding_with_severity(
            severity,
            domain,
            Some(variable.name.as_str()),
            format!(
                "{} value(s) not in {} ({}): {}",
                invalid.len(),
                codelist.code,
                codelist.name,
                invalid.iter().take(5).cloned().collect::<Vec<_>>().join(", ")
            ),
            invalid.len(),
        ));
    }
    results
}

fn check_required_present(
    def: &RuleDef,
    ctx: &RuleContext<'_>,
    input: &DomainInput<'_>,
) -> Vec<RuleResult> {
    let domain = &input.frame.domain_code;
    let Ok(spec) = ctx.reference.get_domain_spec(domain) else {
        return Vec::new();
    };
    spec.required_variables()
        .filter(|v| !has_column(&input.frame.data, &v.name))
        .map(|v| {
            def.finding(
                domain,
                Some(v.name.as_str()),
                format!("{domain}.{} is Required but absent", v.name),
                1,
            )
        })
        .collect()
}

fn check_expected_present(
    def: &RuleDef,
    ctx: &RuleContext<'_>,
    input: &DomainInput<'_>,
) -> Vec<RuleResult> {
    let domain = &input.frame.domain_code;
    let Ok(spec) = ctx.reference.get_domain_spec(domain) else {
        return Vec::new();
    };
    spec.expected_variables()
        .filter(|v| !has_column(&input.frame.data, &v.name))
        .map(|v| {
            def.finding(
                domain,
                Some(v.name.as_str()),
                format!("{domain}.{} is Expected but absent", v.name),
                1,
            )
        })
        .collect()
}

fn check_usubjid_populated(
    def: &RuleDef,
    _ctx: &RuleContext<'_>,
    input: &DomainInput<'_>,
) -> Vec<RuleResult> {
    let domain = &input.frame.domain_code;
    if !has_column(&input.frame.data, "USUBJID") {
        return Vec::new(); // absence is PRES001's finding
    }
    match missing_count(&input.frame.data, "USUBJID") {
        Some(missing) if missing > 0 => vec![def.finding(
            domain,
            Some("USUBJID"),
            format!("{missing} record(s) have a null USUBJID"),
            missing,
        )],
        _ => Vec::new(),
    }
}

fn check_nonempty(
    def: &RuleDef,
    _ctx: &RuleContext<'_>,
    input: &DomainInput<'_>,
) -> Vec<RuleResult> {
    // RELREC is an intentional empty stub.
    if input.frame.data.height() == 0 && input.frame.domain_code != "RELREC" {
        vec![def.finding(
            &input.frame.domain_code,
            None,
            "dataset contains no records".to_string(),
            1,
        )]
    } else {
        Vec::new()
    }
}

fn check_dm_one_row_per_subject(
    def: &RuleDef,
    _ctx: &RuleContext<'_>,
    input: &DomainInput<'_>,
) -> Vec<RuleResult> {
    if input.frame.domain_code != "DM" {
        return Vec::new();
    }
    let mut counts: BTreeMap<String, usize> = BTreeMap::new();
    for (_, subject) in values_of(&input.frame.data, "USUBJID") {
        *counts.entry(subject).or_insert(0) += 1;
    }
    let duplicates: Vec<&String> = counts
        .iter()
        .filter(|(_, count)| **count > 1)
        .map(|(subject, _)| subject)
        .collect();
    if duplicates.is_empty() {
        return Vec::new();
    }
    vec![def.finding(
        "DM",
        Some("USUBJID"),
        format!(
            "{} subject(s) have multiple DM records: {}",
            duplicates.len(),
            duplicates
                .iter()
                .take(5)
                .map(|s| s.as_str())
                .collect::<Vec<_>>()
                .join(", ")
        ),
        duplicates.len(),
    )]
}

fn check_dm_arm_variables(
    def: &RuleDef,
    _ctx: &RuleContext<'_>,
    input: &DomainInput<'_>,
) -> Vec<RuleResult> {
    if input.frame.domain_code != "DM" {
        return Vec::new();
    }
    ["ARM", "ARMCD", "ACTARM", "ACTARMCD"]
        .iter()
        .copied()
        .filter(|name| !has_column(&input.frame.data, name))
        .map(|name| {
            def.finding(
                "DM",
                Some(name),
                format!("DM.{name} is required for submission"),
                1,
            )
        })
        .collect()
}

fn check_dm_actarm_differs(
    def: &RuleDef,
    _ctx: &RuleContext<'_>,
    input: &DomainInput<'_>,
) -> Vec<RuleResult> {
    if input.frame.domain_code != "DM" {
        return Vec::new();
    }
    let arm: BTreeMap<usize, String> = values_of(&input.frame.data, "ARM").into_iter().collect();
    let actarm: BTreeMap<usize, String> =
        values_of(&input.frame.data, "ACTARM").into_iter().collect();
    if arm.is_empty() || actarm.is_empty() {
        return Vec::new();
    }
    let identical = arm.len() == actarm.len()
        && arm
            .iter()
            .all(|(idx, value)| actarm.get(idx) == Some(value));
    if identical {
        // Legitimate when every subject received the planned treatment,
        // hence a warning, not an error.
        vec![def.finding(
            "DM",
            Some("ACTARM"),
            "ACTARM equals ARM for every subject; confirm actual treatment was derived"
                .to_string(),
            arm.len(),
        )]
    } else {
        Vec::new()
    }
}

fn check_name_length(
    def: &RuleDef,
    _ctx: &RuleContext<'_>,
    input: &DomainInput<'_>,
) -> Vec<RuleResult> {
    input
        .frame
        .data
        .get_column_names()
        .iter()
        .filter(|name| name.len() > 8)
        .map(|name| {
            def.finding(
                &input.frame.domain_code,
                Some(name.as_str()),
                format!("variable name {name} exceeds 8 characters"),
                1,
            )
        })
        .collect()
}

fn check_label_length(
    def: &RuleDef,
    _ctx: &RuleContext<'_>,
    input: &DomainInput<'_>,
) -> Vec<RuleResult> {
    let mut results = Vec::new();
    if input.frame.label.len() > 40 {
        results.push(def.finding(
            &input.frame.domain_code,
            None,
            format!("dataset label exceeds 40 characters: {}", input.frame.label),
            1,
        ));
    }
    if let Some(spec) = input.spec {
        for mapping in &spec.variable_mappings {
            if mapping.sdtm_label.len() > 40 {
                results.push(def.finding(
                    &input.frame.domain_code,
                    Some(mapping.sdtm_variable.as_str()),
                    format!("label exceeds 40 characters: {}", mapping.sdtm_label),
                    1,
                ));
            }
        }
    }
    results
}

fn check_value_width(
    def: &RuleDef,
    _ctx: &RuleContext<'_>,
    input: &DomainInput<'_>,
) -> Vec<RuleResult> {
    let mut results = Vec::new();
    for column in input.frame.data.get_columns() {
        let over: usize = crate::util::column_values(column)
            .iter()
            .filter(|(_, v)| v.len() > MAX_CHAR_BYTES)
            .count();
        if over > 0 {
            results.push(def.finding(
                &input.frame.domain_code,
                Some(column.name().as_str()),
                format!("{over} value(s) exceed {MAX_CHAR_BYTES} bytes"),
                over,
            ));
        }
    }
    results
}

fn check_dtc_iso8601(
    def: &RuleDef,
    _ctx: &RuleContext<'_>,
    input: &DomainInput<'_>,
) -> Vec<RuleResult> {
    let mut results = Vec::new();
    for column in input.frame.data.get_columns() {
        if !column.name().to_uppercase().ends_with("DTC") {
            continue;
        }
        let invalid: Vec<String> = crate::util::column_values(column)
            .into_iter()
            .map(|(_, v)| v)
            .filter(|v| !is_valid_iso8601(v))
            .collect();
        if !invalid.is_empty() {
            results.push(def.finding(
                &input.frame.domain_code,
                Some(column.name().as_str()),
                format!(
                    "{} value(s) are not ISO 8601: {}",
                    invalid.len(),
                    invalid.iter().take(3).cloned().collect::<Vec<_>>().join(", ")
                ),
                invalid.len(),
            ));
        }
    }
    results
}

fn check_ascii(
    def: &RuleDef,
    _ctx: &RuleContext<'_>,
    input: &DomainInput<'_>,
) -> Vec<RuleResult> {
    let mut results = Vec::new();
    for column in input.frame.data.get_columns() {
        let non_ascii = crate::util::column_values(column)
            .iter()
            .filter(|(_, v)| !v.is_ascii())
            .count();
        if non_ascii > 0 {
            results.push(def.finding(
                &input.frame.domain_code,
                Some(column.name().as_str()),
                format!("{non_ascii} value(s) contain non-ASCII characters"),
                non_ascii,
            ));
        }
    }
    results
}

fn check_domain_filename(
    def: &RuleDef,
    _ctx: &RuleContext<'_>,
    input: &DomainInput<'_>,
) -> Vec<RuleResult> {
    let code = &input.frame.domain_code;
    let valid = !code.is_empty()
        && code.len() <= 8
        && code.chars().all(|c| c.is_ascii_alphanumeric());
    if valid {
        Vec::new()
    } else {
        vec![def.finding(
            code,
            None,
            format!("domain code {code} cannot serialise to a transport filename"),
            1,
        )]
    }
}

fn check_seq_unique(
    def: &RuleDef,
    _ctx: &RuleContext<'_>,
    input: &DomainInput<'_>,
) -> Vec<RuleResult> {
    let prefix = domain_prefix(&input.frame.domain_code);
    let seq_name = format!("{prefix}SEQ");
    if !has_column(&input.frame.data, &seq_name) {
        return Vec::new();
    }
    let subjects: BTreeMap<usize, String> =
        values_of(&input.frame.data, "USUBJID").into_iter().collect();
    let mut seen: BTreeSet<(String, String)> = BTreeSet::new();
    let mut duplicates = 0usize;
    for (idx, seq) in values_of(&input.frame.data, &seq_name) {
        let subject = subjects.get(&idx).cloned().unwrap_or_default();
        if !seen.insert((subject, seq)) {
            duplicates += 1;
        }
    }
    if duplicates == 0 {
        Vec::new()
    } else {
        vec![def.finding(
            &input.frame.domain_code,
            Some(seq_name.as_str()),
            format!("{duplicates} duplicate sequence number(s) within subject"),
            duplicates,
        )]
    }
}

fn check_column_order(
    def: &RuleDef,
    ctx: &RuleContext<'_>,
    input: &DomainInput<'_>,
) -> Vec<RuleResult> {
    let domain = &input.frame.domain_code;
    let Ok(spec) = ctx.reference.get_domain_spec(domain) else {
        return Vec::new();
    };
    let expected: Vec<&str> = spec
        .variables
        .iter()
        .map(|v| v.name.as_str())
        .filter(|name| has_column(&input.frame.data, name))
        .collect();
    let actual: Vec<String> = input
        .frame
        .data
        .get_column_names()
        .iter()
        .map(|n| n.to_string())
        .collect();
    let ordered = expected
        .iter()
        .zip(actual.iter().filter(|a| expected.contains(&a.as_str())))
        .all(|(e, a)| e.eq_ignore_ascii_case(a));
    if ordered {
        Vec::new()
    } else {
        vec![def.finding(
            domain,
            None,
            "column order differs from the reference specification".to_string(),
            1,
        )]
    }
}

/// CT membership with a fixed severity, regardless of extensibility.
fn strict_ct(
    def: &RuleDef,
    ctx: &RuleContext<'_>,
    input: &DomainInput<'_>,
    variable: &str,
    codelist_code: &str,
) -> Vec<RuleResult> {
    if input.frame.domain_code != "DM" {
        return Vec::new();
    }
    let Some(codelist) = ctx.reference.lookup_codelist(codelist_code) else {
        return Vec::new();
    };
    let invalid: Vec<String> = values_of(&input.frame.data, variable)
        .into_iter()
        .map(|(_, v)| v)
        .filter(|v| !codelist.is_valid(v))
        .collect();
    if invalid.is_empty() {
        return Vec::new();
    }
    vec![def.finding(
        "DM",
        Some(variable),
        format!(
            "{} value(s) not in {codelist_code}: {}",
            invalid.len(),
            invalid.iter().take(5).cloned().collect::<Vec<_>>().join(", ")
        ),
        invalid.len(),
    )]
}

fn check_aerel_populated(
    def: &RuleDef,
    _ctx: &RuleContext<'_>,
    input: &DomainInput<'_>,
) -> Vec<RuleResult> {
    if input.frame.domain_code != "AE" || !has_column(&input.frame.data, "AEREL") {
        return Vec::new();
    }
    match missing_count(&input.frame.data, "AEREL") {
        Some(missing) if missing > 0 => vec![def.finding(
            "AE",
            Some("AEREL"),
            format!("{missing} adverse event(s) have no causality assessment"),
            missing,
        )],
        _ => Vec::new(),
    }
}

fn check_ae_date_order(
    def: &RuleDef,
    _ctx: &RuleContext<'_>,
    input: &DomainInput<'_>,
) -> Vec<RuleResult> {
    if input.frame.domain_code != "AE" {
        return Vec::new();
    }
    let starts: BTreeMap<usize, String> =
        values_of(&input.frame.data, "AESTDTC").into_iter().collect();
    let ends: BTreeMap<usize, String> =
        values_of(&input.frame.data, "AEENDTC").into_iter().collect();
    // Partial dates are skipped: only full-precision pairs compare.
    let out_of_order = starts
        .iter()
        .filter_map(|(idx, start)| ends.get(idx).map(|end| (start, end)))
        .filter(|(start, end)| start.len() >= 10 && end.len() >= 10 && start > end)
        .count();
    if out_of_order == 0 {
        Vec::new()
    } else {
        vec![def.finding(
            "AE",
            Some("AESTDTC"),
            format!("{out_of_order} event(s) start after they end"),
            out_of_order,
        )]
    }
}

fn check_country_alpha3(
    def: &RuleDef,
    _ctx: &RuleContext<'_>,
    input: &DomainInput<'_>,
) -> Vec<RuleResult> {
    if !has_column(&input.frame.data, "COUNTRY") {
        return Vec::new();
    }
    let invalid = values_of(&input.frame.data, "COUNTRY")
        .iter()
        .filter(|(_, v)| v.len() != 3 || !v.chars().all(|c| c.is_ascii_uppercase()))
        .count();
    if invalid == 0 {
        Vec::new()
    } else {
        vec![def.finding(
            &input.frame.domain_code,
            Some("COUNTRY"),
            format!("{invalid} value(s) are not ISO 3166-1 alpha-3 codes"),
            invalid,
        )]
    }
}

fn check_visitnum_numeric(
    def: &RuleDef,
    _ctx: &RuleContext<'_>,
    input: &DomainInput<'_>,
) -> Vec<RuleResult> {
    if !has_column(&input.frame.data, "VISITNUM") {
        return Vec::new();
    }
    let invalid = values_of(&input.frame.data, "VISITNUM")
        .iter()
        .filter(|(_, v)| v.parse::<f64>().is_err())
        .count();
    if invalid == 0 {
        Vec::new()
    } else {
        vec![def.finding(
            &input.frame.domain_code,
            Some("VISITNUM"),
            format!("{invalid} VISITNUM value(s) are not numeric"),
            invalid,
        )]
    }
}

fn check_dy_nonzero(
    def: &RuleDef,
    _ctx: &RuleContext<'_>,
    input: &DomainInput<'_>,
) -> Vec<RuleResult> {
    let mut results = Vec::new();
    for column in input.frame.data.get_columns() {
        if !column.name().to_uppercase().ends_with("DY") {
            continue;
        }
        let zeros = crate::util::column_values(column)
            .iter()
            .filter(|(_, v)| v.parse::<f64>().map(|n| n == 0.0).unwrap_or(false))
            .count();
        if zeros > 0 {
            results.push(def.finding(
                &input.frame.domain_code,
                Some(column.name().as_str()),
                format!("{zeros} study day value(s) are zero; day 0 does not exist"),
                zeros,
            ));
        }
    }
    results
}

fn check_treatment_populated(
    def: &RuleDef,
    _ctx: &RuleContext<'_>,
    input: &DomainInput<'_>,
) -> Vec<RuleResult> {
    let variable = match input.frame.domain_code.as_str() {
        "CM" => "CMTRT",
        "EX" => "EXTRT",
        _ => return Vec::new(),
    };
    match missing_count(&input.frame.data, variable) {
        Some(missing) if missing > 0 => vec![def.finding(
            &input.frame.domain_code,
            Some(variable),
            format!("{missing} record(s) have a null {variable}"),
            missing,
        )],
        _ => Vec::new(),
    }
}

fn check_result_unit_pairing(
    def: &RuleDef,
    _ctx: &RuleContext<'_>,
    input: &DomainInput<'_>,
) -> Vec<RuleResult> {
    let prefix = domain_prefix(&input.frame.domain_code);
    let mut results = Vec::new();
    for (result_name, unit_name) in [
        (format!("{prefix}ORRES"), format!("{prefix}ORRESU")),
        (format!("{prefix}STRESN"), format!("{prefix}STRESU")),
    ] {
        if !has_column(&input.frame.data, &result_name)
            || !has_column(&input.frame.data, &unit_name)
        {
            continue;
        }
        let result_rows: BTreeSet<usize> = values_of(&input.frame.data, &result_name)
            .into_iter()
            .map(|(idx, _)| idx)
            .collect();
        let unit_rows: BTreeSet<usize> = values_of(&input.frame.data, &unit_name)
            .into_iter()
            .map(|(idx, _)| idx)
            .collect();
        let unpaired = result_rows.difference(&unit_rows).count();
        if unpaired > 0 {
            results.push(def.finding(
                &input.frame.domain_code,
                Some(result_name.as_str()),
                format!("{unpaired} result(s) have no unit in {unit_name}"),
                unpaired,
            ));
        }
    }
    results
}

fn check_testcd_test_bijection(
    def: &RuleDef,
    _ctx: &RuleContext<'_>,
    input: &DomainInput<'_>,
) -> Vec<RuleResult> {
    let prefix = domain_prefix(&input.frame.domain_code);
    let code_name = format!("{prefix}TESTCD");
    let test_name = format!("{prefix}TEST");
    if !has_column(&input.frame.data, &code_name) || !has_column(&input.frame.data, &test_name) {
        return Vec::new();
    }
    let codes: BTreeMap<usize, String> =
        values_of(&input.frame.data, &code_name).into_iter().collect();
    let tests: BTreeMap<usize, String> =
        values_of(&input.frame.data, &test_name).into_iter().collect();

    let mut by_code: BTreeMap<&String, BTreeSet<&String>> = BTreeMap::new();
    let mut by_test: BTreeMap<&String, BTreeSet<&String>> = BTreeMap::new();
    for (idx, code) in &codes {
        if let Some(test) = tests.get(idx) {
            by_code.entry(code).or_default().insert(test);
            by_test.entry(test).or_default().insert(code);
        }
    }
    let violations = by_code.values().filter(|tests| tests.len() > 1).count()
        + by_test.values().filter(|codes| codes.len() > 1).count();
    if violations == 0 {
        Vec::new()
    } else {
        vec![def.finding(
            &input.frame.domain_code,
            Some(code_name.as_str()),
            format!("{violations} test code/name pairing violation(s)"),
            violations,
        )]
    }
}

fn check_stresu_consistency(
    def: &RuleDef,
    _ctx: &RuleContext<'_>,
    input: &DomainInput<'_>,
) -> Vec<RuleResult> {
    let prefix = domain_prefix(&input.frame.domain_code);
    let code_name = format!("{prefix}TESTCD");
    let unit_name = format!("{prefix}STRESU");
    if !has_column(&input.frame.data, &code_name) || !has_column(&input.frame.data, &unit_name) {
        return Vec::new();
    }
    let codes: BTreeMap<usize, String> =
        values_of(&input.frame.data, &code_name).into_iter().collect();
    let mut units_per_code: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
    for (idx, unit) in values_of(&input.frame.data, &unit_name) {
        if let Some(code) = codes.get(&idx) {
            units_per_code.entry(code.clone()).or_default().insert(unit);
        }
    }
    let inconsistent: Vec<&String> = units_per_code
        .iter()
        .filter(|(_, units)| units.len() > 1)
        .map(|(code, _)| code)
        .collect();
    if inconsistent.is_empty() {
        Vec::new()
    } else {
        vec![def.finding(
            &input.frame.domain_code,
            Some(unit_name.as_str()),
            format!(
                "standard units vary within test code(s): {}",
                inconsistent
                    .iter()
                    .map(|s| s.as_str())
                    .collect::<Vec<_>>()
                    .join(", ")
            ),
            inconsistent.len(),
        )]
    }
}

fn check_lc_unit_conversion(
    def: &RuleDef,
    _ctx: &RuleContext<'_>,
    input: &DomainInput<'_>,
) -> Vec<RuleResult> {
    if input.frame.domain_code != "LC" {
        return Vec::new();
    }
    match input.frame.lc_unit_conversion_performed {
        Some(false) => vec![def.finding(
            "LC",
            None,
            "LC is a structural LB copy; unit conversion was not performed".to_string(),
            input.frame.data.height().max(1),
        )],
        _ => Vec::new(),
    }
}

fn check_no_population_flags_in_dm(
    def: &RuleDef,
    _ctx: &RuleContext<'_>,
    input: &DomainInput<'_>,
) -> Vec<RuleResult> {
    if input.frame.domain_code != "DM" {
        return Vec::new();
    }
    const POPULATION_FLAGS: &[&str] = &["COMPLFL", "ITTFL", "SAFFL", "PPROTFL", "RANDFL", "ENRLFL"];
    input
        .frame
        .data
        .get_column_names()
        .iter()
        .filter(|name| POPULATION_FLAGS.contains(&name.to_uppercase().as_str()))
        .map(|name| {
            def.finding(
                "DM",
                Some(name.as_str()),
                format!("population flag {name} belongs in ADaM, not DM"),
                1,
            )
        })
        .collect()
}
