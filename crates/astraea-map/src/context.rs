//! Mapping prompt assembly.
//!
//! One prompt per domain, built from the domain spec, the filtered source
//! profiles, the eCRF, the codelists the domain's variables bind to,
//! cross-domain column summaries, study metadata, and (when the learning
//! substrate has something to offer) retrieved examples. Sections render
//! in a fixed order and only when they have content; total size stays
//! bounded because codelists are truncated and cross-domain sections show
//! names and labels only.

use std::fmt::Write as _;

use astraea_model::{Codelist, DatasetProfile, EcrfForm, ReferenceDomain, StudyMetadata};

/// How many terms of a large codelist the prompt shows.
const CODELIST_TERM_LIMIT: usize = 20;

/// Inputs for one domain prompt.
pub struct PromptInputs<'a> {
    pub domain: &'a str,
    pub domain_spec: &'a ReferenceDomain,
    pub source_profiles: &'a [DatasetProfile],
    pub ecrf_forms: &'a [EcrfForm],
    pub codelists: &'a [&'a Codelist],
    pub study_metadata: &'a StudyMetadata,
    pub cross_domain_profiles: &'a [DatasetProfile],
    pub learned_examples: Option<&'a str>,
}

/// Assemble the domain prompt.
pub fn build_prompt(inputs: &PromptInputs<'_>) -> String {
    let mut out = String::new();

    render_domain_spec(&mut out, inputs.domain_spec);
    render_source_data(&mut out, inputs.source_profiles);
    render_ecrf(&mut out, inputs.ecrf_forms);
    render_codelists(&mut out, inputs.codelists);
    render_cross_domain(&mut out, inputs.cross_domain_profiles);
    render_study_metadata(&mut out, inputs.study_metadata);
    if let Some(examples) = inputs.learned_examples {
        let _ = writeln!(out, "## Learned examples from prior studies\n");
        out.push_str(examples);
        out.push('\n');
    }
    if inputs.domain.eq_ignore_ascii_case("DM") {
        render_dm_arm_addendum(&mut out);
    }

    out
}

fn render_domain_spec(out: &mut String, spec: &ReferenceDomain) {
    let _ = writeln!(
        out,
        "## Target domain: {} - {} ({})\n\nStructure: {}\n",
        spec.code, spec.label, spec.class, spec.structure_note
    );
    for (heading, core) in [
        ("Required variables", astraea_model::CoreDesignation::Required),
        ("Expected variables", astraea_model::CoreDesignation::Expected),
        ("Permissible variables", astraea_model::CoreDesignation::Permissible),
    ] {
        let group: Vec<_> = spec.variables.iter().filter(|v| v.core == core).collect();
        if group.is_empty() {
            continue;
        }
        let _ = writeln!(out, "### {heading}");
        for variable in group {
            let codelist = variable
                .codelist_code
                .as_deref()
                .map(|code| format!(" [codelist {code}]"))
                .unwrap_or_default();
            let _ = writeln!(
                out,
                "- {} ({}): {}{}",
                variable.name, variable.data_type, variable.label, codelist
            );
        }
        out.push('\n');
    }
}

fn render_source_data(out: &mut String, profiles: &[DatasetProfile]) {
    if profiles.is_empty() {
        return;
    }
    let _ = writeln!(out, "## Source data\n");
    for profile in profiles {
        let _ = writeln!(
            out,
            "### {} ({} rows)",
            profile.filename, profile.row_count
        );
        for variable in profile.clinical_variables() {
            let label = variable.label.as_deref().unwrap_or("");
            let samples = variable.sample_values.join(", ");
            let _ = writeln!(
                out,
                "- {} \"{}\" [{}] unique={} missing={} samples: {}",
                variable.name, label, variable.dtype, variable.n_unique, variable.n_missing,
                samples
            );
        }
        out.push('\n');
    }
}

fn render_ecrf(out: &mut String, forms: &[EcrfForm]) {
    if forms.is_empty() {
        return;
    }
    let _ = writeln!(out, "## eCRF forms\n");
    for form in forms {
        let _ = writeln!(out, "### {}", form.form_name);
        for field in &form.fields {
            let _ = write!(out, "- {} [{}] {}", field.name, field.data_type, field.label);
            if !field.coded_values.is_empty() {
                let coded: Vec<String> = field
                    .coded_values
                    .iter()
                    .map(|(code, decode)| format!("{code}={decode}"))
                    .collect();
                let _ = write!(out, " ({})", coded.join(", "));
            }
            out.push('\n');
        }
        out.push('\n');
    }
}

fn render_codelists(out: &mut String, codelists: &[&Codelist]) {
    if codelists.is_empty() {
        return;
    }
    let _ = writeln!(out, "## Controlled terminology\n");
    for codelist in codelists {
        let extensible = if codelist.extensible {
            "extensible"
        } else {
            "non-extensible"
        };
        let _ = writeln!(
            out,
            "### {} - {} ({extensible})",
            codelist.code, codelist.name
        );
        let values = codelist.submission_values();
        let shown = &values[..values.len().min(CODELIST_TERM_LIMIT)];
        let _ = writeln!(out, "{}", shown.join("; "));
        if values.len() > CODELIST_TERM_LIMIT {
            let _ = writeln!(out, "... ({} terms total)", values.len());
        }
        out.push('\n');
    }
}

fn render_cross_domain(out: &mut String, profiles: &[DatasetProfile]) {
    if profiles.is_empty() {
        return;
    }
    let _ = writeln!(out, "## Cross-domain sources (names and labels only)\n");
    for profile in profiles {
        let _ = writeln!(out, "### {}", profile.filename);
        for variable in profile.clinical_variables() {
            let label = variable.label.as_deref().unwrap_or("");
            let _ = writeln!(out, "- {} \"{}\"", variable.name, label);
        }
        out.push('\n');
    }
}

fn render_study_metadata(out: &mut String, metadata: &StudyMetadata) {
    let _ = writeln!(out, "## Study metadata\n");
    let _ = writeln!(out, "- STUDYID: {}", metadata.study_id);
    if let Some(site_col) = &metadata.site_col {
        let _ = writeln!(out, "- Site column: {site_col}");
    }
    if let Some(subject_col) = &metadata.subject_col {
        let _ = writeln!(out, "- Subject column: {subject_col}");
    }
    if let Some(sponsor) = &metadata.sponsor {
        let _ = writeln!(out, "- Sponsor: {sponsor}");
    }
    if let Some(indication) = &metadata.indication {
        let _ = writeln!(out, "- Indication: {indication}");
    }
    for (key, value) in &metadata.conventions {
        let _ = writeln!(out, "- {key}: {value}");
    }
    out.push('\n');
}

fn render_dm_arm_addendum(out: &mut String) {
    out.push_str(
        "## DM arm variables (mandatory)\n\n\
         ARM, ARMCD, ACTARM, and ACTARMCD are required in DM. ACTARM must be \
         derived independently from the actual treatment received; do NOT copy \
         ARM into ACTARM. Submissions with fabricated actual-arm values face \
         regulatory rejection. If the actual arm is not collected, map ACTARM \
         from randomization plus exposure records and say so in the rationale.\n\n",
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use astraea_reference::ReferenceStore;

    fn metadata() -> StudyMetadata {
        StudyMetadata::new("PHA001")
    }

    #[test]
    fn dm_prompt_carries_arm_addendum() {
        let store = ReferenceStore::load().unwrap();
        let spec = store.get_domain_spec("DM").unwrap();
        let inputs = PromptInputs {
            domain: "DM",
            domain_spec: spec,
            source_profiles: &[],
            ecrf_forms: &[],
            codelists: &[],
            study_metadata: &metadata(),
            cross_domain_profiles: &[],
            learned_examples: None,
        };
        let prompt = build_prompt(&inputs);
        assert!(prompt.contains("ACTARM must be"));
        assert!(prompt.contains("Required variables"));
    }

    #[test]
    fn non_dm_prompt_has_no_addendum_or_empty_sections() {
        let store = ReferenceStore::load().unwrap();
        let spec = store.get_domain_spec("AE").unwrap();
        let inputs = PromptInputs {
            domain: "AE",
            domain_spec: spec,
            source_profiles: &[],
            ecrf_forms: &[],
            codelists: &[],
            study_metadata: &metadata(),
            cross_domain_profiles: &[],
            learned_examples: None,
        };
        let prompt = build_prompt(&inputs);
        assert!(!prompt.contains("ACTARM must be"));
        assert!(!prompt.contains("## Source data"));
        assert!(!prompt.contains("## eCRF"));
    }

    #[test]
    fn large_codelists_truncate() {
        let store = ReferenceStore::load().unwrap();
        let spec = store.get_domain_spec("TS").unwrap();
        let ts_codelist = store.lookup_codelist("C66738").unwrap();
        let codelists = [ts_codelist];
        let inputs = PromptInputs {
            domain: "TS",
            domain_spec: spec,
            source_profiles: &[],
            ecrf_forms: &[],
            codelists: &codelists,
            study_metadata: &metadata(),
            cross_domain_profiles: &[],
            learned_examples: None,
        };
        let prompt = build_prompt(&inputs);
        assert!(prompt.contains("terms total"));
    }
}
