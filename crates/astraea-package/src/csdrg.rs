//! Clinical Study Data Reviewer's Guide (Markdown).
//!
//! Section 2 is generated from the TS parameters, Section 6 groups
//! ERROR-severity findings by domain, Section 8 justifies every
//! supplemental qualifier variable. The remaining sections carry the
//! conventional cSDRG skeleton for the medical writer to complete.

use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::path::Path;

use anyhow::{Context, Result};

use astraea_exec::context::string_at;
use astraea_exec::frame::DomainFrame;
use astraea_exec::handlers::find_column;
use astraea_model::{DomainMappingSpec, RuleResult, RuleSeverity};

/// Render the cSDRG document.
pub fn render_csdrg(
    study_id: &str,
    ts: Option<&DomainFrame>,
    findings: &[RuleResult],
    specs: &[&DomainMappingSpec],
) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "# Study Data Reviewer's Guide for {study_id}\n");

    let _ = writeln!(out, "## 1. Introduction\n");
    let _ = writeln!(
        out,
        "This guide accompanies the SDTM datasets for study {study_id}. \
         Datasets conform to SDTM-IG v3.4 and were produced by a reviewed, \
         semi-automated mapping pipeline.\n"
    );

    let _ = writeln!(out, "## 2. Protocol Description\n");
    match ts {
        Some(ts) => render_ts_section(&mut out, ts),
        None => {
            let _ = writeln!(out, "Trial summary parameters were not available.\n");
        }
    }

    let _ = writeln!(out, "## 3. Subject Data Description\n");
    let _ = writeln!(
        out,
        "One dataset per SDTM domain; supplemental qualifiers are provided \
         as SUPP-- datasets linked by sequence number.\n"
    );

    let _ = writeln!(out, "## 4. Data Standards and Dictionary Inventory\n");
    let _ = writeln!(
        out,
        "SDTM-IG v3.4; CDISC Controlled Terminology as bundled with the \
         mapping pipeline. MedDRA and WHODrug codes, where present, are \
         carried from source without dictionary validation.\n"
    );

    let _ = writeln!(out, "## 5. Split Datasets\n");
    let _ = writeln!(out, "No datasets were split.\n");

    let _ = writeln!(out, "## 6. Data Conformance Summary\n");
    render_findings_section(&mut out, findings);

    let _ = writeln!(out, "## 7. Sponsor Decisions Related to Conformance\n");
    let _ = writeln!(
        out,
        "Conformance issues retained in the data are listed in Section 6 \
         with their rule identifiers.\n"
    );

    let _ = writeln!(out, "## 8. Non-Standard Variables\n");
    render_suppqual_section(&mut out, specs);

    out
}

/// Render and write the cSDRG to a file.
pub fn write_csdrg(
    path: &Path,
    study_id: &str,
    ts: Option<&DomainFrame>,
    findings: &[RuleResult],
    specs: &[&DomainMappingSpec],
) -> Result<()> {
    let contents = render_csdrg(study_id, ts, findings, specs);
    std::fs::write(path, contents).with_context(|| format!("write {}", path.display()))
}

fn render_ts_section(out: &mut String, ts: &DomainFrame) {
    let parmcd = find_column(&ts.data, "TSPARMCD");
    let parm = find_column(&ts.data, "TSPARM");
    let value = find_column(&ts.data, "TSVAL");
    let (Some(parmcd), Some(parm), Some(value)) = (parmcd, parm, value) else {
        let _ = writeln!(out, "Trial summary parameters were not available.\n");
        return;
    };
    let _ = writeln!(out, "| Parameter | Description | Value |");
    let _ = writeln!(out, "|-----------|-------------|-------|");
    for idx in 0..ts.data.height() {
        let code = string_at(parmcd, idx).unwrap_or_default();
        let description = string_at(parm, idx).unwrap_or_default();
        let val = string_at(value, idx).unwrap_or_default();
        let _ = writeln!(out, "| {code} | {description} | {val} |");
    }
    out.push('\n');
}

fn render_findings_section(out: &mut String, findings: &[RuleResult]) {
    let errors: Vec<&RuleResult> = findings
        .iter()
        .filter(|f| f.severity == RuleSeverity::Error)
        .collect();
    if errors.is_empty() {
        let _ = writeln!(out, "No ERROR-severity findings remain in the datasets.\n");
        return;
    }
    let mut by_domain: BTreeMap<&str, Vec<&RuleResult>> = BTreeMap::new();
    for finding in errors {
        by_domain.entry(finding.domain.as_str()).or_default().push(finding);
    }
    for (domain, findings) in by_domain {
        let _ = writeln!(out, "### {domain}\n");
        let _ = writeln!(out, "| Rule | Variable | Records | Message |");
        let _ = writeln!(out, "|------|----------|---------|---------|");
        for finding in findings {
            let _ = writeln!(
                out,
                "| {} | {} | {} | {} |",
                finding.rule_id,
                finding.variable.as_deref().unwrap_or("-"),
                finding.affected_count,
                finding.message
            );
        }
        out.push('\n');
    }
}

fn render_suppqual_section(out: &mut String, specs: &[&DomainMappingSpec]) {
    let mut any = false;
    for spec in specs {
        for candidate in &spec.suppqual_candidates {
            if !any {
                let _ = writeln!(out, "| QNAM | Parent | Label | Origin | Justification |");
                let _ = writeln!(out, "|------|--------|-------|--------|---------------|");
                any = true;
            }
            let _ = writeln!(
                out,
                "| {} | {} | {} | {} | Collected on the CRF without an SDTM home; carried in SUPP{} from source column {} |",
                candidate.qnam,
                spec.domain,
                candidate.qlabel,
                candidate.qorig.as_str(),
                spec.domain,
                candidate.source_col
            );
        }
    }
    if !any {
        let _ = writeln!(out, "No non-standard variables were carried.");
    }
    out.push('\n');
}
