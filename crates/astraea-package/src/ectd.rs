//! eCTD folder layout assembly.
//!
//! Datasets land in `{root}/m5/datasets/tabulations/sdtm/` with define.xml
//! beside them; the cSDRG sits one level up at `tabulations/`. Packaging
//! refuses to run while ERROR-severity findings stand, unless the caller
//! explicitly allows them.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use tracing::info;

use astraea_exec::frame::{DatasetWriter, DomainFrame};
use astraea_model::{DomainMappingSpec, RuleResult, severity_counts};
use astraea_reference::ReferenceStore;

use crate::csdrg::write_csdrg;
use crate::define_xml::{DefineEntry, DefineXmlOptions, write_define_xml};

/// Where everything landed.
#[derive(Debug)]
pub struct SubmissionLayout {
    pub sdtm_dir: PathBuf,
    pub define_xml: PathBuf,
    pub csdrg: PathBuf,
    pub datasets: Vec<PathBuf>,
}

/// Inputs for one packaging run.
pub struct PackageRequest<'a> {
    pub study_id: &'a str,
    pub frames: &'a [DomainFrame],
    /// Specs for domains that came through the mapping flow.
    pub specs: &'a [&'a DomainMappingSpec],
    pub findings: &'a [RuleResult],
    /// Ship despite ERROR findings. Off by default.
    pub allow_errors: bool,
}

/// Assemble the eCTD tree.
pub fn package_submission(
    root: &Path,
    request: &PackageRequest<'_>,
    reference: &ReferenceStore,
    writer: &dyn DatasetWriter,
) -> Result<SubmissionLayout> {
    let (errors, _, _, _) = severity_counts(request.findings);
    if errors > 0 && !request.allow_errors {
        bail!("{errors} ERROR-severity finding(s) block packaging; resolve them or allow explicitly");
    }

    let tabulations = root.join("m5").join("datasets").join("tabulations");
    let sdtm_dir = tabulations.join("sdtm");
    std::fs::create_dir_all(&sdtm_dir)
        .with_context(|| format!("create {}", sdtm_dir.display()))?;

    let mut datasets = Vec::with_capacity(request.frames.len());
    for frame in request.frames {
        let path = sdtm_dir.join(format!(
            "{}.{}",
            frame.domain_code.to_lowercase(),
            writer.extension()
        ));
        writer.write(frame, &path)?;
        datasets.push(path);
    }

    let define_xml = sdtm_dir.join("define.xml");
    let entries: Vec<DefineEntry<'_>> = request
        .frames
        .iter()
        .map(|frame| DefineEntry {
            frame,
            spec: request
                .specs
                .iter()
                .find(|s| s.domain == frame.domain_code)
                .copied(),
        })
        .collect();
    write_define_xml(
        &define_xml,
        request.study_id,
        &entries,
        reference,
        &DefineXmlOptions::default(),
    )?;

    let csdrg = tabulations.join("csdrg.md");
    let ts = request.frames.iter().find(|f| f.domain_code == "TS");
    write_csdrg(&csdrg, request.study_id, ts, request.findings, request.specs)?;

    info!(
        datasets = datasets.len(),
        root = %root.display(),
        "submission package assembled"
    );
    Ok(SubmissionLayout {
        sdtm_dir,
        define_xml,
        csdrg,
        datasets,
    })
}
