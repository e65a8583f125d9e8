//! Command implementations.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use comfy_table::{ContentArrangement, Table};
use polars::prelude::{CsvReadOptions, DataFrame, SerReader};
use tracing::{info, warn};

use astraea_exec::frame::{CsvDatasetWriter, DomainFrame};
use astraea_exec::{CrossDomainContext, ExecutionEngine};
use astraea_learn::{
    CompiledProgram, LearningRetriever, LearningStore, LearningSubstrate, SemanticIndex,
    improvement_report,
};
use astraea_map::{AnthropicTransport, MapDomainRequest, MappingEngine, TransportConfig};
use astraea_model::{DomainMappingSpec, ReviewStatus, RuleSeverity, StudyMetadata, severity_counts};
use astraea_package::{PackageRequest, package_submission};
use astraea_profile::{classify_profiles, profile_dataset};
use astraea_reference::ReferenceStore;
use astraea_review::{ReviewError, ReviewGate, ReviewStore};
use astraea_validate::{DomainInput, ValidationEngine};

use crate::cli::{
    ExecuteArgs, MapDomainArgs, PackageArgs, ParseEcrfArgs, ProfileArgs, ResumeArgs, ReviewArgs,
    ValidateArgs,
};
use crate::input::terminal_input;

/// Read every CSV in a folder into string frames keyed by filename.
fn read_raw_dir(dir: &Path) -> Result<BTreeMap<String, DataFrame>> {
    let mut frames = BTreeMap::new();
    for entry in std::fs::read_dir(dir).with_context(|| format!("read {}", dir.display()))? {
        let path = entry?.path();
        if path.extension().and_then(|e| e.to_str()) != Some("csv") {
            continue;
        }
        let df = CsvReadOptions::default()
            .with_has_header(true)
            .with_infer_schema_length(Some(100))
            .with_ignore_errors(true)
            .try_into_reader_with_file_path(Some(path.clone()))
            .with_context(|| format!("open {}", path.display()))?
            .finish()
            .with_context(|| format!("read {}", path.display()))?;
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or_default()
            .to_string();
        frames.insert(name, df);
    }
    if frames.is_empty() {
        bail!("no CSV files found in {}", dir.display());
    }
    Ok(frames)
}

fn load_spec(path: &Path) -> Result<DomainMappingSpec> {
    let contents =
        std::fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    serde_json::from_str(&contents).with_context(|| format!("parse {}", path.display()))
}

fn save_spec(path: &Path, spec: &DomainMappingSpec) -> Result<()> {
    let json = serde_json::to_string_pretty(spec)?;
    std::fs::write(path, json).with_context(|| format!("write {}", path.display()))
}

fn open_stores(state_dir: &Path) -> Result<(ReviewStore, LearningSubstrate)> {
    std::fs::create_dir_all(state_dir)
        .with_context(|| format!("create {}", state_dir.display()))?;
    let review = ReviewStore::open(state_dir.join("review.db"))?;
    let learn = LearningSubstrate::new(
        LearningStore::open(state_dir.join("learning.db"))?,
        SemanticIndex::open(state_dir.join("semantic.db"))?,
    );
    Ok((review, learn))
}

pub fn profile(args: &ProfileArgs) -> Result<()> {
    let reference = ReferenceStore::load()?;
    let raw = read_raw_dir(&args.study_folder)?;
    let known = reference.domain_codes();

    let mut table = Table::new();
    table
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec!["Dataset", "Rows", "Columns", "EDC cols", "Pre-formatted"]);
    for (name, df) in &raw {
        let profile = profile_dataset(name, df, &BTreeMap::new(), &known);
        let edc = profile
            .variables
            .iter()
            .filter(|v| v.is_edc_system_column)
            .count();
        table.add_row(vec![
            name.clone(),
            profile.row_count.to_string(),
            profile.variables.len().to_string(),
            edc.to_string(),
            if profile.is_sdtm_preformatted { "yes" } else { "no" }.to_string(),
        ]);
    }
    println!("{table}");
    Ok(())
}

pub fn classify(args: &ProfileArgs) -> Result<()> {
    let reference = ReferenceStore::load()?;
    let raw = read_raw_dir(&args.study_folder)?;
    let known = reference.domain_codes();
    let profiles: Vec<_> = raw
        .iter()
        .map(|(name, df)| profile_dataset(name, df, &BTreeMap::new(), &known))
        .collect();
    let plan = classify_profiles(&profiles, &reference);

    let mut table = Table::new();
    table
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec!["Dataset", "Domain", "Score"]);
    for (filename, score) in &plan.assignments {
        table.add_row(vec![
            filename.clone(),
            score.domain.clone(),
            format!("{:.2}", score.score),
        ]);
    }
    for filename in &plan.unclassified {
        table.add_row(vec![filename.clone(), "UNCLASSIFIED".to_string(), "-".to_string()]);
    }
    println!("{table}");

    for (domain, members) in &plan.merge_groups {
        if members.len() > 1 {
            println!("merge candidate for {domain}: {}", members.join(", "));
        }
    }
    Ok(())
}

/// PDF parsing happens outside the core; this command validates the
/// external parser's JSON and shows what the mapping prompt will see.
pub fn parse_ecrf(args: &ParseEcrfArgs) -> Result<()> {
    let contents = std::fs::read_to_string(&args.ecrf)
        .with_context(|| format!("read {}", args.ecrf.display()))?;
    let forms: Vec<astraea_model::EcrfForm> = serde_json::from_str(&contents)
        .with_context(|| format!("parse {}", args.ecrf.display()))?;

    let mut table = Table::new();
    table
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec!["Form", "Fields", "Coded fields"]);
    for form in &forms {
        let coded = form.fields.iter().filter(|f| !f.coded_values.is_empty()).count();
        table.add_row(vec![
            form.form_name.clone(),
            form.fields.len().to_string(),
            coded.to_string(),
        ]);
    }
    println!("{table}");
    Ok(())
}

pub fn map_domain(args: &MapDomainArgs, state_dir: &Path) -> Result<()> {
    let reference = ReferenceStore::load()?;
    // The API key is the only required secret; fail before any work.
    let transport = AnthropicTransport::new(TransportConfig::from_env()?)?;
    let engine = MappingEngine::new(&reference, &transport);

    let raw = read_raw_dir(&args.raw_dir)?;
    let known = reference.domain_codes();
    let profiles: Vec<_> = raw
        .iter()
        .map(|(name, df)| profile_dataset(name, df, &BTreeMap::new(), &known))
        .collect();
    let plan = classify_profiles(&profiles, &reference);
    let domain_upper = args.domain.to_uppercase();
    let (source_profiles, cross_profiles): (Vec<_>, Vec<_>) =
        profiles.iter().cloned().partition(|p| {
            plan.assignments
                .get(&p.filename)
                .map(|s| s.domain == domain_upper)
                .unwrap_or(false)
        });

    let (_, learn) = open_stores(state_dir)?;
    let compiled = CompiledProgram::load_from(state_dir);
    let learned_examples = if args.no_learning {
        None
    } else {
        match compiled.as_ref().and_then(|p| p.section_for(&domain_upper)) {
            Some(section) => Some(section.to_string()),
            None => LearningRetriever::new(&learn.index).examples_section(
                &domain_upper,
                &source_profiles,
                astraea_learn::DEFAULT_MAX_EXAMPLES,
            )?,
        }
    };

    let metadata = StudyMetadata::new(&args.study_id);
    let outcome = engine.map_domain(&MapDomainRequest {
        domain: &domain_upper,
        source_profiles: &source_profiles,
        ecrf_forms: &[],
        study_metadata: &metadata,
        cross_domain_profiles: &cross_profiles,
        learned_examples: learned_examples.as_deref(),
    })?;

    for finding in &outcome.coverage_findings {
        warn!(
            variable = finding.variable.as_deref().unwrap_or("?"),
            "{}", finding.message
        );
    }
    save_spec(&args.output, &outcome.spec)?;
    info!(
        domain = outcome.spec.domain.as_str(),
        mappings = outcome.spec.summary.total,
        high = outcome.spec.summary.high_count,
        out = %args.output.display(),
        "mapping spec written"
    );
    Ok(())
}

pub fn review_domain(args: &ReviewArgs, state_dir: &Path) -> Result<()> {
    let specs: Vec<DomainMappingSpec> = args
        .specs
        .iter()
        .map(|path| load_spec(path))
        .collect::<Result<_>>()?;
    let study_id = specs
        .first()
        .map(|s| s.study_id.clone())
        .context("no specs supplied")?;

    let (store, _) = open_stores(state_dir)?;
    let mut gate = ReviewGate::new(&store, &args.reviewer, terminal_input());
    match gate.review_study(&study_id, &specs) {
        Ok(reviewed) => write_reviewed(&args.output_dir, &reviewed),
        Err(ReviewError::Interrupted { session_id }) => {
            println!("review interrupted; resume with: astraea resume {session_id}");
            Ok(())
        }
        Err(error) => Err(error.into()),
    }
}

pub fn resume(args: &ResumeArgs, state_dir: &Path) -> Result<()> {
    let (store, _) = open_stores(state_dir)?;
    let mut gate = ReviewGate::new(&store, &args.reviewer, terminal_input());
    match gate.resume(args.session_id.as_deref()) {
        Ok(reviewed) => write_reviewed(&args.output_dir, &reviewed),
        Err(ReviewError::Interrupted { session_id }) => {
            println!("review interrupted; resume with: astraea resume {session_id}");
            Ok(())
        }
        Err(error) => Err(error.into()),
    }
}

fn write_reviewed(output_dir: &Path, reviewed: &[DomainMappingSpec]) -> Result<()> {
    std::fs::create_dir_all(output_dir)?;
    for spec in reviewed {
        let path = output_dir.join(format!("{}_reviewed.json", spec.domain.to_lowercase()));
        save_spec(&path, spec)?;
        println!("reviewed spec written: {}", path.display());
    }
    Ok(())
}

pub fn sessions(state_dir: &Path) -> Result<()> {
    let (store, _) = open_stores(state_dir)?;
    let mut table = Table::new();
    table
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec!["Session", "Study", "Status", "Domains", "Cursor", "Updated"]);
    for session in store.list_sessions()? {
        table.add_row(vec![
            session.session_id.clone(),
            session.study_id.clone(),
            session.status.as_str().to_string(),
            session.domains.join(","),
            session.current_domain_index.to_string(),
            session.updated_at.to_rfc3339(),
        ]);
    }
    println!("{table}");
    Ok(())
}

pub fn execute_domain(args: &ExecuteArgs) -> Result<()> {
    let reference = ReferenceStore::load()?;
    let engine = ExecutionEngine::new(&reference);
    let spec = load_spec(&args.spec)?;
    let raw = read_raw_dir(&args.raw_dir)?;

    let cross = match &args.dm {
        Some(dm_path) => {
            let dm = CsvReadOptions::default()
                .with_has_header(true)
                .with_infer_schema_length(Some(100))
                .try_into_reader_with_file_path(Some(dm_path.clone()))?
                .finish()
                .with_context(|| format!("read {}", dm_path.display()))?;
            Some(CrossDomainContext::from_dm(&dm))
        }
        None => {
            if !spec.domain.eq_ignore_ascii_case("DM") {
                warn!("executing a non-DM domain without --dm; study days and epochs stay null");
            }
            None
        }
    };

    std::fs::create_dir_all(&args.output_dir)?;
    let study = StudyMetadata::new(&args.study_id);
    let executed = engine.execute_to_file(
        &spec,
        &raw,
        cross.as_ref(),
        &study,
        &CsvDatasetWriter,
        &args.output_dir,
    )?;
    for warning in &executed.warnings {
        warn!("{warning}");
    }
    println!(
        "executed {}: {} rows, {} columns{}",
        executed.frame.domain_code,
        executed.frame.data.height(),
        executed.frame.data.width(),
        executed
            .supp
            .as_ref()
            .map(|s| format!(" (+{} {} records)", s.data.height(), s.domain_code))
            .unwrap_or_default()
    );
    Ok(())
}

/// Exit code 1 iff any ERROR-severity finding is present.
pub fn validate(args: &ValidateArgs) -> Result<bool> {
    let reference = ReferenceStore::load()?;
    let engine = ValidationEngine::new(&reference);
    let raw = read_raw_dir(&args.dataset_dir)?;

    let frames: Vec<DomainFrame> = raw
        .iter()
        .map(|(name, df)| {
            let code = name
                .rsplit_once('.')
                .map_or(name.as_str(), |(stem, _)| stem)
                .to_uppercase();
            let label = reference
                .get_domain_spec(&code)
                .map(|d| d.label.clone())
                .unwrap_or_else(|_| code.clone());
            DomainFrame::new(code, label, df.clone())
        })
        .collect();
    let domains: BTreeMap<String, DomainInput<'_>> = frames
        .iter()
        .map(|frame| {
            (
                frame.domain_code.clone(),
                DomainInput { frame, spec: None },
            )
        })
        .collect();

    let results = engine.validate_all(
        &domains,
        args.study_id.as_deref().map(|_| args.dataset_dir.as_path()),
        args.study_id.as_deref(),
    );

    let mut table = Table::new();
    table
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec!["Severity", "Rule", "Domain", "Variable", "Count", "Message"]);
    for result in &results {
        table.add_row(vec![
            result.severity.to_string(),
            result.rule_id.clone(),
            result.domain.clone(),
            result.variable.clone().unwrap_or_default(),
            result.affected_count.to_string(),
            result.message.clone(),
        ]);
    }
    println!("{table}");

    let (errors, warnings, notices, informational) = severity_counts(&results);
    println!("{errors} error(s), {warnings} warning(s), {notices} notice(s), {informational} informational");
    Ok(results.iter().any(|r| r.severity == RuleSeverity::Error))
}

pub fn learn_ingest(state_dir: &Path) -> Result<()> {
    let (review_store, learn) = open_stores(state_dir)?;
    let mut ingested = 0usize;
    for session in review_store.list_sessions()? {
        for domain in &session.domains {
            let Some(review) = review_store.load_domain_review(&session.session_id, domain)?
            else {
                continue;
            };
            if review.status != ReviewStatus::Completed {
                continue;
            }
            let stats = learn.ingest_review(&review)?;
            if !stats.skipped {
                ingested += 1;
                astraea_learn::update_template(
                    &learn.store,
                    &review.original_spec,
                    compute_accuracy(&review),
                )?;
            }
        }
    }
    println!("ingested {ingested} completed domain review(s)");
    Ok(())
}

fn compute_accuracy(review: &astraea_model::DomainReview) -> f64 {
    let total = review.original_spec.variable_mappings.len();
    if total == 0 {
        return 0.0;
    }
    let approved = review
        .decisions
        .values()
        .filter(|d| d.status == astraea_model::DecisionStatus::Approved)
        .count();
    approved as f64 / total as f64
}

pub fn learn_stats(state_dir: &Path) -> Result<()> {
    let (_, learn) = open_stores(state_dir)?;
    let metrics = learn.store.all_metrics()?;
    if metrics.is_empty() {
        println!("no review metrics recorded yet");
        return Ok(());
    }

    let mut table = Table::new();
    table
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec!["Domain", "Studies", "First", "Latest", "Delta"]);
    for row in improvement_report(&metrics) {
        table.add_row(vec![
            row.domain,
            row.studies.to_string(),
            format!("{:.0}%", row.first_accuracy * 100.0),
            format!("{:.0}%", row.latest_accuracy * 100.0),
            format!("{:+.0}%", row.delta * 100.0),
        ]);
    }
    println!("{table}");
    Ok(())
}

/// Prompt optimisation itself runs as an external offline job; this
/// command reports on the artifact it produces.
pub fn learn_optimize(state_dir: &Path) -> Result<()> {
    match CompiledProgram::load_from(state_dir) {
        Some(program) => {
            println!(
                "compiled program present ({} domain section(s), compiled by {})",
                program.sections.len(),
                program.compiled_by.as_deref().unwrap_or("unknown")
            );
        }
        None => {
            println!(
                "no compiled program at {}; run the offline optimiser against the learning store \
                 and place {} there",
                state_dir.display(),
                astraea_learn::COMPILED_PROGRAM_FILE
            );
        }
    }
    Ok(())
}

pub fn package(args: &PackageArgs) -> Result<()> {
    let reference = ReferenceStore::load()?;
    let engine = ValidationEngine::new(&reference);
    let raw = read_raw_dir(&args.dataset_dir)?;

    let frames: Vec<DomainFrame> = raw
        .iter()
        .map(|(name, df)| {
            let code = name
                .rsplit_once('.')
                .map_or(name.as_str(), |(stem, _)| stem)
                .to_uppercase();
            let label = reference
                .get_domain_spec(&code)
                .map(|d| d.label.clone())
                .unwrap_or_else(|_| code.clone());
            DomainFrame::new(code, label, df.clone())
        })
        .collect();
    let domains: BTreeMap<String, DomainInput<'_>> = frames
        .iter()
        .map(|frame| {
            (
                frame.domain_code.clone(),
                DomainInput { frame, spec: None },
            )
        })
        .collect();
    let findings = engine.validate_all(&domains, None, None);

    let layout = package_submission(
        &args.output,
        &PackageRequest {
            study_id: &args.study_id,
            frames: &frames,
            specs: &[],
            findings: &findings,
            allow_errors: args.allow_errors,
        },
        &reference,
        &CsvDatasetWriter,
    )?;
    println!("submission assembled under {}", layout.sdtm_dir.display());
    println!("define.xml: {}", layout.define_xml.display());
    println!("cSDRG:      {}", layout.csdrg.display());
    Ok(())
}
