//! CLI argument definitions.

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use clap_verbosity_flag::{Verbosity, WarnLevel};
use colorchoice_clap::Color;

#[derive(Parser)]
#[command(
    name = "astraea",
    version,
    about = "Astraea - Convert raw clinical trial data to CDISC SDTM",
    long_about = "Convert vendor-exported clinical data to regulator-ready SDTM datasets.\n\n\
                  An LLM proposes per-variable mappings, deterministic code validates and\n\
                  executes them, and every mapping passes human review. Approved mappings\n\
                  feed back as few-shot context for later studies."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Adjust log verbosity (-v for debug, -vv for trace, -q for errors only).
    #[command(flatten)]
    pub verbosity: Verbosity<WarnLevel>,

    /// Control ANSI color output (auto, always, never).
    #[command(flatten)]
    pub color: Color,

    /// Log output format.
    #[arg(long = "log-format", value_enum, default_value = "pretty", global = true)]
    pub log_format: LogFormatArg,

    /// Working directory for persisted state (review and learning stores).
    #[arg(long = "state-dir", value_name = "DIR", default_value = ".astraea", global = true)]
    pub state_dir: PathBuf,
}

#[derive(Subcommand)]
pub enum Command {
    /// Profile the raw datasets in a study folder.
    Profile(ProfileArgs),

    /// Score every raw dataset against every SDTM domain.
    Classify(ProfileArgs),

    /// Inspect an extracted eCRF (JSON produced by the external PDF parser).
    ParseEcrf(ParseEcrfArgs),

    /// Propose a mapping spec for one domain (calls the LLM).
    MapDomain(MapDomainArgs),

    /// Review a proposed mapping spec interactively.
    ReviewDomain(ReviewArgs),

    /// Resume the most recent (or a named) interrupted review session.
    Resume(ResumeArgs),

    /// List review sessions.
    Sessions,

    /// Execute a reviewed mapping spec into an SDTM dataset.
    ExecuteDomain(ExecuteArgs),

    /// Validate executed datasets. Exits non-zero on any ERROR finding.
    Validate(ValidateArgs),

    /// Ingest completed reviews into the learning stores.
    LearnIngest,

    /// Show cross-study mapping accuracy.
    LearnStats,

    /// Report on the compiled few-shot program artifact, if present.
    LearnOptimize,

    /// Assemble the eCTD submission package.
    PackageSubmission(PackageArgs),
}

#[derive(Parser)]
pub struct ProfileArgs {
    /// Folder of raw CSV files.
    #[arg(value_name = "STUDY_FOLDER")]
    pub study_folder: PathBuf,
}

#[derive(Parser)]
pub struct ParseEcrfArgs {
    /// eCRF forms JSON from the external PDF parser.
    #[arg(value_name = "ECRF_JSON")]
    pub ecrf: PathBuf,
}

#[derive(Parser)]
pub struct MapDomainArgs {
    /// Target SDTM domain code (e.g. DM, AE).
    #[arg(value_name = "DOMAIN")]
    pub domain: String,

    /// Folder of raw CSV files.
    #[arg(long = "raw", value_name = "DIR")]
    pub raw_dir: PathBuf,

    /// Study identifier.
    #[arg(long = "study-id")]
    pub study_id: String,

    /// Where the proposed spec JSON is written.
    #[arg(long = "out", value_name = "FILE")]
    pub output: PathBuf,

    /// Skip learned-example retrieval even when the corpus has matches.
    #[arg(long = "no-learning")]
    pub no_learning: bool,
}

#[derive(Parser)]
pub struct ReviewArgs {
    /// Proposed spec JSON files, one per domain, in review order.
    #[arg(value_name = "SPEC", required = true)]
    pub specs: Vec<PathBuf>,

    /// Reviewer name recorded on corrections.
    #[arg(long = "reviewer", default_value = "reviewer")]
    pub reviewer: String,

    /// Where reviewed spec JSONs are written.
    #[arg(long = "out-dir", value_name = "DIR", default_value = ".")]
    pub output_dir: PathBuf,
}

#[derive(Parser)]
pub struct ResumeArgs {
    /// Session id; defaults to the most recent in-progress session.
    #[arg(value_name = "SESSION_ID")]
    pub session_id: Option<String>,

    /// Reviewer name recorded on corrections.
    #[arg(long = "reviewer", default_value = "reviewer")]
    pub reviewer: String,

    /// Where reviewed spec JSONs are written.
    #[arg(long = "out-dir", value_name = "DIR", default_value = ".")]
    pub output_dir: PathBuf,
}

#[derive(Parser)]
pub struct ExecuteArgs {
    /// Reviewed spec JSON.
    #[arg(value_name = "SPEC")]
    pub spec: PathBuf,

    /// Folder of raw CSV files.
    #[arg(long = "raw", value_name = "DIR")]
    pub raw_dir: PathBuf,

    /// Study identifier.
    #[arg(long = "study-id")]
    pub study_id: String,

    /// Executed DM dataset (CSV) for the cross-domain context.
    #[arg(long = "dm", value_name = "FILE")]
    pub dm: Option<PathBuf>,

    /// Output directory for executed datasets.
    #[arg(long = "out-dir", value_name = "DIR", default_value = ".")]
    pub output_dir: PathBuf,
}

#[derive(Parser)]
pub struct ValidateArgs {
    /// Folder of executed datasets (CSV).
    #[arg(value_name = "DATASET_DIR")]
    pub dataset_dir: PathBuf,

    /// Study identifier; enables the FDA technical-rejection pre-checks.
    #[arg(long = "study-id")]
    pub study_id: Option<String>,
}

#[derive(Parser)]
pub struct PackageArgs {
    /// Folder of executed datasets (CSV).
    #[arg(value_name = "DATASET_DIR")]
    pub dataset_dir: PathBuf,

    /// Study identifier.
    #[arg(long = "study-id")]
    pub study_id: String,

    /// Root of the eCTD tree to assemble.
    #[arg(long = "out", value_name = "DIR")]
    pub output: PathBuf,

    /// Package even when ERROR-severity findings remain.
    #[arg(long = "allow-errors")]
    pub allow_errors: bool,
}

/// CLI log format choices.
#[derive(Clone, Copy, ValueEnum)]
pub enum LogFormatArg {
    Pretty,
    Compact,
    Json,
}
