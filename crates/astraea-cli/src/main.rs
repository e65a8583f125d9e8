//! Astraea CLI entry point.

use clap::Parser;

use astraea_cli::cli::{Cli, Command, LogFormatArg};
use astraea_cli::commands;
use astraea_cli::logging::init_logging;

fn main() {
    let cli = Cli::parse();
    cli.color.write_global();
    let ansi = !matches!(cli.log_format, LogFormatArg::Json);
    init_logging(&cli.verbosity, cli.log_format, ansi);

    let outcome = match &cli.command {
        Command::Profile(args) => commands::profile(args),
        Command::Classify(args) => commands::classify(args),
        Command::ParseEcrf(args) => commands::parse_ecrf(args),
        Command::MapDomain(args) => commands::map_domain(args, &cli.state_dir),
        Command::ReviewDomain(args) => commands::review_domain(args, &cli.state_dir),
        Command::Resume(args) => commands::resume(args, &cli.state_dir),
        Command::Sessions => commands::sessions(&cli.state_dir),
        Command::ExecuteDomain(args) => commands::execute_domain(args),
        Command::Validate(args) => match commands::validate(args) {
            Ok(has_errors) => {
                if has_errors {
                    std::process::exit(1);
                }
                Ok(())
            }
            Err(error) => Err(error),
        },
        Command::LearnIngest => commands::learn_ingest(&cli.state_dir),
        Command::LearnStats => commands::learn_stats(&cli.state_dir),
        Command::LearnOptimize => commands::learn_optimize(&cli.state_dir),
        Command::PackageSubmission(args) => commands::package(args),
    };

    if let Err(error) = outcome {
        eprintln!("error: {error:#}");
        std::process::exit(1);
    }
}
