//! Logging bootstrap over `tracing-subscriber`.

use clap_verbosity_flag::{Verbosity, WarnLevel};
use tracing_subscriber::EnvFilter;

use crate::cli::LogFormatArg;

/// Initialise the global subscriber from CLI flags.
///
/// `RUST_LOG` overrides the verbosity flags when set.
pub fn init_logging(verbosity: &Verbosity<WarnLevel>, format: LogFormatArg, ansi: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(
            verbosity
                .tracing_level()
                .map(|level| level.to_string())
                .unwrap_or_else(|| "off".to_string()),
        )
    });

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_ansi(ansi);
    match format {
        LogFormatArg::Pretty => builder.init(),
        LogFormatArg::Compact => builder.compact().init(),
        LogFormatArg::Json => builder.json().init(),
    }
}
