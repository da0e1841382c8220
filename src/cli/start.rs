use crate::cli::actions::ingest::IngestAction;
use crate::cli::actions::monitor::MonitorAction;
use crate::cli::{commands, dispatch, telemetry};
use anyhow::Result;

/// Map verbosity count to tracing level
const fn get_verbosity_level(verbose_count: u8) -> Option<tracing::Level> {
    match verbose_count {
        0 => None,
        1 => Some(tracing::Level::INFO),
        2 => Some(tracing::Level::DEBUG),
        _ => Some(tracing::Level::TRACE),
    }
}

/// Parses argv, initializes telemetry, and resolves the `monitor` binary's action.
///
/// # Errors
///
/// Returns an error if telemetry initialization or argument dispatch fails.
pub fn start_monitor() -> Result<MonitorAction> {
    let matches = commands::monitor().get_matches();
    let verbose_count = subcommand_verbosity(&matches);
    telemetry::init("dbfleet-monitor", get_verbosity_level(verbose_count))?;
    dispatch::monitor(&matches)
}

/// Parses argv, initializes telemetry, and resolves the `ingest` binary's action.
///
/// # Errors
///
/// Returns an error if telemetry initialization or argument dispatch fails.
pub fn start_ingest() -> Result<IngestAction> {
    let matches = commands::ingest().get_matches();
    let verbose_count = subcommand_verbosity(&matches);
    telemetry::init("dbfleet-ingest", get_verbosity_level(verbose_count))?;
    dispatch::ingest(&matches)
}

/// `-v` is accepted both on the top-level command and on its subcommands;
/// the subcommand's count wins when present.
fn subcommand_verbosity(matches: &clap::ArgMatches) -> u8 {
    matches
        .subcommand()
        .map(|(_, sub)| sub.get_count("verbose"))
        .unwrap_or_else(|| matches.get_count("verbose"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_verbosity_level_none() {
        assert_eq!(get_verbosity_level(0), None);
    }

    #[test]
    fn test_get_verbosity_level_info() {
        assert_eq!(get_verbosity_level(1), Some(tracing::Level::INFO));
    }

    #[test]
    fn test_get_verbosity_level_trace_saturates() {
        assert_eq!(get_verbosity_level(10), Some(tracing::Level::TRACE));
    }
}
