use crate::cli::actions::ingest::IngestAction;
use crate::cli::actions::monitor::MonitorAction;
use anyhow::{Context, Result};
use std::path::PathBuf;
use std::time::Duration;

/// Resolves the `monitor` binary's parsed args into a [`MonitorAction`].
/// Mirrors `scheduler.py`'s `argparse` dispatch: a bare invocation runs the
/// scheduler, `test-connection` probes one instance and exits.
pub fn monitor(matches: &clap::ArgMatches) -> Result<MonitorAction> {
    match matches.subcommand() {
        Some(("test-connection", sub)) => Ok(MonitorAction::TestConnection {
            registry_path: PathBuf::from(sub.get_one::<String>("config").context("missing --config")?),
            instance: sub
                .get_one::<String>("instance")
                .context("missing --instance")?
                .clone(),
        }),
        Some(("run", sub)) | None => {
            let sub = sub.unwrap_or(matches);
            Ok(MonitorAction::Run {
                registry_path: PathBuf::from(sub.get_one::<String>("config").context("missing --config")?),
                snapshot_root: PathBuf::from(
                    sub.get_one::<String>("snapshot-root")
                        .context("missing --snapshot-root")?,
                ),
                once: sub.get_flag("once"),
                interval: Duration::from_secs(*sub.get_one::<u64>("interval").unwrap_or(&60)),
                workers: *sub.get_one::<usize>("max-workers").unwrap_or(&10),
                grace_window: Duration::from_secs(*sub.get_one::<u64>("grace-window").unwrap_or(&10)),
            })
        }
        Some((other, _)) => anyhow::bail!("unknown monitor subcommand '{other}'"),
    }
}

/// Resolves the `ingest` binary's parsed args into an [`IngestAction`].
pub fn ingest(matches: &clap::ArgMatches) -> Result<IngestAction> {
    match matches.subcommand() {
        Some(("run", sub)) | None => {
            let sub = sub.unwrap_or(matches);
            Ok(IngestAction::Run {
                config_path: PathBuf::from(sub.get_one::<String>("config").context("missing --config")?),
                once: sub.get_flag("once"),
            })
        }
        Some((other, _)) => anyhow::bail!("unknown ingest subcommand '{other}'"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::commands;

    #[test]
    fn defaults_to_run_when_no_subcommand_given() {
        let matches = commands::monitor().get_matches_from(vec!["monitor"]);
        let action = monitor(&matches).expect("dispatch");
        assert!(matches!(action, MonitorAction::Run { once: false, .. }));
    }

    #[test]
    fn test_connection_resolves_the_instance_name() {
        let matches = commands::monitor().get_matches_from(vec![
            "monitor",
            "test-connection",
            "--instance",
            "db1",
        ]);
        let action = monitor(&matches).expect("dispatch");
        match action {
            MonitorAction::TestConnection { instance, .. } => assert_eq!(instance, "db1"),
            MonitorAction::Run { .. } => panic!("expected TestConnection"),
        }
    }

    #[test]
    fn ingest_once_flag_is_threaded_through() {
        let matches = commands::ingest().get_matches_from(vec!["ingest", "run", "--once"]);
        let action = ingest(&matches).expect("dispatch");
        let IngestAction::Run { once, .. } = action;
        assert!(once);
    }
}
