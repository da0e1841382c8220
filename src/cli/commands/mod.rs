use clap::{
    Arg, ArgAction, ColorChoice, Command,
    builder::styling::{AnsiColor, Effects, Styles},
};

fn styles() -> Styles {
    Styles::styled()
        .header(AnsiColor::Yellow.on_default() | Effects::BOLD)
        .usage(AnsiColor::Green.on_default() | Effects::BOLD)
        .literal(AnsiColor::Blue.on_default() | Effects::BOLD)
        .placeholder(AnsiColor::Green.on_default())
}

fn verbose_arg() -> Arg {
    Arg::new("verbose")
        .short('v')
        .long("verbose")
        .help("Increase verbosity, -vv for debug, -vvv for trace")
        .action(ArgAction::Count)
}

/// Builds the `monitor` binary's CLI: a default `run` subcommand and a
/// `test-connection` subcommand (C11), grounded in
/// `scheduler.py`'s `argparse` setup (`--config`, `--interval`,
/// `--max-workers`, `--once`).
pub fn monitor() -> Command {
    let run = Command::new("run")
        .about("Poll every enabled instance and write snapshot files")
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .help("Path to the instance registry JSON")
                .default_value("./config.json")
                .env("MONITOR_CONFIG")
                .value_name("PATH"),
        )
        .arg(
            Arg::new("snapshot-root")
                .long("snapshot-root")
                .help("Root directory for date-partitioned snapshot files")
                .default_value("./monitor")
                .env("MONITOR_SNAPSHOT_ROOT")
                .value_name("DIR"),
        )
        .arg(
            Arg::new("once")
                .long("once")
                .help("Run a single tick and exit instead of polling continuously")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("interval")
                .long("interval")
                .help("Seconds between polling passes in continuous mode")
                .default_value("60")
                .env("MONITOR_INTERVAL")
                .value_parser(clap::value_parser!(u64)),
        )
        .arg(
            Arg::new("max-workers")
                .long("max-workers")
                .help("Maximum number of instances polled concurrently")
                .default_value("10")
                .env("MONITOR_MAX_WORKERS")
                .value_parser(clap::value_parser!(usize)),
        )
        .arg(
            Arg::new("grace-window")
                .long("grace-window")
                .help("Seconds of in-flight work allowed to finish after a shutdown signal")
                .default_value("10")
                .value_parser(clap::value_parser!(u64)),
        )
        .arg(verbose_arg());

    let test_connection = Command::new("test-connection")
        .about("Open a connection to one configured instance and report the result")
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .default_value("./config.json")
                .env("MONITOR_CONFIG")
                .value_name("PATH"),
        )
        .arg(
            Arg::new("instance")
                .long("instance")
                .help("Name of the instance to test, as it appears in the registry")
                .required(true)
                .value_name("NAME"),
        )
        .arg(verbose_arg());

    Command::new("monitor")
        .about("Multi-engine database fleet health monitor")
        .version(env!("CARGO_PKG_VERSION"))
        .color(ColorChoice::Auto)
        .styles(styles())
        .subcommand_required(false)
        .arg(verbose_arg())
        .subcommand(run)
        .subcommand(test_connection)
}

/// Builds the `ingest` binary's CLI, grounded in
/// `monitor_to_db.py::main()`'s `argparse` setup (`--config`, `--once`).
pub fn ingest() -> Command {
    let run = Command::new("run")
        .about("Ingest processed snapshot files into the configured sink")
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .help("Path to the ingestion sink config JSON")
                .default_value("./monitor_to_db_config.json")
                .env("INGEST_CONFIG")
                .value_name("PATH"),
        )
        .arg(
            Arg::new("once")
                .long("once")
                .help("Run a single pass and exit instead of polling continuously")
                .action(ArgAction::SetTrue),
        )
        .arg(verbose_arg());

    Command::new("ingest")
        .about("Ingests database fleet monitor snapshots into a relational/document sink")
        .version(env!("CARGO_PKG_VERSION"))
        .color(ColorChoice::Auto)
        .styles(styles())
        .subcommand_required(false)
        .arg(verbose_arg())
        .subcommand(run)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn monitor_run_defaults() {
        let matches = monitor().get_matches_from(vec!["monitor", "run"]);
        let run = matches.subcommand_matches("run").expect("run subcommand");

        assert_eq!(
            run.get_one::<String>("config").map(String::as_str),
            Some("./config.json")
        );
        assert_eq!(run.get_one::<u64>("interval").copied(), Some(60));
        assert_eq!(run.get_one::<usize>("max-workers").copied(), Some(10));
        assert!(!run.get_flag("once"));
    }

    #[test]
    fn monitor_test_connection_requires_instance() {
        let command = monitor();
        let result = command.try_get_matches_from(vec!["monitor", "test-connection"]);
        assert!(result.is_err());
    }

    #[test]
    fn ingest_run_defaults() {
        let matches = ingest().get_matches_from(vec!["ingest", "run"]);
        let run = matches.subcommand_matches("run").expect("run subcommand");

        assert_eq!(
            run.get_one::<String>("config").map(String::as_str),
            Some("./monitor_to_db_config.json")
        );
        assert!(!run.get_flag("once"));
    }
}
