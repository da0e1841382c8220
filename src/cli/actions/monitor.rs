use std::path::PathBuf;
use std::time::Duration;

/// What the `monitor` binary was asked to do, resolved from its CLI args.
#[derive(Debug, Clone)]
pub enum MonitorAction {
    /// Poll every enabled instance once, or repeatedly with `interval`
    /// between passes until a shutdown signal arrives.
    Run {
        registry_path: PathBuf,
        snapshot_root: PathBuf,
        once: bool,
        interval: Duration,
        workers: usize,
        grace_window: Duration,
    },
    /// Open a single connection to `instance` and report whether it
    /// succeeded, without running the full sub-probe sequence (C11).
    TestConnection {
        registry_path: PathBuf,
        instance: String,
    },
}
