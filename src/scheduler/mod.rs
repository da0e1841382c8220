//! Scheduler (C5): parallel dispatch of Instance Runners across the
//! registry's enabled instances, bounded worker pool, one-shot/continuous
//! modes, cooperative cancellation with a grace window. Grounded in
//! `original_source/database/scheduler/scheduler.py`'s
//! `run_all_monitors`/`run_scheduler` (`ThreadPoolExecutor(max_workers=min(10,
//! len(enabled_instances)))`, timed execution, `KeyboardInterrupt` handling).

pub mod qps_state;
pub mod runner;
pub mod shutdown;

use crate::config::InstanceRegistry;
use crate::threshold::Rules;
use qps_state::QpsState;
use shutdown::CancelToken;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub struct SchedulerConfig {
    pub snapshot_root: PathBuf,
    pub max_workers: usize,
    pub rules: Rules,
    pub grace_window: Duration,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            snapshot_root: PathBuf::from("./monitor"),
            max_workers: 10,
            rules: Rules::default(),
            grace_window: Duration::from_secs(10),
        }
    }
}

pub struct RunReport {
    pub ticks: Vec<runner::RunReport>,
}

impl RunReport {
    #[must_use]
    pub fn failed_count(&self) -> usize {
        self.ticks
            .iter()
            .filter(|t| t.outcome == runner::RunOutcome::Failed)
            .count()
    }
}

/// Runs exactly one tick over every enabled instance, bounded to
/// `min(config.max_workers, enabled_instances.len())` concurrent runners.
/// Instance ordering does not affect the resulting set of snapshot files (P6).
///
/// `qps_state` carries the previous tick's SQL Server counter samples; pass
/// the same instance across repeated calls (as [`run_continuous`] does) so
/// the delta in [`adapters::mssql::qps`] has something to diff against. A
/// fresh [`QpsState`] is fine for a single one-shot call — MSSQL QPS simply
/// comes back `None` on that first observed tick.
pub async fn run_once(registry: &InstanceRegistry, config: &SchedulerConfig, qps_state: &QpsState) -> RunReport {
    let instances = registry.enabled_instances();
    let worker_count = config.max_workers.min(instances.len().max(1));

    let semaphore = std::sync::Arc::new(tokio::sync::Semaphore::new(worker_count));
    let mut handles = Vec::with_capacity(instances.len());

    for instance in instances {
        let instance = instance.clone();
        let rules = config.rules.clone();
        let root = config.snapshot_root.clone();
        let semaphore = std::sync::Arc::clone(&semaphore);
        let qps_state = qps_state.clone();

        handles.push(tokio::spawn(async move {
            let _permit = semaphore.acquire().await;
            runner::run_tick(&instance, &rules, &root, &qps_state).await
        }));
    }

    let mut ticks = Vec::with_capacity(handles.len());
    for handle in handles {
        match handle.await {
            Ok(report) => ticks.push(report),
            Err(e) => tracing::error!(error = %e, "instance runner task panicked"),
        }
    }

    RunReport { ticks }
}

/// Runs `run_once` repeatedly with `interval` between ticks, until
/// `token` is cancelled. In-flight work is given `config.grace_window` to
/// finish before this function returns.
pub async fn run_continuous(
    registry: &InstanceRegistry,
    config: &SchedulerConfig,
    interval: Duration,
    token: &CancelToken,
) {
    let qps_state = QpsState::new();

    loop {
        let tick = shutdown::with_grace_window(
            token,
            config.grace_window,
            run_once(registry, config, &qps_state),
        )
        .await;

        if let Some(report) = tick {
            tracing::info!(
                instances = report.ticks.len(),
                failed = report.failed_count(),
                "scheduler tick complete"
            );
        }

        if token.is_cancelled() {
            return;
        }

        tokio::select! {
            () = tokio::time::sleep(interval) => {},
            () = token.cancelled() => return,
        }
    }
}

#[must_use]
pub fn default_snapshot_root() -> PathBuf {
    Path::new("./monitor").to_path_buf()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Credentials, EngineKind, Instance};
    use secrecy::SecretString;

    fn dead_instance(name: &str) -> Instance {
        Instance {
            name: name.to_string(),
            kind: EngineKind::Postgresql,
            host: "127.0.0.1".to_string(),
            port: 1,
            credentials: Credentials {
                user: "x".to_string(),
                password: SecretString::from("x".to_string()),
            },
            database: "x".to_string(),
            sid: None,
            enabled: true,
        }
    }

    #[tokio::test]
    async fn run_once_produces_one_snapshot_per_enabled_instance() {
        let dir = tempfile::tempdir().expect("tempdir");
        let registry = InstanceRegistry {
            concurrent_execution: true,
            instances: vec![dead_instance("a"), dead_instance("b")],
        };
        let config = SchedulerConfig {
            snapshot_root: dir.path().to_path_buf(),
            max_workers: 2,
            ..SchedulerConfig::default()
        };

        let report = run_once(&registry, &config, &QpsState::new()).await;
        assert_eq!(report.ticks.len(), 2);
    }

    #[tokio::test]
    async fn disabled_instances_are_skipped() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut disabled = dead_instance("c");
        disabled.enabled = false;
        let registry = InstanceRegistry {
            concurrent_execution: true,
            instances: vec![disabled],
        };
        let config = SchedulerConfig {
            snapshot_root: dir.path().to_path_buf(),
            ..SchedulerConfig::default()
        };

        let report = run_once(&registry, &config, &QpsState::new()).await;
        assert!(report.ticks.is_empty());
    }
}
