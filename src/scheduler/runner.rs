//! Instance Runner (C4): binds one adapter to one instance and runs the
//! acquire → collect → evaluate → emit → release sequence, isolating
//! failures at each step.

use crate::adapters;
use crate::model::{EngineKind, Instance, Metrics, Snapshot};
use crate::scheduler::qps_state::QpsState;
use crate::threshold::{self, Rules};
use std::collections::HashMap;
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// A snapshot was written; the instance may or may not be reachable
    /// (`connection_status` on the snapshot tells you which).
    Done,
    /// The snapshot itself could not be written (filesystem failure).
    Failed,
}

pub struct RunReport {
    pub instance_name: String,
    pub outcome: RunOutcome,
    pub snapshot_path: Option<std::path::PathBuf>,
    pub error: Option<String>,
}

/// Runs one tick for `instance`: open, collect, evaluate, write, close.
/// Connection and collection failures are captured into the snapshot's
/// `collection_error` field rather than aborting the tick — only a
/// snapshot-write failure produces [`RunOutcome::Failed`].
pub async fn run_tick(
    instance: &Instance,
    rules: &Rules,
    snapshot_root: &Path,
    qps_state: &QpsState,
) -> RunReport {
    let monitor_time = chrono::Utc::now();

    let mut metrics = collect_metrics(instance).await;
    if instance.kind == EngineKind::Mssql {
        apply_mssql_qps_delta(instance, &mut metrics, qps_state).await;
    }
    let alerts = threshold::evaluate(&instance.name, &metrics, rules);

    let snapshot = Snapshot {
        instance_name: instance.name.clone(),
        timestamp: monitor_time,
        monitor_time,
        stats: metrics,
        alerts,
        thresholds: thresholds_map(rules),
    };

    match crate::snapshot::write(&snapshot, snapshot_root).await {
        Ok(path) => RunReport {
            instance_name: instance.name.clone(),
            outcome: RunOutcome::Done,
            snapshot_path: Some(path),
            error: None,
        },
        Err(e) => RunReport {
            instance_name: instance.name.clone(),
            outcome: RunOutcome::Failed,
            snapshot_path: None,
            error: Some(e.to_string()),
        },
    }
}

/// Opening or collecting from the adapter never propagates as an error from
/// this function: any failure becomes [`Metrics::connection_failed`].
async fn collect_metrics(instance: &Instance) -> Metrics {
    let handle = match adapters::open(instance).await {
        Ok(handle) => handle,
        Err(e) => {
            tracing::warn!(instance = %instance.name, error = %e, "failed to open adapter connection");
            return Metrics::connection_failed(e.to_string());
        }
    };

    let metrics = match adapters::collect(&handle, instance).await {
        Ok(metrics) => metrics,
        Err(e) => {
            tracing::warn!(instance = %instance.name, error = %e, "collection failed");
            Metrics::connection_failed(e.to_string())
        }
    };

    adapters::close(handle).await;
    metrics
}

/// Fills in `metrics.qps.qps` from the cumulative `Batch Requests/sec`
/// sample `adapters::mssql::qps` leaves in `total_queries`, by diffing
/// against the previous tick's sample for this instance. See
/// [`adapters::mssql::qps`]'s doc comment for why a single sample can't
/// yield a rate on its own.
async fn apply_mssql_qps_delta(instance: &Instance, metrics: &mut Metrics, qps_state: &QpsState) {
    let Some(qps) = metrics.qps.as_mut() else {
        return;
    };
    let Some(counter) = qps.total_queries else {
        return;
    };
    qps.qps = qps_state.delta(&instance.name, counter).await;
}

fn thresholds_map(rules: &Rules) -> HashMap<String, f64> {
    HashMap::from([
        ("connection_percent_high".to_string(), rules.connection_percent_high),
        ("qps_high".to_string(), rules.qps_high),
        ("slow_queries_present".to_string(), rules.slow_queries_present as f64),
        ("cache_hit_low".to_string(), rules.cache_hit_low),
        ("tablespace_high".to_string(), rules.tablespace_high),
        ("replication_lag_high".to_string(), rules.replication_lag_high),
    ])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Credentials, EngineKind};
    use secrecy::SecretString;

    fn dead_instance() -> Instance {
        Instance {
            name: "dead".to_string(),
            kind: EngineKind::Postgresql,
            host: "127.0.0.1".to_string(),
            port: 1, // nothing listens here
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
    async fn dead_instance_still_produces_a_snapshot() {
        let dir = tempfile::tempdir().expect("tempdir");
        let report = run_tick(
            &dead_instance(),
            &Rules::default(),
            dir.path(),
            &QpsState::new(),
        )
        .await;

        assert_eq!(report.outcome, RunOutcome::Done);
        let path = report.snapshot_path.expect("snapshot path");
        let contents = tokio::fs::read_to_string(&path).await.expect("read snapshot");
        let snapshot: Snapshot = serde_json::from_str(&contents).expect("valid json");

        assert!(!snapshot.stats.connection_status);
        assert!(snapshot.stats.collection_error.is_some());
        assert!(snapshot.alerts.is_empty());
    }
}
