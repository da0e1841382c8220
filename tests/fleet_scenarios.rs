//! Integration coverage for the fleet's core tick-to-snapshot scenarios.
//!
//! These build `Metrics` fixtures the way each engine's adapter would
//! populate them, run them through `threshold::evaluate`, and write/read
//! back the resulting `Snapshot` through the real snapshot writer - without
//! a live database connection, which the unit tests inside each module
//! already cover at finer grain.

use chrono::Utc;
use dbfleet::model::{
    CacheHitRate, Metrics, QueryPerSecond, ReplicationState, ReplicationStatus, Snapshot,
    TablespaceUsage,
};
use dbfleet::threshold::{self, Rules};
use std::collections::HashMap;
use tempfile::tempdir;

fn snapshot_for(instance_name: &str, stats: Metrics) -> Snapshot {
    let rules = Rules::default();
    let alerts = threshold::evaluate(instance_name, &stats, &rules);
    Snapshot {
        instance_name: instance_name.to_string(),
        timestamp: Utc::now(),
        monitor_time: Utc::now(),
        stats,
        alerts,
        thresholds: HashMap::new(),
    }
}

#[tokio::test]
async fn healthy_mysql_tick_raises_no_alerts_and_round_trips() {
    let stats = Metrics {
        connection_status: true,
        qps: Some(QueryPerSecond {
            total_queries: Some(120_000),
            uptime_seconds: Some(3600),
            qps: Some(33.3),
        }),
        cache_hit_rate: Some(CacheHitRate {
            rate_percent: Some(99.2),
            hits: Some(99_200),
            misses: Some(800),
        }),
        ..Metrics::default()
    };
    let snapshot = snapshot_for("mysql-primary", stats);
    assert!(snapshot.alerts.is_empty());

    let dir = tempdir().expect("tempdir");
    let path = dbfleet::snapshot::write(&snapshot, dir.path())
        .await
        .expect("write snapshot");
    let read_back: Snapshot =
        serde_json::from_str(&tokio::fs::read_to_string(&path).await.expect("read"))
            .expect("valid json");
    assert_eq!(read_back.instance_name, "mysql-primary");
    assert!(read_back.alerts.is_empty());
}

#[tokio::test]
async fn postgres_cache_hit_below_threshold_raises_a_warning() {
    let stats = Metrics {
        connection_status: true,
        cache_hit_rate: Some(CacheHitRate {
            rate_percent: Some(62.0),
            hits: Some(620),
            misses: Some(380),
        }),
        ..Metrics::default()
    };
    let snapshot = snapshot_for("pg-reporting", stats);
    assert_eq!(snapshot.alerts.len(), 1);
    assert_eq!(snapshot.alerts[0].metric, "cache_hit_rate");
    assert_eq!(snapshot.alerts[0].level, dbfleet::model::AlertLevel::Warning);
}

#[tokio::test]
async fn dead_instance_snapshot_carries_the_connection_error() {
    let stats = Metrics::connection_failed("connection refused");
    let snapshot = snapshot_for("oracle-down", stats);
    assert!(!snapshot.stats.connection_status);
    assert_eq!(
        snapshot.stats.collection_error.as_deref(),
        Some("connection refused")
    );
    assert!(snapshot.alerts.is_empty());

    let dir = tempdir().expect("tempdir");
    let path = dbfleet::snapshot::write(&snapshot, dir.path())
        .await
        .expect("write snapshot");
    assert!(tokio::fs::try_exists(&path).await.unwrap_or(false));
}

#[tokio::test]
async fn oracle_tablespace_usage_above_threshold_raises_a_warning() {
    let stats = Metrics {
        connection_status: true,
        tablespace_usage: vec![TablespaceUsage {
            name: "USERS".to_string(),
            total_mb: Some(10_000.0),
            used_mb: Some(9_100.0),
            free_mb: Some(900.0),
            usage_percent: Some(91.0),
        }],
        ..Metrics::default()
    };
    let snapshot = snapshot_for("oracle-prod", stats);
    assert_eq!(snapshot.alerts.len(), 1);
    assert_eq!(snapshot.alerts[0].metric, "tablespace_usage");
    assert!(snapshot.alerts[0].message.contains("USERS"));
}

#[tokio::test]
async fn broken_mysql_replication_raises_a_critical_alert() {
    let stats = Metrics {
        connection_status: true,
        replication_status: Some(ReplicationStatus {
            status: Some(ReplicationState::Error),
            role: Some("replica".to_string()),
            lag_seconds: None,
            replicas: Vec::new(),
        }),
        ..Metrics::default()
    };
    let snapshot = snapshot_for("mysql-replica-1", stats);
    assert_eq!(snapshot.alerts.len(), 1);
    assert_eq!(snapshot.alerts[0].level, dbfleet::model::AlertLevel::Critical);
    assert_eq!(snapshot.alerts[0].metric, "replication_status");
}
