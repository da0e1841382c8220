//! Ingestion pipeline (C6/C7): reads date-partitioned snapshot files the
//! monitor hasn't ingested yet, projects them into sink records, and writes
//! them to the configured relational/document sink in batches. Grounded in
//! `original_source/database/scheduler/monitor_to_db.py::main()`.

pub mod discovery;
pub mod ledger;
pub mod record;
pub mod sink;

use crate::config::IngestionConfig;
use crate::scheduler::shutdown::CancelToken;
use anyhow::{Context, Result};
use ledger::ProcessedLedger;
use record::IngestRecord;
use std::time::Duration;

/// The outcome of a single ingestion pass.
#[derive(Debug, Default)]
pub struct PassReport {
    pub discovered: usize,
    pub parsed: usize,
    pub written: usize,
    pub parse_failures: usize,
}

/// Runs one ledger-load → discover → parse → write → ledger-update pass.
pub async fn run_once(config: &IngestionConfig) -> Result<PassReport> {
    let mut ledger = ProcessedLedger::load(&config.monitor_root, config.lookback_days)
        .await
        .context("failed to load processed-file ledger")?;

    let candidates = discovery::discover(&config.monitor_root, &ledger, config.batch_size)
        .await
        .context("failed to discover candidate snapshot files")?;

    let mut report = PassReport {
        discovered: candidates.len(),
        ..PassReport::default()
    };

    if candidates.is_empty() {
        return Ok(report);
    }

    let parsed: Vec<_> = futures::future::join_all(candidates.iter().map(|path| parse_one(path))).await;

    let mut records = Vec::with_capacity(parsed.len());
    let mut newly_processed = Vec::with_capacity(parsed.len());
    for (path, result) in candidates.into_iter().zip(parsed) {
        match result {
            Ok(record) => {
                records.push(record);
                newly_processed.push(path);
            }
            Err(e) => {
                report.parse_failures += 1;
                tracing::warn!(path = %path.display(), error = %e, "failed to parse snapshot file");
            }
        }
    }
    report.parsed = records.len();

    report.written = sink::write_batch(config, &records)
        .await
        .context("failed to write ingestion batch to sink")?;

    for path in newly_processed {
        ledger.insert(path);
    }
    ledger
        .save(&config.monitor_root, config.retention_days)
        .await
        .context("failed to persist processed-file ledger")?;

    Ok(report)
}

async fn parse_one(path: &std::path::Path) -> Result<IngestRecord> {
    let body = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("failed to read {}", path.display()))?;
    let snapshot = serde_json::from_str(&body)
        .with_context(|| format!("failed to parse {}", path.display()))?;
    Ok(IngestRecord::from_snapshot(&snapshot))
}

/// Runs passes in a loop until `token` is cancelled, sleeping
/// `config.poll_interval_seconds` between passes. Unlike one-shot mode, the
/// ledger is already persisted at the end of every pass with new entries by
/// [`run_once`] itself, so a cancellation mid-sleep loses nothing already
/// ingested.
pub async fn run_continuous(config: &IngestionConfig, token: &CancelToken) {
    loop {
        match run_once(config).await {
            Ok(report) if report.discovered > 0 => {
                tracing::info!(
                    discovered = report.discovered,
                    written = report.written,
                    failures = report.parse_failures,
                    "ingestion pass complete"
                );
            }
            Ok(_) => {}
            Err(e) => tracing::error!(error = %e, "ingestion pass failed"),
        }

        if token.is_cancelled() {
            return;
        }

        tokio::select! {
            () = tokio::time::sleep(Duration::from_secs(config.poll_interval_seconds)) => {},
            () = token.cancelled() => return,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Alert, AlertLevel, Metrics, Snapshot};
    use crate::threshold::Rules;
    use secrecy::SecretString;
    use std::collections::HashMap;

    fn test_config(monitor_root: std::path::PathBuf) -> IngestionConfig {
        IngestionConfig {
            db_type: crate::model::EngineKind::Postgresql,
            host: "127.0.0.1".to_string(),
            port: 1,
            user: "x".to_string(),
            password: SecretString::from("x".to_string()),
            database: "x".to_string(),
            sid: None,
            rules: Rules::default(),
            monitor_root,
            batch_size: 100,
            lookback_days: 3,
            retention_days: 30,
            poll_interval_seconds: 1,
        }
    }

    async fn write_snapshot(root: &std::path::Path, date: &str, name: &str, alerts: Vec<Alert>) {
        let dir = root.join(date);
        tokio::fs::create_dir_all(&dir).await.expect("mkdir");
        let snapshot = Snapshot {
            instance_name: name.to_string(),
            timestamp: chrono::Utc::now(),
            monitor_time: chrono::Utc::now(),
            stats: Metrics::default(),
            alerts,
            thresholds: HashMap::new(),
        };
        let body = serde_json::to_string(&snapshot).expect("serialize");
        tokio::fs::write(dir.join(format!("{name}.json")), body)
            .await
            .expect("write");
    }

    #[tokio::test]
    async fn a_pass_with_no_candidates_discovers_nothing() {
        let dir = tempfile::tempdir().expect("tempdir");
        let config = test_config(dir.path().to_path_buf());

        let report = run_once(&config).await.expect("run_once");
        assert_eq!(report.discovered, 0);
    }

    #[tokio::test]
    async fn unparseable_files_are_skipped_without_aborting_the_pass() {
        let dir = tempfile::tempdir().expect("tempdir");
        let date_dir = dir.path().join("2026-07-28");
        tokio::fs::create_dir_all(&date_dir).await.expect("mkdir");
        tokio::fs::write(date_dir.join("broken.json"), "not json")
            .await
            .expect("write");

        let config = test_config(dir.path().to_path_buf());
        let report = run_once(&config).await.expect("run_once");

        assert_eq!(report.discovered, 1);
        assert_eq!(report.parse_failures, 1);
        assert_eq!(report.parsed, 0);
    }

    #[tokio::test]
    async fn alert_value_and_threshold_survive_as_strings() {
        let alert = Alert {
            instance_name: "db1".to_string(),
            timestamp: chrono::Utc::now(),
            level: AlertLevel::Critical,
            metric: "replication_status".to_string(),
            message: "replication broken".to_string(),
            value: "Error".to_string(),
            threshold: "Running".to_string(),
        };
        let dir = tempfile::tempdir().expect("tempdir");
        write_snapshot(dir.path(), "2026-07-28", "db1", vec![alert]).await;

        let config = test_config(dir.path().to_path_buf());
        let report = run_once(&config).await;

        // No live sink is reachable in this test environment; the pass must
        // fail at the write step, not at discovery or parsing.
        assert!(report.is_err());
    }
}
