//! Oracle adapter. The `oracle` crate (OCI bindings) is blocking, so every
//! call is wrapped in `spawn_blocking`. Sub-probe SQL mirrors
//! `original_source/database/oracle/oracle_monitor.py`.
//!
//! No Oracle driver usage was found in the retrieved example pack (the one
//! Oracle-adjacent file, `other_examples/…rusty-db…workload-mod.rs`, is an
//! AWR/SQL-Tuning-Advisor reimplementation with no real driver behind it).
//! `oracle` is the standard real crate for OCI access from Rust and is used
//! here the same way the teacher uses `sqlx` elsewhere: one driver, wrapped
//! at the async boundary. See `DESIGN.md` for the full rationale.
#![allow(clippy::cast_precision_loss, clippy::cast_possible_truncation)]

use crate::model::{
    CacheHitRate, ConnectionStats, Instance, Metrics, ProcessEntry, QueryPerSecond,
    ReplicationState, ReplicationStatus, SlowQueries, TablespaceUsage,
};
use anyhow::{Context, Result};
use std::sync::Arc;

/// Wraps the blocking `oracle::Connection` so it can be shared across the
/// `spawn_blocking` closures each sub-probe runs in.
pub struct OracleHandle(pub Arc<oracle::Connection>);

pub async fn open(instance: &Instance) -> Result<OracleHandle> {
    use secrecy::ExposeSecret;

    let sid = instance.sid.clone().unwrap_or_else(|| "ORCL".to_string());
    let connect_string = format!("{}:{}/{}", instance.host, instance.port, sid);
    let user = instance.credentials.user.clone();
    let password = instance.credentials.password.expose_secret().to_string();

    let conn = tokio::task::spawn_blocking(move || {
        oracle::Connection::connect(&user, &password, &connect_string)
    })
    .await
    .context("oracle connect task panicked")??;

    Ok(OracleHandle(Arc::new(conn)))
}

pub async fn ping(handle: &OracleHandle) -> Result<bool> {
    let conn = Arc::clone(&handle.0);
    let ok = tokio::task::spawn_blocking(move || conn.query_row("SELECT 1 FROM dual", &[]).is_ok())
        .await?;
    Ok(ok)
}

pub async fn collect(handle: &OracleHandle) -> Result<Metrics> {
    let mut metrics = Metrics {
        connection_status: true,
        ..Metrics::default()
    };

    metrics.connection_stats = connection_stats(handle).await.ok();
    metrics.qps = qps(handle).await.ok();
    metrics.slow_queries = slow_queries(handle).await.ok();
    metrics.cache_hit_rate = cache_hit_rate(handle).await.ok();
    metrics.tablespace_usage = tablespace_usage(handle).await.unwrap_or_default();
    metrics.process_list = process_list(handle).await.unwrap_or_default();
    metrics.replication_status = replication_status(handle).await.ok();

    Ok(metrics)
}

pub async fn close(handle: OracleHandle) {
    let _ = tokio::task::spawn_blocking(move || {
        if let Ok(conn) = Arc::try_unwrap(handle.0) {
            let _ = conn.close();
        }
    })
    .await;
}

async fn connection_stats(handle: &OracleHandle) -> Result<ConnectionStats> {
    let conn = Arc::clone(&handle.0);
    tokio::task::spawn_blocking(move || -> Result<ConnectionStats> {
        let max: i64 = conn
            .query_row_as(
                "SELECT value FROM v$parameter WHERE name = 'processes'",
                &[],
            )
            .unwrap_or(0);
        let current: i64 = conn
            .query_row_as("SELECT count(*) FROM v$session", &[])
            .unwrap_or(0);
        let active: i64 = conn
            .query_row_as(
                "SELECT count(*) FROM v$session WHERE status = 'ACTIVE'",
                &[],
            )
            .unwrap_or(0);

        Ok(ConnectionStats {
            max: Some(max),
            current: Some(current),
            percent: if max > 0 {
                Some(current as f64 / max as f64 * 100.0)
            } else {
                None
            },
            active: Some(active),
            threads_running: None,
            threads_connected: None,
            threads_created: None,
            threads_cached: None,
        })
    })
    .await?
}

async fn qps(handle: &OracleHandle) -> Result<QueryPerSecond> {
    let conn = Arc::clone(&handle.0);
    tokio::task::spawn_blocking(move || -> Result<QueryPerSecond> {
        let executes: i64 = conn.query_row_as(
            "SELECT value FROM v$sysstat WHERE name = 'execute count'",
            &[],
        )?;
        let uptime_seconds: f64 = conn.query_row_as(
            "SELECT (SYSDATE - startup_time) * 86400 FROM v$instance",
            &[],
        )?;

        Ok(QueryPerSecond {
            total_queries: Some(executes),
            uptime_seconds: Some(uptime_seconds as i64),
            qps: if uptime_seconds > 0.0 {
                Some(executes as f64 / uptime_seconds)
            } else {
                None
            },
        })
    })
    .await?
}

async fn slow_queries(handle: &OracleHandle) -> Result<SlowQueries> {
    let conn = Arc::clone(&handle.0);
    tokio::task::spawn_blocking(move || -> Result<SlowQueries> {
        let count: i64 = conn.query_row_as(
            "SELECT count(*) FROM v$sql WHERE elapsed_time > 1000000",
            &[],
        )?;
        Ok(SlowQueries {
            count: Some(count),
            threshold_seconds: Some(1),
            log_enabled: None,
        })
    })
    .await?
}

async fn cache_hit_rate(handle: &OracleHandle) -> Result<CacheHitRate> {
    let conn = Arc::clone(&handle.0);
    tokio::task::spawn_blocking(move || -> Result<CacheHitRate> {
        let physical: i64 = conn.query_row_as(
            "SELECT value FROM v$sysstat WHERE name = 'physical reads'",
            &[],
        )?;
        let consistent: i64 = conn.query_row_as(
            "SELECT value FROM v$sysstat WHERE name = 'consistent gets'",
            &[],
        )?;
        let db_block: i64 = conn.query_row_as(
            "SELECT value FROM v$sysstat WHERE name = 'db block gets'",
            &[],
        )?;
        let logical = consistent + db_block;

        Ok(CacheHitRate {
            rate_percent: if logical > 0 {
                Some((1.0 - physical as f64 / logical as f64) * 100.0)
            } else {
                None
            },
            hits: Some(logical - physical),
            misses: Some(physical),
        })
    })
    .await?
}

async fn tablespace_usage(handle: &OracleHandle) -> Result<Vec<TablespaceUsage>> {
    let conn = Arc::clone(&handle.0);
    tokio::task::spawn_blocking(move || -> Result<Vec<TablespaceUsage>> {
        let rows = conn.query(
            "SELECT tablespace_name, SUM(bytes) / 1024 / 1024 AS used_mb, \
                    SUM(maxbytes) / 1024 / 1024 AS max_mb \
             FROM dba_data_files GROUP BY tablespace_name",
            &[],
        )?;

        let mut out = Vec::new();
        for row in rows {
            let row = row?;
            let name: String = row.get(0)?;
            let used_mb: f64 = row.get(1)?;
            let max_mb: f64 = row.get(2).unwrap_or(used_mb);
            out.push(TablespaceUsage {
                name,
                total_mb: Some(max_mb),
                used_mb: Some(used_mb),
                free_mb: Some(max_mb - used_mb),
                usage_percent: if max_mb > 0.0 {
                    Some(used_mb / max_mb * 100.0)
                } else {
                    None
                },
            });
        }
        Ok(out)
    })
    .await?
}

async fn process_list(handle: &OracleHandle) -> Result<Vec<ProcessEntry>> {
    let conn = Arc::clone(&handle.0);
    tokio::task::spawn_blocking(move || -> Result<Vec<ProcessEntry>> {
        let rows = conn.query(
            "SELECT s.sid, s.username, s.machine, s.status, q.sql_text \
             FROM v$session s LEFT JOIN v$sql q ON s.sql_id = q.sql_id \
             WHERE s.username IS NOT NULL",
            &[],
        )?;

        let mut out = Vec::new();
        for row in rows {
            let row = row?;
            out.push(ProcessEntry {
                session_id: row.get::<_, i64>(0).map(|v| v.to_string()).unwrap_or_default(),
                user: row.get(1).ok(),
                host: row.get(2).ok(),
                state: row.get(3).ok(),
                query: row.get(4).ok(),
                login_time: None,
            });
        }
        Ok(out)
    })
    .await?
}

async fn replication_status(handle: &OracleHandle) -> Result<ReplicationStatus> {
    let conn = Arc::clone(&handle.0);
    tokio::task::spawn_blocking(move || -> Result<ReplicationStatus> {
        let role: String = conn.query_row_as("SELECT database_role FROM v$database", &[])?;

        match role.as_str() {
            "PRIMARY" => {
                let standby_count: i64 = conn
                    .query_row_as("SELECT count(*) FROM v$archive_dest WHERE target = 'STANDBY'", &[])
                    .unwrap_or(0);
                Ok(ReplicationStatus {
                    status: Some(if standby_count > 0 {
                        ReplicationState::Running
                    } else {
                        ReplicationState::NoReplicas
                    }),
                    role: Some(role),
                    lag_seconds: None,
                    replicas: Vec::new(),
                })
            }
            "PHYSICAL STANDBY" | "LOGICAL STANDBY" => {
                let mode: String = conn
                    .query_row_as(
                        "SELECT recovery_mode FROM v$archive_dest_status WHERE dest_id = 1",
                        &[],
                    )
                    .unwrap_or_else(|_| "UNKNOWN".to_string());
                Ok(ReplicationStatus {
                    status: Some(if mode.contains("MANAGED") {
                        ReplicationState::Running
                    } else {
                        ReplicationState::Error
                    }),
                    role: Some(role),
                    lag_seconds: None,
                    replicas: Vec::new(),
                })
            }
            _ => Ok(ReplicationStatus {
                status: Some(ReplicationState::SingleInstance),
                role: Some(role),
                lag_seconds: None,
                replicas: Vec::new(),
            }),
        }
    })
    .await?
}
