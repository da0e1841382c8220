//! SQL Server adapter, `tiberius` over `deadpool-tiberius`, grounded in
//! `original_source/database/mssql/mssql_monitor.py` and in
//! `other_examples/…tactilesql…health_score-mssql.rs`, which pairs the same
//! two crates for an analogous per-category health-metric collector.
#![allow(clippy::cast_precision_loss, clippy::cast_possible_truncation)]

use crate::model::{
    CacheHitRate, ConnectionStats, Instance, Metrics, ProcessEntry, QueryPerSecond,
    ReplicationState, ReplicationStatus, SlowQueries, TablespaceUsage,
};
use anyhow::{Context, Result};
use deadpool_tiberius::Manager;
use futures::TryStreamExt;

pub type Pool = deadpool_tiberius::Pool;

pub async fn open(instance: &Instance) -> Result<Pool> {
    use secrecy::ExposeSecret;

    let pool = Manager::new()
        .host(&instance.host)
        .port(instance.port)
        .database(&instance.database)
        .basic_authentication(
            &instance.credentials.user,
            instance.credentials.password.expose_secret(),
        )
        .trust_cert()
        .max_size(2)
        .create_pool()
        .context("failed to build SQL Server connection pool")?;
    Ok(pool)
}

pub async fn ping(pool: &Pool) -> Result<bool> {
    let mut conn = pool.get().await?;
    let stream = conn.simple_query("SELECT 1").await?;
    let rows: Vec<_> = stream.into_first_result().await?;
    Ok(!rows.is_empty())
}

pub async fn collect(pool: &Pool) -> Result<Metrics> {
    let mut metrics = Metrics {
        connection_status: true,
        ..Metrics::default()
    };

    metrics.connection_stats = connection_stats(pool).await.ok();
    metrics.qps = qps(pool).await.ok();
    metrics.slow_queries = slow_queries(pool, 1).await.ok();
    metrics.cache_hit_rate = cache_hit_rate(pool).await.ok();
    metrics.tablespace_usage = tablespace_usage(pool).await.unwrap_or_default();
    metrics.process_list = process_list(pool).await.unwrap_or_default();
    metrics.replication_status = replication_status(pool).await.ok();

    Ok(metrics)
}

async fn scalar_i64(pool: &Pool, query: &str) -> Result<i64> {
    let mut conn = pool.get().await?;
    let stream = conn.query(query, &[]).await?;
    let row = stream
        .into_row()
        .await?
        .context("query returned no rows")?;
    row.get::<i64, _>(0).context("column 0 was not an i64")
}

async fn connection_stats(pool: &Pool) -> Result<ConnectionStats> {
    let max = scalar_i64(
        pool,
        "SELECT CAST(value_in_use AS BIGINT) FROM sys.configurations WHERE name = 'user connections'",
    )
    .await
    .unwrap_or(0);
    let current = scalar_i64(
        pool,
        "SELECT count(*) FROM sys.dm_exec_sessions WHERE is_user_process = 1",
    )
    .await?;
    let active = scalar_i64(
        pool,
        "SELECT count(*) FROM sys.dm_exec_requests WHERE session_id > 50",
    )
    .await
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
}

/// Computes a QPS rate from the `Batch Requests/sec` counter. This counter is
/// cumulative, so a single sample cannot yield a rate: the original monitor's
/// `CROSS JOIN sys.databases` query returned that raw cumulative value, which
/// is not a queries-per-second figure. This adapter instead samples the
/// counter value here and leaves the rate as `None` on the instance's first
/// tick; the Instance Runner carries the previous sample forward (see the
/// scheduler's per-instance adapter state) and computes
/// `(current - previous) / elapsed_seconds` on subsequent ticks.
async fn qps(pool: &Pool) -> Result<QueryPerSecond> {
    let batch_requests = scalar_i64(
        pool,
        "SELECT cntr_value FROM sys.dm_os_performance_counters \
         WHERE counter_name = 'Batch Requests/sec'",
    )
    .await?;

    Ok(QueryPerSecond {
        total_queries: Some(batch_requests),
        uptime_seconds: None,
        qps: None,
    })
}

async fn slow_queries(pool: &Pool, threshold_seconds: i64) -> Result<SlowQueries> {
    let query = format!(
        "SELECT count(*) FROM sys.dm_exec_requests \
         WHERE session_id > 50 AND DATEDIFF(SECOND, start_time, GETDATE()) > {threshold_seconds}"
    );
    let count = scalar_i64(pool, &query).await?;

    Ok(SlowQueries {
        count: Some(count),
        threshold_seconds: Some(threshold_seconds),
        log_enabled: None,
    })
}

async fn cache_hit_rate(pool: &Pool) -> Result<CacheHitRate> {
    let lookups = scalar_i64(
        pool,
        "SELECT cntr_value FROM sys.dm_os_performance_counters \
         WHERE counter_name = 'Page lookups/sec'",
    )
    .await?;
    let reads = scalar_i64(
        pool,
        "SELECT cntr_value FROM sys.dm_os_performance_counters \
         WHERE counter_name = 'Page reads/sec'",
    )
    .await?;

    Ok(CacheHitRate {
        rate_percent: if lookups > 0 {
            Some((lookups - reads) as f64 / lookups as f64 * 100.0)
        } else {
            None
        },
        hits: Some(lookups - reads),
        misses: Some(reads),
    })
}

async fn tablespace_usage(pool: &Pool) -> Result<Vec<TablespaceUsage>> {
    let mut conn = pool.get().await?;
    let stream = conn
        .query(
            "SELECT name, size * 8.0 / 1024 AS size_mb, \
                    FILEPROPERTY(name, 'SpaceUsed') * 8.0 / 1024 AS used_mb \
             FROM sys.database_files",
            &[],
        )
        .await?;
    let rows: Vec<_> = stream.into_first_result().await?;

    Ok(rows
        .into_iter()
        .map(|row| {
            let total_mb: f64 = row.get("size_mb").unwrap_or(0.0);
            let used_mb: f64 = row.get("used_mb").unwrap_or(0.0);
            TablespaceUsage {
                name: row.get::<&str, _>("name").unwrap_or_default().to_string(),
                total_mb: Some(total_mb),
                used_mb: Some(used_mb),
                free_mb: Some(total_mb - used_mb),
                usage_percent: if total_mb > 0.0 {
                    Some(used_mb / total_mb * 100.0)
                } else {
                    None
                },
            }
        })
        .collect())
}

async fn process_list(pool: &Pool) -> Result<Vec<ProcessEntry>> {
    let mut conn = pool.get().await?;
    let stream = conn
        .query(
            "SELECT r.session_id, s.login_name, s.host_name, r.status, t.text \
             FROM sys.dm_exec_requests r \
             JOIN sys.dm_exec_sessions s ON r.session_id = s.session_id \
             CROSS APPLY sys.dm_exec_sql_text(r.sql_handle) t \
             WHERE r.session_id > 50",
            &[],
        )
        .await?;
    let rows: Vec<_> = stream.into_first_result().await?;

    Ok(rows
        .into_iter()
        .map(|row| ProcessEntry {
            session_id: row
                .get::<i16, _>("session_id")
                .map(|id| id.to_string())
                .unwrap_or_default(),
            user: row.get::<&str, _>("login_name").map(ToString::to_string),
            host: row.get::<&str, _>("host_name").map(ToString::to_string),
            state: row.get::<&str, _>("status").map(ToString::to_string),
            query: row.get::<&str, _>("text").map(ToString::to_string),
            login_time: None,
        })
        .collect())
}

async fn replication_status(pool: &Pool) -> Result<ReplicationStatus> {
    let published = scalar_i64(
        pool,
        "SELECT count(*) FROM sys.databases WHERE is_published = 1 OR is_subscribed = 1",
    )
    .await
    .unwrap_or(0);

    if published == 0 {
        return Ok(ReplicationStatus {
            status: Some(ReplicationState::NotConfigured),
            ..ReplicationStatus::default()
        });
    }

    let active_jobs = scalar_i64(
        pool,
        "SELECT count(*) FROM msdb.dbo.sysjobs WHERE name LIKE '%Replication%' AND enabled = 1",
    )
    .await
    .unwrap_or(0);

    Ok(ReplicationStatus {
        status: Some(if active_jobs > 0 {
            ReplicationState::Running
        } else {
            ReplicationState::Error
        }),
        role: None,
        lag_seconds: None,
        replicas: Vec::new(),
    })
}
