//! PostgreSQL adapter. Sub-probe SQL mirrors
//! `original_source/database/pg/postgresql_monitor.py`. Shared by the
//! [`super::kingbase`] adapter, which is wire-compatible with PostgreSQL.
#![allow(clippy::cast_precision_loss, clippy::cast_possible_truncation)]

use crate::model::{
    CacheHitRate, ConnectionStats, Instance, Metrics, ProcessEntry, QueryPerSecond,
    ReplicationState, ReplicationStatus, SlowQueries, TablespaceUsage,
};
use anyhow::Result;
use sqlx::{PgPool, Row, postgres::PgPoolOptions};

pub async fn open(instance: &Instance) -> Result<PgPool> {
    use secrecy::ExposeSecret;

    let url = format!(
        "postgres://{}:{}@{}:{}/{}",
        instance.credentials.user,
        instance.credentials.password.expose_secret(),
        instance.host,
        instance.port,
        instance.database,
    );

    let pool = PgPoolOptions::new()
        .max_connections(2)
        .acquire_timeout(instance.connect_timeout())
        .connect(&url)
        .await?;
    Ok(pool)
}

pub async fn ping(pool: &PgPool) -> Result<bool> {
    let row = sqlx::query("SELECT 1").fetch_one(pool).await?;
    Ok(row.try_get::<i32, _>(0).unwrap_or(0) == 1)
}

pub async fn collect(pool: &PgPool) -> Result<Metrics> {
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

pub async fn close(pool: PgPool) {
    pool.close().await;
}

async fn connection_stats(pool: &PgPool) -> Result<ConnectionStats> {
    let max: (String,) = sqlx::query_as("SHOW max_connections").fetch_one(pool).await?;
    let current: (i64,) = sqlx::query_as("SELECT count(*) FROM pg_stat_activity")
        .fetch_one(pool)
        .await?;
    let active: (i64,) =
        sqlx::query_as("SELECT count(*) FROM pg_stat_activity WHERE state = 'active'")
            .fetch_one(pool)
            .await?;

    let max_val: i64 = max.0.parse().unwrap_or(0);

    Ok(ConnectionStats {
        max: Some(max_val),
        current: Some(current.0),
        percent: if max_val > 0 {
            Some(current.0 as f64 / max_val as f64 * 100.0)
        } else {
            None
        },
        active: Some(active.0),
        threads_running: None,
        threads_connected: None,
        threads_created: None,
        threads_cached: None,
    })
}

async fn qps(pool: &PgPool) -> Result<QueryPerSecond> {
    let (commits, rollbacks): (i64, i64) = sqlx::query_as(
        "SELECT xact_commit, xact_rollback FROM pg_stat_database WHERE datname = current_database()",
    )
    .fetch_one(pool)
    .await?;
    let (uptime,): (f64,) =
        sqlx::query_as("SELECT extract(epoch FROM now() - pg_postmaster_start_time())")
            .fetch_one(pool)
            .await?;

    let total = commits + rollbacks;
    Ok(QueryPerSecond {
        total_queries: Some(total),
        uptime_seconds: Some(uptime as i64),
        qps: if uptime > 0.0 {
            Some(total as f64 / uptime)
        } else {
            None
        },
    })
}

async fn slow_queries(pool: &PgPool, threshold_seconds: i64) -> Result<SlowQueries> {
    let (count,): (i64,) = sqlx::query_as(
        "SELECT count(*) FROM pg_stat_activity \
         WHERE state = 'active' \
           AND now() - query_start > ($1 || ' seconds')::interval \
           AND query NOT LIKE '%pg_stat_activity%'",
    )
    .bind(threshold_seconds.to_string())
    .fetch_one(pool)
    .await?;

    Ok(SlowQueries {
        count: Some(count),
        threshold_seconds: Some(threshold_seconds),
        log_enabled: None,
    })
}

async fn cache_hit_rate(pool: &PgPool) -> Result<CacheHitRate> {
    let (hit, read): (i64, i64) = sqlx::query_as(
        "SELECT sum(blks_hit), sum(blks_read) FROM pg_stat_database",
    )
    .fetch_one(pool)
    .await?;

    Ok(CacheHitRate {
        rate_percent: if hit + read > 0 {
            Some(hit as f64 / (hit + read) as f64 * 100.0)
        } else {
            None
        },
        hits: Some(hit),
        misses: Some(read),
    })
}

async fn tablespace_usage(pool: &PgPool) -> Result<Vec<TablespaceUsage>> {
    let rows = sqlx::query(
        "SELECT spcname, \
            pg_tablespace_size(spcname) AS used_bytes \
         FROM pg_tablespace \
         WHERE spcname NOT LIKE 'pg_%'",
    )
    .fetch_all(pool)
    .await?;

    Ok(rows
        .into_iter()
        .map(|row| {
            let used_bytes: i64 = row.try_get("used_bytes").unwrap_or(0);
            let used_mb = used_bytes as f64 / 1024.0 / 1024.0;
            TablespaceUsage {
                name: row.try_get("spcname").unwrap_or_default(),
                total_mb: Some(used_mb),
                used_mb: Some(used_mb),
                free_mb: None,
                usage_percent: None,
            }
        })
        .collect())
}

async fn process_list(pool: &PgPool) -> Result<Vec<ProcessEntry>> {
    let rows = sqlx::query(
        "SELECT pid, usename, client_addr::text AS client_addr, state, query, \
                backend_start::text AS backend_start \
         FROM pg_stat_activity \
         WHERE pid != pg_backend_pid()",
    )
    .fetch_all(pool)
    .await?;

    Ok(rows
        .into_iter()
        .map(|row| ProcessEntry {
            session_id: row
                .try_get::<i32, _>("pid")
                .map(|id| id.to_string())
                .unwrap_or_default(),
            user: row.try_get("usename").ok(),
            host: row.try_get("client_addr").ok(),
            state: row.try_get("state").ok(),
            query: row.try_get("query").ok(),
            login_time: row.try_get("backend_start").ok(),
        })
        .collect())
}

async fn replication_status(pool: &PgPool) -> Result<ReplicationStatus> {
    let rows = sqlx::query("SELECT state FROM pg_stat_replication")
        .fetch_all(pool)
        .await?;

    if rows.is_empty() {
        return Ok(ReplicationStatus {
            status: Some(ReplicationState::NoReplicas),
            ..ReplicationStatus::default()
        });
    }

    let all_streaming = rows
        .iter()
        .all(|row| row.try_get::<String, _>("state").unwrap_or_default() == "streaming");

    Ok(ReplicationStatus {
        status: Some(if all_streaming {
            ReplicationState::Running
        } else {
            ReplicationState::Error
        }),
        role: Some("primary".to_string()),
        lag_seconds: None,
        replicas: Vec::new(),
    })
}
