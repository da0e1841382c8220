//! MySQL and PostgreSQL/KingbaseES sink writers, both via `sqlx`, both using
//! a single connection with autocommit off and one commit/rollback per
//! batch.

use crate::config::IngestionConfig;
use crate::ingest::record::IngestRecord;
use anyhow::{Context, Result};
use secrecy::ExposeSecret;

const MYSQL_MAIN_DDL: &str = "
CREATE TABLE IF NOT EXISTS monitor_main (
    id BIGINT AUTO_INCREMENT PRIMARY KEY,
    instance_name VARCHAR(128) NOT NULL,
    ts DATETIME NOT NULL,
    monitor_time DATETIME NOT NULL,
    connection_status TINYINT(1) NOT NULL,
    connection_count BIGINT,
    connection_percent DOUBLE,
    threads_running BIGINT,
    threads_connected BIGINT,
    threads_created BIGINT,
    threads_cached BIGINT,
    qps DOUBLE,
    total_queries BIGINT,
    uptime BIGINT,
    slow_queries BIGINT,
    long_query_time BIGINT,
    slow_query_log TINYINT(1),
    cache_hit_rate DOUBLE,
    tablespace_usage_percent DOUBLE,
    replication_status VARCHAR(32)
)";

const MYSQL_ALERTS_DDL: &str = "
CREATE TABLE IF NOT EXISTS monitor_alerts (
    id BIGINT AUTO_INCREMENT PRIMARY KEY,
    instance_name VARCHAR(128) NOT NULL,
    ts DATETIME NOT NULL,
    level VARCHAR(16) NOT NULL,
    metric VARCHAR(64) NOT NULL,
    message TEXT NOT NULL,
    value VARCHAR(64) NOT NULL,
    threshold VARCHAR(64) NOT NULL
)";

const POSTGRES_MAIN_DDL: &str = "
CREATE TABLE IF NOT EXISTS monitor_main (
    id BIGSERIAL PRIMARY KEY,
    instance_name TEXT NOT NULL,
    ts TIMESTAMPTZ NOT NULL,
    monitor_time TIMESTAMPTZ NOT NULL,
    connection_status BOOLEAN NOT NULL,
    connection_count BIGINT,
    connection_percent DOUBLE PRECISION,
    threads_running BIGINT,
    threads_connected BIGINT,
    threads_created BIGINT,
    threads_cached BIGINT,
    qps DOUBLE PRECISION,
    total_queries BIGINT,
    uptime BIGINT,
    slow_queries BIGINT,
    long_query_time BIGINT,
    slow_query_log BOOLEAN,
    cache_hit_rate DOUBLE PRECISION,
    tablespace_usage_percent DOUBLE PRECISION,
    replication_status TEXT
)";

const POSTGRES_ALERTS_DDL: &str = "
CREATE TABLE IF NOT EXISTS monitor_alerts (
    id BIGSERIAL PRIMARY KEY,
    instance_name TEXT NOT NULL,
    ts TIMESTAMPTZ NOT NULL,
    level TEXT NOT NULL,
    metric TEXT NOT NULL,
    message TEXT NOT NULL,
    value TEXT NOT NULL,
    threshold TEXT NOT NULL
)";

pub async fn write_batch_mysql(config: &IngestionConfig, records: &[IngestRecord]) -> Result<usize> {
    let url = format!(
        "mysql://{}:{}@{}:{}/{}",
        config.user,
        config.password.expose_secret(),
        config.host,
        config.port,
        config.database
    );
    let pool = sqlx::MySqlPool::connect(&url)
        .await
        .context("failed to connect to MySQL sink")?;

    sqlx::query(MYSQL_MAIN_DDL).execute(&pool).await?;
    sqlx::query(MYSQL_ALERTS_DDL).execute(&pool).await?;

    let mut tx = pool.begin().await?;
    for record in records {
        sqlx::query(
            "INSERT INTO monitor_main (instance_name, ts, monitor_time, connection_status, \
             connection_count, connection_percent, threads_running, threads_connected, \
             threads_created, threads_cached, qps, total_queries, uptime, slow_queries, \
             long_query_time, slow_query_log, cache_hit_rate, tablespace_usage_percent, \
             replication_status) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&record.instance_name)
        .bind(record.timestamp)
        .bind(record.monitor_time)
        .bind(record.connection_status)
        .bind(record.connection_count)
        .bind(record.connection_percent)
        .bind(record.threads_running)
        .bind(record.threads_connected)
        .bind(record.threads_created)
        .bind(record.threads_cached)
        .bind(record.qps)
        .bind(record.total_queries)
        .bind(record.uptime)
        .bind(record.slow_queries)
        .bind(record.long_query_time)
        .bind(record.slow_query_log)
        .bind(record.cache_hit_rate)
        .bind(record.tablespace_usage_percent)
        .bind(&record.replication_status)
        .execute(&mut *tx)
        .await
        .inspect_err(|_| tracing::warn!(instance = %record.instance_name, "mysql sink insert failed"))?;

        for alert in &record.alerts {
            sqlx::query(
                "INSERT INTO monitor_alerts (instance_name, ts, level, metric, message, value, \
                 threshold) VALUES (?, ?, ?, ?, ?, ?, ?)",
            )
            .bind(&alert.instance_name)
            .bind(alert.timestamp)
            .bind(alert.level.as_str())
            .bind(&alert.metric)
            .bind(&alert.message)
            .bind(&alert.value)
            .bind(&alert.threshold)
            .execute(&mut *tx)
            .await?;
        }
    }

    tx.commit().await.context("failed to commit MySQL sink batch")?;
    pool.close().await;
    Ok(records.len())
}

pub async fn write_batch_postgres(config: &IngestionConfig, records: &[IngestRecord]) -> Result<usize> {
    let url = format!(
        "postgres://{}:{}@{}:{}/{}",
        config.user,
        config.password.expose_secret(),
        config.host,
        config.port,
        config.database
    );
    let pool = sqlx::PgPool::connect(&url)
        .await
        .context("failed to connect to Postgres-dialect sink")?;

    sqlx::query(POSTGRES_MAIN_DDL).execute(&pool).await?;
    sqlx::query(POSTGRES_ALERTS_DDL).execute(&pool).await?;

    let mut tx = pool.begin().await?;
    for record in records {
        sqlx::query(
            "INSERT INTO monitor_main (instance_name, ts, monitor_time, connection_status, \
             connection_count, connection_percent, threads_running, threads_connected, \
             threads_created, threads_cached, qps, total_queries, uptime, slow_queries, \
             long_query_time, slow_query_log, cache_hit_rate, tablespace_usage_percent, \
             replication_status) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, \
             $14, $15, $16, $17, $18, $19)",
        )
        .bind(&record.instance_name)
        .bind(record.timestamp)
        .bind(record.monitor_time)
        .bind(record.connection_status)
        .bind(record.connection_count)
        .bind(record.connection_percent)
        .bind(record.threads_running)
        .bind(record.threads_connected)
        .bind(record.threads_created)
        .bind(record.threads_cached)
        .bind(record.qps)
        .bind(record.total_queries)
        .bind(record.uptime)
        .bind(record.slow_queries)
        .bind(record.long_query_time)
        .bind(record.slow_query_log)
        .bind(record.cache_hit_rate)
        .bind(record.tablespace_usage_percent)
        .bind(&record.replication_status)
        .execute(&mut *tx)
        .await
        .inspect_err(|_| tracing::warn!(instance = %record.instance_name, "postgres-dialect sink insert failed"))?;

        for alert in &record.alerts {
            sqlx::query(
                "INSERT INTO monitor_alerts (instance_name, ts, level, metric, message, value, \
                 threshold) VALUES ($1, $2, $3, $4, $5, $6, $7)",
            )
            .bind(&alert.instance_name)
            .bind(alert.timestamp)
            .bind(alert.level.as_str())
            .bind(&alert.metric)
            .bind(&alert.message)
            .bind(&alert.value)
            .bind(&alert.threshold)
            .execute(&mut *tx)
            .await?;
        }
    }

    tx.commit()
        .await
        .context("failed to commit Postgres-dialect sink batch")?;
    pool.close().await;
    Ok(records.len())
}
