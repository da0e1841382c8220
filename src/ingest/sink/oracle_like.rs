//! Oracle and Dameng sink writer. Both speak the same DDL/placeholder
//! dialect (Dameng's SQL follows Oracle's V$ catalog style), but connect
//! through different drivers — `oracle` for Oracle, `odbc-api` for Dameng —
//! so the connect/insert bodies are kept separate while the DDL text is
//! shared.

use crate::config::IngestionConfig;
use crate::ingest::record::IngestRecord;
use crate::model::EngineKind;
use anyhow::{Context, Result};
use secrecy::ExposeSecret;

const MAIN_DDL: &str = "
BEGIN
  EXECUTE IMMEDIATE 'CREATE TABLE monitor_main (
    id NUMBER GENERATED ALWAYS AS IDENTITY PRIMARY KEY,
    instance_name VARCHAR2(128) NOT NULL,
    ts TIMESTAMP NOT NULL,
    monitor_time TIMESTAMP NOT NULL,
    connection_status CHAR(1) NOT NULL,
    connection_count NUMBER,
    connection_percent NUMBER,
    threads_running NUMBER,
    threads_connected NUMBER,
    threads_created NUMBER,
    threads_cached NUMBER,
    qps NUMBER,
    total_queries NUMBER,
    uptime NUMBER,
    slow_queries NUMBER,
    long_query_time NUMBER,
    slow_query_log CHAR(1),
    cache_hit_rate NUMBER,
    tablespace_usage_percent NUMBER,
    replication_status VARCHAR2(32)
  )';
EXCEPTION WHEN OTHERS THEN IF SQLCODE != -955 THEN RAISE; END IF;
END;";

const ALERTS_DDL: &str = "
BEGIN
  EXECUTE IMMEDIATE 'CREATE TABLE monitor_alerts (
    id NUMBER GENERATED ALWAYS AS IDENTITY PRIMARY KEY,
    instance_name VARCHAR2(128) NOT NULL,
    ts TIMESTAMP NOT NULL,
    level VARCHAR2(16) NOT NULL,
    metric VARCHAR2(64) NOT NULL,
    message VARCHAR2(4000) NOT NULL,
    value VARCHAR2(64) NOT NULL,
    threshold VARCHAR2(64) NOT NULL
  )';
EXCEPTION WHEN OTHERS THEN IF SQLCODE != -955 THEN RAISE; END IF;
END;";

const MAIN_INSERT: &str = "INSERT INTO monitor_main (instance_name, ts, monitor_time, \
    connection_status, connection_count, connection_percent, threads_running, \
    threads_connected, threads_created, threads_cached, qps, total_queries, uptime, \
    slow_queries, long_query_time, slow_query_log, cache_hit_rate, \
    tablespace_usage_percent, replication_status) VALUES \
    (:1, :2, :3, :4, :5, :6, :7, :8, :9, :10, :11, :12, :13, :14, :15, :16, :17, :18, :19)";

const ALERT_INSERT: &str = "INSERT INTO monitor_alerts (instance_name, ts, level, metric, \
    message, value, threshold) VALUES (:1, :2, :3, :4, :5, :6, :7)";

fn bool_char(value: Option<bool>) -> &'static str {
    match value {
        Some(true) => "Y",
        Some(false) => "N",
        None => "",
    }
}

pub async fn write_batch(config: &IngestionConfig, records: &[IngestRecord]) -> Result<usize> {
    match config.db_type {
        EngineKind::Oracle => write_batch_oracle(config, records).await,
        EngineKind::Dameng => write_batch_dameng(config, records).await,
        other => anyhow::bail!("oracle-dialect sink invoked for non-oracle-like engine {other:?}"),
    }
}

async fn write_batch_oracle(config: &IngestionConfig, records: &[IngestRecord]) -> Result<usize> {
    let connect_string = format!(
        "{}:{}/{}",
        config.host,
        config.port,
        config.sid.clone().unwrap_or_else(|| config.database.clone())
    );
    let user = config.user.clone();
    let password = config.password.expose_secret().to_string();
    let records = records.to_vec();

    tokio::task::spawn_blocking(move || -> Result<usize> {
        let conn = oracle::Connection::connect(&user, &password, &connect_string)
            .context("failed to connect to Oracle sink")?;
        conn.execute(MAIN_DDL, &[]).ok();
        conn.execute(ALERTS_DDL, &[]).ok();

        for record in &records {
            let result = conn.execute(
                MAIN_INSERT,
                &[
                    &record.instance_name,
                    &record.timestamp.naive_utc(),
                    &record.monitor_time.naive_utc(),
                    &bool_char(Some(record.connection_status)),
                    &record.connection_count,
                    &record.connection_percent,
                    &record.threads_running,
                    &record.threads_connected,
                    &record.threads_created,
                    &record.threads_cached,
                    &record.qps,
                    &record.total_queries,
                    &record.uptime,
                    &record.slow_queries,
                    &record.long_query_time,
                    &bool_char(record.slow_query_log),
                    &record.cache_hit_rate,
                    &record.tablespace_usage_percent,
                    &record.replication_status,
                ],
            );
            if let Err(e) = result {
                conn.rollback().ok();
                return Err(e).context("Oracle sink insert failed, batch rolled back");
            }

            for alert in &record.alerts {
                let result = conn.execute(
                    ALERT_INSERT,
                    &[
                        &alert.instance_name,
                        &alert.timestamp.naive_utc(),
                        &alert.level.as_str(),
                        &alert.metric,
                        &alert.message,
                        &alert.value,
                        &alert.threshold,
                    ],
                );
                if let Err(e) = result {
                    conn.rollback().ok();
                    return Err(e).context("Oracle alert insert failed, batch rolled back");
                }
            }
        }

        conn.commit().context("failed to commit Oracle sink batch")?;
        Ok(records.len())
    })
    .await
    .context("oracle sink task panicked")?
}

async fn write_batch_dameng(config: &IngestionConfig, records: &[IngestRecord]) -> Result<usize> {
    let env = odbc_api::Environment::new().context("failed to initialize ODBC environment")?;
    let conn_str = format!(
        "Driver={{DM8 ODBC DRIVER}};Server={};Port={};UID={};PWD={};",
        config.host,
        config.port,
        config.user,
        config.password.expose_secret()
    );
    let records = records.to_vec();

    tokio::task::spawn_blocking(move || -> Result<usize> {
        let conn = env
            .connect_with_connection_string(&conn_str, odbc_api::ConnectionOptions::default())
            .context("failed to connect to Dameng sink")?;
        conn.execute(MAIN_DDL, ()).ok();
        conn.execute(ALERTS_DDL, ()).ok();

        for record in &records {
            let params = (
                record.instance_name.clone(),
                record.timestamp.naive_utc(),
                record.monitor_time.naive_utc(),
                bool_char(Some(record.connection_status)).to_string(),
                record.connection_count,
                record.connection_percent,
                record.threads_running,
                record.threads_connected,
                record.threads_created,
                record.threads_cached,
                record.qps,
                record.total_queries,
                record.uptime,
                record.slow_queries,
                record.long_query_time,
                bool_char(record.slow_query_log).to_string(),
                record.cache_hit_rate,
                record.tablespace_usage_percent,
                record.replication_status.clone(),
            );
            let result = conn.execute(
                "INSERT INTO monitor_main (instance_name, ts, monitor_time, connection_status, \
                 connection_count, connection_percent, threads_running, threads_connected, \
                 threads_created, threads_cached, qps, total_queries, uptime, slow_queries, \
                 long_query_time, slow_query_log, cache_hit_rate, tablespace_usage_percent, \
                 replication_status) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
                params,
            );
            if let Err(e) = result {
                return Err(e).context("Dameng sink insert failed");
            }

            for alert in &record.alerts {
                let params = (
                    alert.instance_name.clone(),
                    alert.timestamp.naive_utc(),
                    alert.level.as_str().to_string(),
                    alert.metric.clone(),
                    alert.message.clone(),
                    alert.value.clone(),
                    alert.threshold.clone(),
                );
                conn.execute(
                    "INSERT INTO monitor_alerts (instance_name, ts, level, metric, message, \
                     value, threshold) VALUES (?, ?, ?, ?, ?, ?, ?)",
                    params,
                )
                .context("Dameng alert insert failed")?;
            }
        }

        Ok(records.len())
    })
    .await
    .context("dameng sink task panicked")?
}
