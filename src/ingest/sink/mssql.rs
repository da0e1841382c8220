//! SQL Server sink writer, a single `tiberius` connection per batch with an
//! explicit `BEGIN TRANSACTION`/`COMMIT`/`ROLLBACK`, since tiberius has no
//! transaction builder of its own.

use crate::config::IngestionConfig;
use crate::ingest::record::IngestRecord;
use anyhow::{Context, Result};
use secrecy::ExposeSecret;
use tiberius::{Client, Config};
use tokio::net::TcpStream;
use tokio_util::compat::TokioAsyncWriteCompatExt;

const MAIN_DDL: &str = "
IF OBJECT_ID('monitor_main', 'U') IS NULL
CREATE TABLE monitor_main (
    id BIGINT IDENTITY PRIMARY KEY,
    instance_name NVARCHAR(128) NOT NULL,
    ts DATETIME2 NOT NULL,
    monitor_time DATETIME2 NOT NULL,
    connection_status BIT NOT NULL,
    connection_count BIGINT NULL,
    connection_percent FLOAT NULL,
    threads_running BIGINT NULL,
    threads_connected BIGINT NULL,
    threads_created BIGINT NULL,
    threads_cached BIGINT NULL,
    qps FLOAT NULL,
    total_queries BIGINT NULL,
    uptime BIGINT NULL,
    slow_queries BIGINT NULL,
    long_query_time BIGINT NULL,
    slow_query_log BIT NULL,
    cache_hit_rate FLOAT NULL,
    tablespace_usage_percent FLOAT NULL,
    replication_status NVARCHAR(32) NULL
)";

const ALERTS_DDL: &str = "
IF OBJECT_ID('monitor_alerts', 'U') IS NULL
CREATE TABLE monitor_alerts (
    id BIGINT IDENTITY PRIMARY KEY,
    instance_name NVARCHAR(128) NOT NULL,
    ts DATETIME2 NOT NULL,
    level NVARCHAR(16) NOT NULL,
    metric NVARCHAR(64) NOT NULL,
    message NVARCHAR(MAX) NOT NULL,
    value NVARCHAR(64) NOT NULL,
    threshold NVARCHAR(64) NOT NULL
)";

pub async fn write_batch(config: &IngestionConfig, records: &[IngestRecord]) -> Result<usize> {
    let mut tib_config = Config::new();
    tib_config.host(&config.host);
    tib_config.port(config.port);
    tib_config.database(&config.database);
    tib_config.authentication(tiberius::AuthMethod::sql_server(
        &config.user,
        config.password.expose_secret(),
    ));
    tib_config.trust_cert();

    let tcp = TcpStream::connect(tib_config.get_addr())
        .await
        .context("failed to connect to SQL Server sink")?;
    tcp.set_nodelay(true).ok();
    let mut client = Client::connect(tib_config, tcp.compat_write()).await?;

    client.simple_query(MAIN_DDL).await?.into_first_result().await?;
    client.simple_query(ALERTS_DDL).await?.into_first_result().await?;

    client.simple_query("BEGIN TRANSACTION").await?;

    let mut written = 0usize;
    for record in records {
        let insert_result = client
            .execute(
                "INSERT INTO monitor_main (instance_name, ts, monitor_time, connection_status, \
                 connection_count, connection_percent, threads_running, threads_connected, \
                 threads_created, threads_cached, qps, total_queries, uptime, slow_queries, \
                 long_query_time, slow_query_log, cache_hit_rate, tablespace_usage_percent, \
                 replication_status) VALUES (@P1, @P2, @P3, @P4, @P5, @P6, @P7, @P8, @P9, @P10, \
                 @P11, @P12, @P13, @P14, @P15, @P16, @P17, @P18, @P19)",
                &[
                    &record.instance_name,
                    &record.timestamp,
                    &record.monitor_time,
                    &record.connection_status,
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
                    &record.slow_query_log,
                    &record.cache_hit_rate,
                    &record.tablespace_usage_percent,
                    &record.replication_status,
                ],
            )
            .await;

        if let Err(e) = insert_result {
            client.simple_query("ROLLBACK TRANSACTION").await.ok();
            return Err(e).context("SQL Server sink insert failed, batch rolled back");
        }

        for alert in &record.alerts {
            let alert_result = client
                .execute(
                    "INSERT INTO monitor_alerts (instance_name, ts, level, metric, message, \
                     value, threshold) VALUES (@P1, @P2, @P3, @P4, @P5, @P6, @P7)",
                    &[
                        &alert.instance_name,
                        &alert.timestamp,
                        &alert.level.as_str(),
                        &alert.metric,
                        &alert.message,
                        &alert.value,
                        &alert.threshold,
                    ],
                )
                .await;

            if let Err(e) = alert_result {
                client.simple_query("ROLLBACK TRANSACTION").await.ok();
                return Err(e).context("SQL Server alert insert failed, batch rolled back");
            }
        }

        written += 1;
    }

    client.simple_query("COMMIT TRANSACTION").await?;
    Ok(written)
}
