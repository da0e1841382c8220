//! MongoDB sink writer. No DDL: collections are created implicitly on first
//! insert, as in the original `monitor_to_db.py`'s Mongo branch. Writes go
//! through a session-scoped transaction when the server is a replica set;
//! a standalone instance (the common case for this sink's own metrics
//! store) falls back to a plain `insert_many` when starting a transaction
//! is rejected.

use crate::config::IngestionConfig;
use crate::ingest::record::IngestRecord;
use anyhow::{Context, Result};
use mongodb::bson::{doc, to_bson};
use mongodb::options::ClientOptions;
use mongodb::Client;
use secrecy::ExposeSecret;

pub async fn write_batch(config: &IngestionConfig, records: &[IngestRecord]) -> Result<usize> {
    let uri = format!(
        "mongodb://{}:{}@{}:{}/{}",
        config.user,
        config.password.expose_secret(),
        config.host,
        config.port,
        config.database
    );
    let opts = ClientOptions::parse(&uri)
        .await
        .context("failed to parse MongoDB sink URI")?;
    let client = Client::with_options(opts).context("failed to build MongoDB sink client")?;
    let db = client.database(&config.database);
    let main = db.collection::<mongodb::bson::Document>("monitor_main");
    let alerts = db.collection::<mongodb::bson::Document>("monitor_alerts");

    let mut session = client.start_session().await.ok();

    let main_docs: Vec<_> = records
        .iter()
        .map(|r| to_bson(&MainDoc::from(r)).and_then(|b| b.as_document().cloned().ok_or_else(bson_not_a_document)))
        .collect::<Result<_, _>>()
        .context("failed to serialize records for MongoDB sink")?;

    let alert_docs: Vec<_> = records
        .iter()
        .flat_map(|r| &r.alerts)
        .map(|a| to_bson(&AlertDoc::from(a)).and_then(|b| b.as_document().cloned().ok_or_else(bson_not_a_document)))
        .collect::<Result<_, _>>()
        .context("failed to serialize alerts for MongoDB sink")?;

    match session.as_mut() {
        Some(session) if session.start_transaction().await.is_ok() => {
            let result = async {
                if !main_docs.is_empty() {
                    main.insert_many(&main_docs).session(&mut *session).await?;
                }
                if !alert_docs.is_empty() {
                    alerts.insert_many(&alert_docs).session(&mut *session).await?;
                }
                Ok::<_, mongodb::error::Error>(())
            }
            .await;

            match result {
                Ok(()) => session.commit_transaction().await?,
                Err(e) => {
                    session.abort_transaction().await.ok();
                    return Err(e).context("MongoDB sink transaction failed, aborted");
                }
            }
        }
        _ => {
            if !main_docs.is_empty() {
                main.insert_many(&main_docs).await?;
            }
            if !alert_docs.is_empty() {
                alerts.insert_many(&alert_docs).await?;
            }
        }
    }

    Ok(records.len())
}

fn bson_not_a_document() -> mongodb::bson::ser::Error {
    mongodb::bson::ser::Error::SerializationError {
        message: "expected a BSON document".to_string(),
    }
}

#[derive(serde::Serialize)]
struct MainDoc {
    instance_name: String,
    ts: chrono::DateTime<chrono::Utc>,
    monitor_time: chrono::DateTime<chrono::Utc>,
    connection_status: bool,
    connection_count: Option<i64>,
    connection_percent: Option<f64>,
    threads_running: Option<i64>,
    threads_connected: Option<i64>,
    threads_created: Option<i64>,
    threads_cached: Option<i64>,
    qps: Option<f64>,
    total_queries: Option<i64>,
    uptime: Option<i64>,
    slow_queries: Option<i64>,
    long_query_time: Option<i64>,
    slow_query_log: Option<bool>,
    cache_hit_rate: Option<f64>,
    tablespace_usage_percent: Option<f64>,
    replication_status: Option<String>,
}

impl From<&IngestRecord> for MainDoc {
    fn from(r: &IngestRecord) -> Self {
        Self {
            instance_name: r.instance_name.clone(),
            ts: r.timestamp,
            monitor_time: r.monitor_time,
            connection_status: r.connection_status,
            connection_count: r.connection_count,
            connection_percent: r.connection_percent,
            threads_running: r.threads_running,
            threads_connected: r.threads_connected,
            threads_created: r.threads_created,
            threads_cached: r.threads_cached,
            qps: r.qps,
            total_queries: r.total_queries,
            uptime: r.uptime,
            slow_queries: r.slow_queries,
            long_query_time: r.long_query_time,
            slow_query_log: r.slow_query_log,
            cache_hit_rate: r.cache_hit_rate,
            tablespace_usage_percent: r.tablespace_usage_percent,
            replication_status: r.replication_status.clone(),
        }
    }
}

#[derive(serde::Serialize)]
struct AlertDoc {
    instance_name: String,
    ts: chrono::DateTime<chrono::Utc>,
    level: &'static str,
    metric: String,
    message: String,
    value: String,
    threshold: String,
}

impl From<&crate::model::Alert> for AlertDoc {
    fn from(a: &crate::model::Alert) -> Self {
        Self {
            instance_name: a.instance_name.clone(),
            ts: a.timestamp,
            level: a.level.as_str(),
            metric: a.metric.clone(),
            message: a.message.clone(),
            value: a.value.clone(),
            threshold: a.threshold.clone(),
        }
    }
}
