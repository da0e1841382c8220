//! MongoDB adapter, official `mongodb` async driver, grounded in
//! `original_source/database/mongodb/mongodb_monitor.py` and in
//! `other_examples/…causal…mongodb-monitoring.rs`, which references
//! `mongodb::error::Error` directly from the same crate.
#![allow(clippy::cast_precision_loss, clippy::cast_possible_truncation)]

use crate::model::{
    CacheHitRate, ConnectionStats, Instance, Metrics, ProcessEntry, QueryPerSecond,
    ReplicationState, ReplicationStatus, SlowQueries, TablespaceUsage,
};
use anyhow::{Context, Result};
use mongodb::bson::doc;
use mongodb::{Client, options::ClientOptions};

pub async fn open(instance: &Instance) -> Result<Client> {
    use secrecy::ExposeSecret;

    let uri = format!(
        "mongodb://{}:{}@{}:{}/{}",
        instance.credentials.user,
        instance.credentials.password.expose_secret(),
        instance.host,
        instance.port,
        instance.database,
    );

    let mut opts = ClientOptions::parse(&uri).await?;
    opts.connect_timeout = Some(instance.connect_timeout());
    opts.server_selection_timeout = Some(instance.connect_timeout());
    let client = Client::with_options(opts).context("failed to build MongoDB client")?;
    Ok(client)
}

pub async fn ping(client: &Client) -> Result<bool> {
    client
        .database("admin")
        .run_command(doc! {"ping": 1})
        .await?;
    Ok(true)
}

pub async fn collect(client: &Client, database: &str) -> Result<Metrics> {
    let admin = client.database("admin");
    let db = client.database(database);

    let mut metrics = Metrics {
        connection_status: true,
        ..Metrics::default()
    };

    let status = admin.run_command(doc! {"serverStatus": 1}).await;

    if let Ok(status) = &status {
        metrics.connection_stats = connection_stats(status);
        metrics.qps = qps(status);
        metrics.cache_hit_rate = cache_hit_rate(status);
        metrics.replication_status = replication_status(client).await.ok();
    }

    // Unlike the original monitor, which hardcoded slow-query count to 0 as
    // an explicit simplification, this adapter queries `currentOp` for a
    // live count of operations running longer than the threshold.
    metrics.slow_queries = slow_queries(&db, 1).await.ok();
    metrics.tablespace_usage = db_stats(&db).await.map(|t| vec![t]).unwrap_or_default();
    metrics.process_list = process_list(&db).await.unwrap_or_default();

    Ok(metrics)
}

fn connection_stats(status: &mongodb::bson::Document) -> Option<ConnectionStats> {
    let conns = status.get_document("connections").ok()?;
    let current = conns.get_i32("current").ok().map(i64::from);
    let available = conns.get_i32("available").ok().map(i64::from);
    let max = match (current, available) {
        (Some(c), Some(a)) => Some(c + a),
        _ => None,
    };

    Some(ConnectionStats {
        max,
        current,
        percent: match (current, max) {
            (Some(c), Some(m)) if m > 0 => Some(c as f64 / m as f64 * 100.0),
            _ => None,
        },
        active: None,
        threads_running: None,
        threads_connected: None,
        threads_created: None,
        threads_cached: None,
    })
}

fn qps(status: &mongodb::bson::Document) -> Option<QueryPerSecond> {
    let opcounters = status.get_document("opcounters").ok()?;
    let total: i64 = opcounters
        .iter()
        .filter_map(|(_, v)| v.as_i32().map(i64::from).or_else(|| v.as_i64()))
        .sum();
    let uptime = status.get_f64("uptime").ok().or_else(|| {
        status
            .get_i64("uptime")
            .ok()
            .map(|u| u as f64)
    });

    Some(QueryPerSecond {
        total_queries: Some(total),
        uptime_seconds: uptime.map(|u| u as i64),
        qps: uptime.filter(|u| *u > 0.0).map(|u| total as f64 / u),
    })
}

fn cache_hit_rate(status: &mongodb::bson::Document) -> Option<CacheHitRate> {
    let cache = status
        .get_document("wiredTiger")
        .ok()?
        .get_document("cache")
        .ok()?;
    let hits = cache
        .get_i64("pages requested from the cache")
        .or_else(|_| cache.get_i32("pages requested from the cache").map(i64::from))
        .ok()?;
    let misses = cache
        .get_i64("pages read into cache")
        .or_else(|_| cache.get_i32("pages read into cache").map(i64::from))
        .ok()?;

    Some(CacheHitRate {
        rate_percent: if hits + misses > 0 {
            Some(hits as f64 / (hits + misses) as f64 * 100.0)
        } else {
            None
        },
        hits: Some(hits),
        misses: Some(misses),
    })
}

async fn slow_queries(db: &mongodb::Database, threshold_seconds: i32) -> Result<SlowQueries> {
    let result = db
        .run_command(doc! {
            "currentOp": 1,
            "secs_running": { "$gte": threshold_seconds },
        })
        .await?;
    let count = result
        .get_array("inprog")
        .map(|a| a.len() as i64)
        .unwrap_or(0);

    Ok(SlowQueries {
        count: Some(count),
        threshold_seconds: Some(i64::from(threshold_seconds)),
        log_enabled: None,
    })
}

async fn db_stats(db: &mongodb::Database) -> Result<TablespaceUsage> {
    let stats = db.run_command(doc! {"dbStats": 1}).await?;
    let data_size = stats.get_f64("dataSize").unwrap_or(0.0);
    let storage_size = stats.get_f64("storageSize").unwrap_or(0.0);

    Ok(TablespaceUsage {
        name: db.name().to_string(),
        total_mb: Some(storage_size / 1024.0 / 1024.0),
        used_mb: Some(data_size / 1024.0 / 1024.0),
        free_mb: Some((storage_size - data_size) / 1024.0 / 1024.0),
        usage_percent: if storage_size > 0.0 {
            Some(data_size / storage_size * 100.0)
        } else {
            None
        },
    })
}

async fn process_list(db: &mongodb::Database) -> Result<Vec<ProcessEntry>> {
    let result = db.run_command(doc! {"currentOp": 1, "active": true}).await?;
    let Ok(ops) = result.get_array("inprog") else {
        return Ok(Vec::new());
    };

    Ok(ops
        .iter()
        .filter_map(mongodb::bson::Bson::as_document)
        .map(|op| ProcessEntry {
            session_id: op
                .get_i64("opid")
                .map(|id| id.to_string())
                .unwrap_or_default(),
            user: None,
            host: op.get_str("client").ok().map(ToString::to_string),
            state: op.get_str("op").ok().map(ToString::to_string),
            query: op.get_document("command").ok().map(ToString::to_string),
            login_time: None,
        })
        .collect())
}

/// Classifies a node's replica-set membership. A node that is not part of a
/// replica set (`replSetGetStatus` fails) reports [`ReplicationState::SingleInstance`].
async fn replication_status(client: &Client) -> Result<ReplicationStatus> {
    let admin = client.database("admin");
    let Ok(status) = admin.run_command(doc! {"replSetGetStatus": 1}).await else {
        return Ok(ReplicationStatus {
            status: Some(ReplicationState::SingleInstance),
            ..ReplicationStatus::default()
        });
    };

    let Ok(members) = status.get_array("members") else {
        return Ok(ReplicationStatus {
            status: Some(ReplicationState::SingleInstance),
            ..ReplicationStatus::default()
        });
    };

    let unhealthy = members.iter().any(|m| {
        m.as_document()
            .and_then(|d| d.get_bool("health").ok())
            .map(|healthy| !healthy)
            .unwrap_or(false)
    });

    let role = members
        .iter()
        .find_map(|m| {
            let d = m.as_document()?;
            if d.get_bool("self").unwrap_or(false) {
                d.get_str("stateStr").ok().map(ToString::to_string)
            } else {
                None
            }
        });

    Ok(ReplicationStatus {
        status: Some(if unhealthy {
            ReplicationState::Error
        } else {
            ReplicationState::Running
        }),
        role,
        lag_seconds: None,
        replicas: members
            .iter()
            .filter_map(|m| m.as_document()?.get_str("name").ok().map(ToString::to_string))
            .collect(),
    })
}
