//! MySQL adapter. Sub-probe SQL mirrors `original_source/database/mysql/mysql_monitor.py`.
#![allow(clippy::cast_precision_loss, clippy::cast_possible_truncation)]

use crate::model::{
    CacheHitRate, ConnectionStats, Instance, Metrics, ProcessEntry, QueryPerSecond,
    ReplicationState, ReplicationStatus, SlowQueries, TablespaceUsage,
};
use anyhow::Result;
use sqlx::{MySqlPool, Row, mysql::MySqlPoolOptions};

pub async fn open(instance: &Instance) -> Result<MySqlPool> {
    use secrecy::ExposeSecret;

    let url = format!(
        "mysql://{}:{}@{}:{}/{}",
        instance.credentials.user,
        instance.credentials.password.expose_secret(),
        instance.host,
        instance.port,
        instance.database,
    );

    let pool = MySqlPoolOptions::new()
        .max_connections(2)
        .acquire_timeout(instance.connect_timeout())
        .connect(&url)
        .await?;
    Ok(pool)
}

pub async fn ping(pool: &MySqlPool) -> Result<bool> {
    let row = sqlx::query("SELECT 1").fetch_one(pool).await?;
    Ok(row.try_get::<i32, _>(0).unwrap_or(0) == 1)
}

pub async fn collect(pool: &MySqlPool) -> Result<Metrics> {
    let mut metrics = Metrics {
        connection_status: true,
        ..Metrics::default()
    };

    metrics.connection_stats = connection_stats(pool).await.ok();
    let (qps, uptime) = qps(pool).await.unwrap_or_default();
    metrics.qps = Some(QueryPerSecond {
        total_queries: qps,
        uptime_seconds: uptime,
        qps: match (qps, uptime) {
            (Some(q), Some(u)) if u > 0 => Some(q as f64 / u as f64),
            _ => None,
        },
    });
    metrics.slow_queries = slow_queries(pool).await.ok();
    metrics.cache_hit_rate = cache_hit_rate(pool).await.ok();
    metrics.tablespace_usage = tablespace_usage(pool).await.unwrap_or_default();
    metrics.process_list = process_list(pool).await.unwrap_or_default();
    metrics.replication_status = replication_status(pool).await.ok();

    Ok(metrics)
}

pub async fn close(pool: MySqlPool) {
    pool.close().await;
}

async fn connection_stats(pool: &MySqlPool) -> Result<ConnectionStats> {
    let max: (String, String) =
        sqlx::query_as("SHOW VARIABLES LIKE 'max_connections'")
            .fetch_one(pool)
            .await?;
    let running: (String, String) =
        sqlx::query_as("SHOW GLOBAL STATUS LIKE 'Threads_running'")
            .fetch_one(pool)
            .await?;
    let connected: (String, String) =
        sqlx::query_as("SHOW GLOBAL STATUS LIKE 'Threads_connected'")
            .fetch_one(pool)
            .await?;
    let created: (String, String) =
        sqlx::query_as("SHOW GLOBAL STATUS LIKE 'Threads_created'")
            .fetch_one(pool)
            .await?;
    let cached: (String, String) =
        sqlx::query_as("SHOW GLOBAL STATUS LIKE 'Threads_cached'")
            .fetch_one(pool)
            .await?;

    let max_val: i64 = max.1.parse().unwrap_or(0);
    let current_val: i64 = connected.1.parse().unwrap_or(0);

    Ok(ConnectionStats {
        max: Some(max_val),
        current: Some(current_val),
        percent: if max_val > 0 {
            Some(current_val as f64 / max_val as f64 * 100.0)
        } else {
            None
        },
        active: running.1.parse().ok(),
        threads_running: running.1.parse().ok(),
        threads_connected: connected.1.parse().ok(),
        threads_created: created.1.parse().ok(),
        threads_cached: cached.1.parse().ok(),
    })
}

async fn qps(pool: &MySqlPool) -> Result<(Option<i64>, Option<i64>)> {
    let queries: (String, String) = sqlx::query_as("SHOW GLOBAL STATUS LIKE 'Queries'")
        .fetch_one(pool)
        .await?;
    let uptime: (String, String) = sqlx::query_as("SHOW GLOBAL STATUS LIKE 'Uptime'")
        .fetch_one(pool)
        .await?;
    Ok((queries.1.parse().ok(), uptime.1.parse().ok()))
}

async fn slow_queries(pool: &MySqlPool) -> Result<SlowQueries> {
    let slow: (String, String) = sqlx::query_as("SHOW GLOBAL STATUS LIKE 'Slow_queries'")
        .fetch_one(pool)
        .await?;
    let threshold: (String, String) =
        sqlx::query_as("SHOW VARIABLES LIKE 'long_query_time'")
            .fetch_one(pool)
            .await?;
    let log: (String, String) = sqlx::query_as("SHOW VARIABLES LIKE 'slow_query_log'")
        .fetch_one(pool)
        .await?;
    Ok(SlowQueries {
        count: slow.1.parse().ok(),
        threshold_seconds: threshold
            .1
            .parse::<f64>()
            .ok()
            .map(|v| v as i64),
        log_enabled: Some(log.1.eq_ignore_ascii_case("ON")),
    })
}

async fn cache_hit_rate(pool: &MySqlPool) -> Result<CacheHitRate> {
    let read_requests: (String, String) =
        sqlx::query_as("SHOW GLOBAL STATUS LIKE 'Innodb_buffer_pool_read_requests'")
            .fetch_one(pool)
            .await?;
    let reads: (String, String) =
        sqlx::query_as("SHOW GLOBAL STATUS LIKE 'Innodb_buffer_pool_reads'")
            .fetch_one(pool)
            .await?;

    let req: i64 = read_requests.1.parse().unwrap_or(0);
    let phys: i64 = reads.1.parse().unwrap_or(0);

    Ok(CacheHitRate {
        rate_percent: if req > 0 {
            Some((req - phys) as f64 / req as f64 * 100.0)
        } else {
            None
        },
        hits: Some(req - phys),
        misses: Some(phys),
    })
}

async fn tablespace_usage(pool: &MySqlPool) -> Result<Vec<TablespaceUsage>> {
    let rows = sqlx::query(
        "SELECT table_schema, \
            SUM(data_length + index_length) / 1024 / 1024 AS used_mb \
         FROM information_schema.tables \
         WHERE table_schema NOT IN ('information_schema', 'performance_schema', 'mysql', 'sys') \
         GROUP BY table_schema",
    )
    .fetch_all(pool)
    .await?;

    Ok(rows
        .into_iter()
        .map(|row| {
            let used_mb: f64 = row.try_get("used_mb").unwrap_or(0.0);
            TablespaceUsage {
                name: row.try_get("table_schema").unwrap_or_default(),
                total_mb: Some(used_mb),
                used_mb: Some(used_mb),
                free_mb: None,
                usage_percent: None,
            }
        })
        .collect())
}

async fn process_list(pool: &MySqlPool) -> Result<Vec<ProcessEntry>> {
    let rows = sqlx::query("SHOW PROCESSLIST").fetch_all(pool).await?;
    Ok(rows
        .into_iter()
        .map(|row| ProcessEntry {
            session_id: row
                .try_get::<i64, _>("Id")
                .map(|id| id.to_string())
                .unwrap_or_default(),
            user: row.try_get("User").ok(),
            host: row.try_get("Host").ok(),
            state: row.try_get("State").ok(),
            query: row.try_get("Info").ok(),
            login_time: None,
        })
        .collect())
}

async fn replication_status(pool: &MySqlPool) -> Result<ReplicationStatus> {
    let rows = sqlx::query("SHOW SLAVE STATUS").fetch_all(pool).await?;
    let Some(row) = rows.first() else {
        return Ok(ReplicationStatus {
            status: Some(ReplicationState::NotASlave),
            ..ReplicationStatus::default()
        });
    };

    let io_running: String = row.try_get("Slave_IO_Running").unwrap_or_default();
    let sql_running: String = row.try_get("Slave_SQL_Running").unwrap_or_default();
    let lag: Option<i64> = row.try_get("Seconds_Behind_Master").ok();

    let status = if io_running.eq_ignore_ascii_case("Yes") && sql_running.eq_ignore_ascii_case("Yes")
    {
        ReplicationState::Running
    } else {
        ReplicationState::Error
    };

    Ok(ReplicationStatus {
        status: Some(status),
        role: Some("slave".to_string()),
        lag_seconds: lag.map(|l| l as f64),
        replicas: Vec::new(),
    })
}
