//! Projection of a [`Snapshot`] into the flat tuple-shaped record the sink
//! writer inserts, matching `monitor_to_db.py::process_file`'s `main_data`
//! 20-column projection and its per-alert tuples.

use crate::model::{Alert, Snapshot};

/// One row's worth of data for `monitor_main`, in column order.
#[derive(Debug, Clone)]
pub struct IngestRecord {
    pub instance_name: String,
    pub timestamp: chrono::DateTime<chrono::Utc>,
    pub monitor_time: chrono::DateTime<chrono::Utc>,
    pub connection_status: bool,
    pub connection_count: Option<i64>,
    pub connection_percent: Option<f64>,
    pub threads_running: Option<i64>,
    pub threads_connected: Option<i64>,
    pub threads_created: Option<i64>,
    pub threads_cached: Option<i64>,
    pub qps: Option<f64>,
    pub total_queries: Option<i64>,
    pub uptime: Option<i64>,
    pub slow_queries: Option<i64>,
    pub long_query_time: Option<i64>,
    pub slow_query_log: Option<bool>,
    pub cache_hit_rate: Option<f64>,
    /// Representative tablespace usage: the first entry's `usage_percent`
    /// (or the single MongoDB document's), matching the original's
    /// "take the first tablespace if a list" behavior.
    pub tablespace_usage_percent: Option<f64>,
    pub replication_status: Option<String>,
    pub alerts: Vec<Alert>,
}

impl IngestRecord {
    #[must_use]
    pub fn from_snapshot(snapshot: &Snapshot) -> Self {
        let stats = &snapshot.stats;
        let conn = stats.connection_stats.clone().unwrap_or_default();
        let qps = stats.qps.clone().unwrap_or_default();
        let slow = stats.slow_queries.clone().unwrap_or_default();
        let cache = stats.cache_hit_rate.clone().unwrap_or_default();

        Self {
            instance_name: snapshot.instance_name.clone(),
            timestamp: snapshot.timestamp,
            monitor_time: snapshot.monitor_time,
            connection_status: stats.connection_status,
            connection_count: conn.current,
            connection_percent: conn.percent,
            threads_running: conn.threads_running,
            threads_connected: conn.threads_connected,
            threads_created: conn.threads_created,
            threads_cached: conn.threads_cached,
            qps: qps.qps,
            total_queries: qps.total_queries,
            uptime: qps.uptime_seconds,
            slow_queries: slow.count,
            long_query_time: slow.threshold_seconds,
            slow_query_log: slow.log_enabled,
            cache_hit_rate: cache.rate_percent,
            tablespace_usage_percent: stats.tablespace_usage.first().and_then(|t| t.usage_percent),
            replication_status: stats
                .replication_status
                .as_ref()
                .and_then(|r| r.status)
                .map(|s| format!("{s:?}")),
            alerts: snapshot.alerts.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{CacheHitRate, Metrics, TablespaceUsage};
    use std::collections::HashMap;

    #[test]
    fn takes_the_first_tablespace_as_representative() {
        let snapshot = Snapshot {
            instance_name: "db1".to_string(),
            timestamp: chrono::Utc::now(),
            monitor_time: chrono::Utc::now(),
            stats: Metrics {
                connection_status: true,
                cache_hit_rate: Some(CacheHitRate {
                    rate_percent: Some(95.0),
                    hits: None,
                    misses: None,
                }),
                tablespace_usage: vec![
                    TablespaceUsage {
                        name: "USERS".to_string(),
                        usage_percent: Some(42.0),
                        ..TablespaceUsage::default()
                    },
                    TablespaceUsage {
                        name: "SYSTEM".to_string(),
                        usage_percent: Some(90.0),
                        ..TablespaceUsage::default()
                    },
                ],
                ..Metrics::default()
            },
            alerts: Vec::new(),
            thresholds: HashMap::new(),
        };

        let record = IngestRecord::from_snapshot(&snapshot);
        assert_eq!(record.tablespace_usage_percent, Some(42.0));
        assert_eq!(record.cache_hit_rate, Some(95.0));
    }
}
