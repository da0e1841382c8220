use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConnectionStats {
    pub max: Option<i64>,
    pub current: Option<i64>,
    pub percent: Option<f64>,
    pub active: Option<i64>,
    pub threads_running: Option<i64>,
    pub threads_connected: Option<i64>,
    pub threads_created: Option<i64>,
    pub threads_cached: Option<i64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QueryPerSecond {
    pub total_queries: Option<i64>,
    pub uptime_seconds: Option<i64>,
    pub qps: Option<f64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SlowQueries {
    pub count: Option<i64>,
    pub threshold_seconds: Option<i64>,
    pub log_enabled: Option<bool>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CacheHitRate {
    pub rate_percent: Option<f64>,
    pub hits: Option<i64>,
    pub misses: Option<i64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TablespaceUsage {
    pub name: String,
    pub total_mb: Option<f64>,
    pub used_mb: Option<f64>,
    pub free_mb: Option<f64>,
    pub usage_percent: Option<f64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProcessEntry {
    pub session_id: String,
    pub user: Option<String>,
    pub host: Option<String>,
    pub state: Option<String>,
    pub query: Option<String>,
    pub login_time: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReplicationState {
    Running,
    Error,
    NotConfigured,
    NoReplicas,
    SingleInstance,
    NotASlave,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReplicationStatus {
    pub status: Option<ReplicationState>,
    pub role: Option<String>,
    pub lag_seconds: Option<f64>,
    pub replicas: Vec<String>,
}

/// The full, engine-agnostic metric record produced by one collection pass.
///
/// Every field is optional: a failed sub-probe leaves its field `None`
/// without aborting collection of the others (failure isolation).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Metrics {
    pub connection_status: bool,
    pub collection_error: Option<String>,
    pub connection_stats: Option<ConnectionStats>,
    pub qps: Option<QueryPerSecond>,
    pub slow_queries: Option<SlowQueries>,
    pub cache_hit_rate: Option<CacheHitRate>,
    pub tablespace_usage: Vec<TablespaceUsage>,
    pub process_list: Vec<ProcessEntry>,
    pub replication_status: Option<ReplicationStatus>,
}

impl Metrics {
    /// A metrics record representing a failed connection attempt.
    #[must_use]
    pub fn connection_failed(error: impl Into<String>) -> Self {
        Self {
            connection_status: false,
            collection_error: Some(error.into()),
            ..Self::default()
        }
    }
}
