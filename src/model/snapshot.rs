use super::{Alert, Metrics};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// The unit persisted to disk by the snapshot writer and consumed by the
/// ingestion pipeline. Field names are stable: the ingestion pipeline
/// ignores unknown additional fields for forward compatibility.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Snapshot {
    pub instance_name: String,
    pub timestamp: chrono::DateTime<chrono::Utc>,
    pub monitor_time: chrono::DateTime<chrono::Utc>,
    pub stats: Metrics,
    pub alerts: Vec<Alert>,
    pub thresholds: HashMap<String, f64>,
}
