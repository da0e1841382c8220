//! Canonical data model shared by every collector, the threshold engine,
//! the snapshot writer, and the ingestion pipeline.

mod alert;
mod instance;
mod metrics;
mod snapshot;

pub use alert::{Alert, AlertLevel};
pub use instance::{Credentials, EngineKind, Instance};
pub use metrics::{
    CacheHitRate, ConnectionStats, Metrics, ProcessEntry, QueryPerSecond, ReplicationState,
    ReplicationStatus, SlowQueries, TablespaceUsage,
};
pub use snapshot::Snapshot;
