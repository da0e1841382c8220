//! Per-instance previous-sample cache backing the SQL Server QPS delta
//! (`adapters::mssql::qps`'s doc comment describes why a single sample
//! can't yield a rate). Owned by the Scheduler and threaded into every
//! Instance Runner tick so the delta survives across ticks, not just within
//! one.
#![allow(clippy::cast_precision_loss)]

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;

#[derive(Clone, Default)]
pub struct QpsState {
    samples: Arc<Mutex<HashMap<String, (i64, DateTime<Utc>)>>>,
}

impl QpsState {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records `counter` for `instance_name` at the current time and
    /// returns `(counter - previous_counter) / elapsed_seconds`, or `None`
    /// on an instance's first observed tick (no previous sample), or if the
    /// counter went backwards (a server restart resets it).
    pub async fn delta(&self, instance_name: &str, counter: i64) -> Option<f64> {
        let now = Utc::now();
        let mut samples = self.samples.lock().await;
        let previous = samples.insert(instance_name.to_string(), (counter, now));

        let (prev_counter, prev_time) = previous?;
        let elapsed = (now - prev_time).num_milliseconds() as f64 / 1000.0;
        if elapsed <= 0.0 || counter < prev_counter {
            return None;
        }
        Some((counter - prev_counter) as f64 / elapsed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn first_sample_yields_no_delta() {
        let state = QpsState::new();
        assert_eq!(state.delta("db1", 100).await, None);
    }

    #[tokio::test]
    async fn a_counter_reset_yields_no_delta() {
        let state = QpsState::new();
        state.delta("db1", 1000).await;
        assert_eq!(state.delta("db1", 10).await, None);
    }

    #[tokio::test]
    async fn independent_instances_track_separately() {
        let state = QpsState::new();
        state.delta("a", 100).await;
        state.delta("b", 500).await;
        assert!(state.delta("a", 150).await.is_some());
    }
}
