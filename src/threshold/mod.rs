//! Pure threshold evaluation: `evaluate(Metrics, Rules) -> Vec<Alert>`.
//! No I/O; a rule is skipped (not alerted) when its source field is `None`.

use crate::model::{Alert, AlertLevel, Metrics, ReplicationState};
use serde::{Deserialize, Serialize};

/// Declarative rule table, loaded from the instance registry or ingestion
/// config and defaulted the way the original monitor's env-var overrides
/// default (`MAX_CONNECTIONS_THRESHOLD`, `MAX_QPS_THRESHOLD`, etc.).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Rules {
    pub connection_percent_high: f64,
    pub qps_high: f64,
    pub slow_queries_present: i64,
    pub cache_hit_low: f64,
    pub tablespace_high: f64,
    pub replication_lag_high: f64,
}

impl Default for Rules {
    fn default() -> Self {
        Self {
            connection_percent_high: 80.0,
            qps_high: 1000.0,
            slow_queries_present: 0,
            cache_hit_low: 90.0,
            tablespace_high: 80.0,
            replication_lag_high: 30.0,
        }
    }
}

#[must_use]
pub fn evaluate(instance_name: &str, metrics: &Metrics, rules: &Rules) -> Vec<Alert> {
    let now = chrono::Utc::now();
    let mut alerts = Vec::new();

    if let Some(stats) = &metrics.connection_stats
        && let Some(percent) = stats.percent
        && percent > rules.connection_percent_high
    {
        alerts.push(alert(
            instance_name,
            now,
            AlertLevel::Warning,
            "connection_percent",
            format!("connection usage at {percent:.1}%"),
            percent,
            rules.connection_percent_high,
        ));
    }

    if let Some(qps) = &metrics.qps
        && let Some(value) = qps.qps
        && value > rules.qps_high
    {
        alerts.push(alert(
            instance_name,
            now,
            AlertLevel::Warning,
            "qps",
            format!("queries per second at {value:.1}"),
            value,
            rules.qps_high,
        ));
    }

    if let Some(slow) = &metrics.slow_queries
        && let Some(count) = slow.count
        && count > rules.slow_queries_present
    {
        alerts.push(alert(
            instance_name,
            now,
            AlertLevel::Warning,
            "slow_queries",
            format!("{count} slow queries observed"),
            count,
            rules.slow_queries_present,
        ));
    }

    if let Some(cache) = &metrics.cache_hit_rate
        && let Some(rate) = cache.rate_percent
        && rate < rules.cache_hit_low
    {
        alerts.push(alert(
            instance_name,
            now,
            AlertLevel::Warning,
            "cache_hit_rate",
            format!("cache hit rate at {rate:.1}%"),
            rate,
            rules.cache_hit_low,
        ));
    }

    for tablespace in &metrics.tablespace_usage {
        if let Some(percent) = tablespace.usage_percent
            && percent > rules.tablespace_high
        {
            alerts.push(alert(
                instance_name,
                now,
                AlertLevel::Warning,
                "tablespace_usage",
                format!("tablespace '{}' at {:.1}%", tablespace.name, percent),
                percent,
                rules.tablespace_high,
            ));
        }
    }

    if let Some(repl) = &metrics.replication_status {
        if let Some(lag) = repl.lag_seconds
            && lag > rules.replication_lag_high
        {
            alerts.push(alert(
                instance_name,
                now,
                AlertLevel::Warning,
                "replication_lag",
                format!("replication lag at {lag:.1}s"),
                lag,
                rules.replication_lag_high,
            ));
        }

        if matches!(repl.status, Some(ReplicationState::Error)) {
            alerts.push(Alert {
                instance_name: instance_name.to_string(),
                timestamp: now,
                level: AlertLevel::Critical,
                metric: "replication_status".to_string(),
                message: "replication is broken".to_string(),
                value: "Error".to_string(),
                threshold: "Running".to_string(),
            });
        }
    }

    alerts
}

fn alert(
    instance_name: &str,
    timestamp: chrono::DateTime<chrono::Utc>,
    level: AlertLevel,
    metric: &str,
    message: String,
    value: impl std::fmt::Display,
    threshold: impl std::fmt::Display,
) -> Alert {
    Alert {
        instance_name: instance_name.to_string(),
        timestamp,
        level,
        metric: metric.to_string(),
        message,
        value: value.to_string(),
        threshold: threshold.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::CacheHitRate;

    #[test]
    fn cache_hit_below_threshold_raises_one_alert() {
        let metrics = Metrics {
            connection_status: true,
            cache_hit_rate: Some(CacheHitRate {
                rate_percent: Some(10.0),
                hits: Some(10),
                misses: Some(90),
            }),
            ..Metrics::default()
        };
        let alerts = evaluate("db1", &metrics, &Rules::default());
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].metric, "cache_hit_rate");
        assert_eq!(alerts[0].value, "10");
    }

    #[test]
    fn null_fields_are_skipped_not_alerted() {
        let metrics = Metrics::default();
        let alerts = evaluate("db1", &metrics, &Rules::default());
        assert!(alerts.is_empty());
    }

    #[test]
    fn replication_broken_is_critical() {
        use crate::model::ReplicationStatus;
        let metrics = Metrics {
            connection_status: true,
            replication_status: Some(ReplicationStatus {
                status: Some(ReplicationState::Error),
                ..ReplicationStatus::default()
            }),
            ..Metrics::default()
        };
        let alerts = evaluate("db1", &metrics, &Rules::default());
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].level, AlertLevel::Critical);
    }

    #[test]
    fn purity_same_inputs_same_output() {
        let metrics = Metrics {
            connection_status: true,
            cache_hit_rate: Some(CacheHitRate {
                rate_percent: Some(50.0),
                hits: None,
                misses: None,
            }),
            ..Metrics::default()
        };
        let rules = Rules::default();
        let a = evaluate("db1", &metrics, &rules);
        let b = evaluate("db1", &metrics, &rules);
        assert_eq!(a.len(), b.len());
        assert_eq!(a[0].metric, b[0].metric);
    }
}
