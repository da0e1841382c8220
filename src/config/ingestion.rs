use crate::model::EngineKind;
use crate::threshold::Rules;
use anyhow::{Context, Result};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// The ingestion sink configuration (`monitor_to_db_config.json`), grounded
/// in `monitor_to_db.py::main()`'s `db_config` construction: file values,
/// then `<ENGINE>_*` environment overrides, then hardcoded fallbacks.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestionConfig {
    pub db_type: EngineKind,
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: SecretString,
    pub database: String,
    pub sid: Option<String>,
    #[serde(default)]
    pub rules: Rules,
    /// Root of the date-partitioned snapshot tree to read from.
    #[serde(default = "default_monitor_root")]
    pub monitor_root: PathBuf,
    /// Maximum number of not-yet-processed snapshot files read per pass.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    /// How many days of ledger buckets to union on load.
    #[serde(default = "default_lookback_days")]
    pub lookback_days: i64,
    /// Ledger buckets older than this are pruned after each save.
    #[serde(default = "default_retention_days")]
    pub retention_days: i64,
    /// Sleep between passes in continuous mode.
    #[serde(default = "default_poll_interval_seconds")]
    pub poll_interval_seconds: u64,
}

fn default_monitor_root() -> PathBuf {
    PathBuf::from("./monitor")
}

const fn default_batch_size() -> usize {
    500
}

const fn default_lookback_days() -> i64 {
    3
}

const fn default_retention_days() -> i64 {
    30
}

const fn default_poll_interval_seconds() -> u64 {
    60
}

impl IngestionConfig {
    pub async fn load(path: &Path) -> Result<Self> {
        let body = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("failed to read {}", path.display()))?;
        let mut config: Self =
            serde_json::from_str(&body).with_context(|| format!("failed to parse {}", path.display()))?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Applies `<ENGINE>_HOST|_PORT|_USER|_PASSWORD|_DATABASE|_SID`
    /// overrides, matching `monitor_to_db.py::main()` exactly.
    fn apply_env_overrides(&mut self) {
        let prefix = match self.db_type {
            EngineKind::Mysql => "MYSQL",
            EngineKind::Postgresql => "POSTGRESQL",
            EngineKind::Oracle => "ORACLE",
            EngineKind::Mssql => "MSSQL",
            EngineKind::Mongodb => "MONGODB",
            EngineKind::Dameng => "DM",
            EngineKind::Kingbase => "KB",
        };

        if let Ok(v) = std::env::var(format!("{prefix}_HOST")) {
            self.host = v;
        }
        if let Ok(v) = std::env::var(format!("{prefix}_PORT"))
            && let Ok(port) = v.parse()
        {
            self.port = port;
        }
        if let Ok(v) = std::env::var(format!("{prefix}_USER")) {
            self.user = v;
        }
        if let Ok(v) = std::env::var(format!("{prefix}_PASSWORD")) {
            self.password = SecretString::from(v);
        }
        if let Ok(v) = std::env::var(format!("{prefix}_DATABASE")) {
            self.database = v;
        }
        if let Ok(v) = std::env::var(format!("{prefix}_SID")) {
            self.sid = Some(v);
        }
    }

    /// A config dump safe to log: password masked, matching
    /// `monitor_to_db.py::main()`'s `'******'` masking before logging.
    #[must_use]
    pub fn masked_summary(&self) -> String {
        format!(
            "db_type={:?} host={} port={} user={} password=****** database={}",
            self.db_type, self.host, self.port, self.user, self.database
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn masked_summary_never_contains_the_password() {
        let config = IngestionConfig {
            db_type: EngineKind::Postgresql,
            host: "localhost".to_string(),
            port: 5432,
            user: "postgres".to_string(),
            password: SecretString::from("super-secret".to_string()),
            database: "monitor".to_string(),
            sid: None,
            rules: Rules::default(),
            monitor_root: default_monitor_root(),
            batch_size: default_batch_size(),
            lookback_days: default_lookback_days(),
            retention_days: default_retention_days(),
            poll_interval_seconds: default_poll_interval_seconds(),
        };
        assert!(!config.masked_summary().contains("super-secret"));
    }

    #[test]
    fn env_override_replaces_host() {
        temp_env::with_var("POSTGRESQL_HOST", Some("override-host"), || {
            let mut config = IngestionConfig {
                db_type: EngineKind::Postgresql,
                host: "localhost".to_string(),
                port: 5432,
                user: "postgres".to_string(),
                password: SecretString::from("x".to_string()),
                database: "monitor".to_string(),
                sid: None,
                rules: Rules::default(),
                monitor_root: default_monitor_root(),
                batch_size: default_batch_size(),
                lookback_days: default_lookback_days(),
                retention_days: default_retention_days(),
                poll_interval_seconds: default_poll_interval_seconds(),
            };
            config.apply_env_overrides();
            assert_eq!(config.host, "override-host");
        });
    }
}
