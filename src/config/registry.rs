use crate::model::Instance;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// The deserialized instance registry (`config.json`), grounded in
/// `scheduler.py`'s `DatabaseScheduler.load_config`/`save_config`/`add_db_instance`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InstanceRegistry {
    #[serde(default = "default_concurrent")]
    pub concurrent_execution: bool,
    #[serde(default, rename = "database_instances")]
    pub instances: Vec<Instance>,
}

const fn default_concurrent() -> bool {
    true
}

impl InstanceRegistry {
    /// Loads the registry from `path`. A missing file is not an error: the
    /// original scheduler falls back to an empty, concurrent-by-default
    /// registry and prints an example config rather than failing startup.
    pub async fn load(path: &Path) -> Result<Self> {
        match tokio::fs::read_to_string(path).await {
            Ok(body) => {
                serde_json::from_str(&body).with_context(|| format!("failed to parse {}", path.display()))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(e) => Err(e).with_context(|| format!("failed to read {}", path.display())),
        }
    }

    pub async fn save(&self, path: &Path) -> Result<()> {
        let body = serde_json::to_vec_pretty(self)?;
        tokio::fs::write(path, body)
            .await
            .with_context(|| format!("failed to write {}", path.display()))
    }

    /// Adds an instance and immediately persists the registry, mirroring
    /// `scheduler.py::add_db_instance`.
    pub async fn add_instance(&mut self, instance: Instance, path: &Path) -> Result<()> {
        self.instances.retain(|i| i.name != instance.name);
        self.instances.push(instance);
        self.save(path).await
    }

    #[must_use]
    pub fn enabled_instances(&self) -> Vec<&Instance> {
        self.instances.iter().filter(|i| i.enabled).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn missing_file_falls_back_to_empty_registry() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("does-not-exist.json");

        let registry = InstanceRegistry::load(&path).await.expect("load");
        assert!(registry.concurrent_execution);
        assert!(registry.instances.is_empty());
    }

    #[tokio::test]
    async fn round_trips_through_save_and_load() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("config.json");

        let registry = InstanceRegistry {
            concurrent_execution: false,
            instances: Vec::new(),
        };
        registry.save(&path).await.expect("save");

        let loaded = InstanceRegistry::load(&path).await.expect("load");
        assert!(!loaded.concurrent_execution);
    }
}
