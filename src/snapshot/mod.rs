//! Snapshot writer (C3): serializes one instance's tick to a JSON file under
//! a date-partitioned tree, atomically (write-then-rename).

use crate::model::Snapshot;
use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;

/// Writes `snapshot` under `root/<YYYY-MM-DD>/<instance>_<YYYYMMDD_HHMMSS>.json`.
///
/// Writes to a sibling `.tmp` file first, then renames into place, so a
/// concurrent reader (the ingestion pipeline) never observes a partial file
/// (P4). A same-second collision for the same instance appends a `_N`
/// counter rather than overwriting the existing file.
pub async fn write(snapshot: &Snapshot, root: &Path) -> Result<PathBuf> {
    let date_dir = root.join(snapshot.timestamp.format("%Y-%m-%d").to_string());
    tokio::fs::create_dir_all(&date_dir)
        .await
        .with_context(|| format!("failed to create snapshot directory {}", date_dir.display()))?;

    let base_name = format!(
        "{}_{}",
        snapshot.instance_name,
        snapshot.timestamp.format("%Y%m%d_%H%M%S")
    );

    let mut candidate = date_dir.join(format!("{base_name}.json"));
    let mut counter = 1;
    while tokio::fs::try_exists(&candidate).await.unwrap_or(false) {
        candidate = date_dir.join(format!("{base_name}_{counter}.json"));
        counter += 1;
    }

    let tmp_path = candidate.with_extension("json.tmp");
    let body = serde_json::to_vec_pretty(snapshot).context("failed to serialize snapshot")?;

    {
        let mut file = tokio::fs::File::create(&tmp_path)
            .await
            .with_context(|| format!("failed to create {}", tmp_path.display()))?;
        file.write_all(&body).await?;
        file.flush().await?;
    }

    tokio::fs::rename(&tmp_path, &candidate)
        .await
        .with_context(|| format!("failed to rename {} into place", tmp_path.display()))?;

    Ok(candidate)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Metrics;
    use std::collections::HashMap;
    use tempfile::tempdir;

    fn sample_snapshot(instance_name: &str) -> Snapshot {
        Snapshot {
            instance_name: instance_name.to_string(),
            timestamp: chrono::Utc::now(),
            monitor_time: chrono::Utc::now(),
            stats: Metrics::default(),
            alerts: Vec::new(),
            thresholds: HashMap::new(),
        }
    }

    #[tokio::test]
    async fn writes_a_complete_parseable_file() {
        let dir = tempdir().expect("tempdir");
        let snapshot = sample_snapshot("db1");
        let path = write(&snapshot, dir.path()).await.expect("write");

        let contents = tokio::fs::read_to_string(&path).await.expect("read back");
        let parsed: Snapshot = serde_json::from_str(&contents).expect("valid json");
        assert_eq!(parsed.instance_name, "db1");
    }

    #[tokio::test]
    async fn same_second_collision_gets_a_counter_suffix() {
        let dir = tempdir().expect("tempdir");
        let snapshot = sample_snapshot("db1");

        let first = write(&snapshot, dir.path()).await.expect("write 1");
        let second = write(&snapshot, dir.path()).await.expect("write 2");

        assert_ne!(first, second);
        assert!(second.to_string_lossy().contains("_1"));
    }

    #[tokio::test]
    async fn lands_under_the_date_partitioned_directory() {
        let dir = tempdir().expect("tempdir");
        let snapshot = sample_snapshot("db1");
        let path = write(&snapshot, dir.path()).await.expect("write");

        let expected_dir = dir.path().join(snapshot.timestamp.format("%Y-%m-%d").to_string());
        assert_eq!(path.parent(), Some(expected_dir.as_path()));
    }
}
