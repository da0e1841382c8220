//! Processed-file ledger: a per-UTC-day set of absolute snapshot paths
//! already ingested. Grounded in `monitor_to_db.py`'s
//! `load_processed_files`/`save_processed_files`/`cleanup_expired_records`.

use anyhow::{Context, Result};
use chrono::{Duration as ChronoDuration, NaiveDate, Utc};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

fn processed_dir(monitor_root: &Path) -> PathBuf {
    monitor_root.join("processed")
}

fn ledger_file(monitor_root: &Path, date: NaiveDate) -> PathBuf {
    processed_dir(monitor_root).join(format!("processed_files_{date}.json"))
}

/// The in-memory union of every path recorded across the lookback window.
#[derive(Debug, Default)]
pub struct ProcessedLedger {
    paths: HashSet<PathBuf>,
}

impl ProcessedLedger {
    #[must_use]
    pub fn contains(&self, path: &Path) -> bool {
        self.paths.contains(path)
    }

    pub fn insert(&mut self, path: PathBuf) {
        self.paths.insert(path);
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.paths.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    /// Loads the union of the last `days` daily ledger files.
    pub async fn load(monitor_root: &Path, days: i64) -> Result<Self> {
        let mut paths = HashSet::new();
        let today = Utc::now().date_naive();

        for i in 0..days {
            let date = today - ChronoDuration::days(i);
            let file = ledger_file(monitor_root, date);
            match tokio::fs::read_to_string(&file).await {
                Ok(body) => {
                    let entries: Vec<PathBuf> = serde_json::from_str(&body)
                        .with_context(|| format!("failed to parse {}", file.display()))?;
                    paths.extend(entries);
                }
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(e).with_context(|| format!("failed to read {}", file.display())),
            }
        }

        Ok(Self { paths })
    }

    /// Persists only today's and yesterday's buckets, matching
    /// `save_processed_files`'s `days_diff <= 1` rule, then prunes ledger
    /// files older than `retention_days`.
    pub async fn save(&self, monitor_root: &Path, retention_days: i64) -> Result<()> {
        let dir = processed_dir(monitor_root);
        tokio::fs::create_dir_all(&dir)
            .await
            .with_context(|| format!("failed to create {}", dir.display()))?;

        let today = Utc::now().date_naive();
        let mut buckets: std::collections::BTreeMap<NaiveDate, Vec<&PathBuf>> =
            std::collections::BTreeMap::new();

        for path in &self.paths {
            let Some(date) = date_from_path(path) else {
                continue;
            };
            let days_diff = (today - date).num_days();
            if days_diff <= 1 {
                buckets.entry(date).or_default().push(path);
            }
        }

        for (date, paths) in buckets {
            let file = ledger_file(monitor_root, date);
            let body = serde_json::to_string(&paths)?;
            tokio::fs::write(&file, body)
                .await
                .with_context(|| format!("failed to write {}", file.display()))?;
        }

        self.cleanup_expired(monitor_root, retention_days).await
    }

    async fn cleanup_expired(&self, monitor_root: &Path, retention_days: i64) -> Result<()> {
        let dir = processed_dir(monitor_root);
        let mut entries = match tokio::fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
            Err(e) => return Err(e).with_context(|| format!("failed to read {}", dir.display())),
        };

        let today = Utc::now().date_naive();
        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name();
            let name = name.to_string_lossy();
            let Some(date_str) = name
                .strip_prefix("processed_files_")
                .and_then(|s| s.strip_suffix(".json"))
            else {
                continue;
            };
            let Ok(date) = NaiveDate::parse_from_str(date_str, "%Y-%m-%d") else {
                continue;
            };
            if (today - date).num_days() > retention_days {
                let _ = tokio::fs::remove_file(entry.path()).await;
            }
        }

        Ok(())
    }
}

/// Extracts the `YYYY-MM-DD` date segment from a snapshot path
/// (`<root>/<YYYY-MM-DD>/<file>.json`), matching `save_processed_files`'s
/// `parts[-2]` extraction.
fn date_from_path(path: &Path) -> Option<NaiveDate> {
    let parent = path.parent()?.file_name()?.to_str()?;
    NaiveDate::parse_from_str(parent, "%Y-%m-%d").ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn round_trips_recent_entries() {
        let dir = tempfile::tempdir().expect("tempdir");
        let today = Utc::now().date_naive();
        let path = dir
            .path()
            .join(today.to_string())
            .join("db1_20260101_000000.json");

        let mut ledger = ProcessedLedger::default();
        ledger.insert(path.clone());
        ledger.save(dir.path(), 7).await.expect("save");

        let loaded = ProcessedLedger::load(dir.path(), 7).await.expect("load");
        assert!(loaded.contains(&path));
    }

    #[tokio::test]
    async fn old_entries_are_not_persisted_to_disk() {
        let dir = tempfile::tempdir().expect("tempdir");
        let old_date = Utc::now().date_naive() - ChronoDuration::days(10);
        let path = dir
            .path()
            .join(old_date.to_string())
            .join("db1_x.json");

        let mut ledger = ProcessedLedger::default();
        ledger.insert(path);
        ledger.save(dir.path(), 7).await.expect("save");

        let file = ledger_file(dir.path(), old_date);
        assert!(!tokio::fs::try_exists(&file).await.unwrap_or(false));
    }
}
