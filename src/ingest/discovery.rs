//! Discovers candidate snapshot files not yet in the processed ledger,
//! newest date directory first. Grounded in `monitor_to_db.py::read_json_files`.

use super::ledger::ProcessedLedger;
use anyhow::Result;
use std::path::PathBuf;

/// Lists `*.json` files under `monitor_root/<YYYY-MM-DD>/`, newest date
/// directory first, skipping anything already in `ledger`, and stopping
/// once `batch_budget` candidates have been collected.
pub async fn discover(
    monitor_root: &std::path::Path,
    ledger: &ProcessedLedger,
    batch_budget: usize,
) -> Result<Vec<PathBuf>> {
    let mut date_dirs = Vec::new();
    let mut entries = match tokio::fs::read_dir(monitor_root).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e.into()),
    };

    while let Some(entry) = entries.next_entry().await? {
        let name = entry.file_name();
        let name = name.to_string_lossy().to_string();
        if chrono::NaiveDate::parse_from_str(&name, "%Y-%m-%d").is_ok() && entry.path().is_dir() {
            date_dirs.push(name);
        }
    }
    date_dirs.sort_unstable_by(|a, b| b.cmp(a)); // descending: newest first

    let mut candidates = Vec::new();
    'outer: for date_dir in date_dirs {
        let dir_path = monitor_root.join(&date_dir);
        let mut files = tokio::fs::read_dir(&dir_path).await?;
        while let Some(entry) = files.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            if ledger.contains(&path) {
                continue;
            }
            candidates.push(path);
            if candidates.len() >= batch_budget {
                break 'outer;
            }
        }
    }

    Ok(candidates)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn skips_files_already_in_the_ledger() {
        let dir = tempfile::tempdir().expect("tempdir");
        let date_dir = dir.path().join("2026-07-28");
        tokio::fs::create_dir_all(&date_dir).await.expect("mkdir");
        let file_a = date_dir.join("a.json");
        let file_b = date_dir.join("b.json");
        tokio::fs::write(&file_a, "{}").await.expect("write a");
        tokio::fs::write(&file_b, "{}").await.expect("write b");

        let mut ledger = ProcessedLedger::default();
        ledger.insert(file_a.clone());

        let found = discover(dir.path(), &ledger, 100).await.expect("discover");
        assert_eq!(found, vec![file_b]);
    }

    #[tokio::test]
    async fn respects_the_batch_budget() {
        let dir = tempfile::tempdir().expect("tempdir");
        let date_dir = dir.path().join("2026-07-28");
        tokio::fs::create_dir_all(&date_dir).await.expect("mkdir");
        for i in 0..5 {
            tokio::fs::write(date_dir.join(format!("f{i}.json")), "{}")
                .await
                .expect("write");
        }

        let ledger = ProcessedLedger::default();
        let found = discover(dir.path(), &ledger, 3).await.expect("discover");
        assert_eq!(found.len(), 3);
    }

    #[tokio::test]
    async fn missing_root_yields_no_candidates() {
        let dir = tempfile::tempdir().expect("tempdir");
        let missing = dir.path().join("does-not-exist");
        let ledger = ProcessedLedger::default();
        let found = discover(&missing, &ledger, 10).await.expect("discover");
        assert!(found.is_empty());
    }
}
