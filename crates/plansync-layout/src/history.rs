//! Layout history snapshots
//!
//! Before a layout file is overwritten its previous contents are copied to
//! `<plan dir>/.plan-history/<plan file>.layout.<unix millis>.json`. Copies
//! are rate limited and rotated so only the newest few remain.

use crate::error::PersistenceError;
use crate::snapshot::LayoutSnapshot;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::fs;

/// Directory holding history snapshots, next to the plan
pub const HISTORY_DIR: &str = ".plan-history";

/// History settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct HistoryConfig {
    /// Take snapshots at all
    pub enabled: bool,
    /// Snapshots kept per plan
    pub max_snapshots: usize,
    /// Minimum spacing between unforced snapshots
    pub min_interval_secs: u64,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_snapshots: 5,
            min_interval_secs: 300,
        }
    }
}

impl HistoryConfig {
    /// With max snapshots
    #[must_use]
    pub fn with_max_snapshots(mut self, max: usize) -> Self {
        self.max_snapshots = max;
        self
    }

    /// With minimum interval
    #[must_use]
    pub fn with_min_interval_secs(mut self, secs: u64) -> Self {
        self.min_interval_secs = secs;
        self
    }

    /// Disabled history
    #[must_use]
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Self::default()
        }
    }
}

/// History directory for a plan
#[must_use]
pub fn history_dir(plan_path: &Path) -> PathBuf {
    plan_path
        .parent()
        .unwrap_or_else(|| Path::new("."))
        .join(HISTORY_DIR)
}

/// Snapshot file name prefix, `<plan file>.layout`
fn snapshot_prefix(plan_path: &Path) -> String {
    let name = plan_path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    format!("{name}.layout")
}

/// Timestamp of a snapshot file belonging to `prefix`
fn snapshot_timestamp(prefix: &str, file_name: &str) -> Option<i64> {
    file_name
        .strip_prefix(prefix)?
        .strip_prefix('.')?
        .strip_suffix(".json")?
        .parse()
        .ok()
}

/// History snapshots for plans
#[derive(Debug, Clone, Default)]
pub struct LayoutHistory {
    config: HistoryConfig,
}

impl LayoutHistory {
    /// Create with settings
    #[must_use]
    pub fn new(config: HistoryConfig) -> Self {
        Self { config }
    }

    /// Settings in use
    #[inline]
    #[must_use]
    pub fn config(&self) -> &HistoryConfig {
        &self.config
    }

    /// Snapshot files for a plan, oldest first
    ///
    /// # Errors
    ///
    /// Fails if the history directory exists but cannot be read.
    pub async fn list(&self, plan_path: &Path) -> Result<Vec<PathBuf>, PersistenceError> {
        Ok(self
            .entries(plan_path)
            .await?
            .into_iter()
            .map(|(_, path)| path)
            .collect())
    }

    /// Snapshot timestamps in unix millis, oldest first
    ///
    /// # Errors
    ///
    /// Fails if the history directory exists but cannot be read.
    pub async fn timestamps(&self, plan_path: &Path) -> Result<Vec<i64>, PersistenceError> {
        Ok(self
            .entries(plan_path)
            .await?
            .into_iter()
            .map(|(stamp, _)| stamp)
            .collect())
    }

    /// Most recent snapshot, if any
    ///
    /// # Errors
    ///
    /// Fails on read errors or if the newest file is not a snapshot.
    pub async fn latest(&self, plan_path: &Path) -> Result<Option<LayoutSnapshot>, PersistenceError> {
        let Some((_, path)) = self.entries(plan_path).await?.pop() else {
            return Ok(None);
        };
        let text = fs::read_to_string(&path)
            .await
            .map_err(|e| PersistenceError::io(&path, e))?;
        serde_json::from_str(&text)
            .map(Some)
            .map_err(|e| PersistenceError::decode(&path, e))
    }

    /// Copy `snapshot` into history
    ///
    /// Unless `force` is set, nothing is written when the newest snapshot is
    /// younger than the configured interval. Returns the new file, if any.
    ///
    /// # Errors
    ///
    /// Fails if the snapshot cannot be written or rotation fails.
    pub async fn create(
        &self,
        plan_path: &Path,
        snapshot: &LayoutSnapshot,
        force: bool,
    ) -> Result<Option<PathBuf>, PersistenceError> {
        if !self.config.enabled {
            return Ok(None);
        }

        let now = Utc::now().timestamp_millis();
        let latest = self.entries(plan_path).await?.last().map(|(stamp, _)| *stamp);
        let interval_ms = i64::try_from(self.config.min_interval_secs.saturating_mul(1000))
            .unwrap_or(i64::MAX);
        if let Some(last) = latest {
            if !force && now.saturating_sub(last) < interval_ms {
                return Ok(None);
            }
        }
        // never reuse a stamp, even within one millisecond
        let stamp = latest.map_or(now, |last| now.max(last + 1));

        let dir = history_dir(plan_path);
        fs::create_dir_all(&dir)
            .await
            .map_err(|e| PersistenceError::io(&dir, e))?;
        let path = dir.join(format!("{}.{stamp}.json", snapshot_prefix(plan_path)));
        let text = serde_json::to_string_pretty(snapshot)?;
        fs::write(&path, text)
            .await
            .map_err(|e| PersistenceError::io(&path, e))?;
        tracing::debug!(path = %path.display(), "layout history snapshot");

        self.rotate(plan_path).await?;
        Ok(Some(path))
    }

    /// Delete all but the newest `max_snapshots`; returns how many went
    ///
    /// # Errors
    ///
    /// Fails if a snapshot cannot be removed.
    pub async fn rotate(&self, plan_path: &Path) -> Result<usize, PersistenceError> {
        let entries = self.entries(plan_path).await?;
        let excess = entries.len().saturating_sub(self.config.max_snapshots);
        for (_, path) in entries.iter().take(excess) {
            fs::remove_file(path)
                .await
                .map_err(|e| PersistenceError::io(path, e))?;
        }
        Ok(excess)
    }

    /// Delete every snapshot of a plan; returns how many went
    ///
    /// # Errors
    ///
    /// Fails if a snapshot cannot be removed.
    pub async fn clear(&self, plan_path: &Path) -> Result<usize, PersistenceError> {
        let entries = self.entries(plan_path).await?;
        for (_, path) in &entries {
            fs::remove_file(path)
                .await
                .map_err(|e| PersistenceError::io(path, e))?;
        }
        Ok(entries.len())
    }

    async fn entries(&self, plan_path: &Path) -> Result<Vec<(i64, PathBuf)>, PersistenceError> {
        let dir = history_dir(plan_path);
        let mut reader = match fs::read_dir(&dir).await {
            Ok(reader) => reader,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(PersistenceError::io(&dir, e)),
        };

        let prefix = snapshot_prefix(plan_path);
        let mut entries = Vec::new();
        while let Some(entry) = reader
            .next_entry()
            .await
            .map_err(|e| PersistenceError::io(&dir, e))?
        {
            let name = entry.file_name();
            if let Some(stamp) = snapshot_timestamp(&prefix, &name.to_string_lossy()) {
                entries.push((stamp, entry.path()));
            }
        }
        entries.sort();
        Ok(entries)
    }
}
