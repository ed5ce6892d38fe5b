//! Layout persistence
//!
//! [`LayoutStore`] is the seam between the session and wherever layouts
//! live. [`FsLayoutStore`] keeps them beside the plan as
//! `<plan path>.layout.json`.

use crate::error::PersistenceError;
use crate::history::{HistoryConfig, LayoutHistory};
use crate::merge::{generate, merge, MergeOutcome};
use crate::snapshot::LayoutSnapshot;
use async_trait::async_trait;
use plansync_model::{Fingerprint, NodeDescriptor};
use std::path::{Path, PathBuf};
use tokio::fs;

/// Suffix appended to a plan path to name its layout file
pub const LAYOUT_SUFFIX: &str = ".layout.json";

/// Layout file for a plan
#[must_use]
pub fn layout_path(plan_path: &Path) -> PathBuf {
    let mut path = plan_path.as_os_str().to_owned();
    path.push(LAYOUT_SUFFIX);
    PathBuf::from(path)
}

/// A merged snapshot with what changed
#[derive(Debug, Clone, PartialEq)]
pub struct MergedSnapshot {
    /// Snapshot bound to the new content hash
    pub snapshot: LayoutSnapshot,
    /// Ids that received a default placement
    pub added: Vec<String>,
    /// Ids pruned from the stored layout
    pub removed: Vec<String>,
}

impl MergedSnapshot {
    /// Wrap a merge outcome
    #[must_use]
    pub fn new(outcome: MergeOutcome, content_hash: Fingerprint) -> Self {
        Self {
            snapshot: LayoutSnapshot::new(outcome.layout, content_hash),
            added: outcome.added,
            removed: outcome.removed,
        }
    }
}

/// Layout persistence collaborator
#[async_trait]
pub trait LayoutStore: Send + Sync {
    /// Read the layout for a plan; a missing layout is the default snapshot
    async fn read_layout(&self, plan_path: &Path) -> Result<LayoutSnapshot, PersistenceError>;

    /// Replace the layout for a plan
    async fn write_layout(
        &self,
        plan_path: &Path,
        snapshot: &LayoutSnapshot,
    ) -> Result<(), PersistenceError>;

    /// Merge the stored layout against the current nodes
    async fn merge_layout(
        &self,
        plan_path: &Path,
        nodes: &[NodeDescriptor],
        content_hash: Fingerprint,
    ) -> Result<MergedSnapshot, PersistenceError> {
        let prior = self.read_layout(plan_path).await?;
        Ok(MergedSnapshot::new(merge(nodes, &prior.layouts), content_hash))
    }

    /// Fresh layout for the nodes, ignoring anything stored
    fn generate_layout(&self, nodes: &[NodeDescriptor], content_hash: Fingerprint) -> LayoutSnapshot {
        LayoutSnapshot::new(generate(nodes), content_hash)
    }
}

/// Layouts stored as JSON beside the plan
#[derive(Debug, Clone, Default)]
pub struct FsLayoutStore {
    history: Option<LayoutHistory>,
}

impl FsLayoutStore {
    /// Store without history snapshots
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Store that snapshots the previous layout before each overwrite
    #[must_use]
    pub fn with_history(config: HistoryConfig) -> Self {
        Self {
            history: config.enabled.then(|| LayoutHistory::new(config)),
        }
    }

    /// History in use, if any
    #[must_use]
    pub fn history(&self) -> Option<&LayoutHistory> {
        self.history.as_ref()
    }

    async fn read_existing(path: &Path) -> Result<Option<LayoutSnapshot>, PersistenceError> {
        let text = match fs::read_to_string(path).await {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(PersistenceError::io(path, e)),
        };
        serde_json::from_str(&text)
            .map(Some)
            .map_err(|e| PersistenceError::decode(path, e))
    }

    async fn snapshot_previous(&self, plan_path: &Path, path: &Path) {
        let Some(history) = &self.history else {
            return;
        };
        let previous = match Self::read_existing(path).await {
            Ok(Some(previous)) if !previous.layouts.is_empty() => previous,
            Ok(_) => return,
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "skipping layout history");
                return;
            }
        };
        if let Err(e) = history.create(plan_path, &previous, false).await {
            tracing::warn!(path = %path.display(), error = %e, "layout history snapshot failed");
        }
    }
}

#[async_trait]
impl LayoutStore for FsLayoutStore {
    async fn read_layout(&self, plan_path: &Path) -> Result<LayoutSnapshot, PersistenceError> {
        let path = layout_path(plan_path);
        Ok(Self::read_existing(&path).await?.unwrap_or_default())
    }

    async fn write_layout(
        &self,
        plan_path: &Path,
        snapshot: &LayoutSnapshot,
    ) -> Result<(), PersistenceError> {
        let path = layout_path(plan_path);
        self.snapshot_previous(plan_path, &path).await;

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| PersistenceError::io(parent, e))?;
        }
        let text = serde_json::to_string_pretty(snapshot)?;
        fs::write(&path, text)
            .await
            .map_err(|e| PersistenceError::io(&path, e))?;
        tracing::debug!(path = %path.display(), nodes = snapshot.layouts.len(), "wrote layout");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layout_path_appends_suffix() {
        assert_eq!(
            layout_path(Path::new("/path/to/plan.md")),
            PathBuf::from("/path/to/plan.md.layout.json")
        );
    }

    #[test]
    fn disabled_history_is_not_kept() {
        assert!(FsLayoutStore::with_history(HistoryConfig::disabled()).history().is_none());
        assert!(FsLayoutStore::with_history(HistoryConfig::default()).history().is_some());
    }
}
