//! File-watch collaborator
//!
//! The session does not watch the filesystem itself. A [`FileWatcher`]
//! implementation delivers [`FileChangeEvent`]s over a channel; the session
//! classifies them and drops anything that is not the open plan or its
//! layout file.

use crate::error::WatchError;
use crate::machine::ChangeKind;
use plansync_layout::{layout_path, LAYOUT_SUFFIX};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::sync::mpsc::UnboundedReceiver;

/// Kind of watched file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileType {
    Plan,
    Layout,
}

impl FileType {
    /// Classify a path by its name
    ///
    /// `*.layout.json` is a layout file, `*.md` a plan, anything else is not
    /// watched.
    #[must_use]
    pub fn classify(path: &Path) -> Option<Self> {
        let name = path.file_name()?.to_string_lossy();
        if name.ends_with(LAYOUT_SUFFIX) {
            Some(Self::Layout)
        } else if name.ends_with(".md") {
            Some(Self::Plan)
        } else {
            None
        }
    }
}

impl From<FileType> for ChangeKind {
    fn from(file_type: FileType) -> Self {
        match file_type {
            FileType::Plan => Self::Plan,
            FileType::Layout => Self::Layout,
        }
    }
}

/// A change notification
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileChangeEvent {
    pub path: PathBuf,
    pub file_type: FileType,
}

impl FileChangeEvent {
    /// Event for `path`, classified by name
    #[must_use]
    pub fn for_path(path: impl Into<PathBuf>) -> Option<Self> {
        let path = path.into();
        let file_type = FileType::classify(&path)?;
        Some(Self { path, file_type })
    }

    /// Change kind if this event concerns `plan_path` or its layout file
    #[must_use]
    pub fn relevant_to(&self, plan_path: &Path) -> Option<ChangeKind> {
        let expected = match self.file_type {
            FileType::Plan => plan_path.to_path_buf(),
            FileType::Layout => layout_path(plan_path),
        };
        (self.path == expected).then_some(self.file_type.into())
    }
}

/// Watches a plan and its layout file
pub trait FileWatcher: Send {
    /// Begin watching; events arrive on the returned channel
    ///
    /// # Errors
    ///
    /// Fails if the underlying watch cannot be established.
    fn start_watching(&mut self, path: &Path) -> Result<UnboundedReceiver<FileChangeEvent>, WatchError>;

    /// Stop watching; the event channel closes
    fn stop_watching(&mut self);

    /// Path currently watched
    fn watched_path(&self) -> Option<&Path>;
}

/// Active watch, stopped when dropped
pub struct WatchSubscription {
    watcher: Box<dyn FileWatcher>,
}

impl WatchSubscription {
    /// Start `watcher` on `path`
    ///
    /// # Errors
    ///
    /// Propagates the watcher's start failure.
    pub fn start(
        mut watcher: Box<dyn FileWatcher>,
        path: &Path,
    ) -> Result<(Self, UnboundedReceiver<FileChangeEvent>), WatchError> {
        let events = watcher.start_watching(path)?;
        tracing::debug!(path = %path.display(), "watching plan");
        Ok((Self { watcher }, events))
    }

    /// Path being watched
    #[must_use]
    pub fn watched_path(&self) -> Option<&Path> {
        self.watcher.watched_path()
    }
}

impl std::fmt::Debug for WatchSubscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WatchSubscription")
            .field("path", &self.watched_path())
            .finish()
    }
}

impl Drop for WatchSubscription {
    fn drop(&mut self) {
        self.watcher.stop_watching();
    }
}
