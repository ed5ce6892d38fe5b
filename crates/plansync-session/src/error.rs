//! Session error types
//!
//! Every failure that crosses the session boundary is a value: returned to
//! the caller and, for background work, delivered to subscribers.

use plansync_layout::PersistenceError;
use plansync_markdown::{ParseError, PlanIssue};
use std::path::PathBuf;
use std::sync::Arc;

/// Failure re-reading the plan or its layout
///
/// The in-memory document and layout are left as they were.
#[derive(Debug, thiserror::Error)]
pub enum ReloadError {
    /// Plan text could not be read
    #[error("failed to read plan {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Plan text does not parse
    #[error("plan does not parse: {0}")]
    Parse(#[from] ParseError),

    /// Layout could not be read
    #[error(transparent)]
    Persistence(#[from] PersistenceError),
}

impl ReloadError {
    /// Create IO error for path
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Failure writing a save job
#[derive(Debug, thiserror::Error)]
pub enum SaveError {
    /// Plan text could not be written
    #[error("failed to write plan {}: {source}", path.display())]
    Plan {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Layout could not be written
    #[error(transparent)]
    Layout(#[from] PersistenceError),

    /// The write task stopped before reporting
    #[error("save task stopped: {reason}")]
    Aborted { reason: String },
}

/// File watcher failures
#[derive(Debug, thiserror::Error)]
pub enum WatchError {
    /// Watching could not start
    #[error("failed to watch {}: {reason}", path.display())]
    Start { path: PathBuf, reason: String },
}

/// Configuration loading failures
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Config file could not be read
    #[error("failed to read config {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Config text is invalid
    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Session errors
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// Plan could not be opened
    #[error("failed to open plan: {0}")]
    Open(#[source] ReloadError),

    /// Edit would leave the plan structurally unsound
    #[error("edit rejected: {}", join_issues(.issues))]
    InvalidEdit { issues: Vec<PlanIssue> },

    /// No placement exists for the node
    #[error("unknown node: {0}")]
    UnknownNode(String),

    /// A save job failed
    #[error("save failed: {0}")]
    Save(#[source] Arc<SaveError>),

    /// A reload failed
    #[error("reload failed: {0}")]
    Reload(#[source] Arc<ReloadError>),

    /// The watcher could not start
    #[error(transparent)]
    Watch(#[from] WatchError),

    /// Configuration problem
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The session has shut down
    #[error("session closed")]
    Closed,
}

impl SessionError {
    /// Issues carried by a rejected edit
    #[must_use]
    pub fn issues(&self) -> &[PlanIssue] {
        match self {
            Self::InvalidEdit { issues } => issues,
            _ => &[],
        }
    }
}

fn join_issues(issues: &[PlanIssue]) -> String {
    issues
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use plansync_model::NodeKind;

    #[test]
    fn invalid_edit_lists_issues() {
        let err = SessionError::InvalidEdit {
            issues: vec![
                PlanIssue::duplicate(NodeKind::Task, "t1"),
                PlanIssue::unknown_dependency("t2", "x"),
            ],
        };
        assert_eq!(
            err.to_string(),
            "edit rejected: Duplicate task ID: t1; Task t2 has unknown dependency: x"
        );
        assert_eq!(err.issues().len(), 2);
        assert!(SessionError::Closed.issues().is_empty());
    }

    #[test]
    fn reload_error_wraps_parse_batch() {
        let err = ReloadError::from(ParseError::new(vec![PlanIssue::duplicate(NodeKind::Task, "t1")]));
        assert!(err.to_string().contains("Duplicate task ID: t1"));
    }
}
