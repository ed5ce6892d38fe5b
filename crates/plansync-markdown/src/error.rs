//! Error types for plan markdown
//!
//! A plan either parses completely or yields every [`PlanIssue`] found in
//! one pass, wrapped in a [`ParseError`].

use plansync_model::NodeKind;

/// A single structural problem in a plan
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PlanIssue {
    /// Two phases or tasks share an id
    #[error("Duplicate {kind} ID: {id}")]
    DuplicateId { kind: NodeKind, id: String },

    /// A task depends on an id that names no phase or task
    #[error("Task {task} has unknown dependency: {dependency}")]
    UnknownDependency { task: String, dependency: String },

    /// A task id outside `[a-zA-Z0-9_-]+`
    #[error("Invalid task ID format: {id}")]
    InvalidTaskId { id: String },

    /// Task content that would not read back as written
    #[error("Task {task} has content that does not fit one task line")]
    InvalidTaskContent { task: String },
}

impl PlanIssue {
    /// Create duplicate id issue
    pub fn duplicate(kind: NodeKind, id: impl Into<String>) -> Self {
        Self::DuplicateId { kind, id: id.into() }
    }

    /// Create unknown dependency issue
    pub fn unknown_dependency(task: impl Into<String>, dependency: impl Into<String>) -> Self {
        Self::UnknownDependency {
            task: task.into(),
            dependency: dependency.into(),
        }
    }

    /// Id of the phase or task the issue is about
    #[must_use]
    pub fn subject(&self) -> &str {
        match self {
            Self::DuplicateId { id, .. } | Self::InvalidTaskId { id } => id,
            Self::UnknownDependency { task, .. } | Self::InvalidTaskContent { task } => task,
        }
    }
}

/// Parsing failed with one or more issues
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("plan has {} problem(s){}", .issues.len(), issue_lines(.issues))]
pub struct ParseError {
    issues: Vec<PlanIssue>,
}

impl ParseError {
    /// Wrap the issues found by a parse
    #[must_use]
    pub fn new(issues: Vec<PlanIssue>) -> Self {
        Self { issues }
    }

    /// Every issue, in the order found
    #[inline]
    #[must_use]
    pub fn issues(&self) -> &[PlanIssue] {
        &self.issues
    }

    /// Take the issues
    #[inline]
    #[must_use]
    pub fn into_issues(self) -> Vec<PlanIssue> {
        self.issues
    }

    /// Issue messages, one per line
    #[must_use]
    pub fn messages(&self) -> Vec<String> {
        self.issues.iter().map(ToString::to_string).collect()
    }
}

fn issue_lines(issues: &[PlanIssue]) -> String {
    issues.iter().map(|issue| format!("\n  {issue}")).collect()
}

impl From<Vec<PlanIssue>> for ParseError {
    fn from(issues: Vec<PlanIssue>) -> Self {
        Self::new(issues)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn issue_messages() {
        assert_eq!(
            PlanIssue::duplicate(NodeKind::Task, "t1").to_string(),
            "Duplicate task ID: t1"
        );
        assert_eq!(
            PlanIssue::duplicate(NodeKind::Phase, "phase_1").to_string(),
            "Duplicate phase ID: phase_1"
        );
        assert_eq!(
            PlanIssue::unknown_dependency("t1", "x").to_string(),
            "Task t1 has unknown dependency: x"
        );
        assert_eq!(
            PlanIssue::InvalidTaskId { id: "a b".into() }.to_string(),
            "Invalid task ID format: a b"
        );
        assert_eq!(
            PlanIssue::InvalidTaskContent { task: "t1".into() }.to_string(),
            "Task t1 has content that does not fit one task line"
        );
    }

    #[test]
    fn parse_error_lists_every_issue() {
        let err = ParseError::new(vec![
            PlanIssue::duplicate(NodeKind::Task, "t1"),
            PlanIssue::unknown_dependency("t2", "zz"),
        ]);
        let text = err.to_string();
        assert!(text.starts_with("plan has 2 problem(s)"));
        assert!(text.contains("Duplicate task ID: t1"));
        assert!(text.contains("Task t2 has unknown dependency: zz"));
        assert_eq!(err.messages().len(), 2);
        assert_eq!(
            text,
            "plan has 2 problem(s)\n  Duplicate task ID: t1\n  Task t2 has unknown dependency: zz"
        );
    }

    #[test]
    fn subject_names_the_offender() {
        assert_eq!(PlanIssue::unknown_dependency("t9", "x").subject(), "t9");
    }
}
