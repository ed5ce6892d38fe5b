//! Structural validation of a plan document
//!
//! Documents built by the parser are valid by construction. Documents built
//! by edits or deserialized from elsewhere go through [`validate`] before
//! they are written.

use crate::error::PlanIssue;
use plansync_model::grammar;
use plansync_model::{Document, NodeKind, Phase};
use std::collections::HashSet;

/// Check ids, task content and dependency resolution
///
/// Returns every issue found; an empty list means the document is valid.
#[must_use]
pub fn validate(document: &Document) -> Vec<PlanIssue> {
    let phases = document.phases();
    let mut issues = duplicate_ids(phases);
    issues.extend(
        document
            .tasks()
            .filter(|task| !grammar::is_valid_id(&task.id))
            .map(|task| PlanIssue::InvalidTaskId { id: task.id.clone() }),
    );
    issues.extend(
        document
            .tasks()
            .filter(|task| !grammar::is_plain_content(&task.content))
            .map(|task| PlanIssue::InvalidTaskContent { task: task.id.clone() }),
    );
    issues.extend(unknown_dependencies(phases));
    issues
}

/// Whether [`validate`] finds nothing
#[inline]
#[must_use]
pub fn is_valid(document: &Document) -> bool {
    validate(document).is_empty()
}

fn duplicate_ids(phases: &[Phase]) -> Vec<PlanIssue> {
    let mut seen = HashSet::new();
    let mut issues = Vec::new();
    for phase in phases {
        if !seen.insert(phase.id.as_str()) {
            issues.push(PlanIssue::duplicate(NodeKind::Phase, phase.id.as_str()));
        }
        for task in &phase.tasks {
            if !seen.insert(task.id.as_str()) {
                issues.push(PlanIssue::duplicate(NodeKind::Task, task.id.as_str()));
            }
        }
    }
    issues
}

/// Dependencies naming no phase or task, in document order
pub(crate) fn unknown_dependencies(phases: &[Phase]) -> Vec<PlanIssue> {
    let known: HashSet<&str> = phases
        .iter()
        .flat_map(|phase| {
            std::iter::once(phase.id.as_str()).chain(phase.tasks.iter().map(|t| t.id.as_str()))
        })
        .collect();

    let mut issues = Vec::new();
    for task in phases.iter().flat_map(|phase| &phase.tasks) {
        for dep in &task.dependencies {
            if !known.contains(dep.as_str()) {
                issues.push(PlanIssue::unknown_dependency(task.id.as_str(), dep.as_str()));
            }
        }
    }
    issues
}

#[cfg(test)]
mod tests {
    use super::*;
    use plansync_model::Task;

    fn doc(tasks: Vec<Task>) -> Document {
        Document::new(vec![Phase::new(1, "A").with_tasks(tasks)])
    }

    #[test]
    fn valid_document_has_no_issues() {
        let d = doc(vec![
            Task::new("t1", "one"),
            Task::new("t2", "two").with_dependencies(["t1", "phase_1"]),
        ]);
        assert!(is_valid(&d));
    }

    #[test]
    fn reports_duplicate_across_phase_and_task() {
        let d = doc(vec![Task::new("phase_1", "clash")]);
        assert_eq!(
            validate(&d),
            vec![PlanIssue::duplicate(NodeKind::Task, "phase_1")]
        );
    }

    #[test]
    fn reports_invalid_task_id() {
        let d = doc(vec![Task::new("bad id", "x")]);
        assert_eq!(
            validate(&d),
            vec![PlanIssue::InvalidTaskId { id: "bad id".into() }]
        );
    }

    #[test]
    fn reports_each_unknown_dependency() {
        let d = doc(vec![Task::new("t1", "x").with_dependencies(["a", "b"])]);
        let messages: Vec<_> = validate(&d).iter().map(ToString::to_string).collect();
        assert_eq!(
            messages,
            vec![
                "Task t1 has unknown dependency: a",
                "Task t1 has unknown dependency: b"
            ]
        );
    }

    #[test]
    fn reports_content_that_reads_back_differently() {
        let d = doc(vec![
            Task::new("t1", "one (depends: t2)"),
            Task::new("t2", "two\nlines"),
            Task::new("t3", "fine (really: yes)"),
        ]);
        assert_eq!(
            validate(&d),
            vec![
                PlanIssue::InvalidTaskContent { task: "t1".into() },
                PlanIssue::InvalidTaskContent { task: "t2".into() },
            ]
        );
    }

    #[test]
    fn self_dependency_is_not_an_issue() {
        let d = doc(vec![Task::new("t1", "x").with_dependencies(["t1"])]);
        assert!(is_valid(&d));
    }
}
