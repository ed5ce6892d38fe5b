//! Pure structural edits
//!
//! Each edit takes a document and returns a new one; the input is never
//! touched. Edits are total: a target that does not exist yields an
//! unchanged copy. Nodes and edges are rebuilt by [`Document::new`].

use plansync_model::{Document, Phase, Task, TaskStatus};
use serde::{Deserialize, Serialize};

/// Set the status of one task
#[must_use]
pub fn set_task_status(document: &Document, task_id: &str, status: TaskStatus) -> Document {
    map_task(document, task_id, |task| task.status = status)
}

/// Replace the content of one task
#[must_use]
pub fn set_task_content(document: &Document, task_id: &str, content: &str) -> Document {
    let content = normalize_content(content);
    map_task(document, task_id, |task| task.content = content.clone())
}

/// Append a task to a phase
#[must_use]
pub fn add_task(document: &Document, phase_id: &str, task: Task) -> Document {
    let mut phases = document.phases().to_vec();
    let Some(phase) = phases.iter_mut().find(|p| p.id == phase_id) else {
        tracing::debug!(phase_id, "add_task: no such phase");
        return document.clone();
    };
    phase.tasks.push(Task {
        content: normalize_content(&task.content),
        ..task
    });
    Document::new(phases)
}

/// Remove a task, or a phase with all of its tasks
///
/// Dependencies on any removed id are dropped from the remaining tasks.
#[must_use]
pub fn remove_task(document: &Document, id: &str) -> Document {
    let mut removed: Vec<String> = Vec::new();
    let mut phases: Vec<Phase> = Vec::with_capacity(document.phases().len());

    for phase in document.phases() {
        if phase.id == id {
            removed.push(phase.id.clone());
            removed.extend(phase.tasks.iter().map(|t| t.id.clone()));
            continue;
        }
        let mut phase = phase.clone();
        phase.tasks.retain(|task| {
            let keep = task.id != id;
            if !keep {
                removed.push(task.id.clone());
            }
            keep
        });
        phases.push(phase);
    }

    if removed.is_empty() {
        return document.clone();
    }
    for task in phases.iter_mut().flat_map(|p| p.tasks.iter_mut()) {
        task.dependencies.retain(|dep| !removed.contains(dep));
    }
    Document::new(phases)
}

/// Append a phase numbered one past the highest existing phase
#[must_use]
pub fn add_phase(document: &Document, name: &str) -> Document {
    let next = document
        .phases()
        .iter()
        .filter_map(phase_number)
        .max()
        .map_or(1, |n| n.saturating_add(1));
    let mut phases = document.phases().to_vec();
    phases.push(Phase::new(next, name));
    Document::new(phases)
}

/// A structural edit as data
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum PlanEdit {
    SetTaskStatus { task_id: String, status: TaskStatus },
    SetTaskContent { task_id: String, content: String },
    AddTask { phase_id: String, task: Task },
    RemoveTask { id: String },
    AddPhase { name: String },
}

impl PlanEdit {
    /// Apply to a document
    #[must_use]
    pub fn apply(&self, document: &Document) -> Document {
        match self {
            Self::SetTaskStatus { task_id, status } => set_task_status(document, task_id, *status),
            Self::SetTaskContent { task_id, content } => {
                set_task_content(document, task_id, content)
            }
            Self::AddTask { phase_id, task } => add_task(document, phase_id, task.clone()),
            Self::RemoveTask { id } => remove_task(document, id),
            Self::AddPhase { name } => add_phase(document, name),
        }
    }

    /// Short name for logs
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::SetTaskStatus { .. } => "set_task_status",
            Self::SetTaskContent { .. } => "set_task_content",
            Self::AddTask { .. } => "add_task",
            Self::RemoveTask { .. } => "remove_task",
            Self::AddPhase { .. } => "add_phase",
        }
    }
}

fn map_task(document: &Document, task_id: &str, f: impl Fn(&mut Task)) -> Document {
    if document.task(task_id).is_none() {
        return document.clone();
    }
    let mut phases = document.phases().to_vec();
    for task in phases.iter_mut().flat_map(|p| p.tasks.iter_mut()) {
        if task.id == task_id {
            f(task);
        }
    }
    Document::new(phases)
}

fn phase_number(phase: &Phase) -> Option<u32> {
    phase.number().or_else(|| {
        phase
            .id
            .strip_prefix("phase_")
            .and_then(|n| n.parse().ok())
    })
}

/// Content as it will read back after a save
fn normalize_content(content: &str) -> String {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn sample() -> Document {
        Document::new(vec![
            Phase::new(1, "Setup").with_tasks(vec![
                Task::new("t1", "Init"),
                Task::new("t2", "CI").with_dependencies(["t1"]),
            ]),
            Phase::new(2, "Build").with_tasks(vec![
                Task::new("t3", "Code").with_dependencies(["t2", "phase_1"])
            ]),
        ])
    }

    #[test]
    fn status_change_updates_nodes_and_phase() {
        let before = sample();
        let after = set_task_status(&before, "t1", TaskStatus::Completed);
        assert_eq!(before.task("t1").unwrap().status, TaskStatus::Pending);
        assert_eq!(after.task("t1").unwrap().status, TaskStatus::Completed);
        assert_eq!(after.node("t1").unwrap().status, TaskStatus::Completed);
        assert_eq!(after.node("phase_1").unwrap().status, TaskStatus::InProgress);
    }

    #[test]
    fn unknown_target_is_unchanged() {
        let doc = sample();
        assert_eq!(set_task_status(&doc, "nope", TaskStatus::Completed), doc);
        assert_eq!(set_task_content(&doc, "nope", "x"), doc);
        assert_eq!(add_task(&doc, "phase_9", Task::new("t9", "x")), doc);
        assert_eq!(remove_task(&doc, "nope"), doc);
    }

    #[test]
    fn content_is_flattened() {
        let after = set_task_content(&sample(), "t2", "  Run\n  the CI ");
        assert_eq!(after.task("t2").unwrap().content, "Run the CI");
        assert_eq!(after.node("t2").unwrap().label, "Run the CI");
    }

    #[test]
    fn content_with_annotation_fails_validation() {
        let after = set_task_content(&sample(), "t1", "Init (depends: t2)");
        assert_eq!(
            crate::validate(&after),
            vec![crate::PlanIssue::InvalidTaskContent { task: "t1".into() }]
        );
    }

    #[test]
    fn add_task_appends_edges() {
        let after = add_task(&sample(), "phase_2", Task::new("t4", "Ship").with_dependencies(["t3"]));
        assert_eq!(after.phases()[1].tasks.last().unwrap().id, "t4");
        assert!(after.edges().iter().any(|e| e.id == "t3->t4"));
    }

    #[test]
    fn remove_task_drops_dangling_dependencies() {
        let after = remove_task(&sample(), "t2");
        assert!(after.task("t2").is_none());
        assert_eq!(after.task("t3").unwrap().dependencies, vec!["phase_1"]);
        assert!(after.edges().iter().all(|e| e.from_id != "t2" && e.to_id != "t2"));
    }

    #[test]
    fn remove_phase_removes_its_tasks() {
        let after = remove_task(&sample(), "phase_1");
        assert_eq!(after.phases().len(), 1);
        assert!(after.task("t1").is_none());
        assert!(after.task("t3").unwrap().dependencies.is_empty());
    }

    #[test]
    fn add_phase_numbers_past_the_highest() {
        let doc = Document::new(vec![Phase::new(1, "A"), Phase::new(4, "B")]);
        let after = add_phase(&doc, "C");
        let last = after.phases().last().unwrap();
        assert_eq!(last.id, "phase_5");
        assert_eq!(last.title, "Phase 5 — C");
        assert_eq!(add_phase(&Document::default(), "First").phases()[0].id, "phase_1");
    }

    #[test]
    fn plan_edit_serde_shape() {
        let edit: PlanEdit =
            serde_json::from_str(r#"{"op":"set_task_status","taskId":"t1","status":"completed"}"#)
                .unwrap();
        assert_eq!(
            edit,
            PlanEdit::SetTaskStatus {
                task_id: "t1".into(),
                status: TaskStatus::Completed
            }
        );
        assert_eq!(edit.apply(&sample()).task("t1").unwrap().status, TaskStatus::Completed);
    }
}
