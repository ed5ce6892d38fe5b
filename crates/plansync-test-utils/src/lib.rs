//! Testing utilities for plansync workspace
//!
//! Shared plan fixtures, document builders and proptest strategies.

#![allow(missing_docs)]

use plansync_model::{Document, Phase, Task, TaskStatus};
use proptest::prelude::*;
use proptest::sample::Index;
use std::fmt::Write;

/// Two phases, every checkbox state and a cross-phase dependency
pub const SAMPLE_PLAN: &str = "# Plan: Sample\n\
\n\
## Phase 1 — Setup\n\
- [x] Init repo (id: t1)\n\
- [-] Add CI (depends: t1) (id: t2)\n\
\n\
## Phase 2 — Build\n\
- [ ] Write code (depends: t1, t2) (id: t3)\n";

/// Same as [`SAMPLE_PLAN`] with a third phase added
pub const SAMPLE_PLAN_EXTENDED: &str = "# Plan: Sample\n\
\n\
## Phase 1 — Setup\n\
- [x] Init repo (id: t1)\n\
- [-] Add CI (depends: t1) (id: t2)\n\
\n\
## Phase 2 — Build\n\
- [ ] Write code (depends: t1, t2) (id: t3)\n\
\n\
## Phase 3 — Ship\n\
- [ ] Release (depends: t3) (id: t4)\n";

/// The document [`SAMPLE_PLAN`] parses to
pub fn sample_document() -> Document {
    Document::new(vec![
        Phase::new(1, "Setup").with_tasks(vec![
            Task::new("t1", "Init repo").with_status(TaskStatus::Completed),
            Task::new("t2", "Add CI")
                .with_status(TaskStatus::InProgress)
                .with_dependencies(["t1"]),
        ]),
        Phase::new(2, "Build")
            .with_tasks(vec![Task::new("t3", "Write code").with_dependencies(["t1", "t2"])]),
    ])
}

/// Single phase holding `count` pending tasks `t1..=tN`
pub fn document_with_tasks(count: usize) -> Document {
    let tasks = (1..=count)
        .map(|i| Task::new(format!("t{i}"), format!("Task {i}")))
        .collect();
    Document::new(vec![Phase::new(1, "Work").with_tasks(tasks)])
}

/// Canonical markdown for a plan of `phases` x `tasks_per_phase`, each task
/// depending on the one before it
pub fn large_plan_markdown(phases: usize, tasks_per_phase: usize) -> String {
    let mut out = String::from("# Plan: Large\n");
    let mut previous: Option<String> = None;
    for p in 1..=phases {
        let _ = write!(out, "\n## Phase {p} — Stage {p}\n");
        for t in 1..=tasks_per_phase {
            let id = format!("p{p}t{t}");
            let deps = previous
                .as_deref()
                .map(|prev| format!(" (depends: {prev})"))
                .unwrap_or_default();
            let _ = writeln!(out, "- [ ] Task {t} of stage {p}{deps} (id: {id})");
            previous = Some(id);
        }
    }
    out
}

pub fn arb_status() -> impl Strategy<Value = TaskStatus> {
    prop::sample::select(TaskStatus::ALL.to_vec())
}

fn arb_content() -> impl Strategy<Value = String> {
    "[A-Za-z][A-Za-z0-9 ]{0,24}".prop_map(|s| s.trim().to_string())
}

/// Task text mixing plain words with annotation fragments and stray brackets
pub fn arb_task_text() -> impl Strategy<Value = String> {
    let piece = prop_oneof![
        "[A-Za-z0-9 :,.-]{0,8}",
        Just("(".to_string()),
        Just(")".to_string()),
        Just("(depends: t0)".to_string()),
        Just("(depends:".to_string()),
        Just("(depe".to_string()),
        Just("nds: t0)".to_string()),
        Just("(id: ".to_string()),
        Just("(id: t9)".to_string()),
    ];
    prop::collection::vec(piece, 0..8).prop_map(|pieces| pieces.concat())
}

fn arb_name() -> impl Strategy<Value = String> {
    "[A-Za-z][A-Za-z0-9]{0,12}"
}

type TaskShape = (TaskStatus, String, Vec<Index>);

/// Valid documents: unique ids and dependencies that resolve
pub fn arb_document() -> impl Strategy<Value = Document> {
    let task = (
        arb_status(),
        arb_content(),
        prop::collection::vec(any::<Index>(), 0..3),
    );
    let phase = (arb_name(), prop::collection::vec(task, 0..5));
    prop::collection::vec(phase, 0..4).prop_map(build_document)
}

fn build_document(shape: Vec<(String, Vec<TaskShape>)>) -> Document {
    let mut ids = Vec::new();
    let mut counter = 0usize;
    let numbered: Vec<_> = shape
        .into_iter()
        .enumerate()
        .map(|(p, (name, tasks))| {
            let number = u32::try_from(p + 1).unwrap_or(u32::MAX);
            ids.push(format!("phase_{number}"));
            let tasks: Vec<_> = tasks
                .into_iter()
                .map(|(status, content, deps)| {
                    counter += 1;
                    let id = format!("t{counter}");
                    ids.push(id.clone());
                    (id, status, content, deps)
                })
                .collect();
            (number, name, tasks)
        })
        .collect();

    let phases = numbered
        .into_iter()
        .map(|(number, name, tasks)| {
            let tasks = tasks
                .into_iter()
                .map(|(id, status, content, deps)| {
                    let deps: Vec<String> = deps.iter().map(|i| i.get(&ids).clone()).collect();
                    Task::new(id, content)
                        .with_status(status)
                        .with_dependencies(deps)
                })
                .collect();
            Phase::new(number, &name).with_tasks(tasks)
        })
        .collect();
    Document::new(phases)
}
