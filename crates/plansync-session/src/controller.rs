//! Plan controller
//!
//! Owns the in-memory plan, its layout and the [`SyncMachine`]. Every change
//! goes through a method here, which updates the data and feeds the matching
//! event to the machine. No I/O happens in this module; the session actor
//! performs reads and writes and reports back.

use crate::error::{SaveError, SessionError};
use crate::machine::{ChangeKind, SyncEvent, SyncMachine, SyncState, Transition};
use plansync_layout::{merge, LayoutMap, LayoutSnapshot};
use plansync_markdown::{serialize, validate, ParsedPlan, PlanEdit, SerializeOptions};
use plansync_model::{Document, Fingerprint};
use std::path::{Path, PathBuf};

/// Everything a save must write, captured when the save begins
#[derive(Debug, Clone, PartialEq)]
pub struct SaveJob {
    /// Serialized plan, when plan content changed
    pub plan_text: Option<String>,
    /// Layout, when the layout or the plan changed
    pub layout: Option<LayoutSnapshot>,
    /// Fingerprint of the plan text on disk once the job completes
    pub fingerprint: Fingerprint,
}

impl SaveJob {
    /// Whether there is nothing to write
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.plan_text.is_none() && self.layout.is_none()
    }
}

/// How far a save job got
#[derive(Debug)]
pub struct SaveReport {
    pub job: SaveJob,
    pub plan_written: bool,
    pub layout_written: bool,
    pub error: Option<SaveError>,
}

impl SaveReport {
    /// Report for a job that wrote everything
    #[must_use]
    pub fn complete(job: SaveJob) -> Self {
        Self {
            plan_written: job.plan_text.is_some(),
            layout_written: job.layout.is_some(),
            job,
            error: None,
        }
    }

    /// Report for a job that wrote nothing
    #[must_use]
    pub fn failed(job: SaveJob, error: SaveError) -> Self {
        Self {
            job,
            plan_written: false,
            layout_written: false,
            error: Some(error),
        }
    }
}

/// Point-in-time copy of the session's data
#[derive(Debug, Clone, PartialEq)]
pub struct SessionSnapshot {
    pub state: SyncState,
    pub title: String,
    pub document: Document,
    pub layout: LayoutMap,
    /// Fingerprint of the plan text last written or loaded
    pub fingerprint: Fingerprint,
}

/// In-memory plan, layout and sync state
#[derive(Debug, Clone)]
pub struct PlanController {
    path: PathBuf,
    machine: SyncMachine,
    title: String,
    document: Document,
    layout: LayoutMap,
    /// Layout map last written or loaded
    disk_layout: LayoutMap,
    /// Fingerprint of the plan text last written or loaded
    known_fingerprint: Fingerprint,
    plan_dirty: bool,
    layout_dirty: bool,
}

impl PlanController {
    /// Controller for a freshly opened plan
    ///
    /// `disk_layout` is the stored map; positions for nodes it lacks are
    /// generated in memory and written with the next save.
    #[must_use]
    pub fn new(
        path: impl Into<PathBuf>,
        plan: ParsedPlan,
        fingerprint: Fingerprint,
        disk_layout: LayoutMap,
        auto_reload: bool,
    ) -> Self {
        let layout = merge(&plan.document.node_descriptors(), &disk_layout).layout;
        Self {
            path: path.into(),
            machine: SyncMachine::new(auto_reload),
            layout_dirty: layout != disk_layout,
            title: plan.title,
            document: plan.document,
            layout,
            disk_layout,
            known_fingerprint: fingerprint,
            plan_dirty: false,
        }
    }

    /// Plan file
    #[inline]
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Current sync state
    #[inline]
    #[must_use]
    pub fn state(&self) -> SyncState {
        self.machine.state()
    }

    /// Current document
    #[inline]
    #[must_use]
    pub fn document(&self) -> &Document {
        &self.document
    }

    /// Current layout
    #[inline]
    #[must_use]
    pub fn layout(&self) -> &LayoutMap {
        &self.layout
    }

    /// Plan title
    #[inline]
    #[must_use]
    pub fn title(&self) -> &str {
        &self.title
    }

    /// Fingerprint of the plan text last written or loaded
    #[inline]
    #[must_use]
    pub fn fingerprint(&self) -> Fingerprint {
        self.known_fingerprint
    }

    /// Whether memory holds changes not yet written
    #[must_use]
    pub fn has_unsaved_changes(&self) -> bool {
        self.plan_dirty || self.layout_dirty
    }

    /// Copy of the current data
    #[must_use]
    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            state: self.state(),
            title: self.title.clone(),
            document: self.document.clone(),
            layout: self.layout.clone(),
            fingerprint: self.known_fingerprint,
        }
    }

    /// Feed an event straight to the machine
    pub fn handle(&mut self, event: SyncEvent) -> Transition {
        self.machine.handle(event)
    }

    /// Apply a structural edit
    ///
    /// The result is validated first; an unsound result is rejected and
    /// nothing changes. Returns `None` when the edit had no effect.
    ///
    /// # Errors
    ///
    /// [`SessionError::InvalidEdit`] with the validator's issues.
    pub fn apply_edit(&mut self, edit: &PlanEdit) -> Result<Option<Transition>, SessionError> {
        let next = edit.apply(&self.document);
        let issues = validate(&next);
        if !issues.is_empty() {
            tracing::debug!(edit = edit.name(), issues = issues.len(), "edit rejected");
            return Err(SessionError::InvalidEdit { issues });
        }
        if next == self.document {
            return Ok(None);
        }

        let outcome = merge(&next.node_descriptors(), &self.layout);
        self.layout = outcome.layout;
        self.document = next;
        self.plan_dirty = true;
        Ok(Some(self.machine.handle(SyncEvent::LocalEdit)))
    }

    /// Reposition a node
    ///
    /// # Errors
    ///
    /// [`SessionError::UnknownNode`] if the node has no placement.
    #[allow(clippy::float_cmp)]
    pub fn move_node(&mut self, id: &str, x: f64, y: f64) -> Result<Option<Transition>, SessionError> {
        let Some(rect) = self.layout.get_mut(id) else {
            return Err(SessionError::UnknownNode(id.to_string()));
        };
        if rect.x == x && rect.y == y {
            return Ok(None);
        }
        *rect = rect.moved_to(x, y);
        self.layout_dirty = true;
        Ok(Some(self.machine.handle(SyncEvent::LocalEdit)))
    }

    /// Capture what the next save writes, clearing the dirty flags
    pub fn take_save_job(&mut self) -> SaveJob {
        let plan_text = self.plan_dirty.then(|| {
            serialize(&self.document, &SerializeOptions::new(self.title.clone()))
        });
        let fingerprint = plan_text
            .as_deref()
            .map_or(self.known_fingerprint, Fingerprint::of);
        let layout = (self.plan_dirty || self.layout_dirty)
            .then(|| LayoutSnapshot::new(self.layout.clone(), fingerprint));
        self.plan_dirty = false;
        self.layout_dirty = false;
        SaveJob {
            plan_text,
            layout,
            fingerprint,
        }
    }

    /// Record the outcome of a save job
    ///
    /// Whatever was not written is marked dirty again, so a failed save
    /// loses nothing.
    pub fn complete_save(&mut self, report: &SaveReport) -> Transition {
        if report.plan_written {
            self.known_fingerprint = report.job.fingerprint;
        } else if report.job.plan_text.is_some() {
            self.plan_dirty = true;
        }
        match &report.job.layout {
            Some(snapshot) if report.layout_written => self.disk_layout = snapshot.layouts.clone(),
            Some(_) => self.layout_dirty = true,
            None => {}
        }
        let event = if report.error.is_none() {
            SyncEvent::SaveSucceeded
        } else {
            SyncEvent::SaveFailed
        };
        self.machine.handle(event)
    }

    /// Whether plan text with this fingerprint is what this controller last
    /// wrote or loaded
    #[must_use]
    pub fn is_plan_echo(&self, fingerprint: Fingerprint) -> bool {
        fingerprint == self.known_fingerprint
    }

    /// Whether a layout map read from disk is what this controller last
    /// wrote or loaded
    #[must_use]
    pub fn is_layout_echo(&self, disk: &LayoutMap) -> bool {
        *disk == self.disk_layout
    }

    /// Report a non-echo external change
    pub fn external_change(&mut self, kind: ChangeKind) -> Transition {
        self.machine.handle(SyncEvent::ExternalChange(kind))
    }

    /// Install a re-read plan and layout
    ///
    /// Positions read from disk win; nodes the disk layout lacks keep their
    /// in-memory position, and new nodes get defaults.
    pub fn install_plan_reload(
        &mut self,
        plan: ParsedPlan,
        fingerprint: Fingerprint,
        disk_layout: LayoutMap,
    ) -> Transition {
        let prior = self.overlay(&disk_layout);
        self.layout = merge(&plan.document.node_descriptors(), &prior).layout;
        self.layout_dirty = self.layout != disk_layout;
        self.disk_layout = disk_layout;
        self.title = plan.title;
        self.document = plan.document;
        self.known_fingerprint = fingerprint;
        self.plan_dirty = false;
        self.machine.handle(SyncEvent::ReloadSucceeded)
    }

    /// Install a re-read layout, keeping the in-memory plan
    ///
    /// Unsaved plan edits survive and are scheduled for saving again.
    pub fn install_layout_reload(&mut self, disk_layout: LayoutMap) -> Vec<Transition> {
        let prior = self.overlay(&disk_layout);
        self.layout = merge(&self.document.node_descriptors(), &prior).layout;
        self.layout_dirty = self.layout != disk_layout;
        self.disk_layout = disk_layout;

        let mut transitions = vec![self.machine.handle(SyncEvent::ReloadSucceeded)];
        if self.plan_dirty {
            transitions.push(self.machine.handle(SyncEvent::LocalEdit));
        }
        transitions
    }

    /// Record a failed reload; data is left untouched
    pub fn reload_failed(&mut self) -> Transition {
        self.machine.handle(SyncEvent::ReloadFailed)
    }

    fn overlay(&self, disk_layout: &LayoutMap) -> LayoutMap {
        let mut prior = self.layout.clone();
        prior.extend(disk_layout.iter().map(|(id, rect)| (id.clone(), *rect)));
        prior
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::machine::SyncEffect;
    use plansync_layout::{generate, NodeLayout};
    use plansync_markdown::parse_plan;
    use plansync_model::{Task, TaskStatus};
    use plansync_test_utils::{SAMPLE_PLAN, SAMPLE_PLAN_EXTENDED};
    use pretty_assertions::assert_eq;

    fn controller() -> PlanController {
        let plan = parse_plan(SAMPLE_PLAN).unwrap();
        let layout = generate(&plan.document.node_descriptors());
        PlanController::new("/w/plan.md", plan, Fingerprint::of(SAMPLE_PLAN), layout, false)
    }

    fn status_edit(id: &str) -> PlanEdit {
        PlanEdit::SetTaskStatus {
            task_id: id.into(),
            status: TaskStatus::Completed,
        }
    }

    #[test]
    fn opens_clean_with_complete_layout() {
        let c = controller();
        assert_eq!(c.state(), SyncState::Clean);
        assert!(!c.has_unsaved_changes());
        assert_eq!(c.layout().len(), c.document().nodes().len());
    }

    #[test]
    fn missing_layout_entries_are_dirty_on_open() {
        let plan = parse_plan(SAMPLE_PLAN).unwrap();
        let c = PlanController::new("/w/plan.md", plan, Fingerprint::of(SAMPLE_PLAN), LayoutMap::new(), false);
        assert_eq!(c.state(), SyncState::Clean);
        assert!(c.has_unsaved_changes());
    }

    #[test]
    fn edit_marks_dirty_and_schedules() {
        let mut c = controller();
        let t = c.apply_edit(&status_edit("t3")).unwrap().unwrap();
        assert_eq!(t.to, SyncState::Dirty);
        assert_eq!(t.effects, vec![SyncEffect::ScheduleAutosave]);
        assert_eq!(c.document().task("t3").unwrap().status, TaskStatus::Completed);
    }

    #[test]
    fn no_op_edit_changes_nothing() {
        let mut c = controller();
        assert!(c.apply_edit(&status_edit("missing")).unwrap().is_none());
        assert_eq!(c.state(), SyncState::Clean);
    }

    #[test]
    fn duplicate_id_edit_rejected() {
        let mut c = controller();
        let before = c.document().clone();
        let err = c
            .apply_edit(&PlanEdit::AddTask {
                phase_id: "phase_2".into(),
                task: Task::new("t1", "Again"),
            })
            .unwrap_err();
        assert!(err.to_string().contains("Duplicate task ID: t1"));
        assert_eq!(c.document(), &before);
        assert_eq!(c.state(), SyncState::Clean);
    }

    #[test]
    fn content_with_dependency_annotation_rejected() {
        let mut c = controller();
        let before = c.document().clone();
        let err = c
            .apply_edit(&PlanEdit::SetTaskContent {
                task_id: "t1".into(),
                content: "Init repo (depends: t2)".into(),
            })
            .unwrap_err();
        assert_eq!(
            err.issues(),
            [plansync_markdown::PlanIssue::InvalidTaskContent { task: "t1".into() }]
        );
        assert_eq!(c.document(), &before);
    }

    #[test]
    fn added_task_gets_placement_removed_task_pruned() {
        let mut c = controller();
        c.apply_edit(&PlanEdit::AddTask {
            phase_id: "phase_2".into(),
            task: Task::new("t9", "New"),
        })
        .unwrap();
        assert!(c.layout().contains_key("t9"));
        c.apply_edit(&PlanEdit::RemoveTask { id: "t1".into() }).unwrap();
        assert!(!c.layout().contains_key("t1"));
    }

    #[test]
    fn move_only_job_writes_layout() {
        let mut c = controller();
        c.move_node("t1", 900.0, 10.0).unwrap();
        let job = c.take_save_job();
        assert!(job.plan_text.is_none());
        let snapshot = job.layout.unwrap();
        assert_eq!((snapshot.layouts["t1"].x, snapshot.layouts["t1"].y), (900.0, 10.0));
        assert!(snapshot.matches(Fingerprint::of(SAMPLE_PLAN)));
    }

    #[test]
    fn move_unknown_node_fails() {
        let mut c = controller();
        assert!(matches!(c.move_node("zz", 1.0, 1.0), Err(SessionError::UnknownNode(id)) if id == "zz"));
        assert!(c.move_node("t1", 50.0, 200.0).unwrap().is_none());
    }

    #[test]
    fn save_job_binds_layout_to_new_text() {
        let mut c = controller();
        c.apply_edit(&status_edit("t3")).unwrap();
        c.handle(SyncEvent::DebounceFired);
        let job = c.take_save_job();
        let text = job.plan_text.clone().unwrap();
        assert!(text.contains("- [x] Write code (depends: t1, t2) (id: t3)"));
        assert_eq!(job.fingerprint, Fingerprint::of(&text));
        assert!(job.layout.as_ref().unwrap().matches(job.fingerprint));

        let t = c.complete_save(&SaveReport::complete(job));
        assert_eq!(t.to, SyncState::Clean);
        assert!(c.is_plan_echo(Fingerprint::of(&text)));
        assert!(!c.has_unsaved_changes());
    }

    #[test]
    fn failed_save_keeps_changes() {
        let mut c = controller();
        c.apply_edit(&status_edit("t3")).unwrap();
        c.handle(SyncEvent::DebounceFired);
        let job = c.take_save_job();
        let report = SaveReport {
            job,
            plan_written: false,
            layout_written: false,
            error: Some(SaveError::Plan {
                path: "/w/plan.md".into(),
                source: std::io::Error::other("disk full"),
            }),
        };
        let t = c.complete_save(&report);
        assert_eq!(t.to, SyncState::Dirty);
        assert!(c.has_unsaved_changes());
        assert!(c.is_plan_echo(Fingerprint::of(SAMPLE_PLAN)));
        assert_eq!(c.document().task("t3").unwrap().status, TaskStatus::Completed);
    }

    #[test]
    fn layout_echo_compares_with_disk_map() {
        let mut c = controller();
        let disk = c.layout().clone();
        c.move_node("t1", 1.0, 1.0).unwrap();
        assert!(c.is_layout_echo(&disk));
        assert!(!c.is_layout_echo(c.layout()));
    }

    #[test]
    fn plan_reload_keeps_existing_positions() {
        let mut c = controller();
        c.move_node("t1", 700.0, 700.0).unwrap();
        c.external_change(ChangeKind::Plan);

        let plan = parse_plan(SAMPLE_PLAN_EXTENDED).unwrap();
        let t = c.install_plan_reload(plan, Fingerprint::of(SAMPLE_PLAN_EXTENDED), LayoutMap::new());
        assert_eq!(t.to, SyncState::Clean);
        assert_eq!(c.layout()["t1"], NodeLayout::new(700.0, 700.0, 280.0, 80.0));
        assert!(c.layout().contains_key("t4"));
        assert!(c.document().task("t4").is_some());
        assert_eq!(c.fingerprint(), Fingerprint::of(SAMPLE_PLAN_EXTENDED));
    }

    #[test]
    fn layout_reload_keeps_plan_edits() {
        let mut c = controller();
        c.apply_edit(&status_edit("t3")).unwrap();
        c.external_change(ChangeKind::Layout);

        let mut disk = c.layout().clone();
        disk.insert("t2".into(), NodeLayout::new(5.0, 5.0, 280.0, 80.0));
        let transitions = c.install_layout_reload(disk);
        assert_eq!(transitions.len(), 2);
        assert_eq!(c.state(), SyncState::Dirty);
        assert_eq!(c.layout()["t2"].x, 5.0);
        assert_eq!(c.document().task("t3").unwrap().status, TaskStatus::Completed);
    }

    #[test]
    fn failed_reload_leaves_data() {
        let mut c = controller();
        c.external_change(ChangeKind::Plan);
        let before = c.snapshot();
        c.reload_failed();
        assert_eq!(c.snapshot(), before);
    }
}
