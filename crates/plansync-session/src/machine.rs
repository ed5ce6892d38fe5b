//! Sync state machine
//!
//! Pure transition logic arbitrating local edits, save completion and
//! external file changes. It performs no I/O; it only says which state comes
//! next and which [`SyncEffect`]s the owner must carry out.
//!
//! ```text
//!            edit              debounce
//!  Clean ───────────▶ Dirty ───────────▶ Saving
//!    ▲                  ▲    save failed    │
//!    │                  └───────────────────┤
//!    └──────────────────────────────────────┘ save ok
//!
//!  Clean | Dirty ── external change ──▶ ExternalChangePending(kind)
//!  Saving ── external change ──▶ (ignored, own write echo)
//! ```

use serde::{Deserialize, Serialize};
use std::fmt::{self, Display, Formatter};

/// Which file changed outside the session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeKind {
    /// The plan markdown
    Plan,
    /// The layout snapshot
    Layout,
}

impl ChangeKind {
    /// Combine two pending changes; a plan reload also re-reads the layout
    #[inline]
    #[must_use]
    pub fn absorb(self, other: Self) -> Self {
        if self == Self::Plan || other == Self::Plan {
            Self::Plan
        } else {
            Self::Layout
        }
    }
}

impl Display for ChangeKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Plan => "plan",
            Self::Layout => "layout",
        })
    }
}

/// Session sync state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(tag = "state", content = "kind", rename_all = "snake_case")]
pub enum SyncState {
    /// Memory matches disk
    #[default]
    Clean,
    /// Local edits not yet saved
    Dirty,
    /// A save is in flight
    Saving,
    /// A file changed on disk and the user has not decided yet
    ExternalChangePending(ChangeKind),
}

impl Display for SyncState {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::Clean => f.write_str("clean"),
            Self::Dirty => f.write_str("dirty"),
            Self::Saving => f.write_str("saving"),
            Self::ExternalChangePending(kind) => write!(f, "external_change_pending({kind})"),
        }
    }
}

/// Input to the state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SyncEvent {
    /// Plan edit or node move
    LocalEdit,
    /// Autosave timer elapsed
    DebounceFired,
    /// Save requested explicitly
    SaveRequested,
    /// In-flight save finished
    SaveSucceeded,
    /// In-flight save failed
    SaveFailed,
    /// A watched file changed and was not an echo
    ExternalChange(ChangeKind),
    /// User chose to reload
    ReloadRequested,
    /// User chose to keep the in-memory version
    Dismissed,
    /// Reload installed the disk version
    ReloadSucceeded,
    /// Reload could not read or parse
    ReloadFailed,
}

impl SyncEvent {
    /// Every event, for exhaustive tests
    pub const ALL: [Self; 11] = [
        Self::LocalEdit,
        Self::DebounceFired,
        Self::SaveRequested,
        Self::SaveSucceeded,
        Self::SaveFailed,
        Self::ExternalChange(ChangeKind::Plan),
        Self::ExternalChange(ChangeKind::Layout),
        Self::ReloadRequested,
        Self::Dismissed,
        Self::ReloadSucceeded,
        Self::ReloadFailed,
    ];
}

/// Work the owner must perform after a transition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SyncEffect {
    /// (Re)start the autosave timer
    ScheduleAutosave,
    /// Stop the autosave timer
    CancelAutosave,
    /// Capture and start a save job
    BeginSave,
    /// Re-read from disk
    Reload(ChangeKind),
    /// Tell the user about an external change
    ShowBanner(ChangeKind),
}

/// Outcome of handling one event
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    pub from: SyncState,
    pub to: SyncState,
    pub effects: Vec<SyncEffect>,
}

impl Transition {
    fn stay(state: SyncState) -> Self {
        Self {
            from: state,
            to: state,
            effects: Vec::new(),
        }
    }

    /// Whether the state changed
    #[inline]
    #[must_use]
    pub fn changed(&self) -> bool {
        self.from != self.to
    }

    /// Whether nothing happened at all
    #[inline]
    #[must_use]
    pub fn is_noop(&self) -> bool {
        !self.changed() && self.effects.is_empty()
    }
}

/// The sync state machine
#[derive(Debug, Clone, Default)]
pub struct SyncMachine {
    state: SyncState,
    auto_reload: bool,
    /// Edits made while saving or while a change was pending
    unsaved_edits: bool,
}

impl SyncMachine {
    /// Create in the clean state
    #[must_use]
    pub fn new(auto_reload: bool) -> Self {
        Self {
            state: SyncState::Clean,
            auto_reload,
            unsaved_edits: false,
        }
    }

    /// Current state
    #[inline]
    #[must_use]
    pub fn state(&self) -> SyncState {
        self.state
    }

    /// Whether external changes reload without asking
    #[inline]
    #[must_use]
    pub fn auto_reload(&self) -> bool {
        self.auto_reload
    }

    /// Whether edits are waiting beyond the current state
    #[inline]
    #[must_use]
    pub fn has_unsaved_edits(&self) -> bool {
        self.unsaved_edits
    }

    /// Handle one event
    pub fn handle(&mut self, event: SyncEvent) -> Transition {
        use SyncEffect::{BeginSave, CancelAutosave, Reload, ScheduleAutosave, ShowBanner};
        use SyncState::{Clean, Dirty, ExternalChangePending, Saving};

        let from = self.state;
        let (to, effects) = match (from, event) {
            (Saving, SyncEvent::LocalEdit) => {
                self.unsaved_edits = true;
                (Saving, vec![])
            }
            (_, SyncEvent::LocalEdit) => {
                self.unsaved_edits = false;
                (Dirty, vec![ScheduleAutosave])
            }

            (Dirty, SyncEvent::DebounceFired) => (Saving, vec![BeginSave]),
            (Dirty, SyncEvent::SaveRequested) => (Saving, vec![CancelAutosave, BeginSave]),

            (Saving, SyncEvent::SaveSucceeded) if self.unsaved_edits => {
                self.unsaved_edits = false;
                (Dirty, vec![ScheduleAutosave])
            }
            (Saving, SyncEvent::SaveSucceeded) => (Clean, vec![]),
            (Saving, SyncEvent::SaveFailed) => {
                self.unsaved_edits = false;
                (Dirty, vec![ScheduleAutosave])
            }

            // own write echo
            (Saving, SyncEvent::ExternalChange(_)) => (Saving, vec![]),
            (ExternalChangePending(pending), SyncEvent::ExternalChange(kind)) => {
                let merged = pending.absorb(kind);
                let effects = if merged == pending {
                    vec![]
                } else {
                    vec![ShowBanner(merged)]
                };
                (ExternalChangePending(merged), effects)
            }
            (state, SyncEvent::ExternalChange(kind)) if self.auto_reload => (state, vec![Reload(kind)]),
            (state, SyncEvent::ExternalChange(kind)) => {
                self.unsaved_edits = state == Dirty;
                (
                    ExternalChangePending(kind),
                    vec![CancelAutosave, ShowBanner(kind)],
                )
            }

            (ExternalChangePending(kind), SyncEvent::ReloadRequested) => {
                (ExternalChangePending(kind), vec![Reload(kind)])
            }
            (ExternalChangePending(_), SyncEvent::Dismissed) if self.unsaved_edits => {
                self.unsaved_edits = false;
                (Dirty, vec![ScheduleAutosave])
            }
            (ExternalChangePending(_), SyncEvent::Dismissed) => (Clean, vec![]),

            (state, SyncEvent::ReloadSucceeded) if state != Saving => {
                self.unsaved_edits = false;
                (Clean, vec![CancelAutosave])
            }

            // ReloadFailed and everything else: no transition
            _ => return Transition::stay(from),
        };

        self.state = to;
        if from != to {
            tracing::debug!(%from, %to, ?event, "sync transition");
        }
        Transition { from, to, effects }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use SyncEffect::*;
    use SyncEvent::*;

    fn machine_in(state: SyncState) -> SyncMachine {
        let mut m = SyncMachine::new(false);
        match state {
            SyncState::Clean => {}
            SyncState::Dirty => {
                m.handle(LocalEdit);
            }
            SyncState::Saving => {
                m.handle(LocalEdit);
                m.handle(DebounceFired);
            }
            SyncState::ExternalChangePending(kind) => {
                m.handle(ExternalChange(kind));
            }
        }
        assert_eq!(m.state(), state);
        m
    }

    #[test]
    fn edit_debounce_save_cycle() {
        let mut m = SyncMachine::new(false);
        assert_eq!(m.handle(LocalEdit).effects, vec![ScheduleAutosave]);
        assert_eq!(m.handle(LocalEdit).effects, vec![ScheduleAutosave]);
        let t = m.handle(DebounceFired);
        assert_eq!((t.to, t.effects), (SyncState::Saving, vec![BeginSave]));
        let t = m.handle(SaveSucceeded);
        assert_eq!(t.to, SyncState::Clean);
    }

    #[test]
    fn edit_during_save_queues_another() {
        let mut m = machine_in(SyncState::Saving);
        let t = m.handle(LocalEdit);
        assert!(t.is_noop());
        assert!(m.has_unsaved_edits());
        let t = m.handle(SaveSucceeded);
        assert_eq!((t.to, t.effects), (SyncState::Dirty, vec![ScheduleAutosave]));
        assert!(!m.has_unsaved_edits());
    }

    #[test]
    fn failed_save_stays_dirty_and_retries() {
        let mut m = machine_in(SyncState::Saving);
        let t = m.handle(SaveFailed);
        assert_eq!((t.to, t.effects), (SyncState::Dirty, vec![ScheduleAutosave]));
    }

    #[test]
    fn external_change_while_saving_is_ignored() {
        for kind in [ChangeKind::Plan, ChangeKind::Layout] {
            let mut m = machine_in(SyncState::Saving);
            assert!(m.handle(ExternalChange(kind)).is_noop());
            assert_eq!(m.state(), SyncState::Saving);
        }
    }

    #[test]
    fn external_change_raises_banner() {
        let mut m = machine_in(SyncState::Dirty);
        let t = m.handle(ExternalChange(ChangeKind::Layout));
        assert_eq!(t.to, SyncState::ExternalChangePending(ChangeKind::Layout));
        assert_eq!(t.effects, vec![CancelAutosave, ShowBanner(ChangeKind::Layout)]);
    }

    #[test]
    fn plan_change_absorbs_layout_change() {
        let mut m = machine_in(SyncState::ExternalChangePending(ChangeKind::Layout));
        let t = m.handle(ExternalChange(ChangeKind::Plan));
        assert_eq!(t.to, SyncState::ExternalChangePending(ChangeKind::Plan));
        assert_eq!(t.effects, vec![ShowBanner(ChangeKind::Plan)]);
        assert!(m.handle(ExternalChange(ChangeKind::Layout)).is_noop());
    }

    #[test]
    fn auto_reload_reloads_immediately() {
        let mut m = SyncMachine::new(true);
        let t = m.handle(ExternalChange(ChangeKind::Plan));
        assert_eq!(t.effects, vec![Reload(ChangeKind::Plan)]);
        assert_eq!(m.handle(ReloadSucceeded).to, SyncState::Clean);
    }

    #[test]
    fn reload_from_pending() {
        let mut m = machine_in(SyncState::ExternalChangePending(ChangeKind::Plan));
        assert_eq!(m.handle(ReloadRequested).effects, vec![Reload(ChangeKind::Plan)]);
        let t = m.handle(ReloadSucceeded);
        assert_eq!(t.to, SyncState::Clean);
    }

    #[test]
    fn reload_failure_changes_nothing() {
        let mut m = machine_in(SyncState::ExternalChangePending(ChangeKind::Plan));
        assert!(m.handle(ReloadFailed).is_noop());
        assert_eq!(m.state(), SyncState::ExternalChangePending(ChangeKind::Plan));
    }

    #[test]
    fn dismiss_returns_to_clean() {
        let mut m = machine_in(SyncState::ExternalChangePending(ChangeKind::Plan));
        assert_eq!(m.handle(Dismissed).to, SyncState::Clean);
    }

    #[test]
    fn dismiss_keeps_edits_made_before_the_change() {
        let mut m = machine_in(SyncState::Dirty);
        m.handle(ExternalChange(ChangeKind::Plan));
        let t = m.handle(Dismissed);
        assert_eq!((t.to, t.effects), (SyncState::Dirty, vec![ScheduleAutosave]));
    }

    #[test]
    fn save_now_only_when_dirty() {
        assert!(machine_in(SyncState::Clean).handle(SaveRequested).is_noop());
        let t = machine_in(SyncState::Dirty).handle(SaveRequested);
        assert_eq!(t.effects, vec![CancelAutosave, BeginSave]);
    }

    #[test]
    fn absorb_prefers_plan() {
        assert_eq!(ChangeKind::Layout.absorb(ChangeKind::Layout), ChangeKind::Layout);
        assert_eq!(ChangeKind::Layout.absorb(ChangeKind::Plan), ChangeKind::Plan);
        assert_eq!(ChangeKind::Plan.absorb(ChangeKind::Layout), ChangeKind::Plan);
    }
}
