//! Session actor
//!
//! One task owns the [`PlanController`] and serializes everything that
//! touches it: commands from [`SessionHandle`]s, the autosave timer, save
//! completions and file-watch events. Saves run as separate tasks whose
//! handle the actor awaits, so at most one write is ever in flight.

use crate::config::SessionConfig;
use crate::controller::{PlanController, SaveJob, SaveReport, SessionSnapshot};
use crate::error::{ReloadError, SaveError, SessionError};
use crate::machine::{ChangeKind, SyncEffect, SyncEvent, SyncState, Transition};
use crate::scheduler::AutosaveTimer;
use crate::subscribers::{SessionEvent, Subscribers, Subscription};
use crate::text::{FsPlanText, PlanTextIo};
use crate::watcher::{FileChangeEvent, FileWatcher, WatchSubscription};
use plansync_layout::{FsLayoutStore, LayoutMap, LayoutStore};
use plansync_markdown::{parse_plan, ParsedPlan, PlanEdit};
use plansync_model::{Fingerprint, Task, TaskStatus};
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

const COMMAND_BUFFER: usize = 100;

type Reply<T> = oneshot::Sender<Result<T, SessionError>>;

enum Command {
    Apply { edit: PlanEdit, reply: Reply<SyncState> },
    Move { id: String, x: f64, y: f64, reply: Reply<SyncState> },
    Reload { reply: Reply<SyncState> },
    Dismiss { reply: Reply<SyncState> },
    SaveNow { reply: Reply<SyncState> },
    Snapshot { reply: oneshot::Sender<SessionSnapshot> },
    Close { reply: Reply<()> },
}

/// Entry point for opening plans
#[derive(Debug, Clone, Copy)]
pub struct PlanSession;

impl PlanSession {
    /// Start configuring a session for the plan at `path`
    #[must_use]
    pub fn builder(path: impl Into<PathBuf>) -> SessionBuilder {
        SessionBuilder {
            path: path.into(),
            config: SessionConfig::default(),
            config_file: None,
            text_io: None,
            layout_store: None,
            watcher: None,
        }
    }

    /// Open with defaults: filesystem text and layouts, no watcher
    ///
    /// # Errors
    ///
    /// See [`SessionBuilder::open`].
    pub async fn open(path: impl Into<PathBuf>) -> Result<SessionHandle, SessionError> {
        Self::builder(path).open().await
    }
}

/// Session configuration and collaborators
pub struct SessionBuilder {
    path: PathBuf,
    config: SessionConfig,
    config_file: Option<PathBuf>,
    text_io: Option<Arc<dyn PlanTextIo>>,
    layout_store: Option<Arc<dyn LayoutStore>>,
    watcher: Option<Box<dyn FileWatcher>>,
}

impl SessionBuilder {
    /// With configuration
    #[must_use]
    pub fn with_config(mut self, config: SessionConfig) -> Self {
        self.config = config;
        self
    }

    /// Load configuration from a TOML file when opening
    ///
    /// Takes precedence over [`SessionBuilder::with_config`].
    #[must_use]
    pub fn with_config_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.config_file = Some(path.into());
        self
    }

    /// With a plan text collaborator
    #[must_use]
    pub fn with_text_io(mut self, text_io: Arc<dyn PlanTextIo>) -> Self {
        self.text_io = Some(text_io);
        self
    }

    /// With a layout store
    #[must_use]
    pub fn with_layout_store(mut self, store: Arc<dyn LayoutStore>) -> Self {
        self.layout_store = Some(store);
        self
    }

    /// With a file watcher
    #[must_use]
    pub fn with_watcher(mut self, watcher: Box<dyn FileWatcher>) -> Self {
        self.watcher = Some(watcher);
        self
    }

    /// Read the plan and its layout, start watching and spawn the session
    ///
    /// Must be called inside a tokio runtime.
    ///
    /// # Errors
    ///
    /// [`SessionError::Config`] if the config file cannot be loaded;
    /// [`SessionError::Open`] if the plan cannot be read or parsed or its
    /// layout cannot be read; [`SessionError::Watch`] if watching fails.
    pub async fn open(mut self) -> Result<SessionHandle, SessionError> {
        if let Some(file) = self.config_file.take() {
            self.config = SessionConfig::load(&file)?;
            tracing::debug!(path = %file.display(), "loaded session config");
        }
        let text_io = self.text_io.unwrap_or_else(|| Arc::new(FsPlanText));
        let store = self
            .layout_store
            .unwrap_or_else(|| Arc::new(FsLayoutStore::with_history(self.config.history.clone())));

        let (plan, fingerprint, disk_layout) = read_plan(text_io.as_ref(), store.as_ref(), &self.path)
            .await
            .map_err(SessionError::Open)?;
        let controller = PlanController::new(
            self.path.clone(),
            plan,
            fingerprint,
            disk_layout,
            self.config.auto_reload,
        );

        let (watch, watch_events) = match self.watcher {
            Some(watcher) => {
                let (subscription, events) = WatchSubscription::start(watcher, &self.path)?;
                (Some(subscription), Some(events))
            }
            None => (None, None),
        };

        tracing::info!(
            path = %self.path.display(),
            fingerprint = %fingerprint,
            tasks = controller.document().task_count(),
            "opened plan"
        );

        let subscribers = Subscribers::new();
        let actor = SessionActor {
            controller,
            config: self.config,
            text_io,
            store,
            subscribers: subscribers.clone(),
            timer: AutosaveTimer::new(),
            save: None,
            save_waiters: Vec::new(),
            watch,
            watch_events,
        };

        let (commands_tx, commands_rx) = mpsc::channel(COMMAND_BUFFER);
        tokio::spawn(actor.run(commands_rx));

        Ok(SessionHandle {
            commands: commands_tx,
            subscribers,
            path: Arc::new(self.path),
        })
    }
}

impl std::fmt::Debug for SessionBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionBuilder")
            .field("path", &self.path)
            .field("config", &self.config)
            .field("config_file", &self.config_file)
            .field("watcher", &self.watcher.is_some())
            .finish_non_exhaustive()
    }
}

/// Cloneable handle to a running session
#[derive(Debug, Clone)]
pub struct SessionHandle {
    commands: mpsc::Sender<Command>,
    subscribers: Subscribers,
    path: Arc<PathBuf>,
}

impl SessionHandle {
    /// Plan file
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Apply a structural edit; returns the resulting state
    ///
    /// # Errors
    ///
    /// [`SessionError::InvalidEdit`] if the result would be unsound,
    /// [`SessionError::Closed`] after close.
    pub async fn apply(&self, edit: PlanEdit) -> Result<SyncState, SessionError> {
        self.request(|reply| Command::Apply { edit, reply }).await
    }

    /// Set a task's status
    ///
    /// # Errors
    ///
    /// See [`SessionHandle::apply`].
    pub async fn set_task_status(&self, task_id: &str, status: TaskStatus) -> Result<SyncState, SessionError> {
        self.apply(PlanEdit::SetTaskStatus {
            task_id: task_id.to_string(),
            status,
        })
        .await
    }

    /// Replace a task's content
    ///
    /// # Errors
    ///
    /// See [`SessionHandle::apply`].
    pub async fn set_task_content(&self, task_id: &str, content: &str) -> Result<SyncState, SessionError> {
        self.apply(PlanEdit::SetTaskContent {
            task_id: task_id.to_string(),
            content: content.to_string(),
        })
        .await
    }

    /// Append a task to a phase
    ///
    /// # Errors
    ///
    /// See [`SessionHandle::apply`].
    pub async fn add_task(&self, phase_id: &str, task: Task) -> Result<SyncState, SessionError> {
        self.apply(PlanEdit::AddTask {
            phase_id: phase_id.to_string(),
            task,
        })
        .await
    }

    /// Remove a task or a whole phase
    ///
    /// # Errors
    ///
    /// See [`SessionHandle::apply`].
    pub async fn remove_task(&self, id: &str) -> Result<SyncState, SessionError> {
        self.apply(PlanEdit::RemoveTask { id: id.to_string() }).await
    }

    /// Append a phase
    ///
    /// # Errors
    ///
    /// See [`SessionHandle::apply`].
    pub async fn add_phase(&self, name: &str) -> Result<SyncState, SessionError> {
        self.apply(PlanEdit::AddPhase { name: name.to_string() }).await
    }

    /// Reposition a node on the canvas
    ///
    /// # Errors
    ///
    /// [`SessionError::UnknownNode`] if the node has no placement.
    pub async fn move_node(&self, id: &str, x: f64, y: f64) -> Result<SyncState, SessionError> {
        let id = id.to_string();
        self.request(|reply| Command::Move { id, x, y, reply }).await
    }

    /// Reload a pending external change; no-op in any other state
    ///
    /// # Errors
    ///
    /// [`SessionError::Reload`] if the disk version cannot be read or
    /// parsed; the change stays pending.
    pub async fn reload(&self) -> Result<SyncState, SessionError> {
        self.request(|reply| Command::Reload { reply }).await
    }

    /// Keep the in-memory version over a pending external change
    ///
    /// # Errors
    ///
    /// [`SessionError::Closed`] after close.
    pub async fn dismiss(&self) -> Result<SyncState, SessionError> {
        self.request(|reply| Command::Dismiss { reply }).await
    }

    /// Save now instead of waiting for the debounce
    ///
    /// Waits for the save to finish. Returns immediately when nothing is
    /// dirty.
    ///
    /// # Errors
    ///
    /// [`SessionError::Save`] if the write fails.
    pub async fn save_now(&self) -> Result<SyncState, SessionError> {
        self.request(|reply| Command::SaveNow { reply }).await
    }

    /// Copy of the session's current data
    ///
    /// # Errors
    ///
    /// [`SessionError::Closed`] after close.
    pub async fn snapshot(&self) -> Result<SessionSnapshot, SessionError> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::Snapshot { reply }).await?;
        rx.await.map_err(|_| SessionError::Closed)
    }

    /// Current sync state
    ///
    /// # Errors
    ///
    /// [`SessionError::Closed`] after close.
    pub async fn state(&self) -> Result<SyncState, SessionError> {
        Ok(self.snapshot().await?.state)
    }

    /// Register a callback for session events
    pub fn subscribe<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&SessionEvent) + Send + Sync + 'static,
    {
        self.subscribers.subscribe(callback)
    }

    /// Session events as a channel
    pub fn events(&self) -> (Subscription, mpsc::UnboundedReceiver<SessionEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let subscription = self.subscribers.subscribe(move |event| {
            let _ = tx.send(event.clone());
        });
        (subscription, rx)
    }

    /// Flush, stop watching and shut the session down
    ///
    /// # Errors
    ///
    /// [`SessionError::Save`] if the final flush fails,
    /// [`SessionError::Closed`] if already closed.
    pub async fn close(&self) -> Result<(), SessionError> {
        self.request(|reply| Command::Close { reply }).await
    }

    async fn request<T>(&self, command: impl FnOnce(Reply<T>) -> Command) -> Result<T, SessionError> {
        let (reply, rx) = oneshot::channel();
        self.send(command(reply)).await?;
        rx.await.map_err(|_| SessionError::Closed)?
    }

    async fn send(&self, command: Command) -> Result<(), SessionError> {
        self.commands.send(command).await.map_err(|_| SessionError::Closed)
    }
}

/// Read and parse the plan, then read its stored layout
async fn read_plan(
    text_io: &dyn PlanTextIo,
    store: &dyn LayoutStore,
    path: &Path,
) -> Result<(ParsedPlan, Fingerprint, LayoutMap), ReloadError> {
    let text = text_io
        .read_text(path)
        .await
        .map_err(|e| ReloadError::io(path, e))?;
    let plan = parse_plan(&text)?;
    let layout = store.read_layout(path).await?;
    Ok((plan, Fingerprint::of(&text), layout.layouts))
}

/// Write a job: plan text first, then the layout
async fn write_job(
    text_io: Arc<dyn PlanTextIo>,
    store: Arc<dyn LayoutStore>,
    path: PathBuf,
    job: SaveJob,
) -> SaveReport {
    let mut report = SaveReport {
        job,
        plan_written: false,
        layout_written: false,
        error: None,
    };
    if let Some(text) = &report.job.plan_text {
        if let Err(source) = text_io.write_text(&path, text).await {
            report.error = Some(SaveError::Plan { path, source });
            return report;
        }
        report.plan_written = true;
    }
    if let Some(snapshot) = &report.job.layout {
        match store.write_layout(&path, snapshot).await {
            Ok(()) => report.layout_written = true,
            Err(e) => report.error = Some(e.into()),
        }
    }
    report
}

/// A save job being written by its own task
struct InFlightSave {
    job: SaveJob,
    task: JoinHandle<SaveReport>,
}

/// Wait for the in-flight save, if any
///
/// A write task that panics or is cancelled is reported as a failed save.
async fn next_save(save: &mut Option<InFlightSave>) -> SaveReport {
    let Some(in_flight) = save.as_mut() else {
        return std::future::pending().await;
    };
    let report = match (&mut in_flight.task).await {
        Ok(report) => report,
        Err(e) => SaveReport::failed(
            in_flight.job.clone(),
            SaveError::Aborted {
                reason: e.to_string(),
            },
        ),
    };
    *save = None;
    report
}

async fn next_watch_event(
    events: &mut Option<mpsc::UnboundedReceiver<FileChangeEvent>>,
) -> Option<FileChangeEvent> {
    match events {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}

struct SessionActor {
    controller: PlanController,
    config: SessionConfig,
    text_io: Arc<dyn PlanTextIo>,
    store: Arc<dyn LayoutStore>,
    subscribers: Subscribers,
    timer: AutosaveTimer,
    save: Option<InFlightSave>,
    save_waiters: Vec<Reply<SyncState>>,
    watch: Option<WatchSubscription>,
    watch_events: Option<mpsc::UnboundedReceiver<FileChangeEvent>>,
}

impl SessionActor {
    async fn run(mut self, mut commands: mpsc::Receiver<Command>) {
        loop {
            tokio::select! {
                command = commands.recv() => match command {
                    Some(Command::Close { reply }) => {
                        let result = self.shutdown().await;
                        let _ = reply.send(result);
                        return;
                    }
                    Some(command) => self.handle_command(command).await,
                    None => {
                        if let Err(e) = self.shutdown().await {
                            tracing::error!(error = %e, "final save failed");
                        }
                        return;
                    }
                },
                report = next_save(&mut self.save) => {
                    self.finish_save(report).await;
                }
                () = self.timer.fired() => {
                    let transition = self.controller.handle(SyncEvent::DebounceFired);
                    self.apply(transition).await;
                }
                event = next_watch_event(&mut self.watch_events) => match event {
                    Some(event) => self.on_file_change(event).await,
                    None => {
                        tracing::debug!("watch channel closed");
                        self.watch_events = None;
                    }
                },
            }
        }
    }

    fn state(&self) -> SyncState {
        self.controller.state()
    }

    async fn handle_command(&mut self, command: Command) {
        match command {
            Command::Apply { edit, reply } => {
                let result = self.controller.apply_edit(&edit);
                let _ = reply.send(self.settle(result).await);
            }
            Command::Move { id, x, y, reply } => {
                let result = self.controller.move_node(&id, x, y);
                let _ = reply.send(self.settle(result).await);
            }
            Command::Reload { reply } => {
                let result = match self.state() {
                    SyncState::ExternalChangePending(_) => {
                        let transition = self.controller.handle(SyncEvent::ReloadRequested);
                        match self.apply(transition).await {
                            Some(e) => Err(SessionError::Reload(e)),
                            None => Ok(self.state()),
                        }
                    }
                    state => Ok(state),
                };
                let _ = reply.send(result);
            }
            Command::Dismiss { reply } => {
                let transition = self.controller.handle(SyncEvent::Dismissed);
                if transition.changed() {
                    tracing::info!(path = %self.controller.path().display(), "external change dismissed");
                }
                self.apply(transition).await;
                let _ = reply.send(Ok(self.state()));
            }
            Command::SaveNow { reply } => match self.state() {
                SyncState::Dirty => {
                    self.save_waiters.push(reply);
                    let transition = self.controller.handle(SyncEvent::SaveRequested);
                    self.apply(transition).await;
                }
                SyncState::Saving => self.save_waiters.push(reply),
                state => {
                    let _ = reply.send(Ok(state));
                }
            },
            Command::Snapshot { reply } => {
                let _ = reply.send(self.controller.snapshot());
            }
            // handled by the run loop
            Command::Close { reply } => {
                let _ = reply.send(Err(SessionError::Closed));
            }
        }
    }

    async fn settle(
        &mut self,
        result: Result<Option<Transition>, SessionError>,
    ) -> Result<SyncState, SessionError> {
        if let Some(transition) = result? {
            self.apply(transition).await;
        }
        Ok(self.state())
    }

    /// Announce a transition and carry out its effects, including those of
    /// any transitions they cause. Returns the last reload failure, if any.
    async fn apply(&mut self, transition: Transition) -> Option<Arc<ReloadError>> {
        let mut queue = VecDeque::from([transition]);
        let mut reload_error = None;

        while let Some(transition) = queue.pop_front() {
            if transition.changed() {
                self.subscribers.notify(&SessionEvent::StateChanged {
                    from: transition.from,
                    to: transition.to,
                });
            }
            for effect in transition.effects {
                match effect {
                    SyncEffect::ScheduleAutosave => self.timer.schedule(self.config.autosave_debounce()),
                    SyncEffect::CancelAutosave => self.timer.cancel(),
                    SyncEffect::BeginSave => self.begin_save(),
                    SyncEffect::ShowBanner(kind) => {
                        tracing::info!(path = %self.controller.path().display(), %kind, "external change detected");
                        self.subscribers.notify(&SessionEvent::ConflictDetected { kind });
                    }
                    SyncEffect::Reload(kind) => match self.reload(kind).await {
                        Ok(next) => queue.extend(next),
                        Err(e) => {
                            queue.push_back(self.controller.reload_failed());
                            reload_error = Some(e);
                        }
                    },
                }
            }
        }
        reload_error
    }

    fn begin_save(&mut self) {
        let job = self.controller.take_save_job();
        tracing::debug!(
            plan = job.plan_text.is_some(),
            layout = job.layout.is_some(),
            "save started"
        );
        let text_io = Arc::clone(&self.text_io);
        let store = Arc::clone(&self.store);
        let path = self.controller.path().to_path_buf();
        let task = tokio::spawn(write_job(text_io, store, path, job.clone()));
        self.save = Some(InFlightSave { job, task });
    }

    /// Record a finished save, answer `save_now` callers and continue
    async fn finish_save(&mut self, report: SaveReport) -> Option<Arc<SaveError>> {
        let transition = self.controller.complete_save(&report);
        let path = self.controller.path().display().to_string();

        let error = match report.error {
            None => {
                tracing::info!(
                    path,
                    fingerprint = %report.job.fingerprint,
                    plan = report.plan_written,
                    layout = report.layout_written,
                    "saved"
                );
                self.subscribers.notify(&SessionEvent::Saved {
                    fingerprint: report.job.fingerprint,
                    plan: report.plan_written,
                    layout: report.layout_written,
                });
                None
            }
            Some(e) => {
                tracing::warn!(path, error = %e, "save failed");
                let e = Arc::new(e);
                self.subscribers
                    .notify(&SessionEvent::Error(Arc::new(SessionError::Save(Arc::clone(&e)))));
                Some(e)
            }
        };

        self.apply(transition).await;
        let state = self.state();
        for waiter in self.save_waiters.drain(..) {
            let result = match &error {
                Some(e) => Err(SessionError::Save(Arc::clone(e))),
                None => Ok(state),
            };
            let _ = waiter.send(result);
        }
        error
    }

    async fn reload(&mut self, kind: ChangeKind) -> Result<Vec<Transition>, Arc<ReloadError>> {
        let path = self.controller.path().to_path_buf();
        let loaded = match kind {
            ChangeKind::Plan => read_plan(self.text_io.as_ref(), self.store.as_ref(), &path)
                .await
                .map(|(plan, fingerprint, layout)| {
                    vec![self.controller.install_plan_reload(plan, fingerprint, layout)]
                }),
            ChangeKind::Layout => match self.store.read_layout(&path).await {
                Ok(snapshot) => Ok(self.controller.install_layout_reload(snapshot.layouts)),
                Err(e) => Err(e.into()),
            },
        };

        match loaded {
            Ok(transitions) => {
                let fingerprint = self.controller.fingerprint();
                tracing::info!(path = %path.display(), %kind, %fingerprint, "reloaded");
                self.subscribers
                    .notify(&SessionEvent::Reloaded { kind, fingerprint });
                Ok(transitions)
            }
            Err(e) => {
                tracing::warn!(path = %path.display(), %kind, error = %e, "reload failed");
                let e = Arc::new(e);
                self.subscribers
                    .notify(&SessionEvent::Error(Arc::new(SessionError::Reload(Arc::clone(&e)))));
                Err(e)
            }
        }
    }

    async fn on_file_change(&mut self, event: FileChangeEvent) {
        let path = self.controller.path().to_path_buf();
        let Some(kind) = event.relevant_to(&path) else {
            tracing::debug!(path = %event.path.display(), "ignoring unrelated change");
            return;
        };
        if self.state() == SyncState::Saving {
            tracing::debug!(%kind, "ignoring change during save");
            return;
        }
        if self.is_echo(kind, &path).await {
            tracing::debug!(%kind, "ignoring echo of own write");
            return;
        }
        let transition = self.controller.external_change(kind);
        self.apply(transition).await;
    }

    /// Whether disk still holds what this session last wrote or loaded
    async fn is_echo(&mut self, kind: ChangeKind, path: &Path) -> bool {
        match kind {
            ChangeKind::Plan => match self.text_io.read_text(path).await {
                Ok(text) => self.controller.is_plan_echo(Fingerprint::of(&text)),
                Err(e) => {
                    tracing::debug!(error = %e, "plan unreadable after change");
                    false
                }
            },
            ChangeKind::Layout => match self.store.read_layout(path).await {
                Ok(snapshot) => self.controller.is_layout_echo(&snapshot.layouts),
                Err(e) => {
                    tracing::debug!(error = %e, "layout unreadable after change");
                    false
                }
            },
        }
    }

    async fn wait_for_save(&mut self) -> Result<(), SessionError> {
        if self.save.is_none() {
            return Ok(());
        }
        let report = next_save(&mut self.save).await;
        match self.finish_save(report).await {
            Some(e) => Err(SessionError::Save(e)),
            None => Ok(()),
        }
    }

    async fn shutdown(&mut self) -> Result<(), SessionError> {
        self.timer.cancel();
        let mut result = Ok(());

        if self.state() == SyncState::Saving {
            result = self.wait_for_save().await;
        }
        if self.config.save_on_close && self.state() == SyncState::Dirty {
            let transition = self.controller.handle(SyncEvent::SaveRequested);
            self.apply(transition).await;
            result = self.wait_for_save().await;
        }
        self.timer.cancel();

        self.watch_events = None;
        self.watch = None;
        for waiter in self.save_waiters.drain(..) {
            let _ = waiter.send(Err(SessionError::Closed));
        }
        tracing::info!(
            path = %self.controller.path().display(),
            state = %self.state(),
            "closed plan"
        );
        result
    }
}
