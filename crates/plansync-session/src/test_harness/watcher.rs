use crate::error::WatchError;
use crate::watcher::{FileChangeEvent, FileType, FileWatcher};
use parking_lot::Mutex;
use plansync_layout::layout_path;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

#[derive(Debug, Default)]
struct Shared {
    sender: Option<UnboundedSender<FileChangeEvent>>,
    path: Option<PathBuf>,
    fail_start: bool,
}

/// Watcher driven by its [`WatchInjector`]
#[derive(Debug)]
pub struct ManualWatcher {
    path: Option<PathBuf>,
    shared: Arc<Mutex<Shared>>,
}

impl ManualWatcher {
    /// Watcher and the injector that feeds it
    #[must_use]
    #[allow(clippy::new_ret_no_self)]
    pub fn new() -> (Self, WatchInjector) {
        let shared = Arc::new(Mutex::new(Shared::default()));
        let watcher = Self {
            path: None,
            shared: Arc::clone(&shared),
        };
        (watcher, WatchInjector { shared })
    }
}

impl FileWatcher for ManualWatcher {
    fn start_watching(&mut self, path: &Path) -> Result<UnboundedReceiver<FileChangeEvent>, WatchError> {
        let mut shared = self.shared.lock();
        if shared.fail_start {
            return Err(WatchError::Start {
                path: path.to_path_buf(),
                reason: "injected start failure".to_string(),
            });
        }
        let (tx, rx) = mpsc::unbounded_channel();
        shared.sender = Some(tx);
        shared.path = Some(path.to_path_buf());
        self.path = Some(path.to_path_buf());
        Ok(rx)
    }

    fn stop_watching(&mut self) {
        let mut shared = self.shared.lock();
        shared.sender = None;
        shared.path = None;
        self.path = None;
    }

    fn watched_path(&self) -> Option<&Path> {
        self.path.as_deref()
    }
}

/// Emits change events into a [`ManualWatcher`]
#[derive(Debug, Clone)]
pub struct WatchInjector {
    shared: Arc<Mutex<Shared>>,
}

impl WatchInjector {
    /// Deliver an event; `false` if nothing is watching
    pub fn emit(&self, event: FileChangeEvent) -> bool {
        self.shared
            .lock()
            .sender
            .as_ref()
            .is_some_and(|tx| tx.send(event).is_ok())
    }

    /// Report a change to the watched plan
    pub fn emit_plan_change(&self) -> bool {
        let Some(path) = self.watched() else {
            return false;
        };
        self.emit(FileChangeEvent {
            path,
            file_type: FileType::Plan,
        })
    }

    /// Report a change to the watched plan's layout file
    pub fn emit_layout_change(&self) -> bool {
        let Some(path) = self.watched() else {
            return false;
        };
        self.emit(FileChangeEvent {
            path: layout_path(&path),
            file_type: FileType::Layout,
        })
    }

    /// Whether a session is watching
    #[must_use]
    pub fn is_watching(&self) -> bool {
        self.shared.lock().sender.is_some()
    }

    /// Path being watched
    #[must_use]
    pub fn watched(&self) -> Option<PathBuf> {
        self.shared.lock().path.clone()
    }

    /// Make the next start fail
    pub fn fail_start(&self, fail: bool) {
        self.shared.lock().fail_start = fail;
    }
}
