use crate::text::PlanTextIo;
use async_trait::async_trait;
use parking_lot::Mutex;
use plansync_layout::{LayoutSnapshot, LayoutStore, PersistenceError};
use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::watch;

#[derive(Debug)]
struct TextState {
    files: Mutex<HashMap<PathBuf, String>>,
    fail_reads: AtomicBool,
    fail_writes: AtomicBool,
    panic_writes: AtomicBool,
    reads: AtomicUsize,
    writes: AtomicUsize,
    /// `true` while writes may proceed
    gate: watch::Sender<bool>,
}

/// Plan text kept in memory
#[derive(Debug, Clone)]
pub struct MemoryPlanText {
    state: Arc<TextState>,
}

impl Default for MemoryPlanText {
    fn default() -> Self {
        let (gate, _) = watch::channel(true);
        Self {
            state: Arc::new(TextState {
                files: Mutex::new(HashMap::new()),
                fail_reads: AtomicBool::new(false),
                fail_writes: AtomicBool::new(false),
                panic_writes: AtomicBool::new(false),
                reads: AtomicUsize::new(0),
                writes: AtomicUsize::new(0),
                gate,
            }),
        }
    }
}

impl MemoryPlanText {
    /// Empty store
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Store holding one file
    #[must_use]
    pub fn with_file(path: impl Into<PathBuf>, text: &str) -> Self {
        let store = Self::new();
        store.set_external(path, text);
        store
    }

    /// Replace a file as another program would
    pub fn set_external(&self, path: impl Into<PathBuf>, text: &str) {
        self.state.files.lock().insert(path.into(), text.to_string());
    }

    /// Current contents of a file
    #[must_use]
    pub fn text(&self, path: &Path) -> Option<String> {
        self.state.files.lock().get(path).cloned()
    }

    /// Make reads fail
    pub fn fail_reads(&self, fail: bool) {
        self.state.fail_reads.store(fail, Ordering::SeqCst);
    }

    /// Make writes fail
    pub fn fail_writes(&self, fail: bool) {
        self.state.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Make writes panic, as a crashing write task would
    pub fn panic_writes(&self, panic: bool) {
        self.state.panic_writes.store(panic, Ordering::SeqCst);
    }

    /// Block writes until [`MemoryPlanText::release_writes`]
    pub fn hold_writes(&self) {
        self.state.gate.send_replace(false);
    }

    /// Let held writes proceed
    pub fn release_writes(&self) {
        self.state.gate.send_replace(true);
    }

    /// Reads performed
    #[must_use]
    pub fn read_count(&self) -> usize {
        self.state.reads.load(Ordering::SeqCst)
    }

    /// Writes that reached storage
    #[must_use]
    pub fn write_count(&self) -> usize {
        self.state.writes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PlanTextIo for MemoryPlanText {
    async fn read_text(&self, path: &Path) -> io::Result<String> {
        self.state.reads.fetch_add(1, Ordering::SeqCst);
        if self.state.fail_reads.load(Ordering::SeqCst) {
            return Err(io::Error::other("injected read failure"));
        }
        self.text(path)
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, "no such plan"))
    }

    async fn write_text(&self, path: &Path, text: &str) -> io::Result<()> {
        let mut gate = self.state.gate.subscribe();
        // the sender lives in `state`, so the gate cannot close
        let _ = gate.wait_for(|open| *open).await;
        if self.state.panic_writes.load(Ordering::SeqCst) {
            panic!("injected write panic");
        }
        if self.state.fail_writes.load(Ordering::SeqCst) {
            return Err(io::Error::other("injected write failure"));
        }
        self.set_external(path, text);
        self.state.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[derive(Debug, Default)]
struct LayoutState {
    layouts: Mutex<HashMap<PathBuf, LayoutSnapshot>>,
    fail_reads: AtomicBool,
    fail_writes: AtomicBool,
    writes: AtomicUsize,
}

/// Layouts kept in memory, keyed by plan path
#[derive(Debug, Clone, Default)]
pub struct MemoryLayoutStore {
    state: Arc<LayoutState>,
}

impl MemoryLayoutStore {
    /// Empty store
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace a plan's layout as another program would
    pub fn set_external(&self, plan_path: impl Into<PathBuf>, snapshot: LayoutSnapshot) {
        self.state.layouts.lock().insert(plan_path.into(), snapshot);
    }

    /// Stored layout of a plan
    #[must_use]
    pub fn layout(&self, plan_path: &Path) -> Option<LayoutSnapshot> {
        self.state.layouts.lock().get(plan_path).cloned()
    }

    /// Make reads fail
    pub fn fail_reads(&self, fail: bool) {
        self.state.fail_reads.store(fail, Ordering::SeqCst);
    }

    /// Make writes fail
    pub fn fail_writes(&self, fail: bool) {
        self.state.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Writes that reached storage
    #[must_use]
    pub fn write_count(&self) -> usize {
        self.state.writes.load(Ordering::SeqCst)
    }
}

fn injected(plan_path: &Path, what: &str) -> PersistenceError {
    PersistenceError::io(plan_path, io::Error::other(format!("injected {what} failure")))
}

#[async_trait]
impl LayoutStore for MemoryLayoutStore {
    async fn read_layout(&self, plan_path: &Path) -> Result<LayoutSnapshot, PersistenceError> {
        if self.state.fail_reads.load(Ordering::SeqCst) {
            return Err(injected(plan_path, "read"));
        }
        Ok(self.layout(plan_path).unwrap_or_default())
    }

    async fn write_layout(
        &self,
        plan_path: &Path,
        snapshot: &LayoutSnapshot,
    ) -> Result<(), PersistenceError> {
        if self.state.fail_writes.load(Ordering::SeqCst) {
            return Err(injected(plan_path, "write"));
        }
        self.set_external(plan_path, snapshot.clone());
        self.state.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
