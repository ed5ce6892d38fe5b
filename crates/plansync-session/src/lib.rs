//! Plansync Session
//!
//! Keeps one open plan and its layout in step with disk while local edits,
//! autosaves and external changes interleave.
//!
//! # Architecture
//!
//! ```text
//! SessionHandle ──commands──▶ SessionActor ──▶ PlanController ──▶ SyncMachine
//!                                 │  ▲
//!                   save task ◀───┘  └─── FileWatcher events
//! ```
//!
//! - [`SyncMachine`]: pure state transitions (`Clean`, `Dirty`, `Saving`,
//!   `ExternalChangePending`)
//! - [`PlanController`]: document, layout and dirty tracking, no I/O
//! - [`PlanSession`]: the async actor that performs I/O and timers
//! - [`test_harness`]: in-memory collaborators for tests
//!
//! # Example
//!
//! ```rust
//! use plansync_session::test_harness::{MemoryLayoutStore, MemoryPlanText};
//! use plansync_session::{PlanSession, SyncState};
//! use plansync_model::TaskStatus;
//! use std::sync::Arc;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), plansync_session::SessionError> {
//! let text = MemoryPlanText::with_file("plan.md", "# Plan: Demo\n\n## Phase 1 — Start\n- [ ] Go (id: t1)\n");
//! let session = PlanSession::builder("plan.md")
//!     .with_text_io(Arc::new(text.clone()))
//!     .with_layout_store(Arc::new(MemoryLayoutStore::new()))
//!     .open()
//!     .await?;
//!
//! assert_eq!(session.set_task_status("t1", TaskStatus::Completed).await?, SyncState::Dirty);
//! assert_eq!(session.save_now().await?, SyncState::Clean);
//! assert!(text.text("plan.md".as_ref()).unwrap().contains("- [x] Go (id: t1)"));
//! session.close().await
//! # }
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

mod config;
mod controller;
mod error;
mod machine;
mod scheduler;
mod session;
mod subscribers;
pub mod telemetry;
pub mod test_harness;
mod text;
mod watcher;

pub use config::{LogConfig, LogFormat, SessionConfig};
pub use controller::{PlanController, SaveJob, SaveReport, SessionSnapshot};
pub use error::{ConfigError, ReloadError, SaveError, SessionError, WatchError};
pub use machine::{ChangeKind, SyncEffect, SyncEvent, SyncMachine, SyncState, Transition};
pub use scheduler::AutosaveTimer;
pub use session::{PlanSession, SessionBuilder, SessionHandle};
pub use subscribers::{SessionEvent, Subscribers, Subscription};
pub use telemetry::init_tracing;
pub use text::{FsPlanText, PlanTextIo};
pub use watcher::{FileChangeEvent, FileType, FileWatcher, WatchSubscription};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
