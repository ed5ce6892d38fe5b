//! Plansync Model
//!
//! The plan document, its markdown grammar and the text fingerprint.
//!
//! # Core Concepts
//!
//! - [`Document`]: phases owning tasks, with derived [`Node`]s and [`Edge`]s
//! - [`TaskStatus`]: checkbox state and the phase aggregation rule
//! - [`grammar`]: line-level definitions of the markdown dialect
//! - [`Fingerprint`]: change-detection hash of raw text
//!
//! # Example
//!
//! ```rust
//! use plansync_model::{Document, Phase, Task, TaskStatus, Fingerprint};
//!
//! let doc = Document::new(vec![Phase::new(1, "Setup").with_tasks(vec![
//!     Task::new("t1", "Init").with_status(TaskStatus::Completed),
//! ])]);
//! assert_eq!(doc.nodes().len(), 2);
//! assert_eq!(doc.phases()[0].status(), TaskStatus::Completed);
//!
//! let fp = Fingerprint::of("# Plan: Demo\n");
//! assert_eq!(fp.to_string().len(), 8);
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

mod document;
mod fingerprint;
pub mod grammar;

pub use document::{Document, Edge, Node, NodeDescriptor, NodeKind, Phase, Task, TaskStatus};
pub use fingerprint::{fingerprint, Fingerprint, FingerprintError};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
