//! Plansync Markdown
//!
//! Reads and writes the plan markdown dialect.
//!
//! # Operations
//!
//! - [`parse_plan`]: markdown to [`Document`](plansync_model::Document), all
//!   issues reported at once
//! - [`validate`]: structural checks for documents not produced by the parser
//! - [`serialize`]: document to canonical markdown
//! - [`edit`]: pure structural edits
//!
//! # Example
//!
//! ```rust
//! use plansync_markdown::{parse_plan, serialize, SerializeOptions};
//! use plansync_markdown::edit::set_task_status;
//! use plansync_model::TaskStatus;
//!
//! let plan = parse_plan("# Plan: Demo\n\n## Phase 1 — Start\n- [ ] Go (id: t1)\n").unwrap();
//! let done = set_task_status(&plan.document, "t1", TaskStatus::Completed);
//! let text = serialize(&done, &SerializeOptions::new(plan.title));
//! assert!(text.contains("- [x] Go (id: t1)"));
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

pub mod edit;
mod error;
mod parser;
mod serializer;
mod validator;

pub use edit::PlanEdit;
pub use error::{ParseError, PlanIssue};
pub use parser::{parse_plan, ParsedPlan, PlanParser};
pub use serializer::{phase_heading, serialize, task_line, SerializeOptions};
pub use validator::{is_valid, validate};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
