//! Plansync Layout
//!
//! Canvas placement for plan nodes, kept separately from the plan text.
//!
//! # Core Concepts
//!
//! - [`NodeLayout`], [`LayoutMap`], [`LayoutSnapshot`]: placement records and
//!   the persisted envelope
//! - [`merge`]: reconcile a stored layout with the current nodes
//! - [`LayoutStore`]: persistence collaborator, [`FsLayoutStore`] on disk
//! - [`LayoutHistory`]: rotating copies of earlier layouts
//!
//! # Example
//!
//! ```rust
//! use plansync_layout::{generate, merge};
//! use plansync_model::NodeDescriptor;
//!
//! let nodes = vec![NodeDescriptor::phase("phase_1"), NodeDescriptor::task("t1", "phase_1")];
//! let layout = generate(&nodes);
//! assert_eq!(layout.len(), 2);
//! assert!(merge(&nodes, &layout).is_unchanged());
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

mod error;
mod history;
mod merge;
mod snapshot;
mod store;

pub use error::PersistenceError;
pub use history::{history_dir, HistoryConfig, LayoutHistory, HISTORY_DIR};
pub use merge::{
    generate, merge, MergeOutcome, COLUMN_PITCH, GRID_COLUMNS, NODE_WIDTH, ORIGIN, PHASE_HEIGHT,
    ROW_PITCH, TASK_HEIGHT,
};
pub use snapshot::{LayoutMap, LayoutSnapshot, NodeLayout, LAYOUT_VERSION};
pub use store::{layout_path, FsLayoutStore, LayoutStore, MergedSnapshot, LAYOUT_SUFFIX};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
