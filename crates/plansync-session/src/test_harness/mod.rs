//! In-memory collaborators for driving a session in tests
//!
//! - [`MemoryPlanText`]: plan text with failure injection and a write gate
//!   that holds a save in flight
//! - [`MemoryLayoutStore`]: layouts with failure injection
//! - [`ManualWatcher`]: a watcher whose [`WatchInjector`] emits events on
//!   demand

mod memory;
mod watcher;

pub use memory::{MemoryLayoutStore, MemoryPlanText};
pub use watcher::{ManualWatcher, WatchInjector};
