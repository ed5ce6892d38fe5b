//! Autosave debounce timer
//!
//! A single re-armable deadline. Scheduling again replaces the deadline, so a
//! burst of edits coalesces into one save; cancelling or dropping the timer
//! guarantees it never fires.

use std::time::Duration;
use tokio::time::{sleep_until, Instant};

/// Debounce deadline owned by the session loop
#[derive(Debug, Default)]
pub struct AutosaveTimer {
    deadline: Option<Instant>,
}

impl AutosaveTimer {
    /// Create an unarmed timer
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Arm to fire `delay` from now, replacing any earlier deadline
    pub fn schedule(&mut self, delay: Duration) {
        self.deadline = Some(Instant::now() + delay);
    }

    /// Disarm
    pub fn cancel(&mut self) {
        self.deadline = None;
    }

    /// Whether a deadline is pending
    #[inline]
    #[must_use]
    pub fn is_armed(&self) -> bool {
        self.deadline.is_some()
    }

    /// Pending deadline
    #[inline]
    #[must_use]
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Resolve when the deadline passes, disarming the timer
    ///
    /// Never resolves while unarmed. Cancel safe: dropping the future leaves
    /// the deadline in place.
    pub async fn fired(&mut self) {
        match self.deadline {
            Some(deadline) => {
                sleep_until(deadline).await;
                self.deadline = None;
            }
            None => std::future::pending().await,
        }
    }
}
