//! Progress reporting contract shared by the matcher and the match driver.
//!
//! Library crates only ever talk to [`ProgressCallback`]; the binary decides
//! whether that means `indicatif` bars, log lines or nothing at all.

use std::sync::Arc;

/// Receives progress updates from long-running work.
///
/// Called concurrently from worker threads, hence `Send + Sync`.
pub trait ProgressCallback: Send + Sync {
    /// Sets the number of work units expected.
    fn set_total(&self, total: u64);

    /// Sets the absolute number of completed units.
    fn set_position(&self, pos: u64);

    /// Marks `delta` more units as completed.
    fn inc(&self, delta: u64);

    /// Replaces the status message.
    fn set_message(&self, msg: String);

    /// Completes the indicator, leaving `msg` behind.
    fn finish(&self, msg: String);

    /// Completes the indicator and removes it.
    fn finish_and_clear(&self);
}

/// Ignores every update.
pub struct NullProgress;

impl ProgressCallback for NullProgress {
    fn set_total(&self, _total: u64) {}
    fn set_position(&self, _pos: u64) {}
    fn inc(&self, _delta: u64) {}
    fn set_message(&self, _msg: String) {}
    fn finish(&self, _msg: String) {}
    fn finish_and_clear(&self) {}
}

/// Shared [`NullProgress`] handle.
#[must_use]
pub fn null_progress() -> Arc<dyn ProgressCallback> {
    Arc::new(NullProgress)
}
