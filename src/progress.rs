//! Progress reporting and cancellation support.
//!
//! This module provides [`ProgressCallback`] for monitoring a batch session,
//! [`CancellationToken`] for cooperative cancellation, and [`ProgressInfo`] /
//! [`ItemReport`] for detailed progress snapshots.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use subgen::{
//!     BatchOptions, BatchSession, FfmpegPreprocessor, ItemReport, ProgressCallback,
//!     ProgressInfo, SubgenError, WhisperCli,
//! };
//!
//! struct PrintProgress;
//!
//! impl ProgressCallback for PrintProgress {
//!     fn on_progress(&self, info: &ProgressInfo) {
//!         println!("[{}/{}] {}", info.current, info.total, info.path.display());
//!     }
//!
//!     fn on_item_finished(&self, report: &ItemReport) {
//!         println!("{:?}: {}", report.status, report.path.display());
//!     }
//! }
//!
//! let options = BatchOptions::new().with_progress(Arc::new(PrintProgress));
//! let session = BatchSession::new("/media/library", options);
//! let outcome = session.run(&FfmpegPreprocessor::default(), &WhisperCli::default())?;
//! # Ok::<(), SubgenError>(())
//! ```

use std::path::PathBuf;
use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};
use std::time::{Duration, Instant};

/// How a single unit of work ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum ItemStatus {
    /// A caption file was generated and reflowed.
    Succeeded,
    /// A caption file already existed and skip-existing was enabled.
    Skipped,
    /// An external tool or file operation failed.
    Failed,
}

/// The result of processing one media file, delivered to
/// [`ProgressCallback::on_item_finished`].
#[derive(Debug, Clone)]
pub struct ItemReport {
    /// The media file that was processed.
    pub path: PathBuf,
    /// The caption file that was (or would have been) written.
    pub caption_path: PathBuf,
    /// How processing ended.
    pub status: ItemStatus,
    /// Failure description when `status` is [`ItemStatus::Failed`].
    pub error: Option<String>,
}

/// A snapshot of session progress, emitted before each item starts.
#[derive(Debug, Clone)]
pub struct ProgressInfo {
    /// One-based position of the current item within this session.
    pub current: u64,
    /// Number of items this session will visit (after resume slicing).
    pub total: u64,
    /// One-based position of the current item within the whole work list.
    pub overall_current: u64,
    /// Size of the whole work list.
    pub overall_total: u64,
    /// Completion percentage (0.0 – 100.0) of this session, counting
    /// finished items only.
    pub percentage: f32,
    /// Wall-clock time elapsed since the session started.
    pub elapsed: Duration,
    /// Estimated time remaining, based on current throughput.
    pub estimated_remaining: Option<Duration>,
    /// The media file about to be processed.
    pub path: PathBuf,
}

/// Trait for receiving progress updates during a batch session.
///
/// Implementations must be [`Send`] and [`Sync`] because the callback is
/// shared through an [`Arc`] and may be observed from a signal-watching
/// thread.
///
/// Progress callbacks are **infallible**: they observe but cannot halt
/// the session. Use [`CancellationToken`] for cooperative cancellation.
pub trait ProgressCallback: Send + Sync {
    /// Called before each item is processed.
    fn on_progress(&self, info: &ProgressInfo);

    /// Called after each item has been classified.
    fn on_item_finished(&self, _report: &ItemReport) {}
}

/// A no-op implementation that discards all progress notifications.
///
/// This is the default when no callback is configured.
pub(crate) struct NoOpProgress;

impl ProgressCallback for NoOpProgress {
    fn on_progress(&self, _info: &ProgressInfo) {}
}

/// Cooperative cancellation token backed by an [`AtomicBool`].
///
/// Clone this token and share it between threads; call [`cancel`](CancellationToken::cancel)
/// from any thread to request cancellation of the associated session.
/// The session loop checks [`is_cancelled`](CancellationToken::is_cancelled)
/// before each item and after each external tool invocation.
///
/// # Example
///
/// ```
/// use subgen::CancellationToken;
///
/// let token = CancellationToken::new();
/// assert!(!token.is_cancelled());
///
/// // From another thread (or a signal handler, etc.):
/// token.cancel();
/// assert!(token.is_cancelled());
/// ```
#[derive(Debug, Clone)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    /// Create a new, non-cancelled token.
    pub fn new() -> Self {
        Self {
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Request cancellation.
    ///
    /// All clones of this token will observe the cancellation.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    /// Check whether cancellation has been requested.
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }
}

impl Default for CancellationToken {
    fn default() -> Self {
        Self::new()
    }
}

/// Internal helper that tracks session timing and emits callbacks.
pub(crate) struct ProgressTracker {
    callback: Arc<dyn ProgressCallback>,
    total: u64,
    offset: u64,
    overall_total: u64,
    finished: u64,
    start_time: Instant,
}

impl ProgressTracker {
    /// Create a tracker for a session visiting `total` items, the first of
    /// which sits at zero-based `offset` in a list of `overall_total`.
    pub(crate) fn new(
        callback: Arc<dyn ProgressCallback>,
        total: u64,
        offset: u64,
        overall_total: u64,
    ) -> Self {
        Self {
            callback,
            total,
            offset,
            overall_total,
            finished: 0,
            start_time: Instant::now(),
        }
    }

    /// Announce that the item at zero-based session position `position`
    /// is starting.
    pub(crate) fn starting(&self, position: u64, path: PathBuf) {
        let elapsed = self.start_time.elapsed();

        let percentage = if self.total > 0 {
            (self.finished as f32 / self.total as f32) * 100.0
        } else {
            100.0
        };

        let estimated_remaining = if self.finished > 0 {
            let remaining = self.total.saturating_sub(self.finished);
            let per_item = elapsed / self.finished as u32;
            Some(per_item * remaining as u32)
        } else {
            None
        };

        let info = ProgressInfo {
            current: position + 1,
            total: self.total,
            overall_current: self.offset + position + 1,
            overall_total: self.overall_total,
            percentage,
            elapsed,
            estimated_remaining,
            path,
        };

        self.callback.on_progress(&info);
    }

    /// Record one classified item and forward the report.
    pub(crate) fn finished(&mut self, report: &ItemReport) {
        self.finished += 1;
        self.callback.on_item_finished(report);
    }
}
