//! Stream caching abstractions:
//! - `StreamCache`: a resettable, re-readable view over previously captured bytes.
//! - `UnitOfWork`: the surrounding logical operation whose completion releases
//!   resources created while it was running.
//! - `SpoolRule`: a pluggable decision on whether captured content should move to disk.
//!
//! Implementations live in `streamcache-io-impl`.

use streamcache_common::Result;

pub mod spool_rule;
pub mod unit_of_work;

pub use spool_rule::SpoolRule;
pub use unit_of_work::{CompletionCallback, Outcome, UnitOfWork};

/// A trait representing captured byte content that can be read any number of times.
///
/// A stream cache behaves like a regular [`std::io::Read`] until the content is
/// exhausted; [`reset`](StreamCache::reset) rewinds it to the first byte. Every
/// reset reproduces the originally written bytes exactly, for as long as the
/// backing storage is alive.
///
/// # Thread Safety
///
/// A single stream cache instance is not meant to be shared between readers.
/// Independent readers should each obtain their own instance, which keeps its
/// own position (and, for file-backed content, its own file handle).
pub trait StreamCache: std::io::Read + Send {
    /// Rewinds the cache to the first byte.
    ///
    /// # Errors
    ///
    /// Returns a `CacheUnavailable` error when the backing storage has already
    /// been released (for example a spool file deleted on unit-of-work completion).
    fn reset(&mut self) -> Result<()>;

    /// Writes the entire cached content to `sink`, regardless of the current
    /// read position, and returns the number of bytes written.
    ///
    /// File-backed content is streamed in chunks; it is never fully
    /// materialized in memory.
    fn write_to(&self, sink: &mut dyn std::io::Write) -> Result<u64>;

    /// Total number of cached bytes.
    fn length(&self) -> u64;

    /// Current read position.
    fn position(&self) -> u64;

    /// Whether the content lives in memory (as opposed to a spool file).
    fn is_in_memory(&self) -> bool;

    /// Releases any handle held by this instance.
    ///
    /// Closing never destroys the cached content: a subsequent read or reset
    /// starts again from the first byte.
    fn close(&mut self);
}

impl<T> StreamCache for Box<T>
where
    T: StreamCache + ?Sized,
{
    fn reset(&mut self) -> Result<()> {
        self.as_mut().reset()
    }

    fn write_to(&self, sink: &mut dyn std::io::Write) -> Result<u64> {
        self.as_ref().write_to(sink)
    }

    fn length(&self) -> u64 {
        self.as_ref().length()
    }

    fn position(&self) -> u64 {
        self.as_ref().position()
    }

    fn is_in_memory(&self) -> bool {
        self.as_ref().is_in_memory()
    }

    fn close(&mut self) {
        self.as_mut().close()
    }
}
