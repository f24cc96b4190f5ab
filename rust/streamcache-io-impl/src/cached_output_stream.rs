//! The spooling output buffer.

use std::{path::Path, sync::Arc};

use log::debug;
use streamcache_common::{Error, Result};
use streamcache_io::UnitOfWork;

use crate::{
    cipher::{EncryptionContext, SpoolCipher},
    config::SpoolConfiguration,
    fs, lifecycle,
    policy::SpoolPolicy,
    spool_file::SpoolFile,
    spool_writer::{DiskSpoolWriter, FinishedSpool},
    statistics::CacheStatistics,
    stream_cache::{StreamCacheView, file::FileStreamCache, memory::MemoryStreamCache},
    threshold_buffer::ThresholdBuffer,
};

/// Observable lifecycle state of a [`CachedOutputStream`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheState {
    /// Nothing written yet.
    Empty,
    /// Content accumulates in memory.
    Buffering,
    /// Content has moved to a spool file, and writing continues there.
    Overflowed,
    /// Writing is over; stream caches can be produced.
    Finished,
    /// The captured content has been released.
    Disposed,
    /// A write or finish failed; the stream must be discarded.
    Failed,
}

#[derive(Clone)]
enum Captured {
    Memory(Arc<[u8]>),
    Spooled(FinishedSpool),
}

enum Sink {
    Memory(ThresholdBuffer),
    Disk(DiskSpoolWriter),
    Finished(Captured),
    Failed,
    Disposed,
}

/// An output buffer that transparently moves its content from memory to a
/// spool file once the [`SpoolPolicy`] says so.
///
/// Clients write through [`write`](CachedOutputStream::write) (or
/// `std::io::Write`), then call [`new_stream_cache`](CachedOutputStream::new_stream_cache)
/// to read the content back as often as needed.
///
/// # Lifecycle
///
/// `Empty -> Buffering -> [Overflowed] -> Finished -> Disposed`. The overflow
/// to disk happens at most once; a spooled stream never returns to memory.
///
/// When a [`UnitOfWork`] is supplied, the spool file is deleted when that unit
/// of work completes, not when the stream or its caches are closed. Without
/// one, the stream runs in manual mode: [`close`](CachedOutputStream::close)
/// deletes the spool file immediately, and a spool file nobody closed is
/// deleted when its last handle (stream or cache) is dropped.
///
/// # Thread Safety
///
/// A stream has a single writer. Stream caches produced from it are
/// independent and may be used from other threads.
pub struct CachedOutputStream {
    config: SpoolConfiguration,
    cipher: Option<SpoolCipher>,
    policy: SpoolPolicy,
    sink: Sink,
    total: u64,
    spool_file: Option<Arc<SpoolFile>>,
    unit_of_work: Option<Arc<dyn UnitOfWork>>,
    statistics: Option<Arc<CacheStatistics>>,
}

impl CachedOutputStream {
    /// Creates a stream governed by `config` alone (no custom spool rules, no
    /// statistics).
    ///
    /// # Errors
    ///
    /// Fails with a configuration error if the configuration is invalid, or if
    /// spooling is possible but the spool directory is missing or not writable.
    pub fn new(
        config: &SpoolConfiguration,
        unit_of_work: Option<Arc<dyn UnitOfWork>>,
    ) -> Result<CachedOutputStream> {
        let policy = SpoolPolicy::from_config(config, &[]);
        Self::with_policy(config.clone(), policy, unit_of_work, None)
    }

    pub(crate) fn with_policy(
        config: SpoolConfiguration,
        policy: SpoolPolicy,
        unit_of_work: Option<Arc<dyn UnitOfWork>>,
        statistics: Option<Arc<CacheStatistics>>,
    ) -> Result<CachedOutputStream> {
        config.validate()?;
        let cipher = config.cipher()?;
        if !policy.is_memory_only() {
            fs::check_spool_directory(&config.effective_spool_directory())?;
        }
        let capacity = match config.spool_threshold {
            t if t > 0 && !policy.is_memory_only() => config.buffer_size.min(t as usize),
            _ => config.buffer_size,
        };
        Ok(CachedOutputStream {
            cipher,
            policy,
            sink: Sink::Memory(ThresholdBuffer::with_capacity(capacity)),
            total: 0,
            spool_file: None,
            unit_of_work,
            statistics,
            config,
        })
    }

    /// Number of bytes written so far.
    pub fn size(&self) -> u64 {
        self.total
    }

    /// Whether the content has been moved to a spool file.
    pub fn is_spooled(&self) -> bool {
        self.spool_file.is_some()
    }

    /// Path of the spool file, once one has been created.
    pub fn spool_path(&self) -> Option<&Path> {
        self.spool_file.as_deref().map(SpoolFile::path)
    }

    pub fn configuration(&self) -> &SpoolConfiguration {
        &self.config
    }

    pub fn state(&self) -> CacheState {
        match &self.sink {
            Sink::Memory(buffer) if buffer.is_empty() => CacheState::Empty,
            Sink::Memory(_) => CacheState::Buffering,
            Sink::Disk(_) => CacheState::Overflowed,
            Sink::Finished(Captured::Spooled(spool)) if spool.file.is_deleted() => {
                CacheState::Disposed
            }
            Sink::Finished(_) => CacheState::Finished,
            Sink::Failed => CacheState::Failed,
            Sink::Disposed => CacheState::Disposed,
        }
    }

    /// Appends `buf`, moving the content to a spool file first if this write
    /// makes it reach the spool threshold.
    ///
    /// # Errors
    ///
    /// An I/O failure leaves the stream in the `Failed` state; it must be
    /// discarded. Writing to a finished or disposed stream is an invalid
    /// operation.
    pub fn write(&mut self, buf: &[u8]) -> Result<()> {
        if buf.is_empty() {
            return match &self.sink {
                Sink::Memory(_) | Sink::Disk(_) => Ok(()),
                other => Err(not_writable(other)),
            };
        }
        let length = self.total + buf.len() as u64;
        if matches!(self.sink, Sink::Memory(_)) && self.policy.should_spill(length) {
            self.spill()?;
        }
        let result = match &mut self.sink {
            Sink::Memory(buffer) => buffer.write(buf),
            Sink::Disk(writer) => writer.write(buf),
            other => return Err(not_writable(other)),
        };
        match result {
            Ok(()) => {
                self.total = length;
                Ok(())
            }
            Err(e) => {
                self.sink = Sink::Failed;
                Err(e)
            }
        }
    }

    /// Flushes the active sink.
    pub fn flush(&mut self) -> Result<()> {
        match &mut self.sink {
            Sink::Disk(writer) => {
                let result = writer.flush();
                if result.is_err() {
                    self.sink = Sink::Failed;
                }
                result
            }
            _ => Ok(()),
        }
    }

    /// Finishes the write side (on the first call) and returns a new stream
    /// cache over the captured content.
    ///
    /// Every call returns an independent cache positioned at the start.
    ///
    /// # Errors
    ///
    /// Fails with `CacheUnavailable` if the content was spooled and the spool
    /// file has since been deleted, and with an invalid operation error if the
    /// stream has failed or was closed in manual mode.
    pub fn new_stream_cache(&mut self) -> Result<StreamCacheView> {
        match self.finish()? {
            Captured::Memory(bytes) => Ok(StreamCacheView::InMemory(MemoryStreamCache::new(bytes))),
            Captured::Spooled(spool) => {
                if spool.file.is_deleted() {
                    return Err(Error::cache_unavailable(spool.file.path()));
                }
                Ok(StreamCacheView::FileBacked(FileStreamCache::new(
                    spool.file,
                    spool.encryption,
                    spool.length,
                    self.config.buffer_size,
                )))
            }
        }
    }

    /// Releases the write side.
    ///
    /// With a unit of work bound, the content stays available (and new caches
    /// can still be produced) until the unit of work completes. In manual
    /// mode, the captured content is released and the spool file deleted.
    pub fn close(&mut self) -> Result<()> {
        let finished = match self.sink {
            Sink::Memory(_) | Sink::Disk(_) => self.finish().map(|_| ()),
            _ => Ok(()),
        };
        if self.unit_of_work.is_none() {
            self.sink = Sink::Disposed;
            if let Some(file) = &self.spool_file {
                file.delete()?;
            }
        }
        finished
    }

    /// The key material protecting the spool file, if encryption is on and
    /// the content has been finished.
    pub fn encryption(&self) -> Option<&EncryptionContext> {
        match &self.sink {
            Sink::Finished(Captured::Spooled(spool)) => spool.encryption.as_ref(),
            _ => None,
        }
    }

    fn spill(&mut self) -> Result<()> {
        let Sink::Memory(buffer) = &mut self.sink else {
            return Ok(());
        };
        let buffered = buffer.take();
        let directory = self.config.effective_spool_directory();
        let mut writer = match DiskSpoolWriter::create(
            &directory,
            self.cipher,
            self.config.buffer_size,
            self.unit_of_work.is_none(),
        ) {
            Ok(writer) => writer,
            Err(e) => {
                self.sink = Sink::Failed;
                return Err(e);
            }
        };
        let file = writer.file().clone();
        if let Some(unit_of_work) = &self.unit_of_work {
            lifecycle::bind(&**unit_of_work, file.clone());
        }
        self.spool_file = Some(file);
        if let Err(e) = writer.migrate(&buffered) {
            self.sink = Sink::Failed;
            return Err(e);
        }
        debug!(
            "spooling to '{}' after {} buffered bytes",
            writer.file().path().display(),
            buffered.len()
        );
        self.sink = Sink::Disk(writer);
        Ok(())
    }

    fn finish(&mut self) -> Result<Captured> {
        let captured = match std::mem::replace(&mut self.sink, Sink::Failed) {
            Sink::Memory(buffer) => {
                let bytes = buffer.into_bytes();
                if let Some(statistics) = &self.statistics {
                    statistics.update_memory(bytes.len() as u64);
                }
                Captured::Memory(bytes)
            }
            Sink::Disk(writer) => {
                let spool = writer.finish()?;
                if let Some(statistics) = &self.statistics {
                    statistics.update_spool(spool.length);
                }
                Captured::Spooled(spool)
            }
            Sink::Finished(captured) => captured,
            Sink::Failed => {
                return Err(Error::invalid_operation(
                    "stream cache of a failed cached output stream",
                ));
            }
            Sink::Disposed => {
                self.sink = Sink::Disposed;
                return Err(match &self.spool_file {
                    Some(file) => Error::cache_unavailable(file.path()),
                    None => Error::invalid_operation("stream cache of a closed cached output stream"),
                });
            }
        };
        self.sink = Sink::Finished(captured.clone());
        Ok(captured)
    }
}

impl std::io::Write for CachedOutputStream {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        CachedOutputStream::write(self, buf)?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        CachedOutputStream::flush(self)?;
        Ok(())
    }
}

impl std::fmt::Debug for CachedOutputStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CachedOutputStream")
            .field("state", &self.state())
            .field("size", &self.total)
            .field("spool_path", &self.spool_path())
            .field("bound", &self.unit_of_work.is_some())
            .finish()
    }
}

fn not_writable(sink: &Sink) -> Error {
    match sink {
        Sink::Finished(_) => Error::invalid_operation("write to a finished cached output stream"),
        Sink::Failed => Error::invalid_operation("write to a failed cached output stream"),
        _ => Error::invalid_operation("write to a closed cached output stream"),
    }
}

#[cfg(test)]
mod tests {
    use std::io::Read;

    use streamcache_io::StreamCache;

    use super::{CacheState, CachedOutputStream};
    use crate::config::SpoolConfiguration;

    fn config(dir: &std::path::Path, threshold: i64) -> SpoolConfiguration {
        SpoolConfiguration::default()
            .with_threshold(threshold)
            .with_spool_directory(dir)
    }

    #[test]
    fn test_state_transitions() -> std::io::Result<()> {
        let dir = tempfile::tempdir()?;
        let mut cos = CachedOutputStream::new(&config(dir.path(), 8), None).unwrap();
        assert_eq!(cos.state(), CacheState::Empty);
        cos.write(b"1234").unwrap();
        assert_eq!(cos.state(), CacheState::Buffering);
        cos.write(b"5678").unwrap();
        assert_eq!(cos.state(), CacheState::Overflowed);
        assert!(cos.is_spooled());

        let cache = cos.new_stream_cache().unwrap();
        assert_eq!(cos.state(), CacheState::Finished);
        assert_eq!(cache.length(), 8);

        cos.close().unwrap();
        assert_eq!(cos.state(), CacheState::Disposed);
        Ok(())
    }

    #[test]
    fn test_write_after_finish_is_rejected() -> std::io::Result<()> {
        let dir = tempfile::tempdir()?;
        let mut cos = CachedOutputStream::new(&config(dir.path(), 1024), None).unwrap();
        cos.write(b"abc").unwrap();
        let _cache = cos.new_stream_cache().unwrap();
        assert!(cos.write(b"def").is_err());
        assert_eq!(cos.size(), 3);
        Ok(())
    }

    #[test]
    fn test_io_write_adapter() -> std::io::Result<()> {
        use std::io::Write;

        let dir = tempfile::tempdir()?;
        let mut cos = CachedOutputStream::new(&config(dir.path(), 10), None).unwrap();
        write!(cos, "{}-{}", "left", "right")?;
        cos.flush()?;
        write!(cos, "!")?;

        let mut cache = cos.new_stream_cache().unwrap();
        assert!(!cache.is_in_memory());
        let mut text = String::new();
        cache.read_to_string(&mut text)?;
        assert_eq!(text, "left-right!");
        Ok(())
    }

    #[test]
    fn test_manual_close_deletes_spool_file() -> std::io::Result<()> {
        let dir = tempfile::tempdir()?;
        let mut cos = CachedOutputStream::new(&config(dir.path(), 4), None).unwrap();
        cos.write(b"spooled bytes").unwrap();
        let path = cos.spool_path().unwrap().to_path_buf();
        let mut cache = cos.new_stream_cache().unwrap();
        assert!(path.exists());

        cos.close().unwrap();
        assert!(!path.exists());
        assert!(cache.reset().unwrap_err().is_cache_unavailable());
        assert!(cos.new_stream_cache().unwrap_err().is_cache_unavailable());
        cos.close().unwrap();
        Ok(())
    }

    #[test]
    fn test_unusable_spool_directory() -> std::io::Result<()> {
        let dir = tempfile::tempdir()?;
        let not_a_dir = dir.path().join("file");
        std::fs::write(&not_a_dir, b"x")?;

        let e = CachedOutputStream::new(&config(&not_a_dir, 16), None).unwrap_err();
        assert!(e.is_configuration());

        // Memory-only streams never touch the directory.
        assert!(CachedOutputStream::new(&config(&not_a_dir, -1), None).is_ok());
        Ok(())
    }

    #[test]
    fn test_spill_failure_marks_stream_failed() -> std::io::Result<()> {
        let dir = tempfile::tempdir()?;
        let spool_dir = dir.path().join("spool");
        std::fs::create_dir(&spool_dir)?;
        let mut cos = CachedOutputStream::new(&config(&spool_dir, 4), None).unwrap();
        std::fs::remove_dir(&spool_dir)?;

        let e = cos.write(b"too large for memory").unwrap_err();
        assert!(e.is_io());
        assert_eq!(cos.state(), CacheState::Failed);
        assert!(cos.write(b"more").is_err());
        assert!(cos.new_stream_cache().is_err());
        Ok(())
    }
}
