//! Re-readable views over content captured by a `CachedOutputStream`.

use std::io::Read;

use streamcache_common::Result;
use streamcache_io::StreamCache;

pub mod file;
pub mod memory;

use file::FileStreamCache;
use memory::MemoryStreamCache;

/// A stream cache whose content lives either in memory or in a spool file.
#[derive(Debug)]
pub enum StreamCacheView {
    InMemory(MemoryStreamCache),
    FileBacked(FileStreamCache),
}

impl StreamCacheView {
    /// Returns an independent view over the same content, positioned at the start.
    ///
    /// Fails with `CacheUnavailable` if the backing spool file is already gone.
    pub fn copy(&self) -> Result<StreamCacheView> {
        Ok(match self {
            StreamCacheView::InMemory(cache) => StreamCacheView::InMemory(cache.copy()),
            StreamCacheView::FileBacked(cache) => StreamCacheView::FileBacked(cache.copy()?),
        })
    }

    /// Collects the whole content into a vector, leaving the read position untouched.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut out = Vec::with_capacity(self.length() as usize);
        self.write_to(&mut out)?;
        Ok(out)
    }

    fn as_cache(&self) -> &dyn StreamCache {
        match self {
            StreamCacheView::InMemory(cache) => cache,
            StreamCacheView::FileBacked(cache) => cache,
        }
    }

    fn as_cache_mut(&mut self) -> &mut dyn StreamCache {
        match self {
            StreamCacheView::InMemory(cache) => cache,
            StreamCacheView::FileBacked(cache) => cache,
        }
    }
}

impl Read for StreamCacheView {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        self.as_cache_mut().read(buf)
    }
}

impl StreamCache for StreamCacheView {
    fn reset(&mut self) -> Result<()> {
        self.as_cache_mut().reset()
    }

    fn write_to(&self, sink: &mut dyn std::io::Write) -> Result<u64> {
        self.as_cache().write_to(sink)
    }

    fn length(&self) -> u64 {
        self.as_cache().length()
    }

    fn position(&self) -> u64 {
        self.as_cache().position()
    }

    fn is_in_memory(&self) -> bool {
        matches!(self, StreamCacheView::InMemory(_))
    }

    fn close(&mut self) {
        self.as_cache_mut().close()
    }
}
