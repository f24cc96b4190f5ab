use std::{io::Read, sync::Arc};

use streamcache_common::{Error, Result};
use streamcache_io::StreamCache;

/// A stream cache over bytes captured in memory.
///
/// Copies share the underlying bytes; each keeps its own position.
#[derive(Debug, Clone)]
pub struct MemoryStreamCache {
    bytes: Arc<[u8]>,
    pos: usize,
}

impl MemoryStreamCache {
    pub fn new(bytes: Arc<[u8]>) -> MemoryStreamCache {
        MemoryStreamCache { bytes, pos: 0 }
    }

    pub fn bytes(&self) -> &Arc<[u8]> {
        &self.bytes
    }

    /// Returns an independent cache over the same content, positioned at the start.
    pub fn copy(&self) -> MemoryStreamCache {
        MemoryStreamCache::new(self.bytes.clone())
    }
}

impl Read for MemoryStreamCache {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        let remaining = &self.bytes[self.pos..];
        let len = remaining.len().min(buf.len());
        buf[..len].copy_from_slice(&remaining[..len]);
        self.pos += len;
        Ok(len)
    }
}

impl StreamCache for MemoryStreamCache {
    fn reset(&mut self) -> Result<()> {
        self.pos = 0;
        Ok(())
    }

    fn write_to(&self, sink: &mut dyn std::io::Write) -> Result<u64> {
        sink.write_all(&self.bytes)
            .map_err(|e| Error::io("write stream cache", e))?;
        Ok(self.bytes.len() as u64)
    }

    fn length(&self) -> u64 {
        self.bytes.len() as u64
    }

    fn position(&self) -> u64 {
        self.pos as u64
    }

    fn is_in_memory(&self) -> bool {
        true
    }

    fn close(&mut self) {}
}

#[cfg(test)]
mod tests {
    use std::io::Read;

    use streamcache_io::StreamCache;

    use super::MemoryStreamCache;

    #[test]
    fn test_read_reset_reread() {
        let mut cache = MemoryStreamCache::new(b"0123456789".as_slice().into());
        let mut buf = [0u8; 4];
        assert_eq!(cache.read(&mut buf).unwrap(), 4);
        assert_eq!(&buf, b"0123");
        assert_eq!(cache.position(), 4);

        let mut rest = Vec::new();
        cache.read_to_end(&mut rest).unwrap();
        assert_eq!(rest, b"456789");

        cache.reset().unwrap();
        let mut all = Vec::new();
        cache.read_to_end(&mut all).unwrap();
        assert_eq!(all, b"0123456789");
    }

    #[test]
    fn test_write_to_ignores_position() {
        let mut cache = MemoryStreamCache::new(b"abcdef".as_slice().into());
        let mut buf = [0u8; 3];
        cache.read_exact(&mut buf).unwrap();

        let mut out = Vec::new();
        assert_eq!(cache.write_to(&mut out).unwrap(), 6);
        assert_eq!(out, b"abcdef");
        assert_eq!(cache.position(), 3);

        let mut copy = cache.copy();
        assert_eq!(copy.position(), 0);
        let mut all = Vec::new();
        copy.read_to_end(&mut all).unwrap();
        assert_eq!(all, b"abcdef");
    }
}
