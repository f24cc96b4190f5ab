use std::sync::Arc;

use streamcache_common::{Error, Result};

/// In-memory accumulator for content that has not (yet) been spooled.
///
/// Growth goes through `try_reserve`, so running out of memory surfaces as an
/// `OutOfMemory` I/O error instead of aborting the process.
#[derive(Debug, Default)]
pub struct ThresholdBuffer {
    data: Vec<u8>,
}

impl ThresholdBuffer {
    pub fn with_capacity(capacity: usize) -> ThresholdBuffer {
        ThresholdBuffer {
            data: Vec::with_capacity(capacity),
        }
    }

    pub fn write(&mut self, buf: &[u8]) -> Result<()> {
        self.data.try_reserve(buf.len()).map_err(|_| {
            Error::io(
                "threshold buffer",
                std::io::Error::from(std::io::ErrorKind::OutOfMemory),
            )
        })?;
        self.data.extend_from_slice(buf);
        Ok(())
    }

    pub fn current_size(&self) -> u64 {
        self.data.len() as u64
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.data
    }

    /// Moves the accumulated bytes out, leaving the buffer empty and
    /// deallocated.
    pub fn take(&mut self) -> Vec<u8> {
        std::mem::take(&mut self.data)
    }

    pub fn into_bytes(self) -> Arc<[u8]> {
        Arc::from(self.data)
    }
}
