use std::{
    fs::File,
    io::{BufReader, Read},
    sync::Arc,
};

use log::trace;
use streamcache_common::{Error, Result};
use streamcache_io::StreamCache;

use crate::{
    cipher::{CipherReader, EncryptionContext},
    spool_file::SpoolFile,
};

enum SpoolReader {
    Plain(BufReader<File>),
    Encrypted(CipherReader<BufReader<File>>),
}

impl Read for SpoolReader {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        match self {
            SpoolReader::Plain(r) => r.read(buf),
            SpoolReader::Encrypted(r) => r.read(buf),
        }
    }
}

/// A stream cache over a spool file.
///
/// The file is opened lazily on the first read, and reopened from offset 0
/// (with a fresh decrypting stream, if encrypted) on every reset. Each instance
/// holds its own file handle, so several instances may read the same spool
/// file concurrently.
///
/// Neither closing nor dropping the cache deletes the file; that is up to the
/// lifecycle of the coordinator that produced it. Once the file is gone,
/// opening it again fails with `CacheUnavailable`.
pub struct FileStreamCache {
    file: Arc<SpoolFile>,
    encryption: Option<EncryptionContext>,
    length: u64,
    buffer_size: usize,
    reader: Option<SpoolReader>,
    pos: u64,
}

impl FileStreamCache {
    pub fn new(
        file: Arc<SpoolFile>,
        encryption: Option<EncryptionContext>,
        length: u64,
        buffer_size: usize,
    ) -> FileStreamCache {
        FileStreamCache {
            file,
            encryption,
            length,
            buffer_size: buffer_size.max(1),
            reader: None,
            pos: 0,
        }
    }

    pub fn file(&self) -> &Arc<SpoolFile> {
        &self.file
    }

    pub fn is_encrypted(&self) -> bool {
        self.encryption.is_some()
    }

    /// Returns an independent cache over the same spool file, positioned at
    /// the start and without an open handle.
    pub fn copy(&self) -> Result<FileStreamCache> {
        if self.file.is_deleted() {
            return Err(Error::cache_unavailable(self.file.path()));
        }
        Ok(FileStreamCache::new(
            self.file.clone(),
            self.encryption.clone(),
            self.length,
            self.buffer_size,
        ))
    }

    fn open_reader(&self) -> Result<SpoolReader> {
        if self.file.is_deleted() {
            return Err(Error::cache_unavailable(self.file.path()));
        }
        let raw = File::open(self.file.path()).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                Error::cache_unavailable(self.file.path())
            } else {
                Error::io(format!("open {}", self.file.path().display()), e)
            }
        })?;
        trace!("opened spool file '{}'", self.file.path().display());
        let buffered = BufReader::with_capacity(self.buffer_size, raw);
        Ok(match &self.encryption {
            Some(context) => SpoolReader::Encrypted(CipherReader::new(buffered, context)),
            None => SpoolReader::Plain(buffered),
        })
    }

    fn read_impl(&mut self, buf: &mut [u8]) -> Result<usize> {
        if self.file.is_deleted() {
            self.reader = None;
            return Err(Error::cache_unavailable(self.file.path()));
        }
        if buf.is_empty() {
            return Ok(0);
        }
        let reader = match &mut self.reader {
            Some(reader) => reader,
            None => self.reader.insert(self.open_reader()?),
        };
        let n = reader
            .read(buf)
            .map_err(|e| Error::io(format!("read {}", self.file.path().display()), e))?;
        self.pos += n as u64;
        Ok(n)
    }
}

impl Read for FileStreamCache {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        self.read_impl(buf).map_err(Into::into)
    }
}

impl StreamCache for FileStreamCache {
    fn reset(&mut self) -> Result<()> {
        self.reader = None;
        self.pos = 0;
        self.reader = Some(self.open_reader()?);
        Ok(())
    }

    fn write_to(&self, sink: &mut dyn std::io::Write) -> Result<u64> {
        let mut reader = self.open_reader()?;
        let mut buf = vec![0u8; self.buffer_size];
        let mut total = 0u64;
        loop {
            let n = match reader.read(&mut buf) {
                Ok(0) => break,
                Ok(n) => n,
                Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
                Err(e) => {
                    return Err(Error::io(
                        format!("read {}", self.file.path().display()),
                        e,
                    ));
                }
            };
            sink.write_all(&buf[..n])
                .map_err(|e| Error::io("write stream cache", e))?;
            total += n as u64;
        }
        Ok(total)
    }

    fn length(&self) -> u64 {
        self.length
    }

    fn position(&self) -> u64 {
        self.pos
    }

    fn is_in_memory(&self) -> bool {
        false
    }

    fn close(&mut self) {
        self.reader = None;
        self.pos = 0;
    }
}

impl std::fmt::Debug for FileStreamCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileStreamCache")
            .field("path", &self.file.path())
            .field("length", &self.length)
            .field("encrypted", &self.is_encrypted())
            .field("pos", &self.pos)
            .field("open", &self.reader.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::{io::Read, sync::Arc};

    use streamcache_io::StreamCache;

    use super::FileStreamCache;
    use crate::spool_file::SpoolFile;

    fn spool(dir: &std::path::Path, data: &[u8]) -> std::io::Result<Arc<SpoolFile>> {
        let path = dir.join("cos-view.tmp");
        std::fs::write(&path, data)?;
        Ok(Arc::new(SpoolFile::new(path, false)))
    }

    #[test]
    fn test_lazy_open_and_reset() -> std::io::Result<()> {
        let dir = tempfile::tempdir()?;
        let file = spool(dir.path(), b"spooled content")?;
        let mut cache = FileStreamCache::new(file, None, 15, 4);

        let mut first = Vec::new();
        cache.read_to_end(&mut first)?;
        assert_eq!(first, b"spooled content");
        assert_eq!(cache.position(), 15);

        cache.reset().unwrap();
        assert_eq!(cache.position(), 0);
        let mut second = Vec::new();
        cache.read_to_end(&mut second)?;
        assert_eq!(second, first);
        Ok(())
    }

    #[test]
    fn test_reset_after_delete_is_cache_unavailable() -> std::io::Result<()> {
        let dir = tempfile::tempdir()?;
        let file = spool(dir.path(), b"gone soon")?;
        let mut cache = FileStreamCache::new(file.clone(), None, 9, 4);
        file.delete().unwrap();

        let e = cache.reset().unwrap_err();
        assert!(e.is_cache_unavailable());

        let io_err = cache.read(&mut [0u8; 4]).unwrap_err();
        assert_eq!(io_err.kind(), std::io::ErrorKind::NotFound);
        assert!(cache.copy().unwrap_err().is_cache_unavailable());
        Ok(())
    }

    #[test]
    fn test_independent_handles() -> std::io::Result<()> {
        let dir = tempfile::tempdir()?;
        let file = spool(dir.path(), b"0123456789")?;
        let mut a = FileStreamCache::new(file, None, 10, 2);
        let mut b = a.copy().unwrap();

        let mut buf = [0u8; 3];
        a.read_exact(&mut buf)?;
        assert_eq!(&buf, b"012");
        b.read_exact(&mut buf)?;
        assert_eq!(&buf, b"012");
        a.read_exact(&mut buf)?;
        assert_eq!(&buf, b"345");

        let mut out = Vec::new();
        assert_eq!(b.write_to(&mut out).unwrap(), 10);
        assert_eq!(out, b"0123456789");
        assert_eq!(b.position(), 3);
        Ok(())
    }
}
