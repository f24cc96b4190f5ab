//! The write side of a spool file.

use std::{
    fs::File,
    io::{BufWriter, Write},
    path::Path,
    sync::Arc,
};

use log::debug;
use streamcache_common::{Error, Result};

use crate::{
    cipher::{CipherWriter, EncryptionContext, SpoolCipher},
    fs,
    spool_file::SpoolFile,
};

/// The result of a finished spool: everything a reader needs.
#[derive(Debug, Clone)]
pub struct FinishedSpool {
    pub file: Arc<SpoolFile>,
    pub encryption: Option<EncryptionContext>,
    pub length: u64,
}

enum SpoolSink {
    Plain(BufWriter<File>),
    Encrypted(CipherWriter<BufWriter<File>>),
}

impl SpoolSink {
    fn into_buffered(self) -> BufWriter<File> {
        match self {
            SpoolSink::Plain(w) => w,
            SpoolSink::Encrypted(w) => w.into_inner(),
        }
    }
}

impl Write for SpoolSink {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        match self {
            SpoolSink::Plain(w) => w.write(buf),
            SpoolSink::Encrypted(w) => w.write(buf),
        }
    }

    fn write_all(&mut self, buf: &[u8]) -> std::io::Result<()> {
        match self {
            SpoolSink::Plain(w) => w.write_all(buf),
            SpoolSink::Encrypted(w) => w.write_all(buf),
        }
    }

    fn flush(&mut self) -> std::io::Result<()> {
        match self {
            SpoolSink::Plain(w) => w.flush(),
            SpoolSink::Encrypted(w) => w.flush(),
        }
    }
}

/// Owns a spool file from creation until the coordinator finishes writing.
///
/// All writes are synchronous; the first failure is returned to the caller,
/// and the writer should be discarded afterwards.
pub struct DiskSpoolWriter {
    sink: SpoolSink,
    file: Arc<SpoolFile>,
    encryption: Option<EncryptionContext>,
    written: u64,
}

impl DiskSpoolWriter {
    /// Creates a new spool file in `directory`.
    ///
    /// # Arguments
    ///
    /// * `directory` - Existing, writable spool directory.
    /// * `cipher` - Optional cipher; a fresh key is generated for this file.
    /// * `buffer_size` - Capacity of the write buffer in front of the file.
    /// * `delete_on_drop` - Whether the file goes away with its last handle
    ///   (manual lifecycle), instead of waiting for a unit of work.
    pub fn create(
        directory: &Path,
        cipher: Option<SpoolCipher>,
        buffer_size: usize,
        delete_on_drop: bool,
    ) -> Result<DiskSpoolWriter> {
        let (file, path) = fs::create_spool_file(directory).map_err(|e| {
            Error::io(
                format!("create spool file in {}", directory.display()),
                e,
            )
        })?;
        let buffered = BufWriter::with_capacity(buffer_size.max(1), file);
        let encryption = cipher.map(EncryptionContext::generate);
        let sink = match &encryption {
            Some(context) => SpoolSink::Encrypted(CipherWriter::new(buffered, context)),
            None => SpoolSink::Plain(buffered),
        };
        debug!(
            "created spool file '{}' (cipher: {})",
            path.display(),
            cipher.map_or("none", SpoolCipher::name)
        );
        Ok(DiskSpoolWriter {
            sink,
            file: Arc::new(SpoolFile::new(path, delete_on_drop)),
            encryption,
            written: 0,
        })
    }

    pub fn file(&self) -> &Arc<SpoolFile> {
        &self.file
    }

    pub fn written(&self) -> u64 {
        self.written
    }

    /// Writes out the content accumulated in memory before the overflow.
    pub fn migrate(&mut self, buffered: &[u8]) -> Result<()> {
        self.write(buffered)
    }

    pub fn write(&mut self, buf: &[u8]) -> Result<()> {
        self.sink
            .write_all(buf)
            .map_err(|e| Error::io(format!("write {}", self.file.path().display()), e))?;
        self.written += buf.len() as u64;
        Ok(())
    }

    pub fn flush(&mut self) -> Result<()> {
        self.sink
            .flush()
            .map_err(|e| Error::io(format!("flush {}", self.file.path().display()), e))
    }

    /// Flushes and closes the write side of the spool file.
    pub fn finish(self) -> Result<FinishedSpool> {
        let DiskSpoolWriter {
            sink,
            file,
            encryption,
            written,
        } = self;
        let context = || format!("finish {}", file.path().display());
        let raw = sink
            .into_buffered()
            .into_inner()
            .map_err(|e| Error::io(context(), e.into_error()))?;
        raw.sync_data().map_err(|e| Error::io(context(), e))?;
        drop(raw);
        debug!(
            "finished spool file '{}' ({written} bytes)",
            file.path().display()
        );
        Ok(FinishedSpool {
            file,
            encryption,
            length: written,
        })
    }
}
