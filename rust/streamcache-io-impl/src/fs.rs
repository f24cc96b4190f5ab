//! Filesystem helpers for spool files and spool directories.

use std::{
    ffi::OsString,
    fs::{File, OpenOptions},
    path::{Path, PathBuf},
};

use streamcache_common::{Error, Result};

/// Prefix of every spool file name, for operational diagnosability.
pub const SPOOL_FILE_PREFIX: &str = "cos";

/// Suffix of every spool file name.
pub const SPOOL_FILE_SUFFIX: &str = ".tmp";

const SPOOL_FILE_RANDOM_LEN: usize = 16;

const MAX_CREATE_ATTEMPTS: usize = 8;

/// Generates a spool file name with a random alphanumeric token.
///
/// The name has the form `cos{token}.tmp`, where `token` is `len` characters long.
pub fn generate_spool_file_name(len: usize) -> OsString {
    let capacity = SPOOL_FILE_PREFIX.len() + len + SPOOL_FILE_SUFFIX.len();
    let mut buf = OsString::with_capacity(capacity);
    buf.push(SPOOL_FILE_PREFIX);
    let mut rng = fastrand::Rng::new();
    let mut char_buf = [0u8; 4];
    for c in std::iter::repeat_with(|| rng.alphanumeric()).take(len) {
        buf.push(c.encode_utf8(&mut char_buf));
    }
    buf.push(SPOOL_FILE_SUFFIX);
    buf
}

/// Creates a new, uniquely named spool file in `folder_path`.
///
/// The file is opened for writing only and, on Unix, is readable by the owner
/// only. Unlike anonymous temporary files it stays visible in the directory:
/// its removal is the responsibility of the spool lifecycle.
pub fn create_spool_file(folder_path: &Path) -> std::io::Result<(File, PathBuf)> {
    let mut last_err = None;
    for _ in 0..MAX_CREATE_ATTEMPTS {
        let file_path = folder_path.join(generate_spool_file_name(SPOOL_FILE_RANDOM_LEN));
        match create_new(&file_path) {
            Ok(file) => return Ok((file, file_path)),
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => last_err = Some(e),
            Err(e) => return Err(e),
        }
    }
    Err(last_err.unwrap_or_else(|| std::io::ErrorKind::AlreadyExists.into()))
}

fn create_new(file_path: &Path) -> std::io::Result<File> {
    let mut options = OpenOptions::new();
    options.write(true).create_new(true);

    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }

    options.open(file_path)
}

/// Verifies that `path` is an existing directory in which spool files can be
/// created and removed, by creating and removing one.
///
/// Failures are configuration errors: a coordinator must not start buffering
/// with a spool directory it cannot use.
pub fn check_spool_directory(path: &Path) -> Result<()> {
    let metadata = std::fs::metadata(path).map_err(|e| {
        Error::configuration(
            "spoolDirectory",
            format!("'{}' is not accessible: {e}", path.display()),
        )
    })?;
    if !metadata.is_dir() {
        return Err(Error::configuration(
            "spoolDirectory",
            format!("'{}' is not a directory", path.display()),
        ));
    }
    let (file, scratch_path) = create_spool_file(path).map_err(|e| {
        Error::configuration(
            "spoolDirectory",
            format!("'{}' is not writable: {e}", path.display()),
        )
    })?;
    drop(file);
    std::fs::remove_file(&scratch_path).map_err(|e| {
        Error::configuration(
            "spoolDirectory",
            format!("cannot remove files from '{}': {e}", path.display()),
        )
    })
}

/// Lists the spool files currently present in `folder_path`.
pub fn list_spool_files(folder_path: &Path) -> std::io::Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in std::fs::read_dir(folder_path)? {
        let entry = entry?;
        let name = entry.file_name();
        let is_spool_file = name
            .to_str()
            .is_some_and(|n| n.starts_with(SPOOL_FILE_PREFIX) && n.ends_with(SPOOL_FILE_SUFFIX));
        if is_spool_file && entry.file_type()?.is_file() {
            files.push(entry.path());
        }
    }
    files.sort();
    Ok(files)
}
