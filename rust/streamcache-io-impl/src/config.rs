//! Stream caching configuration.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use streamcache_common::{Error, Result, verify_config};

use crate::cipher::SpoolCipher;

/// Default spool threshold: content of 128 KiB and more goes to disk.
pub const DEFAULT_SPOOL_THRESHOLD: i64 = 128 * 1024;

/// Default I/O chunk size.
pub const DEFAULT_BUFFER_SIZE: usize = 4 * 1024;

/// Settings of the spooling output buffer.
///
/// The configuration is a plain value: every [`CachedOutputStream`] takes its
/// own copy at construction, so coordinators never share mutable state.
///
/// Field names follow the host configuration surface (`spoolThreshold`,
/// `spoolDirectory`, `spoolCipher`, `bufferSize`, ...) when (de)serialized.
///
/// [`CachedOutputStream`]: crate::CachedOutputStream
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SpoolConfiguration {
    /// Whether content may be spooled to disk at all.
    pub spool_enabled: bool,

    /// Size in bytes at which content moves to disk. A negative value disables
    /// spooling entirely: everything stays in memory regardless of size.
    pub spool_threshold: i64,

    /// I/O chunk size used for file buffering and copying.
    pub buffer_size: usize,

    /// Directory for spool files. When absent, the system temporary directory
    /// is used by stand-alone coordinators, and a per-strategy subdirectory by
    /// [`StreamCachingStrategy`](crate::StreamCachingStrategy).
    ///
    /// The strategy expands `#uuid#` and `#pid#` tokens in this path.
    pub spool_directory: Option<PathBuf>,

    /// Name of a streaming cipher used to encrypt spool files, see [`SpoolCipher`].
    pub spool_cipher: Option<String>,

    /// Whether any single spool rule may trigger spooling (instead of requiring
    /// all rules to agree).
    pub any_spool_rules: bool,

    /// Whether the strategy removes its spool directory on `stop()`.
    pub remove_spool_directory_when_stopping: bool,

    /// Whether cache statistics are collected.
    pub statistics_enabled: bool,
}

impl Default for SpoolConfiguration {
    fn default() -> Self {
        SpoolConfiguration {
            spool_enabled: true,
            spool_threshold: DEFAULT_SPOOL_THRESHOLD,
            buffer_size: DEFAULT_BUFFER_SIZE,
            spool_directory: None,
            spool_cipher: None,
            any_spool_rules: false,
            remove_spool_directory_when_stopping: true,
            statistics_enabled: false,
        }
    }
}

impl SpoolConfiguration {
    /// Parses a JSON document into a configuration. Missing fields take their
    /// default values.
    pub fn from_json_str(json: &str) -> Result<SpoolConfiguration> {
        let config: SpoolConfiguration = serde_json::from_str(json)
            .map_err(|e| Error::configuration("json", e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Reads and parses a JSON configuration file.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<SpoolConfiguration> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)
            .map_err(|e| Error::io(format!("read {}", path.display()), e))?;
        Self::from_json_str(&json)
    }

    pub fn with_spool_enabled(mut self, enabled: bool) -> Self {
        self.spool_enabled = enabled;
        self
    }

    pub fn with_threshold(mut self, threshold: i64) -> Self {
        self.spool_threshold = threshold;
        self
    }

    pub fn with_buffer_size(mut self, buffer_size: usize) -> Self {
        self.buffer_size = buffer_size;
        self
    }

    pub fn with_spool_directory(mut self, directory: impl Into<PathBuf>) -> Self {
        self.spool_directory = Some(directory.into());
        self
    }

    pub fn with_cipher(mut self, cipher: impl Into<String>) -> Self {
        self.spool_cipher = Some(cipher.into());
        self
    }

    pub fn with_any_spool_rules(mut self, any: bool) -> Self {
        self.any_spool_rules = any;
        self
    }

    pub fn with_statistics(mut self, enabled: bool) -> Self {
        self.statistics_enabled = enabled;
        self
    }

    /// Checks the settings that can be verified without touching the filesystem.
    pub fn validate(&self) -> Result<()> {
        verify_config!("bufferSize", self.buffer_size > 0);
        self.cipher()?;
        Ok(())
    }

    /// Resolves the configured cipher name.
    pub fn cipher(&self) -> Result<Option<SpoolCipher>> {
        self.spool_cipher
            .as_deref()
            .map(SpoolCipher::from_name)
            .transpose()
    }

    /// Whether content can ever reach the disk under this configuration.
    pub fn is_spooling_possible(&self) -> bool {
        self.spool_enabled && self.spool_threshold >= 0
    }

    /// The directory spool files are created in.
    pub fn effective_spool_directory(&self) -> PathBuf {
        self.spool_directory
            .clone()
            .unwrap_or_else(std::env::temp_dir)
    }
}
