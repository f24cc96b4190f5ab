//! The owner of stream caching policy and of the spool directory.

use std::{
    io::Read,
    path::{Path, PathBuf},
    sync::Arc,
};

use log::{debug, info, warn};
use streamcache_common::{Error, Result};
use streamcache_io::{SpoolRule, UnitOfWork};
use uuid::Uuid;

use crate::{
    cached_output_stream::CachedOutputStream, config::SpoolConfiguration, fs,
    policy::SpoolPolicy, statistics::CacheStatistics, stream_cache::StreamCacheView,
};

const UUID_TOKEN: &str = "#uuid#";
const PID_TOKEN: &str = "#pid#";
const DEFAULT_SPOOL_DIRECTORY: &str = "streamcache/spool-#uuid#";

/// Hands out [`CachedOutputStream`]s that share one configuration, one set of
/// spool rules and one statistics collector.
///
/// There is no global instance: callers create a strategy, [`start`] it, and
/// pass it (typically behind an `Arc`) to whatever produces stream caches.
///
/// The spool directory may contain `#uuid#` (replaced by a random UUID chosen
/// once per strategy) and `#pid#` (the process id). Without an explicit
/// directory, `<system temp>/streamcache/spool-#uuid#` is used.
///
/// [`start`]: StreamCachingStrategy::start
pub struct StreamCachingStrategy {
    config: SpoolConfiguration,
    rules: Vec<Arc<dyn SpoolRule>>,
    statistics: Arc<CacheStatistics>,
    started: bool,
    created_directory: bool,
}

impl StreamCachingStrategy {
    pub fn new(config: SpoolConfiguration) -> Result<StreamCachingStrategy> {
        config.validate()?;
        let mut config = config;
        let pattern = config
            .spool_directory
            .take()
            .unwrap_or_else(|| std::env::temp_dir().join(DEFAULT_SPOOL_DIRECTORY));
        config.spool_directory = Some(resolve_spool_directory(&pattern, Uuid::new_v4())?);
        let statistics = Arc::new(CacheStatistics::new(config.statistics_enabled));
        Ok(StreamCachingStrategy {
            config,
            rules: Vec::new(),
            statistics,
            started: false,
            created_directory: false,
        })
    }

    /// Creates the spool directory, if content can ever be spooled.
    ///
    /// # Errors
    ///
    /// A configuration error if the directory cannot be created or is not
    /// writable.
    pub fn start(&mut self) -> Result<()> {
        if self.started {
            return Ok(());
        }
        if self.config.is_spooling_possible() {
            let directory = self.spool_directory();
            let existed = directory.exists();
            std::fs::create_dir_all(directory).map_err(|e| {
                Error::configuration(
                    "spoolDirectory",
                    format!("cannot create '{}': {e}", directory.display()),
                )
            })?;
            fs::check_spool_directory(directory)?;
            info!(
                "stream caching started, spool directory '{}', threshold {} bytes",
                directory.display(),
                self.config.spool_threshold
            );
            self.created_directory = !existed;
        } else {
            info!("stream caching started, spooling disabled");
        }
        self.started = true;
        Ok(())
    }

    /// Cleans up the spool directory when `remove_spool_directory_when_stopping`
    /// is set.
    ///
    /// A directory created by [`start`](StreamCachingStrategy::start) is
    /// removed with everything in it. A directory that already existed is
    /// kept; only the spool files left in it are deleted.
    pub fn stop(&mut self) -> Result<()> {
        if !self.started {
            return Ok(());
        }
        self.started = false;
        let created_directory = std::mem::take(&mut self.created_directory);
        if !self.config.remove_spool_directory_when_stopping
            || !self.config.is_spooling_possible()
        {
            return Ok(());
        }
        let directory = self.spool_directory();
        let leftovers = match fs::list_spool_files(directory) {
            Ok(files) => files,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
            Err(e) => return Err(Error::io(format!("list {}", directory.display()), e)),
        };
        if !leftovers.is_empty() {
            warn!(
                "stopping stream caching with {} spool files still present in '{}'",
                leftovers.len(),
                directory.display()
            );
        }
        if !created_directory {
            for path in leftovers {
                match std::fs::remove_file(&path) {
                    Ok(()) => (),
                    Err(e) if e.kind() == std::io::ErrorKind::NotFound => (),
                    Err(e) => return Err(Error::io(format!("remove {}", path.display()), e)),
                }
            }
            return Ok(());
        }
        match std::fs::remove_dir_all(directory) {
            Ok(()) => {
                debug!("removed spool directory '{}'", directory.display());
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(Error::io(
                format!("remove {}", directory.display()),
                e,
            )),
        }
    }

    pub fn is_started(&self) -> bool {
        self.started
    }

    /// Adds a custom rule consulted (together with the threshold) before each
    /// write of every stream created afterwards.
    pub fn add_spool_rule(&mut self, rule: Arc<dyn SpoolRule>) {
        self.rules.push(rule);
    }

    pub fn spool_rules(&self) -> &[Arc<dyn SpoolRule>] {
        &self.rules
    }

    pub fn configuration(&self) -> &SpoolConfiguration {
        &self.config
    }

    pub fn statistics(&self) -> &Arc<CacheStatistics> {
        &self.statistics
    }

    /// The resolved spool directory.
    pub fn spool_directory(&self) -> &Path {
        self.config
            .spool_directory
            .as_deref()
            .unwrap_or_else(|| Path::new(""))
    }

    /// Creates a new coordinator with its own copy of the configuration.
    pub fn new_output_stream(
        &self,
        unit_of_work: Option<Arc<dyn UnitOfWork>>,
    ) -> Result<CachedOutputStream> {
        let policy = SpoolPolicy::from_config(&self.config, &self.rules);
        if !self.started && !policy.is_memory_only() {
            return Err(Error::invalid_operation(
                "output stream of a stream caching strategy that is not started",
            ));
        }
        CachedOutputStream::with_policy(
            self.config.clone(),
            policy,
            unit_of_work,
            Some(self.statistics.clone()),
        )
    }

    /// Drains `reader` into a new coordinator and returns a view over the
    /// captured content.
    pub fn cache(
        &self,
        mut reader: impl Read,
        unit_of_work: Option<Arc<dyn UnitOfWork>>,
    ) -> Result<StreamCacheView> {
        let mut stream = self.new_output_stream(unit_of_work)?;
        let mut buf = vec![0u8; self.config.buffer_size];
        loop {
            let n = match reader.read(&mut buf) {
                Ok(0) => break,
                Ok(n) => n,
                Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(Error::io("read source", e)),
            };
            stream.write(&buf[..n])?;
        }
        stream.new_stream_cache()
    }
}

impl Drop for StreamCachingStrategy {
    fn drop(&mut self) {
        if let Err(e) = self.stop() {
            warn!("failed to stop stream caching: {e}");
        }
    }
}

impl std::fmt::Debug for StreamCachingStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamCachingStrategy")
            .field("spool_directory", &self.spool_directory())
            .field("rules", &self.rules)
            .field("started", &self.started)
            .finish_non_exhaustive()
    }
}

fn resolve_spool_directory(pattern: &Path, uuid: Uuid) -> Result<PathBuf> {
    let Some(pattern) = pattern.to_str() else {
        // Non UTF-8 paths cannot carry tokens.
        return Ok(pattern.to_path_buf());
    };
    let resolved = pattern
        .replace(UUID_TOKEN, &uuid.to_string())
        .replace(PID_TOKEN, &std::process::id().to_string());
    if resolved.is_empty() {
        return Err(Error::configuration(
            "spoolDirectory",
            "expected a non-empty path",
        ));
    }
    Ok(PathBuf::from(resolved))
}

#[cfg(test)]
mod tests {
    use std::{path::Path, sync::Arc};

    use streamcache_io::{SpoolRule, StreamCache};
    use uuid::Uuid;

    use super::{StreamCachingStrategy, resolve_spool_directory};
    use crate::config::SpoolConfiguration;

    #[derive(Debug)]
    struct Never;

    impl SpoolRule for Never {
        fn should_spool(&self, _length: u64) -> bool {
            false
        }
    }

    #[test]
    fn test_directory_tokens() {
        let uuid = Uuid::new_v4();
        let resolved =
            resolve_spool_directory(Path::new("/tmp/cache-#pid#/spool-#uuid#"), uuid).unwrap();
        assert_eq!(
            resolved,
            std::path::PathBuf::from(format!(
                "/tmp/cache-{}/spool-{uuid}",
                std::process::id()
            ))
        );
    }

    #[test]
    fn test_default_directory_is_unique() {
        let a = StreamCachingStrategy::new(SpoolConfiguration::default()).unwrap();
        let b = StreamCachingStrategy::new(SpoolConfiguration::default()).unwrap();
        assert_ne!(a.spool_directory(), b.spool_directory());
        assert!(a.spool_directory().starts_with(std::env::temp_dir()));
    }

    #[test]
    fn test_start_creates_and_stop_removes() -> std::io::Result<()> {
        let dir = tempfile::tempdir()?;
        let spool = dir.path().join("spool-#uuid#");
        let mut strategy = StreamCachingStrategy::new(
            SpoolConfiguration::default()
                .with_threshold(4)
                .with_spool_directory(spool),
        )
        .unwrap();
        assert!(strategy.new_output_stream(None).is_err());

        strategy.start().unwrap();
        let directory = strategy.spool_directory().to_path_buf();
        assert!(directory.is_dir());

        let cache = strategy.cache(&b"spooled through the strategy"[..], None).unwrap();
        assert!(!cache.is_in_memory());
        assert_eq!(cache.to_bytes().unwrap(), b"spooled through the strategy");

        strategy.stop().unwrap();
        assert!(!directory.exists());
        Ok(())
    }

    #[test]
    fn test_stop_keeps_existing_directory() -> std::io::Result<()> {
        let dir = tempfile::tempdir()?;
        let existing = dir.path().join("existing");
        std::fs::create_dir(&existing)?;
        let unrelated = existing.join("important.txt");
        std::fs::write(&unrelated, b"keep me")?;

        let mut strategy = StreamCachingStrategy::new(
            SpoolConfiguration::default()
                .with_threshold(4)
                .with_spool_directory(&existing),
        )
        .unwrap();
        strategy.start().unwrap();
        let uow = Arc::new(crate::DefaultUnitOfWork::new());
        let bound: Arc<dyn streamcache_io::UnitOfWork> = uow.clone();
        let _cache = strategy.cache(&[3u8; 64][..], Some(bound)).unwrap();
        assert_eq!(crate::fs::list_spool_files(&existing)?.len(), 1);

        strategy.stop().unwrap();
        assert!(existing.is_dir());
        assert_eq!(std::fs::read(&unrelated)?, b"keep me");
        assert!(crate::fs::list_spool_files(&existing)?.is_empty());
        Ok(())
    }

    #[test]
    fn test_start_fails_on_unusable_directory() -> std::io::Result<()> {
        let dir = tempfile::tempdir()?;
        let file = dir.path().join("file");
        std::fs::write(&file, b"x")?;
        let mut strategy = StreamCachingStrategy::new(
            SpoolConfiguration::default().with_spool_directory(file.join("spool")),
        )
        .unwrap();
        assert!(strategy.start().unwrap_err().is_configuration());
        Ok(())
    }

    #[test]
    fn test_memory_only_needs_no_directory() {
        let strategy =
            StreamCachingStrategy::new(SpoolConfiguration::default().with_threshold(-1)).unwrap();
        let cache = strategy.cache(&[7u8; 1000][..], None).unwrap();
        assert!(cache.is_in_memory());
        assert_eq!(cache.length(), 1000);
        assert!(!strategy.spool_directory().exists());
    }

    #[test]
    fn test_spool_rules_and_statistics() -> std::io::Result<()> {
        let dir = tempfile::tempdir()?;
        let mut strategy = StreamCachingStrategy::new(
            SpoolConfiguration::default()
                .with_threshold(8)
                .with_statistics(true)
                .with_spool_directory(dir.path().join("spool")),
        )
        .unwrap();
        strategy.start().unwrap();

        let spooled = strategy.cache(&[1u8; 64][..], None).unwrap();
        assert!(!spooled.is_in_memory());

        strategy.add_spool_rule(Arc::new(Never));
        assert_eq!(strategy.spool_rules().len(), 1);
        let kept = strategy.cache(&[1u8; 64][..], None).unwrap();
        assert!(kept.is_in_memory());

        let snapshot = strategy.statistics().snapshot();
        assert_eq!(snapshot.cache_spool_counter, 1);
        assert_eq!(snapshot.cache_spool_size, 64);
        assert_eq!(snapshot.cache_memory_counter, 1);
        assert_eq!(snapshot.cache_memory_average_size, 64);
        Ok(())
    }
}
