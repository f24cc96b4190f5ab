use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use serde::Serialize;

/// Counters of produced stream caches, split by where the content lived.
///
/// Updates are lock-free and are ignored while statistics are disabled.
#[derive(Debug, Default)]
pub struct CacheStatistics {
    enabled: AtomicBool,
    memory_counter: AtomicU64,
    memory_size: AtomicU64,
    spool_counter: AtomicU64,
    spool_size: AtomicU64,
}

/// A point-in-time copy of [`CacheStatistics`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatisticsSnapshot {
    pub cache_memory_counter: u64,
    pub cache_memory_size: u64,
    pub cache_memory_average_size: u64,
    pub cache_spool_counter: u64,
    pub cache_spool_size: u64,
    pub cache_spool_average_size: u64,
}

impl CacheStatistics {
    pub fn new(enabled: bool) -> CacheStatistics {
        CacheStatistics {
            enabled: AtomicBool::new(enabled),
            ..Default::default()
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Relaxed)
    }

    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::Relaxed);
    }

    pub fn update_memory(&self, size: u64) {
        if self.is_enabled() {
            self.memory_counter.fetch_add(1, Ordering::Relaxed);
            self.memory_size.fetch_add(size, Ordering::Relaxed);
        }
    }

    pub fn update_spool(&self, size: u64) {
        if self.is_enabled() {
            self.spool_counter.fetch_add(1, Ordering::Relaxed);
            self.spool_size.fetch_add(size, Ordering::Relaxed);
        }
    }

    pub fn reset(&self) {
        self.memory_counter.store(0, Ordering::Relaxed);
        self.memory_size.store(0, Ordering::Relaxed);
        self.spool_counter.store(0, Ordering::Relaxed);
        self.spool_size.store(0, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatisticsSnapshot {
        let memory_counter = self.memory_counter.load(Ordering::Relaxed);
        let memory_size = self.memory_size.load(Ordering::Relaxed);
        let spool_counter = self.spool_counter.load(Ordering::Relaxed);
        let spool_size = self.spool_size.load(Ordering::Relaxed);
        StatisticsSnapshot {
            cache_memory_counter: memory_counter,
            cache_memory_size: memory_size,
            cache_memory_average_size: memory_size.checked_div(memory_counter).unwrap_or(0),
            cache_spool_counter: spool_counter,
            cache_spool_size: spool_size,
            cache_spool_average_size: spool_size.checked_div(spool_counter).unwrap_or(0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{CacheStatistics, StatisticsSnapshot};

    #[test]
    fn test_disabled_statistics_ignore_updates() {
        let stats = CacheStatistics::new(false);
        stats.update_memory(10);
        stats.update_spool(100);
        assert_eq!(stats.snapshot(), StatisticsSnapshot::default());
    }

    #[test]
    fn test_averages() {
        let stats = CacheStatistics::new(true);
        stats.update_memory(10);
        stats.update_memory(20);
        stats.update_spool(1000);
        let snapshot = stats.snapshot();
        assert_eq!(snapshot.cache_memory_counter, 2);
        assert_eq!(snapshot.cache_memory_size, 30);
        assert_eq!(snapshot.cache_memory_average_size, 15);
        assert_eq!(snapshot.cache_spool_counter, 1);
        assert_eq!(snapshot.cache_spool_average_size, 1000);

        stats.reset();
        assert_eq!(stats.snapshot(), StatisticsSnapshot::default());
    }
}
