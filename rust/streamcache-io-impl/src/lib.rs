//! Spill-to-disk implementation of the `streamcache-io` abstractions.
//!
//! Bytes written to a [`CachedOutputStream`] accumulate in memory until the
//! [`SpoolPolicy`] says otherwise, then move to a (optionally encrypted) spool
//! file. The finished content is read back through a [`StreamCacheView`], and
//! the spool file is deleted when the owning unit of work completes.

pub mod cached_output_stream;
pub mod cipher;
pub mod config;
pub mod fs;
pub mod lifecycle;
pub mod policy;
pub mod spool_file;
pub mod spool_writer;
pub mod statistics;
pub mod strategy;
pub mod stream_cache;
pub mod threshold_buffer;
pub mod unit_of_work;

pub use cached_output_stream::{CacheState, CachedOutputStream};
pub use cipher::{EncryptionContext, SpoolCipher};
pub use config::SpoolConfiguration;
pub use policy::{SpoolPolicy, ThresholdSpoolRule};
pub use spool_file::SpoolFile;
pub use statistics::{CacheStatistics, StatisticsSnapshot};
pub use strategy::StreamCachingStrategy;
pub use stream_cache::{StreamCacheView, file::FileStreamCache, memory::MemoryStreamCache};
pub use unit_of_work::DefaultUnitOfWork;
