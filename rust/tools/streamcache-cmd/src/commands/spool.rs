//! Spool command implementation

use anyhow::{Context, Result};
use std::fs::File;
use std::io::{BufReader, Read};
use std::sync::Arc;
use std::time::Instant;

use streamcache_io::{Outcome, StreamCache, UnitOfWork};
use streamcache_io_impl::{DefaultUnitOfWork, StreamCachingStrategy, fs};

use crate::{ConfigArgs, utils};

/// Run the spool command
pub fn run(args: ConfigArgs, reads: u32, file: String) -> Result<()> {
    utils::validate_file_exists(&file)?;
    let config = utils::load_configuration(&args)?.with_statistics(true);
    let mut strategy =
        StreamCachingStrategy::new(config).with_context(|| "Invalid stream caching configuration")?;
    strategy
        .start()
        .with_context(|| "Failed to start stream caching")?;

    println!("Spooling file: {file}");
    let source = File::open(&file).with_context(|| format!("Failed to open {file}"))?;
    let start_time = Instant::now();

    let unit_of_work = Arc::new(DefaultUnitOfWork::new());
    let bound: Arc<dyn UnitOfWork> = unit_of_work.clone();
    let mut view = strategy
        .cache(BufReader::new(source), Some(bound))
        .with_context(|| format!("Failed to cache {file}"))?;
    let capture_time = start_time.elapsed();

    let spool_files = fs::list_spool_files(strategy.spool_directory()).unwrap_or_default();
    println!("  Size: {}", utils::format_size(view.length()));
    println!(
        "  Storage: {}",
        if view.is_in_memory() { "memory" } else { "spool file" }
    );
    for path in &spool_files {
        println!("  Spool file: {}", path.display());
    }
    if let Some(cipher) = &strategy.configuration().spool_cipher {
        println!("  Cipher: {cipher}");
    }
    println!("  Capture time: {:.2?}", capture_time);

    let expected = std::fs::read(&file).with_context(|| format!("Failed to read {file}"))?;
    let read_start = Instant::now();
    for i in 0..reads {
        view.reset()
            .with_context(|| format!("Failed to reset the stream cache (read {i})"))?;
        let mut actual = Vec::with_capacity(expected.len());
        view.read_to_end(&mut actual)
            .with_context(|| format!("Failed to read the stream cache (read {i})"))?;
        if actual != expected {
            anyhow::bail!("Read {i} does not match the source file");
        }
    }
    println!(
        "  Verified {reads} reads in {:.2?}",
        read_start.elapsed()
    );

    unit_of_work.done(Outcome::Success);
    let remaining = fs::list_spool_files(strategy.spool_directory()).unwrap_or_default();
    println!("  Spool files after completion: {}", remaining.len());

    let statistics = serde_json::to_string_pretty(&strategy.statistics().snapshot())
        .with_context(|| "Failed to serialize statistics")?;
    println!("Statistics: {statistics}");

    strategy
        .stop()
        .with_context(|| "Failed to stop stream caching")?;
    Ok(())
}
