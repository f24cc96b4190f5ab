//! Config command implementation

use anyhow::{Context, Result};
use streamcache_io_impl::StreamCachingStrategy;

use crate::{ConfigArgs, utils};

/// Run the config command
pub fn run(args: ConfigArgs) -> Result<()> {
    let config = utils::load_configuration(&args)?;
    let strategy =
        StreamCachingStrategy::new(config).with_context(|| "Invalid stream caching configuration")?;
    let json = serde_json::to_string_pretty(strategy.configuration())
        .with_context(|| "Failed to serialize configuration")?;
    println!("{json}");
    Ok(())
}
