//! Common utilities for streamcache-cmd

use anyhow::{Context, Result};
use std::path::Path;

use streamcache_io_impl::SpoolConfiguration;

use crate::ConfigArgs;

/// Checks if a file exists and is readable
pub fn validate_file_exists(path: &str) -> Result<()> {
    let file_path = Path::new(path);
    if !file_path.exists() {
        anyhow::bail!("File does not exist: {}", path);
    }
    if !file_path.is_file() {
        anyhow::bail!("Path is not a file: {}", path);
    }
    Ok(())
}

/// Formats a byte count in human-readable format
pub fn format_size(size: u64) -> String {
    const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB"];
    let mut size = size as f64;
    let mut unit_index = 0;

    while size >= 1024.0 && unit_index < UNITS.len() - 1 {
        size /= 1024.0;
        unit_index += 1;
    }

    if unit_index == 0 {
        format!("{} {}", size as u64, UNITS[unit_index])
    } else {
        format!("{:.2} {}", size, UNITS[unit_index])
    }
}

/// Builds the effective configuration: the JSON file (if any), then the
/// command-line overrides.
pub fn load_configuration(args: &ConfigArgs) -> Result<SpoolConfiguration> {
    let mut config = match &args.config {
        Some(path) => {
            validate_file_exists(path)?;
            SpoolConfiguration::from_json_file(path)
                .with_context(|| format!("Failed to load configuration from {path}"))?
        }
        None => SpoolConfiguration::default(),
    };
    if let Some(threshold) = args.threshold {
        config = config.with_threshold(threshold);
    }
    if let Some(cipher) = &args.cipher {
        config = config.with_cipher(cipher.clone());
    }
    if let Some(dir) = &args.dir {
        config = config.with_spool_directory(dir);
    }
    if let Some(buffer_size) = args.buffer_size {
        config = config.with_buffer_size(buffer_size);
    }
    config
        .validate()
        .with_context(|| "Invalid stream caching configuration")?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::{format_size, load_configuration};
    use crate::ConfigArgs;

    #[test]
    fn test_format_size() {
        assert_eq!(format_size(512), "512 B");
        assert_eq!(format_size(2048), "2.00 KB");
        assert_eq!(format_size(3 * 1024 * 1024 / 2), "1.50 MB");
    }

    #[test]
    fn test_overrides_win_over_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("streamcache.json");
        std::fs::write(
            &path,
            r#"{ "spoolThreshold": 1024, "spoolCipher": "ChaCha20", "bufferSize": 256 }"#,
        )
        .unwrap();

        let args = ConfigArgs {
            config: Some(path.to_string_lossy().into_owned()),
            threshold: Some(16),
            ..Default::default()
        };
        let config = load_configuration(&args).unwrap();
        assert_eq!(config.spool_threshold, 16);
        assert_eq!(config.buffer_size, 256);
        assert_eq!(config.spool_cipher.as_deref(), Some("ChaCha20"));
    }

    #[test]
    fn test_invalid_cipher_is_rejected() {
        let args = ConfigArgs {
            cipher: Some("DES/CBC/PKCS5Padding".to_string()),
            ..Default::default()
        };
        assert!(load_configuration(&args).is_err());
    }
}
