//! File loading for configuration and measurement bundles.

use crate::bundle::BundleEntry;
use crate::config::Config;
use color_eyre::eyre::{Context, Result};
use log::info;
use std::fs::File;
use std::path::Path;

/// Load, parse and validate configuration from a YAML file
pub fn load_config(config_path: &Path) -> Result<Config> {
    info!("Loading configuration from: {:?}", config_path);

    let file = File::open(config_path)
        .with_context(|| format!("Failed to open config file: {}", config_path.display()))?;

    let config: Config = serde_yaml::from_reader(file)
        .with_context(|| format!("Failed to parse config file: {}", config_path.display()))?;

    config.validate()?;

    Ok(config)
}

/// Load configuration if a path was given, otherwise fall back to defaults
pub fn load_config_or_default(config_path: Option<&Path>) -> Result<Config> {
    match config_path {
        Some(path) => load_config(path),
        None => {
            info!("No configuration file given, using defaults");
            Ok(Config::default())
        }
    }
}

/// Load a measurement bundle: a list of {host, target, measurements}.
///
/// `.yaml`/`.yml` files are read as YAML, anything else as JSON.
pub fn load_bundle(bundle_path: &Path) -> Result<Vec<BundleEntry>> {
    info!("Loading measurement bundle from: {:?}", bundle_path);

    let file = File::open(bundle_path)
        .with_context(|| format!("Failed to open bundle file: {}", bundle_path.display()))?;

    let is_yaml = bundle_path
        .extension()
        .map_or(false, |ext| ext == "yaml" || ext == "yml");

    let entries: Vec<BundleEntry> = if is_yaml {
        serde_yaml::from_reader(file)
            .with_context(|| format!("Failed to parse YAML bundle: {}", bundle_path.display()))?
    } else {
        serde_json::from_reader(std::io::BufReader::new(file))
            .with_context(|| format!("Failed to parse JSON bundle: {}", bundle_path.display()))?
    };

    info!("Loaded {} host/target entries", entries.len());
    Ok(entries)
}
