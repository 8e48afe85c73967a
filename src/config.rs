//! Tool configuration.
//!
//! Settings come from three layers, later ones winning:
//!
//! 1. stock defaults ([`PixbatchConfig::default`])
//! 2. `pixbatch.toml` in the working directory, or the file named by `--config`
//! 3. command-line flags (applied in `main`)
//!
//! ## Configuration Options
//!
//! ```toml
//! # All options are optional - defaults shown below
//!
//! [output]
//! format = "png"                        # png, jpeg, webp, avif, bmp, tiff
//! quality = 0.9                         # 0.0 - 1.0, lossy formats only
//! archive = false                       # zip multiple outputs into one file
//! archive_name = "converted_images.zip"
//!
//! [dimensions]
//! lock_width = false
//! lock_height = false
//! lock_ratio = true
//!
//! [acquire]
//! batch = false                         # false: each acquisition replaces the queue
//!
//! [processing]
//! max_processes = 4                     # omit for auto = CPU cores
//! ```
//!
//! Config files are sparse: override just the values you want. Unknown keys
//! are rejected to catch typos early.

use crate::imaging::{DimensionLocks, OutputFormat, OutputSpec, Quality};
use crate::naming::DEFAULT_ARCHIVE_NAME;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Config file looked up in the working directory when `--config` is not given.
pub const CONFIG_FILE: &str = "pixbatch.toml";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("TOML serialize error: {0}")]
    Serialize(#[from] toml::ser::Error),
    #[error("Config file not found: {0}")]
    NotFound(PathBuf),
    #[error("Config validation error: {0}")]
    Validation(String),
}

/// Everything `pixbatch.toml` can set.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PixbatchConfig {
    pub output: OutputConfig,
    pub dimensions: DimensionsConfig,
    pub acquire: AcquireConfig,
    pub processing: ProcessingConfig,
}

impl PixbatchConfig {
    /// Validate config values are within acceptable ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let quality = self.output.quality;
        if !quality.is_finite() || !(0.0..=1.0).contains(&quality) {
            return Err(ConfigError::Validation(
                "output.quality must be between 0.0 and 1.0".into(),
            ));
        }
        let name = self.output.archive_name.trim();
        if name.is_empty() {
            return Err(ConfigError::Validation(
                "output.archive_name must not be empty".into(),
            ));
        }
        if name.contains('/') || name.contains('\\') {
            return Err(ConfigError::Validation(
                "output.archive_name must be a file name, not a path".into(),
            ));
        }
        if self.processing.max_processes == Some(0) {
            return Err(ConfigError::Validation(
                "processing.max_processes must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

/// Output format and delivery.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct OutputConfig {
    pub format: OutputFormat,
    /// Encoder quality as a fraction. Ignored by lossless formats.
    pub quality: f32,
    /// Deliver multiple outputs as a single zip.
    pub archive: bool,
    pub archive_name: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            format: OutputFormat::default(),
            quality: Quality::default().value(),
            archive: false,
            archive_name: DEFAULT_ARCHIVE_NAME.to_string(),
        }
    }
}

impl OutputConfig {
    pub fn output_spec(&self) -> OutputSpec {
        OutputSpec {
            format: self.format,
            quality: Quality::new(self.quality),
            archive: self.archive,
        }
    }
}

/// Initial state of the dimension locks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DimensionsConfig {
    pub lock_width: bool,
    pub lock_height: bool,
    pub lock_ratio: bool,
}

impl Default for DimensionsConfig {
    fn default() -> Self {
        Self {
            lock_width: false,
            lock_height: false,
            lock_ratio: true,
        }
    }
}

impl DimensionsConfig {
    pub fn locks(&self) -> DimensionLocks {
        DimensionLocks::new(self.lock_width, self.lock_height, self.lock_ratio)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AcquireConfig {
    /// Append acquisitions to the queue instead of replacing it.
    pub batch: bool,
}

/// Parallel processing settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProcessingConfig {
    /// Maximum number of parallel decode/encode workers.
    /// When absent, defaults to the number of CPU cores.
    /// Values larger than the core count are clamped down.
    pub max_processes: Option<usize>,
}

/// Resolve the effective thread count from config.
///
/// - `None` → use all available cores
/// - `Some(n)` → use `min(n, cores)` (user can constrain down, not up)
pub fn effective_threads(config: &ProcessingConfig) -> usize {
    let cores = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);
    config.max_processes.map(|n| n.min(cores)).unwrap_or(cores)
}

/// The stock defaults as a `toml::Value::Table`, the base layer for merging.
pub fn stock_defaults_value() -> Result<toml::Value, ConfigError> {
    Ok(toml::Value::try_from(PixbatchConfig::default())?)
}

/// Recursively merge `overlay` on top of `base`.
///
/// - Tables are merged key-by-key (overlay keys override base keys).
/// - Non-table values in overlay replace base values entirely.
/// - Keys in base that are not in overlay are preserved.
pub fn merge_toml(base: toml::Value, overlay: toml::Value) -> toml::Value {
    match (base, overlay) {
        (toml::Value::Table(mut base_table), toml::Value::Table(overlay_table)) => {
            for (key, overlay_val) in overlay_table {
                let merged = match base_table.remove(&key) {
                    Some(base_val) => merge_toml(base_val, overlay_val),
                    None => overlay_val,
                };
                base_table.insert(key, merged);
            }
            toml::Value::Table(base_table)
        }
        (_, overlay) => overlay,
    }
}

/// Read a config file as a raw TOML value. `Ok(None)` if it does not exist.
pub fn load_raw_config(path: &Path) -> Result<Option<toml::Value>, ConfigError> {
    if !path.exists() {
        return Ok(None);
    }
    let content = fs::read_to_string(path)?;
    let value: toml::Value = toml::from_str(&content)?;
    Ok(Some(value))
}

/// Merge an optional overlay onto a base value, then deserialize and validate.
pub fn resolve_config(
    base: toml::Value,
    overlay: Option<toml::Value>,
) -> Result<PixbatchConfig, ConfigError> {
    let merged = match overlay {
        Some(ov) => merge_toml(base, ov),
        None => base,
    };
    let config: PixbatchConfig = merged.try_into()?;
    config.validate()?;
    Ok(config)
}

/// Load config from `path`, falling back to stock defaults if it is missing.
pub fn load_config(path: &Path) -> Result<PixbatchConfig, ConfigError> {
    let overlay = load_raw_config(path)?;
    resolve_config(stock_defaults_value()?, overlay)
}

/// Load a config file the user named explicitly. A missing file is an error.
pub fn load_explicit_config(path: &Path) -> Result<PixbatchConfig, ConfigError> {
    if !path.exists() {
        return Err(ConfigError::NotFound(path.to_path_buf()));
    }
    load_config(path)
}

/// A fully-commented stock `pixbatch.toml`, printed by `gen-config`.
pub fn stock_config_toml() -> &'static str {
    r##"# pixbatch configuration
# ======================
# All settings are optional. Remove or comment out any you don't need.
# Values shown below are the defaults. Command-line flags override them.
# Unknown keys will cause an error.

# ---------------------------------------------------------------------------
# Output
# ---------------------------------------------------------------------------
[output]
# One of: png, jpeg, webp, avif, bmp, tiff
format = "png"

# Encoder quality from 0.0 (smallest) to 1.0 (best).
# Only used by lossy formats (jpeg, avif).
quality = 0.9

# When more than one image is converted, deliver a single zip instead of
# one file per image.
archive = false
archive_name = "converted_images.zip"

# ---------------------------------------------------------------------------
# Dimension locks
# ---------------------------------------------------------------------------
[dimensions]
# A locked axis takes the value you enter for it.
lock_width = false
lock_height = false
# Derive the other axis from the source aspect ratio.
lock_ratio = true

# ---------------------------------------------------------------------------
# Acquisition
# ---------------------------------------------------------------------------
[acquire]
# false: each acquisition replaces the queue with its first image.
# true: acquisitions append to the queue.
batch = false

# ---------------------------------------------------------------------------
# Processing
# ---------------------------------------------------------------------------
[processing]
# Maximum parallel decode/encode workers.
# Omit or comment out to auto-detect (= number of CPU cores).
# max_processes = 4
"##
}
