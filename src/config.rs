//! Pipeline configuration module.
//!
//! Handles loading, validating, and merging `imgconv.toml` files. Stock
//! defaults are the base layer; a config file and then command-line flags are
//! merged on top, and only the fully merged result is validated.
//!
//! ## Configuration Options
//!
//! ```toml
//! # All options are optional - defaults shown below
//!
//! [output]
//! format = "jpg"            # jpg | png | tiff
//! quality = 100             # 1-100, 0 = engine default (100)
//! # compression = "zip"     # none | jpeg | zip (default: implied by format)
//!
//! [transform]
//! # max_width = 1920        # Shrink to fit, never upscale
//! # max_height = 1080
//! # scale_percent = 50      # Relative to the size after max_width/max_height
//! # rotate = 90             # Clockwise degrees
//! background = "#ffffff"    # Fill for canvas exposed by rotation
//!
//! [processing]
//! max_processes = 4         # Max parallel workers (omit for auto = CPU cores)
//! ```
//!
//! ## Partial Configuration
//!
//! Config files are sparse. Override just the values you want:
//!
//! ```toml
//! [output]
//! format = "png"
//! ```
//!
//! Unknown keys are rejected to catch typos early.

use crate::converter::Step;
use crate::imaging::{Background, Compression, Format, Options};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;

/// File name looked up by [`load_config`].
pub const CONFIG_FILE: &str = "imgconv.toml";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("TOML serialize error: {0}")]
    Serialize(#[from] toml::ser::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
}

/// Pipeline configuration loaded from `imgconv.toml`.
///
/// All fields have defaults. User config files need only specify the values
/// they want to override. Unknown keys are rejected.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PipelineConfig {
    /// Encoding directives for the exported blob.
    pub output: OutputConfig,
    /// Geometric transforms applied before encoding.
    pub transform: TransformConfig,
    /// Parallel processing settings.
    pub processing: ProcessingConfig,
}

impl PipelineConfig {
    /// Validate config values are within acceptable ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.output.quality > 100 {
            return Err(ConfigError::Validation("output.quality must be 0-100".into()));
        }
        if let Some(percent) = self.transform.scale_percent {
            if !(percent.is_finite() && percent > 0.0) {
                return Err(ConfigError::Validation(
                    "transform.scale_percent must be a positive number".into(),
                ));
            }
        }
        if self.transform.max_width == Some(0) || self.transform.max_height == Some(0) {
            return Err(ConfigError::Validation(
                "transform.max_width and transform.max_height must be non-zero".into(),
            ));
        }
        if let Some(degrees) = self.transform.rotate {
            if !degrees.is_finite() {
                return Err(ConfigError::Validation(
                    "transform.rotate must be a finite angle".into(),
                ));
            }
        }
        if Background::parse(&self.transform.background).is_none() {
            return Err(ConfigError::Validation(format!(
                "transform.background must be #rrggbb or #rrggbbaa, got {:?}",
                self.transform.background
            )));
        }
        Ok(())
    }

    /// Converter options for this configuration.
    pub fn options(&self) -> Options {
        let mut options = Options::new();
        options
            .set_target_format(Some(self.output.format))
            .set_quality(self.output.quality);
        if let Some(compression) = self.output.compression {
            options.set_compression(compression);
        }
        if let Some(background) = Background::parse(&self.transform.background) {
            options.set_background(background);
        }
        options
    }

    /// Transform pipeline: convert, then fit within the size limits, then
    /// percent scaling, then rotation.
    pub fn steps(&self) -> Vec<Step> {
        let transform = &self.transform;
        let mut steps = vec![Step::Convert];
        if transform.max_width.is_some() || transform.max_height.is_some() {
            steps.push(Step::ScaleToSize {
                width: transform.max_width.unwrap_or(u32::MAX),
                height: transform.max_height.unwrap_or(u32::MAX),
            });
        }
        if let Some(percent) = transform.scale_percent {
            steps.push(Step::ScaleToPercent(percent));
        }
        if let Some(degrees) = transform.rotate {
            steps.push(Step::Rotate(degrees));
        }
        steps
    }
}

/// Encoding settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct OutputConfig {
    pub format: Format,
    /// 0 leaves the choice to the engine default.
    pub quality: u32,
    /// Overrides the scheme implied by `format`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub compression: Option<Compression>,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            format: Format::Jpeg,
            quality: 100,
            compression: None,
        }
    }
}

/// Geometric transforms.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TransformConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_width: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_height: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scale_percent: Option<f64>,
    /// Clockwise degrees.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rotate: Option<f64>,
    pub background: String,
}

impl Default for TransformConfig {
    fn default() -> Self {
        Self {
            max_width: None,
            max_height: None,
            scale_percent: None,
            rotate: None,
            background: Background::default().to_hex(),
        }
    }
}

/// Parallel processing settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProcessingConfig {
    /// Maximum number of parallel conversion workers.
    /// When absent, defaults to the number of CPU cores.
    /// Values larger than the core count are clamped down.
    #[serde(skip_serializing_if = "Option::is_none")]
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
    config
        .max_processes
        .map(|n| n.clamp(1, cores))
        .unwrap_or(cores)
}

// =============================================================================
// Config loading, merging, and validation
// =============================================================================

/// Returns the stock default config as a `toml::Value::Table`.
///
/// This is the base layer for merging user overrides on top.
pub fn stock_defaults_value() -> Result<toml::Value, ConfigError> {
    Ok(toml::Value::try_from(PipelineConfig::default())?)
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

/// Load `imgconv.toml` from a directory as a raw TOML value.
///
/// Returns `Ok(None)` if the directory has no config file.
pub fn load_raw_config(dir: &Path) -> Result<Option<toml::Value>, ConfigError> {
    let config_path = dir.join(CONFIG_FILE);
    if !config_path.exists() {
        return Ok(None);
    }
    load_raw_config_file(&config_path).map(Some)
}

/// Read an explicit config file as a raw TOML value. The file must exist.
pub fn load_raw_config_file(path: &Path) -> Result<toml::Value, ConfigError> {
    let content = fs::read_to_string(path)?;
    Ok(toml::from_str(&content)?)
}

/// Merge overlays onto the stock defaults in order, then deserialize and validate.
pub fn resolve_config(
    overlays: impl IntoIterator<Item = toml::Value>,
) -> Result<PipelineConfig, ConfigError> {
    let merged = overlays
        .into_iter()
        .try_fold(stock_defaults_value()?, |base, overlay| {
            Ok::<_, ConfigError>(merge_toml(base, overlay))
        })?;
    let config: PipelineConfig = merged.try_into()?;
    config.validate()?;
    Ok(config)
}

/// Load config from `imgconv.toml` in the given directory, or stock defaults
/// if there is none.
pub fn load_config(dir: &Path) -> Result<PipelineConfig, ConfigError> {
    resolve_config(load_raw_config(dir)?)
}

/// Load config from an explicit file path. The file must exist.
pub fn load_config_file(path: &Path) -> Result<PipelineConfig, ConfigError> {
    resolve_config([load_raw_config_file(path)?])
}

/// Returns a fully-commented stock `imgconv.toml` with all keys and explanations.
///
/// Used by the `gen-config` CLI command.
pub fn stock_config_toml() -> &'static str {
    r##"# imgconv configuration
# =====================
# All settings are optional. Remove or comment out any you don't need.
# Values shown below are the defaults.
#
# `imgconv batch` reads imgconv.toml from the input directory.
# `imgconv convert --config <file>` reads an explicit file.
# Command-line flags override both.
#
# Unknown keys will cause an error.

# ---------------------------------------------------------------------------
# Output encoding
# ---------------------------------------------------------------------------
[output]
# Target format: "jpg", "png" or "tiff".
format = "jpg"

# Compression quality, 1 (smallest) to 100 (best).
# 0 leaves the choice to the engine default, which is 100.
# For PNG this selects the deflate effort.
quality = 100

# Compression scheme. Normally implied by the format:
#   jpg -> "jpeg", png -> "zip", tiff -> "zip"
# Set "none" to disable it where the format allows.
# compression = "zip"

# ---------------------------------------------------------------------------
# Transforms, applied in this order after the output directives
# ---------------------------------------------------------------------------
[transform]
# Shrink to fit within these bounds. Each axis is clamped on its own and
# images are never enlarged. Omitted axes are left alone.
# max_width = 1920
# max_height = 1080

# Scale by a percentage of the current size. Values above 100 enlarge.
# scale_percent = 50

# Rotate clockwise by this many degrees. Multiples of 90 are lossless;
# other angles expand the canvas.
# rotate = 90

# Fill colour for canvas exposed by rotation, as #rrggbb or #rrggbbaa.
background = "#ffffff"

# ---------------------------------------------------------------------------
# Processing
# ---------------------------------------------------------------------------
[processing]
# Maximum parallel conversion workers for `imgconv batch`.
# Omit or comment out to auto-detect (= number of CPU cores).
# max_processes = 4
"##
}
