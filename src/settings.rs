//! Build settings loaded from an optional TOML file.
//!
//! Settings describe *how* derivatives are produced (target sizes, encoding
//! qualities, parallelism) and are shared by every gallery built on the same
//! machine. *What* to publish lives in the per-gallery [`config`](crate::config)
//! file instead.
//!
//! All keys are optional. A user file is merged on top of the stock
//! defaults, so overriding a single nested key such as `sizes.thumb.width`
//! keeps the rest. Unknown keys are rejected.
//!
//! ```toml
//! [sizes]
//! thumb = { width = 160, height = 160 }
//! preview = { width = 320, height = 240 }
//!
//! [quality]
//! full = 90
//!
//! [processing]
//! max_processes = 4
//! watchdog_secs = 120
//! ```

use crate::imaging::Bounds;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SettingsError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Settings validation error: {0}")]
    Validation(String),
}

/// Build settings. Every field has a default.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    /// Target boxes for each derivative.
    pub sizes: SizesConfig,
    /// Encoding quality per derivative.
    pub quality: QualityConfig,
    /// Parallelism and liveness settings.
    pub processing: ProcessingConfig,
}

impl Settings {
    /// Validate values are within acceptable ranges.
    pub fn validate(&self) -> Result<(), SettingsError> {
        for (name, bounds) in [
            ("thumb", self.sizes.thumb),
            ("preview", self.sizes.preview),
            ("image", self.sizes.image),
            ("large", self.sizes.large),
        ] {
            if bounds.width == 0 || bounds.height == 0 {
                return Err(SettingsError::Validation(format!(
                    "sizes.{name} must be non-zero"
                )));
            }
        }
        for (name, quality) in [
            ("full", self.quality.full),
            ("preview", self.quality.preview),
            ("thumb", self.quality.thumb),
        ] {
            if !(1..=100).contains(&quality) {
                return Err(SettingsError::Validation(format!(
                    "quality.{name} must be 1-100"
                )));
            }
        }
        Ok(())
    }
}

/// Derivative target sizes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SizesConfig {
    /// Thumbnail box. The gallery's `thumb: N` option overrides it.
    pub thumb: Bounds,
    pub preview: Bounds,
    /// Full-size image box.
    pub image: Bounds,
    /// Full-size box used instead of `image` when the gallery sets `large`.
    pub large: Bounds,
}

impl Default for SizesConfig {
    fn default() -> Self {
        Self {
            thumb: Bounds::new(160, 160),
            preview: Bounds::new(320, 240),
            image: Bounds::new(1500, 1200),
            large: Bounds::new(1800, 1500),
        }
    }
}

/// JPEG quality (1-100) per derivative.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct QualityConfig {
    pub full: u32,
    pub preview: u32,
    pub thumb: u32,
}

impl Default for QualityConfig {
    fn default() -> Self {
        Self {
            full: 90,
            preview: 80,
            thumb: 80,
        }
    }
}

/// Parallel processing settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProcessingConfig {
    /// Maximum number of parallel workers per phase.
    /// When absent, defaults to the number of CPU cores.
    /// Values larger than the core count are clamped down.
    pub max_processes: Option<usize>,
    /// Seconds without a new submission before a phase is declared hung.
    /// 0 disables the watchdog.
    pub watchdog_secs: u64,
}

impl Default for ProcessingConfig {
    fn default() -> Self {
        Self {
            max_processes: None,
            watchdog_secs: 120,
        }
    }
}

/// Resolve the effective worker count.
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

/// The stock defaults as a `toml::Value::Table`.
pub fn stock_defaults_value() -> toml::Value {
    toml::Value::try_from(Settings::default()).expect("default settings must serialize")
}

/// Recursively merge `overlay` on top of `base`.
///
/// Tables merge key-by-key; any other overlay value replaces the base value.
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

/// Parse settings text on top of the stock defaults, then validate.
pub fn parse_settings(content: &str) -> Result<Settings, SettingsError> {
    let overlay: toml::Value = toml::from_str(content)?;
    let settings: Settings = merge_toml(stock_defaults_value(), overlay).try_into()?;
    settings.validate()?;
    Ok(settings)
}

/// Load settings from `path`, or the stock defaults when no path is given.
pub fn load_settings(path: Option<&Path>) -> Result<Settings, SettingsError> {
    match path {
        Some(path) => parse_settings(&fs::read_to_string(path)?),
        None => Ok(Settings::default()),
    }
}

/// A fully-commented stock settings file, printed by `gen-config`.
pub fn stock_settings_toml() -> &'static str {
    r##"# photoweb build settings
# =======================
# All settings are optional. Remove or comment out any you don't need.
# Values shown below are the defaults. Unknown keys cause an error.
#
# Pass this file with --settings. Gallery-specific options (title,
# selection, ordering, downloads) live in the gallery's .web file.

# ---------------------------------------------------------------------------
# Derivative sizes
# ---------------------------------------------------------------------------
# Each derivative is scaled to fit inside its box, keeping the aspect ratio.
# Pictures smaller than the box are never enlarged.
[sizes]
# Thumbnails (t/). A gallery's "thumb: N" option replaces this with NxN.
thumb = { width = 160, height = 160 }

# Previews (p/).
preview = { width = 320, height = 240 }

# Full-size images (the gallery directory itself).
image = { width = 1500, height = 1200 }

# Full-size box used when the gallery sets "large:".
large = { width = 1800, height = 1500 }

# ---------------------------------------------------------------------------
# Encoding quality
# ---------------------------------------------------------------------------
# JPEG quality, 1 (worst) to 100 (best).
[quality]
full = 90
preview = 80
thumb = 80

# ---------------------------------------------------------------------------
# Processing
# ---------------------------------------------------------------------------
[processing]
# Maximum parallel workers. Omit to use all CPU cores.
# Values above the core count are clamped down.
# max_processes = 4

# A phase that receives no new work for this many seconds is considered
# hung and the build is aborted. 0 disables the check. --watchdog
# overrides it.
watchdog_secs = 120
"##
}
