//! Planner configuration.
//!
//! Handles loading, validating, and merging `respimg.toml`. Stock defaults are
//! the base layer; a user file only needs the keys it wants to change.
//!
//! ## Configuration Options
//!
//! ```toml
//! # All options are optional - defaults shown below
//!
//! breakpoint_unit = "px"     # px, em or rem
//! placeholder = true         # Emit blurred inline placeholders
//! webp = true                # Generate WebP sources
//! avif = false               # Generate AVIF sources
//! # max_width = 2560         # Cap on generated widths
//! auto_crop = true           # Crop around the asset focus point
//! force_absolute_urls = false
//! debug = false              # Surface transform failures instead of degrading
//!
//! [breakpoints]              # label = minimum viewport width
//! sm = 640
//! md = 768
//! lg = 1024
//! xl = 1280
//! 2xl = 1536
//!
//! [quality]                  # per-format encoding quality
//! jpg = 90
//! webp = 90
//! avif = 45
//!
//! [calculator]
//! file_size_factor = 0.7     # predicted file size shrink per step
//! min_file_size = 10240      # stop below this predicted size (bytes)
//! min_width = 20             # stop below this width (px)
//!
//! [placeholder_image]
//! width = 32
//! blur = 5
//!
//! [transform]
//! base_url = "/img"
//! cache_dir = ".respimg-cache"
//! url_prefix = "/img/cache"
//! ```
//!
//! Unknown keys are rejected to catch typos early.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::Path;
use thiserror::Error;

/// Default config filename looked up by the CLI.
pub const CONFIG_FILENAME: &str = "respimg.toml";

/// Label of the unconditional fallback breakpoint.
pub const DEFAULT_BREAKPOINT: &str = "default";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
}

/// CSS length unit used in breakpoint media queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WidthUnit {
    #[default]
    Px,
    Em,
    Rem,
}

impl fmt::Display for WidthUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            WidthUnit::Px => "px",
            WidthUnit::Em => "em",
            WidthUnit::Rem => "rem",
        })
    }
}

/// Planner configuration loaded from `respimg.toml`.
///
/// Every field has a default. Passed explicitly to every component through
/// [`Services`](crate::Services); nothing reads process-wide state.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Breakpoint label → minimum viewport width.
    pub breakpoints: BTreeMap<String, u32>,
    pub breakpoint_unit: WidthUnit,
    /// Include placeholders unless the call site says otherwise.
    pub placeholder: bool,
    pub webp: bool,
    pub avif: bool,
    /// Format (or original file extension) → encoding quality.
    pub quality: BTreeMap<String, u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_width: Option<u32>,
    pub auto_crop: bool,
    pub force_absolute_urls: bool,
    /// Re-raise transform failures instead of degrading to empty output.
    pub debug: bool,
    pub calculator: CalculatorConfig,
    pub placeholder_image: PlaceholderConfig,
    pub transform: TransformConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            breakpoints: [("sm", 640), ("md", 768), ("lg", 1024), ("xl", 1280), ("2xl", 1536)]
                .into_iter()
                .map(|(label, width)| (label.to_string(), width))
                .collect(),
            breakpoint_unit: WidthUnit::Px,
            placeholder: true,
            webp: true,
            avif: false,
            quality: [("jpg", 90), ("jpeg", 90), ("png", 90), ("webp", 90), ("avif", 45)]
                .into_iter()
                .map(|(format, q)| (format.to_string(), q))
                .collect(),
            max_width: None,
            auto_crop: true,
            force_absolute_urls: false,
            debug: false,
            calculator: CalculatorConfig::default(),
            placeholder_image: PlaceholderConfig::default(),
            transform: TransformConfig::default(),
        }
    }
}

impl Config {
    /// Validate config values are within acceptable ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some((format, _)) = self.quality.iter().find(|(_, q)| **q > 100) {
            return Err(ConfigError::Validation(format!(
                "quality.{format} must be 0-100"
            )));
        }
        for label in self.breakpoints.keys() {
            if label.is_empty() || label.contains(':') {
                return Err(ConfigError::Validation(format!(
                    "breakpoint label '{label}' must be non-empty and must not contain ':'"
                )));
            }
        }
        let factor = self.calculator.file_size_factor;
        if !(factor > 0.0 && factor < 1.0) {
            return Err(ConfigError::Validation(
                "calculator.file_size_factor must be between 0 and 1 (exclusive)".into(),
            ));
        }
        if self.placeholder_image.width == 0 {
            return Err(ConfigError::Validation(
                "placeholder_image.width must be non-zero".into(),
            ));
        }
        if self.max_width == Some(0) {
            return Err(ConfigError::Validation(
                "max_width must be non-zero when set".into(),
            ));
        }
        Ok(())
    }

    /// Configured quality for a format or file extension, if any.
    pub fn quality_for(&self, format: &str) -> Option<u32> {
        self.quality.get(&format.to_ascii_lowercase()).copied()
    }

    /// Breakpoints ordered by minimum width (ties by label), always including
    /// a zero-width fallback.
    ///
    /// When no configured breakpoint starts at 0, [`DEFAULT_BREAKPOINT`] is
    /// added.
    pub fn breakpoint_table(&self) -> Vec<(String, u32)> {
        let mut table: Vec<(String, u32)> = self
            .breakpoints
            .iter()
            .map(|(label, width)| (label.clone(), *width))
            .collect();
        if !table.iter().any(|(_, width)| *width == 0) {
            table.push((DEFAULT_BREAKPOINT.to_string(), 0));
        }
        table.sort_by(|a, b| a.1.cmp(&b.1).then_with(|| a.0.cmp(&b.0)));
        table
    }
}

/// Constants for the file-size-optimized width series.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CalculatorConfig {
    /// Predicted file size multiplier between consecutive widths.
    pub file_size_factor: f64,
    /// Stop once the predicted file size drops below this many bytes.
    pub min_file_size: u64,
    /// Stop once a width drops below this many pixels.
    pub min_width: u32,
}

impl Default for CalculatorConfig {
    fn default() -> Self {
        Self {
            file_size_factor: 0.7,
            min_file_size: 10 * 1024,
            min_width: 20,
        }
    }
}

/// Placeholder rendering settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PlaceholderConfig {
    /// Placeholder width in pixels. Also the `w` descriptor in srcsets.
    pub width: u32,
    /// Blur radius requested from the transform engine.
    pub blur: u32,
}

impl Default for PlaceholderConfig {
    fn default() -> Self {
        Self { width: 32, blur: 5 }
    }
}

/// Transform engine settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TransformConfig {
    /// Route prefix of generated transform URLs.
    pub base_url: String,
    /// Origin prepended when `force_absolute_urls` is set.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub app_url: Option<String>,
    /// Key used to sign transform URLs. Unsigned when absent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sign_key: Option<String>,
    /// Directory the render engine writes variants into.
    pub cache_dir: String,
    /// Public URL prefix of `cache_dir`.
    pub url_prefix: String,
}

impl Default for TransformConfig {
    fn default() -> Self {
        Self {
            base_url: "/img".to_string(),
            app_url: None,
            sign_key: None,
            cache_dir: ".respimg-cache".to_string(),
            url_prefix: "/img/cache".to_string(),
        }
    }
}

// =============================================================================
// Config loading, merging, and validation
// =============================================================================

/// Returns the stock default config as a `toml::Value::Table`.
pub fn stock_defaults_value() -> toml::Value {
    toml::Value::try_from(Config::default()).expect("default config must serialize")
}

/// Recursively merge `overlay` on top of `base`.
///
/// - Tables are merged key-by-key (overlay keys override base keys).
/// - Non-table values in overlay replace base values entirely.
/// - Keys in base that are not in overlay are preserved.
///
/// The `breakpoints` table is the exception: a user table replaces the stock
/// one wholesale, otherwise stock breakpoints could never be removed.
pub fn merge_toml(base: toml::Value, overlay: toml::Value) -> toml::Value {
    match (base, overlay) {
        (toml::Value::Table(mut base_table), toml::Value::Table(overlay_table)) => {
            for (key, overlay_val) in overlay_table {
                let merged = match base_table.remove(&key) {
                    Some(_) if key == "breakpoints" => overlay_val,
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

/// Load a config file as a raw TOML value.
///
/// Returns `Ok(None)` if the file does not exist.
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
) -> Result<Config, ConfigError> {
    let merged = match overlay {
        Some(ov) => merge_toml(base, ov),
        None => base,
    };
    let config: Config = merged.try_into()?;
    config.validate()?;
    Ok(config)
}

/// Load config from a file, falling back to stock defaults when it is absent.
pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    let overlay = load_raw_config(path)?;
    resolve_config(stock_defaults_value(), overlay)
}

/// Returns a fully-commented stock `respimg.toml`.
///
/// Used by the `gen-config` CLI command.
pub fn stock_config_toml() -> &'static str {
    r##"# respimg configuration
# =====================
# All settings are optional. Values shown below are the defaults.
# Unknown keys will cause an error.

# Unit of breakpoint widths in media queries: "px", "em" or "rem".
breakpoint_unit = "px"

# Emit tiny blurred inline placeholders in front of every srcset.
placeholder = true

# Generate additional sources in these formats. The original format is
# always generated.
webp = true
avif = false

# Upper bound for generated widths. A per-call `glide:width` wins.
# max_width = 2560

# Crop around the asset's focus point unless a `glide:fit` says otherwise.
auto_crop = true

# Prefix transform URLs with transform.app_url.
force_absolute_urls = false

# Surface transform failures instead of degrading to empty output.
debug = false

# ---------------------------------------------------------------------------
# Breakpoints: label = minimum viewport width.
# A "default" breakpoint at 0 is added when none starts at 0.
# ---------------------------------------------------------------------------
[breakpoints]
sm = 640
md = 768
lg = 1024
xl = 1280
2xl = 1536

# ---------------------------------------------------------------------------
# Encoding quality per output format (or original file extension).
# ---------------------------------------------------------------------------
[quality]
jpg = 90
jpeg = 90
png = 90
webp = 90
avif = 45

# ---------------------------------------------------------------------------
# Width series heuristic
# ---------------------------------------------------------------------------
[calculator]
# Predicted file size multiplier between consecutive widths.
file_size_factor = 0.7
# Stop once the predicted file size drops below this many bytes.
min_file_size = 10240
# Stop once a width drops below this many pixels.
min_width = 20

# ---------------------------------------------------------------------------
# Placeholders
# ---------------------------------------------------------------------------
[placeholder_image]
width = 32
blur = 5

# ---------------------------------------------------------------------------
# Transform engine
# ---------------------------------------------------------------------------
[transform]
# Route prefix of transform URLs.
base_url = "/img"
# Origin used when force_absolute_urls is set.
# app_url = "https://example.com"
# Sign transform URLs with this key.
# sign_key = "change-me"
# Output directory and public prefix of the render engine.
cache_dir = ".respimg-cache"
url_prefix = "/img/cache"
"##
}
