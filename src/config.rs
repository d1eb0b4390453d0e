//! # Z Offset Configuration
//!
//! Resolved values handed to the rewriter come from a small TOML file.
//!
//! ## Example: TOML Configuration
//!
//! ```toml
//! [z_offset]
//! offset = 0.2
//! extensive = true
//!
//! [machine]
//! gcode_flavor = "Griffin"
//! layer_height_0 = 0.3
//! ```
//!
//! - `extensive` may be omitted; it then follows the firmware flavor (`Griffin` needs
//!   every move rewritten, everything else gets the localized `G92` approach).
//! - The offset range is advisory only: out-of-range values are logged, never rejected.

// src/config.rs - Z offset configuration file
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::gcode::OffsetMode;

/// Flavor whose firmware ignores `G92` origin resets.
pub const GRIFFIN_FLAVOR: &str = "Griffin";

/// Extra room below zero beyond the first layer height.
const OFFSET_MINIMUM_MARGIN: f64 = 0.15;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub z_offset: ZOffsetConfig,
    #[serde(default)]
    pub machine: MachineConfig,
}

/// User-facing offset settings.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ZOffsetConfig {
    #[serde(default)]
    pub offset: f64,
    #[serde(default)]
    pub extensive: Option<bool>,
}

/// Machine settings the offset settings depend on.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MachineConfig {
    #[serde(default)]
    pub gcode_flavor: Option<String>,
    #[serde(default = "default_layer_height_0")]
    pub layer_height_0: f64,
}

impl Default for MachineConfig {
    fn default() -> Self {
        Self {
            gcode_flavor: None,
            layer_height_0: default_layer_height_0(),
        }
    }
}

/// Values the rewriter reads. Already resolved, no lookups left.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ZOffsetSettings {
    pub offset: f64,
    pub mode: OffsetMode,
}

fn default_layer_height_0() -> f64 { 0.3 }

impl Config {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.z_offset.offset.is_finite() {
            return Err(ConfigError::Invalid(format!(
                "z_offset.offset must be a finite number, got {}",
                self.z_offset.offset
            )));
        }
        if !(self.machine.layer_height_0 > 0.0) {
            return Err(ConfigError::Invalid(format!(
                "machine.layer_height_0 must be > 0, got {}",
                self.machine.layer_height_0
            )));
        }
        Ok(())
    }

    /// Explicit `extensive` wins, otherwise Griffin firmware gets extensive processing.
    pub fn resolve_mode(&self) -> OffsetMode {
        match self.z_offset.extensive {
            Some(extensive) => OffsetMode::from(extensive),
            None => OffsetMode::from(self.machine.gcode_flavor.as_deref() == Some(GRIFFIN_FLAVOR)),
        }
    }

    /// Advisory bounds `[-(layer_height_0 + 0.15), layer_height_0]`.
    pub fn offset_bounds(&self) -> (f64, f64) {
        let lh0 = self.machine.layer_height_0;
        (-(lh0 + OFFSET_MINIMUM_MARGIN), lh0)
    }

    /// Human-readable warnings for offsets outside the advisory range.
    pub fn offset_warnings(&self) -> Vec<String> {
        let (min, max) = self.offset_bounds();
        let offset = self.z_offset.offset;
        let mut warnings = Vec::new();
        if offset < min {
            warnings.push(format!(
                "Z offset {} mm is below the recommended minimum of {} mm",
                offset, min
            ));
        }
        if offset > max {
            warnings.push(format!(
                "Z offset {} mm exceeds the first layer height of {} mm",
                offset, max
            ));
        }
        warnings
    }

    pub fn settings(&self) -> ZOffsetSettings {
        ZOffsetSettings {
            offset: self.z_offset.offset,
            mode: self.resolve_mode(),
        }
    }
}

/// Load configuration from a TOML file at the given path.
pub fn load_config(path: &str) -> Result<Config, ConfigError> {
    let contents = std::fs::read_to_string(path).map_err(|e| {
        tracing::error!("Failed to read config file '{}': {}", path, e);
        ConfigError::Io(e)
    })?;
    let config: Config = toml::from_str(&contents).map_err(|e| {
        tracing::error!("Failed to parse config TOML: {}", e);
        ConfigError::Toml(e)
    })?;
    config.validate()?;
    Ok(config)
}
