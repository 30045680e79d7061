//! Configuration loading and validation.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{CanvexError, Result};
use crate::types::{ColorSpace, SurfaceOptions};

/// Top-level canvex configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub logging: Option<LoggingConfig>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub driver: Option<DriverConfig>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub surface: Option<SurfaceConfig>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub codec: Option<CodecConfig>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub handles: Option<HandlesConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log format: "plain" (default) or "json".
    #[serde(default = "default_log_format")]
    pub format: String,

    /// Log level override (trace/debug/info/warn/error).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub level: Option<String>,

    /// Per-crate log level overrides (e.g. "canvex_canvas=debug").
    #[serde(default)]
    pub filters: Vec<String>,

    /// Output target: "stderr" (default) or "stdout".
    #[serde(default = "default_log_output")]
    pub output: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            format: default_log_format(),
            level: None,
            filters: Vec::new(),
            output: default_log_output(),
        }
    }
}

fn default_log_format() -> String {
    "plain".into()
}

fn default_log_output() -> String {
    "stderr".into()
}

/// Frame driver settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DriverConfig {
    /// Interval between frame ticks in milliseconds (default: 16, ~60 Hz).
    #[serde(default = "default_frame_interval")]
    pub frame_interval_ms: u64,
}

fn default_frame_interval() -> u64 {
    16
}

/// Defaults used when a session is created without explicit options.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SurfaceConfig {
    #[serde(default = "default_width")]
    pub width: u32,

    #[serde(default = "default_height")]
    pub height: u32,

    #[serde(default)]
    pub alpha: bool,

    #[serde(default = "default_true")]
    pub desynchronized: bool,

    #[serde(default)]
    pub color_space: ColorSpace,

    #[serde(default)]
    pub will_read_frequently: bool,
}

fn default_width() -> u32 {
    800
}

fn default_height() -> u32 {
    600
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CodecConfig {
    /// Number of decoded batches memoized by content digest (0 disables).
    #[serde(default = "default_decode_cache_capacity")]
    pub decode_cache_capacity: usize,
}

fn default_decode_cache_capacity() -> usize {
    8
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HandlesConfig {
    /// Pool/registry size above which a growth warning is logged.
    #[serde(default = "default_handle_warn_threshold")]
    pub warn_threshold: usize,
}

fn default_handle_warn_threshold() -> usize {
    1024
}

/// Substitute `${ENV_VAR}` patterns in a string with their environment variable values.
fn substitute_env_vars(input: &str) -> Result<String> {
    let re = regex::Regex::new(r"\$\{([^}]+)\}")
        .map_err(|e| CanvexError::Config(e.to_string()))?;
    Ok(re
        .replace_all(input, |caps: &regex::Captures| {
            let var_name = &caps[1];
            std::env::var(var_name).unwrap_or_default()
        })
        .into_owned())
}

impl Config {
    /// Load config from a JSON5 file, substituting `${ENV_VAR}` references.
    ///
    /// A missing file yields the default configuration.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let raw = std::fs::read_to_string(path)?;
        let substituted = substitute_env_vars(&raw)?;

        json5::from_str(&substituted).map_err(|e| CanvexError::Config(e.to_string()))
    }

    /// Default config file location.
    pub fn config_dir() -> PathBuf {
        data_dir().join("config.json")
    }

    pub fn frame_interval_ms(&self) -> u64 {
        self.driver
            .as_ref()
            .map(|d| d.frame_interval_ms)
            .unwrap_or_else(default_frame_interval)
    }

    /// Default surface size as `(width, height)`.
    pub fn surface_size(&self) -> (u32, u32) {
        self.surface
            .as_ref()
            .map(|s| (s.width, s.height))
            .unwrap_or((default_width(), default_height()))
    }

    /// Default creation hints for new surfaces.
    pub fn surface_options(&self) -> SurfaceOptions {
        match &self.surface {
            Some(s) => SurfaceOptions {
                alpha: s.alpha,
                desynchronized: s.desynchronized,
                color_space: s.color_space,
                will_read_frequently: s.will_read_frequently,
            },
            None => SurfaceOptions::default(),
        }
    }

    pub fn decode_cache_capacity(&self) -> usize {
        self.codec
            .as_ref()
            .map(|c| c.decode_cache_capacity)
            .unwrap_or_else(default_decode_cache_capacity)
    }

    pub fn handle_warn_threshold(&self) -> usize {
        self.handles
            .as_ref()
            .map(|h| h.warn_threshold)
            .unwrap_or_else(default_handle_warn_threshold)
    }

    /// Get a config value by dotted path (e.g. "driver.frame_interval_ms").
    pub fn get_path(&self, path: &str) -> Option<serde_json::Value> {
        let json = serde_json::to_value(self).ok()?;
        let mut current = &json;
        for segment in path.split('.') {
            current = current.get(segment)?;
        }
        Some(current.clone())
    }

    /// Validate config, returning (warnings, errors).
    pub fn validate(&self) -> (Vec<String>, Vec<String>) {
        let mut warnings = Vec::new();
        let mut errors = Vec::new();

        if let Some(driver) = &self.driver {
            if driver.frame_interval_ms == 0 {
                errors.push("driver.frame_interval_ms cannot be 0".to_string());
            } else if driver.frame_interval_ms > 1000 {
                warnings.push(format!(
                    "driver.frame_interval_ms is {}ms, animation will stutter",
                    driver.frame_interval_ms
                ));
            }
        }

        if let Some(surface) = &self.surface {
            if surface.width == 0 || surface.height == 0 {
                errors.push(format!(
                    "surface size {}x{} must be non-zero",
                    surface.width, surface.height
                ));
            }
        }

        if let Some(logging) = &self.logging {
            if logging.format != "plain" && logging.format != "json" {
                warnings.push(format!(
                    "Unknown logging.format '{}', falling back to plain",
                    logging.format
                ));
            }
            if logging.output != "stderr" && logging.output != "stdout" {
                warnings.push(format!(
                    "Unknown logging.output '{}', falling back to stderr",
                    logging.output
                ));
            }
        }

        if let Some(handles) = &self.handles {
            if handles.warn_threshold == 0 {
                warnings.push("handles.warn_threshold of 0 warns on every new handle".to_string());
            }
        }

        (warnings, errors)
    }
}

/// Base directory for canvex data: `~/.canvex/`
pub fn data_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".canvex")
}
