//! Application configuration and its precedence hierarchy
//!
//! Values are layered as CLI > environment > file > defaults. The file is
//! either the one given with `--config` or `smoothfps.toml` in the working
//! directory when present.

use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{InterpError, InterpResult};
use crate::follow::{FollowOptions, FollowStrategy};

/// Config file picked up from the working directory
pub const DEFAULT_CONFIG_FILE: &str = "smoothfps.toml";

/// Environment variables and the setting each one overrides
pub const ENV_MAPPINGS: &[(&str, &str)] = &[
    ("SMOOTHFPS_FFMPEG", "tools.ffmpeg"),
    ("SMOOTHFPS_FFPROBE", "tools.ffprobe"),
    ("SMOOTHFPS_VSPIPE", "tools.vspipe"),
    ("SMOOTHFPS_PROFILES", "profiles"),
    ("SMOOTHFPS_FOLLOW_STRATEGY", "follow.strategy"),
];

/// External tool locations
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ToolPaths {
    pub ffmpeg: PathBuf,
    pub ffprobe: PathBuf,
    pub vspipe: PathBuf,
}

impl Default for ToolPaths {
    fn default() -> Self {
        Self {
            ffmpeg: PathBuf::from("ffmpeg"),
            ffprobe: PathBuf::from("ffprobe"),
            vspipe: PathBuf::from("vspipe"),
        }
    }
}

/// Output follower settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FollowConfig {
    /// Notification backend
    pub strategy: FollowStrategy,
    /// Longest single readiness wait in milliseconds
    pub poll_interval_ms: u64,
}

impl Default for FollowConfig {
    fn default() -> Self {
        Self {
            strategy: FollowStrategy::Auto,
            poll_interval_ms: 250,
        }
    }
}

/// Application configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AppConfig {
    /// Encoding profiles file
    pub profiles: PathBuf,
    /// VapourSynth script run by vspipe
    pub script: PathBuf,
    /// Frame rate of the interpolated output
    pub output_fps: f64,
    pub tools: ToolPaths,
    pub follow: FollowConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            profiles: PathBuf::from("profiles.yaml"),
            script: PathBuf::from("interpolate.vpy"),
            output_fps: 60.0,
            tools: ToolPaths::default(),
            follow: FollowConfig::default(),
        }
    }
}

/// Settings given on the command line
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConfigOverrides {
    pub follow_strategy: Option<FollowStrategy>,
}

impl AppConfig {
    /// Parse a TOML document; missing keys keep their defaults
    pub fn from_toml_str(content: &str) -> InterpResult<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Load a TOML config file
    pub fn load_file(path: &Path) -> InterpResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| InterpError::ConfigError {
            message: format!("Failed to read config file {}: {}", path.display(), e),
        })?;
        Self::from_toml_str(&content)
    }

    /// Build the configuration from all layers
    pub fn initialize(
        config_path: Option<&Path>,
        overrides: &ConfigOverrides,
    ) -> InterpResult<Self> {
        Self::initialize_with(config_path, overrides, |key| std::env::var(key).ok())
    }

    /// Same as [`AppConfig::initialize`] with an explicit environment lookup
    pub fn initialize_with<F>(
        config_path: Option<&Path>,
        overrides: &ConfigOverrides,
        lookup: F,
    ) -> InterpResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = match config_path {
            Some(path) => {
                info!("Loading configuration from: {}", path.display());
                Self::load_file(path)?
            }
            None if Path::new(DEFAULT_CONFIG_FILE).exists() => {
                info!("Loading configuration from: {}", DEFAULT_CONFIG_FILE);
                Self::load_file(Path::new(DEFAULT_CONFIG_FILE))?
            }
            None => {
                debug!("No configuration file, using defaults");
                Self::default()
            }
        };

        config.apply_env(lookup)?;
        config.apply_overrides(overrides);
        config.validate()?;
        Ok(config)
    }

    /// Apply environment overrides
    pub fn apply_env<F>(&mut self, lookup: F) -> InterpResult<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut applied = 0;
        for (var, key) in ENV_MAPPINGS {
            let Some(value) = lookup(var) else {
                continue;
            };
            info!("Found environment override: {} = {}", var, value);

            match *key {
                "tools.ffmpeg" => self.tools.ffmpeg = PathBuf::from(value),
                "tools.ffprobe" => self.tools.ffprobe = PathBuf::from(value),
                "tools.vspipe" => self.tools.vspipe = PathBuf::from(value),
                "profiles" => self.profiles = PathBuf::from(value),
                "follow.strategy" => {
                    self.follow.strategy = FollowStrategy::from_str(&value, true).map_err(|e| {
                        InterpError::ConfigError {
                            message: format!("{}: {}", var, e),
                        }
                    })?;
                }
                _ => continue,
            }
            applied += 1;
        }

        if applied > 0 {
            debug!("Applied {} environment variable overrides", applied);
        }
        Ok(())
    }

    /// Apply command line overrides
    pub fn apply_overrides(&mut self, overrides: &ConfigOverrides) {
        if let Some(strategy) = overrides.follow_strategy {
            debug!("CLI override: follow.strategy = {}", strategy);
            self.follow.strategy = strategy;
        }
    }

    /// Reject settings no run could use
    pub fn validate(&self) -> InterpResult<()> {
        if self.follow.poll_interval_ms == 0 {
            return Err(InterpError::ConfigError {
                message: "follow.poll_interval_ms must be greater than 0".to_string(),
            });
        }
        if !self.follow.strategy.is_supported() {
            return Err(InterpError::UnsupportedStrategy {
                strategy: self.follow.strategy,
            });
        }
        if !(self.output_fps.is_finite() && self.output_fps > 0.0) {
            return Err(InterpError::ConfigError {
                message: format!("output_fps must be greater than 0, got {}", self.output_fps),
            });
        }
        Ok(())
    }

    /// Follower options derived from this configuration
    pub fn follow_options(&self) -> FollowOptions {
        FollowOptions {
            strategy: self.follow.strategy,
            poll_interval: Duration::from_millis(self.follow.poll_interval_ms),
        }
    }
}
