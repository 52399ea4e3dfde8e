//! CLI module for SmoothFPS
//!
//! This module handles command-line argument parsing and command execution.

use std::path::PathBuf;

use clap::Parser;

use crate::config::ConfigOverrides;
use crate::follow::FollowStrategy;
use crate::utils::logging::{LogFormat, DEFAULT_LOG_LEVEL};

pub mod args;
pub mod commands;

pub use args::InterpolateArgs;

/// SmoothFPS video interpolation utility
///
/// Renders the input through a VapourSynth motion interpolation script and
/// encodes the result with ffmpeg, reporting progress as one JSON record
/// per line on stdout.
#[derive(Parser, Debug)]
#[command(name = "interpolate")]
#[command(about = "Video interpolation utility for smooth FPS")]
#[command(disable_version_flag = true)]
pub struct Cli {
    #[command(flatten)]
    pub job: InterpolateArgs,

    /// Output version and platform information and exit
    #[arg(long)]
    pub version: bool,

    /// List available profiles and exit
    #[arg(long)]
    pub list_profiles: bool,

    /// Configuration file (default: smoothfps.toml in the working directory)
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Backend used to follow encoder output
    #[arg(long, value_enum)]
    pub follow_strategy: Option<FollowStrategy>,

    /// Logging level or filter directives
    #[arg(long, env = "SMOOTHFPS_LOG", default_value = DEFAULT_LOG_LEVEL)]
    pub log_level: String,

    /// Log output format
    #[arg(long, value_enum, default_value_t = LogFormat::Compact)]
    pub log_format: LogFormat,
}

impl Cli {
    /// Configuration values set on the command line
    pub fn config_overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            follow_strategy: self.follow_strategy,
        }
    }
}
