//! SmoothFPS interpolate
//!
//! Command-line front-end that interpolates a video to a smooth frame rate
//! with VapourSynth and ffmpeg, reporting progress as JSON lines.
//!
//! # Usage
//!
//! ```bash
//! interpolate input.mkv output.mp4 -p fast
//! interpolate input.mkv output.mp4 -S -G -o '{"v_bitrate": 8000}'
//! interpolate --list-profiles
//! interpolate --version
//! ```

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{debug, info};

use smoothfps_cli::cli::{commands, Cli};
use smoothfps_cli::output::JsonLineWriter;
use smoothfps_cli::utils::init_logging;

/// Main entry point for the interpolate CLI
fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(&cli.log_level, cli.log_format).context("Failed to initialize logging")?;
    info!("Starting SmoothFPS interpolate");

    let mut sink = JsonLineWriter::stdout();
    let code = commands::run(&cli, &mut sink).context("Failed to write output")?;

    debug!(code, "exiting");
    std::process::exit(code)
}
