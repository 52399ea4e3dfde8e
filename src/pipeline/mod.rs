//! The vspipe | ffmpeg process pair
//!
//! vspipe renders interpolated frames as Y4M on its stdout, which is wired
//! straight into ffmpeg's stdin. ffmpeg's stdout and stderr stay piped so
//! the caller can follow them.

use std::path::PathBuf;
use std::process::{Child, ExitStatus, Stdio};

use tracing::{debug, warn};

use crate::config::AppConfig;
use crate::engine::reap;
use crate::error::{InterpError, InterpResult};
use crate::follow::ChildHandle;
use crate::probe::Encoder;
use crate::profile::Profile;

pub mod ffmpeg;
pub mod vspipe;

pub use ffmpeg::{build_filter, escape_filter_param, ffmpeg_args};
pub use vspipe::{svp_config, vspipe_args};

/// Everything needed to run one interpolation
#[derive(Debug, Clone, PartialEq)]
pub struct InterpolationJob {
    pub input: PathBuf,
    pub output: PathBuf,
    /// Subtitles to burn in
    pub subtitles: Option<PathBuf>,
    /// Image overlaid bottom left
    pub logo: Option<PathBuf>,
    /// GPU acceleration in SVP
    pub gpu: bool,
    pub encoder: Encoder,
    pub profile: Profile,
}

/// Running frame server and encoder
pub struct Pipeline {
    frame_server: Child,
    /// Encoder, with stdout and stderr still piped
    pub encoder: Child,
}

impl Pipeline {
    /// Start vspipe and ffmpeg connected by a pipe
    pub fn start(config: &AppConfig, job: &InterpolationJob) -> InterpResult<Self> {
        let encoder_args = ffmpeg_args(job)?;

        let mut frame_server =
            vspipe::spawn_vspipe(&config.tools.vspipe, &vspipe_args(job, &config.script))?;
        let frames = match frame_server.stdout.take() {
            Some(frames) => frames,
            None => {
                reap(&mut frame_server);
                return Err(InterpError::ToolFailed {
                    tool: "vspipe".to_string(),
                    message: "no output pipe".to_string(),
                });
            }
        };

        // Our copy of the frame pipe closes once the command is dropped,
        // so the encoder sees end of input when vspipe exits
        let encoder =
            match ffmpeg::spawn_ffmpeg(&config.tools.ffmpeg, &encoder_args, Stdio::from(frames)) {
                Ok(encoder) => encoder,
                Err(e) => {
                    reap(&mut frame_server);
                    return Err(e);
                }
            };

        debug!(
            vspipe = frame_server.id(),
            ffmpeg = encoder.id(),
            "pipeline started"
        );
        Ok(Self {
            frame_server,
            encoder,
        })
    }

    /// Reap the frame server once the encoder is done, stopping it if needed
    pub fn finish(mut self) {
        match self.frame_server.try_exit() {
            Ok(Some(status)) => debug!(%status, "frame server exited"),
            Ok(None) => {
                warn!("frame server still running after encoder exit, stopping it");
                reap(&mut self.frame_server);
            }
            Err(e) => warn!(error = %e, "failed to check frame server status"),
        }
    }

    /// Stop both processes
    pub fn abort(mut self) {
        reap(&mut self.encoder);
        reap(&mut self.frame_server);
    }
}

/// Process exit code; the negated signal number when killed by a signal
pub fn exit_code(status: ExitStatus) -> i32 {
    if let Some(code) = status.code() {
        return code;
    }

    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return -signal;
        }
    }

    1
}

#[cfg(test)]
mod tests {
    use super::*;

    #[cfg(unix)]
    #[test]
    fn test_exit_code() {
        use std::os::unix::process::ExitStatusExt;

        assert_eq!(exit_code(ExitStatus::from_raw(0)), 0);
        assert_eq!(exit_code(ExitStatus::from_raw(3 << 8)), 3);
        assert_eq!(exit_code(ExitStatus::from_raw(15)), -15);
    }
}
