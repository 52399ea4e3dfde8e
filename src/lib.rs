//! SmoothFPS CLI Library
//!
//! Drives a `vspipe | ffmpeg` frame interpolation pipeline and turns the
//! encoder's live output into single-line JSON progress records.
//!
//! The heart of the crate is [`follow::ProcessFollower`], which reads a
//! child's stdout and stderr concurrently and yields CR/LF tolerant lines
//! tagged with their stream, and [`engine`], which parses ffmpeg progress
//! lines out of that sequence.

pub mod cli;
pub mod config;
pub mod engine;
pub mod error;
pub mod follow;
pub mod output;
pub mod pipeline;
pub mod probe;
pub mod profile;
pub mod utils;

// Re-export commonly used types
pub use engine::{parse_progress, ProgressMonitor, ProgressSnapshot};
pub use error::{InterpError, InterpResult};
pub use follow::{FollowOptions, FollowStrategy, ProcessFollower, StreamTag, TaggedLine};
pub use output::{JsonLineWriter, Record, RecordSink};
