//! Encoder progress engine: line parsing and run orchestration

pub mod monitor;
pub mod progress;

pub use monitor::{
    reap, supervise, supervise_child, MonitorStats, ProgressMonitor, ProgressState, RecentLines,
};
pub use progress::{parse_progress, ProgressSnapshot};
