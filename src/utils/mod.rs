//! Common utilities and helpers

pub mod logging;
pub mod time;

pub use logging::{init_logging, LogFormat};
pub use time::TimeParser;
