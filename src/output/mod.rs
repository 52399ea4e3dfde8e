//! Single-line JSON records written to stdout
//!
//! Every record is one compact JSON object per line. Progress records carry
//! the probed media facts plus the latest decoded progress fields; failure
//! and error records carry a short kind in `e`.

use serde::Serialize;

use crate::engine::monitor::ProgressState;
use crate::error::InterpError;
use crate::probe::VersionInfo;

pub mod writer;

pub use writer::{JsonLineWriter, RecordSink};

/// Record kind for a failed encoder run
pub const FAIL_KIND: &str = "fail";

/// Caller-facing record
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Record {
    /// Progress update: media facts merged with the latest snapshot
    Progress(ProgressState),
    /// Encoder exited unsuccessfully
    Failure {
        #[serde(rename = "e")]
        kind: &'static str,
        #[serde(rename = "c")]
        code: i32,
        #[serde(rename = "m")]
        lines: Vec<String>,
    },
    /// Run aborted before or around the encoder
    Error {
        #[serde(rename = "e")]
        kind: &'static str,
    },
    /// Tool and platform versions
    Version(VersionInfo),
    /// Available profile names
    Profiles {
        #[serde(rename = "p")]
        names: Vec<String>,
    },
}

impl Record {
    /// Failure record with the exit code and the last output lines
    pub fn failure(code: i32, lines: Vec<String>) -> Self {
        Record::Failure {
            kind: FAIL_KIND,
            code,
            lines,
        }
    }

    /// Error record for a library error
    pub fn error(err: &InterpError) -> Self {
        Record::Error {
            kind: err.record_kind(),
        }
    }
}
