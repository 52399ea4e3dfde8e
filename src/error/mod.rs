//! Error handling module for SmoothFPS

use thiserror::Error;

use crate::follow::{FollowStrategy, StreamTag};

/// Main error type for SmoothFPS operations
#[derive(Error, Debug)]
pub enum InterpError {
    /// The platform notification facility could not be set up
    #[error("Failed to set up pipe notification: {0}")]
    NotificationSetup(#[source] std::io::Error),

    /// Waiting on the platform notification facility failed
    #[error("Failed to wait for pipe readiness: {0}")]
    NotificationWait(#[source] std::io::Error),

    /// The requested follow strategy is not available on this platform
    #[error("Follow strategy {strategy} is not supported on this platform")]
    UnsupportedStrategy { strategy: FollowStrategy },

    /// The child process was spawned without a piped stream
    #[error("Child process has no piped {stream}")]
    MissingPipe { stream: StreamTag },

    /// An external tool could not be started
    #[error("Failed to start {tool}: {source}")]
    ToolSpawn {
        tool: String,
        #[source]
        source: std::io::Error,
    },

    /// An external tool ran but reported failure
    #[error("{tool} failed: {message}")]
    ToolFailed { tool: String, message: String },

    /// Media probe error
    #[error("Failed to probe media file: {message}")]
    ProbeError { message: String },

    /// No usable H.264 encoder in the ffmpeg build
    #[error("No usable H.264 encoder found (need libx264 or h264_nvenc)")]
    NoEncoder,

    /// Profiles file could not be read or parsed
    #[error("Failed to load profiles from {path}: {message}")]
    ProfileLoad { path: String, message: String },

    /// Requested profile does not exist
    #[error("Unknown encoding profile: {name}")]
    ProfileNotFound { name: String },

    /// Resolved profile is missing a setting or has the wrong shape
    #[error("Invalid encoding profile: {message}")]
    InvalidProfile { message: String },

    /// Configuration error
    #[error("Invalid configuration: {message}")]
    ConfigError { message: String },

    /// I/O error
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    /// YAML error
    #[error("YAML error: {0}")]
    YamlError(#[from] serde_yaml::Error),

    /// TOML error
    #[error("TOML error: {0}")]
    TomlError(#[from] toml::de::Error),
}

impl InterpError {
    /// Short kind tag used in emitted error records
    pub fn record_kind(&self) -> &'static str {
        match self {
            InterpError::ProbeError { .. } => "invalid_file",
            InterpError::NoEncoder => "no_encoder",
            InterpError::ProfileLoad { .. } => "profiles",
            InterpError::ProfileNotFound { .. } | InterpError::InvalidProfile { .. } => {
                "invalid_profile"
            }
            InterpError::ConfigError { .. }
            | InterpError::ToolSpawn { .. }
            | InterpError::ToolFailed { .. }
            | InterpError::TomlError(_)
            | InterpError::UnsupportedStrategy { .. } => "invalid_config",
            _ => "fail",
        }
    }
}

/// Result type alias for SmoothFPS operations
pub type InterpResult<T> = std::result::Result<T, InterpError>;
