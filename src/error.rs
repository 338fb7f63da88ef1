//! Error types for the conversion engine.

use std::path::PathBuf;

/// Exit code ffmpeg reports when it was interrupted by the user.
pub const EXIT_INTERRUPTED: i32 = 255;

/// Exit code for a missing external tool or any other setup failure.
pub const EXIT_SETUP_FAILURE: i32 = 1;

/// Exit code for an option value that does not parse, matching clap's.
pub const EXIT_INVALID_OPTION: i32 = 2;

pub type Result<T> = std::result::Result<T, ConvertError>;

#[derive(Debug, thiserror::Error)]
pub enum ConvertError {
    /// A required external tool is not installed or not in PATH.
    #[error("required tool not found: {tool}")]
    ToolNotFound { tool: String },

    /// An external tool ran but reported failure.
    #[error("{tool} failed: {message}")]
    ToolFailed { tool: String, message: String },

    #[error("invalid value '{value}' for {field}")]
    InvalidSetting { field: &'static str, value: String },

    #[error("input file not found: {}", path.display())]
    InputNotFound { path: PathBuf },

    #[error("no video stream in {}", path.display())]
    NoVideoStream { path: PathBuf },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid pattern: {0}")]
    Regex(#[from] regex::Error),
}

impl ConvertError {
    pub fn tool_not_found(tool: impl Into<String>) -> Self {
        Self::ToolNotFound { tool: tool.into() }
    }

    pub fn tool_failed(tool: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ToolFailed {
            tool: tool.into(),
            message: message.into(),
        }
    }

    pub fn invalid(field: &'static str, value: impl Into<String>) -> Self {
        Self::InvalidSetting {
            field,
            value: value.into(),
        }
    }

    /// Map a spawn failure to `ToolNotFound` when the binary is missing.
    pub fn from_spawn(tool: &str, err: std::io::Error) -> Self {
        if err.kind() == std::io::ErrorKind::NotFound {
            Self::tool_not_found(tool)
        } else {
            Self::Io(err)
        }
    }

    /// Process exit code for this error. Engine errors abort before a
    /// transcoder exit code exists.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::InvalidSetting { .. } => EXIT_INVALID_OPTION,
            _ => EXIT_SETUP_FAILURE,
        }
    }
}
