//! Error types shared across the riptools-core library.

use std::path::PathBuf;
use std::process::ExitStatus;
use thiserror::Error;

/// Custom error types for riptools
#[derive(Error, Debug)]
pub enum CoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Required external tool not found: {0}")]
    DependencyNotFound(String),

    #[error("Failed to start {0}: {1}")]
    CommandStart(String, #[source] std::io::Error),

    #[error("{tool} failed ({status}): {stderr}")]
    CommandFailed {
        tool: String,
        status: ExitStatus,
        stderr: String,
    },

    #[error("JSON parse error: {0}")]
    JsonParse(String),

    #[error("Media analysis error: {0}")]
    MediaParse(String),

    #[error("Invalid track selection: {0}")]
    InvalidSelection(String),

    #[error("Crop detection error: {0}")]
    CropDetection(String),

    #[error("Output file exists: {0}")]
    OutputExists(PathBuf),

    #[error("{0}")]
    OperationFailed(String),
}

/// Result type for riptools operations
pub type CoreResult<T> = std::result::Result<T, CoreError>;

/// Creates a `CommandStart` error for a tool that could not be spawned.
pub fn command_start_error(tool: impl Into<String>, err: std::io::Error) -> CoreError {
    CoreError::CommandStart(tool.into(), err)
}

/// Creates a `CommandFailed` error carrying the delegate tool's exit status.
pub fn command_failed_error(
    tool: impl Into<String>,
    status: ExitStatus,
    stderr: impl Into<String>,
) -> CoreError {
    CoreError::CommandFailed {
        tool: tool.into(),
        status,
        stderr: stderr.into(),
    }
}

impl CoreError {
    /// Exit code to propagate for this error. External tool failures carry
    /// the delegate's own exit code; everything else maps to 1.
    #[must_use]
    pub fn exit_code(&self) -> i32 {
        match self {
            CoreError::CommandFailed { status, .. } => status.code().unwrap_or(1),
            _ => 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::os::unix::process::ExitStatusExt;

    #[test]
    fn command_failures_propagate_the_delegate_exit_code() {
        let status = ExitStatus::from_raw(3 << 8);
        assert_eq!(status.code(), Some(3));
        let err = command_failed_error("HandBrakeCLI", status, "encode failed");
        assert_eq!(err.exit_code(), 3);
    }

    #[test]
    fn signal_deaths_and_internal_errors_exit_with_one() {
        // Killed by SIGKILL; no exit code to propagate
        let killed = command_failed_error("mkvmerge", ExitStatus::from_raw(9), "");
        assert_eq!(killed.exit_code(), 1);

        assert_eq!(
            CoreError::DependencyNotFound("ffprobe".to_string()).exit_code(),
            1
        );
        assert_eq!(
            CoreError::InvalidSelection("audio track 9".to_string()).exit_code(),
            1
        );
        assert_eq!(
            CoreError::OutputExists(PathBuf::from("movie.mkv")).exit_code(),
            1
        );
        assert_eq!(
            CoreError::OperationFailed("postprocessing failed".to_string()).exit_code(),
            1
        );
    }
}
