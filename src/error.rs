//! Error handling for capture loading and replay
//!
//! This module defines the crate-wide error type and a Result alias.
//!
//! The error enum only covers conditions that abort an operation outright.
//! Per-frame conditions that ingestion is expected to survive (non-game
//! traffic, runt frames, blobs that never complete) are modeled as tagged
//! outcomes in the ingestion loop, not as errors, and replay-time seek
//! failures are plain boolean returns.

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for capture loading and replay operations
#[derive(Error, Debug)]
pub enum ReplayError {
    /// IO errors while reading capture or template files
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A frame header declared an impossible size
    #[error("corrupt capture at frame {frame}: {reason}")]
    CorruptCapture { frame: usize, reason: String },

    /// The capture ended in the middle of a required header
    #[error("truncated capture at frame {frame}: {remaining} bytes remaining")]
    TruncatedStream { frame: usize, remaining: usize },

    /// The canonical login template file is absent (zero-login path only)
    #[error("login template not found at {}", path.display())]
    MissingTemplate { path: PathBuf },

    /// The canonical login template decoded, but not to the expected shape
    #[error("login template malformed: {0}")]
    MalformedTemplate(String),

    /// Errors related to configuration loading/saving
    #[error("configuration error: {0}")]
    Config(String),
}

/// Result type alias for capture loading and replay operations
pub type Result<T> = std::result::Result<T, ReplayError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = ReplayError::CorruptCapture {
            frame: 12,
            reason: "declared length 60000 exceeds bound".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "corrupt capture at frame 12: declared length 60000 exceeds bound"
        );
    }

    #[test]
    fn test_missing_template_display() {
        let err = ReplayError::MissingTemplate {
            path: PathBuf::from("basic-login.pcap"),
        };
        assert!(err.to_string().contains("basic-login.pcap"));
    }
}
