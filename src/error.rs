//! # Error Types
//!
//! Custom error types for input-event using `thiserror`.

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for input-event
#[derive(Debug, Error)]
pub enum InputEventError {
    /// Device node could not be opened (missing, permission denied, fd table full)
    #[error("Failed to open {}: {source}", path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Read from an open device failed (device removed, I/O error)
    #[error("Failed to read from {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// EV_KEY sample whose value is not a release, press or autorepeat
    #[error("Invalid key event value: {value} (expected 0, 1 or 2)")]
    InvalidKeyValue { value: i32 },

    /// Buffer handed to the decoder is not exactly one sample
    #[error("Invalid sample size: expected {expected} bytes, got {actual}")]
    SampleSize { expected: usize, actual: usize },

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] toml::de::Error),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for input-event
pub type Result<T> = std::result::Result<T, InputEventError>;
