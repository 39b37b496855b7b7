//! Error types for tuning asset and frame file I/O.

use iqflow_core::{CoreError, TuningIssue};

/// Result type alias for file I/O operations.
pub type Result<T> = std::result::Result<T, IoError>;

/// Error type for loading and saving IQFlow files.
#[derive(Debug, thiserror::Error)]
pub enum IoError {
    /// Generic I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON (de)serialization failed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// RON parsing failed
    #[error("RON parse error: {0}")]
    RonDe(#[from] ron::error::SpannedError),

    /// RON serialization failed
    #[error("RON error: {0}")]
    RonSer(#[from] ron::Error),

    /// File extension is neither RON nor JSON
    #[error("Unsupported file format: {0}")]
    UnsupportedFormat(String),

    /// File exceeds the load limit
    #[error("File too large: {size} bytes (limit {limit} bytes)")]
    FileTooLarge {
        /// Actual file size in bytes
        size: u64,
        /// Allowed size in bytes
        limit: u64,
    },

    /// File was written by an incompatible format version
    #[error("Version mismatch: expected {expected}, found {found}")]
    VersionMismatch {
        /// Supported version
        expected: String,
        /// Version stored in the file
        found: String,
    },

    /// Two modules of one asset share a name
    #[error("Duplicate module: {0}")]
    DuplicateModule(String),

    /// Tuning data failed load-time validation
    #[error(
        "Invalid tuning for module '{module}': {} error(s), first: {}",
        .issues.len(),
        first_issue(.issues)
    )]
    InvalidTuning {
        /// Module name
        module: String,
        /// Error-severity issues
        issues: Vec<TuningIssue>,
    },

    /// Module could not be configured
    #[error(transparent)]
    Core(#[from] CoreError),
}

fn first_issue(issues: &[TuningIssue]) -> String {
    issues.first().map(ToString::to_string).unwrap_or_default()
}
