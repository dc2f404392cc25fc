//! Error types for lrl-toolbox.
//!
//! This module defines all error types used throughout the crate, covering the
//! preprocessing transformers, the on-disk file tree, and configuration loading.

use std::path::PathBuf;
use thiserror::Error;

/// The main error type for lrl-toolbox operations.
#[derive(Error, Debug)]
pub enum Error {
    // === File Tree Errors ===
    /// The root directory cannot host a file tree.
    #[error("invalid root directory {path}: {reason}")]
    InvalidRootDir {
        /// The offending root directory.
        path: PathBuf,
        /// Why the directory was rejected.
        reason: String,
    },

    /// The requested operation is not allowed on this tree.
    #[error("invalid tree operation: {0}")]
    InvalidTreeOperation(String),

    /// An entry index fell outside the tree.
    #[error("index {index} out of bounds for tree with {len} entries")]
    IndexOutOfBounds {
        /// The requested index, as given by the caller.
        index: i64,
        /// Number of entries in the tree.
        len: u64,
    },

    /// A data file has an extension no parser handles.
    #[error("unsupported data format: {0}")]
    UnsupportedFormat(String),

    /// Data could not be represented in the target format.
    #[error("cannot encode data as {format}: {message}")]
    Encode {
        /// Target format name.
        format: &'static str,
        /// Description of the mismatch.
        message: String,
    },

    /// Failed to acquire the interprocess lock.
    #[error("failed to lock {path}: {source}")]
    Lock {
        /// Path to the lock file.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: std::io::Error,
    },

    // === Preprocessing Errors ===
    /// A transformer was used before `fit`.
    #[error("{0} is not fitted yet; call fit before transform")]
    NotFitted(&'static str),

    /// Input shape does not match what the transformer expects.
    #[error("unexpected input shape: got {got}, expected {expected} ({context})")]
    ShapeMismatch {
        /// Number of columns (or values) received.
        got: usize,
        /// Number of columns (or values) expected.
        expected: usize,
        /// Where the expectation comes from.
        context: &'static str,
    },

    /// A NaN was found while the NaN policy is `raise`.
    #[error("NaN encountered in column {column}")]
    NanEncountered {
        /// Zero-based column index.
        column: usize,
    },

    /// A transformer parameter is out of range.
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    /// Rows of a matrix have inconsistent widths.
    #[error("ragged matrix: row {row} has {got} values, expected {expected}")]
    RaggedMatrix {
        /// Zero-based row index.
        row: usize,
        /// Width of the offending row.
        got: usize,
        /// Width of the first row.
        expected: usize,
    },

    // === Configuration Errors ===
    /// Failed to load configuration.
    #[error("failed to load configuration: {0}")]
    ConfigLoad(Box<figment::Error>),

    /// Configuration validation failed.
    #[error("invalid configuration: {message}")]
    ConfigValidation {
        /// Description of the validation failure.
        message: String,
    },

    // === I/O Errors ===
    /// File system operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Failed to create a required directory.
    #[error("failed to create directory {path}: {source}")]
    DirectoryCreate {
        /// Path that couldn't be created.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: std::io::Error,
    },

    /// Failed to read or write a specific file.
    #[error("failed to access {path}: {source}")]
    FileAccess {
        /// The file involved.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: std::io::Error,
    },

    // === Serialization Errors ===
    /// JSON serialization/deserialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML serialization/deserialization failed.
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// CSV reading or writing failed.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// `MessagePack` encoding failed.
    #[error("MessagePack encode error: {0}")]
    MsgpackEncode(#[from] rmp_serde::encode::Error),

    /// `MessagePack` decoding failed.
    #[error("MessagePack decode error: {0}")]
    MsgpackDecode(#[from] rmp_serde::decode::Error),

    // === Generic Errors ===
    /// An internal error occurred (bug).
    #[error("internal error: {0}")]
    Internal(String),
}

/// A specialized Result type for lrl-toolbox operations.
pub type Result<T> = std::result::Result<T, Error>;

impl From<figment::Error> for Error {
    fn from(err: figment::Error) -> Self {
        Self::ConfigLoad(Box::new(err))
    }
}

impl Error {
    /// Create an invalid root directory error.
    #[must_use]
    pub fn invalid_root(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::InvalidRootDir {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Create an invalid tree operation error.
    #[must_use]
    pub fn invalid_operation(message: impl Into<String>) -> Self {
        Self::InvalidTreeOperation(message.into())
    }

    /// Create an invalid parameter error.
    #[must_use]
    pub fn invalid_parameter(message: impl Into<String>) -> Self {
        Self::InvalidParameter(message.into())
    }

    /// Create a new internal error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Wrap an I/O error with the path it happened on.
    #[must_use]
    pub fn file_access(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::FileAccess {
            path: path.into(),
            source,
        }
    }

    /// Check if this error is an out-of-bounds index.
    #[must_use]
    pub fn is_out_of_bounds(&self) -> bool {
        matches!(self, Self::IndexOutOfBounds { .. })
    }

    /// Check if this error comes from a readonly or otherwise forbidden tree operation.
    #[must_use]
    pub fn is_invalid_operation(&self) -> bool {
        matches!(self, Self::InvalidTreeOperation(_))
    }

    /// Check if this error rejects a tree root.
    #[must_use]
    pub fn is_invalid_root(&self) -> bool {
        matches!(self, Self::InvalidRootDir { .. })
    }
}
