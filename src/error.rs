//! Error types for hdfscan.
//!
//! This module provides a unified error handling approach using `thiserror`.

use std::collections::BTreeMap;
use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for hdfscan operations.
pub type Result<T> = std::result::Result<T, HdfScanError>;

/// Errors that can occur in hdfscan.
#[derive(Debug, Error)]
pub enum HdfScanError {
    /// Failed to open a file as HDF5.
    #[error("Failed to open file: {path}: {message}")]
    FileOpen {
        /// Path that was requested.
        path: PathBuf,
        /// Reason reported by the HDF5 library.
        message: String,
    },

    /// Failed to read from an HDF5 file.
    #[error("HDF5 error: {0}")]
    Hdf5(String),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// No object at the requested address.
    #[error("Address not found: {address}")]
    NotFound {
        /// Requested address.
        address: String,
    },

    /// The object at the address exists but is not a dataset.
    #[error("Not a dataset: {address}")]
    NotADataset {
        /// Requested address.
        address: String,
    },

    /// The NeXus default-plot chain could not be followed.
    #[error("NeXus default lookup failed: {0}")]
    NexusDefault(String),

    /// Dataset cannot be sliced into the requested image.
    #[error("Cannot read image from {address}: {message}")]
    Image {
        /// Dataset address.
        address: String,
        /// What went wrong.
        message: String,
    },

    /// Expression rejected by the deny-list before evaluation.
    #[error("This operation is not allowed as it contains: \"{pattern}\"")]
    UnsafeExpression {
        /// Rejected expression text.
        expression: String,
        /// Deny-list entry that matched.
        pattern: String,
    },

    /// Expression could not be parsed.
    #[error("Syntax error in '{expression}' at {position}: {message}")]
    Syntax {
        /// Expression text.
        expression: String,
        /// Byte offset of the offending token.
        position: usize,
        /// What went wrong.
        message: String,
    },

    /// Expression parsed but failed while evaluating.
    #[error("Error evaluating '{expression}': {message}")]
    Evaluation {
        /// Expression text.
        expression: String,
        /// What went wrong.
        message: String,
        /// Snapshot of the namespace, name -> short rendering.
        namespace: BTreeMap<String, String>,
    },
}

impl HdfScanError {
    /// Create a FileOpen error.
    pub fn file_open(path: impl Into<PathBuf>, message: impl ToString) -> Self {
        Self::FileOpen {
            path: path.into(),
            message: message.to_string(),
        }
    }

    /// Create a NotFound error.
    pub fn not_found(address: impl Into<String>) -> Self {
        Self::NotFound {
            address: address.into(),
        }
    }

    /// Create a NotADataset error.
    pub fn not_a_dataset(address: impl Into<String>) -> Self {
        Self::NotADataset {
            address: address.into(),
        }
    }

    /// Create an Image error.
    pub fn image(address: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Image {
            address: address.into(),
            message: message.into(),
        }
    }

    /// Create a NexusDefault error.
    pub fn nexus(message: impl Into<String>) -> Self {
        Self::NexusDefault(message.into())
    }

    /// Create a Syntax error.
    pub fn syntax(
        expression: impl Into<String>,
        position: usize,
        message: impl Into<String>,
    ) -> Self {
        Self::Syntax {
            expression: expression.into(),
            position,
            message: message.into(),
        }
    }

    /// Whether the error is a recoverable lookup miss rather than an I/O failure.
    pub fn is_lookup_miss(&self) -> bool {
        matches!(
            self,
            Self::NotFound { .. } | Self::NotADataset { .. } | Self::NexusDefault(_)
        )
    }
}

impl From<hdf5::Error> for HdfScanError {
    fn from(err: hdf5::Error) -> Self {
        Self::Hdf5(err.to_string())
    }
}
