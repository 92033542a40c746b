//! Error types for the object storage gateway

use std::time::Duration;
use thiserror::Error;

/// Errors raised while validating, storing or releasing uploads
#[derive(Error, Debug)]
pub enum StorageError {
    /// File type outside of the accepted image formats
    #[error("Only images (jpeg, jpg, png, gif) are allowed! Rejected: {0}")]
    InvalidFileType(String),

    /// File exceeds the configured size limit
    #[error("File {name} is {size} bytes, the limit is {max} bytes")]
    FileTooLarge { name: String, size: u64, max: u64 },

    /// More files than a single request may carry
    #[error("Too many files: {count} uploaded, at most {max} allowed")]
    TooManyFiles { count: usize, max: usize },

    /// The backend refused or failed the upload
    #[error("Upload failed: {0}")]
    Upload(String),

    /// The backend failed to delete an object
    #[error("Delete failed: {0}")]
    Delete(String),

    /// A storage call did not answer in time
    #[error("Storage {operation} timed out after {timeout:?}")]
    Timeout {
        operation: &'static str,
        timeout: Duration,
    },

    /// URL or key that does not point into the store
    #[error("Invalid object reference: {0}")]
    InvalidReference(String),

    /// Missing or inconsistent backend configuration
    #[error("Storage configuration error: {0}")]
    Configuration(String),

    /// Local filesystem error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl StorageError {
    /// Errors caused by the uploaded content rather than the backend.
    pub fn is_rejection(&self) -> bool {
        matches!(
            self,
            StorageError::InvalidFileType(_)
                | StorageError::FileTooLarge { .. }
                | StorageError::TooManyFiles { .. }
        )
    }
}

/// Type alias for Result with StorageError
pub type StorageResult<T> = Result<T, StorageError>;
