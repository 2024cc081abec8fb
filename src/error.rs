//! Custom error types and result handling for bindery operations.
//!
//! This module defines the error handling system used throughout bindery.
//! All operations return a [`Result<T>`] which is a type alias for
//! `std::result::Result<T, Error>`.
//!

/// Type alias for Results with bindery errors.
pub type Result<T> = std::result::Result<T, Error>;

/// Comprehensive error type for all bindery operations.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// I/O errors from the standard library
    #[error(transparent)]
    Io(#[from] std::io::Error),
    /// JSON (de)serialization errors from stored document trees
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    /// ZIP container operation errors
    #[error(transparent)]
    Zip(#[from] zip::result::ZipError),
    /// HTTP errors while fetching remote assets
    #[error(transparent)]
    Http(#[from] reqwest::Error),
    /// Async task join errors
    #[error(transparent)]
    Join(#[from] tokio::task::JoinError),
    #[error(transparent)]
    Semaphore(#[from] tokio::sync::AcquireError),
    #[error(transparent)]
    ConfigBuilder(#[from] crate::exporter::ExportConfigBuilderError),
    /// A chapter references a document the current user cannot read.
    /// The whole export is aborted; there is no partial export.
    #[error("Some chapters of this book cannot be accessed: {0}")]
    Access(String),
    /// The book has no chapters; nothing to export.
    #[error("The book '{0}' contains no chapters")]
    EmptyBook(String),
    /// An image, font or template URL failed to download during packaging
    #[error("Failed to fetch asset '{url}': {reason}")]
    AssetFetch { url: String, reason: String },
    /// Error for unsupported operations or formats
    #[error("Unsupported: {0}")]
    Unsupported(String),
    /// Other errors that don't fit into specific categories
    #[error("Other error: {0}")]
    Other(String),
}

// Basic From<String> conversion for convenience
impl From<String> for Error {
    fn from(error: String) -> Self {
        Error::Other(error)
    }
}

impl From<&str> for Error {
    fn from(error: &str) -> Self {
        Error::Other(error.to_string())
    }
}
