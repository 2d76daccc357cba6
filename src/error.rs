//! Error types for the pdftab library.

use std::io;
use thiserror::Error;

/// Result type alias for pdftab operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error types that can occur during table extraction.
#[derive(Error, Debug)]
pub enum Error {
    /// I/O error when reading or writing files.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// No usable document source was supplied.
    #[error("Invalid arguments: {0}")]
    InvalidArguments(String),

    /// The input is not a recognized PDF document.
    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    /// The page-selection expression could not be parsed.
    #[error("Invalid page specification: {0}")]
    InvalidPageSpec(String),

    /// Page number is beyond the end of the document.
    #[error("Page {0} not found (document has {1} pages)")]
    PageNotFound(u32, u32),

    /// The document is encrypted and the password is wrong or missing.
    #[error("Decryption failed: {0}")]
    Decryption(String),

    /// A table parser failed while processing a page.
    #[error("Extraction failed: {0}")]
    Extraction(String),

    /// Temporary workspace creation or cleanup failed.
    #[error("Resource error: {0}")]
    Resource(String),

    /// Error parsing PDF structure.
    #[error("PDF parsing error: {0}")]
    Pdf(String),
}

impl From<lopdf::Error> for Error {
    fn from(err: lopdf::Error) -> Self {
        match err {
            lopdf::Error::IO(e) => Error::Io(e),
            lopdf::Error::Decryption(_) => Error::Decryption(err.to_string()),
            _ => Error::Pdf(err.to_string()),
        }
    }
}
