//! PDF format detection and validation.

use crate::error::{Error, Result};
use std::path::Path;

/// PDF magic bytes: %PDF-
const PDF_MAGIC: &[u8] = b"%PDF-";

/// Check that a path carries a recognized PDF file extension.
///
/// Only the extension is inspected; the file does not need to exist.
/// Sources without a `.pdf` extension are rejected up front, before any
/// page processing starts.
pub fn ensure_pdf_extension(path: &Path) -> Result<()> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());

    match ext.as_deref() {
        Some("pdf") => Ok(()),
        _ => Err(Error::UnsupportedFormat(format!(
            "{} does not have a .pdf extension",
            path.display()
        ))),
    }
}

/// Check if bytes start with a valid PDF header.
pub fn is_pdf_bytes(data: &[u8]) -> bool {
    data.starts_with(PDF_MAGIC)
}

/// Validate that an in-memory buffer looks like a PDF document.
pub fn ensure_pdf_bytes(data: &[u8]) -> Result<()> {
    if is_pdf_bytes(data) {
        Ok(())
    } else {
        Err(Error::UnsupportedFormat(
            "buffer does not start with a PDF header".to_string(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_pdf_extension_accepted() {
        assert!(ensure_pdf_extension(&PathBuf::from("document.pdf")).is_ok());
        assert!(ensure_pdf_extension(&PathBuf::from("DOCUMENT.PDF")).is_ok());
        assert!(ensure_pdf_extension(&PathBuf::from("/tmp/a/b/c.pdf")).is_ok());
    }

    #[test]
    fn test_non_pdf_extension_rejected() {
        let result = ensure_pdf_extension(&PathBuf::from("document.docx"));
        assert!(matches!(result, Err(Error::UnsupportedFormat(_))));

        let result = ensure_pdf_extension(&PathBuf::from("no_extension"));
        assert!(matches!(result, Err(Error::UnsupportedFormat(_))));
    }

    #[test]
    fn test_is_pdf_bytes() {
        assert!(is_pdf_bytes(b"%PDF-1.7\n%\xe2\xe3\xcf\xd3"));
        assert!(!is_pdf_bytes(b"Not a PDF file"));
        assert!(!is_pdf_bytes(b""));
    }

    #[test]
    fn test_ensure_pdf_bytes() {
        assert!(ensure_pdf_bytes(b"%PDF-1.4\ntest").is_ok());
        assert!(matches!(
            ensure_pdf_bytes(b"<!DOCTYPE html>"),
            Err(Error::UnsupportedFormat(_))
        ));
    }
}
