//! Table extraction from PDF documents.
//!
//! The pipeline mirrors how a person reads a data table off a page:
//! select pages with an expression like `"1,4-end"`, pull each page out
//! into its own upright one-page file, analyze its text layout, and run
//! one of four table parsers over it. Results from all pages are merged
//! into a [`TableList`] whose order is deterministic regardless of
//! whether pages were processed sequentially or in parallel.
//!
//! # Example
//!
//! ```no_run
//! use pdftab::{read_pdf_with_options, ExtractOptions, Flavor};
//!
//! # fn main() -> pdftab::Result<()> {
//! let options = ExtractOptions::new()
//!     .with_flavor(Flavor::Stream)
//!     .with_pages("all")
//!     .with_parallel(true);
//! let tables = read_pdf_with_options("report.pdf", options)?;
//! for table in &tables {
//!     println!("page {} table {}: {:?}", table.page, table.order, table.shape());
//! }
//! # Ok(())
//! # }
//! ```

pub mod detect;
pub mod error;
pub mod handler;
pub mod layout;
pub mod model;
pub mod pages;
pub mod parsers;
pub mod source;

pub use error::{Error, Result};
pub use handler::{ExtractOptions, PdfHandler};
pub use layout::{LayoutOptions, PageLayout, Rect, Rotation};
pub use model::{Table, TableList};
pub use pages::PageSpec;
pub use parsers::{Flavor, ParserOptions, TableParser};
pub use source::DocumentSource;

/// Extract tables from the first page of a PDF file with default options.
pub fn read_pdf(path: impl Into<std::path::PathBuf>) -> Result<TableList> {
    read_pdf_with_options(path, ExtractOptions::default())
}

/// Extract tables from a PDF file.
pub fn read_pdf_with_options(
    path: impl Into<std::path::PathBuf>,
    options: ExtractOptions,
) -> Result<TableList> {
    PdfHandler::from_path(path, options)?.parse()
}

/// Extract tables from an in-memory PDF.
pub fn read_pdf_bytes(bytes: Vec<u8>, options: ExtractOptions) -> Result<TableList> {
    PdfHandler::new(DocumentSource::from_bytes(bytes)?, options)?.parse()
}
