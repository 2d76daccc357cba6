//! Extraction orchestration: options, page materialization, dispatch.

mod options;
mod page;
mod pdf_handler;

pub use options::ExtractOptions;
pub use pdf_handler::PdfHandler;
