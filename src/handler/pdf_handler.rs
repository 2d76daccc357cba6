//! Extraction orchestration.
//!
//! `PdfHandler` owns a run over one document: it resolves the page
//! selection, materializes each selected page as an upright one-page file
//! in a scoped working directory, runs the configured parser over every
//! page either sequentially or on a rayon pool, and aggregates the
//! per-page results into a deterministically ordered [`TableList`].

use std::path::Path;
use std::thread;

use log::{debug, info};
use rayon::prelude::*;

use crate::error::{Error, Result};
use crate::handler::page::save_page;
use crate::handler::ExtractOptions;
use crate::layout::analyze_page;
use crate::model::{Table, TableList};
use crate::pages::PageSpec;
use crate::source::DocumentSource;

/// Orchestrates table extraction across the selected pages of a document.
pub struct PdfHandler {
    source: DocumentSource,
    options: ExtractOptions,
    pages: Vec<u32>,
}

impl PdfHandler {
    /// Create a handler for `source`.
    ///
    /// The page expression is parsed eagerly; the document itself is only
    /// opened here when the expression needs the page count (`all`,
    /// `a-end`). Whether every selected page exists is checked later,
    /// when the page is extracted.
    pub fn new(source: DocumentSource, options: ExtractOptions) -> Result<Self> {
        let spec = PageSpec::parse(&options.pages)?;
        let pages = if spec.needs_page_count() {
            let doc = source.load()?;
            spec.resolve(doc.get_pages().len() as u32)
        } else {
            spec.resolve(0)
        };
        debug!("resolved page selection {:?} -> {:?}", options.pages, pages);
        Ok(Self {
            source,
            options,
            pages,
        })
    }

    /// Create a handler for a file on disk.
    pub fn from_path(path: impl Into<std::path::PathBuf>, options: ExtractOptions) -> Result<Self> {
        Self::new(DocumentSource::from_path(path)?, options)
    }

    /// The resolved, sorted page numbers this run will process.
    pub fn pages(&self) -> &[u32] {
        &self.pages
    }

    /// Number of pages in the document.
    pub fn page_count(&self) -> Result<u32> {
        let doc = self.source.load()?;
        Ok(doc.get_pages().len() as u32)
    }

    /// Whether the document is encrypted.
    pub fn is_encrypted(&self) -> Result<bool> {
        let doc = self.source.load()?;
        Ok(doc.is_encrypted())
    }

    /// Run extraction over all selected pages.
    ///
    /// Pages are processed in a temporary working directory that is
    /// removed when the run ends, whether it succeeds or fails. The first
    /// page error aborts the run and is returned as is.
    pub fn parse(&self) -> Result<TableList> {
        let mut builder = tempfile::Builder::new();
        builder.prefix("pdftab-");
        let workdir = match &self.options.workdir_root {
            Some(root) => builder.tempdir_in(root),
            None => builder.tempdir(),
        }
        .map_err(|e| Error::Resource(format!("working directory: {e}")))?;

        let parts = if self.use_parallel() {
            self.parse_parallel(workdir.path())
        } else {
            self.parse_sequential(workdir.path())
        };
        // On failure the TempDir drop cleans up best-effort without
        // masking the page error.
        let parts = parts?;

        let list = TableList::from_parts(parts);
        info!(
            "extracted {} tables from {} pages",
            list.len(),
            self.pages.len()
        );
        workdir
            .close()
            .map_err(|e| Error::Resource(format!("working directory: {e}")))?;
        Ok(list)
    }

    /// Parallel dispatch runs only when asked for and worthwhile: more
    /// than one page selected and more than one execution unit available.
    fn use_parallel(&self) -> bool {
        self.options.parallel && self.pages.len() > 1 && available_units() > 1
    }

    fn parse_sequential(&self, dir: &Path) -> Result<Vec<Vec<Table>>> {
        self.pages.iter().map(|&p| self.parse_page(p, dir)).collect()
    }

    fn parse_parallel(&self, dir: &Path) -> Result<Vec<Vec<Table>>> {
        let units = available_units().min(self.pages.len());
        debug!("parallel dispatch over {} workers", units);
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(units)
            .build()
            .map_err(|e| Error::Resource(format!("thread pool: {e}")))?;
        pool.install(|| {
            self.pages
                .par_iter()
                .map(|&p| self.parse_page(p, dir))
                .collect()
        })
    }

    /// Extract and parse one page. Each invocation works on its own
    /// files and its own parser instance, so pages share nothing.
    fn parse_page(&self, page: u32, dir: &Path) -> Result<Vec<Table>> {
        let path = save_page(
            &self.source,
            self.options.password.as_deref(),
            page,
            dir,
            &self.options.layout,
        )?;
        let doc = lopdf::Document::load(&path)?;
        let (layout, dimensions) = analyze_page(&doc, 1, &self.options.layout)?;

        let mut parser = self.options.flavor.build(&self.options.parser);
        parser.prepare_page(&path, layout, dimensions, page);
        let tables = parser.extract_tables()?;
        debug!("page {}: {} tables", page, tables.len());
        Ok(tables)
    }
}

fn available_units() -> usize {
    thread::available_parallelism().map(|n| n.get()).unwrap_or(1)
}
