//! Lattice detection with a network fallback.
//!
//! Ruled tables give the most reliable cell boundaries, so lattice runs
//! first; when the page draws no usable grid, the alignment network takes
//! over. Only one of the two contributes tables for a given page.

use std::path::Path;

use log::debug;

use crate::error::{Error, Result};
use crate::layout::PageLayout;
use crate::model::Table;
use crate::parsers::{lattice, network, PagePrep, ParserOptions, TableParser};

/// The `hybrid` flavor.
pub struct Hybrid {
    options: ParserOptions,
    prep: Option<PagePrep>,
}

impl Hybrid {
    pub fn new(options: ParserOptions) -> Self {
        Self {
            options,
            prep: None,
        }
    }
}

impl TableParser for Hybrid {
    fn prepare_page(
        &mut self,
        page_path: &Path,
        layout: PageLayout,
        dimensions: (f32, f32),
        page_number: u32,
    ) {
        self.prep = Some(PagePrep {
            path: page_path.to_path_buf(),
            layout,
            dimensions,
            page: page_number,
        });
    }

    fn extract_tables(&mut self) -> Result<Vec<Table>> {
        let prep = self
            .prep
            .as_ref()
            .ok_or_else(|| Error::Extraction("no page prepared".to_string()))?;

        let ruled = lattice::detect(&prep.path, &prep.layout, &self.options, prep.page)?;
        if !ruled.is_empty() {
            return Ok(ruled);
        }
        debug!("page {}: no ruled grid, falling back to network", prep.page);
        Ok(network::detect(&prep.layout, &self.options, prep.page))
    }
}
