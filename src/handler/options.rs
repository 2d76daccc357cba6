//! Extraction options.

use std::path::PathBuf;

use crate::layout::LayoutOptions;
use crate::parsers::{Flavor, ParserOptions};

/// Options controlling a whole extraction run.
#[derive(Debug, Clone)]
pub struct ExtractOptions {
    /// Which table parser to run.
    pub flavor: Flavor,
    /// Page-selection expression, `"1"` by default.
    pub pages: String,
    /// Password for encrypted documents.
    pub password: Option<String>,
    /// Process pages on a thread pool instead of sequentially.
    pub parallel: bool,
    /// Layout-analysis tuning.
    pub layout: LayoutOptions,
    /// Parser tuning shared by all flavors.
    pub parser: ParserOptions,
    /// Where to create the scoped working directory.
    ///
    /// Defaults to the system temporary directory.
    pub workdir_root: Option<PathBuf>,
}

impl Default for ExtractOptions {
    fn default() -> Self {
        Self {
            flavor: Flavor::default(),
            pages: "1".to_string(),
            password: None,
            parallel: false,
            layout: LayoutOptions::default(),
            parser: ParserOptions::default(),
            workdir_root: None,
        }
    }
}

impl ExtractOptions {
    /// Create options with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the parser flavor.
    pub fn with_flavor(mut self, flavor: Flavor) -> Self {
        self.flavor = flavor;
        self
    }

    /// Set the page-selection expression.
    pub fn with_pages(mut self, pages: impl Into<String>) -> Self {
        self.pages = pages.into();
        self
    }

    /// Set the document password.
    pub fn with_password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(password.into());
        self
    }

    /// Enable or disable parallel page processing.
    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    /// Set the layout-analysis options.
    pub fn with_layout(mut self, layout: LayoutOptions) -> Self {
        self.layout = layout;
        self
    }

    /// Set the parser options.
    pub fn with_parser(mut self, parser: ParserOptions) -> Self {
        self.parser = parser;
        self
    }

    /// Create the scoped working directory under `root` instead of the
    /// system temporary directory.
    pub fn with_workdir_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.workdir_root = Some(root.into());
        self
    }
}
