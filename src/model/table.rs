//! Table types.

use serde::{Deserialize, Serialize};

use crate::layout::Rect;

/// A table extracted from one page.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Table {
    /// 1-based page number the table was found on.
    pub page: u32,
    /// Position of the table on its page, top to bottom, starting at 0.
    pub order: u32,
    /// Region of the page the table covers.
    pub region: Rect,
    /// Cell text, row by row.
    pub rows: Vec<Vec<String>>,
}

impl Table {
    /// Create an empty table at a page position.
    pub fn new(page: u32, order: u32, region: Rect) -> Self {
        Self {
            page,
            order,
            region,
            rows: Vec::new(),
        }
    }

    /// Add a row of cell text.
    pub fn add_row(&mut self, row: Vec<String>) {
        self.rows.push(row);
    }

    /// `(rows, columns)` of the table.
    pub fn shape(&self) -> (usize, usize) {
        (
            self.rows.len(),
            self.rows.first().map(|r| r.len()).unwrap_or(0),
        )
    }

    /// Whether the table has no rows.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Sort key giving the total order across a document: page ascending,
    /// then position on the page.
    pub fn sort_key(&self) -> (u32, u32) {
        (self.page, self.order)
    }
}

/// The ordered collection of all tables found in a document.
///
/// Ordering is deterministic for a given document, page selection, and
/// parser configuration, regardless of whether pages were processed
/// sequentially or in parallel.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TableList {
    tables: Vec<Table>,
}

impl TableList {
    /// Build the final list from per-page results, restoring the total
    /// order that parallel dispatch does not guarantee.
    pub fn from_parts(parts: Vec<Vec<Table>>) -> Self {
        let mut tables: Vec<Table> = parts.into_iter().flatten().collect();
        tables.sort_by_key(Table::sort_key);
        Self { tables }
    }

    /// Number of tables.
    pub fn len(&self) -> usize {
        self.tables.len()
    }

    /// Whether no tables were found.
    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }

    /// Table at `index`, in document order.
    pub fn get(&self, index: usize) -> Option<&Table> {
        self.tables.get(index)
    }

    /// Iterate over the tables in document order.
    pub fn iter(&self) -> std::slice::Iter<'_, Table> {
        self.tables.iter()
    }

    /// The tables as a slice.
    pub fn as_slice(&self) -> &[Table] {
        &self.tables
    }
}

impl std::ops::Index<usize> for TableList {
    type Output = Table;

    fn index(&self, index: usize) -> &Table {
        &self.tables[index]
    }
}

impl IntoIterator for TableList {
    type Item = Table;
    type IntoIter = std::vec::IntoIter<Table>;

    fn into_iter(self) -> Self::IntoIter {
        self.tables.into_iter()
    }
}

impl<'a> IntoIterator for &'a TableList {
    type Item = &'a Table;
    type IntoIter = std::slice::Iter<'a, Table>;

    fn into_iter(self) -> Self::IntoIter {
        self.tables.iter()
    }
}
