//! Whitespace-alignment table detection.
//!
//! Works on pages without ruling lines by looking for consecutive rows
//! whose text splits into multiple cells at the same horizontal gaps.

use std::path::Path;

use log::debug;

use crate::error::{Error, Result};
use crate::layout::{CharBox, PageLayout, Rect};
use crate::model::Table;
use crate::parsers::{
    assemble_text, cluster_positions, group_rows, split_cells, PagePrep, ParserOptions, RowBand,
    TableParser,
};

/// The `stream` flavor.
pub struct Stream {
    options: ParserOptions,
    prep: Option<PagePrep>,
}

impl Stream {
    pub fn new(options: ParserOptions) -> Self {
        Self {
            options,
            prep: None,
        }
    }
}

impl TableParser for Stream {
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
        Ok(detect(&prep.layout, &self.options, prep.page))
    }
}

/// Run whitespace-alignment detection over a page layout.
pub(crate) fn detect(layout: &PageLayout, options: &ParserOptions, page: u32) -> Vec<Table> {
    let chars: Vec<&CharBox> = layout
        .chars
        .iter()
        .filter(|c| c.orientation.is_horizontal())
        .collect();
    let rows = group_rows(&chars, options.row_tolerance);

    let mut tables = Vec::new();
    let mut order = 0u32;
    for group in tabular_groups(&rows, options) {
        if let Some(table) = build_table(group, options, page, order) {
            debug!(
                "page {}: stream table {} with shape {:?}",
                page,
                order,
                table.shape()
            );
            tables.push(table);
            order += 1;
        }
    }
    tables
}

/// Maximal runs of multi-cell rows, at least `min_rows` of them per run.
///
/// A single sparse row between two multi-cell rows is absorbed into the
/// run, so rows with merged or missing cells do not split a table.
fn tabular_groups<'a, 'b>(
    rows: &'b [RowBand<'a>],
    options: &ParserOptions,
) -> Vec<&'b [RowBand<'a>]> {
    let tabular: Vec<bool> = rows
        .iter()
        .map(|r| split_cells(r, options.min_column_gap).len() >= 2)
        .collect();

    let mut groups = Vec::new();
    let mut i = 0;
    while i < rows.len() {
        if !tabular[i] {
            i += 1;
            continue;
        }
        let start = i;
        let mut end = i;
        let mut j = i + 1;
        while j < rows.len() {
            if tabular[j] {
                end = j;
                j += 1;
            } else if j + 1 < rows.len() && tabular[j + 1] {
                j += 1;
            } else {
                break;
            }
        }
        if (start..=end).filter(|&k| tabular[k]).count() >= options.min_rows {
            groups.push(&rows[start..=end]);
        }
        i = j.max(end + 1);
    }
    groups
}

fn build_table(
    group: &[RowBand<'_>],
    options: &ParserOptions,
    page: u32,
    order: u32,
) -> Option<Table> {
    // Column starts are the left edges of cells that repeat across rows.
    let mut starts: Vec<f32> = Vec::new();
    for row in group {
        for cell in split_cells(row, options.min_column_gap) {
            starts.push(cell[0].bbox.x0);
        }
    }
    let columns: Vec<f32> = cluster_positions(&starts, options.column_tolerance)
        .into_iter()
        .filter(|&(_, count)| count >= 2)
        .map(|(pos, _)| pos)
        .collect();
    if columns.len() < options.min_columns {
        return None;
    }

    let region = group
        .iter()
        .flat_map(|row| row.chars.iter())
        .fold(None::<Rect>, |acc, c| {
            Some(match acc {
                Some(r) => r.union(&c.bbox),
                None => c.bbox,
            })
        })?;

    let mut table = Table::new(page, order, region);
    for row in group {
        let mut cells = vec![String::new(); columns.len()];
        for cell in split_cells(row, options.min_column_gap) {
            let idx = column_index(&columns, cell[0].bbox.x0, options.column_tolerance);
            let text = assemble_text(&cell);
            if cells[idx].is_empty() {
                cells[idx] = text;
            } else {
                cells[idx].push(' ');
                cells[idx].push_str(&text);
            }
        }
        table.add_row(cells);
    }
    Some(table)
}

/// Index of the rightmost column whose start is left of `x` (within
/// tolerance), clamped into range.
fn column_index(columns: &[f32], x: f32, tolerance: f32) -> usize {
    let mut idx = 0;
    for (i, &c) in columns.iter().enumerate() {
        if c <= x + tolerance {
            idx = i;
        } else {
            break;
        }
    }
    idx
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::LayoutOptions;
    use crate::parsers::testutil::word;

    fn layout_of(chars: Vec<CharBox>) -> PageLayout {
        PageLayout::from_chars(chars, &LayoutOptions::default())
    }

    fn grid_page() -> PageLayout {
        let mut chars = Vec::new();
        for (i, y) in [700.0, 680.0, 660.0].iter().enumerate() {
            chars.extend(word(&format!("left{i}"), 100.0, *y));
            chars.extend(word(&format!("right{i}"), 300.0, *y));
        }
        layout_of(chars)
    }

    #[test]
    fn test_detects_aligned_grid() {
        let tables = detect(&grid_page(), &ParserOptions::default(), 1);
        assert_eq!(tables.len(), 1);
        assert_eq!(tables[0].shape(), (3, 2));
        assert_eq!(tables[0].rows[0], vec!["left0", "right0"]);
        assert_eq!(tables[0].rows[2], vec!["left2", "right2"]);
    }

    #[test]
    fn test_prose_page_has_no_table() {
        let mut chars = Vec::new();
        for y in [700.0, 680.0, 660.0] {
            chars.extend(word("justoneblockoftext", 100.0, y));
        }
        let tables = detect(&layout_of(chars), &ParserOptions::default(), 1);
        assert!(tables.is_empty());
    }

    #[test]
    fn test_single_tabular_row_rejected() {
        let mut chars = word("a", 100.0, 700.0);
        chars.extend(word("b", 300.0, 700.0));
        chars.extend(word("paragraphtextbelow", 100.0, 680.0));
        let tables = detect(&layout_of(chars), &ParserOptions::default(), 1);
        assert!(tables.is_empty());
    }

    #[test]
    fn test_region_covers_cells() {
        let tables = detect(&grid_page(), &ParserOptions::default(), 1);
        let region = tables[0].region;
        assert!(region.x0 <= 100.0 && region.x1 >= 300.0);
        assert!(region.y1 >= 700.0 && region.y0 <= 660.0);
    }

    #[test]
    fn test_missing_cell_left_empty() {
        let mut chars = Vec::new();
        chars.extend(word("h1", 100.0, 700.0));
        chars.extend(word("h2", 300.0, 700.0));
        // Second row only fills the right column.
        chars.extend(word("v2", 300.0, 680.0));
        chars.extend(word("x1", 100.0, 660.0));
        chars.extend(word("x2", 300.0, 660.0));
        let tables = detect(&layout_of(chars), &ParserOptions::default(), 1);
        assert_eq!(tables.len(), 1);
        assert_eq!(tables[0].rows[1], vec!["", "v2"]);
    }

    #[test]
    fn test_extract_without_prepare_errors() {
        let mut parser = Stream::new(ParserOptions::default());
        assert!(matches!(
            parser.extract_tables(),
            Err(Error::Extraction(_))
        ));
    }
}
