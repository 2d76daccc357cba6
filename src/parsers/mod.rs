//! Table parsers.
//!
//! A parser consumes one prepared page (its file, layout, and dimensions)
//! and produces the tables found on it. Four flavors are available,
//! selected by name: `lattice` (ruling lines), `stream` (whitespace
//! alignment), `network` (text-edge alignment voting), and `hybrid`
//! (lattice with a network fallback).

mod hybrid;
mod lattice;
mod network;
mod stream;

use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::error::{Error, Result};
use crate::layout::{CharBox, PageLayout};
use crate::model::Table;

pub use hybrid::Hybrid;
pub use lattice::Lattice;
pub use network::Network;
pub use stream::Stream;

/// The named table-detection strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Flavor {
    /// Ruling-line based detection.
    #[default]
    Lattice,
    /// Whitespace-alignment based detection.
    Stream,
    /// Text-edge alignment network.
    Network,
    /// Lattice with a network fallback for unruled pages.
    Hybrid,
}

impl Flavor {
    /// Instantiate the parser for this flavor.
    pub fn build(&self, options: &ParserOptions) -> Box<dyn TableParser> {
        match self {
            Flavor::Lattice => Box::new(Lattice::new(options.clone())),
            Flavor::Stream => Box::new(Stream::new(options.clone())),
            Flavor::Network => Box::new(Network::new(options.clone())),
            Flavor::Hybrid => Box::new(Hybrid::new(options.clone())),
        }
    }

    /// The flavor's registry name.
    pub fn name(&self) -> &'static str {
        match self {
            Flavor::Lattice => "lattice",
            Flavor::Stream => "stream",
            Flavor::Network => "network",
            Flavor::Hybrid => "hybrid",
        }
    }
}

impl std::fmt::Display for Flavor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Flavor {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "lattice" => Ok(Flavor::Lattice),
            "stream" => Ok(Flavor::Stream),
            "network" => Ok(Flavor::Network),
            "hybrid" => Ok(Flavor::Hybrid),
            other => Err(Error::InvalidArguments(format!(
                "unknown flavor {other:?}: expected lattice, stream, network, or hybrid"
            ))),
        }
    }
}

/// Tuning knobs shared by the parser flavors.
#[derive(Debug, Clone)]
pub struct ParserOptions {
    /// Baseline tolerance when grouping characters into rows, in points.
    pub row_tolerance: f32,
    /// Tolerance when matching aligned column starts across rows.
    pub column_tolerance: f32,
    /// Minimum rows for a region to count as a table.
    pub min_rows: usize,
    /// Minimum columns for a region to count as a table.
    pub min_columns: usize,
    /// Minimum horizontal gap separating two columns, in points.
    pub min_column_gap: f32,
    /// Snap tolerance for ruling-line coordinates (lattice).
    pub line_tolerance: f32,
    /// Shortest stroke treated as a ruling line (lattice).
    pub min_line_length: f32,
    /// Tolerance when voting on word-edge alignments (network).
    pub edge_tolerance: f32,
}

impl Default for ParserOptions {
    fn default() -> Self {
        Self {
            row_tolerance: 2.0,
            column_tolerance: 3.0,
            min_rows: 2,
            min_columns: 2,
            min_column_gap: 15.0,
            line_tolerance: 2.0,
            min_line_length: 5.0,
            edge_tolerance: 2.0,
        }
    }
}

impl ParserOptions {
    /// Create options with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the row-grouping tolerance.
    pub fn with_row_tolerance(mut self, tolerance: f32) -> Self {
        self.row_tolerance = tolerance;
        self
    }

    /// Set the column-alignment tolerance.
    pub fn with_column_tolerance(mut self, tolerance: f32) -> Self {
        self.column_tolerance = tolerance;
        self
    }

    /// Set the minimum table shape.
    pub fn with_min_shape(mut self, rows: usize, columns: usize) -> Self {
        self.min_rows = rows;
        self.min_columns = columns;
        self
    }

    /// Set the minimum inter-column gap.
    pub fn with_min_column_gap(mut self, gap: f32) -> Self {
        self.min_column_gap = gap;
        self
    }
}

/// A prepared page handed to a parser.
#[derive(Debug, Clone)]
pub(crate) struct PagePrep {
    pub path: PathBuf,
    pub layout: PageLayout,
    #[allow(dead_code)]
    pub dimensions: (f32, f32),
    pub page: u32,
}

/// A per-page table detector.
///
/// `prepare_page` stores the page state; `extract_tables` runs detection
/// and returns the page's tables in top-to-bottom order.
pub trait TableParser: Send {
    /// Stage a page for extraction.
    fn prepare_page(
        &mut self,
        page_path: &Path,
        layout: PageLayout,
        dimensions: (f32, f32),
        page_number: u32,
    );

    /// Extract the tables from the prepared page.
    fn extract_tables(&mut self) -> Result<Vec<Table>>;
}

/// A baseline-grouped row of characters, top of page first.
#[derive(Debug, Clone)]
pub(crate) struct RowBand<'a> {
    pub y: f32,
    pub chars: Vec<&'a CharBox>,
}

/// Group horizontally flowing characters into rows by baseline.
pub(crate) fn group_rows<'a>(chars: &[&'a CharBox], tolerance: f32) -> Vec<RowBand<'a>> {
    if chars.is_empty() {
        return vec![];
    }

    let mut sorted: Vec<&CharBox> = chars.to_vec();
    sorted.sort_by(|a, b| {
        b.bbox
            .y0
            .partial_cmp(&a.bbox.y0)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(
                a.bbox
                    .x0
                    .partial_cmp(&b.bbox.x0)
                    .unwrap_or(std::cmp::Ordering::Equal),
            )
    });

    let mut rows: Vec<RowBand<'a>> = Vec::new();
    let mut current: Vec<&CharBox> = vec![sorted[0]];
    let mut anchor = sorted[0].bbox.y0;

    for &c in &sorted[1..] {
        if (c.bbox.y0 - anchor).abs() <= tolerance {
            current.push(c);
        } else {
            rows.push(finish_row(std::mem::take(&mut current)));
            anchor = c.bbox.y0;
            current.push(c);
        }
    }
    rows.push(finish_row(current));
    rows
}

fn finish_row(mut chars: Vec<&CharBox>) -> RowBand<'_> {
    chars.sort_by(|a, b| {
        a.bbox
            .x0
            .partial_cmp(&b.bbox.x0)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    let y = chars.iter().map(|c| c.bbox.y0).sum::<f32>() / chars.len() as f32;
    RowBand { y, chars }
}

/// Split a row's characters into cells wherever the horizontal gap
/// exceeds `gap`.
pub(crate) fn split_cells<'a>(row: &RowBand<'a>, gap: f32) -> Vec<Vec<&'a CharBox>> {
    let mut cells: Vec<Vec<&CharBox>> = Vec::new();
    let mut prev_x1 = f32::NEG_INFINITY;
    for &c in &row.chars {
        if cells.is_empty() || c.bbox.x0 - prev_x1 > gap {
            cells.push(Vec::new());
        }
        if let Some(cell) = cells.last_mut() {
            cell.push(c);
        }
        prev_x1 = c.bbox.x1;
    }
    cells
}

/// Assemble cell text from characters already sorted by x, re-inserting
/// spaces at visible gaps.
pub(crate) fn assemble_text(chars: &[&CharBox]) -> String {
    let mut text = String::new();
    for (i, c) in chars.iter().enumerate() {
        if i > 0 {
            let prev = chars[i - 1];
            let gap = c.bbox.x0 - prev.bbox.x1;
            if gap > 0.3 * c.font_size.max(1.0) {
                text.push(' ');
            }
        }
        text.push(c.text);
    }
    text
}

/// Cluster scalar positions within `tolerance`, returning each cluster's
/// mean and population, sorted ascending by position.
pub(crate) fn cluster_positions(values: &[f32], tolerance: f32) -> Vec<(f32, usize)> {
    if values.is_empty() {
        return vec![];
    }

    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));

    let mut clusters = Vec::new();
    let mut sum = sorted[0];
    let mut count = 1usize;
    let mut anchor = sorted[0];

    for &v in &sorted[1..] {
        if (v - anchor).abs() <= tolerance {
            sum += v;
            count += 1;
        } else {
            clusters.push((sum / count as f32, count));
            sum = v;
            count = 1;
        }
        anchor = v;
    }
    clusters.push((sum / count as f32, count));
    clusters
}

#[cfg(test)]
pub(crate) mod testutil {
    use crate::layout::{CharBox, Orientation, Rect};

    /// Lay out a word's characters starting at `(x, y)` with a 6pt
    /// advance, mimicking 12pt text.
    pub fn word(text: &str, x: f32, y: f32) -> Vec<CharBox> {
        text.chars()
            .enumerate()
            .map(|(i, ch)| CharBox {
                text: ch,
                bbox: Rect::new(
                    x + i as f32 * 6.0,
                    y - 2.4,
                    x + (i + 1) as f32 * 6.0,
                    y + 9.6,
                ),
                orientation: Orientation::Horizontal,
                font_size: 12.0,
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::testutil::word;
    use super::*;

    #[test]
    fn test_flavor_from_str() {
        assert_eq!(Flavor::from_str("lattice").unwrap(), Flavor::Lattice);
        assert_eq!(Flavor::from_str("stream").unwrap(), Flavor::Stream);
        assert_eq!(Flavor::from_str("network").unwrap(), Flavor::Network);
        assert_eq!(Flavor::from_str("hybrid").unwrap(), Flavor::Hybrid);
        assert!(matches!(
            Flavor::from_str("magic"),
            Err(Error::InvalidArguments(_))
        ));
    }

    #[test]
    fn test_group_rows_orders_top_down() {
        let mut chars = word("low", 100.0, 100.0);
        chars.extend(word("high", 100.0, 700.0));
        let refs: Vec<&CharBox> = chars.iter().collect();
        let rows = group_rows(&refs, 2.0);
        assert_eq!(rows.len(), 2);
        assert!(rows[0].y > rows[1].y);
        assert_eq!(assemble_text(&rows[0].chars), "high");
    }

    #[test]
    fn test_split_cells_on_gap() {
        let mut chars = word("aa", 100.0, 500.0);
        chars.extend(word("bb", 300.0, 500.0));
        let refs: Vec<&CharBox> = chars.iter().collect();
        let rows = group_rows(&refs, 2.0);
        let cells = split_cells(&rows[0], 15.0);
        assert_eq!(cells.len(), 2);
        assert_eq!(assemble_text(&cells[0]), "aa");
        assert_eq!(assemble_text(&cells[1]), "bb");
    }

    #[test]
    fn test_assemble_text_inserts_word_spaces() {
        let mut chars = word("ab", 100.0, 500.0);
        // One glyph-width hole, as left by an encoded space.
        chars.extend(word("cd", 118.0, 500.0));
        let refs: Vec<&CharBox> = chars.iter().collect();
        assert_eq!(assemble_text(&refs), "ab cd");
    }

    #[test]
    fn test_cluster_positions() {
        let clusters = cluster_positions(&[100.0, 100.5, 101.0, 300.0, 299.5], 3.0);
        assert_eq!(clusters.len(), 2);
        assert_eq!(clusters[0].1, 3);
        assert_eq!(clusters[1].1, 2);
        assert!((clusters[0].0 - 100.5).abs() < 0.1);
    }
}
