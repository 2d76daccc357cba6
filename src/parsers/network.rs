//! Text-edge alignment table detection.
//!
//! Forms words from the page's characters, then lets every word vote on
//! left, middle, and right alignment coordinates. The alignment with the
//! strongest repeated edges defines the columns; rows that touch those
//! edges make up the table body.

use std::path::Path;

use log::debug;

use crate::error::{Error, Result};
use crate::layout::{CharBox, PageLayout, Rect};
use crate::model::Table;
use crate::parsers::{
    assemble_text, cluster_positions, group_rows, PagePrep, ParserOptions, RowBand, TableParser,
};

/// The `network` flavor.
pub struct Network {
    options: ParserOptions,
    prep: Option<PagePrep>,
}

impl Network {
    pub fn new(options: ParserOptions) -> Self {
        Self {
            options,
            prep: None,
        }
    }
}

impl TableParser for Network {
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

/// A run of characters with no visible gap, the voting unit.
#[derive(Debug, Clone)]
struct Word<'a> {
    bbox: Rect,
    chars: Vec<&'a CharBox>,
}

impl Word<'_> {
    fn coordinate(&self, alignment: Alignment) -> f32 {
        match alignment {
            Alignment::Left => self.bbox.x0,
            Alignment::Middle => self.bbox.center().0,
            Alignment::Right => self.bbox.x1,
        }
    }

    fn text(&self) -> String {
        assemble_text(&self.chars)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Alignment {
    Left,
    Middle,
    Right,
}

const ALIGNMENTS: [Alignment; 3] = [Alignment::Left, Alignment::Middle, Alignment::Right];

/// Run alignment-network detection over a page layout.
pub(crate) fn detect(layout: &PageLayout, options: &ParserOptions, page: u32) -> Vec<Table> {
    let chars: Vec<&CharBox> = layout
        .chars
        .iter()
        .filter(|c| c.orientation.is_horizontal())
        .collect();
    let rows = group_rows(&chars, options.row_tolerance);
    let word_rows: Vec<Vec<Word<'_>>> = rows.iter().map(split_words).collect();

    // Vote: which alignment repeats across the most distinct edges?
    let mut best: Option<(Alignment, Vec<f32>)> = None;
    for alignment in ALIGNMENTS {
        let coords: Vec<f32> = word_rows
            .iter()
            .flatten()
            .map(|w| w.coordinate(alignment))
            .collect();
        let edges: Vec<f32> = cluster_positions(&coords, options.edge_tolerance)
            .into_iter()
            .filter(|&(_, votes)| votes >= options.min_rows)
            .map(|(pos, _)| pos)
            .collect();
        if best.as_ref().map(|(_, e)| e.len()).unwrap_or(0) < edges.len() {
            best = Some((alignment, edges));
        }
    }
    let Some((alignment, edges)) = best else {
        return vec![];
    };
    if edges.len() < options.min_columns {
        return vec![];
    }
    debug!(
        "page {}: network found {} edges via {:?} alignment",
        page,
        edges.len(),
        alignment
    );

    let mut tables = Vec::new();
    let mut order = 0u32;
    for group in aligned_groups(&word_rows, alignment, &edges, options) {
        if let Some(table) = build_table(group, alignment, &edges, page, order) {
            tables.push(table);
            order += 1;
        }
    }
    tables
}

fn split_words<'a>(row: &RowBand<'a>) -> Vec<Word<'a>> {
    let mut words: Vec<Word<'a>> = Vec::new();
    for &c in &row.chars {
        match words.last_mut() {
            Some(word) if c.bbox.x0 - word.bbox.x1 <= 0.3 * c.font_size.max(1.0) => {
                word.bbox = word.bbox.union(&c.bbox);
                word.chars.push(c);
            }
            _ => words.push(Word {
                bbox: c.bbox,
                chars: vec![c],
            }),
        }
    }
    words
}

/// How many of a row's words sit on one of the voted edges.
fn edge_hits(row: &[Word<'_>], alignment: Alignment, edges: &[f32], tolerance: f32) -> usize {
    row.iter()
        .filter(|w| {
            edges
                .iter()
                .any(|&e| (w.coordinate(alignment) - e).abs() <= tolerance)
        })
        .count()
}

/// Maximal runs of consecutive rows that touch at least two voted edges.
fn aligned_groups<'a, 'b>(
    word_rows: &'b [Vec<Word<'a>>],
    alignment: Alignment,
    edges: &[f32],
    options: &ParserOptions,
) -> Vec<&'b [Vec<Word<'a>>]> {
    let mut groups = Vec::new();
    let mut start = None;
    for (i, row) in word_rows.iter().enumerate() {
        let aligned = edge_hits(row, alignment, edges, options.edge_tolerance) >= 2;
        match (aligned, start) {
            (true, None) => start = Some(i),
            (false, Some(s)) => {
                if i - s >= options.min_rows {
                    groups.push(&word_rows[s..i]);
                }
                start = None;
            }
            _ => {}
        }
    }
    if let Some(s) = start {
        if word_rows.len() - s >= options.min_rows {
            groups.push(&word_rows[s..]);
        }
    }
    groups
}

fn build_table(
    group: &[Vec<Word<'_>>],
    alignment: Alignment,
    edges: &[f32],
    page: u32,
    order: u32,
) -> Option<Table> {
    let region = group
        .iter()
        .flatten()
        .fold(None::<Rect>, |acc, w| {
            Some(match acc {
                Some(r) => r.union(&w.bbox),
                None => w.bbox,
            })
        })?;

    let mut table = Table::new(page, order, region);
    for row in group {
        let mut cells = vec![String::new(); edges.len()];
        for word in row {
            let idx = nearest_edge(edges, word.coordinate(alignment));
            let text = word.text();
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

fn nearest_edge(edges: &[f32], coordinate: f32) -> usize {
    let mut idx = 0;
    let mut best = f32::INFINITY;
    for (i, &e) in edges.iter().enumerate() {
        let d = (coordinate - e).abs();
        if d < best {
            best = d;
            idx = i;
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

    #[test]
    fn test_left_aligned_columns() {
        let mut chars = Vec::new();
        for (i, y) in [700.0, 680.0, 660.0].iter().enumerate() {
            chars.extend(word(&format!("n{i}"), 100.0, *y));
            chars.extend(word(&format!("value{i}"), 250.0, *y));
        }
        let tables = detect(&layout_of(chars), &ParserOptions::default(), 2);
        assert_eq!(tables.len(), 1);
        assert_eq!(tables[0].page, 2);
        assert_eq!(tables[0].shape(), (3, 2));
        assert_eq!(tables[0].rows[1], vec!["n1", "value1"]);
    }

    #[test]
    fn test_right_aligned_numbers_win_the_vote() {
        // Numeric columns are usually right-aligned: left edges scatter,
        // right edges coincide.
        let mut chars = Vec::new();
        let values = ["1", "22", "333"];
        for (i, y) in [700.0, 680.0, 660.0].iter().enumerate() {
            chars.extend(word("row", 100.0, *y));
            let v = values[i];
            let x1 = 300.0;
            chars.extend(word(v, x1 - v.len() as f32 * 6.0, *y));
        }
        let tables = detect(&layout_of(chars), &ParserOptions::default(), 1);
        assert_eq!(tables.len(), 1);
        assert_eq!(tables[0].shape(), (3, 2));
        assert_eq!(tables[0].rows[2], vec!["row", "333"]);
    }

    #[test]
    fn test_scattered_text_yields_nothing() {
        let mut chars = Vec::new();
        chars.extend(word("a", 100.0, 700.0));
        chars.extend(word("b", 157.0, 680.0));
        chars.extend(word("c", 214.0, 660.0));
        chars.extend(word("d", 271.0, 640.0));
        let tables = detect(&layout_of(chars), &ParserOptions::default(), 1);
        assert!(tables.is_empty());
    }

    #[test]
    fn test_words_split_on_gap() {
        let mut chars = word("ab", 100.0, 500.0);
        chars.extend(word("cd", 130.0, 500.0));
        let refs: Vec<&CharBox> = chars.iter().collect();
        let rows = group_rows(&refs, 2.0);
        let words = split_words(&rows[0]);
        assert_eq!(words.len(), 2);
        assert_eq!(words[0].text(), "ab");
        assert_eq!(words[1].text(), "cd");
    }
}
