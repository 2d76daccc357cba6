//! Ruling-line table detection.
//!
//! Reads the page's content stream a second time, this time for path
//! construction operators, and rebuilds the drawn grid: stroked or
//! filled lines become rulings, rulings cluster into table regions, and
//! the ruling coordinates become the cell boundaries.

use std::path::Path;

use log::debug;
use lopdf::content::Content;
use lopdf::{Document as LopdfDocument, Object};

use crate::error::{Error, Result};
use crate::layout::{number, CharBox, Mat, PageLayout, Rect};
use crate::model::Table;
use crate::parsers::{assemble_text, cluster_positions, PagePrep, ParserOptions, TableParser};

/// The `lattice` flavor.
pub struct Lattice {
    options: ParserOptions,
    prep: Option<PagePrep>,
}

impl Lattice {
    pub fn new(options: ParserOptions) -> Self {
        Self {
            options,
            prep: None,
        }
    }
}

impl TableParser for Lattice {
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
        detect(&prep.path, &prep.layout, &self.options, prep.page)
    }
}

/// A horizontal or vertical ruling line in page coordinates.
#[derive(Debug, Clone, Copy)]
enum Ruling {
    Horizontal { y: f32, x0: f32, x1: f32 },
    Vertical { x: f32, y0: f32, y1: f32 },
}

impl Ruling {
    fn bbox(&self) -> Rect {
        match *self {
            Ruling::Horizontal { y, x0, x1 } => Rect::new(x0, y, x1, y),
            Ruling::Vertical { x, y0, y1 } => Rect::new(x, y0, x, y1),
        }
    }
}

/// Run ruling-line detection on a single-page file.
pub(crate) fn detect(
    path: &Path,
    layout: &PageLayout,
    options: &ParserOptions,
    page: u32,
) -> Result<Vec<Table>> {
    let doc = LopdfDocument::load(path)?;
    let pages = doc.get_pages();
    let page_id = *pages
        .values()
        .next()
        .ok_or_else(|| Error::Pdf("page file has no pages".to_string()))?;

    let content_data = doc.get_page_content(page_id)?;
    let content = Content::decode(&content_data).map_err(|e| Error::Pdf(e.to_string()))?;

    let rulings = rulings_from_content(&content, options);
    debug!("page {}: {} ruling lines", page, rulings.len());
    Ok(tables_from_rulings(rulings, layout, options, page))
}

/// Replay the content stream's path operators and collect the axis-aligned
/// lines it paints.
fn rulings_from_content(content: &Content, options: &ParserOptions) -> Vec<Ruling> {
    let mut rulings = Vec::new();
    let mut pending: Vec<((f32, f32), (f32, f32))> = Vec::new();
    let mut current: Option<(f32, f32)> = None;
    let mut subpath_start: Option<(f32, f32)> = None;
    let mut ctm = Mat::default();
    let mut ctm_stack: Vec<Mat> = Vec::new();

    for op in &content.operations {
        match op.operator.as_str() {
            "q" => ctm_stack.push(ctm),
            "Q" => {
                if let Some(prev) = ctm_stack.pop() {
                    ctm = prev;
                }
            }
            "cm" => {
                if op.operands.len() >= 6 {
                    let m = Mat::new(
                        number(&op.operands[0]).unwrap_or(1.0),
                        number(&op.operands[1]).unwrap_or(0.0),
                        number(&op.operands[2]).unwrap_or(0.0),
                        number(&op.operands[3]).unwrap_or(1.0),
                        number(&op.operands[4]).unwrap_or(0.0),
                        number(&op.operands[5]).unwrap_or(0.0),
                    );
                    ctm = m.concat(&ctm);
                }
            }
            "m" => {
                if let Some(p) = point(&op.operands, &ctm) {
                    current = Some(p);
                    subpath_start = Some(p);
                }
            }
            "l" => {
                if let (Some(p), Some(q)) = (current, point(&op.operands, &ctm)) {
                    pending.push((p, q));
                    current = Some(q);
                }
            }
            "h" => {
                if let (Some(p), Some(q)) = (current, subpath_start) {
                    pending.push((p, q));
                    current = Some(q);
                }
            }
            "re" => {
                if op.operands.len() >= 4 {
                    let x = number(&op.operands[0]).unwrap_or(0.0);
                    let y = number(&op.operands[1]).unwrap_or(0.0);
                    let w = number(&op.operands[2]).unwrap_or(0.0);
                    let h = number(&op.operands[3]).unwrap_or(0.0);
                    let c = [
                        ctm.apply(x, y),
                        ctm.apply(x + w, y),
                        ctm.apply(x + w, y + h),
                        ctm.apply(x, y + h),
                    ];
                    pending.push((c[0], c[1]));
                    pending.push((c[1], c[2]));
                    pending.push((c[2], c[3]));
                    pending.push((c[3], c[0]));
                    current = Some(c[0]);
                    subpath_start = Some(c[0]);
                }
            }
            // Painting operators commit the path; `n` discards it.
            "S" | "s" | "f" | "F" | "f*" | "B" | "B*" | "b" | "b*" => {
                for (p, q) in pending.drain(..) {
                    if let Some(r) = classify_segment(p, q, options) {
                        rulings.push(r);
                    }
                }
                current = None;
                subpath_start = None;
            }
            "n" => {
                pending.clear();
                current = None;
                subpath_start = None;
            }
            _ => {}
        }
    }
    rulings
}

fn point(operands: &[Object], ctm: &Mat) -> Option<(f32, f32)> {
    if operands.len() >= 2 {
        let x = number(&operands[0])?;
        let y = number(&operands[1])?;
        Some(ctm.apply(x, y))
    } else {
        None
    }
}

fn classify_segment(
    (x0, y0): (f32, f32),
    (x1, y1): (f32, f32),
    options: &ParserOptions,
) -> Option<Ruling> {
    let dx = (x1 - x0).abs();
    let dy = (y1 - y0).abs();
    if dy <= options.line_tolerance && dx >= options.min_line_length {
        Some(Ruling::Horizontal {
            y: (y0 + y1) / 2.0,
            x0: x0.min(x1),
            x1: x0.max(x1),
        })
    } else if dx <= options.line_tolerance && dy >= options.min_line_length {
        Some(Ruling::Vertical {
            x: (x0 + x1) / 2.0,
            y0: y0.min(y1),
            y1: y0.max(y1),
        })
    } else {
        None
    }
}

/// Group rulings into connected regions, then carve each region's grid.
fn tables_from_rulings(
    rulings: Vec<Ruling>,
    layout: &PageLayout,
    options: &ParserOptions,
    page: u32,
) -> Vec<Table> {
    let margin = 2.0 * options.line_tolerance;
    let mut groups: Vec<(Rect, Vec<Ruling>)> = Vec::new();

    for r in rulings {
        let b = r.bbox().expanded(margin);
        let hits: Vec<usize> = groups
            .iter()
            .enumerate()
            .filter(|(_, (rect, _))| rect.expanded(margin).intersects(&b))
            .map(|(i, _)| i)
            .collect();
        match hits.split_first() {
            None => groups.push((r.bbox(), vec![r])),
            Some((&first, rest)) => {
                for &i in rest.iter().rev() {
                    let (rect, rs) = groups.remove(i);
                    groups[first].0 = groups[first].0.union(&rect);
                    groups[first].1.extend(rs);
                }
                groups[first].0 = groups[first].0.union(&r.bbox());
                groups[first].1.push(r);
            }
        }
    }

    // Top of the page first, matching document order.
    groups.sort_by(|a, b| {
        b.0.y1
            .partial_cmp(&a.0.y1)
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let mut tables = Vec::new();
    let mut order = 0u32;
    for (_, group) in groups {
        if let Some(table) = carve_grid(&group, layout, options, page, order) {
            tables.push(table);
            order += 1;
        }
    }
    tables
}

/// Turn one connected group of rulings into a filled table, if it forms
/// a grid at all.
fn carve_grid(
    rulings: &[Ruling],
    layout: &PageLayout,
    options: &ParserOptions,
    page: u32,
    order: u32,
) -> Option<Table> {
    let xs: Vec<f32> = rulings
        .iter()
        .filter_map(|r| match r {
            Ruling::Vertical { x, .. } => Some(*x),
            _ => None,
        })
        .collect();
    let ys: Vec<f32> = rulings
        .iter()
        .filter_map(|r| match r {
            Ruling::Horizontal { y, .. } => Some(*y),
            _ => None,
        })
        .collect();

    let col_edges: Vec<f32> = cluster_positions(&xs, options.line_tolerance)
        .into_iter()
        .map(|(pos, _)| pos)
        .collect();
    let mut row_edges: Vec<f32> = cluster_positions(&ys, options.line_tolerance)
        .into_iter()
        .map(|(pos, _)| pos)
        .collect();
    if col_edges.len() < 2 || row_edges.len() < 2 {
        return None;
    }
    // Rows are walked top-down.
    row_edges.reverse();

    let region = Rect::new(
        col_edges[0],
        *row_edges.last()?,
        *col_edges.last()?,
        row_edges[0],
    );

    let mut table = Table::new(page, order, region);
    for i in 0..row_edges.len() - 1 {
        let (top, bottom) = (row_edges[i], row_edges[i + 1]);
        let mut cells = Vec::with_capacity(col_edges.len() - 1);
        for j in 0..col_edges.len() - 1 {
            let (left, right) = (col_edges[j], col_edges[j + 1]);
            let mut chars: Vec<&CharBox> = layout
                .chars
                .iter()
                .filter(|c| {
                    let (cx, cy) = c.bbox.center();
                    c.orientation.is_horizontal()
                        && cx >= left
                        && cx < right
                        && cy >= bottom
                        && cy < top
                })
                .collect();
            chars.sort_by(|a, b| {
                a.bbox
                    .x0
                    .partial_cmp(&b.bbox.x0)
                    .unwrap_or(std::cmp::Ordering::Equal)
            });
            cells.push(assemble_text(&chars));
        }
        table.add_row(cells);
    }
    Some(table)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::LayoutOptions;
    use crate::parsers::testutil::word;
    use lopdf::content::Operation;

    fn real(v: f32) -> Object {
        Object::Real(v)
    }

    /// A stroked 2x2 grid: three horizontal and three vertical lines.
    fn grid_content() -> Content {
        let mut operations = Vec::new();
        for y in [600.0, 650.0, 700.0] {
            operations.push(Operation::new("m", vec![real(100.0), real(y)]));
            operations.push(Operation::new("l", vec![real(400.0), real(y)]));
        }
        for x in [100.0, 250.0, 400.0] {
            operations.push(Operation::new("m", vec![real(x), real(600.0)]));
            operations.push(Operation::new("l", vec![real(x), real(700.0)]));
        }
        operations.push(Operation::new("S", vec![]));
        Content { operations }
    }

    fn grid_layout() -> PageLayout {
        let mut chars = Vec::new();
        chars.extend(word("a1", 110.0, 670.0));
        chars.extend(word("b1", 260.0, 670.0));
        chars.extend(word("a2", 110.0, 620.0));
        chars.extend(word("b2", 260.0, 620.0));
        PageLayout::from_chars(chars, &LayoutOptions::default())
    }

    #[test]
    fn test_strokes_become_rulings() {
        let rulings = rulings_from_content(&grid_content(), &ParserOptions::default());
        let horizontal = rulings
            .iter()
            .filter(|r| matches!(r, Ruling::Horizontal { .. }))
            .count();
        assert_eq!(horizontal, 3);
        assert_eq!(rulings.len(), 6);
    }

    #[test]
    fn test_unpainted_path_discarded() {
        let content = Content {
            operations: vec![
                Operation::new("m", vec![real(0.0), real(0.0)]),
                Operation::new("l", vec![real(100.0), real(0.0)]),
                Operation::new("n", vec![]),
            ],
        };
        assert!(rulings_from_content(&content, &ParserOptions::default()).is_empty());
    }

    #[test]
    fn test_rectangle_contributes_four_edges() {
        let content = Content {
            operations: vec![
                Operation::new("re", vec![real(10.0), real(10.0), real(200.0), real(100.0)]),
                Operation::new("f", vec![]),
            ],
        };
        assert_eq!(
            rulings_from_content(&content, &ParserOptions::default()).len(),
            4
        );
    }

    #[test]
    fn test_diagonal_lines_ignored() {
        let content = Content {
            operations: vec![
                Operation::new("m", vec![real(0.0), real(0.0)]),
                Operation::new("l", vec![real(100.0), real(100.0)]),
                Operation::new("S", vec![]),
            ],
        };
        assert!(rulings_from_content(&content, &ParserOptions::default()).is_empty());
    }

    #[test]
    fn test_grid_fills_cells() {
        let options = ParserOptions::default();
        let rulings = rulings_from_content(&grid_content(), &options);
        let tables = tables_from_rulings(rulings, &grid_layout(), &options, 3);
        assert_eq!(tables.len(), 1);
        let table = &tables[0];
        assert_eq!(table.page, 3);
        assert_eq!(table.shape(), (2, 2));
        assert_eq!(table.rows[0], vec!["a1", "b1"]);
        assert_eq!(table.rows[1], vec!["a2", "b2"]);
    }

    #[test]
    fn test_separate_grids_become_separate_tables() {
        let options = ParserOptions::default();
        let mut operations = grid_content().operations;
        // A second, disjoint grid lower on the page.
        for y in [200.0, 250.0] {
            operations.push(Operation::new("m", vec![real(100.0), real(y)]));
            operations.push(Operation::new("l", vec![real(400.0), real(y)]));
        }
        for x in [100.0, 400.0] {
            operations.push(Operation::new("m", vec![real(x), real(200.0)]));
            operations.push(Operation::new("l", vec![real(x), real(250.0)]));
        }
        operations.push(Operation::new("S", vec![]));
        let rulings = rulings_from_content(&Content { operations }, &options);
        let tables = tables_from_rulings(rulings, &grid_layout(), &options, 1);
        assert_eq!(tables.len(), 2);
        assert_eq!(tables[0].order, 0);
        assert!(tables[0].region.y0 > tables[1].region.y1);
    }

    #[test]
    fn test_lone_line_is_not_a_table() {
        let options = ParserOptions::default();
        let content = Content {
            operations: vec![
                Operation::new("m", vec![real(100.0), real(500.0)]),
                Operation::new("l", vec![real(400.0), real(500.0)]),
                Operation::new("S", vec![]),
            ],
        };
        let rulings = rulings_from_content(&content, &options);
        let tables = tables_from_rulings(rulings, &grid_layout(), &options, 1);
        assert!(tables.is_empty());
    }
}
