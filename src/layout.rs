//! Per-page layout analysis.
//!
//! Walks a page's content stream to produce positioned character boxes and
//! horizontal/vertical text runs. The result feeds two consumers: the
//! rotation heuristic used while normalizing extracted pages, and the
//! table parsers, which cluster character geometry into rows and columns.

use std::collections::HashMap;
use std::path::Path;

use lopdf::{Document as LopdfDocument, Object, ObjectId};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// An axis-aligned rectangle in PDF user-space coordinates.
///
/// `y` grows upward, matching PDF conventions; `x0,y0` is the lower-left
/// corner and `x1,y1` the upper-right.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    pub x0: f32,
    pub y0: f32,
    pub x1: f32,
    pub y1: f32,
}

impl Rect {
    /// Create a rectangle from two corners, normalizing their order.
    pub fn new(x0: f32, y0: f32, x1: f32, y1: f32) -> Self {
        Self {
            x0: x0.min(x1),
            y0: y0.min(y1),
            x1: x0.max(x1),
            y1: y0.max(y1),
        }
    }

    /// Width of the rectangle.
    pub fn width(&self) -> f32 {
        self.x1 - self.x0
    }

    /// Height of the rectangle.
    pub fn height(&self) -> f32 {
        self.y1 - self.y0
    }

    /// Center point.
    pub fn center(&self) -> (f32, f32) {
        ((self.x0 + self.x1) / 2.0, (self.y0 + self.y1) / 2.0)
    }

    /// Whether a point lies inside the rectangle (inclusive).
    pub fn contains_point(&self, x: f32, y: f32) -> bool {
        x >= self.x0 && x <= self.x1 && y >= self.y0 && y <= self.y1
    }

    /// Smallest rectangle covering both `self` and `other`.
    pub fn union(&self, other: &Rect) -> Rect {
        Rect {
            x0: self.x0.min(other.x0),
            y0: self.y0.min(other.y0),
            x1: self.x1.max(other.x1),
            y1: self.y1.max(other.y1),
        }
    }

    /// Grow the rectangle by `margin` on every side.
    pub fn expanded(&self, margin: f32) -> Rect {
        Rect {
            x0: self.x0 - margin,
            y0: self.y0 - margin,
            x1: self.x1 + margin,
            y1: self.y1 + margin,
        }
    }

    /// Whether two rectangles overlap (inclusive of touching edges).
    pub fn intersects(&self, other: &Rect) -> bool {
        self.x0 <= other.x1 && other.x0 <= self.x1 && self.y0 <= other.y1 && other.y0 <= self.y1
    }
}

/// Reading orientation of a character on the displayed page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Orientation {
    /// Normal left-to-right text.
    Horizontal,
    /// Rotated 90° counterclockwise; reads bottom-to-top.
    BottomToTop,
    /// Rotated 90° clockwise; reads top-to-bottom.
    TopToBottom,
    /// Upside down.
    Inverted,
}

impl Orientation {
    /// Whether the character flows along the horizontal axis.
    pub fn is_horizontal(&self) -> bool {
        matches!(self, Orientation::Horizontal | Orientation::Inverted)
    }
}

/// A single positioned character.
#[derive(Debug, Clone)]
pub struct CharBox {
    /// The character.
    pub text: char,
    /// Bounding box in page coordinates.
    pub bbox: Rect,
    /// Reading orientation, already corrected for the page's `/Rotate`.
    pub orientation: Orientation,
    /// Effective font size in points.
    pub font_size: f32,
}

/// Kind of a text run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunKind {
    /// A line of horizontally flowing characters.
    Horizontal,
    /// A column of vertically flowing characters.
    Vertical,
}

/// A contiguous run of same-orientation characters.
#[derive(Debug, Clone)]
pub struct TextRun {
    /// Bounding box covering every character in the run.
    pub bbox: Rect,
    /// Flow direction of the run.
    pub kind: RunKind,
    /// Number of characters in the run.
    pub char_count: usize,
}

/// Rotation correction required by a page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rotation {
    /// No correction needed.
    None,
    /// Text reads top-to-bottom; correct with a −90° rotation.
    Clockwise,
    /// Text reads bottom-to-top; correct with a +90° rotation.
    Anticlockwise,
}

/// Options controlling layout analysis.
#[derive(Debug, Clone)]
pub struct LayoutOptions {
    /// Baseline tolerance when grouping characters into runs, in points.
    pub line_tolerance: f32,
    /// Approximate glyph advance as a fraction of the font size.
    ///
    /// Exact glyph widths would require font metrics; a flat factor is
    /// close enough for clustering text into rows and columns.
    pub char_width_factor: f32,
}

impl Default for LayoutOptions {
    fn default() -> Self {
        Self {
            line_tolerance: 2.0,
            char_width_factor: 0.5,
        }
    }
}

/// The analyzed layout of one page.
#[derive(Debug, Clone, Default)]
pub struct PageLayout {
    /// Every positioned character on the page.
    pub chars: Vec<CharBox>,
    /// Horizontal text runs.
    pub horizontal_runs: Vec<TextRun>,
    /// Vertical text runs.
    pub vertical_runs: Vec<TextRun>,
}

impl PageLayout {
    /// Build a layout from raw character boxes.
    pub fn from_chars(chars: Vec<CharBox>, options: &LayoutOptions) -> Self {
        let (horizontal_runs, vertical_runs) = build_runs(&chars, options.line_tolerance);
        Self {
            chars,
            horizontal_runs,
            vertical_runs,
        }
    }

    /// Text runs of the requested kind.
    pub fn runs(&self, kind: RunKind) -> &[TextRun] {
        match kind {
            RunKind::Horizontal => &self.horizontal_runs,
            RunKind::Vertical => &self.vertical_runs,
        }
    }

    /// Classify the page's dominant text orientation.
    ///
    /// Characters are tallied by whether they fall inside horizontal or
    /// vertical run boxes. A horizontal majority (or an empty page) needs
    /// no correction. For a vertical majority, the reading direction of
    /// the vertical characters decides between the two 90° corrections.
    /// Running this on an already-corrected page yields [`Rotation::None`]
    /// because correction happens through the page's `/Rotate` entry,
    /// which this analysis accounts for.
    pub fn detect_rotation(&self) -> Rotation {
        let mut horizontal = 0usize;
        let mut vertical = 0usize;

        for c in &self.chars {
            let (cx, cy) = c.bbox.center();
            if self
                .horizontal_runs
                .iter()
                .any(|r| r.bbox.contains_point(cx, cy))
            {
                horizontal += 1;
            } else if self
                .vertical_runs
                .iter()
                .any(|r| r.bbox.contains_point(cx, cy))
            {
                vertical += 1;
            }
        }

        if horizontal >= vertical {
            return Rotation::None;
        }

        let clockwise = self
            .chars
            .iter()
            .filter(|c| c.orientation == Orientation::TopToBottom)
            .count();
        let anticlockwise = self
            .chars
            .iter()
            .filter(|c| c.orientation == Orientation::BottomToTop)
            .count();

        if clockwise < anticlockwise {
            Rotation::Anticlockwise
        } else {
            Rotation::Clockwise
        }
    }
}

/// Analyze the first page of the PDF at `path`.
///
/// Returns the page layout together with the page dimensions
/// `(width, height)` in points.
pub fn get_page_layout(path: &Path, options: &LayoutOptions) -> Result<(PageLayout, (f32, f32))> {
    let doc = LopdfDocument::load(path)?;
    analyze_page(&doc, 1, options)
}

/// Analyze page `page_num` of an already loaded document.
pub fn analyze_page(
    doc: &LopdfDocument,
    page_num: u32,
    options: &LayoutOptions,
) -> Result<(PageLayout, (f32, f32))> {
    let pages = doc.get_pages();
    let total = pages.len() as u32;
    let page_id = *pages
        .get(&page_num)
        .ok_or(Error::PageNotFound(page_num, total))?;

    let dimensions = page_dimensions(doc, page_id);
    let rotate = page_rotation(doc, page_id);
    let chars = extract_chars(doc, page_id, rotate, options)?;

    Ok((PageLayout::from_chars(chars, options), dimensions))
}

/// Read the page dimensions from its MediaBox, defaulting to Letter size.
///
/// The box is `[x0 y0 x1 y1]`; the lower-left corner need not be the
/// origin, so the extents are corner differences.
fn page_dimensions(doc: &LopdfDocument, page_id: ObjectId) -> (f32, f32) {
    if let Ok(page_dict) = doc.get_dictionary(page_id) {
        if let Ok(media_box) = page_dict.get(b"MediaBox") {
            if let Ok(array) = media_box.as_array() {
                if array.len() >= 4 {
                    if let (Some(x0), Some(y0), Some(x1), Some(y1)) = (
                        number(&array[0]),
                        number(&array[1]),
                        number(&array[2]),
                        number(&array[3]),
                    ) {
                        return ((x1 - x0).abs(), (y1 - y0).abs());
                    }
                }
            }
        }
    }
    (612.0, 792.0)
}

/// Read the page's `/Rotate` entry, following the parent chain.
pub(crate) fn page_rotation(doc: &LopdfDocument, page_id: ObjectId) -> i64 {
    let mut current = page_id;
    for _ in 0..8 {
        let Ok(dict) = doc.get_dictionary(current) else {
            break;
        };
        if let Ok(rotate) = dict.get(b"Rotate") {
            if let Ok(r) = rotate.as_i64() {
                return r.rem_euclid(360);
            }
        }
        match dict.get(b"Parent").and_then(|p| p.as_reference()) {
            Ok(parent) => current = parent,
            Err(_) => break,
        }
    }
    0
}

/// Numeric operand as `f32`, whether written as an integer or a real.
pub(crate) fn number(obj: &Object) -> Option<f32> {
    match obj {
        Object::Integer(n) => Some(*n as f32),
        Object::Real(n) => Some(*n),
        _ => None,
    }
}

/// 2D affine transform in PDF row-vector convention.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Mat {
    a: f32,
    b: f32,
    c: f32,
    d: f32,
    e: f32,
    f: f32,
}

impl Default for Mat {
    fn default() -> Self {
        Self {
            a: 1.0,
            b: 0.0,
            c: 0.0,
            d: 1.0,
            e: 0.0,
            f: 0.0,
        }
    }
}

impl Mat {
    pub(crate) fn new(a: f32, b: f32, c: f32, d: f32, e: f32, f: f32) -> Self {
        Self { a, b, c, d, e, f }
    }

    /// `self` applied first, then `other`.
    pub(crate) fn concat(&self, other: &Mat) -> Mat {
        Mat {
            a: self.a * other.a + self.b * other.c,
            b: self.a * other.b + self.b * other.d,
            c: self.c * other.a + self.d * other.c,
            d: self.c * other.b + self.d * other.d,
            e: self.e * other.a + self.f * other.c + other.e,
            f: self.e * other.b + self.f * other.d + other.f,
        }
    }

    pub(crate) fn apply(&self, x: f32, y: f32) -> (f32, f32) {
        (
            x * self.a + y * self.c + self.e,
            x * self.b + y * self.d + self.f,
        )
    }

    /// Translate in local (pre-transform) space.
    fn translate(&mut self, tx: f32, ty: f32) {
        self.e += tx * self.a + ty * self.c;
        self.f += tx * self.b + ty * self.d;
    }

    fn scale(&self) -> f32 {
        (self.a * self.a + self.b * self.b).sqrt()
    }
}

/// Classify a character's displayed orientation.
///
/// `trm` is the combined text-to-device matrix; `page_rotate` is the
/// page's `/Rotate` value in clockwise degrees, which the viewer applies
/// on top of everything drawn.
fn classify_orientation(trm: &Mat, page_rotate: i64) -> Orientation {
    let theta = trm.b.atan2(trm.a).to_degrees();
    let effective = (theta - page_rotate as f32).rem_euclid(360.0);

    if !(45.0..315.0).contains(&effective) {
        Orientation::Horizontal
    } else if effective < 135.0 {
        Orientation::BottomToTop
    } else if effective < 225.0 {
        Orientation::Inverted
    } else {
        Orientation::TopToBottom
    }
}

/// Walk the page content stream and emit one box per visible character.
fn extract_chars(
    doc: &LopdfDocument,
    page_id: ObjectId,
    page_rotate: i64,
    options: &LayoutOptions,
) -> Result<Vec<CharBox>> {
    let content_data = doc.get_page_content(page_id)?;
    let content = lopdf::content::Content::decode(&content_data)
        .map_err(|e| Error::Pdf(e.to_string()))?;

    let fonts = doc.get_page_fonts(page_id).unwrap_or_default();
    let mut encodings = HashMap::new();
    for (name, font) in &fonts {
        if let Ok(encoding) = font.get_font_encoding(doc) {
            encodings.insert(name.clone(), encoding);
        }
    }

    let mut chars = Vec::new();
    let mut ctm = Mat::default();
    let mut ctm_stack: Vec<Mat> = Vec::new();
    let mut tm = Mat::default();
    let mut tlm = Mat::default();
    let mut font_name: Vec<u8> = Vec::new();
    let mut font_size: f32 = 12.0;
    let mut leading: f32 = 0.0;
    let mut in_text = false;

    for op in content.operations {
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
            "BT" => {
                in_text = true;
                tm = Mat::default();
                tlm = Mat::default();
            }
            "ET" => in_text = false,
            "Tf" => {
                if op.operands.len() >= 2 {
                    if let Object::Name(name) = &op.operands[0] {
                        font_name = name.clone();
                    }
                    font_size = number(&op.operands[1]).unwrap_or(12.0);
                }
            }
            "TL" => {
                if let Some(l) = op.operands.first().and_then(number) {
                    leading = l;
                }
            }
            "Td" | "TD" => {
                if op.operands.len() >= 2 {
                    let tx = number(&op.operands[0]).unwrap_or(0.0);
                    let ty = number(&op.operands[1]).unwrap_or(0.0);
                    if op.operator == "TD" {
                        leading = -ty;
                    }
                    tlm.translate(tx, ty);
                    tm = tlm;
                }
            }
            "Tm" => {
                if op.operands.len() >= 6 {
                    tlm = Mat::new(
                        number(&op.operands[0]).unwrap_or(1.0),
                        number(&op.operands[1]).unwrap_or(0.0),
                        number(&op.operands[2]).unwrap_or(0.0),
                        number(&op.operands[3]).unwrap_or(1.0),
                        number(&op.operands[4]).unwrap_or(0.0),
                        number(&op.operands[5]).unwrap_or(0.0),
                    );
                    tm = tlm;
                }
            }
            "T*" => {
                tlm.translate(0.0, -leading);
                tm = tlm;
            }
            "Tj" => {
                if in_text {
                    if let Some(Object::String(bytes, _)) = op.operands.first() {
                        let text = decode_string(&encodings, &font_name, bytes);
                        emit_chars(
                            &text, &mut tm, &ctm, font_size, page_rotate, options, &mut chars,
                        );
                    }
                }
            }
            "TJ" => {
                if in_text {
                    if let Some(Object::Array(items)) = op.operands.first() {
                        for item in items {
                            match item {
                                Object::String(bytes, _) => {
                                    let text = decode_string(&encodings, &font_name, bytes);
                                    emit_chars(
                                        &text,
                                        &mut tm,
                                        &ctm,
                                        font_size,
                                        page_rotate,
                                        options,
                                        &mut chars,
                                    );
                                }
                                Object::Integer(n) => {
                                    tm.translate(-(*n as f32) / 1000.0 * font_size, 0.0);
                                }
                                Object::Real(n) => {
                                    tm.translate(-n / 1000.0 * font_size, 0.0);
                                }
                                _ => {}
                            }
                        }
                    }
                }
            }
            "'" | "\"" => {
                tlm.translate(0.0, -leading);
                tm = tlm;
                if in_text {
                    let text_idx = if op.operator == "\"" { 2 } else { 0 };
                    if let Some(Object::String(bytes, _)) = op.operands.get(text_idx) {
                        let text = decode_string(&encodings, &font_name, bytes);
                        emit_chars(
                            &text, &mut tm, &ctm, font_size, page_rotate, options, &mut chars,
                        );
                    }
                }
            }
            _ => {}
        }
    }

    Ok(chars)
}

/// Append boxes for every visible character of `text`, advancing the text
/// matrix as it goes. Whitespace advances without producing a box.
fn emit_chars(
    text: &str,
    tm: &mut Mat,
    ctm: &Mat,
    font_size: f32,
    page_rotate: i64,
    options: &LayoutOptions,
    out: &mut Vec<CharBox>,
) {
    let advance = font_size * options.char_width_factor;
    for ch in text.chars() {
        if !ch.is_whitespace() {
            let trm = tm.concat(ctm);
            let orientation = classify_orientation(&trm, page_rotate);
            let effective_size = font_size * trm.scale();

            // Character quad in text space: advance wide, ascender above
            // and descender below the baseline.
            let corners = [
                trm.apply(0.0, -0.2 * font_size),
                trm.apply(advance, -0.2 * font_size),
                trm.apply(0.0, 0.8 * font_size),
                trm.apply(advance, 0.8 * font_size),
            ];
            let x0 = corners.iter().map(|p| p.0).fold(f32::INFINITY, f32::min);
            let x1 = corners
                .iter()
                .map(|p| p.0)
                .fold(f32::NEG_INFINITY, f32::max);
            let y0 = corners.iter().map(|p| p.1).fold(f32::INFINITY, f32::min);
            let y1 = corners
                .iter()
                .map(|p| p.1)
                .fold(f32::NEG_INFINITY, f32::max);

            out.push(CharBox {
                text: ch,
                bbox: Rect { x0, y0, x1, y1 },
                orientation,
                font_size: effective_size,
            });
        }
        tm.translate(advance, 0.0);
    }
}

/// Decode a content-stream string with the current font's encoding.
fn decode_string(
    encodings: &HashMap<Vec<u8>, lopdf::Encoding>,
    font_name: &[u8],
    bytes: &[u8],
) -> String {
    if let Some(encoding) = encodings.get(font_name) {
        if let Ok(decoded) = LopdfDocument::decode_text(encoding, bytes) {
            return decoded;
        }
    }
    decode_text_simple(bytes)
}

/// Simple text decoding fallback when no encoding is available.
fn decode_text_simple(bytes: &[u8]) -> String {
    if bytes.len() >= 2 && bytes[0] == 0xFE && bytes[1] == 0xFF {
        let utf16: Vec<u16> = bytes[2..]
            .chunks(2)
            .filter_map(|c| {
                if c.len() == 2 {
                    Some(u16::from_be_bytes([c[0], c[1]]))
                } else {
                    None
                }
            })
            .collect();
        return String::from_utf16(&utf16).unwrap_or_default();
    }

    if let Ok(s) = String::from_utf8(bytes.to_vec()) {
        return s;
    }

    bytes.iter().map(|&b| b as char).collect()
}

/// Group characters into horizontal and vertical runs.
fn build_runs(chars: &[CharBox], tolerance: f32) -> (Vec<TextRun>, Vec<TextRun>) {
    let horizontal: Vec<&CharBox> = chars
        .iter()
        .filter(|c| c.orientation.is_horizontal())
        .collect();
    let vertical: Vec<&CharBox> = chars
        .iter()
        .filter(|c| !c.orientation.is_horizontal())
        .collect();

    let h_runs = cluster_runs(&horizontal, tolerance, RunKind::Horizontal, |c| c.bbox.y0);
    let v_runs = cluster_runs(&vertical, tolerance, RunKind::Vertical, |c| {
        c.bbox.center().0
    });
    (h_runs, v_runs)
}

/// Cluster characters into runs by a shared coordinate within `tolerance`.
fn cluster_runs(
    chars: &[&CharBox],
    tolerance: f32,
    kind: RunKind,
    key: impl Fn(&CharBox) -> f32,
) -> Vec<TextRun> {
    if chars.is_empty() {
        return vec![];
    }

    let mut sorted: Vec<&CharBox> = chars.to_vec();
    sorted.sort_by(|a, b| {
        key(a)
            .partial_cmp(&key(b))
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let mut runs = Vec::new();
    let mut bbox = sorted[0].bbox;
    let mut anchor = key(sorted[0]);
    let mut count = 1usize;

    for c in &sorted[1..] {
        if (key(c) - anchor).abs() <= tolerance {
            bbox = bbox.union(&c.bbox);
            count += 1;
        } else {
            runs.push(TextRun {
                bbox,
                kind,
                char_count: count,
            });
            bbox = c.bbox;
            anchor = key(c);
            count = 1;
        }
    }
    runs.push(TextRun {
        bbox,
        kind,
        char_count: count,
    });
    runs
}
