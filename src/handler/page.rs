//! Single-page extraction and rotation normalization.
//!
//! Each selected page is written to the working directory as a standalone
//! one-page PDF named `page-{n}.pdf`. When the page's text reads
//! predominantly sideways, the file is corrected in place by adjusting its
//! `/Rotate` entry, staged through a `p-{n}_rotated.pdf` rename so the
//! stable name always refers to a display-upright page.

use std::fs;
use std::path::{Path, PathBuf};

use log::{debug, info};
use lopdf::{Document as LopdfDocument, Object};

use crate::error::{Error, Result};
use crate::layout::{get_page_layout, page_rotation, LayoutOptions, Rotation};
use crate::source::DocumentSource;

/// Extract page `page` into `dir` and normalize its rotation.
///
/// Returns the path of the upright one-page file.
pub(crate) fn save_page(
    source: &DocumentSource,
    password: Option<&str>,
    page: u32,
    dir: &Path,
    layout_options: &LayoutOptions,
) -> Result<PathBuf> {
    let mut doc = source.load()?;
    decrypt_if_needed(&mut doc, password)?;

    let total = doc.get_pages().len() as u32;
    if page > total {
        return Err(Error::PageNotFound(page, total));
    }

    let others: Vec<u32> = (1..=total).filter(|&p| p != page).collect();
    if !others.is_empty() {
        doc.delete_pages(&others);
    }
    doc.prune_objects();
    doc.renumber_objects();

    let path = dir.join(format!("page-{page}.pdf"));
    doc.save(&path)?;
    debug!("extracted page {} to {}", page, path.display());

    let (layout, _) = get_page_layout(&path, layout_options)?;
    let rotation = layout.detect_rotation();
    if rotation != Rotation::None {
        info!("page {}: correcting {:?} rotation", page, rotation);
        normalize_rotation(&path, page, dir, rotation)?;
    }

    Ok(path)
}

fn decrypt_if_needed(doc: &mut LopdfDocument, password: Option<&str>) -> Result<()> {
    if doc.is_encrypted() {
        doc.decrypt(password.unwrap_or(""))?;
        doc.trailer.remove(b"Encrypt");
    }
    Ok(())
}

/// Rewrite the page file with a corrected `/Rotate` entry.
///
/// The original is first renamed to `p-{n}_rotated.pdf` and re-read from
/// there, so a crash mid-rewrite never leaves a half-written file under
/// the stable `page-{n}.pdf` name.
fn normalize_rotation(path: &Path, page: u32, dir: &Path, rotation: Rotation) -> Result<()> {
    let staged = dir.join(format!("p-{page}_rotated.pdf"));
    fs::rename(path, &staged)?;

    let mut doc = LopdfDocument::load(&staged)?;
    let page_id = *doc
        .get_pages()
        .values()
        .next()
        .ok_or_else(|| Error::Pdf("page file has no pages".to_string()))?;

    let current = page_rotation(&doc, page_id);
    let delta = match rotation {
        // Anticlockwise text needs the viewer to rotate further clockwise.
        Rotation::Anticlockwise => 90,
        Rotation::Clockwise => -90,
        Rotation::None => 0,
    };
    let corrected = (current + delta).rem_euclid(360);

    doc.get_object_mut(page_id)?
        .as_dict_mut()?
        .set("Rotate", Object::Integer(corrected));
    doc.save(path)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use lopdf::content::{Content, Operation};
    use lopdf::{dictionary, Stream};

    /// Build an n-page document where page `i` (1-based) shows the text
    /// `marker{i}` and carries the given `/Rotate` value.
    fn build_pdf(pages: u32, rotate: i64) -> LopdfDocument {
        let mut doc = LopdfDocument::with_version("1.5");
        let pages_id = doc.new_object_id();
        let font_id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Helvetica",
        });
        let resources_id = doc.add_object(dictionary! {
            "Font" => dictionary! { "F1" => font_id },
        });

        let mut kids = Vec::new();
        for i in 1..=pages {
            let content = Content {
                operations: vec![
                    Operation::new("BT", vec![]),
                    Operation::new("Tf", vec!["F1".into(), 12.into()]),
                    Operation::new(
                        "Tm",
                        vec![
                            1.into(),
                            0.into(),
                            0.into(),
                            1.into(),
                            100.into(),
                            700.into(),
                        ],
                    ),
                    Operation::new("Tj", vec![Object::string_literal(format!("marker{i}"))]),
                    Operation::new("ET", vec![]),
                ],
            };
            let content_id = doc.add_object(Stream::new(
                dictionary! {},
                content.encode().unwrap(),
            ));
            let page_id = doc.add_object(dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
                "Contents" => content_id,
                "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
                "Rotate" => rotate,
            });
            kids.push(page_id.into());
        }

        let kids_len = kids.len() as i64;
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => kids,
                "Count" => kids_len,
                "Resources" => resources_id,
            }),
        );
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);
        doc
    }

    fn source_for(doc: &mut LopdfDocument, dir: &Path) -> DocumentSource {
        let input = dir.join("input.pdf");
        doc.save(&input).unwrap();
        DocumentSource::from_path(&input).unwrap()
    }

    #[test]
    fn test_save_page_extracts_one_page() {
        let dir = tempfile::tempdir().unwrap();
        let mut doc = build_pdf(3, 0);
        let source = source_for(&mut doc, dir.path());

        let path = save_page(&source, None, 2, dir.path(), &LayoutOptions::default()).unwrap();
        assert_eq!(path.file_name().unwrap(), "page-2.pdf");

        let extracted = LopdfDocument::load(&path).unwrap();
        assert_eq!(extracted.get_pages().len(), 1);

        let (layout, _) = get_page_layout(&path, &LayoutOptions::default()).unwrap();
        let text: String = layout.chars.iter().map(|c| c.text).collect();
        assert_eq!(text, "marker2");
    }

    #[test]
    fn test_save_page_out_of_range() {
        let dir = tempfile::tempdir().unwrap();
        let mut doc = build_pdf(2, 0);
        let source = source_for(&mut doc, dir.path());

        let result = save_page(&source, None, 7, dir.path(), &LayoutOptions::default());
        assert!(matches!(result, Err(Error::PageNotFound(7, 2))));
    }

    #[test]
    fn test_rotated_page_is_normalized() {
        let dir = tempfile::tempdir().unwrap();
        // Text drawn upright but the viewer rotates the page 90 degrees
        // clockwise, so it displays sideways.
        let mut doc = build_pdf(1, 90);
        let source = source_for(&mut doc, dir.path());

        let path = save_page(&source, None, 1, dir.path(), &LayoutOptions::default()).unwrap();
        assert!(dir.path().join("p-1_rotated.pdf").exists());

        let fixed = LopdfDocument::load(&path).unwrap();
        let page_id = *fixed.get_pages().values().next().unwrap();
        assert_eq!(page_rotation(&fixed, page_id), 0);

        // Re-analyzing the corrected page must not request another turn.
        let (layout, _) = get_page_layout(&path, &LayoutOptions::default()).unwrap();
        assert_eq!(layout.detect_rotation(), Rotation::None);
    }

    #[test]
    fn test_upright_page_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let mut doc = build_pdf(1, 0);
        let source = source_for(&mut doc, dir.path());

        save_page(&source, None, 1, dir.path(), &LayoutOptions::default()).unwrap();
        assert!(!dir.path().join("p-1_rotated.pdf").exists());
    }
}
