//! Stage 3: annotations drawn as static page content
//!
//! Runs last so annotations sit above both the embedded text and any
//! flattened form values.

use super::content::{FontCache, PageCanvas};
use super::{load, missing_page, page_table, save, ExportOptions, ExportReport, ExportStage};
use crate::error::OverlayError;
use crate::model::{Annotation, Element};
use crate::page_info::PageGeometry;
use crate::shapes::annotation_drawing;
use lopdf::{Document, ObjectId};
use std::collections::BTreeMap;
use tracing::debug;

pub(super) fn draw_annotations(
    input: Vec<u8>,
    annotations: &[Annotation],
    options: &ExportOptions,
    report: &mut ExportReport,
) -> Result<Vec<u8>, OverlayError> {
    if annotations.is_empty() {
        return Ok(input);
    }

    let mut doc = load(&input)?;
    let pages = page_table(&doc);
    let mut fonts = FontCache::default();
    let mut canvases: BTreeMap<u32, PageCanvas> = BTreeMap::new();
    let mut drawn = 0;

    for annotation in annotations {
        match draw_one(&mut doc, &pages, &mut fonts, &mut canvases, annotation, options) {
            Ok(()) => drawn += 1,
            Err(e) if e.is_fatal() => return Err(e),
            Err(e) => report.skip(ExportStage::Annotations, annotation.id.to_string(), &e),
        }
    }

    report.annotations_drawn += drawn;
    if canvases.values().all(PageCanvas::is_empty) {
        return Ok(input);
    }
    for canvas in canvases.into_values() {
        canvas.commit(&mut doc)?;
    }
    debug!(drawn, "annotation stage complete");
    save(&mut doc)
}

fn draw_one(
    doc: &mut Document,
    pages: &BTreeMap<u32, (ObjectId, PageGeometry)>,
    fonts: &mut FontCache,
    canvases: &mut BTreeMap<u32, PageCanvas>,
    annotation: &Annotation,
    options: &ExportOptions,
) -> Result<(), OverlayError> {
    Element::Annotation(annotation.clone()).validate()?;
    let (page_id, geometry) = pages
        .get(&annotation.page)
        .ok_or_else(|| missing_page(annotation.id, annotation.page))?;
    let canvas = canvases
        .entry(annotation.page)
        .or_insert_with(|| PageCanvas::new(doc, *page_id, *geometry));
    let drawing = annotation_drawing(annotation, options.highlight_opacity);
    // Images decode before any operator is kept, so a bad blob leaves no trace
    let ops = canvas.drawing_ops(doc, fonts, &drawing)?;
    canvas.push_element(ops);
    Ok(())
}
