//! Stage 1: text elements as native text runs

use super::content::{FontCache, PageCanvas};
use super::{load, missing_page, page_table, save, ExportReport, ExportStage};
use crate::error::OverlayError;
use crate::model::{Element, TextElement};
use crate::page_info::PageGeometry;
use crate::shapes::text_element_drawing;
use lopdf::{Document, ObjectId};
use std::collections::BTreeMap;
use tracing::debug;

pub(super) fn embed_text(
    input: Vec<u8>,
    elements: &[TextElement],
    report: &mut ExportReport,
) -> Result<Vec<u8>, OverlayError> {
    if elements.is_empty() {
        return Ok(input);
    }

    let mut doc = load(&input)?;
    let pages = page_table(&doc);
    let mut fonts = FontCache::default();
    let mut canvases: BTreeMap<u32, PageCanvas> = BTreeMap::new();
    let mut embedded = 0;

    for element in elements {
        match embed_one(&mut doc, &pages, &mut fonts, &mut canvases, element) {
            Ok(()) => embedded += 1,
            Err(e) if e.is_fatal() => return Err(e),
            Err(e) => report.skip(ExportStage::Text, element.id.to_string(), &e),
        }
    }

    report.text_embedded += embedded;
    if canvases.values().all(PageCanvas::is_empty) {
        return Ok(input);
    }
    for canvas in canvases.into_values() {
        canvas.commit(&mut doc)?;
    }
    debug!(embedded, "text stage complete");
    save(&mut doc)
}

fn embed_one(
    doc: &mut Document,
    pages: &BTreeMap<u32, (ObjectId, PageGeometry)>,
    fonts: &mut FontCache,
    canvases: &mut BTreeMap<u32, PageCanvas>,
    element: &TextElement,
) -> Result<(), OverlayError> {
    Element::Text(element.clone()).validate()?;
    let (page_id, geometry) = pages
        .get(&element.page)
        .ok_or_else(|| missing_page(element.id, element.page))?;
    let canvas = canvases
        .entry(element.page)
        .or_insert_with(|| PageCanvas::new(doc, *page_id, *geometry));
    let ops = canvas.drawing_ops(doc, fonts, &text_element_drawing(element))?;
    canvas.push_element(ops);
    Ok(())
}
