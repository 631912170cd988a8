//! Stage 2: form values, then flattening
//!
//! All values are applied first. Flattening runs once afterwards, and only
//! when at least one value landed; otherwise the stage is a passthrough.

use super::content::{FontCache, PageCanvas};
use super::{load, page_table, save, ExportOptions, ExportReport, ExportStage};
use crate::color::Color;
use crate::coords::{Point, Rect};
use crate::error::OverlayError;
use crate::forms::{
    apply_value, da_font_size, document_rect, set_need_appearances, widgets_by_page, AppliedValue,
    FieldKind, FieldNode, FieldTree, Widget,
};
use crate::model::FormField;
use crate::page_info::{parse_box, resolve};
use crate::shapes::{checkmark_points, Drawing, Primitive, TextRun};
use lopdf::{Document, Object, ObjectId};
use std::collections::{HashMap, HashSet};
use tracing::{debug, info};

/// Padding between a widget's edge and its flattened text
const TEXT_PADDING: f64 = 2.0;
const DEFAULT_FIELD_FONT_SIZE: f64 = 12.0;

pub(super) fn apply_form_values(
    input: Vec<u8>,
    fields: &[FormField],
    options: &ExportOptions,
    report: &mut ExportReport,
) -> Result<Vec<u8>, OverlayError> {
    if fields.is_empty() {
        return Ok(input);
    }

    let mut doc = load(&input)?;
    let tree = FieldTree::read(&doc);
    let mut applied: HashMap<String, AppliedValue> = HashMap::new();

    for field in fields {
        match apply_value(&mut doc, &tree, field) {
            Ok(value) => {
                applied.insert(field.name.clone(), value);
            }
            Err(e) if e.is_fatal() => return Err(e),
            Err(e) => report.skip(ExportStage::Forms, field.name.clone(), &e),
        }
    }

    if applied.is_empty() {
        return Ok(input);
    }
    report.fields_applied += applied.len();

    if options.flatten_forms {
        flatten(&mut doc, &tree, &applied)?;
        report.forms_flattened = true;
    } else {
        set_need_appearances(&mut doc);
    }
    save(&mut doc)
}

/// Replace every widget with static content and drop the form
fn flatten(
    doc: &mut Document,
    tree: &FieldTree,
    applied: &HashMap<String, AppliedValue>,
) -> Result<(), OverlayError> {
    let pages = page_table(doc);
    let mut fonts = FontCache::default();

    for (page, widgets) in widgets_by_page(tree) {
        let Some((page_id, geometry)) = pages.get(&page) else {
            continue;
        };
        let mut canvas = PageCanvas::new(doc, *page_id, *geometry);
        let mut removed = HashSet::new();

        for (node, widget) in widgets {
            removed.insert(widget.id);
            if widget.hidden {
                continue;
            }
            let Some(pdf_rect) = widget.rect else {
                continue;
            };
            let rect = document_rect(canvas.geometry(), pdf_rect);
            let ops = match applied.get(&node.name) {
                Some(value) => value_ops(doc, &mut canvas, &mut fonts, node, widget, value, &rect)?,
                None => match appearance_stream(doc, widget.id) {
                    Some((form_id, bbox)) => canvas.form_xobject_ops(form_id, bbox, pdf_rect),
                    None => Vec::new(),
                },
            };
            canvas.push_element(ops);
        }

        canvas.commit(doc)?;
        remove_annotations(doc, *page_id, &removed);
        debug!(page, widgets = removed.len(), "flattened page");
    }

    if let Ok(catalog) = doc.catalog_mut() {
        catalog.remove(b"AcroForm");
    }
    info!(fields = tree.fields.len(), "form flattened");
    Ok(())
}

fn value_ops(
    doc: &mut Document,
    canvas: &mut PageCanvas,
    fonts: &mut FontCache,
    node: &FieldNode,
    widget: &Widget,
    value: &AppliedValue,
    rect: &Rect,
) -> Result<Vec<lopdf::content::Operation>, OverlayError> {
    match value {
        AppliedValue::Text(text) => {
            if text.is_empty() {
                return Ok(Vec::new());
            }
            let size = node
                .da
                .as_deref()
                .and_then(da_font_size)
                .unwrap_or_else(|| DEFAULT_FIELD_FONT_SIZE.min(rect.height * 0.7));
            // Vertically centered, never closer than the padding to the bottom
            let gap = ((rect.height - size) / 2.0).max(TEXT_PADDING);
            let run = TextRun {
                text: text.replace(['\r', '\n'], " "),
                origin: Point::new(rect.x + TEXT_PADDING, rect.y + rect.height - gap),
                font_family: "Helvetica".to_string(),
                font_size: size,
                bold: false,
                italic: false,
                underline: false,
            };
            Ok(canvas.text_ops(doc, fonts, &run, Color::BLACK, 1.0))
        }
        AppliedValue::Buttons(on) if on.contains(&widget.id) => {
            if node.kind == FieldKind::Radio {
                let dot = rect.inset(rect.width.min(rect.height) * 0.25);
                return Ok(canvas.fill_ellipse_ops(&dot, Color::BLACK));
            }
            let drawing = Drawing {
                color: Color::BLACK,
                stroke_width: (rect.height / 10.0).max(1.0),
                primitives: vec![Primitive::Polyline(checkmark_points(rect))],
            };
            canvas.drawing_ops(doc, fonts, &drawing)
        }
        AppliedValue::Buttons(_) => Ok(Vec::new()),
    }
}

/// The widget's normal appearance stream and its bounding box. Appearance
/// dictionaries keyed by state are resolved through `/AS`.
fn appearance_stream(doc: &Document, widget_id: ObjectId) -> Option<(ObjectId, [f64; 4])> {
    let widget = doc.get_dictionary(widget_id).ok()?;
    let ap = resolve(doc, widget.get(b"AP").ok()?).as_dict().ok()?;
    let normal = ap.get(b"N").ok()?;

    let stream_ref = match normal {
        Object::Reference(id) => match doc.get_object(*id).ok()? {
            Object::Stream(_) => *id,
            Object::Dictionary(states) => state_stream(widget, states)?,
            _ => return None,
        },
        Object::Dictionary(states) => state_stream(widget, states)?,
        _ => return None,
    };

    let stream = doc.get_object(stream_ref).ok()?.as_stream().ok()?;
    let bbox = stream
        .dict
        .get(b"BBox")
        .ok()
        .and_then(|obj| parse_box(doc, resolve(doc, obj)))?;
    Some((stream_ref, bbox))
}

fn state_stream(widget: &lopdf::Dictionary, states: &lopdf::Dictionary) -> Option<ObjectId> {
    let state = widget.get(b"AS").and_then(Object::as_name).ok()?;
    states.get(state).and_then(Object::as_reference).ok()
}

fn remove_annotations(doc: &mut Document, page_id: ObjectId, removed: &HashSet<ObjectId>) {
    let keep = |annot: &Object| match annot {
        Object::Reference(id) => !removed.contains(id),
        _ => true,
    };

    let annots = match doc.get_dictionary(page_id).and_then(|page| page.get(b"Annots")) {
        Ok(obj) => obj.clone(),
        Err(_) => return,
    };
    match annots {
        Object::Reference(array_id) => {
            if let Ok(Object::Array(items)) = doc.get_object_mut(array_id) {
                items.retain(keep);
            }
        }
        Object::Array(mut items) => {
            items.retain(keep);
            if let Ok(page) = doc.get_dictionary_mut(page_id) {
                if items.is_empty() {
                    page.remove(b"Annots");
                } else {
                    page.set("Annots", Object::Array(items));
                }
            }
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::forms::detect_in;
    use crate::forms::fixtures::form_bytes;
    use crate::model::FormFieldType;

    fn field(name: &str, field_type: FormFieldType, value: &str) -> FormField {
        FormField {
            name: name.to_string(),
            field_type,
            value: value.to_string(),
            rect: Rect::default(),
            page: 1,
            options: Vec::new(),
        }
    }

    #[test]
    fn test_flatten_removes_form_and_widgets() {
        let mut report = ExportReport::default();
        let out = apply_form_values(
            form_bytes(),
            &[field("name", FormFieldType::Text, "Ada")],
            &ExportOptions::default(),
            &mut report,
        )
        .unwrap();

        assert_eq!(report.fields_applied, 1);
        assert!(report.forms_flattened);

        let doc = load(&out).unwrap();
        assert!(doc.catalog().unwrap().get(b"AcroForm").is_err());
        let page_id = doc.get_pages()[&1];
        assert!(doc.get_dictionary(page_id).unwrap().get(b"Annots").is_err());
        assert!(detect_in(&doc).is_empty());

        let content = doc.get_page_content(page_id).unwrap();
        let text = String::from_utf8_lossy(&content);
        assert!(text.contains("(Ada) Tj"));
        // Untouched checkbox keeps its drawn appearance
        assert!(text.contains(" Do"));
    }

    #[test]
    fn test_unknown_fields_only_is_passthrough() {
        let base = form_bytes();
        let mut report = ExportReport::default();
        let out = apply_form_values(
            base.clone(),
            &[field("nope", FormFieldType::Text, "x")],
            &ExportOptions::default(),
            &mut report,
        )
        .unwrap();
        assert_eq!(out, base);
        assert_eq!(report.skipped.len(), 1);
        assert!(!report.forms_flattened);
    }

    #[test]
    fn test_without_flatten_keeps_fields() {
        let options = ExportOptions {
            flatten_forms: false,
            ..ExportOptions::default()
        };
        let mut report = ExportReport::default();
        let out = apply_form_values(
            form_bytes(),
            &[field("name", FormFieldType::Text, "Grace")],
            &options,
            &mut report,
        )
        .unwrap();

        let doc = load(&out).unwrap();
        let detected = detect_in(&doc);
        let name = detected.iter().find(|f| f.name == "name").unwrap();
        assert_eq!(name.value, "Grace");
    }
}
