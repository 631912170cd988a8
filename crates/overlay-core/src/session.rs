//! Editing session
//!
//! Ties the element store, undo history, view state and configuration
//! together behind a pointer-driven API. Pointer-down and pointer-move only
//! touch transient gesture state; pointer-up commits, so the store is never
//! observed half-updated and every committed change is one history entry.

use crate::color::Color;
use crate::config::EditorConfig;
use crate::coords::{Point, Rect, ViewState};
use crate::eraser::hit_test;
use crate::error::OverlayError;
use crate::export::{edited_file_name, ExportJob, ExportOutput, ExportRequest};
use crate::forms::{detect_in, document_has_signatures};
use crate::history::HistoryManager;
use crate::interchange::{annotations_from_json, annotations_to_json};
use crate::model::{
    Annotation, AnnotationKind, Element, ElementId, ElementPatch, SignatureContent, TextElement,
};
use crate::ocr::{confident_results, OcrResult};
use crate::page_info::{page_geometries, PageGeometry};
use crate::render::{render_elements, RenderReport, Surface};
use crate::store::ElementStore;
use lopdf::Document;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info};

/// Size given to click-placed marks and images, in document units
const MARK_SIZE: f64 = 20.0;
const IMAGE_SIZE: (f64, f64) = (150.0, 50.0);
/// Drags shorter than this count as clicks
const CLICK_SLOP: f64 = 3.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Tool {
    #[default]
    Select,
    Text,
    Rectangle,
    Circle,
    Line,
    Highlight,
    Freeform,
    Signature,
    Checkmark,
    XMark,
    Image,
    Eraser,
}

#[derive(Debug, Clone, PartialEq)]
enum Gesture {
    Idle,
    /// Freehand stroke, document space
    Path { page: u32, points: Vec<Point> },
    /// Box spanned by a drag from `start`
    Shape { page: u32, tool: Tool, start: Point, current: Point },
    /// Moving an existing element
    Drag { id: ElementId, start: Point, current: Point },
    /// Eraser held down; counts elements removed so far
    Erase { page: u32, removed: usize },
}

#[derive(Debug)]
pub struct EditorSession {
    config: EditorConfig,
    store: ElementStore,
    history: HistoryManager,
    view: ViewState,
    pages: BTreeMap<u32, PageGeometry>,
    base: Option<Arc<[u8]>>,
    signed: bool,
    tool: Tool,
    color: Color,
    stroke_width: f64,
    gesture: Gesture,
    selected: Option<ElementId>,
    pending_image: Option<String>,
    export_in_flight: bool,
}

impl EditorSession {
    pub fn new(config: EditorConfig) -> Self {
        let history = HistoryManager::default().with_limit(config.history_limit);
        Self {
            color: config.default_color,
            stroke_width: config.default_stroke_width,
            config,
            store: ElementStore::new(),
            history,
            view: ViewState::default(),
            pages: BTreeMap::new(),
            base: None,
            signed: false,
            tool: Tool::Select,
            gesture: Gesture::Idle,
            selected: None,
            pending_image: None,
            export_in_flight: false,
        }
    }

    /// Start editing a document. Existing elements and history are dropped
    /// and the document's form fields are bound.
    pub fn load_document(&mut self, bytes: Vec<u8>) -> Result<Vec<PageGeometry>, OverlayError> {
        let doc = Document::load_mem(&bytes).map_err(|e| OverlayError::Parse(e.to_string()))?;
        self.pages = page_geometries(&doc);
        self.signed = document_has_signatures(&doc);

        self.store = ElementStore::new();
        let mut by_page: BTreeMap<u32, Vec<_>> = BTreeMap::new();
        for field in detect_in(&doc) {
            by_page.entry(field.page).or_default().push(field.into());
        }
        for (page, fields) in by_page {
            self.store.bind_form_fields(page, fields);
        }

        self.history = HistoryManager::new(self.store.snapshot()).with_limit(self.config.history_limit);
        self.gesture = Gesture::Idle;
        self.selected = None;
        self.base = Some(Arc::from(bytes));
        info!(
            pages = self.pages.len(),
            fields = self.store.form_fields().len(),
            signed = self.signed,
            "document loaded"
        );
        self.set_page(1)?;
        Ok(self.pages.values().copied().collect())
    }

    pub fn config(&self) -> &EditorConfig {
        &self.config
    }

    pub fn store(&self) -> &ElementStore {
        &self.store
    }

    pub fn view(&self) -> &ViewState {
        &self.view
    }

    pub fn is_signed(&self) -> bool {
        self.signed
    }

    pub fn page_count(&self) -> u32 {
        self.pages.len() as u32
    }

    pub fn set_page(&mut self, page: u32) -> Result<(), OverlayError> {
        let geometry = self
            .pages
            .get(&page)
            .ok_or_else(|| OverlayError::NotFound(format!("page {}", page)))?;
        let (width, height) = geometry.display_size();
        self.view.page = page;
        self.view.page_width = width;
        self.view.page_height = height;
        self.gesture = Gesture::Idle;
        self.selected = None;
        Ok(())
    }

    pub fn set_zoom(&mut self, zoom: f64) -> Result<(), OverlayError> {
        if !zoom.is_finite() || zoom <= 0.0 {
            return Err(OverlayError::Validation(format!("zoom must be positive, got {}", zoom)));
        }
        self.view.zoom = zoom;
        Ok(())
    }

    pub fn set_tool(&mut self, tool: Tool) {
        self.tool = tool;
        self.gesture = Gesture::Idle;
        if tool != Tool::Select {
            self.selected = None;
        }
    }

    pub fn tool(&self) -> Tool {
        self.tool
    }

    pub fn set_color(&mut self, color: Color) {
        self.color = color;
    }

    pub fn set_stroke_width(&mut self, width: f64) -> Result<(), OverlayError> {
        if !width.is_finite() || width < 0.0 {
            return Err(OverlayError::Validation(format!(
                "stroke width must be non-negative, got {}",
                width
            )));
        }
        self.stroke_width = width;
        Ok(())
    }

    /// Image used by the next signature or image placement
    pub fn set_pending_image(&mut self, src: Option<String>) {
        self.pending_image = src.filter(|s| !s.is_empty());
    }

    pub fn selected(&self) -> Option<ElementId> {
        self.selected
    }

    pub fn select(&mut self, id: Option<ElementId>) -> Result<(), OverlayError> {
        if let Some(id) = id {
            if self.store.get(id).is_none() {
                return Err(OverlayError::NotFound(format!("element {}", id)));
            }
        }
        self.selected = id;
        Ok(())
    }

    pub fn pointer_down(&mut self, view_point: Point) {
        let point = self.view.to_document(view_point);
        let page = self.view.page;
        self.gesture = match self.tool {
            Tool::Select => match self.topmost_at(point) {
                Some(id) => {
                    self.selected = Some(id);
                    Gesture::Drag {
                        id,
                        start: point,
                        current: point,
                    }
                }
                None => {
                    self.selected = None;
                    Gesture::Idle
                }
            },
            Tool::Freeform => Gesture::Path {
                page,
                points: vec![point],
            },
            Tool::Signature if self.pending_image.is_none() => Gesture::Path {
                page,
                points: vec![point],
            },
            Tool::Eraser => {
                let removed = self.erase_uncommitted(point, page);
                Gesture::Erase { page, removed }
            }
            tool => Gesture::Shape {
                page,
                tool,
                start: point,
                current: point,
            },
        };
    }

    pub fn pointer_move(&mut self, view_point: Point) {
        let point = self.view.to_document(view_point);
        match &mut self.gesture {
            Gesture::Idle => {}
            Gesture::Path { points, .. } => points.push(point),
            Gesture::Shape { current, .. } | Gesture::Drag { current, .. } => *current = point,
            Gesture::Erase { page, removed } => {
                let page = *page;
                let before = *removed;
                let now = self.erase_uncommitted(point, page);
                if let Gesture::Erase { removed, .. } = &mut self.gesture {
                    *removed = before + now;
                }
            }
        }
    }

    /// Finish the gesture and commit its result. Returns the id of a newly
    /// created element, if any.
    pub fn pointer_up(&mut self, view_point: Point) -> Result<Option<ElementId>, OverlayError> {
        self.pointer_move(view_point);
        let gesture = std::mem::replace(&mut self.gesture, Gesture::Idle);
        match gesture {
            Gesture::Idle => Ok(None),
            Gesture::Path { page, points } => {
                let Some(rect) = Rect::bounding(&points) else {
                    return Ok(None);
                };
                let kind = if self.tool == Tool::Signature {
                    AnnotationKind::Signature(SignatureContent::Path { points })
                } else {
                    AnnotationKind::Freeform { points }
                };
                self.add_annotation(page, rect, kind).map(Some)
            }
            Gesture::Shape {
                page,
                tool,
                start,
                current,
            } => self.finish_shape(page, tool, start, current),
            Gesture::Drag { id, start, current } => {
                let (dx, dy) = (current.x - start.x, current.y - start.y);
                if dx == 0.0 && dy == 0.0 {
                    return Ok(None);
                }
                let rect = self
                    .store
                    .get(id)
                    .map(Element::rect)
                    .ok_or_else(|| OverlayError::NotFound(format!("element {}", id)))?;
                let moved = Rect::new(rect.x + dx, rect.y + dy, rect.width, rect.height);
                self.update_element(id, &ElementPatch::rect(moved))?;
                Ok(None)
            }
            Gesture::Erase { removed, .. } => {
                if removed > 0 {
                    self.commit();
                }
                Ok(None)
            }
        }
    }

    /// Element being drawn, for live preview
    pub fn preview(&self) -> Option<Element> {
        let (kind, rect, page) = match &self.gesture {
            Gesture::Path { page, points } => {
                let kind = if self.tool == Tool::Signature {
                    AnnotationKind::Signature(SignatureContent::Path {
                        points: points.clone(),
                    })
                } else {
                    AnnotationKind::Freeform {
                        points: points.clone(),
                    }
                };
                (kind, Rect::bounding(points)?, *page)
            }
            Gesture::Shape {
                page,
                tool,
                start,
                current,
            } => {
                let kind = shape_kind(*tool, None)?;
                let rect = if *tool == Tool::Line {
                    Rect::new(start.x, start.y, current.x - start.x, current.y - start.y)
                } else {
                    span(*start, *current)
                };
                (kind, rect, *page)
            }
            _ => return None,
        };
        Some(Element::Annotation(Annotation {
            id: ElementId::MAX,
            page,
            rect,
            color: self.color,
            stroke_width: self.stroke_width,
            kind,
        }))
    }

    /// Draw the current page's elements plus any in-progress gesture
    pub fn render<S: Surface + ?Sized>(&self, surface: &mut S) -> RenderReport {
        let mut options = self.config.render_options(self.view.zoom);
        options.selected = self.selected;
        let preview = self.preview();
        let elements = self
            .store
            .query(self.view.page)
            .into_iter()
            .chain(preview.as_ref());
        render_elements(surface, elements, &options)
    }

    pub fn add_element(&mut self, element: Element) -> Result<ElementId, OverlayError> {
        let id = self.store.add(element)?;
        self.commit();
        Ok(id)
    }

    pub fn update_element(&mut self, id: ElementId, patch: &ElementPatch) -> Result<(), OverlayError> {
        self.store.update(id, patch)?;
        self.commit();
        Ok(())
    }

    /// Remove an element. Unknown ids are a no-op and record no history.
    pub fn delete(&mut self, id: ElementId) -> bool {
        let removed = self.store.remove(id);
        if removed {
            if self.selected == Some(id) {
                self.selected = None;
            }
            self.commit();
        }
        removed
    }

    pub fn delete_selected(&mut self) -> bool {
        match self.selected {
            Some(id) => self.delete(id),
            None => false,
        }
    }

    /// Place text with the default style at a document-space point
    pub fn add_text(&mut self, page: u32, at: Point, text: &str) -> Result<ElementId, OverlayError> {
        let style = self.config.default_text_style();
        let width = crate::fonts::approx_text_width(text, &style.font_family, style.font_size);
        let height = style.font_size * crate::shapes::LINE_HEIGHT * text.lines().count().max(1) as f64;
        self.add_element(Element::Text(TextElement {
            id: 0,
            page,
            rect: Rect::new(at.x, at.y, width, height),
            text: text.to_string(),
            style: crate::model::TextStyle {
                color: self.color,
                ..style
            },
        }))
    }

    /// Turn a recognized OCR box into an editable text element
    pub fn place_ocr_result(&mut self, page: u32, result: &OcrResult) -> Result<ElementId, OverlayError> {
        let element = result.to_text_element(page, self.config.default_text_style());
        self.add_element(Element::Text(element))
    }

    /// Place the results at or above `min_ocr_confidence`, best first, as
    /// one history entry
    pub fn place_ocr_results(&mut self, page: u32, results: &[OcrResult]) -> Result<Vec<ElementId>, OverlayError> {
        let style = self.config.default_text_style();
        let elements: Vec<Element> = confident_results(results, self.config.min_ocr_confidence)
            .into_iter()
            .map(|r| Element::Text(r.to_text_element(page, style.clone())))
            .collect();
        for element in &elements {
            element.validate()?;
        }
        let mut ids = Vec::with_capacity(elements.len());
        for element in elements {
            ids.push(self.store.add(element)?);
        }
        if !ids.is_empty() {
            self.commit();
        }
        debug!(page, placed = ids.len(), offered = results.len(), "placed OCR results");
        Ok(ids)
    }

    /// Remove every element on `page` whose center is within the eraser
    /// radius of `point`, as one history entry
    pub fn erase(&mut self, point: Point, page: u32) -> usize {
        let removed = self.erase_uncommitted(point, page);
        if removed > 0 {
            self.commit();
        }
        removed
    }

    pub fn undo(&mut self) -> bool {
        let Some(snapshot) = self.history.undo().cloned() else {
            return false;
        };
        self.store.restore(&snapshot);
        self.after_restore();
        true
    }

    pub fn redo(&mut self) -> bool {
        let Some(snapshot) = self.history.redo().cloned() else {
            return false;
        };
        self.store.restore(&snapshot);
        self.after_restore();
        true
    }

    pub fn can_undo(&self) -> bool {
        self.history.can_undo()
    }

    pub fn can_redo(&self) -> bool {
        self.history.can_redo()
    }

    pub fn set_form_field_value(&mut self, name: &str, value: &str) -> Result<(), OverlayError> {
        self.store.set_form_field_value(name, value)
    }

    pub fn annotations_json(&self) -> Result<String, OverlayError> {
        annotations_to_json(&self.store.annotations())
    }

    /// Add annotations from interchange JSON as one history entry. Ids in
    /// the file are ignored.
    pub fn import_annotations_json(&mut self, json: &str) -> Result<Vec<ElementId>, OverlayError> {
        let annotations = annotations_from_json(json)?;
        for a in &annotations {
            Element::Annotation(a.clone()).validate()?;
        }
        let mut ids = Vec::with_capacity(annotations.len());
        for a in annotations {
            ids.push(self.store.add(Element::Annotation(a))?);
        }
        if !ids.is_empty() {
            self.commit();
        }
        Ok(ids)
    }

    /// Capture an immutable export request. Fails while another export is
    /// running, when no document is loaded, or when the document is signed.
    pub fn begin_export(&mut self) -> Result<ExportRequest, OverlayError> {
        if self.export_in_flight {
            return Err(OverlayError::ExportInFlight);
        }
        let base = self
            .base
            .clone()
            .ok_or_else(|| OverlayError::NotFound("no document loaded".to_string()))?;
        if self.signed {
            return Err(OverlayError::Validation(
                "document is digitally signed; editing would invalidate the signature".to_string(),
            ));
        }
        self.export_in_flight = true;
        Ok(ExportRequest {
            base,
            text_elements: self.store.text_elements(),
            form_fields: self.store.edited_form_fields(),
            annotations: self.store.annotations(),
        })
    }

    pub fn finish_export(&mut self) {
        self.export_in_flight = false;
    }

    pub fn export_in_flight(&self) -> bool {
        self.export_in_flight
    }

    /// Run a complete export synchronously
    pub fn export(&mut self) -> Result<ExportOutput, OverlayError> {
        let request = self.begin_export()?;
        let result = ExportJob::new(request, self.config.export_options()).run();
        self.finish_export();
        result
    }

    pub fn export_file_name(&self, source_name: &str) -> String {
        edited_file_name(source_name, &self.config.output_suffix)
    }

    fn finish_shape(
        &mut self,
        page: u32,
        tool: Tool,
        start: Point,
        end: Point,
    ) -> Result<Option<ElementId>, OverlayError> {
        let is_click = start.distance_to(end) < CLICK_SLOP;
        match tool {
            Tool::Text => {
                // Empty text box; the caller fills it in with an update
                self.add_text(page, start, "").map(Some)
            }
            Tool::Checkmark | Tool::XMark | Tool::Image | Tool::Signature => {
                let rect = if is_click {
                    let (w, h) = if matches!(tool, Tool::Checkmark | Tool::XMark) {
                        (MARK_SIZE, MARK_SIZE)
                    } else {
                        IMAGE_SIZE
                    };
                    Rect::new(start.x - w / 2.0, start.y - h / 2.0, w, h)
                } else {
                    span(start, end)
                };
                let Some(kind) = shape_kind(tool, self.pending_image.clone()) else {
                    debug!(?tool, "no image selected for placement");
                    return Ok(None);
                };
                self.add_annotation(page, rect, kind).map(Some)
            }
            _ if is_click => Ok(None),
            Tool::Line => {
                let rect = Rect::new(start.x, start.y, end.x - start.x, end.y - start.y);
                self.add_annotation(page, rect, AnnotationKind::Line).map(Some)
            }
            _ => match shape_kind(tool, None) {
                Some(kind) => self.add_annotation(page, span(start, end), kind).map(Some),
                None => Ok(None),
            },
        }
    }

    fn add_annotation(&mut self, page: u32, rect: Rect, kind: AnnotationKind) -> Result<ElementId, OverlayError> {
        let id = self.add_element(Element::Annotation(Annotation {
            id: 0,
            page,
            rect,
            color: self.color,
            stroke_width: self.stroke_width,
            kind,
        }))?;
        if matches!(self.tool, Tool::Image | Tool::Signature) {
            self.pending_image = None;
        }
        Ok(id)
    }

    fn erase_uncommitted(&mut self, point: Point, page: u32) -> usize {
        let hits = hit_test(self.store.elements(), point, self.config.eraser_radius, page);
        if hits.is_empty() {
            return 0;
        }
        if self.selected.is_some_and(|id| hits.contains(&id)) {
            self.selected = None;
        }
        self.store.remove_many(&hits)
    }

    /// Topmost element on the current page under `point`
    fn topmost_at(&self, point: Point) -> Option<ElementId> {
        self.store
            .query(self.view.page)
            .into_iter()
            .rev()
            .find(|el| contains(&el.rect(), point))
            .map(Element::id)
    }

    fn commit(&mut self) {
        self.history.commit(self.store.snapshot());
    }

    fn after_restore(&mut self) {
        self.gesture = Gesture::Idle;
        if self.selected.is_some_and(|id| self.store.get(id).is_none()) {
            self.selected = None;
        }
    }
}

/// Annotation kind created by a box-spanning tool
fn shape_kind(tool: Tool, image: Option<String>) -> Option<AnnotationKind> {
    Some(match tool {
        Tool::Rectangle => AnnotationKind::Rectangle,
        Tool::Circle => AnnotationKind::Circle,
        Tool::Line => AnnotationKind::Line,
        Tool::Highlight => AnnotationKind::Highlight,
        Tool::Checkmark => AnnotationKind::Checkmark,
        Tool::XMark => AnnotationKind::XMark,
        Tool::Image => AnnotationKind::Image { src: image? },
        Tool::Signature => AnnotationKind::Signature(SignatureContent::Image { src: image? }),
        Tool::Select | Tool::Text | Tool::Freeform | Tool::Eraser => return None,
    })
}

/// Normalized box between two corners
fn span(a: Point, b: Point) -> Rect {
    Rect::new(a.x.min(b.x), a.y.min(b.y), (a.x - b.x).abs(), (a.y - b.y).abs())
}

fn contains(rect: &Rect, p: Point) -> bool {
    let (x0, x1) = (rect.x.min(rect.x + rect.width), rect.x.max(rect.x + rect.width));
    let (y0, y1) = (rect.y.min(rect.y + rect.height), rect.y.max(rect.y + rect.height));
    (x0..=x1).contains(&p.x) && (y0..=y1).contains(&p.y)
}
