//! Edit session exposed to JavaScript
//!
//! Wraps an [`EditorSession`] so the page only forwards DOM events and draws
//! into its canvas. All editing state lives in Rust.

use crate::canvas::{CanvasSurface, ImageCache};
use js_sys::{Promise, Uint8Array};
use overlay_core::{
    CancellationToken, Color, EditorConfig, EditorSession, ExportJob, OcrResult, OverlayError,
    PageGeometry, Point, Tool,
};
use std::cell::RefCell;
use std::rc::Rc;
use wasm_bindgen::prelude::*;
use wasm_bindgen_futures::{future_to_promise, JsFuture};
use web_sys::{CanvasRenderingContext2d, HtmlImageElement};

fn to_js(err: OverlayError) -> JsValue {
    JsValue::from_str(&err.to_string())
}

fn to_js_value<T: serde::Serialize>(value: &T) -> Result<JsValue, JsValue> {
    serde_wasm_bindgen::to_value(value)
        .map_err(|e| JsValue::from_str(&format!("Serialization error: {}", e)))
}

/// Parse a kebab-case tool name as sent by the toolbar
pub(crate) fn parse_tool(name: &str) -> Result<Tool, String> {
    serde_json::from_value(serde_json::Value::String(name.to_string()))
        .map_err(|_| format!("Unknown tool: {}", name))
}

pub(crate) fn load_config(config_toml: Option<&str>) -> Result<EditorConfig, String> {
    match config_toml {
        Some(toml) if !toml.trim().is_empty() => {
            EditorConfig::from_str(toml).map_err(|e| format!("Invalid config: {:#}", e))
        }
        _ => Ok(EditorConfig::default()),
    }
}

/// Resolve after the browser has had a chance to run pending tasks
async fn yield_to_event_loop() -> Result<(), JsValue> {
    let window = web_sys::window().ok_or_else(|| JsValue::from_str("No window"))?;
    let mut schedule_error = None;
    let promise = Promise::new(&mut |resolve, _reject| {
        if let Err(e) = window.set_timeout_with_callback_and_timeout_and_arguments_0(&resolve, 0) {
            schedule_error = Some(e);
        }
    });
    if let Some(e) = schedule_error {
        return Err(e);
    }
    JsFuture::from(promise).await.map(|_| ())
}

/// Session for overlay editing of a single PDF
#[wasm_bindgen]
pub struct EditSession {
    inner: Rc<RefCell<EditorSession>>,
    document_name: String,
    pages: Vec<PageGeometry>,
    images: ImageCache,
    cancel: Rc<RefCell<Option<CancellationToken>>>,
}

#[wasm_bindgen]
impl EditSession {
    /// Open `bytes` for editing. `config_toml` overrides editor defaults.
    #[wasm_bindgen(constructor)]
    pub fn new(name: &str, bytes: &[u8], config_toml: Option<String>) -> Result<EditSession, JsValue> {
        let config = load_config(config_toml.as_deref()).map_err(|e| JsValue::from_str(&e))?;
        let mut session = EditorSession::new(config);
        let pages = session.load_document(bytes.to_vec()).map_err(to_js)?;

        Ok(EditSession {
            inner: Rc::new(RefCell::new(session)),
            document_name: name.to_string(),
            pages,
            images: ImageCache::default(),
            cancel: Rc::new(RefCell::new(None)),
        })
    }

    /// Whether the document carries a digital signature. Signed documents
    /// can be viewed but not exported.
    #[wasm_bindgen(getter, js_name = isSigned)]
    pub fn is_signed(&self) -> bool {
        self.inner.borrow().is_signed()
    }

    #[wasm_bindgen(getter, js_name = pageCount)]
    pub fn page_count(&self) -> u32 {
        self.inner.borrow().page_count()
    }

    #[wasm_bindgen(getter, js_name = documentName)]
    pub fn document_name(&self) -> String {
        self.document_name.clone()
    }

    #[wasm_bindgen(getter, js_name = currentPage)]
    pub fn current_page(&self) -> u32 {
        self.inner.borrow().view().page
    }

    #[wasm_bindgen(getter)]
    pub fn zoom(&self) -> f64 {
        self.inner.borrow().view().zoom
    }

    /// Canvas size in CSS pixels for the current page and zoom
    #[wasm_bindgen(js_name = viewSize)]
    pub fn view_size(&self) -> Vec<f64> {
        let (width, height) = self.inner.borrow().view().view_size();
        vec![width, height]
    }

    #[wasm_bindgen(js_name = getPageGeometries)]
    pub fn page_geometries(&self) -> Result<JsValue, JsValue> {
        to_js_value(&self.pages)
    }

    #[wasm_bindgen(js_name = setPage)]
    pub fn set_page(&mut self, page: u32) -> Result<(), JsValue> {
        self.inner.borrow_mut().set_page(page).map_err(to_js)
    }

    #[wasm_bindgen(js_name = setZoom)]
    pub fn set_zoom(&mut self, zoom: f64) -> Result<(), JsValue> {
        self.inner.borrow_mut().set_zoom(zoom).map_err(to_js)
    }

    #[wasm_bindgen(js_name = setTool)]
    pub fn set_tool(&mut self, tool: &str) -> Result<(), JsValue> {
        let tool = parse_tool(tool).map_err(|e| JsValue::from_str(&e))?;
        self.inner.borrow_mut().set_tool(tool);
        Ok(())
    }

    #[wasm_bindgen(js_name = setColor)]
    pub fn set_color(&mut self, hex: &str) -> Result<(), JsValue> {
        let color = Color::from_hex(hex).map_err(to_js)?;
        self.inner.borrow_mut().set_color(color);
        Ok(())
    }

    #[wasm_bindgen(js_name = setStrokeWidth)]
    pub fn set_stroke_width(&mut self, width: f64) -> Result<(), JsValue> {
        self.inner.borrow_mut().set_stroke_width(width).map_err(to_js)
    }

    /// Image placed by the next click of the image or signature tool
    #[wasm_bindgen(js_name = setPendingImage)]
    pub fn set_pending_image(&mut self, src: Option<String>) {
        self.inner.borrow_mut().set_pending_image(src);
    }

    /// Make a loaded image drawable on the canvas
    #[wasm_bindgen(js_name = registerImage)]
    pub fn register_image(&mut self, src: String, image: HtmlImageElement) {
        self.images.insert(src, image);
    }

    #[wasm_bindgen(js_name = unregisterImage)]
    pub fn unregister_image(&mut self, src: &str) -> bool {
        self.images.remove(src)
    }

    // Pointer events arrive in canvas pixels

    #[wasm_bindgen(js_name = pointerDown)]
    pub fn pointer_down(&mut self, x: f64, y: f64) {
        self.inner.borrow_mut().pointer_down(Point::new(x, y));
    }

    #[wasm_bindgen(js_name = pointerMove)]
    pub fn pointer_move(&mut self, x: f64, y: f64) {
        self.inner.borrow_mut().pointer_move(Point::new(x, y));
    }

    /// Finish a gesture. Returns the id of the element it created, if any.
    #[wasm_bindgen(js_name = pointerUp)]
    pub fn pointer_up(&mut self, x: f64, y: f64) -> Result<Option<u64>, JsValue> {
        self.inner.borrow_mut().pointer_up(Point::new(x, y)).map_err(to_js)
    }

    #[wasm_bindgen(getter)]
    pub fn selected(&self) -> Option<u64> {
        self.inner.borrow().selected()
    }

    /// Add a text box at a document-space position on the current page
    #[wasm_bindgen(js_name = addText)]
    pub fn add_text(&mut self, x: f64, y: f64, text: &str) -> Result<u64, JsValue> {
        let mut inner = self.inner.borrow_mut();
        let page = inner.view().page;
        inner.add_text(page, Point::new(x, y), text).map_err(to_js)
    }

    #[wasm_bindgen(js_name = deleteSelected)]
    pub fn delete_selected(&mut self) -> bool {
        self.inner.borrow_mut().delete_selected()
    }

    #[wasm_bindgen(js_name = deleteElement)]
    pub fn delete_element(&mut self, id: u64) -> bool {
        self.inner.borrow_mut().delete(id)
    }

    /// Erase around a document-space point on the current page
    pub fn erase(&mut self, x: f64, y: f64) -> usize {
        let mut inner = self.inner.borrow_mut();
        let page = inner.view().page;
        inner.erase(Point::new(x, y), page)
    }

    pub fn undo(&mut self) -> bool {
        self.inner.borrow_mut().undo()
    }

    pub fn redo(&mut self) -> bool {
        self.inner.borrow_mut().redo()
    }

    #[wasm_bindgen(getter, js_name = canUndo)]
    pub fn can_undo(&self) -> bool {
        self.inner.borrow().can_undo()
    }

    #[wasm_bindgen(getter, js_name = canRedo)]
    pub fn can_redo(&self) -> bool {
        self.inner.borrow().can_redo()
    }

    #[wasm_bindgen(js_name = getFormFields)]
    pub fn form_fields(&self) -> Result<JsValue, JsValue> {
        to_js_value(&self.inner.borrow().store().form_fields())
    }

    #[wasm_bindgen(js_name = setFormFieldValue)]
    pub fn set_form_field_value(&mut self, name: &str, value: &str) -> Result<(), JsValue> {
        self.inner
            .borrow_mut()
            .set_form_field_value(name, value)
            .map_err(to_js)
    }

    /// Place one recognized text result (JSON) as an editable text box
    #[wasm_bindgen(js_name = placeOcrResult)]
    pub fn place_ocr_result(&mut self, page: u32, result_json: &str) -> Result<u64, JsValue> {
        let result: OcrResult = serde_json::from_str(result_json)
            .map_err(|e| JsValue::from_str(&format!("Invalid OCR result: {}", e)))?;
        self.inner
            .borrow_mut()
            .place_ocr_result(page, &result)
            .map_err(to_js)
    }

    /// Place every result (JSON array) that clears the configured minimum
    /// confidence, best first, as one undo step. Returns the new ids.
    #[wasm_bindgen(js_name = placeOcrResults)]
    pub fn place_ocr_results(&mut self, page: u32, results_json: &str) -> Result<Vec<u64>, JsValue> {
        let results: Vec<OcrResult> = serde_json::from_str(results_json)
            .map_err(|e| JsValue::from_str(&format!("Invalid OCR results: {}", e)))?;
        self.inner
            .borrow_mut()
            .place_ocr_results(page, &results)
            .map_err(to_js)
    }

    #[wasm_bindgen(js_name = annotationsJson)]
    pub fn annotations_json(&self) -> Result<String, JsValue> {
        self.inner.borrow().annotations_json().map_err(to_js)
    }

    /// Import annotations saved by `annotationsJson`. Returns the new ids.
    #[wasm_bindgen(js_name = importAnnotationsJson)]
    pub fn import_annotations_json(&mut self, json: &str) -> Result<Vec<u64>, JsValue> {
        self.inner
            .borrow_mut()
            .import_annotations_json(json)
            .map_err(to_js)
    }

    /// Draw the current page's overlay, including any gesture in progress.
    /// Returns the number of elements that could not be drawn.
    pub fn render(&self, ctx: &CanvasRenderingContext2d) -> usize {
        let (width, height) = self.inner.borrow().view().view_size();
        ctx.clear_rect(0.0, 0.0, width, height);
        let mut surface = CanvasSurface::new(ctx, &self.images);
        let report = self.inner.borrow().render(&mut surface);
        if !report.skipped.is_empty() {
            web_sys::console::warn_1(&JsValue::from_str(&format!(
                "{} overlay element(s) could not be drawn",
                report.skipped.len()
            )));
        }
        report.skipped.len()
    }

    #[wasm_bindgen(getter, js_name = exportInFlight)]
    pub fn export_in_flight(&self) -> bool {
        self.inner.borrow().export_in_flight()
    }

    /// Bake all edits into a new PDF.
    ///
    /// Resolves to a `Uint8Array`. Stages yield to the event loop in between
    /// so the page stays responsive; `cancelExport` stops at the next stage.
    pub fn export(&mut self) -> Result<Promise, JsValue> {
        let (request, options) = {
            let mut inner = self.inner.borrow_mut();
            let request = inner.begin_export().map_err(to_js)?;
            (request, inner.config().export_options())
        };
        let token = CancellationToken::new();
        *self.cancel.borrow_mut() = Some(token.clone());

        let inner = Rc::clone(&self.inner);
        let cancel = Rc::clone(&self.cancel);
        Ok(future_to_promise(async move {
            let mut job = ExportJob::new(request, options).with_cancellation(token);
            let stepped = loop {
                match job.step() {
                    Ok(Some(_)) => {
                        if let Err(e) = yield_to_event_loop().await {
                            break Err(e);
                        }
                    }
                    Ok(None) => break Ok(()),
                    Err(e) => break Err(to_js(e)),
                }
            };
            let result = stepped.and_then(|()| job.run().map_err(to_js));

            inner.borrow_mut().finish_export();
            cancel.borrow_mut().take();

            let output = result?;
            let array = Uint8Array::new_with_length(output.bytes.len() as u32);
            array.copy_from(&output.bytes);
            Ok(array.into())
        }))
    }

    /// Request cancellation of the running export
    #[wasm_bindgen(js_name = cancelExport)]
    pub fn cancel_export(&self) -> bool {
        match self.cancel.borrow().as_ref() {
            Some(token) => {
                token.cancel();
                true
            }
            None => false,
        }
    }

    /// Download name for the exported file
    #[wasm_bindgen(js_name = exportFileName)]
    pub fn export_file_name(&self) -> String {
        self.inner.borrow().export_file_name(&self.document_name)
    }
}
