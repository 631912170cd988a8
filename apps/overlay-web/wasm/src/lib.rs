//! WASM bindings for the PDF overlay editor
//!
//! Editing state, hit testing, undo history and export all live in Rust.
//! JavaScript forwards pointer events, hands over loaded images, and draws
//! the page bitmap underneath the overlay canvas.
//!
//! ## Usage (JavaScript)
//!
//! ```javascript
//! import init, { EditSession } from './pkg/overlay_wasm.js';
//!
//! await init();
//!
//! const session = new EditSession("lease.pdf", bytes);
//! session.setTool("rectangle");
//! canvas.onpointerdown = (e) => session.pointerDown(e.offsetX, e.offsetY);
//! canvas.onpointermove = (e) => { session.pointerMove(e.offsetX, e.offsetY); session.render(ctx); };
//! canvas.onpointerup = (e) => { session.pointerUp(e.offsetX, e.offsetY); session.render(ctx); };
//!
//! const pdf = await session.export();
//! downloadBlob(pdf, session.exportFileName());
//! ```

pub mod canvas;
pub mod edit_session;

use wasm_bindgen::prelude::*;

pub use edit_session::EditSession;

/// Initialize the WASM module
/// Called automatically by wasm-bindgen
#[wasm_bindgen(start)]
pub fn init() {
    console_error_panic_hook::set_once();
}

/// Page sizes and rotations without opening a session
#[wasm_bindgen(js_name = getPageGeometries)]
pub fn get_page_geometries(bytes: &[u8]) -> Result<JsValue, JsValue> {
    let pages = overlay_core::page_info::page_geometries_from_bytes(bytes)
        .map_err(|e| JsValue::from_str(&e.to_string()))?;
    serde_wasm_bindgen::to_value(&pages)
        .map_err(|e| JsValue::from_str(&format!("Serialization error: {}", e)))
}

/// Fillable fields of a document, with their current values
#[wasm_bindgen(js_name = detectFormFields)]
pub fn detect_form_fields(bytes: &[u8]) -> Result<JsValue, JsValue> {
    let fields =
        overlay_core::detect_form_fields(bytes).map_err(|e| JsValue::from_str(&e.to_string()))?;
    serde_wasm_bindgen::to_value(&fields)
        .map_err(|e| JsValue::from_str(&format!("Serialization error: {}", e)))
}

#[wasm_bindgen(js_name = hasSignatures)]
pub fn has_signatures(bytes: &[u8]) -> Result<bool, JsValue> {
    overlay_core::has_signatures(bytes).map_err(|e| JsValue::from_str(&e.to_string()))
}

#[wasm_bindgen(js_name = editedFileName)]
pub fn edited_file_name(source: &str) -> String {
    overlay_core::edited_file_name(source, &overlay_core::EditorConfig::default().output_suffix)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_edited_file_name_uses_default_suffix() {
        assert_eq!(edited_file_name("lease.pdf"), "lease-edited.pdf");
    }
}
