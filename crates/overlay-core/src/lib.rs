//! Overlay editing engine for PDF documents
//!
//! Places text, shape and signature annotations, and form values on top of an
//! existing PDF, keeps an undoable history of every committed edit, and bakes
//! everything into a new PDF on export.
//!
//! - [`EditorSession`]: pointer-driven editing with undo/redo
//! - [`render_elements`]: draws a page's overlay onto any [`Surface`]
//! - [`export_document`] / [`ExportJob`]: text, then form values, then
//!   annotations, each stage producing fresh bytes

pub mod cancel;
pub mod color;
pub mod config;
pub mod coords;
pub mod eraser;
pub mod error;
pub mod export;
pub mod fonts;
pub mod forms;
pub mod history;
pub mod images;
pub mod interchange;
pub mod model;
pub mod ocr;
pub mod page_info;
pub mod render;
pub mod session;
pub mod shapes;
pub mod store;

pub use cancel::CancellationToken;
pub use color::Color;
pub use config::EditorConfig;
pub use coords::{flip_y, to_document_space, to_view_space, Point, Rect, ViewState};
pub use error::OverlayError;
pub use export::{
    edited_file_name, export_document, ExportJob, ExportOptions, ExportOutput, ExportReport,
    ExportRequest, ExportStage,
};
pub use forms::{detect_form_fields, has_signatures, DetectedField};
pub use history::{HistoryManager, HistorySnapshot};
pub use interchange::{annotations_from_json, annotations_to_json, ElementBundle};
pub use model::{
    Annotation, AnnotationKind, AnnotationType, Element, ElementId, ElementPatch, FormField,
    FormFieldType, SignatureContent, TextElement, TextStyle,
};
pub use ocr::OcrResult;
pub use page_info::{page_count, PageGeometry};
pub use render::{render_elements, RenderOptions, RenderReport, Surface};
pub use session::{EditorSession, Tool};
pub use store::ElementStore;
