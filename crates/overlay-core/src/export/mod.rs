//! Export compositor
//!
//! Bakes overlays into the base document in a fixed order: text, then form
//! values, then annotations. Every stage reads the previous stage's bytes and
//! writes new bytes, and a stage with nothing to do passes its input through
//! untouched. Per-element failures are logged and skipped; parse and write
//! failures abort the export with no output.

mod annotations;
pub(crate) mod content;
mod forms;
mod text;

use crate::cancel::CancellationToken;
use crate::error::OverlayError;
use crate::model::{Annotation, ElementId, FormField, TextElement};
use crate::page_info::{page_geometries, PageGeometry};
use lopdf::{Document, ObjectId};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use tracing::{info, info_span, warn};

/// Immutable inputs for one export, captured when the export starts
#[derive(Debug, Clone, Default)]
pub struct ExportRequest {
    pub base: Arc<[u8]>,
    pub text_elements: Vec<TextElement>,
    pub form_fields: Vec<FormField>,
    pub annotations: Vec<Annotation>,
}

impl ExportRequest {
    pub fn new(base: impl Into<Arc<[u8]>>) -> Self {
        Self {
            base: base.into(),
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.text_elements.is_empty() && self.form_fields.is_empty() && self.annotations.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ExportOptions {
    /// Fill opacity for highlight annotations
    pub highlight_opacity: f64,
    /// Convert form fields to static content once values are applied
    pub flatten_forms: bool,
}

impl Default for ExportOptions {
    fn default() -> Self {
        Self {
            highlight_opacity: 0.35,
            flatten_forms: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportStage {
    Text,
    Forms,
    Annotations,
}

impl ExportStage {
    pub const ALL: [ExportStage; 3] = [ExportStage::Text, ExportStage::Forms, ExportStage::Annotations];

    fn next(self) -> Option<ExportStage> {
        match self {
            ExportStage::Text => Some(ExportStage::Forms),
            ExportStage::Forms => Some(ExportStage::Annotations),
            ExportStage::Annotations => None,
        }
    }
}

impl fmt::Display for ExportStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ExportStage::Text => "text",
            ExportStage::Forms => "forms",
            ExportStage::Annotations => "annotations",
        };
        f.write_str(name)
    }
}

/// Something left out of the output
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SkippedItem {
    pub stage: ExportStage,
    /// Element id, or field name for form values
    pub item: String,
    pub reason: String,
}

/// What an export did
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ExportReport {
    pub input_size_bytes: usize,
    pub output_size_bytes: usize,
    pub page_count: u32,
    pub text_embedded: usize,
    pub fields_applied: usize,
    pub forms_flattened: bool,
    pub annotations_drawn: usize,
    pub skipped: Vec<SkippedItem>,
}

impl ExportReport {
    pub(crate) fn skip(&mut self, stage: ExportStage, item: impl Into<String>, error: &OverlayError) {
        let item = item.into();
        warn!(%stage, item = %item, error = %error, "skipping element");
        self.skipped.push(SkippedItem {
            stage,
            item,
            reason: error.to_string(),
        });
    }
}

/// Result of a finished export
#[derive(Debug, Clone)]
pub struct ExportOutput {
    pub bytes: Vec<u8>,
    pub report: ExportReport,
}

/// A staged export that advances one stage per `step`
///
/// Cancellation is observed only before a stage starts.
#[derive(Debug)]
pub struct ExportJob {
    request: ExportRequest,
    options: ExportOptions,
    cancel: CancellationToken,
    next: Option<ExportStage>,
    bytes: Option<Vec<u8>>,
    report: ExportReport,
}

impl ExportJob {
    pub fn new(request: ExportRequest, options: ExportOptions) -> Self {
        let report = ExportReport {
            input_size_bytes: request.base.len(),
            ..ExportReport::default()
        };
        Self {
            request,
            options,
            cancel: CancellationToken::new(),
            next: Some(ExportStage::Text),
            bytes: None,
            report,
        }
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// Stage that the next `step` will run
    pub fn next_stage(&self) -> Option<ExportStage> {
        self.next
    }

    pub fn is_finished(&self) -> bool {
        self.next.is_none()
    }

    pub fn report(&self) -> &ExportReport {
        &self.report
    }

    /// Run the next stage. Returns the stage that ran, or `None` once all
    /// stages are done.
    pub fn step(&mut self) -> Result<Option<ExportStage>, OverlayError> {
        let Some(stage) = self.next else {
            return Ok(None);
        };
        if self.cancel.is_cancelled() {
            info!(%stage, "export cancelled");
            return Err(OverlayError::Cancelled);
        }

        let _span = info_span!("export_stage", %stage).entered();
        let input = match self.bytes.take() {
            Some(bytes) => bytes,
            None => self.request.base.to_vec(),
        };
        let output = match stage {
            ExportStage::Text => text::embed_text(input, &self.request.text_elements, &mut self.report)?,
            ExportStage::Forms => {
                forms::apply_form_values(input, &self.request.form_fields, &self.options, &mut self.report)?
            }
            ExportStage::Annotations => annotations::draw_annotations(
                input,
                &self.request.annotations,
                &self.options,
                &mut self.report,
            )?,
        };
        self.bytes = Some(output);
        self.next = stage.next();
        Ok(Some(stage))
    }

    /// Drive every remaining stage and return the final bytes
    pub fn run(mut self) -> Result<ExportOutput, OverlayError> {
        while self.step()?.is_some() {}
        let bytes = match self.bytes.take() {
            Some(bytes) => bytes,
            None => self.request.base.to_vec(),
        };
        let mut report = self.report;
        report.output_size_bytes = bytes.len();
        // A passthrough of unreadable bytes still succeeds, with no page count
        report.page_count = crate::page_info::page_count(&bytes).unwrap_or(0);
        info!(
            input = report.input_size_bytes,
            output = report.output_size_bytes,
            skipped = report.skipped.len(),
            "export finished"
        );
        Ok(ExportOutput { bytes, report })
    }
}

/// Composite every element category onto `base` and return the new bytes
pub fn export_document(
    base: &[u8],
    text_elements: &[TextElement],
    form_fields: &[FormField],
    annotations: &[Annotation],
) -> Result<Vec<u8>, OverlayError> {
    let request = ExportRequest {
        base: Arc::from(base),
        text_elements: text_elements.to_vec(),
        form_fields: form_fields.to_vec(),
        annotations: annotations.to_vec(),
    };
    ExportJob::new(request, ExportOptions::default())
        .run()
        .map(|output| output.bytes)
}

/// Download name for an exported file: `report.pdf` becomes
/// `report-edited.pdf` with the default suffix
pub fn edited_file_name(source: &str, suffix: &str) -> String {
    let base = source
        .rsplit(['/', '\\'])
        .next()
        .filter(|name| !name.is_empty())
        .unwrap_or("document");
    match base.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() && !ext.is_empty() => {
            format!("{}{}.{}", stem, suffix, ext)
        }
        _ => format!("{}{}.pdf", base.trim_end_matches('.'), suffix),
    }
}

pub(crate) fn load(bytes: &[u8]) -> Result<Document, OverlayError> {
    Document::load_mem(bytes).map_err(|e| OverlayError::Parse(e.to_string()))
}

pub(crate) fn save(doc: &mut Document) -> Result<Vec<u8>, OverlayError> {
    let mut out = Vec::new();
    doc.save_to(&mut out)
        .map_err(|e| OverlayError::Serialization(e.to_string()))?;
    Ok(out)
}

/// Page object id and geometry for each page number
pub(crate) fn page_table(doc: &Document) -> BTreeMap<u32, (ObjectId, PageGeometry)> {
    let geometries = page_geometries(doc);
    doc.get_pages()
        .into_iter()
        .filter_map(|(num, id)| geometries.get(&num).map(|g| (num, (id, *g))))
        .collect()
}

pub(crate) fn missing_page(id: ElementId, page: u32) -> OverlayError {
    OverlayError::NotFound(format!("page {} for element {}", page, id))
}


#[cfg(test)]
mod tests {
    use super::fixtures::text_document;
    use super::*;
    use crate::color::Color;
    use crate::coords::Rect;
    use crate::model::{AnnotationKind, TextStyle};

    fn text(page: u32) -> TextElement {
        TextElement {
            id: 1,
            page,
            rect: Rect::new(50.0, 100.0, 120.0, 20.0),
            text: "Hello".to_string(),
            style: TextStyle::default(),
        }
    }

    fn rectangle() -> Annotation {
        Annotation {
            id: 2,
            page: 1,
            rect: Rect::new(10.0, 10.0, 50.0, 30.0),
            color: Color::new(255, 0, 0),
            stroke_width: 2.0,
            kind: AnnotationKind::Rectangle,
        }
    }

    #[test]
    fn test_edited_file_name() {
        assert_eq!(edited_file_name("report.pdf", "-edited"), "report-edited.pdf");
        assert_eq!(edited_file_name("dir/scan.v2.PDF", "-edited"), "scan.v2-edited.PDF");
        assert_eq!(edited_file_name("notes", "-edited"), "notes-edited.pdf");
        assert_eq!(edited_file_name(".hidden", "_x"), ".hidden_x.pdf");
        assert_eq!(edited_file_name("", "-edited"), "document-edited.pdf");
    }

    #[test]
    fn test_empty_export_is_passthrough() {
        let base = text_document(2);
        let bytes = export_document(&base, &[], &[], &[]).unwrap();
        assert_eq!(bytes, base);
    }

    #[test]
    fn test_job_runs_stages_in_order() {
        let mut request = ExportRequest::new(text_document(1));
        request.text_elements.push(text(1));
        request.annotations.push(rectangle());
        let mut job = ExportJob::new(request, ExportOptions::default());

        let mut ran = Vec::new();
        while let Some(stage) = job.step().unwrap() {
            ran.push(stage);
        }
        assert_eq!(ran, ExportStage::ALL.to_vec());
        assert!(job.is_finished());
        assert_eq!(job.report().text_embedded, 1);
        assert_eq!(job.report().annotations_drawn, 1);
    }

    #[test]
    fn test_cancel_between_stages() {
        let token = CancellationToken::new();
        let mut request = ExportRequest::new(text_document(1));
        request.text_elements.push(text(1));
        let mut job = ExportJob::new(request, ExportOptions::default()).with_cancellation(token.clone());

        assert_eq!(job.step().unwrap(), Some(ExportStage::Text));
        token.cancel();
        assert_eq!(job.step(), Err(OverlayError::Cancelled));
        assert_eq!(job.next_stage(), Some(ExportStage::Forms));
    }

    #[test]
    fn test_corrupt_base_is_fatal() {
        let result = export_document(b"not a pdf", &[text(1)], &[], &[]);
        assert!(matches!(result, Err(OverlayError::Parse(_))));
    }

    #[test]
    fn test_missing_page_is_skipped() {
        let mut request = ExportRequest::new(text_document(1));
        request.text_elements.push(text(5));
        let output = ExportJob::new(request, ExportOptions::default()).run().unwrap();
        assert_eq!(output.report.text_embedded, 0);
        assert_eq!(output.report.skipped.len(), 1);
        assert_eq!(output.report.skipped[0].stage, ExportStage::Text);
        assert_eq!(output.report.page_count, 1);
    }
}
