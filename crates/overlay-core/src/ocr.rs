//! Recognized-text results from an external OCR engine
//!
//! Recognition itself happens elsewhere; this only turns a chosen result into
//! an editable text element at the same spot.

use crate::coords::Rect;
use crate::model::{TextElement, TextStyle};
use serde::{Deserialize, Serialize};

/// Word or line box in document space
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x0: f64,
    pub y0: f64,
    pub x1: f64,
    pub y1: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OcrResult {
    pub text: String,
    /// 0 - 100
    pub confidence: f64,
    #[serde(alias = "bbox")]
    pub bounding_box: BoundingBox,
}

impl OcrResult {
    /// Text element covering the recognized box. The id is assigned when the
    /// element is added to a store.
    pub fn to_text_element(&self, page: u32, style: TextStyle) -> TextElement {
        let b = self.bounding_box;
        TextElement {
            id: 0,
            page,
            rect: Rect::new(b.x0, b.y0, (b.x1 - b.x0).max(0.0), (b.y1 - b.y0).max(0.0)),
            text: self.text.clone(),
            style,
        }
    }
}

/// Keep results at or above `min_confidence`, best first
pub fn confident_results(results: &[OcrResult], min_confidence: f64) -> Vec<&OcrResult> {
    let mut kept: Vec<&OcrResult> = results
        .iter()
        .filter(|r| r.confidence >= min_confidence)
        .collect();
    kept.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));
    kept
}
