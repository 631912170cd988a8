//! Element data model
//!
//! Text elements, annotations and form fields placed on document pages. All
//! geometry is in document space (top-left origin, zoom 1.0).

use crate::color::Color;
use crate::coords::{Point, Rect};
use crate::error::OverlayError;
use crate::fonts::standard_font;
use serde::{Deserialize, Serialize};

pub type ElementId = u64;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TextStyle {
    pub font_family: String,
    pub font_size: f64,
    pub color: Color,
    #[serde(default)]
    pub bold: bool,
    #[serde(default)]
    pub italic: bool,
    #[serde(default)]
    pub underline: bool,
}

impl Default for TextStyle {
    fn default() -> Self {
        Self {
            font_family: "Helvetica".to_string(),
            font_size: 16.0,
            color: Color::BLACK,
            bold: false,
            italic: false,
            underline: false,
        }
    }
}

impl TextStyle {
    /// Standard 14 font used when this style is written into a PDF
    pub fn pdf_font_name(&self) -> &'static str {
        standard_font(&self.font_family, self.bold, self.italic)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TextElement {
    pub id: ElementId,
    pub page: u32,
    pub rect: Rect,
    pub text: String,
    pub style: TextStyle,
}

/// Discriminant of [`AnnotationKind`], used where only the kind name matters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AnnotationType {
    Rectangle,
    Circle,
    Line,
    Highlight,
    Freeform,
    Signature,
    Text,
    Checkmark,
    XMark,
    Image,
}

impl AnnotationType {
    pub fn as_str(self) -> &'static str {
        match self {
            AnnotationType::Rectangle => "rectangle",
            AnnotationType::Circle => "circle",
            AnnotationType::Line => "line",
            AnnotationType::Highlight => "highlight",
            AnnotationType::Freeform => "freeform",
            AnnotationType::Signature => "signature",
            AnnotationType::Text => "text",
            AnnotationType::Checkmark => "checkmark",
            AnnotationType::XMark => "x-mark",
            AnnotationType::Image => "image",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "mode", rename_all = "lowercase")]
pub enum SignatureContent {
    /// Captured as a pen path
    Path { points: Vec<Point> },
    /// Captured as a rendered bitmap (data URL or base64)
    Image { src: String },
}

/// Per-kind payload. Fields exist only on the kinds that need them.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum AnnotationKind {
    Rectangle,
    Circle,
    Line,
    Highlight,
    Freeform { points: Vec<Point> },
    Signature(SignatureContent),
    Text { text: String, font_size: f64 },
    Checkmark,
    XMark,
    Image { src: String },
}

impl AnnotationKind {
    pub fn annotation_type(&self) -> AnnotationType {
        match self {
            AnnotationKind::Rectangle => AnnotationType::Rectangle,
            AnnotationKind::Circle => AnnotationType::Circle,
            AnnotationKind::Line => AnnotationType::Line,
            AnnotationKind::Highlight => AnnotationType::Highlight,
            AnnotationKind::Freeform { .. } => AnnotationType::Freeform,
            AnnotationKind::Signature(_) => AnnotationType::Signature,
            AnnotationKind::Text { .. } => AnnotationType::Text,
            AnnotationKind::Checkmark => AnnotationType::Checkmark,
            AnnotationKind::XMark => AnnotationType::XMark,
            AnnotationKind::Image { .. } => AnnotationType::Image,
        }
    }

    /// Stroke points for path-based kinds
    pub fn points(&self) -> Option<&[Point]> {
        match self {
            AnnotationKind::Freeform { points }
            | AnnotationKind::Signature(SignatureContent::Path { points }) => Some(points),
            _ => None,
        }
    }

    fn points_mut(&mut self) -> Option<&mut Vec<Point>> {
        match self {
            AnnotationKind::Freeform { points }
            | AnnotationKind::Signature(SignatureContent::Path { points }) => Some(points),
            _ => None,
        }
    }

    /// Referenced image blob for bitmap-based kinds
    pub fn image_src(&self) -> Option<&str> {
        match self {
            AnnotationKind::Image { src }
            | AnnotationKind::Signature(SignatureContent::Image { src }) => Some(src),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Annotation {
    pub id: ElementId,
    pub page: u32,
    pub rect: Rect,
    pub color: Color,
    pub stroke_width: f64,
    #[serde(flatten)]
    pub kind: AnnotationKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FormFieldType {
    Text,
    Checkbox,
    Radio,
    Dropdown,
}

/// A value bound to a field that already exists in the base document
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FormField {
    pub name: String,
    pub field_type: FormFieldType,
    pub value: String,
    pub rect: Rect,
    pub page: u32,
    #[serde(default)]
    pub options: Vec<String>,
}

impl FormField {
    /// Whether a checkbox value means "on". Any value other than an
    /// explicit off word counts, so custom on-state names like `Agreed`
    /// read back as checked.
    pub fn is_checked(&self) -> bool {
        !matches!(
            self.value.trim().to_lowercase().as_str(),
            "" | "off" | "false" | "no" | "0" | "unchecked"
        )
    }
}

/// Anything the element store holds
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "element", rename_all = "lowercase")]
pub enum Element {
    Text(TextElement),
    Annotation(Annotation),
}

impl Element {
    pub fn id(&self) -> ElementId {
        match self {
            Element::Text(t) => t.id,
            Element::Annotation(a) => a.id,
        }
    }

    pub(crate) fn set_id(&mut self, id: ElementId) {
        match self {
            Element::Text(t) => t.id = id,
            Element::Annotation(a) => a.id = id,
        }
    }

    pub fn page(&self) -> u32 {
        match self {
            Element::Text(t) => t.page,
            Element::Annotation(a) => a.page,
        }
    }

    pub fn rect(&self) -> Rect {
        match self {
            Element::Text(t) => t.rect,
            Element::Annotation(a) => a.rect,
        }
    }

    pub fn as_text(&self) -> Option<&TextElement> {
        match self {
            Element::Text(t) => Some(t),
            Element::Annotation(_) => None,
        }
    }

    pub fn as_annotation(&self) -> Option<&Annotation> {
        match self {
            Element::Annotation(a) => Some(a),
            Element::Text(_) => None,
        }
    }

    /// Reject malformed geometry and styling before the element is stored
    pub fn validate(&self) -> Result<(), OverlayError> {
        validate_page(self.page())?;
        match self {
            Element::Text(t) => {
                validate_rect(&t.rect, false)?;
                validate_font_size(t.style.font_size)
            }
            Element::Annotation(a) => {
                validate_rect(&a.rect, a.kind.annotation_type() == AnnotationType::Line)?;
                if !a.stroke_width.is_finite() || a.stroke_width < 0.0 {
                    return Err(OverlayError::Validation(format!(
                        "stroke width must be non-negative, got {}",
                        a.stroke_width
                    )));
                }
                validate_kind(&a.kind)
            }
        }
    }

    /// Apply a patch, producing a new element. The original is untouched.
    pub fn patched(&self, patch: &ElementPatch) -> Result<Element, OverlayError> {
        let mut next = self.clone();
        if let Some(page) = patch.page {
            match &mut next {
                Element::Text(t) => t.page = page,
                Element::Annotation(a) => a.page = page,
            }
        }
        if let Some(rect) = patch.rect {
            next.move_to(rect);
        }

        match &mut next {
            Element::Text(t) => {
                if patch.stroke_width.is_some() {
                    return Err(OverlayError::Validation(
                        "text elements have no stroke width".to_string(),
                    ));
                }
                if let Some(text) = &patch.text {
                    t.text = text.clone();
                }
                if let Some(color) = patch.color {
                    t.style.color = color;
                }
                if let Some(family) = &patch.font_family {
                    t.style.font_family = family.clone();
                }
                if let Some(size) = patch.font_size {
                    t.style.font_size = size;
                }
                if let Some(bold) = patch.bold {
                    t.style.bold = bold;
                }
                if let Some(italic) = patch.italic {
                    t.style.italic = italic;
                }
                if let Some(underline) = patch.underline {
                    t.style.underline = underline;
                }
            }
            Element::Annotation(a) => {
                if patch.font_family.is_some()
                    || patch.bold.is_some()
                    || patch.italic.is_some()
                    || patch.underline.is_some()
                {
                    return Err(OverlayError::Validation(
                        "annotations carry no font styling".to_string(),
                    ));
                }
                if let Some(color) = patch.color {
                    a.color = color;
                }
                if let Some(width) = patch.stroke_width {
                    a.stroke_width = width;
                }
                match &mut a.kind {
                    AnnotationKind::Text { text, font_size } => {
                        if let Some(t) = &patch.text {
                            *text = t.clone();
                        }
                        if let Some(size) = patch.font_size {
                            *font_size = size;
                        }
                    }
                    kind if patch.text.is_some() || patch.font_size.is_some() => {
                        return Err(OverlayError::Validation(format!(
                            "{} annotations carry no text",
                            kind.annotation_type().as_str()
                        )));
                    }
                    _ => {}
                }
            }
        }

        next.validate()?;
        Ok(next)
    }

    /// Move/resize, carrying path points along with the bounding box
    fn move_to(&mut self, rect: Rect) {
        match self {
            Element::Text(t) => t.rect = rect,
            Element::Annotation(a) => {
                let old = a.rect;
                if let Some(points) = a.kind.points_mut() {
                    let sx = if old.width.abs() > f64::EPSILON {
                        rect.width / old.width
                    } else {
                        1.0
                    };
                    let sy = if old.height.abs() > f64::EPSILON {
                        rect.height / old.height
                    } else {
                        1.0
                    };
                    for p in points.iter_mut() {
                        p.x = rect.x + (p.x - old.x) * sx;
                        p.y = rect.y + (p.y - old.y) * sy;
                    }
                }
                a.rect = rect;
            }
        }
    }
}

/// Partial update for [`Element::patched`]. `None` leaves a field unchanged.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ElementPatch {
    pub page: Option<u32>,
    pub rect: Option<Rect>,
    pub color: Option<Color>,
    pub stroke_width: Option<f64>,
    pub text: Option<String>,
    pub font_family: Option<String>,
    pub font_size: Option<f64>,
    pub bold: Option<bool>,
    pub italic: Option<bool>,
    pub underline: Option<bool>,
}

impl ElementPatch {
    pub fn rect(rect: Rect) -> Self {
        Self {
            rect: Some(rect),
            ..Default::default()
        }
    }
}

fn validate_page(page: u32) -> Result<(), OverlayError> {
    if page == 0 {
        return Err(OverlayError::Validation(
            "pages are numbered from 1".to_string(),
        ));
    }
    Ok(())
}

/// Lines store a direction in width/height, so they may go negative.
fn validate_rect(rect: &Rect, allow_negative_size: bool) -> Result<(), OverlayError> {
    if !rect.is_finite() {
        return Err(OverlayError::Validation(format!(
            "geometry must be finite: {:?}",
            rect
        )));
    }
    if !allow_negative_size && (rect.width < 0.0 || rect.height < 0.0) {
        return Err(OverlayError::Validation(format!(
            "width and height must be non-negative: {:?}",
            rect
        )));
    }
    Ok(())
}

fn validate_font_size(size: f64) -> Result<(), OverlayError> {
    if !size.is_finite() || size <= 0.0 {
        return Err(OverlayError::Validation(format!(
            "font size must be positive, got {}",
            size
        )));
    }
    Ok(())
}

fn validate_kind(kind: &AnnotationKind) -> Result<(), OverlayError> {
    if let Some(points) = kind.points() {
        if points.is_empty() {
            return Err(OverlayError::Validation(
                "path annotations need at least one point".to_string(),
            ));
        }
        if points.iter().any(|p| !p.x.is_finite() || !p.y.is_finite()) {
            return Err(OverlayError::Validation(
                "path points must be finite".to_string(),
            ));
        }
    }
    if let Some(src) = kind.image_src() {
        if src.trim().is_empty() {
            return Err(OverlayError::Validation(
                "image annotations need a source".to_string(),
            ));
        }
    }
    if let AnnotationKind::Text { font_size, .. } = kind {
        validate_font_size(*font_size)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rectangle() -> Element {
        Element::Annotation(Annotation {
            id: 1,
            page: 1,
            rect: Rect::new(10.0, 10.0, 50.0, 30.0),
            color: Color::from_hex("#ff0000").unwrap(),
            stroke_width: 2.0,
            kind: AnnotationKind::Rectangle,
        })
    }

    fn freeform() -> Element {
        Element::Annotation(Annotation {
            id: 2,
            page: 1,
            rect: Rect::new(0.0, 0.0, 10.0, 10.0),
            color: Color::BLACK,
            stroke_width: 1.0,
            kind: AnnotationKind::Freeform {
                points: vec![Point::new(0.0, 0.0), Point::new(10.0, 10.0)],
            },
        })
    }

    #[test]
    fn test_negative_geometry_rejected() {
        let mut el = rectangle();
        if let Element::Annotation(a) = &mut el {
            a.rect.width = -1.0;
        }
        assert!(matches!(el.validate(), Err(OverlayError::Validation(_))));
    }

    #[test]
    fn test_line_allows_direction() {
        let el = Element::Annotation(Annotation {
            id: 0,
            page: 1,
            rect: Rect::new(100.0, 100.0, 50.0, -40.0),
            color: Color::BLACK,
            stroke_width: 1.0,
            kind: AnnotationKind::Line,
        });
        assert!(el.validate().is_ok());
    }

    #[test]
    fn test_page_zero_rejected() {
        let mut el = rectangle();
        if let Element::Annotation(a) = &mut el {
            a.page = 0;
        }
        assert!(el.validate().is_err());
    }

    #[test]
    fn test_patch_is_immutable() {
        let el = rectangle();
        let patch = ElementPatch {
            color: Some(Color::from_hex("#00ff00").unwrap()),
            ..Default::default()
        };
        let next = el.patched(&patch).unwrap();
        assert_eq!(el.as_annotation().unwrap().color, Color::new(255, 0, 0));
        assert_eq!(next.as_annotation().unwrap().color, Color::new(0, 255, 0));
    }

    #[test]
    fn test_patch_rejects_text_on_shape() {
        let patch = ElementPatch {
            text: Some("nope".to_string()),
            ..Default::default()
        };
        assert!(matches!(
            rectangle().patched(&patch),
            Err(OverlayError::Validation(_))
        ));
    }

    #[test]
    fn test_moving_freeform_carries_points() {
        let moved = freeform()
            .patched(&ElementPatch::rect(Rect::new(100.0, 50.0, 20.0, 10.0)))
            .unwrap();
        let points = moved.as_annotation().unwrap().kind.points().unwrap().to_vec();
        assert_eq!(points, vec![Point::new(100.0, 50.0), Point::new(120.0, 60.0)]);
    }

    #[test]
    fn test_checkbox_values() {
        let mut field = FormField {
            name: "agree".to_string(),
            field_type: FormFieldType::Checkbox,
            value: "Yes".to_string(),
            rect: Rect::default(),
            page: 1,
            options: Vec::new(),
        };
        assert!(field.is_checked());
        field.value = "Agreed".to_string();
        assert!(field.is_checked());
        for off in ["Off", "", "no", "false", "0"] {
            field.value = off.to_string();
            assert!(!field.is_checked(), "{off:?} should be unchecked");
        }
    }
}
