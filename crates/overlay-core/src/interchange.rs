//! JSON interchange for placed elements
//!
//! Records are flat and camelCase, with every optional field defaulted so
//! that saved files stay readable by older and newer editors alike. Older
//! field spellings (`value`, `size`, `font`, `image`, `signatureData`) are
//! accepted on the way in and never written back out.

use crate::color::Color;
use crate::coords::{Point, Rect};
use crate::error::OverlayError;
use crate::forms::DetectedField;
use crate::model::{
    Annotation, AnnotationKind, AnnotationType, ElementId, FormField, FormFieldType,
    SignatureContent, TextElement, TextStyle,
};
use serde::{Deserialize, Deserializer, Serialize};

fn default_page() -> u32 {
    1
}

fn default_color() -> String {
    "#000000".to_string()
}

fn default_stroke_width() -> f64 {
    2.0
}

fn default_font_size() -> f64 {
    16.0
}

/// Flat annotation record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnnotationRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<ElementId>,
    #[serde(alias = "type")]
    pub kind: AnnotationType,
    #[serde(default = "default_page")]
    pub page: u32,
    #[serde(default)]
    pub x: f64,
    #[serde(default)]
    pub y: f64,
    #[serde(default)]
    pub width: f64,
    #[serde(default)]
    pub height: f64,
    #[serde(default = "default_color")]
    pub color: String,
    #[serde(default = "default_stroke_width")]
    pub stroke_width: f64,
    /// Flattened `[x0, y0, x1, y1, ...]`
    #[serde(default, deserialize_with = "deserialize_points")]
    pub points: Vec<f64>,
    #[serde(default, alias = "value")]
    pub text: String,
    #[serde(default = "default_font_size", alias = "size")]
    pub font_size: f64,
    #[serde(default, alias = "image", alias = "signatureData")]
    pub src: Option<String>,
}

/// Points arrive either flat or as `{x, y}` objects
fn deserialize_points<'de, D>(deserializer: D) -> Result<Vec<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Points {
        Flat(Vec<f64>),
        Objects(Vec<Point>),
    }

    Ok(match Option::<Points>::deserialize(deserializer)? {
        None => Vec::new(),
        Some(Points::Flat(flat)) => flat,
        Some(Points::Objects(points)) => points.iter().flat_map(|p| [p.x, p.y]).collect(),
    })
}

fn pair_up(flat: &[f64]) -> Result<Vec<Point>, OverlayError> {
    if flat.len() % 2 != 0 {
        return Err(OverlayError::Validation(format!(
            "points must hold x,y pairs, got {} numbers",
            flat.len()
        )));
    }
    Ok(flat.chunks_exact(2).map(|c| Point::new(c[0], c[1])).collect())
}

fn flatten_points(points: &[Point]) -> Vec<f64> {
    points.iter().flat_map(|p| [p.x, p.y]).collect()
}

impl AnnotationRecord {
    /// Canonical annotation. The id is left at 0 when the record has none.
    pub fn to_annotation(&self) -> Result<Annotation, OverlayError> {
        let require_src = || {
            self.src
                .clone()
                .filter(|s| !s.is_empty())
                .ok_or_else(|| OverlayError::Validation(format!("{} needs src", self.kind.as_str())))
        };

        let kind = match self.kind {
            AnnotationType::Rectangle => AnnotationKind::Rectangle,
            AnnotationType::Circle => AnnotationKind::Circle,
            AnnotationType::Line => AnnotationKind::Line,
            AnnotationType::Highlight => AnnotationKind::Highlight,
            AnnotationType::Checkmark => AnnotationKind::Checkmark,
            AnnotationType::XMark => AnnotationKind::XMark,
            AnnotationType::Freeform => AnnotationKind::Freeform {
                points: pair_up(&self.points)?,
            },
            AnnotationType::Signature => match self.src.as_deref() {
                Some(src) if !src.is_empty() => AnnotationKind::Signature(SignatureContent::Image {
                    src: src.to_string(),
                }),
                _ => AnnotationKind::Signature(SignatureContent::Path {
                    points: pair_up(&self.points)?,
                }),
            },
            AnnotationType::Text => AnnotationKind::Text {
                text: self.text.clone(),
                font_size: self.font_size,
            },
            AnnotationType::Image => AnnotationKind::Image { src: require_src()? },
        };

        Ok(Annotation {
            id: self.id.unwrap_or_default(),
            page: self.page,
            rect: Rect::new(self.x, self.y, self.width, self.height),
            color: Color::from_hex(&self.color)?,
            stroke_width: self.stroke_width,
            kind,
        })
    }
}

impl From<&Annotation> for AnnotationRecord {
    fn from(annotation: &Annotation) -> Self {
        let mut record = AnnotationRecord {
            id: Some(annotation.id),
            kind: annotation.kind.annotation_type(),
            page: annotation.page,
            x: annotation.rect.x,
            y: annotation.rect.y,
            width: annotation.rect.width,
            height: annotation.rect.height,
            color: annotation.color.to_hex(),
            stroke_width: annotation.stroke_width,
            points: Vec::new(),
            text: String::new(),
            font_size: default_font_size(),
            src: None,
        };
        match &annotation.kind {
            AnnotationKind::Text { text, font_size } => {
                record.text = text.clone();
                record.font_size = *font_size;
            }
            kind => {
                record.points = kind.points().map(flatten_points).unwrap_or_default();
                record.src = kind.image_src().map(str::to_string);
            }
        }
        record
    }
}

/// Flat text element record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<ElementId>,
    #[serde(default = "default_page")]
    pub page: u32,
    pub x: f64,
    pub y: f64,
    #[serde(default)]
    pub width: f64,
    #[serde(default)]
    pub height: f64,
    #[serde(alias = "value")]
    pub text: String,
    #[serde(default, alias = "font")]
    pub font_family: Option<String>,
    #[serde(default, alias = "size")]
    pub font_size: Option<f64>,
    #[serde(default)]
    pub color: Option<String>,
    #[serde(default)]
    pub bold: bool,
    #[serde(default)]
    pub italic: bool,
    #[serde(default)]
    pub underline: bool,
}

impl TextRecord {
    /// Canonical text element, filling unset style from `defaults`
    pub fn to_text_element(&self, defaults: &TextStyle) -> Result<TextElement, OverlayError> {
        let color = match &self.color {
            Some(hex) => Color::from_hex(hex)?,
            None => defaults.color,
        };
        Ok(TextElement {
            id: self.id.unwrap_or_default(),
            page: self.page,
            rect: Rect::new(self.x, self.y, self.width, self.height),
            text: self.text.clone(),
            style: TextStyle {
                font_family: self
                    .font_family
                    .clone()
                    .unwrap_or_else(|| defaults.font_family.clone()),
                font_size: self.font_size.unwrap_or(defaults.font_size),
                color,
                bold: self.bold,
                italic: self.italic,
                underline: self.underline,
            },
        })
    }
}

impl From<&TextElement> for TextRecord {
    fn from(element: &TextElement) -> Self {
        TextRecord {
            id: Some(element.id),
            page: element.page,
            x: element.rect.x,
            y: element.rect.y,
            width: element.rect.width,
            height: element.rect.height,
            text: element.text.clone(),
            font_family: Some(element.style.font_family.clone()),
            font_size: Some(element.style.font_size),
            color: Some(element.style.color.to_hex()),
            bold: element.style.bold,
            italic: element.style.italic,
            underline: element.style.underline,
        }
    }
}

/// A value to write into a named form field
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldValue {
    pub name: String,
    pub value: String,
}

/// Everything placed on a document, as saved to disk
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ElementBundle {
    #[serde(default, alias = "textElements")]
    pub text: Vec<TextRecord>,
    #[serde(default, alias = "formFields")]
    pub fields: Vec<FieldValue>,
    #[serde(default)]
    pub annotations: Vec<AnnotationRecord>,
}

impl ElementBundle {
    pub fn from_json(json: &str) -> Result<Self, OverlayError> {
        serde_json::from_str(json).map_err(|e| OverlayError::Validation(e.to_string()))
    }

    pub fn to_json(&self) -> Result<String, OverlayError> {
        serde_json::to_string_pretty(self).map_err(|e| OverlayError::Serialization(e.to_string()))
    }

    /// Canonical text elements, numbered from 1 where records carry no id
    pub fn text_elements(&self, defaults: &TextStyle) -> Result<Vec<TextElement>, OverlayError> {
        self.text
            .iter()
            .enumerate()
            .map(|(i, record)| {
                let mut element = record.to_text_element(defaults)?;
                if record.id.is_none() {
                    element.id = i as ElementId + 1;
                }
                Ok(element)
            })
            .collect()
    }

    /// Canonical annotations, numbered after the text elements where
    /// records carry no id
    pub fn annotations(&self) -> Result<Vec<Annotation>, OverlayError> {
        let offset = self.text.len() as ElementId;
        self.annotations
            .iter()
            .enumerate()
            .map(|(i, record)| {
                let mut annotation = record.to_annotation()?;
                if record.id.is_none() {
                    annotation.id = offset + i as ElementId + 1;
                }
                Ok(annotation)
            })
            .collect()
    }

    /// Bind values to the fields detected in the base document. Names with
    /// no detected field are kept as text fields so the export reports them.
    pub fn form_fields(&self, detected: &[DetectedField]) -> Vec<FormField> {
        self.fields
            .iter()
            .map(|fv| match detected.iter().find(|d| d.name == fv.name) {
                Some(found) => FormField {
                    value: fv.value.clone(),
                    ..FormField::from(found.clone())
                },
                None => FormField {
                    name: fv.name.clone(),
                    field_type: FormFieldType::Text,
                    value: fv.value.clone(),
                    rect: Rect::default(),
                    page: 1,
                    options: Vec::new(),
                },
            })
            .collect()
    }
}

/// Serialize annotations as a JSON array of flat records
pub fn annotations_to_json(annotations: &[Annotation]) -> Result<String, OverlayError> {
    let records: Vec<AnnotationRecord> = annotations.iter().map(AnnotationRecord::from).collect();
    serde_json::to_string(&records).map_err(|e| OverlayError::Serialization(e.to_string()))
}

/// Parse a JSON array of annotation records into canonical annotations
pub fn annotations_from_json(json: &str) -> Result<Vec<Annotation>, OverlayError> {
    let records: Vec<AnnotationRecord> =
        serde_json::from_str(json).map_err(|e| OverlayError::Validation(e.to_string()))?;
    records.iter().map(AnnotationRecord::to_annotation).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_minimal_record_gets_defaults() {
        let parsed = annotations_from_json(r#"[{"kind": "rectangle"}]"#).unwrap();
        assert_eq!(parsed.len(), 1);
        let a = &parsed[0];
        assert_eq!(a.page, 1);
        assert_eq!(a.color, Color::BLACK);
        assert_eq!(a.stroke_width, 2.0);
        assert_eq!(a.kind, AnnotationKind::Rectangle);
    }

    #[test]
    fn test_aliases_collapse() {
        let json = json!([
            {"type": "text", "x": 1, "y": 2, "value": "hi", "size": 20},
            {"kind": "signature", "signatureData": "data:image/png;base64,AAAA"},
            {"kind": "image", "image": "AAAA"}
        ])
        .to_string();
        let parsed = annotations_from_json(&json).unwrap();
        assert_eq!(
            parsed[0].kind,
            AnnotationKind::Text {
                text: "hi".to_string(),
                font_size: 20.0
            }
        );
        assert!(matches!(
            &parsed[1].kind,
            AnnotationKind::Signature(SignatureContent::Image { src }) if src.ends_with("AAAA")
        ));
        assert_eq!(parsed[2].kind.image_src(), Some("AAAA"));
    }

    #[test]
    fn test_points_accept_both_shapes() {
        let flat = annotations_from_json(r#"[{"kind": "freeform", "points": [1, 2, 3, 4]}]"#).unwrap();
        let objects = annotations_from_json(
            r#"[{"kind": "freeform", "points": [{"x": 1, "y": 2}, {"x": 3, "y": 4}]}]"#,
        )
        .unwrap();
        assert_eq!(flat, objects);
        assert_eq!(
            flat[0].kind.points().unwrap(),
            &[Point::new(1.0, 2.0), Point::new(3.0, 4.0)]
        );
    }

    #[test]
    fn test_odd_point_count_rejected() {
        let result = annotations_from_json(r#"[{"kind": "freeform", "points": [1, 2, 3]}]"#);
        assert!(matches!(result, Err(OverlayError::Validation(_))));
    }

    #[test]
    fn test_written_records_are_normalized() {
        let annotation = Annotation {
            id: 7,
            page: 2,
            rect: Rect::new(1.0, 2.0, 3.0, 4.0),
            color: Color::new(255, 0, 0),
            stroke_width: 1.5,
            kind: AnnotationKind::Checkmark,
        };
        let value: serde_json::Value =
            serde_json::from_str(&annotations_to_json(&[annotation]).unwrap()).unwrap();
        assert_eq!(
            value,
            json!([{
                "id": 7,
                "kind": "checkmark",
                "page": 2,
                "x": 1.0, "y": 2.0, "width": 3.0, "height": 4.0,
                "color": "#ff0000",
                "strokeWidth": 1.5,
                "points": [],
                "text": "",
                "fontSize": 16.0,
                "src": null
            }])
        );
    }

    #[test]
    fn test_bundle_numbers_elements_and_binds_fields() {
        let bundle = ElementBundle::from_json(
            &json!({
                "text": [{"x": 50, "y": 100, "value": "Name", "font": "Courier"}],
                "fields": [{"name": "agree", "value": "yes"}, {"name": "ghost", "value": "x"}],
                "annotations": [{"kind": "circle", "x": 5, "y": 5, "width": 10, "height": 10}]
            })
            .to_string(),
        )
        .unwrap();

        let text = bundle.text_elements(&TextStyle::default()).unwrap();
        assert_eq!(text[0].id, 1);
        assert_eq!(text[0].style.font_family, "Courier");
        assert_eq!(text[0].style.font_size, 16.0);
        assert_eq!(bundle.annotations().unwrap()[0].id, 2);

        let detected = vec![DetectedField {
            name: "agree".to_string(),
            field_type: FormFieldType::Checkbox,
            page: 1,
            rect: Rect::new(0.0, 0.0, 10.0, 10.0),
            value: "Off".to_string(),
            options: Vec::new(),
        }];
        let fields = bundle.form_fields(&detected);
        assert_eq!(fields[0].field_type, FormFieldType::Checkbox);
        assert_eq!(fields[0].value, "yes");
        assert_eq!(fields[1].name, "ghost");
    }
}
