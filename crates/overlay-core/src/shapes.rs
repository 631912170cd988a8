//! Per-kind drawing geometry
//!
//! Both the interactive renderer and the PDF exporter draw elements from the
//! same primitive list, so an annotation looks identical on screen and in the
//! exported file. Geometry here is document space, top-down.

use crate::color::Color;
use crate::coords::{Point, Rect};
use crate::model::{Annotation, AnnotationKind, SignatureContent, TextElement};

/// Distance between baselines of consecutive text lines, in font sizes
pub const LINE_HEIGHT: f64 = 1.2;

/// Bezier control point offset for approximating a quarter ellipse
pub const BEZIER_K: f64 = 0.552_284_75;

/// Font used for text annotations, which carry only a size
pub const ANNOTATION_FONT: &str = "Helvetica";

#[derive(Debug, Clone, PartialEq)]
pub struct TextRun {
    pub text: String,
    /// Baseline start point
    pub origin: Point,
    pub font_family: String,
    pub font_size: f64,
    pub bold: bool,
    pub italic: bool,
    pub underline: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Primitive {
    StrokeRect(Rect),
    FillRect { rect: Rect, opacity: f64 },
    /// Ellipse inscribed in the rect
    StrokeEllipse(Rect),
    Polyline(Vec<Point>),
    Text(TextRun),
    Image { src: String, rect: Rect },
}

/// Primitives plus the paint they share
#[derive(Debug, Clone, PartialEq)]
pub struct Drawing {
    pub color: Color,
    pub stroke_width: f64,
    pub primitives: Vec<Primitive>,
}

/// Checkmark stroke through 20%,50% -> 40%,70% -> 80%,30% of the box
pub fn checkmark_points(rect: &Rect) -> Vec<Point> {
    vec![rect.at(0.2, 0.5), rect.at(0.4, 0.7), rect.at(0.8, 0.3)]
}

/// The two corner-to-corner diagonals of an x-mark
pub fn x_mark_strokes(rect: &Rect) -> [Vec<Point>; 2] {
    [
        vec![rect.at(0.0, 0.0), rect.at(1.0, 1.0)],
        vec![rect.at(1.0, 0.0), rect.at(0.0, 1.0)],
    ]
}

/// One text run per line, first baseline one font size below the top
pub fn text_runs(
    text: &str,
    top_left: Point,
    font_family: &str,
    font_size: f64,
    bold: bool,
    italic: bool,
    underline: bool,
) -> Vec<TextRun> {
    text.lines()
        .enumerate()
        .filter(|(_, line)| !line.is_empty())
        .map(|(i, line)| TextRun {
            text: line.to_string(),
            origin: Point::new(
                top_left.x,
                top_left.y + font_size + i as f64 * font_size * LINE_HEIGHT,
            ),
            font_family: font_family.to_string(),
            font_size,
            bold,
            italic,
            underline,
        })
        .collect()
}

pub fn text_element_drawing(element: &TextElement) -> Drawing {
    let style = &element.style;
    let runs = text_runs(
        &element.text,
        Point::new(element.rect.x, element.rect.y),
        &style.font_family,
        style.font_size,
        style.bold,
        style.italic,
        style.underline,
    );
    Drawing {
        color: style.color,
        stroke_width: (style.font_size / 15.0).max(0.5),
        primitives: runs.into_iter().map(Primitive::Text).collect(),
    }
}

/// Geometry for one annotation. Highlights fill at `highlight_opacity`.
pub fn annotation_drawing(annotation: &Annotation, highlight_opacity: f64) -> Drawing {
    let rect = annotation.rect;
    let primitives = match &annotation.kind {
        AnnotationKind::Rectangle => vec![Primitive::StrokeRect(rect)],
        AnnotationKind::Highlight => vec![Primitive::FillRect {
            rect,
            opacity: highlight_opacity,
        }],
        AnnotationKind::Circle => vec![Primitive::StrokeEllipse(rect)],
        AnnotationKind::Line => vec![Primitive::Polyline(vec![
            Point::new(rect.x, rect.y),
            Point::new(rect.x + rect.width, rect.y + rect.height),
        ])],
        AnnotationKind::Freeform { points }
        | AnnotationKind::Signature(SignatureContent::Path { points }) => {
            vec![Primitive::Polyline(points.clone())]
        }
        AnnotationKind::Signature(SignatureContent::Image { src })
        | AnnotationKind::Image { src } => vec![Primitive::Image {
            src: src.clone(),
            rect,
        }],
        AnnotationKind::Checkmark => vec![Primitive::Polyline(checkmark_points(&rect))],
        AnnotationKind::XMark => x_mark_strokes(&rect)
            .into_iter()
            .map(Primitive::Polyline)
            .collect(),
        AnnotationKind::Text { text, font_size } => text_runs(
            text,
            Point::new(rect.x, rect.y),
            ANNOTATION_FONT,
            *font_size,
            false,
            false,
            false,
        )
        .into_iter()
        .map(Primitive::Text)
        .collect(),
    };

    Drawing {
        color: annotation.color,
        stroke_width: annotation.stroke_width,
        primitives,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::TextStyle;

    fn annotation(kind: AnnotationKind) -> Annotation {
        Annotation {
            id: 0,
            page: 1,
            rect: Rect::new(0.0, 0.0, 100.0, 100.0),
            color: Color::BLACK,
            stroke_width: 2.0,
            kind,
        }
    }

    #[test]
    fn test_checkmark_offsets() {
        let points = checkmark_points(&Rect::new(0.0, 0.0, 100.0, 100.0));
        assert_eq!(
            points,
            vec![
                Point::new(20.0, 50.0),
                Point::new(40.0, 70.0),
                Point::new(80.0, 30.0)
            ]
        );
    }

    #[test]
    fn test_line_runs_corner_to_corner() {
        let mut a = annotation(AnnotationKind::Line);
        a.rect = Rect::new(10.0, 20.0, 30.0, -5.0);
        let drawing = annotation_drawing(&a, 0.3);
        assert_eq!(
            drawing.primitives,
            vec![Primitive::Polyline(vec![
                Point::new(10.0, 20.0),
                Point::new(40.0, 15.0)
            ])]
        );
    }

    #[test]
    fn test_x_mark_has_two_strokes() {
        let drawing = annotation_drawing(&annotation(AnnotationKind::XMark), 0.3);
        assert_eq!(drawing.primitives.len(), 2);
    }

    #[test]
    fn test_highlight_is_fill_only() {
        let drawing = annotation_drawing(&annotation(AnnotationKind::Highlight), 0.35);
        assert!(matches!(
            drawing.primitives.as_slice(),
            [Primitive::FillRect { opacity, .. }] if (*opacity - 0.35).abs() < 1e-9
        ));
    }

    #[test]
    fn test_signature_variants() {
        let path = annotation(AnnotationKind::Signature(SignatureContent::Path {
            points: vec![Point::new(1.0, 1.0), Point::new(2.0, 2.0)],
        }));
        assert!(matches!(
            annotation_drawing(&path, 0.3).primitives[0],
            Primitive::Polyline(_)
        ));

        let image = annotation(AnnotationKind::Signature(SignatureContent::Image {
            src: "data:image/png;base64,AAAA".to_string(),
        }));
        assert!(matches!(
            annotation_drawing(&image, 0.3).primitives[0],
            Primitive::Image { .. }
        ));
    }

    #[test]
    fn test_text_baselines() {
        let element = TextElement {
            id: 0,
            page: 1,
            rect: Rect::new(50.0, 100.0, 200.0, 40.0),
            text: "one\ntwo".to_string(),
            style: TextStyle {
                font_size: 10.0,
                ..TextStyle::default()
            },
        };
        let drawing = text_element_drawing(&element);
        let origins: Vec<Point> = drawing
            .primitives
            .iter()
            .map(|p| match p {
                Primitive::Text(run) => run.origin,
                other => panic!("unexpected primitive {:?}", other),
            })
            .collect();
        assert_eq!(origins, vec![Point::new(50.0, 110.0), Point::new(50.0, 122.0)]);
    }
}
