//! Render pipeline for the interactive overlay
//!
//! Draws a page's elements onto a [`Surface`] in insertion order, scaling all
//! geometry by the active zoom. Stroke widths and font sizes scale too, so the
//! overlay looks the same at every zoom level. Failures on one element (an
//! image that cannot be decoded, text the surface rejects) skip that element
//! and rendering continues.

use crate::color::Color;
use crate::coords::{Point, Rect};
use crate::error::OverlayError;
use crate::fonts::approx_text_width;
use crate::images::decode_image;
use crate::model::{Element, ElementId};
use crate::shapes::{annotation_drawing, text_element_drawing, Drawing, Primitive, TextRun};
use tracing::warn;

/// Font selection for [`Surface::fill_text`]
#[derive(Debug, Clone, PartialEq)]
pub struct FontSpec {
    pub family: String,
    /// Size in surface pixels (already zoomed)
    pub size: f64,
    pub bold: bool,
    pub italic: bool,
}

/// A 2D drawing target in view-space pixels
pub trait Surface {
    fn save(&mut self);
    fn restore(&mut self);
    fn set_stroke(&mut self, color: Color, width: f64);
    fn set_fill(&mut self, color: Color);
    fn set_alpha(&mut self, alpha: f64);
    fn stroke_rect(&mut self, rect: Rect);
    fn fill_rect(&mut self, rect: Rect);
    /// Stroke the ellipse inscribed in `bounds`
    fn stroke_ellipse(&mut self, bounds: Rect) -> Result<(), OverlayError>;
    fn stroke_polyline(&mut self, points: &[Point]);
    fn set_font(&mut self, font: &FontSpec);
    /// Fill text with its baseline starting at `origin`
    fn fill_text(&mut self, text: &str, origin: Point) -> Result<(), OverlayError>;
    /// Width of `text` in the current font
    fn measure_text(&mut self, text: &str) -> Result<f64, OverlayError>;
    /// Draw the bitmap referenced by `src` scaled into `rect`
    fn draw_image(&mut self, src: &str, rect: Rect) -> Result<(), OverlayError>;
}

#[derive(Debug, Clone, PartialEq)]
pub struct RenderOptions {
    pub zoom: f64,
    pub selected: Option<ElementId>,
    pub highlight_opacity: f64,
    pub selection_color: Color,
    /// Inset of the selection outline, in view pixels
    pub selection_inset: f64,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            zoom: 1.0,
            selected: None,
            highlight_opacity: 0.35,
            selection_color: Color::new(0x3b, 0x82, 0xf6),
            selection_inset: 2.0,
        }
    }
}

#[derive(Debug, Default)]
pub struct RenderReport {
    pub drawn: usize,
    pub skipped: Vec<(ElementId, OverlayError)>,
}

/// Draw elements in the given order. Callers pass one page's elements.
pub fn render_elements<'a, S, I>(surface: &mut S, elements: I, options: &RenderOptions) -> RenderReport
where
    S: Surface + ?Sized,
    I: IntoIterator<Item = &'a Element>,
{
    let mut report = RenderReport::default();

    for element in elements {
        let drawing = match element {
            Element::Text(t) => text_element_drawing(t),
            Element::Annotation(a) => annotation_drawing(a, options.highlight_opacity),
        };

        surface.save();
        let result = draw(surface, &drawing, options.zoom);
        surface.restore();

        match result {
            Ok(()) => {
                report.drawn += 1;
                if options.selected == Some(element.id()) {
                    draw_selection(surface, &element.rect(), options);
                }
            }
            Err(e) => {
                warn!(id = element.id(), error = %e, "skipping element during render");
                report.skipped.push((element.id(), e));
            }
        }
    }

    report
}

fn draw<S: Surface + ?Sized>(surface: &mut S, drawing: &Drawing, zoom: f64) -> Result<(), OverlayError> {
    surface.set_stroke(drawing.color, drawing.stroke_width * zoom);
    surface.set_fill(drawing.color);

    for primitive in &drawing.primitives {
        match primitive {
            Primitive::StrokeRect(rect) => surface.stroke_rect(rect.scaled(zoom)),
            Primitive::FillRect { rect, opacity } => {
                surface.set_alpha(*opacity);
                surface.fill_rect(rect.scaled(zoom));
                surface.set_alpha(1.0);
            }
            Primitive::StrokeEllipse(rect) => surface.stroke_ellipse(rect.scaled(zoom))?,
            Primitive::Polyline(points) => {
                let scaled: Vec<Point> = points
                    .iter()
                    .map(|p| Point::new(p.x * zoom, p.y * zoom))
                    .collect();
                surface.stroke_polyline(&scaled);
            }
            Primitive::Text(run) => draw_text(surface, run, drawing, zoom)?,
            Primitive::Image { src, rect } => surface.draw_image(src, rect.scaled(zoom))?,
        }
    }
    Ok(())
}

fn draw_text<S: Surface + ?Sized>(
    surface: &mut S,
    run: &TextRun,
    drawing: &Drawing,
    zoom: f64,
) -> Result<(), OverlayError> {
    surface.set_font(&FontSpec {
        family: run.font_family.clone(),
        size: run.font_size * zoom,
        bold: run.bold,
        italic: run.italic,
    });
    let origin = Point::new(run.origin.x * zoom, run.origin.y * zoom);
    surface.fill_text(&run.text, origin)?;

    if run.underline {
        let width = surface.measure_text(&run.text)?;
        let offset = run.font_size * zoom * 0.12;
        surface.set_stroke(drawing.color, drawing.stroke_width * zoom);
        surface.stroke_polyline(&[
            Point::new(origin.x, origin.y + offset),
            Point::new(origin.x + width, origin.y + offset),
        ]);
    }
    Ok(())
}

fn draw_selection<S: Surface + ?Sized>(surface: &mut S, rect: &Rect, options: &RenderOptions) {
    surface.save();
    surface.set_stroke(options.selection_color, 1.0);
    surface.stroke_rect(rect.scaled(options.zoom).inset(options.selection_inset));
    surface.restore();
}

/// One recorded call on a [`RecordingSurface`]
#[derive(Debug, Clone, PartialEq)]
pub enum DrawCommand {
    Save,
    Restore,
    Stroke { color: Color, width: f64 },
    Fill { color: Color },
    Alpha(f64),
    StrokeRect(Rect),
    FillRect(Rect),
    StrokeEllipse(Rect),
    Polyline(Vec<Point>),
    Font(FontSpec),
    Text { text: String, origin: Point },
    Image { src: String, rect: Rect },
}

/// Surface that records draw calls instead of rasterizing.
///
/// Used for headless rendering and tests. Images are decoded so an
/// unreadable source fails the same way it would on a real canvas.
#[derive(Debug, Default)]
pub struct RecordingSurface {
    pub commands: Vec<DrawCommand>,
    font: Option<FontSpec>,
}

impl RecordingSurface {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Surface for RecordingSurface {
    fn save(&mut self) {
        self.commands.push(DrawCommand::Save);
    }

    fn restore(&mut self) {
        self.commands.push(DrawCommand::Restore);
    }

    fn set_stroke(&mut self, color: Color, width: f64) {
        self.commands.push(DrawCommand::Stroke { color, width });
    }

    fn set_fill(&mut self, color: Color) {
        self.commands.push(DrawCommand::Fill { color });
    }

    fn set_alpha(&mut self, alpha: f64) {
        self.commands.push(DrawCommand::Alpha(alpha));
    }

    fn stroke_rect(&mut self, rect: Rect) {
        self.commands.push(DrawCommand::StrokeRect(rect));
    }

    fn fill_rect(&mut self, rect: Rect) {
        self.commands.push(DrawCommand::FillRect(rect));
    }

    fn stroke_ellipse(&mut self, bounds: Rect) -> Result<(), OverlayError> {
        self.commands.push(DrawCommand::StrokeEllipse(bounds));
        Ok(())
    }

    fn stroke_polyline(&mut self, points: &[Point]) {
        self.commands.push(DrawCommand::Polyline(points.to_vec()));
    }

    fn set_font(&mut self, font: &FontSpec) {
        self.font = Some(font.clone());
        self.commands.push(DrawCommand::Font(font.clone()));
    }

    fn fill_text(&mut self, text: &str, origin: Point) -> Result<(), OverlayError> {
        self.commands.push(DrawCommand::Text {
            text: text.to_string(),
            origin,
        });
        Ok(())
    }

    fn measure_text(&mut self, text: &str) -> Result<f64, OverlayError> {
        let font = self
            .font
            .as_ref()
            .ok_or_else(|| OverlayError::ResourceUnavailable("no font set".to_string()))?;
        Ok(approx_text_width(text, &font.family, font.size))
    }

    fn draw_image(&mut self, src: &str, rect: Rect) -> Result<(), OverlayError> {
        decode_image(src)?;
        self.commands.push(DrawCommand::Image {
            src: src.to_string(),
            rect,
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Annotation, AnnotationKind, TextElement, TextStyle};

    fn annotation(id: ElementId, kind: AnnotationKind) -> Element {
        Element::Annotation(Annotation {
            id,
            page: 1,
            rect: Rect::new(10.0, 10.0, 50.0, 30.0),
            color: Color::new(255, 0, 0),
            stroke_width: 2.0,
            kind,
        })
    }

    #[test]
    fn test_geometry_and_stroke_scale_with_zoom() {
        let mut surface = RecordingSurface::new();
        let options = RenderOptions {
            zoom: 2.0,
            ..RenderOptions::default()
        };
        let el = annotation(1, AnnotationKind::Rectangle);
        let report = render_elements(&mut surface, [&el], &options);

        assert_eq!(report.drawn, 1);
        assert!(surface.commands.contains(&DrawCommand::Stroke {
            color: Color::new(255, 0, 0),
            width: 4.0
        }));
        assert!(surface
            .commands
            .contains(&DrawCommand::StrokeRect(Rect::new(20.0, 20.0, 100.0, 60.0))));
    }

    #[test]
    fn test_highlight_restores_alpha() {
        let mut surface = RecordingSurface::new();
        let el = annotation(1, AnnotationKind::Highlight);
        render_elements(&mut surface, [&el], &RenderOptions::default());

        let alphas: Vec<f64> = surface
            .commands
            .iter()
            .filter_map(|c| match c {
                DrawCommand::Alpha(a) => Some(*a),
                _ => None,
            })
            .collect();
        assert_eq!(alphas, vec![0.35, 1.0]);
        assert!(!surface
            .commands
            .iter()
            .any(|c| matches!(c, DrawCommand::StrokeRect(_))));
    }

    #[test]
    fn test_insertion_order_preserved() {
        let mut surface = RecordingSurface::new();
        let first = annotation(1, AnnotationKind::Rectangle);
        let second = annotation(2, AnnotationKind::Circle);
        render_elements(&mut surface, [&first, &second], &RenderOptions::default());

        let rect_at = surface
            .commands
            .iter()
            .position(|c| matches!(c, DrawCommand::StrokeRect(_)))
            .unwrap();
        let ellipse_at = surface
            .commands
            .iter()
            .position(|c| matches!(c, DrawCommand::StrokeEllipse(_)))
            .unwrap();
        assert!(rect_at < ellipse_at);
    }

    #[test]
    fn test_bad_image_is_skipped() {
        let mut surface = RecordingSurface::new();
        let broken = annotation(
            1,
            AnnotationKind::Image {
                src: "data:image/png;base64,bm90IGFuIGltYWdl".to_string(),
            },
        );
        let fine = annotation(2, AnnotationKind::Checkmark);
        let report = render_elements(&mut surface, [&broken, &fine], &RenderOptions::default());

        assert_eq!(report.drawn, 1);
        assert_eq!(report.skipped.len(), 1);
        assert_eq!(report.skipped[0].0, 1);
        assert!(matches!(
            report.skipped[0].1,
            OverlayError::ResourceUnavailable(_)
        ));
    }

    #[test]
    fn test_selected_element_gets_inset_outline() {
        let mut surface = RecordingSurface::new();
        let el = annotation(9, AnnotationKind::Circle);
        let options = RenderOptions {
            selected: Some(9),
            ..RenderOptions::default()
        };
        render_elements(&mut surface, [&el], &options);
        assert!(surface
            .commands
            .contains(&DrawCommand::StrokeRect(Rect::new(12.0, 12.0, 46.0, 26.0))));
    }

    #[test]
    fn test_underline_uses_measured_width() {
        let mut surface = RecordingSurface::new();
        let el = Element::Text(TextElement {
            id: 1,
            page: 1,
            rect: Rect::new(0.0, 0.0, 100.0, 20.0),
            text: "abcd".to_string(),
            style: TextStyle {
                font_family: "Courier".to_string(),
                font_size: 10.0,
                underline: true,
                ..TextStyle::default()
            },
        });
        render_elements(&mut surface, [&el], &RenderOptions::default());

        let underline = surface
            .commands
            .iter()
            .find_map(|c| match c {
                DrawCommand::Polyline(points) => Some(points.clone()),
                _ => None,
            })
            .unwrap();
        assert!((underline[1].x - underline[0].x - 24.0).abs() < 1e-9);
        assert!(underline[0].y > 10.0);
    }
}
