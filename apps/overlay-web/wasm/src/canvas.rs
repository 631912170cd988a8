//! Canvas 2D surface
//!
//! Implements the engine's [`Surface`] over a browser
//! `CanvasRenderingContext2d`. Images are drawn from a cache of decoded
//! `HtmlImageElement`s keyed by their source string; the page registers
//! each image once it has finished loading.

use overlay_core::fonts::css_font;
use overlay_core::render::FontSpec;
use overlay_core::{Color, OverlayError, Point, Rect, Surface};
use std::collections::HashMap;
use std::f64::consts::TAU;
use wasm_bindgen::JsValue;
use web_sys::{CanvasRenderingContext2d, HtmlImageElement};

/// Loaded images, by source string
#[derive(Default)]
pub struct ImageCache {
    images: HashMap<String, HtmlImageElement>,
}

impl ImageCache {
    pub fn insert(&mut self, src: String, image: HtmlImageElement) {
        self.images.insert(src, image);
    }

    pub fn remove(&mut self, src: &str) -> bool {
        self.images.remove(src).is_some()
    }

    pub fn len(&self) -> usize {
        self.images.len()
    }

    pub fn is_empty(&self) -> bool {
        self.images.is_empty()
    }

    fn get(&self, src: &str) -> Option<&HtmlImageElement> {
        self.images.get(src)
    }
}

pub struct CanvasSurface<'a> {
    ctx: &'a CanvasRenderingContext2d,
    images: &'a ImageCache,
}

impl<'a> CanvasSurface<'a> {
    pub fn new(ctx: &'a CanvasRenderingContext2d, images: &'a ImageCache) -> Self {
        Self { ctx, images }
    }
}

fn js_error(what: &str, err: JsValue) -> OverlayError {
    let detail = err.as_string().unwrap_or_else(|| format!("{:?}", err));
    OverlayError::ResourceUnavailable(format!("{}: {}", what, detail))
}

fn css_color(color: Color) -> String {
    color.to_hex()
}

impl Surface for CanvasSurface<'_> {
    fn save(&mut self) {
        self.ctx.save();
    }

    fn restore(&mut self) {
        self.ctx.restore();
    }

    fn set_stroke(&mut self, color: Color, width: f64) {
        self.ctx.set_stroke_style_str(&css_color(color));
        self.ctx.set_line_width(width);
        self.ctx.set_line_cap("round");
        self.ctx.set_line_join("round");
    }

    fn set_fill(&mut self, color: Color) {
        self.ctx.set_fill_style_str(&css_color(color));
    }

    fn set_alpha(&mut self, alpha: f64) {
        self.ctx.set_global_alpha(alpha);
    }

    fn stroke_rect(&mut self, rect: Rect) {
        self.ctx.stroke_rect(rect.x, rect.y, rect.width, rect.height);
    }

    fn fill_rect(&mut self, rect: Rect) {
        self.ctx.fill_rect(rect.x, rect.y, rect.width, rect.height);
    }

    fn stroke_ellipse(&mut self, bounds: Rect) -> Result<(), OverlayError> {
        let center = bounds.center();
        self.ctx.begin_path();
        self.ctx
            .ellipse(
                center.x,
                center.y,
                (bounds.width / 2.0).abs(),
                (bounds.height / 2.0).abs(),
                0.0,
                0.0,
                TAU,
            )
            .map_err(|e| js_error("ellipse", e))?;
        self.ctx.stroke();
        Ok(())
    }

    fn stroke_polyline(&mut self, points: &[Point]) {
        let Some((first, rest)) = points.split_first() else {
            return;
        };
        self.ctx.begin_path();
        self.ctx.move_to(first.x, first.y);
        for p in rest {
            self.ctx.line_to(p.x, p.y);
        }
        self.ctx.stroke();
    }

    fn set_font(&mut self, font: &FontSpec) {
        self.ctx
            .set_font(&css_font(&font.family, font.size, font.bold, font.italic));
    }

    fn fill_text(&mut self, text: &str, origin: Point) -> Result<(), OverlayError> {
        self.ctx.set_text_baseline("alphabetic");
        self.ctx
            .fill_text(text, origin.x, origin.y)
            .map_err(|e| js_error("fill text", e))
    }

    fn measure_text(&mut self, text: &str) -> Result<f64, OverlayError> {
        self.ctx
            .measure_text(text)
            .map(|metrics| metrics.width())
            .map_err(|e| js_error("measure text", e))
    }

    fn draw_image(&mut self, src: &str, rect: Rect) -> Result<(), OverlayError> {
        let image = self
            .images
            .get(src)
            .ok_or_else(|| OverlayError::ResourceUnavailable("image not registered".to_string()))?;
        if !image.complete() || image.natural_width() == 0 {
            return Err(OverlayError::ResourceUnavailable(
                "image not decoded yet".to_string(),
            ));
        }
        self.ctx
            .draw_image_with_html_image_element_and_dw_and_dh(
                image,
                rect.x,
                rect.y,
                rect.width,
                rect.height,
            )
            .map_err(|e| js_error("draw image", e))
    }
}
