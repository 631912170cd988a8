//! Coordinate transformation between view space and document space
//!
//! View space is what the user sees: top-left origin, scaled by the zoom
//! factor. Document space uses the same top-down orientation at zoom 1.0.
//! Only export flips into the bottom-up convention PDF content streams use.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn distance_to(self, other: Point) -> f64 {
        (self.x - other.x).hypot(self.y - other.y)
    }
}

/// Axis-aligned box, top-left anchored
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub const fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn center(&self) -> Point {
        Point::new(self.x + self.width / 2.0, self.y + self.height / 2.0)
    }

    pub fn scaled(&self, factor: f64) -> Rect {
        Rect::new(
            self.x * factor,
            self.y * factor,
            self.width * factor,
            self.height * factor,
        )
    }

    /// Shrink by `amount` on every side, never below zero size
    pub fn inset(&self, amount: f64) -> Rect {
        Rect::new(
            self.x + amount,
            self.y + amount,
            (self.width - 2.0 * amount).max(0.0),
            (self.height - 2.0 * amount).max(0.0),
        )
    }

    /// Point at a fractional position inside the box
    pub fn at(&self, fx: f64, fy: f64) -> Point {
        Point::new(self.x + self.width * fx, self.y + self.height * fy)
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.width.is_finite() && self.height.is_finite()
    }

    /// Smallest box containing every point, or `None` for an empty slice
    pub fn bounding(points: &[Point]) -> Option<Rect> {
        let first = points.first()?;
        let (mut min_x, mut min_y, mut max_x, mut max_y) = (first.x, first.y, first.x, first.y);
        for p in &points[1..] {
            min_x = min_x.min(p.x);
            min_y = min_y.min(p.y);
            max_x = max_x.max(p.x);
            max_y = max_y.max(p.y);
        }
        Some(Rect::new(min_x, min_y, max_x - min_x, max_y - min_y))
    }
}

/// Convert a view-space point (screen pixels at the given zoom) to document space
pub fn to_document_space(view_point: Point, zoom: f64) -> Point {
    Point::new(view_point.x / zoom, view_point.y / zoom)
}

/// Convert a document-space point to view space at the given zoom
pub fn to_view_space(document_point: Point, zoom: f64) -> Point {
    Point::new(document_point.x * zoom, document_point.y * zoom)
}

/// Flip from the top-down interactive convention to PDF's bottom-up one.
///
/// Applied per page with that page's own height, so mixed page sizes work.
pub fn flip_y(point: Point, page_height: f64) -> Point {
    Point::new(point.x, page_height - point.y)
}

/// Interactive view state. Not persisted.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ViewState {
    /// Current page (1-indexed)
    pub page: u32,
    pub zoom: f64,
    /// Native page size in pixels at zoom 1.0
    pub page_width: f64,
    pub page_height: f64,
}

impl Default for ViewState {
    fn default() -> Self {
        Self {
            page: 1,
            zoom: 1.0,
            page_width: 612.0,
            page_height: 792.0,
        }
    }
}

impl ViewState {
    pub fn to_document(&self, view_point: Point) -> Point {
        to_document_space(view_point, self.zoom)
    }

    pub fn to_view(&self, document_point: Point) -> Point {
        to_view_space(document_point, self.zoom)
    }

    /// Size of the page as currently displayed
    pub fn view_size(&self) -> (f64, f64) {
        (self.page_width * self.zoom, self.page_height * self.zoom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_document_space_divides_by_zoom() {
        let p = to_document_space(Point::new(300.0, 150.0), 1.5);
        assert_eq!(p, Point::new(200.0, 100.0));
    }

    #[test]
    fn test_flip_y_uses_page_height() {
        assert_eq!(flip_y(Point::new(50.0, 100.0), 792.0), Point::new(50.0, 692.0));
        // A4 page alongside a letter page
        assert_eq!(flip_y(Point::new(50.0, 100.0), 842.0), Point::new(50.0, 742.0));
    }

    #[test]
    fn test_rect_center_and_inset() {
        let r = Rect::new(10.0, 10.0, 50.0, 30.0);
        assert_eq!(r.center(), Point::new(35.0, 25.0));
        assert_eq!(r.inset(2.0), Rect::new(12.0, 12.0, 46.0, 26.0));
        assert_eq!(Rect::new(0.0, 0.0, 2.0, 2.0).inset(5.0).width, 0.0);
    }

    #[test]
    fn test_bounding_box() {
        let points = [
            Point::new(5.0, 9.0),
            Point::new(1.0, 12.0),
            Point::new(8.0, 3.0),
        ];
        assert_eq!(
            Rect::bounding(&points),
            Some(Rect::new(1.0, 3.0, 7.0, 9.0))
        );
        assert_eq!(Rect::bounding(&[]), None);
    }

    #[test]
    fn test_view_state_size() {
        let view = ViewState {
            zoom: 2.0,
            ..ViewState::default()
        };
        assert_eq!(view.view_size(), (1224.0, 1584.0));
    }
}
