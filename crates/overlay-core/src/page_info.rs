//! Page geometry
//!
//! Per-page MediaBox and rotation, which the exporter needs to flip each
//! element into that page's bottom-up coordinate system. Document space is
//! the page as displayed, so on a rotated page it follows the rotation.

use crate::coords::{Point, Rect};
use crate::error::OverlayError;
use lopdf::{Dictionary, Document, Object, ObjectId};
use serde::Serialize;
use std::collections::BTreeMap;

/// Default page box when a document declares none (US Letter)
const LETTER: [f64; 4] = [0.0, 0.0, 612.0, 792.0];

/// Geometry of a single page
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PageGeometry {
    /// Page number (1-indexed)
    pub page_num: u32,
    /// MediaBox lower-left corner
    pub origin_x: f64,
    pub origin_y: f64,
    /// Page width in points (1 point = 1/72 inch)
    pub width: f64,
    /// Page height in points
    pub height: f64,
    /// Page rotation in degrees (0, 90, 180, 270)
    pub rotation: i32,
}

/// 2D affine transform `[a b c d e f]`, the operand order of the PDF `cm`
/// operator: `x' = a*x + c*y + e`, `y' = b*x + d*y + f`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Affine(pub [f64; 6]);

impl Affine {
    pub const IDENTITY: Affine = Affine([1.0, 0.0, 0.0, 1.0, 0.0, 0.0]);

    pub const fn translate(dx: f64, dy: f64) -> Self {
        Affine([1.0, 0.0, 0.0, 1.0, dx, dy])
    }

    pub fn apply(&self, x: f64, y: f64) -> (f64, f64) {
        let [a, b, c, d, e, f] = self.0;
        (a * x + c * y + e, b * x + d * y + f)
    }

    /// `self` applied after `inner`
    pub fn compose(&self, inner: &Affine) -> Affine {
        let [a1, b1, c1, d1, e1, f1] = self.0;
        let [a2, b2, c2, d2, e2, f2] = inner.0;
        Affine([
            a1 * a2 + c1 * b2,
            b1 * a2 + d1 * b2,
            a1 * c2 + c1 * d2,
            b1 * c2 + d1 * d2,
            a1 * e2 + c1 * f2 + e1,
            b1 * e2 + d1 * f2 + f1,
        ])
    }

    /// Inverse transform. Page transforms are rotations plus translations,
    /// so they are always invertible.
    pub fn invert(&self) -> Affine {
        let [a, b, c, d, e, f] = self.0;
        let det = a * d - b * c;
        Affine([
            d / det,
            -b / det,
            -c / det,
            a / det,
            (c * f - d * e) / det,
            (b * e - a * f) / det,
        ])
    }
}

impl PageGeometry {
    /// Size of the page as displayed, after `/Rotate`
    pub fn display_size(&self) -> (f64, f64) {
        match self.rotation {
            90 | 270 => (self.height, self.width),
            _ => (self.width, self.height),
        }
    }

    /// Maps the displayed page (bottom-up, origin at its lower-left corner)
    /// into PDF user space
    pub fn display_to_user(&self) -> Affine {
        let (w, h, ox, oy) = (self.width, self.height, self.origin_x, self.origin_y);
        match self.rotation {
            90 => Affine([0.0, 1.0, -1.0, 0.0, w + ox, oy]),
            180 => Affine([-1.0, 0.0, 0.0, -1.0, w + ox, h + oy]),
            270 => Affine([0.0, -1.0, 1.0, 0.0, ox, h + oy]),
            _ => Affine::translate(ox, oy),
        }
    }

    /// Top-down document point to the bottom-up displayed frame
    pub fn to_display(&self, x: f64, y: f64) -> (f64, f64) {
        (x, self.display_size().1 - y)
    }

    /// Convert a top-down document-space point to PDF user space
    pub fn to_pdf(&self, x: f64, y: f64) -> (f64, f64) {
        let (u, v) = self.to_display(x, y);
        self.display_to_user().apply(u, v)
    }

    /// PDF user-space rect `[x1 y1 x2 y2]` to a top-down document rect
    pub fn document_rect(&self, pdf: [f64; 4]) -> Rect {
        let [x1, y1, x2, y2] = pdf;
        let to_display = self.display_to_user().invert();
        let corners = [(x1, y1), (x2, y1), (x1, y2), (x2, y2)].map(|(x, y)| {
            let (u, v) = to_display.apply(x, y);
            Point::new(u, self.display_size().1 - v)
        });
        Rect::bounding(&corners).unwrap_or_default()
    }
}

/// Parse PDF bytes and return page count
pub fn page_count(bytes: &[u8]) -> Result<u32, OverlayError> {
    let doc = Document::load_mem(bytes).map_err(|e| OverlayError::Parse(e.to_string()))?;
    Ok(doc.get_pages().len() as u32)
}

/// Geometry for every page, keyed by page number
pub fn page_geometries(doc: &Document) -> BTreeMap<u32, PageGeometry> {
    doc.get_pages()
        .into_iter()
        .map(|(page_num, page_id)| (page_num, page_geometry(doc, page_num, page_id)))
        .collect()
}

/// Geometry for every page of a serialized document
pub fn page_geometries_from_bytes(bytes: &[u8]) -> Result<Vec<PageGeometry>, OverlayError> {
    let doc = Document::load_mem(bytes).map_err(|e| OverlayError::Parse(e.to_string()))?;
    Ok(page_geometries(&doc).into_values().collect())
}

pub(crate) fn page_geometry(doc: &Document, page_num: u32, page_id: ObjectId) -> PageGeometry {
    let media_box = inherited(doc, page_id, b"MediaBox")
        .and_then(|obj| parse_box(doc, obj))
        .unwrap_or(LETTER);
    let rotation = inherited(doc, page_id, b"Rotate")
        .and_then(|obj| obj.as_i64().ok())
        .map(|angle| normalize_rotation(angle as i32))
        .unwrap_or(0);

    let [x1, y1, x2, y2] = media_box;
    PageGeometry {
        page_num,
        origin_x: x1.min(x2),
        origin_y: y1.min(y2),
        width: (x2 - x1).abs(),
        height: (y2 - y1).abs(),
        rotation,
    }
}

/// Look up a page attribute, walking up the Pages tree for inherited values
fn inherited<'a>(doc: &'a Document, page_id: ObjectId, key: &[u8]) -> Option<&'a Object> {
    let mut current = doc.get_dictionary(page_id).ok();
    // Guard against Parent cycles in malformed files
    for _ in 0..64 {
        let dict: &Dictionary = current?;
        if let Ok(value) = dict.get(key) {
            return Some(resolve(doc, value));
        }
        current = dict
            .get(b"Parent")
            .and_then(Object::as_reference)
            .and_then(|id| doc.get_dictionary(id))
            .ok();
    }
    None
}

pub(crate) fn resolve<'a>(doc: &'a Document, obj: &'a Object) -> &'a Object {
    match obj {
        Object::Reference(id) => doc.get_object(*id).unwrap_or(obj),
        _ => obj,
    }
}

/// Parse a box array [x1, y1, x2, y2]
pub(crate) fn parse_box(doc: &Document, obj: &Object) -> Option<[f64; 4]> {
    let array = obj.as_array().ok()?;
    if array.len() != 4 {
        return None;
    }
    let mut result = [0.0; 4];
    for (slot, item) in result.iter_mut().zip(array) {
        *slot = match resolve(doc, item) {
            Object::Integer(n) => *n as f64,
            Object::Real(n) => *n as f64,
            _ => return None,
        };
    }
    Some(result)
}

/// Normalize rotation to 0, 90, 180, or 270
fn normalize_rotation(angle: i32) -> i32 {
    angle.rem_euclid(360)
}

#[cfg(test)]
mod tests {
    use super::*;
    use lopdf::dictionary;

    #[test]
    fn test_normalize_rotation() {
        assert_eq!(normalize_rotation(0), 0);
        assert_eq!(normalize_rotation(360), 0);
        assert_eq!(normalize_rotation(450), 90);
        assert_eq!(normalize_rotation(-90), 270);
    }

    #[test]
    fn test_media_box_inherited_from_pages_node() {
        let mut doc = Document::with_version("1.7");
        let pages_id = doc.new_object_id();
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
        });
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => vec![Object::Reference(page_id)],
                "Count" => 1,
                "MediaBox" => vec![0.into(), 0.into(), 595.into(), 842.into()],
                "Rotate" => 90,
            }),
        );
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);

        let geometry = page_geometries(&doc)[&1];
        assert_eq!(geometry.width, 595.0);
        assert_eq!(geometry.height, 842.0);
        assert_eq!(geometry.rotation, 90);
    }

    #[test]
    fn test_to_pdf_respects_offset_box() {
        let geometry = PageGeometry {
            page_num: 1,
            origin_x: 10.0,
            origin_y: 20.0,
            width: 612.0,
            height: 792.0,
            rotation: 0,
        };
        assert_eq!(geometry.to_pdf(50.0, 100.0), (60.0, 712.0));
    }

    fn rotated(rotation: i32) -> PageGeometry {
        PageGeometry {
            page_num: 1,
            origin_x: 0.0,
            origin_y: 0.0,
            width: 612.0,
            height: 792.0,
            rotation,
        }
    }

    #[test]
    fn test_quarter_turn_swaps_display_size() {
        assert_eq!(rotated(90).display_size(), (792.0, 612.0));
        assert_eq!(rotated(270).display_size(), (792.0, 612.0));
        assert_eq!(rotated(180).display_size(), (612.0, 792.0));
    }

    #[test]
    fn test_to_pdf_follows_rotation() {
        // Displayed top-left of a page turned clockwise is the user origin
        assert_eq!(rotated(90).to_pdf(0.0, 0.0), (0.0, 0.0));
        assert_eq!(rotated(90).to_pdf(10.0, 20.0), (20.0, 10.0));
        assert_eq!(rotated(180).to_pdf(0.0, 0.0), (612.0, 0.0));
        assert_eq!(rotated(270).to_pdf(0.0, 0.0), (612.0, 792.0));
    }

    #[test]
    fn test_document_rect_inverts_to_pdf() {
        let page = rotated(90);
        assert_eq!(
            page.document_rect([0.0, 0.0, 612.0, 792.0]),
            Rect::new(0.0, 0.0, 792.0, 612.0)
        );
        let rect = page.document_rect([20.0, 10.0, 70.0, 40.0]);
        assert_eq!(rect, Rect::new(10.0, 20.0, 30.0, 50.0));
    }

    #[test]
    fn test_affine_invert_round_trips() {
        let m = rotated(270).display_to_user();
        assert_eq!(m.invert().compose(&m), Affine::IDENTITY);
    }
}
