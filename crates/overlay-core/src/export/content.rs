//! Page content writer
//!
//! Collects content-stream operators for one page, registers the fonts,
//! graphics states and images they reference, and appends everything to the
//! page on commit. Input geometry is top-down document space; conversion to
//! PDF user space happens here using the page's own geometry.

use crate::color::Color;
use crate::coords::{Point, Rect};
use crate::error::OverlayError;
use crate::fonts::approx_text_width;
use crate::images::{DecodedImage, ImageData};
use crate::page_info::{resolve, Affine, PageGeometry};
use crate::shapes::{Drawing, Primitive, TextRun, BEZIER_K};
use flate2::write::ZlibEncoder;
use flate2::Compression;
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Dictionary, Document, Object, ObjectId, Stream, StringFormat};
use std::collections::{HashMap, HashSet};
use std::io::Write;

/// Font objects shared by every page written in one pass
#[derive(Debug, Default)]
pub(crate) struct FontCache {
    fonts: HashMap<&'static str, ObjectId>,
}

impl FontCache {
    fn object_for(&mut self, doc: &mut Document, base_font: &'static str) -> ObjectId {
        *self.fonts.entry(base_font).or_insert_with(|| {
            doc.add_object(dictionary! {
                "Type" => "Font",
                "Subtype" => "Type1",
                "BaseFont" => Object::Name(base_font.as_bytes().to_vec()),
                "Encoding" => "WinAnsiEncoding",
            })
        })
    }
}

pub(crate) struct PageCanvas {
    page_id: ObjectId,
    geometry: PageGeometry,
    resources: Dictionary,
    taken: HashSet<Vec<u8>>,
    page_fonts: HashMap<&'static str, String>,
    ops: Vec<Operation>,
}

impl PageCanvas {
    pub(crate) fn new(doc: &Document, page_id: ObjectId, geometry: PageGeometry) -> Self {
        let resources = page_resources(doc, page_id);
        let mut taken = HashSet::new();
        for category in [&b"Font"[..], b"XObject", b"ExtGState"] {
            if let Ok(Object::Dictionary(sub)) = resources.get(category) {
                taken.extend(sub.iter().map(|(name, _)| name.clone()));
            }
        }
        Self {
            page_id,
            geometry,
            resources,
            taken,
            page_fonts: HashMap::new(),
            ops: Vec::new(),
        }
    }

    pub(crate) fn geometry(&self) -> &PageGeometry {
        &self.geometry
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    /// Append one element's operators, wrapped in their own graphics state
    pub(crate) fn push_element(&mut self, ops: Vec<Operation>) {
        if ops.is_empty() {
            return;
        }
        self.ops.push(Operation::new("q", vec![]));
        self.ops.extend(ops);
        self.ops.push(Operation::new("Q", vec![]));
    }

    /// Operators for a full drawing. Images are decoded before anything is
    /// emitted, so a failure leaves the page untouched.
    pub(crate) fn drawing_ops(
        &mut self,
        doc: &mut Document,
        fonts: &mut FontCache,
        drawing: &Drawing,
    ) -> Result<Vec<Operation>, OverlayError> {
        let mut ops = Vec::new();
        let (r, g, b) = drawing.color.rgb();
        ops.push(op("RG", &[r, g, b]));
        ops.push(op("rg", &[r, g, b]));
        ops.push(op("w", &[drawing.stroke_width as f32]));
        ops.push(Operation::new("J", vec![Object::Integer(1)]));
        ops.push(Operation::new("j", vec![Object::Integer(1)]));

        for primitive in &drawing.primitives {
            match primitive {
                Primitive::StrokeRect(rect) => {
                    ops.push(self.rect_op(rect));
                    ops.push(Operation::new("S", vec![]));
                }
                Primitive::FillRect { rect, opacity } => {
                    let gs = self.alpha_state(doc, *opacity);
                    ops.push(Operation::new("q", vec![]));
                    ops.push(Operation::new("gs", vec![Object::Name(gs.into_bytes())]));
                    ops.push(self.rect_op(rect));
                    ops.push(Operation::new("f", vec![]));
                    ops.push(Operation::new("Q", vec![]));
                }
                Primitive::StrokeEllipse(rect) => {
                    ops.extend(self.ellipse_ops(rect));
                    ops.push(Operation::new("S", vec![]));
                }
                Primitive::Polyline(points) => {
                    ops.extend(self.polyline_ops(points));
                    ops.push(Operation::new("S", vec![]));
                }
                Primitive::Text(run) => {
                    ops.extend(self.text_ops(doc, fonts, run, drawing.color, drawing.stroke_width));
                }
                Primitive::Image { src, rect } => {
                    let decoded = crate::images::decode_image(src)?;
                    let name = self.add_image(doc, &decoded)?;
                    ops.extend(self.image_ops(&name, rect));
                }
            }
        }
        Ok(ops)
    }

    /// Filled ellipse inscribed in `rect`
    pub(crate) fn fill_ellipse_ops(&self, rect: &Rect, color: Color) -> Vec<Operation> {
        let (r, g, b) = color.rgb();
        let mut ops = vec![op("rg", &[r, g, b])];
        ops.extend(self.ellipse_ops(rect));
        ops.push(Operation::new("f", vec![]));
        ops
    }

    /// Page-local point in the displayed frame. `commit` maps that frame
    /// onto the page's user space.
    fn pdf(&self, p: Point) -> (f32, f32) {
        let (x, y) = self.geometry.to_display(p.x, p.y);
        (x as f32, y as f32)
    }

    fn rect_op(&self, rect: &Rect) -> Operation {
        // Lower-left corner in PDF space is the top-down bottom-left
        let (x, y) = self.pdf(Point::new(rect.x, rect.y + rect.height));
        op("re", &[x, y, rect.width as f32, rect.height as f32])
    }

    fn ellipse_ops(&self, rect: &Rect) -> Vec<Operation> {
        let c = rect.center();
        let (cx, cy) = self.pdf(c);
        let rx = (rect.width / 2.0) as f32;
        let ry = (rect.height / 2.0) as f32;
        let kx = rx * BEZIER_K as f32;
        let ky = ry * BEZIER_K as f32;
        vec![
            op("m", &[cx + rx, cy]),
            op("c", &[cx + rx, cy + ky, cx + kx, cy + ry, cx, cy + ry]),
            op("c", &[cx - kx, cy + ry, cx - rx, cy + ky, cx - rx, cy]),
            op("c", &[cx - rx, cy - ky, cx - kx, cy - ry, cx, cy - ry]),
            op("c", &[cx + kx, cy - ry, cx + rx, cy - ky, cx + rx, cy]),
            Operation::new("h", vec![]),
        ]
    }

    fn polyline_ops(&self, points: &[Point]) -> Vec<Operation> {
        let mut ops = Vec::with_capacity(points.len() + 1);
        let Some(first) = points.first() else {
            return ops;
        };
        let (x, y) = self.pdf(*first);
        ops.push(op("m", &[x, y]));
        if points.len() == 1 {
            // Zero-length segment so round caps leave a dot
            ops.push(op("l", &[x, y]));
        }
        for p in &points[1..] {
            let (x, y) = self.pdf(*p);
            ops.push(op("l", &[x, y]));
        }
        ops
    }

    pub(crate) fn text_ops(
        &mut self,
        doc: &mut Document,
        fonts: &mut FontCache,
        run: &TextRun,
        color: Color,
        underline_width: f64,
    ) -> Vec<Operation> {
        let base_font = crate::fonts::standard_font(&run.font_family, run.bold, run.italic);
        let font_name = self.font(doc, fonts, base_font);
        let (r, g, b) = color.rgb();
        let (x, y) = self.pdf(run.origin);

        let mut ops = vec![
            Operation::new("BT", vec![]),
            Operation::new(
                "Tf",
                vec![
                    Object::Name(font_name.into_bytes()),
                    Object::Real(run.font_size as f32),
                ],
            ),
            op("rg", &[r, g, b]),
            op("Td", &[x, y]),
            Operation::new(
                "Tj",
                vec![Object::String(encode_win_ansi(&run.text), StringFormat::Literal)],
            ),
            Operation::new("ET", vec![]),
        ];

        if run.underline {
            let width = approx_text_width(&run.text, &run.font_family, run.font_size) as f32;
            let offset = (run.font_size * 0.12) as f32;
            ops.extend([
                op("RG", &[r, g, b]),
                op("w", &[underline_width as f32]),
                op("m", &[x, y - offset]),
                op("l", &[x + width, y - offset]),
                Operation::new("S", vec![]),
            ]);
        }
        ops
    }

    fn image_ops(&self, name: &str, rect: &Rect) -> Vec<Operation> {
        let (x, y) = self.pdf(Point::new(rect.x, rect.y + rect.height));
        vec![
            Operation::new("q", vec![]),
            op("cm", &[rect.width as f32, 0.0, 0.0, rect.height as f32, x, y]),
            Operation::new("Do", vec![Object::Name(name.as_bytes().to_vec())]),
            Operation::new("Q", vec![]),
        ]
    }

    /// Draw an existing form XObject with its bounding box mapped onto `rect`
    /// Place a form XObject so its bbox origin lands on the lower-left
    /// corner of `pdf_rect`, given in the page's user space
    pub(crate) fn form_xobject_ops(&mut self, form_id: ObjectId, bbox: [f64; 4], pdf_rect: [f64; 4]) -> Vec<Operation> {
        let name = self.fresh_name("OvlAp");
        self.register(b"XObject", &name, Object::Reference(form_id));
        let [x1, y1, x2, y2] = pdf_rect;
        let placement = Affine::translate(x1.min(x2) - bbox[0], y1.min(y2) - bbox[1]);
        let m = self.geometry.display_to_user().invert().compose(&placement);
        vec![
            op("cm", &m.0.map(|v| v as f32)),
            Operation::new("Do", vec![Object::Name(name.into_bytes())]),
        ]
    }

    fn font(&mut self, doc: &mut Document, fonts: &mut FontCache, base_font: &'static str) -> String {
        if let Some(name) = self.page_fonts.get(base_font) {
            return name.clone();
        }
        let font_id = fonts.object_for(doc, base_font);
        let name = self.fresh_name("OvlF");
        self.register(b"Font", &name, Object::Reference(font_id));
        self.page_fonts.insert(base_font, name.clone());
        name
    }

    fn alpha_state(&mut self, doc: &mut Document, alpha: f64) -> String {
        let gs_id = doc.add_object(dictionary! {
            "Type" => "ExtGState",
            "ca" => Object::Real(alpha as f32),
            "CA" => Object::Real(alpha as f32),
        });
        let name = self.fresh_name("OvlGs");
        self.register(b"ExtGState", &name, Object::Reference(gs_id));
        name
    }

    fn add_image(&mut self, doc: &mut Document, image: &DecodedImage) -> Result<String, OverlayError> {
        let mut dict = dictionary! {
            "Type" => "XObject",
            "Subtype" => "Image",
            "Width" => Object::Integer(image.width as i64),
            "Height" => Object::Integer(image.height as i64),
            "BitsPerComponent" => 8,
        };

        let content = match &image.data {
            ImageData::Jpeg { data, components } => {
                let space = match components {
                    1 => "DeviceGray",
                    4 => "DeviceCMYK",
                    _ => "DeviceRGB",
                };
                dict.set("ColorSpace", Object::Name(space.as_bytes().to_vec()));
                dict.set("Filter", "DCTDecode");
                if *components == 4 {
                    // Adobe CMYK JPEGs are stored inverted
                    dict.set(
                        "Decode",
                        vec![1.into(), 0.into(), 1.into(), 0.into(), 1.into(), 0.into(), 1.into(), 0.into()],
                    );
                }
                data.clone()
            }
            ImageData::Raw { rgb, alpha } => {
                dict.set("ColorSpace", "DeviceRGB");
                dict.set("Filter", "FlateDecode");
                if let Some(alpha) = alpha {
                    let smask = Stream::new(
                        dictionary! {
                            "Type" => "XObject",
                            "Subtype" => "Image",
                            "Width" => Object::Integer(image.width as i64),
                            "Height" => Object::Integer(image.height as i64),
                            "BitsPerComponent" => 8,
                            "ColorSpace" => "DeviceGray",
                            "Filter" => "FlateDecode",
                        },
                        deflate(alpha)?,
                    )
                    .with_compression(false);
                    let smask_id = doc.add_object(smask);
                    dict.set("SMask", Object::Reference(smask_id));
                }
                deflate(rgb)?
            }
        };

        let image_id = doc.add_object(Stream::new(dict, content).with_compression(false));
        let name = self.fresh_name("OvlIm");
        self.register(b"XObject", &name, Object::Reference(image_id));
        Ok(name)
    }

    fn fresh_name(&mut self, prefix: &str) -> String {
        let mut n = 1;
        loop {
            let candidate = format!("{}{}", prefix, n);
            if self.taken.insert(candidate.as_bytes().to_vec()) {
                return candidate;
            }
            n += 1;
        }
    }

    fn register(&mut self, category: &[u8], name: &str, value: Object) {
        if !matches!(self.resources.get(category), Ok(Object::Dictionary(_))) {
            self.resources.set(category.to_vec(), Object::Dictionary(Dictionary::new()));
        }
        if let Ok(Object::Dictionary(sub)) = self.resources.get_mut(category) {
            sub.set(name.as_bytes().to_vec(), value);
        }
    }

    /// Append the collected operators to the page
    pub(crate) fn commit(self, doc: &mut Document) -> Result<(), OverlayError> {
        if self.ops.is_empty() {
            return Ok(());
        }

        let mut ops = vec![Operation::new("Q", vec![]), Operation::new("q", vec![])];
        let frame = self.geometry.display_to_user();
        if frame != Affine::IDENTITY {
            ops.push(op("cm", &frame.0.map(|v| v as f32)));
        }
        ops.extend(self.ops);
        ops.push(Operation::new("Q", vec![]));
        let encoded = Content { operations: ops }
            .encode()
            .map_err(|e| OverlayError::Serialization(e.to_string()))?;

        let save_id = doc.add_object(Stream::new(Dictionary::new(), b"q\n".to_vec()));
        let overlay_id = doc.add_object(Stream::new(Dictionary::new(), encoded));

        let page = doc
            .get_dictionary_mut(self.page_id)
            .map_err(|e| OverlayError::Serialization(e.to_string()))?;

        let mut contents = vec![Object::Reference(save_id)];
        match page.get(b"Contents") {
            Ok(Object::Array(existing)) => contents.extend(existing.iter().cloned()),
            Ok(existing) => contents.push(existing.clone()),
            Err(_) => {}
        }
        contents.push(Object::Reference(overlay_id));
        page.set("Contents", Object::Array(contents));
        page.set("Resources", Object::Dictionary(self.resources));
        Ok(())
    }
}

/// Resolved copy of the page's resources, inherited ones included.
/// Sub-dictionaries are inlined so additions never leak into other pages.
fn page_resources(doc: &Document, page_id: ObjectId) -> Dictionary {
    let mut current = doc.get_dictionary(page_id).ok();
    let mut found = None;
    for _ in 0..64 {
        let Some(dict) = current else { break };
        if let Ok(res) = dict.get(b"Resources") {
            found = Some(res);
            break;
        }
        current = dict
            .get(b"Parent")
            .and_then(Object::as_reference)
            .and_then(|id| doc.get_dictionary(id))
            .ok();
    }

    let mut resources = match found.map(|obj| resolve(doc, obj)) {
        Some(Object::Dictionary(dict)) => dict.clone(),
        _ => Dictionary::new(),
    };
    for category in [&b"Font"[..], b"XObject", b"ExtGState"] {
        let inlined = match resources.get(category) {
            Ok(obj) => match resolve(doc, obj) {
                Object::Dictionary(sub) => Some(sub.clone()),
                _ => None,
            },
            Err(_) => None,
        };
        if let Some(sub) = inlined {
            resources.set(category.to_vec(), Object::Dictionary(sub));
        }
    }
    resources
}

fn op(operator: &str, operands: &[f32]) -> Operation {
    Operation::new(
        operator,
        operands.iter().map(|v| Object::Real(*v)).collect(),
    )
}

fn deflate(data: &[u8]) -> Result<Vec<u8>, OverlayError> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder
        .write_all(data)
        .and_then(|_| encoder.finish())
        .map_err(|e| OverlayError::Serialization(format!("deflate failed: {}", e)))
}

/// Encode text for a WinAnsiEncoding standard font. Unmappable characters
/// become '?'.
pub(crate) fn encode_win_ansi(text: &str) -> Vec<u8> {
    text.chars()
        .map(|c| match c {
            '\u{20AC}' => 0x80,
            '\u{201A}' => 0x82,
            '\u{2026}' => 0x85,
            '\u{2022}' => 0x95,
            '\u{2013}' => 0x96,
            '\u{2014}' => 0x97,
            '\u{2018}' => 0x91,
            '\u{2019}' => 0x92,
            '\u{201C}' => 0x93,
            '\u{201D}' => 0x94,
            '\u{2122}' => 0x99,
            c if (c as u32) < 0x80 || (0xA0..=0xFF).contains(&(c as u32)) => c as u32 as u8,
            _ => b'?',
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_win_ansi_encoding() {
        assert_eq!(encode_win_ansi("Hi é"), vec![b'H', b'i', b' ', 0xE9]);
        assert_eq!(encode_win_ansi("“ok”"), vec![0x93, b'o', b'k', 0x94]);
        assert_eq!(encode_win_ansi("日本"), b"??".to_vec());
    }
}
