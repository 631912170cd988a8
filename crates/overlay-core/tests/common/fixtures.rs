//! PDF fixtures built in memory with lopdf

#![allow(dead_code)]

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document, Object, ObjectId, Stream};
use std::io::Cursor;

/// One page per entry, sized `(width, height)`, each with a line of text
pub fn document_with_pages(sizes: &[(i64, i64)]) -> Vec<u8> {
    let mut doc = Document::with_version("1.7");
    let pages_id = doc.new_object_id();
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
    });

    let mut kids = Vec::new();
    for (i, (width, height)) in sizes.iter().enumerate() {
        let page_id = add_page(&mut doc, pages_id, font_id, *width, *height, &format!("Page {}", i + 1));
        kids.push(page_id.into());
    }
    finish(&mut doc, pages_id, kids, None)
}

/// Single letter page carrying `/Rotate`
pub fn rotated_letter_document(rotation: i64) -> Vec<u8> {
    let mut doc = Document::with_version("1.7");
    let pages_id = doc.new_object_id();
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
    });
    let page_id = add_page(&mut doc, pages_id, font_id, 612, 792, "Landscape");
    if let Ok(page) = doc.get_dictionary_mut(page_id) {
        page.set("Rotate", rotation);
    }
    finish(&mut doc, pages_id, vec![page_id.into()], None)
}

pub fn letter_document(pages: usize) -> Vec<u8> {
    document_with_pages(&vec![(612, 792); pages])
}

/// Letter page with a single text field `applicant.name`
pub fn form_document() -> Vec<u8> {
    let mut doc = Document::with_version("1.7");
    let pages_id = doc.new_object_id();
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
    });
    let page_id = add_page(&mut doc, pages_id, font_id, 612, 792, "Application");

    let parent_id = doc.new_object_id();
    let widget_id = doc.add_object(dictionary! {
        "Type" => "Annot",
        "Subtype" => "Widget",
        "FT" => "Tx",
        "T" => Object::string_literal("name"),
        "Parent" => parent_id,
        "DA" => Object::string_literal("/Helv 11 Tf 0 g"),
        "Rect" => vec![72.into(), 600.into(), 272.into(), 620.into()],
        "P" => page_id,
    });
    doc.objects.insert(
        parent_id,
        Object::Dictionary(dictionary! {
            "T" => Object::string_literal("applicant"),
            "Kids" => vec![widget_id.into()],
        }),
    );
    if let Ok(page) = doc.get_dictionary_mut(page_id) {
        page.set("Annots", vec![Object::Reference(widget_id)]);
    }

    let acro_form = dictionary! {
        "Fields" => vec![parent_id.into()],
        "DA" => Object::string_literal("/Helv 0 Tf 0 g"),
    };
    finish(&mut doc, pages_id, vec![page_id.into()], Some(acro_form))
}

fn add_page(doc: &mut Document, pages_id: ObjectId, font_id: ObjectId, width: i64, height: i64, text: &str) -> ObjectId {
    let content = Content {
        operations: vec![
            Operation::new("BT", vec![]),
            Operation::new("Tf", vec!["F1".into(), 12.into()]),
            Operation::new("Td", vec![72.into(), (height - 72).into()]),
            Operation::new("Tj", vec![Object::string_literal(text)]),
            Operation::new("ET", vec![]),
        ],
    };
    let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode().unwrap()));
    doc.add_object(dictionary! {
        "Type" => "Page",
        "Parent" => pages_id,
        "MediaBox" => vec![0.into(), 0.into(), width.into(), height.into()],
        "Contents" => content_id,
        "Resources" => dictionary! { "Font" => dictionary! { "F1" => font_id } },
    })
}

fn finish(doc: &mut Document, pages_id: ObjectId, kids: Vec<Object>, acro_form: Option<lopdf::Dictionary>) -> Vec<u8> {
    let count = kids.len() as i64;
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => count,
        }),
    );
    let mut catalog = dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    };
    if let Some(form) = acro_form {
        let form_id = doc.add_object(form);
        catalog.set("AcroForm", form_id);
    }
    let catalog_id = doc.add_object(catalog);
    doc.trailer.set("Root", catalog_id);

    let mut out = Vec::new();
    doc.save_to(&mut out).unwrap();
    out
}

/// Operations of a page's full content, all streams concatenated
pub fn page_operations(bytes: &[u8], page: u32) -> Vec<Operation> {
    let doc = Document::load_mem(bytes).unwrap();
    let page_id = doc.get_pages()[&page];
    let content = doc.get_page_content(page_id).unwrap();
    Content::decode(&content).unwrap().operations
}

/// Numeric operands of an operation
pub fn operands(op: &Operation) -> Vec<f32> {
    op.operands.iter().map(|o| o.as_float().unwrap()).collect()
}

/// RGBA pixels as a PNG data URL
pub fn png_data_url(width: u32, height: u32, rgba: &[u8]) -> String {
    let pixels = image::RgbaImage::from_raw(width, height, rgba.to_vec()).unwrap();
    let mut out = Vec::new();
    pixels
        .write_to(&mut Cursor::new(&mut out), image::ImageFormat::Png)
        .unwrap();
    format!("data:image/png;base64,{}", STANDARD.encode(out))
}
