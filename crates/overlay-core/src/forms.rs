//! Interactive form fields in the base document
//!
//! Detection walks the AcroForm field tree so the editor can bind values to
//! fields by their fully-qualified name. Applying a value writes `/V` (and
//! `/AS` for buttons) back onto the field and its widgets.

use crate::coords::Rect;
use crate::error::OverlayError;
use crate::model::{FormField, FormFieldType};
use crate::page_info::{page_geometries, parse_box, resolve, PageGeometry};
use lopdf::{Dictionary, Document, Object, ObjectId, StringFormat};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use tracing::debug;

const FLAG_RADIO: i64 = 1 << 15;
const FLAG_PUSHBUTTON: i64 = 1 << 16;
const SIG_FLAG_SIGNATURES_EXIST: i64 = 1;
const ANNOT_FLAG_HIDDEN: i64 = 1 << 1;
const MAX_FIELD_DEPTH: usize = 32;

/// A field found in the base document
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DetectedField {
    pub name: String,
    pub field_type: FormFieldType,
    pub page: u32,
    /// Widget rectangle in top-down document space
    pub rect: Rect,
    pub value: String,
    pub options: Vec<String>,
}

impl From<DetectedField> for FormField {
    fn from(field: DetectedField) -> Self {
        FormField {
            name: field.name,
            field_type: field.field_type,
            value: field.value,
            rect: field.rect,
            page: field.page,
            options: field.options,
        }
    }
}

/// Detect every fillable field in a serialized document
pub fn detect_form_fields(bytes: &[u8]) -> Result<Vec<DetectedField>, OverlayError> {
    let doc = Document::load_mem(bytes).map_err(|e| OverlayError::Parse(e.to_string()))?;
    Ok(detect_in(&doc))
}

/// Whether the document carries digital signatures
pub fn has_signatures(bytes: &[u8]) -> Result<bool, OverlayError> {
    let doc = Document::load_mem(bytes).map_err(|e| OverlayError::Parse(e.to_string()))?;
    Ok(document_has_signatures(&doc))
}

pub(crate) fn document_has_signatures(doc: &Document) -> bool {
    let Some(acro_form) = acro_form(doc) else {
        return false;
    };
    let sig_flags = acro_form
        .get(b"SigFlags")
        .ok()
        .and_then(|obj| resolve(doc, obj).as_i64().ok())
        .unwrap_or(0);
    if sig_flags & SIG_FLAG_SIGNATURES_EXIST != 0 {
        return true;
    }
    FieldTree::read(doc)
        .fields
        .iter()
        .any(|f| f.kind == FieldKind::Signature && f.signed)
}

pub(crate) fn detect_in(doc: &Document) -> Vec<DetectedField> {
    let geometries = page_geometries(doc);
    let tree = FieldTree::read(doc);
    let mut detected = Vec::new();

    for node in &tree.fields {
        let Some(field_type) = node.kind.form_type() else {
            continue;
        };
        // First visible widget decides page and rect
        let Some(widget) = node.widgets.iter().find(|w| w.page.is_some()) else {
            debug!(field = %node.name, "field has no widget on any page");
            continue;
        };
        let Some(page) = widget.page else { continue };
        let Some(geometry) = geometries.get(&page) else {
            continue;
        };

        let options = match node.kind {
            FieldKind::Radio => node
                .widgets
                .iter()
                .filter_map(|w| w.on_state.clone())
                .fold(Vec::new(), |mut acc, s| {
                    if !acc.contains(&s) {
                        acc.push(s);
                    }
                    acc
                }),
            _ => node.options.clone(),
        };

        detected.push(DetectedField {
            name: node.name.clone(),
            field_type,
            page,
            rect: widget
                .rect
                .map(|r| document_rect(geometry, r))
                .unwrap_or_default(),
            value: node.value.clone(),
            options,
        });
    }
    detected
}

fn acro_form(doc: &Document) -> Option<&Dictionary> {
    let catalog = doc.catalog().ok()?;
    let obj = catalog.get(b"AcroForm").ok()?;
    resolve(doc, obj).as_dict().ok()
}

/// PDF rect [x1 y1 x2 y2] to a top-down rect on the given page
pub(crate) fn document_rect(geometry: &PageGeometry, pdf: [f64; 4]) -> Rect {
    geometry.document_rect(pdf)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum FieldKind {
    Text,
    Checkbox,
    Radio,
    Choice,
    PushButton,
    Signature,
    Unknown,
}

impl FieldKind {
    fn from_parts(ft: Option<&[u8]>, flags: i64) -> Self {
        match ft {
            Some(b"Tx") => FieldKind::Text,
            Some(b"Ch") => FieldKind::Choice,
            Some(b"Sig") => FieldKind::Signature,
            Some(b"Btn") if flags & FLAG_PUSHBUTTON != 0 => FieldKind::PushButton,
            Some(b"Btn") if flags & FLAG_RADIO != 0 => FieldKind::Radio,
            Some(b"Btn") => FieldKind::Checkbox,
            _ => FieldKind::Unknown,
        }
    }

    fn form_type(self) -> Option<FormFieldType> {
        match self {
            FieldKind::Text => Some(FormFieldType::Text),
            FieldKind::Checkbox => Some(FormFieldType::Checkbox),
            FieldKind::Radio => Some(FormFieldType::Radio),
            FieldKind::Choice => Some(FormFieldType::Dropdown),
            FieldKind::PushButton | FieldKind::Signature | FieldKind::Unknown => None,
        }
    }
}

#[derive(Debug, Clone)]
pub(crate) struct Widget {
    pub id: ObjectId,
    pub page: Option<u32>,
    pub rect: Option<[f64; 4]>,
    /// Name of the "on" appearance state for buttons
    pub on_state: Option<String>,
    pub hidden: bool,
}

/// A terminal field with its widgets
#[derive(Debug, Clone)]
pub(crate) struct FieldNode {
    pub id: ObjectId,
    pub name: String,
    pub kind: FieldKind,
    pub value: String,
    pub options: Vec<String>,
    /// Default appearance string, inherited from the form when absent
    pub da: Option<String>,
    pub widgets: Vec<Widget>,
    signed: bool,
}

#[derive(Debug, Default)]
pub(crate) struct FieldTree {
    pub fields: Vec<FieldNode>,
}

#[derive(Clone, Default)]
struct Inherited {
    name: String,
    ft: Option<Vec<u8>>,
    flags: i64,
    value: Option<Object>,
    da: Option<String>,
}

impl FieldTree {
    pub(crate) fn read(doc: &Document) -> Self {
        let mut tree = FieldTree::default();
        let Some(acro_form) = acro_form(doc) else {
            return tree;
        };
        let widget_pages = widget_pages(doc);
        let inherited = Inherited {
            da: acro_form
                .get(b"DA")
                .ok()
                .and_then(|obj| decode_text(resolve(doc, obj))),
            ..Inherited::default()
        };
        if let Ok(fields) = acro_form.get(b"Fields").and_then(|obj| resolve(doc, obj).as_array()) {
            for field in fields {
                if let Ok(id) = field.as_reference() {
                    tree.walk(doc, id, &inherited, &widget_pages, 0);
                }
            }
        }
        tree
    }

    pub(crate) fn find(&self, name: &str) -> Option<&FieldNode> {
        self.fields.iter().find(|f| f.name == name)
    }

    fn walk(
        &mut self,
        doc: &Document,
        id: ObjectId,
        parent: &Inherited,
        widget_pages: &HashMap<ObjectId, u32>,
        depth: usize,
    ) {
        if depth > MAX_FIELD_DEPTH {
            return;
        }
        let Ok(dict) = doc.get_dictionary(id) else {
            return;
        };

        let mut state = parent.clone();
        if let Some(partial) = dict.get(b"T").ok().and_then(|obj| decode_text(resolve(doc, obj))) {
            state.name = if parent.name.is_empty() {
                partial
            } else {
                format!("{}.{}", parent.name, partial)
            };
        }
        if let Ok(ft) = dict.get(b"FT").and_then(|obj| resolve(doc, obj).as_name()) {
            state.ft = Some(ft.to_vec());
        }
        if let Ok(flags) = dict.get(b"Ff").and_then(|obj| resolve(doc, obj).as_i64()) {
            state.flags = flags;
        }
        if let Ok(value) = dict.get(b"V") {
            state.value = Some(resolve(doc, value).clone());
        }
        if let Some(da) = dict.get(b"DA").ok().and_then(|obj| decode_text(resolve(doc, obj))) {
            state.da = Some(da);
        }

        let kids: Vec<ObjectId> = dict
            .get(b"Kids")
            .and_then(|obj| resolve(doc, obj).as_array())
            .map(|kids| kids.iter().filter_map(|k| k.as_reference().ok()).collect())
            .unwrap_or_default();

        // Kids carrying a partial name are child fields; the rest are widgets
        let (child_fields, widget_ids): (Vec<ObjectId>, Vec<ObjectId>) =
            kids.into_iter().partition(|kid| {
                doc.get_dictionary(*kid)
                    .map(|d| d.has(b"T"))
                    .unwrap_or(false)
            });

        for child in child_fields {
            self.walk(doc, child, &state, widget_pages, depth + 1);
        }

        let is_terminal = !dict.has(b"Kids") || !widget_ids.is_empty();
        if !is_terminal || state.name.is_empty() {
            return;
        }

        let widget_ids = if widget_ids.is_empty() && dict.has(b"Rect") {
            vec![id]
        } else {
            widget_ids
        };
        let widgets = widget_ids
            .into_iter()
            .filter_map(|wid| read_widget(doc, wid, widget_pages))
            .collect();

        let kind = FieldKind::from_parts(state.ft.as_deref(), state.flags);
        self.fields.push(FieldNode {
            id,
            name: state.name.clone(),
            kind,
            value: state.value.as_ref().and_then(decode_text).unwrap_or_default(),
            options: choice_options(doc, dict),
            da: state.da.clone(),
            widgets,
            signed: state.value.is_some(),
        });
    }
}

/// Map widget annotation ids to the page listing them in `/Annots`
fn widget_pages(doc: &Document) -> HashMap<ObjectId, u32> {
    let mut map = HashMap::new();
    for (page_num, page_id) in doc.get_pages() {
        let Ok(page) = doc.get_dictionary(page_id) else {
            continue;
        };
        if let Ok(annots) = page.get(b"Annots").and_then(|obj| resolve(doc, obj).as_array()) {
            for annot in annots {
                if let Ok(id) = annot.as_reference() {
                    map.insert(id, page_num);
                }
            }
        }
    }
    map
}

fn read_widget(doc: &Document, id: ObjectId, widget_pages: &HashMap<ObjectId, u32>) -> Option<Widget> {
    let dict = doc.get_dictionary(id).ok()?;
    let page = widget_pages.get(&id).copied().or_else(|| {
        // Fall back to the widget's /P entry
        let page_ref = dict.get(b"P").and_then(Object::as_reference).ok()?;
        doc.get_pages()
            .into_iter()
            .find(|(_, pid)| *pid == page_ref)
            .map(|(num, _)| num)
    });
    let flags = dict
        .get(b"F")
        .and_then(|obj| resolve(doc, obj).as_i64())
        .unwrap_or(0);
    Some(Widget {
        id,
        page,
        rect: dict.get(b"Rect").ok().and_then(|obj| parse_box(doc, resolve(doc, obj))),
        on_state: on_state(doc, dict),
        hidden: flags & ANNOT_FLAG_HIDDEN != 0,
    })
}

/// First non-Off appearance state name under `/AP /N`
fn on_state(doc: &Document, widget: &Dictionary) -> Option<String> {
    let ap = widget.get(b"AP").ok().map(|obj| resolve(doc, obj))?.as_dict().ok()?;
    let normal = ap.get(b"N").ok().map(|obj| resolve(doc, obj))?.as_dict().ok()?;
    normal
        .iter()
        .map(|(name, _)| String::from_utf8_lossy(name).into_owned())
        .find(|name| name != "Off")
}

fn choice_options(doc: &Document, dict: &Dictionary) -> Vec<String> {
    let Ok(opts) = dict.get(b"Opt").and_then(|obj| resolve(doc, obj).as_array()) else {
        return Vec::new();
    };
    opts.iter()
        .filter_map(|opt| match resolve(doc, opt) {
            // [export display] pairs bind by export value
            Object::Array(pair) => pair.first().and_then(|o| decode_text(resolve(doc, o))),
            other => decode_text(other),
        })
        .collect()
}

/// Decode a PDF text string or name
pub(crate) fn decode_text(obj: &Object) -> Option<String> {
    match obj {
        Object::String(bytes, _) => Some(decode_text_bytes(bytes)),
        Object::Name(name) => Some(String::from_utf8_lossy(name).into_owned()),
        _ => None,
    }
}

fn decode_text_bytes(bytes: &[u8]) -> String {
    if let Some(utf16) = bytes.strip_prefix(&[0xFE, 0xFF]) {
        let units: Vec<u16> = utf16
            .chunks_exact(2)
            .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
            .collect();
        String::from_utf16_lossy(&units)
    } else {
        bytes.iter().map(|&b| b as char).collect()
    }
}

/// Encode a value as a PDF text string, using UTF-16BE only when needed
pub(crate) fn encode_text(value: &str) -> Object {
    if value.chars().all(|c| (c as u32) < 0x80) {
        Object::String(value.as_bytes().to_vec(), StringFormat::Literal)
    } else {
        let mut bytes = vec![0xFE, 0xFF];
        for unit in value.encode_utf16() {
            bytes.extend_from_slice(&unit.to_be_bytes());
        }
        Object::String(bytes, StringFormat::Hexadecimal)
    }
}

/// Font size from a default appearance string like `/Helv 12 Tf 0 g`
pub(crate) fn da_font_size(da: &str) -> Option<f64> {
    let tokens: Vec<&str> = da.split_whitespace().collect();
    tokens
        .windows(2)
        .find(|w| w[1] == "Tf")
        .and_then(|w| w[0].parse::<f64>().ok())
        .filter(|size| *size > 0.0)
}

/// How a value ended up on a field, for flattening
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum AppliedValue {
    Text(String),
    /// Checkbox or radio: which widgets are now on
    Buttons(Vec<ObjectId>),
}

/// Write `field.value` onto the matching document field
pub(crate) fn apply_value(
    doc: &mut Document,
    tree: &FieldTree,
    field: &FormField,
) -> Result<AppliedValue, OverlayError> {
    let node = tree
        .find(&field.name)
        .ok_or_else(|| OverlayError::NotFound(format!("form field {:?}", field.name)))?;

    match node.kind {
        FieldKind::Text => {
            set_entry(doc, node.id, "V", encode_text(&field.value))?;
            Ok(AppliedValue::Text(field.value.clone()))
        }
        FieldKind::Choice => {
            if !node.options.is_empty() && !node.options.iter().any(|o| o == &field.value) {
                return Err(OverlayError::NotFound(format!(
                    "option {:?} for field {:?}",
                    field.value, field.name
                )));
            }
            set_entry(doc, node.id, "V", encode_text(&field.value))?;
            Ok(AppliedValue::Text(field.value.clone()))
        }
        FieldKind::Checkbox => {
            let wanted = field.value.trim();
            let checked = field.is_checked();
            // A value naming one of the widgets' on-states selects that state
            let state = node
                .widgets
                .iter()
                .filter_map(|w| w.on_state.as_deref())
                .find(|on| *on == wanted)
                .or_else(|| node.widgets.iter().find_map(|w| w.on_state.as_deref()))
                .unwrap_or("Yes");
            let value = if checked { state } else { "Off" };

            let mut writes = vec![(node.id, "V", Object::Name(value.as_bytes().to_vec()))];
            let mut on = Vec::new();
            for widget in &node.widgets {
                let widget_state = if checked {
                    widget.on_state.as_deref().unwrap_or(state)
                } else {
                    "Off"
                };
                writes.push((widget.id, "AS", Object::Name(widget_state.as_bytes().to_vec())));
                if checked {
                    on.push(widget.id);
                }
            }
            commit_writes(doc, writes)?;
            Ok(AppliedValue::Buttons(on))
        }
        FieldKind::Radio => {
            let choice = field.value.trim();
            let selecting = !choice.is_empty() && choice != "Off";
            if selecting && !node.widgets.iter().any(|w| w.on_state.as_deref() == Some(choice)) {
                return Err(OverlayError::NotFound(format!(
                    "option {:?} for field {:?}",
                    choice, field.name
                )));
            }
            let value = if selecting { choice } else { "Off" };

            let mut writes = vec![(node.id, "V", Object::Name(value.as_bytes().to_vec()))];
            let mut on = Vec::new();
            for widget in &node.widgets {
                let selected = selecting && widget.on_state.as_deref() == Some(choice);
                let state = if selected { choice } else { "Off" };
                writes.push((widget.id, "AS", Object::Name(state.as_bytes().to_vec())));
                if selected {
                    on.push(widget.id);
                }
            }
            commit_writes(doc, writes)?;
            Ok(AppliedValue::Buttons(on))
        }
        FieldKind::PushButton | FieldKind::Signature | FieldKind::Unknown => Err(
            OverlayError::NotFound(format!("fillable field {:?}", field.name)),
        ),
    }
}

fn set_entry(doc: &mut Document, id: ObjectId, key: &str, value: Object) -> Result<(), OverlayError> {
    doc.get_dictionary_mut(id)
        .map(|dict| dict.set(key, value))
        .map_err(|e| OverlayError::NotFound(format!("field object {:?}: {}", id, e)))
}

/// Apply a field's writes together. Nothing is written unless every target
/// dictionary exists.
fn commit_writes(doc: &mut Document, writes: Vec<(ObjectId, &str, Object)>) -> Result<(), OverlayError> {
    if let Some((id, _, _)) = writes.iter().find(|(id, _, _)| doc.get_dictionary(*id).is_err()) {
        return Err(OverlayError::NotFound(format!("field object {:?}", id)));
    }
    for (id, key, value) in writes {
        set_entry(doc, id, key, value)?;
    }
    Ok(())
}

/// Mark the form so viewers rebuild appearances from the new values
pub(crate) fn set_need_appearances(doc: &mut Document) {
    let Some(form_ref) = doc
        .catalog()
        .ok()
        .and_then(|c| c.get(b"AcroForm").ok())
        .cloned()
    else {
        return;
    };
    match form_ref {
        Object::Reference(id) => {
            if let Ok(form) = doc.get_dictionary_mut(id) {
                form.set("NeedAppearances", true);
            }
        }
        Object::Dictionary(mut form) => {
            form.set("NeedAppearances", true);
            if let Ok(catalog) = doc.catalog_mut() {
                catalog.set("AcroForm", Object::Dictionary(form));
            }
        }
        _ => {}
    }
}

/// Widgets grouped by page, in field order
pub(crate) fn widgets_by_page(tree: &FieldTree) -> BTreeMap<u32, Vec<(&FieldNode, &Widget)>> {
    let mut pages: BTreeMap<u32, Vec<(&FieldNode, &Widget)>> = BTreeMap::new();
    for node in &tree.fields {
        for widget in &node.widgets {
            if let Some(page) = widget.page {
                pages.entry(page).or_default().push((node, widget));
            }
        }
    }
    pages
}

#[cfg(test)]
pub(crate) mod fixtures {
    use lopdf::content::{Content, Operation};
    use lopdf::{dictionary, Document, Object, Stream};

    /// One Letter page with a text field, a checkbox and a dropdown, and a
    /// hierarchical radio group `choice.color` with `red` and `blue` kids.
    pub(crate) fn form_document() -> Document {
        let mut doc = Document::with_version("1.7");
        let pages_id = doc.new_object_id();
        let page_id = doc.new_object_id();

        let font_id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Helvetica",
        });

        let name_id = doc.add_object(dictionary! {
            "Type" => "Annot",
            "Subtype" => "Widget",
            "FT" => "Tx",
            "T" => Object::string_literal("name"),
            "V" => Object::string_literal("old"),
            "DA" => Object::string_literal("/Helv 10 Tf 0 g"),
            "Rect" => vec![100.into(), 700.into(), 300.into(), 720.into()],
            "P" => page_id,
        });

        let on_ap = doc.add_object(Stream::new(
            dictionary! {
                "Type" => "XObject",
                "Subtype" => "Form",
                "BBox" => vec![0.into(), 0.into(), 12.into(), 12.into()],
            },
            b"0 0 12 12 re f".to_vec(),
        ));
        let off_ap = doc.add_object(Stream::new(
            dictionary! {
                "Type" => "XObject",
                "Subtype" => "Form",
                "BBox" => vec![0.into(), 0.into(), 12.into(), 12.into()],
            },
            Vec::new(),
        ));
        let agree_id = doc.add_object(dictionary! {
            "Type" => "Annot",
            "Subtype" => "Widget",
            "FT" => "Btn",
            "T" => Object::string_literal("agree"),
            "V" => "Off",
            "AS" => "Off",
            "Rect" => vec![100.into(), 650.into(), 112.into(), 662.into()],
            "AP" => dictionary! {
                "N" => dictionary! { "On" => on_ap, "Off" => off_ap },
            },
        });

        let country_id = doc.add_object(dictionary! {
            "Type" => "Annot",
            "Subtype" => "Widget",
            "FT" => "Ch",
            "Ff" => 1 << 17,
            "T" => Object::string_literal("country"),
            "Opt" => vec![
                Object::string_literal("US"),
                vec![Object::string_literal("CA"), Object::string_literal("Canada")].into(),
            ],
            "Rect" => vec![100.into(), 600.into(), 200.into(), 620.into()],
        });

        let group_id = doc.new_object_id();
        let radio_color_id = doc.new_object_id();
        let red_id = doc.add_object(dictionary! {
            "Type" => "Annot",
            "Subtype" => "Widget",
            "Parent" => radio_color_id,
            "Rect" => vec![100.into(), 550.into(), 112.into(), 562.into()],
            "AS" => "Off",
            "AP" => dictionary! { "N" => dictionary! { "red" => on_ap, "Off" => off_ap } },
        });
        let blue_id = doc.add_object(dictionary! {
            "Type" => "Annot",
            "Subtype" => "Widget",
            "Parent" => radio_color_id,
            "Rect" => vec![120.into(), 550.into(), 132.into(), 562.into()],
            "AS" => "Off",
            "AP" => dictionary! { "N" => dictionary! { "blue" => on_ap, "Off" => off_ap } },
        });
        doc.objects.insert(
            radio_color_id,
            Object::Dictionary(dictionary! {
                "FT" => "Btn",
                "Ff" => 1 << 15,
                "T" => Object::string_literal("color"),
                "Parent" => group_id,
                "Kids" => vec![red_id.into(), blue_id.into()],
            }),
        );
        doc.objects.insert(
            group_id,
            Object::Dictionary(dictionary! {
                "T" => Object::string_literal("choice"),
                "Kids" => vec![radio_color_id.into()],
            }),
        );

        let content = Content {
            operations: vec![
                Operation::new("BT", vec![]),
                Operation::new("Tf", vec!["F1".into(), 12.into()]),
                Operation::new("Td", vec![72.into(), 740.into()]),
                Operation::new("Tj", vec![Object::string_literal("Application")]),
                Operation::new("ET", vec![]),
            ],
        };
        let content_id = doc.add_object(Stream::new(
            dictionary! {},
            content.encode().unwrap_or_default(),
        ));

        doc.objects.insert(
            page_id,
            Object::Dictionary(dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
                "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
                "Contents" => content_id,
                "Resources" => dictionary! { "Font" => dictionary! { "F1" => font_id } },
                "Annots" => vec![
                    name_id.into(),
                    agree_id.into(),
                    country_id.into(),
                    red_id.into(),
                    blue_id.into(),
                ],
            }),
        );
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => vec![page_id.into()],
                "Count" => 1,
            }),
        );

        let acro_form_id = doc.add_object(dictionary! {
            "Fields" => vec![name_id.into(), agree_id.into(), country_id.into(), group_id.into()],
            "DA" => Object::string_literal("/Helv 0 Tf 0 g"),
        });
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
            "AcroForm" => acro_form_id,
        });
        doc.trailer.set("Root", catalog_id);
        doc
    }

    pub(crate) fn form_bytes() -> Vec<u8> {
        let mut doc = form_document();
        let mut out = Vec::new();
        doc.save_to(&mut out).unwrap();
        out
    }
}
