//! Element store
//!
//! Holds every text element and annotation in one insertion-ordered list.
//! Insertion order is z-order for both rendering and export. Form fields live
//! alongside but are only ever bound from an external detection pass.

use crate::error::OverlayError;
use crate::history::HistorySnapshot;
use crate::model::{Annotation, Element, ElementId, ElementPatch, FormField, TextElement};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

#[derive(Debug, Clone, Default)]
pub struct ElementStore {
    next_id: ElementId,
    elements: Vec<Element>,
    form_fields: Vec<FormField>,
    /// Value each bound field had in the base document
    baseline: HashMap<String, String>,
}

impl ElementStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate, assign a fresh id, and append. Nothing is stored on error.
    pub fn add(&mut self, mut element: Element) -> Result<ElementId, OverlayError> {
        element.validate()?;
        let id = self.next_id;
        self.next_id += 1;
        element.set_id(id);
        debug!(id, page = element.page(), "element added");
        self.elements.push(element);
        Ok(id)
    }

    /// Merge a patch into an existing element, keeping its z-order position
    pub fn update(&mut self, id: ElementId, patch: &ElementPatch) -> Result<(), OverlayError> {
        let pos = self
            .position(id)
            .ok_or_else(|| OverlayError::NotFound(format!("element {}", id)))?;
        let next = self.elements[pos].patched(patch)?;
        self.elements[pos] = next;
        Ok(())
    }

    /// Remove an element. Removing an unknown id is a no-op returning false.
    pub fn remove(&mut self, id: ElementId) -> bool {
        match self.position(id) {
            Some(pos) => {
                self.elements.remove(pos);
                true
            }
            None => false,
        }
    }

    /// Remove several elements at once, returning how many were present
    pub fn remove_many(&mut self, ids: &[ElementId]) -> usize {
        let before = self.elements.len();
        self.elements.retain(|el| !ids.contains(&el.id()));
        before - self.elements.len()
    }

    pub fn get(&self, id: ElementId) -> Option<&Element> {
        self.elements.iter().find(|el| el.id() == id)
    }

    /// Elements on a page, in insertion order
    pub fn query(&self, page: u32) -> Vec<&Element> {
        self.elements.iter().filter(|el| el.page() == page).collect()
    }

    pub fn elements(&self) -> &[Element] {
        &self.elements
    }

    pub fn text_elements(&self) -> Vec<TextElement> {
        self.elements
            .iter()
            .filter_map(|el| el.as_text().cloned())
            .collect()
    }

    pub fn annotations(&self) -> Vec<Annotation> {
        self.elements
            .iter()
            .filter_map(|el| el.as_annotation().cloned())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    /// Replace the fields detected on `page`. Values already entered for a
    /// field with the same name are kept.
    pub fn bind_form_fields(&mut self, page: u32, detected: Vec<FormField>) {
        let previous: Vec<FormField> = self
            .form_fields
            .iter()
            .filter(|f| f.page == page)
            .cloned()
            .collect();
        self.form_fields.retain(|f| f.page != page);
        for mut field in detected {
            field.page = page;
            self.baseline.insert(field.name.clone(), field.value.clone());
            if let Some(old) = previous.iter().find(|old| old.name == field.name) {
                field.value = old.value.clone();
            }
            self.form_fields.push(field);
        }
    }

    /// Set the user-entered value of a bound form field
    pub fn set_form_field_value(&mut self, name: &str, value: &str) -> Result<(), OverlayError> {
        let field = self
            .form_fields
            .iter_mut()
            .find(|f| f.name == name)
            .ok_or_else(|| OverlayError::NotFound(format!("form field {:?}", name)))?;
        field.value = value.to_string();
        Ok(())
    }

    pub fn form_fields(&self) -> &[FormField] {
        &self.form_fields
    }

    /// Fields whose value differs from what the base document holds
    pub fn edited_form_fields(&self) -> Vec<FormField> {
        self.form_fields
            .iter()
            .filter(|f| self.baseline.get(&f.name) != Some(&f.value))
            .cloned()
            .collect()
    }

    pub fn form_fields_for_page(&self, page: u32) -> Vec<&FormField> {
        self.form_fields.iter().filter(|f| f.page == page).collect()
    }

    /// Immutable copy of the current elements
    pub fn snapshot(&self) -> HistorySnapshot {
        HistorySnapshot::new(Arc::from(self.elements.clone()))
    }

    /// Restore elements from a snapshot. Ids keep counting upward so a
    /// restored state never collides with ids handed out later.
    pub fn restore(&mut self, snapshot: &HistorySnapshot) {
        self.elements = snapshot.elements().to_vec();
        if let Some(max) = self.elements.iter().map(Element::id).max() {
            self.next_id = self.next_id.max(max + 1);
        }
    }

    fn position(&self, id: ElementId) -> Option<usize> {
        self.elements.iter().position(|el| el.id() == id)
    }
}
