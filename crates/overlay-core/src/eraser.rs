//! Eraser hit testing
//!
//! An element is hit when the center of its bounding box lies strictly within
//! the eraser radius of the pointer, measured in document space. Shape
//! outlines and stroke paths are not considered.

use crate::coords::Point;
use crate::model::{Element, ElementId};

/// Ids of every element on `page` hit by an eraser at `point`
pub fn hit_test<'a, I>(elements: I, point: Point, radius: f64, page: u32) -> Vec<ElementId>
where
    I: IntoIterator<Item = &'a Element>,
{
    elements
        .into_iter()
        .filter(|el| el.page() == page)
        .filter(|el| el.rect().center().distance_to(point) < radius)
        .map(Element::id)
        .collect()
}
