use crate::audit::shape::Shaper;
use crate::data::osm::{Element, Tag};
use crate::data::record::ShapedRecord;
use crate::errors::Result;

pub const FOOD_AMENITIES: [&str; 6] = ["restaurant", "cafe", "pub", "bar", "fast_food", "delicatessen"];

pub fn is_food_tag(tag: &Tag) -> bool {
    match tag.key.as_str() {
        "cuisine" => true,
        "amenity" => FOOD_AMENITIES.contains(&tag.value.as_str()),
        _ => false,
    }
}

pub fn is_food_element(element: &Element) -> bool {
    element.element_type.is_shapeable() && element.tags.iter().any(is_food_tag)
}

/// Shaped records of the food places in an element stream, in document order.
pub struct FoodNodes<'s, I> {
    elements: I,
    shaper: &'s Shaper,
}

impl<'s, I> FoodNodes<'s, I>
where
    I: Iterator<Item = Result<Element>>,
{
    pub fn new(elements: I, shaper: &'s Shaper) -> FoodNodes<'s, I> {
        FoodNodes { elements, shaper }
    }
}

impl<I> Iterator for FoodNodes<'_, I>
where
    I: Iterator<Item = Result<Element>>,
{
    type Item = Result<ShapedRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            match self.elements.next()? {
                Ok(element) if is_food_element(&element) => return Some(self.shaper.shape(&element)),
                Ok(_) => (),
                Err(err) => return Some(Err(err)),
            }
        }
    }
}
