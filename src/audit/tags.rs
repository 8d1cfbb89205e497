use std::vec;

use crate::data::osm::{Element, Tag};
use crate::errors::Result;

/// Every tag key of an element stream, in document order and with repeats.
/// Holds at most the tags of one element at a time.
pub struct TagKeys<I> {
    elements: I,
    pending: vec::IntoIter<Tag>,
}

impl<I> TagKeys<I>
where
    I: Iterator<Item = Result<Element>>,
{
    pub fn new(elements: I) -> TagKeys<I> {
        TagKeys {
            elements,
            pending: Vec::new().into_iter(),
        }
    }
}

impl<I> Iterator for TagKeys<I>
where
    I: Iterator<Item = Result<Element>>,
{
    type Item = Result<String>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(tag) = self.pending.next() {
                return Some(Ok(tag.key));
            }
            match self.elements.next()? {
                Ok(element) => self.pending = element.tags.into_iter(),
                Err(err) => return Some(Err(err)),
            }
        }
    }
}
