//! Tag auditing and record shaping over a stream of OSM elements.

pub mod food;
pub mod keys;
pub mod shape;
pub mod street;
pub mod tags;
