//! Core data structures for entity attribute datasets.

mod attribute_table;

pub use attribute_table::{AttributeTable, ParseFailure};
