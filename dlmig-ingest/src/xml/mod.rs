//! XML document model used for FOXML rewriting and catalog responses

pub mod tree;

pub use tree::{Document, Element, Node, XmlError};
