//! # sinopia_armature
//!
//! Armature - The structural framework of a Sinopia page.
//!
//! An arena-backed DOM together with the HTML tokenizer, parser, serializer
//! and a small selector engine. The tokenizer understands script fragments and
//! never splits a tag or text run inside one.

pub mod dom;
pub mod errors;
pub mod parser;
pub mod selector;
pub mod serialize;
pub mod tokenizer;

pub use dom::{Attribute, Document, Element, NodeData, NodeId};
pub use errors::{ErrorCode, ParseError};
pub use parser::{parse, parse_fragment, parse_with_markers, Parser};
pub use selector::{query_selector, query_selector_all, Selector};
pub use serialize::{inner_html, outer_html, to_html};
