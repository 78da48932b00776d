/*
 * lib.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Mutable markup tree for Barracuda templates.
//!
//! This crate is the host tree the template engine mutates. A [`Document`]
//! owns its nodes in an arena and hands out [`NodeId`] handles; all tree
//! operations (create, clone, import, insert, replace, remove, attribute
//! access) go through the document. [`parse`] reads XML or XHTML with
//! [`quick-xml`]; [`Document::to_xml`] and [`Document::to_html`] write it
//! back.
//!
//! # Example
//!
//! ```rust
//! use barracuda_dom::parse;
//!
//! let mut doc = parse(r#"<ul><li class="item">a</li></ul>"#).unwrap();
//! let ul = doc.document_element().unwrap();
//! let li = doc.first_child(ul).unwrap();
//!
//! let copy = doc.clone_node(li, true);
//! doc.set_attribute(copy, "class", "item last").unwrap();
//! doc.append_child(ul, copy).unwrap();
//!
//! assert_eq!(
//!     doc.to_xml(),
//!     r#"<ul><li class="item">a</li><li class="item last">a</li></ul>"#
//! );
//! ```

pub mod error;
pub mod parser;
pub mod types;
pub mod writer;

// Re-export main types
pub use error::{DomError, DomResult, Error, Result};
pub use parser::parse;
pub use types::{Attribute, Document, NodeId, NodeKind};
pub use writer::{Syntax, to_string, to_string_with, write_node, write_node_with};
