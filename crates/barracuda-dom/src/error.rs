/*
 * error.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Error types for XML parsing and tree mutation.

use crate::types::NodeId;
use thiserror::Error;

/// Result type alias for parsing operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while parsing XML into a [`Document`](crate::Document).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    /// XML syntax error from quick-xml.
    #[error("XML syntax error: {message}{}", fmt_position(.position))]
    XmlSyntax {
        message: String,
        /// Byte offset where the error occurred.
        position: Option<u64>,
    },

    /// Unexpected end of input.
    #[error("Unexpected end of input, expected {expected}")]
    UnexpectedEof {
        /// What was expected when EOF was encountered.
        expected: String,
        /// Byte offset of the element left open.
        position: Option<usize>,
    },

    /// Mismatched end tag.
    #[error("Mismatched end tag: expected </{expected}>, found </{found}>")]
    MismatchedEndTag {
        expected: String,
        found: String,
        position: Option<usize>,
    },

    /// Invalid XML structure.
    #[error("Invalid XML structure: {message}")]
    InvalidStructure {
        message: String,
        position: Option<usize>,
    },

    /// Empty document (no root element).
    #[error("Empty XML document: no root element found")]
    EmptyDocument,

    /// Multiple root elements.
    #[error("Invalid XML: multiple root elements")]
    MultipleRoots { position: Option<usize> },
}

fn fmt_position(position: &Option<u64>) -> String {
    match position {
        Some(pos) => format!(" at byte {}", pos),
        None => String::new(),
    }
}

impl From<quick_xml::Error> for Error {
    fn from(err: quick_xml::Error) -> Self {
        Error::XmlSyntax {
            message: err.to_string(),
            position: None,
        }
    }
}

impl From<quick_xml::events::attributes::AttrError> for Error {
    fn from(err: quick_xml::events::attributes::AttrError) -> Self {
        Error::XmlSyntax {
            message: format!("Attribute error: {}", err),
            position: None,
        }
    }
}

/// Errors raised by illegal tree mutations.
///
/// These mirror the exceptions a W3C DOM raises: the tree is left unchanged
/// when one of them is returned.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DomError {
    /// The node cannot be inserted at the requested position.
    #[error("Hierarchy request error: {message}")]
    HierarchyRequest { message: String },

    /// A reference node is not where the operation expected it.
    #[error("Node {node} is not a child of {parent}")]
    NotAChild { node: NodeId, parent: NodeId },

    /// Attribute access on a node that is not an element.
    #[error("Node {node} is not an element")]
    NotAnElement { node: NodeId },

    /// Character data access on a node that has none.
    #[error("Node {node} does not hold character data")]
    NotCharacterData { node: NodeId },
}

/// Result type alias for tree mutations.
pub type DomResult<T> = std::result::Result<T, DomError>;
