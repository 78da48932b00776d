/*
 * writer.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Markup serialization.
//!
//! Two syntaxes are written. XML self-closes every empty element and keeps
//! CDATA sections. HTML self-closes void elements only, writes CDATA
//! content as raw markup and leaves the text of `script` and `style`
//! unescaped.

use crate::types::{Document, NodeId, NodeKind};
use quick_xml::escape::{escape, partial_escape};

/// Output syntax of the writer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Syntax {
    #[default]
    Xml,
    Html,
}

/// HTML elements that never have content.
const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "param",
    "source", "track", "wbr",
];

/// HTML elements whose text is not escaped.
const RAW_TEXT_ELEMENTS: &[&str] = &["script", "style"];

fn is_one_of(name: &str, names: &[&str]) -> bool {
    names.iter().any(|n| n.eq_ignore_ascii_case(name))
}

/// Serialize the subtree rooted at `node` as XML.
///
/// Attribute values escape `& < > " '`, text escapes `& < >`. CDATA,
/// comments and processing instructions are written verbatim, and an
/// element without children is written self-closed.
pub fn to_string(doc: &Document, node: NodeId) -> String {
    to_string_with(doc, node, Syntax::Xml)
}

pub fn to_string_with(doc: &Document, node: NodeId, syntax: Syntax) -> String {
    let mut out = String::new();
    write_node_with(doc, node, syntax, &mut out);
    out
}

/// Append the XML serialization of `node` to `out`.
pub fn write_node(doc: &Document, node: NodeId, out: &mut String) {
    write_node_with(doc, node, Syntax::Xml, out);
}

pub fn write_node_with(doc: &Document, node: NodeId, syntax: Syntax, out: &mut String) {
    match doc.kind(node) {
        NodeKind::Document => {
            if let Some(doctype) = doc.doctype() {
                out.push_str("<!DOCTYPE ");
                out.push_str(doctype);
                out.push('>');
            }
            for &child in doc.children(node) {
                write_node_with(doc, child, syntax, out);
            }
        }
        NodeKind::Element { name, attributes } => {
            out.push('<');
            out.push_str(name);
            for attr in attributes {
                out.push(' ');
                out.push_str(&attr.name);
                out.push_str("=\"");
                out.push_str(&escape(attr.value.as_str()));
                out.push('"');
            }
            let children = doc.children(node);
            let self_closing = match syntax {
                Syntax::Xml => children.is_empty(),
                Syntax::Html => is_one_of(name, VOID_ELEMENTS),
            };
            if self_closing {
                out.push_str("/>");
                return;
            }
            out.push('>');
            let raw_text = syntax == Syntax::Html && is_one_of(name, RAW_TEXT_ELEMENTS);
            for &child in children {
                match doc.kind(child) {
                    NodeKind::Text(text) if raw_text => out.push_str(text),
                    _ => write_node_with(doc, child, syntax, out),
                }
            }
            out.push_str("</");
            out.push_str(name);
            out.push('>');
        }
        NodeKind::Text(text) => out.push_str(&partial_escape(text.as_str())),
        NodeKind::CData(text) if syntax == Syntax::Html => out.push_str(text),
        NodeKind::CData(text) => {
            out.push_str("<![CDATA[");
            out.push_str(text);
            out.push_str("]]>");
        }
        NodeKind::Comment(text) => {
            out.push_str("<!--");
            out.push_str(text);
            out.push_str("-->");
        }
        NodeKind::ProcessingInstruction { target, data } => {
            out.push_str("<?");
            out.push_str(target);
            if !data.is_empty() {
                out.push(' ');
                out.push_str(data);
            }
            out.push_str("?>");
        }
    }
}

impl Document {
    /// Serialize the whole document.
    pub fn to_xml(&self) -> String {
        to_string(self, self.root())
    }

    /// Serialize one subtree.
    pub fn node_to_xml(&self, node: NodeId) -> String {
        to_string(self, node)
    }

    /// Serialize the whole document as HTML.
    pub fn to_html(&self) -> String {
        to_string_with(self, self.root(), Syntax::Html)
    }

    pub fn node_to_html(&self, node: NodeId) -> String {
        to_string_with(self, node, Syntax::Html)
    }
}
