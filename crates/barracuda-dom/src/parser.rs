/*
 * parser.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! XML parser that builds a [`Document`].

use crate::types::{Document, NodeId};
use crate::{Error, Result};
use quick_xml::Reader;
use quick_xml::events::{BytesEnd, BytesPI, BytesStart, BytesText, Event};
use tracing::trace;

/// Parse XML (or XHTML) text into a [`Document`].
///
/// Unlike a data-oriented XML reader, markup parsing keeps everything that
/// can matter for output: whitespace text, CDATA sections, comments and
/// processing instructions.
///
/// # Example
///
/// ```rust
/// use barracuda_dom::parse;
///
/// let doc = parse("<ul><li>a</li></ul>").unwrap();
/// let ul = doc.document_element().unwrap();
/// assert_eq!(doc.element_name(ul), Some("ul"));
/// ```
///
/// # Errors
///
/// Returns an error if the XML is malformed.
pub fn parse(content: &str) -> Result<Document> {
    let mut parser = XmlParser::new(content);
    parser.parse()
}

/// Internal parser state.
struct XmlParser<'a> {
    /// The quick-xml reader.
    reader: Reader<&'a [u8]>,

    /// Document under construction.
    doc: Document,

    /// Open elements with the byte offset of their start tag.
    stack: Vec<(NodeId, usize)>,

    /// Whether the root element has been seen.
    has_root: bool,
}

impl<'a> XmlParser<'a> {
    fn new(source: &'a str) -> Self {
        let mut reader = Reader::from_str(source);
        reader.config_mut().trim_text_start = false;
        reader.config_mut().trim_text_end = false;

        Self {
            reader,
            doc: Document::new(),
            stack: Vec::new(),
            has_root: false,
        }
    }

    fn parse(&mut self) -> Result<Document> {
        loop {
            // Capture position before reading the event
            let event_start = self.reader.buffer_position() as usize;

            match self.reader.read_event() {
                Ok(Event::Start(e)) => {
                    let element = self.handle_start(&e, event_start)?;
                    self.stack.push((element, event_start));
                }
                Ok(Event::End(e)) => {
                    self.handle_end(&e)?;
                }
                Ok(Event::Empty(e)) => {
                    self.handle_start(&e, event_start)?;
                }
                Ok(Event::Text(e)) => {
                    self.handle_text(&e, event_start)?;
                }
                Ok(Event::CData(e)) => {
                    let text = String::from_utf8_lossy(e.as_ref()).into_owned();
                    let node = self.doc.create_cdata(text);
                    self.attach(node, event_start)?;
                }
                Ok(Event::Comment(e)) => {
                    let text = String::from_utf8_lossy(e.as_ref()).into_owned();
                    let node = self.doc.create_comment(text);
                    self.attach(node, event_start)?;
                }
                Ok(Event::PI(e)) => {
                    self.handle_pi(&e, event_start)?;
                }
                Ok(Event::DocType(e)) => {
                    let doctype = String::from_utf8_lossy(e.as_ref()).trim().to_string();
                    self.doc.set_doctype(Some(doctype));
                }
                Ok(Event::Decl(_)) => {
                    // The writer never emits an XML declaration
                }
                Ok(Event::Eof) => break,
                Err(e) => {
                    return Err(Error::XmlSyntax {
                        message: e.to_string(),
                        position: Some(self.reader.error_position()),
                    });
                }
            }
        }

        // Check for unclosed elements
        if let Some(&(node, start)) = self.stack.last() {
            let name = self.doc.element_name(node).unwrap_or_default().to_string();
            return Err(Error::UnexpectedEof {
                expected: format!("closing tag </{}>", name),
                position: Some(start),
            });
        }

        if !self.has_root {
            return Err(Error::EmptyDocument);
        }

        trace!(nodes = self.doc.node_count(), "parsed document");
        Ok(std::mem::take(&mut self.doc))
    }

    /// Append `node` to the innermost open element, or to the document node
    /// at top level.
    fn attach(&mut self, node: NodeId, position: usize) -> Result<()> {
        let parent = match self.stack.last() {
            Some(&(open, _)) => open,
            None => self.doc.root(),
        };
        self.doc
            .append_child(parent, node)
            .map_err(|err| Error::InvalidStructure {
                message: err.to_string(),
                position: Some(position),
            })?;
        Ok(())
    }

    fn handle_start(&mut self, e: &BytesStart<'_>, event_start: usize) -> Result<NodeId> {
        let name = String::from_utf8_lossy(e.name().as_ref()).into_owned();

        if self.stack.is_empty() {
            if self.has_root {
                return Err(Error::MultipleRoots {
                    position: Some(event_start),
                });
            }
            self.has_root = true;
        }

        let element = self.doc.create_element(name);
        for attr_result in e.attributes() {
            let attr = attr_result?;
            let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
            let value = attr.unescape_value().map_err(|err| Error::XmlSyntax {
                message: format!("Invalid attribute value: {}", err),
                position: Some(event_start as u64),
            })?;
            self.doc
                .set_attribute(element, &key, value.into_owned())
                .map_err(|err| Error::InvalidStructure {
                    message: err.to_string(),
                    position: Some(event_start),
                })?;
        }

        self.attach(element, event_start)?;
        Ok(element)
    }

    fn handle_end(&mut self, e: &BytesEnd<'_>) -> Result<()> {
        let end_name = String::from_utf8_lossy(e.name().as_ref()).into_owned();

        let (node, start) = self.stack.pop().ok_or_else(|| Error::InvalidStructure {
            message: format!("Unexpected closing tag </{}>", end_name),
            position: None,
        })?;

        // Verify tag names match
        let open_name = self.doc.element_name(node).unwrap_or_default();
        if open_name != end_name {
            return Err(Error::MismatchedEndTag {
                expected: open_name.to_string(),
                found: end_name,
                position: Some(start),
            });
        }
        Ok(())
    }

    fn handle_text(&mut self, e: &BytesText<'_>, event_start: usize) -> Result<()> {
        let text = e.unescape().map_err(|err| Error::XmlSyntax {
            message: format!("Invalid text content: {}", err),
            position: Some(event_start as u64),
        })?;

        if self.stack.is_empty() {
            // Only whitespace may appear outside the root element
            if text.trim().is_empty() {
                return Ok(());
            }
            return Err(Error::InvalidStructure {
                message: format!("Text outside the root element: {:?}", text.trim()),
                position: Some(event_start),
            });
        }

        let node = self.doc.create_text(text.into_owned());
        self.attach(node, event_start)
    }

    fn handle_pi(&mut self, e: &BytesPI<'_>, event_start: usize) -> Result<()> {
        let target = String::from_utf8_lossy(e.target()).into_owned();
        let data = String::from_utf8_lossy(e.content()).trim().to_string();
        let node = self.doc.create_processing_instruction(target, data);
        self.attach(node, event_start)
    }
}
