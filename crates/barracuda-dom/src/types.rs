/*
 * types.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Arena-backed document tree.
//!
//! Every node of a tree lives in the [`Document`] that created it and is
//! addressed through a [`NodeId`]. Detaching a node only unlinks it from its
//! parent, so a detached subtree can be reinserted later (the template
//! engine relies on this for master templates). Slots are reclaimed by
//! [`Document::collect_garbage`], which frees every node that is neither
//! attached nor reachable from a pinned or caller-supplied root.

use crate::error::{DomError, DomResult};
use std::collections::HashSet;
use std::fmt;
use std::sync::atomic::{AtomicU32, Ordering};

static NEXT_DOCUMENT_ID: AtomicU32 = AtomicU32::new(0);

/// Handle to a node inside one [`Document`].
///
/// A `NodeId` records the document that handed it out and the generation of
/// its arena slot, so [`Document::contains`] rejects ids from other
/// documents and ids of reclaimed nodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId {
    document: u32,
    index: usize,
    generation: u32,
}

impl NodeId {
    /// Position of the node in its document's arena.
    pub fn index(self) -> usize {
        self.index
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.index)
    }
}

/// An element attribute. Attribute order is preserved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribute {
    pub name: String,
    pub value: String,
}

impl Attribute {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// What a node is.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeKind {
    /// The document node. Exactly one exists per document, at [`Document::root`].
    Document,
    Element {
        name: String,
        attributes: Vec<Attribute>,
    },
    Text(String),
    /// Raw character data, serialized without escaping.
    CData(String),
    Comment(String),
    ProcessingInstruction {
        target: String,
        data: String,
    },
}

impl NodeKind {
    fn can_have_children(&self) -> bool {
        matches!(self, NodeKind::Document | NodeKind::Element { .. })
    }
}

#[derive(Debug, Clone)]
struct NodeData {
    kind: NodeKind,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    generation: u32,
    live: bool,
}

/// A mutable markup tree.
///
/// A clone answers to the same node ids as the document it was cloned from.
#[derive(Debug, Clone)]
pub struct Document {
    id: u32,
    nodes: Vec<NodeData>,
    free: Vec<usize>,
    pinned: HashSet<NodeId>,
    doctype: Option<String>,
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

impl Document {
    /// Create an empty document holding only the document node.
    pub fn new() -> Self {
        Self {
            id: NEXT_DOCUMENT_ID.fetch_add(1, Ordering::Relaxed),
            nodes: vec![NodeData {
                kind: NodeKind::Document,
                parent: None,
                children: Vec::new(),
                generation: 0,
                live: true,
            }],
            free: Vec::new(),
            pinned: HashSet::new(),
            doctype: None,
        }
    }

    /// The document node.
    pub fn root(&self) -> NodeId {
        self.id_at(0)
    }

    fn id_at(&self, index: usize) -> NodeId {
        NodeId {
            document: self.id,
            index,
            generation: self.nodes[index].generation,
        }
    }

    /// The first element child of the document node.
    pub fn document_element(&self) -> Option<NodeId> {
        self.children(self.root())
            .iter()
            .copied()
            .find(|&child| self.is_element(child))
    }

    /// The DOCTYPE declaration content (without `<!DOCTYPE` and `>`).
    pub fn doctype(&self) -> Option<&str> {
        self.doctype.as_deref()
    }

    pub fn set_doctype(&mut self, doctype: Option<String>) {
        self.doctype = doctype;
    }

    /// Number of live nodes, attached or not.
    pub fn node_count(&self) -> usize {
        self.nodes.len() - self.free.len()
    }

    /// Size of the arena, reclaimed slots included.
    pub fn capacity(&self) -> usize {
        self.nodes.len()
    }

    /// Whether `node` was handed out by this document and has not been
    /// reclaimed since.
    pub fn contains(&self, node: NodeId) -> bool {
        node.document == self.id
            && self
                .nodes
                .get(node.index)
                .is_some_and(|data| data.live && data.generation == node.generation)
    }

    fn data(&self, node: NodeId) -> &NodeData {
        &self.nodes[node.index]
    }

    fn data_mut(&mut self, node: NodeId) -> &mut NodeData {
        &mut self.nodes[node.index]
    }

    fn alloc(&mut self, kind: NodeKind) -> NodeId {
        if let Some(index) = self.free.pop() {
            let slot = &mut self.nodes[index];
            slot.kind = kind;
            slot.live = true;
            return self.id_at(index);
        }
        self.nodes.push(NodeData {
            kind,
            parent: None,
            children: Vec::new(),
            generation: 0,
            live: true,
        });
        self.id_at(self.nodes.len() - 1)
    }

    // ------------------------------------------------------------------
    // Reclamation
    // ------------------------------------------------------------------

    /// Keep `node` and its subtree alive across [`Document::collect_garbage`]
    /// while it is detached.
    pub fn pin(&mut self, node: NodeId) {
        if self.contains(node) {
            self.pinned.insert(node);
        }
    }

    pub fn unpin(&mut self, node: NodeId) {
        self.pinned.remove(&node);
    }

    /// Reclaim every node that is not reachable from the document node, a
    /// pinned node or one of `roots`. Returns the number of reclaimed
    /// nodes. Ids of reclaimed nodes are no longer [`contained`] and their
    /// slots are reused by later allocations.
    ///
    /// [`contained`]: Document::contains
    pub fn collect_garbage(&mut self, roots: &[NodeId]) -> usize {
        let mut reachable = vec![false; self.nodes.len()];
        let mut stack = vec![0];
        stack.extend(
            self.pinned
                .iter()
                .chain(roots)
                .filter(|&&node| self.contains(node))
                .map(|node| node.index),
        );
        while let Some(index) = stack.pop() {
            if reachable[index] {
                continue;
            }
            reachable[index] = true;
            stack.extend(self.nodes[index].children.iter().map(|child| child.index));
        }

        let mut reclaimed = 0;
        for (index, slot) in self.nodes.iter_mut().enumerate() {
            if reachable[index] || !slot.live {
                continue;
            }
            slot.live = false;
            slot.generation = slot.generation.wrapping_add(1);
            slot.kind = NodeKind::Text(String::new());
            slot.parent = None;
            slot.children = Vec::new();
            self.free.push(index);
            reclaimed += 1;
        }
        // A root inside a reclaimed subtree becomes a detached node
        for index in 0..self.nodes.len() {
            if let Some(parent) = self.nodes[index].parent {
                if !self.nodes[parent.index].live {
                    self.nodes[index].parent = None;
                }
            }
        }
        reclaimed
    }

    // ------------------------------------------------------------------
    // Node creation
    // ------------------------------------------------------------------

    pub fn create_element(&mut self, name: impl Into<String>) -> NodeId {
        self.alloc(NodeKind::Element {
            name: name.into(),
            attributes: Vec::new(),
        })
    }

    pub fn create_text(&mut self, text: impl Into<String>) -> NodeId {
        self.alloc(NodeKind::Text(text.into()))
    }

    pub fn create_cdata(&mut self, text: impl Into<String>) -> NodeId {
        self.alloc(NodeKind::CData(text.into()))
    }

    pub fn create_comment(&mut self, text: impl Into<String>) -> NodeId {
        self.alloc(NodeKind::Comment(text.into()))
    }

    pub fn create_processing_instruction(
        &mut self,
        target: impl Into<String>,
        data: impl Into<String>,
    ) -> NodeId {
        self.alloc(NodeKind::ProcessingInstruction {
            target: target.into(),
            data: data.into(),
        })
    }

    /// Copy `node` into a new detached node. With `deep`, the whole subtree
    /// is copied; otherwise only the node and its attributes.
    pub fn clone_node(&mut self, node: NodeId, deep: bool) -> NodeId {
        let kind = self.data(node).kind.clone();
        let copy = self.alloc(kind);
        if deep {
            let children = self.data(node).children.clone();
            for child in children {
                let child_copy = self.clone_node(child, true);
                self.link_last(copy, child_copy);
            }
        }
        copy
    }

    /// Copy `node` from another document into this one (detached).
    pub fn import_node(&mut self, other: &Document, node: NodeId, deep: bool) -> NodeId {
        let copy = self.alloc(other.kind(node).clone());
        if deep {
            for &child in other.children(node) {
                let child_copy = self.import_node(other, child, true);
                self.link_last(copy, child_copy);
            }
        }
        copy
    }

    // ------------------------------------------------------------------
    // Navigation
    // ------------------------------------------------------------------

    pub fn kind(&self, node: NodeId) -> &NodeKind {
        &self.data(node).kind
    }

    pub fn parent(&self, node: NodeId) -> Option<NodeId> {
        self.data(node).parent
    }

    pub fn children(&self, node: NodeId) -> &[NodeId] {
        &self.data(node).children
    }

    pub fn first_child(&self, node: NodeId) -> Option<NodeId> {
        self.data(node).children.first().copied()
    }

    pub fn last_child(&self, node: NodeId) -> Option<NodeId> {
        self.data(node).children.last().copied()
    }

    pub fn has_children(&self, node: NodeId) -> bool {
        !self.data(node).children.is_empty()
    }

    pub fn has_element_children(&self, node: NodeId) -> bool {
        self.children(node).iter().any(|&c| self.is_element(c))
    }

    fn position_in_parent(&self, node: NodeId) -> Option<(NodeId, usize)> {
        let parent = self.parent(node)?;
        let pos = self.children(parent).iter().position(|&c| c == node)?;
        Some((parent, pos))
    }

    pub fn next_sibling(&self, node: NodeId) -> Option<NodeId> {
        let (parent, pos) = self.position_in_parent(node)?;
        self.children(parent).get(pos + 1).copied()
    }

    pub fn previous_sibling(&self, node: NodeId) -> Option<NodeId> {
        let (parent, pos) = self.position_in_parent(node)?;
        pos.checked_sub(1)
            .and_then(|prev| self.children(parent).get(prev).copied())
    }

    /// Whether `ancestor` is `node` or one of its ancestors.
    pub fn is_ancestor_or_self(&self, ancestor: NodeId, node: NodeId) -> bool {
        let mut current = Some(node);
        while let Some(n) = current {
            if n == ancestor {
                return true;
            }
            current = self.parent(n);
        }
        false
    }

    /// All nodes of the subtree rooted at `node`, in document order,
    /// `node` included.
    pub fn descendants(&self, node: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack = vec![node];
        while let Some(n) = stack.pop() {
            out.push(n);
            stack.extend(self.children(n).iter().rev().copied());
        }
        out
    }

    // ------------------------------------------------------------------
    // Elements and attributes
    // ------------------------------------------------------------------

    pub fn is_element(&self, node: NodeId) -> bool {
        matches!(self.kind(node), NodeKind::Element { .. })
    }

    /// Tag name of an element, `None` for every other node kind.
    pub fn element_name(&self, node: NodeId) -> Option<&str> {
        match self.kind(node) {
            NodeKind::Element { name, .. } => Some(name),
            _ => None,
        }
    }

    /// Rename an element in place.
    pub fn set_element_name(&mut self, node: NodeId, new_name: impl Into<String>) -> DomResult<()> {
        match &mut self.data_mut(node).kind {
            NodeKind::Element { name, .. } => {
                *name = new_name.into();
                Ok(())
            }
            _ => Err(DomError::NotAnElement { node }),
        }
    }

    /// Attributes of an element; empty for every other node kind.
    pub fn attributes(&self, node: NodeId) -> &[Attribute] {
        match self.kind(node) {
            NodeKind::Element { attributes, .. } => attributes,
            _ => &[],
        }
    }

    pub fn get_attribute(&self, node: NodeId, name: &str) -> Option<&str> {
        self.attributes(node)
            .iter()
            .find(|a| a.name == name)
            .map(|a| a.value.as_str())
    }

    pub fn has_attribute(&self, node: NodeId, name: &str) -> bool {
        self.get_attribute(node, name).is_some()
    }

    /// Set an attribute, replacing an existing value in place or appending
    /// a new attribute at the end.
    pub fn set_attribute(
        &mut self,
        node: NodeId,
        name: &str,
        value: impl Into<String>,
    ) -> DomResult<()> {
        match &mut self.data_mut(node).kind {
            NodeKind::Element { attributes, .. } => {
                let value = value.into();
                match attributes.iter_mut().find(|a| a.name == name) {
                    Some(existing) => existing.value = value,
                    None => attributes.push(Attribute::new(name, value)),
                }
                Ok(())
            }
            _ => Err(DomError::NotAnElement { node }),
        }
    }

    /// Remove an attribute, returning its previous value.
    pub fn remove_attribute(&mut self, node: NodeId, name: &str) -> DomResult<Option<String>> {
        match &mut self.data_mut(node).kind {
            NodeKind::Element { attributes, .. } => {
                let removed = attributes
                    .iter()
                    .position(|a| a.name == name)
                    .map(|pos| attributes.remove(pos).value);
                Ok(removed)
            }
            _ => Err(DomError::NotAnElement { node }),
        }
    }

    // ------------------------------------------------------------------
    // Character data
    // ------------------------------------------------------------------

    /// Content of a text, CDATA or comment node.
    pub fn text(&self, node: NodeId) -> Option<&str> {
        match self.kind(node) {
            NodeKind::Text(t) | NodeKind::CData(t) | NodeKind::Comment(t) => Some(t),
            _ => None,
        }
    }

    pub fn is_text(&self, node: NodeId) -> bool {
        matches!(self.kind(node), NodeKind::Text(_) | NodeKind::CData(_))
    }

    pub fn set_text(&mut self, node: NodeId, value: impl Into<String>) -> DomResult<()> {
        match &mut self.data_mut(node).kind {
            NodeKind::Text(t) | NodeKind::CData(t) | NodeKind::Comment(t) => {
                *t = value.into();
                Ok(())
            }
            _ => Err(DomError::NotCharacterData { node }),
        }
    }

    /// Concatenated text and CDATA content of the subtree.
    pub fn text_content(&self, node: NodeId) -> String {
        let mut out = String::new();
        for n in self.descendants(node) {
            if let NodeKind::Text(t) | NodeKind::CData(t) = self.kind(n) {
                out.push_str(t);
            }
        }
        out
    }

    /// Replace the text of a subtree.
    ///
    /// The first text (or CDATA) node found in document order is replaced by
    /// a new node holding `text`; every other text node of the subtree is
    /// removed. When the subtree has no text at all, the new node is
    /// inserted as the first child (`insert_before`) or appended. With `raw`
    /// the new node is CDATA and is serialized without escaping.
    pub fn set_text_in_node(
        &mut self,
        node: NodeId,
        text: &str,
        raw: bool,
        insert_before: bool,
    ) -> DomResult<NodeId> {
        let replacement = if raw {
            self.create_cdata(text)
        } else {
            self.create_text(text)
        };

        let existing: Vec<NodeId> = self
            .descendants(node)
            .into_iter()
            .filter(|&n| n != node && self.is_text(n))
            .collect();

        match existing.first() {
            Some(&first) => {
                let parent = self.parent(first).ok_or(DomError::NotAChild {
                    node: first,
                    parent: node,
                })?;
                self.replace_child(parent, replacement, first)?;
            }
            None if insert_before => {
                let first = self.first_child(node);
                self.insert_before(node, replacement, first)?;
            }
            None => {
                self.append_child(node, replacement)?;
            }
        }

        for stale in existing.into_iter().skip(1) {
            self.detach(stale);
        }
        Ok(replacement)
    }

    // ------------------------------------------------------------------
    // Child list mutation
    // ------------------------------------------------------------------

    fn check_insertable(&self, parent: NodeId, child: NodeId) -> DomResult<()> {
        if !self.kind(parent).can_have_children() {
            return Err(DomError::HierarchyRequest {
                message: format!("node {} cannot have children", parent),
            });
        }
        if matches!(self.kind(child), NodeKind::Document) {
            return Err(DomError::HierarchyRequest {
                message: "a document node cannot be inserted".to_string(),
            });
        }
        if self.is_ancestor_or_self(child, parent) {
            return Err(DomError::HierarchyRequest {
                message: format!("node {} would become its own descendant", child),
            });
        }
        Ok(())
    }

    fn link_last(&mut self, parent: NodeId, child: NodeId) {
        self.data_mut(child).parent = Some(parent);
        self.data_mut(parent).children.push(child);
    }

    /// Unlink `node` from its parent, if it has one.
    pub fn detach(&mut self, node: NodeId) {
        if let Some((parent, pos)) = self.position_in_parent(node) {
            self.data_mut(parent).children.remove(pos);
        }
        self.data_mut(node).parent = None;
    }

    /// Append `child` as the last child of `parent`, detaching it from its
    /// current parent first.
    pub fn append_child(&mut self, parent: NodeId, child: NodeId) -> DomResult<NodeId> {
        self.check_insertable(parent, child)?;
        self.detach(child);
        self.link_last(parent, child);
        Ok(child)
    }

    /// Insert `child` before `reference`, or append when `reference` is `None`.
    pub fn insert_before(
        &mut self,
        parent: NodeId,
        child: NodeId,
        reference: Option<NodeId>,
    ) -> DomResult<NodeId> {
        let Some(reference) = reference else {
            return self.append_child(parent, child);
        };
        if self.parent(reference) != Some(parent) {
            return Err(DomError::NotAChild {
                node: reference,
                parent,
            });
        }
        if reference == child {
            return Ok(child);
        }
        self.check_insertable(parent, child)?;
        self.detach(child);
        let pos = self
            .children(parent)
            .iter()
            .position(|&c| c == reference)
            .ok_or(DomError::NotAChild {
                node: reference,
                parent,
            })?;
        self.data_mut(parent).children.insert(pos, child);
        self.data_mut(child).parent = Some(parent);
        Ok(child)
    }

    /// Put `new_child` where `old_child` is; returns the detached `old_child`.
    pub fn replace_child(
        &mut self,
        parent: NodeId,
        new_child: NodeId,
        old_child: NodeId,
    ) -> DomResult<NodeId> {
        if self.parent(old_child) != Some(parent) {
            return Err(DomError::NotAChild {
                node: old_child,
                parent,
            });
        }
        if new_child == old_child {
            return Ok(old_child);
        }
        self.insert_before(parent, new_child, Some(old_child))?;
        self.detach(old_child);
        Ok(old_child)
    }

    pub fn remove_child(&mut self, parent: NodeId, child: NodeId) -> DomResult<NodeId> {
        if self.parent(child) != Some(parent) {
            return Err(DomError::NotAChild {
                node: child,
                parent,
            });
        }
        self.detach(child);
        Ok(child)
    }

    pub fn remove_all_children(&mut self, parent: NodeId) {
        let children = std::mem::take(&mut self.data_mut(parent).children);
        for child in children {
            self.data_mut(child).parent = None;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> (Document, NodeId, NodeId, NodeId) {
        let mut doc = Document::new();
        let ul = doc.create_element("ul");
        let a = doc.create_element("li");
        let b = doc.create_element("li");
        doc.append_child(doc.root(), ul).unwrap();
        doc.append_child(ul, a).unwrap();
        doc.append_child(ul, b).unwrap();
        (doc, ul, a, b)
    }

    #[test]
    fn test_siblings() {
        let (doc, ul, a, b) = sample();
        assert_eq!(doc.document_element(), Some(ul));
        assert_eq!(doc.next_sibling(a), Some(b));
        assert_eq!(doc.next_sibling(b), None);
        assert_eq!(doc.previous_sibling(b), Some(a));
        assert_eq!(doc.previous_sibling(a), None);
        assert_eq!(doc.parent(a), Some(ul));
    }

    #[test]
    fn test_append_moves_node() {
        let (mut doc, ul, a, b) = sample();
        doc.append_child(b, a).unwrap();
        assert_eq!(doc.children(ul), &[b]);
        assert_eq!(doc.parent(a), Some(b));
    }

    #[test]
    fn test_cannot_insert_into_own_subtree() {
        let (mut doc, ul, a, _) = sample();
        let err = doc.append_child(a, ul).unwrap_err();
        assert!(matches!(err, DomError::HierarchyRequest { .. }));
        // tree unchanged
        assert_eq!(doc.parent(a), Some(ul));
    }

    #[test]
    fn test_text_cannot_have_children() {
        let mut doc = Document::new();
        let text = doc.create_text("x");
        let el = doc.create_element("b");
        assert!(doc.append_child(text, el).is_err());
    }

    #[test]
    fn test_insert_before_and_replace() {
        let (mut doc, ul, a, b) = sample();
        let c = doc.create_element("li");
        doc.insert_before(ul, c, Some(b)).unwrap();
        assert_eq!(doc.children(ul), &[a, c, b]);

        let d = doc.create_element("li");
        let old = doc.replace_child(ul, d, c).unwrap();
        assert_eq!(old, c);
        assert_eq!(doc.children(ul), &[a, d, b]);
        assert_eq!(doc.parent(c), None);
    }

    #[test]
    fn test_reference_must_be_child() {
        let (mut doc, ul, a, _) = sample();
        let stray = doc.create_element("li");
        let other = doc.create_element("li");
        let err = doc.insert_before(ul, other, Some(stray)).unwrap_err();
        assert_eq!(
            err,
            DomError::NotAChild {
                node: stray,
                parent: ul
            }
        );
        assert!(doc.remove_child(a, ul).is_err());
    }

    #[test]
    fn test_attributes_keep_order() {
        let mut doc = Document::new();
        let el = doc.create_element("a");
        doc.set_attribute(el, "href", "x").unwrap();
        doc.set_attribute(el, "class", "c").unwrap();
        doc.set_attribute(el, "href", "y").unwrap();
        let names: Vec<&str> = doc.attributes(el).iter().map(|a| a.name.as_str()).collect();
        assert_eq!(names, vec!["href", "class"]);
        assert_eq!(doc.get_attribute(el, "href"), Some("y"));
        assert_eq!(doc.remove_attribute(el, "href").unwrap(), Some("y".to_string()));
        assert_eq!(doc.remove_attribute(el, "href").unwrap(), None);
    }

    #[test]
    fn test_attribute_on_text_fails() {
        let mut doc = Document::new();
        let text = doc.create_text("x");
        assert_eq!(
            doc.set_attribute(text, "a", "b"),
            Err(DomError::NotAnElement { node: text })
        );
    }

    #[test]
    fn test_clone_shallow_and_deep() {
        let (mut doc, ul, _, _) = sample();
        doc.set_attribute(ul, "id", "list").unwrap();
        let shallow = doc.clone_node(ul, false);
        assert_eq!(doc.get_attribute(shallow, "id"), Some("list"));
        assert!(!doc.has_children(shallow));
        assert_eq!(doc.parent(shallow), None);

        let deep = doc.clone_node(ul, true);
        assert_eq!(doc.children(deep).len(), 2);
        assert_ne!(doc.children(deep)[0], doc.children(ul)[0]);
    }

    #[test]
    fn test_import_node() {
        let (source, ul, _, _) = sample();
        let mut target = Document::new();
        let imported = target.import_node(&source, ul, true);
        assert_eq!(target.element_name(imported), Some("ul"));
        assert_eq!(target.children(imported).len(), 2);
    }

    #[test]
    fn test_set_text_in_node_replaces_first_text() {
        let mut doc = Document::new();
        let p = doc.create_element("p");
        let t1 = doc.create_text("one");
        let b = doc.create_element("b");
        let t2 = doc.create_text("two");
        doc.append_child(p, t1).unwrap();
        doc.append_child(p, b).unwrap();
        doc.append_child(b, t2).unwrap();

        let new = doc.set_text_in_node(p, "fresh", false, false).unwrap();
        assert_eq!(doc.children(p), &[new, b]);
        assert!(!doc.has_children(b));
        assert_eq!(doc.text_content(p), "fresh");
    }

    #[test]
    fn test_set_text_in_node_without_text() {
        let mut doc = Document::new();
        let p = doc.create_element("p");
        let b = doc.create_element("b");
        doc.append_child(p, b).unwrap();

        let new = doc.set_text_in_node(p, "<raw>", true, true).unwrap();
        assert_eq!(doc.children(p), &[new, b]);
        assert_eq!(doc.kind(new), &NodeKind::CData("<raw>".to_string()));
    }

    #[test]
    fn test_ids_are_tied_to_their_document() {
        let (doc, ul, a, _) = sample();
        let (other, other_ul, _, _) = sample();
        assert!(doc.contains(ul));
        assert!(!doc.contains(other_ul));
        assert!(!other.contains(a));
        // Same arena position, different document
        assert_eq!(ul.index(), other_ul.index());
        assert_ne!(ul, other_ul);
    }

    #[test]
    fn test_collect_garbage_reclaims_detached_nodes() {
        let (mut doc, ul, a, b) = sample();
        let kept = doc.create_element("p");
        let pinned = doc.create_element("template");
        let pinned_child = doc.create_text("x");
        doc.append_child(pinned, pinned_child).unwrap();
        doc.pin(pinned);
        doc.remove_child(ul, a).unwrap();
        let stray = doc.create_element("span");

        assert_eq!(doc.collect_garbage(&[kept]), 2);
        assert!(!doc.contains(a));
        assert!(!doc.contains(stray));
        for node in [ul, b, kept, pinned, pinned_child] {
            assert!(doc.contains(node), "{} was reclaimed", node);
        }
        assert_eq!(doc.node_count(), 6);

        // Reclaimed slots are reused under a new generation
        let capacity = doc.capacity();
        let fresh = doc.create_element("li");
        assert_eq!(doc.capacity(), capacity);
        assert!(fresh.index() == a.index() || fresh.index() == stray.index());
        assert!(doc.contains(fresh));
        assert!(!doc.contains(a) || !doc.contains(stray));

        doc.unpin(pinned);
        assert_eq!(doc.collect_garbage(&[]), 4);
        assert_eq!(doc.node_count(), 3);
    }

    #[test]
    fn test_collect_garbage_detaches_roots_of_reclaimed_subtrees() {
        let mut doc = Document::new();
        let div = doc.create_element("div");
        let p = doc.create_element("p");
        doc.append_child(div, p).unwrap();

        assert_eq!(doc.collect_garbage(&[p]), 1);
        assert!(!doc.contains(div));
        assert_eq!(doc.parent(p), None);
        doc.append_child(doc.root(), p).unwrap();
        assert_eq!(doc.children(doc.root()), &[p]);
    }

    #[test]
    fn test_remove_all_children() {
        let (mut doc, ul, a, _) = sample();
        doc.remove_all_children(ul);
        assert!(!doc.has_children(ul));
        assert_eq!(doc.parent(a), None);
    }
}
