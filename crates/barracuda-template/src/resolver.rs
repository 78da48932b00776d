/*
 * resolver.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Directive resolution.
//!
//! Finds the directives attached to a template node. Three sources are
//! consulted, in order:
//!
//! 1. A processing instruction right before the node whose target is the
//!    configured directive target (`<?barracuda Dir::Discard?>`). This is
//!    the form to use in XML vocabularies that have no class attribute.
//! 2. The view's id map, when the node has a non-empty id.
//! 3. The tokens of the directive attribute (`class` by default).
//!
//! Resolution also works out how the node's attributes must be rewritten so
//! directive tokens and addressing ids do not reach the output.

use crate::directive::{Directive, DirectiveCatalog, DirectiveIdMap};
use crate::options::TemplateOptions;
use barracuda_dom::{Document, DomResult, NodeId, NodeKind};

/// Directives found on one node, plus the attribute rewrites they imply.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolvedDirectives {
    pub directives: Vec<Directive>,

    /// New value of the directive attribute when directive tokens were
    /// stripped from it. An empty string means the attribute goes away.
    pub directive_attribute: Option<String>,

    /// The id only addressed directives and is dropped from the output.
    pub remove_id: bool,
}

impl ResolvedDirectives {
    pub fn is_empty(&self) -> bool {
        self.directives.is_empty()
    }

    /// Strip directive tokens and addressing ids from `node`.
    pub fn apply_to(
        &self,
        doc: &mut Document,
        node: NodeId,
        options: &TemplateOptions,
    ) -> DomResult<()> {
        if !doc.is_element(node) {
            return Ok(());
        }
        if let Some(value) = &self.directive_attribute {
            if value.is_empty() {
                doc.remove_attribute(node, &options.directive_attribute)?;
            } else {
                doc.set_attribute(node, &options.directive_attribute, value.as_str())?;
            }
        }
        if self.remove_id {
            doc.remove_attribute(node, &options.id_attribute)?;
        }
        Ok(())
    }
}

/// Looks up the directives of template nodes for one view.
pub struct DirectiveResolver<'a> {
    options: &'a TemplateOptions,
    id_map: Option<&'a DirectiveIdMap>,
}

impl<'a> DirectiveResolver<'a> {
    pub fn new(options: &'a TemplateOptions, id_map: Option<&'a DirectiveIdMap>) -> Self {
        Self { options, id_map }
    }

    /// Whether `node` is a processing instruction carrying directives.
    pub fn is_directive_pi(&self, doc: &Document, node: NodeId) -> bool {
        matches!(
            doc.kind(node),
            NodeKind::ProcessingInstruction { target, .. }
                if *target == self.options.directive_pi_target
        )
    }

    /// Directive data of the processing instruction attached to `node`.
    fn preceding_pi_data<'d>(&self, doc: &'d Document, node: NodeId) -> Option<&'d str> {
        let mut sibling = doc.previous_sibling(node);
        while let Some(prev) = sibling {
            match doc.kind(prev) {
                NodeKind::Text(text) if text.trim().is_empty() => {
                    sibling = doc.previous_sibling(prev);
                }
                NodeKind::ProcessingInstruction { target, data }
                    if *target == self.options.directive_pi_target =>
                {
                    return Some(data);
                }
                _ => return None,
            }
        }
        None
    }

    pub fn resolve(
        &self,
        doc: &Document,
        node: NodeId,
        catalog: &mut DirectiveCatalog,
    ) -> ResolvedDirectives {
        let mut resolved = ResolvedDirectives::default();
        if !doc.is_element(node) {
            return resolved;
        }

        if let Some(data) = self.preceding_pi_data(doc, node) {
            resolved.directives.extend(Directive::parse_all(data));
        }

        if let (Some(id), Some(id_map)) = (
            doc.get_attribute(node, &self.options.id_attribute),
            self.id_map,
        ) {
            if !id.trim().is_empty() {
                let mapped = id_map.lookup(id);
                if !mapped.is_empty() {
                    resolved.directives.extend(mapped);
                    resolved.remove_id = true;
                }
            }
        }

        if let Some(value) = doc.get_attribute(node, &self.options.directive_attribute) {
            let mut kept: Vec<&str> = Vec::new();
            let mut found = false;
            for token in value.split_whitespace() {
                match catalog.lookup(token) {
                    Some(directive) => {
                        resolved.directives.push(directive);
                        found = true;
                    }
                    None => kept.push(token),
                }
            }
            if found {
                resolved.directive_attribute = Some(kept.join(" "));
            }
        }

        resolved
    }
}
