/*
 * iteration.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Iteration state of a render.
//!
//! [`RenderScope`] is the explicit replacement for request-scoped storage:
//! the host creates one per logical render, hands it to every template
//! rendered as part of that operation and flushes it before reusing it for
//! an unrelated render.
//!
//! The scope holds a stack of [`IterationFrame`]s (one per active loop) and
//! an identity-keyed table of models that have been pre-iterated, so that
//! `pre_iterate`/`post_iterate` run exactly once per model instance however
//! many loop bodies refer to it.

use crate::directive::Directive;
use crate::model::SharedModel;
use barracuda_dom::NodeId;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;
use tracing::{debug, trace};

/// Identity of a shared model instance.
pub type ModelKey = usize;

/// The identity key of `model`. Equal data in two instances gives two keys.
pub fn model_key(model: &SharedModel) -> ModelKey {
    Rc::as_ptr(model) as *const () as usize
}

/// Bookkeeping for one active loop.
#[derive(Clone)]
pub struct IterationFrame {
    pub model: SharedModel,
    pub model_name: String,
    /// Template node the loop started on; loop-backs return here.
    pub start_node: NodeId,
    /// Template node carrying the `Iterate_End`, once it has been seen.
    pub end_node: Option<NodeId>,
    pub start_directive: Directive,
    pub has_pre_iterated: bool,
    pub has_post_iterated: bool,
    /// Strip directives up to the start directive on the next visit.
    pub skip_to_next: bool,
    /// Rewind the sibling cursor to `start_node`.
    pub next_loop: bool,
    /// The model ran out of records.
    pub eof: bool,
    /// Records loaded so far.
    pub counter: usize,
    /// Value of `counter` when the current pass over the loop body started.
    pub last_loop_counter: usize,
    /// The loop body is the start node alone (no `Iterate_End` follows it
    /// among its siblings). Worked out on the first pass.
    pub single_node: Option<bool>,
}

impl IterationFrame {
    fn new(model: SharedModel, start_node: NodeId, start_directive: Directive) -> Self {
        Self {
            model,
            model_name: start_directive.model_name().unwrap_or_default().to_string(),
            start_node,
            end_node: None,
            start_directive,
            has_pre_iterated: false,
            has_post_iterated: false,
            skip_to_next: false,
            next_loop: false,
            eof: false,
            counter: 0,
            last_loop_counter: 0,
            single_node: None,
        }
    }

    pub fn is_for(&self, model_name: Option<&str>) -> bool {
        model_name == Some(self.model_name.as_str())
    }
}

impl fmt::Debug for IterationFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IterationFrame")
            .field("model_name", &self.model_name)
            .field("start_node", &self.start_node)
            .field("end_node", &self.end_node)
            .field("start_directive", &self.start_directive.to_string())
            .field("has_pre_iterated", &self.has_pre_iterated)
            .field("has_post_iterated", &self.has_post_iterated)
            .field("skip_to_next", &self.skip_to_next)
            .field("next_loop", &self.next_loop)
            .field("eof", &self.eof)
            .field("counter", &self.counter)
            .finish()
    }
}

/// Outcome of [`RenderScope::preiterate`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PreIterate {
    /// The model has no iteration capability; nothing was pushed.
    NotIterative,
    /// The innermost frame already runs this loop.
    AlreadyActive,
    /// A new frame was pushed.
    Started,
}

/// Render-scoped iteration state.
#[derive(Default)]
pub struct RenderScope {
    stack: Option<Vec<IterationFrame>>,
    preiterated: HashMap<ModelKey, SharedModel>,
    block_iterator: Option<String>,
    has_block_iterator: bool,
}

impl RenderScope {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn frames(&self) -> &[IterationFrame] {
        self.stack.as_deref().unwrap_or_default()
    }

    pub fn depth(&self) -> usize {
        self.frames().len()
    }

    pub fn is_iterating(&self) -> bool {
        self.stack.is_some()
    }

    /// The innermost frame.
    pub fn top(&self) -> Option<&IterationFrame> {
        self.stack.as_ref().and_then(|s| s.last())
    }

    pub fn top_mut(&mut self) -> Option<&mut IterationFrame> {
        self.stack.as_mut().and_then(|s| s.last_mut())
    }

    /// Whether `model` has been pre-iterated and not yet post-iterated.
    pub fn is_preiterated(&self, model: &SharedModel) -> bool {
        self.preiterated.contains_key(&model_key(model))
    }

    /// Enter a loop over `model`, started by `directive` on `node`.
    pub fn preiterate(
        &mut self,
        node: NodeId,
        model: &SharedModel,
        directive: &Directive,
    ) -> PreIterate {
        if model.borrow_mut().as_iterative().is_none() {
            return PreIterate::NotIterative;
        }
        let key = model_key(model);

        if self.stack.is_none() {
            self.stack = Some(Vec::new());
            // A fresh stack means a fresh loop, even over a model seen before
            self.preiterated.remove(&key);
        }

        if let Some(top) = self.top() {
            if top.is_for(directive.model_name()) && top.has_pre_iterated {
                return PreIterate::AlreadyActive;
            }
        }

        let mut frame = IterationFrame::new(model.clone(), node, directive.clone());
        if !self.preiterated.contains_key(&key) {
            if let Some(iterative) = model.borrow_mut().as_iterative() {
                iterative.pre_iterate();
            }
            self.preiterated.insert(key, model.clone());
        }
        frame.has_pre_iterated = true;
        debug!(model = %frame.model_name, node = %node, "entering loop");
        if let Some(stack) = self.stack.as_mut() {
            stack.push(frame);
        }
        PreIterate::Started
    }

    /// Leave a loop over `model`. Returns `false` when there was nothing to
    /// do (no active stack, or the innermost frame already post-iterated).
    pub fn postiterate(&mut self, model: &SharedModel, model_name: Option<&str>) -> bool {
        let Some(stack) = self.stack.as_mut() else {
            return false;
        };
        if let Some(top) = stack.last() {
            if top.is_for(model_name) && top.has_post_iterated {
                return false;
            }
        }

        if self.preiterated.remove(&model_key(model)).is_some() {
            if let Some(iterative) = model.borrow_mut().as_iterative() {
                iterative.post_iterate();
            }
            if let Some(top) = stack.last_mut() {
                top.has_post_iterated = true;
            }
            trace!(model = model_name.unwrap_or_default(), "post-iterated");
        }
        true
    }

    /// Drop the innermost frame. The stack goes away with its last frame.
    pub fn pop_frame(&mut self) -> Option<IterationFrame> {
        let stack = self.stack.as_mut()?;
        let frame = stack.pop();
        if stack.is_empty() {
            self.stack = None;
        }
        if let Some(frame) = &frame {
            debug!(model = %frame.model_name, "leaving loop");
        }
        frame
    }

    /// Forget everything. Call between unrelated renders.
    pub fn flush(&mut self) {
        *self = RenderScope::default();
    }

    /// Hand-off point for an external block iterator: once it has finished
    /// driving its loops, it drops the iteration stack here.
    pub fn cleanup_after_block_iterate(&mut self) {
        debug!(frames = self.depth(), "cleaning up after block iterate");
        self.stack = None;
        self.block_iterator = None;
    }

    /// Name of the model an external block iterator is currently driving.
    /// `Iterate_End` directives for that model are left to it.
    pub fn set_block_iterator(&mut self, model_name: Option<String>) {
        self.block_iterator = model_name;
    }

    pub fn block_iterator(&self) -> Option<&str> {
        self.block_iterator.as_deref()
    }

    /// Whether a render in this scope deep-copied a block-iterate region
    /// that still needs a block iterator pass.
    pub fn has_block_iterator(&self) -> bool {
        self.has_block_iterator
    }

    pub(crate) fn mark_block_iterator(&mut self) {
        self.has_block_iterator = true;
    }
}

impl fmt::Debug for RenderScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RenderScope")
            .field("frames", &self.frames())
            .field("preiterated", &self.preiterated.len())
            .field("block_iterator", &self.block_iterator)
            .field("has_block_iterator", &self.has_block_iterator)
            .finish()
    }
}
