/*
 * engine.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Template rendering.
//!
//! A [`Template`] binds a node of a [`Document`] to a set of models. Each
//! render walks the template's master copy, applies the directives found on
//! every node and writes the result into the output tree:
//!
//! - a **permanent** template regenerates the children of its node from the
//!   master copy taken when the template was created, so it can be rendered
//!   again with fresh model data;
//! - a **step-child** template is rendered once and replaces its node
//!   outright, which lets directives on the node itself take effect.
//!
//! Loops are driven by `Iterate_Start`/`Iterate_Next`/`Iterate_End`
//! directives and tracked in the [`RenderScope`]. When a model hands back a
//! node or a component whose view has element children, those children are
//! rendered right away in a nested pass that shares the scope and the
//! models.
//!
//! Every render ends by reclaiming the nodes it left detached (the previous
//! output of a permanent template, discarded copies). Template masters are
//! pinned in the document; a model that keeps a detached node of the output
//! document between renders must pin it too.

use crate::component::{Component, DefaultView, add_child_to_parent, renderer_for};
use crate::directive::{Command, Directive, DirectiveCatalog, DirectiveIdMap};
use crate::error::{TemplateError, TemplateResult};
use crate::eval_context::{
    CHILD_NOT_ADDED, DEFAULT_VIEW_FAILED, Diagnostic, DiagnosticKind, ITERATION_MISMATCH,
    MISSING_ATTRIBUTE_NAME, MISSING_MODEL, NO_PROGRESS, NOT_ITERATIVE, RenderContext, StepChild,
};
use crate::iteration::{PreIterate, RenderScope};
use crate::model::{Item, ModelRegistry, SharedModel, TemplateModel, ViewContext};
use crate::options::{OutputFormat, TemplateOptions};
use crate::resolver::DirectiveResolver;
use barracuda_dom::{Document, DomError, NodeId};
use std::cell::RefCell;
use tracing::{debug, trace};

/// How a template is bound to its node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Binding {
    /// The node's children are regenerated on every render.
    Permanent,
    /// The node itself is replaced by its rendering, once.
    StepChild,
}

/// Outcome of one render.
#[derive(Debug, Clone)]
pub struct RenderReport {
    pub diagnostics: Vec<Diagnostic>,
    /// The node now holding the rendering. For step-child templates this is
    /// the replacement node.
    pub node: NodeId,
    /// A block-iterate region was copied verbatim and still needs a block
    /// iterator.
    pub has_block_iterator: bool,
}

impl RenderReport {
    pub fn warnings(&self) -> impl Iterator<Item = &Diagnostic> {
        self.diagnostics
            .iter()
            .filter(|d| d.kind == DiagnosticKind::Warning)
    }

    pub fn has_errors(&self) -> bool {
        self.diagnostics
            .iter()
            .any(|d| d.kind == DiagnosticKind::Error)
    }

    /// No diagnostics at all.
    pub fn is_clean(&self) -> bool {
        self.diagnostics.is_empty()
    }
}

/// A template view bound to a node, with its models.
pub struct Template {
    node: NodeId,
    master: NodeId,
    binding: Binding,
    models: ModelRegistry,
    options: TemplateOptions,
    id_map: Option<DirectiveIdMap>,
    catalog: RefCell<DirectiveCatalog>,
}

impl Template {
    /// A permanent template on `node`. The current subtree of `node` is
    /// copied aside as the master template.
    pub fn new(doc: &mut Document, node: NodeId) -> Self {
        let master = doc.clone_node(node, true);
        doc.pin(master);
        Self::with_binding(node, master, Binding::Permanent)
    }

    /// A template rendered once in place of `node`.
    pub fn step_child(node: NodeId) -> Self {
        Self::with_binding(node, node, Binding::StepChild)
    }

    fn with_binding(node: NodeId, master: NodeId, binding: Binding) -> Self {
        Self {
            node,
            master,
            binding,
            models: ModelRegistry::new(),
            options: TemplateOptions::default(),
            id_map: None,
            catalog: RefCell::new(DirectiveCatalog::new()),
        }
    }

    pub fn with_options(mut self, options: TemplateOptions) -> Self {
        self.options = options;
        self
    }

    /// Directives addressed by element id.
    pub fn with_id_map(mut self, id_map: DirectiveIdMap) -> Self {
        self.id_map = Some(id_map);
        self
    }

    pub fn with_models(mut self, models: ModelRegistry) -> Self {
        self.models = models;
        self
    }

    /// Register a model under its name; returns the shared handle.
    pub fn add_model<M: TemplateModel + 'static>(&mut self, model: M) -> SharedModel {
        self.models.register(model)
    }

    pub fn add_shared_model(&mut self, model: SharedModel) {
        self.models.register_shared(model);
    }

    pub fn models(&self) -> &ModelRegistry {
        &self.models
    }

    pub fn options(&self) -> &TemplateOptions {
        &self.options
    }

    pub fn node(&self) -> NodeId {
        self.node
    }

    pub fn binding(&self) -> Binding {
        self.binding
    }

    /// Render into `doc` using the iteration state in `scope`.
    ///
    /// Author mistakes are reported in the returned [`RenderReport`]. A
    /// component bound to a node its renderer cannot handle, an illegal tree
    /// mutation or runaway nesting abort the render.
    pub fn render(&self, doc: &mut Document, scope: &mut RenderScope) -> TemplateResult<RenderReport> {
        let mut fallback = DirectiveCatalog::new();
        let mut cached = self.catalog.try_borrow_mut().ok();
        let catalog = match cached.as_deref_mut() {
            Some(catalog) => catalog,
            None => &mut fallback,
        };

        let ctx = RenderContext::new()
            .with_strict_mode(self.options.strict)
            .with_max_nesting_depth(self.options.max_nesting_depth);
        let mut engine = Engine {
            doc,
            scope,
            ctx,
            models: &self.models,
            options: &self.options,
            resolver: DirectiveResolver::new(&self.options, self.id_map.as_ref()),
            catalog,
            skip_until_block_iterate_end: false,
        };

        debug!(node = %self.node, binding = ?self.binding, "rendering template");
        let node = match self.binding {
            Binding::Permanent => {
                engine.doc.remove_all_children(self.node);
                engine.copy_child_nodes(self.master, self.node)?;
                self.node
            }
            Binding::StepChild => match engine.render_node(self.node)?.map(|r| r.node) {
                Some(new_node) if new_node != self.node => {
                    if let Some(parent) = engine.doc.parent(self.node) {
                        engine.doc.replace_child(parent, new_node, self.node)?;
                    }
                    new_node
                }
                _ => self.node,
            },
        };
        engine.render_step_children()?;

        let has_block_iterator = engine.scope.has_block_iterator();
        let reclaimed = engine.doc.collect_garbage(&[self.node, node]);
        trace!(reclaimed, live = engine.doc.node_count(), "reclaimed detached nodes");
        Ok(RenderReport {
            diagnostics: engine.ctx.into_diagnostics(),
            node,
            has_block_iterator,
        })
    }

    /// Render with a scope of its own, flushed afterwards.
    pub fn render_once(&self, doc: &mut Document) -> TemplateResult<RenderReport> {
        let mut scope = RenderScope::new();
        let report = self.render(doc, &mut scope);
        scope.flush();
        report
    }
}

/// The output node of one template node.
#[derive(Debug, Clone, Copy)]
struct Rendered {
    node: NodeId,
    /// Built from a model item rather than copied from the template.
    from_model: bool,
}

/// What applying one directive did to the node.
enum Outcome {
    Continue,
    /// The node is replaced by this one.
    Produced(NodeId),
    /// The node contributes nothing.
    Discard,
}

/// State of one render, shared by nested passes.
struct Engine<'a> {
    doc: &'a mut Document,
    scope: &'a mut RenderScope,
    ctx: RenderContext,
    models: &'a ModelRegistry,
    options: &'a TemplateOptions,
    resolver: DirectiveResolver<'a>,
    catalog: &'a mut DirectiveCatalog,
    skip_until_block_iterate_end: bool,
}

impl Engine<'_> {
    // ------------------------------------------------------------------
    // Sibling traversal
    // ------------------------------------------------------------------

    /// Render the children of `template_parent` into `target`, following
    /// the loop-back and end-of-data signals of the innermost loop.
    fn copy_child_nodes(&mut self, template_parent: NodeId, target: NodeId) -> TemplateResult<()> {
        let mut cursor = self.doc.first_child(template_parent);
        while let Some(child) = cursor {
            let new_child = self.render_node(child)?;

            let Some(frame) = self.scope.top() else {
                if let Some(new_child) = new_child {
                    self.add_child(target, new_child);
                }
                cursor = self.doc.next_sibling(child);
                continue;
            };
            let (next_loop, eof, start, end) =
                (frame.next_loop, frame.eof, frame.start_node, frame.end_node);

            if next_loop {
                if let Some(new_child) = new_child {
                    self.add_child(target, new_child);
                }
                if self.doc.parent(start) != Some(template_parent) {
                    // The loop started in an enclosing list
                    return Ok(());
                }
                if let Some(frame) = self.scope.top_mut() {
                    frame.next_loop = false;
                }
                cursor = if self.loop_again() {
                    Some(start)
                } else {
                    self.doc.next_sibling(child)
                };
            } else if eof {
                cursor = self.after_exhausted_loop(template_parent, child, start, end);
            } else {
                if let Some(new_child) = new_child {
                    self.add_child(target, new_child);
                }
                cursor = if start == child && self.is_single_node_loop(child) {
                    if self.loop_again() {
                        Some(child)
                    } else {
                        self.doc.next_sibling(child)
                    }
                } else {
                    self.doc.next_sibling(child)
                };
            }
        }
        Ok(())
    }

    /// Where to go once the innermost loop ran out of data while visiting
    /// `child`. Nodes visited here are not emitted.
    fn after_exhausted_loop(
        &mut self,
        template_parent: NodeId,
        child: NodeId,
        start: NodeId,
        end: Option<NodeId>,
    ) -> Option<NodeId> {
        match end {
            Some(end) if end != child && self.doc.parent(end) == Some(template_parent) => Some(end),
            Some(_) => self.doc.next_sibling(child),
            None if self.doc.parent(start) == Some(template_parent) => {
                let model_name = self.scope.top().map(|f| f.model_name.clone());
                match self.find_iterate_end(child, model_name.as_deref()) {
                    Some(end) => {
                        if let Some(frame) = self.scope.top_mut() {
                            frame.end_node = Some(end);
                        }
                        Some(end)
                    }
                    None => {
                        self.scope.pop_frame();
                        self.doc.next_sibling(child)
                    }
                }
            }
            None => self.doc.next_sibling(child),
        }
    }

    /// First following sibling of `from` carrying an `Iterate_End` for
    /// `model_name`.
    fn find_iterate_end(&mut self, from: NodeId, model_name: Option<&str>) -> Option<NodeId> {
        let mut sibling = self.doc.next_sibling(from);
        while let Some(node) = sibling {
            let resolved = self.resolver.resolve(self.doc, node, self.catalog);
            let ends_loop = resolved
                .directives
                .iter()
                .any(|d| *d.command() == Command::IterateEnd && d.model_name() == model_name);
            if ends_loop {
                return Some(node);
            }
            sibling = self.doc.next_sibling(node);
        }
        None
    }

    /// Whether the innermost loop, started on `start`, repeats `start` alone.
    fn is_single_node_loop(&mut self, start: NodeId) -> bool {
        let Some(frame) = self.scope.top() else {
            return false;
        };
        if frame.end_node.is_some() {
            return false;
        }
        if let Some(single) = frame.single_node {
            return single;
        }
        let model_name = frame.model_name.clone();
        let single = self.find_iterate_end(start, Some(&model_name)).is_none();
        if let Some(frame) = self.scope.top_mut() {
            frame.single_node = Some(single);
        }
        single
    }

    /// Prepare the innermost loop for another pass over its body. A pass
    /// that loaded no record closes the loop instead.
    fn loop_again(&mut self) -> bool {
        let Some(frame) = self.scope.top_mut() else {
            return false;
        };
        if frame.counter == frame.last_loop_counter {
            let model = frame.model.clone();
            let name = frame.model_name.clone();
            self.ctx.warn_or_error_with_code(
                NO_PROGRESS,
                format!("Loop over {} loaded no record in a full pass; closing it", name),
            );
            self.scope.postiterate(&model, Some(&name));
            self.scope.pop_frame();
            return false;
        }
        frame.last_loop_counter = frame.counter;
        frame.skip_to_next = true;
        trace!(model = %frame.model_name, counter = frame.counter, "looping back");
        true
    }

    /// Append a rendered node. In HTML, nodes built from model items get the
    /// wrapper their parent requires; template markup is appended as is.
    fn add_child(&mut self, parent: NodeId, child: Rendered) {
        let Rendered { node: child, from_model } = child;
        let result = match self.options.output_format {
            OutputFormat::Html if from_model => add_child_to_parent(self.doc, parent, child),
            OutputFormat::Html | OutputFormat::Xml => self.doc.append_child(parent, child),
        };
        if let Err(err) = result {
            self.ctx.warn_or_error_with_code(
                CHILD_NOT_ADDED,
                format!("Could not add {} to {}: {}", child, parent, err),
            );
        }
    }

    // ------------------------------------------------------------------
    // Node visit
    // ------------------------------------------------------------------

    /// The rendering of one template node, or `None` when it contributes
    /// nothing.
    fn render_node(&mut self, node: NodeId) -> TemplateResult<Option<Rendered>> {
        if self.resolver.is_directive_pi(self.doc, node) {
            return Ok(None);
        }
        let mut resolved = self.resolver.resolve(self.doc, node, self.catalog);
        let mut directives = std::mem::take(&mut resolved.directives);

        let mut deep_copy = self.skip_until_block_iterate_end;
        for directive in &directives {
            match directive.command() {
                Command::BlockIterate => {
                    deep_copy = true;
                    self.scope.mark_block_iterator();
                }
                Command::BlockIterateStart => {
                    self.skip_until_block_iterate_end = true;
                    deep_copy = true;
                    self.scope.mark_block_iterator();
                }
                Command::BlockIterateEnd => {
                    self.skip_until_block_iterate_end = false;
                    deep_copy = true;
                }
                _ => {}
            }
        }
        if deep_copy {
            trace!(node = %node, "copying block-iterate region verbatim");
            return Ok(Some(Rendered {
                node: self.doc.clone_node(node, true),
                from_model: false,
            }));
        }

        let mut new_node = None;
        let mut attributes: Vec<(String, Option<String>)> = Vec::new();
        if !directives.is_empty() {
            imply_iterate_next(&mut directives);
            self.skip_to_start(&mut directives);
            let queued = self.ctx.step_children.len();
            for directive in &directives {
                match self.apply_directive(node, directive, &mut attributes)? {
                    Outcome::Continue => {}
                    Outcome::Produced(produced) => new_node = Some(produced),
                    Outcome::Discard => {
                        // Components fetched for this node go with it
                        self.ctx.truncate_step_children(queued);
                        return Ok(None);
                    }
                }
            }
        }

        let from_model = new_node.is_some();
        let new_node = match new_node {
            Some(new_node) => new_node,
            None => {
                let copy = self.doc.clone_node(node, false);
                self.copy_child_nodes(node, copy)?;
                copy
            }
        };

        resolved.apply_to(self.doc, new_node, self.options)?;
        if self.doc.is_element(new_node) {
            for (name, value) in attributes {
                match value {
                    Some(value) => self.doc.set_attribute(new_node, &name, value)?,
                    None => {
                        self.doc.remove_attribute(new_node, &name)?;
                    }
                }
            }
        }
        Ok(Some(Rendered {
            node: new_node,
            from_model,
        }))
    }

    /// On a loop-back visit, drop the directives that precede the loop's
    /// start directive (and the start directive itself when it is an
    /// `Iterate_Start`).
    fn skip_to_start(&mut self, directives: &mut Vec<Directive>) {
        let Some(frame) = self.scope.top_mut() else {
            return;
        };
        if !frame.skip_to_next {
            return;
        }
        frame.skip_to_next = false;
        match directives
            .iter()
            .position(|d| d.matches(&frame.start_directive))
        {
            Some(pos) => {
                let end = if *directives[pos].command() == Command::IterateStart {
                    pos + 1
                } else {
                    pos
                };
                directives.drain(..end);
            }
            None => directives.clear(),
        }
    }

    fn innermost_eof(&self) -> bool {
        self.scope.top().is_some_and(|f| f.eof)
    }

    fn apply_directive(
        &mut self,
        node: NodeId,
        directive: &Directive,
        attributes: &mut Vec<(String, Option<String>)>,
    ) -> TemplateResult<Outcome> {
        let command = directive.command();
        let model = directive.model_name().and_then(|name| self.models.get(name));
        let Some(model) = model else {
            if *command == Command::Discard {
                return Ok(Outcome::Discard);
            }
            self.ctx.warn_or_error_with_code(
                MISSING_MODEL,
                format!(
                    "Cannot find a model named {}. Skipping directive {}",
                    directive.model_name().unwrap_or("<none>"),
                    directive
                ),
            );
            return Ok(Outcome::Continue);
        };

        if !model.borrow_mut().process_directive(directive) {
            trace!(directive = %directive, "vetoed by model");
            return Ok(Outcome::Discard);
        }

        match command {
            Command::GetData => self.get_data(node, directive, &model),
            Command::SetAttr | Command::PutAttr => {
                self.attribute_directive(node, directive, &model, attributes)
            }
            Command::Discard => Ok(Outcome::Discard),
            Command::IterateStart => {
                if self.scope.preiterate(node, &model, directive) == PreIterate::NotIterative {
                    self.not_iterative(directive);
                }
                Ok(Outcome::Continue)
            }
            Command::IterateNext => Ok(self.iterate_next(node, directive, &model)),
            Command::IterateEnd => Ok(self.iterate_end(node, directive)),
            Command::BlockIterate
            | Command::BlockIterateStart
            | Command::BlockIterateEnd
            | Command::Custom(_) => Ok(Outcome::Continue),
        }
    }

    fn not_iterative(&mut self, directive: &Directive) {
        self.ctx.warn_or_error_with_code(
            NOT_ITERATIVE,
            format!(
                "Model {} does not support iteration; skipping directive {}",
                directive.model_name().unwrap_or_default(),
                directive
            ),
        );
    }

    fn iterate_next(&mut self, node: NodeId, directive: &Directive, model: &SharedModel) -> Outcome {
        if self.scope.preiterate(node, model, directive) == PreIterate::NotIterative {
            self.not_iterative(directive);
            return Outcome::Continue;
        }
        let Some(frame) = self.scope.top_mut() else {
            return Outcome::Continue;
        };
        if !frame.is_for(directive.model_name()) {
            let message = format!(
                "Iterate_Next for {} inside the loop over {}",
                directive.model_name().unwrap_or_default(),
                frame.model_name
            );
            self.ctx.warn_or_error_with_code(ITERATION_MISMATCH, message);
            return Outcome::Continue;
        }

        let frame_model = frame.model.clone();
        let has_next = frame_model
            .borrow_mut()
            .as_iterative()
            .is_some_and(|it| it.has_next());
        if has_next {
            if let Some(iterative) = frame_model.borrow_mut().as_iterative() {
                iterative.load_next();
            }
            frame.counter += 1;
            Outcome::Continue
        } else {
            frame.eof = true;
            self.scope.postiterate(model, directive.model_name());
            Outcome::Discard
        }
    }

    fn iterate_end(&mut self, node: NodeId, directive: &Directive) -> Outcome {
        let block_iterator = self.scope.block_iterator();
        if block_iterator.is_some() && block_iterator == directive.model_name() {
            return Outcome::Discard;
        }

        let Some(frame) = self.scope.top_mut() else {
            let message = format!(
                "Iterate_End for {} outside of any loop",
                directive.model_name().unwrap_or_default()
            );
            self.ctx.warn_or_error_with_code(ITERATION_MISMATCH, message);
            return Outcome::Continue;
        };
        if !frame.is_for(directive.model_name()) {
            let message = format!(
                "Iterate_End for {} inside the loop over {}",
                directive.model_name().unwrap_or_default(),
                frame.model_name
            );
            self.ctx.warn_or_error_with_code(ITERATION_MISMATCH, message);
            return Outcome::Continue;
        }

        if frame.eof {
            self.scope.pop_frame();
            Outcome::Continue
        } else {
            frame.next_loop = true;
            frame.skip_to_next = true;
            frame.end_node = Some(node);
            Outcome::Discard
        }
    }

    fn model_item(&mut self, node: NodeId, directive: &Directive, model: &SharedModel) -> Item {
        let mut view = ViewContext {
            doc: &mut *self.doc,
            template_node: node,
            format: self.options.output_format,
        };
        model.borrow_mut().item(directive, &mut view)
    }

    fn get_data(
        &mut self,
        node: NodeId,
        directive: &Directive,
        model: &SharedModel,
    ) -> TemplateResult<Outcome> {
        if self.innermost_eof() {
            return Ok(Outcome::Discard);
        }

        let new_node = match self.model_item(node, directive, model) {
            Item::Empty => return Ok(Outcome::Discard),
            Item::Text(text) => {
                let copy = self.doc.clone_node(node, true);
                self.ctx.add_step_child(Component::text(text), copy);
                copy
            }
            Item::Node(item_node) => {
                if !self.doc.contains(item_node) {
                    let what = format!(
                        "node returned by model {}",
                        directive.model_name().unwrap_or_default()
                    );
                    return Err(foreign_node(&what, item_node));
                }
                if self.doc.has_element_children(item_node) {
                    self.nested_pass(item_node)?;
                }
                item_node
            }
            Item::Foreign { document, node: foreign } => {
                let imported = self.doc.import_node(&document, foreign, true);
                if self.doc.has_element_children(imported) {
                    self.nested_pass(imported)?;
                }
                imported
            }
            Item::Component(component) => self.component_node(node, component)?,
        };
        Ok(Outcome::Produced(new_node))
    }

    /// The node a component renders into, queued as a step child.
    fn component_node(&mut self, template_node: NodeId, component: Component) -> TemplateResult<NodeId> {
        let view = match component.view {
            Some(view) if !self.doc.contains(view) => {
                return Err(foreign_node("component view", view));
            }
            Some(view) => Some(DefaultView::same(view)),
            None => {
                let created = renderer_for(self.options.output_format, &component.kind).and_then(
                    |renderer| {
                        renderer.create_default_node(self.doc, &component, template_node, self.options)
                    },
                );
                match created {
                    Ok(Some(view)) => Some(view),
                    Ok(None) => Some(DefaultView::same(self.doc.clone_node(template_node, true))),
                    Err(err) => {
                        self.ctx.warn_or_error_with_code(
                            DEFAULT_VIEW_FAILED,
                            format!("Unable to create default view: {}", err),
                        );
                        None
                    }
                }
            }
        };

        let Some(view) = view else {
            return Ok(self.doc.clone_node(template_node, true));
        };
        self.ctx.add_step_child(component, view.view);
        // A renderer-built wrapper is final; a plain view may carry directives
        if view.node == view.view && self.doc.has_element_children(view.node) {
            self.nested_pass(view.node)?;
        }
        Ok(view.node)
    }

    fn attribute_directive(
        &mut self,
        node: NodeId,
        directive: &Directive,
        model: &SharedModel,
        attributes: &mut Vec<(String, Option<String>)>,
    ) -> TemplateResult<Outcome> {
        if self.innermost_eof() {
            return Ok(Outcome::Discard);
        }
        let Some(name) = directive.key_data() else {
            self.ctx.warn_or_error_with_code(
                MISSING_ATTRIBUTE_NAME,
                format!("Directive {} names no attribute", directive),
            );
            return Ok(Outcome::Continue);
        };

        let item = self.model_item(node, directive, model);
        let value = item.as_attribute_value().map(str::to_string);
        let slot = attributes.iter_mut().find(|(n, _)| n == name);

        if *directive.command() == Command::PutAttr {
            match slot {
                Some((_, current)) => *current = value.clone(),
                None => attributes.push((name.to_string(), value.clone())),
            }
            if self.doc.is_element(node) {
                match value {
                    Some(value) => self.doc.set_attribute(node, name, value)?,
                    None => {
                        self.doc.remove_attribute(node, name)?;
                    }
                }
            }
            return Ok(Outcome::Continue);
        }

        match slot {
            None => attributes.push((name.to_string(), value)),
            Some((_, current)) => {
                if current.is_none() {
                    *current = value;
                } else if let (Some(existing), Some(value)) = (current.as_mut(), value) {
                    existing.push(' ');
                    existing.push_str(&value);
                }
            }
        }
        Ok(Outcome::Continue)
    }

    /// Render the children of `node` in place, as a template of their own.
    fn nested_pass(&mut self, node: NodeId) -> TemplateResult<()> {
        if self.ctx.nesting_depth >= self.ctx.max_nesting_depth {
            return Err(TemplateError::NestingTooDeep {
                max_depth: self.ctx.max_nesting_depth,
            });
        }
        let master = self.doc.clone_node(node, true);
        self.doc.remove_all_children(node);

        self.ctx.nesting_depth += 1;
        let saved = std::mem::replace(&mut self.skip_until_block_iterate_end, false);
        debug!(node = %node, depth = self.ctx.nesting_depth, "nested template pass");
        let result = self.copy_child_nodes(master, node);
        self.skip_until_block_iterate_end = saved;
        self.ctx.nesting_depth -= 1;
        result
    }

    /// Render the components queued during the pass.
    fn render_step_children(&mut self) -> TemplateResult<()> {
        for StepChild { component, node } in self.ctx.take_step_children() {
            let renderer = renderer_for(self.options.output_format, &component.kind)?;
            trace!(node = %node, kind = component.kind.label(), "rendering step child");
            renderer.render(self.doc, &component, node)?;
        }
        Ok(())
    }
}

fn foreign_node(what: &str, node: NodeId) -> TemplateError {
    TemplateError::Dom(DomError::HierarchyRequest {
        message: format!("{} {} does not belong to the output document", what, node),
    })
}

/// A node that starts a loop and reads the loop's model, but never advances
/// it, advances it right after the start.
fn imply_iterate_next(directives: &mut Vec<Directive>) {
    let mut i = 0;
    while i < directives.len() {
        if *directives[i].command() == Command::IterateStart {
            let model = directives[i].model_name().map(str::to_string);
            let same_model = |d: &Directive| d.model_name() == model.as_deref();
            let advances = directives
                .iter()
                .any(|d| *d.command() == Command::IterateNext && same_model(d));
            let reads = directives
                .iter()
                .any(|d| d.command().reads_data() && same_model(d));
            if reads && !advances {
                let next = Directive::new(Command::IterateNext, model.as_deref(), None, None);
                directives.insert(i + 1, next);
            }
        }
        i += 1;
    }
}
