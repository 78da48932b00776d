/*
 * eval_context.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Render context for template passes.
//!
//! This module provides [`RenderContext`], which is threaded through every
//! template pass of one render to support:
//!
//! 1. **Diagnostics**: Collect author warnings (unknown models, broken loops)
//! 2. **State tracking**: Nested pass depth for recursion protection
//! 3. **Configuration**: Strict mode for treating warnings as errors
//! 4. **Deferred work**: Components waiting to be rendered after the pass

use crate::component::Component;
use barracuda_dom::NodeId;
use std::fmt;
use tracing::{error, warn};

/// Missing model for a directive.
pub const MISSING_MODEL: &str = "B-1-1";
/// Iteration directive aimed at a model that cannot iterate.
pub const NOT_ITERATIVE: &str = "B-1-2";
/// Iteration directive that does not match the active loop.
pub const ITERATION_MISMATCH: &str = "B-1-3";
/// Loop that reached its end without consuming a record.
pub const NO_PROGRESS: &str = "B-1-4";
/// Attribute directive without an attribute name.
pub const MISSING_ATTRIBUTE_NAME: &str = "B-1-5";
/// Default view for a component could not be built.
pub const DEFAULT_VIEW_FAILED: &str = "B-2-1";
/// Rendered child could not be added to its parent.
pub const CHILD_NOT_ADDED: &str = "B-2-2";

/// Severity of a diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiagnosticKind {
    Error,
    Warning,
}

/// A message about the template recorded during rendering.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub kind: DiagnosticKind,
    pub code: Option<String>,
    pub message: String,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self.kind {
            DiagnosticKind::Error => "error",
            DiagnosticKind::Warning => "warning",
        };
        match &self.code {
            Some(code) => write!(f, "{}[{}]: {}", label, code, self.message),
            None => write!(f, "{}: {}", label, self.message),
        }
    }
}

/// Collector for diagnostic messages during rendering.
#[derive(Debug, Default)]
pub struct DiagnosticCollector {
    diagnostics: Vec<Diagnostic>,
}

impl DiagnosticCollector {
    /// Create a new empty diagnostic collector.
    pub fn new() -> Self {
        Self {
            diagnostics: Vec::new(),
        }
    }

    /// Add a diagnostic message.
    pub fn add(&mut self, diagnostic: Diagnostic) {
        self.diagnostics.push(diagnostic);
    }

    /// Add an error message with error code.
    pub fn error_with_code(&mut self, code: &str, message: impl Into<String>) {
        let message = message.into();
        error!(code, "{}", message);
        self.add(Diagnostic {
            kind: DiagnosticKind::Error,
            code: Some(code.to_string()),
            message,
        });
    }

    /// Add a warning message with error code.
    pub fn warn_with_code(&mut self, code: &str, message: impl Into<String>) {
        let message = message.into();
        warn!(code, "{}", message);
        self.add(Diagnostic {
            kind: DiagnosticKind::Warning,
            code: Some(code.to_string()),
            message,
        });
    }

    /// Check if any errors were collected (warnings don't count).
    pub fn has_errors(&self) -> bool {
        self.diagnostics
            .iter()
            .any(|d| d.kind == DiagnosticKind::Error)
    }

    /// Get a reference to the collected diagnostics.
    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    /// Consume the collector and return the diagnostics in the order recorded.
    pub fn into_diagnostics(self) -> Vec<Diagnostic> {
        self.diagnostics
    }

    /// Check if the collector is empty.
    pub fn is_empty(&self) -> bool {
        self.diagnostics.is_empty()
    }
}

/// A component returned by a model, bound to the node it renders into.
///
/// Step children live for one render: they are rendered once the outermost
/// pass is done and then dropped.
#[derive(Debug, Clone)]
pub struct StepChild {
    pub component: Component,
    pub node: NodeId,
}

/// Context for one render.
///
/// Nested passes share the context of the pass that spawned them, so their
/// diagnostics and step children land in the same place.
#[derive(Debug)]
pub struct RenderContext {
    /// Diagnostic collector for errors and warnings.
    pub diagnostics: DiagnosticCollector,

    /// Current nesting depth of template passes.
    pub nesting_depth: usize,

    /// Maximum nesting depth before error.
    pub max_nesting_depth: usize,

    /// Strict mode: treat warnings as errors.
    pub strict_mode: bool,

    /// Components waiting to be rendered.
    pub step_children: Vec<StepChild>,
}

impl Default for RenderContext {
    fn default() -> Self {
        Self::new()
    }
}

impl RenderContext {
    pub fn new() -> Self {
        Self {
            diagnostics: DiagnosticCollector::new(),
            nesting_depth: 0,
            max_nesting_depth: 50,
            strict_mode: false,
            step_children: Vec::new(),
        }
    }

    /// Enable or disable strict mode.
    pub fn with_strict_mode(mut self, strict: bool) -> Self {
        self.strict_mode = strict;
        self
    }

    /// Set the maximum nesting depth.
    pub fn with_max_nesting_depth(mut self, depth: usize) -> Self {
        self.max_nesting_depth = depth;
        self
    }

    /// Add an error or warning with error code depending on strict mode.
    pub fn warn_or_error_with_code(&mut self, code: &str, message: impl Into<String>) {
        if self.strict_mode {
            self.diagnostics.error_with_code(code, message);
        } else {
            self.diagnostics.warn_with_code(code, message);
        }
    }

    /// Queue a component for rendering after the pass.
    pub fn add_step_child(&mut self, component: Component, node: NodeId) {
        self.step_children.push(StepChild { component, node });
    }

    /// Forget the components queued after the first `len` ones.
    pub fn truncate_step_children(&mut self, len: usize) {
        self.step_children.truncate(len);
    }

    /// Take the queued components, leaving the queue empty.
    pub fn take_step_children(&mut self) -> Vec<StepChild> {
        std::mem::take(&mut self.step_children)
    }

    /// Check if any errors have been collected.
    pub fn has_errors(&self) -> bool {
        self.diagnostics.has_errors()
    }

    /// Consume the context and return collected diagnostics.
    pub fn into_diagnostics(self) -> Vec<Diagnostic> {
        self.diagnostics.into_diagnostics()
    }
}
