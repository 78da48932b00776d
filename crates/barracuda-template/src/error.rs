/*
 * error.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Error types for template rendering.

use thiserror::Error;

/// Errors that abort a render.
///
/// Author mistakes (unknown model names, misplaced iteration directives) are
/// not errors: they are reported as diagnostics and the render continues.
#[derive(Debug, Error)]
pub enum TemplateError {
    /// A component was bound to a node its renderer cannot handle.
    #[error("No suitable renderer: {message}")]
    NoSuitableRenderer { message: String },

    /// The output format has no renderer for a component kind.
    #[error("Unsupported format: {format} cannot render {component} components")]
    UnsupportedFormat {
        format: String,
        component: &'static str,
    },

    /// Nested template passes went deeper than the configured limit.
    #[error("Nested template passes exceed the maximum depth of {max_depth}")]
    NestingTooDeep { max_depth: usize },

    /// Invalid template configuration.
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// An illegal tree mutation.
    #[error("Tree mutation failed: {0}")]
    Dom(#[from] barracuda_dom::DomError),

    /// The template markup could not be parsed.
    #[error("Template parse error: {0}")]
    Parse(#[from] barracuda_dom::Error),
}

/// Result type for template operations.
pub type TemplateResult<T> = Result<T, TemplateError>;
