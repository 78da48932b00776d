/*
 * lib.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Directive-driven markup templates.
//!
//! Templates are plain HTML or XML documents. Elements carry directives in
//! their `class` attribute (or in a processing instruction right before
//! them, or in an id map supplied with the view):
//!
//! - Data: `Dir::Get_Data.Model.key` replaces the element's content
//! - Attributes: `Dir::Set_Attr.Model.key.attr`, `Dir::Put_Attr.Model.key.attr`
//! - Removal: `Dir::Discard`
//! - Loops: `Dir::Iterate_Start.Model`, `Dir::Iterate_Next.Model`,
//!   `Dir::Iterate_End.Model`
//! - Block loops: `Dir::Block_Iterate`, `Dir::Block_Iterate_Start`,
//!   `Dir::Block_Iterate_End` (copied verbatim for an external iterator)
//!
//! Models implement [`TemplateModel`] (and [`IterativeModel`] to drive
//! loops) and are looked up by name in a [`ModelRegistry`]. Values a model
//! hands back as [`Component`]s are rendered by a [`ComponentRenderer`]
//! chosen for the output format.
//!
//! # Example
//!
//! ```ignore
//! use barracuda_template::{ListModel, Template};
//!
//! let mut doc = barracuda_dom::parse(
//!     r#"<ul><li class="Dir::Iterate_Start:Items Dir::Get_Data:Items.name"/></ul>"#,
//! )?;
//! let root = doc.root();
//! let mut template = Template::new(&mut doc, root);
//! template.add_model(ListModel::new("Items", vec!["a".into(), "b".into()]));
//! let report = template.render_once(&mut doc)?;
//! assert_eq!(doc.to_xml(), "<ul><li>a</li><li>b</li></ul>");
//! assert!(report.is_clean());
//! ```

pub mod component;
pub mod directive;
pub mod engine;
pub mod error;
pub mod eval_context;
pub mod iteration;
pub mod model;
pub mod options;
pub mod resolver;

// Re-export main types at crate root
pub use component::{
    Component, ComponentKind, ComponentRenderer, DefaultView, ScriptMode, SelectOption,
    renderer_for,
};
pub use directive::{Command, DIRECTIVE_PREFIX, Directive, DirectiveCatalog, DirectiveIdMap};
pub use engine::{Binding, RenderReport, Template};
pub use error::{TemplateError, TemplateResult};
pub use eval_context::{Diagnostic, DiagnosticCollector, DiagnosticKind, RenderContext};
pub use iteration::{IterationFrame, RenderScope};
pub use model::{
    Item, IterativeModel, ListModel, MapModel, ModelRegistry, ModelValue, SharedModel,
    TemplateModel, ViewContext,
};
pub use options::{OutputFormat, TemplateConfig, TemplateOptions};
pub use resolver::{DirectiveResolver, ResolvedDirectives};
