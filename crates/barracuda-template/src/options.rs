/*
 * options.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Render configuration.
//!
//! [`TemplateOptions`] carries the settings a view needs to find directives
//! and the settings the engine needs to render them. [`TemplateConfig`] is
//! the on-disk form: the options plus an optional table of id-addressed
//! directives, loaded from TOML.
//!
//! ```toml
//! directive-attribute = "class"
//! output-format = "html"
//! strict = true
//!
//! [directives]
//! rows = "Dir::Iterate_Start.Rows Dir::Get_Data.Rows.name"
//! ```

use crate::directive::DirectiveIdMap;
use crate::error::{TemplateError, TemplateResult};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Which component renderer family applies to the output tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// HTML semantics: element-aware renderers and child wrapping.
    #[default]
    Html,
    /// Generic XML: plain appends, text and label components only.
    Xml,
}

impl OutputFormat {
    pub fn as_str(self) -> &'static str {
        match self {
            OutputFormat::Html => "html",
            OutputFormat::Xml => "xml",
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OutputFormat {
    type Err = TemplateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "html" | "xhtml" => Ok(OutputFormat::Html),
            "xml" => Ok(OutputFormat::Xml),
            other => Err(TemplateError::Config {
                message: format!("unknown output format '{}'", other),
            }),
        }
    }
}

/// Settings shared by a template view and the render engine.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct TemplateOptions {
    /// Attribute holding the id used for id-addressed directives.
    pub id_attribute: String,

    /// Attribute whose whitespace-separated tokens may be directives.
    pub directive_attribute: String,

    /// Target of processing instructions that carry directives.
    pub directive_pi_target: String,

    /// Renderer family for the output tree.
    pub output_format: OutputFormat,

    /// Record author warnings as errors.
    pub strict: bool,

    /// Maximum depth of nested template passes.
    pub max_nesting_depth: usize,
}

impl Default for TemplateOptions {
    fn default() -> Self {
        Self {
            id_attribute: "id".to_string(),
            directive_attribute: "class".to_string(),
            directive_pi_target: "barracuda".to_string(),
            output_format: OutputFormat::Html,
            strict: false,
            max_nesting_depth: 50,
        }
    }
}

impl TemplateOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_id_attribute(mut self, name: impl Into<String>) -> Self {
        self.id_attribute = name.into();
        self
    }

    pub fn with_directive_attribute(mut self, name: impl Into<String>) -> Self {
        self.directive_attribute = name.into();
        self
    }

    pub fn with_directive_pi_target(mut self, target: impl Into<String>) -> Self {
        self.directive_pi_target = target.into();
        self
    }

    pub fn with_output_format(mut self, format: OutputFormat) -> Self {
        self.output_format = format;
        self
    }

    /// Enable or disable strict mode.
    ///
    /// In strict mode, author warnings (like unknown model names) are
    /// recorded as errors.
    pub fn with_strict_mode(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    /// Set the maximum nesting depth of template passes.
    pub fn with_max_nesting_depth(mut self, depth: usize) -> Self {
        self.max_nesting_depth = depth;
        self
    }
}

/// Template configuration as read from a TOML file.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct TemplateConfig {
    #[serde(flatten)]
    pub options: TemplateOptions,

    /// Element id -> directive string.
    pub directives: BTreeMap<String, String>,
}

impl TemplateConfig {
    /// Parse a configuration from TOML text.
    pub fn from_toml_str(source: &str) -> TemplateResult<Self> {
        toml::from_str(source).map_err(|err| TemplateError::Config {
            message: err.to_string(),
        })
    }

    /// The id-addressed directives as a lookup map, if any were configured.
    pub fn id_map(&self) -> Option<DirectiveIdMap> {
        if self.directives.is_empty() {
            return None;
        }
        let mut map = DirectiveIdMap::new();
        for (id, directives) in &self.directives {
            map.insert_str(id, directives);
        }
        Some(map)
    }
}
