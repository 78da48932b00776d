/*
 * render.rs
 * Copyright (c) 2025 Posit, PBC
 *
 * Render command implementation
 */

//! Render command implementation.
//!
//! `barracuda render` reads a template file, binds a permanent template to
//! the whole document and renders it against models loaded from a JSON
//! file. Each top-level key of the JSON object becomes a model of that
//! name: arrays become iterative list models, everything else a map model.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use barracuda_template::{
    DiagnosticKind, ListModel, MapModel, ModelRegistry, OutputFormat, Template, TemplateConfig,
};
use serde_json::Value;
use tracing::{debug, info, warn};

/// Arguments for the render command
#[derive(Debug)]
pub struct RenderArgs {
    /// Template file
    pub template: PathBuf,
    /// JSON models file
    pub models: Option<PathBuf>,
    /// TOML configuration file
    pub config: Option<PathBuf>,
    /// Output format override
    pub format: Option<String>,
    /// Output file path, `-` or absent for stdout
    pub output: Option<String>,
    pub strict: bool,
}

/// Execute the render command
pub fn execute(args: RenderArgs) -> Result<()> {
    let mut config = match &args.config {
        Some(path) => load_config(path)?,
        None => TemplateConfig::default(),
    };
    if let Some(format) = &args.format {
        config.options.output_format = format
            .parse::<OutputFormat>()
            .map_err(|e| anyhow::anyhow!("{}", e))?;
    }
    if args.strict {
        config.options.strict = true;
    }

    let models = match &args.models {
        Some(path) => {
            let source = fs::read_to_string(path)
                .with_context(|| format!("Failed to read models file {}", path.display()))?;
            let value: Value = serde_json::from_str(&source)
                .with_context(|| format!("Failed to parse models file {}", path.display()))?;
            models_from_json(value)?
        }
        None => ModelRegistry::new(),
    };

    let source = fs::read_to_string(&args.template)
        .with_context(|| format!("Failed to read template {}", args.template.display()))?;
    info!("Rendering template: {}", args.template.display());

    let output = render_source(&source, config, models)?;

    match args.output.as_deref() {
        None | Some("-") => println!("{}", output),
        Some(path) => {
            fs::write(path, output).with_context(|| format!("Failed to write output {}", path))?;
            info!("Output written to: {}", path);
        }
    }
    Ok(())
}

fn load_config(path: &Path) -> Result<TemplateConfig> {
    let source = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file {}", path.display()))?;
    TemplateConfig::from_toml_str(&source)
        .with_context(|| format!("Invalid config file {}", path.display()))
}

/// One model per top-level key of a JSON object.
fn models_from_json(value: Value) -> Result<ModelRegistry> {
    let Value::Object(entries) = value else {
        anyhow::bail!("The models file must hold a JSON object keyed by model name");
    };
    let mut registry = ModelRegistry::new();
    for (name, value) in entries {
        debug!(model = %name, "registering model");
        if value.is_array() {
            registry.register(ListModel::from_json(name, value));
        } else {
            registry.register(MapModel::from_json(name, value));
        }
    }
    Ok(registry)
}

/// Render template markup and serialize the result.
fn render_source(source: &str, config: TemplateConfig, models: ModelRegistry) -> Result<String> {
    let mut doc = barracuda_dom::parse(source).context("Failed to parse template")?;
    let root = doc.root();

    let id_map = config.id_map();
    let format = config.options.output_format;
    let mut template = Template::new(&mut doc, root)
        .with_options(config.options)
        .with_models(models);
    if let Some(id_map) = id_map {
        template = template.with_id_map(id_map);
    }

    let report = template.render_once(&mut doc).context("Render failed")?;
    if report.has_errors() {
        let errors: Vec<String> = report
            .diagnostics
            .iter()
            .filter(|d| d.kind == DiagnosticKind::Error)
            .map(|d| d.to_string())
            .collect();
        anyhow::bail!("Template has errors:\n{}", errors.join("\n"));
    }
    let warnings = report.warnings().count();
    if warnings > 0 {
        warn!("Rendered with {} warning(s)", warnings);
    }
    Ok(match format {
        OutputFormat::Html => doc.to_html(),
        OutputFormat::Xml => doc.to_xml(),
    })
}
