/*
 * main.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Barracuda CLI - Main entry point

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;

#[derive(Parser)]
#[command(name = "barracuda")]
#[command(version)]
#[command(about = "Barracuda template CLI", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Render an XHTML or XML template against JSON models
    Render {
        /// Template file
        template: PathBuf,

        /// JSON file whose top-level keys name the models
        #[arg(short = 'm', long)]
        models: Option<PathBuf>,

        /// TOML file with template options and id-addressed directives
        #[arg(short = 'c', long)]
        config: Option<PathBuf>,

        /// Output format (html, xml); overrides the config file
        #[arg(short = 't', long)]
        format: Option<String>,

        /// Write output to FILE (use '--output -' for stdout)
        #[arg(short = 'o', long)]
        output: Option<String>,

        /// Report template problems as errors and fail the render
        #[arg(long)]
        strict: bool,
    },
}

fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "barracuda=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Render {
            template,
            models,
            config,
            format,
            output,
            strict,
        } => commands::render::execute(commands::render::RenderArgs {
            template,
            models,
            config,
            format,
            output,
            strict,
        }),
    }
}
