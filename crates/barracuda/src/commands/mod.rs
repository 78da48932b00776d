//! Command implementations for the Barracuda CLI
//!
//! Each command module handles the CLI interface and delegates to
//! barracuda-template for the actual rendering.

pub mod render;
