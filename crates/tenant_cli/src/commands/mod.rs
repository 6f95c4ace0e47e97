//! CLI command definitions.
//!
//! Each subcommand drives the orchestrator once: `load` and `check` read a
//! configuration, `dump` reads one and writes it back out.

use std::path::PathBuf;

use anyhow::{Context as _, Result};
use clap::{Args, Parser, Subcommand};
use serde_json::Value;
use tracing::debug;

use tenant_assets::Format;
use tenant_context::ContextConfig;

pub mod check;
pub mod dump;
pub mod load;

/// tenantkit - templated tenant configuration files
#[derive(Parser)]
#[command(name = "tenantkit")]
#[command(version, about = "tenantkit - templated tenant configuration files")]
#[command(long_about = r#"
tenantkit resolves tenant configuration files (a YAML document split with
!include, or one file per resource in a directory tree), substitutes
@@KEYWORD@@ and ##KEYWORD## markers, and writes configurations back out with
the markers restored.

COMMANDS:
  load   → Resolve a configuration and print the asset bundle as JSON
  dump   → Resolve a configuration and write it to another location/format
  check  → Verify includes and keywords resolve

EXIT CODES:
  0 - Success
  1 - General error
  2 - Invalid arguments or configuration
  3 - Document error
  4 - Dump failure
"#)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Resolve a configuration and print the asset bundle
    Load(load::LoadArgs),

    /// Resolve a configuration and write it out again
    Dump(dump::DumpArgs),

    /// Check that a configuration resolves
    Check(check::CheckArgs),
}

/// Options shared by every command.
#[derive(Args, Debug, Clone)]
pub struct ConfigArgs {
    /// Run configuration file (.json, .yaml, .yml or .toml)
    #[arg(short, long, env = "TENANTKIT_CONFIG")]
    pub config: Option<PathBuf>,

    /// Keyword mapping as NAME=VALUE; VALUE is parsed as JSON when possible
    #[arg(short = 'k', long = "keyword", value_name = "NAME=VALUE")]
    pub keywords: Vec<String>,

    /// Keep unresolved markers and restore templates on dump
    #[arg(long)]
    pub preserve_keywords: bool,
}

/// A command-line value that could not be interpreted.
#[derive(Debug, thiserror::Error)]
#[error("Invalid argument: {0}")]
pub struct ArgumentError(pub String);

impl ConfigArgs {
    /// Build the run configuration: file (or defaults), environment
    /// overrides, then command-line flags.
    pub fn build(&self) -> Result<ContextConfig> {
        let mut config = match &self.config {
            Some(path) => ContextConfig::load(path)
                .with_context(|| format!("Failed to read configuration {}", path.display()))?,
            None => {
                let mut config = ContextConfig::new();
                config.apply_env_overrides();
                config
            }
        };

        for keyword in &self.keywords {
            let (name, value) = parse_keyword(keyword)?;
            debug!("Keyword {} set from the command line", name);
            config.keyword_mappings.insert(name, value);
        }
        if self.preserve_keywords {
            config.preserve_keywords = true;
        }
        Ok(config)
    }
}

/// Parse `NAME=VALUE`. A VALUE that is not valid JSON is taken as a string.
pub fn parse_keyword(arg: &str) -> Result<(String, Value), ArgumentError> {
    let (name, raw) = arg
        .split_once('=')
        .ok_or_else(|| ArgumentError(format!("expected NAME=VALUE, got '{}'", arg)))?;
    let name = name.trim();
    if name.is_empty() || !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return Err(ArgumentError(format!("invalid keyword name '{}'", name)));
    }
    let value = serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()));
    Ok((name.to_string(), value))
}

/// Parse a `--format` value.
pub fn parse_format(value: &str) -> Result<Format, ArgumentError> {
    value.parse().map_err(ArgumentError)
}
