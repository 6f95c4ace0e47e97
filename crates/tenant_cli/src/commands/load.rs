//! Load command - Resolve a configuration and print the asset bundle.

use std::path::PathBuf;

use anyhow::{Context as _, Result};
use clap::Args;
use serde_json::{json, Map, Value};
use tracing::info;

use tenant_assets::Format;
use tenant_context::Context;

use super::{parse_format, ConfigArgs};

#[derive(Args)]
pub struct LoadArgs {
    /// YAML document or configuration directory
    input: PathBuf,

    #[command(flatten)]
    config: ConfigArgs,

    /// Input layout; inferred from the path when omitted
    #[arg(long, value_parser = parse_format)]
    format: Option<Format>,

    /// Print only these resource types
    #[arg(short = 't', long = "type", value_name = "TYPE")]
    types: Vec<String>,

    /// Print the templated leaves instead of the bundle
    #[arg(long)]
    templates: bool,
}

pub async fn execute(args: LoadArgs) -> Result<()> {
    let mut config = args.config.build()?;
    if let Some(format) = args.format {
        config.format = Some(format);
    }

    let mut ctx = Context::new(config);
    ctx.load(&args.input)
        .with_context(|| format!("Failed to load {}", args.input.display()))?;
    info!("Loaded configuration from {}", args.input.display());

    let output = if args.templates {
        let leaves: Map<String, Value> = ctx
            .provenance()
            .iter()
            .filter(|(path, _)| selected(&args.types, &path.to_string()))
            .map(|(path, entry)| {
                (
                    path.to_string(),
                    json!({ "template": entry.original_text, "value": entry.resolved_value }),
                )
            })
            .collect();
        Value::Object(leaves)
    } else {
        Value::Object(
            ctx.assets()
                .iter()
                .filter(|(resource_type, value)| !value.is_null() && selected(&args.types, resource_type))
                .map(|(resource_type, value)| (resource_type.to_string(), value.clone()))
                .collect(),
        )
    };

    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

/// Whether a resource type, or a leaf path string (`/type/...`), belongs to
/// a selected type.
fn selected(types: &[String], path: &str) -> bool {
    if types.is_empty() {
        return true;
    }
    let resource_type = path.trim_start_matches('/').split('/').next().unwrap_or("");
    types.iter().any(|t| t == resource_type)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_selected() {
        let types = vec!["clients".to_string()];
        assert!(selected(&[], "/rules/[name=a]/script"));
        assert!(selected(&types, "clients"));
        assert!(selected(&types, "/clients/[name=My App]/name"));
        assert!(!selected(&types, "/tenant/friendly_name"));
    }
}
