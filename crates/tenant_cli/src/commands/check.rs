//! Check command - Verify that includes and keywords resolve.

use std::path::PathBuf;

use anyhow::Result;
use clap::Args;
use tracing::debug;

use tenant_assets::Format;
use tenant_context::Context;
use tenant_document::SubstitutionMode;

use super::{parse_format, ConfigArgs};

#[derive(Args)]
pub struct CheckArgs {
    /// YAML document or configuration directory
    input: PathBuf,

    #[command(flatten)]
    config: ConfigArgs,

    /// Input layout; inferred from the path when omitted
    #[arg(long, value_parser = parse_format)]
    format: Option<Format>,
}

pub async fn execute(args: CheckArgs) -> Result<()> {
    let mut config = args.config.build()?;
    if let Some(format) = args.format {
        config.format = Some(format);
    }
    // Unresolved keywords are errors here regardless of the configured mode.
    config.preserve_keywords = false;

    let mut ctx = Context::new(config);
    ctx.load(&args.input)?;

    let mut resources = 0;
    for (resource_type, value) in ctx.assets().iter() {
        let count = match value {
            serde_json::Value::Null => continue,
            serde_json::Value::Array(items) => items.len(),
            _ => 1,
        };
        debug!("{}: {}", resource_type, count);
        resources += count;
    }

    let provenance = ctx.provenance();
    let files = provenance
        .iter()
        .filter(|(_, entry)| entry.mode == SubstitutionMode::Text)
        .count();
    for (path, entry) in provenance.iter() {
        debug!("{} <- {:?}", path, entry.original_text);
    }

    println!("{} is valid", args.input.display());
    println!("   {} resources", resources);
    println!(
        "   {} templated values, {} templated files",
        provenance.len() - files,
        files
    );
    Ok(())
}
