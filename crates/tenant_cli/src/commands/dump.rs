//! Dump command - Resolve a configuration and write it out again.

use std::path::PathBuf;

use anyhow::{Context as _, Result};
use clap::Args;
use tracing::info;

use tenant_assets::Format;
use tenant_context::{Context, OfflineLookup};

use super::{parse_format, ConfigArgs};

#[derive(Args)]
pub struct DumpArgs {
    /// YAML document or configuration directory to read
    input: PathBuf,

    /// Output: a `.yaml`/`.yml` file, or a directory
    output: PathBuf,

    #[command(flatten)]
    config: ConfigArgs,

    /// Input layout; inferred from the path when omitted
    #[arg(long, value_parser = parse_format)]
    input_format: Option<Format>,

    /// Output layout; inferred from the path when omitted
    #[arg(long, value_parser = parse_format)]
    output_format: Option<Format>,

    /// Keep remote identifier fields in the output
    #[arg(long)]
    export_identifiers: bool,
}

pub async fn execute(args: DumpArgs) -> Result<()> {
    let mut config = args.config.build()?;
    if args.export_identifiers {
        config.export_identifiers = true;
    }
    // The configured format applies to both directions unless overridden.
    let configured = config.format;

    config.format = args.input_format.or(configured);
    let mut ctx = Context::new(config.clone());
    let bundle = ctx
        .load(&args.input)
        .with_context(|| format!("Failed to load {}", args.input.display()))?
        .clone();
    let provenance = ctx.provenance().clone();

    config.format = args.output_format.or(configured);
    let mut ctx = Context::new(config).with_state(bundle, provenance);
    let report = ctx.dump(&args.output, &OfflineLookup).await?;

    info!(
        "Wrote {} files for {} resource types",
        report.written.len(),
        report.succeeded.len()
    );
    println!(
        "Dumped {} configuration to {}",
        report.format,
        args.output.display()
    );
    Ok(())
}
