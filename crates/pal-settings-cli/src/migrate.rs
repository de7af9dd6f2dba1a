//! # Migrate Subcommand
//!
//! Rewrites a legacy settings document into the current shape and checks
//! the result against the schema. The output format follows the output
//! file's extension; without an output file the result is printed as JSON.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;

use pal_settings_codegen::output::write_document;
use pal_settings_codegen::pipeline::upgrade;
use pal_settings_schema::{load_document, SchemaValidator};

/// Arguments for the migrate subcommand.
#[derive(Args, Debug)]
pub struct MigrateArgs {
    /// Legacy settings document (JSON or YAML).
    pub input: PathBuf,

    /// Where to write the migrated document. Printed to stdout if omitted.
    pub output: Option<PathBuf>,

    /// Skip schema validation of the migrated document.
    #[arg(long)]
    pub no_validate: bool,
}

/// Execute the migrate subcommand.
pub fn run_migrate(args: &MigrateArgs) -> Result<u8> {
    let raw = load_document(&args.input)?;
    let (migrated, _) = upgrade(raw, true)
        .with_context(|| format!("failed to migrate {}", args.input.display()))?;

    if !args.no_validate {
        SchemaValidator::embedded()?
            .validate_document(&migrated)
            .context("migrated document does not match the schema")?;
    }

    match &args.output {
        Some(path) => {
            write_document(path, &migrated)
                .with_context(|| format!("failed to write {}", path.display()))?;
            tracing::info!(path = %path.display(), "wrote migrated document");
        }
        None => println!("{}", serde_json::to_string_pretty(&migrated)?),
    }
    Ok(0)
}
