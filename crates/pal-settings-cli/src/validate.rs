//! # Validate Subcommand
//!
//! Runs the whole generation pipeline on a settings document, rendering in
//! memory only. Catches everything `gen` would reject without touching the
//! output directory.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;

use pal_settings_codegen::pipeline::{generate_prepared, prepare, rng_for, validator_for};
use pal_settings_codegen::{CodegenConfig, MagicBuffer};
use pal_settings_core::lower_first;
use pal_settings_schema::load_document;

/// Arguments for the validate subcommand.
#[derive(Args, Debug)]
pub struct ValidateArgs {
    /// Settings document (JSON or YAML).
    #[arg(short, long)]
    pub input: PathBuf,

    /// Schema file to validate against instead of the built-in one.
    #[arg(long)]
    pub schema: Option<PathBuf>,

    /// Treat the input as a legacy document.
    #[arg(long)]
    pub legacy: bool,

    /// Render the PAL variant.
    #[arg(long)]
    pub pal: bool,

    /// Also check that this magic buffer loads and encodes the blob.
    #[arg(long)]
    pub magic_buffer: Option<PathBuf>,
}

/// Execute the validate subcommand.
pub fn run_validate(args: &ValidateArgs) -> Result<u8> {
    let mut config = CodegenConfig {
        input: args.input.clone(),
        pal: args.pal,
        schema: args.schema.clone(),
        legacy: args.legacy,
        seed: Some(0),
        ..CodegenConfig::default()
    };
    let input = args.input.display().to_string();

    let validator = validator_for(&config).context("failed to load schema")?;
    let raw = load_document(&args.input)?;
    let prepared = prepare(raw, args.legacy, &validator).with_context(|| format!("{input} is invalid"))?;

    let magic = args
        .magic_buffer
        .as_deref()
        .map(MagicBuffer::load)
        .transpose()?;
    config.generated_filename = format!("{}Settings", lower_first(&prepared.document().component_name));
    config.settings_filename = format!("{}.h", config.generated_filename);

    let generated = generate_prepared(&config, prepared, magic.as_ref(), &mut rng_for(&config))
        .with_context(|| format!("{input} failed to render"))?;

    let stats = generated.stats;
    println!(
        "{input}: OK ({} settings, {} enums, {} byte blob{}{})",
        stats.num_settings,
        stats.num_enums,
        stats.blob_size,
        if stats.is_encoded { ", encoded" } else { "" },
        if stats.migrated { ", migrated" } else { "" },
    );
    Ok(0)
}
