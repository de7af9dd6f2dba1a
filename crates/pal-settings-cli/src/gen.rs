//! # Gen Subcommand
//!
//! Generates the settings loader header and source for one component.
//! Driver build scripts invoke this with the short flags; keep them stable.

use std::path::PathBuf;
use std::time::Instant;

use anyhow::{Context, Result};
use clap::Args;

use pal_settings_codegen::pipeline::rng_for;
use pal_settings_codegen::{generate, output, CodegenConfig};

/// Arguments for the gen subcommand.
#[derive(Args, Debug)]
pub struct GenArgs {
    /// Settings document (JSON or YAML).
    #[arg(short, long)]
    pub input: PathBuf,

    /// Base name of the generated files, without extension.
    #[arg(short, long = "generated-filename")]
    pub generated_filename: String,

    /// Hand-written header declaring the settings base class.
    #[arg(short, long = "settings-filename")]
    pub settings_filename: String,

    /// Output directory.
    #[arg(short, long)]
    pub outdir: PathBuf,

    /// Loader class name. Defaults to `<ComponentName>SettingsLoader`.
    #[arg(long = "classname")]
    pub class_name: Option<String>,

    /// Generate for a PAL component.
    #[arg(long)]
    pub pal: bool,

    /// Key file for blob encoding, raw bytes or comma-separated decimal text.
    #[arg(long)]
    pub magic_buffer: Option<PathBuf>,

    /// Embed the settings blob unencoded.
    #[arg(long, alias = "encoded")]
    pub unencoded: bool,

    /// Enclosing namespace, outermost first. Repeatable.
    #[arg(long = "namespace")]
    pub namespaces: Vec<String>,

    /// Extra header to include. Repeatable.
    #[arg(long = "include")]
    pub includes: Vec<String>,

    /// Schema file to validate against instead of the built-in one.
    #[arg(long)]
    pub schema: Option<PathBuf>,

    /// Treat the input as a legacy document.
    #[arg(long)]
    pub legacy: bool,

    /// Do not generate registry reads.
    #[arg(long)]
    pub skip_registry: bool,

    /// Mark the component as an experiments component.
    #[arg(long)]
    pub experiments: bool,

    /// Seed for the blob rotation offset.
    #[arg(long)]
    pub seed: Option<u64>,
}

impl GenArgs {
    pub fn to_config(&self) -> CodegenConfig {
        CodegenConfig {
            input: self.input.clone(),
            generated_filename: self.generated_filename.clone(),
            settings_filename: self.settings_filename.clone(),
            outdir: self.outdir.clone(),
            class_name: self.class_name.clone(),
            pal: self.pal,
            magic_buffer: self.magic_buffer.clone(),
            unencoded: self.unencoded,
            namespaces: self.namespaces.clone(),
            includes: self.includes.clone(),
            schema: self.schema.clone(),
            legacy: self.legacy,
            skip_registry: self.skip_registry,
            experiments: self.experiments,
            seed: self.seed,
        }
    }
}

/// Execute the gen subcommand.
pub fn run_gen(args: &GenArgs) -> Result<u8> {
    let started = Instant::now();
    let config = args.to_config();

    let generated = generate(&config, &mut rng_for(&config))
        .with_context(|| format!("failed to generate settings from {}", config.input.display()))?;
    let (header, source) = output::write_generated(&config, &generated.files)
        .with_context(|| format!("failed to write output to {}", config.outdir.display()))?;

    tracing::info!(
        header = %header.display(),
        source = %source.display(),
        settings = generated.stats.num_settings,
        migrated = generated.stats.migrated,
        "wrote generated files"
    );
    println!(
        "Settings C++ code generated successfully, in {} milliseconds.",
        started.elapsed().as_millis()
    );
    Ok(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(outdir: PathBuf) -> GenArgs {
        GenArgs {
            input: PathBuf::from("settings.json"),
            generated_filename: "exampleSettings".to_string(),
            settings_filename: "exampleSettings.h".to_string(),
            outdir,
            class_name: None,
            pal: false,
            magic_buffer: None,
            unencoded: false,
            namespaces: Vec::new(),
            includes: Vec::new(),
            schema: None,
            legacy: false,
            skip_registry: false,
            experiments: false,
            seed: Some(1),
        }
    }

    #[test]
    fn config_carries_every_flag() {
        let mut a = args(PathBuf::from("out"));
        a.pal = true;
        a.namespaces = vec!["Pal".to_string(), "Gfx9".to_string()];
        a.class_name = Some("Loader".to_string());
        let config = a.to_config();
        assert!(config.pal);
        assert_eq!(config.namespaces, ["Pal", "Gfx9"]);
        assert_eq!(config.class_name.as_deref(), Some("Loader"));
        assert_eq!(config.seed, Some(1));
        assert_eq!(config.header_path(), PathBuf::from("out/g_exampleSettings.h"));
    }

    #[test]
    fn missing_input_fails_with_context() {
        let dir = tempfile::tempdir().unwrap();
        let mut a = args(dir.path().to_path_buf());
        a.input = dir.path().join("absent.json");
        let err = run_gen(&a).unwrap_err();
        assert!(format!("{err:#}").contains("absent.json"));
    }

    #[test]
    fn extension_in_generated_name_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let mut a = args(dir.path().to_path_buf());
        a.generated_filename = "exampleSettings.h".to_string();
        assert!(run_gen(&a).is_err());
    }
}
