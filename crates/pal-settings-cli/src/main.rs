//! # pal-settings CLI entry point
//!
//! Parses command-line arguments and dispatches to subcommand handlers.

use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use pal_settings_cli::gen::{run_gen, GenArgs};
use pal_settings_cli::hash::{run_hash, HashArgs};
use pal_settings_cli::migrate::{run_migrate, MigrateArgs};
use pal_settings_cli::validate::{run_validate, ValidateArgs};

/// PAL settings code generator.
///
/// Turns a settings document into the C++ settings loader of a driver
/// component: settings struct, enums, default setup, registry reads and
/// the embedded settings blob.
#[derive(Parser, Debug)]
#[command(name = "pal-settings", version, about, long_about = None)]
struct Cli {
    /// Enable verbose output. Repeat for more verbosity (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Generate the settings loader header and source.
    Gen(GenArgs),

    /// Check a settings document without writing any output.
    Validate(ValidateArgs),

    /// Rewrite a legacy settings document into the current shape.
    Migrate(MigrateArgs),

    /// Print the FNV-1a hash of a string.
    #[command(name = "fnv1a")]
    Hash(HashArgs),
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 => EnvFilter::new("warn"),
        1 => EnvFilter::new("info"),
        2 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let result = match &cli.command {
        Commands::Gen(args) => run_gen(args),
        Commands::Validate(args) => run_validate(args),
        Commands::Migrate(args) => run_migrate(args),
        Commands::Hash(args) => run_hash(args),
    };

    match result {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            tracing::error!("{e:#}");
            ExitCode::from(1)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn cli_parse_gen_short_flags() {
        let cli = Cli::try_parse_from([
            "pal-settings",
            "gen",
            "-i",
            "settings_pal.json",
            "-g",
            "palSettings",
            "-s",
            "palSettingsLoader.h",
            "-o",
            "gen",
        ])
        .unwrap();
        if let Commands::Gen(args) = cli.command {
            assert_eq!(args.input, PathBuf::from("settings_pal.json"));
            assert_eq!(args.generated_filename, "palSettings");
            assert_eq!(args.settings_filename, "palSettingsLoader.h");
            assert_eq!(args.outdir, PathBuf::from("gen"));
            assert!(!args.pal);
            assert!(!args.unencoded);
            assert!(args.namespaces.is_empty());
        } else {
            panic!("Expected Gen");
        }
    }

    #[test]
    fn cli_parse_gen_full_flags() {
        let cli = Cli::try_parse_from([
            "pal-settings",
            "-vv",
            "gen",
            "-i",
            "s.yaml",
            "-g",
            "palSettings",
            "-s",
            "palSettingsLoader.h",
            "-o",
            "gen",
            "--classname",
            "SettingsLoader",
            "--pal",
            "--magic-buffer",
            "magic_buffer.txt",
            "--namespace",
            "Pal",
            "--namespace",
            "Gfx12",
            "--include",
            "palTypes.h",
            "--skip-registry",
            "--experiments",
            "--legacy",
            "--seed",
            "7",
        ])
        .unwrap();
        assert_eq!(cli.verbose, 2);
        if let Commands::Gen(args) = cli.command {
            assert_eq!(args.class_name.as_deref(), Some("SettingsLoader"));
            assert!(args.pal);
            assert_eq!(args.magic_buffer, Some(PathBuf::from("magic_buffer.txt")));
            assert_eq!(args.namespaces, ["Pal", "Gfx12"]);
            assert_eq!(args.includes, ["palTypes.h"]);
            assert!(args.skip_registry);
            assert!(args.experiments);
            assert!(args.legacy);
            assert_eq!(args.seed, Some(7));
        } else {
            panic!("Expected Gen");
        }
    }

    #[test]
    fn cli_parse_gen_encoded_alias() {
        let cli = Cli::try_parse_from([
            "pal-settings",
            "gen",
            "-i",
            "s.json",
            "-g",
            "x",
            "-s",
            "x.h",
            "-o",
            ".",
            "--encoded",
        ])
        .unwrap();
        if let Commands::Gen(args) = cli.command {
            assert!(args.unencoded);
        }
    }

    #[test]
    fn cli_parse_gen_requires_input() {
        assert!(Cli::try_parse_from(["pal-settings", "gen", "-g", "x", "-s", "x.h", "-o", "."]).is_err());
    }

    #[test]
    fn cli_parse_validate() {
        let cli = Cli::try_parse_from(["pal-settings", "validate", "-i", "s.yaml", "--pal"]).unwrap();
        if let Commands::Validate(args) = cli.command {
            assert_eq!(args.input, PathBuf::from("s.yaml"));
            assert!(args.pal);
            assert!(args.schema.is_none());
        } else {
            panic!("Expected Validate");
        }
    }

    #[test]
    fn cli_parse_migrate_without_output() {
        let cli = Cli::try_parse_from(["pal-settings", "migrate", "old.json"]).unwrap();
        if let Commands::Migrate(args) = cli.command {
            assert_eq!(args.input, PathBuf::from("old.json"));
            assert!(args.output.is_none());
            assert!(!args.no_validate);
        } else {
            panic!("Expected Migrate");
        }
    }

    #[test]
    fn cli_parse_fnv1a() {
        let cli = Cli::try_parse_from(["pal-settings", "fnv1a", "MaxFrames", "--hex"]).unwrap();
        if let Commands::Hash(args) = cli.command {
            assert_eq!(args.input, "MaxFrames");
            assert!(args.hex);
        } else {
            panic!("Expected Hash");
        }
    }

    #[test]
    fn cli_parse_unknown_subcommand_fails() {
        assert!(Cli::try_parse_from(["pal-settings", "lock"]).is_err());
    }
}
