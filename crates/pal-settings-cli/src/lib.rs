//! # pal-settings-cli — CLI Tool for PAL Settings
//!
//! Provides the `pal-settings` command-line interface.
//!
//! ## Subcommands
//!
//! - `pal-settings gen`: generate `g_<name>.h` and `g_<name>.cpp`.
//! - `pal-settings validate`: run the whole pipeline without writing output.
//! - `pal-settings migrate`: rewrite a legacy settings document.
//! - `pal-settings fnv1a`: print the name hash of a string.
//!
//! ```bash
//! pal-settings gen -i settings_pal.yaml -g palSettings -s palSettingsLoader.h -o gen --pal
//! pal-settings validate -i settings_pal.yaml
//! pal-settings migrate settings_pal.json settings_pal.yaml
//! pal-settings fnv1a MaxFrames
//! ```

pub mod gen;
pub mod hash;
pub mod migrate;
pub mod validate;
