//! # pal-settings-codegen — Settings Loader Generation
//!
//! Turns a settings document into the C++ settings struct, enums, default
//! setup, registry reads and embedded settings blob of one driver component.
//!
//! ## Stages
//!
//! - [`migrate`]: upgrades legacy document shapes.
//! - [`model`]: the typed document.
//! - [`enums`]: enum and bitmask collection, value resolution, widths.
//! - [`hashes`]: FNV-1a name hashes and collision checks.
//! - [`normalize`]: per-setting derived fields, group flattening, defaults
//!   (through [`defaults`]) and build guards (through [`guard`]).
//! - [`blob`]: canonical serialization and magic-buffer encoding.
//! - [`emit`]: template context and rendering.
//! - [`pipeline`]: runs the stages in order.
//! - [`output`]: atomic writes.
//!
//! ## Crate Policy
//!
//! - Every stage returns a new value; no stage edits a previous stage's
//!   output.
//! - Errors are [`pal_settings_core::SettingsError`] values, or
//!   [`pipeline::PipelineError`] where schema validation is involved.
//! - No `unsafe` code and no `.unwrap()` outside tests.

pub mod blob;
pub mod config;
pub mod defaults;
pub mod emit;
pub mod enums;
pub mod expr;
pub mod guard;
pub mod hashes;
pub mod migrate;
pub mod model;
pub mod normalize;
pub mod output;
pub mod pipeline;

pub use blob::{encode_document, EncodedBlob, MagicBuffer};
pub use config::CodegenConfig;
pub use emit::{Emitter, RenderedFiles, TemplateContext};
pub use enums::{EnumSize, EnumTable, ResolvedEnum};
pub use hashes::{assign_name_hashes, HashedDocument};
pub use model::SettingsDocument;
pub use normalize::{normalize, Normalized, SettingEntry};
pub use pipeline::{generate, prepare, GenerationStats, Generated, PipelineError, PreparedDocument};
