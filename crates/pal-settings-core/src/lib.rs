//! # pal-settings-core — Foundational Primitives for Settings Generation
//!
//! Everything the generator must compute bit-exactly lives here: the FNV-1a
//! name hash the driver uses to look settings up at runtime, the camelCase
//! variable-name derivation, identifier and tag validation, and the
//! canonical byte form of the settings blob.
//!
//! ## Crate Policy
//!
//! - No dependencies on other `pal-settings-*` crates (leaf of the DAG).
//! - No `unsafe` code.
//! - No `panic!()` or `.unwrap()` outside tests.

pub mod canonical;
pub mod error;
pub mod hash;
pub mod ident;

pub use canonical::CanonicalBytes;
pub use error::{CanonicalizationError, SettingsError};
pub use hash::{fnv1a, fnv1a_64, fnv1a_str, magic_buffer_id, MAGIC_BUFFER_ID_LEN};
pub use ident::{
    gen_variable_name, lower_first, validate_enum_name, validate_settings_name, validate_tag,
    MAX_TAG_LEN,
};
