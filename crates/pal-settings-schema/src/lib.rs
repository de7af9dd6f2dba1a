//! # pal-settings-schema — Settings Document Loading & Validation
//!
//! Loads settings documents (JSON or YAML) and validates them against the
//! settings JSON Schema before any generation stage runs.
//!
//! - [`SchemaValidator::embedded`] compiles the checked-in
//!   `schemas/settings.schema.json`, embedded at build time.
//! - [`SchemaValidator::from_path`] compiles an override schema from disk.
//! - [`load_document`] reads a document, choosing JSON or YAML by extension.
//!
//! ## Crate Policy
//!
//! - No dependencies on other `pal-settings-*` crates.
//! - Schema validation is a trust boundary: invalid documents are rejected
//!   with structured errors including the instance path of each violation.

pub mod validate;

pub use validate::{
    load_document, parse_document, yaml_to_json_value, DocumentFormat, SchemaValidationError,
    SchemaValidator, ValidationViolations, Violation, SETTINGS_SCHEMA_NAME,
};
