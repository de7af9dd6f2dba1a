//! # Error Types — Generation Failure Taxonomy
//!
//! Every pipeline stage fails fast: the first violated invariant aborts the
//! run and no output file is written. There is no recovery path, so each
//! variant carries enough context (entity name, offending value) for the
//! message alone to locate the problem in the input document.
//!
//! ## Categories
//!
//! - Schema and naming violations.
//! - Duplicates and hash collisions. Collisions are never renamed away.
//! - Unresolvable enum/bitmask references.
//! - Type/value mismatches between a declared `Type` and its default.

use thiserror::Error;

/// Top-level error type for settings generation.
#[derive(Error, Debug)]
pub enum SettingsError {
    /// A setting, enum, or component name is not a valid identifier.
    #[error("invalid name: {0}")]
    Naming(String),

    /// A tag string violates the tag format rules.
    #[error("invalid tag: {0}")]
    Tag(String),

    /// Two settings (or two subsettings of one structure) share a name.
    #[error("duplicate setting name: \"{0}\"")]
    DuplicateName(String),

    /// Two distinct names produced the same FNV-1a hash.
    #[error("hash collision detected between setting names: {first}, {second} (0x{hash:08x})")]
    HashCollision {
        /// The name hashed first.
        first: String,
        /// The name whose hash collided with `first`.
        second: String,
        /// The shared hash value.
        hash: u32,
    },

    /// Two enum or bitmask definitions share a name.
    #[error("duplicate enum name: \"{0}\"")]
    DuplicateEnum(String),

    /// An enum, bitmask, or member reference could not be resolved.
    #[error("unresolved reference: {0}")]
    UnresolvedReference(String),

    /// A value's type does not match the declared setting type.
    #[error("type mismatch for \"{setting}\": expected {expected}, found {found}")]
    TypeMismatch {
        /// The setting (or variable) name.
        setting: String,
        /// The expected type description.
        expected: String,
        /// The type actually found.
        found: String,
    },

    /// `EnumSize` is not one of 8, 16, 32, 64.
    #[error("invalid EnumSize {size} for enum \"{name}\" (expected 8, 16, 32 or 64)")]
    InvalidEnumSize {
        /// The enum name.
        name: String,
        /// The rejected size.
        size: u64,
    },

    /// An enum member value could not be evaluated.
    #[error("cannot resolve value of {enum_name}::{member}: {reason}")]
    EnumValue {
        /// The enum name.
        enum_name: String,
        /// The member name.
        member: String,
        /// Why evaluation failed.
        reason: String,
    },

    /// A default value is malformed for its setting.
    #[error("invalid default for \"{setting}\": {reason}")]
    InvalidDefault {
        /// The setting name.
        setting: String,
        /// Why the default was rejected.
        reason: String,
    },

    /// Conflicting or malformed conditional-compilation guards.
    #[error("invalid build guard on \"{owner}\": {reason}")]
    BuildGuard {
        /// The guarded setting or enum member.
        owner: String,
        /// What is wrong with the guard.
        reason: String,
    },

    /// The magic buffer file is unusable.
    #[error("magic buffer error: {0}")]
    MagicBuffer(String),

    /// Canonical serialization of the settings document failed.
    #[error("canonicalization error: {0}")]
    Canonicalization(#[from] CanonicalizationError),

    /// The document is structurally invalid after schema validation.
    #[error("schema error at {path}: {message}")]
    Schema {
        /// JSON Pointer path into the document.
        path: String,
        /// Description of the violation.
        message: String,
    },

    /// A legacy document could not be migrated.
    #[error("migration error: {0}")]
    Migration(String),

    /// Template rendering failed.
    #[error("render error: {0}")]
    Render(String),

    /// IO error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Error during canonical serialization.
#[derive(Error, Debug)]
pub enum CanonicalizationError {
    /// JSON serialization failed.
    #[error("serialization failed: {0}")]
    SerializationFailed(#[from] serde_json::Error),
}

impl SettingsError {
    /// Build a [`SettingsError::TypeMismatch`].
    pub fn type_mismatch(
        setting: impl Into<String>,
        expected: impl Into<String>,
        found: impl Into<String>,
    ) -> Self {
        Self::TypeMismatch {
            setting: setting.into(),
            expected: expected.into(),
            found: found.into(),
        }
    }

    /// Build a [`SettingsError::InvalidDefault`].
    pub fn invalid_default(setting: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidDefault {
            setting: setting.into(),
            reason: reason.into(),
        }
    }
}
