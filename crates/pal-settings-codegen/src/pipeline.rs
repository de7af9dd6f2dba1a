//! # Generation Pipeline
//!
//! One run, stage by stage:
//!
//! 1. load the document (JSON or YAML)
//! 2. migrate it if it has a legacy shape
//! 3. validate it against the schema
//! 4. build the typed document and resolve enums
//! 5. assign name hashes
//! 6. normalize settings and compile defaults
//! 7. encode the blob over the hashed document
//! 8. assemble the template context and render
//!
//! Each stage consumes the previous stage's value. Nothing is written to
//! disk here; see [`crate::output`].

use std::time::{SystemTime, UNIX_EPOCH};

use pal_settings_core::{lower_first, validate_settings_name, SettingsError};
use pal_settings_schema::{load_document, SchemaValidationError, SchemaValidator};
use rand::rngs::StdRng;
use rand::{RngCore, SeedableRng};
use serde_json::Value;
use thiserror::Error;

use crate::blob::{encode_document, MagicBuffer};
use crate::config::CodegenConfig;
use crate::emit::{flatten_settings, Emitter, RenderedFiles, TemplateContext};
use crate::enums::{self, EnumTable};
use crate::hashes::{assign_name_hashes, HashedDocument};
use crate::migrate::{is_legacy, migrate};
use crate::model::SettingsDocument;
use crate::normalize::{normalize, Normalized};

/// Failure of any pipeline stage.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error(transparent)]
    Schema(#[from] SchemaValidationError),

    #[error(transparent)]
    Settings(#[from] SettingsError),
}

/// A document that passed every check, ready to encode and render.
#[derive(Debug, Clone)]
pub struct PreparedDocument {
    pub hashed: HashedDocument,
    pub enums: EnumTable,
    pub normalized: Normalized,
    /// The input had a legacy shape and was migrated.
    pub migrated: bool,
}

impl PreparedDocument {
    pub fn document(&self) -> &SettingsDocument {
        self.hashed.document()
    }
}

/// Summary of a run, for logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GenerationStats {
    pub num_settings: usize,
    pub num_enums: usize,
    pub blob_size: usize,
    pub is_encoded: bool,
    pub migrated: bool,
}

/// Rendered files plus run summary.
#[derive(Debug, Clone)]
pub struct Generated {
    pub files: RenderedFiles,
    pub stats: GenerationStats,
}

/// Schema validator for `config`: the override file if given, else the
/// embedded schema.
///
/// # Errors
///
/// Any schema loading or compilation error.
pub fn validator_for(config: &CodegenConfig) -> Result<SchemaValidator, SchemaValidationError> {
    match &config.schema {
        Some(path) => SchemaValidator::from_path(path),
        None => SchemaValidator::embedded(),
    }
}

/// Rotation source for `config`: the fixed seed if given, else the clock.
pub fn rng_for(config: &CodegenConfig) -> StdRng {
    let seed = config.seed.unwrap_or_else(|| {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_or(0, |d| d.as_secs())
    });
    StdRng::seed_from_u64(seed)
}

/// Migrate `doc` when forced or when it has a legacy shape.
///
/// # Errors
///
/// `Migration` from the migrator.
pub fn upgrade(doc: Value, force_legacy: bool) -> Result<(Value, bool), SettingsError> {
    if force_legacy || is_legacy(&doc) {
        tracing::info!("migrating legacy settings document");
        Ok((migrate(doc)?, true))
    } else {
        Ok((doc, false))
    }
}

/// Run every check and derivation on an already-loaded document.
///
/// # Errors
///
/// The first failure of any stage.
pub fn prepare(
    doc: Value,
    force_legacy: bool,
    validator: &SchemaValidator,
) -> Result<PreparedDocument, PipelineError> {
    let (doc, migrated) = upgrade(doc, force_legacy)?;
    validator.validate_document(&doc)?;

    let doc = SettingsDocument::from_value(doc)?;
    validate_settings_name(&doc.component_name)?;
    tracing::debug!(
        component = %doc.component_name,
        settings = doc.settings.len(),
        "loaded settings document"
    );

    let enums = enums::resolve(&doc)?;
    let hashed = assign_name_hashes(doc)?;
    let normalized = normalize(&hashed, &enums)?;

    Ok(PreparedDocument {
        hashed,
        enums,
        normalized,
        migrated,
    })
}

/// Load, prepare, encode and render the document named by `config`.
///
/// # Errors
///
/// The first failure of any stage.
pub fn generate<R>(config: &CodegenConfig, rng: &mut R) -> Result<Generated, PipelineError>
where
    R: RngCore + ?Sized,
{
    config.validate()?;
    let validator = validator_for(config)?;
    let raw = load_document(&config.input)?;
    let prepared = prepare(raw, config.legacy, &validator)?;

    let magic = config
        .magic_buffer
        .as_deref()
        .map(MagicBuffer::load)
        .transpose()?;
    generate_prepared(config, prepared, magic.as_ref(), rng)
}

/// Encode and render an already-prepared document.
///
/// # Errors
///
/// `Canonicalization` or `Render` failures.
pub fn generate_prepared<R>(
    config: &CodegenConfig,
    prepared: PreparedDocument,
    magic: Option<&MagicBuffer>,
    rng: &mut R,
) -> Result<Generated, PipelineError>
where
    R: RngCore + ?Sized,
{
    let doc = prepared.hashed.document();
    let encode_with = if config.unencoded || doc.is_encoded == Some(false) {
        None
    } else {
        magic
    };
    if encode_with.is_none() && doc.is_encoded == Some(true) {
        tracing::warn!("document requests an encoded blob but no magic buffer is in use");
    }
    let blob = encode_document(&prepared.hashed, encode_with, rng)?;

    let component = doc.component_name.clone();
    let mut include_headers = doc.include_headers.clone();
    for header in &config.includes {
        if !include_headers.contains(header) {
            include_headers.push(header.clone());
        }
    }

    let normalized = prepared.normalized;
    let ctx = TemplateContext {
        component_name_lower: lower_first(&component),
        class_name: config.resolve_class_name(&component),
        namespaces: config.resolve_namespaces(&doc.namespaces, &component),
        is_pal_settings: config.pal,
        include_headers,
        code_gen_header: config.header_file_name(),
        settings_header: config.settings_filename.clone(),
        is_encoded: blob.is_encoded,
        magic_offset: blob.magic_offset,
        magic_buffer_id: blob.magic_buffer_id,
        settings_blob: blob.comma_joined(),
        settings_blob_size: blob.len(),
        settings_blob_hash: blob.hash,
        num_settings: normalized.num_settings,
        all_settings: flatten_settings(&normalized.settings),
        enums: normalized.enums,
        constants: normalized.constants,
        settings: normalized.settings,
        tags: normalized.tags,
        skip_registry: config.skip_registry || doc.skip_registry,
        is_experiments: config.experiments || doc.is_experiments,
        component_name: component,
    };

    let files = Emitter::new()?.render(&ctx)?;
    let stats = GenerationStats {
        num_settings: ctx.num_settings,
        num_enums: ctx.enums.len(),
        blob_size: ctx.settings_blob_size,
        is_encoded: ctx.is_encoded,
        migrated: prepared.migrated,
    };
    tracing::info!(
        settings = stats.num_settings,
        enums = stats.num_enums,
        blob_bytes = stats.blob_size,
        encoded = stats.is_encoded,
        "rendered {} and {}",
        config.header_file_name(),
        config.source_file_name()
    );
    Ok(Generated { files, stats })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use serde_json::json;

    fn validator() -> SchemaValidator {
        SchemaValidator::embedded().unwrap()
    }

    fn config() -> CodegenConfig {
        CodegenConfig {
            generated_filename: "exampleSettings".to_string(),
            settings_filename: "exampleSettings.h".to_string(),
            ..CodegenConfig::default()
        }
    }

    fn document() -> Value {
        json!({
            "ComponentName": "Example",
            "Enums": [{"Name": "Mode", "Values": [
                {"Name": "Off", "Value": 0, "Description": "off"},
                {"Name": "On", "Value": 1, "Description": "on"}
            ]}],
            "Settings": [
                {"Name": "MaxFrames", "Description": "Frame cap.", "Type": "uint32",
                 "Defaults": {"Default": 5}},
                {"Name": "RunMode", "Description": "Mode.", "Type": "enum", "Enum": "Mode",
                 "Defaults": {"Default": "On"}}
            ]
        })
    }

    #[test]
    fn prepare_derives_every_stage() {
        let prepared = prepare(document(), false, &validator()).unwrap();
        assert!(!prepared.migrated);
        assert_eq!(prepared.normalized.num_settings, 2);
        assert_eq!(prepared.enums.len(), 1);
        let hash = prepared.document().settings[0].name_hash;
        assert_eq!(hash, Some(pal_settings_core::fnv1a_str("MaxFrames")));
    }

    #[test]
    fn schema_violation_stops_before_typing() {
        let err = prepare(json!({"Settings": []}), false, &validator()).unwrap_err();
        assert!(matches!(err, PipelineError::Schema(_)));
    }

    #[test]
    fn invalid_component_name_rejected() {
        let mut doc = document();
        doc["ComponentName"] = json!("9Lives");
        let err = prepare(doc, false, &validator()).unwrap_err();
        assert!(matches!(
            err,
            PipelineError::Settings(SettingsError::Naming(_)) | PipelineError::Schema(_)
        ));
    }

    #[test]
    fn unencoded_run_embeds_plaintext() {
        let prepared = prepare(document(), false, &validator()).unwrap();
        let out = generate_prepared(&config(), prepared, None, &mut StdRng::seed_from_u64(1))
            .unwrap();
        assert!(!out.stats.is_encoded);
        assert!(out.files.source.contains("return false;"));
        assert!(out.files.source.contains("        m_settings.maxFrames = 5;"));
        assert!(out.files.source.contains("        m_settings.runMode = Mode::On;"));
        assert!(out.files.header.contains("namespace Example"));
        assert!(out.files.source.contains("ExampleSettingsLoader::SetupDefaults()"));
    }

    #[test]
    fn magic_buffer_encodes_blob() {
        let prepared = prepare(document(), false, &validator()).unwrap();
        let magic = MagicBuffer::new((1u8..=64).collect()).unwrap();
        let out = generate_prepared(
            &config(),
            prepared,
            Some(&magic),
            &mut StdRng::seed_from_u64(3),
        )
        .unwrap();
        assert!(out.stats.is_encoded);
        assert!(out
            .files
            .source
            .contains(&format!("return {}u;", magic.id())));
    }

    #[test]
    fn unencoded_flag_wins_over_magic_buffer() {
        let prepared = prepare(document(), false, &validator()).unwrap();
        let magic = MagicBuffer::new(vec![7; 64]).unwrap();
        let config = CodegenConfig {
            unencoded: true,
            ..config()
        };
        let out =
            generate_prepared(&config, prepared, Some(&magic), &mut StdRng::seed_from_u64(3))
                .unwrap();
        assert!(!out.stats.is_encoded);
    }

    #[test]
    fn same_seed_renders_identically() {
        let magic = MagicBuffer::new((0u8..80).collect()).unwrap();
        let render = || {
            let prepared = prepare(document(), false, &validator()).unwrap();
            generate_prepared(&config(), prepared, Some(&magic), &mut StdRng::seed_from_u64(9))
                .unwrap()
                .files
        };
        assert_eq!(render(), render());
    }

    #[test]
    fn config_includes_are_appended_once() {
        let mut doc = document();
        doc["IncludeHeaders"] = json!(["a.h"]);
        let prepared = prepare(doc, false, &validator()).unwrap();
        let config = CodegenConfig {
            includes: vec!["a.h".to_string(), "b.h".to_string()],
            ..config()
        };
        let out = generate_prepared(&config, prepared, None, &mut StdRng::seed_from_u64(1))
            .unwrap();
        assert_eq!(out.files.header.matches("#include \"a.h\"").count(), 1);
        assert!(out.files.header.contains("#include \"b.h\""));
    }

    #[test]
    fn fixed_seed_rng_is_repeatable() {
        let config = CodegenConfig {
            seed: Some(5),
            ..config()
        };
        assert_eq!(rng_for(&config).next_u32(), rng_for(&config).next_u32());
    }
}
