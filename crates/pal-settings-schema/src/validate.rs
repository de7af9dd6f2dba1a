//! # Schema Validation
//!
//! Runtime validation of settings documents (JSON or YAML) against the
//! settings JSON Schema (Draft 2020-12).
//!
//! ## Trust Boundary
//!
//! Every document is validated before any pipeline stage sees it. Documents
//! that fail are rejected with structured violations: the instance path of
//! the offending field, the schema keyword that rejected it, and a message.
//!
//! ## Schema Resolution
//!
//! The checked-in `schemas/settings.schema.json` is embedded at compile
//! time, so the binary needs no files beside the input. A different schema
//! may be loaded from disk (JSON or YAML). Schemas must be self-contained:
//! internal `#/$defs/...` references resolve natively, and any remote
//! `$ref` is refused instead of fetched.

use std::fmt;
use std::path::Path;

use jsonschema::{Retrieve, Uri, Validator};
use serde_json::Value;
use thiserror::Error;

/// Name under which the embedded schema is reported.
pub const SETTINGS_SCHEMA_NAME: &str = "settings.schema.json";

const EMBEDDED_SETTINGS_SCHEMA: &str = include_str!("../../../schemas/settings.schema.json");

/// Refuses every external `$ref` so validation never touches the network.
struct LocalOnlyRetriever;

impl Retrieve for LocalOnlyRetriever {
    fn retrieve(
        &self,
        uri: &Uri<&str>,
    ) -> Result<Value, Box<dyn std::error::Error + Send + Sync>> {
        Err(format!("external schema reference not allowed: {}", uri.as_str()).into())
    }
}

/// Error during schema validation.
#[derive(Error, Debug)]
pub enum SchemaValidationError {
    /// The document did not conform to the schema.
    #[error("validation failed against schema '{schema_name}':\n{violations}")]
    ValidationFailed {
        /// Name of the schema that was validated against.
        schema_name: String,
        /// Structured list of individual violations.
        violations: ValidationViolations,
    },

    /// The schema file could not be loaded.
    #[error("schema load error for '{schema_name}': {reason}")]
    SchemaLoadError {
        /// Schema filename or identifier.
        schema_name: String,
        /// Reason the schema could not be loaded.
        reason: String,
    },

    /// The document file could not be loaded or parsed.
    #[error("document load error for '{path}': {reason}")]
    DocumentLoadError {
        /// Path to the document that failed to load.
        path: String,
        /// Reason the document could not be loaded.
        reason: String,
    },

    /// The compiled validator could not be built (e.g., invalid schema).
    #[error("validator build error for schema '{schema_name}': {reason}")]
    ValidatorBuildError {
        /// Schema filename or identifier.
        schema_name: String,
        /// Reason the validator could not be built.
        reason: String,
    },

    /// IO error reading schema or document.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// A single validation violation with structured context.
#[derive(Debug, Clone)]
pub struct Violation {
    /// JSON Pointer path to the violating field in the instance.
    pub instance_path: String,
    /// JSON Pointer path within the schema that triggered the error.
    pub schema_path: String,
    /// Human-readable description of the violation.
    pub message: String,
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.instance_path.is_empty() {
            write!(f, "  (root): {}", self.message)
        } else {
            write!(f, "  {}: {}", self.instance_path, self.message)
        }
    }
}

/// Collection of validation violations.
#[derive(Debug, Clone)]
pub struct ValidationViolations {
    violations: Vec<Violation>,
}

impl ValidationViolations {
    pub fn len(&self) -> usize {
        self.violations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.violations.is_empty()
    }

    pub fn violations(&self) -> &[Violation] {
        &self.violations
    }

    /// The first violation, used as the headline of an error report.
    pub fn first(&self) -> Option<&Violation> {
        self.violations.first()
    }

    pub fn into_inner(self) -> Vec<Violation> {
        self.violations
    }
}

impl fmt::Display for ValidationViolations {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, v) in self.violations.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            write!(f, "{v}")?;
        }
        Ok(())
    }
}

/// Input document syntax, chosen from the file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentFormat {
    Json,
    Yaml,
}

impl DocumentFormat {
    /// `.yaml`/`.yml` are YAML; everything else is treated as JSON.
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("yaml") || ext.eq_ignore_ascii_case("yml") => {
                Self::Yaml
            }
            _ => Self::Json,
        }
    }
}

/// A compiled settings-schema validator.
///
/// Compilation happens once at construction; [`validate_document`] can then
/// be called for any number of documents.
///
/// [`validate_document`]: SchemaValidator::validate_document
pub struct SchemaValidator {
    schema_name: String,
    validator: Validator,
}

impl fmt::Debug for SchemaValidator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SchemaValidator")
            .field("schema_name", &self.schema_name)
            .finish_non_exhaustive()
    }
}

impl SchemaValidator {
    /// Compile the schema embedded in this crate.
    ///
    /// # Errors
    ///
    /// Only fails if the embedded schema itself is malformed.
    pub fn embedded() -> Result<Self, SchemaValidationError> {
        let schema: Value = serde_json::from_str(EMBEDDED_SETTINGS_SCHEMA).map_err(|e| {
            SchemaValidationError::SchemaLoadError {
                schema_name: SETTINGS_SCHEMA_NAME.to_string(),
                reason: format!("invalid JSON: {e}"),
            }
        })?;
        Self::from_value(SETTINGS_SCHEMA_NAME, &schema)
    }

    /// Load and compile a schema file. YAML schemas are accepted by extension.
    ///
    /// # Errors
    ///
    /// Returns `SchemaLoadError` if the file cannot be read or parsed and
    /// `ValidatorBuildError` if it is not a valid JSON Schema.
    pub fn from_path(path: &Path) -> Result<Self, SchemaValidationError> {
        let schema_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or(SETTINGS_SCHEMA_NAME)
            .to_string();

        let schema = load_document(path).map_err(|e| match e {
            SchemaValidationError::DocumentLoadError { reason, .. } => {
                SchemaValidationError::SchemaLoadError {
                    schema_name: schema_name.clone(),
                    reason,
                }
            }
            other => other,
        })?;

        tracing::debug!(schema = %path.display(), "loaded settings schema");
        Self::from_value(&schema_name, &schema)
    }

    /// Compile an already-parsed schema value.
    pub fn from_value(schema_name: &str, schema: &Value) -> Result<Self, SchemaValidationError> {
        let mut opts = jsonschema::options();
        opts.with_draft(jsonschema::Draft::Draft202012);
        opts.with_retriever(LocalOnlyRetriever);

        let validator =
            opts.build(schema)
                .map_err(|e| SchemaValidationError::ValidatorBuildError {
                    schema_name: schema_name.to_string(),
                    reason: e.to_string(),
                })?;

        Ok(Self {
            schema_name: schema_name.to_string(),
            validator,
        })
    }

    pub fn schema_name(&self) -> &str {
        &self.schema_name
    }

    /// Validate a parsed document.
    ///
    /// # Errors
    ///
    /// Returns `ValidationFailed` with every violation found, not only the
    /// first.
    pub fn validate_document(&self, instance: &Value) -> Result<(), SchemaValidationError> {
        let errors: Vec<Violation> = self
            .validator
            .iter_errors(instance)
            .map(|e| Violation {
                instance_path: e.instance_path.to_string(),
                schema_path: e.schema_path.to_string(),
                message: e.to_string(),
            })
            .collect();

        if errors.is_empty() {
            Ok(())
        } else {
            Err(SchemaValidationError::ValidationFailed {
                schema_name: self.schema_name.clone(),
                violations: ValidationViolations { violations: errors },
            })
        }
    }

    /// Load a document from disk and validate it, returning the parsed value.
    pub fn validate_file(&self, path: &Path) -> Result<Value, SchemaValidationError> {
        let document = load_document(path)?;
        self.validate_document(&document).map_err(|e| match e {
            SchemaValidationError::ValidationFailed { violations, .. } => {
                SchemaValidationError::ValidationFailed {
                    schema_name: format!("{} ({})", self.schema_name, path.display()),
                    violations,
                }
            }
            other => other,
        })?;
        Ok(document)
    }
}

/// Read a JSON or YAML document from disk into a JSON value.
///
/// # Errors
///
/// Returns `DocumentLoadError` naming the path if the file cannot be read
/// or parsed.
pub fn load_document(path: &Path) -> Result<Value, SchemaValidationError> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        SchemaValidationError::DocumentLoadError {
            path: path.display().to_string(),
            reason: format!("cannot read file: {e}"),
        }
    })?;
    parse_document(&content, DocumentFormat::from_path(path)).map_err(|reason| {
        SchemaValidationError::DocumentLoadError {
            path: path.display().to_string(),
            reason,
        }
    })
}

/// Parse document text in the given format into a JSON value.
pub fn parse_document(content: &str, format: DocumentFormat) -> Result<Value, String> {
    match format {
        DocumentFormat::Json => {
            serde_json::from_str(content).map_err(|e| format!("invalid JSON: {e}"))
        }
        DocumentFormat::Yaml => {
            let yaml_value: serde_yaml::Value =
                serde_yaml::from_str(content).map_err(|e| format!("invalid YAML: {e}"))?;
            yaml_to_json_value(&yaml_value)
                .map_err(|e| format!("YAML-to-JSON conversion failed: {e}"))
        }
    }
}

/// Convert a `serde_yaml::Value` to a `serde_json::Value`.
///
/// Settings documents use only the JSON-compatible subset of YAML. Tags
/// are dropped; non-string scalar keys are stringified.
pub fn yaml_to_json_value(yaml: &serde_yaml::Value) -> Result<Value, String> {
    match yaml {
        serde_yaml::Value::Null => Ok(Value::Null),
        serde_yaml::Value::Bool(b) => Ok(Value::Bool(*b)),
        serde_yaml::Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Ok(Value::Number(serde_json::Number::from(i)))
            } else if let Some(u) = n.as_u64() {
                Ok(Value::Number(serde_json::Number::from(u)))
            } else if let Some(f) = n.as_f64() {
                serde_json::Number::from_f64(f)
                    .map(Value::Number)
                    .ok_or_else(|| format!("cannot represent float {f} in JSON"))
            } else {
                Err(format!("unsupported YAML number: {n:?}"))
            }
        }
        serde_yaml::Value::String(s) => Ok(Value::String(s.clone())),
        serde_yaml::Value::Sequence(seq) => {
            let items: Result<Vec<Value>, String> = seq.iter().map(yaml_to_json_value).collect();
            Ok(Value::Array(items?))
        }
        serde_yaml::Value::Mapping(map) => {
            let mut json_map = serde_json::Map::new();
            for (k, v) in map {
                let key = match k {
                    serde_yaml::Value::String(s) => s.clone(),
                    serde_yaml::Value::Number(n) => n.to_string(),
                    serde_yaml::Value::Bool(b) => b.to_string(),
                    other => return Err(format!("unsupported YAML map key type: {other:?}")),
                };
                json_map.insert(key, yaml_to_json_value(v)?);
            }
            Ok(Value::Object(json_map))
        }
        serde_yaml::Value::Tagged(tagged) => yaml_to_json_value(&tagged.value),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn validator() -> SchemaValidator {
        SchemaValidator::embedded().unwrap()
    }

    fn violation_paths(err: &SchemaValidationError) -> Vec<String> {
        match err {
            SchemaValidationError::ValidationFailed { violations, .. } => violations
                .violations()
                .iter()
                .map(|v| v.instance_path.clone())
                .collect(),
            other => panic!("Expected ValidationFailed, got: {other}"),
        }
    }

    #[test]
    fn embedded_schema_compiles() {
        assert_eq!(validator().schema_name(), SETTINGS_SCHEMA_NAME);
    }

    #[test]
    fn minimal_document_is_valid() {
        let doc = json!({
            "ComponentName": "Example",
            "Settings": [
                {"Name": "MaxFrames", "Type": "uint32", "Defaults": {"Default": 5}}
            ]
        });
        validator().validate_document(&doc).unwrap();
    }

    #[test]
    fn full_document_is_valid() {
        let doc = json!({
            "ComponentName": "Example",
            "Enums": [
                {"Name": "OverlayLocation", "Values": [
                    {"Name": "TopLeft", "Value": 0},
                    {"Name": "TopRight", "Value": "0x1"}
                ]}
            ],
            "Bitmasks": [
                {"Name": "DumpFlags", "Bits": [{"Name": "Pre", "Value": 1}], "EnumSize": 16}
            ],
            "Constants": [{"Name": "MaxDepth", "Value": 4}],
            "Tags": ["Debug"],
            "Settings": [
                {
                    "Name": "Overlay",
                    "Type": "enum",
                    "Enum": "OverlayLocation",
                    "Scope": "PrivatePalKey",
                    "Defaults": {"Default": "TopLeft", "Windows": "TopRight"}
                },
                {
                    "Name": "Dump",
                    "Type": "uint16",
                    "Bitmask": "DumpFlags",
                    "Flags": ["IsBitmask"],
                    "BuildTypes": ["PAL_DEVELOPER_BUILD"]
                },
                {
                    "Name": "Paths",
                    "Structure": [
                        {"Name": "Dir", "Type": "string", "Flags": {"IsDir": true},
                         "Defaults": {"Default": "C:\\temp"}}
                    ]
                }
            ]
        });
        validator().validate_document(&doc).unwrap();
    }

    #[test]
    fn missing_component_name_rejected() {
        let doc = json!({"Settings": []});
        let err = validator().validate_document(&doc).unwrap_err();
        match &err {
            SchemaValidationError::ValidationFailed { violations, .. } => {
                assert!(violations
                    .violations()
                    .iter()
                    .any(|v| v.message.contains("ComponentName")));
            }
            other => panic!("Expected ValidationFailed, got: {other}"),
        }
    }

    #[test]
    fn violation_names_offending_setting_path() {
        let doc = json!({
            "ComponentName": "Example",
            "Settings": [
                {"Name": "Good", "Type": "bool", "Defaults": {"Default": true}},
                {"Name": "Bad", "Type": "double", "Defaults": {"Default": 1.0}}
            ]
        });
        let err = validator().validate_document(&doc).unwrap_err();
        let paths = violation_paths(&err);
        assert!(
            paths.iter().any(|p| p.starts_with("/Settings/1")),
            "expected a violation under /Settings/1, got {paths:?}"
        );
    }

    #[test]
    fn setting_without_type_or_structure_rejected() {
        let doc = json!({
            "ComponentName": "Example",
            "Settings": [{"Name": "Orphan"}]
        });
        assert!(validator().validate_document(&doc).is_err());
    }

    #[test]
    fn structure_with_scalar_type_rejected() {
        let doc = json!({
            "ComponentName": "Example",
            "Settings": [{
                "Name": "Both",
                "Type": "uint32",
                "Structure": [{"Name": "Field", "Type": "bool"}]
            }]
        });
        assert!(validator().validate_document(&doc).is_err());
    }

    #[test]
    fn unknown_flag_rejected() {
        let doc = json!({
            "ComponentName": "Example",
            "Settings": [{"Name": "X", "Type": "uint32", "Flags": ["IsOctal"]}]
        });
        assert!(validator().validate_document(&doc).is_err());
    }

    #[test]
    fn additional_root_properties_rejected() {
        let doc = json!({
            "ComponentName": "Example",
            "Settings": [],
            "Unexpected": 1
        });
        assert!(validator().validate_document(&doc).is_err());
    }

    #[test]
    fn build_filters_must_be_preprocessor_if() {
        let doc = json!({
            "ComponentName": "Example",
            "Settings": [{"Name": "X", "Type": "bool", "BuildFilters": "PAL_BUILD_GFX12"}]
        });
        assert!(validator().validate_document(&doc).is_err());
    }

    #[test]
    fn yaml_to_json_conversion() {
        let yaml_str = r#"
ComponentName: Example
Settings:
  - Name: MaxFrames
    Type: uint32
    Defaults:
      Default: 5
  - Name: Scale
    Type: float
    Defaults:
      Default: 1.5
"#;
        let value = parse_document(yaml_str, DocumentFormat::Yaml).unwrap();
        assert_eq!(value["ComponentName"], "Example");
        assert_eq!(value["Settings"][0]["Defaults"]["Default"], 5);
        assert_eq!(value["Settings"][1]["Defaults"]["Default"], 1.5);
        validator().validate_document(&value).unwrap();
    }

    #[test]
    fn yaml_infinite_float_rejected() {
        let err = parse_document("Value: .inf", DocumentFormat::Yaml).unwrap_err();
        assert!(err.contains("cannot represent float"));
    }

    #[test]
    fn format_from_extension() {
        assert_eq!(DocumentFormat::from_path(Path::new("a.yaml")), DocumentFormat::Yaml);
        assert_eq!(DocumentFormat::from_path(Path::new("a.YML")), DocumentFormat::Yaml);
        assert_eq!(DocumentFormat::from_path(Path::new("a.json")), DocumentFormat::Json);
        assert_eq!(DocumentFormat::from_path(Path::new("a")), DocumentFormat::Json);
    }

    #[test]
    fn remote_ref_refused() {
        let schema = json!({
            "$schema": "https://json-schema.org/draft/2020-12/schema",
            "$ref": "https://example.com/remote.schema.json"
        });
        let err = SchemaValidator::from_value("remote.schema.json", &schema).unwrap_err();
        assert!(
            matches!(err, SchemaValidationError::ValidatorBuildError { .. }),
            "Expected ValidatorBuildError, got: {err}"
        );
    }

    #[test]
    fn violation_display_root() {
        let v = Violation {
            instance_path: String::new(),
            schema_path: "/required".to_string(),
            message: r#""Settings" is a required property"#.to_string(),
        };
        assert!(v.to_string().contains("(root)"));
    }

    #[test]
    fn violation_display_path() {
        let v = Violation {
            instance_path: "/Settings/0/Type".to_string(),
            schema_path: "/$defs/settingType/enum".to_string(),
            message: r#""double" is not one of ..."#.to_string(),
        };
        assert!(v.to_string().starts_with("  /Settings/0/Type: "));
    }
}
