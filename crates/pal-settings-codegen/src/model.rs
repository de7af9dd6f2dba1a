//! # Document Model
//!
//! Typed form of a schema-valid settings document. Field names follow the
//! document's PascalCase keys. Serializing a [`SettingsDocument`] yields
//! the same shape it was read from, plus the `NameHash` of every hashed
//! setting once [`crate::hashes::assign_name_hashes`] has run; that form is
//! what the blob carries.
//!
//! Literal values (defaults, enum values, constants) are kept as untagged
//! unions here. They are classified against their setting's type later, in
//! [`crate::defaults`].

use std::collections::BTreeMap;
use std::fmt;

use pal_settings_core::SettingsError;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Declared type of a setting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SettingType {
    Bool,
    Int8,
    Int16,
    Int32,
    Int64,
    Uint8,
    Uint16,
    Uint32,
    Uint64,
    Float,
    String,
    Enum,
    Struct,
}

impl SettingType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Bool => "bool",
            Self::Int8 => "int8",
            Self::Int16 => "int16",
            Self::Int32 => "int32",
            Self::Int64 => "int64",
            Self::Uint8 => "uint8",
            Self::Uint16 => "uint16",
            Self::Uint32 => "uint32",
            Self::Uint64 => "uint64",
            Self::Float => "float",
            Self::String => "string",
            Self::Enum => "enum",
            Self::Struct => "struct",
        }
    }

    /// `(signed, bits)` for the integer types.
    pub fn int_width(self) -> Option<(bool, u32)> {
        match self {
            Self::Int8 => Some((true, 8)),
            Self::Int16 => Some((true, 16)),
            Self::Int32 => Some((true, 32)),
            Self::Int64 => Some((true, 64)),
            Self::Uint8 => Some((false, 8)),
            Self::Uint16 => Some((false, 16)),
            Self::Uint32 => Some((false, 32)),
            Self::Uint64 => Some((false, 64)),
            _ => None,
        }
    }
}

impl fmt::Display for SettingType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Recognized setting markers.
///
/// Documents spell flags either as an object of booleans
/// (`{"IsHex": true}`) or as a list of names (`["IsHex"]`). Both
/// deserialize to this struct; it always serializes as the object form with
/// unset flags omitted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "FlagsRepr", rename_all = "PascalCase")]
pub struct Flags {
    #[serde(skip_serializing_if = "is_false")]
    pub is_hex: bool,
    #[serde(skip_serializing_if = "is_false")]
    pub is_bitmask: bool,
    #[serde(skip_serializing_if = "is_false")]
    pub is_dir: bool,
    #[serde(skip_serializing_if = "is_false")]
    pub is_file: bool,
    #[serde(skip_serializing_if = "is_false")]
    pub read_after_override: bool,
}

impl Flags {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    fn set(&mut self, name: &str, value: bool) -> Result<(), String> {
        let slot = match name {
            "IsHex" => &mut self.is_hex,
            "IsBitmask" => &mut self.is_bitmask,
            "IsDir" => &mut self.is_dir,
            "IsFile" => &mut self.is_file,
            "ReadAfterOverride" => &mut self.read_after_override,
            other => return Err(format!("unknown flag \"{other}\"")),
        };
        *slot = value;
        Ok(())
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum FlagsRepr {
    Map(BTreeMap<String, bool>),
    List(Vec<String>),
}

impl TryFrom<FlagsRepr> for Flags {
    type Error = String;

    fn try_from(repr: FlagsRepr) -> Result<Self, Self::Error> {
        let mut flags = Flags::default();
        match repr {
            FlagsRepr::Map(map) => {
                for (name, value) in map {
                    flags.set(&name, value)?;
                }
            }
            FlagsRepr::List(names) => {
                for name in names {
                    flags.set(&name, true)?;
                }
            }
        }
        Ok(flags)
    }
}

fn is_false(b: &bool) -> bool {
    !*b
}

/// A literal as written in the document: a default, or a constant value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Literal {
    Bool(bool),
    Int(i64),
    UInt(u64),
    Float(f64),
    Str(String),
}

impl Literal {
    /// Short name of the literal's kind, for mismatch messages.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Bool(_) => "bool",
            Self::Int(_) | Self::UInt(_) => "integer",
            Self::Float(_) => "float",
            Self::Str(_) => "string",
        }
    }

    /// The integer value, if this is an integer literal.
    pub fn as_int(&self) -> Option<i128> {
        match *self {
            Self::Int(v) => Some(i128::from(v)),
            Self::UInt(v) => Some(i128::from(v)),
            _ => None,
        }
    }
}

/// The four platform slots of a `Defaults` map.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Platform {
    Default,
    Windows,
    Linux,
    Android,
}

impl Platform {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Default => "Default",
            Self::Windows => "Windows",
            Self::Linux => "Linux",
            Self::Android => "Android",
        }
    }
}

/// Platform-keyed default values.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Defaults {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Literal>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub windows: Option<Literal>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub linux: Option<Literal>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub android: Option<Literal>,
}

impl Defaults {
    pub fn get(&self, platform: Platform) -> Option<&Literal> {
        match platform {
            Platform::Default => self.default.as_ref(),
            Platform::Windows => self.windows.as_ref(),
            Platform::Linux => self.linux.as_ref(),
            Platform::Android => self.android.as_ref(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.default.is_none()
            && self.windows.is_none()
            && self.linux.is_none()
            && self.android.is_none()
    }
}

/// The value of an enum member as written: a number or an expression.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EnumValueLiteral {
    Int(i64),
    UInt(u64),
    Expr(String),
}

/// One enum member or bitmask bit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct EnumValue {
    pub name: String,
    /// Absent means one more than the previous member (zero for the first).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<EnumValueLiteral>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub build_types: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub or_build_types: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub build_filters: Option<String>,
}

/// A top-level `Enums` or `Bitmasks` entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct EnumDecl {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(alias = "Variants", alias = "Bits")]
    pub values: Vec<EnumValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enum_size: Option<u64>,
    #[serde(rename = "Is64Bit", default, skip_serializing_if = "is_false")]
    pub is_64_bit: bool,
    #[serde(default, skip_serializing_if = "is_false")]
    pub skip_gen: bool,
}

/// A setting's inline `ValidValues`: an enum definition when `Values` is
/// present, otherwise a reference to a top-level enum by `Name`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ValidValues {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "is_false")]
    pub is_enum: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub values: Vec<EnumValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enum_size: Option<u64>,
    #[serde(rename = "Is64Bit", default, skip_serializing_if = "is_false")]
    pub is_64_bit: bool,
    #[serde(default, skip_serializing_if = "is_false")]
    pub skip_gen: bool,
}

impl ValidValues {
    pub fn is_definition(&self) -> bool {
        !self.values.is_empty()
    }
}

/// A named compile-time constant emitted alongside the settings struct.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Constant {
    pub name: String,
    pub value: Literal,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// One setting, or a `Structure` of subsettings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Setting {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    #[serde(rename = "Type", default, skip_serializing_if = "Option::is_none")]
    pub ty: Option<SettingType>,
    #[serde(default, skip_serializing_if = "Flags::is_empty")]
    pub flags: Flags,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub defaults: Option<Defaults>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub valid_values: Option<ValidValues>,
    #[serde(rename = "Enum", default, skip_serializing_if = "Option::is_none")]
    pub enum_ref: Option<String>,
    #[serde(rename = "Bitmask", default, skip_serializing_if = "Option::is_none")]
    pub bitmask_ref: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub structure: Vec<Setting>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub build_types: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub or_build_types: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub build_filters: Option<String>,
    /// Assigned by the hashing stage; never read from input.
    #[serde(skip_deserializing, skip_serializing_if = "Option::is_none")]
    pub name_hash: Option<u32>,
}

impl Setting {
    pub fn is_structure(&self) -> bool {
        !self.structure.is_empty()
    }

    /// Name of the enum this setting's `Type: enum` refers to, in either
    /// the `ValidValues.Name` or the `Enum:` spelling.
    pub fn enum_name(&self) -> Option<&str> {
        self.enum_ref
            .as_deref()
            .or_else(|| self.valid_values.as_ref().and_then(|v| v.name.as_deref()))
    }

    /// Name of the bitmask this setting refers to, if any.
    pub fn bitmask_name(&self) -> Option<&str> {
        self.bitmask_ref.as_deref().or_else(|| {
            if self.flags.is_bitmask {
                self.valid_values.as_ref().and_then(|v| v.name.as_deref())
            } else {
                None
            }
        })
    }

    pub fn is_bitmask(&self) -> bool {
        self.flags.is_bitmask || self.bitmask_ref.is_some()
    }
}

/// Root of a settings document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct SettingsDocument {
    pub component_name: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub enums: Vec<EnumDecl>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub bitmasks: Vec<EnumDecl>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub constants: Vec<Constant>,
    pub settings: Vec<Setting>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    /// Tag name to `#if ...` guard, produced by legacy migration.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub tag_filters: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub namespaces: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub include_headers: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_encoded: Option<bool>,
    #[serde(default, skip_serializing_if = "is_false")]
    pub skip_registry: bool,
    #[serde(default, skip_serializing_if = "is_false")]
    pub is_experiments: bool,
}

impl SettingsDocument {
    /// Build the typed document from a schema-valid JSON value.
    ///
    /// # Errors
    ///
    /// `SettingsError::Schema` if the value does not have the document
    /// shape. Schema validation normally catches this first.
    pub fn from_value(value: Value) -> Result<Self, SettingsError> {
        serde_json::from_value(value).map_err(|e| SettingsError::Schema {
            path: "(document)".to_string(),
            message: e.to_string(),
        })
    }

    /// Every setting that carries its own name hash: top-level non-structure
    /// settings and every structure field, in declaration order.
    pub fn hashed_settings(&self) -> impl Iterator<Item = &Setting> {
        self.settings.iter().flat_map(|s| {
            let fields: Box<dyn Iterator<Item = &Setting>> = if s.is_structure() {
                Box::new(s.structure.iter())
            } else {
                Box::new(std::iter::once(s))
            };
            fields
        })
    }
}
