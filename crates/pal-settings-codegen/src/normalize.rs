//! # Normalization
//!
//! Builds the template-ready view of a hashed document: one
//! [`SettingEntry`] per emitted struct member, with every derived field
//! (variable name and type, string length, registry types, guards, compiled
//! default statements) filled in.
//!
//! Settings carrying a `Group` leave their declared position and are
//! collected into one [`SettingEntry::Group`] per group name. Groups are
//! appended after all ungrouped entries, in order of first appearance; the
//! members of a group keep their declaration order. Grouping never changes
//! a setting's name hash.

use std::collections::BTreeMap;

use pal_settings_core::{
    gen_variable_name, lower_first, validate_settings_name, validate_tag, SettingsError,
};
use serde::Serialize;

use crate::defaults::{self, format_float, format_hex, DefaultTarget};
use crate::enums::{EnumSize, EnumTable, ResolvedEnum};
use crate::guard::build_guard;
use crate::hashes::HashedDocument;
use crate::model::{Constant, Literal, Setting, SettingType, SettingsDocument};

/// One leaf setting, ready for the templates.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct PreparedSetting {
    pub name: String,
    pub description: Option<String>,
    pub variable_name: String,
    /// Full member path below the settings struct, e.g. `overlay.enabled`.
    pub member_path: String,
    pub variable_type: String,
    /// `VariableType` before `Optional` wrapping.
    pub raw_variable_type: String,
    pub is_optional: bool,
    pub string_length: Option<String>,
    pub name_hash: u32,
    pub name_hash_hex: String,
    /// `DD_SETTINGS_TYPE_*` for the settings registry.
    pub setting_type: String,
    /// `Util::ValueType::*` for direct registry reads.
    pub value_type: String,
    /// Integer storage of an enum setting, `uint32_t` and the like.
    pub storage_type: Option<String>,
    pub scope: Option<String>,
    pub tags: Vec<String>,
    pub build_guard: Option<String>,
    pub read_after_override: bool,
    /// Statements assigning the default inside `SetupDefaults()`.
    pub setup_default: String,
}

/// One member of the generated settings struct.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "Kind")]
pub enum SettingEntry {
    Setting(PreparedSetting),
    #[serde(rename_all = "PascalCase")]
    Structure {
        name: String,
        variable_name: String,
        description: Option<String>,
        build_guard: Option<String>,
        fields: Vec<PreparedSetting>,
    },
    #[serde(rename_all = "PascalCase")]
    Group {
        group_name: String,
        group_variable_name: String,
        subsettings: Vec<PreparedSetting>,
    },
}

impl SettingEntry {
    /// Every leaf setting of this entry.
    pub fn leaves(&self) -> &[PreparedSetting] {
        match self {
            Self::Setting(s) => std::slice::from_ref(s),
            Self::Structure { fields, .. } => fields,
            Self::Group { subsettings, .. } => subsettings,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct PreparedEnumValue {
    pub name: String,
    /// Decimal for enums, hex for bitmasks.
    pub value: String,
    pub description: Option<String>,
    pub build_guard: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct PreparedEnum {
    pub name: String,
    pub description: Option<String>,
    pub storage_type: String,
    pub enum_size: u32,
    pub is_bitmask: bool,
    pub values: Vec<PreparedEnumValue>,
}

impl PreparedEnum {
    fn from_resolved(e: &ResolvedEnum) -> Self {
        Self {
            name: e.name.clone(),
            description: e.description.clone(),
            storage_type: e.size.storage_type(),
            enum_size: e.size.bits(),
            is_bitmask: e.is_bitmask,
            values: e
                .values
                .iter()
                .map(|v| PreparedEnumValue {
                    name: v.name.clone(),
                    value: if e.is_bitmask {
                        format_hex(v.value)
                    } else {
                        v.value.to_string()
                    },
                    description: v.description.clone(),
                    build_guard: v.guard.clone(),
                })
                .collect(),
        }
    }
}

/// A `constexpr` emitted next to the settings struct.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct PreparedConstant {
    pub name: String,
    pub cpp_type: String,
    pub value: String,
    pub description: Option<String>,
}

impl PreparedConstant {
    fn new(constant: &Constant) -> Result<Self, SettingsError> {
        validate_settings_name(&constant.name)?;
        let (cpp_type, value) = match &constant.value {
            Literal::Bool(b) => ("bool", b.to_string()),
            Literal::Int(v) if i32::try_from(*v).is_ok() => ("int32_t", v.to_string()),
            Literal::Int(v) => ("int64_t", v.to_string()),
            Literal::UInt(v) => ("uint64_t", v.to_string()),
            Literal::Float(f) => ("float", format_float(*f)),
            Literal::Str(s) => ("const char*", format!("\"{}\"", defaults::escape_string(s))),
        };
        Ok(Self {
            name: constant.name.clone(),
            cpp_type: cpp_type.to_string(),
            value,
            description: constant.description.clone(),
        })
    }
}

/// A declared tag with its optional `#if` filter.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct PreparedTag {
    pub name: String,
    pub filter: Option<String>,
}

/// Output of [`normalize`].
#[derive(Debug, Clone, PartialEq)]
pub struct Normalized {
    pub settings: Vec<SettingEntry>,
    pub enums: Vec<PreparedEnum>,
    pub constants: Vec<PreparedConstant>,
    pub tags: Vec<PreparedTag>,
    /// Count of hashed leaf settings.
    pub num_settings: usize,
}

/// Derive every per-setting field and flatten groups.
///
/// # Errors
///
/// Any error from default compilation or guard extraction, `Tag` for an
/// invalid or undeclared tag, `Naming` for a bad group or constant name,
/// `DuplicateName` when two members of one struct derive the same variable
/// name, and `Schema` for a `Structure` placed in a `Group`.
pub fn normalize(hashed: &HashedDocument, enums: &EnumTable) -> Result<Normalized, SettingsError> {
    let doc = hashed.document();
    let tags = prepare_tags(doc)?;

    let mut entries = Vec::new();
    let mut groups: Vec<(String, Vec<PreparedSetting>)> = Vec::new();

    for setting in &doc.settings {
        if setting.is_structure() {
            if setting.group.is_some() {
                return Err(SettingsError::Schema {
                    path: format!("/Settings/{}", setting.name),
                    message: "a Structure cannot be placed in a Group".to_string(),
                });
            }
            let variable_name = gen_variable_name(&setting.name);
            let fields = setting
                .structure
                .iter()
                .map(|field| {
                    if field.group.is_some() {
                        return Err(SettingsError::Schema {
                            path: format!("/Settings/{}/{}", setting.name, field.name),
                            message: "a Structure field cannot be placed in a Group".to_string(),
                        });
                    }
                    prepare(
                        hashed,
                        field,
                        setting.scope.as_deref(),
                        Some(variable_name.as_str()),
                        &tags,
                        enums,
                    )
                })
                .collect::<Result<Vec<_>, _>>()?;
            entries.push(SettingEntry::Structure {
                name: setting.name.clone(),
                variable_name,
                description: setting.description.clone(),
                build_guard: build_guard(
                    &setting.name,
                    &setting.build_types,
                    &setting.or_build_types,
                    setting.build_filters.as_deref(),
                )?,
                fields,
            });
        } else if let Some(group) = &setting.group {
            validate_settings_name(group)?;
            let prefix = lower_first(group);
            let prepared = prepare(hashed, setting, None, Some(prefix.as_str()), &tags, enums)?;
            match groups.iter_mut().find(|(name, _)| name == group) {
                Some((_, members)) => members.push(prepared),
                None => groups.push((group.clone(), vec![prepared])),
            }
        } else {
            entries.push(SettingEntry::Setting(prepare(
                hashed, setting, None, None, &tags, enums,
            )?));
        }
    }

    entries.extend(groups.into_iter().map(|(group_name, subsettings)| {
        SettingEntry::Group {
            group_variable_name: lower_first(&group_name),
            group_name,
            subsettings,
        }
    }));
    check_member_names(&entries)?;

    let constants = doc
        .constants
        .iter()
        .map(PreparedConstant::new)
        .collect::<Result<Vec<_>, _>>()?;

    let num_settings = entries.iter().map(|e| e.leaves().len()).sum();
    tracing::debug!(entries = entries.len(), num_settings, "normalized settings");

    Ok(Normalized {
        settings: entries,
        enums: enums.emitted().map(PreparedEnum::from_resolved).collect(),
        constants,
        tags,
        num_settings,
    })
}

/// Distinct setting names can derive the same variable name
/// (`EnableLLPC`, `EnableLlpc`); each struct scope must stay unique.
fn check_member_names(entries: &[SettingEntry]) -> Result<(), SettingsError> {
    let top = entries.iter().map(|entry| match entry {
        SettingEntry::Setting(s) => (s.variable_name.as_str(), s.name.as_str()),
        SettingEntry::Structure { variable_name, name, .. } => (variable_name.as_str(), name.as_str()),
        SettingEntry::Group { group_variable_name, group_name, .. } => {
            (group_variable_name.as_str(), group_name.as_str())
        }
    });
    unique_members(top)?;
    for entry in entries {
        if !matches!(entry, SettingEntry::Setting(_)) {
            unique_members(
                entry
                    .leaves()
                    .iter()
                    .map(|s| (s.variable_name.as_str(), s.name.as_str())),
            )?;
        }
    }
    Ok(())
}

fn unique_members<'a>(
    members: impl Iterator<Item = (&'a str, &'a str)>,
) -> Result<(), SettingsError> {
    let mut seen: BTreeMap<&str, &str> = BTreeMap::new();
    for (variable, name) in members {
        if let Some(first) = seen.insert(variable, name) {
            return Err(SettingsError::DuplicateName(format!(
                "{name} (member {variable} is already used by {first})"
            )));
        }
    }
    Ok(())
}

fn prepare_tags(doc: &SettingsDocument) -> Result<Vec<PreparedTag>, SettingsError> {
    let mut tags: Vec<PreparedTag> = Vec::with_capacity(doc.tags.len());
    for name in &doc.tags {
        validate_tag(name)?;
        if tags.iter().any(|t| &t.name == name) {
            return Err(SettingsError::Tag(format!("\"{name}\" is declared twice")));
        }
        tags.push(PreparedTag {
            name: name.clone(),
            filter: doc.tag_filters.get(name).cloned(),
        });
    }
    if let Some(orphan) = doc.tag_filters.keys().find(|k| !doc.tags.contains(*k)) {
        return Err(SettingsError::Tag(format!(
            "\"{orphan}\" has a filter but is not declared in Tags"
        )));
    }
    Ok(tags)
}

fn prepare(
    hashed: &HashedDocument,
    setting: &Setting,
    inherited_scope: Option<&str>,
    parent: Option<&str>,
    declared_tags: &[PreparedTag],
    enums: &EnumTable,
) -> Result<PreparedSetting, SettingsError> {
    for tag in &setting.tags {
        validate_tag(tag)?;
        if !declared_tags.is_empty() && !declared_tags.iter().any(|t| &t.name == tag) {
            return Err(SettingsError::Tag(format!(
                "setting \"{}\" uses undeclared tag \"{tag}\"",
                setting.name
            )));
        }
    }

    let name_hash = hashed.hash_of(setting)?;
    let variable_name = gen_variable_name(&setting.name);
    let member_path = match parent {
        Some(parent) => format!("{parent}.{variable_name}"),
        None => variable_name.clone(),
    };

    let target = DefaultTarget::for_setting(setting, enums)?;
    let raw_variable_type = target.variable_type();
    let is_optional = setting.defaults.as_ref().map_or(true, |d| d.is_empty())
        && !matches!(target, DefaultTarget::Str { .. });
    let variable_type = if is_optional {
        format!("DevDriver::Optional<{raw_variable_type}>")
    } else {
        raw_variable_type.clone()
    };

    let setup_default =
        defaults::compile(&setting.name, &member_path, &target, setting.defaults.as_ref())?;

    let enum_size = match target {
        DefaultTarget::Enum(e) => Some(e.size),
        _ => None,
    };
    let ty = setting.ty.unwrap_or(SettingType::Struct);

    Ok(PreparedSetting {
        name: setting.name.clone(),
        description: setting.description.clone(),
        variable_name,
        member_path,
        variable_type,
        raw_variable_type,
        is_optional,
        string_length: target.string_length().map(str::to_string),
        name_hash,
        name_hash_hex: format!("0x{name_hash:08X}"),
        setting_type: registry_type(ty, enum_size),
        value_type: value_type(ty, enum_size),
        storage_type: enum_size.map(EnumSize::storage_type),
        scope: setting
            .scope
            .clone()
            .or_else(|| inherited_scope.map(str::to_string)),
        tags: setting.tags.clone(),
        build_guard: build_guard(
            &setting.name,
            &setting.build_types,
            &setting.or_build_types,
            setting.build_filters.as_deref(),
        )?,
        read_after_override: setting.flags.read_after_override,
        setup_default,
    })
}

/// `DD_SETTINGS_TYPE_*` name for a setting type. Enums use their width.
pub fn registry_type(ty: SettingType, enum_size: Option<EnumSize>) -> String {
    let suffix = match ty {
        SettingType::Enum => format!("UINT{}", enum_size.unwrap_or(EnumSize::U32).bits()),
        other => other.as_str().to_ascii_uppercase(),
    };
    format!("DD_SETTINGS_TYPE_{suffix}")
}

/// `Util::ValueType::*` name for a setting type.
pub fn value_type(ty: SettingType, enum_size: Option<EnumSize>) -> String {
    let name = match ty {
        SettingType::Bool => "Boolean",
        SettingType::Int8 | SettingType::Int16 | SettingType::Int32 => "Int",
        SettingType::Int64 => "Int64",
        SettingType::Uint8 | SettingType::Uint16 | SettingType::Uint32 => "Uint",
        SettingType::Uint64 => "Uint64",
        SettingType::Float => "Float",
        SettingType::String => "Str",
        SettingType::Enum if enum_size == Some(EnumSize::U64) => "Uint64",
        SettingType::Enum | SettingType::Struct => "Uint",
    };
    format!("Util::ValueType::{name}")
}
