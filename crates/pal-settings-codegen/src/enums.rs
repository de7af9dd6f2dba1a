//! # Enum and Bitmask Resolution
//!
//! Collects every enum and bitmask declaration into one deduplicated
//! [`EnumTable`]. Declarations come from three places, in this order:
//!
//! 1. top-level `Enums`;
//! 2. top-level `Bitmasks`;
//! 3. inline `ValidValues` blocks carrying `Values`, on settings and on
//!    structure fields, in declaration order.
//!
//! Member values are resolved to integers as they are collected, so an
//! expression may refer to earlier siblings by bare name and to members of
//! previously collected enums as `Enum::Member`. A second pass checks that
//! every reference (`ValidValues` without `Values`, `Enum:`, `Bitmask:`)
//! names a collected enum.

use std::collections::HashMap;
use std::fmt;

use pal_settings_core::{validate_enum_name, SettingsError};
use serde::Serialize;

use crate::expr;
use crate::guard::build_guard;
use crate::model::{EnumDecl, EnumValue, EnumValueLiteral, Setting, SettingType, SettingsDocument};

/// Backing width of an enum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum EnumSize {
    U8,
    U16,
    U32,
    U64,
}

impl EnumSize {
    /// Width from `EnumSize` and the deprecated `Is64Bit`.
    ///
    /// # Errors
    ///
    /// `InvalidEnumSize` for a size outside 8/16/32/64, or for `Is64Bit`
    /// combined with a different explicit size.
    pub fn from_decl(
        name: &str,
        enum_size: Option<u64>,
        is_64_bit: bool,
    ) -> Result<Self, SettingsError> {
        if is_64_bit {
            tracing::warn!(
                enum_name = name,
                "\"Is64Bit\" is deprecated, use \"EnumSize: 64\" instead"
            );
            return match enum_size {
                None | Some(64) => Ok(Self::U64),
                Some(size) => Err(SettingsError::InvalidEnumSize {
                    name: name.to_string(),
                    size,
                }),
            };
        }
        match enum_size {
            None | Some(32) => Ok(Self::U32),
            Some(8) => Ok(Self::U8),
            Some(16) => Ok(Self::U16),
            Some(64) => Ok(Self::U64),
            Some(size) => Err(SettingsError::InvalidEnumSize {
                name: name.to_string(),
                size,
            }),
        }
    }

    pub fn bits(self) -> u32 {
        match self {
            Self::U8 => 8,
            Self::U16 => 16,
            Self::U32 => 32,
            Self::U64 => 64,
        }
    }

    /// The C++ storage type, e.g. `uint32_t`.
    pub fn storage_type(self) -> String {
        format!("uint{}_t", self.bits())
    }

    /// Largest member value the width can hold.
    pub fn max(self) -> i128 {
        (1i128 << self.bits()) - 1
    }
}

impl fmt::Display for EnumSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.bits())
    }
}

/// A member with its value resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedValue {
    pub name: String,
    pub value: i128,
    pub description: Option<String>,
    /// `#if ...` line gating the member, if any.
    pub guard: Option<String>,
}

/// An enum or bitmask with every member resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedEnum {
    pub name: String,
    pub description: Option<String>,
    pub values: Vec<ResolvedValue>,
    pub size: EnumSize,
    pub is_bitmask: bool,
    /// Defined by hand elsewhere; usable for lookups but never emitted.
    pub skip_gen: bool,
}

impl ResolvedEnum {
    pub fn member(&self, name: &str) -> Option<i128> {
        self.values.iter().find(|v| v.name == name).map(|v| v.value)
    }
}

/// All enums of a document, in collection order.
#[derive(Debug, Clone, Default)]
pub struct EnumTable {
    enums: Vec<ResolvedEnum>,
    index: HashMap<String, usize>,
}

impl EnumTable {
    pub fn get(&self, name: &str) -> Option<&ResolvedEnum> {
        self.index.get(name).map(|&i| &self.enums[i])
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ResolvedEnum> {
        self.enums.iter()
    }

    /// Enums that the generated header defines.
    pub fn emitted(&self) -> impl Iterator<Item = &ResolvedEnum> {
        self.enums.iter().filter(|e| !e.skip_gen)
    }

    pub fn len(&self) -> usize {
        self.enums.len()
    }

    pub fn is_empty(&self) -> bool {
        self.enums.is_empty()
    }

    /// Value of a scoped `Enum::Member` reference.
    pub fn scoped_member(&self, scoped: &str) -> Option<i128> {
        let (enum_name, member) = scoped.rsplit_once("::")?;
        self.get(enum_name)?.member(member)
    }

    fn insert(&mut self, resolved: ResolvedEnum) {
        self.index.insert(resolved.name.clone(), self.enums.len());
        self.enums.push(resolved);
    }
}

struct Declaration<'a> {
    name: &'a str,
    description: Option<&'a str>,
    values: &'a [EnumValue],
    enum_size: Option<u64>,
    is_64_bit: bool,
    is_bitmask: bool,
    skip_gen: bool,
}

impl<'a> Declaration<'a> {
    fn top_level(decl: &'a EnumDecl, is_bitmask: bool) -> Self {
        Self {
            name: &decl.name,
            description: decl.description.as_deref(),
            values: &decl.values,
            enum_size: decl.enum_size,
            is_64_bit: decl.is_64_bit,
            is_bitmask,
            skip_gen: decl.skip_gen,
        }
    }
}

/// Collect and resolve every enum in `doc`.
///
/// # Errors
///
/// `Naming` for an invalid enum name, `DuplicateEnum`, `InvalidEnumSize`,
/// `EnumValue` for an unresolvable or out-of-range member, and
/// `UnresolvedReference` for a setting naming an unknown enum.
pub fn resolve(doc: &SettingsDocument) -> Result<EnumTable, SettingsError> {
    let mut table = EnumTable::default();

    for decl in &doc.enums {
        add(&mut table, Declaration::top_level(decl, false))?;
    }
    for decl in &doc.bitmasks {
        add(&mut table, Declaration::top_level(decl, true))?;
    }

    for setting in all_settings(&doc.settings) {
        let Some(valid_values) = setting.valid_values.as_ref().filter(|v| v.is_definition())
        else {
            continue;
        };
        let name = valid_values.name.as_deref().ok_or_else(|| {
            SettingsError::UnresolvedReference(format!(
                "inline ValidValues of setting \"{}\" has no Name",
                setting.name
            ))
        })?;
        add(
            &mut table,
            Declaration {
                name,
                description: valid_values.description.as_deref(),
                values: &valid_values.values,
                enum_size: valid_values.enum_size,
                is_64_bit: valid_values.is_64_bit,
                is_bitmask: setting.flags.is_bitmask,
                skip_gen: valid_values.skip_gen,
            },
        )?;
    }

    for setting in all_settings(&doc.settings) {
        check_references(&table, setting)?;
    }

    tracing::debug!(count = table.len(), "resolved enums");
    Ok(table)
}

fn all_settings(settings: &[Setting]) -> impl Iterator<Item = &Setting> {
    settings
        .iter()
        .flat_map(|s| std::iter::once(s).chain(s.structure.iter()))
}

fn add(table: &mut EnumTable, decl: Declaration<'_>) -> Result<(), SettingsError> {
    validate_enum_name(decl.name)?;
    if table.contains(decl.name) {
        if decl.skip_gen {
            tracing::debug!(enum_name = decl.name, "skipping already defined SkipGen enum");
            return Ok(());
        }
        return Err(SettingsError::DuplicateEnum(decl.name.to_string()));
    }

    let size = EnumSize::from_decl(decl.name, decl.enum_size, decl.is_64_bit)?;
    let values = resolve_values(table, decl.name, decl.values, size)?;
    table.insert(ResolvedEnum {
        name: decl.name.to_string(),
        description: decl.description.map(str::to_string),
        values,
        size,
        is_bitmask: decl.is_bitmask,
        skip_gen: decl.skip_gen,
    });
    Ok(())
}

fn resolve_values(
    table: &EnumTable,
    enum_name: &str,
    members: &[EnumValue],
    size: EnumSize,
) -> Result<Vec<ResolvedValue>, SettingsError> {
    let mut resolved: Vec<ResolvedValue> = Vec::with_capacity(members.len());

    for member in members {
        let fail = |reason: String| SettingsError::EnumValue {
            enum_name: enum_name.to_string(),
            member: member.name.clone(),
            reason,
        };

        if resolved.iter().any(|r| r.name == member.name) {
            return Err(fail("duplicate member name".to_string()));
        }

        let value = match &member.value {
            None => match resolved.last() {
                Some(prev) => prev.value + 1,
                None => 0,
            },
            Some(EnumValueLiteral::Int(v)) => i128::from(*v),
            Some(EnumValueLiteral::UInt(v)) => i128::from(*v),
            Some(EnumValueLiteral::Expr(text)) => {
                let lookup = |ident: &str| -> Option<i128> {
                    if let Some(sibling) = resolved.iter().find(|r| r.name == ident) {
                        return Some(sibling.value);
                    }
                    match ident.rsplit_once("::") {
                        Some((scope, name)) if scope == enum_name => resolved
                            .iter()
                            .find(|r| r.name == name)
                            .map(|r| r.value),
                        Some(_) => table.scoped_member(ident),
                        None => None,
                    }
                };
                expr::evaluate(text, &lookup).map_err(fail)?
            }
        };

        if value < 0 || value > size.max() {
            return Err(fail(format!(
                "value {value} does not fit in {} unsigned bits",
                size.bits()
            )));
        }

        if member.description.is_none() {
            tracing::warn!(
                enum_name,
                member = member.name.as_str(),
                "enum value has no Description"
            );
        }

        let guard = build_guard(
            &format!("{enum_name}::{}", member.name),
            &member.build_types,
            &member.or_build_types,
            member.build_filters.as_deref(),
        )?;

        resolved.push(ResolvedValue {
            name: member.name.clone(),
            value,
            description: member.description.clone(),
            guard,
        });
    }

    Ok(resolved)
}

fn check_references(table: &EnumTable, setting: &Setting) -> Result<(), SettingsError> {
    let unresolved = |what: &str, name: &str| {
        SettingsError::UnresolvedReference(format!(
            "setting \"{}\" refers to unknown {what} \"{name}\"",
            setting.name
        ))
    };

    if let Some(name) = &setting.enum_ref {
        if !table.contains(name) {
            return Err(unresolved("enum", name));
        }
    }
    if let Some(name) = &setting.bitmask_ref {
        if !table.contains(name) {
            return Err(unresolved("bitmask", name));
        }
    }
    if let Some(name) = setting.valid_values.as_ref().and_then(|v| v.name.as_deref()) {
        if !table.contains(name) {
            return Err(unresolved("enum", name));
        }
    }

    if setting.ty == Some(SettingType::Enum) && setting.enum_name().is_none() {
        return Err(SettingsError::UnresolvedReference(format!(
            "setting \"{}\" has Type enum but names no enum",
            setting.name
        )));
    }
    Ok(())
}
