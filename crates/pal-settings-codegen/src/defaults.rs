//! # Default-Value Compilation
//!
//! Turns each setting's `Defaults` map into the C++ statements that assign
//! it inside the generated `SetupDefaults()` function.
//!
//! Literals are classified once against the setting's [`DefaultTarget`]
//! into a [`DefaultValue`]; rendering then matches on that tag only. A
//! `true` literal is never accepted where an integer is expected, and an
//! integer is never accepted where a bool is expected.
//!
//! When any of `Windows`, `Linux` or `Android` is present the assignments
//! are wrapped in a platform `#if`/`#elif` chain. Unless all three are
//! present, an `#else` branch assigns `Default`.

use pal_settings_core::SettingsError;

use crate::enums::{EnumTable, ResolvedEnum};
use crate::expr::parse_int_literal;
use crate::model::{Defaults, Literal, Platform, Setting, SettingType};

/// Buffer-size constants for string settings.
pub const MAX_PATH_SIZE: &str = "DD_SETTINGS_MAX_PATH_SIZE";
pub const MAX_FILE_NAME_SIZE: &str = "DD_SETTINGS_MAX_FILE_NAME_SIZE";
pub const MAX_MISC_STRING_SIZE: &str = "DD_SETTINGS_MAX_MISC_STRING_SIZE";

/// What a setting's default must be compatible with.
#[derive(Debug, Clone, Copy)]
pub enum DefaultTarget<'a> {
    Bool,
    Int {
        signed: bool,
        bits: u32,
        hex: bool,
    },
    Float,
    Str {
        /// Name of the buffer-size constant.
        length: &'static str,
    },
    Enum(&'a ResolvedEnum),
    Bitmask {
        mask: &'a ResolvedEnum,
        bits: u32,
    },
}

impl<'a> DefaultTarget<'a> {
    /// Derive the target for a non-structure setting.
    ///
    /// # Errors
    ///
    /// `TypeMismatch` for a bitmask whose type is not an unsigned integer of
    /// the bitmask's width, `UnresolvedReference` for an unknown enum.
    pub fn for_setting(setting: &Setting, enums: &'a EnumTable) -> Result<Self, SettingsError> {
        let ty = setting.ty.ok_or_else(|| SettingsError::Schema {
            path: format!("/Settings/{}", setting.name),
            message: "setting has no Type".to_string(),
        })?;

        let lookup = |name: &str| {
            enums.get(name).ok_or_else(|| {
                SettingsError::UnresolvedReference(format!(
                    "setting \"{}\" refers to unknown enum \"{name}\"",
                    setting.name
                ))
            })
        };

        if ty == SettingType::Enum {
            let name = setting.enum_name().ok_or_else(|| {
                SettingsError::UnresolvedReference(format!(
                    "setting \"{}\" has Type enum but names no enum",
                    setting.name
                ))
            })?;
            return Ok(Self::Enum(lookup(name)?));
        }

        if setting.is_bitmask() {
            let bits = match ty.int_width() {
                Some((false, bits)) => bits,
                _ => {
                    return Err(SettingsError::type_mismatch(
                        &setting.name,
                        "uint8, uint16, uint32 or uint64 for a bitmask",
                        ty.as_str(),
                    ))
                }
            };
            return match setting.bitmask_name() {
                Some(name) => {
                    let mask = lookup(name)?;
                    if mask.size.bits() != bits {
                        return Err(SettingsError::type_mismatch(
                            &setting.name,
                            format!("uint{} to match bitmask {}", mask.size.bits(), mask.name),
                            ty.as_str(),
                        ));
                    }
                    Ok(Self::Bitmask { mask, bits })
                }
                None => Ok(Self::Int {
                    signed: false,
                    bits,
                    hex: true,
                }),
            };
        }

        Ok(match ty {
            SettingType::Bool => Self::Bool,
            SettingType::Float => Self::Float,
            SettingType::String => Self::Str {
                length: if setting.flags.is_dir {
                    MAX_PATH_SIZE
                } else if setting.flags.is_file {
                    MAX_FILE_NAME_SIZE
                } else {
                    MAX_MISC_STRING_SIZE
                },
            },
            SettingType::Struct => {
                return Err(SettingsError::Schema {
                    path: format!("/Settings/{}", setting.name),
                    message: "a struct-typed setting must carry a Structure".to_string(),
                })
            }
            int => match int.int_width() {
                Some((signed, bits)) => Self::Int {
                    signed,
                    bits,
                    hex: setting.flags.is_hex,
                },
                None => {
                    return Err(SettingsError::type_mismatch(
                        &setting.name,
                        "a scalar type",
                        int.as_str(),
                    ))
                }
            },
        })
    }

    /// C++ type of the member, before any `Optional` wrapping.
    pub fn variable_type(&self) -> String {
        match self {
            Self::Bool => "bool".to_string(),
            Self::Float => "float".to_string(),
            Self::Str { .. } => "char".to_string(),
            Self::Int { signed, bits, .. } => {
                format!("{}int{bits}_t", if *signed { "" } else { "u" })
            }
            Self::Enum(e) => e.name.clone(),
            Self::Bitmask { bits, .. } => format!("uint{bits}_t"),
        }
    }

    pub fn string_length(&self) -> Option<&'static str> {
        match self {
            Self::Str { length } => Some(length),
            _ => None,
        }
    }

    fn describe(&self) -> String {
        match self {
            Self::Bool => "bool".to_string(),
            Self::Int { signed, bits, .. } => {
                format!("{}int{bits} integer", if *signed { "" } else { "u" })
            }
            Self::Float => "float, or FLT_MAX/FLT_MIN".to_string(),
            Self::Str { .. } => "string".to_string(),
            Self::Enum(e) => format!("integer or member name of enum {}", e.name),
            Self::Bitmask { mask, .. } => {
                format!("integer or '|'-separated members of bitmask {}", mask.name)
            }
        }
    }
}

/// A classified default.
#[derive(Debug, Clone, PartialEq)]
pub enum DefaultValue {
    BoolLiteral(bool),
    IntLiteral { value: i128, hex: bool },
    FloatLiteral(f64),
    /// `FLT_MAX` or `FLT_MIN`.
    FloatSentinel(&'static str),
    StringLiteral(String),
    EnumMemberRef { qualified: String },
    EnumCast { enum_name: String, value: i128 },
    BitmaskExpr { value: i128, terms: Vec<String> },
}

impl DefaultValue {
    /// The C++ expression for this value. String literals are escaped but
    /// not quoted.
    pub fn to_cpp(&self) -> String {
        match self {
            Self::BoolLiteral(b) => b.to_string(),
            Self::IntLiteral { value, hex: true } | Self::BitmaskExpr { value, .. } => {
                format_hex(*value)
            }
            Self::IntLiteral { value, hex: false } => value.to_string(),
            Self::FloatLiteral(f) => format_float(*f),
            Self::FloatSentinel(s) => (*s).to_string(),
            Self::StringLiteral(s) => escape_string(s),
            Self::EnumMemberRef { qualified } => qualified.clone(),
            Self::EnumCast { enum_name, value } => format!("({enum_name}){value}"),
        }
    }
}

/// `0x5`, `-0x5`.
pub fn format_hex(value: i128) -> String {
    if value < 0 {
        format!("-0x{:x}", value.unsigned_abs())
    } else {
        format!("0x{value:x}")
    }
}

/// Positional notation, shortest round-trip digits, always a decimal point,
/// `f` suffix: `0.5f`, `3.0f`, `0.0001f`.
pub fn format_float(value: f64) -> String {
    let mut text = value.to_string();
    if !text.contains('.') {
        text.push_str(".0");
    }
    text.push('f');
    text
}

/// Escape for embedding inside a C++ string literal.
/// Other control characters become three-digit octal escapes.
pub fn escape_string(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if c.is_ascii_control() => out.push_str(&format!("\\{:03o}", c as u32)),
            c => out.push(c),
        }
    }
    out
}

fn int_range(signed: bool, bits: u32) -> (i128, i128) {
    if signed {
        (-(1i128 << (bits - 1)), (1i128 << (bits - 1)) - 1)
    } else {
        (0, (1i128 << bits) - 1)
    }
}

fn check_range(
    setting: &str,
    value: i128,
    signed: bool,
    bits: u32,
) -> Result<i128, SettingsError> {
    let (min, max) = int_range(signed, bits);
    if value < min || value > max {
        return Err(SettingsError::invalid_default(
            setting,
            format!(
                "{value} is out of range for {}int{bits}",
                if signed { "" } else { "u" }
            ),
        ));
    }
    Ok(value)
}

/// Classify one literal against its setting's target.
///
/// # Errors
///
/// `TypeMismatch` when the literal's kind is not accepted by the target,
/// `InvalidDefault` for an out-of-range or malformed value, and
/// `UnresolvedReference` for an unknown enum or bitmask member.
pub fn classify(
    setting: &str,
    target: &DefaultTarget<'_>,
    literal: &Literal,
) -> Result<DefaultValue, SettingsError> {
    let mismatch = || SettingsError::type_mismatch(setting, target.describe(), literal.kind());

    match (target, literal) {
        (DefaultTarget::Bool, Literal::Bool(b)) => Ok(DefaultValue::BoolLiteral(*b)),

        (DefaultTarget::Int { signed, bits, hex }, lit) => {
            let value = match lit {
                Literal::Int(_) | Literal::UInt(_) => lit.as_int(),
                Literal::Str(s) => Some(parse_int_literal(s).ok_or_else(|| {
                    SettingsError::invalid_default(setting, format!("\"{s}\" is not an integer"))
                })?),
                _ => None,
            }
            .ok_or_else(mismatch)?;
            Ok(DefaultValue::IntLiteral {
                value: check_range(setting, value, *signed, *bits)?,
                hex: *hex,
            })
        }

        (DefaultTarget::Float, Literal::Float(f)) => Ok(DefaultValue::FloatLiteral(*f)),
        (DefaultTarget::Float, Literal::Int(v)) => Ok(DefaultValue::FloatLiteral(*v as f64)),
        (DefaultTarget::Float, Literal::UInt(v)) => Ok(DefaultValue::FloatLiteral(*v as f64)),
        (DefaultTarget::Float, Literal::Str(s)) => match s.trim() {
            "FLT_MAX" => Ok(DefaultValue::FloatSentinel("FLT_MAX")),
            "FLT_MIN" => Ok(DefaultValue::FloatSentinel("FLT_MIN")),
            other => Err(SettingsError::invalid_default(
                setting,
                format!("\"{other}\" is not a float; only FLT_MAX and FLT_MIN are accepted as strings"),
            )),
        },

        (DefaultTarget::Str { .. }, Literal::Str(s)) => Ok(DefaultValue::StringLiteral(s.clone())),

        (DefaultTarget::Enum(decl), Literal::Str(s)) => {
            let s = s.trim();
            if s.contains("::") {
                return Ok(DefaultValue::EnumMemberRef {
                    qualified: s.to_string(),
                });
            }
            if decl.member(s).is_none() {
                return Err(SettingsError::UnresolvedReference(format!(
                    "default \"{s}\" of setting \"{setting}\" is not a member of enum \"{}\"",
                    decl.name
                )));
            }
            Ok(DefaultValue::EnumMemberRef {
                qualified: format!("{}::{s}", decl.name),
            })
        }
        (DefaultTarget::Enum(decl), Literal::Int(_) | Literal::UInt(_)) => {
            let value = literal.as_int().ok_or_else(mismatch)?;
            if value < 0 || value > decl.size.max() {
                return Err(SettingsError::invalid_default(
                    setting,
                    format!("{value} does not fit enum {} ({} bits)", decl.name, decl.size),
                ));
            }
            Ok(DefaultValue::EnumCast {
                enum_name: decl.name.clone(),
                value,
            })
        }

        (DefaultTarget::Bitmask { mask, bits }, Literal::Str(s)) => {
            let mut value = 0i128;
            let mut terms = Vec::new();
            for token in s.split('|').map(str::trim) {
                if token.is_empty() {
                    return Err(SettingsError::invalid_default(
                        setting,
                        format!("empty term in bitmask expression \"{s}\""),
                    ));
                }
                let member = token.rsplit_once("::").map_or(token, |(_, m)| m);
                let bit = parse_int_literal(member)
                    .or_else(|| mask.member(member))
                    .ok_or_else(|| {
                        SettingsError::UnresolvedReference(format!(
                            "\"{member}\" in default of setting \"{setting}\" is not a member of bitmask \"{}\"",
                            mask.name
                        ))
                    })?;
                value |= bit;
                terms.push(member.to_string());
            }
            Ok(DefaultValue::BitmaskExpr {
                value: check_range(setting, value, false, *bits)?,
                terms,
            })
        }
        (DefaultTarget::Bitmask { bits, .. }, Literal::Int(_) | Literal::UInt(_)) => {
            let value = literal.as_int().ok_or_else(mismatch)?;
            Ok(DefaultValue::IntLiteral {
                value: check_range(setting, value, false, *bits)?,
                hex: true,
            })
        }

        _ => Err(mismatch()),
    }
}

/// Platform guard macros, in `#if`/`#elif` order.
const PLATFORM_GUARDS: [(Platform, &str); 3] = [
    (Platform::Windows, "defined(_WIN32)"),
    (Platform::Linux, "defined(__unix__) && !defined(__ANDROID__)"),
    (Platform::Android, "defined(__ANDROID__)"),
];

/// Compile the `SetupDefaults()` statements for one setting.
///
/// `path` is the member path below `m_settings`, e.g. `maxFrames` or
/// `overlay.enabled`.
///
/// # Errors
///
/// Any [`classify`] error, or `InvalidDefault` when platform values are
/// given without a `Default` to fall back on.
pub fn compile(
    setting: &str,
    path: &str,
    target: &DefaultTarget<'_>,
    defaults: Option<&Defaults>,
) -> Result<String, SettingsError> {
    let Some(defaults) = defaults.filter(|d| !d.is_empty()) else {
        return Ok(match target {
            DefaultTarget::Str { .. } => format!("        m_settings.{path}[0] = '\\0';"),
            _ => format!("        m_settings.{path} = DevDriver::NullOpt;"),
        });
    };

    let line = |platform: Platform| -> Result<String, SettingsError> {
        let literal = defaults.get(platform).ok_or_else(|| {
            SettingsError::invalid_default(
                setting,
                format!("no {} value to fall back on", platform.as_str()),
            )
        })?;
        let value = classify(setting, target, literal)?;
        Ok(assign_line(path, target, &value))
    };

    let platforms: Vec<_> = PLATFORM_GUARDS
        .iter()
        .filter(|(p, _)| defaults.get(*p).is_some())
        .collect();

    if platforms.is_empty() {
        return line(Platform::Default);
    }

    let mut out = Vec::new();
    for (i, (platform, guard)) in platforms.iter().enumerate() {
        out.push(format!("{} {guard}", if i == 0 { "#if" } else { "#elif" }));
        out.push(line(*platform)?);
    }
    if platforms.len() < PLATFORM_GUARDS.len() {
        out.push("#else".to_string());
        out.push(line(Platform::Default)?);
    } else if let Some(literal) = defaults.get(Platform::Default) {
        classify(setting, target, literal)?;
    }
    out.push("#endif".to_string());
    Ok(out.join("\n"))
}

fn assign_line(path: &str, target: &DefaultTarget<'_>, value: &DefaultValue) -> String {
    let expr = value.to_cpp();
    match target {
        DefaultTarget::Str { length } => format!(
            "        static_assert({length} >= sizeof(\"{expr}\"), \"The string setting ({path}) length exceeds the max {length}.\");\n\
             \x20       strncpy(m_settings.{path}, \"{expr}\", {length} - 1);\n\
             \x20       m_settings.{path}[{length} - 1] = '\\0';"
        ),
        _ => format!("        m_settings.{path} = {expr};"),
    }
}
