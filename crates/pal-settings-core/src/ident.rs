//! # Identifiers — Names, Tags, and Generated Variable Names
//!
//! Setting names become C++ member names, enum names become C++ type names,
//! and tags end up in string tables. Everything here is validated before
//! any code is generated so that the emitted sources always compile.
//!
//! ## Variable names
//!
//! [`gen_variable_name`] folds every maximal run of ASCII capitals in a
//! declared name:
//!
//! - A leading run followed by a lowercase letter keeps its last capital as
//!   the start of the next word (`RISSharpness` -> `risSharpness`).
//! - A leading run that ends the name, or is followed by a digit or
//!   underscore, is lowercased entirely (`TFQ` -> `tfq`).
//! - An interior run keeps its first capital, lowercases the middle, and
//!   keeps its last capital when a lowercase letter follows
//!   (`VpeForceTFCalculation` -> `vpeForceTfCalculation`,
//!   `EnableLLPC` -> `enableLlpc`).

use crate::error::SettingsError;

/// Maximum length of a tag string.
pub const MAX_TAG_LEN: usize = 40;

/// Derive the camelCase C++ variable name for a declared setting name.
///
/// Assumes `name` already passed [`validate_settings_name`].
pub fn gen_variable_name(name: &str) -> String {
    let chars: Vec<char> = name.chars().collect();
    let mut out = String::with_capacity(name.len());
    let mut i = 0;

    while i < chars.len() {
        if !chars[i].is_ascii_uppercase() {
            out.push(chars[i]);
            i += 1;
            continue;
        }

        let start = i;
        while i < chars.len() && chars[i].is_ascii_uppercase() {
            i += 1;
        }
        let run = &chars[start..i];
        let lower_follows = chars.get(i).is_some_and(|c| c.is_ascii_lowercase());

        if start == 0 {
            fold_leading_run(run, lower_follows, &mut out);
        } else {
            fold_interior_run(run, lower_follows, &mut out);
        }
    }

    out
}

fn fold_leading_run(run: &[char], lower_follows: bool, out: &mut String) {
    if lower_follows && run.len() > 1 {
        let (head, last) = run.split_at(run.len() - 1);
        out.extend(head.iter().map(|c| c.to_ascii_lowercase()));
        out.push(last[0]);
    } else {
        out.extend(run.iter().map(|c| c.to_ascii_lowercase()));
    }
}

fn fold_interior_run(run: &[char], lower_follows: bool, out: &mut String) {
    out.push(run[0]);
    if run.len() == 1 {
        return;
    }
    if lower_follows {
        let middle = &run[1..run.len() - 1];
        out.extend(middle.iter().map(|c| c.to_ascii_lowercase()));
        out.push(run[run.len() - 1]);
    } else {
        out.extend(run[1..].iter().map(|c| c.to_ascii_lowercase()));
    }
}

/// Lowercase only the first character (`ComponentNameLower`, `GroupVariableName`).
pub fn lower_first(name: &str) -> String {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) => first.to_lowercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Validate a setting, structure, group, or component name.
///
/// A name must start with an alphabetic letter and may only contain
/// alphanumeric characters plus underscore.
pub fn validate_settings_name(name: &str) -> Result<(), SettingsError> {
    let first = name
        .chars()
        .next()
        .ok_or_else(|| SettingsError::Naming("empty name".to_string()))?;
    if !first.is_alphabetic() {
        return Err(SettingsError::Naming(format!(
            "\"{name}\" does not start with an alphabetic letter"
        )));
    }
    if !name.chars().filter(|&c| c != '_').all(char::is_alphanumeric) {
        return Err(SettingsError::Naming(format!(
            "\"{name}\" contains character(s) other than alphanumeric and underscore"
        )));
    }
    Ok(())
}

/// Validate an enum or bitmask name: a settings name that starts upper-case.
pub fn validate_enum_name(name: &str) -> Result<(), SettingsError> {
    validate_settings_name(name)?;
    if !name.starts_with(|c: char| c.is_uppercase()) {
        return Err(SettingsError::Naming(format!(
            "enum name \"{name}\" must start with an upper-case alphabetic letter"
        )));
    }
    Ok(())
}

/// Validate a tag string.
///
/// At most [`MAX_TAG_LEN`] characters, starting with a letter, no trailing
/// space, and only alphanumerics, underscores, dashes, and spaces.
pub fn validate_tag(tag: &str) -> Result<(), SettingsError> {
    if tag.chars().count() > MAX_TAG_LEN {
        return Err(SettingsError::Tag(format!(
            "\"{tag}\" exceeds the maximum length ({MAX_TAG_LEN})"
        )));
    }
    if !tag.starts_with(|c: char| c.is_alphabetic()) {
        return Err(SettingsError::Tag(format!(
            "\"{tag}\" does not start with an alphabetic letter"
        )));
    }
    if tag.ends_with(' ') {
        return Err(SettingsError::Tag(format!("\"{tag}\" has trailing space(s)")));
    }
    if !tag
        .chars()
        .filter(|c| !matches!(c, '_' | '-' | ' '))
        .all(char::is_alphanumeric)
    {
        return Err(SettingsError::Tag(format!(
            "\"{tag}\" contains character(s) other than alphanumeric, underscores, dashes, and spaces"
        )));
    }
    Ok(())
}
