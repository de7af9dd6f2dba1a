//! # Legacy Document Migration
//!
//! Rewrites older settings documents into the current shape before schema
//! validation. Works on the raw JSON value because legacy documents do not
//! fit the typed model.
//!
//! Rewrites applied to every setting and structure field:
//!
//! - `WinDefault`/`LnxDefault`, at setting level or inside `Defaults`,
//!   become `Defaults.Windows`/`Defaults.Linux`;
//! - `Defaults.Type` moves up to the setting's `Type`;
//! - type aliases `uint`, `int` and `gpusize` become `uint32`, `int32` and
//!   `uint64`;
//! - `VariableName` and `HashName` are dropped, both are derived from `Name`;
//! - `Tags` mixing strings and `{Name, BuildTypes}` objects are reduced to
//!   names; the build types move to the root `TagFilters` map;
//! - an inline `ValidValues` definition without a `Name` gets one from a
//!   fixed table of known legacy settings. A setting missing from the table
//!   is an error;
//! - keys the current schema does not know are dropped.

use pal_settings_core::{validate_tag, SettingsError};
use serde_json::{Map, Value};

use crate::guard::join_macros;

/// Enum names for legacy inline `ValidValues` that were declared without one.
const VALID_VALUES_NAMES: &[(&str, &str)] = &[
    ("Ifh", "IfhMode"),
    ("EnableVmAlwaysValid", "VmAlwaysValidEnable"),
    ("CmdBufDumpMode", "CmdBufDumpMode"),
    ("CmdBufDumpFormat", "CmdBufDumpFormat"),
    ("CmdBufOptimizePm4", "Pm4OptEnable"),
    ("CmdBufOptimizePm4Mode", "Pm4OptMode"),
    ("CmdBufForceOneTimeSubmit", "CmdBufForceOneTimeSubmit"),
    ("TossPointMode", "TossPointMode"),
    ("DistributionTessMode", "DistributionTessMode"),
];

const TYPE_ALIASES: &[(&str, &str)] = &[("uint", "uint32"), ("int", "int32"), ("gpusize", "uint64")];

const ROOT_KEYS: &[&str] = &[
    "ComponentName",
    "Settings",
    "Enums",
    "Bitmasks",
    "Constants",
    "Tags",
    "TagFilters",
    "Namespaces",
    "IncludeHeaders",
    "IsEncoded",
    "SkipRegistry",
    "IsExperiments",
];

const SETTING_KEYS: &[&str] = &[
    "Name",
    "Description",
    "Tags",
    "Type",
    "Flags",
    "Scope",
    "Defaults",
    "ValidValues",
    "Enum",
    "Bitmask",
    "Structure",
    "Group",
    "BuildTypes",
    "OrBuildTypes",
    "BuildFilters",
];

const DEFAULTS_KEYS: &[&str] = &["Default", "Windows", "Linux", "Android"];

const VALID_VALUES_KEYS: &[&str] = &[
    "Name",
    "IsEnum",
    "Description",
    "Values",
    "EnumSize",
    "Is64Bit",
    "SkipGen",
];

const ENUM_VALUE_KEYS: &[&str] = &[
    "Name",
    "Value",
    "Description",
    "BuildTypes",
    "OrBuildTypes",
    "BuildFilters",
];

const FLAG_NAMES: &[&str] = &["IsHex", "IsBitmask", "IsDir", "IsFile", "ReadAfterOverride"];

/// Whether `doc` uses any legacy construct.
pub fn is_legacy(doc: &Value) -> bool {
    let Some(settings) = doc.get("Settings").and_then(Value::as_array) else {
        return false;
    };
    settings.iter().any(setting_is_legacy)
}

fn setting_is_legacy(setting: &Value) -> bool {
    let Some(obj) = setting.as_object() else {
        return false;
    };
    let legacy_defaults = obj.get("Defaults").and_then(Value::as_object).is_some_and(|d| {
        d.contains_key("WinDefault") || d.contains_key("LnxDefault") || d.contains_key("Type")
    });
    let legacy_type = obj
        .get("Type")
        .and_then(Value::as_str)
        .is_some_and(|t| TYPE_ALIASES.iter().any(|(alias, _)| *alias == t));
    let object_tags = obj
        .get("Tags")
        .and_then(Value::as_array)
        .is_some_and(|tags| tags.iter().any(Value::is_object));

    obj.contains_key("WinDefault")
        || obj.contains_key("LnxDefault")
        || obj.contains_key("VariableName")
        || obj.contains_key("HashName")
        || legacy_defaults
        || legacy_type
        || object_tags
        || obj
            .get("Structure")
            .and_then(Value::as_array)
            .is_some_and(|fields| fields.iter().any(setting_is_legacy))
}

/// Rewrite a legacy document into the current shape.
///
/// # Errors
///
/// `SettingsError::Migration` when the document cannot be rewritten:
/// a non-object root, a conflicting `Type`, an unmapped nameless
/// `ValidValues`, or a tag given two different filters. `Tag` for an
/// invalid tag name.
pub fn migrate(doc: Value) -> Result<Value, SettingsError> {
    let Value::Object(mut root) = doc else {
        return Err(SettingsError::Migration(
            "document root is not an object".to_string(),
        ));
    };

    let mut tags = Tags::from_root(&root);

    if let Some(Value::Array(settings)) = root.get_mut("Settings") {
        for setting in settings.iter_mut() {
            migrate_setting(setting, &mut tags)?;
        }
    }

    retain_known(&mut root, ROOT_KEYS, "document root");
    tags.store(&mut root);

    tracing::info!("migrated legacy settings document");
    Ok(Value::Object(root))
}

/// Tag names and filters gathered while migrating.
struct Tags {
    names: Vec<String>,
    filters: Map<String, Value>,
}

impl Tags {
    fn from_root(root: &Map<String, Value>) -> Self {
        let names = match root.get("Tags") {
            Some(Value::Array(items)) => items
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect(),
            _ => Vec::new(),
        };
        let filters = match root.get("TagFilters") {
            Some(Value::Object(map)) => map.clone(),
            _ => Map::new(),
        };
        Self { names, filters }
    }

    fn add(&mut self, name: &str, filter: Option<String>) -> Result<(), SettingsError> {
        validate_tag(name)?;
        if !self.names.iter().any(|n| n == name) {
            self.names.push(name.to_string());
        }
        if let Some(filter) = filter {
            match self.filters.get(name).and_then(Value::as_str) {
                Some(existing) if existing != filter => {
                    return Err(SettingsError::Migration(format!(
                        "tag \"{name}\" has conflicting filters \"{existing}\" and \"{filter}\""
                    )));
                }
                Some(_) => {}
                None => {
                    self.filters.insert(name.to_string(), Value::String(filter));
                }
            }
        }
        Ok(())
    }

    fn store(self, root: &mut Map<String, Value>) {
        if !self.names.is_empty() {
            root.insert(
                "Tags".to_string(),
                Value::Array(self.names.into_iter().map(Value::String).collect()),
            );
        }
        if !self.filters.is_empty() {
            root.insert("TagFilters".to_string(), Value::Object(self.filters));
        }
    }
}

fn migrate_setting(setting: &mut Value, tags: &mut Tags) -> Result<(), SettingsError> {
    let Value::Object(obj) = setting else {
        return Ok(());
    };
    let name = obj
        .get("Name")
        .and_then(Value::as_str)
        .unwrap_or("<unnamed>")
        .to_string();

    migrate_defaults(obj, &name)?;

    if let Some(Value::String(ty)) = obj.get_mut("Type") {
        if let Some((_, current)) = TYPE_ALIASES.iter().find(|(alias, _)| *alias == ty.as_str()) {
            tracing::debug!(setting = %name, from = %ty, to = *current, "renamed legacy type");
            *ty = (*current).to_string();
        }
    }

    if obj.remove("VariableName").is_some() {
        tracing::debug!(setting = %name, "dropped VariableName, it is derived from Name");
    }
    if obj.remove("HashName").is_some() {
        tracing::warn!(setting = %name, "ignoring HashName, the name hash is computed from Name");
    }

    if let Some(Value::Array(items)) = obj.get_mut("Tags") {
        let mut compact = Vec::with_capacity(items.len());
        for item in items.iter() {
            match item {
                Value::String(tag) => {
                    tags.add(tag, None)?;
                    compact.push(Value::String(tag.clone()));
                }
                Value::Object(tag) => {
                    let tag_name = tag.get("Name").and_then(Value::as_str).ok_or_else(|| {
                        SettingsError::Migration(format!("setting \"{name}\" has a tag without Name"))
                    })?;
                    let build_types: Vec<String> = tag
                        .get("BuildTypes")
                        .and_then(Value::as_array)
                        .map(|types| {
                            types
                                .iter()
                                .filter_map(Value::as_str)
                                .map(str::to_string)
                                .collect()
                        })
                        .unwrap_or_default();
                    let filter =
                        (!build_types.is_empty()).then(|| join_macros(&build_types, " && "));
                    tags.add(tag_name, filter)?;
                    compact.push(Value::String(tag_name.to_string()));
                }
                other => {
                    return Err(SettingsError::Migration(format!(
                        "setting \"{name}\" has a tag that is neither a string nor an object: {other}"
                    )))
                }
            }
        }
        *items = compact;
    }

    if let Some(Value::Object(valid_values)) = obj.get_mut("ValidValues") {
        migrate_valid_values(valid_values, &name)?;
    }

    if let Some(flags) = obj.get_mut("Flags") {
        retain_known_flags(flags, &name);
    }

    if let Some(Value::Array(fields)) = obj.get_mut("Structure") {
        for field in fields.iter_mut() {
            migrate_setting(field, tags)?;
        }
    }

    retain_known(obj, SETTING_KEYS, &name);
    Ok(())
}

fn migrate_defaults(obj: &mut Map<String, Value>, name: &str) -> Result<(), SettingsError> {
    let mut defaults = match obj.remove("Defaults") {
        Some(Value::Object(map)) => map,
        Some(other) => {
            return Err(SettingsError::Migration(format!(
                "setting \"{name}\" has non-object Defaults: {other}"
            )))
        }
        None => Map::new(),
    };

    for (legacy, current) in [("WinDefault", "Windows"), ("LnxDefault", "Linux")] {
        for value in [obj.remove(legacy), defaults.remove(legacy)].into_iter().flatten() {
            defaults.insert(current.to_string(), value);
        }
    }

    if let Some(ty) = defaults.remove("Type") {
        match obj.get("Type") {
            Some(existing) if *existing != ty => {
                return Err(SettingsError::Migration(format!(
                    "setting \"{name}\" declares Type {existing} but Defaults.Type {ty}"
                )));
            }
            Some(_) => {}
            None => {
                obj.insert("Type".to_string(), ty);
            }
        }
    }

    retain_known(&mut defaults, DEFAULTS_KEYS, name);
    if !defaults.is_empty() {
        obj.insert("Defaults".to_string(), Value::Object(defaults));
    }
    Ok(())
}

fn migrate_valid_values(vv: &mut Map<String, Value>, setting: &str) -> Result<(), SettingsError> {
    let has_values = vv
        .get("Values")
        .and_then(Value::as_array)
        .is_some_and(|v| !v.is_empty());
    if has_values && !vv.contains_key("Name") {
        let enum_name = VALID_VALUES_NAMES
            .iter()
            .find(|(legacy, _)| *legacy == setting)
            .map(|(_, enum_name)| *enum_name)
            .ok_or_else(|| {
                SettingsError::Migration(format!(
                    "ValidValues of setting \"{setting}\" has no Name and no known replacement"
                ))
            })?;
        tracing::warn!(
            setting,
            enum_name,
            "ValidValues has no Name, using the known legacy enum name"
        );
        vv.insert("Name".to_string(), Value::String(enum_name.to_string()));
    }

    if let Some(Value::Array(values)) = vv.get_mut("Values") {
        for value in values.iter_mut().filter_map(Value::as_object_mut) {
            retain_known(value, ENUM_VALUE_KEYS, setting);
        }
    }
    retain_known(vv, VALID_VALUES_KEYS, setting);
    Ok(())
}

fn retain_known_flags(flags: &mut Value, setting: &str) {
    let known = |name: &str| {
        let ok = FLAG_NAMES.contains(&name);
        if !ok {
            tracing::debug!(setting, flag = name, "dropped unknown legacy flag");
        }
        ok
    };
    match flags {
        Value::Object(map) => map.retain(|k, _| known(k)),
        Value::Array(items) => items.retain(|item| item.as_str().is_some_and(|s| known(s))),
        _ => {}
    }
}

fn retain_known(map: &mut Map<String, Value>, known: &[&str], owner: &str) {
    map.retain(|key, _| {
        let ok = known.contains(&key.as_str());
        if !ok {
            tracing::debug!(owner, key = %key, "dropped key unknown to the current schema");
        }
        ok
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn current_documents_are_not_legacy() {
        let doc = json!({"ComponentName": "X", "Settings": [
            {"Name": "A", "Type": "uint32", "Defaults": {"Default": 1, "Windows": 2}, "Tags": ["T"]}
        ]});
        assert!(!is_legacy(&doc));
    }

    #[test]
    fn legacy_markers_are_detected() {
        for setting in [
            json!({"Name": "A", "WinDefault": 1}),
            json!({"Name": "A", "Defaults": {"LnxDefault": 1}}),
            json!({"Name": "A", "Defaults": {"Type": "bool"}}),
            json!({"Name": "A", "Type": "gpusize"}),
            json!({"Name": "A", "VariableName": "a"}),
            json!({"Name": "A", "HashName": "#123"}),
            json!({"Name": "A", "Tags": ["T", {"Name": "U", "BuildTypes": ["X"]}]}),
            json!({"Name": "S", "Structure": [{"Name": "F", "WinDefault": 1}]}),
        ] {
            let doc = json!({"ComponentName": "X", "Settings": [setting]});
            assert!(is_legacy(&doc), "{doc}");
        }
    }

    #[test]
    fn platform_defaults_and_type_are_rewritten() {
        let out = migrate(json!({"ComponentName": "X", "Settings": [{
            "Name": "MaxFrames",
            "VariableName": "maxFrames",
            "Defaults": {"Default": 5, "WinDefault": 6, "Type": "uint"},
            "LnxDefault": 7
        }]}))
        .unwrap();
        assert_eq!(
            out["Settings"][0],
            json!({
                "Name": "MaxFrames",
                "Type": "uint32",
                "Defaults": {"Default": 5, "Windows": 6, "Linux": 7}
            })
        );
    }

    #[test]
    fn conflicting_type_is_an_error() {
        let err = migrate(json!({"ComponentName": "X", "Settings": [{
            "Name": "A", "Type": "bool", "Defaults": {"Default": 1, "Type": "uint32"}
        }]}))
        .unwrap_err();
        assert!(matches!(err, SettingsError::Migration(_)));
    }

    #[test]
    fn mixed_tags_are_compacted_into_filters() {
        let out = migrate(json!({"ComponentName": "X", "Settings": [
            {"Name": "A", "Type": "bool", "Tags": ["Debug", {"Name": "Perf", "BuildTypes": ["PAL_A", "PAL_B"]}]},
            {"Name": "B", "Type": "bool", "Tags": [{"Name": "Perf", "BuildTypes": ["PAL_A", "PAL_B"]}]}
        ]}))
        .unwrap();
        assert_eq!(out["Settings"][0]["Tags"], json!(["Debug", "Perf"]));
        assert_eq!(out["Settings"][1]["Tags"], json!(["Perf"]));
        assert_eq!(out["Tags"], json!(["Debug", "Perf"]));
        assert_eq!(out["TagFilters"], json!({"Perf": "#if PAL_A && PAL_B"}));
    }

    #[test]
    fn conflicting_tag_filters_are_an_error() {
        let err = migrate(json!({"ComponentName": "X", "Settings": [
            {"Name": "A", "Tags": [{"Name": "Perf", "BuildTypes": ["PAL_A"]}]},
            {"Name": "B", "Tags": [{"Name": "Perf", "BuildTypes": ["PAL_B"]}]}
        ]}))
        .unwrap_err();
        assert!(err.to_string().contains("conflicting filters"));
    }

    #[test]
    fn invalid_tag_is_rejected() {
        let err = migrate(json!({"ComponentName": "X", "Settings": [
            {"Name": "A", "Tags": ["9lives"]}
        ]}))
        .unwrap_err();
        assert!(matches!(err, SettingsError::Tag(_)));
    }

    #[test]
    fn nameless_valid_values_take_the_known_name() {
        let out = migrate(json!({"ComponentName": "X", "Settings": [{
            "Name": "Ifh", "Type": "enum",
            "ValidValues": {"IsEnum": true, "Values": [{"Name": "IfhModeDisabled", "Value": 0, "Legacy": 1}]}
        }]}))
        .unwrap();
        assert_eq!(out["Settings"][0]["ValidValues"]["Name"], "IfhMode");
        assert_eq!(
            out["Settings"][0]["ValidValues"]["Values"][0],
            json!({"Name": "IfhModeDisabled", "Value": 0})
        );
    }

    #[test]
    fn unmapped_nameless_valid_values_is_an_error() {
        let err = migrate(json!({"ComponentName": "X", "Settings": [{
            "Name": "SomethingNew", "Type": "enum",
            "ValidValues": {"Values": [{"Name": "A"}]}
        }]}))
        .unwrap_err();
        assert!(err.to_string().contains("SomethingNew"));
    }

    #[test]
    fn unknown_keys_and_flags_are_dropped() {
        let out = migrate(json!({
            "ComponentName": "X",
            "Version": 1,
            "Settings": [{
                "Name": "A", "Type": "int", "Flags": {"IsHex": true, "IsPublic": true},
                "Size": 4, "Defaults": {"Default": 1, "Comment": "x"}
            }, {
                "Name": "B", "Type": "uint", "Flags": ["IsBitmask", "Obsolete"]
            }]
        }))
        .unwrap();
        assert!(out.get("Version").is_none());
        assert_eq!(
            out["Settings"][0],
            json!({"Name": "A", "Type": "int32", "Flags": {"IsHex": true}, "Defaults": {"Default": 1}})
        );
        assert_eq!(out["Settings"][1]["Flags"], json!(["IsBitmask"]));
    }

    #[test]
    fn structure_fields_are_migrated() {
        let out = migrate(json!({"ComponentName": "X", "Settings": [{
            "Name": "S", "Type": "struct",
            "Structure": [{"Name": "F", "Defaults": {"Default": 1, "LnxDefault": 2, "Type": "gpusize"}}]
        }]}))
        .unwrap();
        assert_eq!(
            out["Settings"][0]["Structure"][0],
            json!({"Name": "F", "Type": "uint64", "Defaults": {"Default": 1, "Linux": 2}})
        );
    }

    #[test]
    fn non_object_root_is_an_error() {
        assert!(matches!(migrate(json!([1, 2])), Err(SettingsError::Migration(_))));
    }
}
