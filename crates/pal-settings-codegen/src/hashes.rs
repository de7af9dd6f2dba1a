//! # Name Hashing Stage
//!
//! First pipeline stage after loading. Validates every setting name,
//! rejects duplicates, and assigns each hashed setting its 32-bit FNV-1a
//! `NameHash`:
//!
//! - a top-level setting hashes its own name;
//! - a structure field hashes `"<Structure>.<Field>"`;
//! - a structure's own name is not hashed.
//!
//! All hashes share one space. A collision between two distinct names is a
//! hard error; names are never altered to make a collision go away.

use std::collections::{HashMap, HashSet};

use pal_settings_core::{fnv1a_str, validate_settings_name, SettingsError};
use serde::Serialize;

use crate::model::{Setting, SettingsDocument};

/// A document whose every hashed setting carries its `NameHash`.
///
/// Only [`assign_name_hashes`] constructs one. It serializes exactly as the
/// inner document does.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct HashedDocument {
    doc: SettingsDocument,
}

impl HashedDocument {
    pub fn document(&self) -> &SettingsDocument {
        &self.doc
    }

    pub fn into_document(self) -> SettingsDocument {
        self.doc
    }

    /// The hash assigned to `setting`, which must belong to this document.
    pub fn hash_of(&self, setting: &Setting) -> Result<u32, SettingsError> {
        setting.name_hash.ok_or_else(|| SettingsError::Schema {
            path: setting.name.clone(),
            message: "setting carries no name hash".to_string(),
        })
    }
}

/// Assign `NameHash` to every hashed setting.
///
/// # Errors
///
/// `Naming` for an invalid name, `DuplicateName` for a repeated setting or
/// structure-field name, `HashCollision` when two distinct names hash alike.
pub fn assign_name_hashes(mut doc: SettingsDocument) -> Result<HashedDocument, SettingsError> {
    let mut names: HashSet<String> = HashSet::new();
    let mut hashes: HashMap<u32, String> = HashMap::new();

    for setting in &mut doc.settings {
        validate_settings_name(&setting.name)?;
        if !names.insert(setting.name.clone()) {
            return Err(SettingsError::DuplicateName(setting.name.clone()));
        }

        if setting.is_structure() {
            let mut fields: HashSet<String> = HashSet::new();
            let struct_name = setting.name.clone();
            for field in &mut setting.structure {
                validate_settings_name(&field.name)?;
                if !fields.insert(field.name.clone()) {
                    return Err(SettingsError::DuplicateName(format!(
                        "{struct_name}.{}",
                        field.name
                    )));
                }
                let full_name = format!("{struct_name}.{}", field.name);
                field.name_hash = Some(register(&mut hashes, full_name)?);
            }
        } else {
            setting.name_hash = Some(register(&mut hashes, setting.name.clone())?);
        }
    }

    tracing::debug!(count = hashes.len(), "assigned setting name hashes");
    Ok(HashedDocument { doc })
}

fn register(hashes: &mut HashMap<u32, String>, name: String) -> Result<u32, SettingsError> {
    let hash = fnv1a_str(&name);
    if let Some(first) = hashes.get(&hash) {
        return Err(SettingsError::HashCollision {
            first: first.clone(),
            second: name,
            hash,
        });
    }
    hashes.insert(hash, name);
    Ok(hash)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc(settings: serde_json::Value) -> SettingsDocument {
        SettingsDocument::from_value(json!({"ComponentName": "Test", "Settings": settings}))
            .unwrap()
    }

    #[test]
    fn top_level_hash_is_fnv1a_of_name() {
        let d = assign_name_hashes(doc(json!([{"Name": "MaxFrames", "Type": "uint32"}]))).unwrap();
        assert_eq!(d.document().settings[0].name_hash, Some(0x16E7_851B));
    }

    #[test]
    fn structure_fields_hash_dotted_name() {
        let d = assign_name_hashes(doc(json!([{
            "Name": "Struct", "Type": "struct",
            "Structure": [{"Name": "Field", "Type": "bool"}]
        }])))
        .unwrap();
        assert_eq!(d.document().settings[0].name_hash, None);
        assert_eq!(d.document().settings[0].structure[0].name_hash, Some(0x6717_A4BE));
    }

    #[test]
    fn duplicate_top_level_name_rejected() {
        let err = assign_name_hashes(doc(json!([
            {"Name": "Foo", "Type": "bool"},
            {"Name": "Foo", "Type": "uint32"}
        ])))
        .unwrap_err();
        assert!(matches!(err, SettingsError::DuplicateName(ref n) if n == "Foo"));
    }

    #[test]
    fn duplicate_structure_field_rejected() {
        let err = assign_name_hashes(doc(json!([{
            "Name": "S", "Type": "struct",
            "Structure": [{"Name": "F", "Type": "bool"}, {"Name": "F", "Type": "bool"}]
        }])))
        .unwrap_err();
        assert!(matches!(err, SettingsError::DuplicateName(ref n) if n == "S.F"));
    }

    #[test]
    fn same_field_name_in_two_structures_is_fine() {
        let d = assign_name_hashes(doc(json!([
            {"Name": "A", "Type": "struct", "Structure": [{"Name": "F", "Type": "bool"}]},
            {"Name": "B", "Type": "struct", "Structure": [{"Name": "F", "Type": "bool"}]}
        ])))
        .unwrap();
        assert_ne!(
            d.document().settings[0].structure[0].name_hash,
            d.document().settings[1].structure[0].name_hash
        );
    }

    #[test]
    fn structure_name_clashes_with_setting_name() {
        let err = assign_name_hashes(doc(json!([
            {"Name": "A", "Type": "bool"},
            {"Name": "A", "Type": "struct", "Structure": [{"Name": "F", "Type": "bool"}]}
        ])))
        .unwrap_err();
        assert!(matches!(err, SettingsError::DuplicateName(_)));
    }

    #[test]
    fn hash_collision_is_fatal() {
        // Both names hash to 0x9a46a78b.
        let err = assign_name_hashes(doc(json!([
            {"Name": "Setting132789", "Type": "bool"},
            {"Name": "Setting729192", "Type": "bool"}
        ])))
        .unwrap_err();
        match err {
            SettingsError::HashCollision { first, second, hash } => {
                assert_eq!(first, "Setting132789");
                assert_eq!(second, "Setting729192");
                assert_eq!(hash, 0x9a46_a78b);
            }
            other => panic!("Expected HashCollision, got: {other}"),
        }
    }

    #[test]
    fn invalid_name_rejected() {
        let err = assign_name_hashes(doc(json!([{"Name": "9Lives", "Type": "bool"}]))).unwrap_err();
        assert!(matches!(err, SettingsError::Naming(_)));
    }
}
