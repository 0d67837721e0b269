//! Compound-uniqueness rules for list elements.
//!
//! A registry maps a collection name (the mapping key that holds a sequence)
//! to the key-sets whose joint values identify an element of that collection.
//! Two elements agreeing on every field of any one key-set are the same
//! logical element, however much the rest of their fields differ.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{RegistryError, RegistryResult};

/// An ordered list of field names that jointly identify an element.
pub type KeySet = Vec<String>;

/// Collections and key-sets shipped with the tool.
const BUILTIN: &[(&str, &[&[&str]])] = &[
    ("CFG_ATTR", &[&["ATTR_CODE"]]),
    ("CFG_CFBOM", &[&["CFCALL_ID", "FTYPE_ID", "FELEM_ID"]]),
    ("CFG_CFCALL", &[&["CFCALL_ID"], &["FTYPE_ID", "CFUNC_ID"]]),
    ("CFG_CFRTN", &[&["CFRTN_ID"], &["CFUNC_ID", "CFUNC_RTNVAL"]]),
    ("CFG_CFUNC", &[&["CFUNC_ID"], &["CFUNC_CODE"]]),
    ("CFG_DFBOM", &[&["DFCALL_ID", "FTYPE_ID", "FELEM_ID"]]),
    ("CFG_DFCALL", &[&["DFCALL_ID"]]),
    ("CFG_DFUNC", &[&["DFUNC_ID"], &["DFUNC_CODE"]]),
    ("CFG_DSRC", &[&["DSRC_ID"], &["DSRC_CODE"]]),
    ("CFG_EBOM", &[&["ETYPE_ID", "EXEC_ORDER"]]),
    ("CFG_ECLASS", &[&["ECLASS_ID"], &["ECLASS_CODE"]]),
    ("CFG_EFBOM", &[&["EFCALL_ID", "FTYPE_ID", "FELEM_ID"]]),
    ("CFG_EFCALL", &[&["EFCALL_ID"]]),
    ("CFG_EFUNC", &[&["EFUNC_ID"], &["EFUNC_CODE"]]),
    ("CFG_ERFRAG", &[&["ERFRAG_ID"], &["ERFRAG_CODE"]]),
    ("CFG_ERRULE", &[&["ERRULE_ID"], &["ERRULE_CODE"]]),
    ("CFG_ESCORE", &[&["BEHAVIOR_CODE"]]),
    ("CFG_ETYPE", &[&["ETYPE_ID"], &["ETYPE_CODE"]]),
    ("CFG_FBOM", &[&["FTYPE_ID", "FELEM_ID"]]),
    ("CFG_FBOVR", &[&["FTYPE_ID", "ECLASS_ID", "UTYPE_CODE"]]),
    ("CFG_FCLASS", &[&["FCLASS_ID"], &["FCLASS_CODE"]]),
    ("CFG_FELEM", &[&["FELEM_ID"], &["FELEM_CODE"]]),
    ("CFG_FTYPE", &[&["FTYPE_ID"], &["FTYPE_CODE"]]),
    ("CFG_GENERIC_THRESHOLD", &[&["GPLAN_ID", "BEHAVIOR", "FTYPE_ID"]]),
    ("CFG_GPLAN", &[&["GPLAN_ID"], &["GPLAN_CODE"]]),
    ("CFG_LENS", &[&["LENS_ID"], &["LENS_CODE"]]),
    ("CFG_RCLASS", &[&["RCLASS_ID"], &["RCLASS_CODE"]]),
    ("CFG_RTYPE", &[&["RTYPE_ID"], &["RTYPE_CODE"]]),
    ("CFG_SFCALL", &[&["SFCALL_ID"], &["FTYPE_ID", "SFUNC_ID"]]),
    ("CFG_SFUNC", &[&["SFUNC_ID"], &["SFUNC_CODE"]]),
    ("COMPATIBILITY_VERSION", &[]),
    (
        "SYS_OOM",
        &[&["OOM_TYPE", "OOM_LEVEL", "LENS_ID", "LIB_FEAT_ID", "FELEM_ID", "LIB_FELEM_ID"]],
    ),
];

/// Immutable table of collection name → key-sets.
///
/// Serializes as a plain JSON/TOML table, e.g.
/// `{"CFG_DSRC": [["DSRC_ID"], ["DSRC_CODE"]]}`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(
    try_from = "BTreeMap<String, Vec<KeySet>>",
    into = "BTreeMap<String, Vec<KeySet>>"
)]
pub struct UniqueKeyRegistry {
    entries: BTreeMap<String, Vec<KeySet>>,
}

impl UniqueKeyRegistry {
    /// Build a registry, rejecting key-sets without fields.
    pub fn new(entries: BTreeMap<String, Vec<KeySet>>) -> RegistryResult<Self> {
        for (collection, key_sets) in &entries {
            if key_sets.iter().any(|set| set.is_empty()) {
                return Err(RegistryError::EmptyKeySet {
                    collection: collection.clone(),
                });
            }
        }
        Ok(Self { entries })
    }

    /// The built-in rules for the standard configuration document.
    pub fn builtin() -> Self {
        let entries = BUILTIN
            .iter()
            .map(|(collection, key_sets)| {
                let key_sets: Vec<KeySet> = key_sets
                    .iter()
                    .map(|set| set.iter().map(|field| field.to_string()).collect())
                    .collect();
                (collection.to_string(), key_sets)
            })
            .collect();
        Self { entries }
    }

    /// Replace entries with those of `overrides`, collection by collection.
    pub fn with_overrides(mut self, overrides: UniqueKeyRegistry) -> Self {
        self.entries.extend(overrides.entries);
        self
    }

    /// The key-sets registered for a collection, if any.
    pub fn key_sets(&self, collection: &str) -> Option<&[KeySet]> {
        self.entries.get(collection).map(Vec::as_slice)
    }

    /// Whether the collection has an entry (possibly with no key-sets).
    pub fn contains(&self, collection: &str) -> bool {
        self.entries.contains_key(collection)
    }

    /// Number of registered collections.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if no collection is registered.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Whether `needle` is already represented in `haystack` under the rules
    /// for `collection`.
    ///
    /// Succeeds when, for some key-set, a haystack element agrees with the
    /// needle on every field of the set. A field missing from both elements
    /// counts as agreement. Unregistered collections and non-object elements
    /// never match.
    pub fn keyed_needle_in_haystack(
        &self,
        collection: &str,
        needle: &Value,
        haystack: &[Value],
    ) -> bool {
        let Some(key_sets) = self.entries.get(collection) else {
            return false;
        };
        let Value::Object(needle) = needle else {
            return false;
        };

        key_sets.iter().any(|key_set| {
            haystack.iter().any(|candidate| match candidate {
                Value::Object(candidate) => key_set
                    .iter()
                    .all(|field| needle.get(field) == candidate.get(field)),
                _ => false,
            })
        })
    }
}

impl TryFrom<BTreeMap<String, Vec<KeySet>>> for UniqueKeyRegistry {
    type Error = RegistryError;

    fn try_from(entries: BTreeMap<String, Vec<KeySet>>) -> RegistryResult<Self> {
        Self::new(entries)
    }
}

impl From<UniqueKeyRegistry> for BTreeMap<String, Vec<KeySet>> {
    fn from(registry: UniqueKeyRegistry) -> Self {
        registry.entries
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn registry(pairs: &[(&str, &[&[&str]])]) -> UniqueKeyRegistry {
        let entries = pairs
            .iter()
            .map(|(name, sets)| {
                let sets: Vec<KeySet> = sets
                    .iter()
                    .map(|s| s.iter().map(|f| f.to_string()).collect())
                    .collect();
                (name.to_string(), sets)
            })
            .collect();
        UniqueKeyRegistry::new(entries).unwrap()
    }

    #[test]
    fn builtin_has_standard_collections() {
        let reg = UniqueKeyRegistry::builtin();
        assert_eq!(reg.len(), BUILTIN.len());
        assert_eq!(
            reg.key_sets("CFG_DSRC").unwrap(),
            &[vec!["DSRC_ID".to_string()], vec!["DSRC_CODE".to_string()]]
        );
        assert!(reg.contains("COMPATIBILITY_VERSION"));
        assert!(reg.key_sets("COMPATIBILITY_VERSION").unwrap().is_empty());
        assert!(reg.key_sets("NOT_A_TABLE").is_none());
    }

    #[test]
    fn match_on_any_key_set() {
        let reg = UniqueKeyRegistry::builtin();
        let haystack = vec![json!({"DSRC_ID": 1, "DSRC_CODE": "X", "DSRC_DESC": "old"})];

        // Same code, different id: matches on the second key-set.
        let needle = json!({"DSRC_ID": 99, "DSRC_CODE": "X", "DSRC_DESC": "new"});
        assert!(reg.keyed_needle_in_haystack("CFG_DSRC", &needle, &haystack));

        // Same id, different code: matches on the first key-set.
        let needle = json!({"DSRC_ID": 1, "DSRC_CODE": "Z"});
        assert!(reg.keyed_needle_in_haystack("CFG_DSRC", &needle, &haystack));

        let needle = json!({"DSRC_ID": 2, "DSRC_CODE": "Y"});
        assert!(!reg.keyed_needle_in_haystack("CFG_DSRC", &needle, &haystack));
    }

    #[test]
    fn compound_key_requires_every_field() {
        let reg = registry(&[("CFG_FBOM", &[&["FTYPE_ID", "FELEM_ID"]])]);
        let haystack = vec![json!({"FTYPE_ID": 1, "FELEM_ID": 2, "EXEC_ORDER": 1})];

        assert!(reg.keyed_needle_in_haystack(
            "CFG_FBOM",
            &json!({"FTYPE_ID": 1, "FELEM_ID": 2, "EXEC_ORDER": 7}),
            &haystack
        ));
        assert!(!reg.keyed_needle_in_haystack(
            "CFG_FBOM",
            &json!({"FTYPE_ID": 1, "FELEM_ID": 3}),
            &haystack
        ));
    }

    #[test]
    fn field_absent_on_both_sides_agrees() {
        let reg = registry(&[("CFG_EBOM", &[&["ETYPE_ID", "EXEC_ORDER"]])]);
        let haystack = vec![json!({"ETYPE_ID": 1, "FTYPE_ID": 10})];
        let needle = json!({"ETYPE_ID": 1, "FTYPE_ID": 20});
        assert!(reg.keyed_needle_in_haystack("CFG_EBOM", &needle, &haystack));

        // Absent on one side only is a disagreement.
        let needle = json!({"ETYPE_ID": 1, "EXEC_ORDER": 3});
        assert!(!reg.keyed_needle_in_haystack("CFG_EBOM", &needle, &haystack));
    }

    #[test]
    fn unregistered_and_identity_only_never_match() {
        let reg = UniqueKeyRegistry::builtin();
        let haystack = vec![json!({"VERSION": "1"})];
        let needle = json!({"VERSION": "1"});
        assert!(!reg.keyed_needle_in_haystack("UNKNOWN", &needle, &haystack));
        assert!(!reg.keyed_needle_in_haystack("COMPATIBILITY_VERSION", &needle, &haystack));
    }

    #[test]
    fn scalar_elements_never_match_by_key() {
        let reg = UniqueKeyRegistry::builtin();
        let haystack = vec![json!("a"), json!({"DSRC_CODE": "X"})];
        assert!(!reg.keyed_needle_in_haystack("CFG_DSRC", &json!("b"), &haystack));
    }

    #[test]
    fn empty_key_set_rejected() {
        let mut entries = BTreeMap::new();
        entries.insert("CFG_X".to_string(), vec![vec![]]);
        assert!(matches!(
            UniqueKeyRegistry::new(entries),
            Err(RegistryError::EmptyKeySet { collection }) if collection == "CFG_X"
        ));

        let parsed: Result<UniqueKeyRegistry, _> =
            serde_json::from_value(json!({"CFG_X": [[]]}));
        assert!(parsed.is_err());
    }

    #[test]
    fn overrides_replace_per_collection() {
        let overrides: UniqueKeyRegistry = serde_json::from_value(json!({
            "CFG_DSRC": [["DSRC_CODE"]],
            "CFG_CUSTOM": [["CUSTOM_ID"]]
        }))
        .unwrap();
        let reg = UniqueKeyRegistry::builtin().with_overrides(overrides);

        assert_eq!(reg.key_sets("CFG_DSRC").unwrap().len(), 1);
        assert!(reg.contains("CFG_CUSTOM"));
        assert!(reg.contains("CFG_ETYPE"));
        assert_eq!(reg.len(), BUILTIN.len() + 1);
    }

    #[test]
    fn serde_round_trip_is_plain_table() {
        let reg = registry(&[("CFG_DSRC", &[&["DSRC_CODE"]])]);
        let value = serde_json::to_value(&reg).unwrap();
        assert_eq!(value, json!({"CFG_DSRC": [["DSRC_CODE"]]}));
    }
}
