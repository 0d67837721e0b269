//! The merge policies.
//!
//! Every policy borrows its inputs and returns a fresh document, so one
//! engine can be shared freely and no caller ever observes its arguments
//! changing underneath it.

use serde_json::{Map, Value};
use tracing::debug;

use crate::error::{MergeError, MergeResult, Shape};
use crate::registry::UniqueKeyRegistry;

/// Section of the configuration document that holds the collections.
pub const G2_CONFIG_SECTION: &str = "G2_CONFIG";

/// Collections carried over by [`MergeEngine::graft`] for `add-dsrc-etype`.
pub const DSRC_ETYPE_COLLECTIONS: [&str; 2] = ["CFG_DSRC", "CFG_ETYPE"];

/// A named way of combining an original document with an update.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MergePolicy {
    /// Enrich `update` with keys only `original` defines.
    AddMissingKeys,
    /// Append structurally new list elements; overwrite scalars.
    AddListElements,
    /// Append list elements that are new under the registry; keep scalars.
    AddListUniqueElements,
    /// `original - update`, structurally.
    Difference,
}

/// How list elements and scalars from the update are folded in.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Fold {
    /// Structural dedup only; update scalars win.
    Plain,
    /// Structural and registry dedup; existing scalars win.
    Unique,
}

/// Merge engine bound to one set of uniqueness rules.
#[derive(Clone, Debug, Default)]
pub struct MergeEngine {
    registry: UniqueKeyRegistry,
}

impl MergeEngine {
    /// Create an engine using `registry` for keyed list membership.
    pub fn new(registry: UniqueKeyRegistry) -> Self {
        Self { registry }
    }

    /// The rules this engine was built with.
    pub fn registry(&self) -> &UniqueKeyRegistry {
        &self.registry
    }

    /// Apply `policy` to the two documents.
    pub fn merge(&self, policy: MergePolicy, original: &Value, update: &Value) -> MergeResult<Value> {
        match policy {
            MergePolicy::AddMissingKeys => self.add_missing_keys(original, update),
            MergePolicy::AddListElements => self.add_list_elements(original, update),
            MergePolicy::AddListUniqueElements => self.add_list_unique_elements(original, update),
            MergePolicy::Difference => self.difference(original, update),
        }
    }

    /// Return `update` enriched with every key of `original` it lacks.
    ///
    /// Nested mappings are merged key by key; a leaf from `original` is only
    /// used where `update` has no value for that key.
    pub fn add_missing_keys(&self, original: &Value, update: &Value) -> MergeResult<Value> {
        let original = root(original)?;
        let update = root(update)?;
        add_missing_keys_map(original, update, "").map(Value::Object)
    }

    /// Return `original` with list elements and scalars from `update` folded in.
    ///
    /// A list element is appended unless an equal element is already present.
    /// Scalars from `update` overwrite those in `original`.
    pub fn add_list_elements(&self, original: &Value, update: &Value) -> MergeResult<Value> {
        self.fold(original, update, Fold::Plain)
    }

    /// Return `original` with new list elements and missing scalars from `update`.
    ///
    /// A list element is appended only when no equal element is present and
    /// no present element matches it under the registry rules for the key
    /// holding the list. Existing scalars are never overwritten.
    pub fn add_list_unique_elements(&self, original: &Value, update: &Value) -> MergeResult<Value> {
        self.fold(original, update, Fold::Unique)
    }

    /// Return `minuend - subtrahend`.
    ///
    /// Registry rules play no part; list membership is structural equality.
    pub fn difference(&self, minuend: &Value, subtrahend: &Value) -> MergeResult<Value> {
        difference(minuend, subtrahend)
    }

    /// Return a copy of `original` whose `section.collections` are taken from
    /// `donor`.
    ///
    /// A collection the donor lacks becomes an empty sequence.
    pub fn graft(
        &self,
        original: &Value,
        donor: &Value,
        section: &str,
        collections: &[&str],
    ) -> MergeResult<Value> {
        let mut result = root(original)?.clone();
        let donor = root(donor)?;
        let section_path = child_path("", section);

        let donor_section = match donor.get(section) {
            Some(Value::Object(map)) => Some(map),
            None => None,
            Some(other) => return Err(mismatch(&section_path, Shape::Mapping, other)),
        };
        let mut target = match result.remove(section) {
            Some(Value::Object(map)) => map,
            None => Map::new(),
            Some(other) => return Err(mismatch(&section_path, Shape::Mapping, &other)),
        };

        for name in collections {
            let grafted = donor_section
                .and_then(|s| s.get(*name))
                .cloned()
                .unwrap_or_else(|| Value::Array(Vec::new()));
            debug!(section, collection = name, "grafted collection");
            target.insert(name.to_string(), grafted);
        }
        result.insert(section.to_string(), Value::Object(target));
        Ok(Value::Object(result))
    }

    fn fold(&self, original: &Value, update: &Value, fold: Fold) -> MergeResult<Value> {
        let original = root(original)?;
        let update = root(update)?;
        self.fold_map(original, update, "", fold).map(Value::Object)
    }

    fn fold_map(
        &self,
        original: &Map<String, Value>,
        update: &Map<String, Value>,
        path: &str,
        fold: Fold,
    ) -> MergeResult<Map<String, Value>> {
        let mut result = original.clone();

        for (key, value) in update {
            let here = child_path(path, key);
            match value {
                Value::Object(inner) => {
                    let merged = match original.get(key) {
                        Some(Value::Object(existing)) => self.fold_map(existing, inner, &here, fold)?,
                        None => self.fold_map(&Map::new(), inner, &here, fold)?,
                        Some(other) => return Err(mismatch(&here, Shape::Mapping, other)),
                    };
                    result.insert(key.clone(), Value::Object(merged));
                }
                Value::Array(elements) => {
                    let mut list = match original.get(key) {
                        Some(Value::Array(existing)) => existing.clone(),
                        None => Vec::new(),
                        Some(other) => return Err(mismatch(&here, Shape::Sequence, other)),
                    };
                    let before = list.len();
                    for element in elements {
                        if list.contains(element) {
                            continue;
                        }
                        if fold == Fold::Unique
                            && self.registry.keyed_needle_in_haystack(key, element, &list)
                        {
                            debug!(path = %here, "element matches an existing key; not added");
                            continue;
                        }
                        list.push(element.clone());
                    }
                    if list.len() > before {
                        debug!(path = %here, added = list.len() - before, "list elements added");
                    }
                    result.insert(key.clone(), Value::Array(list));
                }
                scalar => match original.get(key) {
                    None => {
                        result.insert(key.clone(), scalar.clone());
                    }
                    Some(existing) => {
                        check_compatible(&here, existing, scalar)?;
                        if fold == Fold::Plain {
                            result.insert(key.clone(), scalar.clone());
                        }
                    }
                },
            }
        }

        Ok(result)
    }
}

/// Return `minuend - subtrahend` (see [`MergeEngine::difference`]).
pub fn difference(minuend: &Value, subtrahend: &Value) -> MergeResult<Value> {
    let minuend = root(minuend)?;
    let subtrahend = root(subtrahend)?;
    difference_map(minuend, subtrahend, "").map(Value::Object)
}

fn add_missing_keys_map(
    original: &Map<String, Value>,
    update: &Map<String, Value>,
    path: &str,
) -> MergeResult<Map<String, Value>> {
    let mut result = update.clone();

    for (key, value) in original {
        let here = child_path(path, key);
        match (value, update.get(key)) {
            (Value::Object(inner), Some(Value::Object(existing))) => {
                let merged = add_missing_keys_map(inner, existing, &here)?;
                result.insert(key.clone(), Value::Object(merged));
            }
            (_, None) => {
                result.insert(key.clone(), value.clone());
            }
            (_, Some(existing)) => check_compatible(&here, value, existing)?,
        }
    }

    Ok(result)
}

fn difference_map(
    minuend: &Map<String, Value>,
    subtrahend: &Map<String, Value>,
    path: &str,
) -> MergeResult<Map<String, Value>> {
    let mut result = Map::new();

    for (key, value) in minuend {
        let here = child_path(path, key);
        let other = subtrahend.get(key);
        if let Some(other) = other {
            check_compatible(&here, value, other)?;
        }

        match value {
            Value::Object(inner) => {
                let empty = Map::new();
                let other = match other {
                    Some(Value::Object(map)) => map,
                    _ => &empty,
                };
                let rest = difference_map(inner, other, &here)?;
                if !rest.is_empty() {
                    result.insert(key.clone(), Value::Object(rest));
                }
            }
            Value::Array(elements) => {
                let other: &[Value] = match other {
                    Some(Value::Array(list)) => list,
                    _ => &[],
                };
                let rest: Vec<Value> = elements
                    .iter()
                    .filter(|&element| !other.contains(element))
                    .cloned()
                    .collect();
                if !rest.is_empty() {
                    result.insert(key.clone(), Value::Array(rest));
                }
            }
            scalar => {
                if other.map_or(true, is_falsy) {
                    result.insert(key.clone(), scalar.clone());
                }
            }
        }
    }

    Ok(result)
}

/// Truthiness as used by `difference` for scalar subtraction.
pub fn is_falsy(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Bool(b) => !b,
        Value::Number(n) => n.as_f64().map_or(false, |f| f == 0.0),
        Value::String(s) => s.is_empty(),
        Value::Array(a) => a.is_empty(),
        Value::Object(m) => m.is_empty(),
    }
}

fn root(value: &Value) -> MergeResult<&Map<String, Value>> {
    match value {
        Value::Object(map) => Ok(map),
        other => Err(mismatch("", Shape::Mapping, other)),
    }
}

fn check_compatible(path: &str, left: &Value, right: &Value) -> MergeResult<()> {
    let expected = Shape::of(left);
    if expected == Shape::of(right) {
        Ok(())
    } else {
        Err(mismatch(path, expected, right))
    }
}

fn mismatch(path: &str, expected: Shape, found: &Value) -> MergeError {
    MergeError::ShapeMismatch {
        path: if path.is_empty() { "/".to_string() } else { path.to_string() },
        expected,
        found: Shape::of(found),
    }
}

/// Append `key` to a JSON-pointer path, escaping `~` and `/`.
fn child_path(path: &str, key: &str) -> String {
    format!("{path}/{}", key.replace('~', "~0").replace('/', "~1"))
}
