//! Load-time normalization of project JSON.
//!
//! # Responsibility
//! - Merge loaded data onto the default document skeleton.
//! - Reject data whose manuscript or lore shape cannot be trusted.
//!
//! # Invariants
//! - Objects merge key by key; arrays and scalars from the loaded data replace
//!   the skeleton value; `null` keeps the skeleton value.
//! - Inside list items a `null` member reads as an absent member.
//! - A rejected load never produces a partially merged document.

use crate::model::project::ProjectDocument;
use serde_json::{Map, Value};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Why loaded bytes could not become a project document.
#[derive(Debug)]
pub enum LoadError {
    /// Bytes are not valid JSON.
    Malformed(serde_json::Error),
    /// JSON parsed but the document shape is missing or mistyped.
    Corrupt(String),
}

impl Display for LoadError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Malformed(err) => write!(f, "project file is not valid JSON: {err}"),
            Self::Corrupt(details) => write!(f, "project file is corrupt: {details}"),
        }
    }
}

impl Error for LoadError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Malformed(err) => Some(err),
            Self::Corrupt(_) => None,
        }
    }
}

impl From<serde_json::Error> for LoadError {
    fn from(value: serde_json::Error) -> Self {
        Self::Malformed(value)
    }
}

/// Default document rendered as JSON; the base of every load.
pub fn default_skeleton() -> Value {
    serde_json::to_value(ProjectDocument::default()).unwrap_or_else(|_| Value::Object(Map::new()))
}

/// Recursively merges `overlay` onto `base`.
pub fn deep_merge(base: &mut Value, overlay: Value) {
    match (base, overlay) {
        (_, Value::Null) => {}
        (Value::Object(base_map), Value::Object(overlay_map)) => {
            for (key, value) in overlay_map {
                match base_map.get_mut(&key) {
                    Some(existing) => deep_merge(existing, value),
                    None => {
                        base_map.insert(key, value);
                    }
                }
            }
        }
        (slot, value) => *slot = value,
    }
}

/// Removes `null` members from every object nested in a list, so optional
/// item fields fall back to their defaults.
fn drop_null_item_members(value: &mut Value) {
    match value {
        Value::Array(items) => items.iter_mut().for_each(drop_null_members),
        Value::Object(members) => members.values_mut().for_each(drop_null_item_members),
        _ => {}
    }
}

fn drop_null_members(value: &mut Value) {
    match value {
        Value::Object(members) => {
            members.retain(|_, member| !member.is_null());
            members.values_mut().for_each(drop_null_members);
        }
        Value::Array(items) => items.iter_mut().for_each(drop_null_members),
        _ => {}
    }
}

/// Checks the collections the editor cannot work without.
///
/// # Errors
/// - Root is not an object.
/// - `manuscript` is not a list of chapters carrying string `id`, `title`
///   and `content`.
/// - `lore.entities` is not a list of objects.
pub fn validate_shape(value: &Value) -> Result<(), LoadError> {
    let root = value
        .as_object()
        .ok_or_else(|| LoadError::Corrupt("root is not an object".to_string()))?;

    let manuscript = root
        .get("manuscript")
        .and_then(Value::as_array)
        .ok_or_else(|| LoadError::Corrupt("manuscript is not a list".to_string()))?;
    for (index, chapter) in manuscript.iter().enumerate() {
        let chapter = chapter
            .as_object()
            .ok_or_else(|| LoadError::Corrupt(format!("chapter {index} is not an object")))?;
        for field in ["id", "title", "content"] {
            if !chapter.get(field).is_some_and(Value::is_string) {
                return Err(LoadError::Corrupt(format!(
                    "chapter {index} is missing string field `{field}`"
                )));
            }
        }
    }

    let entities = root
        .get("lore")
        .and_then(|lore| lore.get("entities"))
        .and_then(Value::as_array)
        .ok_or_else(|| LoadError::Corrupt("lore entities are not a list".to_string()))?;
    if let Some(index) = entities.iter().position(|entity| !entity.is_object()) {
        return Err(LoadError::Corrupt(format!(
            "lore entity {index} is not an object"
        )));
    }

    Ok(())
}

/// Merges an already-parsed value onto the skeleton and types it.
pub fn merge_with_defaults(loaded: Value) -> Result<ProjectDocument, LoadError> {
    if !loaded.is_object() {
        return Err(LoadError::Corrupt("root is not an object".to_string()));
    }
    let mut merged = default_skeleton();
    deep_merge(&mut merged, loaded);
    drop_null_item_members(&mut merged);
    validate_shape(&merged)?;
    serde_json::from_value(merged).map_err(|err| LoadError::Corrupt(err.to_string()))
}

/// Parses raw project bytes into a well-formed document.
pub fn parse_project(bytes: &[u8]) -> Result<ProjectDocument, LoadError> {
    let loaded: Value = serde_json::from_slice(bytes)?;
    merge_with_defaults(loaded)
}

#[cfg(test)]
mod tests {
    use super::{deep_merge, parse_project, validate_shape, LoadError};
    use serde_json::json;

    #[test]
    fn deep_merge_merges_objects_and_replaces_arrays() {
        let mut base = json!({
            "settings": { "autoSave": true, "textBackup": true },
            "maps": [1, 2],
            "title": "Untitled"
        });
        deep_merge(
            &mut base,
            json!({ "settings": { "autoSave": false }, "maps": [], "title": null }),
        );
        assert_eq!(
            base,
            json!({
                "settings": { "autoSave": false, "textBackup": true },
                "maps": [],
                "title": "Untitled"
            })
        );
    }

    #[test]
    fn validate_shape_rejects_chapter_without_content() {
        let value = json!({
            "manuscript": [{ "id": "c1", "title": "One" }],
            "lore": { "entities": [] }
        });
        let err = validate_shape(&value).unwrap_err();
        assert!(err.to_string().contains("content"));
    }

    #[test]
    fn parse_project_rejects_non_object_root() {
        let err = parse_project(b"[1, 2, 3]").unwrap_err();
        assert!(matches!(err, LoadError::Corrupt(_)));
    }

    #[test]
    fn null_members_inside_list_items_are_dropped() {
        let mut value = json!({
            "title": null,
            "manuscript": [{ "id": "c1", "synopsis": null, "extra": { "k": null } }],
            "maps": [{ "pins": [{ "entityId": null }] }]
        });
        super::drop_null_item_members(&mut value);
        assert_eq!(
            value,
            json!({
                "title": null,
                "manuscript": [{ "id": "c1", "extra": {} }],
                "maps": [{ "pins": [{}] }]
            })
        );
    }

    #[test]
    fn parse_project_reports_malformed_json() {
        let err = parse_project(b"{\"title\": ").unwrap_err();
        assert!(matches!(err, LoadError::Malformed(_)));
    }
}
