//! Shared schema utilities for consistent traversal and path construction.
//!
//! Provides two concerns used across the dereference and link passes:
//! 1. **JSON Pointer escaping** (RFC 6901) for property keys with `/` or `~`
//! 2. **Shared traversal** that visits every schema-bearing keyword the
//!    compiler understands, in document order
//!
//! ## Cross-Reference
//!
//! The linker (`p1_link.rs`) matches on the same keyword tables when it
//! builds [`SchemaNode`](crate::schema_graph::SchemaNode)s. When adding a
//! keyword here, also teach the linker where to store it.

use std::borrow::Cow;

use serde_json::{Map, Value};

use crate::error::CompileError;

// ---------------------------------------------------------------------------
// Keyword tables
// ---------------------------------------------------------------------------

/// Keywords whose value is a map from names to schemas.
pub const MAP_KEYWORDS: &[&str] = &["properties", "patternProperties", "definitions", "$defs"];

/// Keywords whose value is a single schema (or a boolean).
pub const SINGLE_KEYWORDS: &[&str] = &["additionalProperties", "additionalItems", "not"];

/// Keywords whose value is a list of schemas.
pub const ARRAY_KEYWORDS: &[&str] = &["anyOf", "oneOf", "allOf"];

/// Keywords that hold either one schema or a list of schemas.
pub const SINGLE_OR_ARRAY_KEYWORDS: &[&str] = &["items", "extends"];

/// True if `segment` is one of the structural keywords above.
///
/// Pointer segments that are keywords never make good type names
/// (`#/properties/tags/items` should not name a type `Items`).
pub fn is_structural_keyword(segment: &str) -> bool {
    MAP_KEYWORDS.contains(&segment)
        || SINGLE_KEYWORDS.contains(&segment)
        || ARRAY_KEYWORDS.contains(&segment)
        || SINGLE_OR_ARRAY_KEYWORDS.contains(&segment)
}

// ---------------------------------------------------------------------------
// JSON Pointer escaping (RFC 6901)
// ---------------------------------------------------------------------------

/// Escape a single path segment per RFC 6901.
///
/// - `~` → `~0`
/// - `/` → `~1`
///
/// Returns `Cow::Borrowed` when no escaping is needed (the common case).
pub fn escape_pointer_segment(segment: &str) -> Cow<'_, str> {
    if segment.contains('~') || segment.contains('/') {
        Cow::Owned(segment.replace('~', "~0").replace('/', "~1"))
    } else {
        Cow::Borrowed(segment)
    }
}

/// Build a JSON Pointer path by appending segments to a parent path.
///
/// Each segment is escaped per RFC 6901 before joining.
///
/// # Example
/// ```
/// use jsonschema_ts_core::build_path;
/// assert_eq!(build_path("#", &["properties", "a/b"]), "#/properties/a~1b");
/// ```
pub fn build_path(parent: &str, segments: &[&str]) -> String {
    let mut path = parent.to_string();
    for segment in segments {
        path.push('/');
        path.push_str(&escape_pointer_segment(segment));
    }
    path
}

/// Unescape a single path segment per RFC 6901.
///
/// Order matters: unescape `~1` first to avoid double-unescaping.
pub fn unescape_pointer_segment(segment: &str) -> Cow<'_, str> {
    if segment.contains("~0") || segment.contains("~1") {
        Cow::Owned(segment.replace("~1", "/").replace("~0", "~"))
    } else {
        Cow::Borrowed(segment)
    }
}

/// Split a JSON Pointer path into decoded segments.
///
/// Strips the leading `#` fragment identifier (if present), splits on `/`,
/// and unescapes each segment per RFC 6901.
///
/// # Example
/// ```
/// use jsonschema_ts_core::split_path;
/// assert_eq!(split_path("#/properties/a~1b/items"), vec!["properties", "a/b", "items"]);
/// assert_eq!(split_path("#"), Vec::<String>::new());
/// ```
pub fn split_path(path: &str) -> Vec<String> {
    let stripped = path.strip_prefix('#').unwrap_or(path);

    // An empty fragment ("#" or "") refers to the whole document.
    if stripped.is_empty() {
        return Vec::new();
    }

    let mut segments_iter = stripped.split('/');

    // A leading "/" produces an initial empty segment that represents the
    // root. Later empty segments are significant per RFC 6901.
    if stripped.starts_with('/') {
        segments_iter.next();
    }

    segments_iter
        .map(|s| unescape_pointer_segment(s).into_owned())
        .collect()
}

/// Resolve a JSON Pointer (`#`, `#/a/b`) against a document.
pub fn resolve_pointer<'a>(root: &'a Value, pointer: &str) -> Option<&'a Value> {
    let mut current = root;
    for key in split_path(pointer) {
        current = match current {
            Value::Object(obj) => obj.get(&key)?,
            Value::Array(arr) => arr.get(key.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }
    Some(current)
}

// ---------------------------------------------------------------------------
// Shared schema traversal
// ---------------------------------------------------------------------------

/// Visit every schema-bearing child of a schema object in place.
///
/// `visit` receives the child value and its JSON Pointer path. Values that
/// are not schemas (`additionalProperties: false`, a malformed `anyOf`) are
/// skipped rather than rejected: the validator reports shape problems.
pub fn for_each_subschema_mut<F>(
    obj: &mut Map<String, Value>,
    path: &str,
    visit: &mut F,
) -> Result<(), CompileError>
where
    F: FnMut(&mut Value, &str) -> Result<(), CompileError>,
{
    for (keyword, val) in obj.iter_mut() {
        let keyword = keyword.as_str();
        if MAP_KEYWORDS.contains(&keyword) {
            if let Value::Object(map) = val {
                for (key, child) in map.iter_mut() {
                    visit(child, &build_path(path, &[keyword, key.as_str()]))?;
                }
            }
        } else if SINGLE_KEYWORDS.contains(&keyword) {
            if val.is_object() {
                visit(val, &build_path(path, &[keyword]))?;
            }
        } else if ARRAY_KEYWORDS.contains(&keyword) || SINGLE_OR_ARRAY_KEYWORDS.contains(&keyword) {
            if let Value::Array(items) = val {
                for (i, child) in items.iter_mut().enumerate() {
                    visit(child, &build_path(path, &[keyword, &i.to_string()]))?;
                }
            } else if val.is_object() && SINGLE_OR_ARRAY_KEYWORDS.contains(&keyword) {
                visit(val, &build_path(path, &[keyword]))?;
            }
        }
    }
    Ok(())
}

// ===========================================================================
// Tests
// ===========================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    // --- Escaping tests ---

    #[test]
    fn test_escape_no_special() {
        let result = escape_pointer_segment("foo");
        assert!(matches!(result, Cow::Borrowed(_)));
        assert_eq!(result, "foo");
    }

    #[test]
    fn test_escape_both() {
        assert_eq!(escape_pointer_segment("~/"), "~0~1");
    }

    #[test]
    fn test_build_path_escaping() {
        assert_eq!(build_path("#", &["properties", "a/b"]), "#/properties/a~1b");
    }

    #[test]
    fn test_build_path_empty() {
        assert_eq!(build_path("#", &[]), "#");
    }

    #[test]
    fn test_unescape_both() {
        assert_eq!(unescape_pointer_segment("a~0b~1c"), "a~b/c");
    }

    #[test]
    fn test_split_path_with_escapes() {
        assert_eq!(
            split_path("#/properties/a~1b/items"),
            vec!["properties", "a/b", "items"]
        );
    }

    #[test]
    fn test_split_path_root() {
        assert_eq!(split_path("#"), Vec::<String>::new());
    }

    // --- Pointer resolution ---

    #[test]
    fn test_resolve_pointer_into_arrays_and_maps() {
        let doc = json!({
            "definitions": { "a/b": { "items": [{ "type": "string" }] } }
        });
        assert_eq!(
            resolve_pointer(&doc, "#/definitions/a~1b/items/0"),
            Some(&json!({ "type": "string" }))
        );
        assert_eq!(resolve_pointer(&doc, "#"), Some(&doc));
        assert_eq!(resolve_pointer(&doc, "#/definitions/missing"), None);
        assert_eq!(resolve_pointer(&doc, "#/definitions/a~1b/items/x"), None);
    }

    // --- Traversal tests ---

    #[test]
    fn test_visits_every_schema_keyword() {
        let mut schema = json!({
            "type": "object",
            "properties": { "a": { "type": "string" } },
            "patternProperties": { "^x-": { "type": "string" } },
            "additionalProperties": { "type": "integer" },
            "additionalItems": { "type": "null" },
            "items": [{ "type": "integer" }, { "type": "string" }],
            "anyOf": [{ "type": "string" }],
            "oneOf": [{ "type": "integer" }],
            "allOf": [{ "type": "boolean" }],
            "not": { "type": "null" },
            "extends": { "type": "object" },
            "definitions": { "Bar": { "type": "integer" } },
            "$defs": { "Foo": { "type": "string" } },
            "default": { "type": "not a schema" }
        });

        let mut paths = Vec::new();
        for_each_subschema_mut(schema.as_object_mut().unwrap(), "#", &mut |_, path| {
            paths.push(path.to_string());
            Ok(())
        })
        .unwrap();

        assert_eq!(paths.len(), 13);
        assert!(paths.contains(&"#/items/1".to_string()));
        assert!(paths.contains(&"#/extends".to_string()));
        assert!(!paths.iter().any(|p| p.starts_with("#/default")));
    }

    #[test]
    fn test_skips_non_schema_values() {
        let mut schema = json!({
            "additionalProperties": false,
            "items": true,
            "anyOf": "invalid",
            "definitions": 42
        });

        let mut visits = 0;
        for_each_subschema_mut(schema.as_object_mut().unwrap(), "#", &mut |_, _| {
            visits += 1;
            Ok(())
        })
        .unwrap();

        assert_eq!(visits, 0);
    }

    #[test]
    fn test_structural_keywords() {
        assert!(is_structural_keyword("items"));
        assert!(is_structural_keyword("additionalProperties"));
        assert!(!is_structural_keyword("Address"));
    }
}
