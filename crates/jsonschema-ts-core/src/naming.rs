//! Identifier helpers shared by the normalizer, parser and generator.

use heck::ToUpperCamelCase;

use crate::schema_utils::{is_structural_keyword, split_path};

/// Key of index-signature members.
pub const INDEX_SIGNATURE_KEY: &str = "[k: string]";

/// Convert arbitrary text into a type identifier (`UpperCamelCase`).
///
/// Returns an empty string when nothing identifier-like survives, which the
/// validator treats as "no usable name".
pub fn to_safe_string(raw: &str) -> String {
    let camel = raw.to_upper_camel_case();
    let cleaned: String = camel
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '_' || *c == '$')
        .collect();
    match cleaned.chars().next() {
        Some(c) if c.is_ascii_digit() => format!("_{cleaned}"),
        _ => cleaned,
    }
}

/// True if `key` can be written as a bare property name.
pub fn is_identifier(key: &str) -> bool {
    let mut chars = key.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' || c == '$' => {
            chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '$')
        }
        _ => false,
    }
}

/// Render a property key: bare when it is an identifier, otherwise a JSON
/// string literal.
pub fn escape_key_name(key: &str) -> String {
    if is_identifier(key) {
        key.to_string()
    } else {
        serde_json::Value::String(key.to_string()).to_string()
    }
}

/// Label for an enum member derived from its value.
pub fn enum_label(value: &serde_json::Value) -> Option<String> {
    match value {
        serde_json::Value::String(s) => {
            let label = to_safe_string(s);
            if label.is_empty() {
                None
            } else {
                Some(label)
            }
        }
        serde_json::Value::Number(n) => Some(format!(
            "_{}",
            n.to_string().replace('-', "Minus").replace('.', "_")
        )),
        _ => None,
    }
}

/// Name suggested by the text of a `$ref`.
///
/// `#/definitions/Address` gives `Address`, `person.json` gives `Person`.
/// Numeric segments and schema keywords (`items`, `anyOf`) give nothing.
pub fn name_from_ref(reference: &str) -> Option<String> {
    let (document, fragment) = match reference.split_once('#') {
        Some((doc, frag)) => (doc, frag),
        None => (reference, ""),
    };

    let candidate = match split_path(fragment).pop() {
        Some(segment) => {
            if segment.chars().all(|c| c.is_ascii_digit()) || is_structural_keyword(&segment) {
                return None;
            }
            segment
        }
        None => {
            let file = document.rsplit('/').next().unwrap_or(document);
            let stem = file.split('.').next().unwrap_or(file);
            stem.to_string()
        }
    };

    let name = to_safe_string(&candidate);
    if name.is_empty() {
        None
    } else {
        Some(name)
    }
}
