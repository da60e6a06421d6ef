//! Configuration for schema compilation.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::CompileError;

/// Base URI used when the caller does not supply one.
pub const DEFAULT_BASE_URI: &str = "file:///schema.json";

/// Which `description` fields survive normalization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DescriptionPolicy {
    /// Keep every description as a doc comment.
    #[default]
    Keep,
    /// Drop the root schema's description only.
    OmitRoot,
    /// Drop all descriptions.
    OmitAll,
}

/// Rewrites any property key containing `contains` to `canonical`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyCanonicalization {
    pub contains: String,
    pub canonical: String,
}

/// Options for schema compilation.
///
/// ## Serialization Format
///
/// Fields are serialized in `kebab-case` (e.g., `max-items`, `unknown-any`).
/// Every field has a default, so a config file only lists what it changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct CompileOptions {
    /// Value filled in for object schemas that omit `additionalProperties`.
    pub additional_properties_default: bool,
    /// Emit every standalone-named declaration, not only the root's.
    pub declare_externally_referenced: bool,
    /// Emit `export const enum` rather than `export enum`.
    pub enable_const_enums: bool,
    /// Ignore `minItems`/`maxItems` entirely (no tuples from bounds).
    pub ignore_min_and_max_items: bool,
    /// Largest `maxItems - minItems` spread expanded into a union of tuples.
    /// Beyond it `maxItems` is dropped. `-1` disables the cap, though tuples
    /// longer than 1024 still fall back to an unbounded array.
    pub max_items: i64,
    /// Append `| undefined` to index-signature members.
    pub strict_index_signatures: bool,
    /// Emit `definitions` that the root never references.
    pub unreachable_definitions: bool,
    /// Placeholder type is `unknown` (otherwise `any`).
    pub unknown_any: bool,
    /// Merge structurally identical classes under the first-seen name.
    pub deduplicate_classes: bool,
    /// Which descriptions to keep as doc comments.
    pub descriptions: DescriptionPolicy,
    /// Property-key rewrite rules, applied in order.
    pub key_canonicalization: Vec<KeyCanonicalization>,
    /// Opaque text emitted before every class declaration.
    pub class_banner: Option<String>,
    /// Opaque text emitted before every declaration block of any kind,
    /// ahead of `class_banner` on classes.
    pub declaration_banner: Option<String>,
    /// Base for resolving relative external `$ref`s.
    pub base_uri: Option<String>,
    /// Depth guard for reference resolution and linking.
    pub max_depth: usize,
}

impl Default for CompileOptions {
    fn default() -> Self {
        Self {
            additional_properties_default: false,
            declare_externally_referenced: true,
            enable_const_enums: true,
            ignore_min_and_max_items: false,
            max_items: 20,
            strict_index_signatures: false,
            unreachable_definitions: false,
            unknown_any: true,
            deduplicate_classes: false,
            descriptions: DescriptionPolicy::Keep,
            key_canonicalization: Vec::new(),
            class_banner: None,
            declaration_banner: None,
            base_uri: None,
            max_depth: 50,
        }
    }
}

impl CompileOptions {
    /// Reject contradictory or out-of-range settings before any stage runs.
    pub fn validate(&self) -> Result<(), CompileError> {
        if self.max_items < -1 {
            return Err(CompileError::ConfigurationError(format!(
                "max-items must be -1 (unlimited) or non-negative, got {}",
                self.max_items
            )));
        }
        if self.max_depth == 0 {
            return Err(CompileError::ConfigurationError(
                "max-depth must be at least 1".to_string(),
            ));
        }
        self.base_url()?;

        let mut seen: HashMap<&str, &str> = HashMap::new();
        for rule in &self.key_canonicalization {
            if rule.contains.is_empty() || rule.canonical.is_empty() {
                return Err(CompileError::ConfigurationError(
                    "key-canonicalization rules need a non-empty `contains` and `canonical`"
                        .to_string(),
                ));
            }
            if let Some(previous) = seen.insert(&rule.contains, &rule.canonical) {
                if previous != rule.canonical {
                    return Err(CompileError::ConfigurationError(format!(
                        "key-canonicalization maps {:?} to both {:?} and {:?}",
                        rule.contains, previous, rule.canonical
                    )));
                }
            }
        }
        Ok(())
    }

    /// Parsed base URI, falling back to [`DEFAULT_BASE_URI`].
    pub fn base_url(&self) -> Result<Url, CompileError> {
        let raw = self.base_uri.as_deref().unwrap_or(DEFAULT_BASE_URI);
        Url::parse(raw).map_err(|e| {
            CompileError::ConfigurationError(format!("invalid base-uri {raw:?}: {e}"))
        })
    }

    /// The placeholder type name: `unknown` or `any`.
    pub fn placeholder(&self) -> &'static str {
        if self.unknown_any {
            "unknown"
        } else {
            "any"
        }
    }
}
