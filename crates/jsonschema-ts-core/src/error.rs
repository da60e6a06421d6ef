//! Error types for schema compilation.

use thiserror::Error;

/// Coarse classification of a [`CompileError`].
///
/// Every failure aborts compilation of the document it belongs to; the kind
/// tells callers which stage rejected it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Options were rejected before any stage ran.
    Configuration,
    /// A `$ref` could not be expanded.
    Resolution,
    /// The linked schema broke a structural precondition.
    Validation,
    /// Two different schemas claimed the same standalone name.
    Naming,
    /// The input was not a usable schema document.
    Input,
}

#[derive(Debug, Error)]
pub enum CompileError {
    #[error("JSON parsing error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Invalid options: {0}")]
    ConfigurationError(String),

    #[error("Unresolvable $ref at {path}: {reference}")]
    UnresolvableRef { path: String, reference: String },

    #[error("$ref cycle never reaches a concrete schema: {}", .chain.join(" -> "))]
    RefCycle { chain: Vec<String> },

    #[error("Failed to fetch external schema {uri}: {message}")]
    FetchError { uri: String, message: String },

    #[error("Recursion depth exceeded at {path} (max: {max_depth})")]
    RecursionDepthExceeded { path: String, max_depth: usize },

    #[error("Schema validation failed:\n  {}", .0.join("\n  "))]
    ValidationError(Vec<String>),

    #[error("Standalone name {name:?} is claimed by different schemas at {first} and {second}")]
    NameCollision {
        name: String,
        first: String,
        second: String,
    },

    #[error("Schema error at {path}: {message}")]
    SchemaError { path: String, message: String },

    #[error("Failed to compile {entry:?}: {source}")]
    EntryError {
        entry: String,
        #[source]
        source: Box<CompileError>,
    },
}

impl CompileError {
    /// The taxonomy bucket this error falls into.
    pub fn kind(&self) -> ErrorKind {
        match self {
            CompileError::ConfigurationError(_) => ErrorKind::Configuration,
            CompileError::UnresolvableRef { .. }
            | CompileError::RefCycle { .. }
            | CompileError::FetchError { .. }
            | CompileError::RecursionDepthExceeded { .. } => ErrorKind::Resolution,
            CompileError::ValidationError(_) => ErrorKind::Validation,
            CompileError::NameCollision { .. } => ErrorKind::Naming,
            CompileError::JsonError(_) | CompileError::SchemaError { .. } => ErrorKind::Input,
            CompileError::EntryError { source, .. } => source.kind(),
        }
    }

    /// Violations carried by a validation failure, if this is one.
    pub fn violations(&self) -> &[String] {
        match self {
            CompileError::ValidationError(violations) => violations,
            CompileError::EntryError { source, .. } => source.violations(),
            _ => &[],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entry_error_reports_inner_kind() {
        let err = CompileError::EntryError {
            entry: "Binding".to_string(),
            source: Box::new(CompileError::ValidationError(vec!["a".into(), "b".into()])),
        };
        assert_eq!(err.kind(), ErrorKind::Validation);
        assert_eq!(err.violations(), ["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn test_ref_cycle_message_names_chain() {
        let err = CompileError::RefCycle {
            chain: vec!["#/definitions/A".into(), "#/definitions/B".into()],
        };
        assert_eq!(
            err.to_string(),
            "$ref cycle never reaches a concrete schema: #/definitions/A -> #/definitions/B"
        );
    }
}
