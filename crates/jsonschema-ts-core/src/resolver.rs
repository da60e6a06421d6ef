//! JSON Schema reference resolution engine.
//!
//! [`ResolverEngine`] turns `$ref` strings into JSON Pointers into a single
//! bundled document. It encapsulates:
//! - The root document URI (options `base-uri`, overridden by a root `$id`)
//! - The fetch collaborator for external documents
//! - The queue of fetched documents that still need their own refs rewritten
//!
//! External documents are fetched once per URI and bundled under the root's
//! reserved [`EXTERNAL_KEY`], keyed by document URI.

use std::collections::{HashMap, HashSet, VecDeque};

use serde_json::Value;
use url::Url;

use crate::error::CompileError;
use crate::schema_utils::build_path;

/// Root key under which fetched documents are bundled.
pub const EXTERNAL_KEY: &str = "$external";

// ---------------------------------------------------------------------------
// Fetch collaborators
// ---------------------------------------------------------------------------

/// Materializes external schema documents.
///
/// Implementations are assumed idempotent: the engine calls `fetch` at most
/// once per document URI and never retries a failure.
pub trait SchemaFetcher {
    fn fetch(&self, uri: &Url) -> Result<Value, String>;
}

/// Refuses every external reference.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoFetch;

impl SchemaFetcher for NoFetch {
    fn fetch(&self, uri: &Url) -> Result<Value, String> {
        Err(format!("external references are disabled ({uri})"))
    }
}

/// Serves documents from a URI-keyed map.
#[derive(Debug, Clone, Default)]
pub struct InMemoryFetcher {
    documents: HashMap<String, Value>,
}

impl InMemoryFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_document(mut self, uri: &str, document: Value) -> Self {
        self.documents.insert(uri.to_string(), document);
        self
    }
}

impl SchemaFetcher for InMemoryFetcher {
    fn fetch(&self, uri: &Url) -> Result<Value, String> {
        self.documents
            .get(uri.as_str())
            .cloned()
            .ok_or_else(|| "no such document".to_string())
    }
}

// ---------------------------------------------------------------------------
// ResolverEngine
// ---------------------------------------------------------------------------

/// Reference resolution engine for one compile call.
pub struct ResolverEngine<'f> {
    root_uri: Url,
    fetcher: &'f dyn SchemaFetcher,
    fetched: HashSet<String>,
    pending: VecDeque<(Url, Value)>,
}

impl<'f> ResolverEngine<'f> {
    /// Build a resolver for a root document.
    ///
    /// A root `$id` is joined onto `base` and becomes the root's URI.
    pub fn new(schema: &Value, base: Url, fetcher: &'f dyn SchemaFetcher) -> Self {
        let mut root_uri = match schema.get("$id").and_then(Value::as_str) {
            Some(id) => base.join(id).unwrap_or(base),
            None => base,
        };
        root_uri.set_fragment(None);
        Self {
            root_uri,
            fetcher,
            fetched: HashSet::new(),
            pending: VecDeque::new(),
        }
    }

    /// The URI of the root document.
    pub fn root_uri(&self) -> &Url {
        &self.root_uri
    }

    /// Pointer prefix of a document inside the bundle (`#` for the root).
    pub fn document_prefix(&self, document: &Url) -> String {
        if *document == self.root_uri {
            "#".to_string()
        } else {
            build_path("#", &[EXTERNAL_KEY, document.as_str()])
        }
    }

    /// Resolve `reference`, found at `site` inside `scope`, to a pointer
    /// into the bundled document. Fetches the target document on first use.
    pub fn resolve(
        &mut self,
        reference: &str,
        scope: &Url,
        site: &str,
    ) -> Result<String, CompileError> {
        let unresolvable = || CompileError::UnresolvableRef {
            path: site.to_string(),
            reference: reference.to_string(),
        };

        // Same-document refs skip URL parsing so pointer text is not
        // percent-encoded.
        let (document, fragment) = if let Some(fragment) = reference.strip_prefix('#') {
            (scope.clone(), fragment.to_string())
        } else {
            let mut target = scope.join(reference).map_err(|_| unresolvable())?;
            let fragment = target.fragment().unwrap_or("").to_string();
            target.set_fragment(None);
            (target, fragment)
        };

        // Only JSON Pointer fragments are supported.
        if !fragment.is_empty() && !fragment.starts_with('/') {
            return Err(unresolvable());
        }

        if document != self.root_uri && self.fetched.insert(document.to_string()) {
            let fetched = self
                .fetcher
                .fetch(&document)
                .map_err(|message| CompileError::FetchError {
                    uri: document.to_string(),
                    message,
                })?;
            tracing::debug!(uri = %document, "fetched external schema");
            self.pending.push_back((document.clone(), fetched));
        }

        Ok(format!("{}{}", self.document_prefix(&document), fragment))
    }

    /// Next fetched document whose refs have not been rewritten yet.
    pub fn next_pending(&mut self) -> Option<(Url, Value)> {
        self.pending.pop_front()
    }
}

// ===========================================================================
// Tests
// ===========================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn base() -> Url {
        Url::parse("file:///schemas/root.json").unwrap()
    }

    #[test]
    fn test_local_pointer_passthrough() {
        let schema = json!({ "type": "object" });
        let mut engine = ResolverEngine::new(&schema, base(), &NoFetch);
        let scope = engine.root_uri().clone();

        let result = engine.resolve("#/definitions/my type", &scope, "#/properties/a");
        assert_eq!(result.unwrap(), "#/definitions/my type");
        assert!(engine.next_pending().is_none());
    }

    #[test]
    fn test_root_id_becomes_document_uri() {
        let schema = json!({ "$id": "https://example.com/person.json" });
        let mut engine = ResolverEngine::new(&schema, base(), &NoFetch);
        assert_eq!(engine.root_uri().as_str(), "https://example.com/person.json");

        let scope = engine.root_uri().clone();
        let result = engine.resolve("person.json#/definitions/A", &scope, "#");
        assert_eq!(result.unwrap(), "#/definitions/A");
    }

    #[test]
    fn test_external_document_fetched_once() {
        let fetcher = InMemoryFetcher::new()
            .with_document("file:///schemas/address.json", json!({ "type": "object" }));
        let schema = json!({});
        let mut engine = ResolverEngine::new(&schema, base(), &fetcher);
        let scope = engine.root_uri().clone();

        let first = engine.resolve("address.json", &scope, "#/properties/a").unwrap();
        let second = engine
            .resolve("./address.json#/properties/x", &scope, "#/properties/b")
            .unwrap();

        assert_eq!(first, "#/$external/file:~1~1~1schemas~1address.json");
        assert_eq!(
            second,
            "#/$external/file:~1~1~1schemas~1address.json/properties/x"
        );
        assert!(engine.next_pending().is_some());
        assert!(engine.next_pending().is_none());
    }

    #[test]
    fn test_no_fetch_refuses_external() {
        let schema = json!({});
        let mut engine = ResolverEngine::new(&schema, base(), &NoFetch);
        let scope = engine.root_uri().clone();

        let err = engine.resolve("other.json", &scope, "#").unwrap_err();
        assert!(matches!(err, CompileError::FetchError { .. }));
    }

    #[test]
    fn test_anchor_fragment_unresolvable() {
        let schema = json!({});
        let mut engine = ResolverEngine::new(&schema, base(), &NoFetch);
        let scope = engine.root_uri().clone();

        let err = engine.resolve("#foo", &scope, "#/properties/a").unwrap_err();
        assert!(matches!(err, CompileError::UnresolvableRef { .. }));
    }
}
