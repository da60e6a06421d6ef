//! Pass 0: Reference Resolution
//!
//! Rewrites every `$ref` into a canonical JSON Pointer into one bundled
//! document. Performs:
//!
//! 1. Ref rewriting: local refs stay as they are, external refs are fetched
//!    once through the [`SchemaFetcher`] and bundled under `$external`
//! 2. Chain collapsing: a ref to a node that is itself only a `$ref` is
//!    followed until it reaches a concrete schema
//!
//! Refs are left in place (not inlined); the linker turns them into shared
//! node identities. A chain that loops without reaching a concrete schema is
//! a [`CompileError::RefCycle`].

use indexmap::IndexMap;
use serde_json::{Map, Value};
use url::Url;

use crate::config::CompileOptions;
use crate::error::CompileError;
use crate::resolver::{ResolverEngine, SchemaFetcher, EXTERNAL_KEY};
use crate::schema_utils::{for_each_subschema_mut, resolve_pointer};

/// Result of the reference resolution pass.
#[derive(Debug, Clone)]
pub struct Dereferenced {
    /// The bundled schema with every `$ref` pointing at a concrete node.
    pub schema: Value,
    /// Canonical target pointer → the first `$ref` text that reached it.
    pub dereferenced_paths: IndexMap<String, String>,
}

/// Traversal context for ref rewriting, reducing argument count.
struct RewriteContext<'e, 'f> {
    engine: &'e mut ResolverEngine<'f>,
    max_depth: usize,
    /// `$ref` sites in document order with the ref text as written.
    sites: Vec<(String, String)>,
}

/// Resolve and canonicalize every `$ref` in `schema`.
pub fn dereference(
    schema: &Value,
    options: &CompileOptions,
    fetcher: &dyn SchemaFetcher,
) -> Result<Dereferenced, CompileError> {
    let mut root = schema.clone();
    let mut engine = ResolverEngine::new(&root, options.base_url()?, fetcher);

    // Phase 1: rewrite refs, fetching external documents as they appear.
    let root_uri = engine.root_uri().clone();
    let mut ctx = RewriteContext {
        engine: &mut engine,
        max_depth: options.max_depth,
        sites: Vec::new(),
    };
    rewrite_refs(&mut root, "#", &root_uri, 0, &mut ctx)?;

    let mut bundle = Map::new();
    while let Some((uri, mut document)) = ctx.engine.next_pending() {
        let prefix = ctx.engine.document_prefix(&uri);
        rewrite_refs(&mut document, &prefix, &uri, 0, &mut ctx)?;
        bundle.insert(uri.to_string(), document);
    }
    let sites = ctx.sites;

    if !bundle.is_empty() {
        match root.as_object_mut() {
            Some(obj) => {
                obj.insert(EXTERNAL_KEY.to_string(), Value::Object(bundle));
            }
            None => {
                return Err(CompileError::SchemaError {
                    path: "#".to_string(),
                    message: "a boolean root schema cannot carry references".to_string(),
                })
            }
        }
    }

    // Phase 2: collapse ref chains onto their concrete targets.
    let mut dereferenced_paths = IndexMap::new();
    for (site, original) in &sites {
        let target = concrete_target(&root, site, original, options.max_depth)?;
        if let Some(Value::Object(obj)) = root.pointer_mut(site.trim_start_matches('#')) {
            obj.insert("$ref".to_string(), Value::String(target.clone()));
        }
        dereferenced_paths
            .entry(target)
            .or_insert_with(|| original.clone());
    }

    tracing::debug!(
        refs = sites.len(),
        targets = dereferenced_paths.len(),
        "dereference complete"
    );

    Ok(Dereferenced {
        schema: root,
        dereferenced_paths,
    })
}

// ---------------------------------------------------------------------------
// Phase 1: ref rewriting
// ---------------------------------------------------------------------------

fn rewrite_refs(
    node: &mut Value,
    path: &str,
    scope: &Url,
    depth: usize,
    ctx: &mut RewriteContext<'_, '_>,
) -> Result<(), CompileError> {
    if depth > ctx.max_depth {
        return Err(CompileError::RecursionDepthExceeded {
            path: path.to_string(),
            max_depth: ctx.max_depth,
        });
    }

    let Some(obj) = node.as_object_mut() else {
        return Ok(());
    };

    if let Some(reference) = obj.get("$ref").and_then(Value::as_str).map(str::to_string) {
        let pointer = ctx.engine.resolve(&reference, scope, path)?;
        tracing::trace!(path, reference = %reference, pointer = %pointer, "rewrote $ref");
        obj.insert("$ref".to_string(), Value::String(pointer));
        ctx.sites.push((path.to_string(), reference));
    }

    for_each_subschema_mut(obj, path, &mut |child, child_path| {
        rewrite_refs(child, child_path, scope, depth + 1, ctx)
    })
}

// ---------------------------------------------------------------------------
// Phase 2: chain collapsing
// ---------------------------------------------------------------------------

/// True for `{ "$ref": ... }` with no sibling keywords.
pub(crate) fn is_bare_ref(value: &Value) -> bool {
    value
        .as_object()
        .is_some_and(|obj| obj.len() == 1 && obj.get("$ref").is_some_and(Value::is_string))
}

/// Follow the ref at `site` until it lands on a node that is not a bare ref.
fn concrete_target(
    root: &Value,
    site: &str,
    original: &str,
    max_depth: usize,
) -> Result<String, CompileError> {
    let unresolvable = || CompileError::UnresolvableRef {
        path: site.to_string(),
        reference: original.to_string(),
    };

    let first = resolve_pointer(root, site)
        .and_then(|node| node.get("$ref"))
        .and_then(Value::as_str)
        .ok_or_else(unresolvable)?;

    let mut chain = vec![first.to_string()];
    loop {
        let current = chain.last().map(String::as_str).unwrap_or(first);
        let node = resolve_pointer(root, current).ok_or_else(unresolvable)?;
        if !is_bare_ref(node) {
            return Ok(current.to_string());
        }

        let next = node
            .get("$ref")
            .and_then(Value::as_str)
            .ok_or_else(unresolvable)?
            .to_string();
        if chain.contains(&next) {
            chain.push(next);
            return Err(CompileError::RefCycle { chain });
        }
        if chain.len() > max_depth {
            return Err(CompileError::RecursionDepthExceeded {
                path: site.to_string(),
                max_depth,
            });
        }
        chain.push(next);
    }
}

// ===========================================================================
// Tests
// ===========================================================================
