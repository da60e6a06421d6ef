//! Compile JSON Schema documents into TypeScript declarations.
//!
//! The pipeline runs in fixed order, each stage consuming the previous one:
//!
//! | stage | module |
//! |---|---|
//! | dereference | [`passes::p0_dereference`] |
//! | link | [`passes::p1_link`] |
//! | validate | [`passes::p2_validate`] |
//! | normalize | [`passes::p3_normalize`] |
//! | parse | [`passes::p4_parse`] |
//! | optimize | [`passes::p5_optimize`] |
//! | generate | [`generator`] |
//!
//! Every compile call builds its own graph, AST and generator state; nothing
//! is shared between calls.
//!
//! ```
//! use jsonschema_ts_core::{compile, CompileOptions};
//! use serde_json::json;
//!
//! let schema = json!({
//!     "type": "object",
//!     "properties": { "id": { "type": "integer" } },
//!     "required": ["id"]
//! });
//! let output = compile(&schema, "Widget", &CompileOptions::default()).unwrap();
//! assert_eq!(output, "export class Widget {\n  id: number;\n}\n");
//! ```

pub mod ast;
pub mod config;
pub mod error;
pub mod generator;
pub mod naming;
pub mod passes;
pub mod resolver;
pub mod schema_graph;
pub mod schema_utils;

use serde_json::Value;

pub use config::{CompileOptions, DescriptionPolicy, KeyCanonicalization};
pub use error::{CompileError, ErrorKind};
pub use resolver::{InMemoryFetcher, NoFetch, SchemaFetcher};
pub use schema_utils::{build_path, split_path};

/// Compile one schema into declarations, with external `$ref`s disabled.
pub fn compile(schema: &Value, name: &str, options: &CompileOptions) -> Result<String, CompileError> {
    compile_with_fetcher(schema, name, options, &NoFetch)
}

/// Compile one schema, fetching external `$ref` documents through `fetcher`.
///
/// Fails without producing any text when a stage rejects the input.
pub fn compile_with_fetcher(
    schema: &Value,
    name: &str,
    options: &CompileOptions,
    fetcher: &dyn SchemaFetcher,
) -> Result<String, CompileError> {
    options.validate()?;

    let dereferenced = passes::p0_dereference::dereference(schema, options, fetcher)?;
    tracing::debug!(
        refs = dereferenced.dereferenced_paths.len(),
        "dereference complete"
    );

    let graph = passes::p1_link::link(&dereferenced, options)?;
    tracing::debug!(nodes = graph.len(), "link complete");

    let violations = passes::p2_validate::validate(&graph, name);
    if !violations.is_empty() {
        for violation in &violations {
            tracing::error!(violation = %violation, "schema validation failed");
        }
        return Err(CompileError::ValidationError(violations));
    }
    tracing::debug!("validate complete");

    let graph = passes::p3_normalize::normalize(graph, name, options);
    tracing::debug!(
        named = graph
            .ids()
            .filter(|&id| graph.node(id).standalone_name.is_some())
            .count(),
        "normalize complete"
    );

    let ast = passes::p4_parse::parse(&graph, options);
    let ast = passes::p5_optimize::optimize(ast, options)?;

    Ok(generator::generate(&ast, name, options))
}

/// Compile a multi-entry document.
///
/// `document` maps keys to entries, each either `{"schema": {"name": .., ..}}`
/// or a flat `{"name": .., ..}`. Entries compile independently and their
/// output is concatenated in document order. The first failing entry aborts
/// the whole document.
pub fn compile_document(
    document: &Value,
    options: &CompileOptions,
    fetcher: &dyn SchemaFetcher,
) -> Result<String, CompileError> {
    let entries = document.as_object().ok_or_else(|| CompileError::SchemaError {
        path: "#".to_string(),
        message: "a schema document must be an object of entries".to_string(),
    })?;

    let mut outputs = Vec::with_capacity(entries.len());
    for (key, entry) in entries {
        let output = compile_entry(key, entry, options, fetcher).map_err(|source| {
            CompileError::EntryError {
                entry: key.clone(),
                source: Box::new(source),
            }
        })?;
        outputs.push(output);
    }
    tracing::debug!(entries = outputs.len(), "document complete");
    Ok(outputs.join("\n"))
}

fn compile_entry(
    key: &str,
    entry: &Value,
    options: &CompileOptions,
    fetcher: &dyn SchemaFetcher,
) -> Result<String, CompileError> {
    let schema = entry.get("schema").unwrap_or(entry);
    let name = schema
        .get("name")
        .and_then(Value::as_str)
        .ok_or_else(|| CompileError::SchemaError {
            path: build_path("#", &[key]),
            message: "entry has no string `name`".to_string(),
        })?;
    compile_with_fetcher(schema, name, options, fetcher)
}
