//! Property-based negative tests for malformed JSON Schemas.
//!
//! Validates that `compile()` **never panics**: it returns either `Ok`
//! (gracefully handled) or `Err(CompileError)` when given structurally-valid
//! JSON that is semantically invalid as JSON Schema.
//!
//! Many malformed schemas compile because unrecognized keyword shapes are
//! ignored. The invariant under test is **no panics**, and that a failure
//! produces no output at all.

use jsonschema_ts_core::{compile, CompileOptions};
use proptest::prelude::*;
use serde_json::json;

fn default_opts() -> CompileOptions {
    CompileOptions::default()
}

// ===========================================================================
// 1. Deterministic negative tests: known malformed schemas
// ===========================================================================

/// `required` must be an array, not a string.
#[test]
fn malformed_required_as_string() {
    let schema = json!({
        "type": "object",
        "properties": { "name": { "type": "string" } },
        "required": "not_an_array"
    });
    let _ = compile(&schema, "Root", &default_opts());
}

/// `anyOf` must be an array, not an object.
#[test]
fn malformed_anyof_as_object() {
    let schema = json!({ "anyOf": { "not": "an_array" } });
    let _ = compile(&schema, "Root", &default_opts());
}

/// `properties` must be an object, not a string.
#[test]
fn malformed_properties_as_string() {
    let schema = json!({ "type": "object", "properties": "a_string" });
    let _ = compile(&schema, "Root", &default_opts());
}

/// `type` must be a string (or array of strings), not a number.
#[test]
fn malformed_type_as_number() {
    let schema = json!({ "type": 42 });
    let _ = compile(&schema, "Root", &default_opts());
}

/// `items` must be a schema or a list of schemas, not a number.
#[test]
fn malformed_items_as_number() {
    let schema = json!({ "type": "array", "items": 42, "minItems": 2 });
    let _ = compile(&schema, "Root", &default_opts());
}

/// `$ref` must be a string, not a number.
#[test]
fn malformed_ref_as_number() {
    let schema = json!({ "$ref": 42 });
    let _ = compile(&schema, "Root", &default_opts());
}

/// `tsEnumNames` that do not line up with `enum`.
#[test]
fn malformed_ts_enum_names() {
    let schema = json!({
        "title": "Status",
        "enum": ["a", "b"],
        "tsEnumNames": ["OnlyOne", 7]
    });
    let output = compile(&schema, "Root", &default_opts()).expect("falls back to derived labels");
    assert!(output.contains("A = \"a\""));
}

/// `extends` pointing at something that is not a class.
#[test]
fn malformed_extends_target() {
    let schema = json!({
        "title": "Child",
        "extends": { "type": "string" },
        "properties": { "a": { "type": "number" } }
    });
    let _ = compile(&schema, "Root", &default_opts());
}

// ===========================================================================
// 2. Rejected inputs: errors, never partial output
// ===========================================================================

/// Unresolvable `$ref`: points to a non-existent definition.
#[test]
fn malformed_unresolvable_ref() {
    let schema = json!({ "$ref": "#/$defs/DoesNotExist" });
    assert!(compile(&schema, "Root", &default_opts()).is_err());
}

/// Negative `minItems` is a validation error.
#[test]
fn malformed_negative_min_items() {
    let schema = json!({ "type": "array", "items": { "type": "string" }, "minItems": -1 });
    assert!(compile(&schema, "Root", &default_opts()).is_err());
}

/// Invalid regex as a `patternProperties` key.
#[test]
fn malformed_invalid_pattern_property() {
    let schema = json!({
        "type": "object",
        "patternProperties": { "[invalid": { "type": "string" } }
    });
    assert!(compile(&schema, "Root", &default_opts()).is_err());
}

/// Non-JSON-Pointer fragment.
#[test]
fn malformed_anchor_fragment() {
    let schema = json!({ "properties": { "a": { "$ref": "#anchor" } } });
    assert!(compile(&schema, "Root", &default_opts()).is_err());
}

// ===========================================================================
// 3. Edge cases: valid but unusual
// ===========================================================================

#[test]
fn edge_case_boolean_schemas() {
    assert_eq!(
        compile(&json!(false), "Nothing", &default_opts()).unwrap(),
        "export type Nothing = never;\n"
    );
    assert_eq!(
        compile(&json!(true), "Anything", &default_opts()).unwrap(),
        "export type Anything = unknown;\n"
    );
}

/// Non-object roots compile to the placeholder type.
#[test]
fn edge_case_non_object_roots() {
    for schema in [json!(null), json!(42), json!("just_a_string"), json!([1, 2, 3])] {
        let _ = compile(&schema, "Root", &default_opts());
    }
}

/// Huge bounds fall back to an array instead of spelling out the tuple.
#[test]
fn edge_case_huge_min_items() {
    let schema = json!({ "type": "array", "minItems": 4_000_000_000u64 });
    let output = compile(&schema, "Root", &default_opts()).unwrap();
    assert!(output.ends_with("export type Root = unknown[];\n"), "{output}");
}

/// Without the cap, huge bounds still must not be materialized.
#[test]
fn edge_case_huge_max_items_uncapped() {
    let schema = json!({ "type": "array", "items": { "type": "string" }, "maxItems": 1_000_000_000_000u64 });
    let options = CompileOptions {
        max_items: -1,
        ..CompileOptions::default()
    };
    let output = compile(&schema, "Root", &options).unwrap();
    assert!(output.ends_with("export type Root = string[];\n"), "{output}");
}

/// Deeply nested malformed schema buried several levels deep.
#[test]
fn malformed_deeply_nested() {
    let schema = json!({
        "type": "object",
        "properties": {
            "level1": {
                "type": "object",
                "properties": {
                    "level2": {
                        "type": "object",
                        "properties": { "level3": { "required": 42 } }
                    }
                }
            }
        }
    });
    let _ = compile(&schema, "Root", &default_opts());
}

// ===========================================================================
// 4. Property-based negative tests: proptest strategies
// ===========================================================================

/// Strategy: a JSON Schema keyword with the WRONG value type.
fn arb_malformed_keyword() -> impl Strategy<Value = (&'static str, serde_json::Value)> {
    prop_oneof![
        Just(("required", json!("not_an_array"))),
        Just(("required", json!({"key": "value"}))),
        Just(("properties", json!("not_an_object"))),
        Just(("properties", json!(["a", "b"]))),
        Just(("type", json!(42))),
        Just(("type", json!([1, 2, 3]))),
        Just(("type", json!(null))),
        Just(("allOf", json!({"type": "string"}))),
        Just(("anyOf", json!("bad"))),
        Just(("oneOf", json!(true))),
        Just(("items", json!(99))),
        Just(("items", json!([1, "bad"]))),
        Just(("enum", json!("bad"))),
        Just(("enum", json!([]))),
        Just(("const", json!({"nested": [1]}))),
        Just(("$ref", json!(42))),
        Just(("$ref", json!("#/nowhere"))),
        Just(("$ref", json!("#"))),
        Just(("additionalProperties", json!([1, 2]))),
        Just(("additionalItems", json!("bad"))),
        Just(("minItems", json!(-3))),
        Just(("maxItems", json!(1.5))),
        Just(("tsType", json!(7))),
        Just(("deprecated", json!("soon"))),
        Just(("extends", json!(12))),
    ]
}

/// Strategy: a malformed schema with 1-3 wrong keywords.
fn arb_malformed_schema() -> impl Strategy<Value = serde_json::Value> {
    proptest::collection::vec(arb_malformed_keyword(), 1..=3).prop_map(|keywords| {
        let mut obj = serde_json::Map::new();
        for (key, value) in keywords {
            obj.insert(key.to_string(), value);
        }
        serde_json::Value::Object(obj)
    })
}

proptest! {
    #![proptest_config(ProptestConfig { cases: 128, ..Default::default() })]

    /// Property: `compile()` NEVER panics on malformed schemas.
    #[test]
    fn compile_never_panics_on_malformed(schema in arb_malformed_schema()) {
        let _ = compile(&schema, "Root", &default_opts());
    }

    /// Property: the same schema nested under a property does not panic
    /// either, and errors carry a message.
    #[test]
    fn compile_errors_have_messages(schema in arb_malformed_schema()) {
        let wrapped = json!({ "type": "object", "properties": { "field": schema } });
        if let Err(e) = compile(&wrapped, "Root", &default_opts()) {
            prop_assert!(!e.to_string().is_empty(), "CompileError message should be non-empty");
        }
    }
}
