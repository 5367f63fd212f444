//! Local Reference Tests
//!
//! Resolution and re-emission of references that stay within one document.

use schema_graph::{DocumentRegistry, Items, JsonType, SchemaError};
use serde_json::json;

// =============================================================================
// Resolution
// =============================================================================

#[test]
fn test_property_reference_into_definitions() {
    let (registry, root) = DocumentRegistry::from_json(
        r##"{
            "type": "object",
            "properties": { "foo": { "$ref": "#/definitions/Foo" } },
            "definitions": { "Foo": { "type": "integer" } }
        }"##,
    )
    .unwrap();

    let foo = registry.node(root).properties["foo"];
    assert!(registry.node(foo).is_pointer());
    assert!(registry.actual(foo).has_type(JsonType::Integer));
    assert_eq!(registry.document_count(), 1);
}

#[test]
fn test_reference_into_extension_data() {
    // `collection` has no schema keyword `bar`; the pointer addresses into
    // its extension data directly, with no intermediate path segment.
    let (registry, root) = DocumentRegistry::from_json(
        r##"{
            "type": "object",
            "properties": { "foo": { "$ref": "#/definitions/collection/bar" } },
            "definitions": { "collection": { "bar": { "type": "integer" } } }
        }"##,
    )
    .unwrap();

    let foo = registry.node(root).properties["foo"];
    assert!(registry.actual(foo).has_type(JsonType::Integer));
}

#[test]
fn test_indirection_chain_collapses() {
    let (registry, root) = DocumentRegistry::from_json(
        r##"{
            "properties": { "foo": { "$ref": "#/definitions/alias" } },
            "definitions": {
                "alias": { "$ref": "#/definitions/real" },
                "real": { "type": "string" }
            }
        }"##,
    )
    .unwrap();

    let foo = registry.node(root).properties["foo"];
    let real = registry.node(root).definitions["real"];
    assert_eq!(registry.node(foo).resolved, Some(real));
}

#[test]
fn test_unresolvable_reference_fails() {
    let err = DocumentRegistry::from_json(
        r##"{ "properties": { "foo": { "$ref": "#/definitions/Nope" } } }"##,
    )
    .unwrap_err();
    match err {
        SchemaError::ReferenceNotFound { reference, .. } => {
            assert_eq!(reference, "#/definitions/Nope");
        }
        other => panic!("Expected ReferenceNotFound, got {:?}", other),
    }
}

#[test]
fn test_items_and_composition_references() {
    let (registry, root) = DocumentRegistry::from_json(
        r##"{
            "definitions": { "Id": { "type": "integer" } },
            "properties": {
                "ids": { "type": "array", "items": { "$ref": "#/definitions/Id" } },
                "either": {
                    "oneOf": [{ "$ref": "#/definitions/Id" }, { "type": "string" }]
                }
            }
        }"##,
    )
    .unwrap();

    let id = registry.node(root).definitions["Id"];
    let ids = registry.node(root).properties["ids"];
    let Items::Single(element) = registry.node(ids).items else {
        panic!("Expected single items schema");
    };
    assert_eq!(registry.node(element).resolved, Some(id));

    let either = registry.node(root).properties["either"];
    let first = registry.node(either).one_of[0];
    assert_eq!(registry.node(first).resolved, Some(id));
}

// =============================================================================
// Emission
// =============================================================================

#[test]
fn test_emission_recomputes_pointer_paths() {
    let (mut registry, _) = DocumentRegistry::from_json(
        r##"{
            "properties": { "role": { "$ref": "#/$defs/Role" } },
            "$defs": { "Role": { "type": "string", "enum": ["a", "b"] } }
        }"##,
    )
    .unwrap();

    let emitted = registry.to_json("").unwrap();
    assert_eq!(
        emitted["properties"]["role"]["$ref"],
        json!("#/definitions/Role")
    );
    assert_eq!(emitted["definitions"]["Role"]["enum"], json!(["a", "b"]));
}

#[test]
fn test_emission_is_byte_stable() {
    let (mut registry, _) = DocumentRegistry::from_json(
        r##"{
            "type": "object",
            "title": "Order",
            "properties": {
                "id": { "type": "integer" },
                "lines": { "type": "array", "items": { "$ref": "#/definitions/Line" } }
            },
            "required": ["id"],
            "definitions": {
                "Line": { "type": "object", "properties": { "sku": { "type": "string" } } }
            }
        }"##,
    )
    .unwrap();

    let first = registry.to_json("").unwrap().to_string();
    let (mut reparsed, _) = DocumentRegistry::from_json(&first).unwrap();
    let second = reparsed.to_json("").unwrap().to_string();
    assert_eq!(first, second);
}

#[test]
fn test_escaped_definition_names_round_trip() {
    let (mut registry, _) = DocumentRegistry::from_json(
        r##"{
            "properties": { "odd": { "$ref": "#/definitions/a~1b~0c" } },
            "definitions": { "a/b~c": { "type": "boolean" } }
        }"##,
    )
    .unwrap();

    let emitted = registry.to_json("").unwrap();
    assert_eq!(
        emitted["properties"]["odd"]["$ref"],
        json!("#/definitions/a~1b~0c")
    );
    assert_eq!(emitted["definitions"]["a/b~c"]["type"], json!("boolean"));
}

#[test]
fn test_sibling_of_boolean_schema_still_resolves() {
    let (registry, root) = DocumentRegistry::from_json(
        r##"{
            "properties": {
                "open": true,
                "foo": { "$ref": "#/definitions/Foo" }
            },
            "definitions": { "Foo": { "type": "integer" } }
        }"##,
    )
    .unwrap();

    let foo = registry.node(root).properties["foo"];
    assert!(registry.actual(foo).has_type(JsonType::Integer));
}

#[test]
fn test_boolean_schema_round_trips() {
    let (mut registry, _) = DocumentRegistry::from_json(
        r##"{ "properties": { "anything": true } }"##,
    )
    .unwrap();
    let emitted = registry.to_json("").unwrap();
    assert_eq!(emitted["properties"]["anything"], json!(true));
}
