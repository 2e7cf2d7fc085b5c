//! Compile-then-evaluate tests over real schemas, across dialects.

use jsonschema_vm::{
    compile, evaluate, evaluate_in, evaluate_with, CompileError, EvaluateError,
    EvaluationContext, EvaluationMode, Step, StepKind,
};
use serde_json::{json, Value};

fn check(schema: &Value, instance: Value, expected: bool) {
    let template = compile(schema)
        .unwrap_or_else(|error| panic!("compile({schema}) failed: {error}"));
    let result = evaluate(&template, &instance)
        .unwrap_or_else(|error| panic!("evaluate({instance}) failed: {error}"));
    assert_eq!(result, expected, "schema: {schema}, instance: {instance}");
}

// ------------------------------------------------------------- Assertions

#[test]
fn test_type_and_required() {
    let schema = json!({
        "type": "object",
        "properties": {"name": {"type": "string"}},
        "required": ["name"]
    });
    check(&schema, json!({"name": "a"}), true);
    check(&schema, json!({"name": 1}), false);
    check(&schema, json!({}), false);
    check(&schema, json!("not an object"), false);
}

#[test]
fn test_enum_and_const_compare_numerically() {
    let schema = json!({"enum": [1, "two", [3]]});
    check(&schema, json!(1.0), true);
    check(&schema, json!("two"), true);
    check(&schema, json!([3.0]), true);
    check(&schema, json!(2), false);

    let schema = json!({"const": {"n": 1}});
    check(&schema, json!({"n": 1.0}), true);
    check(&schema, json!({"n": 2}), false);
}

#[test]
fn test_numeric_bounds() {
    let schema = json!({"minimum": 2, "maximum": 10, "multipleOf": 2});
    check(&schema, json!(4), true);
    check(&schema, json!(2), true);
    check(&schema, json!(1), false);
    check(&schema, json!(12), false);
    check(&schema, json!(5), false);
    // Numeric keywords do not apply to non-numbers.
    check(&schema, json!("text"), true);

    let schema = json!({"exclusiveMinimum": 2, "exclusiveMaximum": 4});
    check(&schema, json!(3), true);
    check(&schema, json!(2), false);
    check(&schema, json!(4), false);
}

#[test]
fn test_draft4_boolean_exclusive_minimum() {
    let schema = json!({
        "$schema": "http://json-schema.org/draft-04/schema#",
        "minimum": 2,
        "exclusiveMinimum": true
    });
    check(&schema, json!(3), true);
    check(&schema, json!(2), false);
}

#[test]
fn test_string_assertions() {
    let schema = json!({"minLength": 2, "maxLength": 4, "pattern": "^a"});
    check(&schema, json!("ab"), true);
    check(&schema, json!("a"), false);
    check(&schema, json!("abcde"), false);
    check(&schema, json!("ba"), false);
    check(&schema, json!(7), true);
}

#[test]
fn test_array_and_object_sizes() {
    let schema = json!({"minItems": 1, "maxItems": 2, "uniqueItems": true});
    check(&schema, json!([1]), true);
    check(&schema, json!([]), false);
    check(&schema, json!([1, 2, 3]), false);
    check(&schema, json!([1, 1.0]), false);
    check(&schema, json!({"not": "an array"}), true);

    let schema = json!({"minProperties": 1, "maxProperties": 2});
    check(&schema, json!({"a": 1}), true);
    check(&schema, json!({}), false);
    check(&schema, json!({"a": 1, "b": 2, "c": 3}), false);
}

#[test]
fn test_dependent_required() {
    let schema = json!({"dependentRequired": {"credit": ["billing"]}});
    check(&schema, json!({"credit": 1, "billing": 2}), true);
    check(&schema, json!({"credit": 1}), false);
    check(&schema, json!({"billing": 2}), true);
    check(&schema, json!({}), true);
}

// ------------------------------------------------------------ Applicators

#[test]
fn test_logical_combinators() {
    let schema = json!({"allOf": [{"type": "object"}, {"required": ["a"]}]});
    check(&schema, json!({"a": 1}), true);
    check(&schema, json!({}), false);

    let schema = json!({"anyOf": [{"type": "string"}, {"type": "integer"}]});
    check(&schema, json!("s"), true);
    check(&schema, json!(1), true);
    check(&schema, json!(1.5), false);

    let schema = json!({"oneOf": [{"type": "integer"}, {"minimum": 10}]});
    check(&schema, json!(5), true);
    check(&schema, json!(11.5), true);
    check(&schema, json!(12), false);
    check(&schema, json!(1.5), false);

    let schema = json!({"not": {"type": "string"}});
    check(&schema, json!(1), true);
    check(&schema, json!("s"), false);
}

#[test]
fn test_if_then_else() {
    let schema = json!({
        "if": {"type": "object"},
        "then": {"required": ["a"]},
        "else": {"type": "string"}
    });
    check(&schema, json!({"a": 1}), true);
    check(&schema, json!({}), false);
    check(&schema, json!("text"), true);
    check(&schema, json!(7), false);
}

#[test]
fn test_dependent_schemas() {
    let schema = json!({
        "dependentSchemas": {
            "credit": {"required": ["billing"], "properties": {"billing": {"type": "string"}}}
        }
    });
    check(&schema, json!({"credit": 1, "billing": "x"}), true);
    check(&schema, json!({"credit": 1, "billing": 2}), false);
    check(&schema, json!({"credit": 1}), false);
    check(&schema, json!({"other": 1}), true);
}

#[test]
fn test_object_applicators() {
    let schema = json!({
        "properties": {"a": {"type": "integer"}},
        "patternProperties": {"^x-": {"type": "string"}},
        "additionalProperties": {"type": "boolean"}
    });
    check(&schema, json!({"a": 1, "x-h": "v", "other": true}), true);
    check(&schema, json!({"a": "not an integer"}), false);
    check(&schema, json!({"x-h": 1}), false);
    check(&schema, json!({"other": "not a boolean"}), false);
    check(&schema, json!({}), true);
}

#[test]
fn test_property_names() {
    let schema = json!({"propertyNames": {"minLength": 2, "pattern": "^[a-z]+$"}});
    check(&schema, json!({"ab": 1, "cd": 2}), true);
    check(&schema, json!({"a": 1}), false);
    check(&schema, json!({"AB": 1}), false);
    check(&schema, json!([1, 2]), true);
}

#[test]
fn test_prefix_items_and_items() {
    let schema = json!({
        "prefixItems": [{"type": "string"}, {"type": "integer"}],
        "items": {"type": "boolean"}
    });
    check(&schema, json!(["s", 1, true, false]), true);
    check(&schema, json!(["s", 1]), true);
    check(&schema, json!(["s"]), true);
    check(&schema, json!([]), true);
    check(&schema, json!([1]), false);
    check(&schema, json!(["s", 1, "not a boolean"]), false);
}

#[test]
fn test_contains_with_bounds() {
    let schema = json!({"contains": {"type": "integer"}});
    check(&schema, json!(["a", 1]), true);
    check(&schema, json!(["a", "b"]), false);

    let schema = json!({
        "contains": {"type": "integer"},
        "minContains": 2,
        "maxContains": 3
    });
    check(&schema, json!([1, "x", 2]), true);
    check(&schema, json!([1]), false);
    check(&schema, json!([1, 2, 3, 4]), false);

    let schema = json!({"contains": {"type": "integer"}, "minContains": 0});
    check(&schema, json!(["a"]), true);
}

// ------------------------------------------------------- Older dialects

#[test]
fn test_draft7_tuple_items_and_additional_items() {
    let schema = json!({
        "$schema": "http://json-schema.org/draft-07/schema#",
        "items": [{"type": "string"}, {"type": "integer"}],
        "additionalItems": {"type": "boolean"}
    });
    check(&schema, json!(["s", 1, true]), true);
    check(&schema, json!(["s", 1, "x"]), false);
    check(&schema, json!([1]), false);
}

#[test]
fn test_draft7_dependencies_both_forms() {
    let schema = json!({
        "$schema": "http://json-schema.org/draft-07/schema#",
        "dependencies": {
            "a": ["b"],
            "c": {"required": ["d"]}
        }
    });
    check(&schema, json!({"a": 1, "b": 2}), true);
    check(&schema, json!({"a": 1}), false);
    check(&schema, json!({"c": 1, "d": 2}), true);
    check(&schema, json!({"c": 1}), false);
    check(&schema, json!({}), true);
}

#[test]
fn test_draft7_ref_hides_siblings() {
    let schema = json!({
        "$schema": "http://json-schema.org/draft-07/schema#",
        "definitions": {"any": true},
        "$ref": "#/definitions/any",
        "type": "string"
    });
    // The sibling `type` is invisible next to `$ref` in Draft 7.
    check(&schema, json!(42), true);
}

// ------------------------------------------------------------- References

#[test]
fn test_recursive_ref_through_defs() {
    let schema = json!({
        "type": "object",
        "properties": {"next": {"$ref": "#"}},
        "additionalProperties": false
    });
    check(&schema, json!({"next": {"next": {}}}), true);
    check(&schema, json!({"next": "not an object"}), false);
    check(&schema, json!({"other": 1}), false);

    let schema = json!({
        "$ref": "#/$defs/node",
        "$defs": {
            "node": {
                "type": "object",
                "properties": {"value": {"type": "integer"}, "next": {"$ref": "#/$defs/node"}},
                "required": ["value"]
            }
        }
    });
    check(&schema, json!({"value": 1, "next": {"value": 2}}), true);
    check(&schema, json!({"value": 1, "next": {}}), false);
}

#[test]
fn test_unresolvable_reference_is_a_compile_error() {
    let schema = json!({"$ref": "https://example.com/elsewhere"});
    assert!(matches!(
        compile(&schema),
        Err(CompileError::UnresolvableReference(_))
    ));
}

#[test]
fn test_unknown_dialect_is_a_compile_error() {
    let schema = json!({"$schema": "https://example.com/custom-dialect"});
    assert!(matches!(compile(&schema), Err(CompileError::UnknownDialect(_))));
}

#[test]
fn test_reference_cycle_without_base_case_hits_the_ceiling() {
    let schema = json!({"$ref": "#"});
    let template = compile(&schema).unwrap();
    assert_eq!(
        evaluate(&template, &json!(null)).unwrap_err(),
        EvaluateError::TraversalDepthExceeded
    );
}

#[test]
fn test_recursive_ref_2019_09() {
    let schema = json!({
        "$schema": "https://json-schema.org/draft/2019-09/schema",
        "$recursiveAnchor": true,
        "type": "object",
        "properties": {"child": {"$recursiveRef": "#"}}
    });
    check(&schema, json!({"child": {"child": {}}}), true);
    check(&schema, json!({"child": 3}), false);
}

#[test]
fn test_dynamic_ref_resolves_against_live_scope_not_lexical_nesting() {
    // Resources a and b both define anchor "x"; b is lexically inside a
    // but is never entered on this evaluation path, so only a's anchor is
    // live. A lexical resolver would pick b's string schema and accept the
    // wrong instances.
    let schema = json!({
        "$id": "https://example.com/a",
        "$defs": {
            "ax": {"$dynamicAnchor": "x", "type": "integer"},
            "b": {
                "$id": "https://example.com/b",
                "$dynamicAnchor": "x",
                "type": "string"
            }
        },
        "properties": {"value": {"$dynamicRef": "#x"}}
    });
    check(&schema, json!({"value": 3}), true);
    check(&schema, json!({"value": "three"}), false);
}

#[test]
fn test_dynamic_ref_to_plain_anchor_degrades_to_static() {
    let schema = json!({
        "$defs": {"target": {"$anchor": "t", "type": "integer"}},
        "properties": {"value": {"$dynamicRef": "#t"}}
    });
    check(&schema, json!({"value": 3}), true);
    check(&schema, json!({"value": "three"}), false);
}

// ------------------------------------------------------------ Unevaluated

#[test]
fn test_unevaluated_properties_end_to_end() {
    let schema = json!({
        "type": "object",
        "properties": {"a": {"type": "integer"}},
        "unevaluatedProperties": false
    });
    check(&schema, json!({"a": 1}), true);
    check(&schema, json!({"a": 1, "b": 2}), false);

    // The failure is attributable to the unevaluated loop through the
    // trace.
    let template = compile(&schema).unwrap();
    let instance = json!({"a": 1, "b": 2});
    let mut blamed = false;
    {
        let mut callback = |result: bool,
                            step: &Step,
                            _evaluate_path: &jsonschema_vm_pointer::WeakPointer<'_>,
                            _instance_location: &jsonschema_vm_pointer::WeakPointer<'_>,
                            _annotation: Option<&Value>| {
            if !result && matches!(step.kind, StepKind::LoopPropertiesUnevaluated { .. }) {
                blamed = true;
            }
        };
        let result = evaluate_with(
            &template,
            &instance,
            EvaluationMode::Exhaustive,
            &mut callback,
        )
        .unwrap();
        assert!(!result);
    }
    assert!(blamed);
}

#[test]
fn test_unevaluated_properties_sees_sibling_applicators() {
    let schema = json!({
        "allOf": [{"properties": {"a": {"type": "integer"}}}],
        "patternProperties": {"^x-": true},
        "unevaluatedProperties": false
    });
    check(&schema, json!({"a": 1, "x-h": "anything"}), true);
    check(&schema, json!({"a": 1, "other": 2}), false);
}

#[test]
fn test_failed_if_does_not_leak_annotations_into_unevaluated() {
    let schema = json!({
        "if": {"properties": {"a": {"type": "integer"}}, "required": ["a"]},
        "then": true,
        "unevaluatedProperties": false
    });
    // The condition holds: its `properties` annotation marks "a" as
    // evaluated.
    check(&schema, json!({"a": 1}), true);
    // The condition fails: whatever it annotated is masked, so "a" is
    // unevaluated.
    check(&schema, json!({"a": "text"}), false);
}

#[test]
fn test_unevaluated_items() {
    let schema = json!({
        "prefixItems": [{"type": "integer"}],
        "unevaluatedItems": false
    });
    check(&schema, json!([1]), true);
    check(&schema, json!([1, 2]), false);
    check(&schema, json!([]), true);

    let schema = json!({
        "prefixItems": [{"type": "integer"}],
        "items": true,
        "unevaluatedItems": false
    });
    check(&schema, json!([1, "anything"]), true);

    let schema = json!({
        "contains": {"type": "integer"},
        "unevaluatedItems": {"type": "string"}
    });
    check(&schema, json!([1, "s", 2]), true);
    check(&schema, json!([1, true]), false);
}

// ------------------------------------------------------------ Annotations

#[test]
fn test_annotation_keywords_populate_the_store() {
    let schema = json!({
        "title": "Thing",
        "properties": {"a": {"description": "the a"}}
    });
    let template = compile(&schema).unwrap();
    let instance = json!({"a": 1});
    let mut context = EvaluationContext::new();
    let result = evaluate_in(
        &template,
        &instance,
        EvaluationMode::Exhaustive,
        &mut context,
        None,
    )
    .unwrap();
    assert!(result);

    let annotations = context.annotations();
    let values: Vec<&Value> = annotations
        .values()
        .flat_map(|by_schema| by_schema.values())
        .flatten()
        .collect();
    assert!(values.contains(&&json!("Thing")));
    assert!(values.contains(&&json!("the a")));
}

#[test]
fn test_boolean_schemas() {
    check(&json!(true), json!({"anything": 1}), true);
    check(&json!(false), json!({"anything": 1}), false);
    let schema = json!({"properties": {"a": false}});
    check(&schema, json!({}), true);
    check(&schema, json!({"a": 1}), false);
}
