//! Interpreter tests over hand-built templates: the step kinds, guard
//! semantics, short-circuiting, control flow, and context bookkeeping,
//! without the compiler in the picture.

use jsonschema_vm::steps::JsonType;
use jsonschema_vm::{
    evaluate, evaluate_in, evaluate_with, EvaluateError, EvaluationContext, EvaluationMode, Step,
    StepKind, Target, TargetType, Template,
};
use jsonschema_vm_pointer::{pointer, Pointer};
use serde_json::{json, Value};

fn step(kind: StepKind) -> Step {
    Step {
        target: Target::instance(),
        relative_schema_location: Pointer::new(),
        relative_instance_location: Pointer::new(),
        keyword_location: "#".to_string(),
        condition: Vec::new(),
        kind,
    }
}

fn step_at(schema_location: Pointer, kind: StepKind) -> Step {
    Step {
        relative_schema_location: schema_location,
        ..step(kind)
    }
}

fn guarded(mut base: Step, condition: Vec<Step>) -> Step {
    base.condition = condition;
    base
}

fn template(steps: Vec<Step>) -> Template {
    Template {
        steps,
        dynamic: false,
    }
}

fn defines(property: &str) -> Step {
    step(StepKind::Defines {
        property: property.to_string(),
    })
}

fn type_is(expected: JsonType) -> Step {
    step(StepKind::Type { expected })
}

#[test]
fn test_defines_no_condition() {
    let steps = template(vec![defines("foo")]);
    assert!(evaluate(&steps, &json!({"foo": 1})).unwrap());
    assert!(!evaluate(&steps, &json!({"bar": 1})).unwrap());
    assert!(!evaluate(&steps, &json!("foo")).unwrap());
}

#[test]
fn test_defines_with_condition() {
    let steps = template(vec![guarded(defines("bar"), vec![defines("foo")])]);
    assert!(evaluate(&steps, &json!({"foo": 1, "bar": 2})).unwrap());
    // The guard fails, so the assertion is vacuously true.
    assert!(evaluate(&steps, &json!({"baz": 1})).unwrap());
    // The guard holds and the assertion does not.
    assert!(!evaluate(&steps, &json!({"foo": 1})).unwrap());
}

#[test]
fn test_fail_with_condition() {
    let steps = template(vec![step(StepKind::Fail)]);
    assert!(!evaluate(&steps, &json!({"foo": 1})).unwrap());

    let steps = template(vec![guarded(step(StepKind::Fail), vec![defines("foo")])]);
    assert!(!evaluate(&steps, &json!({"foo": 1})).unwrap());
    assert!(evaluate(&steps, &json!({"bar": 1})).unwrap());
}

#[test]
fn test_type_assertion() {
    let steps = template(vec![type_is(JsonType::Object)]);
    assert!(evaluate(&steps, &json!({"foo": 1})).unwrap());
    assert!(!evaluate(&steps, &json!("foo")).unwrap());
}

#[test]
fn test_empty_or_is_true() {
    let steps = template(vec![step(StepKind::Or {
        children: Vec::new(),
    })]);
    assert!(evaluate(&steps, &json!({"foo": 1})).unwrap());
}

#[test]
fn test_or_and_xor_connectives() {
    let or = template(vec![step(StepKind::Or {
        children: vec![type_is(JsonType::String), type_is(JsonType::Object)],
    })]);
    assert!(evaluate(&or, &json!({})).unwrap());
    assert!(!evaluate(&or, &json!(3)).unwrap());

    let and = template(vec![step(StepKind::And {
        children: vec![type_is(JsonType::Object), defines("foo")],
    })]);
    assert!(evaluate(&and, &json!({"foo": 1})).unwrap());
    assert!(!evaluate(&and, &json!({})).unwrap());

    let xor = template(vec![step(StepKind::Xor {
        children: vec![
            type_is(JsonType::Integer),
            type_is(JsonType::Number),
            type_is(JsonType::String),
        ],
    })]);
    // 2.5 is a number but not an integer: exactly one child holds.
    assert!(evaluate(&xor, &json!(2.5)).unwrap());
    // 2 is both: two children hold.
    assert!(!evaluate(&xor, &json!(2)).unwrap());
    assert!(!evaluate(&xor, &json!(null)).unwrap());
}

#[test]
fn test_not_and_when_type() {
    let not = template(vec![step(StepKind::Not {
        children: vec![type_is(JsonType::String)],
    })]);
    assert!(evaluate(&not, &json!(1)).unwrap());
    assert!(!evaluate(&not, &json!("s")).unwrap());

    let when = template(vec![step(StepKind::WhenType {
        expected: JsonType::Object,
        children: vec![defines("foo")],
    })]);
    assert!(evaluate(&when, &json!({"foo": 1})).unwrap());
    assert!(!evaluate(&when, &json!({"bar": 1})).unwrap());
    // Not an object: the container does not apply.
    assert!(evaluate(&when, &json!("anything")).unwrap());
}

#[test]
fn test_fast_mode_short_circuits_or() {
    let steps = template(vec![step(StepKind::Or {
        children: vec![
            type_is(JsonType::String),
            type_is(JsonType::Object),
            type_is(JsonType::Array),
        ],
    })]);
    let instance = json!({});

    let count_children = |mode: EvaluationMode| {
        let mut visited = 0usize;
        {
            let mut callback = |_result: bool,
                                step: &Step,
                                _evaluate_path: &jsonschema_vm_pointer::WeakPointer<'_>,
                                _instance_location: &jsonschema_vm_pointer::WeakPointer<'_>,
                                _annotation: Option<&Value>| {
                if matches!(step.kind, StepKind::Type { .. }) {
                    visited += 1;
                }
            };
            let result = evaluate_with(&steps, &instance, mode, &mut callback).unwrap();
            assert!(result);
        }
        visited
    };

    // Children 0 and 1 only, versus all three.
    assert_eq!(count_children(EvaluationMode::Fast), 2);
    assert_eq!(count_children(EvaluationMode::Exhaustive), 3);
}

#[test]
fn test_mark_and_jump() {
    let label = 7;
    let steps = template(vec![
        step(StepKind::Mark {
            id: label,
            children: vec![type_is(JsonType::Object)],
        }),
        step_at(
            pointer!["$ref"],
            StepKind::Jump {
                id: label,
                schema_resource: String::new(),
                dynamic: false,
            },
        ),
    ]);
    assert!(evaluate(&steps, &json!({})).unwrap());
    assert!(!evaluate(&steps, &json!([])).unwrap());
}

#[test]
fn test_unregistered_jump_target_is_a_fault() {
    let steps = template(vec![step(StepKind::Jump {
        id: 9,
        schema_resource: String::new(),
        dynamic: false,
    })]);
    assert_eq!(
        evaluate(&steps, &json!({})).unwrap_err(),
        EvaluateError::UnregisteredLabel(9)
    );
}

#[test]
fn test_jump_cycle_hits_the_depth_ceiling() {
    let label = 11;
    let steps = template(vec![
        step(StepKind::Mark {
            id: label,
            children: vec![step_at(
                pointer!["$ref"],
                StepKind::Jump {
                    id: label,
                    schema_resource: String::new(),
                    dynamic: false,
                },
            )],
        }),
        step_at(
            pointer!["$ref"],
            StepKind::Jump {
                id: label,
                schema_resource: String::new(),
                dynamic: false,
            },
        ),
    ]);
    assert_eq!(
        evaluate(&steps, &json!(null)).unwrap_err(),
        EvaluateError::TraversalDepthExceeded
    );
}

#[test]
fn test_dynamic_jump_resolves_through_live_resources() {
    let anchor_a = jsonschema_vm::anchor_label("res-a", "x");
    let body = jsonschema_vm::anchor_label("", "/");
    let steps = template(vec![
        step(StepKind::Mark {
            id: anchor_a,
            children: vec![type_is(JsonType::Integer)],
        }),
        step(StepKind::Mark {
            id: body,
            children: vec![step_at(
                pointer!["$dynamicRef"],
                StepKind::DynamicJump {
                    anchor: "x".to_string(),
                },
            )],
        }),
        step_at(
            pointer![],
            StepKind::Jump {
                id: body,
                schema_resource: "res-a".to_string(),
                dynamic: true,
            },
        ),
    ]);

    assert!(evaluate(&steps, &json!(3)).unwrap());
    assert!(!evaluate(&steps, &json!("three")).unwrap());
}

#[test]
fn test_dynamic_jump_without_live_anchor_fails_validation() {
    let steps = template(vec![step(StepKind::DynamicJump {
        anchor: "nowhere".to_string(),
    })]);
    // An unsatisfiable dynamic reference is a validation failure, not a
    // machinery fault.
    assert_eq!(evaluate(&steps, &json!(null)), Ok(false));
}

#[test]
fn test_template_instance_target() {
    let mut child = type_is(JsonType::Integer);
    child.target = Target::of(TargetType::TemplateInstance);
    let steps = template(vec![step(StepKind::LoopContains {
        bounds: jsonschema_vm::steps::ContainsBounds {
            minimum: 2,
            maximum: None,
            exhaustive: false,
        },
        children: vec![child],
    })]);

    assert!(evaluate(&steps, &json!([1, "a", 2])).unwrap());
    assert!(!evaluate(&steps, &json!([1, "a", "b"])).unwrap());
}

#[test]
fn test_contains_bounds() {
    let make = |minimum: u64, maximum: Option<u64>| {
        template(vec![step(StepKind::LoopContains {
            bounds: jsonschema_vm::steps::ContainsBounds {
                minimum,
                maximum,
                exhaustive: false,
            },
            children: vec![step(StepKind::Equal { value: json!(1) })],
        })])
    };

    assert!(evaluate(&make(1, None), &json!([0, 1, 2])).unwrap());
    assert!(!evaluate(&make(2, None), &json!([0, 1, 2])).unwrap());
    assert!(evaluate(&make(0, None), &json!([])).unwrap());
    assert!(!evaluate(&make(1, Some(2)), &json!([1, 1, 1])).unwrap());
    assert!(evaluate(&make(1, Some(3)), &json!([1, 1, 1])).unwrap());
}

#[test]
fn test_key_target_through_key_loop() {
    let mut child = step(StepKind::MinLength { limit: 2 });
    child.target = Target::of(TargetType::Key);
    let steps = template(vec![step(StepKind::LoopKeys {
        children: vec![child],
    })]);

    assert!(evaluate(&steps, &json!({"ab": 1, "abc": 2})).unwrap());
    assert!(!evaluate(&steps, &json!({"a": 1})).unwrap());
}

#[test]
fn test_loop_items_origin() {
    let from_one = template(vec![step(StepKind::LoopItems {
        origin: jsonschema_vm::steps::ItemsOrigin::Index(1),
        children: vec![type_is(JsonType::Integer)],
    })]);
    // The first element is exempt.
    assert!(evaluate(&from_one, &json!(["skip", 1, 2])).unwrap());
    assert!(!evaluate(&from_one, &json!(["skip", 1, "x"])).unwrap());
}

#[test]
fn test_stacks_are_balanced_after_evaluation() {
    let instance = json!({"foo": {"bar": [1, 2]}});
    let steps = template(vec![
        step(StepKind::And {
            children: vec![defines("foo")],
        }),
        step(StepKind::LoopProperties {
            selection: jsonschema_vm::steps::PropertySelection::NotMatching {
                names: Vec::new(),
                patterns: Vec::new(),
            },
            children: vec![type_is(JsonType::Object)],
        }),
    ]);

    let mut context = EvaluationContext::new();
    let result = evaluate_in(
        &steps,
        &instance,
        EvaluationMode::Exhaustive,
        &mut context,
        None,
    )
    .unwrap();
    assert!(result);
    assert_eq!(context.instances().len(), 1);
    assert!(context.resources().is_empty());
    assert!(context.evaluate_path().is_empty());
    assert!(context.instance_location().is_empty());
}

#[test]
fn test_annotation_store_is_deterministic_across_runs() {
    let instance = json!({"a": 1});
    let steps = template(vec![
        step_at(
            pointer!["title"],
            StepKind::Annotation {
                payload: jsonschema_vm::steps::AnnotationPayload::Value(json!("A title")),
            },
        ),
        step(StepKind::LoopProperties {
            selection: jsonschema_vm::steps::PropertySelection::NotMatching {
                names: Vec::new(),
                patterns: Vec::new(),
            },
            children: vec![step(StepKind::Annotation {
                payload: jsonschema_vm::steps::AnnotationPayload::BasenameToParent,
            })],
        }),
    ]);

    let mut context = EvaluationContext::new();
    evaluate_in(
        &steps,
        &instance,
        EvaluationMode::Exhaustive,
        &mut context,
        None,
    )
    .unwrap();
    let first = context.annotations().clone();
    assert!(!first.is_empty());

    evaluate_in(
        &steps,
        &instance,
        EvaluationMode::Exhaustive,
        &mut context,
        None,
    )
    .unwrap();
    assert_eq!(context.annotations(), &first);
}
