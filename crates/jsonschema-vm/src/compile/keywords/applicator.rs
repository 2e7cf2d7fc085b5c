//! Applicator keywords: the logical combinators, the object and array
//! applicators, and the annotation-only keywords.

use jsonschema_vm_pointer::{pointer, Pointer};
use serde_json::Value;

use super::malformed;
use crate::compile::helpers::{
    make_annotation, make_applicator, make_assertion, relative_dynamic_context,
    relative_dynamic_context_for, type_condition,
};
use crate::compile::{
    compile_schema, compile_subschema, subschema_context, CompilerContext, Dialect,
    DynamicContext, SchemaContext,
};
use crate::error::CompileError;
use crate::steps::{
    AnnotationPayload, ContainsBounds, ItemsOrigin, JsonType, PropertySelection, RegexValue,
    Step, StepKind,
};

/// Compiles one element of a schema-array keyword into a conjunction step
/// of its own, so disjunctive combinators see one child per branch.
fn branch(
    context: &CompilerContext<'_>,
    schema_context: &SchemaContext<'_>,
    dynamic_context: &DynamicContext,
    keyword: &str,
    index: usize,
) -> Result<Step, CompileError> {
    let suffix = pointer![index];
    let child_context = subschema_context(context, schema_context, keyword, &suffix)?;
    let inner = compile_schema(
        context,
        &child_context,
        &relative_dynamic_context_for(dynamic_context),
    )?;

    let branch_dynamic = DynamicContext {
        keyword: String::new(),
        base_schema_location: suffix,
        base_instance_location: Pointer::new(),
        target_kind: dynamic_context.target_kind,
    };
    Ok(make_applicator(
        &child_context,
        &branch_dynamic,
        StepKind::And { children: inner },
        Vec::new(),
    ))
}

fn branches(
    context: &CompilerContext<'_>,
    schema_context: &SchemaContext<'_>,
    dynamic_context: &DynamicContext,
    keyword: &str,
    value: &Value,
) -> Result<Vec<Step>, CompileError> {
    let count = value
        .as_array()
        .ok_or_else(|| malformed(keyword, "an array of schemas"))?
        .len();
    (0..count)
        .map(|index| branch(context, schema_context, dynamic_context, keyword, index))
        .collect()
}

pub fn compile_all_of(
    context: &CompilerContext<'_>,
    schema_context: &SchemaContext<'_>,
    dynamic_context: &DynamicContext,
    value: &Value,
) -> Result<Vec<Step>, CompileError> {
    let children = branches(context, schema_context, dynamic_context, "allOf", value)?;
    Ok(vec![make_applicator(
        schema_context,
        dynamic_context,
        StepKind::And { children },
        Vec::new(),
    )])
}

pub fn compile_any_of(
    context: &CompilerContext<'_>,
    schema_context: &SchemaContext<'_>,
    dynamic_context: &DynamicContext,
    value: &Value,
) -> Result<Vec<Step>, CompileError> {
    let children = branches(context, schema_context, dynamic_context, "anyOf", value)?;
    Ok(vec![make_applicator(
        schema_context,
        dynamic_context,
        StepKind::Or { children },
        Vec::new(),
    )])
}

pub fn compile_one_of(
    context: &CompilerContext<'_>,
    schema_context: &SchemaContext<'_>,
    dynamic_context: &DynamicContext,
    value: &Value,
) -> Result<Vec<Step>, CompileError> {
    let children = branches(context, schema_context, dynamic_context, "oneOf", value)?;
    Ok(vec![make_applicator(
        schema_context,
        dynamic_context,
        StepKind::Xor { children },
        Vec::new(),
    )])
}

pub fn compile_not(
    context: &CompilerContext<'_>,
    schema_context: &SchemaContext<'_>,
    dynamic_context: &DynamicContext,
) -> Result<Vec<Step>, CompileError> {
    let children = compile_subschema(
        context,
        schema_context,
        "not",
        &pointer![],
        &pointer![],
        dynamic_context.target_kind,
    )?;
    Ok(vec![make_applicator(
        schema_context,
        dynamic_context,
        StepKind::Not { children },
        Vec::new(),
    )])
}

/// `if` compiles into its consequents: `then` guarded by the compiled
/// condition, `else` guarded by its negation. An `if` with neither
/// consequent asserts nothing.
pub fn compile_if(
    context: &CompilerContext<'_>,
    schema_context: &SchemaContext<'_>,
    dynamic_context: &DynamicContext,
) -> Result<Vec<Step>, CompileError> {
    let mut steps = Vec::new();

    if schema_context.schema.get("then").is_some() {
        let condition = compile_subschema(
            context,
            schema_context,
            "if",
            &pointer![],
            &pointer![],
            dynamic_context.target_kind,
        )?;
        let children = compile_subschema(
            context,
            schema_context,
            "then",
            &pointer![],
            &pointer![],
            dynamic_context.target_kind,
        )?;
        let then_dynamic = DynamicContext {
            keyword: "then".to_string(),
            base_schema_location: dynamic_context.base_schema_location.clone(),
            base_instance_location: dynamic_context.base_instance_location.clone(),
            target_kind: dynamic_context.target_kind,
        };
        steps.push(make_applicator(
            schema_context,
            &then_dynamic,
            StepKind::And { children },
            condition,
        ));
    }

    if schema_context.schema.get("else").is_some() {
        let condition = compile_subschema(
            context,
            schema_context,
            "if",
            &pointer![],
            &pointer![],
            dynamic_context.target_kind,
        )?;
        let negation = make_applicator(
            schema_context,
            &relative_dynamic_context_for(dynamic_context),
            StepKind::Not {
                children: condition,
            },
            Vec::new(),
        );
        let children = compile_subschema(
            context,
            schema_context,
            "else",
            &pointer![],
            &pointer![],
            dynamic_context.target_kind,
        )?;
        let else_dynamic = DynamicContext {
            keyword: "else".to_string(),
            base_schema_location: dynamic_context.base_schema_location.clone(),
            base_instance_location: dynamic_context.base_instance_location.clone(),
            target_kind: dynamic_context.target_kind,
        };
        steps.push(make_applicator(
            schema_context,
            &else_dynamic,
            StepKind::And { children },
            vec![negation],
        ));
    }

    Ok(steps)
}

pub fn compile_dependent_schemas(
    context: &CompilerContext<'_>,
    schema_context: &SchemaContext<'_>,
    dynamic_context: &DynamicContext,
    value: &Value,
) -> Result<Vec<Step>, CompileError> {
    let entries = value
        .as_object()
        .ok_or_else(|| malformed("dependentSchemas", "an object"))?;

    let mut children = Vec::new();
    for trigger in entries.keys() {
        let suffix = pointer![trigger.as_str()];
        let child_context =
            subschema_context(context, schema_context, "dependentSchemas", &suffix)?;
        let inner = compile_schema(
            context,
            &child_context,
            &relative_dynamic_context_for(dynamic_context),
        )?;
        let guard = make_assertion(
            schema_context,
            &relative_dynamic_context(),
            StepKind::Defines {
                property: trigger.clone(),
            },
            Vec::new(),
        );
        let entry_dynamic = DynamicContext {
            keyword: String::new(),
            base_schema_location: suffix,
            base_instance_location: Pointer::new(),
            target_kind: dynamic_context.target_kind,
        };
        children.push(make_applicator(
            &child_context,
            &entry_dynamic,
            StepKind::And { children: inner },
            vec![guard],
        ));
    }

    Ok(vec![make_applicator(
        schema_context,
        dynamic_context,
        StepKind::And { children },
        type_condition(schema_context, JsonType::Object),
    )])
}

pub fn compile_properties(
    context: &CompilerContext<'_>,
    schema_context: &SchemaContext<'_>,
    dynamic_context: &DynamicContext,
    value: &Value,
) -> Result<Vec<Step>, CompileError> {
    let map = value
        .as_object()
        .ok_or_else(|| malformed("properties", "an object"))?;

    let mut children = Vec::with_capacity(map.len());
    for name in map.keys() {
        let suffix = pointer![name.as_str()];
        let child_context = subschema_context(context, schema_context, "properties", &suffix)?;
        let mut inner = compile_schema(
            context,
            &child_context,
            &DynamicContext {
                keyword: String::new(),
                base_schema_location: suffix.clone(),
                base_instance_location: suffix.clone(),
                target_kind: dynamic_context.target_kind,
            },
        )?;
        // The marker annotation lands at the object's location under the
        // keyword path, which is what later `unevaluated*` queries match.
        inner.push(make_annotation(
            schema_context,
            &DynamicContext {
                keyword: String::new(),
                base_schema_location: Pointer::new(),
                base_instance_location: suffix.clone(),
                target_kind: dynamic_context.target_kind,
            },
            AnnotationPayload::BasenameToParent,
            Vec::new(),
        ));

        children.push(make_applicator(
            &child_context,
            &relative_dynamic_context_for(dynamic_context),
            StepKind::WhenDefines {
                property: name.clone(),
                children: inner,
            },
            Vec::new(),
        ));
    }

    Ok(vec![make_applicator(
        schema_context,
        dynamic_context,
        StepKind::And { children },
        type_condition(schema_context, JsonType::Object),
    )])
}

pub fn compile_pattern_properties(
    context: &CompilerContext<'_>,
    schema_context: &SchemaContext<'_>,
    dynamic_context: &DynamicContext,
    value: &Value,
) -> Result<Vec<Step>, CompileError> {
    let map = value
        .as_object()
        .ok_or_else(|| malformed("patternProperties", "an object"))?;

    let mut steps = Vec::with_capacity(map.len());
    for source in map.keys() {
        let regex = RegexValue::new(source)?;
        let suffix = pointer![source.as_str()];
        let child_context =
            subschema_context(context, schema_context, "patternProperties", &suffix)?;
        let mut inner = compile_schema(
            context,
            &child_context,
            &relative_dynamic_context_for(dynamic_context),
        )?;
        inner.push(make_annotation(
            &child_context,
            &relative_dynamic_context(),
            AnnotationPayload::PropertyName,
            Vec::new(),
        ));

        steps.push(make_applicator(
            schema_context,
            dynamic_context,
            StepKind::LoopProperties {
                selection: PropertySelection::Matching(regex),
                children: inner,
            },
            type_condition(schema_context, JsonType::Object),
        ));
    }

    Ok(steps)
}

pub fn compile_additional_properties(
    context: &CompilerContext<'_>,
    schema_context: &SchemaContext<'_>,
    dynamic_context: &DynamicContext,
) -> Result<Vec<Step>, CompileError> {
    let names = schema_context
        .schema
        .get("properties")
        .and_then(Value::as_object)
        .map(|map| map.keys().cloned().collect())
        .unwrap_or_default();
    let patterns = schema_context
        .schema
        .get("patternProperties")
        .and_then(Value::as_object)
        .map(|map| {
            map.keys()
                .map(|source| RegexValue::new(source))
                .collect::<Result<Vec<_>, _>>()
        })
        .transpose()?
        .unwrap_or_default();

    let mut inner = compile_subschema(
        context,
        schema_context,
        "additionalProperties",
        &pointer![],
        &pointer![],
        dynamic_context.target_kind,
    )?;
    inner.push(make_annotation(
        schema_context,
        &relative_dynamic_context(),
        AnnotationPayload::PropertyName,
        Vec::new(),
    ));

    Ok(vec![make_applicator(
        schema_context,
        dynamic_context,
        StepKind::LoopProperties {
            selection: PropertySelection::NotMatching { names, patterns },
            children: inner,
        },
        type_condition(schema_context, JsonType::Object),
    )])
}

pub fn compile_property_names(
    context: &CompilerContext<'_>,
    schema_context: &SchemaContext<'_>,
    dynamic_context: &DynamicContext,
) -> Result<Vec<Step>, CompileError> {
    let children = compile_subschema(
        context,
        schema_context,
        "propertyNames",
        &pointer![],
        &pointer![],
        crate::steps::TargetType::Key,
    )?;
    Ok(vec![make_applicator(
        schema_context,
        dynamic_context,
        StepKind::LoopKeys { children },
        type_condition(schema_context, JsonType::Object),
    )])
}

/// The array form shared by `prefixItems` and the tuple form of `items`:
/// one guarded conjunction per index, each annotating its index at the
/// array's location.
fn tuple_items(
    context: &CompilerContext<'_>,
    schema_context: &SchemaContext<'_>,
    dynamic_context: &DynamicContext,
    keyword: &str,
    count: usize,
) -> Result<Vec<Step>, CompileError> {
    let mut children = Vec::with_capacity(count);
    for index in 0..count {
        let suffix = pointer![index];
        let child_context = subschema_context(context, schema_context, keyword, &suffix)?;
        let mut inner = compile_schema(
            context,
            &child_context,
            &DynamicContext {
                keyword: String::new(),
                base_schema_location: suffix.clone(),
                base_instance_location: suffix.clone(),
                target_kind: dynamic_context.target_kind,
            },
        )?;
        inner.push(make_annotation(
            schema_context,
            &DynamicContext {
                keyword: String::new(),
                base_schema_location: Pointer::new(),
                base_instance_location: suffix.clone(),
                target_kind: dynamic_context.target_kind,
            },
            AnnotationPayload::BasenameToParent,
            Vec::new(),
        ));

        // Applies only when the instance is an array that actually has an
        // element there. The type half cannot be elided even when a `type`
        // sibling pins arrays: in exhaustive mode this guard still runs
        // against non-arrays.
        let guard = vec![
            make_assertion(
                schema_context,
                &relative_dynamic_context(),
                StepKind::Type {
                    expected: JsonType::Array,
                },
                Vec::new(),
            ),
            make_assertion(
                schema_context,
                &relative_dynamic_context(),
                StepKind::MinSize {
                    limit: index as u64 + 1,
                },
                Vec::new(),
            ),
        ];
        children.push(make_applicator(
            &child_context,
            &relative_dynamic_context_for(dynamic_context),
            StepKind::And { children: inner },
            guard,
        ));
    }

    Ok(vec![make_applicator(
        schema_context,
        dynamic_context,
        StepKind::And { children },
        type_condition(schema_context, JsonType::Array),
    )])
}

pub fn compile_prefix_items(
    context: &CompilerContext<'_>,
    schema_context: &SchemaContext<'_>,
    dynamic_context: &DynamicContext,
    value: &Value,
) -> Result<Vec<Step>, CompileError> {
    let count = value
        .as_array()
        .ok_or_else(|| malformed("prefixItems", "an array of schemas"))?
        .len();
    tuple_items(context, schema_context, dynamic_context, "prefixItems", count)
}

pub fn compile_items(
    context: &CompilerContext<'_>,
    schema_context: &SchemaContext<'_>,
    dynamic_context: &DynamicContext,
    value: &Value,
) -> Result<Vec<Step>, CompileError> {
    // Before 2020-12, an array here is the tuple form.
    if context.dialect < Dialect::Draft202012 {
        if let Some(tuple) = value.as_array() {
            return tuple_items(
                context,
                schema_context,
                dynamic_context,
                "items",
                tuple.len(),
            );
        }
    }

    let origin = if context.dialect == Dialect::Draft202012
        && schema_context
            .schema
            .get("prefixItems")
            .is_some_and(Value::is_array)
    {
        ItemsOrigin::Annotation("prefixItems".to_string())
    } else {
        ItemsOrigin::Index(0)
    };

    let children = compile_subschema(
        context,
        schema_context,
        "items",
        &pointer![],
        &pointer![],
        dynamic_context.target_kind,
    )?;
    Ok(vec![make_applicator(
        schema_context,
        dynamic_context,
        StepKind::LoopItems { origin, children },
        type_condition(schema_context, JsonType::Array),
    )])
}

pub fn compile_additional_items(
    context: &CompilerContext<'_>,
    schema_context: &SchemaContext<'_>,
    dynamic_context: &DynamicContext,
) -> Result<Vec<Step>, CompileError> {
    // Only meaningful next to the tuple form of `items`.
    let Some(tuple) = schema_context
        .schema
        .get("items")
        .and_then(Value::as_array)
    else {
        return Ok(Vec::new());
    };

    let children = compile_subschema(
        context,
        schema_context,
        "additionalItems",
        &pointer![],
        &pointer![],
        dynamic_context.target_kind,
    )?;
    Ok(vec![make_applicator(
        schema_context,
        dynamic_context,
        StepKind::LoopItems {
            origin: ItemsOrigin::Index(tuple.len()),
            children,
        },
        type_condition(schema_context, JsonType::Array),
    )])
}

pub fn compile_contains(
    context: &CompilerContext<'_>,
    schema_context: &SchemaContext<'_>,
    dynamic_context: &DynamicContext,
) -> Result<Vec<Step>, CompileError> {
    let (minimum, maximum) = if context.dialect >= Dialect::Draft201909 {
        (
            schema_context
                .schema
                .get("minContains")
                .and_then(Value::as_u64)
                .unwrap_or(1),
            schema_context
                .schema
                .get("maxContains")
                .and_then(Value::as_u64),
        )
    } else {
        (1, None)
    };

    let children = compile_subschema(
        context,
        schema_context,
        "contains",
        &pointer![],
        &pointer![],
        dynamic_context.target_kind,
    )?;
    Ok(vec![make_applicator(
        schema_context,
        dynamic_context,
        StepKind::LoopContains {
            bounds: ContainsBounds {
                minimum,
                maximum,
                // Every matching element must leave its annotation when an
                // `unevaluatedItems` somewhere may ask about it.
                exhaustive: context.frame.uses_unevaluated,
            },
            children,
        },
        type_condition(schema_context, JsonType::Array),
    )])
}

pub fn compile_annotation(
    schema_context: &SchemaContext<'_>,
    dynamic_context: &DynamicContext,
    value: &Value,
) -> Result<Vec<Step>, CompileError> {
    Ok(vec![make_annotation(
        schema_context,
        dynamic_context,
        AnnotationPayload::Value(value.clone()),
        Vec::new(),
    )])
}
