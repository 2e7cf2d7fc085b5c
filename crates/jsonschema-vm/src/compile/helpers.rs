//! Frame-construction scaffolding.
//!
//! Every keyword compiler builds its steps through these constructors, so
//! location metadata is always consistent with the schema position being
//! compiled. The constructors come in three shapes: value-bearing leaves
//! (assertions and annotations), applicators with children, and the
//! id-bearing control steps.

use jsonschema_vm_pointer::Pointer;
use serde_json::Value;

use super::{DynamicContext, SchemaContext};
use crate::steps::{AnnotationPayload, JsonType, Step, StepKind, Target, TargetType};

/// The dynamic context for synthetic inner steps that contribute no
/// keyword and no location of their own.
pub fn relative_dynamic_context() -> DynamicContext {
    DynamicContext {
        keyword: String::new(),
        base_schema_location: Pointer::new(),
        base_instance_location: Pointer::new(),
        target_kind: TargetType::Instance,
    }
}

/// Same, but preserving the target kind of the enclosing context, for
/// inner steps under `propertyNames` and friends.
pub fn relative_dynamic_context_for(dynamic_context: &DynamicContext) -> DynamicContext {
    DynamicContext {
        keyword: String::new(),
        base_schema_location: Pointer::new(),
        base_instance_location: Pointer::new(),
        target_kind: dynamic_context.target_kind,
    }
}

/// The schema-relative pointer for the step being built: the accumulated
/// base with the keyword appended, unless the step has no keyword.
pub fn relative_schema_location(dynamic_context: &DynamicContext) -> Pointer {
    if dynamic_context.keyword.is_empty() {
        dynamic_context.base_schema_location.clone()
    } else {
        dynamic_context
            .base_schema_location
            .join(dynamic_context.keyword.as_str())
    }
}

/// The absolute keyword URI. Diagnostic only; the interpreter never reads
/// it.
pub fn keyword_location(
    schema_context: &SchemaContext<'_>,
    dynamic_context: &DynamicContext,
) -> String {
    let pointer = if dynamic_context.keyword.is_empty() {
        schema_context.relative_pointer.clone()
    } else {
        schema_context
            .relative_pointer
            .join(dynamic_context.keyword.as_str())
    };
    format!("{}{}", schema_context.resource, pointer.to_fragment())
}

/// Derives a compiler context for descending into a subschema, optionally
/// adding a control-flow label to the set in scope.
pub fn applicate<'s>(
    schema_context: &SchemaContext<'s>,
    label: Option<u64>,
) -> SchemaContext<'s> {
    let mut child = schema_context.clone();
    if let Some(label) = label {
        child.labels.insert(label);
    }
    child
}

/// A value-bearing leaf step: an assertion.
pub fn make_assertion(
    schema_context: &SchemaContext<'_>,
    dynamic_context: &DynamicContext,
    kind: StepKind,
    condition: Vec<Step>,
) -> Step {
    Step {
        target: Target::of(dynamic_context.target_kind),
        relative_schema_location: relative_schema_location(dynamic_context),
        relative_instance_location: dynamic_context.base_instance_location.clone(),
        keyword_location: keyword_location(schema_context, dynamic_context),
        condition,
        kind,
    }
}

/// A value-bearing leaf step: an annotation.
pub fn make_annotation(
    schema_context: &SchemaContext<'_>,
    dynamic_context: &DynamicContext,
    payload: AnnotationPayload,
    condition: Vec<Step>,
) -> Step {
    let target_kind = match payload {
        AnnotationPayload::PropertyName => TargetType::TemplateProperty,
        _ => dynamic_context.target_kind,
    };
    Step {
        target: Target::of(target_kind),
        relative_schema_location: relative_schema_location(dynamic_context),
        relative_instance_location: dynamic_context.base_instance_location.clone(),
        keyword_location: keyword_location(schema_context, dynamic_context),
        condition,
        kind: StepKind::Annotation { payload },
    }
}

/// An applicator step with children.
pub fn make_applicator(
    schema_context: &SchemaContext<'_>,
    dynamic_context: &DynamicContext,
    kind: StepKind,
    condition: Vec<Step>,
) -> Step {
    Step {
        target: Target::of(dynamic_context.target_kind),
        relative_schema_location: relative_schema_location(dynamic_context),
        relative_instance_location: dynamic_context.base_instance_location.clone(),
        keyword_location: keyword_location(schema_context, dynamic_context),
        condition,
        kind,
    }
}

/// A mark control step. Registration is location-neutral, so marks carry
/// no path of their own.
pub fn make_mark(schema_context: &SchemaContext<'_>, id: u64, children: Vec<Step>) -> Step {
    Step {
        target: Target::instance(),
        relative_schema_location: Pointer::new(),
        relative_instance_location: Pointer::new(),
        keyword_location: keyword_location(schema_context, &relative_dynamic_context()),
        condition: Vec::new(),
        kind: StepKind::Mark { id, children },
    }
}

/// A jump control step.
pub fn make_jump(
    schema_context: &SchemaContext<'_>,
    dynamic_context: &DynamicContext,
    id: u64,
    schema_resource: String,
    dynamic: bool,
) -> Step {
    Step {
        target: Target::instance(),
        relative_schema_location: relative_schema_location(dynamic_context),
        relative_instance_location: dynamic_context.base_instance_location.clone(),
        keyword_location: keyword_location(schema_context, dynamic_context),
        condition: Vec::new(),
        kind: StepKind::Jump {
            id,
            schema_resource,
            dynamic,
        },
    }
}

/// A dynamic jump control step: the target label is computed at run time
/// from the live resource stack.
pub fn make_dynamic_jump(
    schema_context: &SchemaContext<'_>,
    dynamic_context: &DynamicContext,
    anchor: String,
) -> Step {
    Step {
        target: Target::instance(),
        relative_schema_location: relative_schema_location(dynamic_context),
        relative_instance_location: dynamic_context.base_instance_location.clone(),
        keyword_location: keyword_location(schema_context, dynamic_context),
        condition: Vec::new(),
        kind: StepKind::DynamicJump { anchor },
    }
}

/// A guard asserting the instance has the given type, unless the schema
/// already pins that type statically, in which case no guard is needed.
pub fn type_condition(
    schema_context: &SchemaContext<'_>,
    expected: JsonType,
) -> Vec<Step> {
    if let Some(declared) = schema_context.schema.get("type").and_then(Value::as_str) {
        let pinned = matches!(
            (declared, expected),
            ("null", JsonType::Null)
                | ("boolean", JsonType::Boolean)
                | ("object", JsonType::Object)
                | ("array", JsonType::Array)
                | ("string", JsonType::String)
                | ("integer", JsonType::Integer)
                | ("number", JsonType::Number)
        );
        if pinned {
            return Vec::new();
        }
    }

    vec![make_assertion(
        schema_context,
        &relative_dynamic_context(),
        StepKind::Type { expected },
        Vec::new(),
    )]
}
