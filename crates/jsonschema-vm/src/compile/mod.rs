//! The schema compiler front end.
//!
//! [`compile`] turns a schema document into a [`Template`] in two passes:
//! a framing pass that indexes every addressable location (`$id` values,
//! anchors, dynamic anchors) and detects which machinery the schema needs,
//! then a keyword walk that dispatches each keyword of each subschema to
//! its compiler function. Keyword compilers never construct steps by hand;
//! they go through the scaffolding in [`helpers`], which stamps every step
//! with consistent location metadata.

use std::collections::HashSet;

use jsonschema_vm_pointer::{pointer, Pointer};
use serde_json::Value;

use crate::error::CompileError;
use crate::steps::{Step, StepKind, TargetType, Template};
use crate::util;

mod dialect;
mod frame;
pub mod helpers;
mod keywords;

pub use dialect::Dialect;
pub use frame::{Frame, ResolvedRef};

use helpers::{make_mark, make_jump, relative_dynamic_context};

/// Immutable state shared by the whole compilation of one schema.
pub struct CompilerContext<'s> {
    pub root: &'s Value,
    pub dialect: Dialect,
    pub frame: Frame,
}

/// The subschema a keyword compiler is looking at.
#[derive(Clone)]
pub struct SchemaContext<'s> {
    pub schema: &'s Value,
    /// URI of the enclosing schema resource.
    pub resource: String,
    /// Location of this subschema relative to the document root.
    pub relative_pointer: Pointer,
    /// Labels on the current compilation path. A reference whose target is
    /// already here is a back-edge and compiles to a jump instead of
    /// expanding forever.
    pub labels: HashSet<u64>,
}

/// The location bookkeeping for the step being built.
#[derive(Clone)]
pub struct DynamicContext {
    /// The keyword, or empty for synthetic steps with no keyword of their
    /// own.
    pub keyword: String,
    pub base_schema_location: Pointer,
    pub base_instance_location: Pointer,
    pub target_kind: TargetType,
}

/// Evaluation order. Assertions run before applicators, applicators before
/// the annotation-only keywords, and the `unevaluated` pair runs last so
/// every sibling annotation it consumes exists by then.
const KEYWORD_PRIORITY: &[&str] = &[
    "$ref",
    "$recursiveRef",
    "$dynamicRef",
    "type",
    "enum",
    "const",
    "required",
    "dependentRequired",
    "dependencies",
    "minimum",
    "maximum",
    "exclusiveMinimum",
    "exclusiveMaximum",
    "multipleOf",
    "minLength",
    "maxLength",
    "pattern",
    "minItems",
    "maxItems",
    "uniqueItems",
    "minProperties",
    "maxProperties",
    "allOf",
    "anyOf",
    "oneOf",
    "not",
    "if",
    "dependentSchemas",
    "properties",
    "patternProperties",
    "additionalProperties",
    "propertyNames",
    "prefixItems",
    "items",
    "additionalItems",
    "contains",
    "title",
    "description",
    "default",
    "examples",
    "deprecated",
    "readOnly",
    "writeOnly",
    "unevaluatedProperties",
    "unevaluatedItems",
];

/// Compiles a schema document into an evaluatable template.
pub fn compile(schema: &Value) -> Result<Template, CompileError> {
    let dialect = Dialect::detect(schema, Dialect::Draft202012)?;
    let frame = Frame::build(schema, dialect);
    let context = CompilerContext {
        root: schema,
        dialect,
        frame,
    };

    let schema_context = SchemaContext {
        schema,
        resource: context.frame.root_resource.clone(),
        relative_pointer: Pointer::new(),
        labels: HashSet::new(),
    };
    let body = compile_schema(&context, &schema_context, &relative_dynamic_context())?;

    // Dynamic referencing needs run-time scope: register every dynamic
    // anchor up front, then enter the root resource through a jump so the
    // resource stack is live for the whole evaluation.
    let steps = if context.frame.uses_dynamic {
        let mut steps = Vec::new();
        for anchor in &context.frame.dynamic_anchors {
            let target = util::get(context.root, &anchor.pointer).ok_or_else(|| {
                CompileError::UnresolvableReference(anchor.anchor.clone())
            })?;
            let anchor_context = SchemaContext {
                schema: target,
                resource: anchor.resource.clone(),
                relative_pointer: anchor.pointer.clone(),
                labels: HashSet::new(),
            };
            let children =
                compile_schema(&context, &anchor_context, &relative_dynamic_context())?;
            steps.push(make_mark(
                &anchor_context,
                crate::context::anchor_label(&anchor.resource, &anchor.anchor),
                children,
            ));
        }

        let root_label = frame::static_label(&Pointer::new());
        steps.push(make_mark(&schema_context, root_label, body));
        steps.push(make_jump(
            &schema_context,
            &relative_dynamic_context(),
            root_label,
            context.frame.root_resource.clone(),
            true,
        ));
        steps
    } else {
        body
    };

    Ok(Template {
        steps,
        dynamic: context.frame.uses_unevaluated,
    })
}

/// Compiles one subschema: a boolean, or an object walked keyword by
/// keyword in priority order.
pub fn compile_schema(
    context: &CompilerContext<'_>,
    schema_context: &SchemaContext<'_>,
    dynamic_context: &DynamicContext,
) -> Result<Vec<Step>, CompileError> {
    let object = match schema_context.schema {
        Value::Bool(true) => return Ok(Vec::new()),
        Value::Bool(false) => {
            return Ok(vec![helpers::make_assertion(
                schema_context,
                dynamic_context,
                StepKind::Fail,
                Vec::new(),
            )])
        }
        Value::Object(object) => object,
        _ => return Ok(Vec::new()),
    };

    // Up to Draft 7, `$ref` makes its siblings invisible.
    let keywords: &[&str] =
        if context.dialect <= Dialect::Draft7 && object.contains_key("$ref") {
            &["$ref"]
        } else {
            KEYWORD_PRIORITY
        };

    let mut steps = Vec::new();
    for keyword in keywords {
        let Some(value) = object.get(*keyword) else {
            continue;
        };
        let keyword_context = DynamicContext {
            keyword: keyword.to_string(),
            base_schema_location: dynamic_context.base_schema_location.clone(),
            base_instance_location: dynamic_context.base_instance_location.clone(),
            target_kind: dynamic_context.target_kind,
        };
        steps.extend(dispatch(
            context,
            schema_context,
            &keyword_context,
            keyword,
            value,
        )?);
    }

    Ok(steps)
}

/// Derives the schema context for a subschema below the current one.
///
/// The relative pointer extends through the keyword and suffix, and a
/// subschema that declares its own identifier becomes the new enclosing
/// resource.
pub fn subschema_context<'s>(
    context: &CompilerContext<'s>,
    schema_context: &SchemaContext<'s>,
    keyword: &str,
    schema_suffix: &Pointer,
) -> Result<SchemaContext<'s>, CompileError> {
    let path = pointer![keyword].concat(schema_suffix);
    let schema = util::get(schema_context.schema, &path).ok_or_else(|| {
        CompileError::UnresolvableReference(format!(
            "{}{}",
            schema_context.relative_pointer, path
        ))
    })?;

    let resource = schema
        .get(context.dialect.id_keyword())
        .and_then(Value::as_str)
        .filter(|id| !id.starts_with('#'))
        .map(str::to_string)
        .unwrap_or_else(|| schema_context.resource.clone());

    Ok(SchemaContext {
        schema,
        resource,
        relative_pointer: schema_context.relative_pointer.concat(&path),
        labels: schema_context.labels.clone(),
    })
}

/// Compiles the subschema under `keyword` plus `schema_suffix`, producing
/// steps whose schema locations are based at `schema_suffix` and whose
/// instance locations are based at `instance_suffix`.
pub fn compile_subschema(
    context: &CompilerContext<'_>,
    schema_context: &SchemaContext<'_>,
    keyword: &str,
    schema_suffix: &Pointer,
    instance_suffix: &Pointer,
    target_kind: TargetType,
) -> Result<Vec<Step>, CompileError> {
    let child_context = subschema_context(context, schema_context, keyword, schema_suffix)?;
    let child_dynamic = DynamicContext {
        keyword: String::new(),
        base_schema_location: schema_suffix.clone(),
        base_instance_location: instance_suffix.clone(),
        target_kind,
    };
    compile_schema(context, &child_context, &child_dynamic)
}

fn dispatch(
    context: &CompilerContext<'_>,
    schema_context: &SchemaContext<'_>,
    dynamic_context: &DynamicContext,
    keyword: &str,
    value: &Value,
) -> Result<Vec<Step>, CompileError> {
    use Dialect::*;

    let dialect = context.dialect;
    match keyword {
        "$ref" => keywords::core::compile_ref(context, schema_context, dynamic_context, value),
        "$recursiveRef" if dialect == Draft201909 => {
            keywords::core::compile_recursive_ref(context, schema_context, dynamic_context, value)
        }
        "$dynamicRef" if dialect == Draft202012 => {
            keywords::core::compile_dynamic_ref(context, schema_context, dynamic_context, value)
        }

        "type" => keywords::validation::compile_type(schema_context, dynamic_context, value),
        "enum" => keywords::validation::compile_enum(schema_context, dynamic_context, value),
        "const" if dialect >= Draft6 => {
            keywords::validation::compile_const(schema_context, dynamic_context, value)
        }
        "required" => {
            keywords::validation::compile_required(schema_context, dynamic_context, value)
        }
        "dependentRequired" if dialect >= Draft201909 => {
            keywords::validation::compile_dependent_required(
                schema_context,
                dynamic_context,
                value,
            )
        }
        "dependencies" if dialect <= Draft7 => keywords::validation::compile_dependencies(
            context,
            schema_context,
            dynamic_context,
            value,
        ),
        "minimum" => {
            keywords::validation::compile_minimum(context, schema_context, dynamic_context, value)
        }
        "maximum" => {
            keywords::validation::compile_maximum(context, schema_context, dynamic_context, value)
        }
        "exclusiveMinimum" if dialect >= Draft6 => {
            keywords::validation::compile_exclusive_minimum(schema_context, dynamic_context, value)
        }
        "exclusiveMaximum" if dialect >= Draft6 => {
            keywords::validation::compile_exclusive_maximum(schema_context, dynamic_context, value)
        }
        "multipleOf" => {
            keywords::validation::compile_multiple_of(schema_context, dynamic_context, value)
        }
        "minLength" => {
            keywords::validation::compile_min_length(schema_context, dynamic_context, value)
        }
        "maxLength" => {
            keywords::validation::compile_max_length(schema_context, dynamic_context, value)
        }
        "pattern" => keywords::validation::compile_pattern(schema_context, dynamic_context, value),
        "minItems" => {
            keywords::validation::compile_min_items(schema_context, dynamic_context, value)
        }
        "maxItems" => {
            keywords::validation::compile_max_items(schema_context, dynamic_context, value)
        }
        "uniqueItems" => {
            keywords::validation::compile_unique_items(schema_context, dynamic_context, value)
        }
        "minProperties" => {
            keywords::validation::compile_min_properties(schema_context, dynamic_context, value)
        }
        "maxProperties" => {
            keywords::validation::compile_max_properties(schema_context, dynamic_context, value)
        }

        "allOf" => {
            keywords::applicator::compile_all_of(context, schema_context, dynamic_context, value)
        }
        "anyOf" => {
            keywords::applicator::compile_any_of(context, schema_context, dynamic_context, value)
        }
        "oneOf" => {
            keywords::applicator::compile_one_of(context, schema_context, dynamic_context, value)
        }
        "not" => keywords::applicator::compile_not(context, schema_context, dynamic_context),
        "if" if dialect >= Draft7 => {
            keywords::applicator::compile_if(context, schema_context, dynamic_context)
        }
        "dependentSchemas" if dialect >= Draft201909 => {
            keywords::applicator::compile_dependent_schemas(
                context,
                schema_context,
                dynamic_context,
                value,
            )
        }
        "properties" => keywords::applicator::compile_properties(
            context,
            schema_context,
            dynamic_context,
            value,
        ),
        "patternProperties" => keywords::applicator::compile_pattern_properties(
            context,
            schema_context,
            dynamic_context,
            value,
        ),
        "additionalProperties" => keywords::applicator::compile_additional_properties(
            context,
            schema_context,
            dynamic_context,
        ),
        "propertyNames" if dialect >= Draft6 => keywords::applicator::compile_property_names(
            context,
            schema_context,
            dynamic_context,
        ),
        "prefixItems" if dialect == Draft202012 => keywords::applicator::compile_prefix_items(
            context,
            schema_context,
            dynamic_context,
            value,
        ),
        "items" => {
            keywords::applicator::compile_items(context, schema_context, dynamic_context, value)
        }
        "additionalItems" if dialect <= Draft201909 => {
            keywords::applicator::compile_additional_items(
                context,
                schema_context,
                dynamic_context,
            )
        }
        "contains" if dialect >= Draft6 => {
            keywords::applicator::compile_contains(context, schema_context, dynamic_context)
        }

        "title" | "description" | "default" => {
            keywords::applicator::compile_annotation(schema_context, dynamic_context, value)
        }
        "examples" if dialect >= Draft6 => {
            keywords::applicator::compile_annotation(schema_context, dynamic_context, value)
        }
        "deprecated" if dialect >= Draft201909 => {
            keywords::applicator::compile_annotation(schema_context, dynamic_context, value)
        }
        "readOnly" | "writeOnly" if dialect >= Draft7 => {
            keywords::applicator::compile_annotation(schema_context, dynamic_context, value)
        }

        "unevaluatedProperties" if dialect >= Draft201909 => {
            keywords::unevaluated::compile_unevaluated_properties(
                context,
                schema_context,
                dynamic_context,
            )
        }
        "unevaluatedItems" if dialect >= Draft201909 => {
            keywords::unevaluated::compile_unevaluated_items(
                context,
                schema_context,
                dynamic_context,
            )
        }

        _ => Ok(Vec::new()),
    }
}
