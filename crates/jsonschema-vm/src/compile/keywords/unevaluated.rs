//! The annotation-consuming pair: `unevaluatedProperties` and
//! `unevaluatedItems`. Both compile to loops that skip whatever a sibling
//! keyword already accounted for, which is why they sit last in the
//! keyword priority order and why their presence switches the whole
//! template to exhaustive evaluation.

use jsonschema_vm_pointer::pointer;

use crate::compile::helpers::{make_applicator, type_condition};
use crate::compile::{compile_subschema, CompilerContext, DynamicContext, SchemaContext};
use crate::error::CompileError;
use crate::steps::{JsonType, Step, StepKind};

fn keywords(names: &[&str]) -> Vec<String> {
    names.iter().map(|name| name.to_string()).collect()
}

pub fn compile_unevaluated_properties(
    context: &CompilerContext<'_>,
    schema_context: &SchemaContext<'_>,
    dynamic_context: &DynamicContext,
) -> Result<Vec<Step>, CompileError> {
    let children = compile_subschema(
        context,
        schema_context,
        "unevaluatedProperties",
        &pointer![],
        &pointer![],
        dynamic_context.target_kind,
    )?;

    Ok(vec![make_applicator(
        schema_context,
        dynamic_context,
        StepKind::LoopPropertiesUnevaluated {
            accounted: keywords(&[
                "properties",
                "patternProperties",
                "additionalProperties",
                "unevaluatedProperties",
            ]),
            children,
        },
        type_condition(schema_context, JsonType::Object),
    )])
}

pub fn compile_unevaluated_items(
    context: &CompilerContext<'_>,
    schema_context: &SchemaContext<'_>,
    dynamic_context: &DynamicContext,
) -> Result<Vec<Step>, CompileError> {
    let children = compile_subschema(
        context,
        schema_context,
        "unevaluatedItems",
        &pointer![],
        &pointer![],
        dynamic_context.target_kind,
    )?;

    Ok(vec![make_applicator(
        schema_context,
        dynamic_context,
        StepKind::LoopItemsUnevaluated {
            accounted: keywords(&[
                "prefixItems",
                "items",
                "additionalItems",
                "contains",
                "unevaluatedItems",
            ]),
            children,
        },
        type_condition(schema_context, JsonType::Array),
    )])
}
