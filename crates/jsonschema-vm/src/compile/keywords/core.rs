//! Reference keywords: `$ref`, `$recursiveRef`, `$dynamicRef`.
//!
//! A static reference compiles its target inline, wrapped in a mark the
//! first time the target is seen; a reference whose target is already on
//! the compilation path is a back-edge and compiles to a bare jump. That
//! pair is what keeps cyclic schemas from expanding forever. Dynamic
//! references defer target selection to the run-time resource stack.

use serde_json::Value;

use super::malformed;
use crate::compile::frame::{reference_fragment, static_label, ResolvedRef};
use crate::compile::helpers::{
    applicate, make_dynamic_jump, make_jump, make_mark, relative_dynamic_context,
};
use crate::compile::{compile_schema, CompilerContext, DynamicContext, SchemaContext};
use crate::error::CompileError;
use crate::steps::Step;
use crate::util;

pub fn compile_ref(
    context: &CompilerContext<'_>,
    schema_context: &SchemaContext<'_>,
    dynamic_context: &DynamicContext,
    value: &Value,
) -> Result<Vec<Step>, CompileError> {
    let reference = value.as_str().ok_or_else(|| malformed("$ref", "a string"))?;
    let resolved = context.frame.resolve(reference, &schema_context.resource)?;
    compile_static_reference(context, schema_context, dynamic_context, &resolved)
}

pub fn compile_recursive_ref(
    context: &CompilerContext<'_>,
    schema_context: &SchemaContext<'_>,
    dynamic_context: &DynamicContext,
    value: &Value,
) -> Result<Vec<Step>, CompileError> {
    let reference = value
        .as_str()
        .filter(|reference| *reference == "#")
        .ok_or_else(|| malformed("$recursiveRef", "the string \"#\""))?;

    if context.frame.is_dynamic_anchor(&schema_context.resource, "") {
        return Ok(vec![make_dynamic_jump(
            schema_context,
            dynamic_context,
            String::new(),
        )]);
    }

    // No recursive anchor in scope: a plain reference to the resource
    // root.
    let resolved = context.frame.resolve(reference, &schema_context.resource)?;
    compile_static_reference(context, schema_context, dynamic_context, &resolved)
}

pub fn compile_dynamic_ref(
    context: &CompilerContext<'_>,
    schema_context: &SchemaContext<'_>,
    dynamic_context: &DynamicContext,
    value: &Value,
) -> Result<Vec<Step>, CompileError> {
    let reference = value
        .as_str()
        .ok_or_else(|| malformed("$dynamicRef", "a string"))?;
    let resolved = context.frame.resolve(reference, &schema_context.resource)?;

    // Only a reference whose initial target is itself a dynamic anchor is
    // dynamically scoped; otherwise it behaves exactly like `$ref`.
    let anchor = reference_fragment(reference);
    if !anchor.is_empty()
        && !anchor.starts_with('/')
        && context.frame.is_dynamic_anchor(&resolved.resource, anchor)
    {
        return Ok(vec![make_dynamic_jump(
            schema_context,
            dynamic_context,
            anchor.to_string(),
        )]);
    }

    compile_static_reference(context, schema_context, dynamic_context, &resolved)
}

fn compile_static_reference<'s>(
    context: &CompilerContext<'s>,
    schema_context: &SchemaContext<'s>,
    dynamic_context: &DynamicContext,
    resolved: &ResolvedRef,
) -> Result<Vec<Step>, CompileError> {
    let id = static_label(&resolved.pointer);
    // Entering a resource through a reference extends the dynamic scope,
    // but tracking it only matters when something will look.
    let dynamic = context.frame.uses_dynamic;

    if schema_context.labels.contains(&id) {
        return Ok(vec![make_jump(
            schema_context,
            dynamic_context,
            id,
            resolved.resource.clone(),
            dynamic,
        )]);
    }

    let target = util::get(context.root, &resolved.pointer).ok_or_else(|| {
        CompileError::UnresolvableReference(format!("#{}", resolved.pointer))
    })?;

    let mut target_context = applicate(schema_context, Some(id));
    target_context.schema = target;
    target_context.resource = resolved.resource.clone();
    target_context.relative_pointer = resolved.pointer.clone();

    let children = compile_schema(context, &target_context, &relative_dynamic_context())?;

    Ok(vec![
        make_mark(schema_context, id, children),
        make_jump(
            schema_context,
            dynamic_context,
            id,
            resolved.resource.clone(),
            dynamic,
        ),
    ])
}
