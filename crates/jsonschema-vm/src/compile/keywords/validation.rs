//! Assertion keywords: type, equality, numeric, string, and size checks,
//! plus the property-dependency family.

use serde_json::Value;

use super::malformed;
use crate::compile::helpers::{
    make_applicator, make_assertion, relative_dynamic_context, type_condition,
};
use crate::compile::{compile_subschema, CompilerContext, Dialect, DynamicContext, SchemaContext};
use crate::error::CompileError;
use crate::steps::{JsonType, RegexValue, Step, StepKind};

fn type_from_name(name: &str) -> Option<JsonType> {
    match name {
        "null" => Some(JsonType::Null),
        "boolean" => Some(JsonType::Boolean),
        "integer" => Some(JsonType::Integer),
        "number" => Some(JsonType::Number),
        "string" => Some(JsonType::String),
        "array" => Some(JsonType::Array),
        "object" => Some(JsonType::Object),
        _ => None,
    }
}

pub fn compile_type(
    schema_context: &SchemaContext<'_>,
    dynamic_context: &DynamicContext,
    value: &Value,
) -> Result<Vec<Step>, CompileError> {
    let kind = match value {
        Value::String(name) => StepKind::Type {
            expected: type_from_name(name).ok_or_else(|| malformed("type", "a known type name"))?,
        },
        Value::Array(names) => {
            let expected = names
                .iter()
                .map(|name| {
                    name.as_str()
                        .and_then(type_from_name)
                        .ok_or_else(|| malformed("type", "an array of type names"))
                })
                .collect::<Result<Vec<_>, _>>()?;
            StepKind::TypeAny { expected }
        }
        _ => return Err(malformed("type", "a string or an array of strings")),
    };

    Ok(vec![make_assertion(
        schema_context,
        dynamic_context,
        kind,
        Vec::new(),
    )])
}

pub fn compile_enum(
    schema_context: &SchemaContext<'_>,
    dynamic_context: &DynamicContext,
    value: &Value,
) -> Result<Vec<Step>, CompileError> {
    let values = value
        .as_array()
        .ok_or_else(|| malformed("enum", "an array"))?;
    Ok(vec![make_assertion(
        schema_context,
        dynamic_context,
        StepKind::EqualAny {
            values: values.clone(),
        },
        Vec::new(),
    )])
}

pub fn compile_const(
    schema_context: &SchemaContext<'_>,
    dynamic_context: &DynamicContext,
    value: &Value,
) -> Result<Vec<Step>, CompileError> {
    Ok(vec![make_assertion(
        schema_context,
        dynamic_context,
        StepKind::Equal {
            value: value.clone(),
        },
        Vec::new(),
    )])
}

fn string_set(keyword: &str, value: &Value) -> Result<Vec<String>, CompileError> {
    value
        .as_array()
        .ok_or_else(|| malformed(keyword, "an array of strings"))?
        .iter()
        .map(|entry| {
            entry
                .as_str()
                .map(str::to_string)
                .ok_or_else(|| malformed(keyword, "an array of strings"))
        })
        .collect()
}

pub fn compile_required(
    schema_context: &SchemaContext<'_>,
    dynamic_context: &DynamicContext,
    value: &Value,
) -> Result<Vec<Step>, CompileError> {
    let properties = string_set("required", value)?;
    if properties.is_empty() {
        return Ok(Vec::new());
    }

    Ok(vec![make_assertion(
        schema_context,
        dynamic_context,
        StepKind::DefinesAll { properties },
        type_condition(schema_context, JsonType::Object),
    )])
}

/// Builds the per-entry step shared by `dependentRequired` and the array
/// form of `dependencies`: the listed properties must all be present, but
/// only when the triggering property is.
fn dependent_entry(
    schema_context: &SchemaContext<'_>,
    trigger: &str,
    properties: Vec<String>,
) -> Step {
    let guard = make_assertion(
        schema_context,
        &relative_dynamic_context(),
        StepKind::Defines {
            property: trigger.to_string(),
        },
        Vec::new(),
    );
    make_assertion(
        schema_context,
        &relative_dynamic_context(),
        StepKind::DefinesAll { properties },
        vec![guard],
    )
}

pub fn compile_dependent_required(
    schema_context: &SchemaContext<'_>,
    dynamic_context: &DynamicContext,
    value: &Value,
) -> Result<Vec<Step>, CompileError> {
    let entries = value
        .as_object()
        .ok_or_else(|| malformed("dependentRequired", "an object"))?;

    let mut children = Vec::new();
    for (trigger, dependencies) in entries {
        let Some(_) = dependencies.as_array() else {
            continue;
        };
        children.push(dependent_entry(
            schema_context,
            trigger,
            string_set("dependentRequired", dependencies)?,
        ));
    }

    Ok(vec![make_applicator(
        schema_context,
        dynamic_context,
        StepKind::And { children },
        type_condition(schema_context, JsonType::Object),
    )])
}

pub fn compile_dependencies(
    context: &CompilerContext<'_>,
    schema_context: &SchemaContext<'_>,
    dynamic_context: &DynamicContext,
    value: &Value,
) -> Result<Vec<Step>, CompileError> {
    let entries = value
        .as_object()
        .ok_or_else(|| malformed("dependencies", "an object"))?;

    let mut children = Vec::new();
    for (trigger, dependency) in entries {
        if dependency.is_array() {
            children.push(dependent_entry(
                schema_context,
                trigger,
                string_set("dependencies", dependency)?,
            ));
            continue;
        }

        // Schema form: the subschema applies to the whole instance when
        // the triggering property is present.
        let suffix = jsonschema_vm_pointer::pointer![trigger.as_str()];
        let inner = compile_subschema(
            context,
            schema_context,
            "dependencies",
            &suffix,
            &jsonschema_vm_pointer::pointer![],
            dynamic_context.target_kind,
        )?;
        let guard = make_assertion(
            schema_context,
            &relative_dynamic_context(),
            StepKind::Defines {
                property: trigger.to_string(),
            },
            Vec::new(),
        );
        children.push(make_applicator(
            schema_context,
            &relative_dynamic_context(),
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

pub fn compile_minimum(
    context: &CompilerContext<'_>,
    schema_context: &SchemaContext<'_>,
    dynamic_context: &DynamicContext,
    value: &Value,
) -> Result<Vec<Step>, CompileError> {
    if !value.is_number() {
        return Err(malformed("minimum", "a number"));
    }

    // Draft 4 spells exclusivity as a sibling boolean.
    let exclusive = context.dialect == Dialect::Draft4
        && schema_context
            .schema
            .get("exclusiveMinimum")
            .and_then(Value::as_bool)
            == Some(true);
    let kind = if exclusive {
        StepKind::Greater {
            bound: value.clone(),
        }
    } else {
        StepKind::GreaterEqual {
            bound: value.clone(),
        }
    };

    Ok(vec![make_assertion(
        schema_context,
        dynamic_context,
        kind,
        Vec::new(),
    )])
}

pub fn compile_maximum(
    context: &CompilerContext<'_>,
    schema_context: &SchemaContext<'_>,
    dynamic_context: &DynamicContext,
    value: &Value,
) -> Result<Vec<Step>, CompileError> {
    if !value.is_number() {
        return Err(malformed("maximum", "a number"));
    }

    let exclusive = context.dialect == Dialect::Draft4
        && schema_context
            .schema
            .get("exclusiveMaximum")
            .and_then(Value::as_bool)
            == Some(true);
    let kind = if exclusive {
        StepKind::Less {
            bound: value.clone(),
        }
    } else {
        StepKind::LessEqual {
            bound: value.clone(),
        }
    };

    Ok(vec![make_assertion(
        schema_context,
        dynamic_context,
        kind,
        Vec::new(),
    )])
}

pub fn compile_exclusive_minimum(
    schema_context: &SchemaContext<'_>,
    dynamic_context: &DynamicContext,
    value: &Value,
) -> Result<Vec<Step>, CompileError> {
    if !value.is_number() {
        return Err(malformed("exclusiveMinimum", "a number"));
    }
    Ok(vec![make_assertion(
        schema_context,
        dynamic_context,
        StepKind::Greater {
            bound: value.clone(),
        },
        Vec::new(),
    )])
}

pub fn compile_exclusive_maximum(
    schema_context: &SchemaContext<'_>,
    dynamic_context: &DynamicContext,
    value: &Value,
) -> Result<Vec<Step>, CompileError> {
    if !value.is_number() {
        return Err(malformed("exclusiveMaximum", "a number"));
    }
    Ok(vec![make_assertion(
        schema_context,
        dynamic_context,
        StepKind::Less {
            bound: value.clone(),
        },
        Vec::new(),
    )])
}

pub fn compile_multiple_of(
    schema_context: &SchemaContext<'_>,
    dynamic_context: &DynamicContext,
    value: &Value,
) -> Result<Vec<Step>, CompileError> {
    if !value.is_number() {
        return Err(malformed("multipleOf", "a number"));
    }
    Ok(vec![make_assertion(
        schema_context,
        dynamic_context,
        StepKind::Divisible {
            divisor: value.clone(),
        },
        Vec::new(),
    )])
}

fn limit(keyword: &str, value: &Value) -> Result<u64, CompileError> {
    value
        .as_u64()
        .ok_or_else(|| malformed(keyword, "a non-negative integer"))
}

pub fn compile_min_length(
    schema_context: &SchemaContext<'_>,
    dynamic_context: &DynamicContext,
    value: &Value,
) -> Result<Vec<Step>, CompileError> {
    Ok(vec![make_assertion(
        schema_context,
        dynamic_context,
        StepKind::MinLength {
            limit: limit("minLength", value)?,
        },
        Vec::new(),
    )])
}

pub fn compile_max_length(
    schema_context: &SchemaContext<'_>,
    dynamic_context: &DynamicContext,
    value: &Value,
) -> Result<Vec<Step>, CompileError> {
    Ok(vec![make_assertion(
        schema_context,
        dynamic_context,
        StepKind::MaxLength {
            limit: limit("maxLength", value)?,
        },
        Vec::new(),
    )])
}

pub fn compile_pattern(
    schema_context: &SchemaContext<'_>,
    dynamic_context: &DynamicContext,
    value: &Value,
) -> Result<Vec<Step>, CompileError> {
    let source = value
        .as_str()
        .ok_or_else(|| malformed("pattern", "a string"))?;
    Ok(vec![make_assertion(
        schema_context,
        dynamic_context,
        StepKind::Regex {
            value: RegexValue::new(source)?,
        },
        Vec::new(),
    )])
}

pub fn compile_min_items(
    schema_context: &SchemaContext<'_>,
    dynamic_context: &DynamicContext,
    value: &Value,
) -> Result<Vec<Step>, CompileError> {
    Ok(vec![make_assertion(
        schema_context,
        dynamic_context,
        StepKind::MinSize {
            limit: limit("minItems", value)?,
        },
        type_condition(schema_context, JsonType::Array),
    )])
}

pub fn compile_max_items(
    schema_context: &SchemaContext<'_>,
    dynamic_context: &DynamicContext,
    value: &Value,
) -> Result<Vec<Step>, CompileError> {
    Ok(vec![make_assertion(
        schema_context,
        dynamic_context,
        StepKind::MaxSize {
            limit: limit("maxItems", value)?,
        },
        type_condition(schema_context, JsonType::Array),
    )])
}

pub fn compile_unique_items(
    schema_context: &SchemaContext<'_>,
    dynamic_context: &DynamicContext,
    value: &Value,
) -> Result<Vec<Step>, CompileError> {
    if value.as_bool() != Some(true) {
        return Ok(Vec::new());
    }
    Ok(vec![make_assertion(
        schema_context,
        dynamic_context,
        StepKind::Unique,
        Vec::new(),
    )])
}

pub fn compile_min_properties(
    schema_context: &SchemaContext<'_>,
    dynamic_context: &DynamicContext,
    value: &Value,
) -> Result<Vec<Step>, CompileError> {
    Ok(vec![make_assertion(
        schema_context,
        dynamic_context,
        StepKind::MinSize {
            limit: limit("minProperties", value)?,
        },
        type_condition(schema_context, JsonType::Object),
    )])
}

pub fn compile_max_properties(
    schema_context: &SchemaContext<'_>,
    dynamic_context: &DynamicContext,
    value: &Value,
) -> Result<Vec<Step>, CompileError> {
    Ok(vec![make_assertion(
        schema_context,
        dynamic_context,
        StepKind::MaxSize {
            limit: limit("maxProperties", value)?,
        },
        type_condition(schema_context, JsonType::Object),
    )])
}
