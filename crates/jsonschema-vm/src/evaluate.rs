//! The template interpreter.
//!
//! [`evaluate`] walks a compiled [`Template`] against an instance,
//! dispatching on each step kind, recursing into children and guards, and
//! reporting every executed step to an optional callback. Validation
//! failure is the ordinary `false` result; only the machinery faults of
//! [`EvaluateError`] surface as errors.

use serde_json::Value;

use jsonschema_vm_pointer::{WeakPointer, WeakToken};

use crate::context::EvaluationContext;
use crate::error::EvaluateError;
use crate::steps::{
    AnnotationPayload, ContainsBounds, ItemsOrigin, PropertySelection, Step, StepKind, Template,
};
use crate::util;

/// How thoroughly a template is walked.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EvaluationMode {
    /// Short-circuit on the first conclusive result.
    Fast,
    /// Visit every step so sibling branches leave their annotations even
    /// after the containing result is known. Required whenever a later
    /// keyword consumes annotations.
    Exhaustive,
}

/// Invoked once per executed step, after its result is known, with the
/// result, the step, the current evaluate path and instance location, and
/// the annotation the step emitted, if any.
pub type EvaluationCallback<'c> =
    dyn FnMut(bool, &Step, &WeakPointer<'_>, &WeakPointer<'_>, Option<&Value>) + 'c;

/// Evaluates a template against an instance.
///
/// The mode is the one the compiler decided the template needs: exhaustive
/// when the schema consumes annotations, fast otherwise.
pub fn evaluate(template: &Template, instance: &Value) -> Result<bool, EvaluateError> {
    let mut context = EvaluationContext::new();
    evaluate_in(template, instance, mode_for(template), &mut context, None)
}

/// Evaluates a template in an explicit mode, tracing every step.
pub fn evaluate_with(
    template: &Template,
    instance: &Value,
    mode: EvaluationMode,
    callback: &mut EvaluationCallback<'_>,
) -> Result<bool, EvaluateError> {
    let mut context = EvaluationContext::new();
    evaluate_in(template, instance, mode, &mut context, Some(callback))
}

/// Evaluates a template into a caller-supplied context, which afterwards
/// holds the final annotation store and (balanced) stacks for inspection.
pub fn evaluate_in<'a>(
    template: &'a Template,
    instance: &'a Value,
    mode: EvaluationMode,
    context: &mut EvaluationContext<'a>,
    callback: Option<&mut EvaluationCallback<'_>>,
) -> Result<bool, EvaluateError> {
    context.prepare(instance);
    let mut evaluator = Evaluator { mode, callback };
    evaluator.sequence(&template.steps, context)
}

/// The mode a template calls for.
pub fn mode_for(template: &Template) -> EvaluationMode {
    if template.dynamic {
        EvaluationMode::Exhaustive
    } else {
        EvaluationMode::Fast
    }
}

struct Evaluator<'c, 'd> {
    mode: EvaluationMode,
    callback: Option<&'c mut EvaluationCallback<'d>>,
}

impl<'c, 'd> Evaluator<'c, 'd> {
    /// A plain sequence is an implicit conjunction.
    fn sequence<'a>(
        &mut self,
        steps: &'a [Step],
        context: &mut EvaluationContext<'a>,
    ) -> Result<bool, EvaluateError> {
        let mut result = true;
        for step in steps {
            if !self.step(step, context)? {
                result = false;
                if self.mode == EvaluationMode::Fast {
                    break;
                }
            }
        }
        Ok(result)
    }

    fn step<'a>(
        &mut self,
        step: &'a Step,
        context: &mut EvaluationContext<'a>,
    ) -> Result<bool, EvaluateError> {
        let (resource, dynamic) = match &step.kind {
            StepKind::Jump {
                schema_resource,
                dynamic,
                ..
            } => (schema_resource.as_str(), *dynamic),
            _ => ("", false),
        };

        context.push(
            &step.relative_schema_location,
            &step.relative_instance_location,
            resource,
            dynamic,
        )?;
        context.target_type(step.target.kind);

        if !step.condition.is_empty() {
            let holds = Evaluator {
                mode: EvaluationMode::Fast,
                callback: None,
            }
            .sequence(&step.condition, context)?;
            if !holds {
                // The guard evaluated a branch that does not apply here;
                // whatever it annotated must not leak out of this frame.
                context.mask();
                self.report(true, step, context, None);
                context.pop(dynamic);
                return Ok(true);
            }
            // The guard may have reassigned the active target.
            context.target_type(step.target.kind);
        }

        let mut annotation = None;
        let result = self.apply(step, context, &mut annotation)?;
        if !result {
            // A failed schema contributes no annotations: suppress
            // everything recorded under this frame for later queries.
            context.mask();
        }
        self.report(result, step, context, annotation.as_ref());
        context.pop(dynamic);
        Ok(result)
    }

    fn apply<'a>(
        &mut self,
        step: &'a Step,
        context: &mut EvaluationContext<'a>,
        annotation: &mut Option<Value>,
    ) -> Result<bool, EvaluateError> {
        match &step.kind {
            StepKind::Fail => Ok(false),

            StepKind::Defines { property } => Ok(context
                .resolve_target(&step.target)
                .as_object()
                .is_some_and(|object| object.contains_key(property))),

            StepKind::DefinesAll { properties } => Ok(context
                .resolve_target(&step.target)
                .as_object()
                .is_some_and(|object| {
                    properties.iter().all(|property| object.contains_key(property))
                })),

            StepKind::Type { expected } => {
                Ok(expected.matches(context.resolve_target(&step.target)))
            }

            StepKind::TypeAny { expected } => {
                let target = context.resolve_target(&step.target);
                Ok(expected.iter().any(|candidate| candidate.matches(target)))
            }

            StepKind::Regex { value } => Ok(context
                .resolve_string_target(&step.target)
                .is_none_or(|target| value.pattern.is_match(target))),

            StepKind::Equal { value } => {
                Ok(util::equal(context.resolve_target(&step.target), value))
            }

            StepKind::EqualAny { values } => {
                let target = context.resolve_target(&step.target);
                Ok(values.iter().any(|value| util::equal(target, value)))
            }

            StepKind::GreaterEqual { bound } => Ok(compare(context, step, bound, |ordering| {
                ordering.is_ge()
            })),
            StepKind::Greater { bound } => {
                Ok(compare(context, step, bound, |ordering| ordering.is_gt()))
            }
            StepKind::LessEqual { bound } => {
                Ok(compare(context, step, bound, |ordering| ordering.is_le()))
            }
            StepKind::Less { bound } => {
                Ok(compare(context, step, bound, |ordering| ordering.is_lt()))
            }

            StepKind::Divisible { divisor } => {
                let target = context.resolve_target(&step.target);
                if target.is_number() {
                    Ok(util::is_multiple_of(target, divisor))
                } else {
                    Ok(true)
                }
            }

            StepKind::MinLength { limit } => Ok(context
                .resolve_string_target(&step.target)
                .is_none_or(|target| target.chars().count() as u64 >= *limit)),

            StepKind::MaxLength { limit } => Ok(context
                .resolve_string_target(&step.target)
                .is_none_or(|target| target.chars().count() as u64 <= *limit)),

            StepKind::MinSize { limit } => Ok(size(context.resolve_target(&step.target))
                .is_none_or(|count| count >= *limit)),

            StepKind::MaxSize { limit } => Ok(size(context.resolve_target(&step.target))
                .is_none_or(|count| count <= *limit)),

            StepKind::Unique => {
                let Some(items) = context.resolve_target(&step.target).as_array() else {
                    return Ok(true);
                };
                for (index, left) in items.iter().enumerate() {
                    if items[index + 1..].iter().any(|right| util::equal(left, right)) {
                        return Ok(false);
                    }
                }
                Ok(true)
            }

            StepKind::And { children } => self.sequence(children, context),

            StepKind::Or { children } => {
                let mut result = children.is_empty();
                for child in children {
                    if self.step(child, context)? {
                        result = true;
                        if self.mode == EvaluationMode::Fast {
                            break;
                        }
                    }
                }
                Ok(result)
            }

            StepKind::Xor { children } => {
                let mut matches = 0usize;
                for child in children {
                    if self.step(child, context)? {
                        matches += 1;
                        if matches > 1 && self.mode == EvaluationMode::Fast {
                            break;
                        }
                    }
                }
                Ok(matches == 1)
            }

            StepKind::Not { children } => {
                let inner = self.sequence(children, context)?;
                // Annotations from a negated subschema never apply,
                // whichever way it went.
                context.mask();
                Ok(!inner)
            }

            StepKind::WhenType { expected, children } => {
                if expected.matches(context.resolve_target(&step.target)) {
                    self.sequence(children, context)
                } else {
                    Ok(true)
                }
            }

            StepKind::WhenDefines { property, children } => {
                let applies = context
                    .resolve_target(&step.target)
                    .as_object()
                    .is_some_and(|object| object.contains_key(property));
                if applies {
                    self.sequence(children, context)
                } else {
                    Ok(true)
                }
            }

            StepKind::LoopProperties { selection, children } => {
                self.loop_properties(step, selection, children, context)
            }

            StepKind::LoopKeys { children } => self.loop_keys(step, children, context),

            StepKind::LoopItems { origin, children } => {
                self.loop_items(step, origin, children, context)
            }

            StepKind::LoopContains { bounds, children } => {
                self.loop_contains(step, bounds, children, context)
            }

            StepKind::LoopPropertiesUnevaluated { accounted, children } => {
                self.loop_properties_unevaluated(step, accounted, children, context)
            }

            StepKind::LoopItemsUnevaluated { accounted, children } => {
                self.loop_items_unevaluated(step, accounted, children, context)
            }

            StepKind::Annotation { payload } => {
                let (location, value) = match payload {
                    AnnotationPayload::Value(value) => {
                        (context.instance_location().to_pointer(), value.clone())
                    }
                    AnnotationPayload::PropertyName => {
                        let name = context
                            .template_property()
                            .expect("a property loop must be active");
                        (
                            context.instance_location().to_parent_pointer(),
                            Value::String(name.to_string()),
                        )
                    }
                    AnnotationPayload::BasenameToParent => {
                        let basename = context
                            .instance_location()
                            .back()
                            .expect("the instance location must not be empty");
                        let value = match basename {
                            WeakToken::Property(name) => Value::String(name.to_string()),
                            WeakToken::Index(index) => Value::from(index),
                        };
                        (context.instance_location().to_parent_pointer(), value)
                    }
                };
                context.annotate(location, value.clone());
                *annotation = Some(value);
                Ok(true)
            }

            StepKind::Mark { id, children } => {
                context.mark(*id, children);
                Ok(true)
            }

            StepKind::Jump { id, .. } => {
                let steps = context.jump(*id)?;
                self.sequence(steps, context)
            }

            StepKind::DynamicJump { anchor } => match context.find_dynamic_anchor(anchor) {
                Some(id) => {
                    let steps = context.jump(id)?;
                    self.sequence(steps, context)
                }
                None => Ok(false),
            },
        }
    }

    fn loop_properties<'a>(
        &mut self,
        step: &'a Step,
        selection: &'a PropertySelection,
        children: &'a [Step],
        context: &mut EvaluationContext<'a>,
    ) -> Result<bool, EvaluateError> {
        let Some(object) = context.resolve_target(&step.target).as_object() else {
            return Ok(true);
        };

        let mut result = true;
        for (name, value) in object {
            let selected = match selection {
                PropertySelection::Matching(regex) => regex.pattern.is_match(name),
                PropertySelection::NotMatching { names, patterns } => {
                    !names.iter().any(|candidate| candidate == name)
                        && !patterns.iter().any(|regex| regex.pattern.is_match(name))
                }
            };
            if !selected {
                continue;
            }

            let stashed = context.template_property();
            context.set_template_property(Some(name));
            context.push_value(
                jsonschema_vm_pointer::empty_pointer(),
                WeakToken::Property(name),
                value,
                "",
                false,
            )?;
            let held = self.sequence(children, context)?;
            context.pop(false);
            context.set_template_property(stashed);

            if !held {
                result = false;
                if self.mode == EvaluationMode::Fast {
                    break;
                }
            }
        }

        Ok(result)
    }

    fn loop_keys<'a>(
        &mut self,
        step: &'a Step,
        children: &'a [Step],
        context: &mut EvaluationContext<'a>,
    ) -> Result<bool, EvaluateError> {
        let Some(object) = context.resolve_target(&step.target).as_object() else {
            return Ok(true);
        };

        let mut result = true;
        for (name, value) in object {
            let stashed = context.template_property();
            context.set_template_property(Some(name));
            context.push_value(
                jsonschema_vm_pointer::empty_pointer(),
                WeakToken::Property(name),
                value,
                "",
                false,
            )?;
            let held = self.sequence(children, context)?;
            context.pop(false);
            context.set_template_property(stashed);

            if !held {
                result = false;
                if self.mode == EvaluationMode::Fast {
                    break;
                }
            }
        }

        Ok(result)
    }

    fn loop_items<'a>(
        &mut self,
        step: &'a Step,
        origin: &'a ItemsOrigin,
        children: &'a [Step],
        context: &mut EvaluationContext<'a>,
    ) -> Result<bool, EvaluateError> {
        let Some(items) = context.resolve_target(&step.target).as_array() else {
            return Ok(true);
        };

        let start = match origin {
            ItemsOrigin::Index(index) => *index,
            ItemsOrigin::Annotation(keyword) => {
                context.largest_annotation_index(keyword) as usize
            }
        };

        let mut result = true;
        for (index, item) in items.iter().enumerate().skip(start) {
            context.push_value(
                jsonschema_vm_pointer::empty_pointer(),
                WeakToken::Index(index),
                item,
                "",
                false,
            )?;
            let held = self.sequence(children, context)?;
            context.pop(false);

            if held {
                let location = context.instance_location().to_pointer();
                context.annotate(location, Value::from(index));
            } else {
                result = false;
                if self.mode == EvaluationMode::Fast {
                    break;
                }
            }
        }

        Ok(result)
    }

    fn loop_contains<'a>(
        &mut self,
        step: &'a Step,
        bounds: &'a ContainsBounds,
        children: &'a [Step],
        context: &mut EvaluationContext<'a>,
    ) -> Result<bool, EvaluateError> {
        let Some(items) = context.resolve_target(&step.target).as_array() else {
            return Ok(true);
        };

        let mut matched = 0u64;
        for (index, element) in items.iter().enumerate() {
            let stashed = context.template_instance();
            context.set_template_instance(Some(element));
            context.push_value(
                jsonschema_vm_pointer::empty_pointer(),
                WeakToken::Index(index),
                element,
                "",
                false,
            )?;
            let held = self.sequence(children, context)?;
            context.pop(false);
            context.set_template_instance(stashed);

            if held {
                matched += 1;
                let location = context.instance_location().to_pointer();
                context.annotate(location, Value::from(index));
                // With no upper bound and no need for full tracking, the
                // decision is made as soon as the minimum is reached.
                if self.mode == EvaluationMode::Fast
                    && !bounds.exhaustive
                    && bounds.maximum.is_none()
                    && matched >= bounds.minimum
                {
                    break;
                }
            }
        }

        Ok(matched >= bounds.minimum
            && bounds.maximum.is_none_or(|maximum| matched <= maximum))
    }

    fn loop_properties_unevaluated<'a>(
        &mut self,
        step: &'a Step,
        accounted: &'a [String],
        children: &'a [Step],
        context: &mut EvaluationContext<'a>,
    ) -> Result<bool, EvaluateError> {
        let Some(object) = context.resolve_target(&step.target).as_object() else {
            return Ok(true);
        };

        let mut result = true;
        for name in object.keys() {
            if context
                .defines_sibling_annotation(accounted, &Value::String(name.clone()))
            {
                continue;
            }

            context.enter(name);
            let held = self.sequence(children, context)?;
            context.leave();

            if held {
                let location = context.instance_location().to_pointer();
                context.annotate(location, Value::String(name.clone()));
            } else {
                result = false;
                if self.mode == EvaluationMode::Fast {
                    break;
                }
            }
        }

        Ok(result)
    }

    fn loop_items_unevaluated<'a>(
        &mut self,
        step: &'a Step,
        accounted: &'a [String],
        children: &'a [Step],
        context: &mut EvaluationContext<'a>,
    ) -> Result<bool, EvaluateError> {
        let Some(items) = context.resolve_target(&step.target).as_array() else {
            return Ok(true);
        };

        let mut result = true;
        for index in 0..items.len() {
            if context.defines_sibling_annotation(accounted, &Value::from(index)) {
                continue;
            }

            context.enter_index(index);
            let held = self.sequence(children, context)?;
            context.leave();

            if held {
                let location = context.instance_location().to_pointer();
                context.annotate(location, Value::from(index));
            } else {
                result = false;
                if self.mode == EvaluationMode::Fast {
                    break;
                }
            }
        }

        Ok(result)
    }

    fn report(
        &mut self,
        result: bool,
        step: &Step,
        context: &EvaluationContext<'_>,
        annotation: Option<&Value>,
    ) {
        if let Some(callback) = self.callback.as_mut() {
            callback(
                result,
                step,
                context.evaluate_path(),
                context.instance_location(),
                annotation,
            );
        }
    }
}

fn compare(
    context: &EvaluationContext<'_>,
    step: &Step,
    bound: &Value,
    accept: impl Fn(std::cmp::Ordering) -> bool,
) -> bool {
    match util::compare_numbers(context.resolve_target(&step.target), bound) {
        Some(ordering) => accept(ordering),
        // Numeric keywords do not apply to non-numbers.
        None => true,
    }
}

fn size(value: &Value) -> Option<u64> {
    match value {
        Value::Array(items) => Some(items.len() as u64),
        Value::Object(object) => Some(object.len() as u64),
        _ => None,
    }
}
