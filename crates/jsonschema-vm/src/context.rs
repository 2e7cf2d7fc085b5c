//! The evaluation runtime state machine.
//!
//! One [`EvaluationContext`] carries all mutable state for one `evaluate`
//! call: the two path cursors, the per-frame size records that let `pop`
//! undo exactly what `push` did, the live dynamic-resource stack, the
//! instance reference stack, the label table for mark/jump control flow,
//! and the annotation store with its masking blacklist.
//!
//! Every borrow shares one lifetime: the compiled template and the
//! instance document must both outlive the context.

use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};

use indexmap::IndexMap;
use jsonschema_vm_pointer::{Pointer, Token, WeakPointer, WeakToken};
use serde_json::Value;
use std::sync::OnceLock;

use crate::error::EvaluateError;
use crate::steps::{Step, Target, TargetType};
use crate::util;

/// Ceiling on the evaluate-path token count. Growing past it aborts the
/// evaluation: an ever-growing evaluate path is how infinite recursion
/// through cyclic references manifests, and this is the cheap way to catch
/// it.
pub const EVALUATE_PATH_LIMIT: usize = 300;

/// The label identifier for an anchor inside a schema resource.
///
/// Identifiers are content-addressed: the same `(resource, anchor)` pair
/// always yields the same id, which is how a dynamic jump finds marks
/// registered far away in the template. Static reference targets use the
/// same scheme with their pointer fragment as the anchor; fragments start
/// with `/`, which no anchor name may contain, so the two cannot collide.
pub fn anchor_label(resource: &str, anchor: &str) -> u64 {
    let mut hasher = DefaultHasher::new();
    resource.hash(&mut hasher);
    '#'.hash(&mut hasher);
    anchor.hash(&mut hasher);
    hasher.finish()
}

fn key_placeholder() -> &'static Value {
    // When the property name is the active target, non-string assertions
    // still need some value to fail against. Which string it is never
    // matters.
    static PLACEHOLDER: OnceLock<Value> = OnceLock::new();
    PLACEHOLDER.get_or_init(|| Value::String(String::new()))
}

/// Mutable runtime state for one evaluation.
#[derive(Default)]
pub struct EvaluationContext<'a> {
    evaluate_path: WeakPointer<'a>,
    instance_location: WeakPointer<'a>,
    frame_sizes: Vec<(usize, usize)>,
    resources: Vec<&'a str>,
    instances: Vec<&'a Value>,
    labels: HashMap<u64, &'a [Step]>,
    annotations: IndexMap<Pointer, IndexMap<Pointer, Vec<Value>>>,
    annotation_blacklist: Vec<Pointer>,
    property_as_instance: bool,
    template_instance: Option<&'a Value>,
    template_property: Option<&'a str>,
}

impl<'a> EvaluationContext<'a> {
    pub fn new() -> Self {
        EvaluationContext::default()
    }

    /// Resets the context for the next top-level evaluation of `instance`.
    ///
    /// Must only be called between evaluations, never mid-traversal; the
    /// assertions here are invariant checks, not user-facing errors.
    pub fn prepare(&mut self, instance: &'a Value) {
        assert!(self.evaluate_path.is_empty());
        assert!(self.instance_location.is_empty());
        assert!(self.frame_sizes.is_empty());
        assert!(self.resources.is_empty());
        self.instances.clear();
        self.instances.push(instance);
        self.labels.clear();
        self.annotations.clear();
        self.annotation_blacklist.clear();
        self.property_as_instance = false;
        self.template_instance = None;
        self.template_property = None;
    }

    fn push_frame(
        &mut self,
        relative_schema_location: &'a Pointer,
        instance_tokens: usize,
        schema_resource: &'a str,
        dynamic: bool,
    ) -> Result<(), EvaluateError> {
        if self.evaluate_path.len() + relative_schema_location.len() > EVALUATE_PATH_LIMIT {
            return Err(EvaluateError::TraversalDepthExceeded);
        }

        self.frame_sizes
            .push((relative_schema_location.len(), instance_tokens));
        self.evaluate_path.extend_from(relative_schema_location);

        if dynamic {
            // The same schema resource may pile up repeatedly. Keeping the
            // stack pure would cost more than the duplicates do.
            self.resources.push(schema_resource);
        }

        Ok(())
    }

    /// Descends into a step frame, appending both relative locations. When
    /// the instance location is non-empty, the corresponding child value is
    /// looked up from the current instance and pushed.
    pub fn push(
        &mut self,
        relative_schema_location: &'a Pointer,
        relative_instance_location: &'a Pointer,
        schema_resource: &'a str,
        dynamic: bool,
    ) -> Result<(), EvaluateError> {
        self.push_frame(
            relative_schema_location,
            relative_instance_location.len(),
            schema_resource,
            dynamic,
        )?;

        if !relative_instance_location.is_empty() {
            let current = *self
                .instances
                .last()
                .expect("the instance stack must not be empty");
            let child = util::get(current, relative_instance_location)
                .expect("a relative instance location must resolve from the current instance");
            for token in relative_instance_location.tokens() {
                self.instance_location.push(token.as_weak());
            }
            self.instances.push(child);
        }

        Ok(())
    }

    /// Descends into a step frame with a pre-resolved value, for loop
    /// bodies that already hold the element and for values that are not
    /// structural children of the current instance.
    pub fn push_value(
        &mut self,
        relative_schema_location: &'a Pointer,
        instance_token: WeakToken<'a>,
        value: &'a Value,
        schema_resource: &'a str,
        dynamic: bool,
    ) -> Result<(), EvaluateError> {
        self.push_frame(relative_schema_location, 1, schema_resource, dynamic)?;
        self.instance_location.push(instance_token);
        self.instances.push(value);
        Ok(())
    }

    /// Undoes the most recent `push`, trimming both cursors by exactly the
    /// recorded counts.
    pub fn pop(&mut self, dynamic: bool) {
        let (schema_tokens, instance_tokens) = self
            .frame_sizes
            .pop()
            .expect("pop must pair with a prior push");
        self.evaluate_path.pop_back(schema_tokens);
        self.instance_location.pop_back(instance_tokens);
        if instance_tokens > 0 {
            self.instances.pop();
        }

        if dynamic {
            assert!(!self.resources.is_empty());
            self.resources.pop();
        }
    }

    /// Lighter-weight descent into one object property.
    pub fn enter(&mut self, property: &'a str) {
        let current = *self
            .instances
            .last()
            .expect("the instance stack must not be empty");
        let child = current
            .get(property)
            .expect("the property must exist in the current object");
        self.instance_location.push(WeakToken::Property(property));
        self.instances.push(child);
    }

    /// Lighter-weight descent into one array element.
    pub fn enter_index(&mut self, index: usize) {
        let current = *self
            .instances
            .last()
            .expect("the instance stack must not be empty");
        let child = current
            .get(index)
            .expect("the index must exist in the current array");
        self.instance_location.push(WeakToken::Index(index));
        self.instances.push(child);
    }

    /// Undoes the most recent `enter`/`enter_index`.
    pub fn leave(&mut self) {
        self.instance_location.pop_back(1);
        self.instances.pop();
    }

    /// Records the current evaluate path as a mask: annotations recorded
    /// under it stop being visible to queries made from outside it. This
    /// is how annotations from a branch that turned out not to apply are
    /// kept from leaking into `unevaluated*` decisions.
    pub fn mask(&mut self) {
        self.annotation_blacklist
            .push(self.evaluate_path.to_pointer());
    }

    fn masked(&self, schema_location: &Pointer) -> bool {
        self.annotation_blacklist.iter().any(|mask| {
            schema_location.starts_with(mask) && !self.evaluate_path.starts_with(mask)
        })
    }

    /// Inserts `value` into the annotation set for the given instance
    /// location under the current evaluate path. Returns whether the value
    /// was newly inserted, with duplicates compared by JSON equality.
    pub fn annotate(&mut self, instance_location: Pointer, value: Value) -> bool {
        let set = self
            .annotations
            .entry(instance_location)
            .or_default()
            .entry(self.evaluate_path.to_pointer())
            .or_default();
        if set.iter().any(|existing| util::equal(existing, &value)) {
            false
        } else {
            set.push(value);
            true
        }
    }

    /// Whether some annotation for `keyword` was recorded at the current
    /// instance location, below the current evaluate path, and is not
    /// masked. This is the "did an earlier keyword in my subtree account
    /// for this element" query.
    pub fn defines_any_annotation(&self, keyword: &str) -> bool {
        let Some(by_schema) = self.annotations.get(&self.instance_location.to_pointer()) else {
            return false;
        };

        by_schema.iter().any(|(schema_location, values)| {
            schema_location.back().and_then(Token::as_property) == Some(keyword)
                && !values.is_empty()
                && schema_location
                    .initial()
                    .starts_with_weak(&self.evaluate_path)
                && !self.masked(schema_location)
        })
    }

    /// Like [`EvaluationContext::defines_any_annotation`], but requires the
    /// annotation value to equal `value` and relates the two schema
    /// locations as siblings (shared initial segment) instead of as
    /// ancestor and descendant. This is the query `unevaluated*` loops use
    /// against the keywords that evaluate side by side with them.
    pub fn defines_sibling_annotation(&self, keywords: &[String], value: &Value) -> bool {
        if keywords.is_empty() {
            return false;
        }

        let Some(by_schema) = self.annotations.get(&self.instance_location.to_pointer()) else {
            return false;
        };

        let mut sibling_prefix = self.evaluate_path.clone();
        if !sibling_prefix.is_empty() {
            sibling_prefix.pop_back(1);
        }

        by_schema.iter().any(|(schema_location, values)| {
            schema_location
                .back()
                .and_then(Token::as_property)
                .is_some_and(|keyword| keywords.iter().any(|expected| expected == keyword))
                && values.iter().any(|existing| util::equal(existing, value))
                && schema_location.initial().starts_with_weak(&sibling_prefix)
                && !self.masked(schema_location)
        })
    }

    /// One past the largest non-negative integer annotated by `keyword` at
    /// the current instance location, or zero. Array keywords use this to
    /// learn how many leading items earlier keywords already covered.
    // TODO: Take masks into account here as well
    pub fn largest_annotation_index(&self, keyword: &str) -> u64 {
        let mut result = 0;

        let Some(by_schema) = self.annotations.get(&self.instance_location.to_pointer()) else {
            return result;
        };

        for (schema_location, values) in by_schema {
            if schema_location.back().and_then(Token::as_property) != Some(keyword) {
                continue;
            }

            for annotation in values {
                if let Some(index) = annotation.as_u64() {
                    result = result.max(index + 1);
                }
            }
        }

        result
    }

    /// Registers `children` under `id`. Idempotent: an id keeps its first
    /// registration.
    pub fn mark(&mut self, id: u64, children: &'a [Step]) {
        self.labels.entry(id).or_insert(children);
    }

    /// The sequence registered under `id`. An unregistered id is a
    /// compiler-invariant violation, surfaced as a distinguished fault.
    pub fn jump(&self, id: u64) -> Result<&'a [Step], EvaluateError> {
        self.labels
            .get(&id)
            .copied()
            .ok_or(EvaluateError::UnregisteredLabel(id))
    }

    /// Resolves a dynamic anchor against the live resource stack, most
    /// recently pushed first, returning the first registered label. Which
    /// resources are live depends on the run-time reference path, not the
    /// lexical nesting of the schema text; that difference is the entire
    /// point of dynamic references.
    pub fn find_dynamic_anchor(&self, anchor: &str) -> Option<u64> {
        for resource in self.resources.iter().rev() {
            let label = anchor_label(resource, anchor);
            if self.labels.contains_key(&label) {
                return Some(label);
            }
        }

        None
    }

    /// Declares which kind of value the next assertion addresses.
    pub fn target_type(&mut self, kind: TargetType) {
        self.property_as_instance =
            matches!(kind, TargetType::Key | TargetType::TemplateProperty);
    }

    /// The value the active step asserts against.
    pub fn resolve_target(&self, target: &Target) -> &'a Value {
        if self.property_as_instance {
            return key_placeholder();
        }

        match target.kind {
            TargetType::TemplateInstance => self
                .template_instance
                .expect("a loop must have stashed the element"),
            _ => {
                let current = *self
                    .instances
                    .last()
                    .expect("the instance stack must not be empty");
                if target.path.is_empty() {
                    current
                } else {
                    util::get(current, &target.path).expect("a target path must resolve")
                }
            }
        }
    }

    /// The string the active step asserts against: the property name when
    /// the target is a key, otherwise the current value if it is a string.
    pub fn resolve_string_target(&self, target: &Target) -> Option<&'a str> {
        if self.property_as_instance {
            if let Some(name) = self.template_property {
                return Some(name);
            }
            return Some(
                self.instance_location
                    .back()
                    .expect("the instance location must not be empty")
                    .as_property()
                    .expect("the instance basename must be a property"),
            );
        }

        self.resolve_target(target).as_str()
    }

    pub fn set_template_instance(&mut self, value: Option<&'a Value>) {
        self.template_instance = value;
    }

    pub fn set_template_property(&mut self, name: Option<&'a str>) {
        self.template_property = name;
    }

    pub fn template_property(&self) -> Option<&'a str> {
        self.template_property
    }

    pub fn template_instance(&self) -> Option<&'a Value> {
        self.template_instance
    }

    pub fn instances(&self) -> &[&'a Value] {
        &self.instances
    }

    pub fn resources(&self) -> &[&'a str] {
        &self.resources
    }

    pub fn evaluate_path(&self) -> &WeakPointer<'a> {
        &self.evaluate_path
    }

    pub fn instance_location(&self) -> &WeakPointer<'a> {
        &self.instance_location
    }

    pub fn annotations(&self) -> &IndexMap<Pointer, IndexMap<Pointer, Vec<Value>>> {
        &self.annotations
    }
}
