//! The compiled instruction model.
//!
//! A schema compiles into a [`Template`]: an ordered sequence of [`Step`]s
//! that the evaluator interprets against an instance. Steps nest (logical
//! and loop steps carry child sequences, and any step may carry a guard
//! sequence), but a child sequence is always self-contained: it references
//! only relative locations and targets resolvable from the runtime context
//! at the point its parent executes, never another step directly.
//!
//! Steps are produced exclusively by the compiler scaffolding in
//! [`crate::compile`] and are immutable once built.

use jsonschema_vm_pointer::Pointer;
use regex::Regex;
use serde_json::Value;

/// Which value a step applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetType {
    /// The value at the current instance location.
    Instance,
    /// The property name at the current instance location, not its value.
    /// Steps with this target assert against the key itself.
    Key,
    /// The element stashed by the innermost value-stashing loop iteration.
    TemplateInstance,
    /// The property name stashed by the innermost property loop iteration.
    TemplateProperty,
}

/// A step target: the kind of value addressed, plus an optional relative
/// path to descend from it first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    pub kind: TargetType,
    pub path: Pointer,
}

impl Target {
    pub fn instance() -> Self {
        Target {
            kind: TargetType::Instance,
            path: Pointer::new(),
        }
    }

    pub fn of(kind: TargetType) -> Self {
        Target {
            kind,
            path: Pointer::new(),
        }
    }
}

/// The seven structural types of the JSON data model.
///
/// Integers and reals are distinct: `1` is an `Integer`, `1.5` is a
/// `Number` only. A real with a zero fractional part still counts as an
/// `Integer`, matching the mathematical-integer reading of modern
/// dialects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JsonType {
    Null,
    Boolean,
    Integer,
    Number,
    String,
    Array,
    Object,
}

impl JsonType {
    pub fn matches(self, value: &Value) -> bool {
        match self {
            JsonType::Null => value.is_null(),
            JsonType::Boolean => value.is_boolean(),
            JsonType::Integer => match value {
                Value::Number(number) => {
                    number.is_i64()
                        || number.is_u64()
                        || number.as_f64().is_some_and(|real| real.fract() == 0.0)
                }
                _ => false,
            },
            JsonType::Number => value.is_number(),
            JsonType::String => value.is_string(),
            JsonType::Array => value.is_array(),
            JsonType::Object => value.is_object(),
        }
    }
}

/// A compiled regular expression that remembers its source, so templates
/// can be rendered back out for inspection.
#[derive(Debug, Clone)]
pub struct RegexValue {
    pub pattern: Regex,
    pub source: String,
}

impl RegexValue {
    pub fn new(source: &str) -> Result<Self, regex::Error> {
        Ok(RegexValue {
            pattern: Regex::new(source)?,
            source: source.to_string(),
        })
    }
}

/// Which object properties a property loop visits.
#[derive(Debug, Clone)]
pub enum PropertySelection {
    /// Properties whose name matches the pattern.
    Matching(RegexValue),
    /// Properties claimed by no listed name and no listed pattern.
    NotMatching {
        names: Vec<String>,
        patterns: Vec<RegexValue>,
    },
}

/// Where an item loop starts iterating.
#[derive(Debug, Clone)]
pub enum ItemsOrigin {
    /// A fixed index known at compile time.
    Index(usize),
    /// One past the largest index annotated by the named keyword at the
    /// current instance location, resolved when the loop runs.
    Annotation(String),
}

/// Iteration policy for a `contains`-style loop.
#[derive(Debug, Clone)]
pub struct ContainsBounds {
    pub minimum: u64,
    pub maximum: Option<u64>,
    /// Keep visiting elements after the bounds are already decided, so
    /// every matching element leaves its annotation.
    pub exhaustive: bool,
}

/// What an annotation step emits.
#[derive(Debug, Clone)]
pub enum AnnotationPayload {
    /// A literal value, recorded at the current instance location.
    Value(Value),
    /// The property name stashed by the enclosing property loop, recorded
    /// at the parent of the current instance location.
    PropertyName,
    /// The last token of the current instance location (a property name or
    /// an index), recorded at the parent of the current instance location.
    BasenameToParent,
}

/// One compiled instruction.
///
/// The frame metadata (target, the two relative locations, the keyword
/// location, and the guard) is carried uniformly; [`StepKind`] holds the
/// payload and, for applicators and controls, the child sequence.
#[derive(Debug, Clone)]
pub struct Step {
    pub target: Target,
    pub relative_schema_location: Pointer,
    pub relative_instance_location: Pointer,
    /// Absolute keyword URI, for reporting only; never read during
    /// evaluation.
    pub keyword_location: String,
    /// Guard sequence: when non-empty and it does not hold, the step's own
    /// effect is skipped and the step is vacuously true.
    pub condition: Vec<Step>,
    pub kind: StepKind,
}

/// The kind-specific part of a step.
#[derive(Debug, Clone)]
pub enum StepKind {
    // Assertions: one boolean from the target value, no recursion.
    Fail,
    Defines { property: String },
    DefinesAll { properties: Vec<String> },
    Type { expected: JsonType },
    TypeAny { expected: Vec<JsonType> },
    Regex { value: RegexValue },
    Equal { value: Value },
    EqualAny { values: Vec<Value> },
    GreaterEqual { bound: Value },
    Greater { bound: Value },
    LessEqual { bound: Value },
    Less { bound: Value },
    Divisible { divisor: Value },
    MinLength { limit: u64 },
    MaxLength { limit: u64 },
    MinSize { limit: u64 },
    MaxSize { limit: u64 },
    Unique,

    // Logicals: children evaluated at the same instance position.
    And { children: Vec<Step> },
    Or { children: Vec<Step> },
    Xor { children: Vec<Step> },
    Not { children: Vec<Step> },
    WhenType { expected: JsonType, children: Vec<Step> },
    WhenDefines { property: String, children: Vec<Step> },

    // Loops: children evaluated once per matching element.
    LoopProperties { selection: PropertySelection, children: Vec<Step> },
    LoopKeys { children: Vec<Step> },
    LoopItems { origin: ItemsOrigin, children: Vec<Step> },
    LoopContains { bounds: ContainsBounds, children: Vec<Step> },
    LoopPropertiesUnevaluated { accounted: Vec<String>, children: Vec<Step> },
    LoopItemsUnevaluated { accounted: Vec<String>, children: Vec<Step> },

    // Annotations: side effects on the context, always true.
    Annotation { payload: AnnotationPayload },

    // Control flow for recursive and dynamically scoped references.
    Mark { id: u64, children: Vec<Step> },
    Jump { id: u64, schema_resource: String, dynamic: bool },
    DynamicJump { anchor: String },
}

impl Step {
    /// The nested sequence, for applicator and mark steps.
    pub fn children(&self) -> &[Step] {
        match &self.kind {
            StepKind::And { children }
            | StepKind::Or { children }
            | StepKind::Xor { children }
            | StepKind::Not { children }
            | StepKind::WhenType { children, .. }
            | StepKind::WhenDefines { children, .. }
            | StepKind::LoopProperties { children, .. }
            | StepKind::LoopKeys { children }
            | StepKind::LoopItems { children, .. }
            | StepKind::LoopContains { children, .. }
            | StepKind::LoopPropertiesUnevaluated { children, .. }
            | StepKind::LoopItemsUnevaluated { children, .. }
            | StepKind::Mark { children, .. } => children,
            _ => &[],
        }
    }
}

/// A compiled schema, ready to be evaluated any number of times.
///
/// `dynamic` is decided once at compile time: it is set when the schema
/// uses annotation-consuming keywords (`unevaluatedProperties`,
/// `unevaluatedItems`), which force exhaustive evaluation so that sibling
/// branches leave their annotations even after a result is known.
#[derive(Debug, Clone, Default)]
pub struct Template {
    pub steps: Vec<Step>,
    pub dynamic: bool,
}
