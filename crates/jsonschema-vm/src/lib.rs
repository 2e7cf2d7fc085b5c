//! JSON Schema validation as a compiled step template plus a stack-machine
//! evaluator.
//!
//! # Overview
//!
//! A schema document is compiled once, into an ordered sequence of typed
//! steps. That template is then interpreted any number of times against
//! arbitrary instances, in a fast mode that short-circuits on the first
//! conclusive result or an exhaustive mode that keeps going so annotations
//! from sibling branches are all collected (required for
//! `unevaluatedProperties`/`unevaluatedItems`).
//!
//! # Example
//!
//! ```
//! use jsonschema_vm::{compile, evaluate};
//! use serde_json::json;
//!
//! let schema = json!({
//!     "type": "object",
//!     "properties": {"name": {"type": "string"}},
//!     "required": ["name"]
//! });
//!
//! let template = compile(&schema).unwrap();
//! assert!(evaluate(&template, &json!({"name": "melody"})).unwrap());
//! assert!(!evaluate(&template, &json!({"name": 42})).unwrap());
//! assert!(!evaluate(&template, &json!({})).unwrap());
//! ```

pub mod compile;
pub mod context;
pub mod error;
pub mod evaluate;
pub mod steps;
pub mod util;

// Re-export the core public API
pub use compile::{compile, Dialect};
pub use context::{anchor_label, EvaluationContext, EVALUATE_PATH_LIMIT};
pub use error::{CompileError, EvaluateError};
pub use evaluate::{
    evaluate, evaluate_in, evaluate_with, mode_for, EvaluationCallback, EvaluationMode,
};
pub use steps::{Step, StepKind, Target, TargetType, Template};
