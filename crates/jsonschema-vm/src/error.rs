use thiserror::Error;

/// Faults raised while evaluating a compiled template.
///
/// Neither of these is a validation failure: an instance that does not
/// match its schema is an ordinary `false` result. These are the cases
/// where the evaluation machinery itself cannot continue, and after one of
/// them the evaluation context's stacks are unspecified and must not be
/// reused without a fresh `prepare`.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EvaluateError {
    #[error("the evaluation path depth limit was reached, likely due to infinite recursion")]
    TraversalDepthExceeded,

    #[error("jump target {0} was never registered")]
    UnregisteredLabel(u64),
}

/// Faults raised while compiling a schema into a template.
#[derive(Error, Debug)]
pub enum CompileError {
    #[error("unknown dialect: {0}")]
    UnknownDialect(String),

    #[error("could not resolve reference: {0}")]
    UnresolvableReference(String),

    #[error("invalid regular expression")]
    InvalidRegex(#[from] regex::Error),

    #[error("invalid reference: {0}")]
    InvalidPointer(#[from] jsonschema_vm_pointer::PointerError),

    #[error("the value of {keyword:?} must be {expected}")]
    MalformedKeyword {
        keyword: String,
        expected: &'static str,
    },
}
