//! Runtime error types.

use thiserror::Error;

use crate::value::JsValue;

/// Failure while compiling or running an evaluator.
#[derive(Debug, Clone, Error)]
pub enum EvalError {
    #[error("parse error: {0}")]
    Parse(String),
    #[error("unsupported syntax: {0}")]
    Unsupported(String),
    #[error("TypeError: {0}")]
    Type(String),
    #[error("ReferenceError: {0} is not defined")]
    Reference(String),
    #[error("RangeError: {0}")]
    Range(String),
    /// A value raised by `throw`.
    #[error("uncaught {0}")]
    Thrown(JsValue),
    #[error("step budget exhausted")]
    BudgetExhausted,
    #[error("maximum call depth exceeded")]
    CallDepth,
}

impl EvalError {
    /// The value a `catch` clause binds for this error.
    pub fn to_thrown(&self) -> JsValue {
        let (name, message) = match self {
            Self::Thrown(value) => return value.clone(),
            Self::Type(msg) => ("TypeError", msg.clone()),
            Self::Reference(name) => ("ReferenceError", format!("{name} is not defined")),
            Self::Range(msg) => ("RangeError", msg.clone()),
            other => ("Error", other.to_string()),
        };
        let mut props = crate::value::Properties::new();
        props.insert("name".to_string(), JsValue::from(name));
        props.insert("message".to_string(), JsValue::from(message));
        JsValue::object(props)
    }

    /// Whether `catch` may intercept the error.
    pub fn is_catchable(&self) -> bool {
        !matches!(self, Self::BudgetExhausted | Self::CallDepth)
    }
}

pub type EvalResult<T> = Result<T, EvalError>;

/// Failure while building or mutating the scope tree.
#[derive(Debug, Clone, Error)]
pub enum PageError {
    #[error("no element found for scope `{0}`")]
    MissingElement(String),
    #[error("inline markup of scope `{id}` has no element: {reason}")]
    InlineMarkup { id: String, reason: String },
    #[error("unknown scope")]
    UnknownScope,
    #[error("scope `{0}` has no parent to clone into")]
    NotClonable(String),
    #[error("clone index {index} of scope `{id}` is not the next free index {expected}")]
    CloneIndex {
        id: String,
        index: usize,
        expected: usize,
    },
    #[error("evaluator of `{key}` failed to compile: {source}")]
    Evaluator { key: String, source: EvalError },
    #[error("the root scope cannot be disposed")]
    RootDisposal,
    #[error("clone `{0}` is not the last clone of its template")]
    NotLastClone(String),
    #[error(transparent)]
    Eval(#[from] EvalError),
}
