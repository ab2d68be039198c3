//! Evaluation errors and non-local control flow.
//!
//! Two kinds of failure are kept apart:
//!
//! - **Runtime exceptions** raised by the evaluated program (invalid casts,
//!   null dereferences, `throw`). These are ordinary [`Value::Exception`]
//!   values that the program itself may catch.
//! - **[`EvalError`]s**: the tree cannot be evaluated at all, e.g. an
//!   unbound variable or an extension node that was never reduced. These
//!   bypass `catch` and `finally`.

use csx_ir::{LabelTarget, Type};
use thiserror::Error;

use crate::value::Value;

#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum EvalError {
    #[error("variable `{name}` is not bound")]
    UnboundVariable { name: String },

    #[error("`{kind}` must be reduced before evaluation")]
    UnreducedNode { kind: &'static str },

    #[error("jump to label `{label}` escapes its function")]
    EscapingGoto { label: String },

    #[error("label `{label}` is not reachable from the jump")]
    LabelNotFound { label: String },

    #[error("no host function registered as `{key}`")]
    UnknownHost { key: String },

    #[error("method `{name}` has no executable body")]
    NoMethodBody { name: String },

    #[error("expected {expected}, found `{found}`")]
    TypeMismatch {
        expected: &'static str,
        found: String,
    },

    #[error("cannot assign to this expression")]
    InvalidAssignmentTarget,

    #[error("`throw;` outside a catch handler")]
    RethrowOutsideHandler,

    #[error("unhandled `{ty}`: {message}")]
    UnhandledException { ty: Type, message: String },
}

pub type EvalResult<T = Value> = Result<T, EvalError>;

pub(crate) fn label_name(label: &LabelTarget) -> String {
    label.name().unwrap_or("<anonymous>").to_owned()
}

pub(crate) fn type_mismatch(expected: &'static str, found: &Value) -> EvalError {
    EvalError::TypeMismatch {
        expected,
        found: format!("{found:?}"),
    }
}

/// Why evaluation of a subtree stopped early.
pub(crate) enum Flow {
    Goto { target: LabelTarget, value: Value },
    Throw(Value),
    Error(EvalError),
}

impl From<EvalError> for Flow {
    fn from(err: EvalError) -> Self {
        Flow::Error(err)
    }
}

pub(crate) type Outcome<T = Value> = Result<T, Flow>;

/// Convert an uncaught exception into an [`EvalError`] at a top-level entry
/// point.
pub(crate) fn unhandled(exception: &Value) -> EvalError {
    match exception {
        Value::Exception(e) => EvalError::UnhandledException {
            ty: e.ty.clone(),
            message: e.message.to_string(),
        },
        other => EvalError::UnhandledException {
            ty: other.runtime_type().unwrap_or(Type::Object),
            message: format!("{other:?}"),
        },
    }
}
