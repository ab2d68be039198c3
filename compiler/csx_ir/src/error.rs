//! Construction errors for extension nodes.
//!
//! Every factory in the workspace validates eagerly and reports problems as a
//! [`CsxError`]. Reductions of successfully constructed nodes do not fail.
//! Each variant maps to a stable [`ErrorCode`]:
//!
//! - `E3xxx`: pattern and pattern-consumer errors
//! - `E7xxx`: async lowering errors

use std::fmt;

use thiserror::Error;

use crate::Type;

/// Stable diagnostic codes.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub enum ErrorCode {
    // Pattern Errors (E3xxx)
    /// Type cannot be tested by a pattern
    E3001,
    /// Composed patterns disagree on their types
    E3002,
    /// Pattern type does not fit its context
    E3003,
    /// Constant type incompatible with the input type
    E3004,
    /// `null` constant on a non-nullable input
    E3005,
    /// Constant not usable in a relational pattern
    E3006,
    /// Relational pattern over a non-ordered type
    E3007,
    /// Designation variable type does not accept the narrowed type
    E3008,
    /// Wrong number of positional subpatterns
    E3009,
    /// Some but not all positional subpatterns name their binding
    E3010,
    /// Two positional subpatterns bind the same position
    E3011,
    /// Positional subpattern names a position that does not exist
    E3012,
    /// Positional binding not allowed in this pattern
    E3013,
    /// Deconstruct method has the wrong shape
    E3014,
    /// Property subpattern member does not belong to its receiver
    E3015,
    /// List pattern accessor has the wrong shape
    E3016,
    /// More than one slice in a list pattern
    E3017,
    /// Switch expression arm value does not fit the result type
    E3018,
    /// Switch expression guard is not boolean
    E3019,

    // Async Errors (E7xxx)
    /// Operand does not implement the awaiter protocol
    E7001,
    /// Async lambda return type is not void, Task or Task<T>
    E7002,
    /// Async lambda body does not fit its result type
    E7003,
    /// `await` inside a catch filter
    E7004,
    /// `await` inside a lock body
    E7005,
    /// `await` inside a catch handler or finally block
    E7006,
    /// `await` reduced outside an async lambda
    E7007,
    /// Lock object is not a reference type
    E7008,
    /// `await` inside a switch case test
    E7009,
}

impl ErrorCode {
    pub fn is_pattern_error(&self) -> bool {
        self.as_str().starts_with("E3")
    }

    pub fn is_async_error(&self) -> bool {
        self.as_str().starts_with("E7")
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::E3001 => "E3001",
            ErrorCode::E3002 => "E3002",
            ErrorCode::E3003 => "E3003",
            ErrorCode::E3004 => "E3004",
            ErrorCode::E3005 => "E3005",
            ErrorCode::E3006 => "E3006",
            ErrorCode::E3007 => "E3007",
            ErrorCode::E3008 => "E3008",
            ErrorCode::E3009 => "E3009",
            ErrorCode::E3010 => "E3010",
            ErrorCode::E3011 => "E3011",
            ErrorCode::E3012 => "E3012",
            ErrorCode::E3013 => "E3013",
            ErrorCode::E3014 => "E3014",
            ErrorCode::E3015 => "E3015",
            ErrorCode::E3016 => "E3016",
            ErrorCode::E3017 => "E3017",
            ErrorCode::E3018 => "E3018",
            ErrorCode::E3019 => "E3019",
            ErrorCode::E7001 => "E7001",
            ErrorCode::E7002 => "E7002",
            ErrorCode::E7003 => "E7003",
            ErrorCode::E7004 => "E7004",
            ErrorCode::E7005 => "E7005",
            ErrorCode::E7006 => "E7006",
            ErrorCode::E7007 => "E7007",
            ErrorCode::E7008 => "E7008",
            ErrorCode::E7009 => "E7009",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An invalid extension node, rejected at construction.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum CsxError {
    #[error("type `{ty}` cannot be used as a pattern type")]
    InvalidPatternType { ty: Type },

    #[error("{context}: `{left}` and `{right}` are incompatible")]
    IncompatiblePatternTypes {
        left: Type,
        right: Type,
        context: &'static str,
    },

    #[error("{context}: expected `{expected}`, found `{found}`")]
    PatternTypeMismatch {
        expected: Type,
        found: Type,
        context: &'static str,
    },

    #[error("constant of type `{constant}` cannot be matched against `{input}`")]
    ConstantTypeMismatch { constant: Type, input: Type },

    #[error("`null` cannot be matched against non-nullable `{ty}`")]
    NullConstantNotAllowed { ty: Type },

    #[error("invalid relational constant: {reason}")]
    InvalidRelationalConstant { reason: &'static str },

    #[error("relational patterns are not supported on `{ty}`")]
    RelationalTypeNotSupported { ty: Type },

    #[error("variable of type `{variable}` cannot hold narrowed type `{narrowed}`")]
    VariableTypeMismatch { variable: Type, narrowed: Type },

    #[error("expected {expected} positional subpatterns, found {found}")]
    DeconstructionArityMismatch { expected: usize, found: usize },

    #[error("positional subpatterns must either all name their binding or none")]
    MixedSubpatternBinding,

    #[error("`{key}` is bound by more than one positional subpattern")]
    DuplicateSubpatternBinding { key: String },

    #[error("`{key}` does not name a deconstructed position")]
    UnknownSubpatternBinding { key: String },

    #[error("invalid positional binding: {reason}")]
    InvalidSubpatternBinding { reason: &'static str },

    #[error("invalid deconstruct method `{name}`: {reason}")]
    InvalidDeconstructMethod { name: String, reason: &'static str },

    #[error("member `{member}` cannot be read from `{ty}`")]
    InvalidSubpatternMember { member: String, ty: Type },

    #[error("invalid {accessor} access: {reason}")]
    InvalidCollectionAccess {
        accessor: &'static str,
        reason: &'static str,
    },

    #[error("a list pattern may contain at most one slice")]
    MultipleSlicePatterns,

    #[error("switch arm value of type `{found}` does not fit result type `{expected}`")]
    ArmTypeMismatch { expected: Type, found: Type },

    #[error("switch arm guard must be `bool`, found `{found}`")]
    GuardNotBoolean { found: Type },

    #[error("`{ty}` is not awaitable: {reason}")]
    NotAwaitable { ty: Type, reason: &'static str },

    #[error("async lambdas must return `void`, `Task` or `Task<T>`, found `{ty}`")]
    InvalidAsyncReturnType { ty: Type },

    #[error("async lambda body of type `{found}` does not fit result type `{expected}`")]
    AsyncBodyTypeMismatch { expected: Type, found: Type },

    #[error("`await` cannot be used in a catch filter")]
    AwaitInCatchFilter,

    #[error("`await` cannot be used in the body of a lock")]
    AwaitInLockBody,

    #[error("`await` cannot be used in a catch handler or finally block")]
    AwaitInExceptionHandler,

    #[error("`await` can only be reduced inside an async lambda")]
    AwaitOutsideAsyncLambda,

    #[error("lock object must be a reference type, found `{ty}`")]
    InvalidLockObject { ty: Type },

    #[error("`await` cannot be used in a switch case test")]
    AwaitInSwitchCaseTest,
}

impl CsxError {
    pub fn code(&self) -> ErrorCode {
        match self {
            CsxError::InvalidPatternType { .. } => ErrorCode::E3001,
            CsxError::IncompatiblePatternTypes { .. } => ErrorCode::E3002,
            CsxError::PatternTypeMismatch { .. } => ErrorCode::E3003,
            CsxError::ConstantTypeMismatch { .. } => ErrorCode::E3004,
            CsxError::NullConstantNotAllowed { .. } => ErrorCode::E3005,
            CsxError::InvalidRelationalConstant { .. } => ErrorCode::E3006,
            CsxError::RelationalTypeNotSupported { .. } => ErrorCode::E3007,
            CsxError::VariableTypeMismatch { .. } => ErrorCode::E3008,
            CsxError::DeconstructionArityMismatch { .. } => ErrorCode::E3009,
            CsxError::MixedSubpatternBinding => ErrorCode::E3010,
            CsxError::DuplicateSubpatternBinding { .. } => ErrorCode::E3011,
            CsxError::UnknownSubpatternBinding { .. } => ErrorCode::E3012,
            CsxError::InvalidSubpatternBinding { .. } => ErrorCode::E3013,
            CsxError::InvalidDeconstructMethod { .. } => ErrorCode::E3014,
            CsxError::InvalidSubpatternMember { .. } => ErrorCode::E3015,
            CsxError::InvalidCollectionAccess { .. } => ErrorCode::E3016,
            CsxError::MultipleSlicePatterns => ErrorCode::E3017,
            CsxError::ArmTypeMismatch { .. } => ErrorCode::E3018,
            CsxError::GuardNotBoolean { .. } => ErrorCode::E3019,
            CsxError::NotAwaitable { .. } => ErrorCode::E7001,
            CsxError::InvalidAsyncReturnType { .. } => ErrorCode::E7002,
            CsxError::AsyncBodyTypeMismatch { .. } => ErrorCode::E7003,
            CsxError::AwaitInCatchFilter => ErrorCode::E7004,
            CsxError::AwaitInLockBody => ErrorCode::E7005,
            CsxError::AwaitInExceptionHandler => ErrorCode::E7006,
            CsxError::AwaitOutsideAsyncLambda => ErrorCode::E7007,
            CsxError::InvalidLockObject { .. } => ErrorCode::E7008,
            CsxError::AwaitInSwitchCaseTest => ErrorCode::E7009,
        }
    }
}
