//! Expression-tree substrate for csx.
//!
//! This crate owns the data every other csx crate operates on:
//!
//! - [`Type`] and the nominal type model ([`TypeDef`], members, methods)
//! - [`Expr`], its node kinds, and the [`Var`]/[`LabelTarget`] handles
//! - [`Pattern`] data for pattern matching
//! - the well-known [`runtime`] surface lowered trees call into
//! - [`build`] constructors and [`traverse`] recursion helpers
//! - [`CsxError`], the construction error shared by all factories
//!
//! It performs no lowering itself. Extension nodes are validated and reduced
//! by `csx_patterns` and `csx_async`.

pub mod build;
mod error;
mod expr;
mod pattern;
pub mod runtime;
mod stack;
pub mod traverse;
mod types;

pub use error::{CsxError, ErrorCode};
pub use expr::{
    BinaryOp, CatchBlock, ConstValue, Expr, ExprKind, GotoKind, IndexValue, LabelTarget,
    LambdaData, RangeValue, SwitchArm, SwitchCase, UnaryOp, Var,
};
pub use pattern::{
    BinaryPatternOp, ParameterKey, Pattern, PatternInfo, PatternKind, PatternType,
    PositionalSubpattern, PropertySubpattern, RelationalOp, SubpatternMember, TupleField,
};
pub use runtime::{AsyncBuilder, Intrinsic};
pub use stack::ensure_sufficient_stack;
pub use types::{
    FieldDef, MemberInfo, MemberKind, MethodBody, MethodDef, MethodInfo, ParamInfo, Type,
    TypeBuilder, TypeDef, TypeDefKind,
};
