//! Expression nodes.
//!
//! An [`Expr`] is an immutable, reference-counted typed node. Rewrites build
//! new nodes and share unchanged subtrees; [`Expr::ptr_eq`] is the identity
//! check that lets a rewrite skip rebuilding a parent whose children did not
//! change.
//!
//! Variables ([`Var`]) and labels ([`LabelTarget`]) have reference identity:
//! two variables with the same name and type are different variables unless
//! they are clones of the same handle.
//!
//! The node set has two layers:
//!
//! - **Substrate**: the primitive nodes every lowering bottoms out in
//!   (blocks, labels, gotos, loops, switch, try, calls, lambdas, ...).
//! - **Extensions**: `IsPattern`, `SwitchExpr`, `Await`, `AsyncLambda` and
//!   `Lock`, which reduce to substrate nodes. `SuspendPoint` is an internal
//!   marker that only exists between two stages of async lowering.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use crate::pattern::Pattern;
use crate::types::{MemberInfo, MethodInfo, Type};

/// A typed expression node.
#[derive(Clone)]
pub struct Expr(Arc<ExprNode>);

struct ExprNode {
    kind: ExprKind,
    ty: Type,
}

impl Expr {
    pub fn new(kind: ExprKind, ty: Type) -> Self {
        Expr(Arc::new(ExprNode { kind, ty }))
    }

    #[inline]
    pub fn kind(&self) -> &ExprKind {
        &self.0.kind
    }

    #[inline]
    pub fn ty(&self) -> &Type {
        &self.0.ty
    }

    /// Same node, not merely an equal one.
    #[inline]
    pub fn ptr_eq(&self, other: &Expr) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    /// Whether this node has to be reduced before a substrate consumer can
    /// run it.
    pub fn is_extension(&self) -> bool {
        matches!(
            self.kind(),
            ExprKind::IsPattern { .. }
                | ExprKind::SwitchExpr { .. }
                | ExprKind::Await { .. }
                | ExprKind::AsyncLambda(_)
                | ExprKind::Lock { .. }
                | ExprKind::SuspendPoint { .. }
        )
    }

    pub fn as_parameter(&self) -> Option<&Var> {
        match self.kind() {
            ExprKind::Parameter(var) => Some(var),
            _ => None,
        }
    }

    pub fn as_constant(&self) -> Option<&ConstValue> {
        match self.kind() {
            ExprKind::Constant(value) => Some(value),
            _ => None,
        }
    }
}

impl PartialEq for Expr {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other) || (self.ty() == other.ty() && self.kind() == other.kind())
    }
}

impl fmt::Debug for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self.kind(), f)
    }
}

// ── Variables and labels ────────────────────────────────────────────

/// A variable or lambda parameter. Identity is the handle, not the name.
#[derive(Clone)]
pub struct Var(Arc<Binding>);

/// A jump target. Identity is the handle, not the name.
#[derive(Clone)]
pub struct LabelTarget(Arc<Binding>);

struct Binding {
    name: Option<Arc<str>>,
    ty: Type,
}

macro_rules! binding_handle {
    ($handle:ident) => {
        impl $handle {
            pub fn new(name: &str, ty: Type) -> Self {
                $handle(Arc::new(Binding {
                    name: Some(Arc::from(name)),
                    ty,
                }))
            }

            pub fn unnamed(ty: Type) -> Self {
                $handle(Arc::new(Binding { name: None, ty }))
            }

            /// A distinct handle with the same name and type.
            #[must_use]
            pub fn fresh_like(&self) -> Self {
                $handle(Arc::new(Binding {
                    name: self.0.name.clone(),
                    ty: self.0.ty.clone(),
                }))
            }

            pub fn name(&self) -> Option<&str> {
                self.0.name.as_deref()
            }

            #[inline]
            pub fn ty(&self) -> &Type {
                &self.0.ty
            }
        }

        impl PartialEq for $handle {
            fn eq(&self, other: &Self) -> bool {
                Arc::ptr_eq(&self.0, &other.0)
            }
        }

        impl Eq for $handle {}

        impl Hash for $handle {
            fn hash<H: Hasher>(&self, state: &mut H) {
                std::ptr::hash(Arc::as_ptr(&self.0), state);
            }
        }

        impl fmt::Debug for $handle {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                let addr = Arc::as_ptr(&self.0) as usize;
                match self.name() {
                    Some(name) => write!(f, "{name}#{:x}", addr & 0xffff),
                    None => write!(f, "${:x}", addr & 0xffff),
                }
            }
        }
    };
}

binding_handle!(Var);
binding_handle!(LabelTarget);

// ── Constants ───────────────────────────────────────────────────────

/// `System.Index` value: `^value` when `from_end`.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct IndexValue {
    pub value: u32,
    pub from_end: bool,
}

impl IndexValue {
    pub fn from_start(value: u32) -> Self {
        Self {
            value,
            from_end: false,
        }
    }

    pub fn from_end(value: u32) -> Self {
        Self {
            value,
            from_end: true,
        }
    }

    /// Offset into a collection of `len` elements, or `None` when the index
    /// lies before the start.
    pub fn offset(self, len: usize) -> Option<usize> {
        let value = self.value as usize;
        if self.from_end {
            len.checked_sub(value)
        } else {
            Some(value)
        }
    }
}

/// `System.Range` value: `start..end`.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct RangeValue {
    pub start: IndexValue,
    pub end: IndexValue,
}

impl RangeValue {
    /// `..`
    pub fn all() -> Self {
        Self {
            start: IndexValue::from_start(0),
            end: IndexValue::from_end(0),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum ConstValue {
    Null,
    Bool(bool),
    Char(char),
    Int32(i32),
    Int64(i64),
    Float32(f32),
    Float64(f64),
    String(Arc<str>),
    Index(IndexValue),
    Range(RangeValue),
}

impl ConstValue {
    /// The type a literal of this value has. `null` is typed `object` until
    /// the constant node gives it a more specific type.
    pub fn natural_type(&self) -> Type {
        match self {
            ConstValue::Null => Type::Object,
            ConstValue::Bool(_) => Type::Bool,
            ConstValue::Char(_) => Type::Char,
            ConstValue::Int32(_) => Type::Int32,
            ConstValue::Int64(_) => Type::Int64,
            ConstValue::Float32(_) => Type::Float32,
            ConstValue::Float64(_) => Type::Float64,
            ConstValue::String(_) => Type::String,
            ConstValue::Index(_) => Type::Index,
            ConstValue::Range(_) => Type::Range,
        }
    }

    #[inline]
    pub fn is_null(&self) -> bool {
        matches!(self, ConstValue::Null)
    }

    pub fn is_nan(&self) -> bool {
        match self {
            ConstValue::Float32(v) => v.is_nan(),
            ConstValue::Float64(v) => v.is_nan(),
            _ => false,
        }
    }
}

// ── Operators ───────────────────────────────────────────────────────

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum UnaryOp {
    Not,
    Negate,
    /// Numeric conversion, boxing, unboxing, nullable wrapping or reference
    /// cast to the node's type.
    Convert,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum BinaryOp {
    Add,
    Subtract,
    Multiply,
    Divide,
    Modulo,
    Equal,
    NotEqual,
    LessThan,
    LessThanOrEqual,
    GreaterThan,
    GreaterThanOrEqual,
    AndAlso,
    OrElse,
}

impl BinaryOp {
    pub fn is_comparison(self) -> bool {
        matches!(
            self,
            BinaryOp::Equal
                | BinaryOp::NotEqual
                | BinaryOp::LessThan
                | BinaryOp::LessThanOrEqual
                | BinaryOp::GreaterThan
                | BinaryOp::GreaterThanOrEqual
        )
    }

    pub fn is_short_circuit(self) -> bool {
        matches!(self, BinaryOp::AndAlso | BinaryOp::OrElse)
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum GotoKind {
    Goto,
    Return,
    Break,
    Continue,
}

// ── Node payloads ───────────────────────────────────────────────────

#[derive(Clone, Debug, PartialEq)]
pub struct SwitchCase {
    pub tests: Vec<Expr>,
    pub body: Expr,
}

#[derive(Clone, Debug, PartialEq)]
pub struct CatchBlock {
    /// Exceptions assignable to this type are caught.
    pub test: Type,
    pub variable: Option<Var>,
    pub filter: Option<Expr>,
    pub body: Expr,
}

/// Shared payload of `Lambda` and `AsyncLambda`.
#[derive(Clone, Debug, PartialEq)]
pub struct LambdaData {
    pub name: Option<Arc<str>>,
    pub params: Vec<Var>,
    pub body: Expr,
    pub return_type: Type,
}

impl LambdaData {
    pub fn func_type(&self) -> Type {
        Type::func(
            self.params.iter().map(|p| p.ty().clone()).collect(),
            self.return_type.clone(),
        )
    }
}

/// One arm of a switch expression: `pattern when guard => value`.
#[derive(Clone, Debug, PartialEq)]
pub struct SwitchArm {
    /// Designation variables scoped to this arm.
    pub variables: Vec<Var>,
    pub pattern: Pattern,
    pub guard: Option<Expr>,
    pub value: Expr,
}

// ── Node kinds ──────────────────────────────────────────────────────

#[derive(Clone, Debug, PartialEq)]
pub enum ExprKind {
    // Substrate
    Constant(ConstValue),
    Default,
    Parameter(Var),
    Unary {
        op: UnaryOp,
        operand: Expr,
    },
    Binary {
        op: BinaryOp,
        left: Expr,
        right: Expr,
    },
    /// `target = value`; the target is a `Parameter` or a `Member`.
    Assign {
        target: Expr,
        value: Expr,
    },
    TypeIs {
        operand: Expr,
        ty: Type,
    },
    Conditional {
        test: Expr,
        if_true: Expr,
        if_false: Expr,
    },
    Block {
        variables: Vec<Var>,
        exprs: Vec<Expr>,
    },
    /// A jump target. Falling through yields `default`.
    Label {
        target: LabelTarget,
        default: Option<Expr>,
    },
    Goto {
        kind: GotoKind,
        target: LabelTarget,
        value: Option<Expr>,
    },
    Loop {
        body: Expr,
        break_label: Option<LabelTarget>,
        continue_label: Option<LabelTarget>,
    },
    Switch {
        value: Expr,
        cases: Vec<SwitchCase>,
        default: Option<Expr>,
    },
    Try {
        body: Expr,
        handlers: Vec<CatchBlock>,
        finally: Option<Expr>,
    },
    /// `throw value`, or a rethrow inside a catch handler when `value` is
    /// `None`.
    Throw {
        value: Option<Expr>,
    },
    Call {
        object: Option<Expr>,
        method: MethodInfo,
        args: Vec<Expr>,
    },
    Member {
        object: Option<Expr>,
        member: MemberInfo,
    },
    /// Construct an instance of the node type from positional arguments.
    New {
        args: Vec<Expr>,
    },
    NewArray {
        items: Vec<Expr>,
    },
    Lambda(Arc<LambdaData>),
    Invoke {
        target: Expr,
        args: Vec<Expr>,
    },

    // Extensions
    IsPattern {
        operand: Expr,
        pattern: Pattern,
    },
    SwitchExpr {
        subject: Expr,
        arms: Vec<SwitchArm>,
    },
    Await {
        operand: Expr,
        get_awaiter: MethodInfo,
    },
    AsyncLambda(Arc<LambdaData>),
    Lock {
        object: Expr,
        body: Expr,
    },
    /// Suspension point of an expanded `await`: the awaiter has been stored
    /// in `awaiter`, the result is fetched by the following statement.
    SuspendPoint {
        awaiter: Var,
        is_completed: MemberInfo,
    },
}
