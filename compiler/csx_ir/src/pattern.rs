//! Pattern data.
//!
//! A [`Pattern`] is an immutable, shareable predicate over a subject value.
//! Every pattern carries a [`PatternInfo`]: the static type of the values it
//! tests and the type known to hold after a successful match.
//!
//! This module only defines the shapes. Checked construction and reduction
//! to boolean trees live in `csx_patterns`; [`Pattern::from_parts`] skips
//! validation and is meant for those factories.

use std::fmt;
use std::sync::Arc;

use crate::expr::{ConstValue, Expr, Var};
use crate::types::{MemberInfo, MethodInfo, Type};

/// `(input, narrowed)` type pair of a pattern.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct PatternInfo {
    pub input_type: Type,
    pub narrowed_type: Type,
}

impl PatternInfo {
    pub fn new(input_type: Type, narrowed_type: Type) -> Self {
        Self {
            input_type,
            narrowed_type,
        }
    }

    /// A pattern that does not narrow.
    pub fn identity(ty: Type) -> Self {
        Self::new(ty.clone(), ty)
    }
}

/// Kind tag, one per pattern shape. Relational patterns are split by
/// operator.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum PatternType {
    Constant,
    Discard,
    Type,
    LessThan,
    LessThanOrEqual,
    GreaterThan,
    GreaterThanOrEqual,
    And,
    Or,
    Not,
    Declaration,
    Var,
    Recursive,
    ITuple,
    List,
    Slice,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum RelationalOp {
    LessThan,
    LessThanOrEqual,
    GreaterThan,
    GreaterThanOrEqual,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum BinaryPatternOp {
    And,
    Or,
}

/// Element of a tuple type, by 0-based position.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct TupleField {
    pub index: usize,
}

/// Out parameter of a deconstruct method, by name.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ParameterKey {
    pub name: Arc<str>,
}

/// A positional subpattern, optionally bound to an explicit position.
#[derive(Clone, Debug, PartialEq)]
pub struct PositionalSubpattern {
    pub pattern: Pattern,
    pub field: Option<TupleField>,
    pub parameter: Option<ParameterKey>,
}

impl PositionalSubpattern {
    pub fn is_named(&self) -> bool {
        self.field.is_some() || self.parameter.is_some()
    }
}

/// A member access path such as `A.B.C`: `receiver` is `A.B`, `member` is
/// `C`. A path without a receiver reads directly from the subject.
#[derive(Clone, Debug, PartialEq)]
pub struct SubpatternMember {
    pub receiver: Option<Box<SubpatternMember>>,
    pub member: MemberInfo,
}

impl SubpatternMember {
    pub fn new(member: MemberInfo) -> Self {
        Self {
            receiver: None,
            member,
        }
    }

    #[must_use]
    pub fn then(self, member: MemberInfo) -> Self {
        Self {
            receiver: Some(Box::new(self)),
            member,
        }
    }

    pub fn ty(&self) -> &Type {
        &self.member.ty
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct PropertySubpattern {
    pub pattern: Pattern,
    pub member: SubpatternMember,
}

#[derive(Clone, Debug, PartialEq)]
pub enum PatternKind {
    /// Equality with a constant. The constant is typed by the narrowed type
    /// (or the input type for `null`).
    Constant { value: ConstValue },
    Discard,
    Type,
    Relational { op: RelationalOp, value: ConstValue },
    Binary {
        op: BinaryPatternOp,
        left: Pattern,
        right: Pattern,
    },
    Not { negated: Pattern },
    Declaration { variable: Option<Var> },
    Var { variable: Option<Var> },
    Recursive {
        deconstruct: Option<MethodInfo>,
        positional: Vec<PositionalSubpattern>,
        properties: Vec<PropertySubpattern>,
        variable: Option<Var>,
    },
    ITuple {
        get_length: MemberInfo,
        get_item: MethodInfo,
        positional: Vec<PositionalSubpattern>,
    },
    /// `length_access` is `(collection) => int`, `indexer_access` is
    /// `(collection, Index) => element`.
    List {
        length_access: Expr,
        indexer_access: Expr,
        patterns: Vec<Pattern>,
        variable: Option<Var>,
    },
    /// `indexer_access` is `(collection, Range) => slice`.
    Slice {
        indexer_access: Option<Expr>,
        pattern: Option<Pattern>,
    },
}

#[derive(Debug, PartialEq)]
struct PatternNode {
    info: PatternInfo,
    kind: PatternKind,
}

#[derive(Clone, PartialEq)]
pub struct Pattern(Arc<PatternNode>);

impl Pattern {
    /// Assemble a pattern without validating it.
    pub fn from_parts(info: PatternInfo, kind: PatternKind) -> Self {
        Pattern(Arc::new(PatternNode { info, kind }))
    }

    #[inline]
    pub fn info(&self) -> &PatternInfo {
        &self.0.info
    }

    #[inline]
    pub fn kind(&self) -> &PatternKind {
        &self.0.kind
    }

    #[inline]
    pub fn input_type(&self) -> &Type {
        &self.0.info.input_type
    }

    #[inline]
    pub fn narrowed_type(&self) -> &Type {
        &self.0.info.narrowed_type
    }

    pub fn ptr_eq(&self, other: &Pattern) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    pub fn pattern_type(&self) -> PatternType {
        match self.kind() {
            PatternKind::Constant { .. } => PatternType::Constant,
            PatternKind::Discard => PatternType::Discard,
            PatternKind::Type => PatternType::Type,
            PatternKind::Relational { op, .. } => match op {
                RelationalOp::LessThan => PatternType::LessThan,
                RelationalOp::LessThanOrEqual => PatternType::LessThanOrEqual,
                RelationalOp::GreaterThan => PatternType::GreaterThan,
                RelationalOp::GreaterThanOrEqual => PatternType::GreaterThanOrEqual,
            },
            PatternKind::Binary { op, .. } => match op {
                BinaryPatternOp::And => PatternType::And,
                BinaryPatternOp::Or => PatternType::Or,
            },
            PatternKind::Not { .. } => PatternType::Not,
            PatternKind::Declaration { .. } => PatternType::Declaration,
            PatternKind::Var { .. } => PatternType::Var,
            PatternKind::Recursive { .. } => PatternType::Recursive,
            PatternKind::ITuple { .. } => PatternType::ITuple,
            PatternKind::List { .. } => PatternType::List,
            PatternKind::Slice { .. } => PatternType::Slice,
        }
    }

    /// The designation variable of an object pattern, if any.
    pub fn variable(&self) -> Option<&Var> {
        match self.kind() {
            PatternKind::Declaration { variable }
            | PatternKind::Var { variable }
            | PatternKind::Recursive { variable, .. }
            | PatternKind::List { variable, .. } => variable.as_ref(),
            _ => None,
        }
    }

    /// Direct subpatterns, in matching order.
    pub fn subpatterns(&self) -> Vec<&Pattern> {
        match self.kind() {
            PatternKind::Constant { .. }
            | PatternKind::Discard
            | PatternKind::Type
            | PatternKind::Relational { .. }
            | PatternKind::Declaration { .. }
            | PatternKind::Var { .. } => Vec::new(),
            PatternKind::Binary { left, right, .. } => vec![left, right],
            PatternKind::Not { negated } => vec![negated],
            PatternKind::Recursive {
                positional,
                properties,
                ..
            } => positional
                .iter()
                .map(|p| &p.pattern)
                .chain(properties.iter().map(|p| &p.pattern))
                .collect(),
            PatternKind::ITuple { positional, .. } => {
                positional.iter().map(|p| &p.pattern).collect()
            }
            PatternKind::List { patterns, .. } => patterns.iter().collect(),
            PatternKind::Slice { pattern, .. } => pattern.iter().collect(),
        }
    }
}

impl fmt::Debug for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:?}[{} -> {}]",
            self.kind(),
            self.input_type(),
            self.narrowed_type()
        )
    }
}
