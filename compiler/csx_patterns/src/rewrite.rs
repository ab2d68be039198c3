//! Structural rewriting of validated patterns.
//!
//! Both operations go back through the checked constructors, so a rewritten
//! pattern is validated exactly like a freshly built one.

use csx_ir::{
    BinaryPatternOp, CsxError, Pattern, PatternInfo, PatternKind, PositionalSubpattern,
    PropertySubpattern, Type,
};

use crate::factories;

/// Rewrites on [`Pattern`].
pub trait PatternExt {
    /// Replace the direct subpatterns, in [`Pattern::subpatterns`] order.
    /// Returns the pattern itself when every replacement is the same
    /// pattern.
    fn update_children(&self, children: Vec<Pattern>) -> Result<Pattern, CsxError>;

    /// Rebuild the pattern for a different input type.
    fn change_type(&self, input: Type) -> Result<Pattern, CsxError>;
}

impl PatternExt for Pattern {
    fn update_children(&self, children: Vec<Pattern>) -> Result<Pattern, CsxError> {
        let current = self.subpatterns();
        if current.len() != children.len() {
            return Err(CsxError::DeconstructionArityMismatch {
                expected: current.len(),
                found: children.len(),
            });
        }
        if current.iter().zip(&children).all(|(old, new)| old.ptr_eq(new)) {
            return Ok(self.clone());
        }

        let mut children = children.into_iter();
        let mut next = || {
            children.next().ok_or(CsxError::DeconstructionArityMismatch {
                expected: current.len(),
                found: 0,
            })
        };
        let info = self.info().clone();
        match self.kind() {
            PatternKind::Constant { .. }
            | PatternKind::Discard
            | PatternKind::Type
            | PatternKind::Relational { .. }
            | PatternKind::Declaration { .. }
            | PatternKind::Var { .. } => Ok(self.clone()),
            PatternKind::Binary { op, .. } => {
                let left = next()?;
                let right = next()?;
                match op {
                    BinaryPatternOp::And => factories::and(left, right),
                    BinaryPatternOp::Or => factories::or(left, right),
                }
            }
            PatternKind::Not { .. } => Ok(factories::not(next()?)),
            PatternKind::Recursive {
                deconstruct,
                positional,
                properties,
                variable,
            } => {
                let positional = positional
                    .iter()
                    .map(|sub| {
                        Ok(PositionalSubpattern {
                            pattern: next()?,
                            ..sub.clone()
                        })
                    })
                    .collect::<Result<Vec<_>, CsxError>>()?;
                let properties = properties
                    .iter()
                    .map(|prop| {
                        Ok(PropertySubpattern {
                            pattern: next()?,
                            member: prop.member.clone(),
                        })
                    })
                    .collect::<Result<Vec<_>, CsxError>>()?;
                factories::recursive(
                    info,
                    deconstruct.clone(),
                    positional,
                    properties,
                    variable.clone(),
                )
            }
            PatternKind::ITuple { positional, .. } => {
                let positional = positional
                    .iter()
                    .map(|sub| {
                        Ok(PositionalSubpattern {
                            pattern: next()?,
                            ..sub.clone()
                        })
                    })
                    .collect::<Result<Vec<_>, CsxError>>()?;
                factories::ituple(info.input_type, positional)
            }
            PatternKind::List {
                length_access,
                indexer_access,
                patterns,
                variable,
            } => {
                let patterns = patterns
                    .iter()
                    .map(|_| next())
                    .collect::<Result<Vec<_>, CsxError>>()?;
                factories::list_with_access(
                    info,
                    length_access.clone(),
                    indexer_access.clone(),
                    patterns,
                    variable.clone(),
                )
            }
            PatternKind::Slice { indexer_access, .. } => {
                factories::slice_with_access(info.input_type, indexer_access.clone(), Some(next()?))
            }
        }
    }

    fn change_type(&self, input: Type) -> Result<Pattern, CsxError> {
        if *self.input_type() == input {
            return Ok(self.clone());
        }
        let narrowed = self.narrowed_type().clone();
        match self.kind() {
            PatternKind::Constant { value } => factories::constant(input, value.clone()),
            PatternKind::Discard => factories::discard(input),
            PatternKind::Type => factories::type_pattern(input, narrowed),
            PatternKind::Relational { op, value } => {
                factories::relational(*op, input, value.clone())
            }
            PatternKind::Binary { op, left, right } => match op {
                BinaryPatternOp::And => factories::and(left.change_type(input)?, right.clone()),
                BinaryPatternOp::Or => factories::or(
                    left.change_type(input.clone())?,
                    right.change_type(input)?,
                ),
            },
            PatternKind::Not { negated } => Ok(factories::not(negated.change_type(input)?)),
            PatternKind::Declaration { variable } => {
                factories::declaration(input, narrowed, variable.clone())
            }
            PatternKind::Var { variable } => factories::var(input, variable.clone()),
            PatternKind::Recursive {
                deconstruct,
                positional,
                properties,
                variable,
            } => factories::recursive(
                PatternInfo::new(input, narrowed),
                deconstruct.clone(),
                positional.clone(),
                properties.clone(),
                variable.clone(),
            ),
            PatternKind::ITuple { positional, .. } => factories::ituple(input, positional.clone()),
            PatternKind::List {
                length_access,
                indexer_access,
                patterns,
                variable,
            } => factories::list_with_access(
                PatternInfo::new(input, narrowed),
                length_access.clone(),
                indexer_access.clone(),
                patterns.clone(),
                variable.clone(),
            ),
            PatternKind::Slice {
                indexer_access,
                pattern,
            } => factories::slice_with_access(input, indexer_access.clone(), pattern.clone()),
        }
    }
}
