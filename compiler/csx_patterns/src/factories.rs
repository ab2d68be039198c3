//! Checked pattern constructors.
//!
//! Every constructor validates its arguments and fails with a [`CsxError`]
//! before a pattern exists. A pattern that was built here reduces without
//! further checks.

use std::sync::Arc;

use csx_ir::{
    runtime, BinaryPatternOp, ConstValue, CsxError, Expr, MethodInfo, ParameterKey, Pattern,
    PatternInfo, PatternKind, PatternType, PositionalSubpattern, PropertySubpattern,
    RelationalOp, SubpatternMember, TupleField, Type, Var,
};
use rustc_hash::FxHashSet;

use crate::narrowing::{or_leaves, or_narrowed_type};
use crate::validate;

// ── Leaf patterns ───────────────────────────────────────────────────

/// `== value`. A `null` constant needs an input type that can be `null`;
/// any other constant narrows to its own type.
///
/// NaN constants are accepted, like `x is double.NaN`, and reduce to an
/// `IsNaN` test instead of `==`. See decision 1 in `DESIGN.md`.
pub fn constant(input: Type, value: ConstValue) -> Result<Pattern, CsxError> {
    validate::pattern_type(&input)?;
    let narrowed = if value.is_null() {
        if !input.can_be_null() {
            return Err(CsxError::NullConstantNotAllowed { ty: input });
        }
        input.clone()
    } else {
        validate::constant_narrowing(&value, &input).ok_or_else(|| {
            CsxError::ConstantTypeMismatch {
                constant: value.natural_type(),
                input: input.clone(),
            }
        })?
    };
    Ok(Pattern::from_parts(
        PatternInfo::new(input, narrowed),
        PatternKind::Constant { value },
    ))
}

/// `_`
pub fn discard(input: Type) -> Result<Pattern, CsxError> {
    validate::pattern_type(&input)?;
    Ok(Pattern::from_parts(
        PatternInfo::identity(input),
        PatternKind::Discard,
    ))
}

/// `T`: a non-null value of type `ty`.
pub fn type_pattern(input: Type, ty: Type) -> Result<Pattern, CsxError> {
    validate::type_test(&input, &ty, "type pattern")?;
    Ok(Pattern::from_parts(
        PatternInfo::new(input, ty),
        PatternKind::Type,
    ))
}

/// `< value`, `<= value`, `> value` or `>= value`.
pub fn relational(op: RelationalOp, input: Type, value: ConstValue) -> Result<Pattern, CsxError> {
    validate::pattern_type(&input)?;
    let reason = match &value {
        ConstValue::Null => Some("`null` has no ordering"),
        ConstValue::Bool(_) => Some("`bool` has no ordering"),
        ConstValue::String(_) => Some("`string` has no relational operators"),
        v if v.is_nan() => Some("NaN compares false with every value"),
        _ => None,
    };
    if let Some(reason) = reason {
        return Err(CsxError::InvalidRelationalConstant { reason });
    }
    let ty = value.natural_type();
    if !(ty.is_numeric() || ty == Type::Char) {
        return Err(CsxError::RelationalTypeNotSupported { ty });
    }
    let narrowed = validate::constant_narrowing(&value, &input).ok_or_else(|| {
        CsxError::ConstantTypeMismatch {
            constant: ty,
            input: input.clone(),
        }
    })?;
    Ok(Pattern::from_parts(
        PatternInfo::new(input, narrowed),
        PatternKind::Relational { op, value },
    ))
}

pub fn less_than(input: Type, value: ConstValue) -> Result<Pattern, CsxError> {
    relational(RelationalOp::LessThan, input, value)
}

pub fn less_than_or_equal(input: Type, value: ConstValue) -> Result<Pattern, CsxError> {
    relational(RelationalOp::LessThanOrEqual, input, value)
}

pub fn greater_than(input: Type, value: ConstValue) -> Result<Pattern, CsxError> {
    relational(RelationalOp::GreaterThan, input, value)
}

pub fn greater_than_or_equal(input: Type, value: ConstValue) -> Result<Pattern, CsxError> {
    relational(RelationalOp::GreaterThanOrEqual, input, value)
}

/// `T x`: a type test that stores the narrowed value in `variable`.
pub fn declaration(input: Type, ty: Type, variable: Option<Var>) -> Result<Pattern, CsxError> {
    validate::type_test(&input, &ty, "declaration pattern")?;
    validate::variable(variable.as_ref(), &ty)?;
    Ok(Pattern::from_parts(
        PatternInfo::new(input, ty),
        PatternKind::Declaration { variable },
    ))
}

/// `var x`: always matches.
pub fn var(input: Type, variable: Option<Var>) -> Result<Pattern, CsxError> {
    validate::pattern_type(&input)?;
    validate::variable(variable.as_ref(), &input)?;
    Ok(Pattern::from_parts(
        PatternInfo::identity(input),
        PatternKind::Var { variable },
    ))
}

// ── Combinators ─────────────────────────────────────────────────────

/// `left and right`. `right` tests the value as narrowed by `left`.
pub fn and(left: Pattern, right: Pattern) -> Result<Pattern, CsxError> {
    let info = PatternInfo::new(left.input_type().clone(), right.narrowed_type().clone());
    binary(info, BinaryPatternOp::And, left, right)
}

/// `left or right`, narrowed to the least specific branch type that covers
/// every branch.
pub fn or(left: Pattern, right: Pattern) -> Result<Pattern, CsxError> {
    if left.input_type() != right.input_type() {
        return Err(CsxError::IncompatiblePatternTypes {
            left: left.input_type().clone(),
            right: right.input_type().clone(),
            context: "or pattern",
        });
    }
    let info = PatternInfo::new(left.input_type().clone(), or_narrowed_type(&left, &right));
    binary(info, BinaryPatternOp::Or, left, right)
}

/// `and`/`or` with explicit type information.
pub fn binary(
    info: PatternInfo,
    op: BinaryPatternOp,
    left: Pattern,
    right: Pattern,
) -> Result<Pattern, CsxError> {
    validate::pattern_type(&info.input_type)?;
    validate::pattern_type(&info.narrowed_type)?;
    match op {
        BinaryPatternOp::And => {
            if left.narrowed_type() != right.input_type() {
                return Err(CsxError::IncompatiblePatternTypes {
                    left: left.narrowed_type().clone(),
                    right: right.input_type().clone(),
                    context: "and pattern",
                });
            }
            validate::same_type(&info.input_type, left.input_type(), "and pattern input")?;
            validate::same_type(&info.narrowed_type, right.narrowed_type(), "and pattern result")?;
        }
        BinaryPatternOp::Or => {
            if left.input_type() != right.input_type() {
                return Err(CsxError::IncompatiblePatternTypes {
                    left: left.input_type().clone(),
                    right: right.input_type().clone(),
                    context: "or pattern",
                });
            }
            validate::same_type(&info.input_type, left.input_type(), "or pattern input")?;
            // A nested `or` that fell back to its input type still fits when
            // each of its own branches does.
            for branch in [&left, &right] {
                let fits = info.narrowed_type.is_assignable_from(branch.narrowed_type())
                    || or_leaves(branch)
                        .into_iter()
                        .all(|leaf| info.narrowed_type.is_assignable_from(leaf));
                if !fits {
                    return Err(CsxError::PatternTypeMismatch {
                        expected: info.narrowed_type.clone(),
                        found: branch.narrowed_type().clone(),
                        context: "or pattern result",
                    });
                }
            }
        }
    }
    Ok(Pattern::from_parts(info, PatternKind::Binary { op, left, right }))
}

/// `not negated`. Never narrows.
pub fn not(negated: Pattern) -> Pattern {
    Pattern::from_parts(
        PatternInfo::identity(negated.input_type().clone()),
        PatternKind::Not { negated },
    )
}

// ── Subpatterns ─────────────────────────────────────────────────────

pub fn positional(pattern: Pattern) -> PositionalSubpattern {
    PositionalSubpattern {
        pattern,
        field: None,
        parameter: None,
    }
}

/// A positional subpattern bound to tuple element `index` (0-based).
pub fn positional_field(pattern: Pattern, index: usize) -> PositionalSubpattern {
    PositionalSubpattern {
        pattern,
        field: Some(TupleField { index }),
        parameter: None,
    }
}

/// A positional subpattern bound to the deconstruct out parameter `name`.
pub fn positional_parameter(pattern: Pattern, name: &str) -> PositionalSubpattern {
    PositionalSubpattern {
        pattern,
        field: None,
        parameter: Some(ParameterKey {
            name: Arc::from(name),
        }),
    }
}

pub fn property(member: SubpatternMember, pattern: Pattern) -> PropertySubpattern {
    PropertySubpattern { pattern, member }
}

/// `{ A.B.C: pattern }`, resolving each name against the type before it.
pub fn property_path(ty: &Type, path: &[&str], pattern: Pattern) -> Result<PropertySubpattern, CsxError> {
    let mut receiver = ty.clone();
    let mut chain: Option<SubpatternMember> = None;
    for &name in path {
        let member = receiver
            .find_member(name)
            .ok_or_else(|| CsxError::InvalidSubpatternMember {
                member: name.to_owned(),
                ty: receiver.clone(),
            })?;
        receiver = member.ty.clone();
        chain = Some(match chain {
            Some(chain) => chain.then(member),
            None => SubpatternMember::new(member),
        });
    }
    let member = chain.ok_or_else(|| CsxError::InvalidSubpatternMember {
        member: String::new(),
        ty: ty.clone(),
    })?;
    Ok(property(member, pattern))
}

fn key_name(sub: &PositionalSubpattern) -> String {
    match (&sub.field, &sub.parameter) {
        (Some(field), _) => format!("Item{}", field.index + 1),
        (None, Some(parameter)) => parameter.name.to_string(),
        (None, None) => String::new(),
    }
}

/// Check the binding mode of positional subpatterns over `slots`
/// positions. `resolve` maps a named subpattern to its position.
fn check_positions(
    positional: &[PositionalSubpattern],
    slots: usize,
    resolve: impl Fn(&PositionalSubpattern) -> Result<usize, CsxError>,
) -> Result<(), CsxError> {
    if positional.len() != slots {
        return Err(CsxError::DeconstructionArityMismatch {
            expected: slots,
            found: positional.len(),
        });
    }
    let named = positional.iter().filter(|p| p.is_named()).count();
    if named == 0 {
        return Ok(());
    }
    if named != positional.len() {
        return Err(CsxError::MixedSubpatternBinding);
    }
    let mut seen = FxHashSet::default();
    for sub in positional {
        let slot = resolve(sub)?;
        if !seen.insert(slot) {
            return Err(CsxError::DuplicateSubpatternBinding { key: key_name(sub) });
        }
    }
    Ok(())
}

/// Out parameters of a deconstruct method applied to `narrowed`, as
/// `(name, type)` pairs.
pub(crate) fn deconstruct_outputs(
    method: &MethodInfo,
    narrowed: &Type,
) -> Result<Vec<(Arc<str>, Type)>, CsxError> {
    let invalid = |reason: &'static str| CsxError::InvalidDeconstructMethod {
        name: method.name().to_owned(),
        reason,
    };
    if !method.return_type().is_void() {
        return Err(invalid("a deconstruct method returns void"));
    }
    let outputs = if method.is_static() {
        let (receiver, rest) = method
            .params()
            .split_first()
            .ok_or_else(|| invalid("a static deconstruct method takes the value first"))?;
        if !receiver.ty.is_assignable_from(narrowed) {
            return Err(invalid("first parameter does not accept the narrowed type"));
        }
        rest
    } else {
        if !method.declaring().is_some_and(|d| d.is_assignable_from(narrowed)) {
            return Err(invalid("method is not declared on the narrowed type"));
        }
        method.params()
    };
    outputs
        .iter()
        .map(|p| match &p.ty {
            Type::ByRef(ty) => Ok((p.name.clone(), (**ty).clone())),
            _ => Err(invalid("every deconstructed parameter must be an out parameter")),
        })
        .collect()
}

fn check_member_path(member: &SubpatternMember, narrowed: &Type) -> Result<(), CsxError> {
    let receiver = match &member.receiver {
        Some(inner) => {
            check_member_path(inner, narrowed)?;
            inner.ty().clone()
        }
        None => narrowed.clone(),
    };
    if member.member.declaring.is_assignable_from(&receiver) {
        Ok(())
    } else {
        Err(CsxError::InvalidSubpatternMember {
            member: member.member.name.to_string(),
            ty: receiver,
        })
    }
}

// ── Object patterns ─────────────────────────────────────────────────

/// `T (p1, p2) { A: p3 } x`.
///
/// Positional subpatterns deconstruct through `deconstruct` when given,
/// otherwise the narrowed type must be a tuple. Either every positional
/// subpattern names its position or none does.
pub fn recursive(
    info: PatternInfo,
    deconstruct: Option<MethodInfo>,
    positional: Vec<PositionalSubpattern>,
    properties: Vec<PropertySubpattern>,
    variable: Option<Var>,
) -> Result<Pattern, CsxError> {
    let narrowed = &info.narrowed_type;
    validate::type_test(&info.input_type, narrowed, "recursive pattern")?;
    validate::variable(variable.as_ref(), narrowed)?;

    if let Some(method) = &deconstruct {
        let outputs = deconstruct_outputs(method, narrowed)?;
        check_positions(&positional, outputs.len(), |sub| {
            if sub.field.is_some() {
                return Err(CsxError::InvalidSubpatternBinding {
                    reason: "tuple fields can only name elements of a tuple",
                });
            }
            let name = sub.parameter.as_ref().map(|p| &p.name);
            outputs
                .iter()
                .position(|(out, _)| Some(out) == name)
                .ok_or_else(|| CsxError::UnknownSubpatternBinding { key: key_name(sub) })
        })?;
        for (i, sub) in positional.iter().enumerate() {
            let slot = sub
                .parameter
                .as_ref()
                .and_then(|key| outputs.iter().position(|(out, _)| *out == key.name))
                .unwrap_or(i);
            if let Some((_, ty)) = outputs.get(slot) {
                validate::same_type(ty, sub.pattern.input_type(), "positional subpattern")?;
            }
        }
    } else if !positional.is_empty() {
        let elements = narrowed.tuple_elements().ok_or_else(|| CsxError::InvalidDeconstructMethod {
            name: "Deconstruct".to_owned(),
            reason: "positional subpatterns need a tuple type or a deconstruct method",
        })?;
        check_positions(&positional, elements.len(), |sub| {
            if sub.parameter.is_some() {
                return Err(CsxError::InvalidSubpatternBinding {
                    reason: "parameter names need a deconstruct method",
                });
            }
            match sub.field {
                Some(field) if field.index < elements.len() => Ok(field.index),
                _ => Err(CsxError::UnknownSubpatternBinding { key: key_name(sub) }),
            }
        })?;
        for (i, sub) in positional.iter().enumerate() {
            let slot = sub.field.map_or(i, |f| f.index);
            if let Some(ty) = elements.get(slot) {
                validate::same_type(ty, sub.pattern.input_type(), "tuple subpattern")?;
            }
        }
    }

    for prop in &properties {
        check_member_path(&prop.member, narrowed)?;
        validate::same_type(prop.member.ty(), prop.pattern.input_type(), "property subpattern")?;
    }

    Ok(Pattern::from_parts(
        info,
        PatternKind::Recursive {
            deconstruct,
            positional,
            properties,
            variable,
        },
    ))
}

/// Positional pattern over `ITuple`: elements are read as `object`.
pub fn ituple(input: Type, positional: Vec<PositionalSubpattern>) -> Result<Pattern, CsxError> {
    let ituple = runtime::ituple();
    validate::type_test(&input, &ituple, "ITuple pattern")?;
    if positional.iter().any(PositionalSubpattern::is_named) {
        return Err(CsxError::InvalidSubpatternBinding {
            reason: "ITuple patterns cannot name positions",
        });
    }
    for sub in &positional {
        validate::same_type(&Type::Object, sub.pattern.input_type(), "ITuple subpattern")?;
    }
    let (Some(get_length), Some(get_item)) = (runtime::ituple_length(), runtime::ituple_get_item())
    else {
        unreachable!("ITuple declares Length and this[int]");
    };
    Ok(Pattern::from_parts(
        PatternInfo::new(input, ituple),
        PatternKind::ITuple {
            get_length,
            get_item,
            positional,
        },
    ))
}

/// `[p1, p2, .., pn]` over an array or string.
pub fn list(collection: Type, patterns: Vec<Pattern>, variable: Option<Var>) -> Result<Pattern, CsxError> {
    let (Some(length_access), Some(indexer_access)) = (
        runtime::length_access(&collection),
        runtime::index_access(&collection),
    ) else {
        return Err(CsxError::InvalidCollectionAccess {
            accessor: "list",
            reason: "type has no `Length` and `Index` indexer",
        });
    };
    list_with_access(
        PatternInfo::identity(collection),
        length_access,
        indexer_access,
        patterns,
        variable,
    )
}

/// List pattern with explicit accessors: `length_access` is
/// `(collection) => int`, `indexer_access` is `(collection, Index) =>
/// element`.
pub fn list_with_access(
    info: PatternInfo,
    length_access: Expr,
    indexer_access: Expr,
    patterns: Vec<Pattern>,
    variable: Option<Var>,
) -> Result<Pattern, CsxError> {
    let narrowed = &info.narrowed_type;
    validate::type_test(&info.input_type, narrowed, "list pattern")?;
    validate::variable(variable.as_ref(), narrowed)?;

    match validate::lambda_signature(&length_access) {
        Some((params, Type::Int32))
            if matches!(params.as_slice(), [c] if c.is_assignable_from(narrowed)) => {}
        _ => {
            return Err(CsxError::InvalidCollectionAccess {
                accessor: "length",
                reason: "expected `(collection) => int`",
            })
        }
    }
    let element = match validate::lambda_signature(&indexer_access) {
        Some((params, element))
            if matches!(params.as_slice(), [c, Type::Index] if c.is_assignable_from(narrowed)) =>
        {
            element
        }
        _ => {
            return Err(CsxError::InvalidCollectionAccess {
                accessor: "indexer",
                reason: "expected `(collection, Index) => element`",
            })
        }
    };

    let mut seen_slice = false;
    for pattern in &patterns {
        if pattern.pattern_type() == PatternType::Slice {
            if seen_slice {
                return Err(CsxError::MultipleSlicePatterns);
            }
            seen_slice = true;
            validate::same_type(narrowed, pattern.input_type(), "slice subpattern")?;
        } else {
            validate::same_type(&element, pattern.input_type(), "list subpattern")?;
        }
    }

    Ok(Pattern::from_parts(
        info,
        PatternKind::List {
            length_access,
            indexer_access,
            patterns,
            variable,
        },
    ))
}

/// `..` or `.. pattern` over an array or string.
pub fn slice(collection: Type, pattern: Option<Pattern>) -> Result<Pattern, CsxError> {
    let indexer_access = match &pattern {
        Some(_) => runtime::range_access(&collection),
        None => None,
    };
    slice_with_access(collection, indexer_access, pattern)
}

/// Slice pattern with an explicit `(collection, Range) => slice` accessor.
/// A subpattern other than a discard needs the accessor.
pub fn slice_with_access(
    collection: Type,
    indexer_access: Option<Expr>,
    pattern: Option<Pattern>,
) -> Result<Pattern, CsxError> {
    validate::pattern_type(&collection)?;
    match &indexer_access {
        Some(access) => match validate::lambda_signature(access) {
            Some((params, slice))
                if matches!(params.as_slice(), [c, Type::Range] if c.is_assignable_from(&collection)) =>
            {
                if let Some(pattern) = &pattern {
                    validate::same_type(&slice, pattern.input_type(), "slice subpattern")?;
                }
            }
            _ => {
                return Err(CsxError::InvalidCollectionAccess {
                    accessor: "slice",
                    reason: "expected `(collection, Range) => slice`",
                })
            }
        },
        None => {
            if pattern
                .as_ref()
                .is_some_and(|p| p.pattern_type() != PatternType::Discard)
            {
                return Err(CsxError::InvalidCollectionAccess {
                    accessor: "slice",
                    reason: "a slice subpattern needs a range indexer",
                });
            }
        }
    }
    Ok(Pattern::from_parts(
        PatternInfo::identity(collection),
        PatternKind::Slice {
            indexer_access,
            pattern,
        },
    ))
}

#[cfg(test)]
mod tests;
