//! Shared construction checks.

use csx_ir::{ConstValue, CsxError, Expr, ExprKind, Type, Var};

/// Reject types no pattern can test.
pub(crate) fn pattern_type(ty: &Type) -> Result<(), CsxError> {
    match ty {
        Type::Void | Type::ByRef(_) | Type::Pointer(_) | Type::Func(..) => {
            Err(CsxError::InvalidPatternType { ty: ty.clone() })
        }
        _ => Ok(()),
    }
}

/// Whether a value of static type `input` can be tested for `narrowed` at
/// runtime.
pub(crate) fn is_testable(input: &Type, narrowed: &Type) -> bool {
    input.is_assignable_from(narrowed)
        || narrowed.is_assignable_from(input)
        || input.is_interface()
        || narrowed.is_interface()
}

pub(crate) fn type_test(input: &Type, narrowed: &Type, context: &'static str) -> Result<(), CsxError> {
    pattern_type(input)?;
    pattern_type(narrowed)?;
    if is_testable(input, narrowed) {
        Ok(())
    } else {
        Err(CsxError::IncompatiblePatternTypes {
            left: input.clone(),
            right: narrowed.clone(),
            context,
        })
    }
}

/// A designation variable must hold the narrowed value without a
/// representation change.
pub(crate) fn variable(var: Option<&Var>, narrowed: &Type) -> Result<(), CsxError> {
    let Some(var) = var else {
        return Ok(());
    };
    let ty = var.ty();
    if ty == narrowed || (narrowed.is_reference_type() && ty.is_assignable_from(narrowed)) {
        Ok(())
    } else {
        Err(CsxError::VariableTypeMismatch {
            variable: ty.clone(),
            narrowed: narrowed.clone(),
        })
    }
}

pub(crate) fn same_type(expected: &Type, found: &Type, context: &'static str) -> Result<(), CsxError> {
    if expected == found {
        Ok(())
    } else {
        Err(CsxError::PatternTypeMismatch {
            expected: expected.clone(),
            found: found.clone(),
            context,
        })
    }
}

/// Narrowed type of a non-null constant tested against `input`, or `None`
/// if the constant cannot be compared with values of that type.
pub(crate) fn constant_narrowing(value: &ConstValue, input: &Type) -> Option<Type> {
    let ty = value.natural_type();
    input.is_assignable_from(&ty).then_some(ty)
}

/// Parameter types and return type of an accessor lambda.
pub(crate) fn lambda_signature(access: &Expr) -> Option<(Vec<Type>, Type)> {
    match access.kind() {
        ExprKind::Lambda(data) => Some((
            data.params.iter().map(|p| p.ty().clone()).collect(),
            data.return_type.clone(),
        )),
        _ => None,
    }
}
