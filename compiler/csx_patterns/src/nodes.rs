//! `is` and `switch` expression nodes.

use csx_ir::build::{self, parameter};
use csx_ir::{
    runtime, CsxError, Expr, ExprKind, LabelTarget, Pattern, PatternKind, SwitchArm, Type, Var,
};
use tracing::debug;

use crate::reduce::reduce;
use crate::validate;

// ── Construction ────────────────────────────────────────────────────

/// `operand is pattern`. The operand is converted to the pattern's input
/// type when the two differ.
pub fn is_pattern(operand: Expr, pattern: Pattern) -> Result<Expr, CsxError> {
    let input = pattern.input_type().clone();
    if !input.is_assignable_from(operand.ty()) {
        return Err(CsxError::PatternTypeMismatch {
            expected: input,
            found: operand.ty().clone(),
            context: "is pattern operand",
        });
    }
    let operand = build::convert(operand, input);
    Ok(Expr::new(ExprKind::IsPattern { operand, pattern }, Type::Bool))
}

/// `pattern when guard => value`, scoping every designation variable the
/// pattern declares to the arm.
pub fn switch_arm(pattern: Pattern, guard: Option<Expr>, value: Expr) -> SwitchArm {
    let mut variables = Vec::new();
    collect_variables(&pattern, &mut variables);
    SwitchArm {
        variables,
        pattern,
        guard,
        value,
    }
}

fn collect_variables(pattern: &Pattern, out: &mut Vec<Var>) {
    if let Some(var) = pattern.variable() {
        if !out.contains(var) {
            out.push(var.clone());
        }
    }
    // Variables under `not` never receive a value on success.
    if let PatternKind::Not { .. } = pattern.kind() {
        return;
    }
    for sub in pattern.subpatterns() {
        collect_variables(sub, out);
    }
}

/// `subject switch { arms }` producing `result_type`.
pub fn switch_expr(subject: Expr, arms: Vec<SwitchArm>, result_type: Type) -> Result<Expr, CsxError> {
    let arms = arms
        .into_iter()
        .map(|arm| {
            validate::same_type(subject.ty(), arm.pattern.input_type(), "switch arm pattern")?;
            if let Some(guard) = &arm.guard {
                if *guard.ty() != Type::Bool {
                    return Err(CsxError::GuardNotBoolean {
                        found: guard.ty().clone(),
                    });
                }
            }
            if !result_type.is_assignable_from(arm.value.ty()) {
                return Err(CsxError::ArmTypeMismatch {
                    expected: result_type.clone(),
                    found: arm.value.ty().clone(),
                });
            }
            Ok(SwitchArm {
                value: build::convert(arm.value, result_type.clone()),
                ..arm
            })
        })
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Expr::new(ExprKind::SwitchExpr { subject, arms }, result_type))
}

// ── Reduction ───────────────────────────────────────────────────────

/// One reduction step for a pattern extension node. Other nodes are
/// returned unchanged.
pub fn reduce_node(expr: &Expr) -> Expr {
    match expr.kind() {
        ExprKind::IsPattern { operand, pattern } => reduce(pattern, operand),
        ExprKind::SwitchExpr { subject, arms } => reduce_switch(subject, arms, expr.ty()),
        _ => expr.clone(),
    }
}

/// ```text
/// {
///     subject = ...;
///     { arm1 variables; if (subject is p1 && guard1) goto end(value1); }
///     ...
///     throw new SwitchExpressionException();
///     end: default
/// }
/// ```
fn reduce_switch(subject: &Expr, arms: &[SwitchArm], result_type: &Type) -> Expr {
    debug!(arms = arms.len(), result = %result_type, "reducing switch expression");
    let end = LabelTarget::new("switch_end", result_type.clone());
    let temp = Var::new("switch_subject", subject.ty().clone());
    let s = parameter(&temp);

    let mut exprs = Vec::with_capacity(arms.len() + 3);
    exprs.push(build::assign_var(&temp, subject.clone()));
    for arm in arms {
        let matched = reduce(&arm.pattern, &s);
        let test = match &arm.guard {
            Some(guard) => build::and_also(matched, guard.clone()),
            None => matched,
        };
        let take = build::if_then(test, build::goto_value(&end, arm.value.clone()));
        exprs.push(build::block(arm.variables.clone(), vec![take]));
    }
    exprs.push(build::throw(build::new_(
        runtime::switch_expression_exception(),
        Vec::new(),
    )));
    exprs.push(build::label_with_default(
        &end,
        build::default(result_type.clone()),
    ));
    build::block_typed(vec![temp], exprs, result_type.clone())
}
