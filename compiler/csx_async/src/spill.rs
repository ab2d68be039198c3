//! Spilling of partially evaluated expressions across suspend points.
//!
//! A state machine resumes by jumping to a label next to the suspend point,
//! and a jump can only land in statement positions: block statements,
//! conditional branches, loop and switch case bodies, `try` bodies, label
//! defaults and the value of an assignment to a variable. Any other node
//! with a suspending operand is turned into statements. Operands evaluated
//! before the last suspending one are stored in temporaries first, so
//! evaluation order is unchanged.

use csx_ir::build::{self, parameter};
use csx_ir::traverse::{any_descendant, children};
use csx_ir::{ensure_sufficient_stack, BinaryOp, Expr, ExprKind, SwitchCase, Type, Var};
use tracing::debug;

/// Whether `expr` suspends outside any nested lambda.
pub(crate) fn has_suspend(expr: &Expr) -> bool {
    any_descendant(expr, true, &mut |e| {
        matches!(e.kind(), ExprKind::SuspendPoint { .. })
    })
}

/// Rewrite `body` so every suspend point sits in a statement position.
pub(crate) fn spill(body: &Expr) -> Expr {
    let spilled = statement(body);
    debug!(changed = !spilled.ptr_eq(body), "spilled suspend points");
    spilled
}

/// Statements spilled ahead of an expression, and the temporaries they
/// assign.
#[derive(Default)]
struct Spilled {
    temps: Vec<Var>,
    stmts: Vec<Expr>,
}

impl Spilled {
    fn push(&mut self, stmt: Expr) {
        self.stmts.push(stmt);
    }

    fn temp(&mut self, ty: Type) -> Var {
        let var = Var::new("spill", ty);
        self.temps.push(var.clone());
        var
    }

    /// Evaluate `value` now and stand in for it later.
    fn store(&mut self, value: Expr) -> Expr {
        if value.as_constant().is_some() || matches!(value.kind(), ExprKind::Default) {
            return value;
        }
        let var = self.temp(value.ty().clone());
        self.push(build::assign_var(&var, value));
        parameter(&var)
    }

    fn finish(mut self, value: Expr, ty: &Type) -> Expr {
        self.stmts.push(value);
        build::block_typed(self.temps, self.stmts, ty.clone())
    }
}

// ── Statement positions ─────────────────────────────────────────────

/// `expr` rewritten to keep its value, with suspend points only in
/// positions a jump can reach.
fn statement(expr: &Expr) -> Expr {
    if !has_suspend(expr) {
        return expr.clone();
    }
    ensure_sufficient_stack(|| {
        let kind = match expr.kind() {
            ExprKind::SuspendPoint { .. } => return expr.clone(),
            ExprKind::Block { variables, exprs } => ExprKind::Block {
                variables: variables.clone(),
                exprs: exprs.iter().map(statement).collect(),
            },
            ExprKind::Conditional {
                test,
                if_true,
                if_false,
            } if !has_suspend(test) => ExprKind::Conditional {
                test: test.clone(),
                if_true: statement(if_true),
                if_false: statement(if_false),
            },
            ExprKind::Loop {
                body,
                break_label,
                continue_label,
            } => ExprKind::Loop {
                body: statement(body),
                break_label: break_label.clone(),
                continue_label: continue_label.clone(),
            },
            ExprKind::Switch {
                value,
                cases,
                default,
            } if !has_suspend(value) => ExprKind::Switch {
                value: value.clone(),
                cases: cases
                    .iter()
                    .map(|case| SwitchCase {
                        tests: case.tests.clone(),
                        body: statement(&case.body),
                    })
                    .collect(),
                default: default.as_ref().map(statement),
            },
            ExprKind::Try {
                body,
                handlers,
                finally,
            } => ExprKind::Try {
                body: statement(body),
                handlers: handlers.clone(),
                finally: finally.clone(),
            },
            ExprKind::Label {
                target,
                default: Some(default),
            } => ExprKind::Label {
                target: target.clone(),
                default: Some(statement(default)),
            },
            ExprKind::Assign { target, value } if target.as_parameter().is_some() => {
                ExprKind::Assign {
                    target: target.clone(),
                    value: statement(value),
                }
            }
            _ => {
                let mut spilled = Spilled::default();
                let value = lift(expr, &mut spilled);
                return spilled.finish(value, expr.ty());
            }
        };
        let rebuilt = Expr::new(kind, expr.ty().clone());
        if same_children(expr, &rebuilt) {
            expr.clone()
        } else {
            rebuilt
        }
    })
}

fn same_children(old: &Expr, new: &Expr) -> bool {
    let (old, new) = (children(old), children(new));
    old.len() == new.len() && old.iter().zip(new.iter()).all(|(a, b)| a.ptr_eq(b))
}

// ── Value positions ─────────────────────────────────────────────────

/// Push the statements `expr` needs into `spilled` and return a
/// suspend-free expression for its value.
fn lift(expr: &Expr, spilled: &mut Spilled) -> Expr {
    if !has_suspend(expr) {
        return expr.clone();
    }
    ensure_sufficient_stack(|| match expr.kind() {
        ExprKind::SuspendPoint { .. } => {
            spilled.push(expr.clone());
            build::empty()
        }
        ExprKind::Block { .. }
        | ExprKind::Loop { .. }
        | ExprKind::Try { .. }
        | ExprKind::Label { .. } => land(expr, spilled),
        ExprKind::Conditional {
            test,
            if_true,
            if_false,
        } => {
            let test = lift(test, spilled);
            let rebuilt = build::condition(test, if_true.clone(), if_false.clone(), expr.ty().clone());
            land(&rebuilt, spilled)
        }
        ExprKind::Switch {
            value,
            cases,
            default,
        } => {
            let value = lift(value, spilled);
            let rebuilt = build::switch(value, cases.clone(), default.clone(), expr.ty().clone());
            land(&rebuilt, spilled)
        }
        ExprKind::Binary {
            op: op @ (BinaryOp::AndAlso | BinaryOp::OrElse),
            left,
            right,
        } if has_suspend(right) => short_circuit(*op, left, right, spilled),
        ExprKind::Assign { target, value } => match target.kind() {
            ExprKind::Parameter(_) => build::assign(target.clone(), lift(value, spilled)),
            ExprKind::Member {
                object: Some(object),
                member,
            } => {
                let [object, value] = operands([object, value], spilled);
                build::assign(build::member(Some(object), member.clone()), value)
            }
            _ => build::assign(target.clone(), lift(value, spilled)),
        },
        ExprKind::Goto {
            kind,
            target,
            value,
        } => {
            let value = value.as_ref().map(|v| lift(v, spilled));
            build::goto_kind(*kind, target, value)
        }
        ExprKind::Throw { value } => match value {
            Some(value) => build::throw(lift(value, spilled)),
            None => expr.clone(),
        },
        ExprKind::Unary { op, operand } => Expr::new(
            ExprKind::Unary {
                op: *op,
                operand: lift(operand, spilled),
            },
            expr.ty().clone(),
        ),
        ExprKind::TypeIs { operand, ty } => build::type_is(lift(operand, spilled), ty.clone()),
        ExprKind::Binary { op, left, right } => {
            let [left, right] = operands([left, right], spilled);
            Expr::new(
                ExprKind::Binary {
                    op: *op,
                    left,
                    right,
                },
                expr.ty().clone(),
            )
        }
        ExprKind::Call {
            object,
            method,
            args,
        } => {
            let mut all: Vec<&Expr> = object.iter().collect();
            all.extend(args.iter());
            let mut by_ref = vec![false; usize::from(object.is_some())];
            by_ref.extend(args.iter().enumerate().map(|(i, _)| {
                method.params().get(i).is_some_and(|p| p.is_out())
            }));
            let mut spilled_args = spill_operands(&all, &by_ref, spilled).into_iter();
            let object = object.as_ref().and_then(|_| spilled_args.next());
            Expr::new(
                ExprKind::Call {
                    object,
                    method: method.clone(),
                    args: spilled_args.collect(),
                },
                expr.ty().clone(),
            )
        }
        ExprKind::Member { object, member } => {
            let object = object.as_ref().map(|o| lift(o, spilled));
            build::member(object, member.clone())
        }
        ExprKind::New { args } => {
            let args: Vec<&Expr> = args.iter().collect();
            let by_ref = vec![false; args.len()];
            Expr::new(
                ExprKind::New {
                    args: spill_operands(&args, &by_ref, spilled),
                },
                expr.ty().clone(),
            )
        }
        ExprKind::NewArray { items } => {
            let items: Vec<&Expr> = items.iter().collect();
            let by_ref = vec![false; items.len()];
            Expr::new(
                ExprKind::NewArray {
                    items: spill_operands(&items, &by_ref, spilled),
                },
                expr.ty().clone(),
            )
        }
        ExprKind::Invoke { target, args } => {
            let mut all = vec![target];
            all.extend(args.iter());
            let by_ref = vec![false; all.len()];
            let mut spilled_all = spill_operands(&all, &by_ref, spilled).into_iter();
            let target = spilled_all.next().unwrap_or_else(|| target.clone());
            Expr::new(
                ExprKind::Invoke {
                    target,
                    args: spilled_all.collect(),
                },
                expr.ty().clone(),
            )
        }
        // Remaining kinds either cannot suspend or were reduced before
        // spilling.
        _ => expr.clone(),
    })
}

/// Place a statement-shaped node where a jump can reach it. A value is
/// captured through an assignment to a temporary.
fn land(expr: &Expr, spilled: &mut Spilled) -> Expr {
    let stmt = statement(expr);
    if expr.ty().is_void() {
        spilled.push(stmt);
        return build::empty();
    }
    let var = spilled.temp(expr.ty().clone());
    spilled.push(build::assign_var(&var, stmt));
    parameter(&var)
}

/// `left && right` / `left || right` with a suspending right operand:
///
/// ```text
/// result = left;
/// if (result) result = right;     // `if (!result)` for ||
/// ```
fn short_circuit(op: BinaryOp, left: &Expr, right: &Expr, spilled: &mut Spilled) -> Expr {
    let left = lift(left, spilled);
    let result = spilled.temp(Type::Bool);
    spilled.push(build::assign_var(&result, left));
    let test = match op {
        BinaryOp::OrElse => build::not(parameter(&result)),
        _ => parameter(&result),
    };
    spilled.push(build::if_then(test, build::assign_var(&result, statement(right))));
    parameter(&result)
}

fn operands<const N: usize>(exprs: [&Expr; N], spilled: &mut Spilled) -> [Expr; N] {
    let by_ref = [false; N];
    let lifted = spill_operands(&exprs, &by_ref, spilled);
    let mut lifted = lifted.into_iter();
    exprs.map(|e| lifted.next().unwrap_or_else(|| e.clone()))
}

/// Lift operands up to the last suspending one. Values computed before it
/// are stored in temporaries unless passed by reference; operands after it
/// stay in place.
fn spill_operands(exprs: &[&Expr], by_ref: &[bool], spilled: &mut Spilled) -> Vec<Expr> {
    let Some(last) = exprs.iter().rposition(|e| has_suspend(e)) else {
        return exprs.iter().map(|e| (*e).clone()).collect();
    };
    exprs
        .iter()
        .enumerate()
        .map(|(i, e)| {
            if i > last {
                return (*e).clone();
            }
            let value = lift(e, spilled);
            if i == last || by_ref.get(i).copied().unwrap_or(false) {
                value
            } else {
                spilled.store(value)
            }
        })
        .collect()
}
