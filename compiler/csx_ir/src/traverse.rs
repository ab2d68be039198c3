//! Structural recursion over expression trees.
//!
//! Passes match directly on [`ExprKind`] for the nodes they care about and
//! hand everything else to [`map_children`], which applies a function to
//! each direct child in evaluation order and rebuilds the node only when a
//! child changed. An unchanged subtree keeps its identity.
//!
//! Lambda bodies are children like any other; passes that must leave nested
//! lambdas alone match on `Lambda`/`AsyncLambda` before delegating here.

use std::convert::Infallible;
use std::sync::Arc;

use smallvec::SmallVec;

use crate::expr::{CatchBlock, Expr, ExprKind, LambdaData, SwitchArm, SwitchCase};

/// Direct children in evaluation order.
pub fn children(expr: &Expr) -> SmallVec<[&Expr; 4]> {
    let mut out = SmallVec::new();
    match expr.kind() {
        ExprKind::Constant(_)
        | ExprKind::Default
        | ExprKind::Parameter(_)
        | ExprKind::SuspendPoint { .. } => {}
        ExprKind::Unary { operand, .. } | ExprKind::TypeIs { operand, .. } => out.push(operand),
        ExprKind::Binary { left, right, .. } => {
            out.push(left);
            out.push(right);
        }
        ExprKind::Assign { target, value } => {
            out.push(target);
            out.push(value);
        }
        ExprKind::Conditional {
            test,
            if_true,
            if_false,
        } => {
            out.push(test);
            out.push(if_true);
            out.push(if_false);
        }
        ExprKind::Block { exprs, .. } => out.extend(exprs.iter()),
        ExprKind::Label { default, .. } => out.extend(default.iter()),
        ExprKind::Goto { value, .. } => out.extend(value.iter()),
        ExprKind::Loop { body, .. } => out.push(body),
        ExprKind::Switch {
            value,
            cases,
            default,
        } => {
            out.push(value);
            for case in cases {
                out.extend(case.tests.iter());
                out.push(&case.body);
            }
            out.extend(default.iter());
        }
        ExprKind::Try {
            body,
            handlers,
            finally,
        } => {
            out.push(body);
            for handler in handlers {
                out.extend(handler.filter.iter());
                out.push(&handler.body);
            }
            out.extend(finally.iter());
        }
        ExprKind::Throw { value } => out.extend(value.iter()),
        ExprKind::Call { object, args, .. } => {
            out.extend(object.iter());
            out.extend(args.iter());
        }
        ExprKind::Member { object, .. } => out.extend(object.iter()),
        ExprKind::New { args } => out.extend(args.iter()),
        ExprKind::NewArray { items } => out.extend(items.iter()),
        ExprKind::Lambda(data) | ExprKind::AsyncLambda(data) => out.push(&data.body),
        ExprKind::Invoke { target, args } => {
            out.push(target);
            out.extend(args.iter());
        }
        ExprKind::IsPattern { operand, .. } => out.push(operand),
        ExprKind::SwitchExpr { subject, arms } => {
            out.push(subject);
            for arm in arms {
                out.extend(arm.guard.iter());
                out.push(&arm.value);
            }
        }
        ExprKind::Await { operand, .. } => out.push(operand),
        ExprKind::Lock { object, body } => {
            out.push(object);
            out.push(body);
        }
    }
    out
}

/// Tracks whether any child was replaced by a different node.
struct Mapper<'f, E> {
    f: &'f mut dyn FnMut(&Expr) -> Result<Expr, E>,
    changed: bool,
}

impl<E> Mapper<'_, E> {
    fn one(&mut self, expr: &Expr) -> Result<Expr, E> {
        let new = (self.f)(expr)?;
        if !new.ptr_eq(expr) {
            self.changed = true;
        }
        Ok(new)
    }

    fn opt(&mut self, expr: Option<&Expr>) -> Result<Option<Expr>, E> {
        expr.map(|e| self.one(e)).transpose()
    }

    fn many(&mut self, exprs: &[Expr]) -> Result<Vec<Expr>, E> {
        exprs.iter().map(|e| self.one(e)).collect()
    }

    fn lambda(&mut self, data: &Arc<LambdaData>) -> Result<Arc<LambdaData>, E> {
        let body = self.one(&data.body)?;
        if body.ptr_eq(&data.body) {
            return Ok(Arc::clone(data));
        }
        Ok(Arc::new(LambdaData {
            name: data.name.clone(),
            params: data.params.clone(),
            body,
            return_type: data.return_type.clone(),
        }))
    }
}

/// Apply `f` to each direct child and rebuild `expr` if any child changed.
///
/// The rebuilt node keeps the original node's type.
pub fn map_children<E>(
    expr: &Expr,
    f: &mut dyn FnMut(&Expr) -> Result<Expr, E>,
) -> Result<Expr, E> {
    let mut m = Mapper { f, changed: false };
    let kind = match expr.kind() {
        ExprKind::Constant(_)
        | ExprKind::Default
        | ExprKind::Parameter(_)
        | ExprKind::SuspendPoint { .. } => return Ok(expr.clone()),
        ExprKind::Unary { op, operand } => ExprKind::Unary {
            op: *op,
            operand: m.one(operand)?,
        },
        ExprKind::TypeIs { operand, ty } => ExprKind::TypeIs {
            operand: m.one(operand)?,
            ty: ty.clone(),
        },
        ExprKind::Binary { op, left, right } => ExprKind::Binary {
            op: *op,
            left: m.one(left)?,
            right: m.one(right)?,
        },
        ExprKind::Assign { target, value } => ExprKind::Assign {
            target: m.one(target)?,
            value: m.one(value)?,
        },
        ExprKind::Conditional {
            test,
            if_true,
            if_false,
        } => ExprKind::Conditional {
            test: m.one(test)?,
            if_true: m.one(if_true)?,
            if_false: m.one(if_false)?,
        },
        ExprKind::Block { variables, exprs } => ExprKind::Block {
            variables: variables.clone(),
            exprs: m.many(exprs)?,
        },
        ExprKind::Label { target, default } => ExprKind::Label {
            target: target.clone(),
            default: m.opt(default.as_ref())?,
        },
        ExprKind::Goto {
            kind,
            target,
            value,
        } => ExprKind::Goto {
            kind: *kind,
            target: target.clone(),
            value: m.opt(value.as_ref())?,
        },
        ExprKind::Loop {
            body,
            break_label,
            continue_label,
        } => ExprKind::Loop {
            body: m.one(body)?,
            break_label: break_label.clone(),
            continue_label: continue_label.clone(),
        },
        ExprKind::Switch {
            value,
            cases,
            default,
        } => {
            let value = m.one(value)?;
            let cases = cases
                .iter()
                .map(|case| -> Result<SwitchCase, E> {
                    Ok(SwitchCase {
                        tests: m.many(&case.tests)?,
                        body: m.one(&case.body)?,
                    })
                })
                .collect::<Result<Vec<_>, _>>()?;
            ExprKind::Switch {
                value,
                cases,
                default: m.opt(default.as_ref())?,
            }
        }
        ExprKind::Try {
            body,
            handlers,
            finally,
        } => {
            let body = m.one(body)?;
            let handlers = handlers
                .iter()
                .map(|h| -> Result<CatchBlock, E> {
                    Ok(CatchBlock {
                        test: h.test.clone(),
                        variable: h.variable.clone(),
                        filter: m.opt(h.filter.as_ref())?,
                        body: m.one(&h.body)?,
                    })
                })
                .collect::<Result<Vec<_>, _>>()?;
            ExprKind::Try {
                body,
                handlers,
                finally: m.opt(finally.as_ref())?,
            }
        }
        ExprKind::Throw { value } => ExprKind::Throw {
            value: m.opt(value.as_ref())?,
        },
        ExprKind::Call {
            object,
            method,
            args,
        } => ExprKind::Call {
            object: m.opt(object.as_ref())?,
            method: method.clone(),
            args: m.many(args)?,
        },
        ExprKind::Member { object, member } => ExprKind::Member {
            object: m.opt(object.as_ref())?,
            member: member.clone(),
        },
        ExprKind::New { args } => ExprKind::New {
            args: m.many(args)?,
        },
        ExprKind::NewArray { items } => ExprKind::NewArray {
            items: m.many(items)?,
        },
        ExprKind::Lambda(data) => ExprKind::Lambda(m.lambda(data)?),
        ExprKind::AsyncLambda(data) => ExprKind::AsyncLambda(m.lambda(data)?),
        ExprKind::Invoke { target, args } => ExprKind::Invoke {
            target: m.one(target)?,
            args: m.many(args)?,
        },
        ExprKind::IsPattern { operand, pattern } => ExprKind::IsPattern {
            operand: m.one(operand)?,
            pattern: pattern.clone(),
        },
        ExprKind::SwitchExpr { subject, arms } => {
            let subject = m.one(subject)?;
            let arms = arms
                .iter()
                .map(|arm| -> Result<SwitchArm, E> {
                    Ok(SwitchArm {
                        variables: arm.variables.clone(),
                        pattern: arm.pattern.clone(),
                        guard: m.opt(arm.guard.as_ref())?,
                        value: m.one(&arm.value)?,
                    })
                })
                .collect::<Result<Vec<_>, _>>()?;
            ExprKind::SwitchExpr { subject, arms }
        }
        ExprKind::Await {
            operand,
            get_awaiter,
        } => ExprKind::Await {
            operand: m.one(operand)?,
            get_awaiter: get_awaiter.clone(),
        },
        ExprKind::Lock { object, body } => ExprKind::Lock {
            object: m.one(object)?,
            body: m.one(body)?,
        },
    };
    if m.changed {
        Ok(Expr::new(kind, expr.ty().clone()))
    } else {
        Ok(expr.clone())
    }
}

/// [`map_children`] for rewrites that cannot fail.
pub fn map_children_infallible(expr: &Expr, f: &mut dyn FnMut(&Expr) -> Expr) -> Expr {
    let result: Result<Expr, Infallible> = map_children(expr, &mut |e| Ok(f(e)));
    match result {
        Ok(e) => e,
        Err(never) => match never {},
    }
}

/// Whether `pred` holds for `expr` or any node below it. With
/// `stop_at_lambdas`, bodies of nested lambdas and async lambdas are not
/// searched (the lambda node itself still is).
pub fn any_descendant(expr: &Expr, stop_at_lambdas: bool, pred: &mut dyn FnMut(&Expr) -> bool) -> bool {
    crate::ensure_sufficient_stack(|| {
        if pred(expr) {
            return true;
        }
        if stop_at_lambdas
            && matches!(expr.kind(), ExprKind::Lambda(_) | ExprKind::AsyncLambda(_))
        {
            return false;
        }
        children(expr)
            .into_iter()
            .any(|child| any_descendant(child, stop_at_lambdas, &mut *pred))
    })
}

/// Side-effect free and cheap to evaluate more than once.
pub fn is_pure(expr: &Expr) -> bool {
    matches!(
        expr.kind(),
        ExprKind::Constant(_) | ExprKind::Default | ExprKind::Parameter(_)
    )
}
