//! Structural reduction of an async body.
//!
//! Every extension node outside nested lambdas is reduced: patterns through
//! `csx_patterns`, `lock` to a monitor `try`/`finally`, and `await` to the
//! awaiter protocol around a [`ExprKind::SuspendPoint`]. Afterwards the
//! body holds only substrate nodes and suspend points.

use csx_ir::build::{self, parameter};
use csx_ir::traverse::map_children;
use csx_ir::{ensure_sufficient_stack, runtime, CsxError, Expr, ExprKind, MethodInfo, Type, Var};
use tracing::trace;

use crate::factories::Awaiter;

pub(crate) fn reduce_structure(expr: &Expr) -> Result<Expr, CsxError> {
    ensure_sufficient_stack(|| {
        if let ExprKind::Lambda(_) | ExprKind::AsyncLambda(_) = expr.kind() {
            return Ok(expr.clone());
        }
        let expr = map_children(expr, &mut |child| reduce_structure(child))?;
        match expr.kind() {
            ExprKind::Await {
                operand,
                get_awaiter,
            } => expand_await(operand, get_awaiter, expr.ty()),
            ExprKind::IsPattern { .. } | ExprKind::SwitchExpr { .. } => {
                Ok(csx_patterns::reduce_node(&expr))
            }
            ExprKind::Lock { object, body } => Ok(reduce_lock(object, body)),
            _ => Ok(expr),
        }
    })
}

/// ```text
/// {
///     awaiter = operand.GetAwaiter();
///     suspend(awaiter);
///     awaiter.GetResult()
/// }
/// ```
fn expand_await(operand: &Expr, get_awaiter: &MethodInfo, ty: &Type) -> Result<Expr, CsxError> {
    let protocol = Awaiter::resolve(get_awaiter)?;
    trace!(awaiter = %protocol.ty, "expanding await");
    let awaiter = Var::new("awaiter", protocol.ty.clone());
    let get = if get_awaiter.is_static() {
        build::call_static(get_awaiter.clone(), vec![operand.clone()])
    } else {
        build::call(operand.clone(), get_awaiter.clone(), Vec::new())
    };
    let suspend = Expr::new(
        ExprKind::SuspendPoint {
            awaiter: awaiter.clone(),
            is_completed: protocol.is_completed,
        },
        Type::Void,
    );
    let result = build::call(parameter(&awaiter), protocol.get_result, Vec::new());
    Ok(build::block_typed(
        vec![awaiter.clone()],
        vec![build::assign_var(&awaiter, get), suspend, result],
        ty.clone(),
    ))
}

/// ```text
/// {
///     lock = object;
///     try { Monitor.Enter(lock); taken = true; body }
///     finally { if (taken) Monitor.Exit(lock); }
/// }
/// ```
pub(crate) fn reduce_lock(object: &Expr, body: &Expr) -> Expr {
    let lock = Var::new("lock", Type::Object);
    let taken = Var::new("lock_taken", Type::Bool);
    let ty = body.ty().clone();
    let guarded = build::try_finally(
        build::block_typed(
            Vec::new(),
            vec![
                build::call_static(runtime::monitor_enter(), vec![parameter(&lock)]),
                build::assign_var(&taken, build::const_bool(true)),
                body.clone(),
            ],
            ty.clone(),
        ),
        build::if_then(
            parameter(&taken),
            build::call_static(runtime::monitor_exit(), vec![parameter(&lock)]),
        ),
    );
    build::block_typed(
        vec![lock.clone(), taken],
        vec![
            build::assign_var(&lock, build::convert(object.clone(), Type::Object)),
            guarded,
        ],
        ty,
    )
}

#[cfg(test)]
mod tests {
    #![allow(
        clippy::unwrap_used,
        reason = "test code uses unwrap for concise assertions"
    )]

    use csx_eval::{EvalError, Interpreter, Value};
    use csx_ir::build::{self, const_i32};
    use csx_ir::traverse::any_descendant;
    use csx_ir::{runtime, ExprKind, Type, TypeBuilder};
    use pretty_assertions::assert_eq;

    use super::reduce_structure;
    use crate::factories::{await_expr, lock_expr};

    fn gate() -> csx_ir::Expr {
        build::new_(TypeBuilder::class("Gate").build(), Vec::new())
    }

    #[test]
    fn await_becomes_a_suspend_point() {
        let task = build::call_static(runtime::task_from_result(&Type::Int32), vec![const_i32(4)]);
        let e = build::add(await_expr(task).unwrap(), const_i32(1));
        let reduced = reduce_structure(&e).unwrap();

        let suspends = |e: &csx_ir::Expr| {
            any_descendant(e, true, &mut |n| matches!(n.kind(), ExprKind::SuspendPoint { .. }))
        };
        assert!(suspends(&reduced));
        assert!(!any_descendant(&reduced, true, &mut |n| n.is_extension()
            && !matches!(n.kind(), ExprKind::SuspendPoint { .. })));
        assert_eq!(reduced.ty(), &Type::Int32);
    }

    #[test]
    fn nested_lambdas_are_left_alone() {
        let task = build::call_static(runtime::task_from_result(&Type::Int32), vec![const_i32(4)]);
        let inner = build::lambda(None, Vec::new(), await_expr(task).unwrap());
        let reduced = reduce_structure(&inner).unwrap();
        assert!(reduced.ptr_eq(&inner));
    }

    #[test]
    fn lock_releases_the_monitor() {
        let e = lock_expr(gate(), const_i32(7)).unwrap();
        let mut interp = Interpreter::new();
        assert_eq!(interp.eval(&reduce_structure(&e).unwrap()).unwrap(), Value::Int32(7));
        assert_eq!(interp.monitor_depth(), 0);
    }

    #[test]
    fn lock_releases_the_monitor_when_the_body_throws() {
        let body = build::throw(build::new_(runtime::invalid_operation_exception(), Vec::new()));
        let e = lock_expr(gate(), body).unwrap();
        let mut interp = Interpreter::new();
        let result = interp.eval(&reduce_structure(&e).unwrap());
        assert!(matches!(result, Err(EvalError::UnhandledException { .. })));
        assert_eq!(interp.monitor_depth(), 0);
    }

    #[test]
    fn locking_null_does_not_exit() {
        let e = lock_expr(build::null(Type::String), const_i32(1)).unwrap();
        let mut interp = Interpreter::new();
        match interp.eval(&reduce_structure(&e).unwrap()) {
            Err(EvalError::UnhandledException { ty, .. }) => {
                assert_eq!(ty, runtime::null_reference_exception());
            }
            other => panic!("expected NullReferenceException, got {other:?}"),
        }
        assert_eq!(interp.monitor_depth(), 0);
    }
}
