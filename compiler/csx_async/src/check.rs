//! Rejects `await` in positions that cannot suspend: catch filters,
//! handlers, `finally`, lock bodies and switch case tests.
//!
//! Runs over an async lambda body before any rewriting. Nested lambdas are
//! checked when they are lowered themselves.

use csx_ir::traverse::any_descendant;
use csx_ir::{CsxError, Expr, ExprKind};

/// First misplaced `await` in pre-order, if any.
pub(crate) fn check_body(body: &Expr) -> Result<(), CsxError> {
    let mut error = None;
    any_descendant(body, true, &mut |e| match check_node(e) {
        Ok(()) => false,
        Err(err) => {
            error = Some(err);
            true
        }
    });
    error.map_or(Ok(()), Err)
}

fn check_node(expr: &Expr) -> Result<(), CsxError> {
    match expr.kind() {
        ExprKind::Try {
            handlers, finally, ..
        } => {
            for handler in handlers {
                if handler.filter.as_ref().is_some_and(contains_await) {
                    return Err(CsxError::AwaitInCatchFilter);
                }
                if contains_await(&handler.body) {
                    return Err(CsxError::AwaitInExceptionHandler);
                }
            }
            if finally.as_ref().is_some_and(contains_await) {
                return Err(CsxError::AwaitInExceptionHandler);
            }
            Ok(())
        }
        ExprKind::Lock { body, .. } if contains_await(body) => Err(CsxError::AwaitInLockBody),
        // Case tests run lazily, one after another, so they have no
        // statement position to resume into.
        ExprKind::Switch { cases, .. }
            if cases.iter().flat_map(|c| &c.tests).any(contains_await) =>
        {
            Err(CsxError::AwaitInSwitchCaseTest)
        }
        _ => Ok(()),
    }
}

/// Whether `expr` awaits outside any nested lambda.
pub(crate) fn contains_await(expr: &Expr) -> bool {
    any_descendant(expr, true, &mut |e| matches!(e.kind(), ExprKind::Await { .. }))
}
