//! C#-style extension expressions and their lowering.
//!
//! Trees are built from the substrate in [`csx_ir`] plus three kinds of
//! extension node:
//!
//! - pattern matching (`is` and `switch` expressions) from [`csx_patterns`]
//! - `await`, async lambdas and `lock` from [`csx_async`]
//!
//! [`reduce`] lowers a single extension node one step; [`reduce_all`] lowers
//! a whole tree until no extension node is left.
//!
//! # Tracing
//!
//! Every pass logs through `tracing`. Call [`init_tracing`] and set
//! `RUST_LOG=csx_patterns=debug` or `RUST_LOG=csx_async=trace` to see it.

use std::sync::Once;

use csx_ir::traverse::map_children;
use csx_ir::{ensure_sufficient_stack, CsxError, Expr, ExprKind};
use tracing::debug;

pub use csx_async::{
    async_lambda, await_expr, await_with, builder_for, lock_expr, lower_async_lambda,
};
pub use csx_ir::{build, runtime, traverse, Type, TypeBuilder, Var};
pub use csx_ir::{ErrorCode, Pattern, PatternInfo};
pub use csx_patterns::{factories as patterns, is_pattern, switch_arm, switch_expr};

/// Reduce one extension node one step. Other nodes are returned unchanged.
///
/// Nested extension nodes may survive a single step: the operand of an `is`
/// is copied into its reduction as is, and lambdas nested in an async lambda
/// are left for their own lowering.
pub fn reduce(expr: &Expr) -> Result<Expr, CsxError> {
    match expr.kind() {
        ExprKind::IsPattern { .. } | ExprKind::SwitchExpr { .. } => {
            Ok(csx_patterns::reduce_node(expr))
        }
        _ => csx_async::reduce_node(expr),
    }
}

/// Reduce every extension node in `expr`, nested lambdas included.
///
/// An async lambda is lowered before its body is visited, so `await`s it
/// owns are gone by the time the walk reaches them. An `await` reached
/// any other way is outside an async lambda and fails.
pub fn reduce_all(expr: &Expr) -> Result<Expr, CsxError> {
    debug!(ty = %expr.ty(), "reducing tree");
    reduce_deep(expr)
}

fn reduce_deep(expr: &Expr) -> Result<Expr, CsxError> {
    ensure_sufficient_stack(|| match expr.kind() {
        ExprKind::IsPattern { .. }
        | ExprKind::SwitchExpr { .. }
        | ExprKind::AsyncLambda(_)
        | ExprKind::Lock { .. }
        | ExprKind::Await { .. } => {
            let reduced = reduce(expr)?;
            reduce_deep(&reduced)
        }
        _ => map_children(expr, &mut reduce_deep),
    })
}

static TRACING_INIT: Once = Once::new();

/// Initialize tracing for debug output.
///
/// Safe to call multiple times. Does nothing unless `RUST_LOG` is set.
pub fn init_tracing() {
    TRACING_INIT.call_once(|| {
        use tracing_subscriber::{fmt, prelude::*, EnvFilter};

        if std::env::var("RUST_LOG").is_ok() {
            let filter = EnvFilter::from_default_env();
            tracing_subscriber::registry()
                .with(fmt::layer().with_target(true).with_level(true))
                .with(filter)
                .init();
        }
    });
}
