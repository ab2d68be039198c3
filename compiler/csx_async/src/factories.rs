//! Checked constructors for `await`, async lambdas and `lock`.
//!
//! Each constructor rejects a malformed node at construction, so the
//! lowering passes can assume the awaiter protocol resolves and the return
//! type selects a builder.

use std::sync::Arc;

use csx_ir::build;
use csx_ir::{
    runtime, AsyncBuilder, CsxError, Expr, ExprKind, LambdaData, MemberInfo, MethodInfo, Type,
    Var,
};

use crate::check;

/// The awaiter protocol behind one `await`.
#[derive(Clone, Debug)]
pub(crate) struct Awaiter {
    pub ty: Type,
    pub is_completed: MemberInfo,
    pub get_result: MethodInfo,
}

impl Awaiter {
    /// Resolve the protocol from a `GetAwaiter` method. The awaiter it
    /// returns must implement `INotifyCompletion` and expose
    /// `bool IsCompleted` and a parameterless instance `GetResult`.
    pub(crate) fn resolve(get_awaiter: &MethodInfo) -> Result<Self, CsxError> {
        let ty = get_awaiter.return_type().clone();
        let not_awaitable = |reason| CsxError::NotAwaitable {
            ty: ty.clone(),
            reason,
        };
        if !ty.implements(&runtime::inotify_completion()) {
            return Err(not_awaitable("awaiter does not implement `INotifyCompletion`"));
        }
        let is_completed = ty
            .find_member("IsCompleted")
            .filter(|m| m.ty == Type::Bool)
            .ok_or_else(|| not_awaitable("awaiter has no `bool IsCompleted`"))?;
        let get_result = ty
            .find_method("GetResult", 0)
            .filter(|m| !m.is_static())
            .ok_or_else(|| not_awaitable("awaiter has no parameterless `GetResult`"))?;
        Ok(Awaiter {
            ty,
            is_completed,
            get_result,
        })
    }
}

/// `await operand`, resolving `GetAwaiter()` on the operand's static type.
pub fn await_expr(operand: Expr) -> Result<Expr, CsxError> {
    let get_awaiter = operand
        .ty()
        .find_method("GetAwaiter", 0)
        .filter(|m| !m.is_static())
        .ok_or_else(|| CsxError::NotAwaitable {
            ty: operand.ty().clone(),
            reason: "no instance `GetAwaiter()` method",
        })?;
    await_with(operand, get_awaiter)
}

/// `await operand` with an explicit `GetAwaiter` method.
pub fn await_with(operand: Expr, get_awaiter: MethodInfo) -> Result<Expr, CsxError> {
    if let Some(declaring) = get_awaiter.declaring() {
        if !get_awaiter.is_static() && !declaring.is_assignable_from(operand.ty()) {
            return Err(CsxError::NotAwaitable {
                ty: operand.ty().clone(),
                reason: "`GetAwaiter` is not declared on the operand type",
            });
        }
    }
    let awaiter = Awaiter::resolve(&get_awaiter)?;
    let ty = awaiter.get_result.return_type().clone();
    Ok(Expr::new(
        ExprKind::Await {
            operand,
            get_awaiter,
        },
        ty,
    ))
}

/// The builder an async lambda returning `return_type` completes through.
pub fn builder_for(return_type: &Type) -> Result<AsyncBuilder, CsxError> {
    if return_type.is_void() {
        return Ok(AsyncBuilder::Void);
    }
    match runtime::task_result_type(return_type) {
        Some(result) if result.is_void() => Ok(AsyncBuilder::Task),
        Some(result) => Ok(AsyncBuilder::TaskOf(result)),
        None => Err(CsxError::InvalidAsyncReturnType {
            ty: return_type.clone(),
        }),
    }
}

/// `async (params) => body` returning `void`, `Task` or `Task<T>`.
///
/// For `Task<T>` the body is converted to `T`. The body is checked for
/// `await` in positions that cannot suspend.
pub fn async_lambda(
    name: Option<&str>,
    params: Vec<Var>,
    body: Expr,
    return_type: Type,
) -> Result<Expr, CsxError> {
    let builder = builder_for(&return_type)?;
    let body = match builder.result_type() {
        Some(result) => {
            if !result.is_assignable_from(body.ty()) {
                return Err(CsxError::AsyncBodyTypeMismatch {
                    expected: result.clone(),
                    found: body.ty().clone(),
                });
            }
            build::convert(body, result.clone())
        }
        None => body,
    };
    check::check_body(&body)?;
    let data = LambdaData {
        name: name.map(Arc::from),
        params,
        body,
        return_type,
    };
    let ty = data.func_type();
    Ok(Expr::new(ExprKind::AsyncLambda(Arc::new(data)), ty))
}

/// `lock (object) body`.
pub fn lock_expr(object: Expr, body: Expr) -> Result<Expr, CsxError> {
    if !object.ty().is_reference_type() {
        return Err(CsxError::InvalidLockObject {
            ty: object.ty().clone(),
        });
    }
    let ty = body.ty().clone();
    Ok(Expr::new(ExprKind::Lock { object, body }, ty))
}

#[cfg(test)]
mod tests;
