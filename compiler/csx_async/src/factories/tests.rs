#![allow(
    clippy::unwrap_used,
    reason = "test code uses unwrap for concise assertions"
)]

use csx_ir::build::{self, const_i32, const_str};
use csx_ir::{
    runtime, AsyncBuilder, CsxError, ErrorCode, Expr, ExprKind, MethodBody, MethodDef,
    MethodInfo, Type, TypeBuilder,
};
use pretty_assertions::assert_eq;

use super::*;

fn task_of_int() -> Expr {
    build::call_static(runtime::task_from_result(&Type::Int32), vec![const_i32(1)])
}

fn code(result: Result<Expr, CsxError>) -> ErrorCode {
    result.unwrap_err().code()
}

/// An awaitable whose awaiter is missing one piece of the protocol.
fn awaitable_with(awaiter: Type) -> Type {
    TypeBuilder::class("Custom")
        .method(MethodDef::new(
            "GetAwaiter",
            Vec::new(),
            awaiter,
            MethodBody::Host("get_awaiter".into()),
        ))
        .build()
}

// ── await ───────────────────────────────────────────────────────────

#[test]
fn await_takes_the_result_type_of_get_result() {
    let e = await_expr(task_of_int()).unwrap();
    assert_eq!(e.ty(), &Type::Int32);
    assert!(matches!(e.kind(), ExprKind::Await { .. }));

    let plain = build::new_(runtime::task(), Vec::new());
    assert_eq!(await_expr(plain).unwrap().ty(), &Type::Void);
}

#[test]
fn await_requires_get_awaiter() {
    assert_eq!(code(await_expr(const_i32(1))), ErrorCode::E7001);
    assert!(matches!(
        await_expr(const_str("x")),
        Err(CsxError::NotAwaitable { ty: Type::String, .. })
    ));
}

#[test]
fn awaiter_must_follow_the_protocol() {
    let no_interface = TypeBuilder::structure("NoNotify")
        .property("IsCompleted", Type::Bool)
        .build();
    let e = build::new_(awaitable_with(no_interface), Vec::new());
    assert_eq!(code(await_expr(e)), ErrorCode::E7001);

    let no_flag = TypeBuilder::structure("NoFlag")
        .implements(runtime::inotify_completion())
        .method(MethodDef::new(
            "GetResult",
            Vec::new(),
            Type::Int32,
            MethodBody::Stored,
        ))
        .build();
    let e = build::new_(awaitable_with(no_flag), Vec::new());
    assert_eq!(code(await_expr(e)), ErrorCode::E7001);

    let wrong_flag = TypeBuilder::structure("WrongFlag")
        .implements(runtime::inotify_completion())
        .property("IsCompleted", Type::Int32)
        .method(MethodDef::new(
            "GetResult",
            Vec::new(),
            Type::Int32,
            MethodBody::Stored,
        ))
        .build();
    let e = build::new_(awaitable_with(wrong_flag), Vec::new());
    assert_eq!(code(await_expr(e)), ErrorCode::E7001);

    let no_result = TypeBuilder::structure("NoResult")
        .implements(runtime::inotify_completion())
        .property("IsCompleted", Type::Bool)
        .build();
    let e = build::new_(awaitable_with(no_result), Vec::new());
    assert_eq!(code(await_expr(e)), ErrorCode::E7001);
}

#[test]
fn explicit_get_awaiter_must_fit_the_operand() {
    let get_awaiter = runtime::task().find_method("GetAwaiter", 0).unwrap();
    assert!(await_with(task_of_int(), get_awaiter.clone()).is_ok());
    assert_eq!(code(await_with(const_i32(1), get_awaiter)), ErrorCode::E7001);

    let foreign = MethodInfo::new(
        None,
        MethodDef::new(
            "GetAwaiter",
            Vec::new(),
            runtime::task_awaiter(None),
            MethodBody::Stored,
        ),
    );
    assert!(await_with(const_i32(1), foreign).is_ok());
}

// ── async lambdas ───────────────────────────────────────────────────

#[test]
fn builder_follows_the_return_type() {
    assert_eq!(builder_for(&Type::Void), Ok(AsyncBuilder::Void));
    assert_eq!(builder_for(&runtime::task()), Ok(AsyncBuilder::Task));
    assert_eq!(
        builder_for(&runtime::task_of(Type::String)),
        Ok(AsyncBuilder::TaskOf(Type::String))
    );
    assert_eq!(
        builder_for(&Type::Int32),
        Err(CsxError::InvalidAsyncReturnType { ty: Type::Int32 })
    );
}

#[test]
fn async_lambda_checks_its_body_type() {
    let body = await_expr(task_of_int()).unwrap();
    let f = async_lambda(None, Vec::new(), body.clone(), runtime::task_of(Type::Int32)).unwrap();
    assert_eq!(f.ty(), &Type::func(Vec::new(), runtime::task_of(Type::Int32)));

    // Widening to the result type is allowed.
    assert!(async_lambda(None, Vec::new(), body.clone(), runtime::task_of(Type::Object)).is_ok());

    assert_eq!(
        async_lambda(None, Vec::new(), body.clone(), runtime::task_of(Type::String)).unwrap_err(),
        CsxError::AsyncBodyTypeMismatch {
            expected: Type::String,
            found: Type::Int32
        }
    );
    assert_eq!(code(async_lambda(None, Vec::new(), body, Type::Int32)), ErrorCode::E7002);
}

#[test]
fn async_lambda_rejects_misplaced_awaits() {
    let body = build::try_finally(const_i32(0), await_expr(task_of_int()).unwrap());
    assert_eq!(
        async_lambda(None, Vec::new(), body, runtime::task()).unwrap_err(),
        CsxError::AwaitInExceptionHandler
    );
}

// ── lock ────────────────────────────────────────────────────────────

#[test]
fn lock_needs_a_reference_type() {
    let gate = build::new_(TypeBuilder::class("Gate").build(), Vec::new());
    let e = lock_expr(gate, const_str("x")).unwrap();
    assert_eq!(e.ty(), &Type::String);

    assert_eq!(
        lock_expr(const_i32(1), const_i32(0)).unwrap_err(),
        CsxError::InvalidLockObject { ty: Type::Int32 }
    );
    let value = build::new_(TypeBuilder::structure("Value").build(), Vec::new());
    assert_eq!(code(lock_expr(value, const_i32(0))), ErrorCode::E7008);
}
