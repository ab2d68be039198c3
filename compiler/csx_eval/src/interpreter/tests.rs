//! Evaluation tests over hand-built substrate trees.

#![allow(
    clippy::unwrap_used,
    reason = "test code uses unwrap for concise assertions"
)]

use csx_ir::build::{self, const_bool, const_i32, const_str, parameter};
use csx_ir::{
    runtime, AsyncBuilder, BinaryOp, ConstValue, GotoKind, IndexValue, LabelTarget, MethodBody,
    MethodDef, MethodInfo, ParamInfo, RangeValue, Type, TypeBuilder, Var,
};
use pretty_assertions::assert_eq;

use crate::environment::Environment;
use crate::errors::EvalError;
use crate::tasks::pending_task;
use crate::value::Value;
use crate::Interpreter;

fn eval(expr: &csx_ir::Expr) -> Result<Value, EvalError> {
    Interpreter::new().eval(expr)
}

fn thrown_type(result: Result<Value, EvalError>) -> Type {
    match result {
        Err(EvalError::UnhandledException { ty, .. }) => ty,
        other => panic!("expected an unhandled exception, got {other:?}"),
    }
}

// Operators

#[test]
fn integer_arithmetic_wraps() {
    let e = build::add(const_i32(i32::MAX), const_i32(1));
    assert_eq!(eval(&e).unwrap(), Value::Int32(i32::MIN));
}

#[test]
fn mixed_arithmetic_promotes() {
    let e = build::binary(
        BinaryOp::Multiply,
        const_i32(2),
        build::constant(ConstValue::Float64(1.5)),
    );
    assert_eq!(eval(&e).unwrap(), Value::Float64(3.0));
}

#[test]
fn integer_division_by_zero_throws() {
    let e = build::binary(BinaryOp::Divide, const_i32(1), const_i32(0));
    let ty = thrown_type(eval(&e));
    assert_eq!(ty.type_def().unwrap().name.as_ref(), "DivideByZeroException");
}

#[test]
fn string_concatenation() {
    let e = build::add(const_str("n="), const_i32(4));
    assert_eq!(eval(&e).unwrap(), Value::string("n=4"));
}

#[test]
fn lifted_operators_on_null() {
    let n = build::null(Type::nullable(Type::Int32));
    assert_eq!(eval(&build::add(n.clone(), const_i32(1))).unwrap(), Value::Null);
    assert_eq!(
        eval(&build::less_than(n.clone(), const_i32(1))).unwrap(),
        Value::Bool(false)
    );
    assert_eq!(
        eval(&build::equal(n.clone(), build::null(Type::nullable(Type::Int32)))).unwrap(),
        Value::Bool(true)
    );
}

#[test]
fn short_circuit_skips_the_right_operand() {
    let boom = build::block_typed(
        Vec::new(),
        vec![
            build::throw(build::new_(runtime::exception(), Vec::new())),
            const_bool(true),
        ],
        Type::Bool,
    );
    let e = build::and_also(const_bool(false), boom.clone());
    assert_eq!(eval(&e).unwrap(), Value::Bool(false));
    let e = build::or_else(const_bool(true), boom);
    assert_eq!(eval(&e).unwrap(), Value::Bool(true));
}

#[test]
fn numeric_conversions_truncate() {
    let e = build::convert(build::constant(ConstValue::Float64(2.9)), Type::Int32);
    assert_eq!(eval(&e).unwrap(), Value::Int32(2));
    let e = build::convert(const_i32(7), Type::Int64);
    assert_eq!(eval(&e).unwrap(), Value::Int64(7));
}

#[test]
fn invalid_cast_throws() {
    let boxed = build::constant_typed(ConstValue::String("x".into()), Type::Object);
    let e = build::convert(boxed, Type::Int32);
    assert_eq!(thrown_type(eval(&e)), runtime::invalid_cast_exception());
}

#[test]
fn unboxing_null_throws() {
    let e = build::convert(build::null(Type::Object), Type::Int32);
    assert_eq!(thrown_type(eval(&e)), runtime::null_reference_exception());
}

#[test]
fn type_tests_use_runtime_types() {
    let boxed = build::constant_typed(ConstValue::Int32(1), Type::Object);
    assert_eq!(
        eval(&build::type_is(boxed.clone(), Type::Int32)).unwrap(),
        Value::Bool(true)
    );
    assert_eq!(
        eval(&build::type_is(boxed, Type::String)).unwrap(),
        Value::Bool(false)
    );
}

// Blocks, labels and loops

#[test]
fn block_variables_start_at_default() {
    let x = Var::new("x", Type::Int32);
    let e = build::block(vec![x.clone()], vec![parameter(&x)]);
    assert_eq!(eval(&e).unwrap(), Value::Int32(0));
}

#[test]
fn void_block_discards_its_value() {
    let e = build::block_typed(Vec::new(), vec![const_i32(3)], Type::Void);
    assert_eq!(eval(&e).unwrap(), Value::Unit);
}

#[test]
fn loop_with_break_and_continue() {
    // i = 0; sum = 0; loop { i++; if (i > 5) break sum; if (i == 3) continue; sum += i; }
    let i = Var::new("i", Type::Int32);
    let sum = Var::new("sum", Type::Int32);
    let brk = LabelTarget::new("break", Type::Int32);
    let cont = LabelTarget::new("continue", Type::Void);
    let body = build::block(
        Vec::new(),
        vec![
            build::assign_var(&i, build::add(parameter(&i), const_i32(1))),
            build::if_then(
                build::binary(BinaryOp::GreaterThan, parameter(&i), const_i32(5)),
                build::goto_value(&brk, parameter(&sum)),
            ),
            build::if_then(
                build::equal(parameter(&i), const_i32(3)),
                build::goto_kind(GotoKind::Continue, &cont, None),
            ),
            build::assign_var(&sum, build::add(parameter(&sum), parameter(&i))),
        ],
    );
    let e = build::block(
        vec![i, sum],
        vec![build::loop_(body, Some(brk), Some(cont))],
    );
    assert_eq!(eval(&e).unwrap(), Value::Int32(1 + 2 + 4 + 5));
}

#[test]
fn goto_into_a_nested_block_skips_earlier_statements() {
    let x = Var::new("x", Type::Int32);
    let resume = LabelTarget::new("resume", Type::Void);
    let e = build::block(
        vec![x.clone()],
        vec![
            build::goto(&resume),
            build::block(
                Vec::new(),
                vec![
                    build::assign_var(&x, const_i32(100)),
                    build::label(&resume),
                    build::assign_var(&x, build::add(parameter(&x), const_i32(1))),
                ],
            ),
            parameter(&x),
        ],
    );
    assert_eq!(eval(&e).unwrap(), Value::Int32(1));
}

#[test]
fn goto_into_a_conditional_branch() {
    let resume = LabelTarget::new("resume", Type::Void);
    let log = Var::new("log", Type::String);
    let append = |s: &str| build::assign_var(&log, build::add(parameter(&log), const_str(s)));
    let e = build::block(
        vec![log.clone()],
        vec![
            build::assign_var(&log, const_str("")),
            build::goto(&resume),
            build::if_then_else(
                const_bool(true),
                append("a"),
                build::block(Vec::new(), vec![build::label(&resume), append("b")]),
            ),
            append("c"),
            parameter(&log),
        ],
    );
    assert_eq!(eval(&e).unwrap(), Value::string("bc"));
}

#[test]
fn goto_back_into_a_loop_body() {
    // A jump from outside the loop enters its body and the loop keeps running.
    let n = Var::new("n", Type::Int32);
    let inside = LabelTarget::new("inside", Type::Void);
    let brk = LabelTarget::new("break", Type::Void);
    let body = build::block(
        Vec::new(),
        vec![
            build::assign_var(&n, build::add(parameter(&n), const_i32(10))),
            build::label(&inside),
            build::assign_var(&n, build::add(parameter(&n), const_i32(1))),
            build::if_then(
                build::binary(BinaryOp::GreaterThan, parameter(&n), const_i32(20)),
                build::goto(&brk),
            ),
        ],
    );
    let e = build::block(
        vec![n.clone()],
        vec![
            build::goto(&inside),
            build::loop_(body, Some(brk), None),
            parameter(&n),
        ],
    );
    // 1, then 12, then 23
    assert_eq!(eval(&e).unwrap(), Value::Int32(23));
}

#[test]
fn label_value_is_the_goto_value() {
    let done = LabelTarget::new("done", Type::Int32);
    let e = build::block(
        Vec::new(),
        vec![
            build::goto_value(&done, const_i32(9)),
            build::label_with_default(&done, const_i32(1)),
        ],
    );
    assert_eq!(eval(&e).unwrap(), Value::Int32(9));
}

#[test]
fn unknown_label_escapes() {
    let nowhere = LabelTarget::new("nowhere", Type::Void);
    assert_eq!(
        eval(&build::goto(&nowhere)),
        Err(EvalError::EscapingGoto {
            label: "nowhere".into()
        })
    );
}

#[test]
fn switch_selects_a_case() {
    let e = build::switch(
        const_i32(2),
        vec![
            build::switch_case(vec![const_i32(1)], const_str("one")),
            build::switch_case(vec![const_i32(2), const_i32(3)], const_str("few")),
        ],
        Some(const_str("many")),
        Type::String,
    );
    assert_eq!(eval(&e).unwrap(), Value::string("few"));
}

// Exceptions

fn log_var() -> Var {
    Var::new("log", Type::String)
}

fn append(log: &Var, s: &str) -> csx_ir::Expr {
    build::assign_var(log, build::add(parameter(log), const_str(s)))
}

#[test]
fn catch_then_finally() {
    let log = log_var();
    let e = build::block(
        vec![log.clone()],
        vec![
            build::assign_var(&log, const_str("")),
            build::try_catch_finally(
                build::block_typed(
                    Vec::new(),
                    vec![
                        append(&log, "t"),
                        build::throw(build::new_(runtime::invalid_cast_exception(), Vec::new())),
                        append(&log, "x"),
                    ],
                    Type::Void,
                ),
                vec![build::catch(
                    runtime::exception(),
                    None,
                    None,
                    append(&log, "c"),
                )],
                Some(append(&log, "f")),
            ),
            parameter(&log),
        ],
    );
    assert_eq!(eval(&e).unwrap(), Value::string("tcf"));
}

#[test]
fn handlers_match_by_type_and_filter() {
    let e_var = Var::new("e", runtime::exception());
    let message = build::member_named(Some(parameter(&e_var)), "Message").unwrap();
    let e = build::try_catch_finally(
        build::block_typed(
            Vec::new(),
            vec![
                build::throw(build::new_(
                    runtime::invalid_operation_exception(),
                    vec![const_str("boom")],
                )),
                const_str("unreached"),
            ],
            Type::String,
        ),
        vec![
            build::catch(runtime::invalid_cast_exception(), None, None, const_str("cast")),
            build::catch(
                runtime::exception(),
                Some(e_var.clone()),
                Some(build::equal(message.clone(), const_str("other"))),
                const_str("filtered"),
            ),
            build::catch(runtime::exception(), Some(e_var), None, message),
        ],
        None,
    );
    assert_eq!(eval(&e).unwrap(), Value::string("boom"));
}

#[test]
fn finally_runs_when_the_exception_escapes() {
    let log = log_var();
    let inner = build::try_finally(
        build::throw(build::new_(runtime::exception(), Vec::new())),
        append(&log, "f"),
    );
    let outer = build::try_catch_finally(
        inner,
        vec![build::catch(runtime::exception(), None, None, append(&log, "c"))],
        None,
    );
    let e = build::block(
        vec![log.clone()],
        vec![build::assign_var(&log, const_str("")), outer, parameter(&log)],
    );
    assert_eq!(eval(&e).unwrap(), Value::string("fc"));
}

#[test]
fn rethrow_propagates_the_handled_exception() {
    let inner = build::try_catch_finally(
        build::throw(build::new_(runtime::invalid_cast_exception(), Vec::new())),
        vec![build::catch(runtime::exception(), None, None, build::rethrow())],
        None,
    );
    assert_eq!(thrown_type(eval(&inner)), runtime::invalid_cast_exception());
}

#[test]
fn rethrow_outside_a_handler_is_an_error() {
    assert_eq!(eval(&build::rethrow()), Err(EvalError::RethrowOutsideHandler));
}

#[test]
fn throwing_null_raises_null_reference() {
    let e = build::throw(build::null(runtime::exception()));
    assert_eq!(thrown_type(eval(&e)), runtime::null_reference_exception());
}

#[test]
fn unreduced_nodes_are_rejected() {
    let lock = csx_ir::Expr::new(
        csx_ir::ExprKind::Lock {
            object: build::null(Type::Object),
            body: build::empty(),
        },
        Type::Void,
    );
    assert_eq!(
        eval(&lock),
        Err(EvalError::UnreducedNode { kind: "Lock" })
    );
}

// Calls and closures

#[test]
fn closures_share_captured_variables() {
    let counter = Var::new("counter", Type::Int32);
    let bump = build::lambda(
        None,
        Vec::new(),
        build::assign_var(&counter, build::add(parameter(&counter), const_i32(1))),
    );
    let f = Var::new("f", bump.ty().clone());
    let e = build::block(
        vec![counter.clone(), f.clone()],
        vec![
            build::assign_var(&f, bump),
            build::invoke(parameter(&f), Vec::new()),
            build::invoke(parameter(&f), Vec::new()),
            parameter(&counter),
        ],
    );
    assert_eq!(eval(&e).unwrap(), Value::Int32(2));
}

#[test]
fn lambda_parameters_bind_arguments() {
    let x = Var::new("x", Type::Int32);
    let double = build::lambda(None, vec![x.clone()], build::add(parameter(&x), parameter(&x)));
    let e = build::invoke(double, vec![const_i32(21)]);
    assert_eq!(eval(&e).unwrap(), Value::Int32(42));
}

#[test]
fn host_methods_write_out_parameters() {
    let method = MethodInfo::new(
        None,
        MethodDef::new(
            "TryParse",
            vec![
                ParamInfo::new("s", Type::String),
                ParamInfo::new("result", Type::by_ref(Type::Int32)),
            ],
            Type::Bool,
            MethodBody::Host("try_parse".into()),
        )
        .into_static(),
    );
    let mut interp = Interpreter::new();
    interp.register_host("try_parse", |args| {
        let parsed = match &args[0] {
            Value::String(s) => s.parse::<i32>().ok(),
            _ => None,
        };
        args[1] = Value::Int32(parsed.unwrap_or(0));
        Ok(Value::Bool(parsed.is_some()))
    });
    let n = Var::new("n", Type::Int32);
    let e = build::block(
        vec![n.clone()],
        vec![
            build::call_static(method, vec![const_str("17"), parameter(&n)]),
            parameter(&n),
        ],
    );
    assert_eq!(interp.eval(&e).unwrap(), Value::Int32(17));
}

#[test]
fn missing_host_is_reported() {
    let method = MethodInfo::new(
        None,
        MethodDef::new("F", Vec::new(), Type::Int32, MethodBody::Host("f".into())).into_static(),
    );
    assert_eq!(
        eval(&build::call_static(method, Vec::new())),
        Err(EvalError::UnknownHost { key: "f".into() })
    );
}

#[test]
fn objects_store_fields() {
    let point = TypeBuilder::class("Point")
        .property("X", Type::Int32)
        .property("Y", Type::Int32)
        .build();
    let p = Var::new("p", point.clone());
    let y = build::member_named(Some(parameter(&p)), "Y").unwrap();
    let e = build::block(
        vec![p.clone()],
        vec![
            build::assign_var(&p, build::new_(point, vec![const_i32(1), const_i32(2)])),
            build::assign(y.clone(), build::add(y.clone(), const_i32(5))),
            y,
        ],
    );
    assert_eq!(eval(&e).unwrap(), Value::Int32(7));
}

#[test]
fn member_on_null_throws() {
    let point = TypeBuilder::class("Point").property("X", Type::Int32).build();
    let x = build::member_named(Some(build::null(point)), "X").unwrap();
    assert_eq!(thrown_type(eval(&x)), runtime::null_reference_exception());
}

// Runtime intrinsics

#[test]
fn ituple_access() {
    let tuple = build::new_tuple(vec![const_i32(1), const_str("b")]);
    let boxed = build::convert(tuple, runtime::ituple());
    let length = build::member(Some(boxed.clone()), runtime::ituple_length().unwrap());
    assert_eq!(eval(&length).unwrap(), Value::Int32(2));
    let item = build::call(boxed.clone(), runtime::ituple_get_item().unwrap(), vec![const_i32(1)]);
    assert_eq!(eval(&item).unwrap(), Value::string("b"));
    let out = build::call(boxed, runtime::ituple_get_item().unwrap(), vec![const_i32(2)]);
    assert_eq!(thrown_type(eval(&out)), runtime::index_out_of_range_exception());
}

#[test]
fn collection_index_and_slice() {
    let array_ty = Type::array(Type::Int32);
    let array = build::new_array(Type::Int32, (1..=5).map(const_i32).collect());
    let last = build::invoke(
        runtime::index_access(&array_ty).unwrap(),
        vec![
            array.clone(),
            build::constant(ConstValue::Index(IndexValue::from_end(1))),
        ],
    );
    assert_eq!(eval(&last).unwrap(), Value::Int32(5));

    let middle = build::invoke(
        runtime::range_access(&array_ty).unwrap(),
        vec![
            array.clone(),
            build::constant(ConstValue::Range(RangeValue {
                start: IndexValue::from_start(1),
                end: IndexValue::from_end(1),
            })),
        ],
    );
    assert_eq!(
        format!("{:?}", eval(&middle).unwrap()),
        "[2, 3, 4]"
    );

    let length = build::invoke(runtime::length_access(&Type::String).unwrap(), vec![const_str("héllo")]);
    assert_eq!(eval(&length).unwrap(), Value::Int32(5));
}

#[test]
fn completed_task_results() {
    let task = build::call_static(runtime::task_from_result(&Type::Int32), vec![const_i32(3)]);
    let awaiter_ty = runtime::task_awaiter(Some(Type::Int32));
    let get_awaiter = task.ty().find_method("GetAwaiter", 0).unwrap();
    let awaiter = build::call(task, get_awaiter, Vec::new());
    let result = build::call(
        awaiter.clone(),
        awaiter_ty.find_method("GetResult", 0).unwrap(),
        Vec::new(),
    );
    assert_eq!(eval(&result).unwrap(), Value::Int32(3));
    let done = build::member_named(Some(awaiter), "IsCompleted").unwrap();
    assert_eq!(eval(&done).unwrap(), Value::Bool(true));
}

#[test]
fn parked_state_machines_resume_when_the_task_completes() {
    let builder_kind = AsyncBuilder::Task;
    let t = Var::new("t", runtime::task_of(Type::Int32));
    let builder = Var::new("builder", builder_kind.builder_type());
    let seen = Var::new("seen", Type::Int32);
    let awaiter_ty = runtime::task_awaiter(Some(Type::Int32));
    let awaiter = build::call(
        parameter(&t),
        t.ty().find_method("GetAwaiter", 0).unwrap(),
        Vec::new(),
    );
    let move_next = build::lambda(
        None,
        Vec::new(),
        build::assign_var(
            &seen,
            build::call(
                awaiter.clone(),
                awaiter_ty.find_method("GetResult", 0).unwrap(),
                Vec::new(),
            ),
        ),
    );
    let sm = build::call_static(runtime::create_state_machine(), vec![move_next]);
    let program = build::block_typed(
        vec![builder.clone()],
        vec![
            build::assign_var(&builder, build::call_static(builder_kind.create(), Vec::new())),
            build::call(
                parameter(&builder),
                builder_kind.await_on_completed(),
                vec![awaiter, sm],
            ),
        ],
        Type::Void,
    );

    let env = Environment::root();
    let task = pending_task(Some(Type::Int32));
    env.declare(&t, task.clone());
    env.declare(&seen, Value::Int32(0));

    let mut interp = Interpreter::new();
    interp.eval_in(&program, &env).unwrap();
    let seen_now = || env.lookup(&seen).map(|c| c.borrow().clone());
    assert_eq!(seen_now(), Some(Value::Int32(0)));

    interp.complete_task(&task, Value::Int32(8)).unwrap();
    interp.run_pending().unwrap();
    assert_eq!(seen_now(), Some(Value::Int32(8)));
}

#[test]
fn monitor_depth_tracks_enter_and_exit() {
    let lock = build::new_(TypeBuilder::class("Gate").build(), Vec::new());
    let mut interp = Interpreter::new();
    interp
        .eval(&build::call_static(runtime::monitor_enter(), vec![lock.clone()]))
        .unwrap();
    assert_eq!(interp.monitor_depth(), 1);
    interp
        .eval(&build::call_static(runtime::monitor_exit(), vec![lock.clone()]))
        .unwrap();
    assert_eq!(interp.monitor_depth(), 0);
    let extra = interp.eval(&build::call_static(runtime::monitor_exit(), vec![lock]));
    assert_eq!(thrown_type(extra), runtime::invalid_operation_exception());
}
