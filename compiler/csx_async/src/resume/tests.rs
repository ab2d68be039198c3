#![allow(
    clippy::unwrap_used,
    reason = "test code uses unwrap for concise assertions"
)]

use csx_ir::build::{self, const_i32, parameter};
use csx_ir::{runtime, AsyncBuilder, Expr, ExprKind, Type, Var};
use pretty_assertions::assert_eq;

use super::{rewrite, Machine};
use crate::factories::await_expr;
use crate::spill::spill;
use crate::structure::reduce_structure;

fn ready(value: i32) -> Expr {
    let task = build::call_static(runtime::task_from_result(&Type::Int32), vec![const_i32(value)]);
    await_expr(task).unwrap()
}

fn prepared(body: &Expr) -> Expr {
    spill(&reduce_structure(body).unwrap())
}

fn machine() -> Machine {
    Machine::new(AsyncBuilder::TaskOf(Type::Int32))
}

#[test]
fn bodies_without_suspend_points_pass_through() {
    let body = build::add(const_i32(1), const_i32(2));
    let rewritten = rewrite(&body, &machine());
    assert!(rewritten.body.ptr_eq(&body));
    assert!(rewritten.dispatch.is_none());
    assert!(rewritten.hoisted.is_empty());
    assert_eq!(rewritten.states, 0);
}

#[test]
fn states_are_numbered_in_order() {
    let body = prepared(&build::block(Vec::new(), vec![ready(1), ready(2), ready(3)]));
    let rewritten = rewrite(&body, &machine());
    assert_eq!(rewritten.states, 3);
    let Some(dispatch) = &rewritten.dispatch else {
        panic!("expected a dispatch switch");
    };
    let ExprKind::Switch { cases, .. } = dispatch.kind() else {
        panic!("expected a switch, got {dispatch:?}");
    };
    let tests: Vec<_> = cases
        .iter()
        .map(|c| c.tests[0].as_constant().cloned())
        .collect();
    assert_eq!(
        tests,
        (0..3)
            .map(|i| Some(csx_ir::ConstValue::Int32(i)))
            .collect::<Vec<_>>()
    );
}

#[test]
fn suspending_blocks_give_up_their_variables() {
    let x = Var::new("x", Type::Int32);
    let quiet = Var::new("quiet", Type::Int32);
    let body = build::block(
        vec![x.clone()],
        vec![
            build::assign_var(&x, ready(1)),
            build::block(vec![quiet.clone()], vec![build::assign_var(&quiet, const_i32(2))]),
            parameter(&x),
        ],
    );
    let rewritten = rewrite(&prepared(&body), &machine());
    assert!(rewritten.hoisted.contains(&x));
    assert!(!rewritten.hoisted.contains(&quiet));
    let ExprKind::Block { variables, .. } = rewritten.body.kind() else {
        panic!("expected a block");
    };
    assert!(variables.is_empty());
}

#[test]
fn finally_is_skipped_while_suspending() {
    let body = build::try_finally(ready(1), build::empty());
    let rewritten = rewrite(&prepared(&body), &machine());
    let ExprKind::Block { exprs, .. } = rewritten.body.kind() else {
        panic!("expected the entry label and the try");
    };
    assert!(matches!(exprs[0].kind(), ExprKind::Label { .. }));
    let ExprKind::Try {
        finally: Some(finally),
        ..
    } = exprs[1].kind()
    else {
        panic!("expected a try with finally");
    };
    assert!(matches!(finally.kind(), ExprKind::Conditional { .. }));
}
