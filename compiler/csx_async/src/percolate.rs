//! Pushes the result assignment of an async body into its tail.
//!
//! `result = { a; b; c }` becomes `{ a; b; result = c }`, recursively
//! through blocks and both branches of a conditional, so the assignment
//! sits next to the value it stores.

use csx_ir::build;
use csx_ir::{ensure_sufficient_stack, Expr, ExprKind, Var};

pub(crate) fn assign_result(result: &Var, expr: &Expr) -> Expr {
    ensure_sufficient_stack(|| match expr.kind() {
        ExprKind::Block { variables, exprs } => match exprs.split_last() {
            Some((last, init)) if last.ty() == expr.ty() => {
                let mut exprs = init.to_vec();
                exprs.push(assign_result(result, last));
                build::block_typed(variables.clone(), exprs, result.ty().clone())
            }
            _ => store(result, expr),
        },
        ExprKind::Conditional {
            test,
            if_true,
            if_false,
        } if if_true.ty() == expr.ty() && if_false.ty() == expr.ty() => build::condition(
            test.clone(),
            assign_result(result, if_true),
            assign_result(result, if_false),
            result.ty().clone(),
        ),
        _ => store(result, expr),
    })
}

fn store(result: &Var, expr: &Expr) -> Expr {
    build::assign_var(result, build::convert(expr.clone(), result.ty().clone()))
}

#[cfg(test)]
mod tests {
    #![allow(
        clippy::unwrap_used,
        reason = "test code uses unwrap for concise assertions"
    )]

    use csx_eval::{Interpreter, Value};
    use csx_ir::build::{self, const_bool, const_i32, parameter};
    use csx_ir::{ExprKind, LabelTarget, Type, Var};
    use pretty_assertions::assert_eq;

    use super::assign_result;

    fn run(result: &Var, body: &csx_ir::Expr) -> Value {
        let program = build::block(
            vec![result.clone()],
            vec![assign_result(result, body), parameter(result)],
        );
        Interpreter::new().eval(&program).unwrap()
    }

    #[test]
    fn assignment_moves_into_the_last_statement() {
        let result = Var::new("result", Type::Int32);
        let body = build::block(Vec::new(), vec![const_i32(1), const_i32(2)]);
        let percolated = assign_result(&result, &body);
        let ExprKind::Block { exprs, .. } = percolated.kind() else {
            panic!("expected a block, got {percolated:?}");
        };
        assert!(matches!(exprs[1].kind(), ExprKind::Assign { .. }));
        assert_eq!(run(&result, &body), Value::Int32(2));
    }

    #[test]
    fn both_branches_assign() {
        let result = Var::new("result", Type::Int32);
        let body = build::condition(const_bool(false), const_i32(1), const_i32(2), Type::Int32);
        assert!(matches!(
            assign_result(&result, &body).kind(),
            ExprKind::Conditional { .. }
        ));
        assert_eq!(run(&result, &body), Value::Int32(2));
    }

    #[test]
    fn labels_receive_the_assignment_whole() {
        let result = Var::new("result", Type::Int32);
        let end = LabelTarget::new("end", Type::Int32);
        let body = build::block(
            Vec::new(),
            vec![
                build::goto_value(&end, const_i32(5)),
                build::label_with_default(&end, const_i32(0)),
            ],
        );
        assert_eq!(run(&result, &body), Value::Int32(5));
    }

    #[test]
    fn widening_converts_at_the_tail() {
        let result = Var::new("result", Type::Object);
        let body = build::block(Vec::new(), vec![const_i32(3)]);
        assert_eq!(run(&result, &body), Value::Int32(3));
    }
}
