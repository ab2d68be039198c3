//! Constructors for substrate nodes.
//!
//! These compute the node type from their operands and do not validate
//! beyond that; extension nodes have their own checked factories in the
//! lowering crates.

use std::sync::Arc;

use crate::expr::{
    BinaryOp, CatchBlock, ConstValue, Expr, ExprKind, GotoKind, LabelTarget, LambdaData,
    SwitchCase, UnaryOp, Var,
};
use crate::types::{MemberInfo, MethodInfo, Type};

// Leaves

pub fn constant(value: ConstValue) -> Expr {
    let ty = value.natural_type();
    Expr::new(ExprKind::Constant(value), ty)
}

/// A constant with an explicit static type, e.g. `null` typed as `string`
/// or `3` typed as `object`.
pub fn constant_typed(value: ConstValue, ty: Type) -> Expr {
    Expr::new(ExprKind::Constant(value), ty)
}

pub fn const_i32(value: i32) -> Expr {
    constant(ConstValue::Int32(value))
}

pub fn const_bool(value: bool) -> Expr {
    constant(ConstValue::Bool(value))
}

pub fn const_str(value: &str) -> Expr {
    constant(ConstValue::String(Arc::from(value)))
}

pub fn null(ty: Type) -> Expr {
    constant_typed(ConstValue::Null, ty)
}

pub fn default(ty: Type) -> Expr {
    Expr::new(ExprKind::Default, ty)
}

pub fn empty() -> Expr {
    default(Type::Void)
}

pub fn parameter(var: &Var) -> Expr {
    Expr::new(ExprKind::Parameter(var.clone()), var.ty().clone())
}

// Operators

pub fn not(operand: Expr) -> Expr {
    let ty = operand.ty().clone();
    Expr::new(
        ExprKind::Unary {
            op: UnaryOp::Not,
            operand,
        },
        ty,
    )
}

pub fn negate(operand: Expr) -> Expr {
    let ty = operand.ty().clone();
    Expr::new(
        ExprKind::Unary {
            op: UnaryOp::Negate,
            operand,
        },
        ty,
    )
}

/// Convert `operand` to `ty`; returns `operand` itself when it already has
/// that type.
pub fn convert(operand: Expr, ty: Type) -> Expr {
    if *operand.ty() == ty {
        return operand;
    }
    Expr::new(
        ExprKind::Unary {
            op: UnaryOp::Convert,
            operand,
        },
        ty,
    )
}

pub fn binary(op: BinaryOp, left: Expr, right: Expr) -> Expr {
    let ty = if op.is_comparison() || op.is_short_circuit() {
        Type::Bool
    } else {
        left.ty().clone()
    };
    Expr::new(ExprKind::Binary { op, left, right }, ty)
}

pub fn equal(left: Expr, right: Expr) -> Expr {
    binary(BinaryOp::Equal, left, right)
}

pub fn not_equal(left: Expr, right: Expr) -> Expr {
    binary(BinaryOp::NotEqual, left, right)
}

pub fn less_than(left: Expr, right: Expr) -> Expr {
    binary(BinaryOp::LessThan, left, right)
}

pub fn greater_than_or_equal(left: Expr, right: Expr) -> Expr {
    binary(BinaryOp::GreaterThanOrEqual, left, right)
}

pub fn add(left: Expr, right: Expr) -> Expr {
    binary(BinaryOp::Add, left, right)
}

pub fn and_also(left: Expr, right: Expr) -> Expr {
    binary(BinaryOp::AndAlso, left, right)
}

pub fn or_else(left: Expr, right: Expr) -> Expr {
    binary(BinaryOp::OrElse, left, right)
}

pub fn assign(target: Expr, value: Expr) -> Expr {
    let ty = target.ty().clone();
    Expr::new(ExprKind::Assign { target, value }, ty)
}

pub fn assign_var(var: &Var, value: Expr) -> Expr {
    assign(parameter(var), value)
}

pub fn type_is(operand: Expr, ty: Type) -> Expr {
    Expr::new(ExprKind::TypeIs { operand, ty }, Type::Bool)
}

// Control flow

pub fn condition(test: Expr, if_true: Expr, if_false: Expr, ty: Type) -> Expr {
    Expr::new(
        ExprKind::Conditional {
            test,
            if_true,
            if_false,
        },
        ty,
    )
}

pub fn if_then(test: Expr, if_true: Expr) -> Expr {
    condition(test, if_true, empty(), Type::Void)
}

pub fn if_then_else(test: Expr, if_true: Expr, if_false: Expr) -> Expr {
    let ty = if_true.ty().clone();
    condition(test, if_true, if_false, ty)
}

/// A block typed by its last expression.
pub fn block(variables: Vec<Var>, exprs: Vec<Expr>) -> Expr {
    let ty = exprs.last().map_or(Type::Void, |e| e.ty().clone());
    block_typed(variables, exprs, ty)
}

/// A block with an explicit type. A `void` block discards the value of its
/// last expression.
pub fn block_typed(variables: Vec<Var>, exprs: Vec<Expr>, ty: Type) -> Expr {
    let exprs = if exprs.is_empty() { vec![empty()] } else { exprs };
    Expr::new(ExprKind::Block { variables, exprs }, ty)
}

pub fn label(target: &LabelTarget) -> Expr {
    Expr::new(
        ExprKind::Label {
            target: target.clone(),
            default: None,
        },
        target.ty().clone(),
    )
}

pub fn label_with_default(target: &LabelTarget, default: Expr) -> Expr {
    Expr::new(
        ExprKind::Label {
            target: target.clone(),
            default: Some(default),
        },
        target.ty().clone(),
    )
}

pub fn goto(target: &LabelTarget) -> Expr {
    goto_kind(GotoKind::Goto, target, None)
}

pub fn goto_value(target: &LabelTarget, value: Expr) -> Expr {
    goto_kind(GotoKind::Goto, target, Some(value))
}

pub fn goto_kind(kind: GotoKind, target: &LabelTarget, value: Option<Expr>) -> Expr {
    Expr::new(
        ExprKind::Goto {
            kind,
            target: target.clone(),
            value,
        },
        Type::Void,
    )
}

pub fn loop_(body: Expr, break_label: Option<LabelTarget>, continue_label: Option<LabelTarget>) -> Expr {
    let ty = break_label
        .as_ref()
        .map_or(Type::Void, |l| l.ty().clone());
    Expr::new(
        ExprKind::Loop {
            body,
            break_label,
            continue_label,
        },
        ty,
    )
}

pub fn switch_case(tests: Vec<Expr>, body: Expr) -> SwitchCase {
    SwitchCase { tests, body }
}

pub fn switch(value: Expr, cases: Vec<SwitchCase>, default: Option<Expr>, ty: Type) -> Expr {
    Expr::new(
        ExprKind::Switch {
            value,
            cases,
            default,
        },
        ty,
    )
}

pub fn catch(test: Type, variable: Option<Var>, filter: Option<Expr>, body: Expr) -> CatchBlock {
    CatchBlock {
        test,
        variable,
        filter,
        body,
    }
}

pub fn try_catch_finally(body: Expr, handlers: Vec<CatchBlock>, finally: Option<Expr>) -> Expr {
    let ty = body.ty().clone();
    Expr::new(
        ExprKind::Try {
            body,
            handlers,
            finally,
        },
        ty,
    )
}

pub fn try_finally(body: Expr, finally: Expr) -> Expr {
    try_catch_finally(body, Vec::new(), Some(finally))
}

pub fn throw(value: Expr) -> Expr {
    Expr::new(ExprKind::Throw { value: Some(value) }, Type::Void)
}

pub fn rethrow() -> Expr {
    Expr::new(ExprKind::Throw { value: None }, Type::Void)
}

// Members and calls

pub fn call(object: Expr, method: MethodInfo, args: Vec<Expr>) -> Expr {
    let ty = method.return_type().clone();
    Expr::new(
        ExprKind::Call {
            object: Some(object),
            method,
            args,
        },
        ty,
    )
}

pub fn call_static(method: MethodInfo, args: Vec<Expr>) -> Expr {
    let ty = method.return_type().clone();
    Expr::new(
        ExprKind::Call {
            object: None,
            method,
            args,
        },
        ty,
    )
}

pub fn member(object: Option<Expr>, member: MemberInfo) -> Expr {
    let ty = member.ty.clone();
    Expr::new(ExprKind::Member { object, member }, ty)
}

/// `object.name`, resolved against the object's static type.
pub fn member_named(object: Option<Expr>, name: &str) -> Option<Expr> {
    let info = object.as_ref()?.ty().find_member(name)?;
    Some(member(object, info))
}

pub fn new_(ty: Type, args: Vec<Expr>) -> Expr {
    Expr::new(ExprKind::New { args }, ty)
}

pub fn new_tuple(items: Vec<Expr>) -> Expr {
    let ty = Type::tuple(items.iter().map(|e| e.ty().clone()).collect());
    new_(ty, items)
}

pub fn new_array(element: Type, items: Vec<Expr>) -> Expr {
    Expr::new(ExprKind::NewArray { items }, Type::array(element))
}

// Lambdas

pub fn lambda(name: Option<&str>, params: Vec<Var>, body: Expr) -> Expr {
    let return_type = body.ty().clone();
    lambda_typed(name, params, body, return_type)
}

pub fn lambda_typed(name: Option<&str>, params: Vec<Var>, body: Expr, return_type: Type) -> Expr {
    let data = LambdaData {
        name: name.map(Arc::from),
        params,
        body,
        return_type,
    };
    let ty = data.func_type();
    Expr::new(ExprKind::Lambda(Arc::new(data)), ty)
}

pub fn invoke(target: Expr, args: Vec<Expr>) -> Expr {
    let ty = target
        .ty()
        .func_signature()
        .map_or(Type::Void, |(_, ret)| ret.clone());
    Expr::new(ExprKind::Invoke { target, args }, ty)
}
