//! Unary and binary operators, and conversions.
//!
//! Operators on nullable operands are lifted: arithmetic with a `null`
//! operand yields `null`, ordering comparisons with a `null` operand are
//! `false`, and equality treats two `null`s as equal.

use std::cmp::Ordering;

use csx_ir::{runtime, BinaryOp, Expr, Type, TypeBuilder, UnaryOp};

use super::Interpreter;
use crate::environment::Environment;
use crate::errors::{type_mismatch, EvalError, Flow, Outcome};
use crate::value::Value;

fn divide_by_zero_exception() -> Type {
    TypeBuilder::class("DivideByZeroException")
        .base(runtime::exception())
        .build()
}

/// Width class used to promote mixed numeric operands.
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord)]
enum Rank {
    Int32,
    Int64,
    Float32,
    Float64,
}

fn rank(value: &Value) -> Option<Rank> {
    match value {
        Value::Char(_) | Value::Int32(_) => Some(Rank::Int32),
        Value::Int64(_) => Some(Rank::Int64),
        Value::Float32(_) => Some(Rank::Float32),
        Value::Float64(_) => Some(Rank::Float64),
        _ => None,
    }
}

fn as_i64(value: &Value) -> Option<i64> {
    match value {
        Value::Char(c) => Some(i64::from(u32::from(*c))),
        Value::Int32(v) => Some(i64::from(*v)),
        Value::Int64(v) => Some(*v),
        _ => None,
    }
}

/// Numeric and `char` conversions, `None` if either side is not numeric.
#[expect(
    clippy::cast_possible_truncation,
    clippy::cast_precision_loss,
    clippy::cast_sign_loss,
    reason = "unchecked numeric conversions truncate"
)]
fn numeric_cast(value: &Value, to: &Type) -> Option<Value> {
    let float = value.as_f64()?;
    let int = as_i64(value);
    Some(match to {
        Type::Int32 => Value::Int32(int.map_or(float as i32, |v| v as i32)),
        Type::Int64 => Value::Int64(int.unwrap_or(float as i64)),
        Type::Float32 => Value::Float32(int.map_or(float as f32, |v| v as f32)),
        Type::Float64 => Value::Float64(int.map_or(float, |v| v as f64)),
        Type::Char => Value::Char(char::from_u32(int.unwrap_or(float as i64) as u32 & 0xFFFF)?),
        _ => return None,
    })
}

fn is_numeric_like(ty: &Type) -> bool {
    ty.is_numeric() || matches!(ty, Type::Char)
}

/// Text of a value in string concatenation.
fn concat_text(value: &Value) -> String {
    match value {
        Value::Null | Value::Unit => String::new(),
        Value::String(s) => s.to_string(),
        Value::Char(c) => c.to_string(),
        Value::Bool(true) => "True".to_owned(),
        Value::Bool(false) => "False".to_owned(),
        Value::Int32(v) => v.to_string(),
        Value::Int64(v) => v.to_string(),
        Value::Float32(v) => v.to_string(),
        Value::Float64(v) => v.to_string(),
        other => format!("{other:?}"),
    }
}

impl Interpreter {
    pub(super) fn unary(&mut self, op: UnaryOp, value: Value, from: &Type, to: &Type) -> Outcome {
        match op {
            UnaryOp::Not => match value {
                Value::Null => Ok(Value::Null),
                Value::Bool(b) => Ok(Value::Bool(!b)),
                Value::Int32(v) => Ok(Value::Int32(!v)),
                Value::Int64(v) => Ok(Value::Int64(!v)),
                other => Err(type_mismatch("a bool or integer", &other).into()),
            },
            UnaryOp::Negate => match value {
                Value::Null => Ok(Value::Null),
                Value::Int32(v) => Ok(Value::Int32(v.wrapping_neg())),
                Value::Int64(v) => Ok(Value::Int64(v.wrapping_neg())),
                Value::Float32(v) => Ok(Value::Float32(-v)),
                Value::Float64(v) => Ok(Value::Float64(-v)),
                other => Err(type_mismatch("a number", &other).into()),
            },
            UnaryOp::Convert => self.convert(value, from, to),
        }
    }

    pub(crate) fn convert(&mut self, value: Value, from: &Type, to: &Type) -> Outcome {
        if to.is_void() {
            return Ok(Value::Unit);
        }
        if value.is_null() {
            if to.can_be_null() {
                return Ok(Value::Null);
            }
            return Err(if from.is_nullable() {
                self.raise(
                    runtime::invalid_operation_exception(),
                    "nullable object must have a value",
                )
            } else {
                self.raise(
                    runtime::null_reference_exception(),
                    &format!("cannot convert null to `{to}`"),
                )
            });
        }
        let target = to.non_nullable();
        if is_numeric_like(from.non_nullable()) && is_numeric_like(target) {
            if let Some(converted) = numeric_cast(&value, target) {
                return Ok(converted);
            }
        }
        if value.is_instance_of(to) {
            return Ok(value);
        }
        Err(self.raise(
            runtime::invalid_cast_exception(),
            &format!("unable to cast `{value:?}` to `{to}`"),
        ))
    }

    pub(super) fn binary(
        &mut self,
        op: BinaryOp,
        left: &Expr,
        right: &Expr,
        env: &Environment,
    ) -> Outcome {
        match op {
            BinaryOp::AndAlso => {
                let value = self.eval_bool(left, env)? && self.eval_bool(right, env)?;
                return Ok(Value::Bool(value));
            }
            BinaryOp::OrElse => {
                let value = self.eval_bool(left, env)? || self.eval_bool(right, env)?;
                return Ok(Value::Bool(value));
            }
            _ => {}
        }
        let left = self.eval_expr(left, env)?;
        let right = self.eval_expr(right, env)?;
        match op {
            BinaryOp::Equal => Ok(Value::Bool(left.equals(&right))),
            BinaryOp::NotEqual => Ok(Value::Bool(!left.equals(&right))),
            BinaryOp::LessThan
            | BinaryOp::LessThanOrEqual
            | BinaryOp::GreaterThan
            | BinaryOp::GreaterThanOrEqual => {
                let Some(ordering) = compare(&left, &right)? else {
                    return Ok(Value::Bool(false));
                };
                Ok(Value::Bool(match op {
                    BinaryOp::LessThan => ordering == Ordering::Less,
                    BinaryOp::LessThanOrEqual => ordering != Ordering::Greater,
                    BinaryOp::GreaterThan => ordering == Ordering::Greater,
                    _ => ordering != Ordering::Less,
                }))
            }
            _ => self.arithmetic(op, &left, &right),
        }
    }

    fn arithmetic(&mut self, op: BinaryOp, left: &Value, right: &Value) -> Outcome {
        if op == BinaryOp::Add
            && (matches!(left, Value::String(_)) || matches!(right, Value::String(_)))
        {
            let text = concat_text(left) + &concat_text(right);
            return Ok(Value::string(&text));
        }
        if left.is_null() || right.is_null() {
            return Ok(Value::Null);
        }
        let (Some(l), Some(r)) = (rank(left), rank(right)) else {
            let culprit = if rank(left).is_none() { left } else { right };
            return Err(type_mismatch("a number", culprit).into());
        };
        match l.max(r) {
            Rank::Int32 | Rank::Int64 => {
                let (Some(a), Some(b)) = (as_i64(left), as_i64(right)) else {
                    return Err(type_mismatch("an integer", left).into());
                };
                let result = self.integer_op(op, a, b)?;
                if l.max(r) == Rank::Int32 {
                    #[expect(clippy::cast_possible_truncation, reason = "int32 arithmetic wraps")]
                    let narrow = result as i32;
                    Ok(Value::Int32(narrow))
                } else {
                    Ok(Value::Int64(result))
                }
            }
            Rank::Float32 | Rank::Float64 => {
                let (Some(a), Some(b)) = (left.as_f64(), right.as_f64()) else {
                    return Err(type_mismatch("a number", left).into());
                };
                let result = float_op(op, a, b)?;
                if l.max(r) == Rank::Float32 {
                    #[expect(clippy::cast_possible_truncation, reason = "float32 arithmetic")]
                    let narrow = result as f32;
                    Ok(Value::Float32(narrow))
                } else {
                    Ok(Value::Float64(result))
                }
            }
        }
    }

    fn integer_op(&mut self, op: BinaryOp, a: i64, b: i64) -> Outcome<i64> {
        match op {
            BinaryOp::Add => Ok(a.wrapping_add(b)),
            BinaryOp::Subtract => Ok(a.wrapping_sub(b)),
            BinaryOp::Multiply => Ok(a.wrapping_mul(b)),
            BinaryOp::Divide | BinaryOp::Modulo if b == 0 => Err(self.raise(
                divide_by_zero_exception(),
                "attempted to divide by zero",
            )),
            BinaryOp::Divide => Ok(a.wrapping_div(b)),
            BinaryOp::Modulo => Ok(a.wrapping_rem(b)),
            _ => Err(Flow::Error(EvalError::TypeMismatch {
                expected: "an arithmetic operator",
                found: format!("{op:?}"),
            })),
        }
    }
}

fn float_op(op: BinaryOp, a: f64, b: f64) -> Outcome<f64> {
    match op {
        BinaryOp::Add => Ok(a + b),
        BinaryOp::Subtract => Ok(a - b),
        BinaryOp::Multiply => Ok(a * b),
        BinaryOp::Divide => Ok(a / b),
        BinaryOp::Modulo => Ok(a % b),
        _ => Err(Flow::Error(EvalError::TypeMismatch {
            expected: "an arithmetic operator",
            found: format!("{op:?}"),
        })),
    }
}

/// Ordering of two operands. `None` when either is `null` or a NaN is
/// involved.
fn compare(left: &Value, right: &Value) -> Outcome<Option<Ordering>> {
    if left.is_null() || right.is_null() {
        return Ok(None);
    }
    let ordering = match (left, right) {
        (Value::Int32(a), Value::Int32(b)) => Some(a.cmp(b)),
        (Value::Int64(a), Value::Int64(b)) => Some(a.cmp(b)),
        (Value::Char(a), Value::Char(b)) => Some(a.cmp(b)),
        _ => match (left.as_f64(), right.as_f64()) {
            (Some(a), Some(b)) => a.partial_cmp(&b),
            (None, _) => return Err(type_mismatch("a comparable value", left).into()),
            (_, None) => return Err(type_mismatch("a comparable value", right).into()),
        },
    };
    Ok(ordering)
}
