//! Runtime values.
//!
//! Values are single-threaded and cheap to clone: anything larger than a
//! scalar sits behind an `Rc`. Reference-typed values (objects, closures,
//! tasks, exceptions) compare by identity; data values (numbers, strings,
//! tuples, arrays) compare structurally.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;
use std::sync::Arc;

use csx_ir::{runtime, AsyncBuilder, ConstValue, IndexValue, LambdaData, RangeValue, Type};
use rustc_hash::FxHashMap;

use crate::environment::Environment;
use crate::tasks::TaskCell;

#[derive(Clone)]
pub enum Value {
    /// Result of a `void` expression.
    Unit,
    Null,
    Bool(bool),
    Char(char),
    Int32(i32),
    Int64(i64),
    Float32(f32),
    Float64(f64),
    String(Rc<str>),
    Index(IndexValue),
    Range(RangeValue),
    Tuple(Rc<[Value]>),
    Array(Rc<ArrayValue>),
    Object(Rc<ObjectValue>),
    Closure(Rc<Closure>),
    Task(Rc<TaskCell>),
    Awaiter(Rc<TaskCell>),
    Builder(Rc<BuilderValue>),
    StateMachine(Rc<Closure>),
    Exception(Rc<ExceptionValue>),
}

pub struct ArrayValue {
    pub element: Type,
    pub items: Vec<Value>,
}

/// Instance of a user class or struct. Fields not yet written read as the
/// default of their type.
pub struct ObjectValue {
    pub ty: Type,
    pub fields: RefCell<FxHashMap<Arc<str>, Value>>,
}

pub struct Closure {
    pub lambda: Arc<LambdaData>,
    pub env: Environment,
}

pub struct ExceptionValue {
    pub ty: Type,
    pub message: Rc<str>,
}

/// An async method builder and the task it completes.
pub struct BuilderValue {
    pub kind: AsyncBuilder,
    pub task: Rc<TaskCell>,
}

impl Value {
    pub fn string(s: &str) -> Value {
        Value::String(Rc::from(s))
    }

    pub fn tuple(items: Vec<Value>) -> Value {
        Value::Tuple(items.into())
    }

    pub fn array(element: Type, items: Vec<Value>) -> Value {
        Value::Array(Rc::new(ArrayValue { element, items }))
    }

    pub fn object(ty: Type, fields: Vec<(&str, Value)>) -> Value {
        let fields = fields
            .into_iter()
            .map(|(name, value)| (Arc::from(name), value))
            .collect();
        Value::Object(Rc::new(ObjectValue {
            ty,
            fields: RefCell::new(fields),
        }))
    }

    pub fn exception(ty: Type, message: &str) -> Value {
        Value::Exception(Rc::new(ExceptionValue {
            ty,
            message: Rc::from(message),
        }))
    }

    pub fn from_const(value: &ConstValue) -> Value {
        match value {
            ConstValue::Null => Value::Null,
            ConstValue::Bool(b) => Value::Bool(*b),
            ConstValue::Char(c) => Value::Char(*c),
            ConstValue::Int32(v) => Value::Int32(*v),
            ConstValue::Int64(v) => Value::Int64(*v),
            ConstValue::Float32(v) => Value::Float32(*v),
            ConstValue::Float64(v) => Value::Float64(*v),
            ConstValue::String(s) => Value::string(s),
            ConstValue::Index(i) => Value::Index(*i),
            ConstValue::Range(r) => Value::Range(*r),
        }
    }

    /// The zero value of a type.
    pub fn default_of(ty: &Type) -> Value {
        match ty {
            Type::Void => Value::Unit,
            Type::Bool => Value::Bool(false),
            Type::Char => Value::Char('\0'),
            Type::Int32 => Value::Int32(0),
            Type::Int64 => Value::Int64(0),
            Type::Float32 => Value::Float32(0.0),
            Type::Float64 => Value::Float64(0.0),
            Type::Index => Value::Index(IndexValue::from_start(0)),
            Type::Range => Value::Range(RangeValue {
                start: IndexValue::from_start(0),
                end: IndexValue::from_start(0),
            }),
            Type::Tuple(elements) => Value::tuple(elements.iter().map(Value::default_of).collect()),
            Type::Named(_) if ty.is_value_type() => Value::object(ty.clone(), Vec::new()),
            _ => Value::Null,
        }
    }

    #[inline]
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_i32(&self) -> Option<i32> {
        match self {
            Value::Int32(v) => Some(*v),
            _ => None,
        }
    }

    /// Runtime type used for type tests and casts. `None` for `null` and
    /// `void`, which have no runtime type.
    pub fn runtime_type(&self) -> Option<Type> {
        Some(match self {
            Value::Unit | Value::Null => return None,
            Value::Bool(_) => Type::Bool,
            Value::Char(_) => Type::Char,
            Value::Int32(_) => Type::Int32,
            Value::Int64(_) => Type::Int64,
            Value::Float32(_) => Type::Float32,
            Value::Float64(_) => Type::Float64,
            Value::String(_) => Type::String,
            Value::Index(_) => Type::Index,
            Value::Range(_) => Type::Range,
            Value::Tuple(items) => Type::tuple(
                items
                    .iter()
                    .map(|v| v.runtime_type().unwrap_or(Type::Object))
                    .collect(),
            ),
            Value::Array(a) => Type::array(a.element.clone()),
            Value::Object(o) => o.ty.clone(),
            Value::Closure(c) => c.lambda.func_type(),
            Value::Task(t) => t.task_type(),
            Value::Awaiter(t) => runtime::task_awaiter(t.result_type()),
            Value::Builder(b) => b.kind.builder_type(),
            Value::StateMachine(_) => runtime::async_state_machine(),
            Value::Exception(e) => e.ty.clone(),
        })
    }

    /// Whether this value is an instance of `ty`.
    pub fn is_instance_of(&self, ty: &Type) -> bool {
        if let Type::Nullable(inner) = ty {
            return self.is_instance_of(inner);
        }
        match self {
            Value::Unit | Value::Null => false,
            Value::Tuple(items) => match ty {
                Type::Object => true,
                Type::Tuple(elements) => {
                    elements.len() == items.len()
                        && items.iter().zip(elements.iter()).all(|(v, t)| {
                            (v.is_null() && t.can_be_null()) || v.is_instance_of(t)
                        })
                }
                _ => *ty == runtime::ituple(),
            },
            Value::StateMachine(_) => {
                matches!(ty, Type::Object) || *ty == runtime::async_state_machine()
            }
            _ => self
                .runtime_type()
                .is_some_and(|rt| ty.is_assignable_from(&rt)),
        }
    }

    /// Value equality as used by `==` and switch case tests.
    #[allow(clippy::float_cmp, reason = "IEEE equality is the intended semantics")]
    pub fn equals(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Unit, Value::Unit) | (Value::Null, Value::Null) => true,
            (Value::Null, _) | (_, Value::Null) => false,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Char(a), Value::Char(b)) => a == b,
            (Value::Int32(a), Value::Int32(b)) => a == b,
            (Value::Int64(a), Value::Int64(b)) => a == b,
            (Value::Float32(a), Value::Float32(b)) => a == b,
            (Value::Float64(a), Value::Float64(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Index(a), Value::Index(b)) => a == b,
            (Value::Range(a), Value::Range(b)) => a == b,
            (Value::Tuple(a), Value::Tuple(b)) => {
                a.len() == b.len() && a.iter().zip(b.iter()).all(|(x, y)| x.equals(y))
            }
            (Value::Array(a), Value::Array(b)) => Rc::ptr_eq(a, b),
            (Value::Object(a), Value::Object(b)) => Rc::ptr_eq(a, b),
            (Value::Closure(a), Value::Closure(b))
            | (Value::StateMachine(a), Value::StateMachine(b)) => Rc::ptr_eq(a, b),
            (Value::Task(a), Value::Task(b)) | (Value::Awaiter(a), Value::Awaiter(b)) => {
                Rc::ptr_eq(a, b)
            }
            (Value::Builder(a), Value::Builder(b)) => Rc::ptr_eq(a, b),
            (Value::Exception(a), Value::Exception(b)) => Rc::ptr_eq(a, b),
            _ => match (self.as_f64(), other.as_f64()) {
                (Some(a), Some(b)) => a == b,
                _ => false,
            },
        }
    }

    /// Numeric value widened to `f64`, for mixed comparisons.
    #[expect(clippy::cast_precision_loss, reason = "mixed comparisons widen")]
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Char(c) => Some(f64::from(u32::from(*c))),
            Value::Int32(v) => Some(f64::from(*v)),
            Value::Int64(v) => Some(*v as f64),
            Value::Float32(v) => Some(f64::from(*v)),
            Value::Float64(v) => Some(*v),
            _ => None,
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        self.equals(other)
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Unit => f.write_str("()"),
            Value::Null => f.write_str("null"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Char(c) => write!(f, "{c:?}"),
            Value::Int32(v) => write!(f, "{v}"),
            Value::Int64(v) => write!(f, "{v}L"),
            Value::Float32(v) => write!(f, "{v}f"),
            Value::Float64(v) => write!(f, "{v}d"),
            Value::String(s) => write!(f, "{s:?}"),
            Value::Index(i) if i.from_end => write!(f, "^{}", i.value),
            Value::Index(i) => write!(f, "{}", i.value),
            Value::Range(r) => write!(f, "{:?}..{:?}", Value::Index(r.start), Value::Index(r.end)),
            Value::Tuple(items) => {
                f.write_str("(")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{item:?}")?;
                }
                f.write_str(")")
            }
            Value::Array(a) => f.debug_list().entries(a.items.iter()).finish(),
            Value::Object(o) => write!(f, "{}{{..}}", o.ty),
            Value::Closure(c) => write!(f, "<closure {}>", c.lambda.func_type()),
            Value::Task(t) => write!(f, "<{} {:?}>", t.task_type(), t.status()),
            Value::Awaiter(t) => write!(f, "<awaiter {:?}>", t.status()),
            Value::Builder(b) => write!(f, "<{}>", b.kind.builder_type()),
            Value::StateMachine(_) => f.write_str("<state machine>"),
            Value::Exception(e) => write!(f, "{}({:?})", e.ty, e.message),
        }
    }
}

#[cfg(test)]
mod tests;
