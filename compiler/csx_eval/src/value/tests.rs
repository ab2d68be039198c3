use csx_ir::TypeBuilder;
use pretty_assertions::assert_eq;

use super::*;
use crate::tasks::{completed_task, pending_task};

fn point() -> Type {
    TypeBuilder::structure("Point")
        .field("X", Type::Int32)
        .field("Y", Type::Int32)
        .build()
}

#[test]
fn defaults_follow_the_type() {
    assert_eq!(Value::default_of(&Type::Int32), Value::Int32(0));
    assert_eq!(Value::default_of(&Type::String), Value::Null);
    assert_eq!(Value::default_of(&Type::nullable(Type::Int32)), Value::Null);
    assert_eq!(
        Value::default_of(&Type::tuple(vec![Type::Bool, Type::String])),
        Value::tuple(vec![Value::Bool(false), Value::Null])
    );
    assert!(matches!(Value::default_of(&point()), Value::Object(_)));
}

#[test]
fn mixed_numeric_equality_widens() {
    assert!(Value::Int32(3).equals(&Value::Int64(3)));
    assert!(Value::Int32(3).equals(&Value::Float64(3.0)));
    assert!(!Value::Float64(f64::NAN).equals(&Value::Float64(f64::NAN)));
    assert!(!Value::Null.equals(&Value::Int32(0)));
    assert!(Value::Null.equals(&Value::Null));
}

#[test]
fn reference_values_compare_by_identity() {
    let a = Value::object(point(), vec![("X", Value::Int32(1))]);
    let b = Value::object(point(), vec![("X", Value::Int32(1))]);
    assert!(a.equals(&a.clone()));
    assert!(!a.equals(&b));
    assert_eq!(Value::string("hi"), Value::string("hi"));
}

#[test]
fn tuples_are_ituple_instances() {
    let t = Value::tuple(vec![Value::Int32(1), Value::Null]);
    assert!(t.is_instance_of(&runtime::ituple()));
    assert!(t.is_instance_of(&Type::Object));
    assert!(t.is_instance_of(&Type::tuple(vec![Type::Int32, Type::String])));
    assert!(!t.is_instance_of(&Type::tuple(vec![Type::Int32, Type::Int32])));
    assert!(!t.is_instance_of(&Type::tuple(vec![Type::Int32])));
}

#[test]
fn null_is_an_instance_of_nothing() {
    assert!(!Value::Null.is_instance_of(&Type::Object));
    assert!(!Value::Null.is_instance_of(&Type::nullable(Type::Int32)));
}

#[test]
fn nullable_accepts_underlying_values() {
    assert!(Value::Int32(4).is_instance_of(&Type::nullable(Type::Int32)));
    assert!(!Value::Int64(4).is_instance_of(&Type::nullable(Type::Int32)));
}

#[test]
fn exceptions_follow_the_base_chain() {
    let e = Value::exception(runtime::switch_expression_exception(), "no arm");
    assert!(e.is_instance_of(&runtime::invalid_operation_exception()));
    assert!(e.is_instance_of(&runtime::exception()));
    assert!(!e.is_instance_of(&runtime::invalid_cast_exception()));
}

#[test]
fn tasks_report_their_types() {
    let done = completed_task(Some(Type::Int32), Value::Int32(1));
    assert_eq!(done.runtime_type(), Some(runtime::task_of(Type::Int32)));
    assert!(done.is_instance_of(&runtime::task()));
    let pending = pending_task(None);
    assert_eq!(pending.runtime_type(), Some(runtime::task()));
}

#[test]
fn debug_output_is_compact() {
    assert_eq!(format!("{:?}", Value::Int64(5)), "5L");
    assert_eq!(
        format!("{:?}", Value::tuple(vec![Value::Int32(1), Value::string("a")])),
        "(1, \"a\")"
    );
    assert_eq!(
        format!("{:?}", Value::Index(IndexValue::from_end(1))),
        "^1"
    );
}
