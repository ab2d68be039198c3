#![allow(
    clippy::unwrap_used,
    reason = "test code uses unwrap for concise assertions"
)]

use csx_ir::build::{self, parameter};
use csx_ir::{
    runtime, ConstValue, CsxError, ErrorCode, MethodBody, MethodDef, MethodInfo, ParamInfo,
    PatternInfo, PatternType, Type, TypeBuilder, Var,
};
use pretty_assertions::assert_eq;

use super::*;

fn animal() -> Type {
    TypeBuilder::class("Animal").property("Name", Type::String).build()
}

fn dog() -> Type {
    TypeBuilder::class("Dog")
        .base(animal())
        .property("Age", Type::Int32)
        .build()
}

fn cat() -> Type {
    TypeBuilder::class("Cat").base(animal()).build()
}

fn point() -> Type {
    TypeBuilder::structure("Point")
        .field("X", Type::Int32)
        .field("Y", Type::Int32)
        .method(MethodDef::new(
            "Deconstruct",
            vec![
                ParamInfo::new("x", Type::by_ref(Type::Int32)),
                ParamInfo::new("y", Type::by_ref(Type::Int32)),
            ],
            Type::Void,
            MethodBody::Host("Point.Deconstruct".into()),
        ))
        .build()
}

fn deconstruct() -> MethodInfo {
    point().find_method("Deconstruct", 2).unwrap()
}

fn int(v: i32) -> ConstValue {
    ConstValue::Int32(v)
}

fn code(result: Result<impl std::fmt::Debug, CsxError>) -> ErrorCode {
    result.unwrap_err().code()
}

// Leaves

#[test]
fn constant_narrows_to_its_own_type() {
    let p = constant(Type::Object, int(3)).unwrap();
    assert_eq!(p.info(), &PatternInfo::new(Type::Object, Type::Int32));

    let p = constant(Type::nullable(Type::Int32), int(3)).unwrap();
    assert_eq!(p.narrowed_type(), &Type::Int32);
}

#[test]
fn null_constant_keeps_the_input_type() {
    let p = constant(Type::String, ConstValue::Null).unwrap();
    assert_eq!(p.info(), &PatternInfo::identity(Type::String));
    assert_eq!(
        constant(Type::Int32, ConstValue::Null).unwrap_err(),
        CsxError::NullConstantNotAllowed { ty: Type::Int32 }
    );
}

#[test]
fn constant_must_fit_the_input() {
    assert_eq!(
        code(constant(Type::String, int(1))),
        ErrorCode::E3004
    );
    assert!(constant(Type::Float64, ConstValue::Float64(f64::NAN)).is_ok());
}

#[test]
fn pattern_types_exclude_void_and_by_ref() {
    assert_eq!(code(discard(Type::Void)), ErrorCode::E3001);
    assert_eq!(
        code(type_pattern(Type::by_ref(Type::Int32), Type::Int32)),
        ErrorCode::E3001
    );
}

#[test]
fn type_pattern_requires_a_possible_conversion() {
    assert!(type_pattern(animal(), dog()).is_ok());
    assert!(type_pattern(dog(), animal()).is_ok());
    assert!(type_pattern(Type::Object, Type::Int32).is_ok());
    assert_eq!(
        code(type_pattern(Type::String, dog())),
        ErrorCode::E3002
    );
    // Interfaces can always be tested.
    assert!(type_pattern(Type::String, runtime::ituple()).is_ok());
}

#[test]
fn relational_constants() {
    let p = less_than(Type::Object, int(5)).unwrap();
    assert_eq!(p.pattern_type(), PatternType::LessThan);
    assert_eq!(p.narrowed_type(), &Type::Int32);
    assert!(greater_than_or_equal(Type::Char, ConstValue::Char('a')).is_ok());

    assert_eq!(
        code(less_than(Type::nullable(Type::Int32), ConstValue::Null)),
        ErrorCode::E3006
    );
    assert_eq!(
        code(greater_than(Type::Float64, ConstValue::Float64(f64::NAN))),
        ErrorCode::E3006
    );
    assert_eq!(
        code(less_than_or_equal(Type::Object, ConstValue::String("a".into()))),
        ErrorCode::E3006
    );
    assert_eq!(
        code(less_than(Type::Int64, int(1))),
        ErrorCode::E3004
    );
}

#[test]
fn declaration_checks_its_variable() {
    let ok = Var::new("d", dog());
    assert!(declaration(animal(), dog(), Some(ok)).is_ok());

    // A reference-typed variable may be wider than the narrowed type.
    let wide = Var::new("a", animal());
    assert!(declaration(Type::Object, dog(), Some(wide)).is_ok());

    let boxed = Var::new("o", Type::Object);
    assert_eq!(
        declaration(Type::Object, Type::Int32, Some(boxed)).unwrap_err(),
        CsxError::VariableTypeMismatch {
            variable: Type::Object,
            narrowed: Type::Int32
        }
    );
}

#[test]
fn var_pattern_never_narrows() {
    let v = Var::new("x", Type::Int32);
    let p = var(Type::Int32, Some(v.clone())).unwrap();
    assert_eq!(p.info(), &PatternInfo::identity(Type::Int32));
    assert_eq!(p.variable(), Some(&v));
}

// Combinators

#[test]
fn and_chains_narrowing() {
    let left = type_pattern(Type::Object, Type::Int32).unwrap();
    let right = greater_than(Type::Int32, int(0)).unwrap();
    let p = and(left, right).unwrap();
    assert_eq!(p.info(), &PatternInfo::new(Type::Object, Type::Int32));
}

#[test]
fn and_rejects_a_disconnected_right_side() {
    let left = type_pattern(Type::Object, Type::String).unwrap();
    let right = greater_than(Type::Int32, int(0)).unwrap();
    assert_eq!(
        and(left, right).unwrap_err(),
        CsxError::IncompatiblePatternTypes {
            left: Type::String,
            right: Type::Int32,
            context: "and pattern",
        }
    );
}

#[test]
fn or_narrows_to_the_common_branch_type() {
    let p = or(
        type_pattern(Type::Object, dog()).unwrap(),
        type_pattern(Type::Object, animal()).unwrap(),
    )
    .unwrap();
    assert_eq!(p.narrowed_type(), &animal());

    let p = or(
        type_pattern(Type::Object, dog()).unwrap(),
        type_pattern(Type::Object, cat()).unwrap(),
    )
    .unwrap();
    assert_eq!(p.narrowed_type(), &Type::Object);
}

#[test]
fn or_over_three_disjuncts() {
    let d = || type_pattern(Type::Object, dog()).unwrap();
    let c = || type_pattern(Type::Object, cat()).unwrap();
    let a = || type_pattern(Type::Object, animal()).unwrap();

    let p = or(or(d(), c()).unwrap(), a()).unwrap();
    assert_eq!(p.narrowed_type(), &animal());

    let p = or(d(), or(c(), a()).unwrap()).unwrap();
    assert_eq!(p.narrowed_type(), &animal());

    let k = |v| constant(Type::Object, int(v)).unwrap();
    let p = or(or(k(1), k(2)).unwrap(), k(3)).unwrap();
    assert_eq!(p.narrowed_type(), &Type::Int32);

    let p = or(or(k(1), type_pattern(Type::Object, Type::String).unwrap()).unwrap(), k(3)).unwrap();
    assert_eq!(p.narrowed_type(), &Type::Object);
}

#[test]
fn or_requires_matching_inputs() {
    let left = type_pattern(Type::Object, Type::Int32).unwrap();
    let right = discard(Type::Int32).unwrap();
    assert_eq!(code(or(left, right)), ErrorCode::E3002);
}

#[test]
fn explicit_or_info_must_cover_both_branches() {
    let info = PatternInfo::new(Type::Object, dog());
    let result = binary(
        info,
        csx_ir::BinaryPatternOp::Or,
        type_pattern(Type::Object, dog()).unwrap(),
        type_pattern(Type::Object, cat()).unwrap(),
    );
    assert_eq!(code(result), ErrorCode::E3003);
}

#[test]
fn not_keeps_the_input() {
    let p = not(type_pattern(Type::Object, Type::String).unwrap());
    assert_eq!(p.info(), &PatternInfo::identity(Type::Object));
}

// Recursive patterns

#[test]
fn tuple_deconstruction() {
    let tuple = Type::tuple(vec![Type::Int32, Type::String]);
    let p = recursive(
        PatternInfo::identity(tuple.clone()),
        None,
        vec![
            positional(constant(Type::Int32, int(1)).unwrap()),
            positional(discard(Type::String).unwrap()),
        ],
        Vec::new(),
        None,
    )
    .unwrap();
    assert_eq!(p.subpatterns().len(), 2);

    let wrong_arity = recursive(
        PatternInfo::identity(tuple),
        None,
        vec![positional(discard(Type::Int32).unwrap())],
        Vec::new(),
        None,
    );
    assert_eq!(
        wrong_arity.unwrap_err(),
        CsxError::DeconstructionArityMismatch {
            expected: 2,
            found: 1
        }
    );
}

#[test]
fn tuple_fields_bind_by_name() {
    let tuple = Type::tuple(vec![Type::Int32, Type::String]);
    let build = |subs| recursive(PatternInfo::identity(tuple.clone()), None, subs, Vec::new(), None);

    assert!(build(vec![
        positional_field(discard(Type::String).unwrap(), 1),
        positional_field(discard(Type::Int32).unwrap(), 0),
    ])
    .is_ok());

    assert_eq!(
        code(build(vec![
            positional_field(discard(Type::Int32).unwrap(), 0),
            positional(discard(Type::String).unwrap()),
        ])),
        ErrorCode::E3010
    );
    assert_eq!(
        build(vec![
            positional_field(discard(Type::Int32).unwrap(), 0),
            positional_field(discard(Type::Int32).unwrap(), 0),
        ])
        .unwrap_err(),
        CsxError::DuplicateSubpatternBinding {
            key: "Item1".to_owned()
        }
    );
    assert_eq!(
        code(build(vec![
            positional_field(discard(Type::Int32).unwrap(), 0),
            positional_field(discard(Type::String).unwrap(), 5),
        ])),
        ErrorCode::E3012
    );
    assert_eq!(
        code(build(vec![
            positional_parameter(discard(Type::Int32).unwrap(), "x"),
            positional_parameter(discard(Type::String).unwrap(), "y"),
        ])),
        ErrorCode::E3013
    );
}

#[test]
fn tuple_subpattern_types_follow_the_bound_element() {
    let tuple = Type::tuple(vec![Type::Int32, Type::String]);
    let swapped = recursive(
        PatternInfo::identity(tuple),
        None,
        vec![
            positional_field(discard(Type::Int32).unwrap(), 1),
            positional_field(discard(Type::String).unwrap(), 0),
        ],
        Vec::new(),
        None,
    );
    assert_eq!(code(swapped), ErrorCode::E3003);
}

#[test]
fn positional_subpatterns_need_a_tuple_or_deconstruct() {
    let result = recursive(
        PatternInfo::new(Type::Object, animal()),
        None,
        vec![positional(discard(Type::Int32).unwrap())],
        Vec::new(),
        None,
    );
    assert_eq!(code(result), ErrorCode::E3014);
}

#[test]
fn deconstruct_method_binding() {
    let p = point();
    let ok = recursive(
        PatternInfo::new(Type::Object, p.clone()),
        Some(deconstruct()),
        vec![
            positional_parameter(constant(Type::Int32, int(0)).unwrap(), "y"),
            positional_parameter(discard(Type::Int32).unwrap(), "x"),
        ],
        Vec::new(),
        None,
    );
    assert!(ok.is_ok());

    let field_key = recursive(
        PatternInfo::identity(p.clone()),
        Some(deconstruct()),
        vec![
            positional_field(discard(Type::Int32).unwrap(), 0),
            positional_field(discard(Type::Int32).unwrap(), 1),
        ],
        Vec::new(),
        None,
    );
    assert_eq!(code(field_key), ErrorCode::E3013);

    let unknown = recursive(
        PatternInfo::identity(p),
        Some(deconstruct()),
        vec![
            positional_parameter(discard(Type::Int32).unwrap(), "x"),
            positional_parameter(discard(Type::Int32).unwrap(), "z"),
        ],
        Vec::new(),
        None,
    );
    assert_eq!(
        unknown.unwrap_err(),
        CsxError::UnknownSubpatternBinding { key: "z".to_owned() }
    );
}

#[test]
fn deconstruct_methods_must_use_out_parameters() {
    let bad = MethodInfo::new(
        Some(point()),
        MethodDef::new(
            "Deconstruct",
            vec![ParamInfo::new("x", Type::Int32)],
            Type::Void,
            MethodBody::Host("bad".into()),
        ),
    );
    let result = recursive(
        PatternInfo::identity(point()),
        Some(bad),
        vec![positional(discard(Type::Int32).unwrap())],
        Vec::new(),
        None,
    );
    assert_eq!(code(result), ErrorCode::E3014);
}

#[test]
fn static_deconstruct_takes_the_value_first() {
    let method = MethodInfo::new(
        None,
        MethodDef::new(
            "Deconstruct",
            vec![
                ParamInfo::new("value", animal()),
                ParamInfo::new("name", Type::by_ref(Type::String)),
            ],
            Type::Void,
            MethodBody::Host("Animal.Deconstruct".into()),
        )
        .into_static(),
    );
    let result = recursive(
        PatternInfo::new(Type::Object, dog()),
        Some(method),
        vec![positional(discard(Type::String).unwrap())],
        Vec::new(),
        None,
    );
    assert!(result.is_ok());
}

#[test]
fn property_paths_resolve_through_base_types() {
    let sub = property_path(&dog(), &["Name"], constant(Type::String, ConstValue::Null).unwrap()).unwrap();
    assert_eq!(sub.member.ty(), &Type::String);
    let p = recursive(
        PatternInfo::new(Type::Object, dog()),
        None,
        Vec::new(),
        vec![sub],
        None,
    );
    assert!(p.is_ok());

    assert_eq!(
        code(property_path(&dog(), &["Missing"], discard(Type::Int32).unwrap())),
        ErrorCode::E3015
    );
}

#[test]
fn property_member_must_belong_to_the_narrowed_type() {
    let age = dog().find_member("Age").unwrap();
    let result = recursive(
        PatternInfo::new(Type::Object, cat()),
        None,
        Vec::new(),
        vec![property(
            csx_ir::SubpatternMember::new(age),
            discard(Type::Int32).unwrap(),
        )],
        None,
    );
    assert_eq!(code(result), ErrorCode::E3015);
}

// ITuple, list and slice

#[test]
fn ituple_subpatterns_read_objects() {
    let p = ituple(
        Type::Object,
        vec![positional(constant(Type::Object, int(1)).unwrap())],
    )
    .unwrap();
    assert_eq!(p.narrowed_type(), &runtime::ituple());

    assert_eq!(
        code(ituple(Type::Object, vec![positional(discard(Type::Int32).unwrap())])),
        ErrorCode::E3003
    );
    assert_eq!(
        code(ituple(
            Type::Object,
            vec![positional_field(discard(Type::Object).unwrap(), 0)]
        )),
        ErrorCode::E3013
    );
}

#[test]
fn list_patterns() {
    let ints = Type::array(Type::Int32);
    let p = list(
        ints.clone(),
        vec![
            constant(Type::Int32, int(1)).unwrap(),
            slice(ints.clone(), None).unwrap(),
            discard(Type::Int32).unwrap(),
        ],
        None,
    )
    .unwrap();
    assert_eq!(p.subpatterns().len(), 3);

    assert_eq!(
        list(
            ints.clone(),
            vec![slice(ints.clone(), None).unwrap(), slice(ints.clone(), None).unwrap()],
            None,
        )
        .unwrap_err(),
        CsxError::MultipleSlicePatterns
    );
    assert_eq!(
        code(list(ints, vec![discard(Type::String).unwrap()], None)),
        ErrorCode::E3003
    );
    assert_eq!(
        code(list(Type::Int32, Vec::new(), None)),
        ErrorCode::E3016
    );
}

#[test]
fn list_accessors_are_checked() {
    let ints = Type::array(Type::Int32);
    let c = Var::new("c", ints.clone());
    let not_int = build::lambda(None, vec![c.clone()], build::const_str("n"));
    let result = list_with_access(
        PatternInfo::identity(ints.clone()),
        not_int,
        runtime::index_access(&ints).unwrap(),
        Vec::new(),
        None,
    );
    assert_eq!(code(result), ErrorCode::E3016);

    let length = build::lambda(
        None,
        vec![c.clone()],
        build::member_named(Some(parameter(&c)), "Length").unwrap(),
    );
    let result = list_with_access(
        PatternInfo::identity(ints.clone()),
        length,
        runtime::length_access(&ints).unwrap(),
        Vec::new(),
        None,
    );
    assert_eq!(code(result), ErrorCode::E3016);
}

#[test]
fn slice_subpatterns_need_a_range_indexer() {
    let ints = Type::array(Type::Int32);
    let sub = list(ints.clone(), Vec::new(), None).unwrap();
    assert!(slice(ints.clone(), Some(sub.clone())).is_ok());
    assert!(slice_with_access(ints.clone(), None, Some(discard(ints.clone()).unwrap())).is_ok());
    assert_eq!(
        code(slice_with_access(ints, None, Some(sub))),
        ErrorCode::E3016
    );
}

#[test]
fn string_slices_are_strings() {
    let sub = constant(Type::String, ConstValue::String("bc".into())).unwrap();
    let p = slice(Type::String, Some(sub)).unwrap();
    assert_eq!(p.info(), &PatternInfo::identity(Type::String));
}
