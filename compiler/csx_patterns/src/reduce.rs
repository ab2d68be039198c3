//! Pattern reduction.
//!
//! [`reduce`] turns a validated pattern and a subject expression into a
//! `bool` expression tree built only from core nodes. The subject is
//! evaluated exactly once: anything other than a constant, default or
//! parameter is first stored in a temporary.
//!
//! # Shape of composite reductions
//!
//! Object, `ITuple` and list patterns need a sequence of tests with
//! temporaries in between. They reduce to
//!
//! ```text
//! {
//!     if (!test1) goto exit(false);
//!     tmp = ...;
//!     if (!test2) goto exit(false);
//!     exit: true
//! }
//! ```
//!
//! A test that is statically `true` adds nothing. A test that is a block of
//! side effects ending in `true` (a variable designation) is spliced into
//! the sequence without the `if`.

use csx_ir::build::{self, const_bool, parameter};
use csx_ir::traverse::{is_pure, map_children_infallible};
use csx_ir::{
    ensure_sufficient_stack, runtime, BinaryOp, BinaryPatternOp, ConstValue, Expr, ExprKind, IndexValue,
    LabelTarget, MemberInfo, MethodInfo, Pattern, PatternKind, PatternType,
    PositionalSubpattern, PropertySubpattern, RangeValue, RelationalOp, SubpatternMember, Type,
    Var,
};
use rustc_hash::FxHashMap;
use tracing::{debug, trace};

use crate::factories::deconstruct_outputs;

/// Reduce `pattern` applied to `subject` to a `bool` expression.
pub fn reduce(pattern: &Pattern, subject: &Expr) -> Expr {
    debug!(kind = ?pattern.pattern_type(), input = %pattern.input_type(), "reducing pattern");
    ensure_sufficient_stack(|| with_pure_subject(subject, |s| reduce_pure(pattern, s)))
}

/// Run `f` on a subject that may be read more than once.
fn with_pure_subject(subject: &Expr, f: impl FnOnce(&Expr) -> Expr) -> Expr {
    if is_pure(subject) {
        return f(subject);
    }
    let temp = Var::new("subject", subject.ty().clone());
    let store = build::assign_var(&temp, subject.clone());
    let body = f(&parameter(&temp));
    let mut variables = vec![temp];
    let mut exprs = vec![store];
    match body.kind() {
        ExprKind::Block {
            variables: inner,
            exprs: rest,
        } => {
            variables.extend(inner.iter().cloned());
            exprs.extend(rest.iter().cloned());
        }
        _ => exprs.push(body),
    }
    build::block_typed(variables, exprs, Type::Bool)
}

fn reduce_pure(pattern: &Pattern, s: &Expr) -> Expr {
    let input = pattern.input_type();
    let narrowed = pattern.narrowed_type();
    trace!(kind = ?pattern.pattern_type(), "reduce");
    match pattern.kind() {
        PatternKind::Constant { value } => constant(value, input, narrowed, s),
        PatternKind::Discard => const_bool(true),
        PatternKind::Type => type_check(s, input, narrowed).unwrap_or_else(|| const_bool(true)),
        PatternKind::Relational { op, value } => {
            let value = build::constant_typed(value.clone(), narrowed.clone());
            narrowed_test(s, input, narrowed, |operand| {
                build::binary(relational_op(*op), operand, value)
            })
        }
        PatternKind::Binary { op, left, right } => match op {
            BinaryPatternOp::And => {
                let narrowed_subject = build::convert(s.clone(), left.narrowed_type().clone());
                build::and_also(reduce(left, s), reduce(right, &narrowed_subject))
            }
            BinaryPatternOp::Or => build::or_else(reduce(left, s), reduce(right, s)),
        },
        PatternKind::Not { negated } => build::not(reduce(negated, s)),
        PatternKind::Declaration { variable } => {
            let test = type_check(s, input, narrowed);
            match (test, variable) {
                (test, Some(variable)) => {
                    let bind = designate(variable, s);
                    match test {
                        Some(test) => build::and_also(test, bind),
                        None => bind,
                    }
                }
                (Some(test), None) => test,
                (None, None) => const_bool(true),
            }
        }
        PatternKind::Var { variable } => match variable {
            Some(variable) => designate(variable, s),
            None => const_bool(true),
        },
        PatternKind::Recursive {
            deconstruct,
            positional,
            properties,
            variable,
        } => recursive(
            pattern,
            deconstruct.as_ref(),
            positional,
            properties,
            variable.as_ref(),
            s,
        ),
        PatternKind::ITuple {
            get_length,
            get_item,
            positional,
        } => ituple(pattern, get_length, get_item, positional, s),
        PatternKind::List {
            length_access,
            indexer_access,
            patterns,
            variable,
        } => list(
            pattern,
            length_access,
            indexer_access,
            patterns,
            variable.as_ref(),
            s,
        ),
        PatternKind::Slice {
            indexer_access,
            pattern: sub,
        } => match (indexer_access, sub) {
            (Some(access), Some(sub)) if sub.pattern_type() != PatternType::Discard => {
                let all = build::constant(ConstValue::Range(RangeValue::all()));
                let slice = apply(access, &[s.clone(), all]);
                reduce(sub, &slice)
            }
            _ => const_bool(true),
        },
    }
}

// ── Leaf helpers ────────────────────────────────────────────────────

fn relational_op(op: RelationalOp) -> BinaryOp {
    match op {
        RelationalOp::LessThan => BinaryOp::LessThan,
        RelationalOp::LessThanOrEqual => BinaryOp::LessThanOrEqual,
        RelationalOp::GreaterThan => BinaryOp::GreaterThan,
        RelationalOp::GreaterThanOrEqual => BinaryOp::GreaterThanOrEqual,
    }
}

/// Whether the subject passes a `narrowed` type test without checking:
/// every value of `input` is a non-null `narrowed`.
fn statically_matches(input: &Type, narrowed: &Type) -> bool {
    narrowed.is_assignable_from(input) && !input.can_be_null()
}

/// `s is narrowed`, or `None` when the test always succeeds.
fn type_check(s: &Expr, input: &Type, narrowed: &Type) -> Option<Expr> {
    (!statically_matches(input, narrowed)).then(|| build::type_is(s.clone(), narrowed.clone()))
}

/// `test(s)` when the pattern does not narrow, else
/// `s is narrowed && test((narrowed)s)`.
fn narrowed_test(s: &Expr, input: &Type, narrowed: &Type, test: impl FnOnce(Expr) -> Expr) -> Expr {
    if input == narrowed {
        test(s.clone())
    } else {
        build::and_also(
            build::type_is(s.clone(), narrowed.clone()),
            test(build::convert(s.clone(), narrowed.clone())),
        )
    }
}

fn constant(value: &ConstValue, input: &Type, narrowed: &Type, s: &Expr) -> Expr {
    if value.is_null() {
        return build::equal(
            build::convert(s.clone(), Type::Object),
            build::null(Type::Object),
        );
    }
    if value.is_nan() {
        let is_nan = runtime::is_nan(narrowed);
        return narrowed_test(s, input, narrowed, |operand| {
            build::call_static(is_nan, vec![operand])
        });
    }
    let value = build::constant_typed(value.clone(), narrowed.clone());
    narrowed_test(s, input, narrowed, |operand| build::equal(operand, value))
}

/// `{ variable = s; true }`
fn designate(variable: &Var, s: &Expr) -> Expr {
    build::block_typed(
        Vec::new(),
        vec![
            build::assign_var(variable, build::convert(s.clone(), variable.ty().clone())),
            const_bool(true),
        ],
        Type::Bool,
    )
}

fn int(n: usize) -> Expr {
    build::const_i32(i32::try_from(n).unwrap_or(i32::MAX))
}

fn index(n: usize) -> u32 {
    u32::try_from(n).unwrap_or(u32::MAX)
}

/// Apply an accessor lambda to pure arguments, inlining its body.
fn apply(access: &Expr, args: &[Expr]) -> Expr {
    match access.kind() {
        ExprKind::Lambda(data) if data.params.len() == args.len() => {
            let substitutions: FxHashMap<Var, Expr> =
                data.params.iter().cloned().zip(args.iter().cloned()).collect();
            substitute(&data.body, &substitutions)
        }
        _ => build::invoke(access.clone(), args.to_vec()),
    }
}

fn substitute(expr: &Expr, substitutions: &FxHashMap<Var, Expr>) -> Expr {
    ensure_sufficient_stack(|| match expr.kind() {
        ExprKind::Parameter(var) => substitutions
            .get(var)
            .cloned()
            .unwrap_or_else(|| expr.clone()),
        _ => map_children_infallible(expr, &mut |child| substitute(child, substitutions)),
    })
}

// ── Test sequences ──────────────────────────────────────────────────

/// A block of tests that jumps to `exit` with `false` on the first
/// failure.
struct Sequence {
    exit: LabelTarget,
    variables: Vec<Var>,
    exprs: Vec<Expr>,
}

impl Sequence {
    fn new() -> Self {
        Sequence {
            exit: LabelTarget::new("match_exit", Type::Bool),
            variables: Vec::new(),
            exprs: Vec::new(),
        }
    }

    fn declare(&mut self, name: &str, ty: Type) -> Var {
        let var = Var::new(name, ty);
        self.variables.push(var.clone());
        var
    }

    /// `value` itself if it is pure, else a temporary holding it.
    fn pure(&mut self, name: &str, value: Expr) -> Expr {
        if is_pure(&value) {
            return value;
        }
        let temp = self.declare(name, value.ty().clone());
        self.exprs.push(build::assign_var(&temp, value));
        parameter(&temp)
    }

    fn fail_if(&mut self, failed: Expr) {
        self.exprs.push(build::if_then(
            failed,
            build::goto_value(&self.exit, const_bool(false)),
        ));
    }

    fn fail_if_not(&mut self, test: Expr) {
        if is_true(&test) {
            return;
        }
        if let ExprKind::Block { variables, exprs } = test.kind() {
            if let Some((last, effects)) = exprs.split_last() {
                if is_true(last) {
                    self.variables.extend(variables.iter().cloned());
                    self.exprs.extend(effects.iter().cloned());
                    return;
                }
            }
        }
        self.fail_if(build::not(test));
    }

    /// Read a member path from `object`, failing on a `null` intermediate
    /// receiver.
    fn member_path(&mut self, member: &SubpatternMember, object: &Expr) -> Expr {
        let receiver = match &member.receiver {
            None => object.clone(),
            Some(inner) => {
                let value = self.member_path(inner, object);
                if inner.ty().can_be_null() {
                    let value = self.pure("receiver", value);
                    self.fail_if(is_null(&value));
                    value
                } else {
                    value
                }
            }
        };
        build::member(Some(receiver), member.member.clone())
    }

    fn finish(mut self) -> Expr {
        if self.exprs.is_empty() && self.variables.is_empty() {
            return const_bool(true);
        }
        self.exprs
            .push(build::label_with_default(&self.exit, const_bool(true)));
        build::block_typed(self.variables, self.exprs, Type::Bool)
    }
}

fn is_true(expr: &Expr) -> bool {
    matches!(expr.as_constant(), Some(ConstValue::Bool(true)))
}

fn is_null(expr: &Expr) -> Expr {
    build::equal(
        build::convert(expr.clone(), Type::Object),
        build::null(Type::Object),
    )
}

/// Check the subject against the narrowed type and return it converted.
fn narrowed_subject(seq: &mut Sequence, pattern: &Pattern, s: &Expr, name: &str) -> Expr {
    let narrowed = pattern.narrowed_type();
    if let Some(test) = type_check(s, pattern.input_type(), narrowed) {
        seq.fail_if_not(test);
    }
    seq.pure(name, build::convert(s.clone(), narrowed.clone()))
}

fn bind_variable(seq: &mut Sequence, variable: Option<&Var>, object: &Expr) {
    if let Some(variable) = variable {
        seq.exprs.push(build::assign_var(
            variable,
            build::convert(object.clone(), variable.ty().clone()),
        ));
    }
}

// ── Composite patterns ──────────────────────────────────────────────

fn recursive(
    pattern: &Pattern,
    deconstruct: Option<&MethodInfo>,
    positional: &[PositionalSubpattern],
    properties: &[PropertySubpattern],
    variable: Option<&Var>,
    s: &Expr,
) -> Expr {
    let mut seq = Sequence::new();
    let narrowed = pattern.narrowed_type();
    let object = narrowed_subject(&mut seq, pattern, s, "value");

    match deconstruct {
        Some(method) => {
            let outputs = deconstruct_outputs(method, narrowed).unwrap_or_default();
            let outs: Vec<Var> = outputs
                .iter()
                .map(|(name, ty)| seq.declare(name, ty.clone()))
                .collect();
            let mut args: Vec<Expr> = outs.iter().map(parameter).collect();
            let call = if method.is_static() {
                args.insert(0, object.clone());
                build::call_static(method.clone(), args)
            } else {
                build::call(object.clone(), method.clone(), args)
            };
            seq.exprs.push(call);
            for (i, sub) in positional.iter().enumerate() {
                let slot = sub
                    .parameter
                    .as_ref()
                    .and_then(|key| outputs.iter().position(|(name, _)| *name == key.name))
                    .unwrap_or(i);
                if let Some(out) = outs.get(slot) {
                    seq.fail_if_not(reduce(&sub.pattern, &parameter(out)));
                }
            }
        }
        None => {
            let elements = narrowed.tuple_elements().unwrap_or_default();
            for (i, sub) in positional.iter().enumerate() {
                let slot = sub.field.map_or(i, |f| f.index);
                if let Some(ty) = elements.get(slot) {
                    let item = MemberInfo::tuple_item(narrowed.clone(), slot, ty.clone());
                    let read = build::member(Some(object.clone()), item);
                    seq.fail_if_not(reduce(&sub.pattern, &read));
                }
            }
        }
    }

    for prop in properties {
        let read = seq.member_path(&prop.member, &object);
        seq.fail_if_not(reduce(&prop.pattern, &read));
    }

    bind_variable(&mut seq, variable, &object);
    seq.finish()
}

fn ituple(
    pattern: &Pattern,
    get_length: &MemberInfo,
    get_item: &MethodInfo,
    positional: &[PositionalSubpattern],
    s: &Expr,
) -> Expr {
    let mut seq = Sequence::new();
    let tuple = narrowed_subject(&mut seq, pattern, s, "tuple");
    let length = build::member(Some(tuple.clone()), get_length.clone());
    seq.fail_if(build::not_equal(length, int(positional.len())));
    for (i, sub) in positional.iter().enumerate() {
        let item = build::call(tuple.clone(), get_item.clone(), vec![int(i)]);
        seq.fail_if_not(reduce(&sub.pattern, &item));
    }
    seq.finish()
}

fn list(
    pattern: &Pattern,
    length_access: &Expr,
    indexer_access: &Expr,
    patterns: &[Pattern],
    variable: Option<&Var>,
    s: &Expr,
) -> Expr {
    let mut seq = Sequence::new();
    let collection = narrowed_subject(&mut seq, pattern, s, "list");

    let count = patterns.len();
    let slice_at = patterns
        .iter()
        .position(|p| p.pattern_type() == PatternType::Slice);
    let length = apply(length_access, std::slice::from_ref(&collection));
    match slice_at {
        None => seq.fail_if(build::not_equal(length, int(count))),
        Some(_) => {
            let length = seq.pure("length", length);
            seq.fail_if(build::less_than(length, int(count - 1)));
        }
    }

    for (i, sub) in patterns.iter().enumerate() {
        if slice_at == Some(i) {
            if let PatternKind::Slice {
                indexer_access: Some(access),
                pattern: Some(inner),
            } = sub.kind()
            {
                if inner.pattern_type() != PatternType::Discard {
                    let range = RangeValue {
                        start: IndexValue::from_start(index(i)),
                        end: IndexValue::from_end(index(count - 1 - i)),
                    };
                    let slice = apply(
                        access,
                        &[collection.clone(), build::constant(ConstValue::Range(range))],
                    );
                    seq.fail_if_not(reduce(inner, &slice));
                }
            }
            continue;
        }
        let position = match slice_at {
            Some(at) if i > at => IndexValue::from_end(index(count - i)),
            _ => IndexValue::from_start(index(i)),
        };
        let element = apply(
            indexer_access,
            &[collection.clone(), build::constant(ConstValue::Index(position))],
        );
        seq.fail_if_not(reduce(sub, &element));
    }

    bind_variable(&mut seq, variable, &collection);
    seq.finish()
}
