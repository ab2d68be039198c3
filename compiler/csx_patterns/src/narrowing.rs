//! Narrowed type of an `or` pattern.
//!
//! `a or b or c` narrows to the least specific of the branch narrowed types,
//! provided every branch fits inside it. When no branch type covers all the
//! others (`int or long`), the pattern does not narrow at all and keeps its
//! input type.

use csx_ir::{BinaryPatternOp, Pattern, PatternKind, Type};
use tracing::trace;

/// Narrowed type of `left or right`. Both branches share an input type.
pub(crate) fn or_narrowed_type(left: &Pattern, right: &Pattern) -> Type {
    let mut branches = Vec::new();
    flatten_or(left, &mut branches);
    flatten_or(right, &mut branches);
    match least_specific(&branches) {
        Some(ty) => ty,
        None => {
            trace!(input = %left.input_type(), "or branches have no common narrowing");
            left.input_type().clone()
        }
    }
}

/// Narrowed types of the non-`or` patterns under `pattern`, left to right.
pub(crate) fn or_leaves(pattern: &Pattern) -> Vec<&Type> {
    let mut leaves = Vec::new();
    flatten_or(pattern, &mut leaves);
    leaves
}

fn flatten_or<'p>(pattern: &'p Pattern, out: &mut Vec<&'p Type>) {
    match pattern.kind() {
        PatternKind::Binary {
            op: BinaryPatternOp::Or,
            left,
            right,
        } => {
            flatten_or(left, out);
            flatten_or(right, out);
        }
        _ => out.push(pattern.narrowed_type()),
    }
}

/// Pick the candidate no other type is wider than, then check that every
/// type is assignable to it.
pub(crate) fn least_specific(types: &[&Type]) -> Option<Type> {
    let (&first, rest) = types.split_first()?;
    let mut candidate = first;
    for &ty in rest {
        if candidate.is_more_specific_than(ty) {
            candidate = ty;
        }
    }
    types
        .iter()
        .all(|ty| candidate.is_assignable_from(ty))
        .then(|| candidate.clone())
}

#[cfg(test)]
mod tests {
    use csx_ir::{Type, TypeBuilder};

    use super::least_specific;

    fn animal() -> Type {
        TypeBuilder::class("Animal").build()
    }

    fn dog() -> Type {
        TypeBuilder::class("Dog").base(animal()).build()
    }

    fn cat() -> Type {
        TypeBuilder::class("Cat").base(animal()).build()
    }

    #[test]
    fn identical_branches() {
        assert_eq!(least_specific(&[&Type::Int32, &Type::Int32]), Some(Type::Int32));
    }

    #[test]
    fn base_class_covers_its_subclasses() {
        let (a, d, c) = (animal(), dog(), cat());
        assert_eq!(least_specific(&[&d, &a, &c]), Some(animal()));
        assert_eq!(least_specific(&[&d, &c, &a]), Some(animal()));
        assert_eq!(least_specific(&[&a, &d, &c]), Some(animal()));
    }

    #[test]
    fn unrelated_types_have_no_common_narrowing() {
        let (d, c) = (dog(), cat());
        assert_eq!(least_specific(&[&d, &c]), None);
        assert_eq!(least_specific(&[&Type::Int32, &Type::Int64]), None);
    }

    #[test]
    fn object_covers_everything() {
        let d = dog();
        assert_eq!(
            least_specific(&[&Type::String, &d, &Type::Object, &Type::Int32]),
            Some(Type::Object)
        );
    }

    #[test]
    fn partially_overlapping_chains_fall_back() {
        // Dog and Animal overlap, String is unrelated to both.
        let (a, d) = (animal(), dog());
        assert_eq!(least_specific(&[&d, &Type::String, &a]), None);
    }
}
