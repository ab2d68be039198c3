//! Pattern matching for csx expression trees.
//!
//! Patterns are built through the checked constructors in [`factories`],
//! embedded in trees with [`is_pattern`] and [`switch_expr`], and lowered to
//! plain boolean trees by [`reduce`] / [`reduce_node`].
//!
//! # Type information
//!
//! Every pattern has an input type (what it tests) and a narrowed type
//! (what is known after a match). Construction enforces that the pieces of a
//! composite pattern agree on these types:
//!
//! - `and` feeds the left narrowed type into the right input type
//! - `or` branches share their input type; the result narrows to the least
//!   specific branch type when one covers the others
//! - object, list and `ITuple` subpatterns receive exactly the type of the
//!   member, element or out parameter they test

pub mod factories;
mod narrowing;
mod nodes;
mod reduce;
mod rewrite;
mod validate;

pub use nodes::{is_pattern, reduce_node, switch_arm, switch_expr};
pub use reduce::reduce;
pub use rewrite::PatternExt;
