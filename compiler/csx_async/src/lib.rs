//! Async lowering for csx expression trees.
//!
//! [`async_lambda`] wraps a body that may contain [`await_expr`] nodes;
//! [`lower_async_lambda`] turns it into an ordinary lambda that creates a
//! method builder, drives a resumable state machine through it and returns
//! the builder's task. `lock` nodes built with [`lock_expr`] reduce to a
//! monitor `try`/`finally`.
//!
//! # Lowering passes
//!
//! 1. `check`: reject `await` in catch filters, handlers, `finally` and
//!    lock bodies
//! 2. `structure`: reduce extension nodes; `await` becomes a suspend point
//! 3. `shadow`: rename redeclared variables so hoisting cannot merge them
//! 4. `spill`: move suspend points out of expression operands
//! 5. `resume`: suspension, resume labels, dispatch and hoisting
//! 6. `percolate`: push the result assignment into the tail
//!
//! `lower` wraps the result in the outer exception handler and the builder
//! protocol.

mod check;
mod factories;
mod lower;
mod percolate;
mod resume;
mod shadow;
mod spill;
mod structure;

pub use factories::{async_lambda, await_expr, await_with, builder_for, lock_expr};
pub use lower::{lower_async_lambda, reduce_node};
