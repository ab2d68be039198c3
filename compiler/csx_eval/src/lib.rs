//! Reference evaluator for reduced csx expression trees.
//!
//! Lowerings are checked by running them: a tree is reduced by
//! `csx_patterns` or `csx_async` and the result is evaluated here. The
//! evaluator only understands substrate nodes; extension nodes fail with
//! [`EvalError::UnreducedNode`].
//!
//! The async runtime is cooperative and single-threaded. Awaiting an
//! unfinished task parks the state machine on the task;
//! [`Interpreter::complete_task`] makes it runnable and
//! [`Interpreter::run_pending`] resumes it.

mod environment;
mod errors;
mod interpreter;
mod tasks;
mod value;

pub use environment::{Cell, Environment};
pub use errors::{EvalError, EvalResult};
pub use interpreter::{HostFn, Interpreter};
pub use tasks::{completed_task, pending_task, TaskCell, TaskStatus};
pub use value::{ArrayValue, BuilderValue, Closure, ExceptionValue, ObjectValue, Value};
