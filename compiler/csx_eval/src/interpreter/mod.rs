//! The tree-walking interpreter.
//!
//! Evaluation is split by concern:
//!
//! - `mod.rs`: public API, node dispatch, top-level error mapping
//! - `control.rs`: blocks, labels and gotos, loops, switch, try/catch/finally
//! - `operators.rs`: unary and binary operators, conversions
//! - `calls.rs`: calls, members, construction, closures, intrinsics
//!
//! Extension nodes are rejected: reduce a tree before evaluating it.

mod calls;
mod control;
mod operators;

use std::collections::VecDeque;
use std::rc::Rc;
use std::sync::Arc;

use csx_ir::{ensure_sufficient_stack, runtime, Expr, ExprKind, Type, Var};
use rustc_hash::FxHashMap;
use tracing::{debug, trace};

use crate::environment::Environment;
use crate::errors::{label_name, type_mismatch, unhandled, EvalError, EvalResult, Flow, Outcome};
use crate::tasks::TaskStatus;
use crate::value::{Closure, Value};

/// A host-supplied method body. Receives the receiver (for instance
/// methods) followed by the arguments; writes to out-parameter slots are
/// copied back to the caller's variables. `Err` throws the given exception.
pub type HostFn = Rc<dyn Fn(&mut [Value]) -> Result<Value, Value>>;

pub struct Interpreter {
    hosts: FxHashMap<Arc<str>, HostFn>,
    /// State machines ready to resume.
    run_queue: VecDeque<Value>,
    /// Exceptions being handled, innermost last, for `throw;`.
    handling: Vec<Value>,
    monitor_depth: i32,
    /// Exceptions passed to a void builder's `SetException`.
    unobserved: Vec<Value>,
}

impl Default for Interpreter {
    fn default() -> Self {
        Self::new()
    }
}

impl Interpreter {
    pub fn new() -> Self {
        Interpreter {
            hosts: FxHashMap::default(),
            run_queue: VecDeque::new(),
            handling: Vec::new(),
            monitor_depth: 0,
            unobserved: Vec::new(),
        }
    }

    /// Register the body of every method and member declared with
    /// `MethodBody::Host(key)`.
    pub fn register_host<F>(&mut self, key: &str, f: F)
    where
        F: Fn(&mut [Value]) -> Result<Value, Value> + 'static,
    {
        self.hosts.insert(Arc::from(key), Rc::new(f));
    }

    /// Evaluate a closed expression.
    pub fn eval(&mut self, expr: &Expr) -> EvalResult {
        self.eval_in(expr, &Environment::root())
    }

    /// Evaluate an expression in an environment that binds its free
    /// variables.
    pub fn eval_in(&mut self, expr: &Expr, env: &Environment) -> EvalResult {
        let outcome = self.eval_expr(expr, env);
        top_level(outcome)
    }

    /// Call a closure value.
    pub fn invoke(&mut self, function: &Value, args: Vec<Value>) -> EvalResult {
        let outcome = match function {
            Value::Closure(closure) => self.call_closure(closure, args),
            other => Err(type_mismatch("a closure", other).into()),
        };
        top_level(outcome)
    }

    /// Complete a pending task. State machines awaiting it become runnable;
    /// they run on the next [`Interpreter::run_pending`].
    pub fn complete_task(&mut self, task: &Value, result: Value) -> EvalResult<()> {
        self.finish_task(task, TaskStatus::Completed(result))
    }

    /// Fault a pending task with an exception.
    pub fn fail_task(&mut self, task: &Value, exception: Value) -> EvalResult<()> {
        self.finish_task(task, TaskStatus::Faulted(exception))
    }

    fn finish_task(&mut self, task: &Value, status: TaskStatus) -> EvalResult<()> {
        let Value::Task(cell) = task else {
            return Err(type_mismatch("a task", task));
        };
        if let Some(waiters) = cell.finish(status) {
            debug!(waiters = waiters.len(), "task finished");
            self.run_queue.extend(waiters);
        }
        Ok(())
    }

    /// Resume every runnable state machine, including ones that become
    /// runnable while this runs.
    pub fn run_pending(&mut self) -> EvalResult<()> {
        while let Some(state_machine) = self.run_queue.pop_front() {
            trace!("resuming state machine");
            top_level(self.move_next(&state_machine))?;
        }
        Ok(())
    }

    /// Current `Monitor.Enter` nesting depth.
    pub fn monitor_depth(&self) -> i32 {
        self.monitor_depth
    }

    /// Exceptions reported by `async void` lambdas.
    pub fn unobserved_exceptions(&self) -> &[Value] {
        &self.unobserved
    }

    pub(crate) fn eval_expr(&mut self, expr: &Expr, env: &Environment) -> Outcome {
        ensure_sufficient_stack(|| self.eval_kind(expr, env))
    }

    fn eval_kind(&mut self, expr: &Expr, env: &Environment) -> Outcome {
        match expr.kind() {
            ExprKind::Constant(value) => Ok(Value::from_const(value)),
            ExprKind::Default => Ok(Value::default_of(expr.ty())),
            ExprKind::Parameter(var) => Ok(lookup(env, var)?),
            ExprKind::Unary { op, operand } => {
                let value = self.eval_expr(operand, env)?;
                self.unary(*op, value, operand.ty(), expr.ty())
            }
            ExprKind::Binary { op, left, right } => self.binary(*op, left, right, env),
            ExprKind::Assign { target, value } => self.assign(target, value, env),
            ExprKind::TypeIs { operand, ty } => {
                let value = self.eval_expr(operand, env)?;
                Ok(Value::Bool(value.is_instance_of(ty)))
            }
            ExprKind::Conditional {
                test,
                if_true,
                if_false,
            } => {
                let branch = if self.eval_bool(test, env)? {
                    if_true
                } else {
                    if_false
                };
                let value = self.eval_expr(branch, env)?;
                Ok(typed_result(value, expr.ty()))
            }
            ExprKind::Block { variables, exprs } => {
                self.block(variables, exprs, expr.ty(), env, None)
            }
            ExprKind::Label { target, default } => match default {
                Some(default) => self.eval_expr(default, env),
                None => Ok(Value::default_of(target.ty())),
            },
            ExprKind::Goto { target, value, .. } => {
                let value = match value {
                    Some(v) => self.eval_expr(v, env)?,
                    None => Value::Unit,
                };
                Err(Flow::Goto {
                    target: target.clone(),
                    value,
                })
            }
            ExprKind::Loop {
                body,
                break_label,
                continue_label,
            } => self.run_loop(
                body,
                break_label.as_ref(),
                continue_label.as_ref(),
                env,
                None,
            ),
            ExprKind::Switch {
                value,
                cases,
                default,
            } => self.switch(value, cases, default.as_ref(), expr.ty(), env, None),
            ExprKind::Try {
                body,
                handlers,
                finally,
            } => self.try_catch(body, handlers, finally.as_ref(), env),
            ExprKind::Throw { value } => self.throw(value.as_ref(), env),
            ExprKind::Call {
                object,
                method,
                args,
            } => self.call(object.as_ref(), method, args, env),
            ExprKind::Member { object, member } => self.member(object.as_ref(), member, env),
            ExprKind::New { args } => self.construct(expr.ty(), args, env),
            ExprKind::NewArray { items } => {
                let element = expr.ty().element_type().unwrap_or(Type::Object);
                let items = self.eval_all(items, env)?;
                Ok(Value::array(element, items))
            }
            ExprKind::Lambda(lambda) => Ok(Value::Closure(Rc::new(Closure {
                lambda: Arc::clone(lambda),
                env: env.clone(),
            }))),
            ExprKind::Invoke { target, args } => {
                let function = self.eval_expr(target, env)?;
                let args = self.eval_all(args, env)?;
                match &function {
                    Value::Closure(closure) => self.call_closure(closure, args),
                    Value::Null => Err(self.raise(
                        runtime::null_reference_exception(),
                        "delegate is null",
                    )),
                    other => Err(type_mismatch("a closure", other).into()),
                }
            }
            ExprKind::IsPattern { .. } => Err(unreduced("IsPattern")),
            ExprKind::SwitchExpr { .. } => Err(unreduced("SwitchExpr")),
            ExprKind::Await { .. } => Err(unreduced("Await")),
            ExprKind::AsyncLambda(_) => Err(unreduced("AsyncLambda")),
            ExprKind::Lock { .. } => Err(unreduced("Lock")),
            ExprKind::SuspendPoint { .. } => Err(unreduced("SuspendPoint")),
        }
    }

    pub(crate) fn eval_bool(&mut self, expr: &Expr, env: &Environment) -> Outcome<bool> {
        let value = self.eval_expr(expr, env)?;
        value
            .as_bool()
            .ok_or_else(|| type_mismatch("a bool", &value).into())
    }

    pub(crate) fn eval_all(&mut self, exprs: &[Expr], env: &Environment) -> Outcome<Vec<Value>> {
        exprs.iter().map(|e| self.eval_expr(e, env)).collect()
    }

    /// A runtime exception of type `ty`, ready to propagate.
    pub(crate) fn raise(&self, ty: Type, message: &str) -> Flow {
        Flow::Throw(Value::exception(ty, message))
    }
}

fn lookup(env: &Environment, var: &Var) -> EvalResult {
    env.lookup(var)
        .map(|cell| cell.borrow().clone())
        .ok_or_else(|| EvalError::UnboundVariable {
            name: var.name().unwrap_or("<anonymous>").to_owned(),
        })
}

fn unreduced(kind: &'static str) -> Flow {
    Flow::Error(EvalError::UnreducedNode { kind })
}

/// `void`-typed nodes discard the value they computed.
pub(crate) fn typed_result(value: Value, ty: &Type) -> Value {
    if ty.is_void() {
        Value::Unit
    } else {
        value
    }
}

fn top_level(outcome: Outcome) -> EvalResult {
    match outcome {
        Ok(value) => Ok(value),
        Err(Flow::Goto { target, .. }) => Err(EvalError::EscapingGoto {
            label: label_name(&target),
        }),
        Err(Flow::Throw(exception)) => Err(unhandled(&exception)),
        Err(Flow::Error(err)) => Err(err),
    }
}

#[cfg(test)]
mod tests;
