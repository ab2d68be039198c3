//! Calls, member access, assignment, construction and the runtime
//! intrinsics behind the async and pattern lowerings.

use std::rc::Rc;

use csx_ir::{
    runtime, AsyncBuilder, Expr, ExprKind, Intrinsic, MemberInfo, MemberKind, MethodBody,
    MethodInfo, Type, Var,
};
use tracing::trace;

use super::{typed_result, Interpreter};
use crate::environment::Environment;
use crate::errors::{label_name, type_mismatch, EvalError, Flow, Outcome};
use crate::tasks::{completed_task, TaskCell, TaskStatus};
use crate::value::{BuilderValue, Closure, Value};

impl Interpreter {
    // ── Calls ───────────────────────────────────────────────────────

    pub(super) fn call(
        &mut self,
        object: Option<&Expr>,
        method: &MethodInfo,
        args: &[Expr],
        env: &Environment,
    ) -> Outcome {
        let mut values = Vec::with_capacity(args.len() + 1);
        if let Some(object) = object {
            let receiver = self.eval_expr(object, env)?;
            if receiver.is_null() {
                return Err(self.raise(
                    runtime::null_reference_exception(),
                    &format!("`{}` called on null", method.name()),
                ));
            }
            values.push(receiver);
        }
        let offset = values.len();
        values.extend(self.eval_all(args, env)?);

        let result = match method.body() {
            MethodBody::Intrinsic(op) => self.intrinsic(*op, method, &values)?,
            MethodBody::Host(key) => {
                let host = self.hosts.get(key).cloned().ok_or_else(|| EvalError::UnknownHost {
                    key: key.to_string(),
                })?;
                host(values.as_mut_slice()).map_err(Flow::Throw)?
            }
            MethodBody::Stored => {
                return Err(EvalError::NoMethodBody {
                    name: method.name().to_owned(),
                }
                .into())
            }
        };

        for ((param, arg), value) in method
            .params()
            .iter()
            .zip(args)
            .zip(values.into_iter().skip(offset))
        {
            if param.is_out() {
                self.store(arg, value, env)?;
            }
        }
        Ok(typed_result(result, method.return_type()))
    }

    fn intrinsic(&mut self, op: Intrinsic, method: &MethodInfo, values: &[Value]) -> Outcome {
        trace!(?op, "intrinsic call");
        match (op, values) {
            (Intrinsic::ITupleGetItem, [Value::Tuple(items), index]) => {
                let item = index
                    .as_i32()
                    .and_then(|i| usize::try_from(i).ok())
                    .and_then(|i| items.get(i));
                match item {
                    Some(item) => Ok(item.clone()),
                    None => Err(self.raise(
                        runtime::index_out_of_range_exception(),
                        &format!("tuple index {index:?} is out of range"),
                    )),
                }
            }
            (Intrinsic::CollectionIndex, [collection, Value::Index(index)]) => {
                let item = match collection {
                    Value::Array(array) => index
                        .offset(array.items.len())
                        .and_then(|i| array.items.get(i).cloned()),
                    Value::String(s) => {
                        let chars: Vec<char> = s.chars().collect();
                        index
                            .offset(chars.len())
                            .and_then(|i| chars.get(i).copied())
                            .map(Value::Char)
                    }
                    Value::Null => {
                        return Err(self.raise(
                            runtime::null_reference_exception(),
                            "indexed a null collection",
                        ))
                    }
                    other => return Err(type_mismatch("an array or string", other).into()),
                };
                item.ok_or_else(|| {
                    self.raise(
                        runtime::index_out_of_range_exception(),
                        "index was outside the bounds of the collection",
                    )
                })
            }
            (Intrinsic::CollectionSlice, [collection, Value::Range(range)]) => {
                let len = match collection {
                    Value::Array(array) => array.items.len(),
                    Value::String(s) => s.chars().count(),
                    other => return Err(type_mismatch("an array or string", other).into()),
                };
                let bounds = range
                    .start
                    .offset(len)
                    .zip(range.end.offset(len))
                    .filter(|&(start, end)| start <= end && end <= len);
                let Some((start, end)) = bounds else {
                    return Err(self.raise(
                        runtime::index_out_of_range_exception(),
                        "range was outside the bounds of the collection",
                    ));
                };
                Ok(match collection {
                    Value::Array(array) => Value::array(
                        array.element.clone(),
                        array.items[start..end].to_vec(),
                    ),
                    Value::String(s) => {
                        let slice: String = s.chars().skip(start).take(end - start).collect();
                        Value::string(&slice)
                    }
                    _ => Value::Null,
                })
            }
            (Intrinsic::IsNaN, [value]) => Ok(Value::Bool(value.as_f64().is_some_and(f64::is_nan))),
            (Intrinsic::TaskGetAwaiter, [Value::Task(task)]) => Ok(Value::Awaiter(Rc::clone(task))),
            (Intrinsic::TaskFromResult, [value]) => {
                let result = runtime::task_result_type(method.return_type());
                Ok(completed_task(result, value.clone()))
            }
            (Intrinsic::AwaiterGetResult, [Value::Awaiter(task)]) => match task.status() {
                TaskStatus::Completed(value) => Ok(value),
                TaskStatus::Faulted(exception) => Err(Flow::Throw(exception)),
                TaskStatus::Pending => Err(self.raise(
                    runtime::invalid_operation_exception(),
                    "GetResult called before the task completed",
                )),
            },
            (Intrinsic::BuilderCreate, []) => {
                let kind = method
                    .declaring()
                    .and_then(AsyncBuilder::from_builder_type)
                    .ok_or_else(|| EvalError::TypeMismatch {
                        expected: "an async method builder",
                        found: format!("{method:?}"),
                    })?;
                let task = TaskCell::pending(kind.result_type().cloned());
                Ok(Value::Builder(Rc::new(BuilderValue { kind, task })))
            }
            (Intrinsic::BuilderStart, [Value::Builder(_), state_machine]) => {
                let state_machine = state_machine.clone();
                self.move_next(&state_machine)?;
                Ok(Value::Unit)
            }
            (
                Intrinsic::BuilderAwaitOnCompleted,
                [Value::Builder(_), Value::Awaiter(task), state_machine],
            ) => {
                if task.is_completed() {
                    self.run_queue.push_back(state_machine.clone());
                } else {
                    task.add_waiter(state_machine.clone());
                }
                Ok(Value::Unit)
            }
            (Intrinsic::BuilderSetResult, [Value::Builder(builder), rest @ ..]) => {
                let result = rest.first().cloned().unwrap_or(Value::Unit);
                let builder = Rc::clone(builder);
                self.finish_builder(&builder, TaskStatus::Completed(result))
            }
            (Intrinsic::BuilderSetException, [Value::Builder(builder), exception]) => {
                let builder = Rc::clone(builder);
                if builder.kind == AsyncBuilder::Void {
                    self.unobserved.push(exception.clone());
                }
                self.finish_builder(&builder, TaskStatus::Faulted(exception.clone()))
            }
            (Intrinsic::CreateStateMachine, [Value::Closure(closure)]) => {
                Ok(Value::StateMachine(Rc::clone(closure)))
            }
            (Intrinsic::StateMachineMoveNext, [state_machine]) => {
                let state_machine = state_machine.clone();
                self.move_next(&state_machine)?;
                Ok(Value::Unit)
            }
            (Intrinsic::MonitorEnter, [lock]) => {
                if lock.is_null() {
                    return Err(self.raise(
                        runtime::null_reference_exception(),
                        "cannot lock on null",
                    ));
                }
                self.monitor_depth += 1;
                Ok(Value::Unit)
            }
            (Intrinsic::MonitorExit, [_]) => {
                if self.monitor_depth == 0 {
                    return Err(self.raise(
                        runtime::invalid_operation_exception(),
                        "monitor exited more times than entered",
                    ));
                }
                self.monitor_depth -= 1;
                Ok(Value::Unit)
            }
            (
                Intrinsic::ITupleLength
                | Intrinsic::CollectionLength
                | Intrinsic::AwaiterIsCompleted
                | Intrinsic::ExceptionMessage
                | Intrinsic::BuilderTask,
                [receiver],
            ) => self.intrinsic_property(op, receiver),
            (_, values) => Err(EvalError::TypeMismatch {
                expected: "intrinsic operands",
                found: format!("{op:?}{values:?}"),
            }
            .into()),
        }
    }

    fn finish_builder(&mut self, builder: &BuilderValue, status: TaskStatus) -> Outcome {
        match builder.task.finish(status) {
            Some(waiters) => {
                self.run_queue.extend(waiters);
                Ok(Value::Unit)
            }
            None => Err(self.raise(
                runtime::invalid_operation_exception(),
                "the task was already completed",
            )),
        }
    }

    pub(super) fn move_next(&mut self, state_machine: &Value) -> Outcome {
        match state_machine {
            Value::StateMachine(closure) => {
                self.call_closure(closure, Vec::new())?;
                Ok(Value::Unit)
            }
            other => Err(type_mismatch("a state machine", other).into()),
        }
    }

    // ── Members ─────────────────────────────────────────────────────

    pub(super) fn member(
        &mut self,
        object: Option<&Expr>,
        member: &MemberInfo,
        env: &Environment,
    ) -> Outcome {
        let receiver = match object {
            Some(object) => self.eval_expr(object, env)?,
            None => {
                return match &member.body {
                    MethodBody::Host(key) => self.call_host(key, &mut []),
                    _ => Ok(Value::default_of(&member.ty)),
                }
            }
        };
        if receiver.is_null() {
            return Err(self.raise(
                runtime::null_reference_exception(),
                &format!("`{}` read from null", member.name),
            ));
        }
        if let MemberKind::TupleItem(index) = member.kind {
            return match &receiver {
                Value::Tuple(items) => items
                    .get(index)
                    .cloned()
                    .ok_or_else(|| type_mismatch("a longer tuple", &receiver).into()),
                other => Err(type_mismatch("a tuple", other).into()),
            };
        }
        match &member.body {
            MethodBody::Intrinsic(op) => self.intrinsic_property(*op, &receiver),
            MethodBody::Host(key) => self.call_host(key, &mut [receiver]),
            MethodBody::Stored => match &receiver {
                Value::Object(object) => Ok(object
                    .fields
                    .borrow()
                    .get(&member.name)
                    .cloned()
                    .unwrap_or_else(|| Value::default_of(&member.ty))),
                other => Err(type_mismatch("an object", other).into()),
            },
        }
    }

    fn intrinsic_property(&mut self, op: Intrinsic, receiver: &Value) -> Outcome {
        let value = match (op, receiver) {
            (Intrinsic::CollectionLength, Value::Array(array)) => array.items.len(),
            (Intrinsic::CollectionLength, Value::String(s)) => s.chars().count(),
            (Intrinsic::ITupleLength, Value::Tuple(items)) => items.len(),
            (Intrinsic::AwaiterIsCompleted, Value::Awaiter(task)) => {
                return Ok(Value::Bool(task.is_completed()))
            }
            (Intrinsic::ExceptionMessage, Value::Exception(exception)) => {
                return Ok(Value::String(Rc::clone(&exception.message)))
            }
            (Intrinsic::BuilderTask, Value::Builder(builder)) => {
                return Ok(Value::Task(Rc::clone(&builder.task)))
            }
            _ => {
                return Err(EvalError::TypeMismatch {
                    expected: "an intrinsic property receiver",
                    found: format!("{op:?} on {receiver:?}"),
                }
                .into())
            }
        };
        let length = i32::try_from(value).map_err(|_| {
            Flow::Error(EvalError::TypeMismatch {
                expected: "a length that fits in int",
                found: value.to_string(),
            })
        })?;
        Ok(Value::Int32(length))
    }

    fn call_host(&mut self, key: &str, values: &mut [Value]) -> Outcome {
        let host = self
            .hosts
            .get(key)
            .cloned()
            .ok_or_else(|| EvalError::UnknownHost { key: key.to_owned() })?;
        host(values).map_err(Flow::Throw)
    }

    // ── Assignment ──────────────────────────────────────────────────

    pub(super) fn assign(&mut self, target: &Expr, value: &Expr, env: &Environment) -> Outcome {
        match target.kind() {
            ExprKind::Parameter(var) => {
                let value = self.eval_expr(value, env)?;
                self.store_var(var, value.clone(), env)?;
                Ok(value)
            }
            ExprKind::Member {
                object: Some(object),
                member,
            } => {
                let receiver = self.eval_expr(object, env)?;
                let value = self.eval_expr(value, env)?;
                self.store_member(&receiver, member, value.clone())?;
                Ok(value)
            }
            _ => Err(EvalError::InvalidAssignmentTarget.into()),
        }
    }

    /// Write `value` to an already evaluated assignment target.
    fn store(&mut self, target: &Expr, value: Value, env: &Environment) -> Outcome<()> {
        match target.kind() {
            ExprKind::Parameter(var) => self.store_var(var, value, env),
            ExprKind::Member {
                object: Some(object),
                member,
            } => {
                let receiver = self.eval_expr(object, env)?;
                self.store_member(&receiver, member, value)
            }
            _ => Err(EvalError::InvalidAssignmentTarget.into()),
        }
    }

    pub(crate) fn store_var(&mut self, var: &Var, value: Value, env: &Environment) -> Outcome<()> {
        let cell = env.lookup(var).ok_or_else(|| EvalError::UnboundVariable {
            name: var.name().unwrap_or("<anonymous>").to_owned(),
        })?;
        *cell.borrow_mut() = value;
        Ok(())
    }

    fn store_member(&mut self, receiver: &Value, member: &MemberInfo, value: Value) -> Outcome<()> {
        match receiver {
            Value::Object(object) if member.body == MethodBody::Stored => {
                object
                    .fields
                    .borrow_mut()
                    .insert(member.name.clone(), value);
                Ok(())
            }
            Value::Null => Err(self.raise(
                runtime::null_reference_exception(),
                &format!("`{}` written on null", member.name),
            )),
            _ => Err(EvalError::InvalidAssignmentTarget.into()),
        }
    }

    // ── Construction ────────────────────────────────────────────────

    pub(super) fn construct(&mut self, ty: &Type, args: &[Expr], env: &Environment) -> Outcome {
        let values = self.eval_all(args, env)?;
        let exception = runtime::exception();
        Ok(match ty {
            Type::Tuple(_) => Value::tuple(values),
            _ if *ty == exception || ty.derives_from(&exception) => {
                let message = match values.first() {
                    Some(Value::String(s)) => s.to_string(),
                    _ => String::new(),
                };
                Value::exception(ty.clone(), &message)
            }
            Type::Named(def) => {
                let fields = def
                    .fields
                    .iter()
                    .filter(|f| f.body == MethodBody::Stored)
                    .zip(values)
                    .map(|(f, v)| (&*f.name, v))
                    .collect();
                Value::object(ty.clone(), fields)
            }
            _ => values
                .into_iter()
                .next()
                .unwrap_or_else(|| Value::default_of(ty)),
        })
    }

    // ── Closures ────────────────────────────────────────────────────

    pub(super) fn call_closure(&mut self, closure: &Rc<Closure>, args: Vec<Value>) -> Outcome {
        let lambda = &closure.lambda;
        let scope = closure.env.child();
        for (param, arg) in lambda.params.iter().zip(args) {
            scope.declare(param, arg);
        }
        match self.eval_expr(&lambda.body, &scope) {
            Ok(value) => Ok(typed_result(value, &lambda.return_type)),
            Err(Flow::Goto { target, .. }) => Err(EvalError::EscapingGoto {
                label: label_name(&target),
            }
            .into()),
            Err(other) => Err(other),
        }
    }
}
