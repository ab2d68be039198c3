//! Task cells for the cooperative async runtime.
//!
//! A task is pending until completed with a result or faulted with an
//! exception. State machines waiting on a pending task are parked on it and
//! moved to the interpreter's run queue when it finishes.

use std::cell::RefCell;
use std::rc::Rc;

use csx_ir::{runtime, Type};

use crate::value::Value;

#[derive(Clone, Debug, PartialEq)]
pub enum TaskStatus {
    Pending,
    Completed(Value),
    Faulted(Value),
}

pub struct TaskCell {
    /// `T` of `Task<T>`, `None` for a non-generic `Task`.
    result: Option<Type>,
    status: RefCell<TaskStatus>,
    waiters: RefCell<Vec<Value>>,
}

impl TaskCell {
    pub fn pending(result: Option<Type>) -> Rc<Self> {
        Rc::new(TaskCell {
            result,
            status: RefCell::new(TaskStatus::Pending),
            waiters: RefCell::new(Vec::new()),
        })
    }

    pub fn completed(result: Option<Type>, value: Value) -> Rc<Self> {
        let task = Self::pending(result);
        *task.status.borrow_mut() = TaskStatus::Completed(value);
        task
    }

    pub fn result_type(&self) -> Option<Type> {
        self.result.clone()
    }

    pub fn task_type(&self) -> Type {
        match &self.result {
            Some(t) => runtime::task_of(t.clone()),
            None => runtime::task(),
        }
    }

    pub fn status(&self) -> TaskStatus {
        self.status.borrow().clone()
    }

    pub fn is_completed(&self) -> bool {
        !matches!(*self.status.borrow(), TaskStatus::Pending)
    }

    /// Park a state machine until this task finishes.
    pub(crate) fn add_waiter(&self, state_machine: Value) {
        self.waiters.borrow_mut().push(state_machine);
    }

    /// Finish the task and hand back the parked state machines, or `None`
    /// if the task had already finished.
    pub(crate) fn finish(&self, status: TaskStatus) -> Option<Vec<Value>> {
        if self.is_completed() {
            return None;
        }
        *self.status.borrow_mut() = status;
        Some(std::mem::take(&mut *self.waiters.borrow_mut()))
    }
}

/// A task that has not finished yet; finish it with
/// [`Interpreter::complete_task`](crate::Interpreter::complete_task).
pub fn pending_task(result: Option<Type>) -> Value {
    Value::Task(TaskCell::pending(result))
}

/// A task that already finished with `value`.
pub fn completed_task(result: Option<Type>, value: Value) -> Value {
    Value::Task(TaskCell::completed(result, value))
}
