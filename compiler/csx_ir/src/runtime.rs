//! Well-known runtime surface.
//!
//! Lowered trees call into a small, fixed set of runtime types: exceptions,
//! `ITuple`, collection indexing by `Index`/`Range`, tasks and their
//! awaiters, the three async method builders, the state-machine factory and
//! `Monitor`. Every member is tagged with an [`Intrinsic`] so a consumer
//! (the reference evaluator, a backend) can dispatch on it without string
//! matching.
//!
//! Types are rebuilt on each call. Named types compare by name and generic
//! arguments, so two calls produce equal types.

use crate::build;
use crate::expr::{Expr, Var};
use crate::types::{
    MemberInfo, MemberKind, MethodBody, MethodDef, MethodInfo, ParamInfo, Type, TypeBuilder,
};

/// Runtime operations with built-in semantics.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Intrinsic {
    ITupleLength,
    ITupleGetItem,
    /// `Length` of an array or string.
    CollectionLength,
    /// `collection[Index]`
    CollectionIndex,
    /// `collection[Range]`
    CollectionSlice,
    IsNaN,
    TaskGetAwaiter,
    TaskFromResult,
    AwaiterIsCompleted,
    AwaiterGetResult,
    BuilderCreate,
    BuilderStart,
    BuilderAwaitOnCompleted,
    BuilderSetResult,
    BuilderSetException,
    BuilderTask,
    CreateStateMachine,
    StateMachineMoveNext,
    MonitorEnter,
    MonitorExit,
    ExceptionMessage,
}

fn intrinsic_method(name: &str, params: Vec<ParamInfo>, ret: Type, op: Intrinsic) -> MethodDef {
    MethodDef::new(name, params, ret, MethodBody::Intrinsic(op))
}

// ── Exceptions ──────────────────────────────────────────────────────

pub fn exception() -> Type {
    TypeBuilder::class("Exception")
        .computed_property(
            "Message",
            Type::String,
            MethodBody::Intrinsic(Intrinsic::ExceptionMessage),
        )
        .build()
}

fn exception_subclass(name: &str, base: Type) -> Type {
    TypeBuilder::class(name).base(base).build()
}

pub fn invalid_cast_exception() -> Type {
    exception_subclass("InvalidCastException", exception())
}

pub fn null_reference_exception() -> Type {
    exception_subclass("NullReferenceException", exception())
}

pub fn index_out_of_range_exception() -> Type {
    exception_subclass("IndexOutOfRangeException", exception())
}

pub fn invalid_operation_exception() -> Type {
    exception_subclass("InvalidOperationException", exception())
}

/// Thrown when no arm of a switch expression matches.
pub fn switch_expression_exception() -> Type {
    exception_subclass("SwitchExpressionException", invalid_operation_exception())
}

// ── ITuple ──────────────────────────────────────────────────────────

pub fn ituple() -> Type {
    TypeBuilder::interface("ITuple")
        .computed_property(
            "Length",
            Type::Int32,
            MethodBody::Intrinsic(Intrinsic::ITupleLength),
        )
        .method(intrinsic_method(
            "get_Item",
            vec![ParamInfo::new("index", Type::Int32)],
            Type::Object,
            Intrinsic::ITupleGetItem,
        ))
        .build()
}

/// `ITuple.Length`
pub fn ituple_length() -> Option<MemberInfo> {
    ituple().find_member("Length")
}

/// `ITuple.this[int]`
pub fn ituple_get_item() -> Option<MethodInfo> {
    ituple().find_method("get_Item", 1)
}

// ── Collections ─────────────────────────────────────────────────────

fn collection_method(collection: &Type, name: &str, arg: Type, ret: Type, op: Intrinsic) -> MethodInfo {
    MethodInfo::new(
        Some(collection.clone()),
        intrinsic_method(
            name,
            vec![
                ParamInfo::new("collection", collection.clone()),
                ParamInfo::new("index", arg),
            ],
            ret,
            op,
        )
        .into_static(),
    )
}

/// `(c) => c.Length` for an array or string type.
pub fn length_access(collection: &Type) -> Option<Expr> {
    let c = Var::new("c", collection.clone());
    let length = build::member_named(Some(build::parameter(&c)), "Length")?;
    Some(build::lambda(None, vec![c], length))
}

/// `(c, i) => c[i]` with `i: Index` for an array or string type.
pub fn index_access(collection: &Type) -> Option<Expr> {
    let element = collection.element_type()?;
    let method = collection_method(
        collection,
        "get_Item",
        Type::Index,
        element,
        Intrinsic::CollectionIndex,
    );
    let c = Var::new("c", collection.clone());
    let i = Var::new("i", Type::Index);
    let body = build::call_static(
        method,
        vec![build::parameter(&c), build::parameter(&i)],
    );
    Some(build::lambda(None, vec![c, i], body))
}

/// `(c, r) => c[r]` with `r: Range` for an array or string type.
pub fn range_access(collection: &Type) -> Option<Expr> {
    collection.element_type()?;
    let method = collection_method(
        collection,
        "Slice",
        Type::Range,
        collection.clone(),
        Intrinsic::CollectionSlice,
    );
    let c = Var::new("c", collection.clone());
    let r = Var::new("r", Type::Range);
    let body = build::call_static(
        method,
        vec![build::parameter(&c), build::parameter(&r)],
    );
    Some(build::lambda(None, vec![c, r], body))
}

/// `float.IsNaN` / `double.IsNaN`.
pub fn is_nan(ty: &Type) -> MethodInfo {
    MethodInfo::new(
        Some(ty.clone()),
        intrinsic_method(
            "IsNaN",
            vec![ParamInfo::new("value", ty.clone())],
            Type::Bool,
            Intrinsic::IsNaN,
        )
        .into_static(),
    )
}

// ── Tasks and awaiters ──────────────────────────────────────────────

pub fn inotify_completion() -> Type {
    TypeBuilder::interface("INotifyCompletion").build()
}

pub fn async_state_machine() -> Type {
    TypeBuilder::interface("IAsyncStateMachine")
        .method(intrinsic_method(
            "MoveNext",
            Vec::new(),
            Type::Void,
            Intrinsic::StateMachineMoveNext,
        ))
        .build()
}

/// `TaskAwaiter` (`result: None`) or `TaskAwaiter<T>`.
pub fn task_awaiter(result: Option<Type>) -> Type {
    let builder = TypeBuilder::structure("TaskAwaiter");
    let (builder, ret) = match result {
        Some(t) => (builder.generic_args(vec![t.clone()]), t),
        None => (builder, Type::Void),
    };
    builder
        .implements(inotify_completion())
        .computed_property(
            "IsCompleted",
            Type::Bool,
            MethodBody::Intrinsic(Intrinsic::AwaiterIsCompleted),
        )
        .method(intrinsic_method(
            "GetResult",
            Vec::new(),
            ret,
            Intrinsic::AwaiterGetResult,
        ))
        .build()
}

pub fn task() -> Type {
    TypeBuilder::class("Task")
        .method(intrinsic_method(
            "GetAwaiter",
            Vec::new(),
            task_awaiter(None),
            Intrinsic::TaskGetAwaiter,
        ))
        .build()
}

/// `Task<T>`
pub fn task_of(result: Type) -> Type {
    TypeBuilder::class("Task")
        .generic_args(vec![result.clone()])
        .base(task())
        .method(intrinsic_method(
            "GetAwaiter",
            Vec::new(),
            task_awaiter(Some(result)),
            Intrinsic::TaskGetAwaiter,
        ))
        .build()
}

/// `T` for `Task<T>`, `Void` for `Task`, `None` for anything else.
pub fn task_result_type(ty: &Type) -> Option<Type> {
    let def = ty.type_def()?;
    if &*def.name != "Task" {
        return None;
    }
    match def.args.as_slice() {
        [] => Some(Type::Void),
        [t] => Some(t.clone()),
        _ => None,
    }
}

/// `Task.FromResult<T>(T)`
pub fn task_from_result(result: &Type) -> MethodInfo {
    MethodInfo::new(
        Some(task()),
        intrinsic_method(
            "FromResult",
            vec![ParamInfo::new("result", result.clone())],
            task_of(result.clone()),
            Intrinsic::TaskFromResult,
        )
        .into_static(),
    )
}

// ── Async method builders ───────────────────────────────────────────

/// The three builder shapes, selected by an async lambda's return type.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AsyncBuilder {
    /// `AsyncVoidMethodBuilder`
    Void,
    /// `AsyncTaskMethodBuilder`
    Task,
    /// `AsyncTaskMethodBuilder<T>`
    TaskOf(Type),
}

impl AsyncBuilder {
    pub fn builder_type(&self) -> Type {
        match self {
            AsyncBuilder::Void => TypeBuilder::structure("AsyncVoidMethodBuilder").build(),
            AsyncBuilder::Task => TypeBuilder::structure("AsyncTaskMethodBuilder").build(),
            AsyncBuilder::TaskOf(t) => TypeBuilder::structure("AsyncTaskMethodBuilder")
                .generic_args(vec![t.clone()])
                .build(),
        }
    }

    /// Recover the builder shape from its type.
    pub fn from_builder_type(ty: &Type) -> Option<Self> {
        let def = ty.type_def()?;
        match (&*def.name, def.args.as_slice()) {
            ("AsyncVoidMethodBuilder", []) => Some(AsyncBuilder::Void),
            ("AsyncTaskMethodBuilder", []) => Some(AsyncBuilder::Task),
            ("AsyncTaskMethodBuilder", [t]) => Some(AsyncBuilder::TaskOf(t.clone())),
            _ => None,
        }
    }

    /// `T` of `Task<T>`; `None` when the builder completes without a value.
    pub fn result_type(&self) -> Option<&Type> {
        match self {
            AsyncBuilder::TaskOf(t) => Some(t),
            AsyncBuilder::Void | AsyncBuilder::Task => None,
        }
    }

    /// Return type of the lowered lambda.
    pub fn return_type(&self) -> Type {
        match self {
            AsyncBuilder::Void => Type::Void,
            AsyncBuilder::Task => task(),
            AsyncBuilder::TaskOf(t) => task_of(t.clone()),
        }
    }

    fn method(&self, name: &str, params: Vec<ParamInfo>, ret: Type, op: Intrinsic) -> MethodInfo {
        MethodInfo::new(
            Some(self.builder_type()),
            intrinsic_method(name, params, ret, op),
        )
    }

    /// `static Builder Create()`
    pub fn create(&self) -> MethodInfo {
        MethodInfo::new(
            Some(self.builder_type()),
            intrinsic_method("Create", Vec::new(), self.builder_type(), Intrinsic::BuilderCreate)
                .into_static(),
        )
    }

    /// `void Start<TStateMachine>(ref TStateMachine)`
    pub fn start(&self) -> MethodInfo {
        self.method(
            "Start",
            vec![ParamInfo::new("stateMachine", async_state_machine())],
            Type::Void,
            Intrinsic::BuilderStart,
        )
    }

    /// `void AwaitOnCompleted<TAwaiter, TStateMachine>(ref TAwaiter, ref TStateMachine)`
    pub fn await_on_completed(&self) -> MethodInfo {
        self.method(
            "AwaitOnCompleted",
            vec![
                ParamInfo::new("awaiter", inotify_completion()),
                ParamInfo::new("stateMachine", async_state_machine()),
            ],
            Type::Void,
            Intrinsic::BuilderAwaitOnCompleted,
        )
    }

    /// `void SetResult()` or `void SetResult(T)`
    pub fn set_result(&self) -> MethodInfo {
        let params = match self.result_type() {
            Some(t) => vec![ParamInfo::new("result", t.clone())],
            None => Vec::new(),
        };
        self.method("SetResult", params, Type::Void, Intrinsic::BuilderSetResult)
    }

    /// `void SetException(Exception)`
    pub fn set_exception(&self) -> MethodInfo {
        self.method(
            "SetException",
            vec![ParamInfo::new("exception", exception())],
            Type::Void,
            Intrinsic::BuilderSetException,
        )
    }

    /// `Task` property; `None` for the void builder.
    pub fn task(&self) -> Option<MemberInfo> {
        match self {
            AsyncBuilder::Void => None,
            AsyncBuilder::Task | AsyncBuilder::TaskOf(_) => Some(MemberInfo {
                declaring: self.builder_type(),
                name: "Task".into(),
                ty: self.return_type(),
                kind: MemberKind::Property,
                body: MethodBody::Intrinsic(Intrinsic::BuilderTask),
            }),
        }
    }
}

/// `IAsyncStateMachine AsyncStateMachine.Create(Action moveNext)`
pub fn create_state_machine() -> MethodInfo {
    MethodInfo::new(
        None,
        intrinsic_method(
            "CreateStateMachine",
            vec![ParamInfo::new("moveNext", Type::func(Vec::new(), Type::Void))],
            async_state_machine(),
            Intrinsic::CreateStateMachine,
        )
        .into_static(),
    )
}

// ── Monitor ─────────────────────────────────────────────────────────

fn monitor() -> Type {
    TypeBuilder::class("Monitor").build()
}

pub fn monitor_enter() -> MethodInfo {
    MethodInfo::new(
        Some(monitor()),
        intrinsic_method(
            "Enter",
            vec![ParamInfo::new("obj", Type::Object)],
            Type::Void,
            Intrinsic::MonitorEnter,
        )
        .into_static(),
    )
}

pub fn monitor_exit() -> MethodInfo {
    MethodInfo::new(
        Some(monitor()),
        intrinsic_method(
            "Exit",
            vec![ParamInfo::new("obj", Type::Object)],
            Type::Void,
            Intrinsic::MonitorExit,
        )
        .into_static(),
    )
}
