//! Lowering of async lambdas to ordinary lambdas driving a state machine.
//!
//! ```text
//! (params) => {
//!     builder = Builder.Create();
//!     state = -1;
//!     stateMachine = CreateStateMachine(() => {
//!         try {
//!             switch (state) { ... }
//!             result = body;
//!         } catch (Exception e) {
//!             state = -2;
//!             builder.SetException(e);
//!             goto exit;
//!         }
//!         state = -2;
//!         builder.SetResult(result);
//!       exit:
//!     });
//!     builder.Start(stateMachine);
//!     return builder.Task;
//! }
//! ```
//!
//! The body goes through the passes in order: the await checker,
//! structural reduction, shadow elimination, spilling, the await rewriter
//! and result percolation. Nested lambdas are left for their own lowering.

use csx_ir::build::{self, parameter};
use csx_ir::{runtime, CsxError, Expr, ExprKind, Type, Var};
use tracing::debug;

use crate::factories::builder_for;
use crate::resume::{self, Machine, FINISHED, RUNNING};
use crate::{check, percolate, shadow, spill, structure};

/// Lower an async lambda. Any other node is returned unchanged.
pub fn lower_async_lambda(expr: &Expr) -> Result<Expr, CsxError> {
    let ExprKind::AsyncLambda(data) = expr.kind() else {
        return Ok(expr.clone());
    };
    let kind = builder_for(&data.return_type)?;
    check::check_body(&data.body)?;

    let body = structure::reduce_structure(&data.body)?;
    let body = shadow::eliminate_shadowing(&body, &data.params);
    let body = spill::spill(&body);

    let machine = Machine::new(kind);
    let rewritten = resume::rewrite(&body, &machine);
    debug!(
        name = data.name.as_deref().unwrap_or("<anonymous>"),
        states = rewritten.states,
        "lowering async lambda"
    );

    let result = machine
        .kind
        .result_type()
        .map(|t| Var::new("result", t.clone()));
    let body = match &result {
        Some(result) => percolate::assign_result(result, &rewritten.body),
        None => rewritten.body,
    };
    let move_next = move_next(&machine, rewritten.dispatch, body, result.as_ref());

    let mut variables = vec![
        machine.builder.clone(),
        machine.state.clone(),
        machine.state_machine.clone(),
    ];
    variables.extend(result);
    variables.extend(rewritten.hoisted);

    let mut exprs = vec![
        build::assign_var(
            &machine.builder,
            build::call_static(machine.kind.create(), Vec::new()),
        ),
        machine.set_state(RUNNING),
        build::assign_var(
            &machine.state_machine,
            build::call_static(
                runtime::create_state_machine(),
                vec![build::lambda_typed(None, Vec::new(), move_next, Type::Void)],
            ),
        ),
        build::call(
            parameter(&machine.builder),
            machine.kind.start(),
            vec![parameter(&machine.state_machine)],
        ),
    ];
    if let Some(task) = machine.kind.task() {
        exprs.push(build::member(Some(parameter(&machine.builder)), task));
    }
    let outer = build::block_typed(variables, exprs, data.return_type.clone());
    Ok(build::lambda_typed(
        data.name.as_deref(),
        data.params.clone(),
        outer,
        data.return_type.clone(),
    ))
}

/// The state machine body: the rewritten lambda body inside the outer
/// handler that faults the builder.
fn move_next(machine: &Machine, dispatch: Option<Expr>, body: Expr, result: Option<&Var>) -> Expr {
    let exception = Var::new("exception", runtime::exception());
    let handler = build::catch(
        runtime::exception(),
        Some(exception.clone()),
        None,
        build::block_typed(
            Vec::new(),
            vec![
                machine.set_state(FINISHED),
                build::call(
                    parameter(&machine.builder),
                    machine.kind.set_exception(),
                    vec![parameter(&exception)],
                ),
                build::goto(&machine.exit),
            ],
            Type::Void,
        ),
    );
    let mut guarded = Vec::with_capacity(2);
    guarded.extend(dispatch);
    guarded.push(body);
    let set_result = build::call(
        parameter(&machine.builder),
        machine.kind.set_result(),
        result.map(parameter).into_iter().collect(),
    );
    build::block_typed(
        Vec::new(),
        vec![
            build::try_catch_finally(
                build::block_typed(Vec::new(), guarded, Type::Void),
                vec![handler],
                None,
            ),
            machine.set_state(FINISHED),
            set_result,
            build::label(&machine.exit),
        ],
        Type::Void,
    )
}

/// One reduction step for an async extension node: async lambdas are
/// lowered, `lock` is reduced, and `await` outside an async lambda is an
/// error. Other nodes are returned unchanged.
pub fn reduce_node(expr: &Expr) -> Result<Expr, CsxError> {
    match expr.kind() {
        ExprKind::AsyncLambda(_) => lower_async_lambda(expr),
        ExprKind::Await { .. } => Err(CsxError::AwaitOutsideAsyncLambda),
        ExprKind::Lock { object, body } => Ok(structure::reduce_lock(object, body)),
        _ => Ok(expr.clone()),
    }
}
