//! The await rewriter.
//!
//! Every suspend point becomes a conditional suspension followed by a
//! resume label:
//!
//! ```text
//! if (!awaiter.IsCompleted) {
//!     state = n;
//!     builder.AwaitOnCompleted(awaiter, stateMachine);
//!     goto exit;
//!   resume_n:
//!     state = -1;
//! }
//! ```
//!
//! Resumption re-enters the state machine body and jumps on `state`. A jump
//! cannot enter a `try` from outside, so each `try` holding resume labels
//! gets an entry label just before it and a switch of its own at the start
//! of its body; the enclosing switch jumps to the entry label for every
//! state inside the region. Such a `finally` only runs when `state < 0`,
//! which skips it while suspending.
//!
//! Variables of blocks that suspend are hoisted out of the body, because a
//! resumed body re-enters those blocks and would otherwise reset them.

use csx_ir::build::{self, const_i32, parameter};
use csx_ir::traverse::map_children_infallible;
use csx_ir::{
    ensure_sufficient_stack, AsyncBuilder, Expr, ExprKind, LabelTarget, MemberInfo, Type, Var,
};
use rustc_hash::FxHashSet;
use smallvec::{smallvec, SmallVec};
use tracing::{debug, trace};

use crate::spill::has_suspend;

/// State while running: neither suspended nor finished.
pub(crate) const RUNNING: i32 = -1;
/// State once the builder has been completed.
pub(crate) const FINISHED: i32 = -2;

/// The variables and exit label a lowered async lambda runs with.
pub(crate) struct Machine {
    pub kind: AsyncBuilder,
    pub state: Var,
    pub builder: Var,
    pub state_machine: Var,
    /// End of the state machine body; suspension jumps here.
    pub exit: LabelTarget,
}

impl Machine {
    pub(crate) fn new(kind: AsyncBuilder) -> Self {
        Machine {
            state: Var::new("state", Type::Int32),
            builder: Var::new("builder", kind.builder_type()),
            state_machine: Var::new("stateMachine", csx_ir::runtime::async_state_machine()),
            exit: LabelTarget::new("exit", Type::Void),
            kind,
        }
    }

    pub(crate) fn set_state(&self, state: i32) -> Expr {
        build::assign_var(&self.state, const_i32(state))
    }
}

/// A rewritten body and what the caller must declare around it.
pub(crate) struct Rewritten {
    pub body: Expr,
    /// Switch for the top-level resume targets, if any.
    pub dispatch: Option<Expr>,
    pub hoisted: Vec<Var>,
    pub states: i32,
}

/// One jump a dispatch switch can take: to a resume label for a single
/// state, or to the entry label of a `try` region for every state inside.
struct ResumeTarget {
    label: LabelTarget,
    states: SmallVec<[i32; 2]>,
}

pub(crate) fn rewrite(body: &Expr, machine: &Machine) -> Rewritten {
    let mut rewriter = Rewriter {
        machine,
        next_state: 0,
        top: Vec::new(),
        regions: Vec::new(),
        hoisted: Vec::new(),
        seen: FxHashSet::default(),
    };
    let body = rewriter.rewrite(body);
    let dispatch = (!rewriter.top.is_empty()).then(|| rewriter.dispatch(&rewriter.top));
    debug!(
        states = rewriter.next_state,
        hoisted = rewriter.hoisted.len(),
        "rewrote suspend points"
    );
    Rewritten {
        body,
        dispatch,
        hoisted: rewriter.hoisted,
        states: rewriter.next_state,
    }
}

struct Rewriter<'m> {
    machine: &'m Machine,
    next_state: i32,
    /// Targets outside any `try`.
    top: Vec<ResumeTarget>,
    /// Targets of the enclosing `try` regions, innermost last.
    regions: Vec<Vec<ResumeTarget>>,
    hoisted: Vec<Var>,
    seen: FxHashSet<Var>,
}

impl Rewriter<'_> {
    fn rewrite(&mut self, expr: &Expr) -> Expr {
        if !has_suspend(expr) {
            return expr.clone();
        }
        ensure_sufficient_stack(|| match expr.kind() {
            ExprKind::SuspendPoint {
                awaiter,
                is_completed,
            } => self.suspend(awaiter, is_completed),
            ExprKind::Block { variables, exprs } => {
                for var in variables {
                    if self.seen.insert(var.clone()) {
                        self.hoisted.push(var.clone());
                    }
                }
                let exprs = exprs.iter().map(|e| self.rewrite(e)).collect();
                build::block_typed(Vec::new(), exprs, expr.ty().clone())
            }
            ExprKind::Try {
                body,
                handlers,
                finally,
            } => self.try_region(expr, body, handlers, finally.as_ref()),
            _ => map_children_infallible(expr, &mut |child| self.rewrite(child)),
        })
    }

    fn suspend(&mut self, awaiter: &Var, is_completed: &MemberInfo) -> Expr {
        let state = self.next_state;
        self.next_state += 1;
        let resume = LabelTarget::new(&format!("resume_{state}"), Type::Void);
        trace!(state, "suspend point");
        self.current().push(ResumeTarget {
            label: resume.clone(),
            states: smallvec![state],
        });

        let m = self.machine;
        let completed = build::member(Some(parameter(awaiter)), is_completed.clone());
        build::if_then(
            build::not(completed),
            build::block_typed(
                Vec::new(),
                vec![
                    m.set_state(state),
                    build::call(
                        parameter(&m.builder),
                        m.kind.await_on_completed(),
                        vec![parameter(awaiter), parameter(&m.state_machine)],
                    ),
                    build::goto(&m.exit),
                    build::label(&resume),
                    m.set_state(RUNNING),
                ],
                Type::Void,
            ),
        )
    }

    fn try_region(
        &mut self,
        expr: &Expr,
        body: &Expr,
        handlers: &[csx_ir::CatchBlock],
        finally: Option<&Expr>,
    ) -> Expr {
        self.regions.push(Vec::new());
        let body = self.rewrite(body);
        let targets = self.regions.pop().unwrap_or_default();
        if targets.is_empty() {
            return build::try_catch_finally(body, handlers.to_vec(), finally.cloned());
        }

        let ty = expr.ty().clone();
        let body = build::block_typed(
            Vec::new(),
            vec![self.dispatch(&targets), body],
            ty.clone(),
        );
        let running = build::less_than(parameter(&self.machine.state), const_i32(0));
        let finally = finally.map(|f| build::if_then(running, f.clone()));
        let entry = LabelTarget::new("try_entry", Type::Void);
        let states = targets
            .iter()
            .flat_map(|t| t.states.iter().copied())
            .collect();
        self.current().push(ResumeTarget {
            label: entry.clone(),
            states,
        });
        build::block_typed(
            Vec::new(),
            vec![
                build::label(&entry),
                build::try_catch_finally(body, handlers.to_vec(), finally),
            ],
            ty,
        )
    }

    fn current(&mut self) -> &mut Vec<ResumeTarget> {
        match self.regions.last_mut() {
            Some(region) => region,
            None => &mut self.top,
        }
    }

    /// `switch (state) { case n, m: goto target; ... }`
    fn dispatch(&self, targets: &[ResumeTarget]) -> Expr {
        let cases = targets
            .iter()
            .map(|t| {
                build::switch_case(
                    t.states.iter().map(|&s| const_i32(s)).collect(),
                    build::goto(&t.label),
                )
            })
            .collect();
        build::switch(parameter(&self.machine.state), cases, None, Type::Void)
    }
}

#[cfg(test)]
mod tests;
