//! Blocks, jumps, loops, switch and exception handling.
//!
//! A `goto` unwinds as [`Flow::Goto`] until it reaches a statement list that
//! contains its label. Labels may sit inside nested blocks, conditional
//! branches, loop bodies, switch case bodies, label defaults and the
//! right-hand side of a variable assignment; evaluation re-enters those
//! nodes in *seek* mode, skipping everything before the label. Jumps into a
//! `try` are not supported: resumption enters a `try` from its start.

use csx_ir::{
    ensure_sufficient_stack, runtime, CatchBlock, Expr, ExprKind, LabelTarget, SwitchCase, Type,
    Var,
};

use super::{typed_result, Interpreter};
use crate::environment::Environment;
use crate::errors::{label_name, EvalError, Flow, Outcome};
use crate::value::Value;

/// A pending jump to `target` carrying `value`.
pub(crate) struct Jump {
    pub target: LabelTarget,
    pub value: Value,
}

/// Whether `label` can be reached by seeking into `expr`.
pub(crate) fn contains_label(expr: &Expr, label: &LabelTarget) -> bool {
    ensure_sufficient_stack(|| match expr.kind() {
        ExprKind::Label { target, default } => {
            target == label || default.as_ref().is_some_and(|d| contains_label(d, label))
        }
        ExprKind::Block { exprs, .. } => exprs.iter().any(|e| contains_label(e, label)),
        ExprKind::Conditional {
            if_true, if_false, ..
        } => contains_label(if_true, label) || contains_label(if_false, label),
        ExprKind::Loop { body, .. } => contains_label(body, label),
        ExprKind::Switch { cases, default, .. } => {
            cases.iter().any(|c| contains_label(&c.body, label))
                || default.as_ref().is_some_and(|d| contains_label(d, label))
        }
        ExprKind::Assign { target, value } => {
            matches!(target.kind(), ExprKind::Parameter(_)) && contains_label(value, label)
        }
        _ => false,
    })
}

fn position_of(exprs: &[Expr], label: &LabelTarget) -> Option<usize> {
    exprs.iter().position(|e| contains_label(e, label))
}

fn label_not_found(label: &LabelTarget) -> Flow {
    Flow::Error(EvalError::LabelNotFound {
        label: label_name(label),
    })
}

impl Interpreter {
    pub(super) fn block(
        &mut self,
        variables: &[Var],
        exprs: &[Expr],
        ty: &Type,
        env: &Environment,
        jump: Option<Jump>,
    ) -> Outcome {
        let scope = if variables.is_empty() {
            env.clone()
        } else {
            let scope = env.child();
            for var in variables {
                scope.declare(var, Value::default_of(var.ty()));
            }
            scope
        };
        let value = self.run_sequence(exprs, &scope, jump)?;
        Ok(typed_result(value, ty))
    }

    /// Run statements in order, resolving jumps to labels among them.
    fn run_sequence(&mut self, exprs: &[Expr], env: &Environment, mut jump: Option<Jump>) -> Outcome {
        let mut index = match &jump {
            Some(j) => position_of(exprs, &j.target).ok_or_else(|| label_not_found(&j.target))?,
            None => 0,
        };
        let mut last = Value::Unit;
        while let Some(expr) = exprs.get(index) {
            let result = match jump.take() {
                Some(j) => self.seek(expr, env, j),
                None => self.eval_expr(expr, env),
            };
            match result {
                Ok(value) => {
                    last = value;
                    index += 1;
                }
                Err(Flow::Goto { target, value }) => match position_of(exprs, &target) {
                    Some(found) => {
                        index = found;
                        jump = Some(Jump { target, value });
                    }
                    None => return Err(Flow::Goto { target, value }),
                },
                Err(other) => return Err(other),
            }
        }
        Ok(last)
    }

    /// Evaluate `expr` starting at the label `jump` targets.
    pub(crate) fn seek(&mut self, expr: &Expr, env: &Environment, jump: Jump) -> Outcome {
        ensure_sufficient_stack(|| match expr.kind() {
            ExprKind::Label { target, .. } if *target == jump.target => Ok(jump.value),
            ExprKind::Label {
                default: Some(default),
                ..
            } => self.seek(default, env, jump),
            ExprKind::Block { variables, exprs } => {
                self.block(variables, exprs, expr.ty(), env, Some(jump))
            }
            ExprKind::Conditional {
                if_true, if_false, ..
            } => {
                let branch = if contains_label(if_true, &jump.target) {
                    if_true
                } else {
                    if_false
                };
                let value = self.seek(branch, env, jump)?;
                Ok(typed_result(value, expr.ty()))
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
                Some(jump),
            ),
            ExprKind::Switch {
                value,
                cases,
                default,
            } => self.switch(value, cases, default.as_ref(), expr.ty(), env, Some(jump)),
            ExprKind::Assign { target, value } => match target.kind() {
                ExprKind::Parameter(var) => {
                    let value = self.seek(value, env, jump)?;
                    self.store_var(var, value.clone(), env)?;
                    Ok(value)
                }
                _ => Err(label_not_found(&jump.target)),
            },
            _ => Err(label_not_found(&jump.target)),
        })
    }

    pub(super) fn run_loop(
        &mut self,
        body: &Expr,
        break_label: Option<&LabelTarget>,
        continue_label: Option<&LabelTarget>,
        env: &Environment,
        mut jump: Option<Jump>,
    ) -> Outcome {
        loop {
            let result = match jump.take() {
                Some(j) => self.seek(body, env, j),
                None => self.eval_expr(body, env),
            };
            match result {
                Ok(_) => {}
                Err(Flow::Goto { target, value }) => {
                    if break_label == Some(&target) {
                        return Ok(value);
                    }
                    if continue_label == Some(&target) {
                        continue;
                    }
                    if contains_label(body, &target) {
                        jump = Some(Jump { target, value });
                        continue;
                    }
                    return Err(Flow::Goto { target, value });
                }
                Err(other) => return Err(other),
            }
        }
    }

    pub(super) fn switch(
        &mut self,
        value: &Expr,
        cases: &[SwitchCase],
        default: Option<&Expr>,
        ty: &Type,
        env: &Environment,
        jump: Option<Jump>,
    ) -> Outcome {
        if let Some(jump) = jump {
            let body = cases
                .iter()
                .map(|c| &c.body)
                .chain(default)
                .find(|body| contains_label(body, &jump.target))
                .ok_or_else(|| label_not_found(&jump.target))?;
            let result = self.seek(body, env, jump)?;
            return Ok(typed_result(result, ty));
        }
        let subject = self.eval_expr(value, env)?;
        for case in cases {
            for test in &case.tests {
                if self.eval_expr(test, env)?.equals(&subject) {
                    let result = self.eval_expr(&case.body, env)?;
                    return Ok(typed_result(result, ty));
                }
            }
        }
        match default {
            Some(default) => {
                let result = self.eval_expr(default, env)?;
                Ok(typed_result(result, ty))
            }
            None => Ok(Value::Unit),
        }
    }

    pub(super) fn try_catch(
        &mut self,
        body: &Expr,
        handlers: &[CatchBlock],
        finally: Option<&Expr>,
        env: &Environment,
    ) -> Outcome {
        let mut result = self.eval_expr(body, env);
        if let Err(Flow::Throw(exception)) = &result {
            let exception = exception.clone();
            if let Some(handled) = self.handle(&exception, handlers, env) {
                result = handled;
            }
        }
        if let Some(finally) = finally {
            if matches!(result, Err(Flow::Error(_))) {
                return result;
            }
            self.eval_expr(finally, env)?;
        }
        result
    }

    /// Run the first handler that accepts `exception`, or `None` if no
    /// handler does.
    fn handle(&mut self, exception: &Value, handlers: &[CatchBlock], env: &Environment) -> Option<Outcome> {
        for handler in handlers {
            if !exception.is_instance_of(&handler.test) {
                continue;
            }
            let scope = env.child();
            if let Some(var) = &handler.variable {
                scope.declare(var, exception.clone());
            }
            if let Some(filter) = &handler.filter {
                match self.eval_bool(filter, &scope) {
                    Ok(true) => {}
                    Err(Flow::Error(err)) => return Some(Err(Flow::Error(err))),
                    // A filter that is false or throws declines the exception.
                    Ok(false) | Err(_) => continue,
                }
            }
            self.handling.push(exception.clone());
            let result = self.eval_expr(&handler.body, &scope);
            self.handling.pop();
            return Some(result);
        }
        None
    }

    pub(super) fn throw(&mut self, value: Option<&Expr>, env: &Environment) -> Outcome {
        match value {
            Some(value) => {
                let exception = self.eval_expr(value, env)?;
                if exception.is_null() {
                    return Err(self.raise(
                        runtime::null_reference_exception(),
                        "thrown exception is null",
                    ));
                }
                Err(Flow::Throw(exception))
            }
            None => match self.handling.last() {
                Some(exception) => Err(Flow::Throw(exception.clone())),
                None => Err(EvalError::RethrowOutsideHandler.into()),
            },
        }
    }
}
