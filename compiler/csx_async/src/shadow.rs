//! Alpha-renaming of redeclared variables.
//!
//! Hoisting moves block variables into one scope shared by every resumption
//! of the state machine, where a variable is its handle. A handle declared
//! again while already in scope would merge the two declarations, so the
//! inner one is given a fresh handle and every use inside its scope follows.

use std::sync::Arc;

use csx_ir::build::parameter;
use csx_ir::traverse::map_children_infallible;
use csx_ir::{ensure_sufficient_stack, CatchBlock, Expr, ExprKind, LambdaData, Var};
use rustc_hash::{FxHashMap, FxHashSet};
use tracing::trace;

/// Rename nested redeclarations in `body`, treating `params` as declared.
pub(crate) fn eliminate_shadowing(body: &Expr, params: &[Var]) -> Expr {
    let mut scopes = Scopes {
        in_scope: params.iter().cloned().collect(),
        renames: FxHashMap::default(),
    };
    scopes.rename(body)
}

struct Scopes {
    in_scope: FxHashSet<Var>,
    renames: FxHashMap<Var, Var>,
}

/// How to undo one declaration when its scope ends.
enum Undo {
    Declared(Var),
    Renamed(Var, Option<Var>),
}

impl Scopes {
    fn rename(&mut self, expr: &Expr) -> Expr {
        ensure_sufficient_stack(|| match expr.kind() {
            ExprKind::Parameter(var) => match self.renames.get(var) {
                Some(fresh) => parameter(fresh),
                None => expr.clone(),
            },
            ExprKind::Block { variables, exprs } => {
                let (declared, undo) = self.declare(variables);
                let renamed: Vec<Expr> = exprs.iter().map(|e| self.rename(e)).collect();
                self.leave(undo);
                if declared == *variables && same(exprs, &renamed) {
                    return expr.clone();
                }
                Expr::new(
                    ExprKind::Block {
                        variables: declared,
                        exprs: renamed,
                    },
                    expr.ty().clone(),
                )
            }
            ExprKind::Lambda(data) | ExprKind::AsyncLambda(data) => {
                let (params, undo) = self.declare(&data.params);
                let body = self.rename(&data.body);
                self.leave(undo);
                if params == data.params && body.ptr_eq(&data.body) {
                    return expr.clone();
                }
                let data = Arc::new(LambdaData {
                    params,
                    body,
                    ..(**data).clone()
                });
                let kind = match expr.kind() {
                    ExprKind::AsyncLambda(_) => ExprKind::AsyncLambda(data),
                    _ => ExprKind::Lambda(data),
                };
                Expr::new(kind, expr.ty().clone())
            }
            ExprKind::Try {
                body,
                handlers,
                finally,
            } => {
                let new_body = self.rename(body);
                let new_handlers: Vec<_> = handlers.iter().map(|h| self.rename_handler(h)).collect();
                let new_finally = finally.as_ref().map(|f| self.rename(f));
                if new_body.ptr_eq(body)
                    && handlers.iter().zip(&new_handlers).all(|(old, new)| same_handler(old, new))
                    && same_option(finally.as_ref(), new_finally.as_ref())
                {
                    return expr.clone();
                }
                Expr::new(
                    ExprKind::Try {
                        body: new_body,
                        handlers: new_handlers,
                        finally: new_finally,
                    },
                    expr.ty().clone(),
                )
            }
            _ => map_children_infallible(expr, &mut |child| self.rename(child)),
        })
    }

    fn rename_handler(&mut self, handler: &CatchBlock) -> CatchBlock {
        let declared = handler.variable.iter().cloned().collect::<Vec<_>>();
        let (declared, undo) = self.declare(&declared);
        let filter = handler.filter.as_ref().map(|f| self.rename(f));
        let body = self.rename(&handler.body);
        self.leave(undo);
        CatchBlock {
            test: handler.test.clone(),
            variable: declared.into_iter().next(),
            filter,
            body,
        }
    }

    fn declare(&mut self, variables: &[Var]) -> (Vec<Var>, Vec<Undo>) {
        let mut declared = Vec::with_capacity(variables.len());
        let mut undo = Vec::with_capacity(variables.len());
        for var in variables {
            if self.in_scope.insert(var.clone()) {
                declared.push(var.clone());
                undo.push(Undo::Declared(var.clone()));
            } else {
                let fresh = var.fresh_like();
                trace!(name = var.name().unwrap_or("_"), "renaming redeclared variable");
                let previous = self.renames.insert(var.clone(), fresh.clone());
                declared.push(fresh);
                undo.push(Undo::Renamed(var.clone(), previous));
            }
        }
        (declared, undo)
    }

    fn leave(&mut self, undo: Vec<Undo>) {
        for step in undo.into_iter().rev() {
            match step {
                Undo::Declared(var) => {
                    self.in_scope.remove(&var);
                }
                Undo::Renamed(var, Some(previous)) => {
                    self.renames.insert(var, previous);
                }
                Undo::Renamed(var, None) => {
                    self.renames.remove(&var);
                }
            }
        }
    }
}

fn same(old: &[Expr], new: &[Expr]) -> bool {
    old.iter().zip(new).all(|(a, b)| a.ptr_eq(b))
}

fn same_option(old: Option<&Expr>, new: Option<&Expr>) -> bool {
    match (old, new) {
        (Some(old), Some(new)) => old.ptr_eq(new),
        (None, None) => true,
        _ => false,
    }
}

fn same_handler(old: &CatchBlock, new: &CatchBlock) -> bool {
    old.variable == new.variable
        && same_option(old.filter.as_ref(), new.filter.as_ref())
        && old.body.ptr_eq(&new.body)
}

#[cfg(test)]
mod tests {
    #![allow(
        clippy::unwrap_used,
        reason = "test code uses unwrap for concise assertions"
    )]

    use csx_eval::{Interpreter, Value};
    use csx_ir::build::{self, const_i32, parameter};
    use csx_ir::{runtime, Expr, ExprKind, Type, Var};
    use pretty_assertions::assert_eq;

    use super::eliminate_shadowing;

    fn block_vars(expr: &Expr) -> &[Var] {
        match expr.kind() {
            ExprKind::Block { variables, .. } => variables,
            other => panic!("expected a block, got {other:?}"),
        }
    }

    fn statements(expr: &Expr) -> &[Expr] {
        match expr.kind() {
            ExprKind::Block { exprs, .. } => exprs,
            other => panic!("expected a block, got {other:?}"),
        }
    }

    #[test]
    fn redeclared_handle_gets_a_fresh_one() {
        let x = Var::new("x", Type::Int32);
        let inner = build::block(
            vec![x.clone()],
            vec![build::assign_var(&x, const_i32(2)), parameter(&x)],
        );
        let outer = build::block(
            vec![x.clone()],
            vec![build::assign_var(&x, const_i32(1)), inner, parameter(&x)],
        );
        let renamed = eliminate_shadowing(&outer, &[]);

        let outer_var = &block_vars(&renamed)[0];
        let inner_var = &block_vars(&statements(&renamed)[1])[0];
        assert_eq!(outer_var, &x);
        assert_ne!(inner_var, &x);
        assert_eq!(inner_var.name(), Some("x"));
        assert_eq!(Interpreter::new().eval(&renamed).unwrap(), Value::Int32(1));
    }

    #[test]
    fn sibling_blocks_keep_their_variables() {
        let (a, b) = (Var::new("x", Type::Int32), Var::new("x", Type::Int32));
        let e = build::block(
            Vec::new(),
            vec![
                build::block(vec![a.clone()], vec![build::assign_var(&a, const_i32(1))]),
                build::block(vec![b.clone()], vec![build::assign_var(&b, const_i32(2))]),
            ],
        );
        let renamed = eliminate_shadowing(&e, &[]);
        assert!(renamed.ptr_eq(&e));
    }

    #[test]
    fn try_without_redeclarations_keeps_its_identity() {
        let e = Var::new("e", runtime::exception());
        let handler = build::catch(runtime::exception(), Some(e.clone()), None, const_i32(0));
        let t = build::try_catch_finally(const_i32(1), vec![handler], Some(build::empty()));
        assert!(eliminate_shadowing(&t, &[]).ptr_eq(&t));

        // The same handle declared again by the handler is renamed.
        let handler = build::catch(runtime::exception(), Some(e.clone()), None, const_i32(0));
        let outer = build::try_catch_finally(const_i32(1), vec![handler], None);
        let t = build::block(vec![e.clone()], vec![outer]);
        let renamed = eliminate_shadowing(&t, &[]);
        assert!(!renamed.ptr_eq(&t));
        let ExprKind::Try { handlers, .. } = statements(&renamed)[0].kind() else {
            panic!("expected a try");
        };
        assert_ne!(handlers[0].variable.as_ref(), Some(&e));
    }

    #[test]
    fn lambda_parameters_count_as_declarations() {
        let p = Var::new("p", Type::Int32);
        let body = build::block(vec![p.clone()], vec![parameter(&p)]);
        let renamed = eliminate_shadowing(&body, &[p.clone()]);
        assert_ne!(&block_vars(&renamed)[0], &p);
        match statements(&renamed)[0].kind() {
            ExprKind::Parameter(v) => assert_eq!(v, &block_vars(&renamed)[0]),
            other => panic!("expected a parameter, got {other:?}"),
        }
    }

    #[test]
    fn renames_end_with_their_scope() {
        let x = Var::new("x", Type::Int32);
        let e = build::block(
            vec![x.clone()],
            vec![
                build::block(vec![x.clone()], vec![parameter(&x)]),
                parameter(&x),
            ],
        );
        let renamed = eliminate_shadowing(&e, &[]);
        let tail = statements(&renamed)[1].as_parameter().unwrap();
        assert_eq!(tail, &x);
    }
}
