//! Lexical environments.
//!
//! Each block, lambda invocation and catch handler gets a [`Environment`]
//! chained to its parent. Bindings are shared cells, so a closure that
//! captures an environment observes later writes to the captured variables
//! and its own writes are visible to the enclosing code.

use std::cell::RefCell;
use std::rc::Rc;

use csx_ir::Var;
use rustc_hash::FxHashMap;

use crate::value::Value;

/// A shared, mutable variable slot.
pub type Cell = Rc<RefCell<Value>>;

struct Scope {
    bindings: RefCell<FxHashMap<Var, Cell>>,
    parent: Option<Environment>,
}

#[derive(Clone)]
pub struct Environment(Rc<Scope>);

impl Environment {
    /// The empty top-level environment.
    pub fn root() -> Self {
        Environment(Rc::new(Scope {
            bindings: RefCell::new(FxHashMap::default()),
            parent: None,
        }))
    }

    #[must_use]
    pub fn child(&self) -> Self {
        Environment(Rc::new(Scope {
            bindings: RefCell::new(FxHashMap::default()),
            parent: Some(self.clone()),
        }))
    }

    /// Bind `var` in this scope, shadowing any outer binding.
    pub fn declare(&self, var: &Var, value: Value) {
        self.0
            .bindings
            .borrow_mut()
            .insert(var.clone(), Rc::new(RefCell::new(value)));
    }

    /// Find the innermost binding of `var`.
    pub fn lookup(&self, var: &Var) -> Option<Cell> {
        let mut scope = Some(self);
        while let Some(env) = scope {
            if let Some(cell) = env.0.bindings.borrow().get(var) {
                return Some(Rc::clone(cell));
            }
            scope = env.0.parent.as_ref();
        }
        None
    }
}
