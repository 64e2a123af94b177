//! Lexical scopes.
//!
//! A scope is a cheap-clone handle; child scopes see their parents'
//! bindings but `define` only ever writes to the scope it is called on.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use super::value::Value;

#[derive(Default)]
struct Frame {
    bindings: RefCell<HashMap<String, Value>>,
    parent: Option<Scope>,
}

#[derive(Clone, Default)]
pub struct Scope {
    frame: Rc<Frame>,
}

impl Scope {
    /// Create an empty root scope.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a scope whose lookups fall back to `self`.
    pub fn child(&self) -> Scope {
        Scope {
            frame: Rc::new(Frame {
                bindings: RefCell::new(HashMap::new()),
                parent: Some(self.clone()),
            }),
        }
    }

    /// Bind `name` in this scope, shadowing any outer binding.
    pub fn define(&self, name: impl Into<String>, value: Value) {
        self.frame.bindings.borrow_mut().insert(name.into(), value);
    }

    pub fn get(&self, name: &str) -> Option<Value> {
        let mut scope = Some(self);
        while let Some(s) = scope {
            if let Some(v) = s.frame.bindings.borrow().get(name) {
                return Some(v.clone());
            }
            scope = s.frame.parent.as_ref();
        }
        None
    }

    /// Rebind an existing name in the nearest scope that defines it.
    ///
    /// Returns false if no enclosing scope defines `name`.
    pub fn assign(&self, name: &str, value: Value) -> bool {
        let mut scope = Some(self);
        while let Some(s) = scope {
            let mut bindings = s.frame.bindings.borrow_mut();
            if let Some(slot) = bindings.get_mut(name) {
                *slot = value;
                return true;
            }
            drop(bindings);
            scope = s.frame.parent.as_ref();
        }
        false
    }

    /// Whether `name` is bound directly in this scope (not a parent).
    pub fn defines(&self, name: &str) -> bool {
        self.frame.bindings.borrow().contains_key(name)
    }
}
