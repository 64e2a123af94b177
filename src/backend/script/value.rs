//! Runtime values of the module script language.
//!
//! Dicts are shared and mutable: a module that populates its `exports` dict
//! in place is observed through `module.exports` as well, and two loads of
//! the same cached module hand out the very same dict.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;

use super::error::RuntimeError;
use super::scope::Scope;
use crate::sexpr::SExpr;

/// Shared, mutable string-keyed map.
pub type Dict = Rc<RefCell<BTreeMap<String, Value>>>;

/// Signature of host-provided (native) functions.
pub type NativeFn = dyn Fn(&[Value]) -> Result<Value, RuntimeError>;

/// A value produced or consumed by module scripts.
#[derive(Clone)]
pub enum Value {
    /// Absence of a value
    Nil,
    /// A boolean literal (`True` / `False`)
    Bool(bool),
    /// An integer
    Long(i64),
    /// A floating point number
    Float(f64),
    /// An immutable string
    Str(Rc<str>),
    /// An immutable list
    List(Rc<Vec<Value>>),
    /// A shared mutable dictionary
    Dict(Dict),
    /// A callable (closure or native)
    Function(Function),
}

/// Callable values.
#[derive(Clone)]
pub enum Function {
    Closure(Rc<Closure>),
    Native(Rc<Native>),
}

/// A user-defined function capturing its defining scope.
pub struct Closure {
    pub name: Option<String>,
    pub params: Vec<String>,
    pub body: Vec<SExpr>,
    pub scope: Scope,
}

/// A named host function.
pub struct Native {
    name: String,
    func: Box<NativeFn>,
}

impl Native {
    pub fn new<F>(name: impl Into<String>, func: F) -> Self
    where
        F: Fn(&[Value]) -> Result<Value, RuntimeError> + 'static,
    {
        Self {
            name: name.into(),
            func: Box::new(func),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn call(&self, args: &[Value]) -> Result<Value, RuntimeError> {
        (self.func)(args)
    }
}

impl Function {
    pub fn name(&self) -> &str {
        match self {
            Function::Closure(c) => c.name.as_deref().unwrap_or("<fn>"),
            Function::Native(n) => n.name(),
        }
    }

    fn ptr_eq(&self, other: &Function) -> bool {
        match (self, other) {
            (Function::Closure(a), Function::Closure(b)) => Rc::ptr_eq(a, b),
            (Function::Native(a), Function::Native(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl Value {
    pub fn str(s: &str) -> Self {
        Value::Str(Rc::from(s))
    }

    pub fn list(items: Vec<Value>) -> Self {
        Value::List(Rc::new(items))
    }

    /// A fresh, empty dict.
    pub fn dict() -> Self {
        Value::Dict(Rc::new(RefCell::new(BTreeMap::new())))
    }

    pub fn dict_from<I, K>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, Value)>,
        K: Into<String>,
    {
        let map = entries.into_iter().map(|(k, v)| (k.into(), v)).collect();
        Value::Dict(Rc::new(RefCell::new(map)))
    }

    pub fn native<F>(name: &str, func: F) -> Self
    where
        F: Fn(&[Value]) -> Result<Value, RuntimeError> + 'static,
    {
        Value::Function(Function::Native(Rc::new(Native::new(name, func))))
    }

    /// Friendly type name for error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Nil => "Nil",
            Value::Bool(_) => "Bool",
            Value::Long(_) => "Number (integer)",
            Value::Float(_) => "Number (float)",
            Value::Str(_) => "String",
            Value::List(_) => "List",
            Value::Dict(_) => "Dict",
            Value::Function(_) => "Function",
        }
    }

    /// Only `Nil` and `False` are falsy.
    pub fn is_truthy(&self) -> bool {
        !matches!(self, Value::Nil | Value::Bool(false))
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_long(&self) -> Option<i64> {
        match self {
            Value::Long(n) => Some(*n),
            _ => None,
        }
    }

    /// Look up `key` if this value is a dict.
    pub fn get(&self, key: &str) -> Option<Value> {
        match self {
            Value::Dict(d) => d.borrow().get(key).cloned(),
            _ => None,
        }
    }

    /// Store `key` if this value is a dict; returns false otherwise.
    pub fn set(&self, key: &str, value: Value) -> bool {
        match self {
            Value::Dict(d) => {
                d.borrow_mut().insert(key.to_string(), value);
                true
            }
            _ => false,
        }
    }

    /// Textual form usable as a module identifier or string piece.
    ///
    /// `None` for values that have no lossless string form.
    pub fn to_text(&self) -> Option<String> {
        match self {
            Value::Str(s) => Some(s.to_string()),
            Value::Long(n) => Some(n.to_string()),
            Value::Float(f) => Some(f.to_string()),
            Value::Bool(b) => Some(if *b { "True" } else { "False" }.to_string()),
            _ => None,
        }
    }

    /// Identity comparison for shared values; equality for scalars.
    pub fn ptr_eq(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Dict(a), Value::Dict(b)) => Rc::ptr_eq(a, b),
            (Value::List(a), Value::List(b)) => Rc::ptr_eq(a, b),
            (Value::Str(a), Value::Str(b)) => Rc::ptr_eq(a, b),
            (Value::Function(a), Value::Function(b)) => a.ptr_eq(b),
            (a, b) => a == b,
        }
    }
}

/// Address of a dict, used to detect dicts that contain themselves.
fn dict_addr(d: &Dict) -> *const () {
    Rc::as_ptr(d) as *const ()
}

impl Value {
    /// Structural equality; a pair of dicts already under comparison
    /// counts as equal.
    fn eq_tracking(&self, other: &Value, comparing: &mut Vec<(*const (), *const ())>) -> bool {
        match (self, other) {
            (Value::List(a), Value::List(b)) => {
                Rc::ptr_eq(a, b)
                    || (a.len() == b.len()
                        && a.iter().zip(b.iter()).all(|(x, y)| x.eq_tracking(y, comparing)))
            }
            (Value::Dict(a), Value::Dict(b)) => {
                if Rc::ptr_eq(a, b) {
                    return true;
                }
                let pair = (dict_addr(a), dict_addr(b));
                if comparing.contains(&pair) {
                    return true;
                }
                comparing.push(pair);
                let (a, b) = (a.borrow(), b.borrow());
                let equal = a.len() == b.len()
                    && a
                        .iter()
                        .zip(b.iter())
                        .all(|((ka, va), (kb, vb))| ka == kb && va.eq_tracking(vb, comparing));
                comparing.pop();
                equal
            }
            (a, b) => a.eq_scalar(b),
        }
    }

    fn eq_scalar(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Nil, Value::Nil) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Long(a), Value::Long(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a == b,
            (Value::Long(a), Value::Float(b)) | (Value::Float(b), Value::Long(a)) => {
                (*a as f64) == *b
            }
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::Function(a), Value::Function(b)) => a.ptr_eq(b),
            _ => false,
        }
    }

    /// Render the value; a dict met again inside itself prints as `{...}`.
    fn write_tracking(&self, f: &mut fmt::Formatter<'_>, open: &mut Vec<*const ()>) -> fmt::Result {
        match self {
            Value::List(items) => {
                write!(f, "(")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, " ")?;
                    }
                    item.write_tracking(f, open)?;
                }
                write!(f, ")")
            }
            Value::Dict(d) => {
                let addr = dict_addr(d);
                if open.contains(&addr) {
                    return write!(f, "{{...}}");
                }
                open.push(addr);
                write!(f, "{{")?;
                for (i, (key, value)) in d.borrow().iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}: ", key)?;
                    value.write_tracking(f, open)?;
                }
                open.pop();
                write!(f, "}}")
            }
            Value::Nil => write!(f, "Nil"),
            Value::Bool(b) => write!(f, "{}", if *b { "True" } else { "False" }),
            Value::Long(n) => write!(f, "{}", n),
            Value::Float(x) => write!(f, "{:?}", x),
            Value::Str(s) => write!(f, "\"{}\"", s),
            Value::Function(func) => write!(f, "<function {}>", func.name()),
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        self.eq_tracking(other, &mut Vec::new())
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::str(s)
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(Rc::from(s))
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Long(n)
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Float(f)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.write_tracking(f, &mut Vec::new())
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dict_is_shared() {
        let exports = Value::dict();
        let alias = exports.clone();
        assert!(alias.set("x", Value::Long(1)));
        assert_eq!(exports.get("x"), Some(Value::Long(1)));
        assert!(exports.ptr_eq(&alias));
    }

    #[test]
    fn test_equal_dicts_are_not_identical() {
        let a = Value::dict_from([("x", Value::Long(1))]);
        let b = Value::dict_from([("x", Value::Long(1))]);
        assert_eq!(a, b);
        assert!(!a.ptr_eq(&b));
    }

    #[test]
    fn test_truthiness() {
        assert!(!Value::Nil.is_truthy());
        assert!(!Value::Bool(false).is_truthy());
        assert!(Value::Long(0).is_truthy());
        assert!(Value::str("").is_truthy());
    }

    #[test]
    fn test_to_text() {
        assert_eq!(Value::str("a/b").to_text().as_deref(), Some("a/b"));
        assert_eq!(Value::Long(42).to_text().as_deref(), Some("42"));
        assert_eq!(Value::Nil.to_text(), None);
        assert_eq!(Value::dict().to_text(), None);
    }

    #[test]
    fn test_display() {
        let v = Value::dict_from([
            ("name", Value::str("geo")),
            ("sizes", Value::list(vec![Value::Long(1), Value::Float(2.5)])),
        ]);
        assert_eq!(v.to_string(), r#"{name: "geo", sizes: (1 2.5)}"#);
    }

    #[test]
    fn test_display_of_self_containing_dict() {
        let d = Value::dict_from([("n", Value::Long(1))]);
        d.set("self", d.clone());
        assert_eq!(d.to_string(), "{n: 1, self: {...}}");

        let wrapped = Value::list(vec![d.clone(), d.clone()]);
        assert_eq!(wrapped.to_string(), "({n: 1, self: {...}} {n: 1, self: {...}})");
    }

    #[test]
    fn test_equality_of_self_containing_dicts() {
        let a = Value::dict();
        a.set("k", a.clone());
        let b = Value::dict();
        b.set("k", b.clone());
        assert_eq!(a, b);

        let c = Value::dict();
        c.set("k", Value::Long(1));
        assert_ne!(a, c);
    }

    #[test]
    fn test_set_on_non_dict() {
        assert!(!Value::Long(3).set("x", Value::Nil));
        assert_eq!(Value::Long(3).get("x"), None);
    }

    #[test]
    fn test_native_call() {
        let double = Value::native("double", |args| match args {
            [Value::Long(n)] => Ok(Value::Long(n * 2)),
            _ => Err(RuntimeError::new("double expects one integer")),
        });
        match double {
            Value::Function(Function::Native(n)) => {
                assert_eq!(n.name(), "double");
                assert_eq!(n.call(&[Value::Long(21)]).unwrap(), Value::Long(42));
            }
            other => panic!("expected native, got {}", other),
        }
    }
}
