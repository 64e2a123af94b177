//! Builtin functions available to every module body.
//!
//! `require` and `resolve` are not installed here; the module loader binds
//! them because they need a handle to the loader itself.

use std::cmp::Ordering;

use itertools::Itertools;
use tracing::info;

use super::error::RuntimeError;
use super::scope::Scope;
use super::value::Value;

type BuiltinResult = Result<Value, RuntimeError>;

/// Names of all builtins installed by [`install_builtins`].
pub const BUILTIN_NAMES: &[&str] = &[
    "dict", "list", "get", "put", "has", "keys", "len", "str", "print", "error", "not", "+", "-",
    "*", "/", "==", "!=", "<", "<=", ">", ">=",
];

pub fn install_builtins(scope: &Scope) {
    scope.define("dict", Value::native("dict", builtin_dict));
    scope.define("list", Value::native("list", |args| Ok(Value::list(args.to_vec()))));
    scope.define("get", Value::native("get", builtin_get));
    scope.define("put", Value::native("put", builtin_put));
    scope.define("has", Value::native("has", builtin_has));
    scope.define("keys", Value::native("keys", builtin_keys));
    scope.define("len", Value::native("len", builtin_len));
    scope.define("str", Value::native("str", |args| Ok(Value::from(concat(args)))));
    scope.define("print", Value::native("print", builtin_print));
    scope.define("error", Value::native("error", builtin_error));
    scope.define("not", Value::native("not", builtin_not));

    scope.define("+", Value::native("+", |args| fold_numeric("+", args, 0)));
    scope.define("*", Value::native("*", |args| fold_numeric("*", args, 1)));
    scope.define("-", Value::native("-", builtin_sub));
    scope.define("/", Value::native("/", builtin_div));

    scope.define("==", Value::native("==", |args| compare_eq("==", args, true)));
    scope.define("!=", Value::native("!=", |args| compare_eq("!=", args, false)));
    let orderings: [(&'static str, fn(Ordering) -> bool); 4] = [
        ("<", Ordering::is_lt),
        ("<=", Ordering::is_le),
        (">", Ordering::is_gt),
        (">=", Ordering::is_ge),
    ];
    for (name, accept) in orderings {
        scope.define(
            name,
            Value::native(name, move |args| {
                let [a, b] = two_args(name, args)?;
                Ok(Value::Bool(accept(order(name, a, b)?)))
            }),
        );
    }
}

fn arity_error(name: &str, expected: &str, got: usize) -> RuntimeError {
    RuntimeError::new(format!("{} expects {}, got {} argument(s)", name, expected, got))
}

fn type_error(name: &str, expected: &str, got: &Value) -> RuntimeError {
    RuntimeError::new(format!(
        "{} expects {}, got {}",
        name,
        expected,
        got.type_name()
    ))
}

fn two_args<'a>(name: &str, args: &'a [Value]) -> Result<[&'a Value; 2], RuntimeError> {
    match args {
        [a, b] => Ok([a, b]),
        _ => Err(arity_error(name, "2 arguments", args.len())),
    }
}

fn key_of(name: &str, key: &Value) -> Result<String, RuntimeError> {
    key.to_text()
        .ok_or_else(|| type_error(name, "a string key", key))
}

/// Concatenate arguments; strings contribute their raw text.
fn concat(args: &[Value]) -> String {
    args.iter()
        .map(|v| match v {
            Value::Str(s) => s.to_string(),
            other => other.to_string(),
        })
        .join("")
}

fn builtin_dict(args: &[Value]) -> BuiltinResult {
    if args.len() % 2 != 0 {
        return Err(arity_error("dict", "key/value pairs", args.len()));
    }
    let entries = args
        .iter()
        .tuples::<(_, _)>()
        .map(|(k, v)| Ok((key_of("dict", k)?, v.clone())))
        .collect::<Result<Vec<_>, RuntimeError>>()?;
    Ok(Value::dict_from(entries))
}

fn builtin_get(args: &[Value]) -> BuiltinResult {
    let [target, key] = two_args("get", args)?;
    match target {
        Value::Dict(d) => Ok(d
            .borrow()
            .get(&key_of("get", key)?)
            .cloned()
            .unwrap_or(Value::Nil)),
        Value::List(items) => {
            let index = key
                .as_long()
                .ok_or_else(|| type_error("get", "an integer index", key))?;
            Ok(usize::try_from(index)
                .ok()
                .and_then(|i| items.get(i))
                .cloned()
                .unwrap_or(Value::Nil))
        }
        other => Err(type_error("get", "a Dict or List", other)),
    }
}

fn builtin_put(args: &[Value]) -> BuiltinResult {
    let (target, key, value) = match args {
        [t, k, v] => (t, k, v),
        _ => return Err(arity_error("put", "3 arguments", args.len())),
    };
    let key = key_of("put", key)?;
    if target.set(&key, value.clone()) {
        Ok(value.clone())
    } else {
        Err(type_error("put", "a Dict", target))
    }
}

fn builtin_has(args: &[Value]) -> BuiltinResult {
    let [target, key] = two_args("has", args)?;
    match target {
        Value::Dict(d) => Ok(Value::Bool(d.borrow().contains_key(&key_of("has", key)?))),
        other => Err(type_error("has", "a Dict", other)),
    }
}

fn builtin_keys(args: &[Value]) -> BuiltinResult {
    match args {
        [Value::Dict(d)] => Ok(Value::list(
            d.borrow().keys().map(|k| Value::str(k)).collect(),
        )),
        [other] => Err(type_error("keys", "a Dict", other)),
        _ => Err(arity_error("keys", "1 argument", args.len())),
    }
}

fn builtin_len(args: &[Value]) -> BuiltinResult {
    let len = match args {
        [Value::Str(s)] => s.chars().count(),
        [Value::List(items)] => items.len(),
        [Value::Dict(d)] => d.borrow().len(),
        [other] => return Err(type_error("len", "a String, List or Dict", other)),
        _ => return Err(arity_error("len", "1 argument", args.len())),
    };
    Ok(Value::Long(len as i64))
}

fn builtin_print(args: &[Value]) -> BuiltinResult {
    info!(target: "scriptmods::script", "{}", concat(args));
    Ok(Value::Nil)
}

fn builtin_error(args: &[Value]) -> BuiltinResult {
    if args.is_empty() {
        return Err(arity_error("error", "a message", 0));
    }
    Err(RuntimeError::new(concat(args)))
}

fn builtin_not(args: &[Value]) -> BuiltinResult {
    match args {
        [v] => Ok(Value::Bool(!v.is_truthy())),
        _ => Err(arity_error("not", "1 argument", args.len())),
    }
}

/// Numeric operands, promoted to float when any operand is a float.
enum Numbers {
    Longs(Vec<i64>),
    Floats(Vec<f64>),
}

fn numbers(name: &str, args: &[Value]) -> Result<Numbers, RuntimeError> {
    let mut longs = Vec::with_capacity(args.len());
    let mut any_float = false;
    for arg in args {
        match arg {
            Value::Long(_) => {}
            Value::Float(_) => any_float = true,
            other => return Err(type_error(name, "numbers", other)),
        }
    }
    if any_float {
        let floats = args
            .iter()
            .map(|a| match a {
                Value::Long(n) => *n as f64,
                Value::Float(f) => *f,
                _ => 0.0,
            })
            .collect();
        return Ok(Numbers::Floats(floats));
    }
    longs.extend(args.iter().filter_map(Value::as_long));
    Ok(Numbers::Longs(longs))
}

fn overflow(name: &str) -> RuntimeError {
    RuntimeError::new(format!("integer overflow in {}", name))
}

fn fold_numeric(name: &str, args: &[Value], identity: i64) -> BuiltinResult {
    match numbers(name, args)? {
        Numbers::Longs(ns) => ns
            .into_iter()
            .try_fold(identity, |acc, n| {
                if name == "+" {
                    acc.checked_add(n)
                } else {
                    acc.checked_mul(n)
                }
            })
            .map(Value::Long)
            .ok_or_else(|| overflow(name)),
        Numbers::Floats(fs) => Ok(Value::Float(if name == "+" {
            fs.into_iter().sum()
        } else {
            fs.into_iter().product()
        })),
    }
}

fn builtin_sub(args: &[Value]) -> BuiltinResult {
    match numbers("-", args)? {
        Numbers::Longs(ns) => match ns.as_slice() {
            [] => Err(arity_error("-", "at least 1 argument", 0)),
            [n] => n.checked_neg().map(Value::Long).ok_or_else(|| overflow("-")),
            [first, rest @ ..] => rest
                .iter()
                .try_fold(*first, |acc, n| acc.checked_sub(*n))
                .map(Value::Long)
                .ok_or_else(|| overflow("-")),
        },
        Numbers::Floats(fs) => match fs.as_slice() {
            [] => Err(arity_error("-", "at least 1 argument", 0)),
            [f] => Ok(Value::Float(-f)),
            [first, rest @ ..] => Ok(Value::Float(rest.iter().fold(*first, |acc, f| acc - f))),
        },
    }
}

fn builtin_div(args: &[Value]) -> BuiltinResult {
    let [a, b] = two_args("/", args)?;
    match numbers("/", &[a.clone(), b.clone()])? {
        Numbers::Longs(ns) => {
            if ns[1] == 0 {
                return Err(RuntimeError::new("division by zero"));
            }
            ns[0]
                .checked_div(ns[1])
                .map(Value::Long)
                .ok_or_else(|| overflow("/"))
        }
        Numbers::Floats(fs) => Ok(Value::Float(fs[0] / fs[1])),
    }
}

fn compare_eq(name: &str, args: &[Value], expect_equal: bool) -> BuiltinResult {
    let [a, b] = two_args(name, args)?;
    Ok(Value::Bool((a == b) == expect_equal))
}

fn order(name: &str, a: &Value, b: &Value) -> Result<Ordering, RuntimeError> {
    match (a, b) {
        (Value::Str(x), Value::Str(y)) => Ok(x.cmp(y)),
        (Value::Long(x), Value::Long(y)) => Ok(x.cmp(y)),
        _ => match numbers(name, &[a.clone(), b.clone()])? {
            Numbers::Floats(fs) => fs[0]
                .partial_cmp(&fs[1])
                .ok_or_else(|| RuntimeError::new(format!("{} cannot order NaN", name))),
            Numbers::Longs(ns) => Ok(ns[0].cmp(&ns[1])),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::script::eval::evaluate;

    fn run(source: &str) -> Value {
        let scope = Scope::new();
        install_builtins(&scope);
        evaluate(source, &scope.child()).expect("evaluation should succeed")
    }

    fn run_err(source: &str) -> String {
        let scope = Scope::new();
        install_builtins(&scope);
        evaluate(source, &scope.child())
            .expect_err("evaluation should fail")
            .to_string()
    }

    #[test]
    fn test_all_names_installed() {
        let scope = Scope::new();
        install_builtins(&scope);
        for name in BUILTIN_NAMES {
            assert!(scope.defines(name), "missing builtin {}", name);
        }
    }

    #[test]
    fn test_arithmetic() {
        assert_eq!(run("(+ 1 2 3)"), Value::Long(6));
        assert_eq!(run("(* 2 2.5)"), Value::Float(5.0));
        assert_eq!(run("(- 10 4 1)"), Value::Long(5));
        assert_eq!(run("(- 3)"), Value::Long(-3));
        assert_eq!(run("(/ 7 2)"), Value::Long(3));
        assert_eq!(run("(/ 7.0 2)"), Value::Float(3.5));
    }

    #[test]
    fn test_arithmetic_failures() {
        assert!(run_err("(/ 1 0)").contains("division by zero"));
        assert!(run_err("(+ 9223372036854775807 1)").contains("overflow"));
        assert!(run_err("(+ 1 \"a\")").contains("String"));
    }

    #[test]
    fn test_comparisons() {
        assert_eq!(run("(< 1 2)"), Value::Bool(true));
        assert_eq!(run("(>= 2 2.0)"), Value::Bool(true));
        assert_eq!(run("(< \"a\" \"b\")"), Value::Bool(true));
        assert_eq!(run("(== (list 1 2) (list 1 2))"), Value::Bool(true));
        assert_eq!(run("(!= 1 2)"), Value::Bool(true));
        assert_eq!(run("(not Nil)"), Value::Bool(true));
    }

    #[test]
    fn test_dict_operations() {
        let src = r#"
            (define d (dict "a" 1))
            (put d "b" 2)
            (list (get d "a") (get d "b") (get d "zzz") (has d "a") (len d) (keys d))
        "#;
        assert_eq!(
            run(src),
            Value::list(vec![
                Value::Long(1),
                Value::Long(2),
                Value::Nil,
                Value::Bool(true),
                Value::Long(2),
                Value::list(vec![Value::str("a"), Value::str("b")]),
            ])
        );
    }

    #[test]
    fn test_odd_dict_arguments() {
        assert!(run_err("(dict \"a\")").contains("key/value pairs"));
    }

    #[test]
    fn test_list_indexing() {
        assert_eq!(run("(get (list 10 20) 1)"), Value::Long(20));
        assert_eq!(run("(get (list 10 20) 5)"), Value::Nil);
        assert_eq!(run("(get (list 10 20) -1)"), Value::Nil);
    }

    #[test]
    fn test_str_concatenation() {
        assert_eq!(run("(str \"x=\" 1 \", ok=\" True)"), Value::str("x=1, ok=True"));
    }

    #[test]
    fn test_error_message() {
        assert!(run_err("(error \"bad \" 42)").contains("bad 42"));
    }

    #[test]
    fn test_put_requires_dict() {
        assert!(run_err("(put (list) \"a\" 1)").contains("expects a Dict"));
    }
}
