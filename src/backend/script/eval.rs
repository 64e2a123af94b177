//! Evaluation of module scripts.
//!
//! Source text goes through three stages: parsing ([`crate::sexpr`]),
//! a structural check of every special form, then evaluation. Malformed
//! special forms are rejected by the check, so a module with a structural
//! problem fails as a syntax error before any of its expressions run.
//!
//! # Special forms
//!
//! - `(define name expr)` / `(define (name params...) body...)`
//! - `(set! name expr)` - rebind an existing name
//! - `(if cond then)` / `(if cond then else)`
//! - `(do expr...)` - sequence, value of the last expression
//! - `(fn (params...) body...)` - closure
//! - `(quote expr)` / `'expr`
//! - `(and expr...)`, `(or expr...)` - short-circuiting

use tracing::trace;

use super::error::{RuntimeError, ScriptError};
use super::scope::Scope;
use super::value::{Closure, Function, Value};
use crate::sexpr::{parse_source, SExpr, SExprKind, SyntaxError, MAX_NESTING};
use std::cell::Cell;
use std::rc::Rc;

/// Maximum number of nested evaluations on one thread, counting every
/// sub-expression, closure body and nested module body on the way. Sized
/// to fit a 2 MiB thread stack.
pub const MAX_EVAL_DEPTH: usize = 256;

thread_local! {
    /// Shared by every evaluator on the thread, so a module body loaded
    /// through `require` continues its caller's count.
    static EVAL_DEPTH: Cell<usize> = const { Cell::new(0) };
}

pub const SPECIAL_FORMS: &[&str] = &["define", "set!", "if", "do", "fn", "quote", "and", "or"];

/// Parse and check `source` without running it.
pub fn compile(source: &str) -> Result<Vec<SExpr>, SyntaxError> {
    let exprs = parse_source(source)?;
    for expr in &exprs {
        check_forms(expr, 0)?;
    }
    Ok(exprs)
}

/// Run `source` in `scope`, returning the value of its last expression.
pub fn evaluate(source: &str, scope: &Scope) -> Result<Value, ScriptError> {
    let exprs = compile(source)?;
    let mut evaluator = Evaluator::new();
    let mut last = Value::Nil;
    for expr in &exprs {
        last = evaluator.eval(expr, scope)?;
    }
    Ok(last)
}

/// Run a module body in `scope`.
pub fn execute_module(source: &str, scope: &Scope) -> Result<(), ScriptError> {
    evaluate(source, scope).map(|_| ())
}

fn is_special_form(name: &str) -> bool {
    SPECIAL_FORMS.contains(&name)
}

fn malformed(expr: &SExpr, message: impl Into<String>) -> SyntaxError {
    SyntaxError::new(expr.line, 1, message)
}

fn check_params(expr: &SExpr, params: &[SExpr], form: &str) -> Result<(), SyntaxError> {
    match params.iter().find(|p| p.as_atom().is_none()) {
        Some(bad) => Err(malformed(
            bad,
            format!("{} parameters must be symbols, found {}", form, bad),
        )),
        None if params.is_empty() && form == "define" => {
            Err(malformed(expr, "define needs a function name"))
        }
        None => Ok(()),
    }
}

/// Structural check of special forms, recursing into everything that is
/// not quoted.
fn check_forms(expr: &SExpr, depth: usize) -> Result<(), SyntaxError> {
    let items = match &expr.kind {
        SExprKind::List(items) => items,
        _ => return Ok(()),
    };
    if depth >= MAX_NESTING {
        return Err(malformed(expr, "expression nested too deeply"));
    }
    let head = items.first().and_then(SExpr::as_atom);
    let to_check: &[SExpr] = match head {
        Some("quote") => {
            if items.len() != 2 {
                return Err(malformed(expr, "quote takes exactly one expression"));
            }
            return Ok(());
        }
        Some("define") => {
            if items.len() < 3 {
                return Err(malformed(expr, "define requires a name and a value"));
            }
            match &items[1].kind {
                SExprKind::Atom(_) if items.len() == 3 => &items[2..],
                SExprKind::Atom(_) => {
                    return Err(malformed(expr, "define takes exactly one value"))
                }
                SExprKind::List(signature) => {
                    check_params(expr, signature, "define")?;
                    &items[2..]
                }
                _ => return Err(malformed(expr, "define name must be a symbol")),
            }
        }
        Some("set!") => {
            if items.len() != 3 || items[1].as_atom().is_none() {
                return Err(malformed(expr, "set! requires a symbol and a value"));
            }
            &items[2..]
        }
        Some("if") => {
            if !(3..=4).contains(&items.len()) {
                return Err(malformed(
                    expr,
                    "if requires a condition, a then branch and an optional else branch",
                ));
            }
            &items[1..]
        }
        Some("fn") => {
            let params = match items.get(1).map(|p| &p.kind) {
                Some(SExprKind::List(params)) if items.len() >= 3 => params,
                _ => return Err(malformed(expr, "fn requires a parameter list and a body")),
            };
            check_params(expr, params, "fn")?;
            &items[2..]
        }
        _ => items,
    };
    to_check
        .iter()
        .try_for_each(|item| check_forms(item, depth + 1))
}

fn quote_value(expr: &SExpr) -> Value {
    match &expr.kind {
        SExprKind::Atom(s) | SExprKind::String(s) => Value::str(s),
        SExprKind::Integer(n) => Value::Long(*n),
        SExprKind::Float(f) => Value::Float(*f),
        SExprKind::List(items) => Value::list(items.iter().map(quote_value).collect()),
        SExprKind::Quoted(inner) => quote_value(inner),
    }
}

/// Tree-walking evaluator.
#[derive(Default)]
pub struct Evaluator;

impl Evaluator {
    pub fn new() -> Self {
        Evaluator
    }

    pub fn eval(&mut self, expr: &SExpr, scope: &Scope) -> Result<Value, RuntimeError> {
        let depth = EVAL_DEPTH.with(Cell::get);
        if depth >= MAX_EVAL_DEPTH {
            return Err(RuntimeError::new(format!(
                "maximum evaluation depth of {} exceeded",
                MAX_EVAL_DEPTH
            ))
            .at_line(expr.line));
        }
        EVAL_DEPTH.with(|d| d.set(depth + 1));
        let result = self.eval_expr(expr, scope);
        EVAL_DEPTH.with(|d| d.set(depth));
        result
    }

    fn eval_expr(&mut self, expr: &SExpr, scope: &Scope) -> Result<Value, RuntimeError> {
        match &expr.kind {
            SExprKind::Integer(n) => Ok(Value::Long(*n)),
            SExprKind::Float(f) => Ok(Value::Float(*f)),
            SExprKind::String(s) => Ok(Value::str(s)),
            SExprKind::Quoted(inner) => Ok(quote_value(inner)),
            SExprKind::Atom(name) => match name.as_str() {
                "True" => Ok(Value::Bool(true)),
                "False" => Ok(Value::Bool(false)),
                "Nil" => Ok(Value::Nil),
                _ => scope.get(name).ok_or_else(|| {
                    RuntimeError::new(format!("undefined symbol '{}'", name)).at_line(expr.line)
                }),
            },
            SExprKind::List(items) => self
                .eval_list(expr, items, scope)
                .map_err(|e| e.at_line(expr.line)),
        }
    }

    fn eval_body(&mut self, body: &[SExpr], scope: &Scope) -> Result<Value, RuntimeError> {
        let mut last = Value::Nil;
        for expr in body {
            last = self.eval(expr, scope)?;
        }
        Ok(last)
    }

    fn eval_list(
        &mut self,
        expr: &SExpr,
        items: &[SExpr],
        scope: &Scope,
    ) -> Result<Value, RuntimeError> {
        let Some(head) = items.first() else {
            return Ok(Value::Nil);
        };

        if let Some(name) = head.as_atom().filter(|n| is_special_form(n)) {
            return self.eval_special(name, expr, &items[1..], scope);
        }

        let callee = self.eval(head, scope)?;
        let mut args = Vec::with_capacity(items.len() - 1);
        for arg in &items[1..] {
            args.push(self.eval(arg, scope)?);
        }
        self.apply(&callee, &args)
    }

    fn eval_special(
        &mut self,
        name: &str,
        expr: &SExpr,
        args: &[SExpr],
        scope: &Scope,
    ) -> Result<Value, RuntimeError> {
        match (name, args) {
            ("quote", [quoted]) => Ok(quote_value(quoted)),
            ("define", [target, body @ ..]) => {
                let value = match &target.kind {
                    SExprKind::List(signature) => {
                        let (fname, params) = signature
                            .split_first()
                            .ok_or_else(|| RuntimeError::new("define needs a function name"))?;
                        self.make_closure(fname.as_atom(), params, body, scope)
                    }
                    _ => match body {
                        [value] => self.eval(value, scope)?,
                        _ => return Err(RuntimeError::new("define takes exactly one value")),
                    },
                };
                let fname = match &target.kind {
                    SExprKind::List(signature) => signature.first().and_then(SExpr::as_atom),
                    _ => target.as_atom(),
                }
                .ok_or_else(|| RuntimeError::new("define name must be a symbol"))?;
                trace!(target: "scriptmods::script", symbol = fname, "define");
                scope.define(fname, value);
                Ok(Value::Nil)
            }
            ("set!", [target, value]) => {
                let name = target
                    .as_atom()
                    .ok_or_else(|| RuntimeError::new("set! requires a symbol"))?;
                let value = self.eval(value, scope)?;
                if scope.assign(name, value) {
                    Ok(Value::Nil)
                } else {
                    Err(RuntimeError::new(format!(
                        "cannot set! undefined symbol '{}'",
                        name
                    )))
                }
            }
            ("if", [cond, then, rest @ ..]) => {
                if self.eval(cond, scope)?.is_truthy() {
                    self.eval(then, scope)
                } else if let Some(otherwise) = rest.first() {
                    self.eval(otherwise, scope)
                } else {
                    Ok(Value::Nil)
                }
            }
            ("do", body) => self.eval_body(body, scope),
            ("fn", [params, body @ ..]) => match &params.kind {
                SExprKind::List(params) => Ok(self.make_closure(None, params, body, scope)),
                _ => Err(RuntimeError::new("fn requires a parameter list")),
            },
            ("and", operands) => {
                let mut last = Value::Bool(true);
                for operand in operands {
                    last = self.eval(operand, scope)?;
                    if !last.is_truthy() {
                        break;
                    }
                }
                Ok(last)
            }
            ("or", operands) => {
                let mut last = Value::Bool(false);
                for operand in operands {
                    last = self.eval(operand, scope)?;
                    if last.is_truthy() {
                        break;
                    }
                }
                Ok(last)
            }
            _ => Err(RuntimeError::new(format!("malformed {} form: {}", name, expr))),
        }
    }

    fn make_closure(
        &self,
        name: Option<&str>,
        params: &[SExpr],
        body: &[SExpr],
        scope: &Scope,
    ) -> Value {
        let params = params
            .iter()
            .filter_map(SExpr::as_atom)
            .map(str::to_string)
            .collect();
        Value::Function(Function::Closure(Rc::new(Closure {
            name: name.map(str::to_string),
            params,
            body: body.to_vec(),
            scope: scope.clone(),
        })))
    }

    /// Call `callee` with already-evaluated arguments.
    pub fn apply(&mut self, callee: &Value, args: &[Value]) -> Result<Value, RuntimeError> {
        let func = match callee {
            Value::Function(func) => func,
            other => {
                return Err(RuntimeError::new(format!(
                    "cannot call a value of type {}",
                    other.type_name()
                )))
            }
        };

        match func {
            Function::Native(native) => native.call(args),
            Function::Closure(closure) => {
                if closure.params.len() != args.len() {
                    return Err(RuntimeError::new(format!(
                        "{} expects {} argument(s), got {}",
                        func.name(),
                        closure.params.len(),
                        args.len()
                    )));
                }
                let frame = closure.scope.child();
                for (param, arg) in closure.params.iter().zip(args) {
                    frame.define(param.as_str(), arg.clone());
                }
                self.eval_body(&closure.body, &frame)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::script::builtins::install_builtins;

    fn run(source: &str) -> Result<Value, ScriptError> {
        let globals = Scope::new();
        install_builtins(&globals);
        evaluate(source, &globals.child())
    }

    #[test]
    fn test_literals() {
        assert_eq!(run("42").unwrap(), Value::Long(42));
        assert_eq!(run("\"hi\"").unwrap(), Value::str("hi"));
        assert_eq!(run("True").unwrap(), Value::Bool(true));
        assert_eq!(run("Nil").unwrap(), Value::Nil);
        assert_eq!(run("()").unwrap(), Value::Nil);
    }

    #[test]
    fn test_define_and_lookup() {
        assert_eq!(run("(define x 2) (+ x 3)").unwrap(), Value::Long(5));
    }

    #[test]
    fn test_function_definition_sugar() {
        let src = "(define (square n) (* n n)) (square 7)";
        assert_eq!(run(src).unwrap(), Value::Long(49));
    }

    #[test]
    fn test_closures_capture_scope() {
        let src = r#"
            (define (make-counter)
              (define n 0)
              (fn () (set! n (+ n 1)) n))
            (define c (make-counter))
            (c)
            (c)
        "#;
        assert_eq!(run(src).unwrap(), Value::Long(2));
    }

    #[test]
    fn test_if_branches() {
        assert_eq!(run("(if (< 1 2) \"yes\" \"no\")").unwrap(), Value::str("yes"));
        assert_eq!(run("(if False 1)").unwrap(), Value::Nil);
    }

    #[test]
    fn test_and_or_short_circuit() {
        assert_eq!(run("(and 1 False (error \"boom\"))").unwrap(), Value::Bool(false));
        assert_eq!(run("(or Nil 3 (error \"boom\"))").unwrap(), Value::Long(3));
    }

    #[test]
    fn test_quote() {
        assert_eq!(
            run("'(a 1)").unwrap(),
            Value::list(vec![Value::str("a"), Value::Long(1)])
        );
    }

    #[test]
    fn test_undefined_symbol_reports_line() {
        match run("(define a 1)\n\n(+ a b)") {
            Err(ScriptError::Runtime(e)) => {
                assert!(e.message().contains("'b'"));
                assert_eq!(e.line(), Some(3));
            }
            other => panic!("expected runtime error, got {:?}", other),
        }
    }

    #[test]
    fn test_malformed_form_is_syntax_error() {
        match run("(print \"side effect\")\n(define)") {
            Err(ScriptError::Syntax(e)) => assert_eq!(e.line, 2),
            other => panic!("expected syntax error, got {:?}", other),
        }
        assert!(matches!(run("(fn x 1)"), Err(ScriptError::Syntax(_))));
        assert!(matches!(run("(if 1)"), Err(ScriptError::Syntax(_))));
        assert!(matches!(run("(set! 3 4)"), Err(ScriptError::Syntax(_))));
    }

    #[test]
    fn test_quoted_forms_are_not_checked() {
        assert!(run("'(define)").is_ok());
    }

    #[test]
    fn test_arity_mismatch() {
        let err = run("(define (f a b) a) (f 1)").unwrap_err();
        assert!(err.to_string().contains("expects 2 argument(s), got 1"));
    }

    #[test]
    fn test_eval_depth_limit() {
        let err = run("(define (loop n) (loop n)) (loop 1)").unwrap_err();
        assert!(err.to_string().contains("maximum evaluation depth"));
    }

    #[test]
    fn test_eval_depth_limit_on_default_thread_stack() {
        let src = "(define (loop n) (do (if True (and True (or False (+ 1 (loop n))))))) (loop 1)";
        let message = std::thread::spawn(move || run(src).unwrap_err().to_string())
            .join()
            .unwrap();
        assert!(message.contains("maximum evaluation depth"));
    }

    #[test]
    fn test_depth_is_released_after_error() {
        assert!(run("(define (loop n) (loop n)) (loop 1)").is_err());
        assert_eq!(EVAL_DEPTH.with(Cell::get), 0);
        assert_eq!(run("(+ 1 2)").unwrap(), Value::Long(3));
    }

    #[test]
    fn test_nested_literals_within_depth() {
        let src = format!("{}1{}", "(do ".repeat(100), ")".repeat(100));
        assert_eq!(run(&src).unwrap(), Value::Long(1));
    }

    #[test]
    fn test_check_forms_rejects_hand_built_nesting() {
        let mut expr = SExpr::new(SExprKind::Integer(1), 1);
        for _ in 0..=MAX_NESTING {
            expr = SExpr::new(SExprKind::List(vec![expr]), 1);
        }
        let err = check_forms(&expr, 0).unwrap_err();
        assert!(err.message.contains("nested too deeply"));
    }

    #[test]
    fn test_calling_non_function() {
        let err = run("(1 2)").unwrap_err();
        assert!(err.to_string().contains("cannot call"));
    }
}
