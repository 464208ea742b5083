//! Tree-walking evaluator for the embedded dialect.
//!
//! The evaluator owns a global scope and an output sink. Expansion-time
//! code (`def` bodies, `mix` expressions, generator calls) and fully
//! expanded programs both run through the same machinery.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;
use std::sync::Arc;

use indexmap::IndexMap;

use crate::errors::{eval_error, CtError, ErrorContext, SourceArc, Span, to_error_source};
use crate::script::ast::{
    AssignOp, BinOp, Declarator, Expr, ForInit, LogicalOp, SpExpr, SpStmt, Stmt, UnaryOp, UpdateOp,
};
use crate::script::parser::{parse_expression, parse_program};
use crate::script::value::{fmt_number, Closure, NativeFn, Value};

// Each dialect call nests several Rust frames, so the limit stays well
// inside the native stack even in debug builds.
const MAX_CALL_DEPTH: usize = 64;

// ---------------------------------------------------------------------------
// Output sinks

/// Destination for `print` output.
pub trait OutputSink {
    fn emit(&mut self, text: &str);
}

/// Swallows all output. Used when expansion should be silent.
pub struct NullSink;

impl OutputSink for NullSink {
    fn emit(&mut self, _text: &str) {}
}

pub struct StdoutSink;

impl OutputSink for StdoutSink {
    fn emit(&mut self, text: &str) {
        println!("{}", text);
    }
}

/// Collects output into a shared string buffer, for tests and for the
/// CLI's captured-run mode.
pub struct BufferSink {
    buffer: Rc<RefCell<String>>,
}

impl BufferSink {
    pub fn new() -> (Self, Rc<RefCell<String>>) {
        let buffer = Rc::new(RefCell::new(String::new()));
        (
            Self {
                buffer: Rc::clone(&buffer),
            },
            buffer,
        )
    }
}

impl OutputSink for BufferSink {
    fn emit(&mut self, text: &str) {
        let mut buffer = self.buffer.borrow_mut();
        buffer.push_str(text);
        buffer.push('\n');
    }
}

// ---------------------------------------------------------------------------
// Scopes

/// A lexical scope. Child scopes chain to their parent.
pub struct Scope {
    vars: HashMap<String, Value>,
    parent: Option<Env>,
}

pub type Env = Rc<RefCell<Scope>>;

/// Creates a child scope of `parent`.
pub fn child_env(parent: &Env) -> Env {
    Rc::new(RefCell::new(Scope {
        vars: HashMap::new(),
        parent: Some(Rc::clone(parent)),
    }))
}

fn root_env() -> Env {
    Rc::new(RefCell::new(Scope {
        vars: HashMap::new(),
        parent: None,
    }))
}

/// Looks `name` up in `env` itself, without walking to parent scopes.
pub fn env_get_local(env: &Env, name: &str) -> Option<Value> {
    env.borrow().vars.get(name).cloned()
}

/// Looks `name` up through the scope chain.
pub fn env_get(env: &Env, name: &str) -> Option<Value> {
    let scope = env.borrow();
    if let Some(v) = scope.vars.get(name) {
        return Some(v.clone());
    }
    scope.parent.as_ref().and_then(|p| env_get(p, name))
}

/// Defines `name` in `env` itself, shadowing any outer binding.
pub fn env_define(env: &Env, name: &str, value: Value) {
    env.borrow_mut().vars.insert(name.to_string(), value);
}

/// Assigns to an existing binding if one is in scope, otherwise creates the
/// binding in `env`.
pub fn env_assign(env: &Env, name: &str, value: Value) {
    if env_assign_existing(env, name, &value) {
        return;
    }
    env_define(env, name, value);
}

fn env_assign_existing(env: &Env, name: &str, value: &Value) -> bool {
    let mut scope = env.borrow_mut();
    if let Some(slot) = scope.vars.get_mut(name) {
        *slot = value.clone();
        return true;
    }
    match scope.parent.as_ref() {
        Some(parent) => {
            let parent = Rc::clone(parent);
            drop(scope);
            env_assign_existing(&parent, name, value)
        }
        None => false,
    }
}

// ---------------------------------------------------------------------------
// Evaluator

enum Flow {
    Normal,
    Return(Value),
}

pub struct Evaluator {
    globals: Env,
    output: Box<dyn OutputSink>,
    depth: usize,
    current_src: SourceArc,
}

impl Evaluator {
    pub fn new() -> Self {
        Self::with_output(Box::new(NullSink))
    }

    pub fn with_output(output: Box<dyn OutputSink>) -> Self {
        let globals = root_env();
        env_define(
            &globals,
            "print",
            Value::Native(Rc::new(NativeFn {
                name: "print",
                func: native_print,
            })),
        );
        Self {
            globals,
            output,
            depth: 0,
            current_src: to_error_source("<empty>", ""),
        }
    }

    pub fn globals(&self) -> Env {
        Rc::clone(&self.globals)
    }

    pub fn set_output(&mut self, output: Box<dyn OutputSink>) {
        self.output = output;
    }

    /// Executes `source` as a statement list in the global scope. Yields the
    /// value of the last top-level expression statement, or null.
    pub fn run(&mut self, source: &str, name: &str) -> Result<Value, CtError> {
        let env = self.globals();
        self.run_in(source, name, &env)
    }

    /// Executes `source` as a statement list in `env`.
    pub fn run_in(&mut self, source: &str, name: &str, env: &Env) -> Result<Value, CtError> {
        let src = to_error_source(name, source);
        let stmts = parse_program(source, &src)?;
        let saved = std::mem::replace(&mut self.current_src, src);
        let result = self.exec_stmts(&stmts, env);
        self.current_src = saved;
        result
    }

    /// Evaluates `source` as a single expression in the global scope.
    pub fn eval_source(&mut self, source: &str, name: &str) -> Result<Value, CtError> {
        let env = self.globals();
        self.eval_in(source, name, &env)
    }

    /// Evaluates `source` as a single expression in `env`.
    pub fn eval_in(&mut self, source: &str, name: &str, env: &Env) -> Result<Value, CtError> {
        let src = to_error_source(name, source);
        let expr = parse_expression(source, &src)?;
        let saved = std::mem::replace(&mut self.current_src, src);
        let result = self.eval_expr(&expr, env);
        self.current_src = saved;
        result
    }

    /// Calls a function value with already-evaluated arguments.
    pub fn call_function(&mut self, func: &Value, args: &[Value]) -> Result<Value, CtError> {
        match func {
            Value::Function(closure) => self.call_closure(closure, args, None),
            Value::Native(native) => (native.func)(self, args),
            other => Err(self.err_plain(format!(
                "cannot call a value of type {}",
                other.type_name()
            ))),
        }
    }

    pub fn emit(&mut self, text: &str) {
        self.output.emit(text);
    }

    // --- statements ---

    fn exec_stmts(&mut self, stmts: &[SpStmt], env: &Env) -> Result<Value, CtError> {
        let mut last = Value::Null;
        for stmt in stmts {
            // The value of the last top-level expression statement is the
            // result of the whole run.
            if let Stmt::Expr(e) = &stmt.node {
                last = self.eval_expr(e, env)?;
                continue;
            }
            match self.exec_stmt(stmt, env)? {
                Flow::Return(v) => return Ok(v),
                Flow::Normal => {}
            }
        }
        Ok(last)
    }

    fn exec_stmt(&mut self, stmt: &SpStmt, env: &Env) -> Result<Flow, CtError> {
        match &stmt.node {
            Stmt::Empty => Ok(Flow::Normal),
            Stmt::Expr(e) => {
                self.eval_expr(e, env)?;
                Ok(Flow::Normal)
            }
            Stmt::Var(decls) => {
                self.exec_declarators(decls, env)?;
                Ok(Flow::Normal)
            }
            Stmt::Return(value) => {
                let v = match value {
                    Some(e) => self.eval_expr(e, env)?,
                    None => Value::Null,
                };
                Ok(Flow::Return(v))
            }
            Stmt::Block(stmts) => {
                let inner = child_env(env);
                self.exec_block(stmts, &inner)
            }
            Stmt::If {
                cond,
                then_branch,
                else_branch,
            } => {
                if self.eval_expr(cond, env)?.truthy() {
                    self.exec_stmt(then_branch, env)
                } else if let Some(else_branch) = else_branch {
                    self.exec_stmt(else_branch, env)
                } else {
                    Ok(Flow::Normal)
                }
            }
            Stmt::For {
                init,
                cond,
                update,
                body,
            } => {
                let loop_env = child_env(env);
                match init {
                    ForInit::Var(decls) => self.exec_declarators(decls, &loop_env)?,
                    ForInit::Expr(e) => {
                        self.eval_expr(e, &loop_env)?;
                    }
                    ForInit::None => {}
                }
                loop {
                    if let Some(cond) = cond {
                        if !self.eval_expr(cond, &loop_env)?.truthy() {
                            break;
                        }
                    }
                    if let Flow::Return(v) = self.exec_stmt(body, &loop_env)? {
                        return Ok(Flow::Return(v));
                    }
                    if let Some(update) = update {
                        self.eval_expr(update, &loop_env)?;
                    }
                }
                Ok(Flow::Normal)
            }
            Stmt::ForIn {
                decl,
                var,
                object,
                body,
            } => {
                let target = self.eval_expr(object, env)?;
                let keys: Vec<String> = match &target {
                    Value::Object(entries) => entries.borrow().keys().cloned().collect(),
                    Value::Array(items) => {
                        (0..items.borrow().len()).map(|i| i.to_string()).collect()
                    }
                    Value::Null => Vec::new(),
                    other => {
                        return Err(self.err(
                            object.span,
                            format!("cannot enumerate a value of type {}", other.type_name()),
                        ))
                    }
                };
                let loop_env = child_env(env);
                for key in keys {
                    if *decl {
                        env_define(&loop_env, var, Value::Str(key));
                    } else {
                        env_assign(&loop_env, var, Value::Str(key));
                    }
                    if let Flow::Return(v) = self.exec_stmt(body, &loop_env)? {
                        return Ok(Flow::Return(v));
                    }
                }
                Ok(Flow::Normal)
            }
            Stmt::FunctionDecl(lit) => {
                let name = lit
                    .name
                    .clone()
                    .ok_or_else(|| self.err(stmt.span, "function declaration requires a name"))?;
                let closure = Value::Function(Rc::new(Closure {
                    lit: Rc::clone(lit),
                    env: Rc::clone(env),
                    src: Arc::clone(&self.current_src),
                }));
                env_define(env, &name, closure);
                Ok(Flow::Normal)
            }
        }
    }

    fn exec_block(&mut self, stmts: &[SpStmt], env: &Env) -> Result<Flow, CtError> {
        for stmt in stmts {
            if let Flow::Return(v) = self.exec_stmt(stmt, env)? {
                return Ok(Flow::Return(v));
            }
        }
        Ok(Flow::Normal)
    }

    fn exec_declarators(&mut self, decls: &[Declarator], env: &Env) -> Result<(), CtError> {
        for decl in decls {
            let value = match &decl.init {
                Some(e) => self.eval_expr(e, env)?,
                None => Value::Null,
            };
            env_define(env, &decl.name, value);
        }
        Ok(())
    }

    // --- expressions ---

    fn eval_expr(&mut self, expr: &SpExpr, env: &Env) -> Result<Value, CtError> {
        match &expr.node {
            Expr::Null => Ok(Value::Null),
            Expr::Bool(b) => Ok(Value::Bool(*b)),
            Expr::Number(n) => Ok(Value::Number(*n)),
            Expr::Str(s) => Ok(Value::Str(s.clone())),
            Expr::Ident(name) => env_get(env, name)
                .ok_or_else(|| self.err(expr.span, format!("undefined variable '{}'", name))),
            Expr::Array(items) => {
                let mut values = Vec::with_capacity(items.len());
                for item in items {
                    values.push(self.eval_expr(item, env)?);
                }
                Ok(Value::array(values))
            }
            Expr::Object(entries) => {
                let mut map = IndexMap::with_capacity(entries.len());
                for (key, value) in entries {
                    map.insert(key.clone(), self.eval_expr(value, env)?);
                }
                Ok(Value::object(map))
            }
            Expr::Function(lit) => Ok(Value::Function(Rc::new(Closure {
                lit: Rc::clone(lit),
                env: Rc::clone(env),
                src: Arc::clone(&self.current_src),
            }))),
            Expr::Unary(op, operand) => {
                let v = self.eval_expr(operand, env)?;
                match op {
                    UnaryOp::Not => Ok(Value::Bool(!v.truthy())),
                    UnaryOp::Neg => Ok(Value::Number(-self.want_number(&v, operand.span)?)),
                    UnaryOp::Pos => Ok(Value::Number(self.want_number(&v, operand.span)?)),
                }
            }
            Expr::Update(op, prefix, target) => {
                let old = self.eval_expr(target, env)?;
                let old_n = self.want_number(&old, target.span)?;
                let new_n = match op {
                    UpdateOp::Incr => old_n + 1.0,
                    UpdateOp::Decr => old_n - 1.0,
                };
                self.assign_to(target, Value::Number(new_n), env)?;
                Ok(Value::Number(if *prefix { new_n } else { old_n }))
            }
            Expr::Binary(op, lhs, rhs) => {
                let a = self.eval_expr(lhs, env)?;
                let b = self.eval_expr(rhs, env)?;
                self.eval_binary(*op, a, b, expr.span)
            }
            Expr::Logical(op, lhs, rhs) => {
                let a = self.eval_expr(lhs, env)?;
                match op {
                    LogicalOp::And => {
                        if a.truthy() {
                            self.eval_expr(rhs, env)
                        } else {
                            Ok(a)
                        }
                    }
                    LogicalOp::Or => {
                        if a.truthy() {
                            Ok(a)
                        } else {
                            self.eval_expr(rhs, env)
                        }
                    }
                }
            }
            Expr::Assign(op, target, value) => {
                let rhs = self.eval_expr(value, env)?;
                let result = match op {
                    AssignOp::Assign => rhs,
                    AssignOp::AddAssign => {
                        let old = self.eval_expr(target, env)?;
                        self.eval_binary(BinOp::Add, old, rhs, expr.span)?
                    }
                    AssignOp::SubAssign => {
                        let old = self.eval_expr(target, env)?;
                        self.eval_binary(BinOp::Sub, old, rhs, expr.span)?
                    }
                    AssignOp::MulAssign => {
                        let old = self.eval_expr(target, env)?;
                        self.eval_binary(BinOp::Mul, old, rhs, expr.span)?
                    }
                    AssignOp::DivAssign => {
                        let old = self.eval_expr(target, env)?;
                        self.eval_binary(BinOp::Div, old, rhs, expr.span)?
                    }
                };
                self.assign_to(target, result.clone(), env)?;
                Ok(result)
            }
            Expr::Conditional(cond, then_branch, else_branch) => {
                if self.eval_expr(cond, env)?.truthy() {
                    self.eval_expr(then_branch, env)
                } else {
                    self.eval_expr(else_branch, env)
                }
            }
            Expr::Call(callee, args) => {
                let func = self.eval_expr(callee, env)?;
                let mut values = Vec::with_capacity(args.len());
                for arg in args {
                    values.push(self.eval_expr(arg, env)?);
                }
                match &func {
                    Value::Function(closure) => {
                        self.call_closure(closure, &values, Some(callee.span))
                    }
                    Value::Native(native) => (native.func)(self, &values),
                    other => Err(self.err(
                        callee.span,
                        format!("cannot call a value of type {}", other.type_name()),
                    )),
                }
            }
            Expr::Member(object, name) => {
                let target = self.eval_expr(object, env)?;
                self.read_member(&target, name, object.span)
            }
            Expr::Index(object, index) => {
                let target = self.eval_expr(object, env)?;
                let key = self.eval_expr(index, env)?;
                self.read_index(&target, &key, expr.span)
            }
            Expr::Sequence(items) => {
                let mut last = Value::Null;
                for item in items {
                    last = self.eval_expr(item, env)?;
                }
                Ok(last)
            }
        }
    }

    fn call_closure(
        &mut self,
        closure: &Rc<Closure>,
        args: &[Value],
        call_span: Option<Span>,
    ) -> Result<Value, CtError> {
        if self.depth >= MAX_CALL_DEPTH {
            let span = call_span.unwrap_or_default();
            return Err(self.err(span, "call depth limit exceeded"));
        }
        let frame = child_env(&closure.env);
        for (i, param) in closure.lit.params.iter().enumerate() {
            let value = args.get(i).cloned().unwrap_or(Value::Null);
            env_define(&frame, param, value);
        }
        let saved_src = std::mem::replace(&mut self.current_src, Arc::clone(&closure.src));
        self.depth += 1;
        let mut result = Ok(Value::Null);
        for stmt in &closure.lit.body {
            match self.exec_stmt(stmt, &frame) {
                Ok(Flow::Return(v)) => {
                    result = Ok(v);
                    break;
                }
                Ok(Flow::Normal) => {}
                Err(e) => {
                    result = Err(e);
                    break;
                }
            }
        }
        self.depth -= 1;
        self.current_src = saved_src;
        result
    }

    fn eval_binary(&self, op: BinOp, a: Value, b: Value, span: Span) -> Result<Value, CtError> {
        match op {
            BinOp::Add => match (&a, &b) {
                (Value::Str(_), _) | (_, Value::Str(_)) => {
                    Ok(Value::Str(format!("{}{}", a.to_display(), b.to_display())))
                }
                (Value::Number(x), Value::Number(y)) => Ok(Value::Number(x + y)),
                _ => Err(self.err(
                    span,
                    format!("cannot add {} and {}", a.type_name(), b.type_name()),
                )),
            },
            BinOp::Sub | BinOp::Mul | BinOp::Div | BinOp::Rem => {
                let x = self.want_number(&a, span)?;
                let y = self.want_number(&b, span)?;
                Ok(Value::Number(match op {
                    BinOp::Sub => x - y,
                    BinOp::Mul => x * y,
                    BinOp::Div => x / y,
                    BinOp::Rem => x % y,
                    _ => unreachable!(),
                }))
            }
            BinOp::Lt | BinOp::Le | BinOp::Gt | BinOp::Ge => match (&a, &b) {
                (Value::Number(x), Value::Number(y)) => Ok(Value::Bool(match op {
                    BinOp::Lt => x < y,
                    BinOp::Le => x <= y,
                    BinOp::Gt => x > y,
                    BinOp::Ge => x >= y,
                    _ => unreachable!(),
                })),
                (Value::Str(x), Value::Str(y)) => Ok(Value::Bool(match op {
                    BinOp::Lt => x < y,
                    BinOp::Le => x <= y,
                    BinOp::Gt => x > y,
                    BinOp::Ge => x >= y,
                    _ => unreachable!(),
                })),
                _ => Err(self.err(
                    span,
                    format!("cannot compare {} and {}", a.type_name(), b.type_name()),
                )),
            },
            BinOp::Eq | BinOp::StrictEq => Ok(Value::Bool(a.strict_eq(&b))),
            BinOp::Ne | BinOp::StrictNe => Ok(Value::Bool(!a.strict_eq(&b))),
            BinOp::In => {
                let key = match &a {
                    Value::Str(s) => s.clone(),
                    Value::Number(n) => fmt_number(*n),
                    other => {
                        return Err(self.err(
                            span,
                            format!("'in' key must be a string, got {}", other.type_name()),
                        ))
                    }
                };
                match &b {
                    Value::Object(entries) => Ok(Value::Bool(entries.borrow().contains_key(&key))),
                    Value::Array(items) => {
                        let present = key
                            .parse::<usize>()
                            .map(|i| i < items.borrow().len())
                            .unwrap_or(false);
                        Ok(Value::Bool(present))
                    }
                    other => Err(self.err(
                        span,
                        format!("'in' target must be an object, got {}", other.type_name()),
                    )),
                }
            }
        }
    }

    fn read_member(&self, target: &Value, name: &str, span: Span) -> Result<Value, CtError> {
        match target {
            Value::Object(entries) => {
                Ok(entries.borrow().get(name).cloned().unwrap_or(Value::Null))
            }
            Value::Array(items) => match name {
                "length" => Ok(Value::Number(items.borrow().len() as f64)),
                _ => Ok(Value::Null),
            },
            Value::Str(s) => match name {
                "length" => Ok(Value::Number(s.chars().count() as f64)),
                _ => Ok(Value::Null),
            },
            Value::Null => Err(self.err(
                span,
                format!("cannot read property '{}' of null", name),
            )),
            other => Err(self.err(
                span,
                format!(
                    "cannot read property '{}' of a {}",
                    name,
                    other.type_name()
                ),
            )),
        }
    }

    fn read_index(&self, target: &Value, key: &Value, span: Span) -> Result<Value, CtError> {
        match (target, key) {
            (Value::Array(items), Value::Number(n)) => {
                let items = items.borrow();
                let i = *n as usize;
                if n.fract() == 0.0 && *n >= 0.0 && i < items.len() {
                    Ok(items[i].clone())
                } else {
                    Ok(Value::Null)
                }
            }
            (Value::Array(_), Value::Str(s)) => self.read_member(target, s, span),
            (Value::Object(_), _) => {
                let name = match key {
                    Value::Str(s) => s.clone(),
                    Value::Number(n) => fmt_number(*n),
                    other => {
                        return Err(self.err(
                            span,
                            format!("object index must be a string, got {}", other.type_name()),
                        ))
                    }
                };
                self.read_member(target, &name, span)
            }
            (Value::Str(s), Value::Number(n)) => {
                let i = *n as usize;
                if n.fract() == 0.0 && *n >= 0.0 {
                    Ok(s.chars()
                        .nth(i)
                        .map(|c| Value::Str(c.to_string()))
                        .unwrap_or(Value::Null))
                } else {
                    Ok(Value::Null)
                }
            }
            (Value::Str(s), Value::Str(name)) => self.read_member(&Value::Str(s.clone()), name, span),
            (Value::Null, _) => Err(self.err(span, "cannot index null")),
            (other, _) => Err(self.err(
                span,
                format!("cannot index a value of type {}", other.type_name()),
            )),
        }
    }

    fn assign_to(&mut self, target: &SpExpr, value: Value, env: &Env) -> Result<(), CtError> {
        match &target.node {
            Expr::Ident(name) => {
                env_assign(env, name, value);
                Ok(())
            }
            Expr::Member(object, name) => {
                let container = self.eval_expr(object, env)?;
                self.write_member(&container, name, value, target.span)
            }
            Expr::Index(object, index) => {
                let container = self.eval_expr(object, env)?;
                let key = self.eval_expr(index, env)?;
                match (&container, &key) {
                    (Value::Array(items), Value::Number(n)) => {
                        let mut items = items.borrow_mut();
                        let i = *n as usize;
                        if n.fract() != 0.0 || *n < 0.0 {
                            return Err(
                                self.err(target.span, "array index must be a whole number")
                            );
                        }
                        while items.len() <= i {
                            items.push(Value::Null);
                        }
                        items[i] = value;
                        Ok(())
                    }
                    _ => {
                        let name = match &key {
                            Value::Str(s) => s.clone(),
                            Value::Number(n) => fmt_number(*n),
                            other => {
                                return Err(self.err(
                                    target.span,
                                    format!(
                                        "object index must be a string, got {}",
                                        other.type_name()
                                    ),
                                ))
                            }
                        };
                        self.write_member(&container, &name, value, target.span)
                    }
                }
            }
            _ => Err(self.err(target.span, "invalid assignment target")),
        }
    }

    fn write_member(
        &self,
        container: &Value,
        name: &str,
        value: Value,
        span: Span,
    ) -> Result<(), CtError> {
        match container {
            Value::Object(entries) => {
                entries.borrow_mut().insert(name.to_string(), value);
                Ok(())
            }
            Value::Null => Err(self.err(
                span,
                format!("cannot set property '{}' of null", name),
            )),
            other => Err(self.err(
                span,
                format!(
                    "cannot set property '{}' of a {}",
                    name,
                    other.type_name()
                ),
            )),
        }
    }

    fn want_number(&self, v: &Value, span: Span) -> Result<f64, CtError> {
        match v {
            Value::Number(n) => Ok(*n),
            other => Err(self.err(
                span,
                format!("expected a number, got {}", other.type_name()),
            )),
        }
    }

    fn err(&self, span: Span, message: impl Into<String>) -> CtError {
        eval_error(message, ErrorContext::at(&self.current_src, span))
    }

    fn err_plain(&self, message: impl Into<String>) -> CtError {
        eval_error(message, ErrorContext::none())
    }
}

impl Default for Evaluator {
    fn default() -> Self {
        Self::new()
    }
}

fn native_print(ev: &mut Evaluator, args: &[Value]) -> Result<Value, CtError> {
    let text = args
        .iter()
        .map(Value::to_display)
        .collect::<Vec<_>>()
        .join(" ");
    ev.emit(&text);
    Ok(Value::Null)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn eval(source: &str) -> Value {
        let mut ev = Evaluator::new();
        ev.eval_source(source, "test").unwrap()
    }

    fn run(source: &str) -> Value {
        let mut ev = Evaluator::new();
        ev.run(source, "test").unwrap()
    }

    fn as_number(v: Value) -> f64 {
        match v {
            Value::Number(n) => n,
            other => panic!("expected number, got {:?}", other),
        }
    }

    #[test]
    fn arithmetic_and_precedence() {
        assert_eq!(as_number(eval("1 + 2 * 3")), 7.0);
        assert_eq!(as_number(eval("(1 + 2) * 3")), 9.0);
        assert_eq!(as_number(eval("7 % 4")), 3.0);
    }

    #[test]
    fn string_concatenation_coerces() {
        match eval("'n = ' + 3") {
            Value::Str(s) => assert_eq!(s, "n = 3"),
            other => panic!("expected string, got {:?}", other),
        }
        match eval("'' + 6.9") {
            Value::Str(s) => assert_eq!(s, "6.9"),
            other => panic!("expected string, got {:?}", other),
        }
    }

    #[test]
    fn counted_for_loop_accumulates() {
        let v = run("var total = 0; for (var i = 0; i < 5; i++) { total += i; } total;");
        assert_eq!(as_number(v), 10.0);
    }

    #[test]
    fn for_in_visits_keys_in_insertion_order() {
        let v = run("var o = {b : 1, a : 2, c : 3}; var keys = ''; for (var k in o) { keys = keys + k; } keys;");
        match v {
            Value::Str(s) => assert_eq!(s, "bac"),
            other => panic!("expected string, got {:?}", other),
        }
    }

    #[test]
    fn functions_close_over_environment() {
        let v = run("var n = 10; function addN(x) { return x + n; } addN(5);");
        assert_eq!(as_number(v), 15.0);
    }

    #[test]
    fn missing_object_key_reads_null() {
        let v = eval("({a : 1}).b");
        assert!(matches!(v, Value::Null));
    }

    #[test]
    fn member_access_on_null_is_an_error() {
        let mut ev = Evaluator::new();
        let err = ev.eval_source("null.a", "test").unwrap_err();
        assert_eq!(err.error_type(), crate::errors::ErrorType::Eval);
    }

    #[test]
    fn logical_operators_return_operand_values() {
        assert!(matches!(eval("null && 1"), Value::Null));
        assert_eq!(as_number(eval("null || 2")), 2.0);
        assert_eq!(as_number(eval("1 && 2")), 2.0);
    }

    #[test]
    fn sequence_yields_last_value() {
        let v = eval("(a = 1, b = a + 1, b * 10)");
        assert_eq!(as_number(v), 20.0);
    }

    #[test]
    fn arrays_share_storage() {
        let v = run("var a = [1, 2]; var b = a; b[0] = 9; a[0];");
        assert_eq!(as_number(v), 9.0);
    }

    #[test]
    fn print_writes_to_sink() {
        let (sink, buffer) = BufferSink::new();
        let mut ev = Evaluator::with_output(Box::new(sink));
        ev.run("print('x', 1 + 2);", "test").unwrap();
        assert_eq!(buffer.borrow().as_str(), "x 3\n");
    }

    #[test]
    fn recursion_depth_is_limited() {
        let mut ev = Evaluator::new();
        let err = ev
            .run("function f() { return f(); } f();", "test")
            .unwrap_err();
        assert_eq!(err.error_type(), crate::errors::ErrorType::Eval);
    }
}
