//! Runtime values for the embedded dialect.
//!
//! Arrays and objects have reference semantics (shared, mutable), so values
//! produced by one expression and threaded through holders or loops alias
//! the same storage. Objects preserve insertion order, which `emap` and
//! `for (k in o)` rely on.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use indexmap::IndexMap;

use crate::errors::{CtError, SourceArc};
use crate::script::ast::FunctionLit;
use crate::script::eval::{Env, Evaluator};

pub type ArrayRef = Rc<RefCell<Vec<Value>>>;
pub type ObjectRef = Rc<RefCell<IndexMap<String, Value>>>;

/// A user function closed over its defining environment. The source handle
/// points at the text the function was parsed from, so evaluation errors
/// inside the body can show the right excerpt.
pub struct Closure {
    pub lit: Rc<FunctionLit>,
    pub env: Env,
    pub src: SourceArc,
}

/// A built-in function implemented in Rust.
pub struct NativeFn {
    pub name: &'static str,
    pub func: fn(&mut Evaluator, &[Value]) -> Result<Value, CtError>,
}

#[derive(Clone)]
pub enum Value {
    Null,
    Bool(bool),
    Number(f64),
    Str(String),
    Array(ArrayRef),
    Object(ObjectRef),
    Function(Rc<Closure>),
    Native(Rc<NativeFn>),
}

impl Value {
    pub fn array(items: Vec<Value>) -> Self {
        Value::Array(Rc::new(RefCell::new(items)))
    }

    pub fn object(entries: IndexMap<String, Value>) -> Self {
        Value::Object(Rc::new(RefCell::new(entries)))
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "boolean",
            Value::Number(_) => "number",
            Value::Str(_) => "string",
            Value::Array(_) => "array",
            Value::Object(_) => "object",
            Value::Function(_) | Value::Native(_) => "function",
        }
    }

    /// Null, false, 0, NaN, and the empty string are falsy.
    pub fn truthy(&self) -> bool {
        match self {
            Value::Null => false,
            Value::Bool(b) => *b,
            Value::Number(n) => *n != 0.0 && !n.is_nan(),
            Value::Str(s) => !s.is_empty(),
            _ => true,
        }
    }

    /// Strict equality. Reference types compare by identity.
    pub fn strict_eq(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Number(a), Value::Number(b)) => a == b,
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::Array(a), Value::Array(b)) => Rc::ptr_eq(a, b),
            (Value::Object(a), Value::Object(b)) => Rc::ptr_eq(a, b),
            (Value::Function(a), Value::Function(b)) => Rc::ptr_eq(a, b),
            (Value::Native(a), Value::Native(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }

    /// String conversion as used by `+` concatenation and `print`.
    pub fn to_display(&self) -> String {
        match self {
            Value::Null => "null".to_string(),
            Value::Bool(b) => b.to_string(),
            Value::Number(n) => fmt_number(*n),
            Value::Str(s) => s.clone(),
            Value::Array(items) => {
                let items = items.borrow();
                items
                    .iter()
                    .map(|v| match v {
                        Value::Null => String::new(),
                        other => other.to_display(),
                    })
                    .collect::<Vec<_>>()
                    .join(",")
            }
            Value::Object(_) => "[object Object]".to_string(),
            Value::Function(f) => f.lit.source.clone(),
            Value::Native(f) => format!("function {}() {{ [native] }}", f.name),
        }
    }

    /// Renders the value back to dialect source text that evaluates to an
    /// equal value. Used when splicing data into generated code.
    pub fn to_source(&self) -> String {
        match self {
            Value::Null => "null".to_string(),
            Value::Bool(b) => b.to_string(),
            Value::Number(n) => fmt_number(*n),
            Value::Str(s) => quote_str(s),
            Value::Array(items) => {
                let items = items.borrow();
                let body = items
                    .iter()
                    .map(Value::to_source)
                    .collect::<Vec<_>>()
                    .join(", ");
                format!("[{}]", body)
            }
            Value::Object(entries) => {
                let entries = entries.borrow();
                let body = entries
                    .iter()
                    .map(|(k, v)| format!("{} : {}", k, v.to_source()))
                    .collect::<Vec<_>>()
                    .join(", ");
                format!("{{{}}}", body)
            }
            Value::Function(f) => f.lit.source.clone(),
            Value::Native(f) => format!("function {}() {{ [native] }}", f.name),
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_source())
    }
}

/// Formats a number the way the dialect prints it: whole values render
/// without a fractional part, everything else uses the shortest exact form.
pub fn fmt_number(n: f64) -> String {
    if n.is_nan() {
        return "NaN".to_string();
    }
    if n.is_infinite() {
        return if n > 0.0 { "Infinity" } else { "-Infinity" }.to_string();
    }
    if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        format!("{}", n)
    }
}

/// Quotes a string as a double-quoted dialect literal.
pub fn quote_str(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            '\r' => out.push_str("\\r"),
            other => out.push(other),
        }
    }
    out.push('"');
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn whole_numbers_render_without_fraction() {
        assert_eq!(fmt_number(1.0), "1");
        assert_eq!(fmt_number(-27.0), "-27");
        assert_eq!(fmt_number(6.9), "6.9");
        assert_eq!(fmt_number(-13.5), "-13.5");
    }

    #[test]
    fn truthiness_matches_dialect_rules() {
        assert!(!Value::Null.truthy());
        assert!(!Value::Bool(false).truthy());
        assert!(!Value::Number(0.0).truthy());
        assert!(!Value::Number(f64::NAN).truthy());
        assert!(!Value::Str(String::new()).truthy());
        assert!(Value::Number(-1.0).truthy());
        assert!(Value::array(vec![]).truthy());
    }

    #[test]
    fn reference_types_compare_by_identity() {
        let a = Value::array(vec![Value::Number(1.0)]);
        let b = Value::array(vec![Value::Number(1.0)]);
        assert!(!a.strict_eq(&b));
        assert!(a.strict_eq(&a.clone()));
    }

    #[test]
    fn to_source_round_trips_literals() {
        let v = Value::array(vec![
            Value::Number(1.0),
            Value::Str("a\"b".to_string()),
            Value::Null,
        ]);
        assert_eq!(v.to_source(), r#"[1, "a\"b", null]"#);
    }
}
