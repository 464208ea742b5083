//! Definition and evaluation macros: `def`, `mix`, `map`, `emap`.

use crate::builtins::{is_ident, split_once_top_level};
use crate::errors::{
    eval_error, malformed_argument, missing_name, must_be_function, unknown_macro, CtError,
    ErrorContext,
};
use crate::registry::{resolve, ExpansionCtx, Resolution};
use crate::scanner::Invocation;
use crate::script::value::fmt_number;
use crate::script::Value;

fn ctx_at(ctx: &ExpansionCtx<'_>, inv: &Invocation) -> ErrorContext {
    ErrorContext::at(ctx.src, inv.span)
}

/// `ct.def(function name(..) {..})` or `ct.def(name, <function expr>)`.
/// Registers a generator in the expansion-local cache and emits nothing.
pub fn def(ctx: &mut ExpansionCtx<'_>, inv: &Invocation) -> Result<String, CtError> {
    let text = inv.args.trim();

    if is_function_literal(text) {
        let value = ctx
            .evaluator
            .eval_in(text, "ct.def argument", ctx.cache.env())?;
        let closure = match &value {
            Value::Function(closure) => closure,
            other => {
                return Err(must_be_function(&inv.name, other.type_name(), ctx_at(ctx, inv)))
            }
        };
        let name = match &closure.lit.name {
            Some(name) => name.clone(),
            None => {
                return Err(missing_name(&inv.name, ctx_at(ctx, inv).with_help(
                    "give the function a name, or use the 'ct.def(name, expr)' form",
                )))
            }
        };
        ctx.cache.define(&name, value);
        return Ok(String::new());
    }

    let (name, rest) = split_once_top_level(text, ',').ok_or_else(|| {
        malformed_argument(
            &inv.name,
            "expected 'function name(..) {..}' or 'name, <function expression>'",
            ctx_at(ctx, inv),
        )
    })?;
    let name = name.trim();
    if name.is_empty() {
        return Err(missing_name(&inv.name, ctx_at(ctx, inv)));
    }
    if !is_ident(name) {
        return Err(malformed_argument(
            &inv.name,
            format!("'{}' is not a valid generator name", name),
            ctx_at(ctx, inv),
        ));
    }
    let value = ctx
        .evaluator
        .eval_in(rest, "ct.def argument", ctx.cache.env())?;
    match &value {
        Value::Function(_) | Value::Native(_) => {}
        other => return Err(must_be_function(&inv.name, other.type_name(), ctx_at(ctx, inv))),
    }
    ctx.cache.define(name, value);
    Ok(String::new())
}

fn is_function_literal(text: &str) -> bool {
    match text.strip_prefix("function") {
        Some(rest) => !rest
            .as_bytes()
            .first()
            .is_some_and(|b| b.is_ascii_alphanumeric() || *b == b'_' || *b == b'$'),
        None => false,
    }
}

/// `ct.mix(expr)` evaluates the argument at expansion time and splices the
/// result in as text.
pub fn mix(ctx: &mut ExpansionCtx<'_>, inv: &Invocation) -> Result<String, CtError> {
    let value = ctx
        .evaluator
        .eval_in(&inv.args, "ct.mix argument", ctx.cache.env())?;
    render_splice(&value)
        .ok_or_else(|| {
            eval_error(
                format!(
                    "'ct.mix' must produce text, a number, or a boolean, got {}",
                    value.type_name()
                ),
                ctx_at(ctx, inv),
            )
        })
}

fn render_splice(value: &Value) -> Option<String> {
    match value {
        Value::Str(s) => Some(s.clone()),
        Value::Number(n) => Some(fmt_number(*n)),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// `ct.map(generator)(data)` applies a generator over an array literal and
/// emits an array of the generated pieces.
pub fn map(ctx: &mut ExpansionCtx<'_>, inv: &Invocation) -> Result<String, CtError> {
    expand_map(ctx, inv, false)
}

/// `ct.emap(generator)(data)`: `map` extended to object literals, with the
/// insertion order of entries preserved in the output.
pub fn emap(ctx: &mut ExpansionCtx<'_>, inv: &Invocation) -> Result<String, CtError> {
    expand_map(ctx, inv, true)
}

fn expand_map(
    ctx: &mut ExpansionCtx<'_>,
    inv: &Invocation,
    allow_objects: bool,
) -> Result<String, CtError> {
    let (name, rest) = inv.args.split_once(')').ok_or_else(|| {
        malformed_argument(&inv.name, "expected 'generator)(data'", ctx_at(ctx, inv))
    })?;
    let name = name.trim();
    if name.is_empty() {
        return Err(missing_name(&inv.name, ctx_at(ctx, inv)));
    }
    let rest = rest.trim();
    if rest.is_empty() {
        return Err(malformed_argument(
            &inv.name,
            "missing data literal after the generator",
            ctx_at(ctx, inv),
        ));
    }

    // The scanner consumed the closing paren of the data literal; put it
    // back so the remainder parses as a parenthesized expression.
    let data_text = format!("{})", rest);
    let data = ctx
        .evaluator
        .eval_in(&data_text, "map data", ctx.cache.env())?;

    let generator =
        resolve(name, ctx.cache).ok_or_else(|| unknown_macro(name, ctx_at(ctx, inv)))?;

    match &data {
        Value::Array(items) => {
            let items = items.borrow().clone();
            let mut pieces = Vec::with_capacity(items.len());
            for item in &items {
                pieces.push(apply_generator(ctx, &generator, name, item, None, inv)?);
            }
            Ok(format!("[{}]", pieces.join("\n        , ")))
        }
        Value::Object(entries) if allow_objects => {
            let entries = entries.borrow().clone();
            let mut pieces = Vec::with_capacity(entries.len());
            for (key, value) in &entries {
                let piece = apply_generator(ctx, &generator, name, value, Some(key), inv)?;
                pieces.push(format!("{} : {}", key, piece));
            }
            Ok(format!("{{{}}}", pieces.join(", ")))
        }
        other => Err(malformed_argument(
            &inv.name,
            format!(
                "data must be {}, got {}",
                if allow_objects {
                    "an array or an object"
                } else {
                    "an array"
                },
                other.type_name()
            ),
            ctx_at(ctx, inv),
        )),
    }
}

/// Applies one generator to one data element. Array elements spread as
/// positional arguments for local generators; built-in generators receive
/// the element rendered back to argument text.
fn apply_generator(
    ctx: &mut ExpansionCtx<'_>,
    generator: &Resolution,
    name: &str,
    element: &Value,
    key: Option<&str>,
    inv: &Invocation,
) -> Result<String, CtError> {
    match generator {
        Resolution::Local(f) => {
            let mut args: Vec<Value> = match element {
                Value::Array(items) => items.borrow().clone(),
                other => vec![other.clone()],
            };
            if let Some(key) = key {
                args.push(Value::Str(key.to_string()));
            }
            let out = ctx.evaluator.call_function(f, &args)?;
            Ok(out.to_display())
        }
        Resolution::Builtin(builtin) => {
            let args = match element {
                Value::Array(items) => items
                    .borrow()
                    .iter()
                    .map(render_argtext)
                    .collect::<Vec<_>>()
                    .join(", "),
                other => render_argtext(other),
            };
            let synthetic = Invocation {
                name: name.to_string(),
                args,
                span: inv.span,
            };
            builtin(ctx, &synthetic)
        }
    }
}

/// Renders a data element as macro argument text: strings are taken
/// verbatim (they usually hold source fragments), everything else is
/// rendered back to a literal.
fn render_argtext(value: &Value) -> String {
    match value {
        Value::Str(s) => s.clone(),
        other => other.to_source(),
    }
}
