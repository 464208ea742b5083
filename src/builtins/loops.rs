//! Loop header macros: `afor`, `aforev`, `ofor`.
//!
//! Each expands to a bare loop header; the author's own block follows the
//! invocation in the surrounding text.

use crate::builtins::{is_ident, split_once_top_level};
use crate::errors::{malformed_argument, CtError, ErrorContext};
use crate::registry::ExpansionCtx;
use crate::scanner::Invocation;

fn two_args<'a>(
    ctx: &ExpansionCtx<'_>,
    inv: &'a Invocation,
) -> Result<(&'a str, &'a str), CtError> {
    let (var, rest) = split_once_top_level(&inv.args, ',').ok_or_else(|| {
        malformed_argument(
            &inv.name,
            "expected '<variable>, <expression>'",
            ErrorContext::at(ctx.src, inv.span),
        )
    })?;
    let var = var.trim();
    let rest = rest.trim();
    if !is_ident(var) {
        return Err(malformed_argument(
            &inv.name,
            format!("'{}' is not a valid loop variable", var),
            ErrorContext::at(ctx.src, inv.span),
        ));
    }
    if rest.is_empty() {
        return Err(malformed_argument(
            &inv.name,
            "missing the expression after the loop variable",
            ErrorContext::at(ctx.src, inv.span),
        ));
    }
    Ok((var, rest))
}

/// `ct.afor(i, arr)` — ascending index loop with the length cached once.
pub fn afor(ctx: &mut ExpansionCtx<'_>, inv: &Invocation) -> Result<String, CtError> {
    let (i, arr) = two_args(ctx, inv)?;
    Ok(format!(
        "for (var {i} = 0, {i}_len = ({arr}).length; {i} < {i}_len; {i}++)",
        i = i,
        arr = arr
    ))
}

/// `ct.aforev(i, arr)` — descending index loop.
pub fn aforev(ctx: &mut ExpansionCtx<'_>, inv: &Invocation) -> Result<String, CtError> {
    let (i, arr) = two_args(ctx, inv)?;
    Ok(format!(
        "for (var {i} = ({arr}).length - 1; {i} >= 0; {i}--)",
        i = i,
        arr = arr
    ))
}

/// `ct.ofor(k, o)` — key loop with the fresh-empty-object guard that
/// filters out inherited members.
pub fn ofor(ctx: &mut ExpansionCtx<'_>, inv: &Invocation) -> Result<String, CtError> {
    let (k, o) = two_args(ctx, inv)?;
    Ok(format!(
        "for (var {k} in ({o})) if (!({k} in {{}}))",
        k = k,
        o = o
    ))
}
