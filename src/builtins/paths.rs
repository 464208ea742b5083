//! Access-chain macros: `at`, `last`, `opt`, `req`, `oreq`.
//!
//! `opt`, `req`, and `oreq` lower dotted paths into holder expressions.
//! Holder names come from the registry gensym, so chains expanded in
//! different places never share state.

use crate::builtins::{is_ident, replace_dollars, split_once_top_level, split_top_level};
use crate::errors::{malformed_argument, CtError, ErrorContext};
use crate::registry::{gensym, ExpansionCtx};
use crate::scanner::Invocation;

fn ctx_at(ctx: &ExpansionCtx<'_>, inv: &Invocation) -> ErrorContext {
    ErrorContext::at(ctx.src, inv.span)
}

/// `ct.at(name[ix])` — indexing where `$` inside the index stands for the
/// container's length. The comma form `ct.at(name, ix)` is also accepted.
pub fn at(ctx: &mut ExpansionCtx<'_>, inv: &Invocation) -> Result<String, CtError> {
    let text = inv.args.trim();
    let (name, ix) = match split_once_top_level(text, '[') {
        Some((name, rest)) => {
            let ix = rest.trim_end().strip_suffix(']').ok_or_else(|| {
                malformed_argument(&inv.name, "missing ']' after the index", ctx_at(ctx, inv))
            })?;
            (name, ix)
        }
        None => split_once_top_level(text, ',').ok_or_else(|| {
            malformed_argument(
                &inv.name,
                "expected '<container>[<index>]'",
                ctx_at(ctx, inv),
            )
        })?,
    };
    let name = name.trim();
    let ix = ix.trim();
    if name.is_empty() || ix.is_empty() {
        return Err(malformed_argument(
            &inv.name,
            "container and index must both be present",
            ctx_at(ctx, inv),
        ));
    }
    let length = format!("(({}).length)", name);
    Ok(format!("({})[{}]", name, replace_dollars(ix, &length)))
}

/// `ct.last(arr)` — the last element of an array.
pub fn last(ctx: &mut ExpansionCtx<'_>, inv: &Invocation) -> Result<String, CtError> {
    let arr = inv.args.trim();
    if arr.is_empty() {
        return Err(malformed_argument(
            &inv.name,
            "expected an array expression",
            ctx_at(ctx, inv),
        ));
    }
    Ok(format!("({a})[({a}).length - 1]", a = arr))
}

/// Splits `root.s1.s2...` into the root expression and its hop names.
fn path_segments<'a>(
    ctx: &ExpansionCtx<'_>,
    inv: &'a Invocation,
) -> Result<(&'a str, Vec<&'a str>), CtError> {
    let parts = split_top_level(&inv.args, '.');
    if parts.len() < 2 {
        return Err(malformed_argument(
            &inv.name,
            "expected a dotted path with at least one hop",
            ctx_at(ctx, inv),
        ));
    }
    let root = parts[0].trim();
    if root.is_empty() {
        return Err(malformed_argument(
            &inv.name,
            "the path root is empty",
            ctx_at(ctx, inv),
        ));
    }
    let mut hops = Vec::with_capacity(parts.len() - 1);
    for hop in &parts[1..] {
        let hop = hop.trim();
        if !is_ident(hop) {
            return Err(malformed_argument(
                &inv.name,
                format!("'{}' is not a valid path segment", hop),
                ctx_at(ctx, inv),
            ));
        }
        hops.push(hop);
    }
    Ok((root, hops))
}

/// `ct.opt(o.a.b.c)` — null-safe read: every hop short-circuits to `null`
/// when its container is missing.
pub fn opt(ctx: &mut ExpansionCtx<'_>, inv: &Invocation) -> Result<String, CtError> {
    let (root, hops) = path_segments(ctx, inv)?;
    let h = gensym();
    let mut out = format!("(({} = ({}))", h, root);
    for hop in &hops[..hops.len() - 1] {
        out.push_str(&format!(" && ({h} = {h}.{hop})", h = h, hop = hop));
    }
    out.push_str(&format!(" ? {}.{} : null)", h, hops[hops.len() - 1]));
    Ok(out)
}

/// `ct.req(o.a.b.c)` — materializing read: every missing hop, the leaf
/// included, is created as a fresh object. Yields the leaf.
pub fn req(ctx: &mut ExpansionCtx<'_>, inv: &Invocation) -> Result<String, CtError> {
    let (root, hops) = path_segments(ctx, inv)?;
    let h = gensym();
    let mut out = format!("({} = ({})", h, root);
    for hop in &hops {
        out.push_str(&format!(
            ", {h} = {h}.{hop} || ({h}.{hop} = {{}})",
            h = h,
            hop = hop
        ));
    }
    out.push(')');
    Ok(out)
}

/// `ct.oreq(o.a.b.c)` — like `req`, but yields the owner: the container
/// one hop above the leaf. The leaf is still materialized; the owner
/// result is the one behavioral difference from `req`, which yields the
/// leaf slot itself.
pub fn oreq(ctx: &mut ExpansionCtx<'_>, inv: &Invocation) -> Result<String, CtError> {
    let (root, hops) = path_segments(ctx, inv)?;
    let h = gensym();
    let mut out = format!("({} = ({})", h, root);
    for hop in &hops[..hops.len() - 1] {
        out.push_str(&format!(
            ", {h} = {h}.{hop} || ({h}.{hop} = {{}})",
            h = h,
            hop = hop
        ));
    }
    let leaf = hops[hops.len() - 1];
    out.push_str(&format!(
        ", {h}.{leaf} || ({h}.{leaf} = {{}}), {h})",
        h = h,
        leaf = leaf
    ));
    Ok(out)
}
