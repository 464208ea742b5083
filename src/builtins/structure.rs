//! Object shorthand and destructuring macros: `obj`, `ode`, `odev`.

use crate::builtins::{is_ident, replace_dollars, split_top_level, walk_top_level};
use crate::errors::{malformed_argument, CtError, ErrorContext};
use crate::registry::ExpansionCtx;
use crate::scanner::Invocation;

fn ctx_at(ctx: &ExpansionCtx<'_>, inv: &Invocation) -> ErrorContext {
    ErrorContext::at(ctx.src, inv.span)
}

fn strip_braces<'a>(
    ctx: &ExpansionCtx<'_>,
    inv: &Invocation,
    text: &'a str,
) -> Result<&'a str, CtError> {
    let text = text.trim();
    if text.len() >= 2 && text.starts_with('{') && text.ends_with('}') {
        Ok(&text[1..text.len() - 1])
    } else {
        Err(malformed_argument(
            &inv.name,
            "expected a braced pattern '{...}'",
            ctx_at(ctx, inv),
        ))
    }
}

/// `ct.obj({a, q : d-e, f : o.$})` — object literal shorthand: a bare name
/// expands to `name : name`, and `$` inside a valued entry stands for that
/// entry's key.
pub fn obj(ctx: &mut ExpansionCtx<'_>, inv: &Invocation) -> Result<String, CtError> {
    let inner = strip_braces(ctx, inv, &inv.args)?;
    if inner.trim().is_empty() {
        return Ok("{}".to_string());
    }
    let mut rendered = Vec::new();
    for entry in split_top_level(inner, ',') {
        let parts = split_top_level(entry, ':');
        match parts.as_slice() {
            [name] => {
                let name = name.trim();
                if !is_ident(name) {
                    return Err(malformed_argument(
                        &inv.name,
                        format!("'{}' is not a valid shorthand key", name),
                        ctx_at(ctx, inv),
                    ));
                }
                rendered.push(format!("{} : {}", name, name));
            }
            [key, value] => {
                let key = key.trim();
                if !is_ident(key) {
                    return Err(malformed_argument(
                        &inv.name,
                        format!("'{}' is not a valid key", key),
                        ctx_at(ctx, inv),
                    ));
                }
                rendered.push(format!("{} : {}", key, replace_dollars(value.trim(), key)));
            }
            _ => {
                return Err(malformed_argument(
                    &inv.name,
                    "an entry has more than one top-level colon",
                    ctx_at(ctx, inv),
                ))
            }
        }
    }
    Ok(format!("{{{}}}", rendered.join(", ")))
}

/// Finds a bare `=` at bracket depth zero: not part of `==`, `!=`, `<=`,
/// `>=`, or a compound assignment operator.
fn find_bare_eq(text: &str) -> Option<usize> {
    let bytes = text.as_bytes();
    let mut found = None;
    walk_top_level(text, |pos, b, depth| {
        if depth == 0 && b == b'=' {
            let next_is_eq = bytes.get(pos + 1) == Some(&b'=');
            let prev_compounds = pos > 0
                && matches!(bytes[pos - 1], b'=' | b'!' | b'<' | b'>' | b'+' | b'-' | b'*' | b'/');
            if !next_is_eq && !prev_compounds {
                found = Some(pos);
                return false;
            }
        }
        true
    });
    found
}

/// One alias in a destructuring pattern: property `key` lands in variable
/// `target`.
struct Alias<'a> {
    key: &'a str,
    target: &'a str,
}

fn parse_pattern<'a>(
    ctx: &ExpansionCtx<'_>,
    inv: &Invocation,
    text: &'a str,
) -> Result<(Vec<Alias<'a>>, &'a str), CtError> {
    let eq = find_bare_eq(text).ok_or_else(|| {
        malformed_argument(
            &inv.name,
            "expected '{pattern} = <expression>'",
            ctx_at(ctx, inv),
        )
    })?;
    let pattern = strip_braces(ctx, inv, &text[..eq])?;
    let source = text[eq + 1..].trim();
    if source.is_empty() {
        return Err(malformed_argument(
            &inv.name,
            "missing the expression after '='",
            ctx_at(ctx, inv),
        ));
    }

    let mut aliases = Vec::new();
    for entry in split_top_level(pattern, ',') {
        let parts = split_top_level(entry, ':');
        let (key, target) = match parts.as_slice() {
            [name] => (name.trim(), name.trim()),
            [key, target] => (key.trim(), target.trim()),
            _ => {
                return Err(malformed_argument(
                    &inv.name,
                    "an entry has more than one top-level colon",
                    ctx_at(ctx, inv),
                ))
            }
        };
        if !is_ident(key) || !is_ident(target) {
            return Err(malformed_argument(
                &inv.name,
                format!("'{}' is not a valid destructuring entry", entry.trim()),
                ctx_at(ctx, inv),
            ));
        }
        aliases.push(Alias { key, target });
    }
    if aliases.is_empty() {
        return Err(malformed_argument(
            &inv.name,
            "the pattern is empty",
            ctx_at(ctx, inv),
        ));
    }
    Ok((aliases, source))
}

/// `ct.ode({a, b : c} = src)` — destructuring assignment to existing
/// variables, as a parenthesized expression.
pub fn ode(ctx: &mut ExpansionCtx<'_>, inv: &Invocation) -> Result<String, CtError> {
    let (aliases, source) = parse_pattern(ctx, inv, &inv.args)?;
    let body = aliases
        .iter()
        .map(|a| format!("{} = ({}).{}", a.target, source, a.key))
        .collect::<Vec<_>>()
        .join(", ");
    Ok(format!("({})", body))
}

/// `ct.odev({a, b : c} = src)` — destructuring declaration.
pub fn odev(ctx: &mut ExpansionCtx<'_>, inv: &Invocation) -> Result<String, CtError> {
    let (aliases, source) = parse_pattern(ctx, inv, &inv.args)?;
    let body = aliases
        .iter()
        .map(|a| format!("{} = ({}).{}", a.target, source, a.key))
        .collect::<Vec<_>>()
        .join(", ");
    Ok(format!("var {}", body))
}
