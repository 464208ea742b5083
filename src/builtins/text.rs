//! Text macros: `tli` template literals and `wr` debug output.

use crate::errors::{invalid_delimiter, malformed_argument, CtError, ErrorContext};
use crate::registry::ExpansionCtx;
use crate::scanner::Invocation;

fn ctx_at(ctx: &ExpansionCtx<'_>, inv: &Invocation) -> ErrorContext {
    ErrorContext::at(ctx.src, inv.span)
}

/// `ct.tli('a ${x} b')` — lowers a template literal to a concatenation
/// chain using the literal's own quote character. A template that starts
/// with an interpolation gets an empty-string prefix so `+` concatenates
/// instead of adding.
pub fn tli(ctx: &mut ExpansionCtx<'_>, inv: &Invocation) -> Result<String, CtError> {
    let text = inv.args.trim();
    let bytes = text.as_bytes();
    let delim = match bytes.first() {
        Some(b) if *b == b'\'' || *b == b'"' => *b,
        Some(_) => {
            let found: String = text.chars().take(1).collect();
            return Err(invalid_delimiter(found, ctx_at(ctx, inv)));
        }
        None => return Err(invalid_delimiter("", ctx_at(ctx, inv))),
    };
    let d = delim as char;

    let mut pieces: Vec<String> = Vec::new();
    let mut first_is_interp = false;
    let mut lit_start = 1;
    let mut pos = 1;
    loop {
        if pos >= bytes.len() {
            return Err(malformed_argument(
                &inv.name,
                "unterminated template literal",
                ctx_at(ctx, inv),
            ));
        }
        match bytes[pos] {
            b'\\' => pos += 2,
            b if b == delim => {
                if pos > lit_start {
                    pieces.push(format!("{d}{}{d}", &text[lit_start..pos]));
                }
                if !text[pos + 1..].trim().is_empty() {
                    return Err(malformed_argument(
                        &inv.name,
                        "unexpected text after the template literal",
                        ctx_at(ctx, inv),
                    ));
                }
                break;
            }
            b'$' if bytes.get(pos + 1) == Some(&b'{') => {
                if pos > lit_start {
                    pieces.push(format!("{d}{}{d}", &text[lit_start..pos]));
                }
                let expr_start = pos + 2;
                let close = find_close_brace(text, expr_start).ok_or_else(|| {
                    malformed_argument(
                        &inv.name,
                        "unterminated '${' interpolation",
                        ctx_at(ctx, inv),
                    )
                })?;
                let expr = text[expr_start..close].trim();
                if expr.is_empty() {
                    return Err(malformed_argument(
                        &inv.name,
                        "empty '${}' interpolation",
                        ctx_at(ctx, inv),
                    ));
                }
                if pieces.is_empty() {
                    first_is_interp = true;
                }
                pieces.push(format!("({})", expr));
                pos = close + 1;
                lit_start = pos;
            }
            _ => pos += 1,
        }
    }

    if pieces.is_empty() {
        return Ok(format!("({d}{d})"));
    }
    let joined = pieces.join("+");
    if first_is_interp {
        Ok(format!("(''+{})", joined))
    } else {
        Ok(format!("({})", joined))
    }
}

/// Finds the `}` closing an interpolation opened just before `start`.
/// Nested braces and quoted strings inside the expression are skipped.
fn find_close_brace(text: &str, start: usize) -> Option<usize> {
    let bytes = text.as_bytes();
    let mut depth = 0usize;
    let mut pos = start;
    while pos < bytes.len() {
        match bytes[pos] {
            b'\'' | b'"' => {
                let quote = bytes[pos];
                pos += 1;
                while pos < bytes.len() {
                    match bytes[pos] {
                        b'\\' => pos += 2,
                        b if b == quote => break,
                        _ => pos += 1,
                    }
                }
            }
            b'{' => depth += 1,
            b'}' => {
                if depth == 0 {
                    return Some(pos);
                }
                depth -= 1;
            }
            _ => {}
        }
        pos += 1;
    }
    None
}

/// `ct.wr(expr)` — prints the expression's own text next to its value.
pub fn wr(ctx: &mut ExpansionCtx<'_>, inv: &Invocation) -> Result<String, CtError> {
    let expr = inv.args.trim();
    if expr.is_empty() {
        return Err(malformed_argument(
            &inv.name,
            "expected an expression",
            ctx_at(ctx, inv),
        ));
    }
    let label = expr.replace('\\', "\\\\").replace('"', "\\\"");
    Ok(format!("print(\"{}\", ({}));", label, expr))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::{to_error_source, ErrorType, Span};
    use crate::registry::{ExpansionCtx, LocalCache};
    use crate::script::Evaluator;

    fn expand_one(
        builtin: fn(&mut ExpansionCtx<'_>, &Invocation) -> Result<String, CtError>,
        name: &str,
        args: &str,
    ) -> Result<String, CtError> {
        let mut evaluator = Evaluator::new();
        let cache = LocalCache::new(&evaluator);
        let src = to_error_source("test", args);
        let mut ctx = ExpansionCtx {
            evaluator: &mut evaluator,
            cache: &cache,
            src: &src,
        };
        let inv = Invocation {
            name: name.to_string(),
            args: args.to_string(),
            span: Span::new(0, args.len()),
        };
        builtin(&mut ctx, &inv)
    }

    #[test]
    fn tli_lowers_to_concatenation() {
        let out = expand_one(tli, "tli", "'a ${x} b'").unwrap();
        assert_eq!(out, "('a '+(x)+' b')");
    }

    #[test]
    fn tli_leading_interpolation_gets_string_prefix() {
        let out = expand_one(tli, "tli", "'${x} end'").unwrap();
        assert_eq!(out, "(''+(x)+' end')");
    }

    #[test]
    fn tli_keeps_the_original_delimiter() {
        let out = expand_one(tli, "tli", r#""n = ${n}""#).unwrap();
        assert_eq!(out, "(\"n = \"+(n))");
    }

    #[test]
    fn tli_rejects_non_quote_delimiters() {
        let err = expand_one(tli, "tli", "`bad`").unwrap_err();
        assert_eq!(err.error_type(), ErrorType::InvalidDelimiter);
    }

    #[test]
    fn tli_empty_template() {
        assert_eq!(expand_one(tli, "tli", "''").unwrap(), "('')");
    }

    #[test]
    fn wr_prints_label_and_value() {
        let out = expand_one(wr, "wr", "x * 2").unwrap();
        assert_eq!(out, "print(\"x * 2\", (x * 2));");
    }

    #[test]
    fn wr_escapes_quotes_in_the_label() {
        let out = expand_one(wr, "wr", r#"s + "!""#).unwrap();
        assert_eq!(out, "print(\"s + \\\"!\\\"\", (s + \"!\"));");
    }
}
