//! Invocation scanner.
//!
//! Finds `ct.<name>(<args>).ct` invocations in raw program text. The scan
//! is a single left-to-right pass over bytes; replacement text produced for
//! one invocation is never rescanned.
//!
//! Termination is depth-aware rather than lazy: quoted strings inside the
//! argument text are opaque, bracket nesting over `()`, `[]`, `{}` is
//! tracked, and a close paren followed by `.ct` ends the invocation only at
//! nesting depth zero or one. Depth one is admitted so the two-part
//! `generator)(data` argument shape used by `map` and `emap` terminates at
//! its own closing paren. An unmatched close paren at depth zero that is
//! not a terminator simply joins the argument text.

use crate::errors::{unterminated, CtError, ErrorContext, SourceArc, Span};

/// One scanned invocation: `ct.<name>(<args>).ct`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub name: String,
    /// Raw argument text between the opening paren and the terminator.
    pub args: String,
    /// Span of the whole invocation, `ct.` through the trailing `.ct`.
    pub span: Span,
}

fn is_word_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_' || b == b'$'
}

/// Finds the next invocation at or after byte offset `from`.
///
/// A candidate `ct.` must sit at a word boundary (not preceded by an
/// identifier character or a dot), and the macro name must be immediately
/// followed by `(`. Candidates failing those checks are plain text.
pub fn next_invocation(
    source: &str,
    from: usize,
    src: &SourceArc,
) -> Result<Option<Invocation>, CtError> {
    let bytes = source.as_bytes();
    let mut search = from;

    while let Some(rel) = source[search..].find("ct.") {
        let at = search + rel;
        search = at + 1;

        if at > 0 {
            let prev = bytes[at - 1];
            if is_word_byte(prev) || prev == b'.' {
                continue;
            }
        }

        let name_start = at + 3;
        let mut pos = name_start;
        while pos < bytes.len() && is_word_byte(bytes[pos]) {
            pos += 1;
        }
        if pos == name_start || pos >= bytes.len() || bytes[pos] != b'(' {
            continue;
        }
        let name = &source[name_start..pos];

        let args_start = pos + 1;
        match capture_args(source, args_start) {
            Some((args_end, end)) => {
                return Ok(Some(Invocation {
                    name: name.to_string(),
                    args: source[args_start..args_end].to_string(),
                    span: Span::new(at, end),
                }));
            }
            None => {
                return Err(unterminated(
                    name,
                    ErrorContext::at(src, Span::new(at, source.len()))
                        .with_help("every invocation must end with ').ct'"),
                ));
            }
        }
    }
    Ok(None)
}

/// Scans the whole source, collecting every invocation in order.
pub fn scan(source: &str, src: &SourceArc) -> Result<Vec<Invocation>, CtError> {
    let mut found = Vec::new();
    let mut pos = 0;
    while let Some(inv) = next_invocation(source, pos, src)? {
        pos = inv.span.end;
        found.push(inv);
    }
    Ok(found)
}

/// Walks the argument text from `start`, returning the byte offset of the
/// terminating `)` and the offset just past the trailing `.ct`. Returns
/// `None` if the input ends first.
fn capture_args(source: &str, start: usize) -> Option<(usize, usize)> {
    let bytes = source.as_bytes();
    let mut depth = 0usize;
    let mut pos = start;

    while pos < bytes.len() {
        match bytes[pos] {
            b'\'' | b'"' => {
                pos = skip_string(bytes, pos)?;
                continue;
            }
            b'(' | b'[' | b'{' => depth += 1,
            b']' | b'}' => depth = depth.saturating_sub(1),
            b')' => {
                if depth <= 1 && terminator_follows(bytes, pos) {
                    return Some((pos, pos + 4));
                }
                depth = depth.saturating_sub(1);
            }
            _ => {}
        }
        pos += 1;
    }
    None
}

/// True when `.ct` follows the close paren at `pos` and the character after
/// it cannot extend an identifier, so `).ctx` is not a terminator.
fn terminator_follows(bytes: &[u8], pos: usize) -> bool {
    if !bytes[pos + 1..].starts_with(b".ct") {
        return false;
    }
    match bytes.get(pos + 4) {
        Some(&b) => !is_word_byte(b),
        None => true,
    }
}

/// Skips a quoted string starting at `open`; backslash escapes the next
/// byte. Returns the offset past the closing quote.
fn skip_string(bytes: &[u8], open: usize) -> Option<usize> {
    let quote = bytes[open];
    let mut pos = open + 1;
    while pos < bytes.len() {
        match bytes[pos] {
            b'\\' => pos += 2,
            b if b == quote => return Some(pos + 1),
            _ => pos += 1,
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::{to_error_source, ErrorType};

    fn scan_all(source: &str) -> Vec<Invocation> {
        let src = to_error_source("test", source);
        scan(source, &src).unwrap()
    }

    #[test]
    fn finds_a_simple_invocation() {
        let found = scan_all("var x = ct.last(arr).ct + 1;");
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].name, "last");
        assert_eq!(found[0].args, "arr");
        assert_eq!(found[0].span, Span::new(8, 23));
    }

    #[test]
    fn nested_brackets_do_not_terminate_early() {
        let found = scan_all("ct.obj({a, q : d-e, f : o.f}).ct");
        assert_eq!(found[0].args, "{a, q : d-e, f : o.f}");
    }

    #[test]
    fn map_shape_terminates_at_its_own_paren() {
        let found = scan_all("ct.map(expr)([-1, -2, -3]).ct");
        assert_eq!(found[0].name, "map");
        assert_eq!(found[0].args, "expr)([-1, -2, -3]");
    }

    #[test]
    fn function_argument_with_braces() {
        let found = scan_all("ct.def(function f(a) { return a * 2; }).ct");
        assert_eq!(found[0].args, "function f(a) { return a * 2; }");
    }

    #[test]
    fn strings_are_opaque() {
        let found = scan_all(r#"ct.mix('literal ).ct inside').ct"#);
        assert_eq!(found[0].args, "'literal ).ct inside'");
    }

    #[test]
    fn word_boundary_rejects_embedded_prefix() {
        assert!(scan_all("doct.map(x).ct_not_really").is_empty());
        assert!(scan_all("foo.ct.map(x)").is_empty());
    }

    #[test]
    fn ctx_suffix_is_not_a_terminator() {
        let found = scan_all("ct.mix(a).ctx + b).ct");
        assert_eq!(found[0].args, "a).ctx + b");
    }

    #[test]
    fn multiple_invocations_in_order() {
        let found = scan_all("ct.last(a).ct; ct.last(b).ct;");
        assert_eq!(found.len(), 2);
        assert_eq!(found[0].args, "a");
        assert_eq!(found[1].args, "b");
    }

    #[test]
    fn unterminated_invocation_is_an_error() {
        let source = "ct.mix(1 + 2";
        let src = to_error_source("test", source);
        let err = scan(source, &src).unwrap_err();
        assert_eq!(err.error_type(), ErrorType::Unterminated);
    }

    #[test]
    fn deeply_nested_terminator_text_is_plain() {
        let found = scan_all("ct.mix(f(g(h).ct0)).ct");
        assert_eq!(found[0].args, "f(g(h).ct0)");
    }
}
