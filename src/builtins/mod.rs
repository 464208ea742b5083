//! The built-in macro library.
//!
//! Every built-in consumes one scanned invocation and produces replacement
//! text in the embedded dialect. Grouped by theme: `meta` (definition and
//! evaluation), `loops`, `paths` (access chains), `structure` (object
//! shorthand and destructuring), `text` (templates and debug output).

use std::collections::HashMap;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::registry::BuiltinFn;

pub mod loops;
pub mod meta;
pub mod paths;
pub mod structure;
pub mod text;

/// Builds the built-in dispatch table. Called once through the registry's
/// lazy cell.
pub fn table() -> HashMap<&'static str, BuiltinFn> {
    let mut t: HashMap<&'static str, BuiltinFn> = HashMap::new();
    t.insert("def", meta::def);
    t.insert("mix", meta::mix);
    t.insert("map", meta::map);
    t.insert("emap", meta::emap);
    t.insert("afor", loops::afor);
    t.insert("aforev", loops::aforev);
    t.insert("ofor", loops::ofor);
    t.insert("at", paths::at);
    t.insert("last", paths::last);
    t.insert("opt", paths::opt);
    t.insert("req", paths::req);
    t.insert("oreq", paths::oreq);
    t.insert("obj", structure::obj);
    t.insert("ode", structure::ode);
    t.insert("odev", structure::odev);
    t.insert("tli", text::tli);
    t.insert("wr", text::wr);
    t
}

static IDENT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z_$][A-Za-z0-9_$]*$").expect("identifier pattern"));

/// True when `text` is a single dialect identifier.
pub(crate) fn is_ident(text: &str) -> bool {
    IDENT_RE.is_match(text)
}

fn is_string_quote(b: u8) -> bool {
    b == b'\'' || b == b'"'
}

/// Iterates the byte offsets of `text` that sit outside quoted strings,
/// tracking bracket depth over `()`, `[]`, `{}`. The callback receives
/// each offset, the byte, and the depth before the byte is applied.
pub(crate) fn walk_top_level(text: &str, mut visit: impl FnMut(usize, u8, usize) -> bool) {
    let bytes = text.as_bytes();
    let mut depth = 0usize;
    let mut pos = 0;
    while pos < bytes.len() {
        let b = bytes[pos];
        if is_string_quote(b) {
            pos = skip_string(bytes, pos);
            continue;
        }
        if !visit(pos, b, depth) {
            return;
        }
        match b {
            b'(' | b'[' | b'{' => depth += 1,
            b')' | b']' | b'}' => depth = depth.saturating_sub(1),
            _ => {}
        }
        pos += 1;
    }
}

fn skip_string(bytes: &[u8], open: usize) -> usize {
    let quote = bytes[open];
    let mut pos = open + 1;
    while pos < bytes.len() {
        match bytes[pos] {
            b'\\' => pos += 2,
            b if b == quote => return pos + 1,
            _ => pos += 1,
        }
    }
    bytes.len()
}

/// Splits `text` on `sep` at bracket depth zero, strings opaque.
pub(crate) fn split_top_level(text: &str, sep: char) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut start = 0;
    walk_top_level(text, |pos, b, depth| {
        if depth == 0 && b == sep as u8 {
            parts.push(&text[start..pos]);
            start = pos + 1;
        }
        true
    });
    parts.push(&text[start..]);
    parts
}

/// Splits `text` at the first depth-zero occurrence of `sep`.
pub(crate) fn split_once_top_level(text: &str, sep: char) -> Option<(&str, &str)> {
    let mut found = None;
    walk_top_level(text, |pos, b, depth| {
        if depth == 0 && b == sep as u8 {
            found = Some(pos);
            return false;
        }
        true
    });
    found.map(|pos| (&text[..pos], &text[pos + 1..]))
}

/// Replaces every `$` outside quoted strings with `with`.
pub(crate) fn replace_dollars(text: &str, with: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut last = 0;
    walk_top_level(text, |pos, b, _| {
        if b == b'$' {
            out.push_str(&text[last..pos]);
            out.push_str(with);
            last = pos + 1;
        }
        true
    });
    out.push_str(&text[last..]);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_respects_brackets_and_strings() {
        assert_eq!(
            split_top_level("a, f(x, y), 'p, q', [1, 2]", ','),
            vec!["a", " f(x, y)", " 'p, q'", " [1, 2]"]
        );
    }

    #[test]
    fn split_once_finds_first_separator_only() {
        assert_eq!(
            split_once_top_level("k : a ? b : c", ':'),
            Some(("k ", " a ? b : c"))
        );
        assert_eq!(split_once_top_level("no separator", ':'), None);
    }

    #[test]
    fn dollar_replacement_skips_strings() {
        assert_eq!(replace_dollars("o.$ + '$'", "key"), "o.key + '$'");
    }

    #[test]
    fn ident_check() {
        assert!(is_ident("foo_1"));
        assert!(is_ident("$tmp"));
        assert!(!is_ident("a.b"));
        assert!(!is_ident("1a"));
        assert!(!is_ident(""));
    }

    #[test]
    fn table_covers_the_full_library() {
        let t = table();
        for name in [
            "def", "mix", "map", "emap", "afor", "aforev", "ofor", "at", "last", "opt", "req",
            "oreq", "obj", "ode", "odev", "tli", "wr",
        ] {
            assert!(t.contains_key(name), "missing builtin {}", name);
        }
        assert_eq!(t.len(), 17);
    }
}
