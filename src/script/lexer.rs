//! Tokenizer for the embedded dialect.

use crate::errors::{parse_error, CtError, ErrorContext, SourceArc, Span};

#[derive(Debug, Clone, PartialEq)]
pub enum Tok {
    Ident(String),
    Number(f64),
    /// String literal content, escapes already resolved.
    Str(String),

    LParen,
    RParen,
    LBracket,
    RBracket,
    LBrace,
    RBrace,
    Comma,
    Semi,
    Colon,
    Dot,
    Question,

    Assign,
    Eq,
    StrictEq,
    Not,
    Ne,
    StrictNe,
    Lt,
    Le,
    Gt,
    Ge,
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    PlusPlus,
    MinusMinus,
    PlusAssign,
    MinusAssign,
    StarAssign,
    SlashAssign,
    AndAnd,
    OrOr,

    Eof,
}

impl Tok {
    /// Short description for "expected X, found Y" parse errors.
    pub fn describe(&self) -> String {
        match self {
            Tok::Ident(s) => format!("identifier '{}'", s),
            Tok::Number(n) => format!("number {}", n),
            Tok::Str(_) => "string literal".to_string(),
            Tok::Eof => "end of input".to_string(),
            other => format!("'{}'", other.punct_text()),
        }
    }

    fn punct_text(&self) -> &'static str {
        match self {
            Tok::LParen => "(",
            Tok::RParen => ")",
            Tok::LBracket => "[",
            Tok::RBracket => "]",
            Tok::LBrace => "{",
            Tok::RBrace => "}",
            Tok::Comma => ",",
            Tok::Semi => ";",
            Tok::Colon => ":",
            Tok::Dot => ".",
            Tok::Question => "?",
            Tok::Assign => "=",
            Tok::Eq => "==",
            Tok::StrictEq => "===",
            Tok::Not => "!",
            Tok::Ne => "!=",
            Tok::StrictNe => "!==",
            Tok::Lt => "<",
            Tok::Le => "<=",
            Tok::Gt => ">",
            Tok::Ge => ">=",
            Tok::Plus => "+",
            Tok::Minus => "-",
            Tok::Star => "*",
            Tok::Slash => "/",
            Tok::Percent => "%",
            Tok::PlusPlus => "++",
            Tok::MinusMinus => "--",
            Tok::PlusAssign => "+=",
            Tok::MinusAssign => "-=",
            Tok::StarAssign => "*=",
            Tok::SlashAssign => "/=",
            Tok::AndAnd => "&&",
            Tok::OrOr => "||",
            _ => "",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub tok: Tok,
    pub span: Span,
}

/// Tokenizes `source` completely. The final token is always `Tok::Eof`.
pub fn tokenize(source: &str, src: &SourceArc) -> Result<Vec<Token>, CtError> {
    let bytes = source.as_bytes();
    let mut tokens = Vec::new();
    let mut pos = 0usize;

    while pos < bytes.len() {
        let c = bytes[pos] as char;

        if c.is_ascii_whitespace() {
            pos += 1;
            continue;
        }

        // Comments are skipped whole.
        if c == '/' && pos + 1 < bytes.len() {
            match bytes[pos + 1] as char {
                '/' => {
                    while pos < bytes.len() && bytes[pos] != b'\n' {
                        pos += 1;
                    }
                    continue;
                }
                '*' => {
                    let start = pos;
                    pos += 2;
                    loop {
                        if pos + 1 >= bytes.len() {
                            return Err(parse_error(
                                "unterminated block comment",
                                ErrorContext::at(src, Span::new(start, source.len())),
                            ));
                        }
                        if bytes[pos] == b'*' && bytes[pos + 1] == b'/' {
                            pos += 2;
                            break;
                        }
                        pos += 1;
                    }
                    continue;
                }
                _ => {}
            }
        }

        let start = pos;

        if c.is_ascii_alphabetic() || c == '_' || c == '$' {
            while pos < bytes.len() {
                let c = bytes[pos] as char;
                if c.is_ascii_alphanumeric() || c == '_' || c == '$' {
                    pos += 1;
                } else {
                    break;
                }
            }
            tokens.push(Token {
                tok: Tok::Ident(source[start..pos].to_string()),
                span: Span::new(start, pos),
            });
            continue;
        }

        if c.is_ascii_digit() {
            let mut seen_dot = false;
            while pos < bytes.len() {
                let c = bytes[pos] as char;
                if c.is_ascii_digit() {
                    pos += 1;
                } else if c == '.' && !seen_dot {
                    // A digit must follow; `1.foo` is number then member access.
                    if pos + 1 < bytes.len() && (bytes[pos + 1] as char).is_ascii_digit() {
                        seen_dot = true;
                        pos += 1;
                    } else {
                        break;
                    }
                } else {
                    break;
                }
            }
            let text = &source[start..pos];
            let value = text.parse::<f64>().map_err(|_| {
                parse_error(
                    format!("invalid number literal '{}'", text),
                    ErrorContext::at(src, Span::new(start, pos)),
                )
            })?;
            tokens.push(Token {
                tok: Tok::Number(value),
                span: Span::new(start, pos),
            });
            continue;
        }

        if c == '\'' || c == '"' {
            let (content, end) = read_string(source, pos, c, src)?;
            tokens.push(Token {
                tok: Tok::Str(content),
                span: Span::new(start, end),
            });
            pos = end;
            continue;
        }

        let (tok, width) = read_punct(bytes, pos).ok_or_else(|| {
            parse_error(
                format!("unexpected character '{}'", c),
                ErrorContext::at(src, Span::new(pos, pos + 1)),
            )
        })?;
        pos += width;
        tokens.push(Token {
            tok,
            span: Span::new(start, pos),
        });
    }

    tokens.push(Token {
        tok: Tok::Eof,
        span: Span::new(source.len(), source.len()),
    });
    Ok(tokens)
}

fn read_string(
    source: &str,
    open: usize,
    quote: char,
    src: &SourceArc,
) -> Result<(String, usize), CtError> {
    let bytes = source.as_bytes();
    let mut out = String::new();
    let mut pos = open + 1;
    while pos < bytes.len() {
        let c = bytes[pos] as char;
        if c == quote {
            return Ok((out, pos + 1));
        }
        if c == '\\' && pos + 1 < bytes.len() {
            let esc = bytes[pos + 1] as char;
            out.push(match esc {
                'n' => '\n',
                't' => '\t',
                'r' => '\r',
                '0' => '\0',
                other => other,
            });
            pos += 2;
            continue;
        }
        // Multi-byte characters pass through untouched.
        let ch = source[pos..].chars().next().unwrap_or(c);
        out.push(ch);
        pos += ch.len_utf8();
    }
    Err(parse_error(
        "unterminated string literal",
        ErrorContext::at(src, Span::new(open, source.len())),
    ))
}

fn read_punct(bytes: &[u8], pos: usize) -> Option<(Tok, usize)> {
    let rest = &bytes[pos..];
    let starts = |s: &str| rest.starts_with(s.as_bytes());

    // Longest match first.
    if starts("===") {
        return Some((Tok::StrictEq, 3));
    }
    if starts("!==") {
        return Some((Tok::StrictNe, 3));
    }
    if starts("==") {
        return Some((Tok::Eq, 2));
    }
    if starts("!=") {
        return Some((Tok::Ne, 2));
    }
    if starts("<=") {
        return Some((Tok::Le, 2));
    }
    if starts(">=") {
        return Some((Tok::Ge, 2));
    }
    if starts("++") {
        return Some((Tok::PlusPlus, 2));
    }
    if starts("--") {
        return Some((Tok::MinusMinus, 2));
    }
    if starts("+=") {
        return Some((Tok::PlusAssign, 2));
    }
    if starts("-=") {
        return Some((Tok::MinusAssign, 2));
    }
    if starts("*=") {
        return Some((Tok::StarAssign, 2));
    }
    if starts("/=") {
        return Some((Tok::SlashAssign, 2));
    }
    if starts("&&") {
        return Some((Tok::AndAnd, 2));
    }
    if starts("||") {
        return Some((Tok::OrOr, 2));
    }

    let tok = match rest.first()? {
        b'(' => Tok::LParen,
        b')' => Tok::RParen,
        b'[' => Tok::LBracket,
        b']' => Tok::RBracket,
        b'{' => Tok::LBrace,
        b'}' => Tok::RBrace,
        b',' => Tok::Comma,
        b';' => Tok::Semi,
        b':' => Tok::Colon,
        b'.' => Tok::Dot,
        b'?' => Tok::Question,
        b'=' => Tok::Assign,
        b'!' => Tok::Not,
        b'<' => Tok::Lt,
        b'>' => Tok::Gt,
        b'+' => Tok::Plus,
        b'-' => Tok::Minus,
        b'*' => Tok::Star,
        b'/' => Tok::Slash,
        b'%' => Tok::Percent,
        _ => return None,
    };
    Some((tok, 1))
}
