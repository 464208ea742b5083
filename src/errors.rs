//! ctex error handling.
//!
//! One unified error type covers every failure mode of the expansion
//! pipeline: scanning, argument sub-grammar parsing, dialect parsing, and
//! evaluation. All errors are unrecoverable at expansion time — they abort
//! the whole `expand` call with no partial output.

use std::fmt;
use std::sync::Arc;

use miette::{Diagnostic, LabeledSpan, NamedSource, SourceCode};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub type SourceArc = Arc<NamedSource<String>>;

/// A byte range into some source text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    pub fn len(&self) -> usize {
        self.end.saturating_sub(self.start)
    }

    pub fn is_empty(&self) -> bool {
        self.end <= self.start
    }
}

/// Wraps a source string for diagnostic excerpts.
pub fn to_error_source(name: &str, source: impl AsRef<str>) -> SourceArc {
    Arc::new(NamedSource::new(name, source.as_ref().to_string()))
}

/// Minimal, composable error context: where the error happened and how to
/// help. Carried by every `CtError` variant.
#[derive(Debug, Default, Clone)]
pub struct ErrorContext {
    pub source: Option<SourceArc>,
    pub span: Option<Span>,
    pub help: Option<String>,
}

impl ErrorContext {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn at(source: &SourceArc, span: Span) -> Self {
        Self {
            source: Some(Arc::clone(source)),
            span: Some(span),
            help: None,
        }
    }

    pub fn with_help(mut self, help: impl Into<String>) -> Self {
        self.help = Some(help.into());
        self
    }
}

/// Type-safe classification of errors, for assertions in tests and for
/// callers that dispatch on failure kind without string matching.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorType {
    UnknownMacro,
    MalformedArgument,
    MissingName,
    MustBeFunction,
    InvalidDelimiter,
    Unterminated,
    Parse,
    Eval,
}

impl ErrorType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorType::UnknownMacro => "UnknownMacro",
            ErrorType::MalformedArgument => "MalformedArgument",
            ErrorType::MissingName => "MissingName",
            ErrorType::MustBeFunction => "MustBeFunction",
            ErrorType::InvalidDelimiter => "InvalidDelimiter",
            ErrorType::Unterminated => "Unterminated",
            ErrorType::Parse => "Parse",
            ErrorType::Eval => "Eval",
        }
    }
}

impl fmt::Display for ErrorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Unified error type for every ctex failure mode.
#[derive(Debug, Error)]
pub enum CtError {
    #[error("unknown macro 'ct.{name}'")]
    UnknownMacro { name: String, ctx: ErrorContext },

    #[error("malformed argument to 'ct.{macro_name}': {message}")]
    MalformedArgument {
        macro_name: String,
        message: String,
        ctx: ErrorContext,
    },

    #[error("'ct.{macro_name}' invocation has no resolvable name")]
    MissingName {
        macro_name: String,
        ctx: ErrorContext,
    },

    #[error("'ct.{macro_name}' expects a function, got {actual}")]
    MustBeFunction {
        macro_name: String,
        actual: String,
        ctx: ErrorContext,
    },

    #[error("template literal must start with a quote character, found {found:?}")]
    InvalidDelimiter { found: String, ctx: ErrorContext },

    #[error("unterminated invocation 'ct.{name}(...': missing ').ct'")]
    Unterminated { name: String, ctx: ErrorContext },

    #[error("parse error: {message}")]
    Parse { message: String, ctx: ErrorContext },

    #[error("evaluation error: {message}")]
    Eval { message: String, ctx: ErrorContext },
}

impl CtError {
    fn get_ctx(&self) -> &ErrorContext {
        match self {
            CtError::UnknownMacro { ctx, .. }
            | CtError::MalformedArgument { ctx, .. }
            | CtError::MissingName { ctx, .. }
            | CtError::MustBeFunction { ctx, .. }
            | CtError::InvalidDelimiter { ctx, .. }
            | CtError::Unterminated { ctx, .. }
            | CtError::Parse { ctx, .. }
            | CtError::Eval { ctx, .. } => ctx,
        }
    }

    /// Returns the type-safe classification for this error.
    pub fn error_type(&self) -> ErrorType {
        match self {
            CtError::UnknownMacro { .. } => ErrorType::UnknownMacro,
            CtError::MalformedArgument { .. } => ErrorType::MalformedArgument,
            CtError::MissingName { .. } => ErrorType::MissingName,
            CtError::MustBeFunction { .. } => ErrorType::MustBeFunction,
            CtError::InvalidDelimiter { .. } => ErrorType::InvalidDelimiter,
            CtError::Unterminated { .. } => ErrorType::Unterminated,
            CtError::Parse { .. } => ErrorType::Parse,
            CtError::Eval { .. } => ErrorType::Eval,
        }
    }
}

impl Diagnostic for CtError {
    fn code<'a>(&'a self) -> Option<Box<dyn fmt::Display + 'a>> {
        Some(Box::new(format!("ctex::{}", self.error_type())))
    }

    fn help<'a>(&'a self) -> Option<Box<dyn fmt::Display + 'a>> {
        self.get_ctx()
            .help
            .as_ref()
            .map(|h| Box::new(h) as Box<dyn fmt::Display + 'a>)
    }

    fn source_code(&self) -> Option<&dyn SourceCode> {
        self.get_ctx()
            .source
            .as_ref()
            .map(|s| s.as_ref() as &dyn SourceCode)
    }

    fn labels(&self) -> Option<Box<dyn Iterator<Item = LabeledSpan> + '_>> {
        let ctx = self.get_ctx();
        let span = ctx.span?;
        let len = if span.len() > 0 { span.len() } else { 1 };
        let label = LabeledSpan::new(Some(self.to_string()), span.start, len);
        Some(Box::new(std::iter::once(label)))
    }
}

// Constructor helpers. These keep call sites terse without a macro layer.

pub fn unknown_macro(name: impl Into<String>, ctx: ErrorContext) -> CtError {
    CtError::UnknownMacro {
        name: name.into(),
        ctx,
    }
}

pub fn malformed_argument(
    macro_name: impl Into<String>,
    message: impl Into<String>,
    ctx: ErrorContext,
) -> CtError {
    CtError::MalformedArgument {
        macro_name: macro_name.into(),
        message: message.into(),
        ctx,
    }
}

pub fn missing_name(macro_name: impl Into<String>, ctx: ErrorContext) -> CtError {
    CtError::MissingName {
        macro_name: macro_name.into(),
        ctx,
    }
}

pub fn must_be_function(
    macro_name: impl Into<String>,
    actual: impl Into<String>,
    ctx: ErrorContext,
) -> CtError {
    CtError::MustBeFunction {
        macro_name: macro_name.into(),
        actual: actual.into(),
        ctx,
    }
}

pub fn invalid_delimiter(found: impl Into<String>, ctx: ErrorContext) -> CtError {
    CtError::InvalidDelimiter {
        found: found.into(),
        ctx,
    }
}

pub fn unterminated(name: impl Into<String>, ctx: ErrorContext) -> CtError {
    CtError::Unterminated {
        name: name.into(),
        ctx,
    }
}

pub fn parse_error(message: impl Into<String>, ctx: ErrorContext) -> CtError {
    CtError::Parse {
        message: message.into(),
        ctx,
    }
}

pub fn eval_error(message: impl Into<String>, ctx: ErrorContext) -> CtError {
    CtError::Eval {
        message: message.into(),
        ctx,
    }
}
