//! ctex: compile-time source-to-source macro expansion.
//!
//! Source text is scanned once, left to right, for invocations of the form
//! `ct.<name>(<args>).ct`. Each invocation is replaced by text produced by
//! a macro: either one of the built-ins or a generator function declared
//! with `ct.def` earlier in the same expansion. Replacement text is never
//! rescanned, so one pass is all there is. The expanded text is finally
//! evaluated as a single expression in the embedded scripting dialect,
//! yielding a callable value with a stable textual form.
//!
//! ```
//! let mut expander = ctex::Expander::new();
//! let produced = expander.expand("function (x) { return ct.tli('x is ${x}').ct; }")?;
//! assert_eq!(produced.source(), "function (x) { return ('x is '+(x)); }");
//!
//! let out = expander.call(&produced, &[ctex::Value::Number(7.0)])?;
//! assert_eq!(out.to_display(), "x is 7");
//! # Ok::<(), ctex::CtError>(())
//! ```

pub mod builtins;
pub mod cli;
pub mod errors;
pub mod expander;
pub mod registry;
pub mod scanner;
pub mod script;

pub use errors::{CtError, ErrorType, Span};
pub use expander::{expand, Expander, ExpansionStep, ExpansionTrace, Produced, Provenance};
pub use scanner::Invocation;
pub use script::{BufferSink, Evaluator, NullSink, OutputSink, StdoutSink, Value};
