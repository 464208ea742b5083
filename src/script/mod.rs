//! The embedded scripting dialect: lexer, parser, values, and evaluator.
//!
//! Macro bodies and generated replacement text are written in this dialect.
//! The expander evaluates pieces of it at expansion time (generator calls,
//! `mix` splices) and the `run` entry point executes whole programs, which
//! is how expanded output is exercised end to end.

pub mod ast;
pub mod eval;
pub mod lexer;
pub mod parser;
pub mod value;

pub use eval::{BufferSink, Env, Evaluator, NullSink, OutputSink, StdoutSink};
pub use value::Value;
