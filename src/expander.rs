//! The top-level expansion pipeline.
//!
//! `Expander::expand` makes exactly one pass: scan the input left to
//! right, replace each invocation, and never rescan replacement text. The
//! fully expanded text is then evaluated as a single expression, which is
//! usually a function literal. The resulting `Produced` pairs the value
//! with its stable textual form.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::errors::{to_error_source, CtError, ErrorContext, Span, unknown_macro};
use crate::registry::{builtin_names, resolve, ExpansionCtx, LocalCache, Resolution};
use crate::scanner::next_invocation;
use crate::script::{Evaluator, OutputSink, StdoutSink, Value};

/// Where a macro name resolved during expansion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Provenance {
    /// Defined by `ct.def` earlier in the same expansion.
    Local,
    Builtin,
}

/// One substitution performed during an expansion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExpansionStep {
    pub macro_name: String,
    pub provenance: Provenance,
    pub span: Span,
    pub args: String,
    pub replacement: String,
}

/// The ordered record of every substitution in one `expand` call.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExpansionTrace {
    pub steps: Vec<ExpansionStep>,
}

/// The outcome of an expansion: the expanded source text and the value it
/// evaluates to.
#[derive(Debug)]
pub struct Produced {
    source: String,
    value: Value,
}

impl Produced {
    /// The expanded source text, exactly as substituted.
    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn value(&self) -> &Value {
        &self.value
    }
}

/// The stable, re-evaluable textual form: the produced value rendered
/// inside parentheses. Expanding this text again finds no invocations.
impl fmt::Display for Produced {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({})", self.value.to_display())
    }
}

pub struct Expander {
    evaluator: Evaluator,
}

impl Expander {
    pub fn new() -> Self {
        Self::with_output(Box::new(StdoutSink))
    }

    pub fn with_output(sink: Box<dyn OutputSink>) -> Self {
        Self {
            evaluator: Evaluator::with_output(sink),
        }
    }

    pub fn evaluator_mut(&mut self) -> &mut Evaluator {
        &mut self.evaluator
    }

    /// Expands `source` and evaluates the result as one expression.
    pub fn expand(&mut self, source: &str) -> Result<Produced, CtError> {
        let expanded = self.expand_text_inner(source, None)?;
        let value = self.evaluator.eval_source(&expanded, "expanded source")?;
        Ok(Produced {
            source: expanded,
            value,
        })
    }

    /// Like `expand`, but also records every substitution.
    pub fn expand_traced(&mut self, source: &str) -> Result<(Produced, ExpansionTrace), CtError> {
        let mut trace = ExpansionTrace::default();
        let expanded = self.expand_text_inner(source, Some(&mut trace))?;
        let value = self.evaluator.eval_source(&expanded, "expanded source")?;
        Ok((
            Produced {
                source: expanded,
                value,
            },
            trace,
        ))
    }

    /// Performs the substitution pass only, without evaluating the result.
    pub fn expand_text(&mut self, source: &str) -> Result<String, CtError> {
        self.expand_text_inner(source, None)
    }

    /// Calls a produced function value with already-evaluated arguments.
    pub fn call(&mut self, produced: &Produced, args: &[Value]) -> Result<Value, CtError> {
        self.evaluator.call_function(produced.value(), args)
    }

    fn expand_text_inner(
        &mut self,
        source: &str,
        mut trace: Option<&mut ExpansionTrace>,
    ) -> Result<String, CtError> {
        let src = to_error_source("input", source);
        // Local definitions live exactly as long as this call.
        let cache = LocalCache::new(&self.evaluator);

        let mut out = String::with_capacity(source.len());
        let mut pos = 0;
        while let Some(inv) = next_invocation(source, pos, &src)? {
            out.push_str(&source[pos..inv.span.start]);

            let (replacement, provenance) = match resolve(&inv.name, &cache) {
                Some(Resolution::Local(_)) => {
                    // A local generator is an ordinary function in the
                    // expansion scope; the argument text is a plain call
                    // argument list.
                    let call_text = format!("{}({})", inv.name, inv.args);
                    let value =
                        self.evaluator
                            .eval_in(&call_text, "generator call", cache.env())?;
                    (value.to_display(), Provenance::Local)
                }
                Some(Resolution::Builtin(builtin)) => {
                    let mut ctx = ExpansionCtx {
                        evaluator: &mut self.evaluator,
                        cache: &cache,
                        src: &src,
                    };
                    (builtin(&mut ctx, &inv)?, Provenance::Builtin)
                }
                None => {
                    return Err(unknown_macro(
                        &inv.name,
                        ErrorContext::at(&src, inv.span).with_help(format!(
                            "built-in macros: {}",
                            builtin_names().join(", ")
                        )),
                    ))
                }
            };

            if let Some(trace) = trace.as_deref_mut() {
                trace.steps.push(ExpansionStep {
                    macro_name: inv.name.clone(),
                    provenance,
                    span: inv.span,
                    args: inv.args.clone(),
                    replacement: replacement.clone(),
                });
            }

            out.push_str(&replacement);
            pos = inv.span.end;
        }
        out.push_str(&source[pos..]);
        Ok(out)
    }
}

impl Default for Expander {
    fn default() -> Self {
        Self::new()
    }
}

/// One-shot convenience around `Expander::expand`.
pub fn expand(source: &str) -> Result<Produced, CtError> {
    Expander::new().expand(source)
}
