//! Macro registry and expansion-local definition cache.
//!
//! Built-in macros live in a fixed table constructed once. Local macros
//! are generator functions defined by `ct.def` during a single `expand`
//! call; they live in a fresh scope chained to the evaluator's globals and
//! are discarded when the expansion finishes. Resolution checks local
//! definitions before built-ins, so a local generator can shadow a
//! built-in name for the rest of that expansion.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use once_cell::sync::Lazy;

use crate::builtins;
use crate::errors::{CtError, SourceArc};
use crate::scanner::Invocation;
use crate::script::eval::{child_env, env_define, env_get_local, Env, Evaluator};
use crate::script::Value;

/// Shared state handed to every built-in macro during one expansion.
pub struct ExpansionCtx<'a> {
    pub evaluator: &'a mut Evaluator,
    pub cache: &'a LocalCache,
    pub src: &'a SourceArc,
}

/// A built-in macro: consumes one invocation, yields replacement text.
pub type BuiltinFn = fn(&mut ExpansionCtx<'_>, &Invocation) -> Result<String, CtError>;

static BUILTINS: Lazy<HashMap<&'static str, BuiltinFn>> = Lazy::new(builtins::table);

/// Looks a name up in the built-in table.
pub fn builtin(name: &str) -> Option<BuiltinFn> {
    BUILTINS.get(name).copied()
}

/// All built-in macro names, sorted. Used by the CLI listing.
pub fn builtin_names() -> Vec<&'static str> {
    let mut names: Vec<_> = BUILTINS.keys().copied().collect();
    names.sort_unstable();
    names
}

/// Locally defined generators for one `expand` call.
///
/// The backing scope chains to the evaluator globals so generator bodies
/// can see `print` and each other, but macro resolution only consults the
/// scope's own bindings.
pub struct LocalCache {
    env: Env,
}

impl LocalCache {
    pub fn new(evaluator: &Evaluator) -> Self {
        Self {
            env: child_env(&evaluator.globals()),
        }
    }

    /// The scope `ct.def` bodies are evaluated in.
    pub fn env(&self) -> &Env {
        &self.env
    }

    /// A generator defined earlier in this expansion, if any.
    pub fn get(&self, name: &str) -> Option<Value> {
        env_get_local(&self.env, name)
    }

    pub fn define(&self, name: &str, value: Value) {
        env_define(&self.env, name, value);
    }
}

/// Outcome of macro name resolution.
pub enum Resolution {
    /// A generator defined by `ct.def` in this expansion.
    Local(Value),
    Builtin(BuiltinFn),
}

/// Resolves a macro name, local definitions first.
pub fn resolve(name: &str, cache: &LocalCache) -> Option<Resolution> {
    if let Some(value) = cache.get(name) {
        return Some(Resolution::Local(value));
    }
    builtin(name).map(Resolution::Builtin)
}

static GENSYM: AtomicUsize = AtomicUsize::new(0);

/// Produces a fresh holder name. Names are process-unique, so generated
/// text from separate expansions never collides.
pub fn gensym() -> String {
    format!("_ct{}", GENSYM.fetch_add(1, Ordering::Relaxed))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gensym_names_are_unique() {
        let a = gensym();
        let b = gensym();
        assert_ne!(a, b);
        assert!(a.starts_with("_ct"));
    }

    #[test]
    fn local_definitions_shadow_builtins() {
        let evaluator = Evaluator::new();
        let cache = LocalCache::new(&evaluator);
        assert!(matches!(resolve("last", &cache), Some(Resolution::Builtin(_))));
        cache.define("last", Value::Number(1.0));
        assert!(matches!(resolve("last", &cache), Some(Resolution::Local(_))));
    }

    #[test]
    fn cache_does_not_leak_globals_into_resolution() {
        let evaluator = Evaluator::new();
        let cache = LocalCache::new(&evaluator);
        // `print` is a global function, not a macro.
        assert!(cache.get("print").is_none());
        assert!(resolve("print", &cache).is_none());
    }

    #[test]
    fn unknown_names_do_not_resolve() {
        let evaluator = Evaluator::new();
        let cache = LocalCache::new(&evaluator);
        assert!(resolve("nope", &cache).is_none());
    }
}
