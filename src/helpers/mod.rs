//! Helper registry
//!
//! A helper is a named transform invoked as `@name:args` inside an action
//! value. A value is a helper invocation iff it begins with `@`, contains
//! a `:` after the name, and the name is non-empty. The segment after the
//! colon is the operation plus optional sub-arguments separated by `|`.
//!
//! The rule processor encodes resolution policy: `time` is evaluated
//! immediately while applying a rule; `logo` (and any unknown helper) is
//! left untouched so that later pipeline stages with more context (base
//! URL, logo store) can resolve it.

pub mod logo;
pub mod time;

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use crate::errors::HelperError;

pub use logo::{LogoAssetResolver, LogoHelper};
pub use time::TimeHelper;

/// Helpers resolved while a rule is being applied. Everything else is
/// deferred to downstream consumers.
const IMMEDIATE_HELPERS: &[&str] = &["time"];

/// A named transform invoked as `@name:args` in action values.
pub trait Helper: Send + Sync {
    fn name(&self) -> &str;

    /// Process the argument segment (everything after the first `:`).
    fn process(&self, args: &str) -> Result<String, HelperError>;
}

/// Split a value into `(name, args)` if it has helper invocation shape.
///
/// Returns `None` for anything that is not `@name:rest` with a non-empty
/// name. Note that `@dynamic(path):key` technically has this shape; its
/// "name" contains the parenthesized path and never collides with a
/// registered helper.
pub fn parse_invocation(value: &str) -> Option<(&str, &str)> {
    let rest = value.strip_prefix('@')?;
    let colon = rest.find(':')?;
    if colon == 0 {
        return None;
    }
    Some((&rest[..colon], &rest[colon + 1..]))
}

/// Name-keyed registry of helper instances.
///
/// Populated once at startup and read-only afterwards; the lock exists so
/// adapters can inject configured helpers (e.g. a logo helper with a
/// resolver) before the engine is exposed.
pub struct HelperRegistry {
    helpers: RwLock<HashMap<String, Arc<dyn Helper>>>,
}

impl HelperRegistry {
    pub fn new() -> Self {
        Self {
            helpers: RwLock::new(HashMap::new()),
        }
    }

    /// Registry preloaded with the built-in helpers: `time`, and `logo`
    /// in deferred mode.
    pub fn with_builtins() -> Self {
        let registry = Self::new();
        registry.register(Arc::new(TimeHelper::new()));
        registry.register(Arc::new(LogoHelper::deferred()));
        registry
    }

    pub fn register(&self, helper: Arc<dyn Helper>) {
        let mut helpers = self.helpers.write().expect("helper registry poisoned");
        helpers.insert(helper.name().to_string(), helper);
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Helper>> {
        let helpers = self.helpers.read().expect("helper registry poisoned");
        helpers.get(name).cloned()
    }

    /// Run the immediate helpers over a resolved literal value.
    ///
    /// Only `time` runs here; `@logo:…` and unknown `@name:args` values are
    /// returned unchanged for downstream resolution. Helper errors
    /// propagate to the caller.
    pub fn process_immediate(&self, value: &str) -> Result<String, HelperError> {
        if let Some((name, args)) = parse_invocation(value) {
            if IMMEDIATE_HELPERS.contains(&name) {
                if let Some(helper) = self.get(name) {
                    return helper.process(args);
                }
            }
        }
        Ok(value.to_string())
    }
}

impl Default for HelperRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}
