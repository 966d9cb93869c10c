//! Script resolution and loading.
//!
//! Scripts are addressed by name (`demo/guess`, with `:` accepted as a path
//! separator alias) and resolve to either a compiled [`StepSequence`] or an
//! instructional body — plain prose the driver carries out on its own.
//! Instructional sources may contain a `$ARGUMENTS` placeholder which is
//! substituted once with the caller's request string.

use std::collections::HashMap;
use std::sync::Arc;

use crate::script::sequence::StepSequence;

#[derive(Debug, thiserror::Error)]
pub enum ScriptLoadError {
    #[error("Script not found: {0}")]
    NotFound(String),
}

/// The executable body of a resolved script.
pub enum ScriptBody {
    /// Engine-driven state machine.
    Compiled(Box<dyn StepSequence + Send>),
    /// Driver-executed prose; the engine only tracks its frame.
    Instructional,
}

impl std::fmt::Debug for ScriptBody {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ScriptBody::Compiled(_) => f.write_str("Compiled(..)"),
            ScriptBody::Instructional => f.write_str("Instructional"),
        }
    }
}

/// A script resolved and instantiated for one invocation.
#[derive(Debug)]
pub struct LoadedScript {
    pub name: String,
    /// Human-readable source, shown to the driver for context.
    pub source: String,
    pub body: ScriptBody,
}

/// Resolves a script name (plus the caller's request) into a runnable script.
pub trait ScriptLoader: Send + Sync {
    fn load(&self, name: &str, request: &str) -> Result<LoadedScript, ScriptLoadError>;
}

type SequenceFactory = Arc<dyn Fn(&str) -> Box<dyn StepSequence + Send> + Send + Sync>;

struct RegisteredScript {
    source: String,
    /// `None` marks an instructional script.
    factory: Option<SequenceFactory>,
}

/// In-memory script registry; the default [`ScriptLoader`].
#[derive(Default)]
pub struct ScriptRegistry {
    scripts: HashMap<String, RegisteredScript>,
}

impl ScriptRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry preloaded with the bundled demo scripts.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        crate::script::builtin::register(&mut registry);
        registry
    }

    pub fn register_compiled(
        &mut self,
        name: impl Into<String>,
        source: impl Into<String>,
        factory: impl Fn(&str) -> Box<dyn StepSequence + Send> + Send + Sync + 'static,
    ) {
        self.scripts.insert(
            name.into(),
            RegisteredScript {
                source: source.into(),
                factory: Some(Arc::new(factory)),
            },
        );
    }

    pub fn register_instructional(&mut self, name: impl Into<String>, source: impl Into<String>) {
        self.scripts.insert(
            name.into(),
            RegisteredScript {
                source: source.into(),
                factory: None,
            },
        );
    }

    /// Registered script names, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.scripts.keys().cloned().collect();
        names.sort();
        names
    }
}

impl ScriptLoader for ScriptRegistry {
    fn load(&self, name: &str, request: &str) -> Result<LoadedScript, ScriptLoadError> {
        let normalized = name.replace(':', "/");
        let registered = self
            .scripts
            .get(&normalized)
            .ok_or_else(|| ScriptLoadError::NotFound(normalized.clone()))?;

        match &registered.factory {
            Some(factory) => Ok(LoadedScript {
                name: normalized,
                source: registered.source.clone(),
                body: ScriptBody::Compiled(factory(request)),
            }),
            None => Ok(LoadedScript {
                name: normalized,
                // Substituted once: later occurrences stay literal.
                source: registered.source.replacen("$ARGUMENTS", request, 1),
                body: ScriptBody::Instructional,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn colon_alias_resolves_to_slash_name() {
        let registry = ScriptRegistry::with_builtins();
        let script = registry.load("demo:guess", "").unwrap();
        assert_eq!(script.name, "demo/guess");
    }

    #[test]
    fn unknown_script_is_not_found() {
        let registry = ScriptRegistry::new();
        let err = registry.load("missing", "").unwrap_err();
        assert_eq!(err.to_string(), "Script not found: missing");
    }

    #[test]
    fn arguments_substituted_exactly_once() {
        let mut registry = ScriptRegistry::new();
        registry.register_instructional("echo", "First: $ARGUMENTS\nSecond: $ARGUMENTS");
        let script = registry.load("echo", "hello").unwrap();
        assert_eq!(script.source, "First: hello\nSecond: $ARGUMENTS");
    }
}
