//! CLI command implementations.
//!
//! Each submodule corresponds to a top-level CLI command and reuses the
//! prompter-core engine directly.

pub mod replay;
pub mod scripts;
pub mod serve;

use std::sync::Arc;

use prompter_core::script::ScriptRegistry;
use prompter_core::ScriptLoader;

/// The script loader every command uses: the bundled demo scripts.
pub fn default_loader() -> Arc<dyn ScriptLoader> {
    Arc::new(ScriptRegistry::with_builtins())
}
