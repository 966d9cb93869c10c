//! `prompter scripts` — list the registered scripts.

use prompter_core::ScriptRegistry;

pub async fn run() -> Result<(), String> {
    let registry = ScriptRegistry::with_builtins();
    for name in registry.names() {
        println!("{name}");
    }
    Ok(())
}
