//! `prompter serve` — run the script engine as an MCP server over stdio.

use std::path::PathBuf;

use prompter_core::server::mcp::{serve_stdio, ScriptService};
use prompter_core::vcr::cassette::{Cassette, InitialState};
use prompter_core::vcr::VcrServer;
use prompter_core::{EngineServer, RealAutoExecutor};
use tracing::info;

/// Serve over stdio. With a cassette path, the whole session is recorded.
pub async fn run(working_dir: Option<PathBuf>, cassette: Option<PathBuf>) -> Result<(), String> {
    let working_dir = match working_dir {
        Some(dir) => dir,
        None => std::env::current_dir()
            .map_err(|e| format!("Failed to resolve working directory: {e}"))?,
    };
    let loader = super::default_loader();

    let service = match cassette {
        Some(path) => {
            info!(cassette = %path.display(), "recording session to cassette");
            let initial = InitialState::new(working_dir.display().to_string());
            let cassette = Cassette::record(path, initial);
            let server = VcrServer::record(cassette, loader)
                .map_err(|e| format!("Failed to open cassette for recording: {e}"))?;
            ScriptService::Recorded(server)
        }
        None => ScriptService::Plain(EngineServer::new(
            working_dir,
            RealAutoExecutor::new(),
            loader,
        )),
    };

    serve_stdio(service)
        .await
        .map_err(|e| format!("MCP server error: {e}"))
}
