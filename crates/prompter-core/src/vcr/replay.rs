//! Whole-cassette replay.
//!
//! Re-drives a recorded session end to end: every recorded tool call is
//! issued against a replaying [`VcrServer`], and the run only passes if every
//! response matches its recording and every event is consumed.

use std::path::Path;
use std::sync::{Arc, PoisonError};

use tracing::info;

use crate::error::EngineError;
use crate::script::loader::ScriptLoader;
use crate::vcr::cassette::Cassette;
use crate::vcr::events::{CassetteEvent, ToolCallEvent};
use crate::vcr::server::VcrServer;

/// Replay the cassette at `path` against a fresh engine.
pub async fn replay_cassette(
    path: &Path,
    loader: Arc<dyn ScriptLoader>,
) -> Result<(), EngineError> {
    let cassette = Cassette::replay(path)?;
    let calls: Vec<ToolCallEvent> = cassette
        .events()
        .iter()
        .filter_map(|event| match event {
            CassetteEvent::ToolCall(call) => Some(call.clone()),
            _ => None,
        })
        .collect();
    info!(path = %path.display(), calls = calls.len(), "replaying cassette");

    let server = VcrServer::replay(cassette, loader)?;
    for call in calls {
        match call {
            ToolCallEvent::Start {
                name,
                arguments,
                working_dir,
            } => {
                server
                    .start(&name, &arguments, working_dir.map(Into::into))
                    .await?;
            }
            ToolCallEvent::Continue { outputs } => {
                server.continue_script(outputs).await?;
            }
            ToolCallEvent::Finish {} => {
                server.finish_manual().await?;
            }
            ToolCallEvent::Status {} => {
                server.status().await?;
            }
        }
    }

    let leftover = server
        .cassette()
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .has_remaining();
    if leftover {
        return Err(EngineError::ReplayMismatch(
            "cassette has unconsumed events after replay".to_string(),
        ));
    }
    Ok(())
}
