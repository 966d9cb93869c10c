//! Cassette-wrapped server surface.
//!
//! `VcrServer` mirrors the four tool methods of
//! [`EngineServer`](crate::server::EngineServer). In record mode every call
//! and its response text are appended to the cassette around the real
//! exchange. In replay mode each call first consumes its recorded
//! counterpart and the produced response must match the recording byte for
//! byte, so any drift in engine behavior fails loudly.

use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::{debug, info};

use crate::error::EngineError;
use crate::script::loader::ScriptLoader;
use crate::script::step::JsonMap;
use crate::server::EngineServer;
use crate::vcr::cassette::{Cassette, CassetteError, CassetteMode, SharedCassette};
use crate::vcr::events::{CassetteEvent, ToolCallEvent, ToolResponseEvent};
use crate::vcr::recorder::VcrAutoExecutor;

pub struct VcrServer {
    cassette: SharedCassette,
    mode: CassetteMode,
    inner: EngineServer<VcrAutoExecutor>,
}

impl VcrServer {
    /// Record a live session into `cassette`. The engine's working directory
    /// comes from the cassette's initial state, so recording and replay can
    /// never disagree about where auto steps ran.
    pub fn record(cassette: Cassette, loader: Arc<dyn ScriptLoader>) -> Result<Self, CassetteError> {
        if cassette.working_dir().is_empty() {
            return Err(CassetteError::MissingWorkingDir);
        }
        let working_dir = PathBuf::from(cassette.working_dir());
        let shared: SharedCassette = Arc::new(Mutex::new(cassette));
        let auto = VcrAutoExecutor::record(Arc::clone(&shared))?;
        info!(working_dir = %working_dir.display(), "recording session");
        Ok(Self {
            cassette: shared,
            mode: CassetteMode::Record,
            inner: EngineServer::new(working_dir, auto, loader),
        })
    }

    /// Replay a recorded session. The working directory comes from the
    /// cassette's initial state; the real one is never touched.
    pub fn replay(cassette: Cassette, loader: Arc<dyn ScriptLoader>) -> Result<Self, CassetteError> {
        let working_dir = PathBuf::from(cassette.working_dir());
        let shared: SharedCassette = Arc::new(Mutex::new(cassette));
        let auto = VcrAutoExecutor::replay(Arc::clone(&shared))?;
        info!(working_dir = %working_dir.display(), "replaying session");
        Ok(Self {
            cassette: shared,
            mode: CassetteMode::Replay,
            inner: EngineServer::new(working_dir, auto, loader),
        })
    }

    pub fn cassette(&self) -> SharedCassette {
        Arc::clone(&self.cassette)
    }

    fn lock(&self) -> MutexGuard<'_, Cassette> {
        self.cassette.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Record or verify the call event, before the engine runs.
    fn open_exchange(&self, call: ToolCallEvent) -> Result<(), EngineError> {
        let mut cassette = self.lock();
        match self.mode {
            CassetteMode::Record => {
                cassette.record_event(CassetteEvent::ToolCall(call))?;
                cassette.save()?;
                Ok(())
            }
            CassetteMode::Replay => {
                let recorded = cassette.consume_tool_call()?;
                if recorded != call {
                    return Err(EngineError::ReplayMismatch(format!(
                        "tool call diverged from the recording.\n\
                         Expected: {recorded:?}\n\
                         Got:      {call:?}"
                    )));
                }
                debug!(tool = call.tool_name(), "replaying tool call");
                Ok(())
            }
        }
    }

    /// Record or verify the response text, after the engine suspends.
    fn close_exchange(&self, tool: &'static str, output: &str) -> Result<(), EngineError> {
        let mut cassette = self.lock();
        match self.mode {
            CassetteMode::Record => {
                cassette.record_event(CassetteEvent::ToolResponse(ToolResponseEvent {
                    tool: tool.to_string(),
                    output: output.to_string(),
                }))?;
                cassette.save()?;
                Ok(())
            }
            CassetteMode::Replay => {
                let recorded = cassette.consume_tool_response()?;
                if recorded.tool != tool || recorded.output != output {
                    return Err(EngineError::ReplayMismatch(format!(
                        "tool response diverged from the recording.\n\
                         Expected ({}):\n{}\n\
                         Got ({tool}):\n{output}",
                        recorded.tool, recorded.output
                    )));
                }
                Ok(())
            }
        }
    }

    pub async fn start(
        &self,
        name: &str,
        arguments: &str,
        working_dir: Option<PathBuf>,
    ) -> Result<String, EngineError> {
        self.open_exchange(ToolCallEvent::Start {
            name: name.to_string(),
            arguments: arguments.to_string(),
            working_dir: working_dir
                .as_ref()
                .map(|dir| dir.display().to_string()),
        })?;
        let output = self.inner.start(name, arguments, working_dir).await?;
        self.close_exchange("start", &output)?;
        Ok(output)
    }

    pub async fn continue_script(&self, outputs: JsonMap) -> Result<String, EngineError> {
        self.open_exchange(ToolCallEvent::Continue {
            outputs: outputs.clone(),
        })?;
        let output = self.inner.continue_script(outputs).await?;
        self.close_exchange("continue", &output)?;
        Ok(output)
    }

    pub async fn finish_manual(&self) -> Result<String, EngineError> {
        self.open_exchange(ToolCallEvent::Finish {})?;
        let output = self.inner.finish_manual().await?;
        self.close_exchange("finish", &output)?;
        Ok(output)
    }

    pub async fn status(&self) -> Result<String, EngineError> {
        self.open_exchange(ToolCallEvent::Status {})?;
        let output = self.inner.status().await?;
        self.close_exchange("status", &output)?;
        Ok(output)
    }
}
