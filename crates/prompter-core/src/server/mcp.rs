//! MCP (Model Context Protocol) wiring using the official Rust SDK (rmcp).
//!
//! Exposes the script engine as four tools — `start`, `continue`, `finish`,
//! `status` — over stdio. Each tool call is one complete stateless exchange;
//! all session state lives in the engine behind the service.

use std::path::PathBuf;
use std::sync::Arc;

use rmcp::{
    handler::server::tool::ToolRouter, handler::server::wrapper::Parameters, model::*, tool,
    tool_handler, tool_router, ErrorData, ServerHandler, ServiceExt,
};

use crate::engine::auto::RealAutoExecutor;
use crate::error::EngineError;
use crate::script::step::JsonMap;
use crate::server::EngineServer;
use crate::vcr::server::VcrServer;

/// The engine behind the tool surface: either a plain live engine or one
/// wrapped in a cassette session.
pub enum ScriptService {
    Plain(EngineServer<RealAutoExecutor>),
    Recorded(VcrServer),
}

impl ScriptService {
    async fn start(
        &self,
        name: &str,
        arguments: &str,
        working_dir: Option<PathBuf>,
    ) -> Result<String, EngineError> {
        match self {
            ScriptService::Plain(server) => server.start(name, arguments, working_dir).await,
            ScriptService::Recorded(server) => server.start(name, arguments, working_dir).await,
        }
    }

    async fn continue_script(&self, outputs: JsonMap) -> Result<String, EngineError> {
        match self {
            ScriptService::Plain(server) => server.continue_script(outputs).await,
            ScriptService::Recorded(server) => server.continue_script(outputs).await,
        }
    }

    async fn finish_manual(&self) -> Result<String, EngineError> {
        match self {
            ScriptService::Plain(server) => server.finish_manual().await,
            ScriptService::Recorded(server) => server.finish_manual().await,
        }
    }

    async fn status(&self) -> Result<String, EngineError> {
        match self {
            ScriptService::Plain(server) => server.status().await,
            ScriptService::Recorded(server) => server.status().await,
        }
    }
}

#[derive(Debug, serde::Deserialize, schemars::JsonSchema)]
pub struct StartParams {
    /// Script name, e.g. `demo/guess` (`demo:guess` also works).
    pub name: String,
    /// Free-form request text handed to the script.
    #[serde(default)]
    pub arguments: String,
    /// Working directory override for this script.
    #[serde(default)]
    pub working_dir: Option<String>,
}

#[derive(Debug, serde::Deserialize, schemars::JsonSchema)]
pub struct ContinueParams {
    /// Outputs for the pending judgment step, keyed as it requested.
    #[serde(default)]
    pub outputs: JsonMap,
}

/// MCP server handler exposing the script engine to a driving agent.
#[derive(Clone)]
pub struct PrompterMcpServer {
    service: Arc<ScriptService>,
    tool_router: ToolRouter<Self>,
}

#[tool_router]
impl PrompterMcpServer {
    pub fn new(service: ScriptService) -> Self {
        Self {
            service: Arc::new(service),
            tool_router: Self::tool_router(),
        }
    }

    #[tool(description = "Start a script by name and run it until your judgment is needed")]
    async fn start(
        &self,
        Parameters(params): Parameters<StartParams>,
    ) -> Result<CallToolResult, ErrorData> {
        let text = self
            .service
            .start(
                &params.name,
                &params.arguments,
                params.working_dir.map(PathBuf::from),
            )
            .await
            .map_err(|e| ErrorData::internal_error(e.to_string(), None))?;
        Ok(CallToolResult::success(vec![Content::text(text)]))
    }

    #[tool(
        name = "continue",
        description = "Complete the pending judgment step with its expected outputs and keep running"
    )]
    async fn continue_script(
        &self,
        Parameters(params): Parameters<ContinueParams>,
    ) -> Result<CallToolResult, ErrorData> {
        let text = self
            .service
            .continue_script(params.outputs)
            .await
            .map_err(|e| ErrorData::internal_error(e.to_string(), None))?;
        Ok(CallToolResult::success(vec![Content::text(text)]))
    }

    #[tool(description = "Mark the pending instructional script or manual fallback as finished")]
    async fn finish(&self) -> Result<CallToolResult, ErrorData> {
        let text = self
            .service
            .finish_manual()
            .await
            .map_err(|e| ErrorData::internal_error(e.to_string(), None))?;
        Ok(CallToolResult::success(vec![Content::text(text)]))
    }

    #[tool(description = "Show the current script stack and whatever is pending")]
    async fn status(&self) -> Result<CallToolResult, ErrorData> {
        let text = self
            .service
            .status()
            .await
            .map_err(|e| ErrorData::internal_error(e.to_string(), None))?;
        Ok(CallToolResult::success(vec![Content::text(text)]))
    }
}

#[tool_handler]
impl ServerHandler for PrompterMcpServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            instructions: Some(
                "Suspendable script engine. Call `start` to run a script; it executes \
                 automated steps itself and suspends whenever it needs your judgment. \
                 Answer a pending judgment step with `continue`, complete instructional \
                 scripts and manual fallbacks with `finish`, and inspect the stack with \
                 `status`."
                    .into(),
            ),
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            ..Default::default()
        }
    }
}

/// Serve the tool surface over stdio until the client disconnects.
pub async fn serve_stdio(
    service: ScriptService,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let server = PrompterMcpServer::new(service);
    let running = server.serve(rmcp::transport::stdio()).await?;
    running.waiting().await?;
    Ok(())
}
