//! Driver-facing server surface.
//!
//! `EngineServer` turns executor outcomes into the text responses the driver
//! sees. Every method is a complete stateless exchange: the driver calls a
//! tool, the engine runs until it suspends, and the response says what to do
//! next. The MCP wiring lives in [`mcp`]; the cassette-wrapped variant in
//! [`crate::vcr::server`].

pub mod mcp;

use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::info;

use crate::engine::auto::AutoExecutor;
use crate::engine::executor::{ExecutedStep, RunOutcome, ScriptExecutor, StepOutcome};
use crate::engine::frame::ExecutionFrame;
use crate::engine::pending::Pending;
use crate::error::EngineError;
use crate::script::loader::ScriptLoader;
use crate::script::step::JsonMap;

pub struct EngineServer<E: AutoExecutor> {
    executor: Mutex<ScriptExecutor<E>>,
}

impl<E: AutoExecutor> EngineServer<E> {
    pub fn new(working_dir: PathBuf, auto: E, loader: Arc<dyn ScriptLoader>) -> Self {
        Self {
            executor: Mutex::new(ScriptExecutor::new(working_dir, auto, loader)),
        }
    }

    /// Start a script and run it to the first suspension.
    ///
    /// A load failure comes back as response text rather than a hard error:
    /// the driver may simply have mistyped the name.
    pub async fn start(
        &self,
        name: &str,
        arguments: &str,
        working_dir: Option<PathBuf>,
    ) -> Result<String, EngineError> {
        let mut executor = self.executor.lock().await;
        match executor.start(name, arguments, working_dir).await {
            Ok(outcome) => Ok(format_run_outcome(&outcome)),
            Err(EngineError::ScriptLoad(err)) => Ok(format!("Error: {err}")),
            Err(err) => Err(err),
        }
    }

    /// Complete the pending judgment step and keep running.
    pub async fn continue_script(&self, outputs: JsonMap) -> Result<String, EngineError> {
        let mut executor = self.executor.lock().await;
        match executor.pending() {
            Some(Pending::Judgment(_)) => {
                let outcome = executor.resume(outputs).await?;
                Ok(format_run_outcome(&outcome))
            }
            Some(Pending::Instructional(_)) => Ok(
                "Error: An instructional script is pending. Call `finish` when you have \
                 completed it, not `continue`."
                    .to_string(),
            ),
            Some(Pending::Fallback(_)) => Ok(
                "Error: The script is waiting for manual completion. Call `finish` when \
                 done, not `continue`."
                    .to_string(),
            ),
            None => Ok("Error: No judgment step is pending. Nothing to continue.".to_string()),
        }
    }

    /// Mark the pending instructional script or fallback as done by hand.
    pub async fn finish_manual(&self) -> Result<String, EngineError> {
        let mut executor = self.executor.lock().await;
        match executor.pending() {
            Some(Pending::Instructional(_)) | Some(Pending::Fallback(_)) => {
                let outcome = executor.complete_manual().await?;
                Ok(format_run_outcome(&outcome))
            }
            Some(Pending::Judgment(_)) => Ok(
                "Error: A judgment step is pending. Call `continue` with its outputs, \
                 not `finish`."
                    .to_string(),
            ),
            None => Ok(
                "Error: No instructional script or fallback is pending. Nothing to finish."
                    .to_string(),
            ),
        }
    }

    /// Report the current stack and whatever is pending, without advancing.
    pub async fn status(&self) -> Result<String, EngineError> {
        let mut executor = self.executor.lock().await;
        if executor.stack().is_empty() {
            return Ok("No script is currently running.".to_string());
        }
        let top = executor
            .stack()
            .top()
            .map(ExecutionFrame::script_name)
            .unwrap_or_default()
            .to_string();
        let mut out = format!(
            "## Script: `{top}`\n\nStack depth: {}\nStack path: `{}`\n",
            executor.stack().depth(),
            executor.stack().path()
        );
        if let Some(pending) = executor.pending() {
            out.push('\n');
            out.push_str(&pending.render());
        }
        info!(script = %top, "status requested");
        Ok(out)
    }
}

// ─── Response formatting ─────────────────────────────────────────────────

fn format_step_lines(step: &ExecutedStep, out: &mut String) {
    if step.is_entry {
        if let crate::script::step::Step::Invoke(invoke) = &step.step {
            out.push_str(&format!("↪ Calling {}\n", invoke.description()));
        }
        return;
    }
    if step.is_exit {
        if let Some(StepOutcome::Invocation(result)) = &step.result {
            let mark = if result.success { "✓" } else { "✗" };
            out.push_str(&format!(
                "{mark} Returned from {}: {}\n",
                step.script_name, result.summary
            ));
        }
        return;
    }

    let description = match &step.step {
        crate::script::step::Step::Auto(auto) => auto.description(),
        crate::script::step::Step::Invoke(invoke) => invoke.description(),
        crate::script::step::Step::Judgment(judgment) => judgment.prompt.clone(),
    };
    match &step.result {
        Some(outcome) => {
            let mark = if outcome.success() { "✓" } else { "✗" };
            out.push_str(&format!("{mark} Step {}: {description}\n", step.step_index));
            if let StepOutcome::Fault(fault) = outcome {
                out.push_str(&format!("  Error: {}\n", fault.message));
            }
            for line in outcome.output().lines() {
                out.push_str(&format!("  {line}\n"));
            }
        }
        None => {
            out.push_str(&format!("• Step {}: {description}\n", step.step_index));
        }
    }
}

/// Render a run segment: what was executed, then what is pending.
pub fn format_run_outcome(outcome: &RunOutcome) -> String {
    let mut out = String::new();
    if !outcome.executed_steps.is_empty() {
        out.push_str("## Executed Steps\n\n");
        for step in &outcome.executed_steps {
            format_step_lines(step, &mut out);
        }
        out.push('\n');
    }
    match &outcome.pending {
        Some(pending) => out.push_str(&pending.render()),
        None => out.push_str("## All Steps Completed\n\nThe script has finished execution."),
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::script::step::{AutoResult, AutoStep, ShellResult, Step};

    fn shell_step(output: &str, success: bool) -> ExecutedStep {
        ExecutedStep {
            script_name: "demo/guess".into(),
            step_index: 0,
            step: Step::Auto(AutoStep::shell("shuf -i 1-100 -n 1", "Generate a number")),
            result: Some(StepOutcome::Auto(AutoResult::Shell(ShellResult {
                success,
                exit_code: if success { 0 } else { 1 },
                output: output.into(),
            }))),
            is_entry: false,
            is_exit: false,
        }
    }

    #[test]
    fn completed_run_says_so() {
        let outcome = RunOutcome {
            executed_steps: vec![shell_step("42\n", true)],
            pending: None,
        };
        let text = format_run_outcome(&outcome);
        assert!(text.contains("✓ Step 0: shuf -i 1-100 -n 1"));
        assert!(text.contains("  42"));
        assert!(text.contains("## All Steps Completed"));
    }

    #[test]
    fn failed_step_gets_a_cross_mark() {
        let outcome = RunOutcome {
            executed_steps: vec![shell_step("", false)],
            pending: None,
        };
        assert!(format_run_outcome(&outcome).contains("✗ Step 0:"));
    }
}
