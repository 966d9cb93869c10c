//! Auto-step execution boundary.
//!
//! The executor never runs commands itself; it hands each [`AutoStep`] to an
//! [`AutoExecutor`]. The real implementation shells out through `sh -c`; the
//! cassette layer substitutes a recording or replaying implementation behind
//! the same trait.

use std::future::Future;
use std::path::Path;
use std::process::Stdio;

use tracing::debug;

use crate::error::EngineError;
use crate::script::step::{
    AutoAction, AutoResult, AutoStep, CallResult, ExecutionFault, ShellResult,
};

/// What an auto step produced at the boundary.
///
/// `Ok` carries both successes and soft failures (a nonzero exit code is
/// still a result); `Fault` is the hard path — the step raised instead of
/// producing a result.
#[derive(Debug, Clone)]
pub enum AutoOutcome {
    Ok(AutoResult),
    Fault(ExecutionFault),
}

/// Executes auto steps in a working directory.
///
/// The `Err` arm is reserved for infrastructure failures (cassette errors,
/// replay mismatches) that must abort the run; anything the step itself did
/// wrong comes back inside [`AutoOutcome`].
pub trait AutoExecutor: Send {
    fn execute(
        &self,
        step: &AutoStep,
        working_dir: &Path,
    ) -> impl Future<Output = Result<AutoOutcome, EngineError>> + Send;
}

/// Runs shell commands and native calls for real.
#[derive(Debug, Clone, Default)]
pub struct RealAutoExecutor;

impl RealAutoExecutor {
    pub fn new() -> Self {
        Self
    }

    async fn run_shell(&self, cmd: &str, working_dir: &Path) -> AutoOutcome {
        debug!(cmd, working_dir = %working_dir.display(), "running shell step");
        let spawned = tokio::process::Command::new("sh")
            .arg("-c")
            .arg(cmd)
            .current_dir(working_dir)
            .stdin(Stdio::null())
            .output()
            .await;

        match spawned {
            Ok(output) => {
                let mut combined = String::from_utf8_lossy(&output.stdout).into_owned();
                combined.push_str(&String::from_utf8_lossy(&output.stderr));
                let exit_code = output.status.code().unwrap_or(-1);
                AutoOutcome::Ok(AutoResult::Shell(ShellResult {
                    success: output.status.success(),
                    exit_code,
                    output: combined,
                }))
            }
            Err(err) => AutoOutcome::Fault(ExecutionFault {
                message: format!("Failed to run command: {err}"),
                step_description: cmd.to_string(),
                output: String::new(),
            }),
        }
    }
}

impl AutoExecutor for RealAutoExecutor {
    async fn execute(
        &self,
        step: &AutoStep,
        working_dir: &Path,
    ) -> Result<AutoOutcome, EngineError> {
        match &step.action {
            AutoAction::Shell { cmd } => Ok(self.run_shell(cmd, working_dir).await),
            AutoAction::Native(call) => Ok(match (call.func)(&call.args) {
                Ok(out) => AutoOutcome::Ok(AutoResult::Call(CallResult {
                    success: true,
                    value: out.value,
                    error: None,
                    output: out.output,
                })),
                Err(fault) => AutoOutcome::Fault(ExecutionFault {
                    message: fault.message,
                    step_description: step.description(),
                    output: fault.output,
                }),
            }),
        }
    }
}
