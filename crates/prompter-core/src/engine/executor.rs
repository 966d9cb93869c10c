//! The driving executor.
//!
//! `ScriptExecutor` owns the frame stack and runs auto steps until something
//! needs the external driver: a judgment step, an instructional script, or a
//! hard fault. At that point it suspends and returns a [`RunOutcome`] whose
//! `pending` field says exactly what the driver must do. Every entry point is
//! a complete run-until-suspend cycle, so the caller can be fully stateless
//! between calls.
//!
//! Failure handling has two tiers:
//! - a *soft* failure (nonzero exit, failed call result) is rewritten into a
//!   synthesized judgment step on the same frame, so the driver decides how
//!   to proceed and the script can still be resumed;
//! - a *hard* fault (the step raised instead of producing a result) freezes
//!   the frame and falls back to manual completion via `finish`.

use std::path::PathBuf;
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::engine::auto::{AutoExecutor, AutoOutcome};
use crate::engine::frame::{CompiledFrame, ExecutionFrame, FrameStack, InstructionalFrame};
use crate::engine::pending::{
    Pending, PendingFallback, PendingInstructional, PendingJudgment,
};
use crate::error::EngineError;
use crate::script::loader::{ScriptBody, ScriptLoader};
use crate::script::sequence::StepInput;
use crate::script::step::{
    AutoAction, AutoResult, AutoStep, ExecutionFault, InvocationResult, InvokeStep, JsonMap,
    JudgmentResult, JudgmentStep, Step,
};

/// Outcome of a single executed step, kept for driver-facing reporting.
#[derive(Debug, Clone)]
pub enum StepOutcome {
    Auto(AutoResult),
    Fault(ExecutionFault),
    Invocation(InvocationResult),
}

impl StepOutcome {
    pub fn success(&self) -> bool {
        match self {
            StepOutcome::Auto(r) => r.success(),
            StepOutcome::Fault(_) => false,
            StepOutcome::Invocation(r) => r.success,
        }
    }

    /// Trimmed output text, if the outcome produced any.
    pub fn output(&self) -> &str {
        match self {
            StepOutcome::Auto(r) => r.output().trim_end(),
            StepOutcome::Fault(f) => f.output.trim_end(),
            StepOutcome::Invocation(_) => "",
        }
    }
}

/// One step the engine executed (or entered/left) during a run segment.
#[derive(Debug, Clone)]
pub struct ExecutedStep {
    pub script_name: String,
    pub step_index: usize,
    pub step: Step,
    pub result: Option<StepOutcome>,
    /// Marks the transition into a nested script.
    pub is_entry: bool,
    /// Marks the return from a nested script.
    pub is_exit: bool,
}

/// What one run-until-suspend cycle did, and what it is now waiting on.
#[derive(Debug)]
pub struct RunOutcome {
    pub executed_steps: Vec<ExecutedStep>,
    /// `None` means the whole stack ran to completion.
    pub pending: Option<Pending>,
}

impl RunOutcome {
    pub fn completed(&self) -> bool {
        self.pending.is_none()
    }
}

enum Action {
    Completed,
    Suspend,
    PopExhausted,
    RunAuto {
        step: AutoStep,
        working_dir: PathBuf,
        script_name: String,
        step_index: usize,
    },
    EnterInvoke {
        step: InvokeStep,
        working_dir: PathBuf,
        script_name: String,
        step_index: usize,
    },
}

/// Drives scripts through their auto steps, suspending whenever the
/// external driver is needed.
pub struct ScriptExecutor<E: AutoExecutor> {
    working_dir: PathBuf,
    stack: FrameStack,
    auto: E,
    loader: Arc<dyn ScriptLoader>,
    recent: Vec<ExecutedStep>,
}

impl<E: AutoExecutor> ScriptExecutor<E> {
    pub fn new(working_dir: PathBuf, auto: E, loader: Arc<dyn ScriptLoader>) -> Self {
        Self {
            working_dir,
            stack: FrameStack::new(),
            auto,
            loader,
            recent: Vec::new(),
        }
    }

    pub fn stack(&self) -> &FrameStack {
        &self.stack
    }

    pub fn working_dir(&self) -> &PathBuf {
        &self.working_dir
    }

    /// Load a script and run it until the first suspension.
    ///
    /// A top-level load failure is a hard error: there is no enclosing frame
    /// to absorb it. The same failure inside a nested invocation is folded
    /// into the parent's invocation result instead.
    pub async fn start(
        &mut self,
        name: &str,
        request: &str,
        working_dir: Option<PathBuf>,
    ) -> Result<RunOutcome, EngineError> {
        let script = self.loader.load(name, request)?;
        let dir = working_dir.unwrap_or_else(|| self.working_dir.clone());
        info!(script = %script.name, working_dir = %dir.display(), "starting script");
        self.push_loaded(script.name, script.source, script.body, request, dir);
        self.run_until_suspend().await
    }

    /// Complete the pending judgment step with the driver's outputs and keep
    /// running.
    pub async fn resume(&mut self, outputs: JsonMap) -> Result<RunOutcome, EngineError> {
        if !matches!(self.pending(), Some(Pending::Judgment(_))) {
            return Err(EngineError::NoJudgmentPending);
        }
        if let Some(ExecutionFrame::Compiled(frame)) = self.stack.top_mut() {
            frame.advance(StepInput::Judgment(JudgmentResult { outputs }));
        }
        self.run_until_suspend().await
    }

    /// Finish the pending instructional script or faulted fallback, feeding a
    /// synthesized result to the caller frame, and keep running.
    pub async fn complete_manual(&mut self) -> Result<RunOutcome, EngineError> {
        let eligible = match self.stack.top() {
            Some(ExecutionFrame::Instructional(_)) => true,
            Some(ExecutionFrame::Compiled(frame)) => frame.fault.is_some(),
            None => false,
        };
        if !eligible {
            return Err(EngineError::NoManualPending);
        }

        let Some(popped) = self.stack.pop() else {
            return Err(EngineError::NoManualPending);
        };
        let (child_name, result) = match popped {
            ExecutionFrame::Instructional(frame) => {
                let result = InvocationResult {
                    success: true,
                    summary: format!("Completed: {}", frame.script_name),
                    steps_executed: 1,
                    fault: None,
                };
                (frame.script_name, result)
            }
            ExecutionFrame::Compiled(frame) => {
                let result = InvocationResult {
                    success: false,
                    summary: format!("Completed with fallback: {}", frame.script_name),
                    steps_executed: frame.step_index + 1,
                    fault: frame.fault.clone(),
                };
                (frame.script_name, result)
            }
        };
        info!(script = %child_name, "manual completion");
        self.return_to_parent(child_name, result);
        self.run_until_suspend().await
    }

    /// Derive what the driver must do from the top of the stack.
    ///
    /// Read-only apart from the lazy first-step pull, which is idempotent.
    pub fn pending(&mut self) -> Option<Pending> {
        let depth = self.stack.depth();
        let path = self.stack.path();
        match self.stack.top_mut()? {
            ExecutionFrame::Instructional(frame) => {
                Some(Pending::Instructional(PendingInstructional {
                    name: frame.script_name.clone(),
                    content: frame.content.clone(),
                }))
            }
            ExecutionFrame::Compiled(frame) => {
                if let Some(fault) = &frame.fault {
                    return Some(Pending::Fallback(PendingFallback {
                        script_name: frame.script_name.clone(),
                        source: frame.source.clone(),
                        fault: fault.clone(),
                        step_index: frame.step_index,
                        stack_path: (depth > 1).then_some(path),
                    }));
                }
                let script_name = frame.script_name.clone();
                let step_index = frame.step_index;
                let context = (!frame.shown_source).then(|| frame.source.clone());
                match frame.current_step() {
                    Some(Step::Judgment(step)) => Some(Pending::Judgment(PendingJudgment {
                        step: Arc::clone(step),
                        script_name,
                        step_index,
                        stack_path: (depth > 1).then_some(path),
                        context,
                    })),
                    _ => None,
                }
            }
        }
    }

    // ─── Internals ───────────────────────────────────────────────────────

    fn push_loaded(
        &mut self,
        name: String,
        source: String,
        body: ScriptBody,
        arguments: &str,
        working_dir: PathBuf,
    ) {
        match body {
            ScriptBody::Compiled(sequence) => {
                self.stack.push(ExecutionFrame::Compiled(CompiledFrame::new(
                    name,
                    working_dir,
                    source,
                    arguments,
                    sequence,
                )));
            }
            ScriptBody::Instructional => {
                self.stack
                    .push(ExecutionFrame::Instructional(InstructionalFrame {
                        script_name: name,
                        content: source,
                    }));
            }
        }
    }

    /// Feed an invocation result to the parent frame's pending invoke step,
    /// recording the return transition.
    fn return_to_parent(&mut self, child_name: String, result: InvocationResult) {
        if let Some(ExecutionFrame::Compiled(parent)) = self.stack.top_mut() {
            let parent_index = parent.step_index;
            let invoke = match parent.current_step() {
                Some(Step::Invoke(step)) => step.clone(),
                _ => return,
            };
            parent.advance(StepInput::Invocation(result.clone()));
            self.recent.push(ExecutedStep {
                script_name: child_name,
                step_index: parent_index,
                step: Step::Invoke(invoke),
                result: Some(StepOutcome::Invocation(result)),
                is_entry: false,
                is_exit: true,
            });
        }
    }

    async fn run_until_suspend(&mut self) -> Result<RunOutcome, EngineError> {
        loop {
            let action = self.next_action();
            match action {
                Action::Completed | Action::Suspend => return Ok(self.build_outcome()),
                Action::PopExhausted => {
                    let Some(popped) = self.stack.pop() else {
                        continue;
                    };
                    if let ExecutionFrame::Compiled(frame) = popped {
                        debug!(script = %frame.script_name, steps = frame.step_index, "script completed");
                        let result = InvocationResult {
                            success: true,
                            summary: format!(
                                "Completed {} in {} steps",
                                frame.script_name, frame.step_index
                            ),
                            steps_executed: frame.step_index,
                            fault: None,
                        };
                        self.return_to_parent(frame.script_name, result);
                    }
                }
                Action::EnterInvoke {
                    step,
                    working_dir,
                    script_name,
                    step_index,
                } => {
                    self.recent.push(ExecutedStep {
                        script_name: script_name.clone(),
                        step_index,
                        step: Step::Invoke(step.clone()),
                        result: None,
                        is_entry: true,
                        is_exit: false,
                    });
                    match self.loader.load(&step.name, &step.request) {
                        Ok(script) => {
                            debug!(script = %script.name, from = %script_name, "entering nested script");
                            self.push_loaded(
                                script.name,
                                script.source,
                                script.body,
                                &step.request,
                                working_dir,
                            );
                        }
                        Err(err) => {
                            // Nested resolution failure is absorbed by the
                            // caller frame; only top-level loads hard-error.
                            warn!(script = %step.name, %err, "nested script failed to load");
                            let result = InvocationResult {
                                success: false,
                                summary: err.to_string(),
                                steps_executed: 0,
                                fault: None,
                            };
                            self.return_to_parent(step.name.clone(), result);
                        }
                    }
                }
                Action::RunAuto {
                    step,
                    working_dir,
                    script_name,
                    step_index,
                } => match self.auto.execute(&step, &working_dir).await? {
                    AutoOutcome::Ok(result) if result.success() => {
                        self.recent.push(ExecutedStep {
                            script_name,
                            step_index,
                            step: Step::Auto(step),
                            result: Some(StepOutcome::Auto(result.clone())),
                            is_entry: false,
                            is_exit: false,
                        });
                        if let Some(ExecutionFrame::Compiled(frame)) = self.stack.top_mut() {
                            frame.advance(StepInput::Auto(result));
                        }
                    }
                    AutoOutcome::Ok(result) => {
                        // Soft failure: the driver decides what to do, on the
                        // same step index, through a synthesized judgment.
                        debug!(script = %script_name, step = step_index, "auto step failed softly");
                        let prompt = soft_failure_prompt(&step, &result);
                        self.recent.push(ExecutedStep {
                            script_name,
                            step_index,
                            step: Step::Auto(step),
                            result: Some(StepOutcome::Auto(result)),
                            is_entry: false,
                            is_exit: false,
                        });
                        if let Some(ExecutionFrame::Compiled(frame)) = self.stack.top_mut() {
                            frame.set_current(Step::judgment(JudgmentStep::new(prompt)));
                        }
                        return Ok(self.build_outcome());
                    }
                    AutoOutcome::Fault(fault) => {
                        warn!(script = %script_name, step = step_index, error = %fault.message, "auto step faulted");
                        self.recent.push(ExecutedStep {
                            script_name,
                            step_index,
                            step: Step::Auto(step),
                            result: Some(StepOutcome::Fault(fault.clone())),
                            is_entry: false,
                            is_exit: false,
                        });
                        if let Some(ExecutionFrame::Compiled(frame)) = self.stack.top_mut() {
                            frame.fault = Some(fault);
                        }
                        return Ok(self.build_outcome());
                    }
                },
            }
        }
    }

    fn next_action(&mut self) -> Action {
        match self.stack.top_mut() {
            None => Action::Completed,
            Some(ExecutionFrame::Instructional(_)) => Action::Suspend,
            Some(ExecutionFrame::Compiled(frame)) => {
                if frame.fault.is_some() {
                    return Action::Suspend;
                }
                let script_name = frame.script_name.clone();
                let step_index = frame.step_index;
                let frame_dir = frame.working_dir.clone();
                match frame.current_step() {
                    None => Action::PopExhausted,
                    Some(Step::Judgment(_)) => Action::Suspend,
                    Some(Step::Auto(step)) => Action::RunAuto {
                        step: step.clone(),
                        working_dir: frame_dir,
                        script_name,
                        step_index,
                    },
                    Some(Step::Invoke(step)) => {
                        let working_dir = step.working_dir.clone().unwrap_or(frame_dir);
                        Action::EnterInvoke {
                            step: step.clone(),
                            working_dir,
                            script_name,
                            step_index,
                        }
                    }
                }
            }
        }
    }

    fn build_outcome(&mut self) -> RunOutcome {
        let pending = self.pending();
        if matches!(pending, Some(Pending::Judgment(_))) {
            // The context block was just rendered into the pending view;
            // later suspensions on this frame must not repeat it.
            if let Some(ExecutionFrame::Compiled(frame)) = self.stack.top_mut() {
                frame.shown_source = true;
            }
        }
        RunOutcome {
            executed_steps: std::mem::take(&mut self.recent),
            pending,
        }
    }
}

fn soft_failure_prompt(step: &AutoStep, result: &AutoResult) -> String {
    let mut prompt = format!("The step `{}` failed.\n\n", step.context);
    match (&step.action, result) {
        (AutoAction::Shell { cmd }, AutoResult::Shell(r)) => {
            prompt.push_str(&format!("Command: `{cmd}`\nexit code {}", r.exit_code));
        }
        (_, AutoResult::Call(r)) => {
            let error = r.error.as_deref().unwrap_or("call failed");
            prompt.push_str(&format!("Call: `{}`\nError: {error}", step.description()));
        }
        (_, AutoResult::Shell(r)) => {
            prompt.push_str(&format!(
                "Command: `{}`\nexit code {}",
                step.description(),
                r.exit_code
            ));
        }
    }
    let output = result.output().trim_end();
    if !output.is_empty() {
        prompt.push_str(&format!("\n\nOutput:\n{output}"));
    }
    prompt.push_str("\n\nPlease handle this error and decide how to proceed.");
    prompt
}
