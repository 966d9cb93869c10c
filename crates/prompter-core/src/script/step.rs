//! Step model — the data contract between scripts and the engine.
//!
//! A script is a sequence of three step kinds:
//! - [`Step::Auto`] — deterministic automation (shell command or native call)
//! - [`Step::Judgment`] — a step that needs the external driver's judgment
//! - [`Step::Invoke`] — invocation of another script within the same stack
//!
//! Steps are immutable once created. Judgment steps are reference-counted so
//! that the pending view of the stack can hand out the *same* step object the
//! owning frame holds.

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use serde_json::Value;

/// JSON object map used for judgment outputs and native-call arguments.
pub type JsonMap = serde_json::Map<String, Value>;

// ─── Auto actions ────────────────────────────────────────────────────────

/// Return value plus captured output of a native call.
#[derive(Debug, Clone)]
pub struct NativeOutput {
    pub value: Value,
    pub output: String,
}

/// A native call that failed; escalates to a hard fault.
#[derive(Debug, Clone)]
pub struct NativeFault {
    pub message: String,
    pub output: String,
}

/// Function registered for a native-call action.
pub type NativeFn = Arc<dyn Fn(&JsonMap) -> Result<NativeOutput, NativeFault> + Send + Sync>;

/// A native function call with serializable arguments.
///
/// The function itself lives in the script registry; only `name` and `args`
/// cross the cassette boundary.
#[derive(Clone)]
pub struct NativeCall {
    pub name: String,
    pub args: JsonMap,
    pub func: NativeFn,
}

impl fmt::Debug for NativeCall {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NativeCall")
            .field("name", &self.name)
            .field("args", &self.args)
            .finish()
    }
}

/// The action of an auto step.
#[derive(Debug, Clone)]
pub enum AutoAction {
    Shell { cmd: String },
    Native(NativeCall),
}

/// A deterministic automation step. Fast and predictable — needs no judgment.
#[derive(Debug, Clone)]
pub struct AutoStep {
    pub action: AutoAction,
    /// Explains WHY this step runs, verbatim from the script source.
    pub context: String,
}

impl AutoStep {
    pub fn shell(cmd: impl Into<String>, context: impl Into<String>) -> Self {
        Self {
            action: AutoAction::Shell { cmd: cmd.into() },
            context: context.into(),
        }
    }

    pub fn native(
        name: impl Into<String>,
        args: JsonMap,
        func: NativeFn,
        context: impl Into<String>,
    ) -> Self {
        Self {
            action: AutoAction::Native(NativeCall {
                name: name.into(),
                args,
                func,
            }),
            context: context.into(),
        }
    }

    /// Human-readable description of the action, also used for cassette
    /// input verification.
    pub fn description(&self) -> String {
        match &self.action {
            AutoAction::Shell { cmd } => cmd.clone(),
            AutoAction::Native(call) => {
                let args = call
                    .args
                    .iter()
                    .map(|(k, v)| format!("{k}={v}"))
                    .collect::<Vec<_>>()
                    .join(", ");
                format!("{}({args})", call.name)
            }
        }
    }
}

// ─── Judgment steps ──────────────────────────────────────────────────────

/// A step that hands control to the external driver with full context.
/// The driver signals completion through the `continue` tool, supplying the
/// outputs named in `expects`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JudgmentStep {
    pub prompt: String,
    /// Required output keys, key → description.
    pub expects: BTreeMap<String, String>,
}

impl JudgmentStep {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            expects: BTreeMap::new(),
        }
    }

    pub fn with_expects(
        prompt: impl Into<String>,
        expects: impl IntoIterator<Item = (String, String)>,
    ) -> Self {
        Self {
            prompt: prompt.into(),
            expects: expects.into_iter().collect(),
        }
    }
}

/// Outputs the driver supplied for a completed judgment step.
#[derive(Debug, Clone, Default)]
pub struct JudgmentResult {
    pub outputs: JsonMap,
}

// ─── Invocations ─────────────────────────────────────────────────────────

/// Invoke another script within the shared stack.
#[derive(Debug, Clone)]
pub struct InvokeStep {
    pub name: String,
    pub request: String,
    /// Working directory override for the nested script; inherits the
    /// caller's when absent.
    pub working_dir: Option<PathBuf>,
}

impl InvokeStep {
    pub fn new(name: impl Into<String>, request: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            request: request.into(),
            working_dir: None,
        }
    }

    pub fn in_dir(mut self, working_dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(working_dir.into());
        self
    }

    pub fn description(&self) -> String {
        if self.request.is_empty() {
            format!("/{}", self.name)
        } else {
            format!("/{} {}", self.name, self.request)
        }
    }
}

/// Result fed back to the frame that issued an [`InvokeStep`].
#[derive(Debug, Clone)]
pub struct InvocationResult {
    pub success: bool,
    pub summary: String,
    pub steps_executed: usize,
    /// Present when the child completed through the manual fallback path.
    pub fault: Option<ExecutionFault>,
}

// ─── Auto results ────────────────────────────────────────────────────────

/// Result of executing a shell command. `output` is combined stdout/stderr.
#[derive(Debug, Clone)]
pub struct ShellResult {
    pub success: bool,
    pub exit_code: i32,
    pub output: String,
}

/// Result of a native call.
#[derive(Debug, Clone)]
pub struct CallResult {
    pub success: bool,
    pub value: Value,
    pub error: Option<String>,
    pub output: String,
}

/// A produced auto-step result (the soft path — a hard fault is
/// [`ExecutionFault`], returned structurally, never as one of these).
#[derive(Debug, Clone)]
pub enum AutoResult {
    Shell(ShellResult),
    Call(CallResult),
}

impl AutoResult {
    pub fn success(&self) -> bool {
        match self {
            AutoResult::Shell(r) => r.success,
            AutoResult::Call(r) => r.success,
        }
    }

    pub fn output(&self) -> &str {
        match self {
            AutoResult::Shell(r) => &r.output,
            AutoResult::Call(r) => &r.output,
        }
    }
}

/// An auto step that raised instead of producing a result.
///
/// This is the hard-escalation signal: the enclosing script falls back to
/// fully manual completion and is never auto-resumed.
#[derive(Debug, Clone)]
pub struct ExecutionFault {
    pub message: String,
    pub step_description: String,
    /// Combined output captured up to the point of failure.
    pub output: String,
}

// ─── The step union ──────────────────────────────────────────────────────

/// One unit of workflow progress.
#[derive(Debug, Clone)]
pub enum Step {
    Auto(AutoStep),
    Judgment(Arc<JudgmentStep>),
    Invoke(InvokeStep),
}

impl Step {
    pub fn judgment(step: JudgmentStep) -> Self {
        Step::Judgment(Arc::new(step))
    }
}
