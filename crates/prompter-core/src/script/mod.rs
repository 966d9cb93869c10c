//! Script domain — step model, resumable sequences, and script loading.

pub mod builtin;
pub mod loader;
pub mod sequence;
pub mod step;

pub use loader::{LoadedScript, ScriptBody, ScriptLoadError, ScriptLoader, ScriptRegistry};
pub use sequence::{StepInput, StepSequence};
pub use step::{
    AutoAction, AutoResult, AutoStep, CallResult, ExecutionFault, InvocationResult, InvokeStep,
    JsonMap, JudgmentResult, JudgmentStep, NativeCall, NativeFault, NativeOutput, ShellResult,
    Step,
};
