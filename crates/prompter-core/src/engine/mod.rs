//! Execution engine — frames, the suspendable stack, pending derivation,
//! and the driving executor.

pub mod auto;
pub mod executor;
pub mod frame;
pub mod pending;

pub use auto::{AutoExecutor, AutoOutcome, RealAutoExecutor};
pub use executor::{ExecutedStep, RunOutcome, ScriptExecutor, StepOutcome};
pub use frame::{CompiledFrame, ExecutionFrame, FrameStack, InstructionalFrame};
pub use pending::{Pending, PendingFallback, PendingInstructional, PendingJudgment};
