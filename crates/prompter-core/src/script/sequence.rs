//! Resumable step sequences.
//!
//! A compiled script is a state machine that yields one [`Step`] at a time.
//! After the engine (or the external driver) finishes a step, its result is
//! fed back through [`StepSequence::advance`] and the sequence decides what
//! comes next. Sequences therefore survive suspension for free: the state
//! machine simply waits, owned by its frame, until the next input arrives.

use crate::script::step::{AutoResult, InvocationResult, JudgmentResult, Step};

/// Result of a completed step, fed back into the owning sequence.
#[derive(Debug, Clone)]
pub enum StepInput {
    Auto(AutoResult),
    Judgment(JudgmentResult),
    Invocation(InvocationResult),
}

/// A resumable script body.
///
/// `advance(None)` pulls the first step; every later call carries the result
/// of the previously yielded step. Returning `None` means the script is done.
pub trait StepSequence: Send {
    fn advance(&mut self, input: Option<StepInput>) -> Option<Step>;
}
