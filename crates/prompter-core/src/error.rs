//! Core error type for the Prompter engine.
//!
//! `EngineError` covers the failures that are allowed to cross the tool
//! surface as hard errors: script-load failures at top-level `start`,
//! protocol misuse (continuing when nothing is pending), and cassette or
//! replay-verification failures. Soft auto failures, hard auto faults and
//! nested resolution failures are *not* errors at this level — the executor
//! folds them into pending state and synthesized results.

use crate::script::loader::ScriptLoadError;
use crate::vcr::cassette::CassetteError;

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error(transparent)]
    ScriptLoad(#[from] ScriptLoadError),

    #[error("No judgment step is pending")]
    NoJudgmentPending,

    #[error("No instructional script or fallback is pending")]
    NoManualPending,

    #[error(transparent)]
    Cassette(#[from] CassetteError),

    #[error("Replay mismatch: {0}")]
    ReplayMismatch(String),
}
