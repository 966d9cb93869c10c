//! Prompter Core — transport-agnostic script engine.
//!
//! A script is a multi-step workflow driven by an external coding agent
//! through a small stateless tool surface. The engine executes automated
//! steps itself and suspends whenever a step needs the driver's judgment,
//! keeping the whole frame stack alive across calls.
//!
//! The crate is organized by layer:
//!
//! - [`script`] — step model, resumable sequences, loading and the bundled
//!   demo scripts
//! - [`engine`] — frames, the suspendable stack, pending derivation, and the
//!   driving executor
//! - [`server`] — driver-facing response formatting and the MCP tool surface
//! - [`vcr`] — cassette record/replay for hermetic, deterministic testing

pub mod engine;
pub mod error;
pub mod script;
pub mod server;
pub mod vcr;

// Convenience re-exports
pub use engine::{AutoExecutor, AutoOutcome, RealAutoExecutor, RunOutcome, ScriptExecutor};
pub use error::EngineError;
pub use script::{ScriptLoader, ScriptRegistry};
pub use server::EngineServer;
