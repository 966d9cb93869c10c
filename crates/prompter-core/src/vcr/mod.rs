//! Cassette record/replay for hermetic testing.
//!
//! A recording session captures every tool call, every tool response, and
//! every auto-step boundary crossing into a YAML cassette. Replay swaps the
//! real shell out for recorded results and verifies that the engine produces
//! byte-identical responses, so full driver sessions become deterministic
//! tests with no side effects.

pub mod cassette;
pub mod events;
pub mod recorder;
pub mod replay;
pub mod server;

pub use cassette::{Cassette, CassetteError, CassetteMode, InitialState, SharedCassette};
pub use events::{
    AutoStepEvent, AutoStepInputs, AutoStepResult, CassetteEvent, ToolCallEvent, ToolResponseEvent,
};
pub use recorder::VcrAutoExecutor;
pub use replay::replay_cassette;
pub use server::VcrServer;
