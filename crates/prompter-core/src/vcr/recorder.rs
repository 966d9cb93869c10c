//! Auto execution through a cassette.
//!
//! `VcrAutoExecutor` sits behind the same [`AutoExecutor`] trait as the real
//! executor. In record mode it delegates to the real executor and captures
//! each crossing; in replay it serves recorded results instead of touching
//! the system, verifying first that the step being replayed is the step that
//! was recorded.

use std::path::Path;
use std::sync::{MutexGuard, PoisonError};

use tracing::debug;

use crate::engine::auto::{AutoExecutor, AutoOutcome, RealAutoExecutor};
use crate::error::EngineError;
use crate::script::step::AutoStep;
use crate::vcr::cassette::{Cassette, CassetteError, CassetteMode, SharedCassette};
use crate::vcr::events::{AutoStepEvent, AutoStepInputs, AutoStepResult, CassetteEvent};

pub struct VcrAutoExecutor {
    cassette: SharedCassette,
    /// Present in record mode only.
    inner: Option<RealAutoExecutor>,
}

impl VcrAutoExecutor {
    /// Wrap the real executor, recording every boundary crossing.
    pub fn record(cassette: SharedCassette) -> Result<Self, CassetteError> {
        require_mode(&cassette, CassetteMode::Record, "VcrAutoExecutor::record")?;
        Ok(Self {
            cassette,
            inner: Some(RealAutoExecutor::new()),
        })
    }

    /// Serve recorded results; nothing reaches the real system.
    pub fn replay(cassette: SharedCassette) -> Result<Self, CassetteError> {
        require_mode(&cassette, CassetteMode::Replay, "VcrAutoExecutor::replay")?;
        Ok(Self {
            cassette,
            inner: None,
        })
    }

    fn lock(&self) -> MutexGuard<'_, Cassette> {
        self.cassette.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn require_mode(
    cassette: &SharedCassette,
    required: CassetteMode,
    operation: &'static str,
) -> Result<(), CassetteError> {
    let guard = cassette.lock().unwrap_or_else(PoisonError::into_inner);
    if guard.mode() != required {
        return Err(CassetteError::WrongMode {
            operation,
            required: match required {
                CassetteMode::Record => "record",
                CassetteMode::Replay => "replay",
            },
        });
    }
    Ok(())
}

impl AutoExecutor for VcrAutoExecutor {
    async fn execute(
        &self,
        step: &AutoStep,
        working_dir: &Path,
    ) -> Result<AutoOutcome, EngineError> {
        match &self.inner {
            Some(real) => {
                let outcome = real.execute(step, working_dir).await?;
                let mut cassette = self.lock();
                cassette.record_event(CassetteEvent::AutoStep(AutoStepEvent {
                    working_dir: working_dir.display().to_string(),
                    inputs: AutoStepInputs::from_step(step),
                    result: AutoStepResult::from_outcome(&outcome),
                }))?;
                cassette.save()?;
                Ok(outcome)
            }
            None => {
                let mut cassette = self.lock();
                let recorded = cassette.consume_auto_step()?;
                let actual = AutoStepInputs::from_step(step);
                let actual_dir = working_dir.display().to_string();
                if recorded.inputs != actual || recorded.working_dir != actual_dir {
                    return Err(EngineError::ReplayMismatch(format!(
                        "auto step diverged from the recording.\n\
                         Expected: {:?} in {}\n\
                         Got:      {:?} in {}",
                        recorded.inputs, recorded.working_dir, actual, actual_dir
                    )));
                }
                debug!(action = %actual.action, "serving recorded auto step");
                Ok(recorded.result.into_outcome())
            }
        }
    }
}
