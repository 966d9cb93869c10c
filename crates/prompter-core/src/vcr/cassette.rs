//! Cassette files — YAML session recordings with incremental append.
//!
//! A cassette starts with the session's initial state (at minimum the
//! working directory) followed by an ordered event list. Saving is
//! incremental: the first save writes the whole document, later saves append
//! only the events recorded since, producing bytes identical to a full dump.
//! A replay cassette is read once up front and then consumed strictly in
//! order through a cursor.

use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::vcr::events::{AutoStepEvent, CassetteEvent, ToolCallEvent, ToolResponseEvent};

#[derive(Debug, thiserror::Error)]
pub enum CassetteError {
    #[error("Failed to access cassette file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Malformed cassette: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("{operation} requires a cassette in {required} mode")]
    WrongMode {
        operation: &'static str,
        required: &'static str,
    },

    #[error("Cassette exhausted: no more recorded events")]
    Exhausted,

    #[error("Recorded event mismatch: expected {expected}, got {got}")]
    TypeMismatch {
        expected: &'static str,
        got: String,
    },

    #[error("Cassette initial state has no working directory")]
    MissingWorkingDir,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CassetteMode {
    Record,
    Replay,
}

/// Environment captured at the start of a recording session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InitialState {
    pub working_dir: String,
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_yaml::Value>,
}

impl InitialState {
    pub fn new(working_dir: impl Into<String>) -> Self {
        Self {
            working_dir: working_dir.into(),
            extra: BTreeMap::new(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct CassetteFile {
    initial_state: InitialState,
    events: Vec<CassetteEvent>,
}

/// Cassette shared between the auto-execution boundary and the tool surface.
pub type SharedCassette = Arc<Mutex<Cassette>>;

#[derive(Debug)]
pub struct Cassette {
    path: PathBuf,
    mode: CassetteMode,
    initial_state: InitialState,
    events: Vec<CassetteEvent>,
    /// Replay cursor into `events`.
    cursor: usize,
    /// How many events the file on disk already contains.
    saved: usize,
    /// Whether the initial document has been written.
    wrote_header: bool,
}

impl Cassette {
    /// Open a fresh cassette for recording. Nothing touches disk until the
    /// first [`save`](Self::save).
    pub fn record(path: impl Into<PathBuf>, initial_state: InitialState) -> Self {
        Self {
            path: path.into(),
            mode: CassetteMode::Record,
            initial_state,
            events: Vec::new(),
            cursor: 0,
            saved: 0,
            wrote_header: false,
        }
    }

    /// Load an existing cassette for replay. Malformed documents and unknown
    /// event shapes fail here, before any replay begins.
    pub fn replay(path: impl Into<PathBuf>) -> Result<Self, CassetteError> {
        let path = path.into();
        let text = fs::read_to_string(&path)?;
        let file: CassetteFile = serde_yaml::from_str(&text)?;
        if file.initial_state.working_dir.is_empty() {
            return Err(CassetteError::MissingWorkingDir);
        }
        debug!(path = %path.display(), events = file.events.len(), "loaded cassette for replay");
        let saved = file.events.len();
        Ok(Self {
            path,
            mode: CassetteMode::Replay,
            initial_state: file.initial_state,
            events: file.events,
            cursor: 0,
            saved,
            wrote_header: true,
        })
    }

    pub fn mode(&self) -> CassetteMode {
        self.mode
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn working_dir(&self) -> &str {
        &self.initial_state.working_dir
    }

    pub fn events(&self) -> &[CassetteEvent] {
        &self.events
    }

    /// Append an event to the in-memory recording.
    pub fn record_event(&mut self, event: CassetteEvent) -> Result<(), CassetteError> {
        if self.mode != CassetteMode::Record {
            return Err(CassetteError::WrongMode {
                operation: "record_event",
                required: "record",
            });
        }
        self.events.push(event);
        Ok(())
    }

    /// Flush unsaved events to disk.
    ///
    /// The first save with events writes the full document; later saves
    /// append only the new events, byte-identical to what a full rewrite
    /// would produce. A save with nothing new leaves the file untouched,
    /// and nothing is written at all before the first event — an `events: []`
    /// header could never be appended to.
    pub fn save(&mut self) -> Result<(), CassetteError> {
        if self.mode != CassetteMode::Record {
            return Err(CassetteError::WrongMode {
                operation: "save",
                required: "record",
            });
        }
        if !self.wrote_header {
            if self.events.is_empty() {
                return Ok(());
            }
            if let Some(parent) = self.path.parent() {
                fs::create_dir_all(parent)?;
            }
            let file = CassetteFile {
                initial_state: self.initial_state.clone(),
                events: self.events.clone(),
            };
            fs::write(&self.path, serde_yaml::to_string(&file)?)?;
            self.wrote_header = true;
            self.saved = self.events.len();
            return Ok(());
        }
        if self.saved == self.events.len() {
            return Ok(());
        }

        let mut out = fs::OpenOptions::new().append(true).open(&self.path)?;
        for event in &self.events[self.saved..] {
            out.write_all(render_list_item(event)?.as_bytes())?;
        }
        self.saved = self.events.len();
        Ok(())
    }

    // ─── Replay consumption ──────────────────────────────────────────────

    /// Take the next recorded event, strictly in order.
    pub fn consume(&mut self) -> Result<CassetteEvent, CassetteError> {
        if self.mode != CassetteMode::Replay {
            return Err(CassetteError::WrongMode {
                operation: "consume",
                required: "replay",
            });
        }
        let event = self
            .events
            .get(self.cursor)
            .cloned()
            .ok_or(CassetteError::Exhausted)?;
        self.cursor += 1;
        Ok(event)
    }

    pub fn consume_auto_step(&mut self) -> Result<AutoStepEvent, CassetteError> {
        match self.consume()? {
            CassetteEvent::AutoStep(event) => Ok(event),
            other => Err(CassetteError::TypeMismatch {
                expected: "auto_step",
                got: event_kind(&other).to_string(),
            }),
        }
    }

    pub fn consume_tool_call(&mut self) -> Result<ToolCallEvent, CassetteError> {
        match self.consume()? {
            CassetteEvent::ToolCall(event) => Ok(event),
            other => Err(CassetteError::TypeMismatch {
                expected: "tool_call",
                got: event_kind(&other).to_string(),
            }),
        }
    }

    pub fn consume_tool_response(&mut self) -> Result<ToolResponseEvent, CassetteError> {
        match self.consume()? {
            CassetteEvent::ToolResponse(event) => Ok(event),
            other => Err(CassetteError::TypeMismatch {
                expected: "tool_response",
                got: event_kind(&other).to_string(),
            }),
        }
    }

    pub fn has_remaining(&self) -> bool {
        self.cursor < self.events.len()
    }
}

fn event_kind(event: &CassetteEvent) -> &'static str {
    match event {
        CassetteEvent::ToolCall(_) => "tool_call",
        CassetteEvent::ToolResponse(_) => "tool_response",
        CassetteEvent::AutoStep(_) => "auto_step",
    }
}

/// Render one event exactly as it would appear inside the `events:` block
/// sequence: first line prefixed with `- `, continuation lines indented two
/// spaces.
fn render_list_item(event: &CassetteEvent) -> Result<String, CassetteError> {
    let yaml = serde_yaml::to_string(event)?;
    let body = yaml.strip_suffix('\n').unwrap_or(&yaml);
    let mut out = String::new();
    for (i, line) in body.lines().enumerate() {
        if i == 0 {
            out.push_str("- ");
        } else {
            out.push_str("  ");
        }
        out.push_str(line);
        out.push('\n');
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vcr::events::{AutoStepInputs, AutoStepResult, ToolCallEvent};

    fn sample_events() -> Vec<CassetteEvent> {
        vec![
            CassetteEvent::ToolCall(ToolCallEvent::Start {
                name: "demo/guess".into(),
                arguments: String::new(),
                working_dir: None,
            }),
            CassetteEvent::AutoStep(AutoStepEvent {
                working_dir: "/tmp/demo".into(),
                inputs: AutoStepInputs {
                    action_type: "shell".into(),
                    action: "shuf -i 1-100 -n 1".into(),
                    context: "Generate a random number".into(),
                    args: None,
                },
                result: AutoStepResult::Shell {
                    success: true,
                    exit_code: 0,
                    output: "42\n".into(),
                },
            }),
            CassetteEvent::ToolResponse(ToolResponseEvent {
                tool: "start".into(),
                output: "## Judgment Step 1\n\nGuess.".into(),
            }),
        ]
    }

    #[test]
    fn incremental_saves_match_a_single_full_dump() {
        let dir = tempfile::tempdir().unwrap();
        let incremental = dir.path().join("incremental.yaml");
        let full = dir.path().join("full.yaml");

        let mut a = Cassette::record(&incremental, InitialState::new("/tmp/demo"));
        for event in sample_events() {
            a.record_event(event).unwrap();
            a.save().unwrap();
        }

        let mut b = Cassette::record(&full, InitialState::new("/tmp/demo"));
        for event in sample_events() {
            b.record_event(event).unwrap();
        }
        b.save().unwrap();

        assert_eq!(
            fs::read_to_string(&incremental).unwrap(),
            fs::read_to_string(&full).unwrap()
        );
    }

    #[test]
    fn saved_cassette_replays_the_same_events() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.yaml");

        let mut recorder = Cassette::record(&path, InitialState::new("/tmp/demo"));
        for event in sample_events() {
            recorder.record_event(event).unwrap();
        }
        recorder.save().unwrap();

        let mut replayer = Cassette::replay(&path).unwrap();
        assert_eq!(replayer.working_dir(), "/tmp/demo");
        for expected in sample_events() {
            assert_eq!(replayer.consume().unwrap(), expected);
        }
        assert!(!replayer.has_remaining());
        assert!(matches!(
            replayer.consume().unwrap_err(),
            CassetteError::Exhausted
        ));
    }

    #[test]
    fn save_before_any_event_stays_appendable() {
        let dir = tempfile::tempdir().unwrap();
        let incremental = dir.path().join("incremental.yaml");
        let full = dir.path().join("full.yaml");

        let mut a = Cassette::record(&incremental, InitialState::new("/tmp/demo"));
        a.save().unwrap();
        assert!(!incremental.exists(), "nothing recorded, nothing written");
        for event in sample_events() {
            a.record_event(event).unwrap();
            a.save().unwrap();
        }

        let mut b = Cassette::record(&full, InitialState::new("/tmp/demo"));
        for event in sample_events() {
            b.record_event(event).unwrap();
        }
        b.save().unwrap();

        assert_eq!(
            fs::read_to_string(&incremental).unwrap(),
            fs::read_to_string(&full).unwrap()
        );

        let mut replayer = Cassette::replay(&incremental).unwrap();
        for expected in sample_events() {
            assert_eq!(replayer.consume().unwrap(), expected);
        }
    }

    #[test]
    fn save_with_no_new_events_does_not_rewrite() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.yaml");

        let mut cassette = Cassette::record(&path, InitialState::new("/tmp/demo"));
        cassette.record_event(sample_events().remove(0)).unwrap();
        cassette.save().unwrap();
        let before = fs::read_to_string(&path).unwrap();
        cassette.save().unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), before);
    }

    #[test]
    fn replay_mode_rejects_recording() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.yaml");
        let mut recorder = Cassette::record(&path, InitialState::new("/tmp/demo"));
        recorder.record_event(sample_events().remove(0)).unwrap();
        recorder.save().unwrap();

        let mut replayer = Cassette::replay(&path).unwrap();
        assert!(matches!(
            replayer.record_event(sample_events().remove(0)),
            Err(CassetteError::WrongMode { .. })
        ));
        assert!(matches!(
            replayer.save(),
            Err(CassetteError::WrongMode { .. })
        ));
    }

    #[test]
    fn malformed_cassette_fails_to_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.yaml");
        fs::write(
            &path,
            "initial_state:\n  working_dir: /tmp\nevents:\n- type: mystery\n",
        )
        .unwrap();
        assert!(matches!(
            Cassette::replay(&path).unwrap_err(),
            CassetteError::Yaml(_)
        ));
    }
}
