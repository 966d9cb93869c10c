//! Execution frames and the suspendable frame stack.
//!
//! Each running script occupies one frame. Compiled frames own their step
//! sequence and track the current step; instructional frames only mark that
//! the driver is carrying out prose instructions. The whole stack survives
//! suspension untouched — resuming is just feeding the next input in.

use std::path::PathBuf;

use crate::script::sequence::{StepInput, StepSequence};
use crate::script::step::{ExecutionFault, Step};

/// Frame for a compiled script.
pub struct CompiledFrame {
    pub script_name: String,
    pub working_dir: PathBuf,
    pub source: String,
    pub arguments: String,
    sequence: Box<dyn StepSequence + Send>,
    /// Index of the current step, counting from zero.
    pub step_index: usize,
    current: Option<Step>,
    started: bool,
    /// Whether the script source was already shown to the driver.
    pub shown_source: bool,
    /// Set when an auto step raised; freezes the frame until manual finish.
    pub fault: Option<ExecutionFault>,
}

impl CompiledFrame {
    pub fn new(
        script_name: impl Into<String>,
        working_dir: PathBuf,
        source: impl Into<String>,
        arguments: impl Into<String>,
        sequence: Box<dyn StepSequence + Send>,
    ) -> Self {
        Self {
            script_name: script_name.into(),
            working_dir,
            source: source.into(),
            arguments: arguments.into(),
            sequence,
            step_index: 0,
            current: None,
            started: false,
            shown_source: false,
            fault: None,
        }
    }

    /// The step the frame is positioned on, pulling the first step lazily.
    /// Idempotent: repeated calls return the same step.
    pub fn current_step(&mut self) -> Option<&Step> {
        if !self.started {
            self.started = true;
            self.current = self.sequence.advance(None);
        }
        self.current.as_ref()
    }

    /// Feed the current step's result in and move to the next step.
    pub fn advance(&mut self, input: StepInput) -> Option<&Step> {
        self.started = true;
        self.step_index += 1;
        self.current = self.sequence.advance(Some(input));
        self.current.as_ref()
    }

    /// Replace the current step in place, without consuming a step index.
    /// Used when a soft auto failure is rewritten into a judgment step.
    pub fn set_current(&mut self, step: Step) {
        self.started = true;
        self.current = Some(step);
    }
}

/// Frame for an instructional script. The driver executes the prose; the
/// engine just keeps the frame until `finish` is called.
pub struct InstructionalFrame {
    pub script_name: String,
    pub content: String,
}

/// One entry of the execution stack.
pub enum ExecutionFrame {
    Compiled(CompiledFrame),
    Instructional(InstructionalFrame),
}

impl ExecutionFrame {
    pub fn script_name(&self) -> &str {
        match self {
            ExecutionFrame::Compiled(f) => &f.script_name,
            ExecutionFrame::Instructional(f) => &f.script_name,
        }
    }
}

/// The suspendable stack of running scripts.
#[derive(Default)]
pub struct FrameStack {
    frames: Vec<ExecutionFrame>,
}

impl FrameStack {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, frame: ExecutionFrame) {
        self.frames.push(frame);
    }

    pub fn pop(&mut self) -> Option<ExecutionFrame> {
        self.frames.pop()
    }

    pub fn top(&self) -> Option<&ExecutionFrame> {
        self.frames.last()
    }

    pub fn top_mut(&mut self) -> Option<&mut ExecutionFrame> {
        self.frames.last_mut()
    }

    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Path through the stack, outermost first: `outer[2] > inner[0]`.
    pub fn path(&self) -> String {
        self.frames
            .iter()
            .map(|frame| match frame {
                ExecutionFrame::Compiled(f) => format!("{}[{}]", f.script_name, f.step_index),
                ExecutionFrame::Instructional(f) => f.script_name.clone(),
            })
            .collect::<Vec<_>>()
            .join(" > ")
    }
}
