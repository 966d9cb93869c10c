//! Typed cassette events.
//!
//! Three event kinds appear in a cassette, in session order:
//! - `tool_call` — a driver call into the tool surface, with its input;
//! - `tool_response` — the text the tool surface returned;
//! - `auto_step` — one crossing of the auto-execution boundary, with enough
//!   input detail to verify the replayed step matches the recorded one.
//!
//! Unknown tags or malformed shapes fail deserialization loudly, which is
//! exactly what replay wants: a stale cassette must never half-work.

use serde::{Deserialize, Serialize};

use crate::engine::auto::AutoOutcome;
use crate::script::step::{
    AutoAction, AutoResult, AutoStep, CallResult, ExecutionFault, JsonMap, ShellResult,
};

/// One recorded event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CassetteEvent {
    ToolCall(ToolCallEvent),
    ToolResponse(ToolResponseEvent),
    AutoStep(AutoStepEvent),
}

/// A driver call into one of the four tools.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "tool", content = "input", rename_all = "snake_case")]
pub enum ToolCallEvent {
    Start {
        name: String,
        arguments: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        working_dir: Option<String>,
    },
    Continue {
        outputs: JsonMap,
    },
    Finish {},
    Status {},
}

impl ToolCallEvent {
    pub fn tool_name(&self) -> &'static str {
        match self {
            ToolCallEvent::Start { .. } => "start",
            ToolCallEvent::Continue { .. } => "continue",
            ToolCallEvent::Finish {} => "finish",
            ToolCallEvent::Status {} => "status",
        }
    }
}

/// The text a tool call returned.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolResponseEvent {
    pub tool: String,
    pub output: String,
}

/// One auto step crossing the execution boundary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AutoStepEvent {
    pub working_dir: String,
    pub inputs: AutoStepInputs,
    pub result: AutoStepResult,
}

/// The identifying inputs of an auto step, compared on replay.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AutoStepInputs {
    /// `shell` or `call`.
    pub action_type: String,
    /// The command line, or the native call name.
    pub action: String,
    pub context: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub args: Option<JsonMap>,
}

impl AutoStepInputs {
    pub fn from_step(step: &AutoStep) -> Self {
        match &step.action {
            AutoAction::Shell { cmd } => Self {
                action_type: "shell".into(),
                action: cmd.clone(),
                context: step.context.clone(),
                args: None,
            },
            AutoAction::Native(call) => Self {
                action_type: "call".into(),
                action: call.name.clone(),
                context: step.context.clone(),
                args: Some(call.args.clone()),
            },
        }
    }
}

/// Serialized form of an auto-step outcome, hard faults included.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AutoStepResult {
    Shell {
        success: bool,
        exit_code: i32,
        output: String,
    },
    Call {
        success: bool,
        value: serde_json::Value,
        #[serde(skip_serializing_if = "Option::is_none")]
        error: Option<String>,
        output: String,
    },
    Fault {
        message: String,
        step_description: String,
        output: String,
    },
}

impl AutoStepResult {
    pub fn from_outcome(outcome: &AutoOutcome) -> Self {
        match outcome {
            AutoOutcome::Ok(AutoResult::Shell(r)) => AutoStepResult::Shell {
                success: r.success,
                exit_code: r.exit_code,
                output: r.output.clone(),
            },
            AutoOutcome::Ok(AutoResult::Call(r)) => AutoStepResult::Call {
                success: r.success,
                value: r.value.clone(),
                error: r.error.clone(),
                output: r.output.clone(),
            },
            AutoOutcome::Fault(fault) => AutoStepResult::Fault {
                message: fault.message.clone(),
                step_description: fault.step_description.clone(),
                output: fault.output.clone(),
            },
        }
    }

    pub fn into_outcome(self) -> AutoOutcome {
        match self {
            AutoStepResult::Shell {
                success,
                exit_code,
                output,
            } => AutoOutcome::Ok(AutoResult::Shell(ShellResult {
                success,
                exit_code,
                output,
            })),
            AutoStepResult::Call {
                success,
                value,
                error,
                output,
            } => AutoOutcome::Ok(AutoResult::Call(CallResult {
                success,
                value,
                error,
                output,
            })),
            AutoStepResult::Fault {
                message,
                step_description,
                output,
            } => AutoOutcome::Fault(ExecutionFault {
                message,
                step_description,
                output,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;

    #[test]
    fn tool_call_round_trips_through_yaml() {
        let event = CassetteEvent::ToolCall(ToolCallEvent::Start {
            name: "demo/guess".into(),
            arguments: String::new(),
            working_dir: None,
        });
        let yaml = serde_yaml::to_string(&event).unwrap();
        assert!(yaml.contains("type: tool_call"));
        assert!(yaml.contains("tool: start"));
        let back: CassetteEvent = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(back, event);
    }

    #[test]
    fn auto_step_round_trips_through_yaml() {
        let event = CassetteEvent::AutoStep(AutoStepEvent {
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
        });
        let yaml = serde_yaml::to_string(&event).unwrap();
        let back: CassetteEvent = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(back, event);
    }

    #[test]
    fn unknown_event_type_is_rejected() {
        let yaml = "type: mystery\npayload: 1\n";
        assert!(serde_yaml::from_str::<CassetteEvent>(yaml).is_err());
    }

    #[test]
    fn inputs_from_native_step_carry_args() {
        let mut args = JsonMap::new();
        args.insert("message".into(), Value::String("hi".into()));
        let func: crate::script::step::NativeFn = std::sync::Arc::new(|_: &JsonMap| {
            Ok(crate::script::step::NativeOutput {
                value: Value::Null,
                output: String::new(),
            })
        });
        let step = AutoStep::native("print_message", args.clone(), func, "Say hi");
        let inputs = AutoStepInputs::from_step(&step);
        assert_eq!(inputs.action_type, "call");
        assert_eq!(inputs.action, "print_message");
        assert_eq!(inputs.args, Some(args));
    }
}
