//! Bundled demo scripts.
//!
//! These exercise every step kind and the nested-invocation path, and they
//! double as the fixtures for cassette recording in the integration tests.

use std::sync::Arc;

use serde_json::Value;

use crate::script::loader::ScriptRegistry;
use crate::script::sequence::{StepInput, StepSequence};
use crate::script::step::{
    AutoStep, InvokeStep, JsonMap, JudgmentStep, NativeFn, NativeOutput, Step,
};

const GUESS_SOURCE: &str = "\
# Guess the number

1. Generate a random number between 1 and 100.
2. Ask the user to guess it.
3. Announce whether they got it right.
4. React to the outcome.
";

const NESTED_SOURCE: &str = "\
# Nested guess

1. Run the guessing game.
2. Report how far off the guess was.
";

const MANUAL_SOURCE: &str = "\
# Manual task

Carry out the following request by hand, then report what you did:

$ARGUMENTS
";

/// Native `print_message` action shared by the demo scripts.
fn print_message_fn() -> NativeFn {
    Arc::new(|args: &JsonMap| {
        let message = args
            .get("message")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        Ok(NativeOutput {
            value: Value::Null,
            output: message,
        })
    })
}

fn print_message_step(message: &str) -> AutoStep {
    let mut args = JsonMap::new();
    args.insert("message".into(), Value::String(message.into()));
    AutoStep::native(
        "print_message",
        args,
        print_message_fn(),
        "Announce the outcome to the user",
    )
}

// ─── demo/guess ──────────────────────────────────────────────────────────

enum GuessState {
    Start,
    AwaitSecret,
    AwaitGuess { secret: i64 },
    AwaitAnnounce { correct: bool },
    AwaitReaction,
    Done,
}

struct GuessScript {
    state: GuessState,
}

impl GuessScript {
    fn new() -> Self {
        Self {
            state: GuessState::Start,
        }
    }
}

impl StepSequence for GuessScript {
    fn advance(&mut self, input: Option<StepInput>) -> Option<Step> {
        match std::mem::replace(&mut self.state, GuessState::Done) {
            GuessState::Start => {
                self.state = GuessState::AwaitSecret;
                Some(Step::Auto(AutoStep::shell(
                    "shuf -i 1-100 -n 1",
                    "Generate a random number between 1 and 100",
                )))
            }
            GuessState::AwaitSecret => {
                let secret = match input {
                    Some(StepInput::Auto(result)) => {
                        result.output().trim().parse::<i64>().unwrap_or(0)
                    }
                    _ => 0,
                };
                self.state = GuessState::AwaitGuess { secret };
                Some(Step::judgment(JudgmentStep::with_expects(
                    "Have the user guess the secret number between 1 and 100.",
                    [("guess".to_string(), "The user's guess".to_string())],
                )))
            }
            GuessState::AwaitGuess { secret } => {
                let guess = match &input {
                    Some(StepInput::Judgment(result)) => result
                        .outputs
                        .get("guess")
                        .and_then(Value::as_i64)
                        .unwrap_or(-1),
                    _ => -1,
                };
                let correct = guess == secret;
                self.state = GuessState::AwaitAnnounce { correct };
                let message = if correct {
                    "You got it right!"
                } else {
                    "You got it wrong!"
                };
                Some(Step::Auto(print_message_step(message)))
            }
            GuessState::AwaitAnnounce { correct } => {
                self.state = GuessState::AwaitReaction;
                let prompt = if correct {
                    "Congratulate the user on their excellent guess."
                } else {
                    "Gently mock the user for guessing wrong."
                };
                Some(Step::judgment(JudgmentStep::new(prompt)))
            }
            GuessState::AwaitReaction | GuessState::Done => None,
        }
    }
}

// ─── demo/nested ─────────────────────────────────────────────────────────

enum NestedState {
    Start,
    AwaitGame,
    AwaitDifference,
    Done,
}

struct NestedScript {
    state: NestedState,
}

impl NestedScript {
    fn new() -> Self {
        Self {
            state: NestedState::Start,
        }
    }
}

impl StepSequence for NestedScript {
    fn advance(&mut self, _input: Option<StepInput>) -> Option<Step> {
        match std::mem::replace(&mut self.state, NestedState::Done) {
            NestedState::Start => {
                self.state = NestedState::AwaitGame;
                Some(Step::Invoke(InvokeStep::new("demo/guess", "")))
            }
            NestedState::AwaitGame => {
                self.state = NestedState::AwaitDifference;
                Some(Step::judgment(JudgmentStep::with_expects(
                    "Report how far off the final guess was from the secret number.",
                    [(
                        "difference".to_string(),
                        "Absolute difference between guess and secret".to_string(),
                    )],
                )))
            }
            NestedState::AwaitDifference | NestedState::Done => None,
        }
    }
}

/// Register the bundled scripts into `registry`.
pub fn register(registry: &mut ScriptRegistry) {
    registry.register_compiled("demo/guess", GUESS_SOURCE, |_request| {
        Box::new(GuessScript::new())
    });
    registry.register_compiled("demo/nested", NESTED_SOURCE, |_request| {
        Box::new(NestedScript::new())
    });
    registry.register_instructional("demo/manual", MANUAL_SOURCE);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::script::step::{AutoResult, JudgmentResult, ShellResult};

    fn shell_ok(output: &str) -> StepInput {
        StepInput::Auto(AutoResult::Shell(ShellResult {
            success: true,
            exit_code: 0,
            output: output.to_string(),
        }))
    }

    fn guess_of(n: i64) -> StepInput {
        let mut outputs = JsonMap::new();
        outputs.insert("guess".into(), Value::from(n));
        StepInput::Judgment(JudgmentResult { outputs })
    }

    #[test]
    fn guess_script_walks_all_four_steps() {
        let mut script = GuessScript::new();

        let first = script.advance(None).unwrap();
        assert!(matches!(first, Step::Auto(_)));

        let second = script.advance(Some(shell_ok("42\n"))).unwrap();
        assert!(matches!(second, Step::Judgment(_)));

        let third = script.advance(Some(guess_of(42))).unwrap();
        match third {
            Step::Auto(step) => assert!(step.description().contains("right")),
            other => panic!("expected auto step, got {other:?}"),
        }

        let fourth = script.advance(Some(shell_ok(""))).unwrap();
        assert!(matches!(fourth, Step::Judgment(_)));

        assert!(script
            .advance(Some(StepInput::Judgment(JudgmentResult::default())))
            .is_none());
    }

    #[test]
    fn wrong_guess_picks_the_mocking_branch() {
        let mut script = GuessScript::new();
        script.advance(None);
        script.advance(Some(shell_ok("42\n")));
        match script.advance(Some(guess_of(7))).unwrap() {
            Step::Auto(step) => assert!(step.description().contains("wrong")),
            other => panic!("expected auto step, got {other:?}"),
        }
    }

    #[test]
    fn nested_script_starts_with_an_invocation() {
        let mut script = NestedScript::new();
        match script.advance(None).unwrap() {
            Step::Invoke(step) => assert_eq!(step.name, "demo/guess"),
            other => panic!("expected invoke step, got {other:?}"),
        }
    }
}
