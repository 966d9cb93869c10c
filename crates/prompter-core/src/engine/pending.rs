//! Pending state — what the driver must do next.
//!
//! Whenever the engine suspends it derives a `Pending` value from the top of
//! the stack. The rendered form is the entire driver-facing contract: it
//! names the step, shows script context the first time, and says which tool
//! call resumes execution.

use std::sync::Arc;

use crate::script::step::{ExecutionFault, JudgmentStep};

/// A judgment step awaiting the driver's `continue` call.
#[derive(Debug, Clone)]
pub struct PendingJudgment {
    pub step: Arc<JudgmentStep>,
    pub script_name: String,
    pub step_index: usize,
    /// Present only when the stack is nested.
    pub stack_path: Option<String>,
    /// Script source, shown once per frame.
    pub context: Option<String>,
}

impl PendingJudgment {
    pub fn render(&self) -> String {
        let mut out = String::new();
        if let Some(context) = &self.context {
            out.push_str(&format!(
                "## Script Context: `{}`\n\n{}\n\n---\n\n",
                self.script_name, context
            ));
        }
        out.push_str(&format!(
            "## Judgment Step {} in `{}`\n\n",
            self.step_index, self.script_name
        ));
        if let Some(path) = &self.stack_path {
            out.push_str(&format!("**Stack:** `{path}`\n\n"));
        }
        out.push_str(&self.step.prompt);
        if self.step.expects.is_empty() {
            out.push_str("\n\nWhen done, call `continue` with the outputs. (no outputs needed)");
        } else {
            out.push_str("\n\n### Expected outputs:\n");
            for (key, description) in &self.step.expects {
                out.push_str(&format!("- `{key}`: {description}\n"));
            }
            out.push_str("\nWhen done, call `continue` with the outputs.");
        }
        out
    }
}

/// An instructional script the driver executes by hand.
#[derive(Debug, Clone)]
pub struct PendingInstructional {
    pub name: String,
    pub content: String,
}

impl PendingInstructional {
    pub fn render(&self) -> String {
        format!(
            "## Instructional Script: `{}`\n\n{}\n\nExecute these instructions, then call `finish`.",
            self.name, self.content
        )
    }
}

/// A faulted script awaiting manual completion.
#[derive(Debug, Clone)]
pub struct PendingFallback {
    pub script_name: String,
    pub source: String,
    pub fault: ExecutionFault,
    pub step_index: usize,
    pub stack_path: Option<String>,
}

impl PendingFallback {
    pub fn render(&self) -> String {
        let mut out = format!(
            "## Script `{}` failed at step {}\n\n",
            self.script_name, self.step_index
        );
        if let Some(path) = &self.stack_path {
            out.push_str(&format!("**Stack:** `{path}`\n\n"));
        }
        out.push_str(&format!(
            "### Failed Step\n\n{}\n\n",
            self.fault.step_description
        ));
        out.push_str(&format!("### Error\n\n```\n{}\n```\n\n", self.fault.message));
        if !self.fault.output.trim().is_empty() {
            out.push_str(&format!("### Output\n\n```\n{}\n```\n\n", self.fault.output.trim()));
        }
        out.push_str(&format!(
            "### Original Script Instructions\n\n{}\n\n",
            self.source
        ));
        out.push_str(
            "Automated execution cannot continue. Complete the remaining work \
             manually, then call `finish`.",
        );
        out
    }
}

/// Whatever the driver must do before the engine can run again.
#[derive(Debug, Clone)]
pub enum Pending {
    Judgment(PendingJudgment),
    Instructional(PendingInstructional),
    Fallback(PendingFallback),
}

impl Pending {
    pub fn render(&self) -> String {
        match self {
            Pending::Judgment(p) => p.render(),
            Pending::Instructional(p) => p.render(),
            Pending::Fallback(p) => p.render(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::script::step::JudgmentStep;

    #[test]
    fn judgment_render_lists_expected_outputs() {
        let pending = PendingJudgment {
            step: Arc::new(JudgmentStep::with_expects(
                "Guess the number.",
                [("guess".to_string(), "The user's guess".to_string())],
            )),
            script_name: "demo/guess".into(),
            step_index: 1,
            stack_path: None,
            context: None,
        };
        let text = pending.render();
        assert!(text.contains("## Judgment Step 1 in `demo/guess`"));
        assert!(text.contains("- `guess`: The user's guess"));
        assert!(text.contains("call `continue`"));
    }

    #[test]
    fn judgment_render_shows_context_once_provided() {
        let pending = PendingJudgment {
            step: Arc::new(JudgmentStep::new("Do the thing.")),
            script_name: "demo/guess".into(),
            step_index: 0,
            stack_path: Some("demo/nested[0] > demo/guess[0]".into()),
            context: Some("# Guess the number".into()),
        };
        let text = pending.render();
        assert!(text.starts_with("## Script Context: `demo/guess`"));
        assert!(text.contains("**Stack:** `demo/nested[0] > demo/guess[0]`"));
        assert!(text.contains("(no outputs needed)"));
    }

    #[test]
    fn fallback_render_names_the_failed_step() {
        let pending = PendingFallback {
            script_name: "demo/guess".into(),
            source: "# Guess the number".into(),
            fault: ExecutionFault {
                message: "boom".into(),
                step_description: "shuf -i 1-100 -n 1".into(),
                output: String::new(),
            },
            step_index: 0,
            stack_path: None,
        };
        let text = pending.render();
        assert!(text.contains("failed at step 0"));
        assert!(text.contains("shuf -i 1-100 -n 1"));
        assert!(text.contains("call `finish`"));
    }
}
