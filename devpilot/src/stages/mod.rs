//! Model-backed stages and the shared executor that drives them.
//!
//! Every stage follows the same contract: render a prompt from its context,
//! ask the model, validate the raw answer. [`StageExecutor::execute`] repeats
//! that cycle until the stage's validator accepts an answer or the attempt
//! bound is reached. A stage yields a fully valid result or nothing.

use std::sync::Arc;

use serde_json::Value;
use thiserror::Error;
use tracing::{debug, instrument, warn};

use crate::core::project::ProjectId;
use crate::core::response::Rejection;
use crate::core::stage::StageName;
use crate::io::inference::InferenceClient;
use crate::io::prompt::PromptRenderer;
use crate::io::state_log::StateLog;

pub mod action;
pub mod answer;
pub mod code;
pub mod decision;
pub mod formatter;
pub mod monologue;
pub mod planner;
pub mod reporter;
pub mod researcher;
pub mod runner;

/// A single model-backed step with a typed result.
pub trait Stage {
    type Output;

    const NAME: StageName;

    /// Template context for this invocation.
    fn context(&self) -> Value;

    /// Turn the model's raw text into a result, or explain why it is unusable.
    fn validate(&self, raw: &str) -> Result<Self::Output, Rejection>;
}

#[derive(Debug, Error)]
pub enum StageError {
    #[error("{stage} stage produced no valid response after {attempts} attempts (last failure: {last_failure})")]
    RetriesExhausted {
        stage: StageName,
        attempts: u32,
        last_failure: String,
    },
    #[error("render {stage} prompt")]
    Render {
        stage: StageName,
        #[source]
        source: anyhow::Error,
    },
    #[error("record token usage for {stage} stage")]
    State {
        stage: StageName,
        #[source]
        source: anyhow::Error,
    },
}

impl StageError {
    pub fn stage(&self) -> StageName {
        match self {
            StageError::RetriesExhausted { stage, .. }
            | StageError::Render { stage, .. }
            | StageError::State { stage, .. } => *stage,
        }
    }
}

/// Rough prompt size in tokens (about four bytes per token).
pub fn estimate_tokens(text: &str) -> u64 {
    text.len().div_ceil(4) as u64
}

/// Runs the render → infer → validate loop for any [`Stage`].
pub struct StageExecutor {
    inference: Arc<dyn InferenceClient>,
    renderer: Arc<dyn PromptRenderer>,
    state: Arc<StateLog>,
    max_attempts: u32,
}

impl StageExecutor {
    pub fn new(
        inference: Arc<dyn InferenceClient>,
        renderer: Arc<dyn PromptRenderer>,
        state: Arc<StateLog>,
        max_attempts: u32,
    ) -> Self {
        Self {
            inference,
            renderer,
            state,
            max_attempts: max_attempts.max(1),
        }
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Run `stage` until it validates, at most `max_attempts` times.
    ///
    /// Invalid answers and inference failures both consume an attempt. Prompt
    /// tokens are charged to `project` before every inference call; calls made
    /// before a project exists are not charged.
    #[instrument(skip_all, fields(stage = %S::NAME, project = project.map_or("-", ProjectId::slug)))]
    pub fn execute<S: Stage>(
        &self,
        stage: &S,
        project: Option<&ProjectId>,
    ) -> Result<S::Output, StageError> {
        let context = stage.context();
        let mut last_failure = String::new();

        for attempt in 1..=self.max_attempts {
            let prompt = self
                .renderer
                .render(S::NAME, &context)
                .map_err(|source| StageError::Render {
                    stage: S::NAME,
                    source,
                })?;

            if let Some(project) = project {
                self.state
                    .update_token_usage(project, estimate_tokens(&prompt))
                    .map_err(|source| StageError::State {
                        stage: S::NAME,
                        source,
                    })?;
            }

            let raw = match self.inference.infer(&prompt, project) {
                Ok(raw) => raw,
                Err(err) => {
                    warn!(attempt, err = %format!("{err:#}"), "inference failed, trying again");
                    last_failure = format!("inference failed: {err:#}");
                    continue;
                }
            };

            match stage.validate(&raw) {
                Ok(output) => {
                    debug!(attempt, "stage accepted response");
                    return Ok(output);
                }
                Err(rejection) => {
                    warn!(attempt, reason = %rejection, "invalid response from the model, trying again");
                    last_failure = rejection.reason().to_string();
                }
            }
        }

        Err(StageError::RetriesExhausted {
            stage: S::NAME,
            attempts: self.max_attempts,
            last_failure,
        })
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::io::broadcast::NullBroadcaster;
    use crate::io::prompt::TemplateRenderer;
    use crate::test_support::ScriptedInference;

    /// Accepts only the literal text "ok".
    struct EchoStage;

    impl Stage for EchoStage {
        type Output = String;

        const NAME: StageName = StageName::Formatter;

        fn context(&self) -> Value {
            json!({"raw_text": "page"})
        }

        fn validate(&self, raw: &str) -> Result<String, Rejection> {
            if raw.trim() == "ok" {
                Ok(raw.trim().to_string())
            } else {
                Err(Rejection::new(format!("expected ok, got {raw:?}")))
            }
        }
    }

    struct FailingRenderer;

    impl PromptRenderer for FailingRenderer {
        fn render(&self, _stage: StageName, _context: &Value) -> anyhow::Result<String> {
            Err(anyhow::anyhow!("template missing"))
        }
    }

    fn executor(
        root: &std::path::Path,
        inference: Arc<ScriptedInference>,
        max_attempts: u32,
    ) -> (StageExecutor, Arc<StateLog>) {
        let state = Arc::new(StateLog::new(root, Arc::new(NullBroadcaster)));
        let executor = StageExecutor::new(
            inference,
            Arc::new(TemplateRenderer::new()),
            state.clone(),
            max_attempts,
        );
        (executor, state)
    }

    #[test]
    fn returns_first_valid_response() {
        let temp = tempfile::tempdir().expect("tempdir");
        let inference = Arc::new(ScriptedInference::new(["nope", "ok", "unused"]));
        let (executor, _) = executor(temp.path(), inference.clone(), 5);

        let output = executor.execute(&EchoStage, None).expect("execute");
        assert_eq!(output, "ok");
        assert_eq!(inference.prompts().len(), 2);
        assert_eq!(inference.remaining(), 1);
    }

    /// Verifies exhaustion happens after exactly `max_attempts` invalid answers.
    #[test]
    fn exhausts_after_max_attempts() {
        let temp = tempfile::tempdir().expect("tempdir");
        let inference = Arc::new(ScriptedInference::new(["a", "b", "c", "ok"]));
        let (executor, _) = executor(temp.path(), inference.clone(), 3);

        let err = executor.execute(&EchoStage, None).unwrap_err();
        match err {
            StageError::RetriesExhausted {
                stage,
                attempts,
                last_failure,
            } => {
                assert_eq!(stage, StageName::Formatter);
                assert_eq!(attempts, 3);
                assert!(last_failure.contains("\"c\""));
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(inference.prompts().len(), 3);
    }

    #[test]
    fn inference_failures_consume_attempts() {
        let temp = tempfile::tempdir().expect("tempdir");
        let inference = Arc::new(ScriptedInference::empty());
        inference.push_failure("backend down");
        inference.push_response("ok");
        let (executor, _) = executor(temp.path(), inference.clone(), 2);
        assert_eq!(executor.execute(&EchoStage, None).expect("execute"), "ok");

        inference.push_failure("backend down");
        inference.push_failure("backend down");
        let err = executor.execute(&EchoStage, None).unwrap_err();
        assert!(err.to_string().contains("backend down"));
    }

    #[test]
    fn render_failure_is_immediate() {
        let temp = tempfile::tempdir().expect("tempdir");
        let inference = Arc::new(ScriptedInference::new(["ok"]));
        let state = Arc::new(StateLog::new(temp.path(), Arc::new(NullBroadcaster)));
        let executor = StageExecutor::new(inference.clone(), Arc::new(FailingRenderer), state, 5);
        let err = executor.execute(&EchoStage, None).unwrap_err();
        assert!(matches!(err, StageError::Render { .. }));
        assert!(inference.prompts().is_empty());
    }

    #[test]
    fn charges_prompt_tokens_per_attempt() {
        let temp = tempfile::tempdir().expect("tempdir");
        let inference = Arc::new(ScriptedInference::new(["bad", "ok"]));
        let (executor, state) = executor(temp.path(), inference.clone(), 5);
        let project = ProjectId::new("Todo App").expect("id");

        executor.execute(&EchoStage, Some(&project)).expect("execute");
        let expected: u64 = inference.prompts().iter().map(|p| estimate_tokens(p)).sum();
        assert!(expected > 0);
        assert_eq!(state.latest_token_usage(&project).expect("usage"), expected);
        assert_eq!(state.read_all(&project).expect("read").len(), 1);
    }

    #[test]
    fn token_estimate_rounds_up() {
        assert_eq!(estimate_tokens(""), 0);
        assert_eq!(estimate_tokens("abc"), 1);
        assert_eq!(estimate_tokens("abcdefgh"), 2);
        assert_eq!(estimate_tokens("abcdefghi"), 3);
    }
}
