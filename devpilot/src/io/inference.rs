//! Inference backend abstraction.
//!
//! The [`InferenceClient`] trait decouples stages from the model backend.
//! Tests use scripted clients that return queued responses without spawning
//! processes.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Result, anyhow};
use tracing::{debug, info, instrument, warn};

use crate::core::project::ProjectId;
use crate::io::config::InferenceConfig;
use crate::io::process::{command_from_argv, run_command_with_timeout};

pub trait InferenceClient: Send + Sync {
    /// Send `prompt` to the model and return its raw text answer.
    ///
    /// `project` is `None` before the task has a project (first planning call).
    fn infer(&self, prompt: &str, project: Option<&ProjectId>) -> Result<String>;
}

/// Runs a model CLI (e.g. `codex exec -`) with the prompt on stdin.
pub struct CommandInference {
    command: Vec<String>,
    workdir: Option<PathBuf>,
    timeout: Duration,
    output_limit_bytes: usize,
}

impl CommandInference {
    pub fn new(config: &InferenceConfig) -> Self {
        Self {
            command: config.command.clone(),
            workdir: None,
            timeout: config.timeout(),
            output_limit_bytes: config.output_limit_bytes,
        }
    }

    pub fn with_workdir(mut self, workdir: impl Into<PathBuf>) -> Self {
        self.workdir = Some(workdir.into());
        self
    }
}

impl InferenceClient for CommandInference {
    #[instrument(skip_all, fields(program = %self.command.first().map_or("", String::as_str), prompt_bytes = prompt.len()))]
    fn infer(&self, prompt: &str, project: Option<&ProjectId>) -> Result<String> {
        info!(project = project.map_or("-", ProjectId::slug), "running inference command");
        let cmd = command_from_argv(&self.command, self.workdir.as_deref())?;
        let output = run_command_with_timeout(
            cmd,
            Some(prompt.as_bytes()),
            self.timeout,
            self.output_limit_bytes,
        )?;
        if output.timed_out {
            warn!(timeout_secs = self.timeout.as_secs(), "inference timed out");
            return Err(anyhow!("inference timed out after {:?}", self.timeout));
        }
        if !output.status.success() {
            let stderr = output.stderr_text();
            warn!(exit_code = ?output.status.code(), "inference command failed");
            return Err(anyhow!(
                "inference command failed with status {:?}: {}",
                output.status.code(),
                stderr.trim()
            ));
        }
        if output.stdout_truncated > 0 {
            warn!(truncated = output.stdout_truncated, "inference output truncated");
        }
        let text = output.stdout_text();
        debug!(response_bytes = text.len(), "inference completed");
        Ok(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(command: &[&str]) -> InferenceConfig {
        InferenceConfig {
            command: command.iter().map(|s| s.to_string()).collect(),
            timeout_secs: 10,
            output_limit_bytes: 10_000,
        }
    }

    #[test]
    fn echoes_stdout_as_response() {
        let client = CommandInference::new(&config(&["cat"]));
        let answer = client.infer("hello model", None).expect("infer");
        assert_eq!(answer, "hello model");
    }

    #[test]
    fn non_zero_exit_is_an_error() {
        let client = CommandInference::new(&config(&["sh", "-c", "echo boom >&2; exit 3"]));
        let err = client.infer("x", None).unwrap_err();
        assert!(err.to_string().contains("boom"));
    }

    #[test]
    fn missing_program_is_an_error() {
        let client = CommandInference::new(&config(&["devpilot-no-such-binary"]));
        assert!(client.infer("x", None).is_err());
    }
}
