//! Running model-proposed shell commands inside a project directory.

use std::path::Path;
use std::time::Duration;

use anyhow::Result;
use tracing::{info, instrument};

use crate::io::config::CommandsConfig;
use crate::io::process::{command_from_argv, run_command_with_timeout};

/// Result of one command: what a terminal would have shown.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandReport {
    pub command: String,
    pub output: String,
    pub exit_code: Option<i32>,
    pub success: bool,
}

pub trait CommandRunner: Send + Sync {
    /// Run `command` in `workdir`. A command that runs and fails is `Ok` with
    /// `success == false`; `Err` means it could not be run at all.
    fn run(&self, command: &str, workdir: &Path) -> Result<CommandReport>;
}

/// Runs commands through a configured shell (`sh -c` by default).
pub struct ShellCommandRunner {
    shell: Vec<String>,
    timeout: Duration,
    output_limit_bytes: usize,
}

impl ShellCommandRunner {
    pub fn new(config: &CommandsConfig) -> Self {
        Self {
            shell: config.shell.clone(),
            timeout: config.timeout(),
            output_limit_bytes: config.output_limit_bytes,
        }
    }
}

impl CommandRunner for ShellCommandRunner {
    #[instrument(skip_all, fields(command))]
    fn run(&self, command: &str, workdir: &Path) -> Result<CommandReport> {
        let mut argv = self.shell.clone();
        argv.push(command.to_string());
        let cmd = command_from_argv(&argv, Some(workdir))?;
        let output = run_command_with_timeout(cmd, None, self.timeout, self.output_limit_bytes)?;
        let report = CommandReport {
            command: command.to_string(),
            output: output.combined_text(),
            exit_code: output.status.code(),
            success: output.succeeded(),
        };
        info!(exit_code = ?report.exit_code, success = report.success, "command finished");
        Ok(report)
    }
}
