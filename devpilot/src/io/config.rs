//! Agent configuration stored under `.devpilot/config.toml`.

use std::fs;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};

use crate::core::decision::UnknownFunctionPolicy;
use crate::core::plan::PlannerMode;

/// Agent configuration (TOML).
///
/// Edited by humans; every field has a default so a partial file is valid.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct AgentConfig {
    /// Attempts a stage gets before it reports exhaustion.
    pub max_stage_attempts: u32,

    /// Directory (relative to the workspace root) holding generated projects.
    pub projects_dir: String,

    /// Upper bound on project code fed back to the model as context.
    pub code_context_limit_bytes: usize,

    pub unknown_function: UnknownFunctionPolicy,

    pub planner: PlannerMode,

    pub inference: InferenceConfig,

    pub commands: CommandsConfig,

    pub deploy: DeployConfig,

    pub broadcast: BroadcastConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct InferenceConfig {
    /// Process that reads a prompt on stdin and answers on stdout.
    pub command: Vec<String>,
    pub timeout_secs: u64,
    pub output_limit_bytes: usize,
}

impl Default for InferenceConfig {
    fn default() -> Self {
        Self {
            command: vec![
                "codex".to_string(),
                "exec".to_string(),
                "--skip-git-repo-check".to_string(),
                "-".to_string(),
            ],
            timeout_secs: 15 * 60,
            output_limit_bytes: 1_000_000,
        }
    }
}

impl InferenceConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct CommandsConfig {
    /// Shell prefix; the proposed command line is appended as the last argument.
    pub shell: Vec<String>,
    pub timeout_secs: u64,
    pub output_limit_bytes: usize,
}

impl Default for CommandsConfig {
    fn default() -> Self {
        Self {
            shell: vec!["sh".to_string(), "-c".to_string()],
            timeout_secs: 5 * 60,
            output_limit_bytes: 100_000,
        }
    }
}

impl CommandsConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct DeployConfig {
    /// Deploy command run inside the project directory. Empty disables deploys.
    pub command: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct BroadcastConfig {
    /// Live-update events buffered per subscriber.
    pub capacity: usize,
}

impl Default for BroadcastConfig {
    fn default() -> Self {
        Self { capacity: 256 }
    }
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            max_stage_attempts: 5,
            projects_dir: "projects".to_string(),
            code_context_limit_bytes: 200_000,
            unknown_function: UnknownFunctionPolicy::default(),
            planner: PlannerMode::default(),
            inference: InferenceConfig::default(),
            commands: CommandsConfig::default(),
            deploy: DeployConfig::default(),
            broadcast: BroadcastConfig::default(),
        }
    }
}

impl AgentConfig {
    pub fn validate(&self) -> Result<()> {
        if self.max_stage_attempts == 0 {
            return Err(anyhow!("max_stage_attempts must be >= 1"));
        }
        if self.projects_dir.trim().is_empty() {
            return Err(anyhow!("projects_dir must be non-empty"));
        }
        if self.code_context_limit_bytes == 0 {
            return Err(anyhow!("code_context_limit_bytes must be > 0"));
        }
        if !is_argv(&self.inference.command) {
            return Err(anyhow!("inference.command must be a non-empty array"));
        }
        if self.inference.timeout_secs == 0 {
            return Err(anyhow!("inference.timeout_secs must be > 0"));
        }
        if self.inference.output_limit_bytes == 0 {
            return Err(anyhow!("inference.output_limit_bytes must be > 0"));
        }
        if !is_argv(&self.commands.shell) {
            return Err(anyhow!("commands.shell must be a non-empty array"));
        }
        if self.commands.timeout_secs == 0 {
            return Err(anyhow!("commands.timeout_secs must be > 0"));
        }
        if self.commands.output_limit_bytes == 0 {
            return Err(anyhow!("commands.output_limit_bytes must be > 0"));
        }
        if !self.deploy.command.is_empty() && !is_argv(&self.deploy.command) {
            return Err(anyhow!("deploy.command must be empty or start with a program"));
        }
        if self.broadcast.capacity == 0 {
            return Err(anyhow!("broadcast.capacity must be > 0"));
        }
        Ok(())
    }
}

fn is_argv(argv: &[String]) -> bool {
    argv.first().is_some_and(|program| !program.trim().is_empty())
}

/// Load config from a TOML file.
///
/// If the file is missing, returns `AgentConfig::default()`.
pub fn load_config(path: &Path) -> Result<AgentConfig> {
    if !path.exists() {
        let cfg = AgentConfig::default();
        cfg.validate()?;
        return Ok(cfg);
    }
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let cfg: AgentConfig =
        toml::from_str(&contents).with_context(|| format!("parse {}", path.display()))?;
    cfg.validate()
        .with_context(|| format!("invalid config {}", path.display()))?;
    Ok(cfg)
}

/// Atomically write config to disk (temp file + rename).
pub fn write_config(path: &Path, cfg: &AgentConfig) -> Result<()> {
    cfg.validate()?;
    let mut buf = toml::to_string_pretty(cfg).context("serialize config toml")?;
    buf.push('\n');
    crate::io::atomic::write_atomic(path, buf.as_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_missing_returns_default() {
        let temp = tempfile::tempdir().expect("tempdir");
        let cfg = load_config(&temp.path().join("missing.toml")).expect("load");
        assert_eq!(cfg, AgentConfig::default());
    }

    #[test]
    fn write_then_load_round_trips() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join(".devpilot/config.toml");
        let mut cfg = AgentConfig::default();
        cfg.unknown_function = UnknownFunctionPolicy::Reject;
        cfg.planner = PlannerMode::Strict;
        cfg.deploy.command = vec!["./deploy.sh".to_string()];
        write_config(&path, &cfg).expect("write");
        let loaded = load_config(&path).expect("load");
        assert_eq!(loaded, cfg);
    }

    #[test]
    fn partial_file_fills_defaults() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("config.toml");
        fs::write(&path, "max_stage_attempts = 2\n[commands]\ntimeout_secs = 10\n").expect("write");
        let cfg = load_config(&path).expect("load");
        assert_eq!(cfg.max_stage_attempts, 2);
        assert_eq!(cfg.commands.timeout_secs, 10);
        assert_eq!(cfg.commands.shell, vec!["sh", "-c"]);
        assert_eq!(cfg.projects_dir, "projects");
    }

    #[test]
    fn rejects_zero_attempts() {
        let cfg = AgentConfig {
            max_stage_attempts: 0,
            ..AgentConfig::default()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn rejects_empty_inference_command() {
        let mut cfg = AgentConfig::default();
        cfg.inference.command.clear();
        assert!(cfg.validate().is_err());
        cfg.inference.command = vec![" ".to_string()];
        assert!(cfg.validate().is_err());
    }
}
