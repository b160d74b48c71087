//! Workspace layout and `devpilot init` scaffolding.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use tracing::info;

use crate::core::project::ProjectId;
use crate::io::config::{AgentConfig, write_config};

/// Well-known paths under a workspace root.
#[derive(Debug, Clone)]
pub struct WorkspacePaths {
    pub root: PathBuf,
    pub devpilot_dir: PathBuf,
    pub config_path: PathBuf,
    pub gitignore_path: PathBuf,
    /// Per-project state and conversation logs.
    pub state_root: PathBuf,
}

impl WorkspacePaths {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        let devpilot_dir = root.join(".devpilot");
        Self {
            root: root.clone(),
            devpilot_dir: devpilot_dir.clone(),
            config_path: devpilot_dir.join("config.toml"),
            gitignore_path: devpilot_dir.join(".gitignore"),
            state_root: devpilot_dir.join("projects"),
        }
    }

    pub fn project_state_dir(&self, project: &ProjectId) -> PathBuf {
        self.state_root.join(project.slug())
    }

    pub fn state_path(&self, project: &ProjectId) -> PathBuf {
        self.project_state_dir(project).join("state.json")
    }

    pub fn messages_path(&self, project: &ProjectId) -> PathBuf {
        self.project_state_dir(project).join("messages.jsonl")
    }

    /// Root of generated project files for a given config.
    pub fn projects_root(&self, config: &AgentConfig) -> PathBuf {
        self.root.join(&config.projects_dir)
    }
}

/// Options for `init_workspace`.
#[derive(Debug, Clone)]
pub struct InitOptions {
    /// If true, overwrite an existing config.
    pub force: bool,
}

/// Create `.devpilot/` scaffolding in `root`.
///
/// Fails if `.devpilot/` already exists unless `options.force` is set.
pub fn init_workspace(root: &Path, options: &InitOptions) -> Result<WorkspacePaths> {
    let paths = WorkspacePaths::new(root);
    if paths.devpilot_dir.exists() && !paths.devpilot_dir.is_dir() {
        return Err(anyhow!("init: .devpilot exists but is not a directory"));
    }
    if paths.devpilot_dir.exists() && !options.force {
        return Err(anyhow!(
            "init: .devpilot already exists (use --force to overwrite)"
        ));
    }

    let config = AgentConfig::default();
    create_dir(&paths.devpilot_dir)?;
    create_dir(&paths.state_root)?;
    create_dir(&paths.projects_root(&config))?;
    write_config(&paths.config_path, &config)?;
    fs::write(&paths.gitignore_path, DEVPILOT_GITIGNORE)
        .with_context(|| format!("write file {}", paths.gitignore_path.display()))?;

    info!(root = %root.display(), "initialized workspace");
    Ok(paths)
}

fn create_dir(path: &Path) -> Result<()> {
    fs::create_dir_all(path).with_context(|| format!("create directory {}", path.display()))
}

const DEVPILOT_GITIGNORE: &str = "*.tmp\n";
