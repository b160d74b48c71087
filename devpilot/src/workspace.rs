//! Opening an initialized workspace and wiring the agent to real collaborators.

use std::path::Path;
use std::sync::Arc;

use anyhow::{Result, anyhow};
use tracing::debug;

use crate::agent::{Agent, AgentSettings, Services, Stores};
use crate::io::broadcast::Broadcaster;
use crate::io::commands::ShellCommandRunner;
use crate::io::config::{AgentConfig, load_config};
use crate::io::conversation_log::ConversationLog;
use crate::io::git::Git;
use crate::io::inference::CommandInference;
use crate::io::init::WorkspacePaths;
use crate::io::project_files::ProjectFiles;
use crate::io::prompt::TemplateRenderer;
use crate::io::services::{
    CommandDeployer, Deployer, FocusKeywords, MarkdownDocumentWriter, Unsupported,
};
use crate::io::state_log::StateLog;
use crate::io::web::DisabledWeb;
use crate::stages::StageExecutor;

/// A workspace created by `devpilot init`, with its validated config.
#[derive(Debug, Clone)]
pub struct Workspace {
    pub paths: WorkspacePaths,
    pub config: AgentConfig,
}

impl Workspace {
    pub fn open(root: &Path) -> Result<Self> {
        let paths = WorkspacePaths::new(root);
        if !paths.config_path.is_file() {
            return Err(anyhow!(
                "{} not found (run `devpilot init` first)",
                paths.config_path.display()
            ));
        }
        let config = load_config(&paths.config_path)?;
        debug!(root = %root.display(), "opened workspace");
        Ok(Self { paths, config })
    }

    pub fn state_log(&self, broadcaster: Arc<dyn Broadcaster>) -> StateLog {
        StateLog::new(&self.paths.state_root, broadcaster)
    }

    pub fn conversation_log(&self, broadcaster: Arc<dyn Broadcaster>) -> ConversationLog {
        ConversationLog::new(&self.paths.state_root, broadcaster)
    }

    pub fn project_files(&self) -> ProjectFiles {
        ProjectFiles::new(self.paths.projects_root(&self.config))
    }

    /// An agent backed by the configured model command, shell and git.
    ///
    /// Web research is disabled; searches are announced and skipped.
    pub fn build_agent(&self, broadcaster: Arc<dyn Broadcaster>) -> Agent {
        let config = &self.config;
        let state = Arc::new(self.state_log(broadcaster.clone()));
        let conversation = Arc::new(self.conversation_log(broadcaster.clone()));
        let projects_root = self.paths.projects_root(config);

        let executor = StageExecutor::new(
            Arc::new(CommandInference::new(&config.inference).with_workdir(&self.paths.root)),
            Arc::new(TemplateRenderer::new()),
            state.clone(),
            config.max_stage_attempts,
        );
        let deployer: Arc<dyn Deployer> = if config.deploy.command.is_empty() {
            Arc::new(Unsupported::new("deploy command"))
        } else {
            Arc::new(CommandDeployer::new(
                config.deploy.command.clone(),
                &config.commands,
            ))
        };

        Agent::new(
            AgentSettings::from_config(config),
            executor,
            Stores {
                state,
                conversation,
                files: ProjectFiles::new(&projects_root),
            },
            Services {
                search: Arc::new(DisabledWeb),
                browser: Arc::new(DisabledWeb),
                commands: Arc::new(ShellCommandRunner::new(&config.commands)),
                deployer,
                documents: Arc::new(MarkdownDocumentWriter::new(&projects_root)),
                browser_interaction: Arc::new(Unsupported::new("browser interaction")),
                keywords: Arc::new(FocusKeywords::default()),
                cloner: Arc::new(Git),
                broadcaster,
            },
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::project::ProjectId;
    use crate::io::broadcast::NullBroadcaster;
    use crate::io::init::{InitOptions, init_workspace};

    #[test]
    fn open_requires_init() {
        let temp = tempfile::tempdir().expect("tempdir");
        let err = Workspace::open(temp.path()).unwrap_err();
        assert!(err.to_string().contains("devpilot init"));
    }

    #[test]
    fn opened_workspace_agent_uses_workspace_stores() {
        let temp = tempfile::tempdir().expect("tempdir");
        init_workspace(temp.path(), &InitOptions { force: false }).expect("init");
        let workspace = Workspace::open(temp.path()).expect("open");
        let agent = workspace.build_agent(Arc::new(NullBroadcaster));

        let project = ProjectId::new("demo").expect("id");
        agent.state().ensure_initialized(&project).expect("init state");
        assert!(workspace.paths.state_path(&project).is_file());
        assert_eq!(agent.files().root(), temp.path().join("projects"));
    }
}
