//! Follow-up tasks on an existing project.

use std::fs;

use anyhow::{Context, Result};
use serde_json::json;
use tracing::{info, instrument, warn};

use crate::agent::{Agent, COMPLETED_MESSAGE, Task, TaskOutcome};
use crate::core::action::FollowUpAction;
use crate::core::phase::AgentPhase;
use crate::core::project::ProjectId;
use crate::core::types::TerminalSession;
use crate::stages::action::ActionStage;
use crate::stages::answer::AnswerStage;
use crate::stages::code::{FeatureStage, PatcherStage};
use crate::stages::reporter::ReporterStage;
use crate::stages::runner::RunnerStage;

pub const DEPLOYED_MESSAGE: &str = "Done! I deployed your project.";

/// Inputs every follow-up branch may need.
struct FollowUpContext {
    prompt: String,
    conversation: Vec<String>,
    code_markdown: String,
}

impl Agent {
    /// Handle a follow-up message on `project_name`.
    ///
    /// The Action stage classifies the message and one branch runs.
    #[instrument(skip_all, fields(project = project_name))]
    pub fn subsequent_execute(&self, prompt: &str, project_name: &str) -> Result<TaskOutcome> {
        let project = ProjectId::new(project_name)?;
        let mut task = Task::new(Some(project.clone()));
        match self.run_follow_up(&mut task, prompt, &project) {
            Ok(()) => Ok(TaskOutcome {
                project,
                message: COMPLETED_MESSAGE.to_string(),
            }),
            Err(err) => Err(self.fail_task(&mut task, err)),
        }
    }

    fn run_follow_up(&self, task: &mut Task, prompt: &str, project: &ProjectId) -> Result<()> {
        task.advance(AgentPhase::Acting)?;
        self.conversation.add_user_message(project, prompt)?;
        self.begin_task(project)?;

        let ctx = FollowUpContext {
            prompt: prompt.to_string(),
            conversation: self.conversation.read_formatted(project)?,
            code_markdown: self
                .files
                .code_markdown(project, self.settings.code_context_limit_bytes)?,
        };

        let choice = self.executor.execute(
            &ActionStage {
                conversation: &ctx.conversation,
            },
            Some(project),
        )?;
        if !choice.response.trim().is_empty() {
            self.conversation
                .add_agent_message(project, &choice.response)?;
        }
        info!(action = %choice.action, "follow-up action chosen");

        match choice.action {
            FollowUpAction::Answer => self.answer(project, &ctx)?,
            FollowUpAction::Run => self.run_project(task, project, &ctx)?,
            FollowUpAction::Deploy => self.deploy(project)?,
            FollowUpAction::Feature => self.implement_feature(task, project, &ctx)?,
            FollowUpAction::Bug => self.fix_bug(task, project, &ctx)?,
            FollowUpAction::Report => self.report(project, &ctx)?,
        }

        self.complete_task(task, project)
    }

    fn answer(&self, project: &ProjectId, ctx: &FollowUpContext) -> Result<()> {
        let reply = self.executor.execute(
            &AnswerStage {
                conversation: &ctx.conversation,
                code_markdown: &ctx.code_markdown,
            },
            Some(project),
        )?;
        self.conversation.add_agent_message(project, &reply)
    }

    /// Execute the proposed commands in order, stopping at the first failure.
    fn run_project(&self, task: &Task, project: &ProjectId, ctx: &FollowUpContext) -> Result<()> {
        let commands = self.executor.execute(
            &RunnerStage {
                conversation: &ctx.conversation,
                code_markdown: &ctx.code_markdown,
                system_os: &self.settings.system_os,
            },
            Some(project),
        )?;

        let workdir = self.files.project_dir(project);
        fs::create_dir_all(&workdir)
            .with_context(|| format!("create directory {}", workdir.display()))?;

        for command in commands {
            let report = self
                .services
                .commands
                .run(&command, &workdir)
                .with_context(|| format!("run command {command:?}"))?;
            self.push_snapshot(project, task.phase(), |snapshot| {
                snapshot.internal_monologue = Some(format!("Running `{command}`"));
                snapshot.terminal_session = Some(TerminalSession {
                    command: Some(command.clone()),
                    output: Some(report.output.clone()),
                    title: Some("Terminal".to_string()),
                });
            })?;

            if !report.success {
                warn!(command = %command, exit_code = ?report.exit_code, "command failed; stopping run");
                let exit = report
                    .exit_code
                    .map_or_else(|| "none".to_string(), |code| code.to_string());
                self.conversation.add_agent_message(
                    project,
                    &format!(
                        "Command `{command}` failed (exit code {exit}):\n{}",
                        report.output.trim_end()
                    ),
                )?;
                break;
            }
        }
        Ok(())
    }

    fn deploy(&self, project: &ProjectId) -> Result<()> {
        let dir = self.files.project_dir(project);
        let deployment = self
            .services
            .deployer
            .deploy(project, &dir)
            .context("deploy project")?;
        let message = serde_json::to_string_pretty(&json!({
            "message": DEPLOYED_MESSAGE,
            "deploy_url": deployment.deploy_url,
        }))?;
        self.conversation.add_agent_message(project, &message)
    }

    fn implement_feature(&self, task: &Task, project: &ProjectId, ctx: &FollowUpContext) -> Result<()> {
        let files = self.executor.execute(
            &FeatureStage {
                conversation: &ctx.conversation,
                code_markdown: &ctx.code_markdown,
                system_os: &self.settings.system_os,
            },
            Some(project),
        )?;
        self.write_code(task, project, &files)
    }

    fn fix_bug(&self, task: &Task, project: &ProjectId, ctx: &FollowUpContext) -> Result<()> {
        let files = self.executor.execute(
            &PatcherStage {
                conversation: &ctx.conversation,
                code_markdown: &ctx.code_markdown,
                error: &ctx.prompt,
                system_os: &self.settings.system_os,
            },
            Some(project),
        )?;
        self.write_code(task, project, &files)
    }

    fn report(&self, project: &ProjectId, ctx: &FollowUpContext) -> Result<()> {
        let markdown = self.executor.execute(
            &ReporterStage {
                conversation: &ctx.conversation,
                code_markdown: &ctx.code_markdown,
            },
            Some(project),
        )?;
        let location = self
            .services
            .documents
            .convert(&markdown, project)
            .context("convert report")?;
        self.conversation.add_agent_message(
            project,
            &format!("Report generated: {}", location.display()),
        )
    }
}
