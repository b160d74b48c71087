//! Decision mode: run an ordered list of model-chosen functions.

use anyhow::{Context, Result};
use tracing::{debug, info, instrument, warn};

use crate::agent::{Agent, Task};
use crate::core::decision::{DecisionFunction, DispatchGap, UnknownFunctionPolicy};
use crate::core::phase::AgentPhase;
use crate::core::project::ProjectId;
use crate::stages::decision::DecisionStage;
use crate::stages::planner::PlannerStage;
use crate::stages::reporter::ReporterStage;

/// What a decision-mode run did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecisionOutcome {
    pub project: ProjectId,
    /// Names of the functions that ran, in order.
    pub executed: Vec<&'static str>,
    /// Records that could not be dispatched.
    pub skipped: Vec<DispatchGap>,
}

impl Agent {
    #[instrument(skip_all, fields(project = project_name))]
    pub fn make_decision(&self, prompt: &str, project_name: &str) -> Result<DecisionOutcome> {
        let project = ProjectId::new(project_name)?;
        let mut task = Task::new(Some(project.clone()));
        match self.run_decision(&mut task, prompt, &project) {
            Ok((executed, skipped)) => Ok(DecisionOutcome {
                project,
                executed,
                skipped,
            }),
            Err(err) => Err(self.fail_task(&mut task, err)),
        }
    }

    fn run_decision(
        &self,
        task: &mut Task,
        prompt: &str,
        project: &ProjectId,
    ) -> Result<(Vec<&'static str>, Vec<DispatchGap>)> {
        task.advance(AgentPhase::Acting)?;
        self.conversation.add_user_message(project, prompt)?;
        self.begin_task(project)?;

        let policy = self.settings.unknown_function;
        let calls = self
            .executor
            .execute(&DecisionStage { prompt, policy }, Some(project))?;
        info!(calls = calls.len(), "decision ready");

        let mut executed = Vec::new();
        let mut skipped = Vec::new();
        for call in &calls {
            if !call.reply.trim().is_empty() {
                self.conversation.add_agent_message(project, &call.reply)?;
            }
            match DecisionFunction::from_call(call) {
                Ok(function) => {
                    let name = function.name();
                    self.dispatch_function(task, project, function)?;
                    executed.push(name);
                }
                Err(gap) => {
                    self.note_gap(project, policy, &gap)?;
                    skipped.push(gap);
                }
            }
        }

        self.complete_task(task, project)?;
        Ok((executed, skipped))
    }

    fn note_gap(&self, project: &ProjectId, policy: UnknownFunctionPolicy, gap: &DispatchGap) -> Result<()> {
        match policy {
            UnknownFunctionPolicy::Ignore => {
                debug!(gap = %gap, "ignoring decision record");
                Ok(())
            }
            UnknownFunctionPolicy::Report | UnknownFunctionPolicy::Reject => {
                warn!(gap = %gap, "skipping decision record");
                self.conversation
                    .add_agent_message(project, &format!("I can't run this step: {gap}."))
            }
        }
    }

    fn dispatch_function(
        &self,
        task: &mut Task,
        project: &ProjectId,
        function: DecisionFunction,
    ) -> Result<()> {
        debug!(function = function.name(), "dispatching");
        match function {
            DecisionFunction::GitClone { url } => {
                let dest = self.files.project_dir(project);
                let cloned = self
                    .services
                    .cloner
                    .clone_repo(&url, &dest)
                    .with_context(|| format!("clone {url}"))?;
                self.conversation.add_agent_message(
                    project,
                    &format!("Cloned {url} into {}", cloned.display()),
                )
            }
            DecisionFunction::GeneratePdfDocument { user_prompt } => {
                let conversation = [user_prompt];
                let markdown = self.executor.execute(
                    &ReporterStage {
                        conversation: &conversation,
                        code_markdown: "",
                    },
                    Some(project),
                )?;
                let location = self
                    .services
                    .documents
                    .convert(&markdown, project)
                    .context("convert document")?;
                self.conversation.add_agent_message(
                    project,
                    &format!("Document generated: {}", location.display()),
                )
            }
            DecisionFunction::BrowserInteraction { user_prompt } => self
                .services
                .browser_interaction
                .interact(&user_prompt, project)
                .context("browser interaction"),
            DecisionFunction::CodingProject { user_prompt } => {
                task.advance(AgentPhase::Planning)?;
                let plan = self.executor.execute(
                    &PlannerStage {
                        prompt: &user_prompt,
                        mode: self.settings.planner,
                    },
                    Some(project),
                )?;
                self.research_and_code(task, project, &plan)?;
                task.advance(AgentPhase::Acting)
            }
        }
    }
}
