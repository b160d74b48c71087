//! The orchestrator: composes stages into tasks and records every step.
//!
//! A task moves through [`AgentPhase`]s. Each entry point (new task here,
//! follow-up in [`crate::follow_up`], decision mode in [`crate::dispatch`])
//! drives one [`Task`] and funnels any error through [`Agent::fail_task`], so
//! a failed task always ends inactive with a "Task failed" message.

use std::sync::{Arc, Mutex, PoisonError};

use anyhow::{Result, anyhow};
use tracing::{debug, error, info, instrument, warn};

use crate::core::decision::UnknownFunctionPolicy;
use crate::core::phase::AgentPhase;
use crate::core::plan::{Plan, PlannerMode};
use crate::core::project::ProjectId;
use crate::core::types::{AgentSnapshot, CodeFile, TerminalSession};
use crate::io::broadcast::Broadcaster;
use crate::io::commands::CommandRunner;
use crate::io::config::AgentConfig;
use crate::io::conversation_log::ConversationLog;
use crate::io::git::RepositoryCloner;
use crate::io::project_files::ProjectFiles;
use crate::io::services::{BrowserInteraction, Deployer, DocumentConverter, KeywordExtractor};
use crate::io::state_log::StateLog;
use crate::io::web::{Browser, WebSearch};
use crate::stages::StageExecutor;
use crate::stages::code::CoderStage;
use crate::stages::monologue::MonologueStage;
use crate::stages::planner::PlannerStage;
use crate::stages::researcher::ResearcherStage;

/// Posted when a task finishes normally.
pub const COMPLETED_MESSAGE: &str = "Task completed. Let me know if you need anything else.";

/// Monologue recorded on each emulated file write.
pub const WRITING_CODE_MONOLOGUE: &str = "Writing code...";

/// Behavior knobs taken from [`AgentConfig`].
#[derive(Debug, Clone)]
pub struct AgentSettings {
    pub planner: PlannerMode,
    pub unknown_function: UnknownFunctionPolicy,
    pub code_context_limit_bytes: usize,
    /// Operating system description given to prompts that emit commands.
    pub system_os: String,
}

impl AgentSettings {
    pub fn from_config(config: &AgentConfig) -> Self {
        Self {
            planner: config.planner,
            unknown_function: config.unknown_function,
            code_context_limit_bytes: config.code_context_limit_bytes,
            system_os: system_os(),
        }
    }
}

impl Default for AgentSettings {
    fn default() -> Self {
        Self::from_config(&AgentConfig::default())
    }
}

pub fn system_os() -> String {
    format!("{} {}", std::env::consts::OS, std::env::consts::ARCH)
}

/// Durable per-project stores.
pub struct Stores {
    pub state: Arc<StateLog>,
    pub conversation: Arc<ConversationLog>,
    pub files: ProjectFiles,
}

/// External collaborators the agent delegates to.
pub struct Services {
    pub search: Arc<dyn WebSearch>,
    pub browser: Arc<dyn Browser>,
    pub commands: Arc<dyn CommandRunner>,
    pub deployer: Arc<dyn Deployer>,
    pub documents: Arc<dyn DocumentConverter>,
    pub browser_interaction: Arc<dyn BrowserInteraction>,
    pub keywords: Arc<dyn KeywordExtractor>,
    pub cloner: Arc<dyn RepositoryCloner>,
    /// Channel for screenshots taken during research.
    pub broadcaster: Arc<dyn Broadcaster>,
}

/// How a task ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskOutcome {
    pub project: ProjectId,
    pub message: String,
}

/// Phase tracking for one orchestrator invocation.
#[derive(Debug)]
pub(crate) struct Task {
    phase: AgentPhase,
    project: Option<ProjectId>,
}

impl Task {
    pub(crate) fn new(project: Option<ProjectId>) -> Self {
        Self {
            phase: AgentPhase::Idle,
            project,
        }
    }

    pub(crate) fn phase(&self) -> AgentPhase {
        self.phase
    }

    pub(crate) fn advance(&mut self, next: AgentPhase) -> Result<()> {
        if !self.phase.can_transition_to(next) {
            return Err(anyhow!("illegal phase transition {} -> {next}", self.phase));
        }
        debug!(from = %self.phase, to = %next, "phase transition");
        self.phase = next;
        Ok(())
    }
}

pub struct Agent {
    pub(crate) settings: AgentSettings,
    pub(crate) executor: StageExecutor,
    pub(crate) state: Arc<StateLog>,
    pub(crate) conversation: Arc<ConversationLog>,
    pub(crate) files: ProjectFiles,
    pub(crate) services: Services,
    keywords: Mutex<Vec<String>>,
}

impl Agent {
    pub fn new(
        settings: AgentSettings,
        executor: StageExecutor,
        stores: Stores,
        services: Services,
    ) -> Self {
        Self {
            settings,
            executor,
            state: stores.state,
            conversation: stores.conversation,
            files: stores.files,
            services,
            keywords: Mutex::new(Vec::new()),
        }
    }

    pub fn state(&self) -> &StateLog {
        &self.state
    }

    pub fn conversation(&self) -> &ConversationLog {
        &self.conversation
    }

    pub fn files(&self) -> &ProjectFiles {
        &self.files
    }

    /// Keywords collected from plan focus lines so far.
    pub fn contextual_keywords(&self) -> Vec<String> {
        self.keywords
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn update_contextual_keywords(&self, sentence: &str) {
        let extracted = self.services.keywords.extract(sentence);
        if extracted.is_empty() {
            return;
        }
        debug!(count = extracted.len(), "collected contextual keywords");
        self.keywords
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .extend(extracted);
    }

    /// Run a brand-new task: plan, research, write code.
    ///
    /// Without `project_name` the project is named by the planner.
    #[instrument(skip_all, fields(project = project_name.unwrap_or("-")))]
    pub fn execute(&self, prompt: &str, project_name: Option<&str>) -> Result<TaskOutcome> {
        let supplied = project_name.map(ProjectId::new).transpose()?;
        let mut task = Task::new(supplied);
        match self.run_new_task(&mut task, prompt) {
            Ok(project) => Ok(TaskOutcome {
                project,
                message: COMPLETED_MESSAGE.to_string(),
            }),
            Err(err) => Err(self.fail_task(&mut task, err)),
        }
    }

    fn run_new_task(&self, task: &mut Task, prompt: &str) -> Result<ProjectId> {
        task.advance(AgentPhase::Planning)?;
        if let Some(project) = task.project.clone() {
            self.open_project(&project, prompt)?;
        }

        let plan = self.executor.execute(
            &PlannerStage {
                prompt,
                mode: self.settings.planner,
            },
            task.project.as_ref(),
        )?;

        let project = match task.project.clone() {
            Some(project) => project,
            None => {
                let name = plan.project.trim();
                if name.is_empty() {
                    return Err(anyhow!("planner did not name the project"));
                }
                let project = ProjectId::new(name)?;
                task.project = Some(project.clone());
                self.open_project(&project, prompt)?;
                project
            }
        };
        info!(project = %project, steps = plan.plans.len(), "plan ready");

        if !plan.reply.is_empty() {
            self.conversation.add_agent_message(&project, &plan.reply)?;
        }
        self.update_contextual_keywords(&plan.focus);

        let monologue = self.executor.execute(
            &MonologueStage {
                current_prompt: &plan.raw,
            },
            Some(&project),
        )?;
        self.push_snapshot(&project, task.phase(), |snapshot| {
            snapshot.internal_monologue = Some(monologue);
        })?;

        self.research_and_code(task, &project, &plan)?;
        self.complete_task(task, &project)?;
        Ok(project)
    }

    /// Create the project's logs (if new), mark it active and record the request.
    fn open_project(&self, project: &ProjectId, prompt: &str) -> Result<()> {
        self.begin_task(project)?;
        self.conversation.add_user_message(project, prompt)
    }

    /// Mark `project` as working on a new task.
    pub(crate) fn begin_task(&self, project: &ProjectId) -> Result<()> {
        self.state.ensure_initialized(project)?;
        self.state.set_agent_active(project, true)?;
        self.state.set_agent_completed(project, false)
    }

    /// Research the plan, generate code for it and save the files.
    pub(crate) fn research_and_code(
        &self,
        task: &mut Task,
        project: &ProjectId,
        plan: &Plan,
    ) -> Result<()> {
        task.advance(AgentPhase::Researching)?;
        let keywords = self.contextual_keywords();
        let research = self.executor.execute(
            &ResearcherStage {
                plan: &plan.raw,
                keywords: &keywords,
            },
            Some(project),
        )?;

        if !research.queries.is_empty() {
            self.conversation.add_agent_message(
                project,
                &format!(
                    "I am researching the queries: {}. If I need anything, I'll ask you.",
                    research.queries.join(", ")
                ),
            )?;
        }
        if !research.ask_user.is_empty() {
            self.conversation
                .add_agent_message(project, &research.ask_user)?;
        }

        let search_results = if research.queries.is_empty() {
            Vec::new()
        } else {
            self.search_queries(task, &research.queries, project)?
        };

        task.advance(AgentPhase::Coding)?;
        let files = self.executor.execute(
            &CoderStage {
                plan: &plan.raw,
                user_context: &research.ask_user,
                search_results: &search_results,
            },
            Some(project),
        )?;
        self.write_code(task, project, &files)
    }

    /// Record one "Writing code..." snapshot per file, then save the files.
    pub(crate) fn write_code(
        &self,
        task: &Task,
        project: &ProjectId,
        files: &[CodeFile],
    ) -> Result<()> {
        self.emulate_code_writing(task, project, files)?;
        self.files.write_all(project, files)?;
        Ok(())
    }

    fn emulate_code_writing(&self, task: &Task, project: &ProjectId, files: &[CodeFile]) -> Result<()> {
        let browser_session = self
            .state
            .latest(project)?
            .and_then(|snapshot| snapshot.browser_session);
        for file in files {
            self.push_snapshot(project, task.phase(), |snapshot| {
                snapshot.browser_session = browser_session.clone();
                snapshot.internal_monologue = Some(WRITING_CODE_MONOLOGUE.to_string());
                snapshot.terminal_session = Some(TerminalSession {
                    command: Some(format!("vim {}", file.file)),
                    output: Some(file.code.clone()),
                    title: Some(format!("Editing {}", file.file)),
                });
            })?;
        }
        Ok(())
    }

    /// Append a new snapshot stamped with `phase`.
    ///
    /// The running token total carries over so the newest snapshot always
    /// holds the task's usage so far.
    pub(crate) fn push_snapshot(
        &self,
        project: &ProjectId,
        phase: AgentPhase,
        fill: impl FnOnce(&mut AgentSnapshot),
    ) -> Result<()> {
        let mut snapshot = AgentSnapshot::new();
        snapshot.token_usage = self.state.latest_token_usage(project)?;
        snapshot.step = Some(phase.as_str().to_string());
        fill(&mut snapshot);
        self.state.append(project, snapshot)
    }

    /// Normal end of a task.
    pub(crate) fn complete_task(&self, task: &mut Task, project: &ProjectId) -> Result<()> {
        task.advance(AgentPhase::Completed)?;
        self.state.set_agent_active(project, false)?;
        self.state.set_agent_completed(project, true)?;
        self.conversation
            .add_agent_message(project, COMPLETED_MESSAGE)?;
        info!(project = %project, "task completed");
        Ok(())
    }

    /// Move `task` to failed, tell the user and hand the error back.
    ///
    /// Secondary failures while reporting are logged; the original error wins.
    pub(crate) fn fail_task(&self, task: &mut Task, err: anyhow::Error) -> anyhow::Error {
        if !task.phase.is_terminal() {
            task.phase = AgentPhase::Failed;
        }
        error!(err = %format!("{err:#}"), "task failed");
        if let Some(project) = &task.project {
            if let Err(report_err) = self.state.set_agent_active(project, false) {
                warn!(err = %report_err, "failed to mark agent inactive");
            }
            let message = format!("Task failed: {err:#}");
            if let Err(report_err) = self.conversation.add_agent_message(project, &message) {
                warn!(err = %report_err, "failed to post failure message");
            }
        }
        err
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::Origin;
    use crate::io::broadcast::AGENT_STATE;
    use crate::stages::StageError;
    use crate::test_support::{
        TestWorkspace, code_response, monologue_response, plan_response, research_response,
    };

    fn happy_path() -> Vec<String> {
        vec![
            plan_response("Todo App", "task list CRUD", &["scaffold project"]),
            monologue_response("Let me scaffold the todo app."),
            research_response(&[], ""),
            code_response(&[("app.py", "print('todo')"), ("README.md", "# Todo")]),
        ]
    }

    /// Verifies the full new-task workflow names the project from the plan,
    /// records monologue and code snapshots, saves files and completes.
    #[test]
    fn new_task_without_project_name_completes() {
        let ws = TestWorkspace::new(happy_path());
        let outcome = ws.agent.execute("build a todo app", None).expect("execute");

        assert_eq!(outcome.project.slug(), "todo-app");
        assert_eq!(outcome.message, COMPLETED_MESSAGE);

        let project = &outcome.project;
        let files = ws.agent.files();
        assert_eq!(
            std::fs::read_to_string(files.project_dir(project).join("app.py")).expect("read"),
            "print('todo')"
        );

        let snapshots = ws.agent.state().read_all(project).expect("state");
        let monologue = snapshots
            .iter()
            .find(|s| s.internal_monologue.as_deref() == Some("Let me scaffold the todo app."))
            .expect("monologue snapshot");
        assert_eq!(monologue.step.as_deref(), Some("planning"));
        let writes: Vec<_> = snapshots
            .iter()
            .filter_map(|s| s.terminal_session.as_ref())
            .collect();
        assert_eq!(writes.len(), 2);
        assert_eq!(writes[0].command.as_deref(), Some("vim app.py"));
        assert_eq!(writes[1].title.as_deref(), Some("Editing README.md"));

        let last = snapshots.last().expect("last");
        assert!(!last.agent_is_active);
        assert!(last.completed);
        assert!(last.token_usage > 0);

        let messages = ws.agent.conversation().read_all(project).expect("messages");
        assert_eq!(messages[0].origin, Origin::User);
        assert_eq!(messages[0].text, "build a todo app");
        assert_eq!(messages[1].text, "Sure, building it now");
        assert_eq!(messages.last().expect("last").text, COMPLETED_MESSAGE);
        assert!(!ws.broadcaster.channel_events(AGENT_STATE).is_empty());
    }

    #[test]
    fn research_queries_and_question_are_posted() {
        let ws = TestWorkspace::new(vec![
            plan_response("Todo App", "flask api", &["scaffold project"]),
            monologue_response("Thinking."),
            research_response(&["Flask Routing"], "Which database do you prefer?"),
            "Flask routes map URLs to functions.".to_string(),
            code_response(&[("app.py", "print(1)")]),
        ]);
        let outcome = ws.agent.execute("build a todo app", Some("Todo App")).expect("execute");

        let texts: Vec<String> = ws
            .agent
            .conversation()
            .read_all(&outcome.project)
            .expect("messages")
            .into_iter()
            .map(|m| m.text)
            .collect();
        assert!(texts.contains(
            &"I am researching the queries: Flask Routing. If I need anything, I'll ask you."
                .to_string()
        ));
        assert!(texts.contains(&"Which database do you prefer?".to_string()));
        assert_eq!(ws.web.searched(), vec!["flask routing"]);
        assert_eq!(ws.agent.contextual_keywords(), vec!["flask", "api"]);

        let coder_prompt = ws.inference.prompts().last().cloned().expect("coder prompt");
        assert!(coder_prompt.contains("Flask routes map URLs to functions."));
    }

    #[test]
    fn empty_project_name_fails_without_project() {
        let ws = TestWorkspace::new(vec!["I would love to help!".to_string()]);
        let err = ws.agent.execute("build something", None).unwrap_err();
        assert!(err.to_string().contains("did not name the project"));
        assert!(ws.agent.files().list_projects().expect("list").is_empty());
    }

    /// Verifies a stage that exhausts its retries fails the task: the agent
    /// ends inactive and not completed, and the user sees the failure.
    #[test]
    fn exhausted_stage_fails_task() {
        let mut responses = vec![
            plan_response("Todo App", "crud", &["scaffold project"]),
            monologue_response("Thinking."),
            research_response(&[], ""),
        ];
        responses.extend(std::iter::repeat_n("no code here".to_string(), 5));
        let ws = TestWorkspace::new(responses);

        let err = ws.agent.execute("build a todo app", Some("Todo App")).unwrap_err();
        let stage_err = err.downcast_ref::<StageError>().expect("stage error");
        assert!(matches!(stage_err, StageError::RetriesExhausted { attempts: 5, .. }));

        let project = ProjectId::new("Todo App").expect("id");
        let last = ws.agent.state().latest(&project).expect("state").expect("snapshot");
        assert!(!last.agent_is_active);
        assert!(!last.completed);
        let messages = ws.agent.conversation().read_all(&project).expect("messages");
        assert!(messages.last().expect("last").text.starts_with("Task failed: "));
    }

    #[test]
    fn escaping_file_name_is_retried_before_anything_is_written() {
        let ws = TestWorkspace::new(vec![
            plan_response("Todo App", "crud", &["scaffold project"]),
            monologue_response("Thinking."),
            research_response(&[], ""),
            code_response(&[("app.py", "print(1)"), ("/etc/devpilot.cfg", "x")]),
            code_response(&[("main.py", "print(2)")]),
        ]);
        let outcome = ws.agent.execute("build a todo app", Some("Todo App")).expect("execute");
        assert_eq!(ws.inference.remaining(), 0);

        let dir = ws.agent.files().project_dir(&outcome.project);
        assert!(!dir.join("app.py").exists());
        assert_eq!(std::fs::read_to_string(dir.join("main.py")).expect("read"), "print(2)");

        let titles: Vec<String> = ws
            .agent
            .state()
            .read_all(&outcome.project)
            .expect("state")
            .into_iter()
            .filter_map(|s| s.terminal_session.and_then(|t| t.title))
            .collect();
        assert_eq!(titles, vec!["Editing main.py"]);
    }

    #[test]
    fn illegal_transition_is_refused() {
        let mut task = Task::new(None);
        assert!(task.advance(AgentPhase::Coding).is_err());
        task.advance(AgentPhase::Planning).expect("planning");
        assert_eq!(task.phase(), AgentPhase::Planning);
    }
}
