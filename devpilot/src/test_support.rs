//! Scripted collaborators and a throwaway workspace for tests.

use std::collections::{BTreeSet, HashMap, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use anyhow::{Result, anyhow};
use serde_json::{Value, json};
use tempfile::TempDir;

use crate::agent::{Agent, AgentSettings, Services, Stores};
use crate::core::code_blocks::render_code_blocks;
use crate::core::project::ProjectId;
use crate::core::types::CodeFile;
use crate::io::commands::{CommandReport, CommandRunner};
use crate::io::config::AgentConfig;
use crate::io::conversation_log::ConversationLog;
use crate::io::git::{RepositoryCloner, repo_name};
use crate::io::inference::InferenceClient;
use crate::io::init::{InitOptions, WorkspacePaths, init_workspace};
use crate::io::project_files::ProjectFiles;
use crate::io::prompt::TemplateRenderer;
use crate::io::services::{
    BrowserInteraction, Deployer, Deployment, FocusKeywords, MarkdownDocumentWriter,
};
use crate::io::state_log::StateLog;
use crate::io::web::{Browser, PageCapture, WebSearch};
use crate::stages::StageExecutor;

pub use crate::io::broadcast::RecordingBroadcaster;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
}

/// Inference client that replays queued responses in order and records prompts.
#[derive(Default)]
pub struct ScriptedInference {
    responses: Mutex<VecDeque<Result<String, String>>>,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedInference {
    pub fn new<I, S>(responses: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            responses: Mutex::new(responses.into_iter().map(|r| Ok(r.into())).collect()),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn push_response(&self, response: &str) {
        lock(&self.responses).push_back(Ok(response.to_string()));
    }

    /// Queue a call that fails at the transport level.
    pub fn push_failure(&self, message: &str) {
        lock(&self.responses).push_back(Err(message.to_string()));
    }

    /// Every prompt received so far, in order.
    pub fn prompts(&self) -> Vec<String> {
        lock(&self.prompts).clone()
    }

    pub fn remaining(&self) -> usize {
        lock(&self.responses).len()
    }
}

impl InferenceClient for ScriptedInference {
    fn infer(&self, prompt: &str, _project: Option<&ProjectId>) -> Result<String> {
        lock(&self.prompts).push(prompt.to_string());
        match lock(&self.responses).pop_front() {
            Some(Ok(response)) => Ok(response),
            Some(Err(message)) => Err(anyhow!(message)),
            None => Err(anyhow!("scripted inference has no responses left")),
        }
    }
}

/// Search and browser backed by `https://search.test/<query>` pages.
#[derive(Default)]
pub struct FakeWeb {
    searched: Mutex<Vec<String>>,
    failing: Mutex<BTreeSet<String>>,
}

impl FakeWeb {
    pub fn fail_query(&self, query: &str) {
        lock(&self.failing).insert(query.to_string());
    }

    pub fn searched(&self) -> Vec<String> {
        lock(&self.searched).clone()
    }
}

impl WebSearch for FakeWeb {
    fn first_link(&self, query: &str) -> Result<String> {
        lock(&self.searched).push(query.to_string());
        if lock(&self.failing).contains(query) {
            return Err(anyhow!("search backend unavailable"));
        }
        Ok(format!("https://search.test/{}", query.replace(' ', "-")))
    }
}

impl Browser for FakeWeb {
    fn capture(&self, url: &str, _project: &ProjectId) -> Result<PageCapture> {
        Ok(PageCapture {
            screenshot: Some("c2NyZWVuc2hvdA==".to_string()),
            text: format!("Contents of {url}"),
        })
    }
}

/// Command runner that succeeds unless a command was told to fail.
#[derive(Default)]
pub struct FakeCommands {
    executed: Mutex<Vec<String>>,
    failures: Mutex<HashMap<String, String>>,
}

impl FakeCommands {
    /// Make `command` exit with status 1 and print `output`.
    pub fn fail_command(&self, command: &str, output: &str) {
        lock(&self.failures).insert(command.to_string(), output.to_string());
    }

    pub fn executed(&self) -> Vec<String> {
        lock(&self.executed).clone()
    }
}

impl CommandRunner for FakeCommands {
    fn run(&self, command: &str, _workdir: &Path) -> Result<CommandReport> {
        lock(&self.executed).push(command.to_string());
        let report = match lock(&self.failures).get(command) {
            Some(output) => CommandReport {
                command: command.to_string(),
                output: output.clone(),
                exit_code: Some(1),
                success: false,
            },
            None => CommandReport {
                command: command.to_string(),
                output: format!("ok: {command}"),
                exit_code: Some(0),
                success: true,
            },
        };
        Ok(report)
    }
}

/// Deployer returning `https://<slug>.deploy.test`.
#[derive(Default)]
pub struct FakeDeployer {
    failure: Mutex<Option<String>>,
}

impl FakeDeployer {
    pub fn fail_with(&self, message: &str) {
        *lock(&self.failure) = Some(message.to_string());
    }
}

impl Deployer for FakeDeployer {
    fn deploy(&self, project: &ProjectId, _dir: &Path) -> Result<Deployment> {
        if let Some(message) = lock(&self.failure).clone() {
            return Err(anyhow!(message));
        }
        Ok(Deployment {
            deploy_url: format!("https://{}.deploy.test", project.slug()),
        })
    }
}

#[derive(Default)]
pub struct RecordingInteraction {
    prompts: Mutex<Vec<String>>,
}

impl RecordingInteraction {
    pub fn prompts(&self) -> Vec<String> {
        lock(&self.prompts).clone()
    }
}

impl BrowserInteraction for RecordingInteraction {
    fn interact(&self, prompt: &str, _project: &ProjectId) -> Result<()> {
        lock(&self.prompts).push(prompt.to_string());
        Ok(())
    }
}

/// Cloner that creates an empty checkout directory instead of running git.
#[derive(Default)]
pub struct FakeCloner {
    cloned: Mutex<Vec<String>>,
}

impl FakeCloner {
    pub fn cloned(&self) -> Vec<String> {
        lock(&self.cloned).clone()
    }
}

impl RepositoryCloner for FakeCloner {
    fn clone_repo(&self, url: &str, dest: &Path) -> Result<PathBuf> {
        let target = dest.join(repo_name(url)?);
        std::fs::create_dir_all(&target)?;
        lock(&self.cloned).push(url.to_string());
        Ok(target)
    }
}

/// An initialized workspace in a temp dir with an [`Agent`] wired to fakes.
pub struct TestWorkspace {
    pub temp: TempDir,
    pub paths: WorkspacePaths,
    pub inference: Arc<ScriptedInference>,
    pub broadcaster: Arc<RecordingBroadcaster>,
    pub web: Arc<FakeWeb>,
    pub commands: Arc<FakeCommands>,
    pub deployer: Arc<FakeDeployer>,
    pub interaction: Arc<RecordingInteraction>,
    pub cloner: Arc<FakeCloner>,
    pub agent: Agent,
}

impl TestWorkspace {
    pub fn new<I, S>(responses: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::with_config(AgentConfig::default(), responses)
    }

    pub fn with_config<I, S>(config: AgentConfig, responses: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let temp = tempfile::tempdir().expect("tempdir");
        let paths = init_workspace(temp.path(), &InitOptions { force: false }).expect("init workspace");
        let projects_root = paths.projects_root(&config);

        let inference = Arc::new(ScriptedInference::new(responses));
        let broadcaster = Arc::new(RecordingBroadcaster::new());
        let web = Arc::new(FakeWeb::default());
        let commands = Arc::new(FakeCommands::default());
        let deployer = Arc::new(FakeDeployer::default());
        let interaction = Arc::new(RecordingInteraction::default());
        let cloner = Arc::new(FakeCloner::default());

        let state = Arc::new(StateLog::new(&paths.state_root, broadcaster.clone()));
        let conversation = Arc::new(ConversationLog::new(&paths.state_root, broadcaster.clone()));
        let executor = StageExecutor::new(
            inference.clone(),
            Arc::new(TemplateRenderer::new()),
            state.clone(),
            config.max_stage_attempts,
        );
        let agent = Agent::new(
            AgentSettings::from_config(&config),
            executor,
            Stores {
                state,
                conversation,
                files: ProjectFiles::new(&projects_root),
            },
            Services {
                search: web.clone(),
                browser: web.clone(),
                commands: commands.clone(),
                deployer: deployer.clone(),
                documents: Arc::new(MarkdownDocumentWriter::new(&projects_root)),
                browser_interaction: interaction.clone(),
                keywords: Arc::new(FocusKeywords::default()),
                cloner: cloner.clone(),
                broadcaster: broadcaster.clone(),
            },
        );

        Self {
            temp,
            paths,
            inference,
            broadcaster,
            web,
            commands,
            deployer,
            interaction,
            cloner,
            agent,
        }
    }
}

/// Planner text with a fixed reply and one numbered step per entry.
pub fn plan_response(project: &str, focus: &str, steps: &[&str]) -> String {
    let mut text = format!(
        "Project Name: {project}\n\
         Your Reply to the Human Prompter: Sure, building it now\n\
         Current Focus: {focus}\n\
         Plan:\n"
    );
    for (index, step) in steps.iter().enumerate() {
        text.push_str(&format!("- [ ] Step {}: {step}\n", index + 1));
    }
    text.push_str("Summary: ```Build it step by step```\n");
    text
}

pub fn monologue_response(text: &str) -> String {
    json!({ "internal_monologue": text }).to_string()
}

pub fn research_response(queries: &[&str], ask_user: &str) -> String {
    json!({ "queries": queries, "ask_user": ask_user }).to_string()
}

pub fn code_response(files: &[(&str, &str)]) -> String {
    let files: Vec<CodeFile> = files
        .iter()
        .map(|(file, code)| CodeFile {
            file: (*file).to_string(),
            code: (*code).to_string(),
        })
        .collect();
    render_code_blocks(&files)
}

pub fn action_response(action: &str, response: &str) -> String {
    json!({ "response": response, "action": action }).to_string()
}

pub fn answer_response(response: &str) -> String {
    json!({ "response": response }).to_string()
}

pub fn runner_response(commands: &[&str]) -> String {
    json!({ "commands": commands }).to_string()
}

/// Decision array from `(function, args, reply)` triples, fenced as models tend to.
pub fn decision_response(calls: &[(&str, Value, &str)]) -> String {
    let calls: Vec<Value> = calls
        .iter()
        .map(|(function, args, reply)| json!({ "function": function, "args": args, "reply": reply }))
        .collect();
    format!("```json\n{}\n```", Value::Array(calls))
}
