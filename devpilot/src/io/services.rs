//! External services the agent hands work to: deployment, documents,
//! browser automation and keyword extraction.

use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use regex::Regex;
use tracing::{info, instrument, warn};

use crate::core::project::ProjectId;
use crate::io::config::CommandsConfig;
use crate::io::process::{command_from_argv, run_command_with_timeout};

/// Where a deployed project can be reached.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Deployment {
    pub deploy_url: String,
}

pub trait Deployer: Send + Sync {
    fn deploy(&self, project: &ProjectId, dir: &Path) -> Result<Deployment>;
}

pub trait DocumentConverter: Send + Sync {
    /// Persist `markdown` as a document for `project`, returning its location.
    fn convert(&self, markdown: &str, project: &ProjectId) -> Result<PathBuf>;
}

pub trait BrowserInteraction: Send + Sync {
    /// Carry out `prompt` in a browser on behalf of `project`.
    fn interact(&self, prompt: &str, project: &ProjectId) -> Result<()>;
}

pub trait KeywordExtractor: Send + Sync {
    fn extract(&self, text: &str) -> Vec<String>;
}

/// Runs a deploy command in the project directory and takes the last URL it prints.
pub struct CommandDeployer {
    command: Vec<String>,
    timeout: Duration,
    output_limit_bytes: usize,
}

impl CommandDeployer {
    pub fn new(command: Vec<String>, limits: &CommandsConfig) -> Self {
        Self {
            command,
            timeout: limits.timeout(),
            output_limit_bytes: limits.output_limit_bytes,
        }
    }
}

static URL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"https?://[^\s"'<>]+"#).expect("url regex should be valid"));

impl Deployer for CommandDeployer {
    #[instrument(skip_all, fields(project = %project))]
    fn deploy(&self, project: &ProjectId, dir: &Path) -> Result<Deployment> {
        let cmd = command_from_argv(&self.command, Some(dir))?;
        let output = run_command_with_timeout(cmd, None, self.timeout, self.output_limit_bytes)
            .context("run deploy command")?;
        if !output.succeeded() {
            warn!(exit_code = ?output.status.code(), "deploy command failed");
            return Err(anyhow!(
                "deploy command failed: {}",
                output.combined_text().trim()
            ));
        }
        let stdout = output.stdout_text();
        let deploy_url = URL_RE
            .find_iter(&stdout)
            .last()
            .map(|m| m.as_str().to_string())
            .ok_or_else(|| anyhow!("deploy command printed no URL"))?;
        info!(deploy_url = %deploy_url, "deployed project");
        Ok(Deployment { deploy_url })
    }
}

/// Writes the markdown as `report.md` in the project directory.
pub struct MarkdownDocumentWriter {
    projects_root: PathBuf,
}

impl MarkdownDocumentWriter {
    pub fn new(projects_root: impl Into<PathBuf>) -> Self {
        Self {
            projects_root: projects_root.into(),
        }
    }
}

impl DocumentConverter for MarkdownDocumentWriter {
    fn convert(&self, markdown: &str, project: &ProjectId) -> Result<PathBuf> {
        let dir = self.projects_root.join(project.slug());
        fs::create_dir_all(&dir).with_context(|| format!("create directory {}", dir.display()))?;
        let path = dir.join("report.md");
        let mut contents = markdown.trim_end().to_string();
        contents.push('\n');
        fs::write(&path, contents).with_context(|| format!("write {}", path.display()))?;
        Ok(path)
    }
}

/// Collaborator that is not available in this build; every call fails.
pub struct Unsupported {
    what: &'static str,
}

impl Unsupported {
    pub fn new(what: &'static str) -> Self {
        Self { what }
    }
}

impl Deployer for Unsupported {
    fn deploy(&self, _project: &ProjectId, _dir: &Path) -> Result<Deployment> {
        Err(anyhow!("{} is not configured", self.what))
    }
}

impl BrowserInteraction for Unsupported {
    fn interact(&self, _prompt: &str, _project: &ProjectId) -> Result<()> {
        Err(anyhow!("{} is not configured", self.what))
    }
}

impl DocumentConverter for Unsupported {
    fn convert(&self, _markdown: &str, _project: &ProjectId) -> Result<PathBuf> {
        Err(anyhow!("{} is not configured", self.what))
    }
}

/// Picks content words out of a focus phrase: lowercase, deduplicated, in
/// first-seen order, with stopwords and short tokens dropped.
pub struct FocusKeywords {
    limit: usize,
}

impl FocusKeywords {
    pub fn new(limit: usize) -> Self {
        Self { limit }
    }
}

impl Default for FocusKeywords {
    fn default() -> Self {
        Self::new(8)
    }
}

static WORD_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[A-Za-z0-9][A-Za-z0-9+#_-]*").expect("word regex should be valid"));

const STOPWORDS: &[&str] = &[
    "about", "after", "also", "and", "are", "but", "for", "from", "has", "have", "into", "its",
    "not", "our", "that", "the", "their", "then", "this", "those", "using", "was", "will", "with",
    "you", "your",
];

impl KeywordExtractor for FocusKeywords {
    fn extract(&self, text: &str) -> Vec<String> {
        let mut seen = BTreeSet::new();
        WORD_RE
            .find_iter(text)
            .map(|m| m.as_str().to_lowercase())
            .filter(|word| word.len() >= 3 && !STOPWORDS.contains(&word.as_str()))
            .filter(|word| seen.insert(word.clone()))
            .take(self.limit)
            .collect()
    }
}
