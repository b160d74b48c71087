//! Shared record types for agent state and conversation history.
//!
//! These types are the persisted contract between the orchestrator and anything
//! observing it (state files, live-update subscribers). Field names are stable.

use serde::{Deserialize, Serialize};

/// Timestamp format used for snapshots and messages.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Current local time rendered with [`TIMESTAMP_FORMAT`].
pub fn timestamp_now() -> String {
    chrono::Local::now().format(TIMESTAMP_FORMAT).to_string()
}

/// What the agent's browser was looking at.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BrowserSession {
    pub url: Option<String>,
    pub screenshot: Option<String>,
}

/// What the agent's terminal was showing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TerminalSession {
    pub command: Option<String>,
    pub output: Option<String>,
    pub title: Option<String>,
}

/// One point-in-time view of what the agent is doing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentSnapshot {
    pub internal_monologue: Option<String>,
    pub browser_session: Option<BrowserSession>,
    pub terminal_session: Option<TerminalSession>,
    /// Orchestrator phase current when the snapshot was produced.
    pub step: Option<String>,
    pub message: Option<String>,
    pub completed: bool,
    pub agent_is_active: bool,
    pub token_usage: u64,
    pub timestamp: String,
}

impl AgentSnapshot {
    /// Fresh snapshot: active, not completed, zero token usage.
    pub fn new() -> Self {
        Self {
            internal_monologue: None,
            browser_session: None,
            terminal_session: None,
            step: None,
            message: None,
            completed: false,
            agent_is_active: true,
            token_usage: 0,
            timestamp: timestamp_now(),
        }
    }
}

impl Default for AgentSnapshot {
    fn default() -> Self {
        Self::new()
    }
}

/// Who authored a conversation message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Origin {
    User,
    Agent,
}

impl Origin {
    pub fn label(self) -> &'static str {
        match self {
            Origin::User => "User",
            Origin::Agent => "Agent",
        }
    }
}

/// A single conversation entry. Immutable once appended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub origin: Origin,
    pub text: String,
    pub timestamp: String,
}

impl Message {
    pub fn new(origin: Origin, text: impl Into<String>) -> Self {
        Self {
            origin,
            text: text.into(),
            timestamp: timestamp_now(),
        }
    }

    /// `"Origin: text"`, the form fed back to the model as context.
    pub fn formatted(&self) -> String {
        format!("{}: {}", self.origin.label(), self.text)
    }
}

/// A generated source file: relative path plus full contents.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodeFile {
    pub file: String,
    pub code: String,
}

/// Summarized result of researching a single query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchResult {
    pub query: String,
    pub link: String,
    pub summary: String,
}
