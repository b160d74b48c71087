//! Append-only per-project conversation between the user and the agent.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{debug, instrument, warn};

use crate::core::project::ProjectId;
use crate::core::types::{Message, Origin};
use crate::io::broadcast::{Broadcaster, SERVER_MESSAGE};
use crate::io::locks::{ProjectLocks, acquire};

/// JSONL store at `.devpilot/projects/<slug>/messages.jsonl`.
pub struct ConversationLog {
    root: PathBuf,
    broadcaster: Arc<dyn Broadcaster>,
    locks: ProjectLocks,
}

impl ConversationLog {
    pub fn new(root: impl Into<PathBuf>, broadcaster: Arc<dyn Broadcaster>) -> Self {
        Self {
            root: root.into(),
            broadcaster,
            locks: ProjectLocks::new(),
        }
    }

    fn path(&self, project: &ProjectId) -> PathBuf {
        self.root.join(project.slug()).join("messages.jsonl")
    }

    #[instrument(skip_all, fields(project = %project, origin = ?message.origin))]
    pub fn append(&self, project: &ProjectId, message: Message) -> Result<()> {
        let lock = self.locks.get(project)?;
        let _guard = acquire(&lock, project)?;
        let path = self.path(project);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("create directory {}", parent.display()))?;
        }
        let mut line = serde_json::to_string(&message).context("serialize message")?;
        line.push('\n');
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .with_context(|| format!("open {}", path.display()))?;
        file.write_all(line.as_bytes())
            .with_context(|| format!("append to {}", path.display()))?;
        debug!("appended message");

        match serde_json::to_value(&message) {
            Ok(payload) => {
                self.broadcaster.emit(SERVER_MESSAGE, &payload);
            }
            Err(err) => warn!(err = %err, "failed to encode message update"),
        }
        Ok(())
    }

    pub fn add_user_message(&self, project: &ProjectId, text: &str) -> Result<()> {
        self.append(project, Message::new(Origin::User, text))
    }

    pub fn add_agent_message(&self, project: &ProjectId, text: &str) -> Result<()> {
        self.append(project, Message::new(Origin::Agent, text))
    }

    /// Every message in append order. Empty when the project has no history.
    pub fn read_all(&self, project: &ProjectId) -> Result<Vec<Message>> {
        let path = self.path(project);
        if !path.exists() {
            return Ok(Vec::new());
        }
        let contents =
            fs::read_to_string(&path).with_context(|| format!("read {}", path.display()))?;
        contents
            .lines()
            .enumerate()
            .filter(|(_, line)| !line.trim().is_empty())
            .map(|(idx, line)| {
                serde_json::from_str(line)
                    .with_context(|| format!("parse {} line {}", path.display(), idx + 1))
            })
            .collect()
    }

    /// `"User: ..."` / `"Agent: ..."` lines, ready to use as model context.
    pub fn read_formatted(&self, project: &ProjectId) -> Result<Vec<String>> {
        Ok(self
            .read_all(project)?
            .iter()
            .map(Message::formatted)
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::broadcast::{NullBroadcaster, RecordingBroadcaster};

    fn project() -> ProjectId {
        ProjectId::new("Todo App").expect("id")
    }

    #[test]
    fn appends_preserve_order_and_format() {
        let temp = tempfile::tempdir().expect("tempdir");
        let log = ConversationLog::new(temp.path(), Arc::new(NullBroadcaster));
        let id = project();
        log.add_user_message(&id, "build a todo app").expect("user");
        log.add_agent_message(&id, "Sure, building it now").expect("agent");

        let messages = log.read_all(&id).expect("read");
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].origin, Origin::User);
        assert_eq!(
            log.read_formatted(&id).expect("formatted"),
            vec!["User: build a todo app", "Agent: Sure, building it now"]
        );
    }

    #[test]
    fn multiline_text_survives_storage() {
        let temp = tempfile::tempdir().expect("tempdir");
        let log = ConversationLog::new(temp.path(), Arc::new(NullBroadcaster));
        let id = project();
        log.add_agent_message(&id, "line one\nline two").expect("agent");
        let messages = log.read_all(&id).expect("read");
        assert_eq!(messages[0].text, "line one\nline two");
    }

    #[test]
    fn missing_history_is_empty() {
        let temp = tempfile::tempdir().expect("tempdir");
        let log = ConversationLog::new(temp.path(), Arc::new(NullBroadcaster));
        assert!(log.read_all(&project()).expect("read").is_empty());
    }

    #[test]
    fn appends_are_broadcast() {
        let temp = tempfile::tempdir().expect("tempdir");
        let recorder = Arc::new(RecordingBroadcaster::new());
        let log = ConversationLog::new(temp.path(), recorder.clone());
        log.add_agent_message(&project(), "hello").expect("agent");
        let events = recorder.channel_events(SERVER_MESSAGE);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0]["text"], "hello");
        assert_eq!(events[0]["origin"], "agent");
    }
}
