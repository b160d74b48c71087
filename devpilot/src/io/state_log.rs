//! Append-only per-project log of agent snapshots.
//!
//! Stored as a pretty JSON array at `.devpilot/projects/<slug>/state.json`
//! and rewritten atomically on every mutation. The last element is the
//! current state. Two kinds of write exist and must not be confused:
//!
//! - [`StateLog::append`] pushes a new snapshot (a new step of reasoning);
//! - [`StateLog::replace_last`] and the `set_*`/`update_*` helpers mutate the
//!   last snapshot in place.

use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use serde_json::Value;
use tracing::{debug, instrument, warn};

use crate::core::project::ProjectId;
use crate::core::types::AgentSnapshot;
use crate::io::atomic::write_atomic;
use crate::io::broadcast::{AGENT_STATE, Broadcaster};
use crate::io::locks::{ProjectLocks, acquire};

/// Monologue recorded when a task finishes.
pub const COMPLETED_MONOLOGUE: &str = "Agent has completed the task.";

pub struct StateLog {
    root: PathBuf,
    broadcaster: Arc<dyn Broadcaster>,
    locks: ProjectLocks,
}

impl StateLog {
    /// `root` holds one directory per project slug.
    pub fn new(root: impl Into<PathBuf>, broadcaster: Arc<dyn Broadcaster>) -> Self {
        Self {
            root: root.into(),
            broadcaster,
            locks: ProjectLocks::new(),
        }
    }

    fn path(&self, project: &ProjectId) -> PathBuf {
        self.root.join(project.slug()).join("state.json")
    }

    /// Every snapshot for `project`, oldest first. Empty when nothing was recorded.
    pub fn read_all(&self, project: &ProjectId) -> Result<Vec<AgentSnapshot>> {
        let path = self.path(project);
        if !path.exists() {
            return Ok(Vec::new());
        }
        let contents =
            fs::read_to_string(&path).with_context(|| format!("read {}", path.display()))?;
        serde_json::from_str(&contents).with_context(|| format!("parse {}", path.display()))
    }

    pub fn latest(&self, project: &ProjectId) -> Result<Option<AgentSnapshot>> {
        Ok(self.read_all(project)?.pop())
    }

    /// Push `snapshot` as the new current state.
    #[instrument(skip_all, fields(project = %project))]
    pub fn append(&self, project: &ProjectId, snapshot: AgentSnapshot) -> Result<()> {
        self.mutate(project, |snapshots| snapshots.push(snapshot))
    }

    /// Overwrite the current state. On an empty log this pushes instead.
    #[instrument(skip_all, fields(project = %project))]
    pub fn replace_last(&self, project: &ProjectId, snapshot: AgentSnapshot) -> Result<()> {
        self.mutate(project, |snapshots| match snapshots.last_mut() {
            Some(last) => *last = snapshot,
            None => snapshots.push(snapshot),
        })
    }

    /// Push a fresh snapshot if the log is empty.
    pub fn ensure_initialized(&self, project: &ProjectId) -> Result<()> {
        if self.read_all(project)?.is_empty() {
            self.append(project, AgentSnapshot::new())?;
        }
        Ok(())
    }

    pub fn set_agent_active(&self, project: &ProjectId, active: bool) -> Result<()> {
        debug!(project = %project, active, "set agent active");
        self.update_latest(project, |last| last.agent_is_active = active)
    }

    /// Mark the current state completed; completion also records the closing monologue.
    pub fn set_agent_completed(&self, project: &ProjectId, completed: bool) -> Result<()> {
        debug!(project = %project, completed, "set agent completed");
        self.update_latest(project, |last| {
            last.completed = completed;
            if completed {
                last.internal_monologue = Some(COMPLETED_MONOLOGUE.to_string());
            }
        })
    }

    /// Add `tokens` to the current state's running total.
    pub fn update_token_usage(&self, project: &ProjectId, tokens: u64) -> Result<()> {
        self.update_latest(project, |last| {
            last.token_usage = last.token_usage.saturating_add(tokens);
        })
    }

    pub fn is_agent_active(&self, project: &ProjectId) -> Result<bool> {
        Ok(self
            .latest(project)?
            .is_some_and(|snapshot| snapshot.agent_is_active))
    }

    pub fn is_agent_completed(&self, project: &ProjectId) -> Result<bool> {
        Ok(self.latest(project)?.is_some_and(|snapshot| snapshot.completed))
    }

    pub fn latest_token_usage(&self, project: &ProjectId) -> Result<u64> {
        Ok(self
            .latest(project)?
            .map_or(0, |snapshot| snapshot.token_usage))
    }

    /// Apply `update` to the last snapshot, creating a fresh one on an empty log.
    fn update_latest(
        &self,
        project: &ProjectId,
        update: impl FnOnce(&mut AgentSnapshot),
    ) -> Result<()> {
        self.mutate(project, |snapshots| {
            if snapshots.is_empty() {
                snapshots.push(AgentSnapshot::new());
            }
            if let Some(last) = snapshots.last_mut() {
                update(last);
            }
        })
    }

    fn mutate(
        &self,
        project: &ProjectId,
        change: impl FnOnce(&mut Vec<AgentSnapshot>),
    ) -> Result<()> {
        let lock = self.locks.get(project)?;
        let _guard = acquire(&lock, project)?;
        let mut snapshots = self.read_all(project)?;
        change(&mut snapshots);
        let path = self.path(project);
        let mut buf = serde_json::to_string_pretty(&snapshots).context("serialize agent state")?;
        buf.push('\n');
        write_atomic(&path, buf.as_bytes())?;
        self.publish(project, &snapshots);
        Ok(())
    }

    fn publish(&self, project: &ProjectId, snapshots: &[AgentSnapshot]) {
        match serde_json::to_value(snapshots) {
            Ok(payload) => {
                self.broadcaster.emit(AGENT_STATE, &payload);
            }
            Err(err) => warn!(project = %project, err = %err, "failed to encode agent state update"),
        }
    }
}

/// Decode a broadcast `agent-state` payload.
pub fn decode_snapshots(payload: &Value) -> Result<Vec<AgentSnapshot>> {
    serde_json::from_value(payload.clone()).context("decode agent state payload")
}
