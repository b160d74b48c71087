//! Orchestrator phases and the transitions allowed between them.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Where a task currently is in the orchestration state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AgentPhase {
    Idle,
    Planning,
    Researching,
    Coding,
    Acting,
    Completed,
    Failed,
}

impl AgentPhase {
    pub fn as_str(self) -> &'static str {
        match self {
            AgentPhase::Idle => "idle",
            AgentPhase::Planning => "planning",
            AgentPhase::Researching => "researching",
            AgentPhase::Coding => "coding",
            AgentPhase::Acting => "acting",
            AgentPhase::Completed => "completed",
            AgentPhase::Failed => "failed",
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, AgentPhase::Completed | AgentPhase::Failed)
    }

    /// Whether `self -> next` is a legal transition.
    ///
    /// Coding may hand back to Acting (and Acting to Planning) so that decision
    /// mode can run a full coding pipeline per dispatched item.
    pub fn can_transition_to(self, next: AgentPhase) -> bool {
        use AgentPhase::{Acting, Coding, Completed, Failed, Idle, Planning, Researching};
        if next == Failed {
            return !self.is_terminal();
        }
        matches!(
            (self, next),
            (Idle, Planning)
                | (Idle, Acting)
                | (Planning, Researching)
                | (Researching, Coding)
                | (Coding, Completed)
                | (Coding, Acting)
                | (Acting, Planning)
                | (Acting, Completed)
        )
    }
}

impl fmt::Display for AgentPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_task_path_is_allowed() {
        let path = [
            AgentPhase::Idle,
            AgentPhase::Planning,
            AgentPhase::Researching,
            AgentPhase::Coding,
            AgentPhase::Completed,
        ];
        for pair in path.windows(2) {
            assert!(pair[0].can_transition_to(pair[1]), "{} -> {}", pair[0], pair[1]);
        }
    }

    #[test]
    fn skipping_phases_is_rejected() {
        assert!(!AgentPhase::Idle.can_transition_to(AgentPhase::Coding));
        assert!(!AgentPhase::Planning.can_transition_to(AgentPhase::Completed));
        assert!(!AgentPhase::Researching.can_transition_to(AgentPhase::Acting));
    }

    #[test]
    fn terminal_phases_do_not_move() {
        assert!(!AgentPhase::Completed.can_transition_to(AgentPhase::Failed));
        assert!(!AgentPhase::Failed.can_transition_to(AgentPhase::Planning));
        assert!(AgentPhase::Acting.can_transition_to(AgentPhase::Failed));
    }
}
