//! Follow-up actions the agent can take on an existing project.

use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FollowUpAction {
    Answer,
    Run,
    Deploy,
    Feature,
    Bug,
    Report,
}

impl FollowUpAction {
    pub const ALL: [FollowUpAction; 6] = [
        FollowUpAction::Answer,
        FollowUpAction::Run,
        FollowUpAction::Deploy,
        FollowUpAction::Feature,
        FollowUpAction::Bug,
        FollowUpAction::Report,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            FollowUpAction::Answer => "answer",
            FollowUpAction::Run => "run",
            FollowUpAction::Deploy => "deploy",
            FollowUpAction::Feature => "feature",
            FollowUpAction::Bug => "bug",
            FollowUpAction::Report => "report",
        }
    }
}

impl fmt::Display for FollowUpAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serde_names_match_display() {
        for action in FollowUpAction::ALL {
            let encoded = serde_json::to_string(&action).expect("serialize");
            assert_eq!(encoded, format!("\"{action}\""));
        }
    }

    #[test]
    fn unknown_action_does_not_deserialize() {
        assert!(serde_json::from_str::<FollowUpAction>("\"dance\"").is_err());
    }
}
