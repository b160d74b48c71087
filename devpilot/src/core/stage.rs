use std::fmt;

use serde::{Deserialize, Serialize};

/// Every model-backed stage the agent runs. The name doubles as the prompt template key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageName {
    Planner,
    Researcher,
    Decision,
    Coder,
    Feature,
    Patcher,
    Formatter,
    InternalMonologue,
    Answer,
    Runner,
    Reporter,
    Action,
}

impl StageName {
    pub const ALL: [StageName; 12] = [
        StageName::Planner,
        StageName::Researcher,
        StageName::Decision,
        StageName::Coder,
        StageName::Feature,
        StageName::Patcher,
        StageName::Formatter,
        StageName::InternalMonologue,
        StageName::Answer,
        StageName::Runner,
        StageName::Reporter,
        StageName::Action,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            StageName::Planner => "planner",
            StageName::Researcher => "researcher",
            StageName::Decision => "decision",
            StageName::Coder => "coder",
            StageName::Feature => "feature",
            StageName::Patcher => "patcher",
            StageName::Formatter => "formatter",
            StageName::InternalMonologue => "internal_monologue",
            StageName::Answer => "answer",
            StageName::Runner => "runner",
            StageName::Reporter => "reporter",
            StageName::Action => "action",
        }
    }
}

impl fmt::Display for StageName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
