//! Code-bearing stages: fresh code, features and patches.
//!
//! All three answer in the `~~~` / `File:` grammar from
//! [`crate::core::code_blocks`].

use serde_json::{Value, json};

use crate::core::code_blocks::parse_code_blocks;
use crate::core::response::Rejection;
use crate::core::stage::StageName;
use crate::core::types::{CodeFile, SearchResult};
use crate::stages::Stage;

/// Writes a new project from a plan and research notes.
pub struct CoderStage<'a> {
    /// Raw planner response.
    pub plan: &'a str,
    pub user_context: &'a str,
    pub search_results: &'a [SearchResult],
}

impl Stage for CoderStage<'_> {
    type Output = Vec<CodeFile>;

    const NAME: StageName = StageName::Coder;

    fn context(&self) -> Value {
        json!({
            "step_by_step_plan": self.plan,
            "user_context": self.user_context,
            "search_results": self.search_results,
        })
    }

    fn validate(&self, raw: &str) -> Result<Vec<CodeFile>, Rejection> {
        parse_code_blocks(raw)
    }
}

/// Extends an existing project.
pub struct FeatureStage<'a> {
    pub conversation: &'a [String],
    pub code_markdown: &'a str,
    pub system_os: &'a str,
}

impl Stage for FeatureStage<'_> {
    type Output = Vec<CodeFile>;

    const NAME: StageName = StageName::Feature;

    fn context(&self) -> Value {
        json!({
            "conversation": self.conversation,
            "code_markdown": self.code_markdown,
            "system_os": self.system_os,
        })
    }

    fn validate(&self, raw: &str) -> Result<Vec<CodeFile>, Rejection> {
        parse_code_blocks(raw)
    }
}

/// Fixes a reported error in an existing project.
pub struct PatcherStage<'a> {
    pub conversation: &'a [String],
    pub code_markdown: &'a str,
    pub error: &'a str,
    pub system_os: &'a str,
}

impl Stage for PatcherStage<'_> {
    type Output = Vec<CodeFile>;

    const NAME: StageName = StageName::Patcher;

    fn context(&self) -> Value {
        json!({
            "conversation": self.conversation,
            "code_markdown": self.code_markdown,
            "error": self.error,
            "system_os": self.system_os,
        })
    }

    fn validate(&self, raw: &str) -> Result<Vec<CodeFile>, Rejection> {
        parse_code_blocks(raw)
    }
}
