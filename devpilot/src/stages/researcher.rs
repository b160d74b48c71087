//! Researcher stage: picks search queries and an optional question for the user.

use std::sync::LazyLock;

use jsonschema::Validator;
use serde::Deserialize;
use serde_json::{Value, json};

use crate::core::response::{Rejection, compile_schema, parse_typed_response};
use crate::core::stage::StageName;
use crate::stages::Stage;

static SCHEMA: LazyLock<Validator> = LazyLock::new(|| {
    compile_schema(include_str!("../../schemas/researcher.schema.json"))
        .expect("researcher schema should be valid")
});

/// Search queries to run and an optional question for the user.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Research {
    pub queries: Vec<String>,
    pub ask_user: String,
}

pub struct ResearcherStage<'a> {
    /// Raw planner response.
    pub plan: &'a str,
    pub keywords: &'a [String],
}

impl Stage for ResearcherStage<'_> {
    type Output = Research;

    const NAME: StageName = StageName::Researcher;

    fn context(&self) -> Value {
        json!({
            "step_by_step_plan": self.plan,
            "contextual_keywords": self
                .keywords
                .iter()
                .map(|keyword| capitalize(keyword))
                .collect::<Vec<_>>()
                .join(", "),
        })
    }

    fn validate(&self, raw: &str) -> Result<Research, Rejection> {
        let research: Research = parse_typed_response(raw, &SCHEMA)?;
        Ok(Research {
            queries: research
                .queries
                .iter()
                .map(|query| query.trim().to_string())
                .filter(|query| !query.is_empty())
                .collect(),
            ask_user: research.ask_user.trim().to_string(),
        })
    }
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stage(keywords: &[String]) -> ResearcherStage<'_> {
        ResearcherStage {
            plan: "Plan:\n- [ ] Step 1: scaffold",
            keywords,
        }
    }

    #[test]
    fn parses_fenced_research() {
        let raw = "```json\n{\"queries\": [\" flask routing \", \"\"], \"ask_user\": \"\"}\n```";
        let research = stage(&[]).validate(raw).expect("valid");
        assert_eq!(research.queries, vec!["flask routing"]);
        assert!(research.ask_user.is_empty());
    }

    #[test]
    fn rejects_missing_keys() {
        assert!(stage(&[]).validate("{\"queries\": []}").is_err());
        assert!(stage(&[]).validate("{\"queries\": \"x\", \"ask_user\": \"\"}").is_err());
        assert!(stage(&[]).validate("I will search for flask").is_err());
    }

    #[test]
    fn context_capitalizes_keywords() {
        let keywords = vec!["task".to_string(), "crud".to_string()];
        let context = stage(&keywords).context();
        assert_eq!(context["contextual_keywords"], "Task, Crud");
    }
}
