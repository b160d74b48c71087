//! Internal monologue stage: a short first-person status line.

use std::sync::LazyLock;

use jsonschema::Validator;
use serde::Deserialize;
use serde_json::{Value, json};

use crate::core::response::{Rejection, compile_schema, parse_typed_response};
use crate::core::stage::StageName;
use crate::stages::Stage;

static SCHEMA: LazyLock<Validator> = LazyLock::new(|| {
    compile_schema(include_str!("../../schemas/internal_monologue.schema.json"))
        .expect("internal monologue schema should be valid")
});

#[derive(Deserialize)]
struct Monologue {
    internal_monologue: String,
}

/// A one-line inner thought shown while the agent works.
pub struct MonologueStage<'a> {
    pub current_prompt: &'a str,
}

impl Stage for MonologueStage<'_> {
    type Output = String;

    const NAME: StageName = StageName::InternalMonologue;

    fn context(&self) -> Value {
        json!({ "current_prompt": self.current_prompt })
    }

    fn validate(&self, raw: &str) -> Result<String, Rejection> {
        let monologue: Monologue = parse_typed_response(raw, &SCHEMA)?;
        let text = monologue.internal_monologue.trim();
        if text.is_empty() {
            return Err(Rejection::new("empty internal_monologue"));
        }
        Ok(text.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_monologue() {
        let stage = MonologueStage { current_prompt: "plan" };
        let text = stage
            .validate("```\n{\"internal_monologue\": \"Let me scaffold the app.\"}\n```")
            .expect("valid");
        assert_eq!(text, "Let me scaffold the app.");
    }

    #[test]
    fn rejects_blank_or_missing_monologue() {
        let stage = MonologueStage { current_prompt: "plan" };
        assert!(stage.validate("{\"internal_monologue\": \"   \"}").is_err());
        assert!(stage.validate("{\"thought\": \"x\"}").is_err());
    }
}
