//! Answer stage.

use std::sync::LazyLock;

use jsonschema::Validator;
use serde::Deserialize;
use serde_json::{Value, json};

use crate::core::response::{Rejection, compile_schema, parse_typed_response};
use crate::core::stage::StageName;
use crate::stages::Stage;

static SCHEMA: LazyLock<Validator> = LazyLock::new(|| {
    compile_schema(include_str!("../../schemas/answer.schema.json"))
        .expect("answer schema should be valid")
});

#[derive(Deserialize)]
struct Answer {
    response: String,
}

/// Answers a question about the project.
pub struct AnswerStage<'a> {
    pub conversation: &'a [String],
    pub code_markdown: &'a str,
}

impl Stage for AnswerStage<'_> {
    type Output = String;

    const NAME: StageName = StageName::Answer;

    fn context(&self) -> Value {
        json!({
            "conversation": self.conversation,
            "code_markdown": self.code_markdown,
        })
    }

    fn validate(&self, raw: &str) -> Result<String, Rejection> {
        let answer: Answer = parse_typed_response(raw, &SCHEMA)?;
        Ok(answer.response.trim().to_string())
    }
}
