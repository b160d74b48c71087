//! Action stage: classifies a follow-up prompt into one action.

use std::sync::LazyLock;

use jsonschema::Validator;
use serde::Deserialize;
use serde_json::{Value, json};

use crate::core::action::FollowUpAction;
use crate::core::response::{Rejection, compile_schema, parse_typed_response};
use crate::core::stage::StageName;
use crate::stages::Stage;

static SCHEMA: LazyLock<Validator> = LazyLock::new(|| {
    compile_schema(include_str!("../../schemas/action.schema.json"))
        .expect("action schema should be valid")
});

/// What to do with a follow-up message, plus the reply announcing it.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ActionChoice {
    pub response: String,
    pub action: FollowUpAction,
}

pub struct ActionStage<'a> {
    pub conversation: &'a [String],
}

impl Stage for ActionStage<'_> {
    type Output = ActionChoice;

    const NAME: StageName = StageName::Action;

    fn context(&self) -> Value {
        json!({ "conversation": self.conversation })
    }

    fn validate(&self, raw: &str) -> Result<ActionChoice, Rejection> {
        parse_typed_response(raw, &SCHEMA)
    }
}
