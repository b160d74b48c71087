//! Decision stage: an ordered list of function calls for decision mode.

use std::sync::LazyLock;

use jsonschema::Validator;
use serde_json::{Value, json};

use crate::core::decision::{DecisionCall, DecisionFunction, UnknownFunctionPolicy};
use crate::core::response::{Rejection, compile_schema, parse_typed_response};
use crate::core::stage::StageName;
use crate::stages::Stage;

static SCHEMA: LazyLock<Validator> = LazyLock::new(|| {
    compile_schema(include_str!("../../schemas/decision.schema.json"))
        .expect("decision schema should be valid")
});

/// Chooses an ordered list of function calls for a request.
pub struct DecisionStage<'a> {
    pub prompt: &'a str,
    pub policy: UnknownFunctionPolicy,
}

impl Stage for DecisionStage<'_> {
    type Output = Vec<DecisionCall>;

    const NAME: StageName = StageName::Decision;

    fn context(&self) -> Value {
        json!({ "prompt": self.prompt })
    }

    fn validate(&self, raw: &str) -> Result<Vec<DecisionCall>, Rejection> {
        let calls: Vec<DecisionCall> = parse_typed_response(raw, &SCHEMA)?;
        if self.policy == UnknownFunctionPolicy::Reject {
            for call in &calls {
                DecisionFunction::from_call(call).map_err(|gap| Rejection::new(gap.to_string()))?;
            }
        }
        Ok(calls)
    }
}
