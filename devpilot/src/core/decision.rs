//! Decision-mode records and the closed set of functions they may name.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

/// One record produced by the decision stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionCall {
    pub function: String,
    pub args: Map<String, Value>,
    pub reply: String,
}

/// A decision record resolved against the functions the agent can run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecisionFunction {
    GitClone { url: String },
    GeneratePdfDocument { user_prompt: String },
    BrowserInteraction { user_prompt: String },
    CodingProject { user_prompt: String },
}

/// Why a decision record could not be dispatched.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DispatchGap {
    #[error("unknown function {0:?}")]
    UnknownFunction(String),
    #[error("function {function:?} is missing argument {arg:?}")]
    MissingArgument { function: String, arg: &'static str },
}

impl DecisionFunction {
    pub fn from_call(call: &DecisionCall) -> Result<Self, DispatchGap> {
        let arg = |name: &'static str| string_arg(call, name);
        match call.function.as_str() {
            "git_clone" => Ok(Self::GitClone { url: arg("url")? }),
            "generate_pdf_document" => Ok(Self::GeneratePdfDocument {
                user_prompt: arg("user_prompt")?,
            }),
            "browser_interaction" => Ok(Self::BrowserInteraction {
                user_prompt: arg("user_prompt")?,
            }),
            "coding_project" => Ok(Self::CodingProject {
                user_prompt: arg("user_prompt")?,
            }),
            other => Err(DispatchGap::UnknownFunction(other.to_string())),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::GitClone { .. } => "git_clone",
            Self::GeneratePdfDocument { .. } => "generate_pdf_document",
            Self::BrowserInteraction { .. } => "browser_interaction",
            Self::CodingProject { .. } => "coding_project",
        }
    }
}

fn string_arg(call: &DecisionCall, name: &'static str) -> Result<String, DispatchGap> {
    call.args
        .get(name)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
        .ok_or_else(|| DispatchGap::MissingArgument {
            function: call.function.clone(),
            arg: name,
        })
}

/// How decision records naming unknown functions (or lacking arguments) are handled.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UnknownFunctionPolicy {
    /// Drop the record silently.
    Ignore,
    /// Drop the record and tell the user.
    #[default]
    Report,
    /// Refuse the whole response so the model answers again.
    Reject,
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn call(function: &str, args: Value) -> DecisionCall {
        DecisionCall {
            function: function.to_string(),
            args: args.as_object().cloned().unwrap_or_default(),
            reply: "ok".to_string(),
        }
    }

    #[test]
    fn resolves_known_functions() {
        let resolved =
            DecisionFunction::from_call(&call("coding_project", json!({"user_prompt": "build X"})))
                .expect("resolve");
        assert_eq!(
            resolved,
            DecisionFunction::CodingProject {
                user_prompt: "build X".to_string()
            }
        );
        let clone = DecisionFunction::from_call(&call("git_clone", json!({"url": "https://x/y.git"})))
            .expect("resolve");
        assert_eq!(clone.name(), "git_clone");
    }

    #[test]
    fn unknown_function_is_a_gap() {
        let gap = DecisionFunction::from_call(&call("launch_rocket", json!({}))).unwrap_err();
        assert_eq!(gap, DispatchGap::UnknownFunction("launch_rocket".to_string()));
    }

    #[test]
    fn missing_or_blank_argument_is_a_gap() {
        let gap = DecisionFunction::from_call(&call("git_clone", json!({"repo": "x"}))).unwrap_err();
        assert!(matches!(gap, DispatchGap::MissingArgument { arg: "url", .. }));
        let gap = DecisionFunction::from_call(&call("browser_interaction", json!({"user_prompt": "  "})))
            .unwrap_err();
        assert!(gap.to_string().contains("user_prompt"));
    }

    #[test]
    fn policy_defaults_to_report() {
        assert_eq!(UnknownFunctionPolicy::default(), UnknownFunctionPolicy::Report);
        let parsed: UnknownFunctionPolicy = serde_json::from_str("\"reject\"").expect("parse");
        assert_eq!(parsed, UnknownFunctionPolicy::Reject);
    }
}
