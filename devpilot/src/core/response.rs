//! Shared helpers for turning raw model text into validated JSON.

use std::fmt;

use anyhow::{Context, Result};
use jsonschema::{Draft, Validator};
use serde::de::DeserializeOwned;
use serde_json::Value;

/// Why a model response was refused by a stage validator.
///
/// A rejection is never surfaced to the user directly; the stage executor logs
/// it and asks the model again.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rejection {
    reason: String,
}

impl Rejection {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }

    pub fn reason(&self) -> &str {
        &self.reason
    }
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.reason)
    }
}

impl std::error::Error for Rejection {}

/// Remove a surrounding triple-backtick fence and a `json` language tag.
pub fn strip_code_fence(raw: &str) -> String {
    let text = raw.trim().replace("```json", "```");
    if text.len() >= 6 && text.starts_with("```") && text.ends_with("```") {
        return text[3..text.len() - 3].trim().to_string();
    }
    text
}

/// Compile an embedded JSON Schema (Draft 2020-12).
pub fn compile_schema(raw: &str) -> Result<Validator> {
    let schema: Value = serde_json::from_str(raw).context("parse json schema")?;
    jsonschema::options()
        .with_draft(Draft::Draft202012)
        .build(&schema)
        .context("compile json schema")
}

/// Strip fences, parse JSON and check it against `schema`.
pub fn parse_json_response(raw: &str, schema: &Validator) -> Result<Value, Rejection> {
    let body = strip_code_fence(raw);
    let value: Value =
        serde_json::from_str(&body).map_err(|err| Rejection::new(format!("invalid json: {err}")))?;
    let violations: Vec<String> = schema
        .iter_errors(&value)
        .map(|err| err.to_string())
        .collect();
    if !violations.is_empty() {
        return Err(Rejection::new(format!(
            "schema violations: {}",
            violations.join("; ")
        )));
    }
    Ok(value)
}

/// [`parse_json_response`] followed by deserialization into `T`.
pub fn parse_typed_response<T: DeserializeOwned>(
    raw: &str,
    schema: &Validator,
) -> Result<T, Rejection> {
    let value = parse_json_response(raw, schema)?;
    serde_json::from_value(value).map_err(|err| Rejection::new(format!("unexpected shape: {err}")))
}
