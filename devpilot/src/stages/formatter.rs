//! Formatter stage.

use serde_json::{Value, json};

use crate::core::response::Rejection;
use crate::core::stage::StageName;
use crate::stages::Stage;

/// Summarizes raw page text captured during research.
pub struct FormatterStage<'a> {
    pub raw_text: &'a str,
}

impl Stage for FormatterStage<'_> {
    type Output = String;

    const NAME: StageName = StageName::Formatter;

    fn context(&self) -> Value {
        json!({ "raw_text": self.raw_text })
    }

    fn validate(&self, raw: &str) -> Result<String, Rejection> {
        let text = raw.trim();
        if text.is_empty() {
            return Err(Rejection::new("empty summary"));
        }
        Ok(text.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_blank_summary() {
        let stage = FormatterStage { raw_text: "page" };
        assert!(stage.validate(" \n ").is_err());
        assert_eq!(stage.validate("  summary \n").expect("valid"), "summary");
    }
}
