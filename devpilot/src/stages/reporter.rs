//! Reporter stage: a markdown report between `~~~` delimiters.

use serde_json::{Value, json};

use crate::core::response::Rejection;
use crate::core::stage::StageName;
use crate::stages::Stage;

const DELIMITER: &str = "~~~";

/// Writes a markdown report about the project or a topic.
pub struct ReporterStage<'a> {
    pub conversation: &'a [String],
    pub code_markdown: &'a str,
}

impl Stage for ReporterStage<'_> {
    type Output = String;

    const NAME: StageName = StageName::Reporter;

    fn context(&self) -> Value {
        json!({
            "conversation": self.conversation,
            "code_markdown": self.code_markdown,
        })
    }

    /// Accepts any non-blank document; a wrapping `~~~` pair is removed.
    fn validate(&self, raw: &str) -> Result<String, Rejection> {
        let text = raw.trim();
        let body = match (text.find(DELIMITER), text.rfind(DELIMITER)) {
            (Some(first), Some(last)) if first < last => &text[first + DELIMITER.len()..last],
            _ => text,
        };
        let body = body.trim();
        if body.is_empty() {
            return Err(Rejection::new("empty report"));
        }
        Ok(body.to_string())
    }
}
