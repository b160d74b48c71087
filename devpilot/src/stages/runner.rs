//! Runner stage: shell commands to run inside the project directory.

use std::sync::LazyLock;

use jsonschema::Validator;
use serde::Deserialize;
use serde_json::{Value, json};

use crate::core::response::{Rejection, compile_schema, parse_typed_response};
use crate::core::stage::StageName;
use crate::stages::Stage;

static SCHEMA: LazyLock<Validator> = LazyLock::new(|| {
    compile_schema(include_str!("../../schemas/runner.schema.json"))
        .expect("runner schema should be valid")
});

#[derive(Deserialize)]
struct RunCommands {
    commands: Vec<String>,
}

/// Proposes the shell commands that run the project.
pub struct RunnerStage<'a> {
    pub conversation: &'a [String],
    pub code_markdown: &'a str,
    pub system_os: &'a str,
}

impl Stage for RunnerStage<'_> {
    type Output = Vec<String>;

    const NAME: StageName = StageName::Runner;

    fn context(&self) -> Value {
        json!({
            "conversation": self.conversation,
            "code_markdown": self.code_markdown,
            "system_os": self.system_os,
        })
    }

    fn validate(&self, raw: &str) -> Result<Vec<String>, Rejection> {
        let run: RunCommands = parse_typed_response(raw, &SCHEMA)?;
        Ok(run
            .commands
            .into_iter()
            .map(|command| command.trim().to_string())
            .filter(|command| !command.is_empty())
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn drops_blank_commands() {
        let stage = RunnerStage {
            conversation: &[],
            code_markdown: "",
            system_os: "linux",
        };
        let commands = stage
            .validate("{\"commands\": [\"pip install flask\", \" \", \"python app.py\"]}")
            .expect("valid");
        assert_eq!(commands, vec!["pip install flask", "python app.py"]);
        assert!(stage.validate("{\"commands\": \"make\"}").is_err());
    }
}
