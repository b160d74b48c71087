//! Prompt rendering for every stage.

use anyhow::{Context, Result};
use minijinja::Environment;
use serde_json::Value;
use tracing::debug;

use crate::core::stage::StageName;

pub trait PromptRenderer: Send + Sync {
    /// Render the prompt for `stage` from its context object.
    fn render(&self, stage: StageName, context: &Value) -> Result<String>;
}

const TEMPLATES: [(StageName, &str); 12] = [
    (StageName::Planner, include_str!("prompts/planner.md")),
    (StageName::Researcher, include_str!("prompts/researcher.md")),
    (StageName::Decision, include_str!("prompts/decision.md")),
    (StageName::Coder, include_str!("prompts/coder.md")),
    (StageName::Feature, include_str!("prompts/feature.md")),
    (StageName::Patcher, include_str!("prompts/patcher.md")),
    (StageName::Formatter, include_str!("prompts/formatter.md")),
    (
        StageName::InternalMonologue,
        include_str!("prompts/internal_monologue.md"),
    ),
    (StageName::Answer, include_str!("prompts/answer.md")),
    (StageName::Runner, include_str!("prompts/runner.md")),
    (StageName::Reporter, include_str!("prompts/reporter.md")),
    (StageName::Action, include_str!("prompts/action.md")),
];

/// Embedded minijinja templates, one per stage.
pub struct TemplateRenderer {
    env: Environment<'static>,
}

impl TemplateRenderer {
    pub fn new() -> Self {
        let mut env = Environment::new();
        for (stage, source) in TEMPLATES {
            env.add_template(stage.as_str(), source)
                .expect("embedded prompt template should be valid");
        }
        Self { env }
    }
}

impl Default for TemplateRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl PromptRenderer for TemplateRenderer {
    fn render(&self, stage: StageName, context: &Value) -> Result<String> {
        let template = self
            .env
            .get_template(stage.as_str())
            .with_context(|| format!("load {stage} template"))?;
        let rendered = template
            .render(context)
            .with_context(|| format!("render {stage} template"))?;
        debug!(stage = %stage, bytes = rendered.len(), "rendered prompt");
        Ok(rendered)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn every_stage_has_a_template() {
        let renderer = TemplateRenderer::new();
        for stage in StageName::ALL {
            renderer
                .render(stage, &json!({}))
                .unwrap_or_else(|err| panic!("{stage}: {err:#}"));
        }
    }

    #[test]
    fn planner_prompt_includes_request() {
        let renderer = TemplateRenderer::new();
        let prompt = renderer
            .render(StageName::Planner, &json!({"prompt": "build a todo app"}))
            .expect("render");
        assert!(prompt.contains("build a todo app"));
        assert!(prompt.contains("Project Name:"));
    }

    #[test]
    fn coder_prompt_lists_search_results() {
        let renderer = TemplateRenderer::new();
        let prompt = renderer
            .render(
                StageName::Coder,
                &json!({
                    "step_by_step_plan": "Plan:\n- [ ] Step 1: scaffold",
                    "user_context": "",
                    "search_results": [
                        {"query": "flask routing", "link": "https://example.com/flask", "summary": "Use @app.route"}
                    ]
                }),
            )
            .expect("render");
        assert!(prompt.contains("### flask routing"));
        assert!(prompt.contains("Use @app.route"));
        assert!(!prompt.contains("Notes for the user"));
    }

    #[test]
    fn conversation_lines_render_in_order() {
        let renderer = TemplateRenderer::new();
        let prompt = renderer
            .render(
                StageName::Action,
                &json!({"conversation": ["User: hi", "Agent: hello"]}),
            )
            .expect("render");
        let user = prompt.find("User: hi").expect("user line");
        let agent = prompt.find("Agent: hello").expect("agent line");
        assert!(user < agent);
    }
}
