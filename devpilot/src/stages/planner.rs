//! Planner stage: turns the user's request into a named, step-by-step plan.

use serde_json::{Value, json};

use crate::core::plan::{Plan, PlannerMode, parse_plan};
use crate::core::response::Rejection;
use crate::core::stage::StageName;
use crate::stages::Stage;

/// Turns a user request into a labeled step-by-step plan.
pub struct PlannerStage<'a> {
    pub prompt: &'a str,
    pub mode: PlannerMode,
}

impl Stage for PlannerStage<'_> {
    type Output = Plan;

    const NAME: StageName = StageName::Planner;

    fn context(&self) -> Value {
        json!({ "prompt": self.prompt })
    }

    fn validate(&self, raw: &str) -> Result<Plan, Rejection> {
        let plan = parse_plan(raw);
        if self.mode == PlannerMode::Strict {
            if plan.project.trim().is_empty() {
                return Err(Rejection::new("plan is missing a Project Name"));
            }
            if plan.plans.is_empty() {
                return Err(Rejection::new("plan has no steps"));
            }
        }
        Ok(plan)
    }
}
