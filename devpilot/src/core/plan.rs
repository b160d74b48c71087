//! Planner response grammar.
//!
//! The planner answers in labeled free text rather than JSON:
//!
//! ```text
//! Project Name: Todo App
//! Your Reply to the Human Prompter: Sure, building it now
//! Current Focus: task list CRUD
//! Plan:
//! - [ ] Step 1: scaffold project
//! - [ ] Step 2: add persistence
//!   using sqlite
//! Summary: ```Build a todo app```
//! ```
//!
//! Parsing is a small state machine: a header line opens its section, step
//! lines inside `Plan:` open a step, and any other non-blank line continues
//! whatever is open (joined with a single space). Continuation lines after
//! `Project Name:` and before any step are dropped. Blank lines are skipped.
//! Missing headers leave their fields empty; callers decide whether that is
//! acceptable via [`Plan::missing_sections`].

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// How strictly planner output is checked before the plan is accepted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlannerMode {
    /// Missing headers leave fields empty.
    #[default]
    Lenient,
    /// A plan must name its project and contain at least one step.
    Strict,
}

/// A section header recognized by the planner grammar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum PlanSection {
    Project,
    Reply,
    Focus,
    Plans,
    Summary,
}

impl PlanSection {
    const ALL: [PlanSection; 5] = [
        PlanSection::Project,
        PlanSection::Reply,
        PlanSection::Focus,
        PlanSection::Plans,
        PlanSection::Summary,
    ];

    pub fn header(self) -> &'static str {
        match self {
            PlanSection::Project => "Project Name:",
            PlanSection::Reply => "Your Reply to the Human Prompter:",
            PlanSection::Focus => "Current Focus:",
            PlanSection::Plans => "Plan:",
            PlanSection::Summary => "Summary:",
        }
    }
}

/// Parsed planner output.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Plan {
    pub project: String,
    pub reply: String,
    pub focus: String,
    /// Plan steps keyed (and therefore ordered) by step number.
    pub plans: BTreeMap<u32, String>,
    pub summary: String,
    /// Headers encountered, in response order.
    pub headers: Vec<PlanSection>,
    /// The response text the plan was parsed from.
    pub raw: String,
}

impl Plan {
    /// Sections whose header never appeared in the response.
    pub fn missing_sections(&self) -> Vec<PlanSection> {
        PlanSection::ALL
            .into_iter()
            .filter(|section| !self.headers.contains(section))
            .collect()
    }
}

const STEP_PREFIX: &str = "- [ ] Step ";
const FENCE: &str = "```";

/// Parse planner text. Never fails; see module docs for the tolerated shapes.
pub fn parse_plan(raw: &str) -> Plan {
    let mut plan = Plan {
        raw: raw.to_string(),
        ..Plan::default()
    };
    let mut section: Option<PlanSection> = None;
    let mut current_step: Option<u32> = None;

    for line in raw.lines() {
        let line = line.trim();
        if let Some((header, rest)) = split_header(line) {
            section = Some(header);
            plan.headers.push(header);
            match header {
                PlanSection::Project => plan.project = rest.to_string(),
                PlanSection::Reply => plan.reply = rest.to_string(),
                PlanSection::Focus => plan.focus = rest.to_string(),
                PlanSection::Plans => current_step = None,
                PlanSection::Summary => plan.summary = rest.replace(FENCE, "").trim().to_string(),
            }
            continue;
        }
        if line.is_empty() {
            continue;
        }
        match section {
            Some(PlanSection::Reply) => append(&mut plan.reply, line),
            Some(PlanSection::Focus) => append(&mut plan.focus, line),
            Some(PlanSection::Plans) => {
                if let Some((number, text)) = step_line(line) {
                    current_step = Some(number);
                    plan.plans.insert(number, text.to_string());
                } else if let Some(step) = current_step.and_then(|n| plan.plans.get_mut(&n)) {
                    append(step, line);
                }
            }
            Some(PlanSection::Summary) => append(&mut plan.summary, &line.replace(FENCE, "")),
            Some(PlanSection::Project) | None => {}
        }
    }
    plan
}

fn split_header(line: &str) -> Option<(PlanSection, &str)> {
    PlanSection::ALL.into_iter().find_map(|section| {
        line.strip_prefix(section.header())
            .map(|rest| (section, rest.trim()))
    })
}

fn step_line(line: &str) -> Option<(u32, &str)> {
    let rest = line.strip_prefix(STEP_PREFIX)?;
    let (number, text) = rest.split_once(':')?;
    let number = number.trim().parse().ok()?;
    Some((number, text.trim()))
}

fn append(target: &mut String, text: &str) {
    let text = text.trim();
    if text.is_empty() {
        return;
    }
    if !target.is_empty() {
        target.push(' ');
    }
    target.push_str(text);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_todo_app_plan() {
        let raw = "Project Name: Todo App\nYour Reply to the Human Prompter: Sure, building it now\nCurrent Focus: task list CRUD\nPlan:\n- [ ] Step 1: scaffold project\nSummary: ```Build a todo app```";
        let plan = parse_plan(raw);
        assert_eq!(plan.project, "Todo App");
        assert_eq!(plan.reply, "Sure, building it now");
        assert_eq!(plan.focus, "task list CRUD");
        assert_eq!(plan.plans, BTreeMap::from([(1, "scaffold project".to_string())]));
        assert_eq!(plan.summary, "Build a todo app");
        assert!(plan.missing_sections().is_empty());
        assert_eq!(plan.raw, raw);
    }

    #[test]
    fn continuation_lines_join_open_section() {
        let raw = "Your Reply to the Human Prompter: Sure\nI will start now\nPlan:\n- [ ] Step 1: scaffold\n  the project layout\n- [ ] Step 2: write tests\nSummary:\n```\nA short\nsummary\n```";
        let plan = parse_plan(raw);
        assert_eq!(plan.reply, "Sure I will start now");
        assert_eq!(plan.plans[&1], "scaffold the project layout");
        assert_eq!(plan.plans[&2], "write tests");
        assert_eq!(plan.summary, "A short summary");
    }

    #[test]
    fn out_of_order_steps_are_ordered_by_number() {
        let raw = "Plan:\n- [ ] Step 3: deploy\n- [ ] Step 1: build\n- [ ] Step 2: test";
        let plan = parse_plan(raw);
        let steps: Vec<u32> = plan.plans.keys().copied().collect();
        assert_eq!(steps, vec![1, 2, 3]);
    }

    #[test]
    fn malformed_step_number_continues_previous_step() {
        let raw = "Plan:\n- [ ] Step 1: build\n- [ ] Step two: test";
        let plan = parse_plan(raw);
        assert_eq!(plan.plans.len(), 1);
        assert_eq!(plan.plans[&1], "build - [ ] Step two: test");
    }

    #[test]
    fn missing_headers_yield_empty_plan() {
        let plan = parse_plan("I think we should build a todo app.\nIt will be great.");
        assert!(plan.project.is_empty());
        assert!(plan.plans.is_empty());
        assert!(plan.headers.is_empty());
        assert_eq!(plan.missing_sections().len(), 5);
    }

    #[test]
    fn reports_partially_missing_sections() {
        let plan = parse_plan("Project Name: Demo\nPlan:\n- [ ] Step 1: go");
        assert_eq!(
            plan.missing_sections(),
            vec![PlanSection::Reply, PlanSection::Focus, PlanSection::Summary]
        );
    }

    #[test]
    fn project_continuation_lines_are_dropped() {
        let plan = parse_plan("Project Name: Demo\nextra words\nCurrent Focus: ui");
        assert_eq!(plan.project, "Demo");
        assert_eq!(plan.focus, "ui");
    }
}
