//! End-to-end agent lifecycle over a scripted model.
//!
//! One workspace goes through a new task, follow-ups and decision mode; the
//! state trace and conversation are checked after each step.

use devpilot::agent::COMPLETED_MESSAGE;
use devpilot::core::project::ProjectId;
use devpilot::core::types::Origin;
use devpilot::io::broadcast::{AGENT_STATE, SERVER_MESSAGE};
use devpilot::io::state_log::decode_snapshots;
use devpilot::test_support::{
    TestWorkspace, action_response, answer_response, code_response, decision_response,
    monologue_response, plan_response, research_response, runner_response,
};
use serde_json::json;

#[test]
fn project_lifecycle_from_prompt_to_follow_ups() {
    let ws = TestWorkspace::new(vec![
        // execute
        plan_response("Todo App", "task list", &["scaffold", "add storage"]),
        monologue_response("Scaffolding first."),
        research_response(&["python todo"], ""),
        "Store todos in a JSON file.".to_string(),
        code_response(&[("todo.py", "print('todo')")]),
        // follow-up: answer
        action_response("answer", "Sure."),
        answer_response("Todos live in todos.json."),
        // follow-up: run
        action_response("run", "Running."),
        runner_response(&["python todo.py"]),
        // decision
        decision_response(&[("coding_project", json!({"user_prompt": "add tests"}), "Adding tests.")]),
        plan_response("Todo App", "tests", &["write tests"]),
        research_response(&[], ""),
        code_response(&[("test_todo.py", "def test(): pass")]),
    ]);

    let outcome = ws.agent.execute("build a todo app", None).expect("execute");
    let project = outcome.project;
    assert_eq!(project, ProjectId::new("Todo App").expect("id"));

    ws.agent
        .subsequent_execute("where are todos stored?", "Todo App")
        .expect("answer follow-up");
    ws.agent.subsequent_execute("run it", "Todo App").expect("run follow-up");
    let decision = ws.agent.make_decision("add tests", "Todo App").expect("decision");
    assert_eq!(decision.executed, vec!["coding_project"]);
    assert_eq!(ws.inference.remaining(), 0);

    assert_eq!(ws.commands.executed(), vec!["python todo.py"]);
    let dir = ws.agent.files().project_dir(&project);
    assert!(dir.join("todo.py").is_file());
    assert!(dir.join("test_todo.py").is_file());

    let messages = ws.agent.conversation().read_all(&project).expect("messages");
    let user_prompts: Vec<&str> = messages
        .iter()
        .filter(|m| m.origin == Origin::User)
        .map(|m| m.text.as_str())
        .collect();
    assert_eq!(
        user_prompts,
        vec!["build a todo app", "where are todos stored?", "run it", "add tests"]
    );
    let completions = messages.iter().filter(|m| m.text == COMPLETED_MESSAGE).count();
    assert_eq!(completions, 4);

    let snapshots = ws.agent.state().read_all(&project).expect("state");
    let last = snapshots.last().expect("last");
    assert!(last.completed);
    assert!(!last.agent_is_active);
    let steps: Vec<&str> = snapshots.iter().filter_map(|s| s.step.as_deref()).collect();
    for phase in ["planning", "researching", "coding", "acting"] {
        assert!(steps.contains(&phase), "missing {phase} snapshot");
    }

    // Every state change was broadcast with the full list; the last one
    // matches what is on disk.
    let state_events = ws.broadcaster.channel_events(AGENT_STATE);
    let broadcast = decode_snapshots(state_events.last().expect("state event")).expect("decode");
    assert_eq!(broadcast, snapshots);
    assert_eq!(ws.broadcaster.channel_events(SERVER_MESSAGE).len(), messages.len());
}

#[test]
fn failed_follow_up_leaves_project_usable() {
    let ws = TestWorkspace::new(vec![
        action_response("deploy", "Deploying."),
        action_response("answer", "Sure."),
        answer_response("It is a todo app."),
    ]);
    ws.deployer.fail_with("provider offline");

    let err = ws.agent.subsequent_execute("deploy it", "Todo App").unwrap_err();
    assert!(format!("{err:#}").contains("provider offline"));
    let project = ProjectId::new("Todo App").expect("id");
    assert!(!ws.agent.state().is_agent_active(&project).expect("active"));
    assert!(!ws.agent.state().is_agent_completed(&project).expect("completed"));

    ws.agent
        .subsequent_execute("what is this?", "Todo App")
        .expect("second follow-up");
    assert!(ws.agent.state().is_agent_completed(&project).expect("completed"));
}
