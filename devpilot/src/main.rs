//! `devpilot`: drive the agent from the command line.
//!
//! State lives under `.devpilot/` in the workspace root; generated projects
//! under the configured projects directory.

use std::path::PathBuf;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tokio::sync::broadcast::Receiver;
use tokio::sync::broadcast::error::RecvError;
use tracing::warn;

use devpilot::agent::Agent;
use devpilot::core::project::ProjectId;
use devpilot::exit_codes;
use devpilot::io::broadcast::{Broadcaster, ChannelBroadcaster, LiveEvent, NullBroadcaster};
use devpilot::io::init::{InitOptions, init_workspace};
use devpilot::logging;
use devpilot::workspace::Workspace;

#[derive(Parser)]
#[command(
    name = "devpilot",
    version,
    about = "Plan, research and write software projects with an LLM agent"
)]
struct Cli {
    /// Workspace root.
    #[arg(long, global = true, default_value = ".")]
    root: PathBuf,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Create `.devpilot/` with a default config.
    Init {
        /// Overwrite an existing config.
        #[arg(short, long)]
        force: bool,
    },
    /// Start a new task from a prompt.
    Execute {
        prompt: String,
        /// Project name; derived from the plan when omitted.
        #[arg(short, long)]
        project: Option<String>,
        /// Print live updates to stderr as JSON lines while the task runs.
        #[arg(long)]
        watch: bool,
    },
    /// Continue work on an existing project.
    FollowUp {
        #[arg(short, long)]
        project: String,
        prompt: String,
        #[arg(long)]
        watch: bool,
    },
    /// Let the model choose which functions to run for a prompt.
    Decide {
        #[arg(short, long)]
        project: String,
        prompt: String,
        #[arg(long)]
        watch: bool,
    },
    /// Print a project's state snapshots as JSON.
    State {
        #[arg(short, long)]
        project: String,
        /// Print only the current snapshot.
        #[arg(long)]
        latest: bool,
    },
    /// Print a project's conversation.
    Messages {
        #[arg(short, long)]
        project: String,
    },
    /// List generated projects.
    Projects,
}

fn main() {
    logging::init();
    let code = match run() {
        Ok(()) => exit_codes::OK,
        Err(err) => {
            eprintln!("{err:#}");
            exit_codes::for_error(&err)
        }
    };
    std::process::exit(code);
}

fn run() -> Result<()> {
    let cli = Cli::parse();
    let root = cli.root;
    match cli.command {
        Command::Init { force } => {
            let paths = init_workspace(&root, &InitOptions { force })?;
            println!("initialized {}", paths.devpilot_dir.display());
            Ok(())
        }
        Command::Execute {
            prompt,
            project,
            watch,
        } => with_agent(&root, watch, |agent| {
            let outcome = agent.execute(&prompt, project.as_deref())?;
            println!("{}: {}", outcome.project, outcome.message);
            Ok(())
        }),
        Command::FollowUp {
            project,
            prompt,
            watch,
        } => with_agent(&root, watch, |agent| {
            let outcome = agent.subsequent_execute(&prompt, &project)?;
            println!("{}: {}", outcome.project, outcome.message);
            Ok(())
        }),
        Command::Decide {
            project,
            prompt,
            watch,
        } => with_agent(&root, watch, |agent| {
            let outcome = agent.make_decision(&prompt, &project)?;
            for name in &outcome.executed {
                println!("ran {name}");
            }
            for gap in &outcome.skipped {
                println!("skipped: {gap}");
            }
            Ok(())
        }),
        Command::State { project, latest } => {
            let workspace = Workspace::open(&root)?;
            let project = ProjectId::new(&project)?;
            let state = workspace.state_log(Arc::new(NullBroadcaster));
            let rendered = if latest {
                let current = state
                    .latest(&project)?
                    .with_context(|| format!("no state recorded for project {project}"))?;
                serde_json::to_string_pretty(&current).context("serialize state")?
            } else {
                serde_json::to_string_pretty(&state.read_all(&project)?)
                    .context("serialize state")?
            };
            println!("{rendered}");
            Ok(())
        }
        Command::Messages { project } => {
            let workspace = Workspace::open(&root)?;
            let project = ProjectId::new(&project)?;
            let conversation = workspace.conversation_log(Arc::new(NullBroadcaster));
            for line in conversation.read_formatted(&project)? {
                println!("{line}");
            }
            Ok(())
        }
        Command::Projects => {
            let workspace = Workspace::open(&root)?;
            for slug in workspace.project_files().list_projects()? {
                println!("{slug}");
            }
            Ok(())
        }
    }
}

/// Build an agent for the workspace at `root` and run `task` with it.
///
/// With `watch`, live updates are printed to stderr until the agent is dropped.
fn with_agent(
    root: &std::path::Path,
    watch: bool,
    task: impl FnOnce(&Agent) -> Result<()>,
) -> Result<()> {
    let workspace = Workspace::open(root)?;
    let channel = Arc::new(ChannelBroadcaster::new(workspace.config.broadcast.capacity));
    let printer = watch.then(|| spawn_printer(channel.subscribe()));

    let broadcaster: Arc<dyn Broadcaster> = channel;
    let agent = workspace.build_agent(broadcaster);
    let result = task(&agent);

    // The printer exits once every sender is gone.
    drop(agent);
    if let Some(printer) = printer
        && printer.join().is_err()
    {
        warn!("live update printer panicked");
    }
    result
}

fn spawn_printer(mut receiver: Receiver<LiveEvent>) -> JoinHandle<()> {
    thread::spawn(move || {
        loop {
            match receiver.blocking_recv() {
                Ok(event) => match serde_json::to_string(&event) {
                    Ok(line) => eprintln!("{line}"),
                    Err(err) => warn!(err = %err, "failed to serialize live update"),
                },
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "live update printer fell behind");
                }
                Err(RecvError::Closed) => break,
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_execute_with_project() {
        let cli = Cli::parse_from(["devpilot", "execute", "build a todo app", "--project", "Todo"]);
        match cli.command {
            Command::Execute {
                prompt,
                project,
                watch,
            } => {
                assert_eq!(prompt, "build a todo app");
                assert_eq!(project.as_deref(), Some("Todo"));
                assert!(!watch);
            }
            _ => panic!("expected execute"),
        }
    }

    #[test]
    fn parse_follow_up_with_root() {
        let cli = Cli::parse_from([
            "devpilot", "--root", "/tmp/ws", "follow-up", "--project", "todo", "run it", "--watch",
        ]);
        assert_eq!(cli.root, PathBuf::from("/tmp/ws"));
        assert!(matches!(cli.command, Command::FollowUp { watch: true, .. }));
    }
}
