//! Agent orchestration for LLM-driven software projects.
//!
//! A user prompt is turned into a plan, researched and written out as project
//! files by a chain of model-backed stages. Every step is recorded as a
//! replayable trace of state snapshots plus a conversation log per project.
//!
//! - **[`core`]**: Pure logic: record types, the phase machine and the grammars
//!   that turn model text into typed results. No I/O.
//! - **[`io`]**: Stores, processes and external collaborators, mostly behind
//!   traits so tests can substitute fakes.
//! - **[`stages`]**: One module per model stage plus the retrying executor.
//!
//! Orchestration lives in [`agent`] (new tasks), [`follow_up`],
//! [`dispatch`] (decision mode) and [`research`].

pub mod agent;
pub mod core;
pub mod dispatch;
pub mod exit_codes;
pub mod follow_up;
pub mod io;
pub mod logging;
pub mod research;
pub mod stages;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
pub mod workspace;
