//! Deterministic, pure logic shared by the agent.
//!
//! Core modules are free of I/O: record types, project identity, the phase
//! state machine and the grammars that turn model text into typed results.

pub mod action;
pub mod code_blocks;
pub mod decision;
pub mod phase;
pub mod plan;
pub mod project;
pub mod response;
pub mod stage;
pub mod types;
