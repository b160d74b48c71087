//! Side-effecting adapters: filesystem stores, processes and external services.
//!
//! Everything the orchestrator touches outside its own memory sits behind a
//! module here, most of them behind a trait so tests can substitute fakes.

pub mod atomic;
pub mod broadcast;
pub mod commands;
pub mod config;
pub mod conversation_log;
pub mod git;
pub mod inference;
pub mod init;
pub mod locks;
pub mod process;
pub mod project_files;
pub mod prompt;
pub mod services;
pub mod state_log;
pub mod web;
