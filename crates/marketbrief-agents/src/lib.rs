//! Hosted-agent service client and run engine
//!
//! This crate owns the protocol side of marketbrief: a typed client for the
//! agent hosting service (ephemeral agents, threads, runs) and the
//! [`AgentRunner`] poll loop that drives one run to completion while
//! servicing the tool-call sub-protocol through a [`ToolProvider`].

pub mod client;
pub mod error;
pub mod models;
pub mod runner;
pub mod text;

pub use client::{AgentsClient, FoundryClient, FoundryConfig};
pub use error::{AgentError, Result};
pub use models::{
    Agent, AgentDefinition, FunctionDefinition, Run, RunStatus, Thread, ThreadMessage, ToolCall,
    ToolDefinition, ToolOutput,
};
pub use runner::{AgentRunner, RunOutcome, ToolProvider};
pub use text::{message_to_text, normalize_agent_message};
