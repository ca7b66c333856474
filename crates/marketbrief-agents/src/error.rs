//! Error types for hosted-agent operations

use thiserror::Error;

use crate::models::RunStatus;

/// Result type alias for hosted-agent operations
pub type Result<T> = std::result::Result<T, AgentError>;

/// Errors raised by the agent service client and the run engine
#[derive(Debug, Error)]
pub enum AgentError {
    /// Run did not complete before the wall-clock deadline
    #[error("agent run did not complete within {secs}s")]
    Timeout { secs: u64 },

    /// Run reached a terminal failure status
    #[error("agent run failed with status: {status}")]
    RunFailed { status: RunStatus },

    /// The run requested tool execution but the stage declared no tools
    #[error("agent requested tool execution but no tool provider is available")]
    ToolsUnavailable,

    /// Tool-call arguments from the model were not a valid JSON object
    #[error("invalid tool arguments: {0}")]
    InvalidToolArguments(String),

    /// A tool-output batch was requested but nothing executable remained
    #[error("agent requested tool outputs but none were generated")]
    NoToolOutputs,

    /// The service returned a non-success HTTP status
    #[error("agent service error (HTTP {status}): {message}")]
    Api { status: u16, message: String },

    /// Network or HTTP error
    #[error("network error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// The service sent a response the protocol does not account for
    #[error("unexpected response from agent service: {0}")]
    UnexpectedResponse(String),
}
