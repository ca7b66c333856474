//! Error types for research operations

use thiserror::Error;

use marketbrief_agents::AgentError;

/// Result type alias for research operations
pub type Result<T> = std::result::Result<T, ResearchError>;

/// Research-side errors
#[derive(Debug, Error)]
pub enum ResearchError {
    /// Agent protocol or service failure
    #[error(transparent)]
    Agent(#[from] AgentError),

    /// Price/history data source failure
    #[error("market data error: {0}")]
    MarketData(String),

    /// News/web search data source failure
    #[error("search error: {0}")]
    Search(String),

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// Network or HTTP error
    #[error("network error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON parsing error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
