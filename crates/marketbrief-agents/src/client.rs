//! Agent hosting service client
//!
//! The [`AgentsClient`] trait captures the surface the run engine needs from
//! the remote service: ephemeral agents, threads, messages, runs, and tool
//! output submission. [`FoundryClient`] is the reqwest implementation against
//! an assistants-style REST endpoint.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;
use tracing::debug;

use crate::error::{AgentError, Result};
use crate::models::{Agent, AgentDefinition, Run, Thread, ThreadMessage, ToolOutput};

const DEFAULT_API_VERSION: &str = "2025-05-01";
const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Remote operations required by the run engine
#[async_trait]
pub trait AgentsClient: Send + Sync {
    /// Create an ephemeral agent from a definition
    async fn create_agent(&self, definition: &AgentDefinition) -> Result<Agent>;

    /// Delete an agent by id
    async fn delete_agent(&self, agent_id: &str) -> Result<()>;

    /// Open a new conversation thread
    async fn create_thread(&self) -> Result<Thread>;

    /// Delete a thread by id
    async fn delete_thread(&self, thread_id: &str) -> Result<()>;

    /// Post a message to a thread
    async fn create_message(
        &self,
        thread_id: &str,
        role: &str,
        content: &str,
    ) -> Result<ThreadMessage>;

    /// Start a run of the given agent against a thread
    async fn create_run(&self, thread_id: &str, agent_id: &str) -> Result<Run>;

    /// Fetch the current state of a run
    async fn get_run(&self, thread_id: &str, run_id: &str) -> Result<Run>;

    /// Submit tool outputs to resume a paused run
    async fn submit_tool_outputs(
        &self,
        thread_id: &str,
        run_id: &str,
        outputs: Vec<ToolOutput>,
    ) -> Result<Run>;

    /// List all messages in a thread
    async fn list_messages(&self, thread_id: &str) -> Result<Vec<ThreadMessage>>;
}

/// Configuration for the hosted-agent service client
#[derive(Debug, Clone)]
pub struct FoundryConfig {
    /// Base URL of the agent project endpoint
    pub endpoint: String,

    /// API key for authentication
    pub api_key: String,

    /// API version query parameter
    pub api_version: String,

    /// Request timeout in seconds
    pub timeout_secs: u64,
}

impl FoundryConfig {
    /// Create a config with the given endpoint and API key
    pub fn new(endpoint: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            api_key: api_key.into(),
            api_version: DEFAULT_API_VERSION.to_string(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }

    /// Create config from `FOUNDRY_PROJECT_ENDPOINT` / `FOUNDRY_API_KEY`
    ///
    /// Optionally reads `FOUNDRY_API_VERSION` when set.
    pub fn from_env() -> Result<Self> {
        let endpoint = std::env::var("FOUNDRY_PROJECT_ENDPOINT").map_err(|_| {
            AgentError::Config("FOUNDRY_PROJECT_ENDPOINT environment variable not set".to_string())
        })?;
        let api_key = std::env::var("FOUNDRY_API_KEY").map_err(|_| {
            AgentError::Config("FOUNDRY_API_KEY environment variable not set".to_string())
        })?;

        let mut config = Self::new(endpoint, api_key);
        if let Ok(version) = std::env::var("FOUNDRY_API_VERSION") {
            config.api_version = version;
        }
        Ok(config)
    }

    /// Set the API version
    pub fn with_api_version(mut self, version: impl Into<String>) -> Self {
        self.api_version = version.into();
        self
    }

    /// Set the request timeout in seconds
    pub fn with_timeout(mut self, timeout_secs: u64) -> Self {
        self.timeout_secs = timeout_secs;
        self
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.endpoint.trim().is_empty() {
            return Err(AgentError::Config("endpoint must not be empty".to_string()));
        }
        if self.api_key.trim().is_empty() {
            return Err(AgentError::Config("api_key must not be empty".to_string()));
        }
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
struct MessageList {
    #[serde(default)]
    data: Vec<ThreadMessage>,
}

/// Hosted-agent service client over HTTP
pub struct FoundryClient {
    client: Client,
    config: FoundryConfig,
}

impl FoundryClient {
    /// Create a new client with the given configuration
    pub fn new(config: FoundryConfig) -> Result<Self> {
        config.validate()?;
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self { client, config })
    }

    /// Create a client from environment variables
    pub fn from_env() -> Result<Self> {
        Self::new(FoundryConfig::from_env()?)
    }

    /// Get the current configuration
    pub fn config(&self) -> &FoundryConfig {
        &self.config
    }

    fn url(&self, path: &str) -> String {
        let base = self.config.endpoint.trim_end_matches('/');
        format!("{base}/{}", path.trim_start_matches('/'))
    }

    fn request(&self, method: reqwest::Method, path: &str) -> reqwest::RequestBuilder {
        self.client
            .request(method, self.url(path))
            .header("api-key", &self.config.api_key)
            .query(&[("api-version", &self.config.api_version)])
    }

    async fn check(response: reqwest::Response) -> Result<reqwest::Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let message = response.text().await.unwrap_or_default();
        Err(AgentError::Api {
            status: status.as_u16(),
            message,
        })
    }
}

#[async_trait]
impl AgentsClient for FoundryClient {
    async fn create_agent(&self, definition: &AgentDefinition) -> Result<Agent> {
        debug!(name = %definition.name, model = %definition.model, "creating agent");
        let response = self
            .request(reqwest::Method::POST, "assistants")
            .json(definition)
            .send()
            .await?;
        Ok(Self::check(response).await?.json().await?)
    }

    async fn delete_agent(&self, agent_id: &str) -> Result<()> {
        let response = self
            .request(reqwest::Method::DELETE, &format!("assistants/{agent_id}"))
            .send()
            .await?;
        Self::check(response).await?;
        Ok(())
    }

    async fn create_thread(&self) -> Result<Thread> {
        let response = self
            .request(reqwest::Method::POST, "threads")
            .json(&json!({}))
            .send()
            .await?;
        Ok(Self::check(response).await?.json().await?)
    }

    async fn delete_thread(&self, thread_id: &str) -> Result<()> {
        let response = self
            .request(reqwest::Method::DELETE, &format!("threads/{thread_id}"))
            .send()
            .await?;
        Self::check(response).await?;
        Ok(())
    }

    async fn create_message(
        &self,
        thread_id: &str,
        role: &str,
        content: &str,
    ) -> Result<ThreadMessage> {
        let response = self
            .request(
                reqwest::Method::POST,
                &format!("threads/{thread_id}/messages"),
            )
            .json(&json!({ "role": role, "content": content }))
            .send()
            .await?;
        Ok(Self::check(response).await?.json().await?)
    }

    async fn create_run(&self, thread_id: &str, agent_id: &str) -> Result<Run> {
        let response = self
            .request(reqwest::Method::POST, &format!("threads/{thread_id}/runs"))
            .json(&json!({ "assistant_id": agent_id }))
            .send()
            .await?;
        Ok(Self::check(response).await?.json().await?)
    }

    async fn get_run(&self, thread_id: &str, run_id: &str) -> Result<Run> {
        let response = self
            .request(
                reqwest::Method::GET,
                &format!("threads/{thread_id}/runs/{run_id}"),
            )
            .send()
            .await?;
        Ok(Self::check(response).await?.json().await?)
    }

    async fn submit_tool_outputs(
        &self,
        thread_id: &str,
        run_id: &str,
        outputs: Vec<ToolOutput>,
    ) -> Result<Run> {
        let response = self
            .request(
                reqwest::Method::POST,
                &format!("threads/{thread_id}/runs/{run_id}/submit_tool_outputs"),
            )
            .json(&json!({ "tool_outputs": outputs }))
            .send()
            .await?;
        Ok(Self::check(response).await?.json().await?)
    }

    async fn list_messages(&self, thread_id: &str) -> Result<Vec<ThreadMessage>> {
        let response = self
            .request(
                reqwest::Method::GET,
                &format!("threads/{thread_id}/messages"),
            )
            .send()
            .await?;
        let list: MessageList = Self::check(response).await?.json().await?;
        Ok(list.data)
    }
}
