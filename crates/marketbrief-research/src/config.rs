//! Environment-driven runtime settings

use crate::api::{PolygonClient, SerperClient};
use crate::error::{ResearchError, Result};

const DEFAULT_AGENT_MODEL: &str = "gpt-4o-mini";
const DEFAULT_POLYGON_BASE_URL: &str = "https://api.polygon.io";
const DEFAULT_SERPER_SEARCH_URL: &str = "https://google.serper.dev/search";
const DEFAULT_SERPER_NEWS_URL: &str = "https://google.serper.dev/news";

/// Credentials and endpoints for all upstream services
#[derive(Debug, Clone)]
pub struct Settings {
    pub foundry_endpoint: String,
    pub foundry_api_key: String,
    pub agent_model: String,
    pub polygon_api_key: String,
    pub polygon_base_url: String,
    pub serper_api_key: String,
    pub serper_search_url: String,
    pub serper_news_url: String,
}

impl Settings {
    /// Load settings from environment variables
    ///
    /// Required: `FOUNDRY_PROJECT_ENDPOINT`, `FOUNDRY_API_KEY`,
    /// `POLYGON_API_KEY`, `SERPER_API_KEY`. The remaining variables have
    /// sensible defaults.
    pub fn from_env() -> Result<Self> {
        let settings = Self {
            foundry_endpoint: required_var("FOUNDRY_PROJECT_ENDPOINT")?,
            foundry_api_key: required_var("FOUNDRY_API_KEY")?,
            agent_model: optional_var("FOUNDRY_AGENT_MODEL", DEFAULT_AGENT_MODEL),
            polygon_api_key: required_var("POLYGON_API_KEY")?,
            polygon_base_url: optional_var("POLYGON_BASE_URL", DEFAULT_POLYGON_BASE_URL),
            serper_api_key: required_var("SERPER_API_KEY")?,
            serper_search_url: optional_var("SERPER_SEARCH_URL", DEFAULT_SERPER_SEARCH_URL),
            serper_news_url: optional_var("SERPER_NEWS_URL", DEFAULT_SERPER_NEWS_URL),
        };
        settings.validate()?;
        Ok(settings)
    }

    /// Reject blank values that would fail every request later
    pub fn validate(&self) -> Result<()> {
        let fields = [
            ("foundry_endpoint", &self.foundry_endpoint),
            ("foundry_api_key", &self.foundry_api_key),
            ("agent_model", &self.agent_model),
            ("polygon_api_key", &self.polygon_api_key),
            ("polygon_base_url", &self.polygon_base_url),
            ("serper_api_key", &self.serper_api_key),
            ("serper_search_url", &self.serper_search_url),
            ("serper_news_url", &self.serper_news_url),
        ];
        for (name, value) in fields {
            if value.trim().is_empty() {
                return Err(ResearchError::Config(format!("{name} must not be empty")));
            }
        }
        Ok(())
    }

    /// Market-data client configured from these settings
    pub fn polygon_client(&self) -> Result<PolygonClient> {
        self.validate()?;
        Ok(PolygonClient::new(
            self.polygon_api_key.clone(),
            self.polygon_base_url.clone(),
        ))
    }

    /// Search client configured from these settings
    pub fn serper_client(&self) -> Result<SerperClient> {
        self.validate()?;
        Ok(SerperClient::new(
            self.serper_api_key.clone(),
            self.serper_search_url.clone(),
            self.serper_news_url.clone(),
        ))
    }
}

fn required_var(name: &str) -> Result<String> {
    std::env::var(name)
        .map_err(|_| ResearchError::Config(format!("{name} environment variable not set")))
}

fn optional_var(name: &str, default: &str) -> String {
    std::env::var(name).unwrap_or_else(|_| default.to_string())
}
