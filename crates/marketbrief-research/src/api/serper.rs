//! Serper.dev news and web search client

use async_trait::async_trait;
use reqwest::Client;
use serde_json::{Value, json};

use crate::error::{ResearchError, Result};
use crate::models::NewsHeadline;

/// News and web search lookups required by the research tools
#[async_trait]
pub trait NewsDataSource: Send + Sync {
    /// Search recent news headlines for a query
    async fn fetch_news(&self, query: &str) -> Result<Vec<NewsHeadline>>;

    /// General web search fallback, returning raw organic result objects
    async fn search_web(&self, query: &str) -> Result<Vec<Value>>;
}

/// Serper.dev search client
pub struct SerperClient {
    client: Client,
    api_key: String,
    search_url: String,
    news_url: String,
}

impl SerperClient {
    /// Create a client with explicit endpoint URLs
    pub fn new(
        api_key: impl Into<String>,
        search_url: impl Into<String>,
        news_url: impl Into<String>,
    ) -> Self {
        Self {
            client: Client::new(),
            api_key: api_key.into(),
            search_url: search_url.into(),
            news_url: news_url.into(),
        }
    }

    async fn expect_object(response: reqwest::Response) -> Result<Value> {
        if !response.status().is_success() {
            let status = response.status();
            let message = response.text().await.unwrap_or_default();
            return Err(ResearchError::Search(format!("HTTP {status}: {message}")));
        }
        let data: Value = response.json().await?;
        if !data.is_object() {
            return Err(ResearchError::Search(
                "unexpected response from search provider; expected a JSON object".to_string(),
            ));
        }
        Ok(data)
    }
}

#[async_trait]
impl NewsDataSource for SerperClient {
    async fn fetch_news(&self, query: &str) -> Result<Vec<NewsHeadline>> {
        let response = self
            .client
            .get(&self.news_url)
            .header("X-API-KEY", &self.api_key)
            .query(&[
                ("q", query),
                ("gl", "us"),
                ("hl", "en"),
                ("timeframe", "7d"),
            ])
            .send()
            .await?;
        let data = Self::expect_object(response).await?;
        Ok(extract_news(&data))
    }

    async fn search_web(&self, query: &str) -> Result<Vec<Value>> {
        let response = self
            .client
            .post(&self.search_url)
            .header("X-API-KEY", &self.api_key)
            .json(&json!({ "q": query }))
            .send()
            .await?;
        let data = Self::expect_object(response).await?;
        Ok(extract_organic(&data))
    }
}

/// Pull well-formed headlines out of a news response, skipping the rest
fn extract_news(data: &Value) -> Vec<NewsHeadline> {
    let Some(items) = data.get("news").and_then(Value::as_array) else {
        return Vec::new();
    };
    items
        .iter()
        .filter_map(|item| {
            let link = item.get("link")?.as_str()?.to_string();
            let title = item
                .get("title")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string();
            let snippet = item
                .get("snippet")
                .and_then(Value::as_str)
                .map(str::to_string);
            Some(NewsHeadline {
                title,
                link,
                snippet,
            })
        })
        .collect()
}

/// Keep only object-shaped organic results
fn extract_organic(data: &Value) -> Vec<Value> {
    let Some(items) = data.get("organic").and_then(Value::as_array) else {
        return Vec::new();
    };
    items
        .iter()
        .filter(|item| item.is_object())
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_news_skips_malformed_items() {
        let data = json!({
            "news": [
                {"title": "MSFT rallies", "link": "https://news.example/a", "snippet": "up 2%"},
                {"title": "no link"},
                "not an object",
                {"link": "https://news.example/b"}
            ]
        });
        let headlines = extract_news(&data);
        assert_eq!(headlines.len(), 2);
        assert_eq!(headlines[0].title, "MSFT rallies");
        assert_eq!(headlines[0].snippet.as_deref(), Some("up 2%"));
        assert_eq!(headlines[1].title, "");
        assert!(headlines[1].snippet.is_none());
    }

    #[test]
    fn test_extract_news_missing_section() {
        assert!(extract_news(&json!({})).is_empty());
    }

    #[test]
    fn test_extract_organic_filters_non_objects() {
        let data = json!({
            "organic": [
                {"title": "a", "link": "https://example.net/a"},
                42,
                {"title": "b", "link": "https://example.net/b"}
            ]
        });
        let results = extract_organic(&data);
        assert_eq!(results.len(), 2);
    }
}
