//! Local tool execution backing the remote agents
//!
//! [`ResearchTooling`] owns the market-data and news clients and exposes them
//! to paused runs as callable functions. Results are returned to the model as
//! serialized JSON strings; data-source failures surface as `{"error": ...}`
//! objects so the model can react instead of the run aborting. The most recent
//! structured results are cached so the final report can be assembled without
//! re-fetching.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use marketbrief_agents::{AgentError, ToolProvider, models::ToolDefinition};
use serde_json::{Map, Value, json};
use tracing::{debug, error, warn};

use crate::api::{NewsDataSource, PriceDataSource};
use crate::error::Result;
use crate::metrics::trend_metrics;
use crate::models::{NewsHeadline, ResearchPayload, StockQuote};

/// Days of daily bars fetched for trend derivation
pub const HISTORY_DAYS: usize = 7;

const LOOKUP_STOCK_OVERVIEW: &str = "lookup_stock_overview";
const SEARCH_RELATED_NEWS: &str = "search_related_news";

/// Tool implementations plus a cache of the latest structured results
pub struct ResearchTooling {
    price_source: Arc<dyn PriceDataSource>,
    news_source: Arc<dyn NewsDataSource>,
    payload: Mutex<Option<ResearchPayload>>,
    news_results: Mutex<Vec<Value>>,
}

impl ResearchTooling {
    pub fn new(price_source: Arc<dyn PriceDataSource>, news_source: Arc<dyn NewsDataSource>) -> Self {
        Self {
            price_source,
            news_source,
            payload: Mutex::new(None),
            news_results: Mutex::new(Vec::new()),
        }
    }

    /// Clear cached results before a new briefing
    pub fn reset(&self) {
        self.payload.lock().unwrap().take();
        self.news_results.lock().unwrap().clear();
    }

    /// Structured payload captured by the most recent overview lookup
    pub fn last_payload(&self) -> Option<ResearchPayload> {
        self.payload.lock().unwrap().clone()
    }

    /// Raw result objects captured by the most recent news search
    pub fn last_news_results(&self) -> Vec<Value> {
        self.news_results.lock().unwrap().clone()
    }

    /// Fetch quote, history, and derived metrics for a ticker
    ///
    /// Returns the serialized payload, or an `{"error": ...}` object when the
    /// quote itself cannot be fetched. History failures after a good quote
    /// degrade to a quote-only payload.
    pub async fn lookup_stock_overview(&self, ticker: &str) -> String {
        let payload = match self.fetch_overview(ticker).await {
            Ok(payload) => payload,
            Err(err) => {
                error!(ticker, %err, "failed to fetch stock overview");
                return json!({ "error": format!("Failed to get stock overview: {err}") })
                    .to_string();
            }
        };
        let rendered = serialize_or_error(&payload);
        *self.news_results.lock().unwrap() = payload.organic_results.clone();
        *self.payload.lock().unwrap() = Some(payload);
        rendered
    }

    /// Search news for a query, falling back to general web search
    ///
    /// Returns the serialized result list, or an `{"error": ...}` object when
    /// both lookups fail. Results also refresh the cached payload's news.
    pub async fn search_related_news(&self, query: &str) -> String {
        let results = match self.fetch_news_results(query).await {
            Ok(results) => results,
            Err(err) => {
                error!(query, %err, "failed to search news");
                return json!({ "error": format!("Failed to search news: {err}") }).to_string();
            }
        };
        *self.news_results.lock().unwrap() = results.clone();
        if let Some(payload) = self.payload.lock().unwrap().as_mut() {
            payload.news = results
                .iter()
                .filter_map(|item| serde_json::from_value(item.clone()).ok())
                .collect();
            payload.organic_results = results.clone();
        }
        serde_json::to_string(&results).unwrap_or_else(|_| "[]".to_string())
    }

    async fn fetch_overview(&self, ticker: &str) -> Result<ResearchPayload> {
        let quote = self.price_source.previous_close(ticker).await?;
        let mut payload = ResearchPayload::new(quote.to_stock_quote());
        match self.price_source.recent_bars(ticker, HISTORY_DAYS).await {
            Ok(bars) if !bars.is_empty() => {
                payload.historical = bars.iter().map(|bar| bar.to_historical_bar()).collect();
                payload.metrics = trend_metrics(&payload.historical);
            }
            Ok(_) => debug!(ticker, "no historical bars returned"),
            Err(err) => warn!(ticker, %err, "historical data unavailable"),
        }
        Ok(payload)
    }

    async fn fetch_news_results(&self, query: &str) -> Result<Vec<Value>> {
        let headlines = self.news_source.fetch_news(query).await?;
        if headlines.is_empty() {
            return self.news_source.search_web(query).await;
        }
        Ok(headlines.iter().map(headline_to_value).collect())
    }
}

#[async_trait]
impl ToolProvider for ResearchTooling {
    fn tool_definitions(&self) -> Vec<ToolDefinition> {
        vec![
            ToolDefinition::function(
                LOOKUP_STOCK_OVERVIEW,
                "Look up stock overview information for a given ticker symbol",
                json!({
                    "type": "object",
                    "properties": {
                        "ticker": {
                            "type": "string",
                            "description": "The stock ticker symbol to look up"
                        }
                    },
                    "required": ["ticker"]
                }),
            ),
            ToolDefinition::function(
                SEARCH_RELATED_NEWS,
                "Search for news related to a stock or financial topic",
                json!({
                    "type": "object",
                    "properties": {
                        "query": {
                            "type": "string",
                            "description": "General search query to investigate broader sentiment or news"
                        }
                    },
                    "required": ["query"]
                }),
            ),
        ]
    }

    async fn execute(
        &self,
        name: &str,
        arguments: &Map<String, Value>,
    ) -> marketbrief_agents::Result<String> {
        match name {
            LOOKUP_STOCK_OVERVIEW => {
                let ticker = string_argument(arguments, &["ticker", "symbol", "stock", "stock_ticker"])
                    .ok_or_else(|| {
                        AgentError::InvalidToolArguments(
                            "lookup_stock_overview requires a 'ticker' argument".to_string(),
                        )
                    })?;
                Ok(self.lookup_stock_overview(&ticker).await)
            }
            SEARCH_RELATED_NEWS => {
                let query = string_argument(arguments, &["query", "topic", "search"])
                    .ok_or_else(|| {
                        AgentError::InvalidToolArguments(
                            "search_related_news requires a 'query' argument".to_string(),
                        )
                    })?;
                Ok(self.search_related_news(&query).await)
            }
            other => Ok(json!({ "error": format!("Unknown function: {other}") }).to_string()),
        }
    }
}

/// First non-empty string value among the accepted argument keys
fn string_argument(arguments: &Map<String, Value>, keys: &[&str]) -> Option<String> {
    keys.iter()
        .filter_map(|key| arguments.get(*key))
        .filter_map(Value::as_str)
        .map(str::trim)
        .find(|value| !value.is_empty())
        .map(str::to_string)
}

fn headline_to_value(headline: &NewsHeadline) -> Value {
    serde_json::to_value(headline).unwrap_or(Value::Null)
}

fn serialize_or_error(payload: &ResearchPayload) -> String {
    serde_json::to_string(payload)
        .unwrap_or_else(|err| json!({ "error": format!("Failed to serialize payload: {err}") }).to_string())
}

/// Bare quote used when no overview was captured during a run
pub fn fallback_payload(ticker: &str) -> ResearchPayload {
    ResearchPayload::new(StockQuote::bare(ticker))
}
