//! Data model for research payloads
//!
//! Value containers shared between the tool layer, prompt construction, and
//! report assembly. The structured cache ([`ResearchPayload`]) is
//! request-scoped: it is reset at the start of every top-level run and only
//! ever holds data from the most recent tool calls.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Previous-close quote for one ticker
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct StockQuote {
    pub ticker: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub change: Option<f64>,
    #[serde(
        default,
        rename = "changePercent",
        skip_serializing_if = "Option::is_none"
    )]
    pub change_percent: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub currency: Option<String>,
    #[serde(default, rename = "date", skip_serializing_if = "Option::is_none")]
    pub as_of: Option<String>,
}

impl StockQuote {
    /// Quote with only the (uppercased) ticker filled in
    pub fn bare(ticker: &str) -> Self {
        Self {
            ticker: ticker.to_uppercase(),
            ..Self::default()
        }
    }
}

/// One news search result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewsHeadline {
    pub title: String,
    pub link: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub snippet: Option<String>,
}

/// One daily OHLCV bar
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoricalBar {
    pub date: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub open: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub high: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub low: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub close: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub volume: Option<f64>,
}

/// Metrics derived from a multi-day bar window
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrendMetrics {
    pub period_days: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub absolute_change: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub percent_change: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub average_volume: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub high: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub low: Option<f64>,
}

/// Structured cache of the most recent tool-call results
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResearchPayload {
    pub quote: StockQuote,
    #[serde(default)]
    pub news: Vec<NewsHeadline>,
    #[serde(default)]
    pub organic_results: Vec<Value>,
    #[serde(default)]
    pub historical: Vec<HistoricalBar>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metrics: Option<TrendMetrics>,
}

impl ResearchPayload {
    /// Payload seeded with a quote and nothing else
    pub fn new(quote: StockQuote) -> Self {
        Self {
            quote,
            news: Vec::new(),
            organic_results: Vec::new(),
            historical: Vec::new(),
            metrics: None,
        }
    }
}

/// Role of one conversation turn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    /// Capitalized display form ("User" / "Assistant")
    pub fn display(self) -> &'static str {
        match self {
            Self::User => "User",
            Self::Assistant => "Assistant",
        }
    }
}

/// Caller-supplied conversation history entry, read-only to the core
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationTurn {
    pub role: Role,
    pub content: String,
}

impl ConversationTurn {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}
