//! Polygon price/history client

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use reqwest::Client;
use serde::Deserialize;

use crate::error::{ResearchError, Result};
use crate::models::{HistoricalBar, StockQuote};

/// Price and history lookups required by the research tools
#[async_trait]
pub trait PriceDataSource: Send + Sync {
    /// Previous trading day's close for a ticker
    async fn previous_close(&self, ticker: &str) -> Result<PrevCloseQuote>;

    /// Up to `days` most recent daily bars, sorted ascending by date
    async fn recent_bars(&self, ticker: &str, days: usize) -> Result<Vec<DailyBar>>;
}

/// Previous-close aggregate for one ticker
#[derive(Debug, Clone)]
pub struct PrevCloseQuote {
    pub ticker: String,
    pub close: f64,
    pub open: Option<f64>,
    pub as_of: DateTime<Utc>,
}

impl PrevCloseQuote {
    /// Convert to the display quote, deriving intraday change from the open
    pub fn to_stock_quote(&self) -> StockQuote {
        let mut change = None;
        let mut change_percent = None;
        if let Some(open) = self.open {
            if open != 0.0 {
                let delta = self.close - open;
                change = Some(round2(delta));
                change_percent = Some(round2(delta / open * 100.0));
            }
        }
        StockQuote {
            ticker: self.ticker.clone(),
            price: Some(self.close),
            change,
            change_percent,
            currency: Some("USD".to_string()),
            as_of: Some(self.as_of.to_rfc3339()),
        }
    }
}

/// One daily aggregate bar
#[derive(Debug, Clone)]
pub struct DailyBar {
    pub ticker: String,
    pub as_of: DateTime<Utc>,
    pub open: Option<f64>,
    pub high: Option<f64>,
    pub low: Option<f64>,
    pub close: Option<f64>,
    pub volume: Option<f64>,
}

impl DailyBar {
    /// Convert to the serializable bar keyed by calendar date
    pub fn to_historical_bar(&self) -> HistoricalBar {
        HistoricalBar {
            date: self.as_of.date_naive().to_string(),
            open: self.open,
            high: self.high,
            low: self.low,
            close: self.close,
            volume: self.volume,
        }
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[derive(Debug, Deserialize)]
struct AggsResponse {
    #[serde(default)]
    results: Vec<AggsBar>,
}

#[derive(Debug, Deserialize)]
struct AggsBar {
    #[serde(default)]
    o: Option<f64>,
    #[serde(default)]
    h: Option<f64>,
    #[serde(default)]
    l: Option<f64>,
    #[serde(default)]
    c: Option<f64>,
    #[serde(default)]
    v: Option<f64>,
    #[serde(default)]
    t: Option<f64>,
}

impl AggsBar {
    /// Millisecond epoch timestamp to UTC; bars without one are unusable
    fn timestamp(&self) -> Option<DateTime<Utc>> {
        self.t.and_then(|ms| DateTime::from_timestamp_millis(ms as i64))
    }
}

/// Polygon.io aggregates client
pub struct PolygonClient {
    client: Client,
    api_key: String,
    base_url: String,
}

impl PolygonClient {
    /// Create a client against the given base URL
    pub fn new(api_key: impl Into<String>, base_url: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            api_key: api_key.into(),
            base_url: base_url.into(),
        }
    }

    fn url(&self, path: &str) -> String {
        let base = self.base_url.trim_end_matches('/');
        format!("{base}/{}", path.trim_start_matches('/'))
    }

    async fn get_aggs(&self, path: &str, extra: &[(&str, String)]) -> Result<AggsResponse> {
        let mut query: Vec<(&str, String)> = vec![
            ("adjusted", "true".to_string()),
            ("apiKey", self.api_key.clone()),
        ];
        query.extend_from_slice(extra);
        let response = self
            .client
            .get(self.url(path))
            .query(&query)
            .send()
            .await?;
        if !response.status().is_success() {
            let status = response.status();
            let message = response.text().await.unwrap_or_default();
            return Err(ResearchError::MarketData(format!(
                "HTTP {status}: {message}"
            )));
        }
        Ok(response.json().await?)
    }
}

#[async_trait]
impl PriceDataSource for PolygonClient {
    async fn previous_close(&self, ticker: &str) -> Result<PrevCloseQuote> {
        let ticker = ticker.to_uppercase();
        let payload = self
            .get_aggs(&format!("v2/aggs/ticker/{ticker}/prev"), &[])
            .await?;
        quote_from_response(&ticker, payload)
    }

    async fn recent_bars(&self, ticker: &str, days: usize) -> Result<Vec<DailyBar>> {
        if days == 0 {
            return Err(ResearchError::MarketData(
                "days must be greater than zero".to_string(),
            ));
        }
        let ticker = ticker.to_uppercase();
        let end = Utc::now().date_naive();
        // Calendar padding so the window always covers `days` trading days.
        let start = end - Duration::days(days as i64 + 7);
        let payload = self
            .get_aggs(
                &format!("v2/aggs/ticker/{ticker}/range/1/day/{start}/{end}"),
                &[
                    ("sort", "desc".to_string()),
                    ("limit", days.to_string()),
                ],
            )
            .await?;
        Ok(bars_from_response(&ticker, payload, days))
    }
}

fn quote_from_response(ticker: &str, payload: AggsResponse) -> Result<PrevCloseQuote> {
    let latest = payload.results.into_iter().next().ok_or_else(|| {
        ResearchError::MarketData(format!("no previous-close results for ticker {ticker}"))
    })?;
    let close = latest.c.ok_or_else(|| {
        ResearchError::MarketData("previous-close response missing closing price".to_string())
    })?;
    let as_of = latest.timestamp().unwrap_or_else(Utc::now);
    Ok(PrevCloseQuote {
        ticker: ticker.to_string(),
        close,
        open: latest.o,
        as_of,
    })
}

fn bars_from_response(ticker: &str, payload: AggsResponse, days: usize) -> Vec<DailyBar> {
    let mut bars: Vec<DailyBar> = payload
        .results
        .into_iter()
        .filter_map(|entry| {
            let as_of = entry.timestamp()?;
            Some(DailyBar {
                ticker: ticker.to_string(),
                as_of,
                open: entry.o,
                high: entry.h,
                low: entry.l,
                close: entry.c,
                volume: entry.v,
            })
        })
        .collect();
    bars.sort_by_key(|bar| bar.as_of);
    // Trim to the requested count from the most recent end.
    if bars.len() > days {
        bars.drain(..bars.len() - days);
    }
    bars
}
