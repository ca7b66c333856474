//! Final briefing assembly and plain-text rendering

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::models::{HistoricalBar, NewsHeadline, StockQuote, TrendMetrics};

/// Everything a completed briefing produced
///
/// `reply` and `messages` are only populated by follow-up runs, where the
/// caller needs the conversational answer alongside the full report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResearchReport {
    pub ticker: String,
    pub quote: StockQuote,
    pub news: Vec<NewsHeadline>,
    pub organic_results: Vec<Value>,
    pub historical: Vec<HistoricalBar>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metrics: Option<TrendMetrics>,
    pub research_notes: Vec<String>,
    pub analysis: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reply: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub messages: Vec<String>,
}

impl ResearchReport {
    /// Render the report as a human-readable multi-section summary
    pub fn formatted_summary(&self) -> String {
        let notes_section = join_or(&self.research_notes, "No intermediate notes");
        let analysis_section = join_or(&self.analysis, "No analysis produced");
        let headline_lines = if self.news.is_empty() {
            "- No headlines".to_string()
        } else {
            self.news
                .iter()
                .take(5)
                .map(|item| format!("- {}", item.title))
                .collect::<Vec<_>>()
                .join("\n")
        };
        format!(
            "Ticker: {}\n\
             Price: {} {}\n\
             Change: {} ({}%)\n\
             \n\
             Headlines:\n{headline_lines}\n\
             \n\
             Multi-day metrics:\n{}\n\
             \n\
             Research Notes:\n{notes_section}\n\
             \n\
             Analyst Summary:\n{analysis_section}",
            self.ticker,
            fmt_opt(self.quote.price),
            self.quote.currency.as_deref().unwrap_or("n/a"),
            fmt_opt(self.quote.change),
            fmt_opt(self.quote.change_percent),
            metrics_section(self.metrics.as_ref()),
        )
    }
}

/// Render a report, optionally appending the raw source links
pub fn render_report(report: &ResearchReport, include_sources: bool) -> String {
    let summary = report.formatted_summary();
    if !include_sources {
        return summary;
    }
    let lines: Vec<String> = report
        .organic_results
        .iter()
        .take(5)
        .map(|item| {
            let title = item
                .get("title")
                .and_then(Value::as_str)
                .unwrap_or("Untitled result");
            let link = item.get("link").and_then(Value::as_str).unwrap_or("");
            format!("- {title} ({link})")
        })
        .collect();
    let sources = if lines.is_empty() {
        "- No additional sources".to_string()
    } else {
        lines.join("\n")
    };
    format!("{summary}\n\nSources:\n{sources}")
}

fn metrics_section(metrics: Option<&TrendMetrics>) -> String {
    let Some(metrics) = metrics else {
        return "No multi-day metrics available".to_string();
    };
    let mut lines = Vec::new();
    if metrics.period_days > 0 {
        lines.push(format!("Period: last {} trading days", metrics.period_days));
    }
    match (metrics.absolute_change, metrics.percent_change) {
        (Some(change), Some(pct)) => lines.push(format!("Change: {change:.2} ({pct:.2}%)")),
        (Some(change), None) => lines.push(format!("Change: {change:.2}")),
        (None, Some(pct)) => lines.push(format!("Change: {pct:.2}%")),
        (None, None) => {}
    }
    if let Some(volume) = metrics.average_volume {
        lines.push(format!("Average volume: {}", group_thousands(volume)));
    }
    let mut range_parts = Vec::new();
    if let Some(high) = metrics.high {
        range_parts.push(format!("high {high:.2}"));
    }
    if let Some(low) = metrics.low {
        range_parts.push(format!("low {low:.2}"));
    }
    if !range_parts.is_empty() {
        lines.push(format!("Range: {}", range_parts.join(", ")));
    }
    if lines.is_empty() {
        "No multi-day metrics available".to_string()
    } else {
        lines.join("\n")
    }
}

fn join_or(items: &[String], fallback: &str) -> String {
    if items.is_empty() {
        fallback.to_string()
    } else {
        items.join("\n\n")
    }
}

fn fmt_opt(value: Option<f64>) -> String {
    value.map_or_else(|| "n/a".to_string(), |value| value.to_string())
}

/// Round to zero decimals and insert comma separators
fn group_thousands(value: f64) -> String {
    let rounded = value.round();
    let negative = rounded.is_sign_negative() && rounded != 0.0;
    let digits = format!("{}", rounded.abs() as u64);
    let mut grouped = String::new();
    for (index, ch) in digits.chars().enumerate() {
        if index > 0 && (digits.len() - index) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }
    if negative {
        format!("-{grouped}")
    } else {
        grouped
    }
}
