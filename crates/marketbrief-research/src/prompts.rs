//! Stage prompt construction
//!
//! Pure string builders, one per stage. What each stage is told is part of
//! the orchestration contract: which tool to call and how often, the expected
//! output structure, and all relevant context rendered as readable text.
//! Every context field is optional; absent fields fall back to fixed phrases
//! so first-run prompts stay well-formed.

use crate::models::{ConversationTurn, ResearchPayload};
use crate::stages::StageResult;

const NO_SUMMARY: &str = "No previous summary provided.";
const NO_SUMMARY_AVAILABLE: &str = "No previous summary available.";
const NO_HISTORY: &str = "No prior conversation provided.";
const NO_PAYLOAD: &str = "No structured market data captured.";
const NO_SNAPSHOT: &str = "No charted data available.";

/// Prompt for the price specialist stage
pub fn price_prompt(ticker: &str, summary: Option<&str>, focus: Option<&str>) -> String {
    let summary = summary.unwrap_or(NO_SUMMARY);
    let focus = focus.unwrap_or("Focus on the core market performance.");
    format!(
        "Gather a fresh market snapshot for {ticker}.\n\
         Previous summary: {summary}\n\
         Research focus: {focus}\n\
         \n\
         Instructions:\n\
         1. Call the `lookup_stock_overview` function exactly once to obtain the latest data.\n\
         2. Report the price, absolute change, percent change, currency, and any metrics returned.\n\
         3. Use concise bullet points (maximum of four) and avoid speculation.",
        ticker = ticker.to_uppercase(),
    )
}

/// Prompt for the news researcher stage
pub fn news_prompt(ticker: &str, summary: Option<&str>, focus: Option<&str>) -> String {
    let ticker = ticker.to_uppercase();
    let focus = focus
        .map(str::to_string)
        .unwrap_or_else(|| format!("Key developments impacting {ticker}"));
    let summary = summary.unwrap_or("No prior summary provided.");
    format!(
        "Identify the most relevant and timely headlines for {ticker}.\n\
         Previous summary: {summary}\n\
         News focus: {focus}\n\
         \n\
         Instructions:\n\
         1. Query the `search_related_news` function once with a focused search phrase.\n\
         \u{20}  Include the ticker symbol and any notable catalysts from the focus.\n\
         2. Return a bullet list (up to five items) highlighting headline, source, and angle.\n\
         3. Note if no meaningful headlines are returned."
    )
}

/// Prompt for the lead analyst stage
pub fn analysis_prompt(
    ticker: &str,
    stage_results: &[StageResult],
    payload: Option<&ResearchPayload>,
    summary: Option<&str>,
    history: &[ConversationTurn],
    user_message: Option<&str>,
) -> String {
    let structured = payload
        .and_then(|payload| serde_json::to_string_pretty(payload).ok())
        .unwrap_or_else(|| NO_PAYLOAD.to_string());
    let stage_block = render_stage_notes(stage_results);
    let history_block = render_history(history);
    let summary = summary.unwrap_or(NO_SUMMARY_AVAILABLE);
    let focus = user_message.unwrap_or("Provide an updated, comprehensive viewpoint.");
    format!(
        "You are the lead financial analyst preparing the final briefing for {ticker}.\n\
         \n\
         Previous summary: {summary}\n\
         User focus: {focus}\n\
         \n\
         Conversation history:\n\
         {history_block}\n\
         \n\
         Specialist contributions:\n\
         {stage_block}\n\
         \n\
         Structured market data:\n\
         {structured}\n\
         \n\
         Deliver the final report with the following structure:\n\
         - Price Snapshot: two sentences highlighting price level and intraday or recent moves.\n\
         - Key Headlines: bullet list (up to five) with headline and implication.\n\
         - Trend Assessment: two bullets covering technical/volume trends and risks.\n\
         - Recommended Next Steps: two actionable bullets for the research team.\n\
         \n\
         Keep the tone analytical, reference quantitative figures where available, and avoid\n\
         repeating the instructions verbatim in the response.",
        ticker = ticker.to_uppercase(),
    )
}

/// Prompt for the follow-up router stage
pub fn router_prompt(
    ticker: &str,
    summary: Option<&str>,
    history: &[ConversationTurn],
    user_message: &str,
    payload: Option<&ResearchPayload>,
) -> String {
    let summary = summary.unwrap_or(NO_SUMMARY_AVAILABLE);
    let history_block = render_history(history);
    let snapshot = payload.map_or_else(|| NO_SNAPSHOT.to_string(), payload_snapshot);
    format!(
        "A follow-up message was received for {ticker}.\n\
         Latest summary: {summary}\n\
         Prior conversation:\n\
         {history_block}\n\
         \n\
         Cached market data snapshot:\n\
         {snapshot}\n\
         \n\
         User message:\n\
         {user_message}\n\
         \n\
         Decide which specialists should run next and explain your choice. Remember to respond with\n\
         the required JSON object.",
        ticker = ticker.to_uppercase(),
    )
}

/// Render conversation history as `Role: content` lines
fn render_history(history: &[ConversationTurn]) -> String {
    let lines: Vec<String> = history
        .iter()
        .filter(|turn| !turn.content.is_empty())
        .map(|turn| format!("{}: {}", turn.role.display(), turn.content))
        .collect();
    if lines.is_empty() {
        NO_HISTORY.to_string()
    } else {
        lines.join("\n")
    }
}

/// Render specialist notes as labelled per-stage sections
fn render_stage_notes(stage_results: &[StageResult]) -> String {
    if stage_results.is_empty() {
        return "No specialist notes captured.".to_string();
    }
    stage_results
        .iter()
        .map(|result| {
            let body = if result.messages.is_empty() {
                "No notes recorded.".to_string()
            } else {
                result.messages.join("\n")
            };
            format!("{} Notes:\n{body}", result.stage.label())
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Compact quote-plus-bar-count description of the cached payload
fn payload_snapshot(payload: &ResearchPayload) -> String {
    let quote = &payload.quote;
    format!(
        "Price: {} {}, Change: {} ({}%), Historical bars: {}",
        fmt_opt_f64(quote.price),
        quote.currency.as_deref().unwrap_or("n/a"),
        fmt_opt_f64(quote.change),
        fmt_opt_f64(quote.change_percent),
        payload.historical.len()
    )
}

fn fmt_opt_f64(value: Option<f64>) -> String {
    value.map_or_else(|| "n/a".to_string(), |value| value.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::StockQuote;
    use crate::stages::Stage;

    #[test]
    fn test_price_prompt_defaults() {
        let prompt = price_prompt("msft", None, None);
        assert!(prompt.starts_with("Gather a fresh market snapshot for MSFT."));
        assert!(prompt.contains(NO_SUMMARY));
        assert!(prompt.contains("Focus on the core market performance."));
        assert!(prompt.contains("`lookup_stock_overview`"));
    }

    #[test]
    fn test_price_prompt_with_context() {
        let prompt = price_prompt("msft", Some("Prior summary."), Some("Watch the close."));
        assert!(prompt.contains("Previous summary: Prior summary."));
        assert!(prompt.contains("Research focus: Watch the close."));
    }

    #[test]
    fn test_news_prompt_default_focus_names_ticker() {
        let prompt = news_prompt("msft", None, None);
        assert!(prompt.contains("News focus: Key developments impacting MSFT"));
        // the news default wording differs from the price stage's
        assert!(prompt.contains("Previous summary: No prior summary provided."));
        assert!(prompt.contains("`search_related_news`"));
    }

    #[test]
    fn test_analysis_prompt_without_context() {
        let prompt = analysis_prompt("msft", &[], None, None, &[], None);
        assert!(prompt.contains("No specialist notes captured."));
        assert!(prompt.contains(NO_HISTORY));
        assert!(prompt.contains(NO_PAYLOAD));
        assert!(prompt.contains(NO_SUMMARY_AVAILABLE));
    }

    #[test]
    fn test_analysis_prompt_renders_notes_and_history() {
        let results = vec![
            StageResult::new(Stage::Price, vec!["Price is up.".to_string()]),
            StageResult::new(Stage::News, vec![]),
        ];
        let history = vec![
            ConversationTurn::user("What changed?"),
            ConversationTurn::assistant("Earnings beat."),
            ConversationTurn::user(""),
        ];
        let prompt = analysis_prompt("msft", &results, None, Some("Old take."), &history, None);
        assert!(prompt.contains("Price Specialist Notes:\nPrice is up."));
        assert!(prompt.contains("News Researcher Notes:\nNo notes recorded."));
        assert!(prompt.contains("User: What changed?"));
        assert!(prompt.contains("Assistant: Earnings beat."));
        assert!(prompt.contains("Previous summary: Old take."));
    }

    #[test]
    fn test_router_prompt_snapshot_from_payload() {
        let mut payload = ResearchPayload::new(StockQuote {
            ticker: "MSFT".to_string(),
            price: Some(401.25),
            change: Some(3.1),
            change_percent: Some(0.78),
            currency: Some("USD".to_string()),
            as_of: None,
        });
        payload.historical = vec![crate::models::HistoricalBar {
            date: "2026-08-27".to_string(),
            open: None,
            high: None,
            low: None,
            close: Some(401.25),
            volume: None,
        }];
        let prompt = router_prompt("msft", None, &[], "and the news?", Some(&payload));
        assert!(prompt.contains("Price: 401.25 USD, Change: 3.1 (0.78%), Historical bars: 1"));
        assert!(prompt.contains("User message:\nand the news?"));
    }

    #[test]
    fn test_router_prompt_without_payload() {
        let prompt = router_prompt("msft", None, &[], "hello", None);
        assert!(prompt.contains(NO_SNAPSHOT));
    }
}
