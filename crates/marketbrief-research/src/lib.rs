//! Market research briefings driven by hosted LLM agents
//!
//! Orchestrates specialist agent stages (price, news, lead analyst) against a
//! remote agent-hosting service, grounding them with live market data via
//! locally executed tool calls. Follow-up questions are routed so only the
//! stages the question needs are re-run.

pub mod api;
pub mod config;
pub mod error;
pub mod metrics;
pub mod models;
pub mod orchestrator;
pub mod prompts;
pub mod report;
pub mod router;
pub mod stages;
pub mod tooling;

pub use config::Settings;
pub use error::{ResearchError, Result};
pub use models::{
    ConversationTurn, HistoricalBar, NewsHeadline, ResearchPayload, Role, StockQuote, TrendMetrics,
};
pub use orchestrator::Orchestrator;
pub use report::{ResearchReport, render_report};
pub use stages::{Stage, StageResult};
pub use tooling::ResearchTooling;
