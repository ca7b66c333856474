//! Pipeline stage definitions
//!
//! The stage set is a closed enumeration with a fixed total order; illegal
//! stage names are unrepresentable past the router-parsing boundary. The
//! follow-up router is a separate, unregistered stage whose only output is a
//! machine-parseable decision.

use serde::{Deserialize, Serialize};

/// One bounded unit of orchestration work, mapped to a single ephemeral
/// agent invocation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    Price,
    News,
    Analysis,
}

impl Stage {
    /// Fixed execution order for every request
    pub const ORDER: [Stage; 3] = [Stage::Price, Stage::News, Stage::Analysis];

    /// Router vocabulary name
    pub fn name(self) -> &'static str {
        match self {
            Self::Price => "price",
            Self::News => "news",
            Self::Analysis => "analysis",
        }
    }

    /// Name given to the ephemeral agent for this stage
    pub fn agent_name(self) -> &'static str {
        match self {
            Self::Price => "price-specialist",
            Self::News => "news-researcher",
            Self::Analysis => "lead-analyst",
        }
    }

    /// Human-readable label used in research notes
    pub fn label(self) -> &'static str {
        match self {
            Self::Price => "Price Specialist",
            Self::News => "News Researcher",
            Self::Analysis => "Lead Analyst",
        }
    }

    /// Whether this stage's agent is declared with tool access
    pub fn uses_tools(self) -> bool {
        match self {
            Self::Price | Self::News => true,
            Self::Analysis => false,
        }
    }

    /// Fixed system instructions for this stage's agent
    pub fn instructions(self) -> &'static str {
        match self {
            Self::Price => {
                "You are a market data specialist. Retrieve up-to-date prices and trend \
                 metrics by calling the available pricing tools. Report only factual data \
                 you receive from the tools."
            }
            Self::News => {
                "You are a financial news curator. Use the news search tool to identify \
                 the most relevant and timely headlines for the given ticker. Focus on \
                 concise bullet summaries."
            }
            Self::Analysis => {
                "You are the lead financial analyst. Synthesize the information supplied \
                 by the specialists and craft an actionable investment briefing with \
                 clear sections and bullet points."
            }
        }
    }

    /// Look a stage up by its router vocabulary name
    pub fn from_name(name: &str) -> Option<Stage> {
        match name {
            "price" => Some(Self::Price),
            "news" => Some(Self::News),
            "analysis" => Some(Self::Analysis),
            _ => None,
        }
    }
}

/// Agent name for the follow-up router stage
pub const ROUTER_AGENT_NAME: &str = "followup-router";

/// System instructions for the follow-up router stage
pub const ROUTER_INSTRUCTIONS: &str = "\
You are the orchestration coordinator for a financial research team. Based on the latest request
and available context, decide which specialists should be engaged next.

Available specialists:
- price: retrieves price overview and trend metrics (requires tool access)
- news: curates relevant headlines via tool search
- analysis: produces the final synthesized analyst response (no tools)

Respond with a single JSON object using the following schema:
{
  \"stages\": [\"price\", \"news\", \"analysis\"],
  \"reason\": \"One sentence explanation\"
}

Only include specialists that are necessary. Always include \"analysis\" if the user requires a
summarised response or recommendation.";

/// Ordered assistant output produced by one stage execution
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageResult {
    pub stage: Stage,
    pub messages: Vec<String>,
}

impl StageResult {
    pub fn new(stage: Stage, messages: Vec<String>) -> Self {
        Self { stage, messages }
    }
}
