//! Multi-stage briefing orchestration
//!
//! Drives the specialist stages in order against the agent hosting service.
//! Agents are ephemeral: each stage creates one, runs it, and deletes it
//! best-effort. A fresh briefing always runs price, news, then analysis; a
//! follow-up first asks the router which specialists the new message needs.

use std::sync::Arc;

use marketbrief_agents::{
    AgentRunner, AgentsClient, FoundryClient, FoundryConfig, RunOutcome, ToolProvider,
    models::{Agent, AgentDefinition},
};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::Settings;
use crate::error::Result;
use crate::models::ConversationTurn;
use crate::prompts;
use crate::report::ResearchReport;
use crate::router::{ordered_stages, parse_stage_selection};
use crate::stages::{ROUTER_AGENT_NAME, ROUTER_INSTRUCTIONS, Stage, StageResult};
use crate::tooling::{ResearchTooling, fallback_payload};

/// Runs research briefings end to end
pub struct Orchestrator {
    client: Arc<dyn AgentsClient>,
    runner: AgentRunner,
    tooling: Arc<ResearchTooling>,
    model: String,
}

impl Orchestrator {
    pub fn new(
        client: Arc<dyn AgentsClient>,
        tooling: Arc<ResearchTooling>,
        model: impl Into<String>,
    ) -> Self {
        let runner = AgentRunner::new(Arc::clone(&client));
        Self {
            client,
            runner,
            tooling,
            model: model.into(),
        }
    }

    /// Build the production orchestrator from environment settings
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        let config = FoundryConfig::new(&settings.foundry_endpoint, &settings.foundry_api_key);
        let client: Arc<dyn AgentsClient> = Arc::new(FoundryClient::new(config)?);
        let tooling = Arc::new(ResearchTooling::new(
            Arc::new(settings.polygon_client()?),
            Arc::new(settings.serper_client()?),
        ));
        Ok(Self::new(client, tooling, settings.agent_model.clone()))
    }

    /// Run a full fresh briefing for a ticker
    pub async fn run_fresh(&self, ticker: &str) -> Result<ResearchReport> {
        info!(ticker, "starting fresh briefing");
        self.tooling.reset();

        let mut specialists = Vec::new();
        let price = self
            .run_stage(Stage::Price, prompts::price_prompt(ticker, None, None))
            .await?;
        specialists.push(price);
        let news = self
            .run_stage(Stage::News, prompts::news_prompt(ticker, None, None))
            .await?;
        specialists.push(news);

        let analysis_prompt = prompts::analysis_prompt(
            ticker,
            &specialists,
            self.tooling.last_payload().as_ref(),
            None,
            &[],
            None,
        );
        let analysis = self.run_stage(Stage::Analysis, analysis_prompt).await?;

        Ok(self.build_report(ticker, &specialists, analysis.messages, None))
    }

    /// Answer a follow-up message, re-running only the stages it needs
    pub async fn run_follow_up(
        &self,
        ticker: &str,
        user_message: &str,
        summary: Option<&str>,
        history: &[ConversationTurn],
    ) -> Result<ResearchReport> {
        info!(ticker, "routing follow-up");
        self.tooling.reset();

        let requested = self
            .route_follow_up(ticker, user_message, summary, history)
            .await?;
        let sequence = ordered_stages(&requested);
        debug!(ticker, ?sequence, "follow-up stage sequence");

        let mut specialists = Vec::new();
        let mut analysis: Option<StageResult> = None;
        for stage in sequence {
            match stage {
                Stage::Price => {
                    let prompt = prompts::price_prompt(ticker, summary, Some(user_message));
                    specialists.push(self.run_stage(stage, prompt).await?);
                }
                Stage::News => {
                    let prompt = prompts::news_prompt(ticker, summary, Some(user_message));
                    specialists.push(self.run_stage(stage, prompt).await?);
                }
                Stage::Analysis => {
                    let prompt = prompts::analysis_prompt(
                        ticker,
                        &specialists,
                        self.tooling.last_payload().as_ref(),
                        summary,
                        history,
                        Some(user_message),
                    );
                    analysis = Some(self.run_stage(stage, prompt).await?);
                }
            }
        }

        // ordered_stages always includes analysis, but don't rely on it here
        let analysis = match analysis {
            Some(result) => result,
            None => {
                let prompt = prompts::analysis_prompt(
                    ticker,
                    &specialists,
                    self.tooling.last_payload().as_ref(),
                    summary,
                    history,
                    Some(user_message),
                );
                self.run_stage(Stage::Analysis, prompt).await?
            }
        };

        let reply = analysis.messages.last().cloned().unwrap_or_default();
        let mut report = self.build_report(ticker, &specialists, analysis.messages, Some(reply));
        report.messages = report
            .research_notes
            .iter()
            .chain(report.analysis.iter())
            .cloned()
            .collect();
        Ok(report)
    }

    /// Ask the router which stages the follow-up needs
    async fn route_follow_up(
        &self,
        ticker: &str,
        user_message: &str,
        summary: Option<&str>,
        history: &[ConversationTurn],
    ) -> Result<Vec<Stage>> {
        let prompt = prompts::router_prompt(
            ticker,
            summary,
            history,
            user_message,
            self.tooling.last_payload().as_ref(),
        );
        let outcome = self
            .run_agent(ROUTER_AGENT_NAME, ROUTER_INSTRUCTIONS, false, &prompt)
            .await?;
        let decision = outcome.messages.last().map(String::as_str).unwrap_or("");
        Ok(parse_stage_selection(decision))
    }

    async fn run_stage(&self, stage: Stage, prompt: String) -> Result<StageResult> {
        info!(stage = stage.name(), "running stage");
        let outcome = self
            .run_agent(
                stage.agent_name(),
                stage.instructions(),
                stage.uses_tools(),
                &prompt,
            )
            .await?;
        Ok(StageResult::new(stage, outcome.messages))
    }

    /// Create an ephemeral agent, run it once, and delete it best-effort
    async fn run_agent(
        &self,
        name: &str,
        instructions: &str,
        uses_tools: bool,
        prompt: &str,
    ) -> Result<RunOutcome> {
        let tools = if uses_tools {
            self.tooling.tool_definitions()
        } else {
            Vec::new()
        };
        let definition = AgentDefinition {
            model: self.model.clone(),
            name: format!("{name}-{}", Uuid::new_v4().simple()),
            instructions: instructions.to_string(),
            tools,
        };
        let agent = self.client.create_agent(&definition).await?;

        let provider = uses_tools.then_some(self.tooling.as_ref() as &dyn ToolProvider);
        let result = self.runner.run(&agent, prompt, provider).await;

        self.delete_agent(&agent).await;
        Ok(result?)
    }

    async fn delete_agent(&self, agent: &Agent) {
        if let Err(err) = self.client.delete_agent(&agent.id).await {
            warn!(agent_id = %agent.id, error = %err, "failed to delete agent");
        }
    }

    /// Flatten the tooling cache and stage output into the final report
    fn build_report(
        &self,
        ticker: &str,
        stage_results: &[StageResult],
        analysis: Vec<String>,
        reply: Option<String>,
    ) -> ResearchReport {
        let payload = self
            .tooling
            .last_payload()
            .unwrap_or_else(|| fallback_payload(ticker));
        let organic_results = if payload.organic_results.is_empty() {
            self.tooling.last_news_results()
        } else {
            payload.organic_results
        };
        ResearchReport {
            ticker: ticker.to_uppercase(),
            quote: payload.quote,
            news: payload.news,
            organic_results,
            historical: payload.historical,
            metrics: payload.metrics,
            research_notes: format_stage_notes(stage_results),
            analysis,
            reply,
            messages: Vec::new(),
        }
    }
}

/// One labelled line per specialist message, in stage order
fn format_stage_notes(stage_results: &[StageResult]) -> Vec<String> {
    stage_results
        .iter()
        .flat_map(|result| {
            result
                .messages
                .iter()
                .map(|message| format!("{}: {message}", result.stage.label()))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use marketbrief_agents::models::{
        MessageContent, Run, RunStatus, TextContent, Thread, ThreadMessage, ToolOutput,
    };
    use serde_json::{Value, json};
    use std::collections::VecDeque;
    use std::sync::Mutex;

    use crate::api::{DailyBar, NewsDataSource, PrevCloseQuote, PriceDataSource};
    use crate::models::NewsHeadline;

    /// Client whose runs complete immediately, replying with scripted text
    ///
    /// Each created run consumes the next scripted reply and produces one
    /// assistant message attributed to that run.
    struct StubClient {
        replies: Mutex<VecDeque<String>>,
        created_agents: Mutex<Vec<String>>,
        messages: Mutex<Vec<ThreadMessage>>,
        run_count: Mutex<u32>,
    }

    impl StubClient {
        fn new(replies: Vec<&str>) -> Self {
            Self {
                replies: Mutex::new(replies.into_iter().map(str::to_string).collect()),
                created_agents: Mutex::new(Vec::new()),
                messages: Mutex::new(Vec::new()),
                run_count: Mutex::new(0),
            }
        }

        fn agent_names(&self) -> Vec<String> {
            self.created_agents.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl AgentsClient for StubClient {
        async fn create_agent(&self, definition: &AgentDefinition) -> marketbrief_agents::Result<Agent> {
            self.created_agents
                .lock()
                .unwrap()
                .push(definition.name.clone());
            Ok(Agent {
                id: format!("agent-{}", definition.name),
                name: definition.name.clone(),
            })
        }

        async fn delete_agent(&self, _agent_id: &str) -> marketbrief_agents::Result<()> {
            Ok(())
        }

        async fn create_thread(&self) -> marketbrief_agents::Result<Thread> {
            Ok(Thread {
                id: "thread-1".to_string(),
            })
        }

        async fn delete_thread(&self, _thread_id: &str) -> marketbrief_agents::Result<()> {
            Ok(())
        }

        async fn create_message(
            &self,
            thread_id: &str,
            role: &str,
            content: &str,
        ) -> marketbrief_agents::Result<ThreadMessage> {
            let _ = (thread_id, role, content);
            Ok(ThreadMessage {
                id: "msg-user".to_string(),
                role: "user".to_string(),
                run_id: None,
                content: vec![],
            })
        }

        async fn create_run(
            &self,
            _thread_id: &str,
            _agent_id: &str,
        ) -> marketbrief_agents::Result<Run> {
            let mut count = self.run_count.lock().unwrap();
            *count += 1;
            let run_id = format!("run-{count}");
            let reply = self
                .replies
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| "done".to_string());
            self.messages.lock().unwrap().push(ThreadMessage {
                id: format!("msg-{count}"),
                role: "assistant".to_string(),
                run_id: Some(run_id.clone()),
                content: vec![MessageContent::Text {
                    text: TextContent { value: reply },
                }],
            });
            Ok(Run {
                id: run_id,
                thread_id: "thread-1".to_string(),
                status: RunStatus::Completed,
                required_action: None,
            })
        }

        async fn get_run(
            &self,
            _thread_id: &str,
            run_id: &str,
        ) -> marketbrief_agents::Result<Run> {
            Ok(Run {
                id: run_id.to_string(),
                thread_id: "thread-1".to_string(),
                status: RunStatus::Completed,
                required_action: None,
            })
        }

        async fn submit_tool_outputs(
            &self,
            _thread_id: &str,
            run_id: &str,
            _outputs: Vec<ToolOutput>,
        ) -> marketbrief_agents::Result<Run> {
            Ok(Run {
                id: run_id.to_string(),
                thread_id: "thread-1".to_string(),
                status: RunStatus::Completed,
                required_action: None,
            })
        }

        async fn list_messages(
            &self,
            _thread_id: &str,
        ) -> marketbrief_agents::Result<Vec<ThreadMessage>> {
            Ok(self.messages.lock().unwrap().clone())
        }
    }

    struct StubPrices;

    #[async_trait]
    impl PriceDataSource for StubPrices {
        async fn previous_close(&self, ticker: &str) -> Result<PrevCloseQuote> {
            Ok(PrevCloseQuote {
                ticker: ticker.to_uppercase(),
                close: 400.5,
                open: Some(395.0),
                as_of: chrono::Utc::now(),
            })
        }

        async fn recent_bars(&self, _ticker: &str, _days: usize) -> Result<Vec<DailyBar>> {
            Ok(vec![])
        }
    }

    struct StubNews;

    #[async_trait]
    impl NewsDataSource for StubNews {
        async fn fetch_news(&self, _query: &str) -> Result<Vec<NewsHeadline>> {
            Ok(vec![])
        }

        async fn search_web(&self, _query: &str) -> Result<Vec<Value>> {
            Ok(vec![])
        }
    }

    fn orchestrator(replies: Vec<&str>) -> (Orchestrator, Arc<StubClient>) {
        let client = Arc::new(StubClient::new(replies));
        let tooling = Arc::new(ResearchTooling::new(Arc::new(StubPrices), Arc::new(StubNews)));
        let orchestrator = Orchestrator::new(
            Arc::clone(&client) as Arc<dyn AgentsClient>,
            tooling,
            "gpt-4o-mini",
        );
        (orchestrator, client)
    }

    fn assert_agent_order(names: &[String], expected: &[&str]) {
        assert_eq!(names.len(), expected.len(), "agent count: {names:?}");
        for (name, prefix) in names.iter().zip(expected) {
            assert!(
                name.starts_with(prefix),
                "expected {name:?} to start with {prefix:?}"
            );
        }
    }

    #[tokio::test]
    async fn test_fresh_briefing_runs_all_stages_in_order() {
        let (orchestrator, client) =
            orchestrator(vec!["price notes", "news notes", "final analysis"]);
        let report = orchestrator.run_fresh("msft").await.unwrap();

        assert_agent_order(
            &client.agent_names(),
            &["price-specialist-", "news-researcher-", "lead-analyst-"],
        );
        assert_eq!(report.ticker, "MSFT");
        assert_eq!(
            report.research_notes,
            vec![
                "Price Specialist: price notes".to_string(),
                "News Researcher: news notes".to_string(),
            ]
        );
        assert_eq!(report.analysis, vec!["final analysis".to_string()]);
        assert!(report.reply.is_none());
    }

    #[tokio::test]
    async fn test_fresh_briefing_without_tool_calls_uses_bare_quote() {
        let (orchestrator, _client) = orchestrator(vec!["a", "b", "c"]);
        let report = orchestrator.run_fresh("msft").await.unwrap();
        // no stage called lookup_stock_overview, so the cache stayed empty
        assert_eq!(report.quote.ticker, "MSFT");
        assert!(report.quote.price.is_none());
    }

    #[tokio::test]
    async fn test_follow_up_runs_only_routed_stages() {
        let router_reply =
            json!({ "stages": ["news"], "reason": "headline question" }).to_string();
        let (orchestrator, client) =
            orchestrator(vec![&router_reply, "fresh headlines", "updated analysis"]);

        let history = vec![ConversationTurn::user("What moved the stock?")];
        let report = orchestrator
            .run_follow_up("msft", "any new headlines?", Some("Prior summary."), &history)
            .await
            .unwrap();

        assert_agent_order(
            &client.agent_names(),
            &["followup-router-", "news-researcher-", "lead-analyst-"],
        );
        assert_eq!(report.reply.as_deref(), Some("updated analysis"));
        assert_eq!(
            report.messages,
            vec![
                "News Researcher: fresh headlines".to_string(),
                "updated analysis".to_string(),
            ]
        );
    }

    #[tokio::test]
    async fn test_follow_up_with_unparseable_router_reply_still_analyzes() {
        let (orchestrator, client) = orchestrator(vec!["no json here", "analysis only"]);
        let report = orchestrator
            .run_follow_up("msft", "thoughts?", None, &[])
            .await
            .unwrap();

        assert_agent_order(&client.agent_names(), &["followup-router-", "lead-analyst-"]);
        assert!(report.research_notes.is_empty());
        assert_eq!(report.reply.as_deref(), Some("analysis only"));
    }

    #[test]
    fn test_format_stage_notes_labels_each_message() {
        let notes = format_stage_notes(&[
            StageResult::new(
                Stage::Price,
                vec!["first".to_string(), "second".to_string()],
            ),
            StageResult::new(Stage::News, vec![]),
        ]);
        assert_eq!(
            notes,
            vec![
                "Price Specialist: first".to_string(),
                "Price Specialist: second".to_string(),
            ]
        );
    }
}
