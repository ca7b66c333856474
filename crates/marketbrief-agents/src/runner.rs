//! Run engine for one agent invocation
//!
//! Drives a single run through its protocol: open a thread, post the prompt,
//! start the run, then poll until it completes. A run may pause with
//! `requires_action`, at which point the requested function calls are executed
//! through the stage's [`ToolProvider`] and their outputs submitted as one
//! batch before polling resumes.
//!
//! State machine over one run:
//!
//! ```text
//! CREATED -> { POLLING <-> AWAITING_TOOL_OUTPUTS } -> COMPLETED | FAILED
//! ```
//!
//! Timeout and terminal run failure are fatal; thread deletion is the only
//! tolerated failure in this module.

use async_trait::async_trait;
use serde_json::{Map, Value};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info};

use crate::client::AgentsClient;
use crate::error::{AgentError, Result};
use crate::models::{
    Agent, RequiredAction, Run, RunStatus, Thread, ToolCall, ToolDefinition, ToolOutput,
};
use crate::text::message_to_text;

const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(120);

/// Local function execution on behalf of a paused run
#[async_trait]
pub trait ToolProvider: Send + Sync {
    /// Function schemas to declare on the agent
    fn tool_definitions(&self) -> Vec<ToolDefinition>;

    /// Execute a named function with decoded JSON-object arguments
    ///
    /// Returns the serialized result string handed back to the remote model.
    async fn execute(&self, name: &str, arguments: &Map<String, Value>) -> Result<String>;
}

/// Result of one completed run
#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub run_id: String,
    pub thread_id: String,
    /// Assistant messages attributed to this run, rendered to plain text
    pub messages: Vec<String>,
}

/// Protocol state derived from the latest run snapshot
#[derive(Debug)]
enum RunState {
    /// Run is queued or in progress; keep polling
    Polling,
    /// Run paused and wants these tool calls serviced
    AwaitingToolOutputs(Vec<ToolCall>),
    Completed,
    Failed(RunStatus),
}

/// Drives agent runs against the hosting service
pub struct AgentRunner {
    client: Arc<dyn AgentsClient>,
    poll_interval: Duration,
    timeout: Duration,
}

impl AgentRunner {
    /// Create a runner with the default 1s poll interval and 120s deadline
    pub fn new(client: Arc<dyn AgentsClient>) -> Self {
        Self {
            client,
            poll_interval: DEFAULT_POLL_INTERVAL,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Set the poll interval
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Set the wall-clock deadline for one run
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Execute one run of `agent` with `prompt` as the user message
    ///
    /// `tools` must be `Some` for stages declared to use tools; a run that
    /// requests tool execution without a provider fails with
    /// [`AgentError::ToolsUnavailable`]. The conversation thread is deleted
    /// best-effort on every exit path.
    pub async fn run(
        &self,
        agent: &Agent,
        prompt: &str,
        tools: Option<&dyn ToolProvider>,
    ) -> Result<RunOutcome> {
        info!(agent_id = %agent.id, "starting agent run");
        let thread = self.client.create_thread().await?;
        debug!(thread_id = %thread.id, agent_id = %agent.id, "created thread");

        let result = self.drive(agent, &thread, prompt, tools).await;

        // Cleanup is advisory; a leaked thread is not worth failing the stage.
        if let Err(err) = self.client.delete_thread(&thread.id).await {
            debug!(thread_id = %thread.id, error = %err, "failed to delete thread");
        }
        result
    }

    async fn drive(
        &self,
        agent: &Agent,
        thread: &Thread,
        prompt: &str,
        tools: Option<&dyn ToolProvider>,
    ) -> Result<RunOutcome> {
        let message = self
            .client
            .create_message(&thread.id, "user", prompt)
            .await?;
        debug!(message_id = %message.id, thread_id = %thread.id, "posted user prompt");

        let mut run = self.client.create_run(&thread.id, &agent.id).await?;
        info!(run_id = %run.id, agent_id = %agent.id, "created run");

        let deadline = Instant::now() + self.timeout;
        loop {
            if Instant::now() > deadline {
                error!(run_id = %run.id, timeout_secs = self.timeout.as_secs(), "run timed out");
                return Err(AgentError::Timeout {
                    secs: self.timeout.as_secs(),
                });
            }

            match Self::classify(&run)? {
                RunState::Completed => {
                    debug!(run_id = %run.id, "run completed");
                    break;
                }
                RunState::Failed(status) => {
                    error!(run_id = %run.id, %status, "run reached terminal failure status");
                    return Err(AgentError::RunFailed { status });
                }
                RunState::AwaitingToolOutputs(calls) => {
                    debug!(run_id = %run.id, call_count = calls.len(), "run requires action");
                    let provider = tools.ok_or(AgentError::ToolsUnavailable)?;
                    let outputs = Self::service_tool_calls(&calls, provider).await?;
                    run = self
                        .client
                        .submit_tool_outputs(&thread.id, &run.id, outputs)
                        .await?;
                }
                RunState::Polling => {
                    tokio::time::sleep(self.poll_interval).await;
                    run = self.client.get_run(&thread.id, &run.id).await?;
                }
            }
        }

        let messages = self.collect_messages(&thread.id, &run.id).await;
        info!(
            run_id = %run.id,
            message_count = messages.len(),
            "run finished with assistant messages"
        );
        Ok(RunOutcome {
            run_id: run.id,
            thread_id: thread.id.clone(),
            messages,
        })
    }

    /// Map a run snapshot onto the protocol state machine
    fn classify(run: &Run) -> Result<RunState> {
        match run.status {
            RunStatus::Completed => Ok(RunState::Completed),
            RunStatus::Queued | RunStatus::InProgress => Ok(RunState::Polling),
            RunStatus::RequiresAction => match &run.required_action {
                Some(RequiredAction::SubmitToolOutputs {
                    submit_tool_outputs,
                }) => Ok(RunState::AwaitingToolOutputs(
                    submit_tool_outputs.tool_calls.clone(),
                )),
                other => Err(AgentError::UnexpectedResponse(format!(
                    "unsupported required action for run {}: {other:?}",
                    run.id
                ))),
            },
            status if status.is_terminal_failure() => Ok(RunState::Failed(status)),
            status => Err(AgentError::UnexpectedResponse(format!(
                "unhandled run status: {status}"
            ))),
        }
    }

    /// Execute every function call in the batch and collect one output each
    ///
    /// Calls whose type is not `function` are skipped; the service does not
    /// emit other call types today. An entirely empty batch is a protocol
    /// violation rather than an empty submission.
    async fn service_tool_calls(
        calls: &[ToolCall],
        provider: &dyn ToolProvider,
    ) -> Result<Vec<ToolOutput>> {
        let mut outputs = Vec::new();
        for call in calls {
            if call.kind != "function" {
                debug!(call_id = %call.id, kind = %call.kind, "skipping non-function tool call");
                continue;
            }
            let arguments = parse_function_arguments(&call.function.arguments)?;
            info!(
                function = %call.function.name,
                call_id = %call.id,
                "executing function call"
            );
            let output = provider.execute(&call.function.name, &arguments).await?;
            outputs.push(ToolOutput {
                tool_call_id: call.id.clone(),
                output,
            });
        }
        if outputs.is_empty() {
            error!("tool outputs requested but none were generated");
            return Err(AgentError::NoToolOutputs);
        }
        Ok(outputs)
    }

    /// Collect assistant messages belonging to this run specifically
    ///
    /// Messages are filtered by the owning run id, not just the thread, and
    /// rendered to plain text. Listing failures degrade to an empty result.
    async fn collect_messages(&self, thread_id: &str, run_id: &str) -> Vec<String> {
        let listed = match self.client.list_messages(thread_id).await {
            Ok(listed) => listed,
            Err(err) => {
                debug!(%thread_id, error = %err, "failed to list thread messages");
                return Vec::new();
            }
        };
        listed
            .iter()
            .filter(|message| message.role == "assistant")
            .filter(|message| message.run_id.as_deref() == Some(run_id))
            .map(message_to_text)
            .filter(|rendered| !rendered.is_empty())
            .collect()
    }
}

/// Decode a raw JSON argument string into an argument map
///
/// Blank input decodes to an empty argument set; anything else must parse to
/// a JSON object.
fn parse_function_arguments(raw: &str) -> Result<Map<String, Value>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Ok(Map::new());
    }
    let parsed: Value = serde_json::from_str(raw)
        .map_err(|err| AgentError::InvalidToolArguments(format!("not valid JSON: {err}")))?;
    match parsed {
        Value::Object(map) => Ok(map),
        other => Err(AgentError::InvalidToolArguments(format!(
            "arguments must decode to a JSON object, got: {other}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AgentDefinition, FunctionCall, SubmitToolOutputs, ThreadMessage};
    use serde_json::json;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// Scripted client: feeds a fixed sequence of run snapshots to the poll
    /// loop and records what the runner submitted and deleted.
    struct ScriptedClient {
        runs: Mutex<VecDeque<Run>>,
        messages: Vec<ThreadMessage>,
        submitted: Mutex<Vec<Vec<ToolOutput>>>,
        deleted_threads: Mutex<Vec<String>>,
        fail_thread_delete: bool,
    }

    impl ScriptedClient {
        fn new(runs: Vec<Run>, messages: Vec<ThreadMessage>) -> Self {
            Self {
                runs: Mutex::new(runs.into()),
                messages,
                submitted: Mutex::new(Vec::new()),
                deleted_threads: Mutex::new(Vec::new()),
                fail_thread_delete: false,
            }
        }

        fn next_run(&self) -> Run {
            self.runs
                .lock()
                .unwrap()
                .pop_front()
                .expect("script exhausted")
        }
    }

    #[async_trait]
    impl AgentsClient for ScriptedClient {
        async fn create_agent(&self, definition: &AgentDefinition) -> Result<crate::models::Agent> {
            Ok(crate::models::Agent {
                id: "agent_1".to_string(),
                name: definition.name.clone(),
            })
        }

        async fn delete_agent(&self, _agent_id: &str) -> Result<()> {
            Ok(())
        }

        async fn create_thread(&self) -> Result<Thread> {
            Ok(Thread {
                id: "thread_1".to_string(),
            })
        }

        async fn delete_thread(&self, thread_id: &str) -> Result<()> {
            self.deleted_threads
                .lock()
                .unwrap()
                .push(thread_id.to_string());
            if self.fail_thread_delete {
                return Err(AgentError::Api {
                    status: 500,
                    message: "boom".to_string(),
                });
            }
            Ok(())
        }

        async fn create_message(
            &self,
            _thread_id: &str,
            role: &str,
            _content: &str,
        ) -> Result<ThreadMessage> {
            Ok(ThreadMessage {
                id: "msg_user".to_string(),
                role: role.to_string(),
                run_id: None,
                content: vec![],
            })
        }

        async fn create_run(&self, _thread_id: &str, _agent_id: &str) -> Result<Run> {
            Ok(self.next_run())
        }

        async fn get_run(&self, _thread_id: &str, _run_id: &str) -> Result<Run> {
            Ok(self.next_run())
        }

        async fn submit_tool_outputs(
            &self,
            _thread_id: &str,
            _run_id: &str,
            outputs: Vec<ToolOutput>,
        ) -> Result<Run> {
            self.submitted.lock().unwrap().push(outputs);
            Ok(self.next_run())
        }

        async fn list_messages(&self, _thread_id: &str) -> Result<Vec<ThreadMessage>> {
            Ok(self.messages.clone())
        }
    }

    struct EchoTools;

    #[async_trait]
    impl ToolProvider for EchoTools {
        fn tool_definitions(&self) -> Vec<ToolDefinition> {
            vec![]
        }

        async fn execute(&self, name: &str, arguments: &Map<String, Value>) -> Result<String> {
            Ok(json!({ "function": name, "arguments": arguments }).to_string())
        }
    }

    fn run_snapshot(status: RunStatus) -> Run {
        Run {
            id: "run_1".to_string(),
            thread_id: "thread_1".to_string(),
            status,
            required_action: None,
        }
    }

    fn requires_action(calls: Vec<ToolCall>) -> Run {
        Run {
            id: "run_1".to_string(),
            thread_id: "thread_1".to_string(),
            status: RunStatus::RequiresAction,
            required_action: Some(RequiredAction::SubmitToolOutputs {
                submit_tool_outputs: SubmitToolOutputs { tool_calls: calls },
            }),
        }
    }

    fn function_call(id: &str, name: &str, arguments: &str) -> ToolCall {
        ToolCall {
            id: id.to_string(),
            kind: "function".to_string(),
            function: FunctionCall {
                name: name.to_string(),
                arguments: arguments.to_string(),
            },
        }
    }

    fn assistant_message(id: &str, run_id: &str, text: &str) -> ThreadMessage {
        serde_json::from_value(json!({
            "id": id,
            "role": "assistant",
            "run_id": run_id,
            "content": [{"type": "text", "text": {"value": text}}]
        }))
        .unwrap()
    }

    fn agent() -> Agent {
        Agent {
            id: "agent_1".to_string(),
            name: "price-specialist".to_string(),
        }
    }

    fn fast_runner(client: Arc<ScriptedClient>) -> AgentRunner {
        AgentRunner::new(client)
            .with_poll_interval(Duration::from_millis(1))
            .with_timeout(Duration::from_secs(5))
    }

    #[tokio::test]
    async fn test_run_completes_and_filters_messages_by_run() {
        let messages = vec![
            assistant_message("msg_1", "run_1", "Price snapshot ready."),
            assistant_message("msg_2", "run_other", "From another run."),
        ];
        let client = Arc::new(ScriptedClient::new(
            vec![
                run_snapshot(RunStatus::InProgress),
                run_snapshot(RunStatus::Completed),
            ],
            messages,
        ));
        let runner = fast_runner(client.clone());

        let outcome = runner.run(&agent(), "prompt", None).await.unwrap();
        assert_eq!(outcome.run_id, "run_1");
        assert_eq!(outcome.messages, vec!["Price snapshot ready.".to_string()]);
        assert_eq!(
            client.deleted_threads.lock().unwrap().as_slice(),
            ["thread_1".to_string()]
        );
    }

    #[tokio::test]
    async fn test_requires_action_services_tool_calls() {
        let client = Arc::new(ScriptedClient::new(
            vec![
                requires_action(vec![
                    function_call("call_1", "lookup_stock_overview", r#"{"ticker": "MSFT"}"#),
                    function_call("call_2", "search_related_news", ""),
                ]),
                run_snapshot(RunStatus::Completed),
            ],
            vec![assistant_message("msg_1", "run_1", "Done.")],
        ));
        let runner = fast_runner(client.clone());

        let outcome = runner
            .run(&agent(), "prompt", Some(&EchoTools))
            .await
            .unwrap();
        assert_eq!(outcome.messages, vec!["Done.".to_string()]);

        let submitted = client.submitted.lock().unwrap();
        assert_eq!(submitted.len(), 1);
        assert_eq!(submitted[0].len(), 2);
        assert_eq!(submitted[0][0].tool_call_id, "call_1");
        assert_eq!(submitted[0][1].tool_call_id, "call_2");
    }

    #[tokio::test]
    async fn test_requires_action_without_provider_fails() {
        let client = Arc::new(ScriptedClient::new(
            vec![requires_action(vec![function_call(
                "call_1",
                "lookup_stock_overview",
                "{}",
            )])],
            vec![],
        ));
        let runner = fast_runner(client);

        let err = runner.run(&agent(), "prompt", None).await.unwrap_err();
        assert!(matches!(err, AgentError::ToolsUnavailable));
    }

    #[tokio::test]
    async fn test_terminal_status_fails_run() {
        let client = Arc::new(ScriptedClient::new(
            vec![
                run_snapshot(RunStatus::Queued),
                run_snapshot(RunStatus::Failed),
            ],
            vec![],
        ));
        let runner = fast_runner(client.clone());

        let err = runner.run(&agent(), "prompt", None).await.unwrap_err();
        assert!(matches!(
            err,
            AgentError::RunFailed {
                status: RunStatus::Failed
            }
        ));
        // Thread cleanup still happens on the failure path.
        assert_eq!(client.deleted_threads.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_timeout_aborts_run() {
        // Enough in-progress snapshots that the deadline trips first.
        let snapshots = std::iter::repeat_with(|| run_snapshot(RunStatus::InProgress))
            .take(64)
            .collect();
        let client = Arc::new(ScriptedClient::new(snapshots, vec![]));
        let runner = AgentRunner::new(client)
            .with_poll_interval(Duration::from_millis(1))
            .with_timeout(Duration::from_millis(10));

        let err = runner.run(&agent(), "prompt", None).await.unwrap_err();
        assert!(matches!(err, AgentError::Timeout { .. }));
    }

    #[tokio::test]
    async fn test_non_function_calls_filtered_and_empty_batch_rejected() {
        let mut call = function_call("call_1", "lookup_stock_overview", "{}");
        call.kind = "code_interpreter".to_string();
        let client = Arc::new(ScriptedClient::new(
            vec![requires_action(vec![call])],
            vec![],
        ));
        let runner = fast_runner(client);

        let err = runner
            .run(&agent(), "prompt", Some(&EchoTools))
            .await
            .unwrap_err();
        assert!(matches!(err, AgentError::NoToolOutputs));
    }

    #[tokio::test]
    async fn test_thread_delete_failure_is_swallowed() {
        let mut client = ScriptedClient::new(
            vec![run_snapshot(RunStatus::Completed)],
            vec![assistant_message("msg_1", "run_1", "ok")],
        );
        client.fail_thread_delete = true;
        let runner = fast_runner(Arc::new(client));

        let outcome = runner.run(&agent(), "prompt", None).await.unwrap();
        assert_eq!(outcome.messages, vec!["ok".to_string()]);
    }

    #[test]
    fn test_parse_function_arguments_blank() {
        assert!(parse_function_arguments("").unwrap().is_empty());
        assert!(parse_function_arguments("   ").unwrap().is_empty());
    }

    #[test]
    fn test_parse_function_arguments_object() {
        let args = parse_function_arguments(r#"{"ticker": "MSFT"}"#).unwrap();
        assert_eq!(args.get("ticker"), Some(&Value::from("MSFT")));
    }

    #[test]
    fn test_parse_function_arguments_rejects_non_object() {
        assert!(matches!(
            parse_function_arguments("[]"),
            Err(AgentError::InvalidToolArguments(_))
        ));
        assert!(matches!(
            parse_function_arguments("not json"),
            Err(AgentError::InvalidToolArguments(_))
        ));
    }
}
