//! The shared agent loop.
//!
//! An agent is **configuration, not a subtype**: an [`AgentRole`] bundles a
//! system prompt, an allowed tool subset, and an expected output schema, and
//! every role is driven by the same [`AgentRunner::run`] loop.  New roles are
//! new values.
//!
//! The loop is an explicit state machine:
//!
//! ```text
//! Reasoning ──ToolCalls──> ToolDispatch ──> Reasoning
//!     │                                        │
//!     ├──Final (valid)─────> Terminal(Success) │
//!     ├──Final (invalid)──── corrective ───────┘
//!     └──Malformed ───────── corrective ───────┘
//! ```
//!
//! A step is recorded for every decision the model makes; the step counter is
//! enforced unconditionally and is the loop's sole non-termination safeguard.
//! Corrective retries (malformed output, final answers failing schema
//! validation) share one bounded budget.

use std::collections::BTreeSet;
use std::sync::Arc;

use serde_json::Value;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use waypoint_kernel::{CompiledSchema, ToolInvoker};

use crate::context::{ContextConfig, Conversation};
use crate::llm::types::{Decision, Message};
use crate::llm::client::ModelClient;

// ---------------------------------------------------------------------------
// Role configuration
// ---------------------------------------------------------------------------

/// A named role consumed by the shared loop.
#[derive(Debug, Clone)]
pub struct AgentRole {
    /// Role name, used for logging and facet reporting.
    pub name: String,
    /// Role-specific system instructions.
    pub system_prompt: String,
    /// Tools this role may invoke.  Calls outside the set fail closed.
    pub allowed_tools: BTreeSet<String>,
    /// JSON Schema the final answer must satisfy.
    pub output_schema: Value,
}

impl AgentRole {
    /// Create a role.
    pub fn new(
        name: impl Into<String>,
        system_prompt: impl Into<String>,
        allowed_tools: impl IntoIterator<Item = String>,
        output_schema: Value,
    ) -> Self {
        Self {
            name: name.into(),
            system_prompt: system_prompt.into(),
            allowed_tools: allowed_tools.into_iter().collect(),
            output_schema,
        }
    }
}

// ---------------------------------------------------------------------------
// Loop configuration and outcome
// ---------------------------------------------------------------------------

/// Configuration for the reasoning loop.
#[derive(Debug, Clone)]
pub struct LoopConfig {
    /// Maximum model decisions per run.  Prevents runaway reasoning.
    pub max_steps: u32,
    /// Corrective retries allowed for malformed or schema-violating output.
    pub retry_budget: u32,
    /// Context-size policy for the run's conversation.
    pub context: ContextConfig,
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self {
            max_steps: 16,
            retry_budget: 3,
            context: ContextConfig::default(),
        }
    }
}

/// Why a run ended in failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureCause {
    /// Model output stayed unusable past the retry budget, or the model
    /// endpoint failed.
    Reasoning { reason: String },
    /// The step counter hit the configured maximum.
    StepLimitExceeded { max_steps: u32 },
    /// The caller cancelled the run.
    Cancelled,
}

impl std::fmt::Display for FailureCause {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Reasoning { reason } => write!(f, "reasoning failure: {reason}"),
            Self::StepLimitExceeded { max_steps } => {
                write!(f, "step limit exceeded ({max_steps})")
            }
            Self::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// Terminal result of one agent run.
///
/// The conversation that produced it is destroyed when the run returns; only
/// the validated output (or the failure cause) escapes.
#[derive(Debug, Clone)]
pub enum AgentOutcome {
    /// The model produced a final answer that passed schema validation.
    Success {
        /// The validated answer.
        output: Value,
        /// Steps consumed.
        steps: u32,
    },
    /// The run ended without a usable answer.
    Failure {
        /// What went wrong.
        cause: FailureCause,
        /// Steps consumed before failing.
        steps: u32,
    },
}

impl AgentOutcome {
    /// Whether the run succeeded.
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }
}

// ---------------------------------------------------------------------------
// Runner
// ---------------------------------------------------------------------------

/// Drives any [`AgentRole`] through the reason→act→observe loop.
#[derive(Clone)]
pub struct AgentRunner {
    llm: Arc<dyn ModelClient>,
    invoker: Arc<ToolInvoker>,
    config: LoopConfig,
}

impl AgentRunner {
    /// Create a runner.
    pub fn new(llm: Arc<dyn ModelClient>, invoker: Arc<ToolInvoker>, config: LoopConfig) -> Self {
        Self {
            llm,
            invoker,
            config,
        }
    }

    /// The loop configuration.
    pub fn config(&self) -> &LoopConfig {
        &self.config
    }

    /// The tool invoker shared by all runs.
    pub fn invoker(&self) -> &Arc<ToolInvoker> {
        &self.invoker
    }

    /// Run one role to a terminal state.
    ///
    /// The conversation is created here, owned exclusively by this call, and
    /// dropped on return.  Tool-level failures are surfaced to the model as
    /// tool-error messages and never end the run by themselves.
    pub async fn run(
        &self,
        role: &AgentRole,
        task: &str,
        cancel: &CancellationToken,
    ) -> AgentOutcome {
        let run_id = Uuid::now_v7();
        let output_schema = match CompiledSchema::compile(&role.output_schema) {
            Ok(schema) => schema,
            Err(reason) => {
                // A role with a broken schema is a deployment defect; fail
                // the run rather than looping on unvalidatable answers.
                return AgentOutcome::Failure {
                    cause: FailureCause::Reasoning {
                        reason: format!("role `{}` has an invalid output schema: {reason}", role.name),
                    },
                    steps: 0,
                };
            }
        };

        let tools = self.invoker.registry().definitions_for(&role.allowed_tools);
        let mut conversation =
            Conversation::new(&role.system_prompt, task, self.config.context.clone());
        let mut corrective_retries = 0u32;

        tracing::info!(
            run_id = %run_id,
            role = %role.name,
            max_steps = self.config.max_steps,
            tool_count = tools.len(),
            "agent run started"
        );

        loop {
            let step = conversation.record_step();
            if step > self.config.max_steps {
                tracing::warn!(run_id = %run_id, role = %role.name, "step limit exceeded");
                return self.fail(
                    conversation,
                    FailureCause::StepLimitExceeded {
                        max_steps: self.config.max_steps,
                    },
                );
            }

            let decision = tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::info!(run_id = %run_id, role = %role.name, "run cancelled");
                    return self.fail(conversation, FailureCause::Cancelled);
                }
                result = self.llm.complete(conversation.messages(), &tools) => match result {
                    Ok(decision) => decision,
                    Err(err) => {
                        return self.fail(
                            conversation,
                            FailureCause::Reasoning {
                                reason: err.to_string(),
                            },
                        );
                    }
                },
            };

            match decision {
                Decision::ToolCalls(calls) if calls.is_empty() => {
                    if let Some(outcome) = self.correct(
                        &mut conversation,
                        &mut corrective_retries,
                        "response contained an empty tool-call batch",
                    ) {
                        return outcome;
                    }
                }

                Decision::ToolCalls(calls) => {
                    tracing::debug!(
                        run_id = %run_id,
                        role = %role.name,
                        step,
                        tools = ?calls.iter().map(|c| &c.name).collect::<Vec<_>>(),
                        "model requested tool calls"
                    );

                    if let Err(err) =
                        conversation.append(Message::assistant_tool_calls(calls.clone()))
                    {
                        return self.fail(
                            conversation,
                            FailureCause::Reasoning {
                                reason: err.to_string(),
                            },
                        );
                    }

                    // Dispatch sequentially so conversation ordering stays
                    // strict even when the model batches calls.
                    for call in &calls {
                        let outcome = tokio::select! {
                            _ = cancel.cancelled() => {
                                return self.fail(conversation, FailureCause::Cancelled);
                            }
                            outcome = self.invoker.invoke_allowed(call, &role.allowed_tools) => outcome,
                        };

                        if !outcome.is_success() {
                            tracing::debug!(
                                run_id = %run_id,
                                role = %role.name,
                                tool = %call.name,
                                "tool call failed, surfacing to model"
                            );
                        }

                        if let Err(err) = conversation
                            .append(Message::tool_result(outcome.call_id(), outcome.render()))
                        {
                            return self.fail(
                                conversation,
                                FailureCause::Reasoning {
                                    reason: err.to_string(),
                                },
                            );
                        }
                    }
                }

                Decision::Final(value) => match output_schema.validate(&value) {
                    Ok(()) => {
                        let steps = conversation.steps();
                        let _ = conversation.append(Message::assistant(value.to_string()));
                        conversation.terminate();
                        tracing::info!(
                            run_id = %run_id,
                            role = %role.name,
                            steps,
                            "agent run succeeded"
                        );
                        return AgentOutcome::Success {
                            output: value,
                            steps,
                        };
                    }
                    Err(reason) => {
                        if let Some(outcome) = self.correct(
                            &mut conversation,
                            &mut corrective_retries,
                            &format!("final answer failed schema validation: {reason}"),
                        ) {
                            return outcome;
                        }
                    }
                },

                Decision::Malformed { reason } => {
                    if let Some(outcome) =
                        self.correct(&mut conversation, &mut corrective_retries, &reason)
                    {
                        return outcome;
                    }
                }
            }
        }
    }

    /// Spend one corrective retry.  Returns the terminal outcome once the
    /// budget is exhausted, `None` while the loop may continue.
    fn correct(
        &self,
        conversation: &mut Conversation,
        retries: &mut u32,
        reason: &str,
    ) -> Option<AgentOutcome> {
        *retries += 1;
        if *retries > self.config.retry_budget {
            let steps = conversation.steps();
            conversation.terminate();
            return Some(AgentOutcome::Failure {
                cause: FailureCause::Reasoning {
                    reason: format!(
                        "unusable model output after {} corrective retries: {reason}",
                        self.config.retry_budget
                    ),
                },
                steps,
            });
        }

        tracing::debug!(retry = *retries, %reason, "injecting corrective message");
        let corrective = Message::system(format!(
            "Your previous response was invalid: {reason}. Respond with either a \
             tool call or a final JSON answer matching the required schema."
        ));
        if conversation.append(corrective).is_err() {
            let steps = conversation.steps();
            return Some(AgentOutcome::Failure {
                cause: FailureCause::Reasoning {
                    reason: "conversation rejected corrective message".into(),
                },
                steps,
            });
        }
        None
    }

    fn fail(&self, mut conversation: Conversation, cause: FailureCause) -> AgentOutcome {
        let steps = conversation.steps();
        conversation.terminate();
        AgentOutcome::Failure { cause, steps }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicU32, Ordering};
    use waypoint_kernel::{
        InvokerConfig, ToolClass, ToolDefinition, ToolHandler, ToolRegistry, ToolSpec,
    };

    use crate::error::Result as AgentResult;
    use crate::llm::types::Message;

    /// Model stub that replays a scripted decision sequence, then keeps
    /// returning `Malformed`.
    struct ScriptedModel {
        script: Mutex<Vec<Decision>>,
        calls: AtomicU32,
    }

    impl ScriptedModel {
        fn new(script: Vec<Decision>) -> Arc<Self> {
            Arc::new(Self {
                script: Mutex::new(script),
                calls: AtomicU32::new(0),
            })
        }

        fn call_count(&self) -> u32 {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl ModelClient for ScriptedModel {
        async fn complete(
            &self,
            _messages: &[Message],
            _tools: &[ToolDefinition],
        ) -> AgentResult<Decision> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let mut script = self.script.lock().unwrap();
            if script.is_empty() {
                Ok(Decision::Malformed {
                    reason: "scripted exhaustion".into(),
                })
            } else {
                Ok(script.remove(0))
            }
        }
    }

    struct CountingHandler {
        calls: AtomicU32,
    }

    #[async_trait]
    impl ToolHandler for CountingHandler {
        async fn call(&self, _arguments: serde_json::Value) -> waypoint_kernel::Result<serde_json::Value> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(json!({"ok": true}))
        }
    }

    fn invoker_with_tool(name: &str, handler: Arc<CountingHandler>) -> Arc<ToolInvoker> {
        let registry = Arc::new(ToolRegistry::new());
        registry
            .register(ToolSpec::new(
                name,
                "Counting test tool",
                ToolClass::Local,
                json!({"type": "object"}),
                json!({"type": "object"}),
                handler,
            ))
            .expect("registration");
        Arc::new(ToolInvoker::new(registry, InvokerConfig::default()))
    }

    fn role_with_tools(tools: &[&str]) -> AgentRole {
        AgentRole::new(
            "tester",
            "You are a test agent.",
            tools.iter().map(|s| s.to_string()),
            json!({
                "type": "object",
                "required": ["answer"],
                "properties": {"answer": {"type": "string"}}
            }),
        )
    }

    fn tool_call(n: u32, name: &str) -> waypoint_kernel::ToolCall {
        waypoint_kernel::ToolCall {
            id: format!("tc_{n}"),
            name: name.into(),
            arguments: json!({}),
        }
    }

    #[tokio::test]
    async fn always_malformed_fails_after_exact_retry_budget() {
        let model = ScriptedModel::new(vec![]);
        let handler = Arc::new(CountingHandler {
            calls: AtomicU32::new(0),
        });
        let runner = AgentRunner::new(
            model.clone(),
            invoker_with_tool("echo", handler),
            LoopConfig {
                retry_budget: 2,
                ..LoopConfig::default()
            },
        );

        let outcome = runner
            .run(&role_with_tools(&["echo"]), "task", &CancellationToken::new())
            .await;

        match outcome {
            AgentOutcome::Failure {
                cause: FailureCause::Reasoning { .. },
                ..
            } => {}
            other => panic!("expected reasoning failure, got {other:?}"),
        }
        // Initial attempt plus exactly `retry_budget` corrective retries.
        assert_eq!(model.call_count(), 3);
    }

    #[tokio::test]
    async fn forbidden_tool_never_reaches_handler() {
        let script: Vec<Decision> = (0..8)
            .map(|n| Decision::ToolCalls(vec![tool_call(n, "secret_tool")]))
            .collect();
        let model = ScriptedModel::new(script);
        let handler = Arc::new(CountingHandler {
            calls: AtomicU32::new(0),
        });
        let runner = AgentRunner::new(
            model,
            invoker_with_tool("secret_tool", handler.clone()),
            LoopConfig {
                max_steps: 4,
                ..LoopConfig::default()
            },
        );

        // Role may only use `echo`; the model insists on `secret_tool`.
        let outcome = runner
            .run(&role_with_tools(&["echo"]), "task", &CancellationToken::new())
            .await;

        match outcome {
            AgentOutcome::Failure {
                cause: FailureCause::StepLimitExceeded { max_steps: 4 },
                ..
            } => {}
            other => panic!("expected step limit, got {other:?}"),
        }
        assert_eq!(handler.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn tool_then_final_succeeds() {
        let model = ScriptedModel::new(vec![
            Decision::ToolCalls(vec![tool_call(0, "echo")]),
            Decision::Final(json!({"answer": "done"})),
        ]);
        let handler = Arc::new(CountingHandler {
            calls: AtomicU32::new(0),
        });
        let runner = AgentRunner::new(
            model,
            invoker_with_tool("echo", handler.clone()),
            LoopConfig::default(),
        );

        let outcome = runner
            .run(&role_with_tools(&["echo"]), "task", &CancellationToken::new())
            .await;

        match outcome {
            AgentOutcome::Success { output, steps } => {
                assert_eq!(output["answer"], "done");
                assert_eq!(steps, 2);
            }
            other => panic!("expected success, got {other:?}"),
        }
        assert_eq!(handler.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn invalid_final_answer_gets_corrective_retry() {
        let model = ScriptedModel::new(vec![
            Decision::Final(json!({"wrong_key": 1})),
            Decision::Final(json!({"answer": "fixed"})),
        ]);
        let handler = Arc::new(CountingHandler {
            calls: AtomicU32::new(0),
        });
        let runner = AgentRunner::new(
            model.clone(),
            invoker_with_tool("echo", handler),
            LoopConfig::default(),
        );

        let outcome = runner
            .run(&role_with_tools(&["echo"]), "task", &CancellationToken::new())
            .await;

        assert!(outcome.is_success());
        assert_eq!(model.call_count(), 2);
    }

    #[tokio::test]
    async fn step_limit_enforced_on_endless_tool_calls() {
        let script: Vec<Decision> = (0..32)
            .map(|n| Decision::ToolCalls(vec![tool_call(n, "echo")]))
            .collect();
        let model = ScriptedModel::new(script);
        let handler = Arc::new(CountingHandler {
            calls: AtomicU32::new(0),
        });
        let runner = AgentRunner::new(
            model,
            invoker_with_tool("echo", handler.clone()),
            LoopConfig {
                max_steps: 5,
                ..LoopConfig::default()
            },
        );

        let outcome = runner
            .run(&role_with_tools(&["echo"]), "task", &CancellationToken::new())
            .await;

        match outcome {
            AgentOutcome::Failure {
                cause: FailureCause::StepLimitExceeded { .. },
                steps,
            } => assert_eq!(steps, 6),
            other => panic!("expected step limit, got {other:?}"),
        }
        // Exactly max_steps decisions executed tools.
        assert_eq!(handler.calls.load(Ordering::SeqCst), 5);
    }

    /// Model that blocks until cancelled.
    struct BlockingModel;

    #[async_trait]
    impl ModelClient for BlockingModel {
        async fn complete(
            &self,
            _messages: &[Message],
            _tools: &[ToolDefinition],
        ) -> AgentResult<Decision> {
            std::future::pending::<()>().await;
            unreachable!()
        }
    }

    #[tokio::test]
    async fn cancellation_unwinds_blocked_reasoning() {
        let handler = Arc::new(CountingHandler {
            calls: AtomicU32::new(0),
        });
        let runner = AgentRunner::new(
            Arc::new(BlockingModel),
            invoker_with_tool("echo", handler),
            LoopConfig::default(),
        );
        let cancel = CancellationToken::new();

        let child = cancel.child_token();
        let handle = tokio::spawn(async move {
            runner.run(&role_with_tools(&["echo"]), "task", &child).await
        });

        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        cancel.cancel();

        let outcome = handle.await.expect("task joins");
        match outcome {
            AgentOutcome::Failure {
                cause: FailureCause::Cancelled,
                ..
            } => {}
            other => panic!("expected cancellation, got {other:?}"),
        }
    }
}
