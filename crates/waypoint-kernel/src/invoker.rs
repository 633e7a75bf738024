//! Protocol client: validated, time-bounded tool dispatch.
//!
//! [`ToolInvoker::invoke`] is the single path between the reasoning loop and
//! tool handlers.  For every call it performs, in order:
//!
//! 1. Registry lookup (`unknown_tool` on miss).
//! 2. Circuit-breaker admission (`circuit_open` without touching the handler).
//! 3. Input-schema validation — an invalid call **fails closed** and never
//!    reaches the handler.
//! 4. Handler execution under a per-tool-class timeout.
//! 5. Output-schema validation — a misbehaving provider must not corrupt
//!    downstream state, so a mismatched success payload becomes a failure.
//!
//! Every failure is returned as a [`ToolOutcome::Failure`] value rather than
//! an `Err`: the agent loop must be able to continue after a single tool
//! fault, surfacing the failure to the model as a tool-error message.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use crate::breaker::{BreakerConfig, BreakerSet};
use crate::error::ToolError;
use crate::registry::{RegisteredTool, ToolRegistry};
use crate::tool::{FailureKind, ToolCall, ToolClass, ToolOutcome};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Timeout and breaker configuration for the invoker.
#[derive(Debug, Clone)]
pub struct InvokerConfig {
    /// Timeout for [`ToolClass::Local`] tools.
    pub local_timeout: Duration,
    /// Timeout for [`ToolClass::Provider`] tools.
    pub provider_timeout: Duration,
    /// Per-tool overrides, keyed by tool name; wins over the class default.
    pub timeout_overrides: HashMap<String, Duration>,
    /// Thresholds for the per-tool circuit breakers.
    pub breaker: BreakerConfig,
}

impl Default for InvokerConfig {
    fn default() -> Self {
        Self {
            local_timeout: Duration::from_secs(5),
            provider_timeout: Duration::from_secs(30),
            timeout_overrides: HashMap::new(),
            breaker: BreakerConfig::default(),
        }
    }
}

// ---------------------------------------------------------------------------
// Invoker
// ---------------------------------------------------------------------------

/// Dispatches validated tool calls against the registry.
///
/// Knows nothing about agents or the reasoning model; the only agent-specific
/// entry point is [`invoke_allowed`](Self::invoke_allowed), which rejects
/// calls outside a caller-supplied allowed set before any other processing.
pub struct ToolInvoker {
    registry: Arc<ToolRegistry>,
    breakers: BreakerSet,
    config: InvokerConfig,
}

impl ToolInvoker {
    /// Create an invoker over a populated registry.
    pub fn new(registry: Arc<ToolRegistry>, config: InvokerConfig) -> Self {
        let breakers = BreakerSet::new(config.breaker.clone());
        Self {
            registry,
            breakers,
            config,
        }
    }

    /// The registry this invoker dispatches against.
    pub fn registry(&self) -> &Arc<ToolRegistry> {
        &self.registry
    }

    /// Invoke a tool call, restricted to an allowed subset of tool names.
    ///
    /// A call outside the set fails with `forbidden` without reaching the
    /// registry or the handler.
    pub async fn invoke_allowed(
        &self,
        call: &ToolCall,
        allowed: &std::collections::BTreeSet<String>,
    ) -> ToolOutcome {
        if !allowed.contains(&call.name) {
            tracing::warn!(tool = %call.name, call_id = %call.id, "forbidden tool call");
            return failure(
                call,
                FailureKind::Forbidden,
                ToolError::Forbidden {
                    name: call.name.clone(),
                }
                .to_string(),
            );
        }
        self.invoke(call).await
    }

    /// Invoke a tool call.
    pub async fn invoke(&self, call: &ToolCall) -> ToolOutcome {
        let tool = match self.registry.lookup(&call.name) {
            Ok(tool) => tool,
            Err(err) => {
                tracing::warn!(tool = %call.name, call_id = %call.id, "unknown tool");
                return failure(call, FailureKind::UnknownTool, err.to_string());
            }
        };

        let breaker = self.breakers.breaker(&call.name);
        if !breaker.try_acquire() {
            tracing::warn!(tool = %call.name, call_id = %call.id, "circuit open, call rejected");
            return failure(
                call,
                FailureKind::CircuitOpen,
                ToolError::CircuitOpen {
                    name: call.name.clone(),
                }
                .to_string(),
            );
        }

        // Fail closed on bad arguments.  Not recorded against the breaker:
        // the upstream provider is healthy, the model produced a bad call.
        if let Err(reason) = tool.input.validate(&call.arguments) {
            tracing::warn!(tool = %call.name, call_id = %call.id, %reason, "argument validation failed");
            return failure(call, FailureKind::InvalidArguments, reason);
        }

        let timeout = self.timeout_for(&tool);
        let started = std::time::Instant::now();
        let result =
            tokio::time::timeout(timeout, tool.handler.call(call.arguments.clone())).await;

        match result {
            Ok(Ok(payload)) => {
                if let Err(reason) = tool.output.validate(&payload) {
                    tracing::warn!(
                        tool = %call.name,
                        call_id = %call.id,
                        %reason,
                        "output validation failed"
                    );
                    breaker.record_failure();
                    return failure(
                        call,
                        FailureKind::ExecutionFailed,
                        format!("output schema violation: {reason}"),
                    );
                }

                tracing::debug!(
                    tool = %call.name,
                    call_id = %call.id,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "tool call succeeded"
                );
                breaker.record_success();
                ToolOutcome::Success {
                    call_id: call.id.clone(),
                    payload,
                }
            }
            Ok(Err(err)) => {
                tracing::warn!(tool = %call.name, call_id = %call.id, error = %err, "handler failed");
                breaker.record_failure();
                failure(call, FailureKind::ExecutionFailed, err.to_string())
            }
            Err(_elapsed) => {
                tracing::warn!(
                    tool = %call.name,
                    call_id = %call.id,
                    timeout_ms = timeout.as_millis() as u64,
                    "handler timed out"
                );
                breaker.record_failure();
                failure(
                    call,
                    FailureKind::Timeout,
                    ToolError::Timeout {
                        name: call.name.clone(),
                        timeout_ms: timeout.as_millis() as u64,
                    }
                    .to_string(),
                )
            }
        }
    }

    fn timeout_for(&self, tool: &RegisteredTool) -> Duration {
        if let Some(over) = self.config.timeout_overrides.get(&tool.name) {
            return *over;
        }
        match tool.class {
            ToolClass::Local => self.config.local_timeout,
            ToolClass::Provider => self.config.provider_timeout,
        }
    }
}

fn failure(call: &ToolCall, kind: FailureKind, message: String) -> ToolOutcome {
    ToolOutcome::Failure {
        call_id: call.id.clone(),
        kind,
        message,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tool::{ToolHandler, ToolSpec};
    use async_trait::async_trait;
    use serde_json::{Value, json};
    use std::sync::atomic::{AtomicU32, Ordering};

    /// Handler that records whether it was invoked.
    struct RecordingHandler {
        calls: AtomicU32,
        response: Value,
    }

    impl RecordingHandler {
        fn new(response: Value) -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicU32::new(0),
                response,
            })
        }

        fn call_count(&self) -> u32 {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl ToolHandler for RecordingHandler {
        async fn call(&self, _arguments: Value) -> crate::error::Result<Value> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.response.clone())
        }
    }

    /// Handler whose future never resolves.
    struct HangingHandler;

    #[async_trait]
    impl ToolHandler for HangingHandler {
        async fn call(&self, _arguments: Value) -> crate::error::Result<Value> {
            std::future::pending::<()>().await;
            unreachable!("pending future never resolves")
        }
    }

    /// Handler that always fails.
    struct FailingHandler {
        calls: AtomicU32,
    }

    #[async_trait]
    impl ToolHandler for FailingHandler {
        async fn call(&self, _arguments: Value) -> crate::error::Result<Value> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Err(ToolError::execution("flaky", "upstream unavailable"))
        }
    }

    fn city_schema() -> Value {
        json!({
            "type": "object",
            "required": ["city"],
            "properties": {"city": {"type": "string"}},
            "additionalProperties": false
        })
    }

    fn list_schema() -> Value {
        json!({
            "type": "object",
            "required": ["items"],
            "properties": {"items": {"type": "array"}}
        })
    }

    fn invoker_with(spec: ToolSpec, config: InvokerConfig) -> ToolInvoker {
        let registry = Arc::new(ToolRegistry::new());
        registry.register(spec).expect("registration");
        ToolInvoker::new(registry, config)
    }

    fn call(name: &str, arguments: Value) -> ToolCall {
        ToolCall {
            id: "tc_01".into(),
            name: name.into(),
            arguments,
        }
    }

    #[tokio::test]
    async fn invalid_arguments_never_reach_handler() {
        let handler = RecordingHandler::new(json!({"items": []}));
        let spec = ToolSpec::new(
            "poi_search",
            "Search POIs",
            ToolClass::Local,
            city_schema(),
            list_schema(),
            handler.clone(),
        );
        let invoker = invoker_with(spec, InvokerConfig::default());

        let outcome = invoker.invoke(&call("poi_search", json!({"town": "Beijing"}))).await;

        assert!(matches!(
            outcome,
            ToolOutcome::Failure {
                kind: FailureKind::InvalidArguments,
                ..
            }
        ));
        assert_eq!(handler.call_count(), 0, "handler must not run on bad args");
    }

    #[tokio::test]
    async fn valid_call_succeeds() {
        let handler = RecordingHandler::new(json!({"items": [1, 2]}));
        let spec = ToolSpec::new(
            "poi_search",
            "Search POIs",
            ToolClass::Local,
            city_schema(),
            list_schema(),
            handler.clone(),
        );
        let invoker = invoker_with(spec, InvokerConfig::default());

        let outcome = invoker.invoke(&call("poi_search", json!({"city": "Beijing"}))).await;

        assert!(outcome.is_success());
        assert_eq!(handler.call_count(), 1);
    }

    #[tokio::test]
    async fn unknown_tool_reported_as_failure() {
        let registry = Arc::new(ToolRegistry::new());
        let invoker = ToolInvoker::new(registry, InvokerConfig::default());

        let outcome = invoker.invoke(&call("nope", json!({}))).await;
        assert!(matches!(
            outcome,
            ToolOutcome::Failure {
                kind: FailureKind::UnknownTool,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn hanging_handler_times_out_at_bound() {
        let spec = ToolSpec::new(
            "slow",
            "Never returns",
            ToolClass::Local,
            json!({"type": "object"}),
            json!({"type": "object"}),
            Arc::new(HangingHandler),
        );
        let config = InvokerConfig {
            local_timeout: Duration::from_millis(50),
            ..InvokerConfig::default()
        };
        let invoker = invoker_with(spec, config);

        let started = std::time::Instant::now();
        let outcome = invoker.invoke(&call("slow", json!({}))).await;
        let elapsed = started.elapsed();

        assert!(matches!(
            outcome,
            ToolOutcome::Failure {
                kind: FailureKind::Timeout,
                ..
            }
        ));
        assert!(elapsed >= Duration::from_millis(50), "returned before the bound");
        assert!(elapsed < Duration::from_secs(5), "did not hang");
    }

    #[tokio::test]
    async fn output_schema_violation_is_execution_failure() {
        let handler = RecordingHandler::new(json!({"wrong": true}));
        let spec = ToolSpec::new(
            "poi_search",
            "Search POIs",
            ToolClass::Local,
            city_schema(),
            list_schema(),
            handler,
        );
        let invoker = invoker_with(spec, InvokerConfig::default());

        let outcome = invoker.invoke(&call("poi_search", json!({"city": "Beijing"}))).await;
        match outcome {
            ToolOutcome::Failure { kind, message, .. } => {
                assert_eq!(kind, FailureKind::ExecutionFailed);
                assert!(message.contains("output schema"));
            }
            other => panic!("expected failure, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn forbidden_tool_rejected_before_dispatch() {
        let handler = RecordingHandler::new(json!({"items": []}));
        let spec = ToolSpec::new(
            "poi_search",
            "Search POIs",
            ToolClass::Local,
            city_schema(),
            list_schema(),
            handler.clone(),
        );
        let invoker = invoker_with(spec, InvokerConfig::default());

        let allowed: std::collections::BTreeSet<String> =
            ["weather_forecast".to_string()].into_iter().collect();
        let outcome = invoker
            .invoke_allowed(&call("poi_search", json!({"city": "Beijing"})), &allowed)
            .await;

        assert!(matches!(
            outcome,
            ToolOutcome::Failure {
                kind: FailureKind::Forbidden,
                ..
            }
        ));
        assert_eq!(handler.call_count(), 0);
    }

    #[tokio::test]
    async fn breaker_opens_and_short_circuits() {
        let handler = Arc::new(FailingHandler {
            calls: AtomicU32::new(0),
        });
        let spec = ToolSpec::new(
            "flaky",
            "Always fails",
            ToolClass::Local,
            json!({"type": "object"}),
            json!({"type": "object"}),
            handler.clone(),
        );
        let config = InvokerConfig {
            breaker: BreakerConfig {
                fail_max: 2,
                reset_timeout: Duration::from_secs(60),
            },
            ..InvokerConfig::default()
        };
        let invoker = invoker_with(spec, config);

        for _ in 0..2 {
            let outcome = invoker.invoke(&call("flaky", json!({}))).await;
            assert!(matches!(
                outcome,
                ToolOutcome::Failure {
                    kind: FailureKind::ExecutionFailed,
                    ..
                }
            ));
        }

        // Breaker is now open: the handler must not be invoked again.
        let outcome = invoker.invoke(&call("flaky", json!({}))).await;
        assert!(matches!(
            outcome,
            ToolOutcome::Failure {
                kind: FailureKind::CircuitOpen,
                ..
            }
        ));
        assert_eq!(handler.calls.load(Ordering::SeqCst), 2);
    }
}
