//! Core tool types.
//!
//! A tool is one external capability (POI search, geocoding, weather lookup,
//! lodging search) exposed through a schema-validated handler.  These types
//! model the data flowing between the reasoning loop and the tool layer; the
//! [`crate::invoker`] module enforces the validation and timeout contract.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::error::Result;

// ---------------------------------------------------------------------------
// Handler trait
// ---------------------------------------------------------------------------

/// Trait implemented by every tool backend.
///
/// Handlers receive arguments that have already been validated against the
/// tool's input schema and return a raw JSON payload.  They must be safe to
/// run under a caller-enforced timeout, i.e. leave no partial side effects
/// when the future is dropped.
#[async_trait]
pub trait ToolHandler: Send + Sync {
    /// Execute the tool with validated arguments.
    async fn call(&self, arguments: Value) -> Result<Value>;
}

// ---------------------------------------------------------------------------
// Tool specification
// ---------------------------------------------------------------------------

/// Broad latency class of a tool, used to pick the default invocation timeout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolClass {
    /// In-process computation; tight timeout.
    Local,
    /// One upstream network call; generous timeout.
    Provider,
}

/// Everything needed to register one tool.
///
/// Registered once at startup; the registry compiles both schemas at
/// registration time and rejects tools whose schemas do not compile.
pub struct ToolSpec {
    /// Unique tool name (registry key).
    pub name: String,
    /// Human-readable description shown to the reasoning model.
    pub description: String,
    /// Latency class for timeout selection.
    pub class: ToolClass,
    /// JSON Schema for the argument payload.
    pub input_schema: Value,
    /// JSON Schema the success payload must conform to.
    pub output_schema: Value,
    /// The backend that executes the tool.
    pub handler: Arc<dyn ToolHandler>,
}

impl ToolSpec {
    /// Create a new spec.
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        class: ToolClass,
        input_schema: Value,
        output_schema: Value,
        handler: Arc<dyn ToolHandler>,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            class,
            input_schema,
            output_schema,
            handler,
        }
    }
}

impl std::fmt::Debug for ToolSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolSpec")
            .field("name", &self.name)
            .field("class", &self.class)
            .finish_non_exhaustive()
    }
}

/// A tool definition exposed to the reasoning model so it knows what tools
/// are available.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDefinition {
    /// Unique tool name.
    pub name: String,
    /// Human-readable description of what the tool does.
    pub description: String,
    /// JSON Schema describing the tool's input parameters.
    pub input_schema: Value,
}

// ---------------------------------------------------------------------------
// Calls and outcomes
// ---------------------------------------------------------------------------

/// A tool invocation requested by the reasoning model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCall {
    /// Unique identifier assigned by the model for correlating results.
    pub id: String,
    /// The name of the tool to invoke (must match a registered tool).
    pub name: String,
    /// Arguments as a JSON value.  Validated before dispatch.
    pub arguments: Value,
}

/// Classifies a failed tool invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// No registered tool with the requested name.
    UnknownTool,
    /// Arguments violated the input schema; the handler was never invoked.
    InvalidArguments,
    /// The handler faulted, or its output violated the output schema.
    ExecutionFailed,
    /// The handler exceeded its timeout bound.
    Timeout,
    /// The tool is outside the calling agent's allowed set.
    Forbidden,
    /// The tool's circuit breaker is open.
    CircuitOpen,
}

impl FailureKind {
    /// Stable string form used in tool-error messages.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::UnknownTool => "unknown_tool",
            Self::InvalidArguments => "invalid_arguments",
            Self::ExecutionFailed => "execution_failed",
            Self::Timeout => "timeout",
            Self::Forbidden => "forbidden",
            Self::CircuitOpen => "circuit_open",
        }
    }
}

/// The result of one tool invocation, ready to feed back to the model.
///
/// Appended to the conversation verbatim and never mutated afterward.  A
/// failure is data, not an `Err`: the reasoning loop must be able to continue
/// after a single tool fault.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ToolOutcome {
    /// The handler succeeded and its payload passed output validation.
    Success {
        /// The [`ToolCall::id`] this outcome answers.
        call_id: String,
        /// Payload conforming to the tool's output schema.
        payload: Value,
    },
    /// The invocation failed at some stage of the protocol.
    Failure {
        /// The [`ToolCall::id`] this outcome answers.
        call_id: String,
        /// What stage failed.
        kind: FailureKind,
        /// Human-readable detail, surfaced to the model for self-correction.
        message: String,
    },
}

impl ToolOutcome {
    /// The call this outcome answers.
    pub fn call_id(&self) -> &str {
        match self {
            Self::Success { call_id, .. } | Self::Failure { call_id, .. } => call_id,
        }
    }

    /// Whether the invocation succeeded.
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    /// Serialize the outcome into tool-message content for the conversation.
    ///
    /// Success renders the bare payload; failure renders a small error object
    /// the model can read and adapt to.
    pub fn render(&self) -> String {
        match self {
            Self::Success { payload, .. } => payload.to_string(),
            Self::Failure { kind, message, .. } => json!({
                "error": kind.as_str(),
                "message": message,
            })
            .to_string(),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
