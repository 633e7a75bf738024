//! Agent error types.
//!
//! Two layers: [`AgentError`] for faults inside one agent run (model
//! transport, context integrity, bad input), and [`PlanError`] for the
//! orchestrator's public boundary.  Tool-level failures never appear here —
//! they are data ([`waypoint_kernel::ToolOutcome`]) fed back into the
//! conversation, not errors.

/// Unified error type for the agent engine.
#[derive(Debug, thiserror::Error)]
pub enum AgentError {
    // -- LLM errors ----------------------------------------------------------
    /// An HTTP request to the model provider failed after exhausting retries.
    #[error("llm request failed: {reason}")]
    LlmRequest { reason: String },

    /// The provider returned a body that is not a chat-completion response.
    #[error("llm response parse error: {reason}")]
    LlmParse { reason: String },

    // -- Session errors ------------------------------------------------------
    /// A message append violated conversation ordering or call/result
    /// pairing.  Indicates a defect in the loop, not model misbehavior.
    #[error("conversation integrity violated: {reason}")]
    ContextIntegrity { reason: String },

    /// The trip request failed validation before any agent ran.
    #[error("invalid trip request: {reason}")]
    InvalidRequest { reason: String },

    // -- Serialization -------------------------------------------------------
    /// JSON serialization or deserialization failed.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    // -- Upstream crate errors -----------------------------------------------
    /// An error propagated from the tool kernel.
    #[error("tool error: {0}")]
    Tool(#[from] waypoint_kernel::ToolError),

    // -- Generic -------------------------------------------------------------
    /// Catch-all for unexpected internal errors.  Prefer a typed variant
    /// whenever possible.
    #[error("internal agent error: {0}")]
    Internal(String),
}

/// Convenience alias used throughout the agent crate.
pub type Result<T> = std::result::Result<T, AgentError>;

impl From<reqwest::Error> for AgentError {
    fn from(err: reqwest::Error) -> Self {
        Self::LlmRequest {
            reason: err.to_string(),
        }
    }
}

// ---------------------------------------------------------------------------
// Orchestrator boundary
// ---------------------------------------------------------------------------

/// Failure returned by the orchestrator's `plan` operation.
///
/// `PlanningFailure` is user-facing and always names the facet that could not
/// be produced.  `InvariantViolation` is an internal defect: the assembled
/// plan broke a structural guarantee and must never be silently reshaped.
#[derive(Debug, thiserror::Error)]
pub enum PlanError {
    /// A facet required by the synthesis configuration could not be produced.
    #[error("planning failed: required facet `{facet}` unavailable: {reason}")]
    PlanningFailure { facet: String, reason: String },

    /// The assembled itinerary violated a structural invariant.
    #[error("itinerary invariant violated: {reason}")]
    InvariantViolation { reason: String },

    /// The caller cancelled the run.
    #[error("planning cancelled")]
    Cancelled,

    /// Unexpected internal failure (task panic, unparsable validated output).
    #[error("internal planning error: {0}")]
    Internal(String),
}
