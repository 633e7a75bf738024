//! Kernel error types.
//!
//! All tool subsystems surface errors through [`ToolError`], which is the
//! single error type returned by every public API in this crate.  Each variant
//! carries enough context for callers to decide how to handle the failure
//! without inspecting opaque strings.

/// Unified error type for the Waypoint tool kernel.
#[derive(Debug, thiserror::Error)]
pub enum ToolError {
    // -- Registry errors ----------------------------------------------------
    /// A tool with the same name is already registered.
    #[error("duplicate tool registration: {name}")]
    DuplicateTool { name: String },

    /// The referenced tool does not exist in the registry.
    #[error("unknown tool: {name}")]
    UnknownTool { name: String },

    /// A tool schema failed to compile at registration time.
    #[error("invalid schema for tool `{name}`: {reason}")]
    InvalidSchema { name: String, reason: String },

    // -- Invocation errors --------------------------------------------------
    /// The call arguments do not conform to the tool's input schema.  The
    /// handler is never invoked for such a call.
    #[error("invalid arguments for tool `{name}`: {reason}")]
    InvalidArguments { name: String, reason: String },

    /// The handler returned an error, or its result violated the declared
    /// output schema.
    #[error("tool execution failed for `{name}`: {reason}")]
    ExecutionFailed { name: String, reason: String },

    /// The handler did not complete within the configured bound.
    #[error("tool `{name}` timed out after {timeout_ms}ms")]
    Timeout { name: String, timeout_ms: u64 },

    /// The calling agent is not permitted to use this tool.
    #[error("tool `{name}` is not in the caller's allowed set")]
    Forbidden { name: String },

    /// The tool's circuit breaker is open; the call was not attempted.
    #[error("circuit open for tool `{name}`")]
    CircuitOpen { name: String },
}

impl ToolError {
    /// Wrap an arbitrary handler fault as an execution failure.
    pub fn execution(name: impl Into<String>, reason: impl std::fmt::Display) -> Self {
        Self::ExecutionFailed {
            name: name.into(),
            reason: reason.to_string(),
        }
    }
}

/// Convenience alias used throughout the kernel crate.
pub type Result<T> = std::result::Result<T, ToolError>;
