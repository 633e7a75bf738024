//! Model integration layer.
//!
//! - [`types`] -- Conversation messages and the model's [`types::Decision`].
//! - [`client`] -- The [`client::ModelClient`] trait and the HTTP
//!   implementation for OpenAI-compatible endpoints.

pub mod client;
pub mod types;

// Re-export the most commonly used types for convenience.
pub use client::{HttpModelClient, LlmConfig, ModelClient};
pub use types::{Decision, Message, Role, ToolCall, ToolDefinition};
