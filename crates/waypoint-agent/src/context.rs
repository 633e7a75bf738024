//! Conversation state for one agent run.
//!
//! A [`Conversation`] is the append-only message history owned by exactly one
//! agent-loop invocation.  It enforces two structural guarantees the rest of
//! the engine relies on:
//!
//! - **Pairing**: a tool message must immediately follow the assistant
//!   message that requested it, matched by call id, in request order.
//! - **Bounded size**: when the history exceeds the configured limit, the
//!   oldest tool-exchange pairs are evicted first.  The leading system
//!   instructions and the original user request are never evicted, and a
//!   call/result pair is never split.
//!
//! Early exploratory tool calls are the least relevant evidence for the final
//! answer, so oldest-pair-first eviction loses the least.

use std::collections::VecDeque;

use crate::error::{AgentError, Result};
use crate::llm::types::{Message, Role};

/// Number of leading messages (system + user request) that are never evicted.
const PROTECTED_PREFIX: usize = 2;

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Context-size policy for one conversation.
#[derive(Debug, Clone)]
pub struct ContextConfig {
    /// Maximum number of messages retained in the history.
    pub max_messages: usize,
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self { max_messages: 64 }
    }
}

// ---------------------------------------------------------------------------
// Conversation
// ---------------------------------------------------------------------------

/// Ordered, append-only message history plus the loop's step counter.
#[derive(Debug)]
pub struct Conversation {
    messages: Vec<Message>,
    /// Call ids awaiting their tool result, in request order.
    pending_results: VecDeque<String>,
    steps: u32,
    terminated: bool,
    config: ContextConfig,
}

impl Conversation {
    /// Start a conversation from system instructions and the user request.
    pub fn new(
        system: impl Into<String>,
        user_request: impl Into<String>,
        config: ContextConfig,
    ) -> Self {
        Self {
            messages: vec![Message::system(system), Message::user(user_request)],
            pending_results: VecDeque::new(),
            steps: 0,
            terminated: false,
            config,
        }
    }

    /// Append a message.  This is the only mutator of the history.
    ///
    /// # Errors
    ///
    /// [`AgentError::ContextIntegrity`] when the append would break pairing:
    /// a tool message without a matching pending call, a tool message out of
    /// request order, any non-tool message while results are still owed, or
    /// any append after termination.
    pub fn append(&mut self, message: Message) -> Result<()> {
        if self.terminated {
            return Err(AgentError::ContextIntegrity {
                reason: "append after termination".into(),
            });
        }

        match message.role {
            Role::Tool => {
                let call_id = message.tool_call_id.as_deref().unwrap_or_default();
                match self.pending_results.front() {
                    Some(expected) if expected == call_id => {
                        self.pending_results.pop_front();
                    }
                    Some(expected) => {
                        return Err(AgentError::ContextIntegrity {
                            reason: format!(
                                "tool result `{call_id}` out of order, expected `{expected}`"
                            ),
                        });
                    }
                    None => {
                        return Err(AgentError::ContextIntegrity {
                            reason: format!("tool result `{call_id}` answers no pending call"),
                        });
                    }
                }
            }
            _ => {
                if !self.pending_results.is_empty() {
                    return Err(AgentError::ContextIntegrity {
                        reason: format!(
                            "{} tool result(s) still pending",
                            self.pending_results.len()
                        ),
                    });
                }
                if message.role == Role::Assistant && !message.tool_calls.is_empty() {
                    self.pending_results = message.tool_calls.iter().map(|c| c.id.clone()).collect();
                }
            }
        }

        self.messages.push(message);
        self.enforce_bounds();
        Ok(())
    }

    /// Read-only ordered view of the history.
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// Increment and return the step counter.
    ///
    /// Called on every transition out of the reasoning state; the loop guard
    /// compares the returned value against its configured maximum.
    pub fn record_step(&mut self) -> u32 {
        self.steps += 1;
        self.steps
    }

    /// Steps taken so far.
    pub fn steps(&self) -> u32 {
        self.steps
    }

    /// Mark the conversation terminal.  Further appends are rejected.
    pub fn terminate(&mut self) {
        self.terminated = true;
    }

    /// Whether the conversation has been terminated.
    pub fn is_terminated(&self) -> bool {
        self.terminated
    }

    /// Evict oldest tool-exchange pairs until the history fits the limit.
    fn enforce_bounds(&mut self) {
        while self.messages.len() > self.config.max_messages {
            if !self.evict_one() {
                break;
            }
        }
    }

    /// Remove one evictable unit.  Returns false when nothing can go.
    fn evict_one(&mut self) -> bool {
        // Oldest complete tool exchange: assistant-with-calls plus its
        // results.  An exchange still awaiting results sits at the tail and
        // is skipped by the completeness check.
        let mut i = PROTECTED_PREFIX;
        while i < self.messages.len() {
            let msg = &self.messages[i];
            if msg.role == Role::Assistant && !msg.tool_calls.is_empty() {
                let expected = msg.tool_calls.len();
                let results = self.messages[i + 1..]
                    .iter()
                    .take_while(|m| m.role == Role::Tool)
                    .count();
                if results >= expected {
                    let len = 1 + expected;
                    tracing::debug!(start = i, len, "evicting oldest tool exchange");
                    self.messages.drain(i..i + len);
                    return true;
                }
            }
            i += 1;
        }

        // No complete exchange left: drop the oldest plain message after the
        // protected prefix.
        if self.messages.len() > PROTECTED_PREFIX {
            let candidate = &self.messages[PROTECTED_PREFIX];
            if candidate.role != Role::Tool && candidate.tool_calls.is_empty() {
                self.messages.remove(PROTECTED_PREFIX);
                return true;
            }
        }

        false
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
