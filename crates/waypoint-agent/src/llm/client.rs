//! Model client.
//!
//! [`ModelClient`] is the stateless adapter between a conversation and a
//! reasoning model: one call in, one [`Decision`] out.  The shipped
//! implementation targets **OpenAI-compatible chat-completions endpoints**
//! (OpenAI, DeepSeek, Moonshot, Ollama, vLLM and the like), non-streaming,
//! with bounded exponential-backoff retry on transport faults.
//!
//! Unparsable model output is *not* an error here: it becomes
//! [`Decision::Malformed`], which the agent loop recovers from with a
//! corrective message.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Value, json};
use url::Url;

use crate::error::{AgentError, Result};
use crate::llm::types::{Decision, Message, Role, ToolCall, ToolDefinition};

// ---------------------------------------------------------------------------
// Trait
// ---------------------------------------------------------------------------

/// Stateless reasoning-model adapter.
///
/// Implementations must not retain conversation state between calls; the
/// full message history arrives on every invocation.
#[async_trait]
pub trait ModelClient: Send + Sync {
    /// Send the conversation and available tools, return the model's decision.
    ///
    /// # Errors
    ///
    /// Only transport-level faults (endpoint unreachable after retries,
    /// non-completion response body) are errors.  Output the model produced
    /// but that cannot be interpreted is returned as [`Decision::Malformed`].
    async fn complete(&self, messages: &[Message], tools: &[ToolDefinition]) -> Result<Decision>;
}

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Configuration for connecting to one OpenAI-compatible endpoint.
#[derive(Debug, Clone)]
pub struct LlmConfig {
    /// API key for authentication.
    pub api_key: String,
    /// Base URL up to but excluding `/chat/completions`
    /// (e.g. `https://api.deepseek.com/v1`).
    pub base_url: String,
    /// Model identifier (e.g. `deepseek-chat`).
    pub model: String,
    /// Sampling temperature.
    pub temperature: f32,
    /// Maximum tokens the model may generate per turn.
    pub max_tokens: u32,
    /// Per-request HTTP timeout.
    pub timeout: Duration,
    /// Transport retries after the first attempt (0 = no retries).
    pub max_retries: u32,
    /// Initial delay before the first retry; doubles per attempt.
    pub retry_base_delay: Duration,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            base_url: "https://api.deepseek.com/v1".to_owned(),
            model: "deepseek-chat".to_owned(),
            temperature: 0.0,
            max_tokens: 4096,
            timeout: Duration::from_secs(60),
            max_retries: 2,
            retry_base_delay: Duration::from_millis(500),
        }
    }
}

// ---------------------------------------------------------------------------
// HTTP client
// ---------------------------------------------------------------------------

/// OpenAI-compatible chat-completions client.
pub struct HttpModelClient {
    client: reqwest::Client,
    endpoint: String,
    config: LlmConfig,
}

impl HttpModelClient {
    /// Create a client, validating the base URL eagerly.
    pub fn new(config: LlmConfig) -> Result<Self> {
        let base = config.base_url.trim_end_matches('/');
        let endpoint = format!("{base}/chat/completions");
        Url::parse(&endpoint).map_err(|e| AgentError::LlmRequest {
            reason: format!("invalid base url `{}`: {e}", config.base_url),
        })?;

        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()?;

        Ok(Self {
            client,
            endpoint,
            config,
        })
    }

    /// Build the request body in the chat-completions wire format.
    fn build_body(&self, messages: &[Message], tools: &[ToolDefinition]) -> Value {
        let wire_messages: Vec<Value> = messages.iter().map(wire_message).collect();

        let mut body = json!({
            "model": self.config.model,
            "messages": wire_messages,
            "temperature": self.config.temperature,
            "max_tokens": self.config.max_tokens,
        });

        if !tools.is_empty() {
            body["tools"] = Value::Array(tools.iter().map(wire_tool).collect());
            body["tool_choice"] = json!("auto");
        }

        body
    }

    /// One POST with bounded exponential-backoff retry on transport faults
    /// and 5xx responses.
    async fn post_with_retry(&self, body: &Value) -> Result<Value> {
        let mut delay = self.config.retry_base_delay;
        let max_attempts = self.config.max_retries + 1;
        let mut last_error = String::new();

        for attempt in 1..=max_attempts {
            let response = self
                .client
                .post(&self.endpoint)
                .bearer_auth(&self.config.api_key)
                .json(body)
                .send()
                .await;

            match response {
                Ok(resp) if resp.status().is_success() => {
                    return Ok(resp.json::<Value>().await?);
                }
                Ok(resp) if resp.status().is_server_error() => {
                    last_error = format!("server error: {}", resp.status());
                }
                Ok(resp) => {
                    // Client errors (auth, bad request) will not improve on
                    // retry.
                    let status = resp.status();
                    let text = resp.text().await.unwrap_or_default();
                    return Err(AgentError::LlmRequest {
                        reason: format!("status {status}: {text}"),
                    });
                }
                Err(err) => {
                    last_error = err.to_string();
                }
            }

            if attempt < max_attempts {
                tracing::warn!(attempt, error = %last_error, "llm request failed, retrying");
                tokio::time::sleep(delay).await;
                delay *= 2;
            }
        }

        Err(AgentError::LlmRequest {
            reason: format!("exhausted {max_attempts} attempts: {last_error}"),
        })
    }
}

#[async_trait]
impl ModelClient for HttpModelClient {
    async fn complete(&self, messages: &[Message], tools: &[ToolDefinition]) -> Result<Decision> {
        let body = self.build_body(messages, tools);

        tracing::debug!(
            model = %self.config.model,
            message_count = messages.len(),
            tool_count = tools.len(),
            "sending completion request"
        );

        let response = self.post_with_retry(&body).await?;
        parse_completion(&response)
    }
}

// ---------------------------------------------------------------------------
// Wire conversion
// ---------------------------------------------------------------------------

fn wire_message(msg: &Message) -> Value {
    match msg.role {
        Role::System => json!({"role": "system", "content": msg.content}),
        Role::User => json!({"role": "user", "content": msg.content}),
        Role::Assistant => {
            if msg.tool_calls.is_empty() {
                json!({"role": "assistant", "content": msg.content})
            } else {
                let calls: Vec<Value> = msg
                    .tool_calls
                    .iter()
                    .map(|tc| {
                        json!({
                            "id": tc.id,
                            "type": "function",
                            "function": {
                                "name": tc.name,
                                "arguments": tc.arguments.to_string(),
                            }
                        })
                    })
                    .collect();
                json!({"role": "assistant", "content": Value::Null, "tool_calls": calls})
            }
        }
        Role::Tool => json!({
            "role": "tool",
            "tool_call_id": msg.tool_call_id,
            "content": msg.content,
        }),
    }
}

fn wire_tool(def: &ToolDefinition) -> Value {
    json!({
        "type": "function",
        "function": {
            "name": def.name,
            "description": def.description,
            "parameters": def.input_schema,
        }
    })
}

/// Interpret a chat-completion response body as a [`Decision`].
fn parse_completion(response: &Value) -> Result<Decision> {
    let message = response
        .pointer("/choices/0/message")
        .ok_or_else(|| AgentError::LlmParse {
            reason: "response has no choices[0].message".into(),
        })?;

    if let Some(calls) = message.get("tool_calls").and_then(Value::as_array) {
        if !calls.is_empty() {
            return Ok(parse_tool_calls(calls));
        }
    }

    match message.get("content").and_then(Value::as_str) {
        Some(text) => Ok(parse_final(text)),
        None => Ok(Decision::Malformed {
            reason: "assistant message carried neither tool calls nor content".into(),
        }),
    }
}

fn parse_tool_calls(calls: &[Value]) -> Decision {
    let mut parsed = Vec::with_capacity(calls.len());

    for call in calls {
        let id = call.get("id").and_then(Value::as_str).unwrap_or_default();
        let Some(name) = call.pointer("/function/name").and_then(Value::as_str) else {
            return Decision::Malformed {
                reason: "tool call is missing function.name".into(),
            };
        };
        let raw_args = call
            .pointer("/function/arguments")
            .and_then(Value::as_str)
            .unwrap_or("{}");

        let arguments: Value = match serde_json::from_str(raw_args) {
            Ok(v) => v,
            Err(e) => {
                return Decision::Malformed {
                    reason: format!("tool call `{name}` has unparsable arguments: {e}"),
                };
            }
        };

        parsed.push(ToolCall {
            id: if id.is_empty() {
                format!("call_{}", parsed.len())
            } else {
                id.to_owned()
            },
            name: name.to_owned(),
            arguments,
        });
    }

    Decision::ToolCalls(parsed)
}

/// Parse free-form assistant text into a final structured answer.
pub(crate) fn parse_final(text: &str) -> Decision {
    let candidate = extract_json_block(text);
    match serde_json::from_str::<Value>(candidate) {
        Ok(value) if value.is_object() || value.is_array() => Decision::Final(value),
        Ok(_) => Decision::Malformed {
            reason: "final answer must be a JSON object or array".into(),
        },
        Err(e) => Decision::Malformed {
            reason: format!("final answer is not valid JSON: {e}"),
        },
    }
}

/// Try to extract a JSON block from text that might be wrapped in markdown
/// code fences.
fn extract_json_block(text: &str) -> &str {
    let trimmed = text.trim();

    // Check for ```json ... ``` fences.
    if let Some(start) = trimmed.find("```json") {
        let json_start = start + 7; // len("```json")
        if let Some(end) = trimmed[json_start..].find("```") {
            return trimmed[json_start..json_start + end].trim();
        }
    }

    // Check for ``` ... ``` fences (without language tag).
    if let Some(start) = trimmed.find("```") {
        let json_start = start + 3;
        if let Some(end) = trimmed[json_start..].find("```") {
            return trimmed[json_start..json_start + end].trim();
        }
    }

    trimmed
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extract_json_from_fenced_block() {
        let text = "Here is the itinerary:\n```json\n{\"days\": []}\n```";
        assert_eq!(extract_json_block(text), r#"{"days": []}"#);
    }

    #[test]
    fn extract_json_from_bare_fences() {
        let text = "```\n{\"days\": []}\n```";
        assert_eq!(extract_json_block(text), r#"{"days": []}"#);
    }

    #[test]
    fn parse_final_accepts_object() {
        match parse_final(r#"{"days": [1, 2]}"#) {
            Decision::Final(v) => assert_eq!(v["days"][0], 1),
            other => panic!("expected final, got {other:?}"),
        }
    }

    #[test]
    fn parse_final_rejects_prose() {
        assert!(matches!(
            parse_final("I could not produce a plan, sorry."),
            Decision::Malformed { .. }
        ));
    }

    #[test]
    fn parse_final_rejects_bare_scalar() {
        assert!(matches!(parse_final("42"), Decision::Malformed { .. }));
    }

    #[test]
    fn parse_completion_maps_tool_calls() {
        let response = json!({
            "choices": [{
                "message": {
                    "role": "assistant",
                    "content": null,
                    "tool_calls": [{
                        "id": "call_abc",
                        "type": "function",
                        "function": {
                            "name": "poi_search",
                            "arguments": "{\"city\": \"Beijing\"}"
                        }
                    }]
                }
            }]
        });

        match parse_completion(&response).unwrap() {
            Decision::ToolCalls(calls) => {
                assert_eq!(calls.len(), 1);
                assert_eq!(calls[0].name, "poi_search");
                assert_eq!(calls[0].arguments["city"], "Beijing");
            }
            other => panic!("expected tool calls, got {other:?}"),
        }
    }

    #[test]
    fn parse_completion_flags_bad_arguments_as_malformed() {
        let response = json!({
            "choices": [{
                "message": {
                    "role": "assistant",
                    "tool_calls": [{
                        "id": "call_abc",
                        "type": "function",
                        "function": {"name": "poi_search", "arguments": "{not json"}
                    }]
                }
            }]
        });

        assert!(matches!(
            parse_completion(&response).unwrap(),
            Decision::Malformed { .. }
        ));
    }

    #[test]
    fn parse_completion_without_choices_is_transport_error() {
        assert!(parse_completion(&json!({"error": "overloaded"})).is_err());
    }

    #[test]
    fn wire_assistant_tool_calls_stringifies_arguments() {
        let msg = Message::assistant_tool_calls(vec![ToolCall {
            id: "tc_01".into(),
            name: "geocode".into(),
            arguments: json!({"address": "Forbidden City"}),
        }]);
        let wire = wire_message(&msg);
        assert_eq!(wire["tool_calls"][0]["function"]["name"], "geocode");
        assert!(wire["tool_calls"][0]["function"]["arguments"].is_string());
    }

    #[test]
    fn wire_tool_nests_schema_under_function() {
        let def = ToolDefinition {
            name: "poi_search".into(),
            description: "Search POIs".into(),
            input_schema: json!({"type": "object"}),
        };
        let wire = wire_tool(&def);
        assert_eq!(wire["function"]["parameters"]["type"], "object");
    }

    #[test]
    fn invalid_base_url_rejected() {
        let config = LlmConfig {
            base_url: "not a url".into(),
            ..LlmConfig::default()
        };
        assert!(HttpModelClient::new(config).is_err());
    }
}
