//! Environment-driven settings.
//!
//! Loaded once at startup (the binary calls `dotenvy` first) and frozen: the
//! engine has no hot-reload path.  Every knob has a documented default so an
//! empty environment still yields a runnable configuration (stub tools,
//! offline model excepted).

use std::time::Duration;

use waypoint_kernel::{BreakerConfig, InvokerConfig};

use crate::agent::LoopConfig;
use crate::context::ContextConfig;
use crate::llm::client::LlmConfig;

// ---------------------------------------------------------------------------
// Settings
// ---------------------------------------------------------------------------

/// All runtime configuration for one planner process.
#[derive(Debug, Clone)]
pub struct Settings {
    /// Model endpoint credentials (`LLM_API_KEY`).
    pub llm_api_key: String,
    /// OpenAI-compatible base URL (`LLM_BASE_URL`).
    pub llm_base_url: String,
    /// Model identifier (`LLM_MODEL`).
    pub llm_model: String,
    /// Per-request HTTP timeout in seconds (`LLM_TIMEOUT`).
    pub llm_timeout: Duration,
    /// Transport retries after the first attempt (`LLM_MAX_RETRIES`).
    pub llm_max_retries: u32,

    /// Map provider key (`AMAP_API_KEY`); absent means stub tools only.
    pub amap_api_key: Option<String>,
    /// Image provider key (`UNSPLASH_ACCESS_KEY`).
    pub unsplash_access_key: Option<String>,

    /// Reasoning-loop step limit (`AGENT_MAX_STEPS`).
    pub max_steps: u32,
    /// Corrective retry budget (`AGENT_RETRY_BUDGET`).
    pub retry_budget: u32,
    /// Conversation size bound (`AGENT_MAX_CONTEXT_MESSAGES`).
    pub max_context_messages: usize,

    /// Timeout for provider-class tools in seconds (`TOOL_TIMEOUT`).
    pub provider_timeout: Duration,
    /// Consecutive failures before a tool's breaker opens (`BREAKER_FAIL_MAX`).
    pub breaker_fail_max: u32,
    /// Open-breaker reset window in seconds (`BREAKER_RESET_TIMEOUT`).
    pub breaker_reset_timeout: Duration,

    /// POI cache TTL in seconds (`CACHE_POI_TTL`).
    pub cache_poi_ttl: Duration,
    /// Weather cache TTL in seconds (`CACHE_WEATHER_TTL`).
    pub cache_weather_ttl: Duration,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            llm_api_key: String::new(),
            llm_base_url: "https://api.deepseek.com/v1".to_owned(),
            llm_model: "deepseek-chat".to_owned(),
            llm_timeout: Duration::from_secs(60),
            llm_max_retries: 2,
            amap_api_key: None,
            unsplash_access_key: None,
            max_steps: 16,
            retry_budget: 3,
            max_context_messages: 64,
            provider_timeout: Duration::from_secs(30),
            breaker_fail_max: 5,
            breaker_reset_timeout: Duration::from_secs(60),
            cache_poi_ttl: Duration::from_secs(3600),
            cache_weather_ttl: Duration::from_secs(1800),
        }
    }
}

impl Settings {
    /// Read settings from the process environment, falling back to defaults.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            llm_api_key: env_or("LLM_API_KEY", ""),
            llm_base_url: env_or("LLM_BASE_URL", &defaults.llm_base_url),
            llm_model: env_or("LLM_MODEL", &defaults.llm_model),
            llm_timeout: env_secs("LLM_TIMEOUT", defaults.llm_timeout),
            llm_max_retries: env_parse("LLM_MAX_RETRIES", defaults.llm_max_retries),
            amap_api_key: env_opt("AMAP_API_KEY"),
            unsplash_access_key: env_opt("UNSPLASH_ACCESS_KEY"),
            max_steps: env_parse("AGENT_MAX_STEPS", defaults.max_steps),
            retry_budget: env_parse("AGENT_RETRY_BUDGET", defaults.retry_budget),
            max_context_messages: env_parse(
                "AGENT_MAX_CONTEXT_MESSAGES",
                defaults.max_context_messages,
            ),
            provider_timeout: env_secs("TOOL_TIMEOUT", defaults.provider_timeout),
            breaker_fail_max: env_parse("BREAKER_FAIL_MAX", defaults.breaker_fail_max),
            breaker_reset_timeout: env_secs(
                "BREAKER_RESET_TIMEOUT",
                defaults.breaker_reset_timeout,
            ),
            cache_poi_ttl: env_secs("CACHE_POI_TTL", defaults.cache_poi_ttl),
            cache_weather_ttl: env_secs("CACHE_WEATHER_TTL", defaults.cache_weather_ttl),
        }
    }

    /// Model client configuration.
    pub fn llm_config(&self) -> LlmConfig {
        LlmConfig {
            api_key: self.llm_api_key.clone(),
            base_url: self.llm_base_url.clone(),
            model: self.llm_model.clone(),
            timeout: self.llm_timeout,
            max_retries: self.llm_max_retries,
            ..LlmConfig::default()
        }
    }

    /// Reasoning-loop configuration.
    pub fn loop_config(&self) -> LoopConfig {
        LoopConfig {
            max_steps: self.max_steps,
            retry_budget: self.retry_budget,
            context: ContextConfig {
                max_messages: self.max_context_messages,
            },
        }
    }

    /// Protocol-client configuration.
    pub fn invoker_config(&self) -> InvokerConfig {
        InvokerConfig {
            provider_timeout: self.provider_timeout,
            breaker: BreakerConfig {
                fail_max: self.breaker_fail_max,
                reset_timeout: self.breaker_reset_timeout,
            },
            ..InvokerConfig::default()
        }
    }
}

// ---------------------------------------------------------------------------
// Env helpers
// ---------------------------------------------------------------------------

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_owned())
}

fn env_opt(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.is_empty())
}

fn env_parse<T: std::str::FromStr + Copy>(key: &str, default: T) -> T {
    match std::env::var(key) {
        Ok(raw) => raw.parse().unwrap_or_else(|_| {
            tracing::warn!(%key, %raw, "unparsable env value, using default");
            default
        }),
        Err(_) => default,
    }
}

fn env_secs(key: &str, default: Duration) -> Duration {
    match std::env::var(key) {
        Ok(raw) => raw
            .parse::<u64>()
            .map(Duration::from_secs)
            .unwrap_or_else(|_| {
                tracing::warn!(%key, %raw, "unparsable env value, using default");
                default
            }),
        Err(_) => default,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sane() {
        let settings = Settings::default();
        assert_eq!(settings.max_steps, 16);
        assert_eq!(settings.retry_budget, 3);
        assert_eq!(settings.cache_poi_ttl, Duration::from_secs(3600));
        assert_eq!(settings.cache_weather_ttl, Duration::from_secs(1800));
        assert!(settings.amap_api_key.is_none());
    }

    #[test]
    fn unset_env_yields_defaults() {
        // Deliberately improbable variable names.
        assert_eq!(env_or("WAYPOINT_TEST_UNSET_STR", "fallback"), "fallback");
        assert_eq!(env_parse("WAYPOINT_TEST_UNSET_U32", 7u32), 7);
        assert_eq!(
            env_secs("WAYPOINT_TEST_UNSET_SECS", Duration::from_secs(9)),
            Duration::from_secs(9)
        );
        assert!(env_opt("WAYPOINT_TEST_UNSET_OPT").is_none());
    }

    #[test]
    fn env_values_override_defaults() {
        unsafe {
            std::env::set_var("WAYPOINT_TEST_SET_U32", "42");
            std::env::set_var("WAYPOINT_TEST_SET_BAD", "not-a-number");
        }
        assert_eq!(env_parse("WAYPOINT_TEST_SET_U32", 7u32), 42);
        // Unparsable values fall back rather than panic.
        assert_eq!(env_parse("WAYPOINT_TEST_SET_BAD", 7u32), 7);
    }

    #[test]
    fn derived_configs_carry_settings() {
        let settings = Settings {
            max_steps: 9,
            retry_budget: 1,
            max_context_messages: 12,
            breaker_fail_max: 2,
            ..Settings::default()
        };

        let loop_config = settings.loop_config();
        assert_eq!(loop_config.max_steps, 9);
        assert_eq!(loop_config.retry_budget, 1);
        assert_eq!(loop_config.context.max_messages, 12);

        let invoker_config = settings.invoker_config();
        assert_eq!(invoker_config.breaker.fail_max, 2);
    }
}
