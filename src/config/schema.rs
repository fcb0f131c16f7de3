//! Configuration schema for agent.toml.

use serde::{Deserialize, Serialize};
use std::fmt;

/// What the loop does with a model output that has neither a tool call nor
/// a response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmptyTurnPolicy {
    /// Append one corrective system turn and ask again; a second empty turn
    /// in a row ends the run.
    Nudge,
    /// End the run on the first empty turn.
    Fail,
}

impl fmt::Display for EmptyTurnPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Nudge => write!(f, "nudge"),
            Self::Fail => write!(f, "fail"),
        }
    }
}

/// Root configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    /// Chat model identifier.
    pub model: String,

    /// Base URL of the OpenAI-compatible API (without `/v1`).
    pub api_url: String,

    /// API key. Leave empty to read it from `api_key_env`.
    pub api_key: String,

    /// Environment variable holding the API key.
    pub api_key_env: String,

    /// Maximum tokens per completion.
    pub max_tokens: u32,

    /// Sampling temperature.
    pub temperature: f64,

    /// HTTP timeout for model and market-data requests.
    pub request_timeout_secs: u64,

    /// Maximum model calls per run.
    pub max_iterations: u32,

    /// Handling of outputs with nothing to act on.
    pub empty_turn_policy: EmptyTurnPolicy,

    /// Market-data API base URL (CoinGecko v3 compatible).
    pub market_api_url: String,

    /// Extra instructions appended to the system prompt.
    pub instructions: String,

    /// Log level (debug, info, warn, error).
    pub log_level: String,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            model: "llama-3.3-70b-versatile".into(),
            api_url: "https://api.groq.com/openai".into(),
            api_key: String::new(),
            api_key_env: "GROQ_API_KEY".into(),
            max_tokens: 1024,
            temperature: 0.0,
            request_timeout_secs: 60,
            max_iterations: 10,
            empty_turn_policy: EmptyTurnPolicy::Nudge,
            market_api_url: "https://api.coingecko.com/api/v3".into(),
            instructions: String::new(),
            log_level: "info".into(),
        }
    }
}

impl AgentConfig {
    /// The configured key, else `api_key_env`, else the crate-wide fallback
    /// variable. Empty when none is set.
    pub fn resolved_api_key(&self) -> String {
        self.resolve_api_key_with(|name| std::env::var(name).ok())
    }

    /// [`resolved_api_key`](Self::resolved_api_key) over an arbitrary
    /// variable lookup.
    pub fn resolve_api_key_with(&self, lookup: impl Fn(&str) -> Option<String>) -> String {
        if !self.api_key.trim().is_empty() {
            return self.api_key.trim().to_string();
        }
        [self.api_key_env.as_str(), super::FALLBACK_API_KEY_ENV]
            .iter()
            .filter(|name| !name.is_empty())
            .find_map(|name| lookup(name).filter(|v| !v.trim().is_empty()))
            .map(|v| v.trim().to_string())
            .unwrap_or_default()
    }
}
