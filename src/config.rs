use crate::error::{Error, Result};
use crate::model::{RequestParams, ResolvedParams};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AssistantConfig {
    pub base_url: String,
    pub model: String,
    pub timeout_secs: u64,
    pub max_tokens: u32,
    pub temperature: f32,
    pub stream: bool,
    pub num_ctx: u32,
    /// Exchanges kept in the conversation window (each is two messages).
    pub max_context_messages: usize,
    pub optimization: OptimizationConfig,
    pub preload: PreloadConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OptimizationConfig {
    pub cache_responses: bool,
    pub cache_ttl_secs: u64,
    pub cache_max_size: usize,
    pub preload_common_queries: bool,
    /// Pause between replayed chunks when a cache hit is streamed to a sink.
    pub replay_delay_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PreloadConfig {
    pub prompts: Vec<String>,
    pub poll_timeout_ms: u64,
    pub idle_backoff_ms: u64,
    pub queue_capacity: usize,
}

impl Default for AssistantConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:11434".to_string(),
            model: "llama3.2:1b".to_string(),
            timeout_secs: 15,
            max_tokens: 512,
            temperature: 0.7,
            stream: true,
            num_ctx: 2048,
            max_context_messages: 10,
            optimization: OptimizationConfig::default(),
            preload: PreloadConfig::default(),
        }
    }
}

impl Default for OptimizationConfig {
    fn default() -> Self {
        Self {
            cache_responses: true,
            cache_ttl_secs: 300,
            cache_max_size: 100,
            preload_common_queries: true,
            replay_delay_ms: 10,
        }
    }
}

impl Default for PreloadConfig {
    fn default() -> Self {
        Self {
            prompts: [
                "What time is it?",
                "What's the weather?",
                "Help me navigate",
                "Read this text",
                "Translate this",
            ]
            .into_iter()
            .map(String::from)
            .collect(),
            poll_timeout_ms: 1000,
            idle_backoff_ms: 5000,
            queue_capacity: 32,
        }
    }
}

impl AssistantConfig {
    pub fn from_json_str(raw: &str) -> Result<Self> {
        serde_json::from_str(raw).map_err(|e| Error::Config(e.to_string()))
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))?;
        Self::from_json_str(&raw)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.optimization.cache_ttl_secs)
    }

    pub fn replay_delay(&self) -> Duration {
        Duration::from_millis(self.optimization.replay_delay_ms)
    }

    /// Applies config defaults to whatever the caller left unset.
    pub fn resolve(&self, params: &RequestParams) -> ResolvedParams {
        ResolvedParams {
            model: params.model.clone().unwrap_or_else(|| self.model.clone()),
            temperature: params.temperature.unwrap_or(self.temperature),
            max_tokens: params.max_tokens.unwrap_or(self.max_tokens),
            context_window: params.context_window.unwrap_or(self.num_ctx),
            timeout: params.timeout.unwrap_or_else(|| self.timeout()),
            extras: params.extras.clone(),
        }
    }
}

impl PreloadConfig {
    pub fn poll_timeout(&self) -> Duration {
        Duration::from_millis(self.poll_timeout_ms)
    }

    pub fn idle_backoff(&self) -> Duration {
        Duration::from_millis(self.idle_backoff_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_json_keeps_defaults() {
        let cfg = AssistantConfig::from_json_str(
            r#"{"model": "phi3", "optimization": {"cache_ttl_secs": 60}}"#,
        )
        .unwrap();

        assert_eq!(cfg.model, "phi3");
        assert_eq!(cfg.cache_ttl(), Duration::from_secs(60));
        assert_eq!(cfg.optimization.cache_max_size, 100);
        assert_eq!(cfg.preload.prompts.len(), 5);
        assert_eq!(cfg.max_context_messages, 10);
    }

    #[test]
    fn malformed_json_is_a_config_error() {
        let err = AssistantConfig::from_json_str("{not json").unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn resolve_prefers_request_overrides() {
        let cfg = AssistantConfig::default();
        let resolved = cfg.resolve(&RequestParams::default().with_temperature(0.1));

        assert_eq!(resolved.model, cfg.model);
        assert_eq!(resolved.temperature, 0.1);
        assert_eq!(resolved.max_tokens, 512);
        assert_eq!(resolved.timeout, Duration::from_secs(15));
    }
}
