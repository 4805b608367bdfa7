//! Runtime configuration, modeled on the teacher's `Config::from_env`/
//! `validate` pattern (`symbi-runtime`'s `config.rs`).

use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug, Clone)]
pub enum ConfigError {
    #[error("invalid configuration: {0}")]
    Invalid(String),

    #[error("missing required field: {0}")]
    MissingField(String),
}

/// LLM driver configuration (C2, §4.2).
#[derive(Debug, Clone)]
pub struct LlmConfig {
    pub provider: LlmProviderKind,
    pub api_key: String,
    pub model: String,
    pub base_url: String,
    /// Pinned per §4.2: "Temperature 0.3 for structured/tool-calling work."
    pub temperature: f32,
    #[cfg_attr(not(feature = "cloud-llm"), allow(dead_code))]
    pub call_timeout: Duration,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LlmProviderKind {
    OpenRouter,
    OpenAI,
    Anthropic,
}

impl std::fmt::Display for LlmProviderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LlmProviderKind::OpenRouter => write!(f, "OpenRouter"),
            LlmProviderKind::OpenAI => write!(f, "OpenAI"),
            LlmProviderKind::Anthropic => write!(f, "Anthropic"),
        }
    }
}

impl LlmConfig {
    /// Auto-detect provider from environment variables, in priority order:
    /// `ASSESSMENT_OPENROUTER_API_KEY` -> `ASSESSMENT_OPENAI_API_KEY` ->
    /// `ASSESSMENT_ANTHROPIC_API_KEY`. Mirrors `llm_client.rs::from_env`.
    pub fn from_env() -> Option<Self> {
        if let Ok(api_key) = std::env::var("ASSESSMENT_OPENROUTER_API_KEY") {
            return Some(Self {
                provider: LlmProviderKind::OpenRouter,
                model: std::env::var("ASSESSMENT_OPENROUTER_MODEL")
                    .unwrap_or_else(|_| "anthropic/claude-sonnet-4".to_string()),
                base_url: std::env::var("ASSESSMENT_OPENROUTER_BASE_URL")
                    .unwrap_or_else(|_| "https://openrouter.ai/api/v1".to_string()),
                api_key,
                temperature: default_temperature(),
                call_timeout: default_call_timeout(),
            });
        }
        if let Ok(api_key) = std::env::var("ASSESSMENT_OPENAI_API_KEY") {
            return Some(Self {
                provider: LlmProviderKind::OpenAI,
                model: std::env::var("ASSESSMENT_CHAT_MODEL")
                    .unwrap_or_else(|_| "gpt-4o".to_string()),
                base_url: std::env::var("ASSESSMENT_OPENAI_BASE_URL")
                    .unwrap_or_else(|_| "https://api.openai.com/v1".to_string()),
                api_key,
                temperature: default_temperature(),
                call_timeout: default_call_timeout(),
            });
        }
        if let Ok(api_key) = std::env::var("ASSESSMENT_ANTHROPIC_API_KEY") {
            return Some(Self {
                provider: LlmProviderKind::Anthropic,
                model: std::env::var("ASSESSMENT_ANTHROPIC_MODEL")
                    .unwrap_or_else(|_| "claude-sonnet-4-5-20250514".to_string()),
                base_url: std::env::var("ASSESSMENT_ANTHROPIC_BASE_URL")
                    .unwrap_or_else(|_| "https://api.anthropic.com/v1".to_string()),
                api_key,
                temperature: default_temperature(),
                call_timeout: default_call_timeout(),
            });
        }
        tracing::info!("No LLM API key found in environment, cloud LLM driver disabled");
        None
    }
}

fn default_temperature() -> f32 {
    0.3
}

fn default_call_timeout() -> Duration {
    Duration::from_secs(30)
}

/// Generation service tuning (C6, §4.6.1).
#[derive(Debug, Clone)]
pub struct GenerationConfig {
    /// §4.3 ReAct loop bound.
    pub max_iterations: u32,
    /// §4.6.1: "up to 3 attempts, exponential back-off".
    pub max_attempts: u32,
    /// §4.6.1 base back-off delay (1s, 2s, ...).
    pub backoff_base: Duration,
    /// §4.6.1: accept the partial set if >= min_items.
    pub min_items: u32,
    /// §4.6.1 default count.
    pub default_question_count: u32,
    /// §5: "per-generate_round budget: 90s default including retries."
    pub round_budget: Duration,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            max_iterations: 10,
            max_attempts: 3,
            backoff_base: Duration::from_secs(1),
            min_items: 1,
            default_question_count: 5,
            round_budget: Duration::from_secs(90),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Config {
    pub llm: Option<LlmConfig>,
    pub generation: GenerationConfig,
}

impl Config {
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();
        Self {
            llm: LlmConfig::from_env(),
            generation: GenerationConfig::default(),
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.generation.min_items > self.generation.default_question_count {
            return Err(ConfigError::Invalid(
                "min_items must not exceed default_question_count".into(),
            ));
        }
        if self.generation.max_attempts == 0 {
            return Err(ConfigError::Invalid(
                "max_attempts must be at least 1".into(),
            ));
        }
        if self.generation.max_iterations == 0 {
            return Err(ConfigError::Invalid(
                "max_iterations must be at least 1".into(),
            ));
        }
        if let Some(llm) = &self.llm {
            if llm.api_key.trim().is_empty() {
                return Err(ConfigError::MissingField("llm.api_key".into()));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    fn default_generation_config_matches_spec_defaults() {
        let cfg = GenerationConfig::default();
        assert_eq!(cfg.max_iterations, 10);
        assert_eq!(cfg.max_attempts, 3);
        assert_eq!(cfg.min_items, 1);
        assert_eq!(cfg.default_question_count, 5);
        assert_eq!(cfg.round_budget, Duration::from_secs(90));
    }

    #[test]
    fn validate_rejects_min_items_over_count() {
        let cfg = Config {
            llm: None,
            generation: GenerationConfig {
                min_items: 10,
                ..GenerationConfig::default()
            },
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    #[serial]
    fn llm_config_from_env_picks_openrouter_first() {
        std::env::set_var("ASSESSMENT_OPENROUTER_API_KEY", "test-key");
        std::env::remove_var("ASSESSMENT_OPENAI_API_KEY");
        std::env::remove_var("ASSESSMENT_ANTHROPIC_API_KEY");
        let llm = LlmConfig::from_env().unwrap();
        assert_eq!(llm.provider, LlmProviderKind::OpenRouter);
        assert!((llm.temperature - 0.3).abs() < f32::EPSILON);
        std::env::remove_var("ASSESSMENT_OPENROUTER_API_KEY");
    }

    #[test]
    #[serial]
    fn llm_config_from_env_none_without_keys() {
        std::env::remove_var("ASSESSMENT_OPENROUTER_API_KEY");
        std::env::remove_var("ASSESSMENT_OPENAI_API_KEY");
        std::env::remove_var("ASSESSMENT_ANTHROPIC_API_KEY");
        assert!(LlmConfig::from_env().is_none());
    }
}
