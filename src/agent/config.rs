//! Agent configuration with builder pattern and environment variable support.
//!
//! Configuration is resolved in order: explicit values → environment variables → defaults.
//! The resulting [`AgentConfig`] is built once at startup and handed to the
//! orchestrator, reasoning loops and CLI by reference.

use std::time::Duration;

use crate::error::AgentError;

/// Default reasoning-loop step budget.
const DEFAULT_MAX_ITERATIONS: usize = 10;
/// Default sampling temperature for reasoning steps.
const DEFAULT_STEP_TEMPERATURE: f32 = 0.2;
/// Default max tokens per reasoning step.
const DEFAULT_STEP_MAX_TOKENS: u32 = 2048;
/// Default sampling temperature for multi-agent synthesis.
const DEFAULT_SYNTHESIS_TEMPERATURE: f32 = 0.3;
/// Default max tokens for multi-agent synthesis.
const DEFAULT_SYNTHESIS_MAX_TOKENS: u32 = 2048;
/// Default sampling temperature for direct (general domain) answers.
const DEFAULT_GENERAL_TEMPERATURE: f32 = 0.3;
/// Default evaluation concurrency (sequential).
const DEFAULT_EVAL_CONCURRENCY: usize = 1;
/// Default per-case evaluation timeout in seconds.
const DEFAULT_CASE_TIMEOUT_SECS: u64 = 60;
/// Default generation model.
const DEFAULT_GENERATION_MODEL: &str = "gpt-4o-mini";
/// Default embedding model.
const DEFAULT_EMBEDDING_MODEL: &str = "text-embedding-3-small";

/// Configuration for the agent system.
#[derive(Debug, Clone)]
pub struct AgentConfig {
    /// LLM provider name (e.g., "openai").
    pub provider: String,
    /// API key for the provider.
    pub api_key: String,
    /// Optional base URL override (for proxies or compatible APIs).
    pub base_url: Option<String>,
    /// Model used for reasoning steps, synthesis and direct answers.
    pub generation_model: String,
    /// Model used for knowledge-base embeddings.
    pub embedding_model: String,
    /// Maximum reasoning iterations per agent run.
    pub max_iterations: usize,
    /// Sampling temperature for reasoning steps.
    pub step_temperature: f32,
    /// Maximum tokens per reasoning step.
    pub step_max_tokens: u32,
    /// Sampling temperature for multi-agent synthesis.
    pub synthesis_temperature: f32,
    /// Maximum tokens for multi-agent synthesis.
    pub synthesis_max_tokens: u32,
    /// Sampling temperature for general-domain direct answers.
    pub general_temperature: f32,
    /// Maximum evaluation cases running at once.
    pub eval_concurrency: usize,
    /// Time bound for each evaluation case step.
    pub case_timeout: Duration,
}

impl AgentConfig {
    /// Creates a new builder for `AgentConfig`.
    #[must_use]
    pub fn builder() -> AgentConfigBuilder {
        AgentConfigBuilder::default()
    }

    /// Creates configuration from environment variables with defaults.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError::ApiKeyMissing`] if no API key is found.
    pub fn from_env() -> Result<Self, AgentError> {
        Self::builder().from_env().build()
    }
}

/// Builder for [`AgentConfig`].
#[derive(Debug, Clone, Default)]
pub struct AgentConfigBuilder {
    provider: Option<String>,
    api_key: Option<String>,
    base_url: Option<String>,
    generation_model: Option<String>,
    embedding_model: Option<String>,
    max_iterations: Option<usize>,
    step_temperature: Option<f32>,
    step_max_tokens: Option<u32>,
    synthesis_temperature: Option<f32>,
    synthesis_max_tokens: Option<u32>,
    general_temperature: Option<f32>,
    eval_concurrency: Option<usize>,
    case_timeout: Option<Duration>,
}

impl AgentConfigBuilder {
    /// Populates unset fields from environment variables.
    #[must_use]
    pub fn from_env(mut self) -> Self {
        if self.provider.is_none() {
            self.provider = std::env::var("AGENT_ROUTER_PROVIDER").ok();
        }
        if self.api_key.is_none() {
            self.api_key = std::env::var("OPENAI_API_KEY")
                .or_else(|_| std::env::var("AGENT_ROUTER_API_KEY"))
                .ok();
        }
        if self.base_url.is_none() {
            self.base_url = std::env::var("OPENAI_BASE_URL")
                .or_else(|_| std::env::var("AGENT_ROUTER_BASE_URL"))
                .ok();
        }
        if self.generation_model.is_none() {
            self.generation_model = std::env::var("AGENT_ROUTER_MODEL").ok();
        }
        if self.embedding_model.is_none() {
            self.embedding_model = std::env::var("AGENT_ROUTER_EMBEDDING_MODEL").ok();
        }
        if self.max_iterations.is_none() {
            self.max_iterations = std::env::var("AGENT_ROUTER_MAX_ITERATIONS")
                .ok()
                .and_then(|v| v.parse().ok());
        }
        if self.eval_concurrency.is_none() {
            self.eval_concurrency = std::env::var("AGENT_ROUTER_EVAL_CONCURRENCY")
                .ok()
                .and_then(|v| v.parse().ok());
        }
        if self.case_timeout.is_none() {
            self.case_timeout = std::env::var("AGENT_ROUTER_CASE_TIMEOUT_SECS")
                .ok()
                .and_then(|v| v.parse::<f64>().ok())
                .and_then(|secs| Duration::try_from_secs_f64(secs).ok());
        }
        self
    }

    /// Sets the LLM provider name.
    #[must_use]
    pub fn provider(mut self, provider: impl Into<String>) -> Self {
        self.provider = Some(provider.into());
        self
    }

    /// Sets the API key.
    #[must_use]
    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    /// Sets the base URL override.
    #[must_use]
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    /// Sets the generation model.
    #[must_use]
    pub fn generation_model(mut self, model: impl Into<String>) -> Self {
        self.generation_model = Some(model.into());
        self
    }

    /// Sets the embedding model.
    #[must_use]
    pub fn embedding_model(mut self, model: impl Into<String>) -> Self {
        self.embedding_model = Some(model.into());
        self
    }

    /// Sets the reasoning-loop step budget.
    #[must_use]
    pub const fn max_iterations(mut self, n: usize) -> Self {
        self.max_iterations = Some(n);
        self
    }

    /// Sets the reasoning step temperature.
    #[must_use]
    pub const fn step_temperature(mut self, t: f32) -> Self {
        self.step_temperature = Some(t);
        self
    }

    /// Sets the reasoning step max tokens.
    #[must_use]
    pub const fn step_max_tokens(mut self, n: u32) -> Self {
        self.step_max_tokens = Some(n);
        self
    }

    /// Sets the synthesis temperature.
    #[must_use]
    pub const fn synthesis_temperature(mut self, t: f32) -> Self {
        self.synthesis_temperature = Some(t);
        self
    }

    /// Sets the synthesis max tokens.
    #[must_use]
    pub const fn synthesis_max_tokens(mut self, n: u32) -> Self {
        self.synthesis_max_tokens = Some(n);
        self
    }

    /// Sets the general-domain answer temperature.
    #[must_use]
    pub const fn general_temperature(mut self, t: f32) -> Self {
        self.general_temperature = Some(t);
        self
    }

    /// Sets the evaluation concurrency limit.
    #[must_use]
    pub const fn eval_concurrency(mut self, n: usize) -> Self {
        self.eval_concurrency = Some(n);
        self
    }

    /// Sets the per-case evaluation timeout.
    #[must_use]
    pub const fn case_timeout(mut self, duration: Duration) -> Self {
        self.case_timeout = Some(duration);
        self
    }

    /// Builds the [`AgentConfig`].
    ///
    /// # Errors
    ///
    /// Returns [`AgentError::ApiKeyMissing`] if no API key was set, or
    /// [`AgentError::InvalidConfig`] for a zero step budget or zero
    /// evaluation concurrency.
    pub fn build(self) -> Result<AgentConfig, AgentError> {
        let api_key = self.api_key.ok_or(AgentError::ApiKeyMissing)?;

        let max_iterations = self.max_iterations.unwrap_or(DEFAULT_MAX_ITERATIONS);
        if max_iterations == 0 {
            return Err(AgentError::InvalidConfig {
                message: "max_iterations must be at least 1".to_string(),
            });
        }
        let eval_concurrency = self.eval_concurrency.unwrap_or(DEFAULT_EVAL_CONCURRENCY);
        if eval_concurrency == 0 {
            return Err(AgentError::InvalidConfig {
                message: "eval_concurrency must be at least 1".to_string(),
            });
        }

        Ok(AgentConfig {
            provider: self.provider.unwrap_or_else(|| "openai".to_string()),
            api_key,
            base_url: self.base_url,
            generation_model: self
                .generation_model
                .unwrap_or_else(|| DEFAULT_GENERATION_MODEL.to_string()),
            embedding_model: self
                .embedding_model
                .unwrap_or_else(|| DEFAULT_EMBEDDING_MODEL.to_string()),
            max_iterations,
            step_temperature: self.step_temperature.unwrap_or(DEFAULT_STEP_TEMPERATURE),
            step_max_tokens: self.step_max_tokens.unwrap_or(DEFAULT_STEP_MAX_TOKENS),
            synthesis_temperature: self
                .synthesis_temperature
                .unwrap_or(DEFAULT_SYNTHESIS_TEMPERATURE),
            synthesis_max_tokens: self
                .synthesis_max_tokens
                .unwrap_or(DEFAULT_SYNTHESIS_MAX_TOKENS),
            general_temperature: self
                .general_temperature
                .unwrap_or(DEFAULT_GENERAL_TEMPERATURE),
            eval_concurrency,
            case_timeout: self
                .case_timeout
                .unwrap_or(Duration::from_secs(DEFAULT_CASE_TIMEOUT_SECS)),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_defaults() {
        let config = AgentConfig::builder()
            .api_key("test-key")
            .build()
            .unwrap_or_else(|_| unreachable!());
        assert_eq!(config.provider, "openai");
        assert_eq!(config.api_key, "test-key");
        assert_eq!(config.max_iterations, DEFAULT_MAX_ITERATIONS);
        assert_eq!(config.eval_concurrency, DEFAULT_EVAL_CONCURRENCY);
        assert_eq!(config.generation_model, DEFAULT_GENERATION_MODEL);
        assert_eq!(config.case_timeout, Duration::from_secs(60));
    }

    #[test]
    fn test_builder_missing_api_key() {
        let result = AgentConfig::builder().build();
        assert!(matches!(result, Err(AgentError::ApiKeyMissing)));
    }

    #[test]
    fn test_builder_rejects_zero_budget() {
        let result = AgentConfig::builder()
            .api_key("key")
            .max_iterations(0)
            .build();
        assert!(matches!(result, Err(AgentError::InvalidConfig { .. })));

        let result = AgentConfig::builder()
            .api_key("key")
            .eval_concurrency(0)
            .build();
        assert!(matches!(result, Err(AgentError::InvalidConfig { .. })));
    }

    #[test]
    fn test_builder_custom_values() {
        let config = AgentConfig::builder()
            .api_key("key")
            .provider("custom")
            .generation_model("command-r-plus")
            .max_iterations(4)
            .eval_concurrency(8)
            .case_timeout(Duration::from_secs(5))
            .build()
            .unwrap_or_else(|_| unreachable!());
        assert_eq!(config.provider, "custom");
        assert_eq!(config.generation_model, "command-r-plus");
        assert_eq!(config.max_iterations, 4);
        assert_eq!(config.eval_concurrency, 8);
        assert_eq!(config.case_timeout, Duration::from_secs(5));
    }
}
