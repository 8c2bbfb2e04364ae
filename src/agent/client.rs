//! Provider registry and factory.
//!
//! Maps provider names to concrete [`LlmProvider`] and
//! [`EmbeddingProvider`] implementations.

use std::sync::Arc;

use crate::agent::config::AgentConfig;
use crate::agent::provider::{EmbeddingProvider, LlmProvider};
use crate::error::AgentError;

/// Text-generation and embedding capabilities resolved from configuration.
#[derive(Clone)]
pub struct Backend {
    /// Text-generation capability.
    pub llm: Arc<dyn LlmProvider>,
    /// Embedding/rerank capability for knowledge search.
    pub embeddings: Arc<dyn EmbeddingProvider>,
}

impl std::fmt::Debug for Backend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Backend")
            .field("llm", &self.llm.name())
            .finish_non_exhaustive()
    }
}

/// Creates a [`Backend`] based on the configured provider name.
///
/// # Supported Providers
///
/// - `"openai"` (default) - OpenAI-compatible APIs via `async-openai`
///
/// # Errors
///
/// Returns [`AgentError::UnsupportedProvider`] for unknown provider names,
/// or when the backend's feature is compiled out.
pub fn create_backend(config: &AgentConfig) -> Result<Backend, AgentError> {
    match config.provider.as_str() {
        #[cfg(feature = "openai")]
        "openai" => {
            let provider = Arc::new(crate::agent::providers::OpenAiProvider::new(config));
            Ok(Backend {
                llm: provider.clone(),
                embeddings: provider,
            })
        }
        other => Err(AgentError::UnsupportedProvider {
            name: other.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[cfg(feature = "openai")]
    #[test]
    fn test_create_openai_backend() {
        let config = AgentConfig::builder()
            .api_key("test")
            .provider("openai")
            .build()
            .unwrap_or_else(|_| unreachable!());
        let backend = create_backend(&config).unwrap_or_else(|_| unreachable!());
        assert_eq!(backend.llm.name(), "openai");
    }

    #[test]
    fn test_create_unknown_provider() {
        let config = AgentConfig::builder()
            .api_key("test")
            .provider("unknown")
            .build()
            .unwrap_or_else(|_| unreachable!());
        let result = create_backend(&config);
        assert!(matches!(
            result,
            Err(AgentError::UnsupportedProvider { ref name }) if name == "unknown"
        ));
    }
}
