pub mod models;
pub mod providers;

#[cfg(test)]
pub mod mock;

use crate::config::LlmConfig;
use async_trait::async_trait;
use models::ChatTurn;
use thiserror::Error;
use tracing::{info, warn};

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("LLM connection error: {0}")]
    ConnectionError(String),
    #[error("LLM response error: {0}")]
    ResponseError(String),
    #[error("LLM configuration error: {0}")]
    ConfigError(String),
    #[error("LLM request timed out after {0}s")]
    Timeout(u64),
}

/// A text-generation service: system prompt plus ordered turns in, free text out.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn complete(&self, system: &str, turns: &[ChatTurn]) -> Result<String, LlmError>;
}

/// Process-wide generator handle.
///
/// Building a provider can fail (missing key, unknown backend). That is recorded
/// rather than fatal, and every request asking for the generator gets the reason back.
pub struct LlmManager {
    generator: Result<Box<dyn TextGenerator>, String>,
    backend: String,
    model: String,
}

impl LlmManager {
    pub fn new(config: &LlmConfig) -> Self {
        let generator: Result<Box<dyn TextGenerator>, LlmError> = match config.backend.as_str() {
            "anthropic" => providers::anthropic::AnthropicProvider::new(config)
                .map(|p| Box::new(p) as Box<dyn TextGenerator>),
            "remote" => providers::remote::RemoteLlmProvider::new(config)
                .map(|p| Box::new(p) as Box<dyn TextGenerator>),
            "ollama" => providers::ollama::OllamaProvider::new(config)
                .map(|p| Box::new(p) as Box<dyn TextGenerator>),
            _ => Err(LlmError::ConfigError(format!(
                "Unsupported LLM backend: {}",
                config.backend
            ))),
        };

        let generator = match generator {
            Ok(generator) => {
                info!("LLM backend '{}' ready with model {}", config.backend, config.model);
                Ok(generator)
            }
            Err(e) => {
                warn!("LLM backend '{}' unavailable: {}", config.backend, e);
                Err(e.to_string())
            }
        };

        Self {
            generator,
            backend: config.backend.clone(),
            model: config.model.clone(),
        }
    }

    #[cfg(test)]
    pub fn with_generator(generator: Box<dyn TextGenerator>, backend: &str, model: &str) -> Self {
        Self {
            generator: Ok(generator),
            backend: backend.to_string(),
            model: model.to_string(),
        }
    }

    #[cfg(test)]
    pub fn unavailable(reason: &str, backend: &str, model: &str) -> Self {
        Self {
            generator: Err(reason.to_string()),
            backend: backend.to_string(),
            model: model.to_string(),
        }
    }

    /// The configured generator, or a `ConfigError` explaining why there is none.
    pub fn generator(&self) -> Result<&dyn TextGenerator, LlmError> {
        match &self.generator {
            Ok(generator) => Ok(&**generator),
            Err(reason) => Err(LlmError::ConfigError(reason.clone())),
        }
    }

    pub fn is_available(&self) -> bool {
        self.generator.is_ok()
    }

    pub fn backend(&self) -> &str {
        &self.backend
    }

    pub fn model(&self) -> &str {
        &self.model
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn llm_config(backend: &str) -> LlmConfig {
        LlmConfig {
            backend: backend.to_string(),
            model: "test-model".to_string(),
            api_key: None,
            api_url: None,
            max_tokens: 256,
            timeout_secs: 5,
        }
    }

    #[test]
    fn test_unknown_backend_degrades_to_config_error() {
        let manager = LlmManager::new(&llm_config("carrier-pigeon"));

        assert!(!manager.is_available());
        let err = manager.generator().err().unwrap();
        assert!(matches!(err, LlmError::ConfigError(_)));
        assert!(err.to_string().contains("Unsupported LLM backend: carrier-pigeon"));
    }

    #[test]
    fn test_remote_without_url_is_unavailable() {
        let manager = LlmManager::new(&llm_config("remote"));

        assert!(!manager.is_available());
        assert_eq!(manager.backend(), "remote");
        assert_eq!(manager.model(), "test-model");
    }

    #[test]
    fn test_ollama_needs_no_credentials() {
        let manager = LlmManager::new(&llm_config("ollama"));

        assert!(manager.is_available());
    }
}
