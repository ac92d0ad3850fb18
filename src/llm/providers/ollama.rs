use crate::config::LlmConfig;
use crate::llm::models::ChatTurn;
use crate::llm::{LlmError, TextGenerator};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, error, info};

pub struct OllamaProvider {
    client: reqwest::Client,
    api_url: String,
    model: String,
    max_tokens: u32,
}

#[derive(Serialize, Debug)]
struct OllamaRequest {
    model: String,
    messages: Vec<OllamaMessage>,
    stream: bool,
    options: OllamaOptions,
}

#[derive(Serialize, Deserialize, Debug)]
struct OllamaMessage {
    role: String,
    content: String,
}

#[derive(Serialize, Debug)]
struct OllamaOptions {
    temperature: f32,
    // Ollama's name for the reply token limit
    num_predict: u32,
}

#[derive(Deserialize, Debug)]
struct OllamaResponse {
    message: OllamaMessage,
    // Use serde to ignore unknown fields
    #[serde(flatten)]
    extra: std::collections::HashMap<String, serde_json::Value>,
}

impl OllamaProvider {
    pub fn new(config: &LlmConfig) -> Result<Self, LlmError> {
        let api_url = config
            .api_url
            .clone()
            .unwrap_or_else(|| "http://localhost:11434/api/chat".to_string());

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| LlmError::ConnectionError(e.to_string()))?;

        Ok(Self {
            client,
            api_url,
            model: config.model.clone(),
            max_tokens: config.max_tokens,
        })
    }

    fn build_request(&self, system: &str, turns: &[ChatTurn]) -> OllamaRequest {
        let mut messages = vec![OllamaMessage {
            role: "system".to_string(),
            content: system.to_string(),
        }];
        messages.extend(turns.iter().map(|turn| OllamaMessage {
            role: turn.role.as_str().to_string(),
            content: turn.content.clone(),
        }));

        OllamaRequest {
            model: self.model.clone(),
            messages,
            stream: false, // Explicitly disable streaming
            options: OllamaOptions {
                temperature: 0.1,
                num_predict: self.max_tokens,
            },
        }
    }
}

#[async_trait]
impl TextGenerator for OllamaProvider {
    async fn complete(&self, system: &str, turns: &[ChatTurn]) -> Result<String, LlmError> {
        let request = self.build_request(system, turns);

        info!("Sending request to Ollama with model: {}", self.model);
        debug!("API URL: {}", self.api_url);

        let response = self
            .client
            .post(&self.api_url)
            .json(&request)
            .send()
            .await
            .map_err(|e| LlmError::ConnectionError(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            // Try to get the error message from the response body
            let error_body = match response.text().await {
                Ok(body) => format!(" - Response body: {}", body),
                Err(_) => String::new(),
            };

            error!("Ollama API responded with status code: {}{}", status, error_body);
            return Err(LlmError::ResponseError(format!(
                "Ollama API responded with status code: {}{}",
                status, error_body
            )));
        }

        // Get the raw text response first for diagnostics
        let response_text = response.text().await
            .map_err(|e| LlmError::ResponseError(format!("Failed to read response body: {}", e)))?;

        debug!("Raw response from Ollama: {}", response_text);

        parse_reply(&response_text)
    }
}

fn parse_reply(body: &str) -> Result<String, LlmError> {
    let ollama_response = serde_json::from_str::<OllamaResponse>(body).map_err(|e| {
        error!("Failed to parse Ollama response: {} - Response was: {}", e, body);
        LlmError::ResponseError(format!("Failed to parse Ollama response: {}", e))
    })?;

    debug!("Ollama reply carried {} extra fields", ollama_response.extra.len());
    Ok(ollama_response.message.content)
}
