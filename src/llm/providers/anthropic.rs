use crate::config::LlmConfig;
use crate::llm::models::ChatTurn;
use crate::llm::{LlmError, TextGenerator};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, error};

const ANTHROPIC_API_URL: &str = "https://api.anthropic.com/v1/messages";
const ANTHROPIC_VERSION: &str = "2023-06-01";

pub struct AnthropicProvider {
    client: reqwest::Client,
    api_url: String,
    api_key: String,
    model: String,
    max_tokens: u32,
}

#[derive(Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    system: &'a str,
    messages: Vec<Message<'a>>,
}

#[derive(Serialize)]
struct Message<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct MessagesResponse {
    content: Vec<ContentBlock>,
}

#[derive(Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    block_type: String,
    #[serde(default)]
    text: String,
}

#[derive(Deserialize)]
struct ErrorResponse {
    error: ErrorDetail,
}

#[derive(Deserialize)]
struct ErrorDetail {
    message: String,
}

impl AnthropicProvider {
    pub fn new(config: &LlmConfig) -> Result<Self, LlmError> {
        let api_key = config
            .api_key
            .clone()
            .or_else(|| std::env::var("ANTHROPIC_API_KEY").ok())
            .filter(|key| !key.trim().is_empty())
            .ok_or_else(|| {
                LlmError::ConfigError(
                    "Anthropic API key not configured. Set ANTHROPIC_API_KEY environment variable."
                        .to_string(),
                )
            })?;

        let api_url = config
            .api_url
            .clone()
            .unwrap_or_else(|| ANTHROPIC_API_URL.to_string());

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| LlmError::ConnectionError(e.to_string()))?;

        Ok(Self {
            client,
            api_url,
            api_key,
            model: config.model.clone(),
            max_tokens: config.max_tokens,
        })
    }

    fn build_request<'a>(&'a self, system: &'a str, turns: &'a [ChatTurn]) -> MessagesRequest<'a> {
        MessagesRequest {
            model: &self.model,
            max_tokens: self.max_tokens,
            system,
            messages: turns
                .iter()
                .map(|turn| Message {
                    role: turn.role.as_str(),
                    content: &turn.content,
                })
                .collect(),
        }
    }

    fn parse_error(status: reqwest::StatusCode, body: &str) -> LlmError {
        if status == reqwest::StatusCode::UNAUTHORIZED {
            return LlmError::ConfigError("Authentication failed. Check your ANTHROPIC_API_KEY.".to_string());
        }

        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return LlmError::ResponseError("Rate limited. Please wait and try again.".to_string());
        }

        match serde_json::from_str::<ErrorResponse>(body) {
            Ok(parsed) => LlmError::ResponseError(format!("Anthropic API error: {}", parsed.error.message)),
            Err(_) => LlmError::ResponseError(format!("Anthropic API error ({}): {}", status, body)),
        }
    }
}

#[async_trait]
impl TextGenerator for AnthropicProvider {
    async fn complete(&self, system: &str, turns: &[ChatTurn]) -> Result<String, LlmError> {
        let request = self.build_request(system, turns);

        debug!("Sending {} turns to Anthropic model {}", turns.len(), self.model);

        let response = self
            .client
            .post(&self.api_url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&request)
            .send()
            .await
            .map_err(|e| LlmError::ConnectionError(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| LlmError::ResponseError(format!("Failed to read response body: {}", e)))?;

        if !status.is_success() {
            error!("Anthropic API responded with status code: {}", status);
            return Err(Self::parse_error(status, &body));
        }

        let parsed: MessagesResponse = serde_json::from_str(&body)
            .map_err(|e| LlmError::ResponseError(format!("Failed to parse Anthropic response: {}", e)))?;

        text_of(parsed)
    }
}

fn text_of(response: MessagesResponse) -> Result<String, LlmError> {
    let text = response
        .content
        .into_iter()
        .filter(|block| block.block_type == "text")
        .map(|block| block.text)
        .collect::<Vec<_>>()
        .join("");

    if text.is_empty() {
        return Err(LlmError::ResponseError("No text content in response".to_string()));
    }

    Ok(text)
}
