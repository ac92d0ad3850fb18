use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;

use crate::agent::orchestrator::{ChatExchange, ExchangeState};
use crate::db::executor::QueryResult;
use crate::web::state::AppState;

// Chat types

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    #[serde(default)]
    pub question: String,
}

#[derive(Debug, Serialize)]
pub struct ChatResponse {
    pub success: bool,
    pub outcome: ExchangeState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sql: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<QueryResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl From<ChatExchange> for ChatResponse {
    fn from(exchange: ChatExchange) -> Self {
        let success = exchange.is_success();
        let error = exchange.failure.as_ref().map(|e| e.to_string());

        // Failed executions carry no answer text; other failures show their message
        let response = match exchange.state {
            ExchangeState::ExecutionFailed => None,
            _ => exchange.answer.or_else(|| error.clone()),
        };

        Self {
            success,
            outcome: exchange.state,
            response,
            sql: exchange.statement,
            data: exchange.result,
            error,
        }
    }
}

// System status

#[derive(Debug, Serialize)]
pub struct SystemStatus {
    pub version: String,
    pub uptime_seconds: i64,
    pub generator_available: bool,
    pub backend: String,
    pub model: String,
    pub statement_policy: String,
    pub max_rows: usize,
}

// API Implementations

// Always 200; the outcome lives in the body
pub async fn chat(
    State(app_state): State<Arc<AppState>>,
    Json(payload): Json<ChatRequest>,
) -> Json<ChatResponse> {
    info!("Chat question: {}", payload.question);

    let exchange = app_state.orchestrator.handle(&payload.question).await;
    info!("Chat outcome: {:?}", exchange.state);

    Json(ChatResponse::from(exchange))
}

pub async fn system_status(State(state): State<Arc<AppState>>) -> Json<SystemStatus> {
    let now = chrono::Utc::now();
    let uptime = now.signed_duration_since(state.startup_time).num_seconds();
    let llm = state.orchestrator.llm();

    Json(SystemStatus {
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds: uptime,
        generator_available: llm.is_available(),
        backend: llm.backend().to_string(),
        model: llm.model().to_string(),
        statement_policy: state.orchestrator.executor().policy().as_str().to_string(),
        max_rows: state.config.agent.max_rows,
    })
}
