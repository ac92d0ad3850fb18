use clap::Parser;
use r2d2::Pool;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

mod agent;
mod config;
mod db;
mod llm;
mod util;
mod web;

use crate::agent::extractor::SqlExtractor;
use crate::agent::orchestrator::ConversationOrchestrator;
use crate::agent::prompt::{PromptBuilder, DEFAULT_PREAMBLE};
use crate::config::{AppConfig, CliArgs};
use crate::db::db_pool::{DuckDBConnectionManager, DuckDbStore};
use crate::db::executor::QueryExecutor;
use crate::db::AnalyticalStore;
use crate::llm::LlmManager;
use crate::util::logging::init_tracing;
use crate::web::state::AppState;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // A missing .env is fine
    dotenvy::dotenv().ok();

    // Initialize logging
    init_tracing();

    // Parse command line arguments
    let args = CliArgs::parse();

    // Load configuration
    let config = match AppConfig::new(&args) {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            return Err(e.into());
        }
    };

    info!(
        "Initializing DuckDB connection pool for {} (read-only: {})",
        config.database.connection_string, config.database.read_only
    );
    let db_manager = DuckDBConnectionManager::new(
        config.database.connection_string.clone(),
        config.database.read_only,
    );
    let pool = Pool::builder()
        .max_size(config.database.pool_size as u32)
        .build(db_manager)?;
    let store = Arc::new(DuckDbStore::new(pool));

    let schema = if config.agent.include_schema {
        let schema_store = Arc::clone(&store);
        match tokio::task::spawn_blocking(move || schema_store.describe_schema()).await? {
            Ok(schema) => Some(schema),
            Err(e) => {
                warn!("Could not describe the database schema, continuing without it: {}", e);
                None
            }
        }
    } else {
        None
    };

    let preamble = match &config.agent.system_prompt_file {
        Some(path) => {
            info!("Loading system prompt from {}", path.display());
            tokio::fs::read_to_string(path).await?
        }
        None => DEFAULT_PREAMBLE.to_string(),
    };

    // Initialize LLM manager; an unusable backend is reported per request
    info!("Initializing LLM manager with backend: {}", config.llm.backend);
    let llm_manager = Arc::new(LlmManager::new(&config.llm));

    let prompts = PromptBuilder::new(
        &preamble,
        schema.as_deref(),
        &config.agent.marker,
        config.agent.summary_char_budget,
    );
    let executor = QueryExecutor::new(
        store,
        config.agent.statement_policy,
        config.agent.max_rows,
        Duration::from_secs(config.agent.query_timeout_secs),
    );
    let orchestrator = ConversationOrchestrator::new(
        llm_manager,
        executor,
        SqlExtractor::new(config.agent.marker.clone()),
        prompts,
        Duration::from_secs(config.agent.generator_timeout_secs),
    );

    let web_config = config.web.clone();
    let app_state = Arc::new(AppState::new(config, orchestrator));

    // Start the web server
    info!("Starting NL-Ledger server on {}:{}", web_config.host, web_config.port);
    match web::run_server(web_config, app_state).await {
        Ok(_) => info!("Server stopped gracefully"),
        Err(e) => {
            error!("Server error: {}", e);
            return Err(e.into());
        }
    }

    Ok(())
}
