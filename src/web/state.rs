use crate::agent::orchestrator::ConversationOrchestrator;
use crate::config::AppConfig;

/// Shared application state for the web server
pub struct AppState {
    pub config: AppConfig,
    pub orchestrator: ConversationOrchestrator,
    pub startup_time: chrono::DateTime<chrono::Utc>,
}

impl AppState {
    pub fn new(config: AppConfig, orchestrator: ConversationOrchestrator) -> Self {
        Self {
            config,
            orchestrator,
            startup_time: chrono::Utc::now(),
        }
    }
}
