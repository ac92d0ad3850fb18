pub mod extractor;
pub mod orchestrator;
pub mod prompt;

use crate::db::executor::ExecutionError;
use crate::llm::LlmError;
use thiserror::Error;

/// Why a chat exchange ended without a normal answer.
#[derive(Debug, Error)]
pub enum AgentError {
    /// No usable generator; nothing was sent.
    #[error("{0}")]
    Configuration(String),
    /// The first generator call failed.
    #[error("Text generation failed: {0}")]
    Generator(#[source] LlmError),
    #[error("SQL execution failed: {0}")]
    Execution(#[from] ExecutionError),
    /// The statement ran but the second generator call failed.
    #[error("Query ran but analysis failed: {0}")]
    Analysis(#[source] LlmError),
}
