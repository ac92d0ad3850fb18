use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

use super::AgentError;
use super::extractor::SqlExtractor;
use super::prompt::PromptBuilder;
use crate::db::executor::{QueryExecutor, QueryResult};
use crate::llm::models::ChatTurn;
use crate::llm::{LlmError, LlmManager, TextGenerator};

/// Where a chat exchange is, or where it stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ExchangeState {
    AwaitingFirstReply,
    ExtractingSql,
    NoSqlFound,
    Executing,
    ExecutionFailed,
    AnalyzingResults,
    Done,
    ConfigurationError,
    GeneratorFailed,
    AnalysisFailed,
}

/// Everything one question produced. Lives for a single request.
#[derive(Debug)]
pub struct ChatExchange {
    pub question: String,
    pub first_reply: Option<String>,
    pub statement: Option<String>,
    pub result: Option<QueryResult>,
    pub answer: Option<String>,
    pub state: ExchangeState,
    pub failure: Option<AgentError>,
}

impl ChatExchange {
    fn new(question: &str) -> Self {
        Self {
            question: question.to_string(),
            first_reply: None,
            statement: None,
            result: None,
            answer: None,
            state: ExchangeState::AwaitingFirstReply,
            failure: None,
        }
    }

    pub fn is_success(&self) -> bool {
        self.failure.is_none()
    }

    fn advance(&mut self, next: ExchangeState) {
        debug!("Chat exchange {:?} -> {:?}", self.state, next);
        self.state = next;
    }

    fn fail(&mut self, next: ExchangeState, failure: AgentError) {
        self.advance(next);
        self.failure = Some(failure);
    }
}

/// Drives the two-turn exchange: ask, extract, execute once, ask again with the results.
pub struct ConversationOrchestrator {
    llm: Arc<LlmManager>,
    executor: QueryExecutor,
    extractor: SqlExtractor,
    prompts: PromptBuilder,
    generator_timeout: Duration,
}

impl ConversationOrchestrator {
    pub fn new(
        llm: Arc<LlmManager>,
        executor: QueryExecutor,
        extractor: SqlExtractor,
        prompts: PromptBuilder,
        generator_timeout: Duration,
    ) -> Self {
        Self {
            llm,
            executor,
            extractor,
            prompts,
            generator_timeout,
        }
    }

    pub fn llm(&self) -> &LlmManager {
        &self.llm
    }

    pub fn executor(&self) -> &QueryExecutor {
        &self.executor
    }

    pub async fn handle(&self, question: &str) -> ChatExchange {
        let mut exchange = ChatExchange::new(question);

        // Availability is checked before anything is sent
        let generator = match self.llm.generator() {
            Ok(generator) => generator,
            Err(e) => {
                warn!("Chat request refused, generator unavailable: {}", e);
                exchange.fail(ExchangeState::ConfigurationError, configuration_failure(e));
                return exchange;
            }
        };

        let first_turn = [ChatTurn::user(question)];
        let first_reply = match self.ask(generator, &first_turn).await {
            Ok(reply) => reply,
            Err(LlmError::ConfigError(reason)) => {
                warn!("Generator rejected its configuration: {}", reason);
                exchange.fail(
                    ExchangeState::ConfigurationError,
                    AgentError::Configuration(reason),
                );
                return exchange;
            }
            Err(e) => {
                error!("First generator call failed: {}", e);
                exchange.fail(ExchangeState::GeneratorFailed, AgentError::Generator(e));
                return exchange;
            }
        };
        debug!("First reply: {}", first_reply);
        exchange.advance(ExchangeState::ExtractingSql);

        let Some(statement) = self.extractor.extract(&first_reply) else {
            info!("No SQL in the reply, answering conversationally");
            exchange.answer = Some(first_reply.clone());
            exchange.first_reply = Some(first_reply);
            exchange.advance(ExchangeState::NoSqlFound);
            return exchange;
        };
        exchange.first_reply = Some(first_reply.clone());
        info!("Extracted SQL: {}", statement);
        exchange.statement = Some(statement.clone());
        exchange.advance(ExchangeState::Executing);

        let result = match self.executor.execute(&statement).await {
            Ok(result) => result,
            Err(e) => {
                warn!("SQL execution failed: {}", e);
                exchange.fail(ExchangeState::ExecutionFailed, AgentError::Execution(e));
                return exchange;
            }
        };
        exchange.advance(ExchangeState::AnalyzingResults);

        let second_turns = [
            ChatTurn::user(question),
            ChatTurn::assistant(first_reply),
            ChatTurn::user(self.prompts.results_summary(&result)),
        ];
        exchange.result = Some(result);

        match self.ask(generator, &second_turns).await {
            Ok(analysis) => {
                debug!("Analysis reply: {}", analysis);
                exchange.answer = Some(analysis);
                exchange.advance(ExchangeState::Done);
                info!("Chat exchange complete");
            }
            Err(e) => {
                error!("Analysis generator call failed: {}", e);
                exchange.fail(ExchangeState::AnalysisFailed, AgentError::Analysis(e));
            }
        }

        exchange
    }

    async fn ask(&self, generator: &dyn TextGenerator, turns: &[ChatTurn]) -> Result<String, LlmError> {
        let call = generator.complete(self.prompts.system_prompt(), turns);
        match tokio::time::timeout(self.generator_timeout, call).await {
            Ok(reply) => reply,
            Err(_) => Err(LlmError::Timeout(self.generator_timeout.as_secs())),
        }
    }
}

fn configuration_failure(err: LlmError) -> AgentError {
    match err {
        LlmError::ConfigError(reason) => AgentError::Configuration(reason),
        other => AgentError::Configuration(other.to_string()),
    }
}
