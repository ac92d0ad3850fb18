//! Scripted generator for tests.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use super::models::ChatTurn;
use super::{LlmError, TextGenerator};

/// A recorded call: the system prompt and the turns it was sent.
pub type RecordedCall = (String, Vec<ChatTurn>);

/// Replays queued replies in order and records every conversation it receives.
#[derive(Default)]
pub struct ScriptedGenerator {
    replies: Mutex<VecDeque<Result<String, LlmError>>>,
    calls: Arc<Mutex<Vec<RecordedCall>>>,
    delay: Option<Duration>,
}

impl ScriptedGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reply(self, text: impl Into<String>) -> Self {
        self.replies.lock().unwrap().push_back(Ok(text.into()));
        self
    }

    pub fn fail(self, err: LlmError) -> Self {
        self.replies.lock().unwrap().push_back(Err(err));
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn calls(&self) -> Arc<Mutex<Vec<RecordedCall>>> {
        Arc::clone(&self.calls)
    }
}

#[async_trait]
impl TextGenerator for ScriptedGenerator {
    async fn complete(&self, system: &str, turns: &[ChatTurn]) -> Result<String, LlmError> {
        self.calls
            .lock()
            .unwrap()
            .push((system.to_string(), turns.to_vec()));

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(LlmError::ResponseError("script exhausted".to_string())))
    }
}
