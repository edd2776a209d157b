//! Conversational decision loop for customer support.
//!
//! Each user message runs through a small state machine (classify, decide whether to
//! retrieve, retrieve, generate, validate) and ends in either an answer or a clarification
//! request. The retriever and generator are injected capabilities; their failures never
//! escape a turn.

mod error;
mod generator;
pub mod prompts;
mod response;
mod state;
mod turn;

pub use error::TurnError;
pub use generator::{AnswerGenerator, Generation, GeneratorError, LlmGenerator};
pub use response::{AgentResponse, APOLOGY_TEMPLATE, CLARIFICATION_TEMPLATE, GREETING_TEMPLATE};
pub use state::{Intent, TurnState};
pub use turn::DecisionLoop;

use std::sync::Arc;

use crate::config::AgentConfig;
use crate::knowledge::KnowledgeRetriever;
use crate::session::{Message, SessionStore};

/// Support agent: the decision loop plus conversation memory keyed by session id.
#[derive(Clone)]
pub struct SupportAgent {
    decision_loop: DecisionLoop,
    sessions: Arc<SessionStore>,
}

impl SupportAgent {
    pub fn new(
        retriever: Arc<dyn KnowledgeRetriever>,
        generator: Arc<dyn AnswerGenerator>,
        config: AgentConfig,
    ) -> Self {
        Self {
            decision_loop: DecisionLoop::new(retriever, generator, config),
            sessions: Arc::new(SessionStore::new()),
        }
    }

    /// Share a session store with other agents or callers.
    pub fn with_sessions(mut self, sessions: Arc<SessionStore>) -> Self {
        self.sessions = sessions;
        self
    }

    pub fn sessions(&self) -> &Arc<SessionStore> {
        &self.sessions
    }

    pub fn decision_loop(&self) -> &DecisionLoop {
        &self.decision_loop
    }

    /// Run one turn for `session_id` over its conversation so far (empty for an unknown id).
    ///
    /// Answered and clarification turns append the user message and the reply, creating the
    /// conversation on first use. Degraded turns and empty messages leave the store untouched.
    pub async fn process_message(&self, user_message: &str, session_id: &str) -> AgentResponse {
        let history = self.sessions.history(session_id).await;
        log::info!(
            "agent: session {} turn with {} prior message(s)",
            session_id,
            history.len()
        );

        let response = self.decision_loop.run_turn(user_message, &history).await;

        if response.is_degraded() || user_message.trim().is_empty() {
            return response;
        }
        let session_id = self.sessions.get_or_create(session_id).await;
        if let Err(e) = self
            .sessions
            .append(
                &session_id,
                [Message::user(user_message), Message::agent(response.text.clone())],
            )
            .await
        {
            log::warn!("agent: could not record turn: {}", e);
        }
        response
    }
}
