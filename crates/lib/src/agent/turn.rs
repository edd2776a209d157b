//! Step driver for one turn: performs the collaborator call each state needs and feeds the
//! outcome into the pure transitions in `state.rs`.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use super::error::TurnError;
use super::generator::{AnswerGenerator, GeneratorError};
use super::response::AgentResponse;
use super::state::{self, Intent, TurnState};
use crate::config::AgentConfig;
use crate::knowledge::{KnowledgeRetriever, RetrieverError};
use crate::session::Message;

/// Runs the decision loop for a single message against fixed collaborators.
#[derive(Clone)]
pub struct DecisionLoop {
    retriever: Arc<dyn KnowledgeRetriever>,
    generator: Arc<dyn AnswerGenerator>,
    config: AgentConfig,
}

/// Await `fut` for at most `limit`; `on_timeout` builds the error when it does not finish.
async fn bounded<T, E>(
    limit: Duration,
    fut: impl Future<Output = Result<T, E>>,
    on_timeout: impl FnOnce(Duration) -> E,
) -> Result<T, E> {
    match tokio::time::timeout(limit, fut).await {
        Ok(r) => r,
        Err(_) => Err(on_timeout(limit)),
    }
}

impl DecisionLoop {
    pub fn new(
        retriever: Arc<dyn KnowledgeRetriever>,
        generator: Arc<dyn AnswerGenerator>,
        config: AgentConfig,
    ) -> Self {
        Self {
            retriever,
            generator,
            config,
        }
    }

    pub fn config(&self) -> &AgentConfig {
        &self.config
    }

    fn call_timeout(&self) -> Duration {
        Duration::from_secs(self.config.call_timeout_secs)
    }

    /// Drive `message` from `ClassifyIntent` to a terminal state. Always returns a response:
    /// collaborator failures end the turn with the apology template.
    pub async fn run_turn(&self, message: &str, history: &[Message]) -> AgentResponse {
        if message.trim().is_empty() {
            log::debug!("agent: empty message, asking for details");
            return AgentResponse::empty_message();
        }

        let mut state = TurnState::ClassifyIntent;
        loop {
            state = match state {
                TurnState::Respond(r) | TurnState::AskClarification(r) => {
                    log::info!(
                        "agent: turn done (intent {}, confidence {:.2}, clarification {})",
                        r.intent,
                        r.confidence,
                        r.needs_clarification
                    );
                    return r;
                }
                current => {
                    let from = current.name();
                    let intent = current.intent().unwrap_or(Intent::Question);
                    let used_retrieval = current.used_retrieval();
                    match self.step(current, message, history).await {
                        Ok(next) => {
                            log::debug!("agent: {} -> {}", from, next.name());
                            next
                        }
                        Err(e) => {
                            log::warn!("agent: {} failed, degrading turn: {}", from, e);
                            return AgentResponse::degraded(intent, used_retrieval, &e);
                        }
                    }
                }
            };
        }
    }

    /// Advance one non-terminal state.
    pub async fn step(
        &self,
        current: TurnState,
        message: &str,
        history: &[Message],
    ) -> Result<TurnState, TurnError> {
        let limit = self.call_timeout();
        let next = match current {
            TurnState::ClassifyIntent => {
                let outcome = bounded(
                    limit,
                    self.generator.classify_intent(message),
                    GeneratorError::Timeout,
                )
                .await;
                state::after_classification(outcome)
            }
            TurnState::DecideRetrieval { intent } => {
                state::decide_retrieval(intent, message, self.config.small_talk_max_chars)
            }
            TurnState::Retrieve { intent } => {
                let chunks = bounded(
                    limit,
                    self.retriever.search(
                        message,
                        self.config.top_k,
                        self.config.min_similarity,
                    ),
                    |d| RetrieverError::Unavailable(format!("search timed out after {:?}", d)),
                )
                .await?;
                log::info!("agent: retrieved {} chunk(s)", chunks.len());
                TurnState::Generate { intent, chunks }
            }
            TurnState::Generate { intent, chunks } => {
                let context: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
                let generation = bounded(
                    limit,
                    self.generator.generate(message, &context, history),
                    GeneratorError::Timeout,
                )
                .await?;
                TurnState::Validate {
                    intent,
                    generation,
                    sources: state::sources_of(&chunks),
                    used_retrieval: true,
                }
            }
            TurnState::GenerateDirect {
                intent: Intent::Greeting,
            } => state::greeting(Intent::Greeting),
            TurnState::GenerateDirect { intent } => {
                let generation = bounded(
                    limit,
                    self.generator.generate(message, &[], history),
                    GeneratorError::Timeout,
                )
                .await?;
                TurnState::Validate {
                    intent,
                    generation,
                    sources: Vec::new(),
                    used_retrieval: false,
                }
            }
            TurnState::Validate {
                intent,
                generation,
                sources,
                used_retrieval,
            } => state::validate(
                intent,
                generation,
                sources,
                used_retrieval,
                self.config.confidence_threshold,
            ),
            terminal @ (TurnState::Respond(_) | TurnState::AskClarification(_)) => terminal,
        };
        Ok(next)
    }
}
