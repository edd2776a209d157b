//! Answer generator capability and its LLM-backed implementation.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::prompts;
use super::state::Intent;
use crate::llm::{ChatMessage, ChatOptions, LlmBackend, LlmError};
use crate::session::Message;

/// Generated answer with the generator's own confidence estimate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Generation {
    pub text: String,
    /// Self-reported, in [0, 1].
    pub confidence: f32,
    /// Question to ask the user when the generator judged the request ambiguous.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub clarification_question: Option<String>,
}

impl Generation {
    /// Confidence is clamped to [0, 1]; non-finite values become 0.
    pub fn new(text: impl Into<String>, confidence: f32) -> Self {
        Self {
            text: text.into(),
            confidence: clamp_confidence(confidence),
            clarification_question: None,
        }
    }

    pub fn with_clarification(mut self, question: impl Into<String>) -> Self {
        self.clarification_question = Some(question.into());
        self
    }
}

pub(crate) fn clamp_confidence(c: f32) -> f32 {
    if c.is_finite() {
        c.clamp(0.0, 1.0)
    } else {
        0.0
    }
}

#[derive(Debug, thiserror::Error)]
pub enum GeneratorError {
    #[error(transparent)]
    Backend(#[from] LlmError),
    #[error("unparseable generator output: {0}")]
    Unparseable(String),
    #[error("generator timed out after {0:?}")]
    Timeout(std::time::Duration),
}

/// Language-model capability the decision loop classifies and answers through.
#[async_trait]
pub trait AnswerGenerator: Send + Sync {
    /// Map raw user text to an intent category.
    async fn classify_intent(&self, message: &str) -> Result<Intent, GeneratorError>;

    /// Answer `query` from `context` (retrieved chunk texts, possibly empty) and prior conversation.
    async fn generate(
        &self,
        query: &str,
        context: &[String],
        history: &[Message],
    ) -> Result<Generation, GeneratorError>;
}

/// `AnswerGenerator` over any chat backend. Confidence comes from a second self-evaluation call.
pub struct LlmGenerator<B> {
    backend: B,
    model: String,
    options: ChatOptions,
    max_history_messages: usize,
}

impl<B: LlmBackend> LlmGenerator<B> {
    pub fn new(backend: B, model: impl Into<String>) -> Self {
        Self {
            backend,
            model: model.into(),
            options: ChatOptions::default(),
            max_history_messages: 20,
        }
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.options.temperature = Some(temperature);
        self
    }

    pub fn with_max_history(mut self, max_history_messages: usize) -> Self {
        self.max_history_messages = max_history_messages;
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }
}

#[async_trait]
impl<B: LlmBackend> AnswerGenerator for LlmGenerator<B> {
    async fn classify_intent(&self, message: &str) -> Result<Intent, GeneratorError> {
        let messages = vec![
            ChatMessage::system(prompts::INTENT_SYSTEM_PROMPT),
            ChatMessage::user(message),
        ];
        let reply = self
            .backend
            .chat(&self.model, messages, self.options)
            .await?;
        let intent = Intent::from_label(&reply)
            .ok_or_else(|| GeneratorError::Unparseable(format!("intent label {:?}", reply)))?;
        log::debug!("agent: classified intent {} via {}", intent, self.backend.name());
        Ok(intent)
    }

    async fn generate(
        &self,
        query: &str,
        context: &[String],
        history: &[Message],
    ) -> Result<Generation, GeneratorError> {
        let mut messages = vec![ChatMessage::system(prompts::SUPPORT_SYSTEM_PROMPT)];
        messages.extend(prompts::history_messages(history, self.max_history_messages));
        messages.push(ChatMessage::user(prompts::answer_prompt(query, context)));

        let answer = self
            .backend
            .chat(&self.model, messages, self.options)
            .await?;
        let answer = answer.trim().to_string();
        if answer.is_empty() {
            return Err(GeneratorError::Unparseable("empty answer".to_string()));
        }
        log::info!("agent: generated answer ({} chars)", answer.len());

        let review = self
            .backend
            .chat(
                &self.model,
                vec![ChatMessage::user(prompts::self_evaluation_prompt(query, &answer))],
                self.options,
            )
            .await?;
        let evaluation = prompts::parse_self_evaluation(&review);
        log::info!(
            "agent: self-evaluation confidence {:.2}, clarification needed: {}",
            evaluation.confidence,
            evaluation.clarification_needed
        );

        let mut generation = Generation::new(answer, evaluation.confidence);
        generation.clarification_question = evaluation.clarification_question;
        Ok(generation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex};

    /// Backend that replays canned replies and records every request.
    struct Scripted {
        replies: Mutex<VecDeque<Result<String, String>>>,
        seen: Mutex<Vec<Vec<ChatMessage>>>,
    }

    impl Scripted {
        fn new(replies: Vec<Result<&str, &str>>) -> Self {
            Self {
                replies: Mutex::new(
                    replies
                        .into_iter()
                        .map(|r| r.map(str::to_string).map_err(str::to_string))
                        .collect(),
                ),
                seen: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl LlmBackend for Scripted {
        fn name(&self) -> &'static str {
            "scripted"
        }

        async fn chat(
            &self,
            _model: &str,
            messages: Vec<ChatMessage>,
            _options: ChatOptions,
        ) -> Result<String, LlmError> {
            self.seen.lock().unwrap().push(messages);
            self.replies
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err("no reply scripted".to_string()))
                .map_err(LlmError::Api)
        }

        async fn embed(&self, _model: &str, _inputs: &[String]) -> Result<Vec<Vec<f32>>, LlmError> {
            Err(LlmError::Api("not supported".to_string()))
        }

        async fn list_models(&self) -> Result<Vec<String>, LlmError> {
            Ok(vec!["scripted".to_string()])
        }
    }

    #[test]
    fn generation_confidence_clamped() {
        assert_eq!(Generation::new("x", 1.7).confidence, 1.0);
        assert_eq!(Generation::new("x", -0.2).confidence, 0.0);
        assert_eq!(Generation::new("x", f32::NAN).confidence, 0.0);
    }

    #[tokio::test]
    async fn classify_parses_label() {
        let backend = Arc::new(Scripted::new(vec![Ok("Greeting\n")]));
        let generator = LlmGenerator::new(backend.clone(), "m");
        assert_eq!(generator.classify_intent("Hi").await.unwrap(), Intent::Greeting);
        let seen = backend.seen.lock().unwrap();
        assert_eq!(seen[0][0].role, "system");
        assert_eq!(seen[0][1], ChatMessage::user("Hi"));
    }

    #[tokio::test]
    async fn classify_empty_label_is_error() {
        let backend = Arc::new(Scripted::new(vec![Ok("  ")]));
        let generator = LlmGenerator::new(backend, "m");
        assert!(matches!(
            generator.classify_intent("Hi").await,
            Err(GeneratorError::Unparseable(_))
        ));
    }

    #[tokio::test]
    async fn generate_uses_context_history_and_self_evaluation() {
        let backend = Arc::new(Scripted::new(vec![
            Ok("Returns are accepted within 30 days."),
            Ok("COMPLETE: yes\nCLARIFICATION_NEEDED: no\nCONFIDENCE: 0.92"),
        ]));
        let generator = LlmGenerator::new(backend.clone(), "m").with_max_history(1);
        let history = vec![Message::user("earlier"), Message::agent("reply")];
        let g = generator
            .generate(
                "What's your return policy?",
                &["Returns within 30 days of purchase.".to_string()],
                &history,
            )
            .await
            .unwrap();
        assert_eq!(g.text, "Returns are accepted within 30 days.");
        assert_eq!(g.confidence, 0.92);
        assert_eq!(g.clarification_question, None);

        let seen = backend.seen.lock().unwrap();
        assert_eq!(seen.len(), 2);
        let answer_call = &seen[0];
        assert_eq!(answer_call.len(), 3);
        assert_eq!(answer_call[1], ChatMessage::assistant("reply"));
        assert!(answer_call[2].content.contains("Returns within 30 days of purchase."));
        assert!(seen[1][0].content.contains("Agent Answer: Returns are accepted within 30 days."));
    }

    #[tokio::test]
    async fn markdown_self_evaluation_keeps_low_confidence() {
        let backend = Arc::new(Scripted::new(vec![
            Ok("It might be 30 days."),
            Ok("**COMPLETE:** no\n**CLARIFICATION_NEEDED:** yes\n**CONFIDENCE:** 0.3 (unsure)\n**CLARIFICATION_QUESTION:** Which item did you buy?"),
        ]));
        let generator = LlmGenerator::new(backend, "m");
        let g = generator.generate("Can I return it?", &[], &[]).await.unwrap();
        assert_eq!(g.confidence, 0.3);
        assert_eq!(g.clarification_question.as_deref(), Some("Which item did you buy?"));

        let state = crate::agent::state::validate(Intent::Question, g, Vec::new(), false, 0.7);
        let r = state.into_response().unwrap();
        assert!(r.needs_clarification);
        assert_eq!(r.text, "Which item did you buy?");
    }

    #[tokio::test]
    async fn generate_propagates_backend_failure() {
        let backend = Arc::new(Scripted::new(vec![Err("503 Service Unavailable")]));
        let generator = LlmGenerator::new(backend, "m");
        let err = generator.generate("q", &[], &[]).await.unwrap_err();
        assert!(matches!(err, GeneratorError::Backend(LlmError::Api(_))));
    }
}
