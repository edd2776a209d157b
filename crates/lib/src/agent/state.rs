//! Turn states and the pure transitions between them.
//!
//! ```text
//! ClassifyIntent -> DecideRetrieval -> Retrieve -> Generate -------> Validate -> Respond
//!                                   \-> GenerateDirect -----------/          \-> AskClarification
//! ```
//!
//! Every function here is pure. The driver in `turn.rs` performs the one collaborator call a
//! state needs and hands the outcome to the matching transition.

use serde::{Deserialize, Serialize};

use super::generator::{clamp_confidence, Generation, GeneratorError};
use super::response::{AgentResponse, CLARIFICATION_TEMPLATE, GREETING_TEMPLATE};
use crate::knowledge::RetrievedChunk;

/// Coarse purpose of a user message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Intent {
    Question,
    Complaint,
    Greeting,
    Other,
}

impl Intent {
    pub fn as_str(&self) -> &'static str {
        match self {
            Intent::Question => "question",
            Intent::Complaint => "complaint",
            Intent::Greeting => "greeting",
            Intent::Other => "other",
        }
    }

    /// Parse a classifier label. Known categories map to themselves; any other non-empty
    /// label (e.g. "request", "feedback") is `Other`. Returns None when there is no label.
    pub fn from_label(label: &str) -> Option<Self> {
        let word = label
            .split_whitespace()
            .next()?
            .trim_matches(|c: char| !c.is_alphanumeric())
            .to_lowercase();
        let intent = match word.as_str() {
            "" => return None,
            "question" => Intent::Question,
            "complaint" => Intent::Complaint,
            "greeting" => Intent::Greeting,
            _ => Intent::Other,
        };
        Some(intent)
    }
}

impl std::fmt::Display for Intent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where a turn currently is. `Respond` and `AskClarification` are terminal.
#[derive(Debug, Clone, PartialEq)]
pub enum TurnState {
    ClassifyIntent,
    DecideRetrieval {
        intent: Intent,
    },
    Retrieve {
        intent: Intent,
    },
    Generate {
        intent: Intent,
        chunks: Vec<RetrievedChunk>,
    },
    GenerateDirect {
        intent: Intent,
    },
    Validate {
        intent: Intent,
        generation: Generation,
        sources: Vec<String>,
        used_retrieval: bool,
    },
    Respond(AgentResponse),
    AskClarification(AgentResponse),
}

impl TurnState {
    pub fn name(&self) -> &'static str {
        match self {
            TurnState::ClassifyIntent => "classify_intent",
            TurnState::DecideRetrieval { .. } => "decide_retrieval",
            TurnState::Retrieve { .. } => "retrieve",
            TurnState::Generate { .. } => "generate",
            TurnState::GenerateDirect { .. } => "generate_direct",
            TurnState::Validate { .. } => "validate",
            TurnState::Respond(_) => "respond",
            TurnState::AskClarification(_) => "ask_clarification",
        }
    }

    /// Intent decided so far; None before classification.
    pub fn intent(&self) -> Option<Intent> {
        match self {
            TurnState::ClassifyIntent => None,
            TurnState::DecideRetrieval { intent }
            | TurnState::Retrieve { intent }
            | TurnState::Generate { intent, .. }
            | TurnState::GenerateDirect { intent }
            | TurnState::Validate { intent, .. } => Some(*intent),
            TurnState::Respond(r) | TurnState::AskClarification(r) => Some(r.intent),
        }
    }

    /// Whether the knowledge base has been searched by the time this state is reached.
    pub fn used_retrieval(&self) -> bool {
        match self {
            TurnState::Generate { .. } => true,
            TurnState::Validate { used_retrieval, .. } => *used_retrieval,
            TurnState::Respond(r) | TurnState::AskClarification(r) => r.used_retrieval,
            _ => false,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, TurnState::Respond(_) | TurnState::AskClarification(_))
    }

    /// The response of a terminal state.
    pub fn into_response(self) -> Option<AgentResponse> {
        match self {
            TurnState::Respond(r) | TurnState::AskClarification(r) => Some(r),
            _ => None,
        }
    }
}

/// ClassifyIntent -> DecideRetrieval. A failed classification counts as a question.
pub fn after_classification(outcome: Result<Intent, GeneratorError>) -> TurnState {
    let intent = match outcome {
        Ok(intent) => intent,
        Err(e) => {
            log::warn!("agent: intent classification failed, assuming question: {}", e);
            Intent::Question
        }
    };
    TurnState::DecideRetrieval { intent }
}

/// Small talk: an "other" message shorter than `small_talk_max_chars`.
pub fn is_small_talk(intent: Intent, message: &str, small_talk_max_chars: usize) -> bool {
    intent == Intent::Other && message.trim().chars().count() < small_talk_max_chars
}

/// Whether a message needs the knowledge base. Greetings and small talk do not.
pub fn needs_retrieval(intent: Intent, message: &str, small_talk_max_chars: usize) -> bool {
    match intent {
        Intent::Greeting => false,
        Intent::Question | Intent::Complaint => true,
        Intent::Other => !is_small_talk(intent, message, small_talk_max_chars),
    }
}

/// DecideRetrieval -> Retrieve | GenerateDirect.
pub fn decide_retrieval(intent: Intent, message: &str, small_talk_max_chars: usize) -> TurnState {
    if needs_retrieval(intent, message, small_talk_max_chars) {
        TurnState::Retrieve { intent }
    } else {
        TurnState::GenerateDirect { intent }
    }
}

/// GenerateDirect for a greeting: the template, fully confident, without a generator call.
pub fn greeting(intent: Intent) -> TurnState {
    TurnState::Validate {
        intent,
        generation: Generation::new(GREETING_TEMPLATE, 1.0),
        sources: Vec::new(),
        used_retrieval: false,
    }
}

/// Source ids of retrieved chunks, first occurrence kept, in retrieval order.
pub fn sources_of(chunks: &[RetrievedChunk]) -> Vec<String> {
    let mut sources: Vec<String> = Vec::new();
    for chunk in chunks {
        if !sources.contains(&chunk.source_id) {
            sources.push(chunk.source_id.clone());
        }
    }
    sources
}

/// Validate -> Respond | AskClarification. Below the threshold the answer is withheld and
/// a clarification prompt is returned instead.
pub fn validate(
    intent: Intent,
    generation: Generation,
    sources: Vec<String>,
    used_retrieval: bool,
    confidence_threshold: f32,
) -> TurnState {
    let confidence = clamp_confidence(generation.confidence);
    if confidence < confidence_threshold {
        let text = generation
            .clarification_question
            .filter(|q| !q.trim().is_empty())
            .unwrap_or_else(|| CLARIFICATION_TEMPLATE.to_string());
        TurnState::AskClarification(AgentResponse {
            text,
            confidence,
            sources,
            needs_clarification: true,
            intent,
            used_retrieval,
            error: None,
        })
    } else {
        TurnState::Respond(AgentResponse {
            text: generation.text,
            confidence,
            sources,
            needs_clarification: false,
            intent,
            used_retrieval,
            error: None,
        })
    }
}
