//! Prompt text for the LLM-backed generator and parsers for what comes back.

use crate::llm::ChatMessage;
use crate::session::{Message, Role};

pub const INTENT_SYSTEM_PROMPT: &str = "You are an intent classifier for a customer support system.
Classify the user's intent into one of these categories:
- greeting: General greetings, hello, hi
- question: Asking about products, services, policies
- complaint: Expressing dissatisfaction
- request: Requesting specific action
- feedback: Providing feedback
- other: Anything else

Respond with just the category name.";

pub const SUPPORT_SYSTEM_PROMPT: &str = "You are a professional customer support agent. Your role is to:

1. Provide accurate, helpful answers based on the information available
2. Be empathetic and understanding
3. Acknowledge when you don't have enough information
4. Keep responses concise but complete
5. Never make up information

If knowledge base excerpts are provided, answer from them. If they do not contain the answer, say so and suggest next steps.";

/// Default confidence when the self-evaluation omits or garbles its CONFIDENCE line.
pub const DEFAULT_SELF_CONFIDENCE: f32 = 0.8;

/// User prompt for the answer: the query plus numbered knowledge excerpts, if any.
pub fn answer_prompt(query: &str, context: &[String]) -> String {
    let mut out = format!("User Query: {}\n\n", query.trim());
    if context.is_empty() {
        out.push_str("Provide a direct, helpful response based on your general knowledge.\n");
        return out;
    }
    out.push_str("Knowledge Base Results:\n");
    for (i, excerpt) in context.iter().enumerate() {
        out.push_str(&format!("[Document {}]\n{}\n\n", i + 1, excerpt.trim()));
    }
    out.push_str(
        "Based on the above information, provide a helpful answer. If the knowledge base doesn't contain enough information, be honest about it.\n",
    );
    out
}

/// Prompt asking the model to grade its own answer in a fixed line format.
pub fn self_evaluation_prompt(query: &str, answer: &str) -> String {
    format!(
        "Review this support interaction:

User Query: {}
Agent Answer: {}

Evaluate:
1. Is the answer complete and helpful?
2. Does it require clarification from the user?
3. Rate confidence (0-1)

Respond in this format:
COMPLETE: yes/no
CLARIFICATION_NEEDED: yes/no
CONFIDENCE: 0.X
CLARIFICATION_QUESTION: [if needed, ask a specific question]",
        query.trim(),
        answer.trim()
    )
}

/// Chat messages for the most recent `max` history entries, oldest first.
pub fn history_messages(history: &[Message], max: usize) -> Vec<ChatMessage> {
    let skip = history.len().saturating_sub(max);
    history
        .iter()
        .skip(skip)
        .map(|m| match m.role {
            Role::User => ChatMessage::user(m.text.clone()),
            Role::Agent => ChatMessage::assistant(m.text.clone()),
        })
        .collect()
}

/// Parsed self-evaluation.
#[derive(Debug, Clone, PartialEq)]
pub struct SelfEvaluation {
    pub confidence: f32,
    pub clarification_needed: bool,
    pub clarification_question: Option<String>,
}

/// Markdown emphasis models like to wrap keys and values in.
fn is_markup(c: char) -> bool {
    matches!(c, '*' | '_' | '`')
}

fn field<'a>(line: &'a str, key: &str) -> Option<&'a str> {
    let (k, v) = line.split_once(':')?;
    if k.trim().trim_matches(is_markup).trim().eq_ignore_ascii_case(key) {
        Some(v.trim().trim_matches(is_markup).trim())
    } else {
        None
    }
}

/// Leading number of `value`; "85%" is a percent, anything else is clamped to [0, 1].
/// Trailing text such as "0.3." or "0.3 (unsure)" is ignored.
fn parse_confidence(value: &str) -> Option<f32> {
    let end = value
        .find(|c: char| !(c.is_ascii_digit() || c == '.'))
        .unwrap_or(value.len());
    let (number, rest) = value.split_at(end);
    let c: f32 = number.trim_end_matches('.').parse().ok()?;
    if !c.is_finite() {
        return None;
    }
    let c = if rest.trim_start().starts_with('%') { c / 100.0 } else { c };
    Some(c.clamp(0.0, 1.0))
}

pub fn parse_self_evaluation(text: &str) -> SelfEvaluation {
    let mut confidence = None;
    let mut clarification_needed = false;
    let mut clarification_question = None;
    for line in text.lines() {
        let line = line.trim().trim_start_matches(['-', '*', '#']).trim();
        if let Some(v) = field(line, "CONFIDENCE") {
            confidence = parse_confidence(v);
        } else if let Some(v) = field(line, "CLARIFICATION_NEEDED") {
            clarification_needed = v.to_lowercase().starts_with("yes");
        } else if let Some(v) = field(line, "CLARIFICATION_QUESTION") {
            let q = v.trim_matches(|c| c == '[' || c == ']').trim();
            if !q.is_empty() {
                clarification_question = Some(q.to_string());
            }
        }
    }
    SelfEvaluation {
        confidence: confidence.unwrap_or(DEFAULT_SELF_CONFIDENCE),
        clarification_needed,
        clarification_question: clarification_question.filter(|_| clarification_needed),
    }
}
