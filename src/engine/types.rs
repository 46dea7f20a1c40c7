use crate::converters::openai::OpenAIUsage;
use serde::{Deserialize, Serialize};

/// One question/answer pair of the prior conversation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversationTurn {
    pub question: String,
    pub answer: String,
}

impl ConversationTurn {
    pub fn new(question: impl Into<String>, answer: impl Into<String>) -> Self {
        Self {
            question: question.into(),
            answer: answer.into(),
        }
    }
}

/// What the engine is asked to answer.
///
/// `Continuation` is produced when the conversation does not end with a user
/// message (for example after a tool observation): the engine must keep
/// generating the last assistant turn instead of starting a new one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Query {
    Text(String),
    Continuation,
}

impl Query {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Query::Text(text) => Some(text),
            Query::Continuation => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SamplingParams {
    pub temperature: f64,
    pub top_p: f64,
    pub max_tokens: u32,
    pub repetition_penalty: f64,
    pub stop: Vec<String>,
}

/// Engine input built fresh for every request.
#[derive(Debug, Clone)]
pub struct NormalizedRequest {
    pub query: Query,
    pub history: Vec<ConversationTurn>,
    pub images: Vec<Vec<u8>>,
    pub sampling: SamplingParams,
}

impl NormalizedRequest {
    /// Plain-text rendering used for token accounting.
    pub fn prompt_text(&self) -> String {
        let mut parts: Vec<&str> = Vec::with_capacity(self.history.len() * 2 + 1);
        for turn in &self.history {
            parts.push(&turn.question);
            parts.push(&turn.answer);
        }
        if let Some(query) = self.query.as_text() {
            parts.push(query);
        }
        parts.join("\n")
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
}

impl From<TokenUsage> for OpenAIUsage {
    fn from(usage: TokenUsage) -> Self {
        OpenAIUsage::new(usage.prompt_tokens, usage.completion_tokens)
    }
}

/// Cumulative generated text at one step of a generation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    pub text: String,
    pub usage: Option<TokenUsage>,
}

impl Snapshot {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            usage: None,
        }
    }
}
