use crate::converters::aggregate::Completion;
use crate::converters::helpers;
use crate::converters::openai::{OpenAIChoice, OpenAIResponseMessage, OpenAIUsage};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenAIResponse {
    pub id: String,
    pub object: String,
    pub created: i64,
    pub model: String,
    pub choices: Vec<OpenAIChoice>,
    pub usage: OpenAIUsage,
}

impl OpenAIResponse {
    pub fn from_completion(model: &str, completion: Completion) -> Self {
        OpenAIResponse {
            id: helpers::completion_id(),
            object: "chat.completion".to_string(),
            created: helpers::unix_timestamp(),
            model: model.to_string(),
            choices: vec![OpenAIChoice {
                index: 0,
                message: OpenAIResponseMessage {
                    role: "assistant".to_string(),
                    content: completion.text,
                },
                finish_reason: "stop".to_string(),
            }],
            usage: completion.usage.into(),
        }
    }
}
