use crate::converters::openai::{OpenAIStreamChoice, OpenAIStreamDelta};
use crate::converters::stream::StreamChunk;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenAIStreamChunk {
    pub id: String,
    pub object: String,
    pub created: i64,
    pub model: String,
    pub choices: Vec<OpenAIStreamChoice>,
}

impl OpenAIStreamChunk {
    pub fn new(id: &str, created: i64, model: &str, chunk: StreamChunk) -> Self {
        let (delta, finish_reason) = match chunk {
            StreamChunk::RoleAnnounce => (
                OpenAIStreamDelta {
                    role: Some("assistant".to_string()),
                    content: None,
                },
                None,
            ),
            StreamChunk::ContentDelta(text) => (
                OpenAIStreamDelta {
                    role: None,
                    content: Some(text),
                },
                None,
            ),
            StreamChunk::Done => (OpenAIStreamDelta::default(), Some("stop".to_string())),
        };

        OpenAIStreamChunk {
            id: id.to_string(),
            object: "chat.completion.chunk".to_string(),
            created,
            model: model.to_string(),
            choices: vec![OpenAIStreamChoice {
                index: 0,
                delta,
                finish_reason,
            }],
        }
    }
}
