use crate::converters::openai::openai_content::OpenAIContent;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OpenAIMessage {
    pub role: String,
    #[serde(default)]
    pub content: OpenAIContent,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

#[cfg(test)]
impl OpenAIMessage {
    pub fn new(role: &str, content: impl Into<OpenAIContent>) -> Self {
        Self {
            role: role.to_string(),
            content: content.into(),
            name: None,
        }
    }
}
