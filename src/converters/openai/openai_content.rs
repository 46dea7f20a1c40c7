use serde::{Deserialize, Serialize};
use crate::converters::openai::openai_content_item::OpenAIContentItem;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OpenAIContent {
    Text(String),
    Array(Vec<OpenAIContentItem>),
}

impl Default for OpenAIContent {
    fn default() -> Self {
        OpenAIContent::Text(String::new())
    }
}

impl From<&str> for OpenAIContent {
    fn from(text: &str) -> Self {
        OpenAIContent::Text(text.to_string())
    }
}
