use crate::converters::openai::OpenAIImageUrl;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OpenAIContentItem {
    Text { text: String },
    ImageUrl { image_url: OpenAIImageUrl },
}
