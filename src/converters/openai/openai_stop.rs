use serde::{Deserialize, Serialize};

/// `stop` accepts either a single sequence or a list of them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OpenAIStop {
    Single(String),
    Multiple(Vec<String>),
}

impl OpenAIStop {
    pub fn into_vec(self) -> Vec<String> {
        match self {
            OpenAIStop::Single(s) => vec![s],
            OpenAIStop::Multiple(v) => v,
        }
    }
}
