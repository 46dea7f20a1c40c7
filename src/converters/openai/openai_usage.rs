use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpenAIUsage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

impl OpenAIUsage {
    pub fn new(prompt_tokens: u32, completion_tokens: u32) -> Self {
        Self {
            prompt_tokens,
            completion_tokens,
            total_tokens: prompt_tokens.saturating_add(completion_tokens),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_total_tokens() {
        assert_eq!(OpenAIUsage::new(12, 5).total_tokens, 17);
    }

    #[test]
    fn test_total_tokens_saturates_on_huge_reports() {
        let usage = OpenAIUsage::new(u32::MAX - 1, 10);
        assert_eq!(usage.total_tokens, u32::MAX);
        assert_eq!(usage.prompt_tokens, u32::MAX - 1);
    }
}
