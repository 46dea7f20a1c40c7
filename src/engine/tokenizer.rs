use crate::config::TokenizerConfig;
use anyhow::anyhow;
use std::sync::Arc;
use tokenizers::Tokenizer;
use tracing::{info, warn};

pub trait TokenCounter: Send + Sync {
    fn count_tokens(&self, text: &str) -> usize;
}

pub struct HfTokenCounter {
    tokenizer: Tokenizer,
}

impl HfTokenCounter {
    pub fn from_file(path: &str) -> anyhow::Result<Self> {
        let tokenizer = Tokenizer::from_file(path)
            .map_err(|e| anyhow!("Failed to load tokenizer {}: {}", path, e))?;
        Ok(Self { tokenizer })
    }
}

impl TokenCounter for HfTokenCounter {
    fn count_tokens(&self, text: &str) -> usize {
        match self.tokenizer.encode(text, false) {
            Ok(encoding) => encoding.len(),
            Err(e) => {
                warn!("Tokenizer failed, falling back to approximation: {}", e);
                ApproxTokenCounter.count_tokens(text)
            }
        }
    }
}

/// Roughly four characters per token.
#[derive(Debug, Default, Clone, Copy)]
pub struct ApproxTokenCounter;

impl TokenCounter for ApproxTokenCounter {
    fn count_tokens(&self, text: &str) -> usize {
        text.chars().count().div_ceil(4)
    }
}

pub fn load_token_counter(config: &TokenizerConfig) -> anyhow::Result<Arc<dyn TokenCounter>> {
    match &config.path {
        Some(path) => {
            let counter = HfTokenCounter::from_file(path)?;
            info!("Loaded tokenizer from: {}", path);
            Ok(Arc::new(counter))
        }
        None => {
            info!("No tokenizer configured, usage will be approximated");
            Ok(Arc::new(ApproxTokenCounter))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_approx_counter() {
        let counter = ApproxTokenCounter;
        assert_eq!(counter.count_tokens(""), 0);
        assert_eq!(counter.count_tokens("abc"), 1);
        assert_eq!(counter.count_tokens("abcd"), 1);
        assert_eq!(counter.count_tokens("abcde"), 2);
        // counts characters, not bytes
        assert_eq!(counter.count_tokens("你好世界"), 1);
    }

    #[test]
    fn test_missing_tokenizer_file_is_an_error() {
        let config = TokenizerConfig {
            path: Some("/nonexistent/tokenizer.json".to_string()),
        };
        assert!(load_token_counter(&config).is_err());
    }

    #[test]
    fn test_no_path_uses_approximation() {
        let counter = load_token_counter(&TokenizerConfig::default()).unwrap();
        assert_eq!(counter.count_tokens("Hello world!"), 3);
    }
}
