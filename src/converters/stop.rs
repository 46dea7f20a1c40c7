/// Stop sequences requested by the client, applied to generated text.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StopSequences {
    words: Vec<String>,
}

impl StopSequences {
    /// Also registers every word with its leading newlines removed, since a
    /// leading `\n` is often tokenized together with the previous text.
    pub fn new(words: &[String]) -> Self {
        let mut out: Vec<String> = Vec::with_capacity(words.len() * 2);
        for word in words {
            if !word.is_empty() && !out.contains(word) {
                out.push(word.clone());
            }
        }
        for word in words {
            let stripped = word.trim_start_matches('\n');
            if !stripped.is_empty() && !out.iter().any(|w| w == stripped) {
                out.push(stripped.to_string());
            }
        }
        Self { words: out }
    }

    pub fn words(&self) -> &[String] {
        &self.words
    }

    /// Text before the earliest stop sequence, if one occurs.
    pub fn truncate<'a>(&self, text: &'a str) -> Option<&'a str> {
        self.words
            .iter()
            .filter_map(|word| text.find(word.as_str()))
            .min()
            .map(|idx| &text[..idx])
    }

    /// Byte length of the longest suffix of `text` that could still grow into a
    /// stop sequence. That part must not be shown to the client yet.
    pub fn partial_suffix_len(&self, text: &str) -> usize {
        let mut longest = 0;
        for word in &self.words {
            let min_start = text.len().saturating_sub(word.len() - 1);
            let hit = text
                .char_indices()
                .map(|(i, _)| i)
                .skip_while(|i| *i < min_start)
                .find(|i| word.starts_with(&text[*i..]));
            if let Some(start) = hit {
                longest = longest.max(text.len() - start);
            }
        }
        longest
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stops(words: &[&str]) -> StopSequences {
        StopSequences::new(&words.iter().map(|w| w.to_string()).collect::<Vec<_>>())
    }

    #[test]
    fn test_newline_variants_are_added() {
        let s = stops(&["\nObservation:", "Observation:", "", "\n"]);
        assert_eq!(s.words(), &["\nObservation:".to_string(), "Observation:".to_string(), "\n".to_string()]);

        let s = stops(&["\n\nUser:"]);
        assert_eq!(s.words(), &["\n\nUser:".to_string(), "User:".to_string()]);
    }

    #[test]
    fn test_truncate_at_earliest() {
        let s = stops(&["\nObservation:", "<|end|>"]);
        assert_eq!(s.truncate("Action: search<|end|>\nObservation: x"), Some("Action: search"));
        assert_eq!(s.truncate("Action: search\nObservation: x"), Some("Action: search"));
        assert_eq!(s.truncate("no stop here"), None);
        assert_eq!(stops(&[]).truncate("anything"), None);
    }

    #[test]
    fn test_partial_suffix() {
        let s = stops(&["\nObservation:"]);
        assert_eq!(s.partial_suffix_len("Action: x\nObs"), 4);
        assert_eq!(s.partial_suffix_len("Action: x Obs"), 3);
        assert_eq!(s.partial_suffix_len("Action: x\n"), 1);
        assert_eq!(s.partial_suffix_len("Action: x"), 0);
        assert_eq!(s.partial_suffix_len(""), 0);
    }

    #[test]
    fn test_partial_suffix_respects_char_boundaries() {
        let s = stops(&["答案："]);
        assert_eq!(s.partial_suffix_len("最终答"), "答".len());
        assert_eq!(s.partial_suffix_len("最终答案"), "答案".len());
        assert_eq!(s.partial_suffix_len("你好"), 0);
    }
}
