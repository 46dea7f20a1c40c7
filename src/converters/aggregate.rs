use crate::converters::stop::StopSequences;
use crate::engine::{Snapshot, SnapshotStream, TokenCounter, TokenUsage};
use crate::errors::EngineError;
use futures::StreamExt;
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Completion {
    pub text: String,
    pub usage: TokenUsage,
}

/// Drains a generation into one completion. Only the newest snapshot is kept;
/// the first engine error discards everything.
pub async fn aggregate(
    mut source: SnapshotStream,
    stops: &StopSequences,
    counter: &dyn TokenCounter,
    prompt: &str,
) -> Result<Completion, EngineError> {
    let mut last = Snapshot::new("");
    let mut reported: Option<TokenUsage> = None;
    let mut truncated = false;

    while let Some(item) = source.next().await {
        let snapshot = item?;
        if snapshot.usage.is_some() {
            reported = snapshot.usage;
        }
        if let Some(kept) = stops.truncate(&snapshot.text) {
            debug!("Stop sequence reached, cancelling generation");
            last = Snapshot::new(kept);
            truncated = true;
            source.cancel();
            break;
        }
        last = snapshot;
    }

    let text = last.text;
    let usage = match reported {
        Some(usage) if !truncated => usage,
        Some(usage) => TokenUsage {
            prompt_tokens: usage.prompt_tokens,
            completion_tokens: count(counter, &text),
        },
        None => TokenUsage {
            prompt_tokens: count(counter, prompt),
            completion_tokens: count(counter, &text),
        },
    };
    Ok(Completion { text, usage })
}

fn count(counter: &dyn TokenCounter, text: &str) -> u32 {
    u32::try_from(counter.count_tokens(text)).unwrap_or(u32::MAX)
}
