use crate::converters::stop::StopSequences;
use crate::engine::SnapshotStream;
use crate::errors::EngineError;
use futures::{Stream, StreamExt};
use std::pin::Pin;
use std::task::{Context, Poll};
use tracing::debug;

/// Protocol-level pieces of a streamed completion, before wire framing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamChunk {
    RoleAnnounce,
    ContentDelta(String),
    Done,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EmitterState {
    Init,
    Streaming,
    /// Source ended; held-back text still has to go out.
    Flushing,
    Finishing,
    Complete,
    Failed,
}

/// Turns cumulative snapshots into incremental chunks.
///
/// With stop sequences configured, text that may still turn into a stop word is
/// held back until the next snapshot decides it.
pub struct ChunkEmitter {
    source: SnapshotStream,
    stops: StopSequences,
    state: EmitterState,
    previous: String,
    emitted: usize,
}

impl ChunkEmitter {
    pub fn new(source: SnapshotStream, stops: StopSequences) -> Self {
        Self {
            source,
            stops,
            state: EmitterState::Init,
            previous: String::new(),
            emitted: 0,
        }
    }

    fn on_snapshot(&mut self, text: String) -> Result<Option<StreamChunk>, EngineError> {
        if !text.starts_with(&self.previous) {
            self.source.cancel();
            return Err(EngineError::NonMonotonicSnapshot);
        }
        self.previous = text;

        if let Some(kept) = self.stops.truncate(&self.previous) {
            let end = kept.len().max(self.emitted);
            let delta = self.previous[self.emitted..end].to_string();
            debug!("Stop sequence reached after {} bytes", end);
            self.emitted = end;
            self.source.cancel();
            self.state = EmitterState::Finishing;
            return Ok((!delta.is_empty()).then_some(StreamChunk::ContentDelta(delta)));
        }

        let safe_end = (self.previous.len() - self.stops.partial_suffix_len(&self.previous))
            .max(self.emitted);
        let delta = self.previous[self.emitted..safe_end].to_string();
        self.emitted = safe_end;
        Ok(Some(StreamChunk::ContentDelta(delta)))
    }
}

impl Stream for ChunkEmitter {
    type Item = Result<StreamChunk, EngineError>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        loop {
            match this.state {
                EmitterState::Init => {
                    this.state = EmitterState::Streaming;
                    return Poll::Ready(Some(Ok(StreamChunk::RoleAnnounce)));
                }
                EmitterState::Streaming => match this.source.poll_next_unpin(cx) {
                    Poll::Pending => return Poll::Pending,
                    Poll::Ready(None) => this.state = EmitterState::Flushing,
                    Poll::Ready(Some(Err(e))) => {
                        this.state = EmitterState::Failed;
                        return Poll::Ready(Some(Err(e)));
                    }
                    Poll::Ready(Some(Ok(snapshot))) => match this.on_snapshot(snapshot.text) {
                        Ok(Some(chunk)) => return Poll::Ready(Some(Ok(chunk))),
                        Ok(None) => {}
                        Err(e) => {
                            this.state = EmitterState::Failed;
                            return Poll::Ready(Some(Err(e)));
                        }
                    },
                },
                EmitterState::Flushing => {
                    this.state = EmitterState::Finishing;
                    if this.emitted < this.previous.len() {
                        let rest = this.previous[this.emitted..].to_string();
                        this.emitted = this.previous.len();
                        return Poll::Ready(Some(Ok(StreamChunk::ContentDelta(rest))));
                    }
                }
                EmitterState::Finishing => {
                    this.state = EmitterState::Complete;
                    return Poll::Ready(Some(Ok(StreamChunk::Done)));
                }
                EmitterState::Complete | EmitterState::Failed => return Poll::Ready(None),
            }
        }
    }
}
