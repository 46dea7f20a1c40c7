//! Generation engine collaborator.
//!
//! The protocol layer only sees the [`GenerationEngine`] trait and the
//! [`SnapshotStream`] it returns; model loading and scheduling live behind it.

use crate::errors::EngineError;
use crate::request_id::RequestId;
use async_trait::async_trait;
use futures::stream::BoxStream;
use futures::{Stream, StreamExt};
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::sync::watch;
use tracing::debug;

mod tokenizer;
mod types;
pub mod upstream;

#[cfg(test)]
pub mod mock;

pub use tokenizer::{ApproxTokenCounter, HfTokenCounter, TokenCounter, load_token_counter};
pub use types::{
    ConversationTurn, NormalizedRequest, Query, SamplingParams, Snapshot, TokenUsage,
};
pub use upstream::UpstreamEngine;

#[async_trait]
pub trait GenerationEngine: Send + Sync {
    /// Start a generation. Errors returned here happen before any snapshot exists.
    async fn generate(
        &self,
        request: NormalizedRequest,
        request_id: &RequestId,
    ) -> Result<SnapshotStream, EngineError>;
}

/// Forward-only, single-consumer sequence of cumulative snapshots.
///
/// Dropping the stream before the engine finished fires the cancellation hook so
/// the producer stops generating.
pub struct SnapshotStream {
    inner: BoxStream<'static, Result<Snapshot, EngineError>>,
    cancel_tx: Option<watch::Sender<bool>>,
    finished: bool,
}

impl SnapshotStream {
    #[cfg(test)]
    pub fn new<S>(inner: S) -> Self
    where
        S: Stream<Item = Result<Snapshot, EngineError>> + Send + 'static,
    {
        Self {
            inner: inner.boxed(),
            cancel_tx: None,
            finished: false,
        }
    }

    pub fn with_cancellation<S>(inner: S, cancel_tx: watch::Sender<bool>) -> Self
    where
        S: Stream<Item = Result<Snapshot, EngineError>> + Send + 'static,
    {
        Self {
            inner: inner.boxed(),
            cancel_tx: Some(cancel_tx),
            finished: false,
        }
    }

    #[cfg(test)]
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Ask the producer to stop. No-op once the source is exhausted.
    pub fn cancel(&mut self) {
        if self.finished {
            return;
        }
        if let Some(tx) = self.cancel_tx.take() {
            debug!("Cancelling generation");
            let _ = tx.send(true);
        }
        self.finished = true;
    }
}

impl Stream for SnapshotStream {
    type Item = Result<Snapshot, EngineError>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        if self.finished {
            return Poll::Ready(None);
        }
        match self.inner.poll_next_unpin(cx) {
            Poll::Ready(None) => {
                self.finished = true;
                self.cancel_tx = None;
                Poll::Ready(None)
            }
            other => other,
        }
    }
}

impl Drop for SnapshotStream {
    fn drop(&mut self) {
        self.cancel();
    }
}
