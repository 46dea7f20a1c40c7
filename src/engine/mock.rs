use crate::engine::{GenerationEngine, NormalizedRequest, Snapshot, SnapshotStream};
use crate::errors::EngineError;
use crate::request_id::RequestId;
use async_trait::async_trait;
use futures::stream;
use std::sync::Mutex;
use tokio::sync::watch;

enum Step {
    Snapshot(Snapshot),
    Fail(String),
}

/// Scripted engine for tests: replays fixed snapshots and records what it saw.
pub struct MockEngine {
    steps: Vec<Step>,
    refuse: Option<String>,
    requests: Mutex<Vec<NormalizedRequest>>,
    cancel_rx: Mutex<Option<watch::Receiver<bool>>>,
}

impl MockEngine {
    pub fn with_snapshots(texts: &[&str]) -> Self {
        Self {
            steps: texts.iter().map(|t| Step::Snapshot(Snapshot::new(*t))).collect(),
            refuse: None,
            requests: Mutex::new(Vec::new()),
            cancel_rx: Mutex::new(None),
        }
    }

    pub fn with_usage_snapshots(snapshots: Vec<Snapshot>) -> Self {
        let mut engine = Self::with_snapshots(&[]);
        engine.steps = snapshots.into_iter().map(Step::Snapshot).collect();
        engine
    }

    pub fn failing_after(texts: &[&str], message: &str) -> Self {
        let mut engine = Self::with_snapshots(texts);
        engine.steps.push(Step::Fail(message.to_string()));
        engine
    }

    pub fn refusing(message: &str) -> Self {
        let mut engine = Self::with_snapshots(&[]);
        engine.refuse = Some(message.to_string());
        engine
    }

    pub fn requests(&self) -> Vec<NormalizedRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn was_cancelled(&self) -> bool {
        self.cancel_rx
            .lock()
            .unwrap()
            .as_ref()
            .map(|rx| *rx.borrow())
            .unwrap_or(false)
    }

    pub fn snapshot_stream(&self) -> SnapshotStream {
        let items: Vec<Result<Snapshot, EngineError>> = self
            .steps
            .iter()
            .map(|step| match step {
                Step::Snapshot(s) => Ok(s.clone()),
                Step::Fail(m) => Err(EngineError::Generation(m.clone())),
            })
            .collect();
        let (cancel_tx, cancel_rx) = watch::channel(false);
        *self.cancel_rx.lock().unwrap() = Some(cancel_rx);
        SnapshotStream::with_cancellation(stream::iter(items), cancel_tx)
    }
}

#[async_trait]
impl GenerationEngine for MockEngine {
    async fn generate(
        &self,
        request: NormalizedRequest,
        _request_id: &RequestId,
    ) -> Result<SnapshotStream, EngineError> {
        self.requests.lock().unwrap().push(request);
        if let Some(message) = &self.refuse {
            return Err(EngineError::Generation(message.clone()));
        }
        Ok(self.snapshot_stream())
    }
}
