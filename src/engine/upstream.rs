use crate::config::EngineConfig;
use crate::engine::{GenerationEngine, NormalizedRequest, Snapshot, SnapshotStream, TokenUsage};
use crate::errors::EngineError;
use crate::request_id::RequestId;
use async_trait::async_trait;
use base64::prelude::{BASE64_STANDARD, Engine as _};
use bytes::BytesMut;
use futures::StreamExt;
use reqwest::header::HeaderValue;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, info, warn};

/// Longest frame accepted from the worker before the stream is declared broken.
const MAX_FRAME_BYTES: usize = 1024 * 1024;

/// Talks to a generation worker over HTTP.
///
/// The worker answers `POST {api_base}/generate` with one JSON object per line
/// (optionally framed as SSE `data:` lines), each carrying the cumulative text.
#[derive(Debug)]
pub struct UpstreamEngine {
    http_client: Arc<reqwest::Client>,
    config: EngineConfig,
}

#[derive(Debug, Serialize)]
struct GenerateBody<'a> {
    model: &'a str,
    query: Option<&'a str>,
    continuation: bool,
    history: Vec<[&'a str; 2]>,
    images: Vec<String>,
    temperature: f64,
    top_p: f64,
    max_tokens: u32,
    repetition_penalty: f64,
    stop: &'a [String],
}

#[derive(Debug, Deserialize)]
struct UpstreamFrame {
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    usage: Option<TokenUsage>,
    #[serde(default)]
    error: Option<String>,
}

impl UpstreamEngine {
    pub fn new(http_client: Arc<reqwest::Client>, config: EngineConfig) -> Self {
        Self { http_client, config }
    }

    fn build_target_url(&self) -> String {
        let api_base = &self.config.api_base;
        let path = "generate";
        if api_base.ends_with('/') {
            format!("{}{}", api_base, path)
        } else {
            format!("{}/{}", api_base, path)
        }
    }

    fn build_body<'a>(&'a self, request: &'a NormalizedRequest) -> GenerateBody<'a> {
        GenerateBody {
            model: &self.config.model,
            query: request.query.as_text(),
            continuation: request.query.as_text().is_none(),
            history: request
                .history
                .iter()
                .map(|turn| [turn.question.as_str(), turn.answer.as_str()])
                .collect(),
            images: request.images.iter().map(|img| BASE64_STANDARD.encode(img)).collect(),
            temperature: request.sampling.temperature,
            top_p: request.sampling.top_p,
            max_tokens: request.sampling.max_tokens,
            repetition_penalty: request.sampling.repetition_penalty,
            stop: &request.sampling.stop,
        }
    }
}

#[async_trait]
impl GenerationEngine for UpstreamEngine {
    async fn generate(
        &self,
        request: NormalizedRequest,
        request_id: &RequestId,
    ) -> Result<SnapshotStream, EngineError> {
        let target_url = self.build_target_url();
        let body = self.build_body(&request);

        let mut target_request = self
            .http_client
            .post(&target_url)
            .header("Content-Type", "application/json");

        if let Ok(val) = HeaderValue::from_str(&request_id.0) {
            target_request = target_request.header("x-request-id", val);
        }
        if !self.config.api_key.is_empty() {
            target_request =
                target_request.header("Authorization", format!("Bearer {}", self.config.api_key));
        }

        info!("Forwarding generation to: {}", target_url);
        debug!(
            "generation request: history={} images={} continuation={}",
            body.history.len(),
            body.images.len(),
            body.continuation
        );
        let response = target_request.json(&body).send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            warn!("Engine request failed with status {}: {}", status, error_text);
            return Err(EngineError::Status {
                status: status.as_u16(),
                body: error_text,
            });
        }

        // capacity one: the worker is only read as fast as the client consumes
        let (tx, rx) = mpsc::channel(1);
        let (cancel_tx, cancel_rx) = watch::channel(false);
        let request_id = request_id.clone();
        tokio::spawn(async move {
            pump_snapshots(response, tx, cancel_rx, request_id).await;
        });

        Ok(SnapshotStream::with_cancellation(
            ReceiverStream::new(rx),
            cancel_tx,
        ))
    }
}

async fn pump_snapshots(
    response: reqwest::Response,
    tx: mpsc::Sender<Result<Snapshot, EngineError>>,
    mut cancel_rx: watch::Receiver<bool>,
    request_id: RequestId,
) {
    let mut body = response.bytes_stream();
    let mut buffer = BytesMut::new();

    loop {
        let next = tokio::select! {
            changed = cancel_rx.changed() => {
                if changed.is_err() || *cancel_rx.borrow() {
                    debug!("[{}] generation cancelled, closing engine connection", request_id.0);
                    return;
                }
                continue;
            }
            next = body.next() => next,
        };

        match next {
            Some(Ok(bytes)) => {
                buffer.extend_from_slice(&bytes);
                while let Some(pos) = buffer.iter().position(|b| *b == b'\n') {
                    let line = buffer.split_to(pos + 1);
                    let line = String::from_utf8_lossy(&line);
                    if let Some(frame) = parse_frame(&line) {
                        let failed = frame.is_err();
                        if tx.send(frame).await.is_err() || failed {
                            return;
                        }
                    }
                }
                if buffer.len() > MAX_FRAME_BYTES {
                    warn!(
                        "[{}] engine frame exceeds {} bytes without a newline",
                        request_id.0, MAX_FRAME_BYTES
                    );
                    let _ = tx
                        .send(Err(EngineError::Malformed(format!(
                            "frame longer than {} bytes",
                            MAX_FRAME_BYTES
                        ))))
                        .await;
                    return;
                }
            }
            Some(Err(e)) => {
                warn!("[{}] engine stream broke: {}", request_id.0, e);
                let _ = tx.send(Err(EngineError::Transport(e))).await;
                return;
            }
            None => {
                let line = String::from_utf8_lossy(&buffer);
                if let Some(frame) = parse_frame(&line) {
                    let _ = tx.send(frame).await;
                }
                return;
            }
        }
    }
}

fn parse_frame(line: &str) -> Option<Result<Snapshot, EngineError>> {
    let line = line.trim();
    if line.is_empty() || line.starts_with(':') || line.starts_with("event:") {
        return None;
    }
    let data = line.strip_prefix("data:").map(str::trim_start).unwrap_or(line);
    if data.is_empty() || data == "[DONE]" {
        return None;
    }

    match serde_json::from_str::<UpstreamFrame>(data) {
        Ok(UpstreamFrame {
            error: Some(message),
            ..
        }) => Some(Err(EngineError::Generation(message))),
        Ok(UpstreamFrame {
            text: Some(text),
            usage,
            ..
        }) => Some(Ok(Snapshot { text, usage })),
        Ok(_) => Some(Err(EngineError::Malformed(format!(
            "frame without text: {}",
            data
        )))),
        Err(e) => Some(Err(EngineError::Malformed(e.to_string()))),
    }
}
