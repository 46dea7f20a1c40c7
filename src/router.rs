use crate::converters::aggregate::aggregate;
use crate::converters::helpers;
use crate::converters::history::normalize_history;
use crate::converters::openai::{OpenAIRequest, OpenAIResponse, OpenAIStreamChunk};
use crate::converters::react::reformat_react;
use crate::converters::stop::StopSequences;
use crate::converters::stream::ChunkEmitter;
use crate::converters::validator::{resolve_sampling, validate_request};
use crate::engine::{NormalizedRequest, Query, SnapshotStream};
use crate::errors::ApiError;
use crate::models::{ModelCard, ModelsResponse};
use crate::request_id::{self, RequestId};
use crate::state::AppState;
use axum::{
    Extension, Json, Router,
    extract::{State, rejection::JsonRejection},
    response::{
        IntoResponse, Response,
        sse::{Event, KeepAlive, Sse},
    },
    routing::{get, post},
};
use futures::{StreamExt, future};
use std::convert::Infallible;
use std::time::Duration;
use tower_http::cors::CorsLayer;
use tracing::{debug, error, info, warn};

pub fn app(state: AppState) -> Router {
    Router::new()
        .route("/v1/chat/completions", post(chat_completions))
        .route("/v1/models", get(list_models))
        .route("/health", get(|| async { "OK" }))
        .layer(axum::middleware::from_fn(request_id::inject_request_id))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

#[axum_macros::debug_handler]
pub async fn chat_completions(
    State(state): State<AppState>,
    Extension(request_id): Extension<RequestId>,
    payload: Result<Json<OpenAIRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    let Json(request) = payload.map_err(|e| ApiError::MalformedBody(e.body_text()))?;
    let settings = state.settings().await;

    validate_request(&request)?;
    let sampling = resolve_sampling(&request, &settings.sampling);
    let policy = settings.images.multi_image_policy;

    let (query, history, images) = if settings.react.enabled || request.has_function_messages() {
        debug!("Using ReAct prompt format");
        let prompt = reformat_react(&request.messages, &settings.react, policy)?;
        (prompt.query, prompt.history, prompt.images)
    } else {
        let normalized = normalize_history(&request.messages, policy)?;
        (Query::Text(normalized.query), normalized.history, normalized.images)
    };

    let normalized = NormalizedRequest {
        query,
        history,
        images,
        sampling,
    };
    let stops = StopSequences::new(&normalized.sampling.stop);
    let prompt = normalized.prompt_text();
    let model = if request.model.is_empty() {
        settings.engine.model.clone()
    } else {
        request.model.clone()
    };

    info!(
        "Chat completion: model={}, stream={}, turns={}, images={}",
        model,
        request.is_stream(),
        normalized.history.len(),
        normalized.images.len()
    );

    let source = state.engine.generate(normalized, &request_id).await?;

    if request.is_stream() {
        return Ok(streaming_response(source, stops, model, request_id));
    }

    let completion = aggregate(source, &stops, state.token_counter.as_ref(), &prompt).await?;
    debug!(
        "Completion finished: {} prompt / {} completion tokens",
        completion.usage.prompt_tokens, completion.usage.completion_tokens
    );
    Ok(Json(OpenAIResponse::from_completion(&model, completion)).into_response())
}

fn streaming_response(
    source: SnapshotStream,
    stops: StopSequences,
    model: String,
    request_id: RequestId,
) -> Response {
    let id = helpers::completion_id();
    let created = helpers::unix_timestamp();

    let event_stream = ChunkEmitter::new(source, stops)
        .take_while(move |item| {
            if let Err(e) = item {
                error!("[{}] Generation failed mid-stream: {}", request_id.0, e);
            }
            future::ready(item.is_ok())
        })
        .filter_map(move |item| {
            let event = item.ok().and_then(|chunk| {
                let chunk = OpenAIStreamChunk::new(&id, created, &model, chunk);
                match serde_json::to_string(&chunk) {
                    Ok(data) => Some(Ok::<Event, Infallible>(Event::default().data(data))),
                    Err(e) => {
                        warn!("Failed to serialize stream chunk: {}", e);
                        None
                    }
                }
            });
            future::ready(event)
        });

    Sse::new(event_stream)
        .keep_alive(KeepAlive::new().interval(Duration::from_secs(1)))
        .into_response()
}

#[axum_macros::debug_handler]
pub async fn list_models(State(state): State<AppState>) -> impl IntoResponse {
    debug!("Received models list request");
    let settings = state.settings().await;
    let created = helpers::unix_timestamp();

    let response = ModelsResponse {
        object: "list".to_string(),
        data: settings
            .served_models()
            .iter()
            .map(|id| ModelCard::new(id, created))
            .collect(),
    };

    debug!("Returning {} models", response.data.len());
    Json(response)
}
