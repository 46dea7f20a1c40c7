use crate::models::{ErrorDetail, ErrorResponse};
use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

/// Malformed conversations and parameters, detected before any engine call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtocolError {
    #[error("messages must not be empty")]
    EmptyMessages,
    #[error("the last message must not come from the assistant")]
    LastMessageFromAssistant,
    #[error("expecting role user before role assistant")]
    AssistantBeforeUser,
    #[error("the last query is already answered: {question}")]
    DoubleAnswer { question: String },
    #[error("unrecognized role: {0}")]
    UnrecognizedRole(String),
    #[error("expecting role assistant before role function")]
    FunctionWithoutAssistant,
    #[error("expecting exactly one user (or function) message before every assistant message")]
    UnpairedTurn,
    #[error("expecting at least one user message")]
    NoUserMessage,
    #[error("invalid value for {name}: {reason}")]
    InvalidParameter { name: &'static str, reason: String },
    #[error("invalid image: {0}")]
    InvalidImage(String),
    #[error("only one image per request is supported, got {0}")]
    TooManyImages(usize),
}

impl ProtocolError {
    pub fn code(&self) -> &'static str {
        match self {
            ProtocolError::EmptyMessages => "empty_messages",
            ProtocolError::LastMessageFromAssistant => "last_message_from_assistant",
            ProtocolError::AssistantBeforeUser => "assistant_before_user",
            ProtocolError::DoubleAnswer { .. } => "double_answer",
            ProtocolError::UnrecognizedRole(_) => "unrecognized_role",
            ProtocolError::FunctionWithoutAssistant => "function_without_assistant",
            ProtocolError::UnpairedTurn => "unpaired_turn",
            ProtocolError::NoUserMessage => "no_user_message",
            ProtocolError::InvalidParameter { .. } => "invalid_parameter",
            ProtocolError::InvalidImage(_) => "invalid_image",
            ProtocolError::TooManyImages(_) => "too_many_images",
        }
    }
}

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("engine request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("engine returned status {status}: {body}")]
    Status { status: u16, body: String },
    #[error("malformed engine output: {0}")]
    Malformed(String),
    #[error("generation failed: {0}")]
    Generation(String),
    #[error("snapshot does not extend the previous one")]
    NonMonotonicSnapshot,
}

#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    InvalidRequest(#[from] ProtocolError),
    #[error(transparent)]
    EngineFailure(#[from] EngineError),
    #[error("invalid request body: {0}")]
    MalformedBody(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::InvalidRequest(_) | ApiError::MalformedBody(_) => StatusCode::BAD_REQUEST,
            ApiError::EngineFailure(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn to_error_response(&self) -> ErrorResponse {
        let (r#type, code) = match self {
            ApiError::InvalidRequest(e) => ("invalid_request_error", e.code()),
            ApiError::EngineFailure(_) => ("api_error", "engine_failure"),
            ApiError::MalformedBody(_) => ("invalid_request_error", "invalid_body"),
        };
        ErrorResponse {
            error: ErrorDetail {
                message: self.to_string(),
                r#type: r#type.to_string(),
                code: Some(code.to_string()),
            },
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status(), Json(self.to_error_response())).into_response()
    }
}
