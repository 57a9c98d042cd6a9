use axum::{
    Json,
    extract::{
        multipart::MultipartError,
        multipart::MultipartRejection,
        rejection::JsonRejection,
    },
    response::{IntoResponse, Response},
};
use http::StatusCode;
use serde_json::json;
use thiserror::Error;

pub const GENERATION_FAILED_MESSAGE: &str =
    "Failed to analyze image and generate story. Please try again.";

#[derive(Debug, Error)]
pub enum StoryError {
    #[error("classifier model is unavailable: {0}")]
    ModelUnavailable(String),

    #[error("classification failed: {0}")]
    ClassificationFailed(String),

    #[error("image could not be decoded: {0}")]
    ImageDecodeFailed(String),

    #[error("unknown genre `{0}`")]
    InvalidGenre(String),

    #[error("malformed request: {0}")]
    BadRequest(String),

    #[error("remote story service failed: {0}")]
    Upstream(String),

    #[error("{}", GENERATION_FAILED_MESSAGE)]
    GenerationFailed(#[source] Box<StoryError>),
}

impl StoryError {
    /// Collapses any step error into the single error surfaced to callers.
    pub fn into_generation_failure(self) -> Self {
        match self {
            failed @ StoryError::GenerationFailed(_) => failed,
            other => StoryError::GenerationFailed(Box::new(other)),
        }
    }

    fn status(&self) -> StatusCode {
        match self {
            StoryError::InvalidGenre(_) | StoryError::BadRequest(_) => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<reqwest::Error> for StoryError {
    fn from(err: reqwest::Error) -> Self {
        StoryError::Upstream(err.to_string())
    }
}

impl From<JsonRejection> for StoryError {
    fn from(rejection: JsonRejection) -> Self {
        StoryError::BadRequest(rejection.body_text())
    }
}

impl From<MultipartRejection> for StoryError {
    fn from(rejection: MultipartRejection) -> Self {
        StoryError::BadRequest(rejection.body_text())
    }
}

impl From<MultipartError> for StoryError {
    fn from(err: MultipartError) -> Self {
        StoryError::BadRequest(err.body_text())
    }
}

impl IntoResponse for StoryError {
    fn into_response(self) -> Response {
        (self.status(), Json(json!({ "error": self.to_string() }))).into_response()
    }
}
