//! API error type and [`axum::response::IntoResponse`] implementation.

use axum::{
  Json,
  http::StatusCode,
  response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;
use veracity_core::Error as CoreError;

/// An error returned by an API handler.
#[derive(Debug, Error)]
pub enum ApiError {
  #[error("not found: {0}")]
  NotFound(String),

  #[error("bad request: {0}")]
  BadRequest(String),

  /// The request is well-formed but conflicts with the target's state:
  /// a tier-0 target, removed evidence, or an already-resolved challenge.
  #[error("conflict: {0}")]
  Conflict(String),

  #[error("store error: {0}")]
  Store(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl From<veracity_dispatch::Error> for ApiError {
  fn from(err: veracity_dispatch::Error) -> Self {
    match err {
      veracity_dispatch::Error::Core(core) => core.into(),
      veracity_dispatch::Error::Store(e) => ApiError::Store(e),
    }
  }
}

impl From<CoreError> for ApiError {
  fn from(err: CoreError) -> Self {
    let message = err.to_string();
    match err {
      CoreError::InvalidInput(_) | CoreError::SelfRelationship(_) => {
        ApiError::BadRequest(message)
      }
      CoreError::TargetNotFound(_)
      | CoreError::SourceNotFound(_)
      | CoreError::EvidenceNotFound(_)
      | CoreError::ChallengeNotFound(_) => ApiError::NotFound(message),
      CoreError::ImmutableTargetViolation(_)
      | CoreError::EvidenceRemoved(_)
      | CoreError::ChallengeAlreadyResolved(_)
      | CoreError::RecalculationConflict(_) => ApiError::Conflict(message),
      CoreError::HistoryWriteFailure { .. } => ApiError::Store(Box::new(err)),
    }
  }
}

impl IntoResponse for ApiError {
  fn into_response(self) -> Response {
    let (status, message) = match &self {
      ApiError::NotFound(m) => (StatusCode::NOT_FOUND, m.clone()),
      ApiError::BadRequest(m) => (StatusCode::BAD_REQUEST, m.clone()),
      ApiError::Conflict(m) => (StatusCode::CONFLICT, m.clone()),
      ApiError::Store(e) => {
        tracing::error!(error = %e, "request failed");
        (StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
      }
    };
    (status, Json(json!({ "error": message }))).into_response()
  }
}
