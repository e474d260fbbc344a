//! Error taxonomy for the store boundary and the progress operations, plus
//! the mapping of those errors onto HTTP responses.

use axum::{
  extract::rejection::{JsonRejection, QueryRejection},
  http::StatusCode,
  response::IntoResponse,
  Json,
};
use thiserror::Error;

use crate::protocol::ErrorOut;

/// Failures reported by a `ProgressStore` implementation.
#[derive(Debug, Error)]
pub enum StoreError {
  /// Requested row does not exist
  #[error("{entity} not found: {id}")]
  NotFound { entity: &'static str, id: String },

  /// Row already exists where a fresh insert was requested
  #[error("{entity} already exists: {id}")]
  Conflict { entity: &'static str, id: String },

  /// Row failed schema validation at the boundary
  #[error("invalid row in {table}: {reason}")]
  InvalidRow { table: &'static str, reason: String },

  /// Backing storage could not be read or written
  #[error("store unavailable: {0}")]
  Unavailable(String),
}

impl StoreError {
  pub fn invalid(table: &'static str, reason: impl Into<String>) -> Self {
    StoreError::InvalidRow { table, reason: reason.into() }
  }
}

/// Errors surfaced by the progress engine to its callers.
#[derive(Debug, Error)]
pub enum ProgressError {
  #[error("score {0} is outside 0..=100")]
  InvalidScore(u32),

  /// Malformed request or a row the store refused to accept
  #[error("invalid input: {0}")]
  InvalidInput(String),

  #[error("unknown lesson: {0}")]
  UnknownLesson(String),

  #[error("unknown profile: {0}")]
  UnknownProfile(String),

  #[error("profile already exists: {0}")]
  ProfileExists(String),

  #[error("lesson {0} is locked")]
  LessonLocked(String),

  #[error("store read failed: {0}")]
  StoreRead(#[source] StoreError),

  #[error("store write failed: {0}")]
  StoreWrite(#[source] StoreError),
}

impl ProgressError {
  /// Classify a read failure, turning missing profiles into `UnknownProfile`.
  pub fn read(err: StoreError) -> Self {
    match err {
      StoreError::NotFound { entity: "profile", id } => ProgressError::UnknownProfile(id),
      other => ProgressError::StoreRead(other),
    }
  }

  pub fn write(err: StoreError) -> Self {
    match err {
      StoreError::Conflict { entity: "profile", id } => ProgressError::ProfileExists(id),
      StoreError::InvalidRow { table, reason } => ProgressError::InvalidInput(format!("{table}: {reason}")),
      other => ProgressError::StoreWrite(other),
    }
  }

  pub fn status_code(&self) -> StatusCode {
    match self {
      ProgressError::InvalidScore(_) | ProgressError::InvalidInput(_) => StatusCode::BAD_REQUEST,
      ProgressError::UnknownLesson(_) | ProgressError::UnknownProfile(_) => StatusCode::NOT_FOUND,
      ProgressError::ProfileExists(_) | ProgressError::LessonLocked(_) => StatusCode::CONFLICT,
      ProgressError::StoreRead(_) | ProgressError::StoreWrite(_) => StatusCode::SERVICE_UNAVAILABLE,
    }
  }
}

impl IntoResponse for ProgressError {
  fn into_response(self) -> axum::response::Response {
    let status = self.status_code();
    (status, Json(ErrorOut { error: self.to_string() })).into_response()
  }
}

impl From<JsonRejection> for ProgressError {
  fn from(rej: JsonRejection) -> Self {
    ProgressError::InvalidInput(rej.body_text())
  }
}

impl From<QueryRejection> for ProgressError {
  fn from(rej: QueryRejection) -> Self {
    ProgressError::InvalidInput(rej.body_text())
  }
}
