//! Error type for `veracity-store-sqlite`.

use rusqlite::ErrorCode;
use thiserror::Error;
use veracity_core::StoreError;

#[derive(Debug, Error)]
pub enum Error {
  #[error("core error: {0}")]
  Core(#[from] veracity_core::Error),

  #[error("database error: {0}")]
  Database(#[from] tokio_rusqlite::Error),

  #[error("sqlite error: {0}")]
  Sqlite(#[from] rusqlite::Error),

  #[error("json error: {0}")]
  Json(#[from] serde_json::Error),

  #[error("uuid parse error: {0}")]
  Uuid(#[from] uuid::Error),

  /// A stored column held a value no domain type maps to.
  #[error("decode error: {0}")]
  Decode(String),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

fn is_busy(err: &rusqlite::Error) -> bool {
  matches!(
    err,
    rusqlite::Error::SqliteFailure(e, _)
      if matches!(e.code, ErrorCode::DatabaseBusy | ErrorCode::DatabaseLocked)
  )
}

impl StoreError for Error {
  fn is_transient(&self) -> bool {
    match self {
      Error::Sqlite(e) => is_busy(e),
      Error::Database(tokio_rusqlite::Error::Rusqlite(e)) => is_busy(e),
      _ => false,
    }
  }

  fn as_core(&self) -> Option<&veracity_core::Error> {
    match self {
      Error::Core(e) => Some(e),
      _ => None,
    }
  }

  fn into_core(self) -> Result<veracity_core::Error, Self> {
    match self {
      Error::Core(e) => Ok(e),
      other => Err(other),
    }
  }
}
