//! Error type for `veracity-dispatch`.

use thiserror::Error;
use veracity_core::StoreError;

#[derive(Debug, Error)]
pub enum Error {
  /// A failure the engine itself reports: rejected input, missing records,
  /// or a rolled-back history write.
  #[error(transparent)]
  Core(#[from] veracity_core::Error),

  /// The storage backend failed.
  #[error("storage error: {0}")]
  Store(Box<dyn std::error::Error + Send + Sync>),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

impl Error {
  /// Split a backend error into an engine error or an opaque storage failure.
  pub fn from_store<E: StoreError>(err: E) -> Self {
    match err.into_core() {
      Ok(core) => Self::Core(core),
      Err(other) => Self::Store(Box::new(other)),
    }
  }
}
