//! Error types for `veracity-core`.

use thiserror::Error;
use uuid::Uuid;

use crate::target::TargetRef;

#[derive(Debug, Error)]
pub enum Error {
  /// A weight, confidence, or reference was malformed. Nothing was written.
  #[error("invalid input: {0}")]
  InvalidInput(String),

  #[error("{0} is a tier-0 target; its score is fixed at 1.0")]
  ImmutableTargetViolation(TargetRef),

  #[error("recalculation already in progress for {0}")]
  RecalculationConflict(TargetRef),

  /// The audit row could not be written, so the score update was rolled back.
  #[error("history write failed for {target}; score update rolled back: {reason}")]
  HistoryWriteFailure { target: TargetRef, reason: String },

  #[error("target not found: {0}")]
  TargetNotFound(TargetRef),

  #[error("source not found: {0}")]
  SourceNotFound(Uuid),

  #[error("evidence not found: {0}")]
  EvidenceNotFound(Uuid),

  #[error("challenge not found: {0}")]
  ChallengeNotFound(Uuid),

  #[error("evidence {0} has been removed")]
  EvidenceRemoved(Uuid),

  #[error("challenge {0} is already resolved")]
  ChallengeAlreadyResolved(Uuid),

  #[error("a relationship cannot connect claim {0} to itself")]
  SelfRelationship(Uuid),
}

impl Error {
  /// True for errors caused by the caller's request rather than by the
  /// engine or its storage.
  pub fn is_rejection(&self) -> bool {
    !matches!(
      self,
      Self::RecalculationConflict(_) | Self::HistoryWriteFailure { .. }
    )
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Behaviour every [`VeracityStore`](crate::store::VeracityStore) error type
/// must provide so the dispatcher can decide whether to retry.
pub trait StoreError: std::error::Error + Send + Sync + Sized + 'static {
  /// Whether repeating the same operation may succeed (lock contention,
  /// busy database).
  fn is_transient(&self) -> bool;

  /// The core error this store error wraps, if any.
  fn as_core(&self) -> Option<&Error>;

  /// Extract the core error this store error wraps, if any.
  fn into_core(self) -> Result<Error, Self>;

  /// Whether the caller's request itself was refused, so repeating it
  /// cannot help.
  fn is_rejection(&self) -> bool { self.as_core().is_some_and(Error::is_rejection) }
}
