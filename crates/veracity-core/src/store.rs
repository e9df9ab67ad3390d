//! The `VeracityStore` trait and supporting query types.
//!
//! The trait is implemented by storage backends (e.g. `veracity-store-sqlite`).
//! The dispatcher and API layers depend on this abstraction, not on any
//! concrete backend.

use std::future::Future;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::{
  ScoringConfig, StoreError,
  challenge::{Challenge, NewChallenge, Resolution, ResolvedChallenge},
  evidence::{Evidence, EvidenceEdit, NewEvidence, ReviewStatus},
  score::{Page, Recalculated, Recalculation, ScoreHistoryEntry, VeracityScore},
  source::{CredibilityChange, CredibilityOverride, NewSource, Source},
  target::{Claim, NewClaim, NewRelationship, Relationship, Target, TargetRef},
};

// ─── Query types ─────────────────────────────────────────────────────────────

/// Parameters for [`VeracityStore::list_evidence`].
#[derive(Debug, Clone, Default)]
pub struct EvidenceQuery {
  /// Also return soft-removed records.
  pub include_removed: bool,
}

/// Parameters for [`VeracityStore::disputed_targets`].
#[derive(Debug, Clone, Copy)]
pub struct DisputedQuery {
  /// Targets scoring strictly below this value are returned.
  pub threshold: f64,
  pub page:      Page,
}

// ─── Trait ───────────────────────────────────────────────────────────────────

/// Abstraction over a veracity store backend.
///
/// Writes that affect a score (evidence, challenges, credibility) do not
/// rescore anything themselves; the caller decides when to run
/// [`VeracityStore::recalculate`]. The one exception is target creation,
/// which writes the initial score and history row atomically.
///
/// All methods return `Send` futures so the trait can be used in
/// multi-threaded async runtimes (e.g. tokio with `axum`).
pub trait VeracityStore: Send + Sync {
  type Error: StoreError;

  // ── Entities ──────────────────────────────────────────────────────────

  /// Create a claim together with its initial score and history row.
  fn create_claim(
    &self,
    input: NewClaim,
  ) -> impl Future<Output = Result<Claim, Self::Error>> + Send + '_;

  /// Create a relationship between two existing claims, together with its
  /// initial score and history row.
  fn create_relationship(
    &self,
    input: NewRelationship,
  ) -> impl Future<Output = Result<Relationship, Self::Error>> + Send + '_;

  fn get_claim(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<Option<Claim>, Self::Error>> + Send + '_;

  fn get_relationship(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<Option<Relationship>, Self::Error>> + Send + '_;

  /// Resolve a reference to its tier and domain. `None` if not found.
  fn get_target(
    &self,
    target: TargetRef,
  ) -> impl Future<Output = Result<Option<Target>, Self::Error>> + Send + '_;

  // ── Sources ───────────────────────────────────────────────────────────

  /// Register a source with neutral credibility.
  fn create_source(
    &self,
    input: NewSource,
  ) -> impl Future<Output = Result<Source, Self::Error>> + Send + '_;

  fn get_source(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<Option<Source>, Self::Error>> + Send + '_;

  fn list_sources(
    &self,
    page: Page,
  ) -> impl Future<Output = Result<Vec<Source>, Self::Error>> + Send + '_;

  /// Recompute a source's credibility from its evidence in one consistent
  /// snapshot. An administrative override keeps its score; counts still
  /// refresh.
  fn refresh_credibility<'a>(
    &'a self,
    source_id: Uuid,
    config: &'a ScoringConfig,
    now: DateTime<Utc>,
  ) -> impl Future<Output = Result<CredibilityChange, Self::Error>> + Send + 'a;

  /// Pin a source's credibility to an administrator-chosen value.
  fn override_credibility(
    &self,
    source_id: Uuid,
    input: CredibilityOverride,
  ) -> impl Future<Output = Result<CredibilityChange, Self::Error>> + Send + '_;

  /// Drop an administrative override and recompute the score from the
  /// source's evidence. A source without an override is simply refreshed.
  fn clear_credibility_override<'a>(
    &'a self,
    source_id: Uuid,
    config: &'a ScoringConfig,
    now: DateTime<Utc>,
  ) -> impl Future<Output = Result<CredibilityChange, Self::Error>> + Send + 'a;

  // ── Evidence ──────────────────────────────────────────────────────────

  /// Validate and append an evidence record.
  ///
  /// Rejects tier-0 targets, unknown targets or sources, and out-of-range
  /// numbers. Nothing is written on rejection.
  fn submit_evidence(
    &self,
    input: NewEvidence,
  ) -> impl Future<Output = Result<Evidence, Self::Error>> + Send + '_;

  fn edit_evidence(
    &self,
    id: Uuid,
    edit: EvidenceEdit,
  ) -> impl Future<Output = Result<Evidence, Self::Error>> + Send + '_;

  /// Soft-remove a record. Removing twice is an error.
  fn remove_evidence(
    &self,
    id: Uuid,
    reason: Option<String>,
  ) -> impl Future<Output = Result<Evidence, Self::Error>> + Send + '_;

  fn set_review_status(
    &self,
    id: Uuid,
    status: ReviewStatus,
  ) -> impl Future<Output = Result<Evidence, Self::Error>> + Send + '_;

  fn get_evidence(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<Option<Evidence>, Self::Error>> + Send + '_;

  fn list_evidence(
    &self,
    target: TargetRef,
    query: EvidenceQuery,
  ) -> impl Future<Output = Result<Vec<Evidence>, Self::Error>> + Send + '_;

  // ── Challenges ────────────────────────────────────────────────────────

  /// Open a challenge. Rejects tier-0 targets and disputed evidence that
  /// belongs to another target.
  fn open_challenge(
    &self,
    input: NewChallenge,
  ) -> impl Future<Output = Result<Challenge, Self::Error>> + Send + '_;

  /// Resolve an open challenge. An upheld challenge discredits its disputed
  /// evidence in the same transaction and reports the sources behind it.
  /// Upholding a challenge that disputes no evidence is rejected.
  fn resolve_challenge(
    &self,
    id: Uuid,
    resolution: Resolution,
  ) -> impl Future<Output = Result<ResolvedChallenge, Self::Error>> + Send + '_;

  fn get_challenge(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<Option<Challenge>, Self::Error>> + Send + '_;

  fn list_challenges(
    &self,
    target: TargetRef,
  ) -> impl Future<Output = Result<Vec<Challenge>, Self::Error>> + Send + '_;

  // ── Scores ────────────────────────────────────────────────────────────

  /// The cached score row. `None` if the target does not exist.
  fn get_score(
    &self,
    target: TargetRef,
  ) -> impl Future<Output = Result<Option<VeracityScore>, Self::Error>> + Send + '_;

  /// History rows for a target, newest first.
  fn score_history(
    &self,
    target: TargetRef,
    page: Page,
  ) -> impl Future<Output = Result<Vec<ScoreHistoryEntry>, Self::Error>> + Send + '_;

  /// Current scores strictly below the threshold, lowest first.
  fn disputed_targets(
    &self,
    query: DisputedQuery,
  ) -> impl Future<Output = Result<Vec<VeracityScore>, Self::Error>> + Send + '_;

  /// Targets whose score expired at or before `now`.
  fn expired_targets(
    &self,
    now: DateTime<Utc>,
  ) -> impl Future<Output = Result<Vec<TargetRef>, Self::Error>> + Send + '_;

  /// Read the ledger, compute, write the score, and append history as one
  /// atomic unit. If the history row cannot be written the score update is
  /// rolled back.
  fn recalculate<'a>(
    &'a self,
    target: TargetRef,
    request: Recalculation,
    config: &'a ScoringConfig,
    now: DateTime<Utc>,
  ) -> impl Future<Output = Result<Recalculated, Self::Error>> + Send + 'a;
}
