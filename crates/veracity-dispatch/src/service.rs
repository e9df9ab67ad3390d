//! [`VeracityService`], the query and mutation surface of the engine.
//!
//! Mutations write through the store and then hand the affected targets to
//! the [`Dispatcher`]. They return as soon as the write commits; scoring
//! follows in the background. Only [`VeracityService::recalculate`] waits for
//! a score.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::info;
use uuid::Uuid;
use veracity_core::{
  ScoringConfig,
  challenge::{Challenge, NewChallenge, Resolution, ResolvedChallenge},
  evidence::{Evidence, EvidenceEdit, NewEvidence, ReviewStatus},
  score::{Page, Recalculated, Recalculation, ScoreHistoryEntry, Trigger, VeracityScore},
  source::{CredibilityChange, CredibilityOverride, NewSource, Source},
  store::{DisputedQuery, EvidenceQuery, VeracityStore},
  target::{Claim, NewClaim, NewRelationship, Relationship, Target, TargetRef},
};

use crate::{DispatchConfig, Dispatcher, Error, RecalcStatus, Result};

/// A cached score together with the target's recalculation state.
#[derive(Debug, Clone, Serialize)]
pub struct ScoreView {
  #[serde(flatten)]
  pub score:  VeracityScore,
  pub status: RecalcStatus,
}

pub struct VeracityService<S> {
  store:      Arc<S>,
  dispatcher: Dispatcher<S>,
}

impl<S> Clone for VeracityService<S> {
  fn clone(&self) -> Self {
    Self { store: Arc::clone(&self.store), dispatcher: self.dispatcher.clone() }
  }
}

impl<S: VeracityStore + 'static> VeracityService<S> {
  pub fn new(store: S, scoring: ScoringConfig, config: DispatchConfig) -> Self {
    let store = Arc::new(store);
    let dispatcher = Dispatcher::new(Arc::clone(&store), scoring, config);
    Self { store, dispatcher }
  }

  pub fn dispatcher(&self) -> &Dispatcher<S> { &self.dispatcher }

  pub fn scoring(&self) -> &ScoringConfig { self.dispatcher.scoring() }

  // ── Entities ──────────────────────────────────────────────────────────────

  pub async fn create_claim(&self, input: NewClaim) -> Result<Claim> {
    let claim = self.store.create_claim(input).await.map_err(Error::from_store)?;
    info!(claim_id = %claim.claim_id, tier = claim.tier.level(), "claim created");
    Ok(claim)
  }

  pub async fn create_relationship(&self, input: NewRelationship) -> Result<Relationship> {
    let rel = self.store.create_relationship(input).await.map_err(Error::from_store)?;
    info!(relationship_id = %rel.relationship_id, "relationship created");
    Ok(rel)
  }

  pub async fn get_claim(&self, id: Uuid) -> Result<Claim> {
    self
      .store
      .get_claim(id)
      .await
      .map_err(Error::from_store)?
      .ok_or(Error::Core(veracity_core::Error::TargetNotFound(TargetRef::Claim(id))))
  }

  pub async fn get_relationship(&self, id: Uuid) -> Result<Relationship> {
    self
      .store
      .get_relationship(id)
      .await
      .map_err(Error::from_store)?
      .ok_or(Error::Core(veracity_core::Error::TargetNotFound(
        TargetRef::Relationship(id),
      )))
  }

  pub async fn get_target(&self, target: TargetRef) -> Result<Target> {
    self
      .store
      .get_target(target)
      .await
      .map_err(Error::from_store)?
      .ok_or(Error::Core(veracity_core::Error::TargetNotFound(target)))
  }

  // ── Sources ───────────────────────────────────────────────────────────────

  pub async fn create_source(&self, input: NewSource) -> Result<Source> {
    let source = self.store.create_source(input).await.map_err(Error::from_store)?;
    info!(source_id = %source.source_id, kind = ?source.kind, "source registered");
    Ok(source)
  }

  pub async fn get_source(&self, id: Uuid) -> Result<Source> {
    self
      .store
      .get_source(id)
      .await
      .map_err(Error::from_store)?
      .ok_or(Error::Core(veracity_core::Error::SourceNotFound(id)))
  }

  pub async fn list_sources(&self, page: Page) -> Result<Vec<Source>> {
    self.store.list_sources(page).await.map_err(Error::from_store)
  }

  /// Pin a source's credibility. Every target with evidence from the source
  /// is rescored, whatever the size of the change.
  #[tracing::instrument(skip_all, fields(%source_id))]
  pub async fn override_credibility(
    &self,
    source_id: Uuid,
    input: CredibilityOverride,
  ) -> Result<CredibilityChange> {
    let change = self
      .store
      .override_credibility(source_id, input)
      .await
      .map_err(Error::from_store)?;
    self.dispatcher.rescore(
      change.affected_targets.iter().copied(),
      Trigger::SourceCredibility(source_id),
    );
    Ok(change)
  }

  /// Hand a pinned source back to automatic assessment. Every target with
  /// evidence from the source is rescored.
  #[tracing::instrument(skip_all, fields(%source_id))]
  pub async fn clear_credibility_override(&self, source_id: Uuid) -> Result<CredibilityChange> {
    let change = self
      .store
      .clear_credibility_override(source_id, self.scoring(), Utc::now())
      .await
      .map_err(Error::from_store)?;
    self.dispatcher.rescore(
      change.affected_targets.iter().copied(),
      Trigger::SourceCredibility(source_id),
    );
    Ok(change)
  }

  // ── Evidence ──────────────────────────────────────────────────────────────

  fn evidence_changed(&self, evidence: &Evidence) {
    self
      .dispatcher
      .mark_dirty(evidence.target, Recalculation::new(Trigger::Evidence(evidence.evidence_id)));
    self.dispatcher.refresh_source(evidence.source_id);
  }

  #[tracing::instrument(skip_all, fields(target = %input.target))]
  pub async fn submit_evidence(&self, input: NewEvidence) -> Result<Evidence> {
    let evidence = self.store.submit_evidence(input).await.map_err(Error::from_store)?;
    info!(
      evidence_id = %evidence.evidence_id,
      direction = ?evidence.direction,
      "evidence accepted"
    );
    self.evidence_changed(&evidence);
    Ok(evidence)
  }

  #[tracing::instrument(skip_all, fields(%id))]
  pub async fn edit_evidence(&self, id: Uuid, edit: EvidenceEdit) -> Result<Evidence> {
    let evidence = self.store.edit_evidence(id, edit).await.map_err(Error::from_store)?;
    self.evidence_changed(&evidence);
    Ok(evidence)
  }

  #[tracing::instrument(skip_all, fields(%id))]
  pub async fn remove_evidence(&self, id: Uuid, reason: Option<String>) -> Result<Evidence> {
    let evidence = self.store.remove_evidence(id, reason).await.map_err(Error::from_store)?;
    info!(%evidence.target, "evidence removed");
    self.evidence_changed(&evidence);
    Ok(evidence)
  }

  #[tracing::instrument(skip_all, fields(%id, ?status))]
  pub async fn set_review_status(&self, id: Uuid, status: ReviewStatus) -> Result<Evidence> {
    let evidence = self
      .store
      .set_review_status(id, status)
      .await
      .map_err(Error::from_store)?;
    self.evidence_changed(&evidence);
    Ok(evidence)
  }

  pub async fn get_evidence(&self, id: Uuid) -> Result<Evidence> {
    self
      .store
      .get_evidence(id)
      .await
      .map_err(Error::from_store)?
      .ok_or(Error::Core(veracity_core::Error::EvidenceNotFound(id)))
  }

  pub async fn list_evidence(
    &self,
    target: TargetRef,
    query: EvidenceQuery,
  ) -> Result<Vec<Evidence>> {
    self.store.list_evidence(target, query).await.map_err(Error::from_store)
  }

  // ── Challenges ────────────────────────────────────────────────────────────

  #[tracing::instrument(skip_all, fields(target = %input.target))]
  pub async fn open_challenge(&self, input: NewChallenge) -> Result<Challenge> {
    let challenge = self.store.open_challenge(input).await.map_err(Error::from_store)?;
    info!(challenge_id = %challenge.challenge_id, "challenge opened");
    self.dispatcher.mark_dirty(
      challenge.target,
      Recalculation::new(Trigger::Challenge(challenge.challenge_id)),
    );
    Ok(challenge)
  }

  /// Resolve a challenge. An upheld outcome discredits the disputed evidence,
  /// so the credibility of every source behind it is refreshed too.
  #[tracing::instrument(skip_all, fields(%id))]
  pub async fn resolve_challenge(&self, id: Uuid, resolution: Resolution) -> Result<Challenge> {
    let outcome = resolution.outcome;
    let ResolvedChallenge { challenge, discredited_sources } = self
      .store
      .resolve_challenge(id, resolution)
      .await
      .map_err(Error::from_store)?;
    info!(
      %challenge.target,
      ?outcome,
      discredited = discredited_sources.len(),
      "challenge resolved"
    );
    self.dispatcher.mark_dirty(
      challenge.target,
      Recalculation::new(Trigger::Challenge(challenge.challenge_id)),
    );
    for source_id in discredited_sources {
      self.dispatcher.refresh_source(source_id);
    }
    Ok(challenge)
  }

  pub async fn get_challenge(&self, id: Uuid) -> Result<Challenge> {
    self
      .store
      .get_challenge(id)
      .await
      .map_err(Error::from_store)?
      .ok_or(Error::Core(veracity_core::Error::ChallengeNotFound(id)))
  }

  pub async fn list_challenges(&self, target: TargetRef) -> Result<Vec<Challenge>> {
    self.store.list_challenges(target).await.map_err(Error::from_store)
  }

  // ── Scores ────────────────────────────────────────────────────────────────

  pub async fn get_score(&self, target: TargetRef) -> Result<ScoreView> {
    let score = self
      .store
      .get_score(target)
      .await
      .map_err(Error::from_store)?
      .ok_or(Error::Core(veracity_core::Error::TargetNotFound(target)))?;
    Ok(ScoreView { score, status: self.dispatcher.status(target) })
  }

  pub async fn score_history(
    &self,
    target: TargetRef,
    page: Page,
  ) -> Result<Vec<ScoreHistoryEntry>> {
    self.store.score_history(target, page).await.map_err(Error::from_store)
  }

  /// Targets scoring below `threshold`, or below the configured disputed
  /// threshold when none is given.
  pub async fn disputed(&self, threshold: Option<f64>, page: Page) -> Result<Vec<VeracityScore>> {
    let threshold = threshold.unwrap_or(self.scoring().disputed_threshold);
    self
      .store
      .disputed_targets(DisputedQuery { threshold, page })
      .await
      .map_err(Error::from_store)
  }

  /// Force a recalculation and wait for the committed result.
  pub async fn recalculate(&self, target: TargetRef, reason: Option<String>) -> Result<Recalculated> {
    let request = match reason {
      Some(reason) => Recalculation::manual(reason),
      None => Recalculation::new(Trigger::Manual),
    };
    self
      .dispatcher
      .recalculate_now(target, request)
      .await
      .map_err(Error::from_store)
  }

  pub fn status(&self, target: TargetRef) -> RecalcStatus { self.dispatcher.status(target) }

  /// Queue every expired score for a decay refresh.
  pub async fn refresh_expired(&self, now: DateTime<Utc>) -> Result<usize> {
    self.dispatcher.refresh_expired(now).await.map_err(Error::from_store)
  }

  /// Wait for all background scoring to settle.
  pub async fn wait_idle(&self) { self.dispatcher.wait_idle().await }
}
