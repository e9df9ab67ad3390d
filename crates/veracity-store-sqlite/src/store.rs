//! [`SqliteStore`], the SQLite implementation of [`VeracityStore`].

use std::{collections::BTreeSet, path::Path};

use chrono::{DateTime, SubsecRound as _, Utc};
use rusqlite::{Connection, TransactionBehavior};
use uuid::Uuid;

use veracity_core::{
  ScoringConfig,
  challenge::{
    Challenge, ChallengeOutcome, ChallengeStatus, NewChallenge, Resolution, ResolvedChallenge,
  },
  credibility::{CredibilityInputs, assess},
  evidence::{Evidence, EvidenceEdit, NewEvidence, ReviewStatus},
  score::{
    Page, Recalculated, Recalculation, ScoreHistoryEntry, Trigger, VeracityScore,
  },
  scoring::{LedgerSnapshot, check_unit, evaluate},
  source::{CredibilityChange, CredibilityOverride, NewSource, Source, SourceCredibility},
  store::{DisputedQuery, EvidenceQuery, VeracityStore},
  target::{Claim, NewClaim, NewRelationship, Relationship, Target, TargetRef},
};

use crate::{
  Error, Result,
  digest::snapshot_digest,
  encode::encode_dt,
  queries::{self, require_evidence, require_source, require_target},
  schema::SCHEMA,
};

/// Timestamps are stored with microsecond precision; truncate up front so
/// returned values equal what a later read decodes.
fn now() -> DateTime<Utc> { Utc::now().trunc_subsecs(6) }

fn rejected(err: veracity_core::Error) -> Error { Error::Core(err) }

/// Recompute a source's credibility from its evidence. An override keeps its
/// pinned score unless `clear_override` hands the source back to the
/// assessment.
fn reassess(
  conn: &Connection,
  source_id: Uuid,
  config: &ScoringConfig,
  now: DateTime<Utc>,
  clear_override: bool,
) -> Result<CredibilityChange> {
  let old = require_source(conn, source_id)?.credibility;
  let items = queries::evidence_for_source(conn, source_id)?;
  let inputs = CredibilityInputs::tally(items.iter().map(|(e, score)| (e, *score)));
  let assessed = assess(&inputs, config);
  let pinned = old.is_overridden() && !clear_override;

  let updated = SourceCredibility {
    score:               if pinned { old.score } else { assessed.score },
    evidence_count:      inputs.evidence_count,
    challenged_fraction: assessed.challenged_fraction,
    consensus_alignment: assessed.consensus_alignment,
    overridden_at:       if pinned { old.overridden_at } else { None },
    override_reason:     if pinned { old.override_reason.clone() } else { None },
    updated_at:          now,
  };
  queries::write_credibility(conn, source_id, &updated)?;

  Ok(CredibilityChange {
    source_id,
    old_score: old.score,
    new_score: updated.score,
    affected_targets: queries::targets_for_source(conn, source_id)?,
  })
}

// ─── Store ───────────────────────────────────────────────────────────────────

/// A veracity store backed by a single SQLite file.
///
/// Cloning is cheap; the inner connection is reference-counted.
#[derive(Clone)]
pub struct SqliteStore {
  conn: tokio_rusqlite::Connection,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open an in-memory store for tests.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  /// Run `f` on the connection thread without a transaction.
  async fn read<R, F>(&self, f: F) -> Result<R>
  where
    F: FnOnce(&Connection) -> Result<R> + Send + 'static,
    R: Send + 'static,
  {
    self.conn.call(move |conn| Ok(f(conn))).await?
  }

  /// Run `f` inside one immediate transaction. The transaction commits only
  /// when `f` succeeds; any error rolls back every write `f` made.
  async fn transact<R, F>(&self, f: F) -> Result<R>
  where
    F: FnOnce(&Connection) -> Result<R> + Send + 'static,
    R: Send + 'static,
  {
    self
      .conn
      .call(move |conn| {
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let out = f(&tx);
        if out.is_ok() {
          tx.commit()?;
        }
        Ok(out)
      })
      .await?
  }

  /// Run raw SQL; lets tests install failure-injecting triggers.
  #[cfg(test)]
  pub(crate) async fn execute_batch(&self, sql: &'static str) -> Result<()> {
    self.read(move |conn| Ok(conn.execute_batch(sql)?)).await
  }
}

// ─── Score writes ────────────────────────────────────────────────────────────

/// Write `score` as the target's current row and append the matching history
/// entry. A failed history insert surfaces as `HistoryWriteFailure`, which
/// aborts the surrounding transaction and with it the score write.
fn record_score(
  conn: &Connection,
  score: VeracityScore,
  frozen: bool,
  request: &Recalculation,
  snapshot_digest: String,
) -> Result<Recalculated> {
  let target = score.target;
  let old_score = queries::read_score(conn, target)?.map(|s| s.score);
  queries::write_score(conn, &score, frozen)?;

  let history = ScoreHistoryEntry {
    history_id: Uuid::new_v4(),
    target,
    old_score,
    new_score: score.score,
    delta: old_score.map_or(0.0, |old| score.score - old),
    reason: request.reason(),
    trigger: request.trigger,
    snapshot_digest,
    recorded_at: score.calculated_at,
  };

  if let Err(e) = queries::insert_history(conn, &history) {
    tracing::error!(%target, error = %e, "score history write failed; rolling back");
    return Err(rejected(veracity_core::Error::HistoryWriteFailure {
      target,
      reason: e.to_string(),
    }));
  }

  Ok(Recalculated { score, history })
}

/// The initial score row of a freshly created target.
fn record_initial(conn: &Connection, target: &Target) -> Result<Recalculated> {
  let score = if target.tier.is_fixed() {
    VeracityScore::fixed(target.target, target.created_at)
  } else {
    VeracityScore::neutral(target.target, target.created_at)
  };
  record_score(
    conn,
    score,
    target.tier.is_fixed(),
    &Recalculation::new(Trigger::Created),
    snapshot_digest(&[], &[]),
  )
}

/// Snapshot, evaluate and record one target. Runs inside a transaction.
fn recalculate_in(
  conn: &Connection,
  target: TargetRef,
  request: &Recalculation,
  config: &ScoringConfig,
  now: DateTime<Utc>,
) -> Result<Recalculated> {
  let row = require_target(conn, target)?;

  // Tier-0 targets keep their constant score; the run still leaves an audit row.
  if row.tier.is_fixed() {
    let score = VeracityScore::fixed(target, now);
    return record_score(conn, score, true, request, snapshot_digest(&[], &[]));
  }

  let evidence = queries::snapshot_evidence(conn, target)?;
  let open = queries::open_challenge_ids(conn, target)?;
  let digest = snapshot_digest(&evidence, &open);
  let snapshot = LedgerSnapshot {
    target: row,
    evidence,
    open_challenges: u32::try_from(open.len()).unwrap_or(u32::MAX),
  };

  let breakdown = evaluate(&snapshot, config, now)?;
  let score = VeracityScore::from_breakdown(
    target,
    &breakdown,
    now,
    breakdown.expires_at(config, now),
  );
  record_score(conn, score, false, request, digest)
}

fn require_live_evidence(conn: &Connection, id: Uuid) -> Result<Evidence> {
  let evidence = require_evidence(conn, id)?;
  if evidence.is_removed() {
    return Err(rejected(veracity_core::Error::EvidenceRemoved(id)));
  }
  Ok(evidence)
}

fn require_mutable(conn: &Connection, target: TargetRef) -> Result<Target> {
  let row = require_target(conn, target)?;
  if row.tier.is_fixed() {
    return Err(rejected(veracity_core::Error::ImmutableTargetViolation(target)));
  }
  Ok(row)
}

// ─── VeracityStore impl ──────────────────────────────────────────────────────

impl VeracityStore for SqliteStore {
  type Error = Error;

  // ── Entities ──────────────────────────────────────────────────────────────

  async fn create_claim(&self, input: NewClaim) -> Result<Claim> {
    input.validate()?;
    let claim = Claim {
      claim_id:   Uuid::new_v4(),
      statement:  input.statement,
      tier:       input.tier,
      domain:     input.domain,
      created_at: now(),
    };

    let row = claim.clone();
    self
      .transact(move |conn| {
        queries::insert_claim(conn, &row)?;
        record_initial(conn, &row.as_target())
      })
      .await?;

    tracing::debug!(claim_id = %claim.claim_id, tier = claim.tier.level(), "claim created");
    Ok(claim)
  }

  async fn create_relationship(&self, input: NewRelationship) -> Result<Relationship> {
    input.validate()?;
    let rel = Relationship {
      relationship_id: Uuid::new_v4(),
      from_claim:      input.from_claim,
      to_claim:        input.to_claim,
      relation:        input.relation,
      tier:            input.tier,
      domain:          input.domain,
      created_at:      now(),
    };

    let row = rel.clone();
    self
      .transact(move |conn| {
        for claim_id in [row.from_claim, row.to_claim] {
          require_target(conn, TargetRef::Claim(claim_id))?;
        }
        queries::insert_relationship(conn, &row)?;
        record_initial(conn, &row.as_target())
      })
      .await?;

    tracing::debug!(relationship_id = %rel.relationship_id, "relationship created");
    Ok(rel)
  }

  async fn get_claim(&self, id: Uuid) -> Result<Option<Claim>> {
    self.read(move |conn| queries::read_claim(conn, id)).await
  }

  async fn get_relationship(&self, id: Uuid) -> Result<Option<Relationship>> {
    self.read(move |conn| queries::read_relationship(conn, id)).await
  }

  async fn get_target(&self, target: TargetRef) -> Result<Option<Target>> {
    self.read(move |conn| queries::read_target(conn, target)).await
  }

  // ── Sources ───────────────────────────────────────────────────────────────

  async fn create_source(&self, input: NewSource) -> Result<Source> {
    input.validate()?;
    let at = now();
    let source = Source {
      source_id:   Uuid::new_v4(),
      kind:        input.kind,
      title:       input.title,
      url:         input.url,
      description: input.description,
      created_at:  at,
      credibility: SourceCredibility::neutral(at),
    };

    let row = source.clone();
    self.transact(move |conn| queries::insert_source(conn, &row)).await?;
    Ok(source)
  }

  async fn get_source(&self, id: Uuid) -> Result<Option<Source>> {
    self.read(move |conn| queries::read_source(conn, id)).await
  }

  async fn list_sources(&self, page: Page) -> Result<Vec<Source>> {
    self.read(move |conn| queries::list_sources(conn, page)).await
  }

  async fn refresh_credibility<'a>(
    &'a self,
    source_id: Uuid,
    config: &'a ScoringConfig,
    now: DateTime<Utc>,
  ) -> Result<CredibilityChange> {
    let config = config.clone();
    let now = now.trunc_subsecs(6);

    let change = self
      .transact(move |conn| reassess(conn, source_id, &config, now, false))
      .await?;

    tracing::debug!(
      %source_id,
      old = change.old_score,
      new = change.new_score,
      affected = change.affected_targets.len(),
      "source credibility refreshed"
    );
    Ok(change)
  }

  async fn override_credibility(
    &self,
    source_id: Uuid,
    input: CredibilityOverride,
  ) -> Result<CredibilityChange> {
    input.validate()?;
    let at = now();

    let change = self
      .transact(move |conn| {
        let old = require_source(conn, source_id)?.credibility;
        let updated = SourceCredibility {
          score: input.score,
          overridden_at: Some(at),
          override_reason: Some(input.reason),
          updated_at: at,
          ..old.clone()
        };
        queries::write_credibility(conn, source_id, &updated)?;

        Ok(CredibilityChange {
          source_id,
          old_score: old.score,
          new_score: updated.score,
          affected_targets: queries::targets_for_source(conn, source_id)?,
        })
      })
      .await?;

    tracing::info!(%source_id, score = change.new_score, "source credibility overridden");
    Ok(change)
  }

  async fn clear_credibility_override<'a>(
    &'a self,
    source_id: Uuid,
    config: &'a ScoringConfig,
    now: DateTime<Utc>,
  ) -> Result<CredibilityChange> {
    let config = config.clone();
    let now = now.trunc_subsecs(6);

    let change = self
      .transact(move |conn| reassess(conn, source_id, &config, now, true))
      .await?;

    tracing::info!(%source_id, score = change.new_score, "credibility override cleared");
    Ok(change)
  }

  // ── Evidence ──────────────────────────────────────────────────────────────

  async fn submit_evidence(&self, input: NewEvidence) -> Result<Evidence> {
    input.validate()?;
    let at = now();
    let evidence = Evidence {
      evidence_id:    Uuid::new_v4(),
      target:         input.target,
      source_id:      input.source_id,
      direction:      input.direction,
      base_weight:    input.base_weight,
      confidence:     input.confidence,
      content:        input.content,
      relevance_date: input.relevance_date,
      decay_rate:     input.decay_rate,
      review_status:  ReviewStatus::Unreviewed,
      submitted_at:   at,
      updated_at:     at,
      removed_at:     None,
      removal_reason: None,
    };

    let row = evidence.clone();
    self
      .transact(move |conn| {
        require_mutable(conn, row.target)?;
        require_source(conn, row.source_id)?;
        queries::insert_evidence(conn, &row)
      })
      .await?;

    tracing::debug!(
      evidence_id = %evidence.evidence_id,
      %evidence.target,
      "evidence submitted"
    );
    Ok(evidence)
  }

  async fn edit_evidence(&self, id: Uuid, edit: EvidenceEdit) -> Result<Evidence> {
    edit.validate()?;
    if edit.is_empty() {
      return Err(rejected(veracity_core::Error::InvalidInput(
        "edit changes nothing".into(),
      )));
    }
    let at = now();

    self
      .transact(move |conn| {
        let mut evidence = require_live_evidence(conn, id)?;
        edit.apply(&mut evidence, at);
        queries::update_evidence(conn, &evidence)?;
        Ok(evidence)
      })
      .await
  }

  async fn remove_evidence(&self, id: Uuid, reason: Option<String>) -> Result<Evidence> {
    let at = now();
    self
      .transact(move |conn| {
        let mut evidence = require_live_evidence(conn, id)?;
        evidence.removed_at = Some(at);
        evidence.removal_reason = reason;
        evidence.updated_at = at;
        queries::update_evidence(conn, &evidence)?;
        Ok(evidence)
      })
      .await
  }

  async fn set_review_status(&self, id: Uuid, status: ReviewStatus) -> Result<Evidence> {
    let at = now();
    self
      .transact(move |conn| {
        let mut evidence = require_live_evidence(conn, id)?;
        evidence.review_status = status;
        evidence.updated_at = at;
        queries::update_evidence(conn, &evidence)?;
        Ok(evidence)
      })
      .await
  }

  async fn get_evidence(&self, id: Uuid) -> Result<Option<Evidence>> {
    self.read(move |conn| queries::read_evidence(conn, id)).await
  }

  async fn list_evidence(
    &self,
    target: TargetRef,
    query: EvidenceQuery,
  ) -> Result<Vec<Evidence>> {
    self
      .read(move |conn| {
        require_target(conn, target)?;
        queries::evidence_for_target(conn, target, query.include_removed)
      })
      .await
  }

  // ── Challenges ────────────────────────────────────────────────────────────

  async fn open_challenge(&self, input: NewChallenge) -> Result<Challenge> {
    input.validate()?;
    let challenge = Challenge {
      challenge_id:      Uuid::new_v4(),
      target:            input.target,
      reason:            input.reason,
      disputed_evidence: input.disputed_evidence,
      status:            ChallengeStatus::Open,
      opened_at:         now(),
    };

    let row = challenge.clone();
    self
      .transact(move |conn| {
        require_mutable(conn, row.target)?;
        for id in &row.disputed_evidence {
          let evidence = require_evidence(conn, *id)?;
          if evidence.target != row.target {
            return Err(rejected(veracity_core::Error::InvalidInput(format!(
              "evidence {id} belongs to {}, not {}",
              evidence.target, row.target
            ))));
          }
        }
        queries::insert_challenge(conn, &row)
      })
      .await?;

    tracing::debug!(
      challenge_id = %challenge.challenge_id,
      %challenge.target,
      "challenge opened"
    );
    Ok(challenge)
  }

  async fn resolve_challenge(
    &self,
    id: Uuid,
    resolution: Resolution,
  ) -> Result<ResolvedChallenge> {
    let at = now();
    self
      .transact(move |conn| {
        let mut challenge = queries::read_challenge(conn, id)?
          .ok_or(rejected(veracity_core::Error::ChallengeNotFound(id)))?;
        if !challenge.status.is_open() {
          return Err(rejected(veracity_core::Error::ChallengeAlreadyResolved(id)));
        }
        resolution.validate_for(&challenge)?;

        challenge.status = ChallengeStatus::Resolved {
          outcome: resolution.outcome,
          note:    resolution.note,
          at,
        };
        queries::write_resolution(conn, &challenge)?;

        let mut sources = BTreeSet::new();
        if resolution.outcome == ChallengeOutcome::Upheld {
          for evidence_id in &challenge.disputed_evidence {
            let mut evidence = require_evidence(conn, *evidence_id)?;
            if evidence.is_removed() {
              continue;
            }
            evidence.review_status = ReviewStatus::Discredited;
            evidence.updated_at = at;
            queries::update_evidence(conn, &evidence)?;
            sources.insert(evidence.source_id);
          }
        }
        Ok(ResolvedChallenge {
          challenge,
          discredited_sources: sources.into_iter().collect(),
        })
      })
      .await
  }

  async fn get_challenge(&self, id: Uuid) -> Result<Option<Challenge>> {
    self.read(move |conn| queries::read_challenge(conn, id)).await
  }

  async fn list_challenges(&self, target: TargetRef) -> Result<Vec<Challenge>> {
    self
      .read(move |conn| {
        require_target(conn, target)?;
        queries::challenges_for_target(conn, target)
      })
      .await
  }

  // ── Scores ────────────────────────────────────────────────────────────────

  async fn get_score(&self, target: TargetRef) -> Result<Option<VeracityScore>> {
    self.read(move |conn| queries::read_score(conn, target)).await
  }

  async fn score_history(
    &self,
    target: TargetRef,
    page: Page,
  ) -> Result<Vec<ScoreHistoryEntry>> {
    self
      .read(move |conn| {
        require_target(conn, target)?;
        queries::history_for_target(conn, target, page)
      })
      .await
  }

  async fn disputed_targets(&self, query: DisputedQuery) -> Result<Vec<VeracityScore>> {
    check_unit("threshold", query.threshold)?;
    self
      .read(move |conn| queries::disputed_scores(conn, query.threshold, query.page))
      .await
  }

  async fn expired_targets(&self, now: DateTime<Utc>) -> Result<Vec<TargetRef>> {
    let now = encode_dt(now);
    self.read(move |conn| queries::expired_targets(conn, &now)).await
  }

  async fn recalculate<'a>(
    &'a self,
    target: TargetRef,
    request: Recalculation,
    config: &'a ScoringConfig,
    now: DateTime<Utc>,
  ) -> Result<Recalculated> {
    let config = config.clone();
    let now = now.trunc_subsecs(6);

    let result = self
      .transact(move |conn| recalculate_in(conn, target, &request, &config, now))
      .await?;

    tracing::debug!(
      %target,
      old = ?result.history.old_score,
      new = result.score.score,
      trigger = ?result.history.trigger,
      "score recalculated"
    );
    Ok(result)
  }
}
