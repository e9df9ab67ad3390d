//! Dispatcher and service tests against a SQLite-backed store.

use std::{
  path::PathBuf,
  sync::{
    Mutex,
    atomic::{AtomicU32, Ordering},
  },
};

use chrono::{DateTime, Duration, Utc};
use tokio::sync::oneshot;
use uuid::Uuid;
use veracity_core::{
  ScoringConfig,
  challenge::{Challenge, ChallengeOutcome, NewChallenge, Resolution, ResolvedChallenge},
  evidence::{Direction, Evidence, EvidenceEdit, NewEvidence, ReviewStatus},
  score::{Page, Recalculated, Recalculation, ScoreHistoryEntry, Trigger, VeracityScore},
  source::{CredibilityChange, CredibilityOverride, NewSource, Source, SourceKind},
  store::{DisputedQuery, EvidenceQuery, VeracityStore},
  target::{Claim, NewClaim, NewRelationship, Relationship, Target, TargetRef, Tier},
};
use veracity_store_sqlite::SqliteStore;

use crate::{DispatchConfig, Error, RecalcStatus, VeracityService};

type Service = VeracityService<SqliteStore>;

async fn service() -> Service {
  let store = SqliteStore::open_in_memory().await.expect("in-memory store");
  VeracityService::new(store, ScoringConfig::default(), DispatchConfig::default())
}

async fn claim<S: VeracityStore + 'static>(svc: &VeracityService<S>) -> TargetRef {
  TargetRef::Claim(svc.create_claim(NewClaim::new("the bridge opened in 1932")).await.unwrap().claim_id)
}

/// A source pinned at full credibility, so refreshes never move it.
async fn trusted_source<S: VeracityStore + 'static>(svc: &VeracityService<S>) -> Uuid {
  let id = svc
    .create_source(NewSource::new(SourceKind::Dataset, "city records"))
    .await
    .unwrap()
    .source_id;
  svc
    .override_credibility(id, CredibilityOverride { score: 1.0, reason: "archive".into() })
    .await
    .unwrap();
  id
}

fn evidence(target: TargetRef, source_id: Uuid, direction: Direction, weight: f64) -> NewEvidence {
  let mut input = NewEvidence::new(target, source_id, direction, "entry");
  input.base_weight = weight;
  input
}

async fn latest_history<S: VeracityStore + 'static>(
  svc: &VeracityService<S>,
  target: TargetRef,
) -> ScoreHistoryEntry {
  svc
    .score_history(target, Page { limit: Some(1), offset: None })
    .await
    .unwrap()
    .remove(0)
}

fn approx(a: f64, b: f64) -> bool { (a - b).abs() < 1e-9 }

// ─── Scheduling ──────────────────────────────────────────────────────────────

#[tokio::test]
async fn evidence_submission_rescores_in_the_background() {
  let svc = service().await;
  let target = claim(&svc).await;
  let src = trusted_source(&svc).await;

  svc.submit_evidence(evidence(target, src, Direction::Supporting, 0.8)).await.unwrap();
  svc.submit_evidence(evidence(target, src, Direction::Refuting, 0.2)).await.unwrap();
  svc.wait_idle().await;

  let view = svc.get_score(target).await.unwrap();
  assert_eq!(view.status, RecalcStatus::Clean);
  assert!(approx(view.score.score, 0.8));

  let last = latest_history(&svc, target).await;
  assert_eq!(last.new_score, view.score.score);
  assert!(matches!(last.trigger, Trigger::Evidence(_)));
}

#[tokio::test]
async fn open_challenge_applies_penalty() {
  let svc = service().await;
  let target = claim(&svc).await;
  let src = trusted_source(&svc).await;
  svc.submit_evidence(evidence(target, src, Direction::Supporting, 0.8)).await.unwrap();
  svc.submit_evidence(evidence(target, src, Direction::Refuting, 0.2)).await.unwrap();

  let challenge = svc.open_challenge(NewChallenge::new(target, "sample too small")).await.unwrap();
  svc.wait_idle().await;
  assert!(approx(svc.get_score(target).await.unwrap().score.score, 0.72));

  svc
    .resolve_challenge(challenge.challenge_id, Resolution {
      outcome: ChallengeOutcome::Rejected,
      note:    None,
    })
    .await
    .unwrap();
  svc.wait_idle().await;
  assert!(approx(svc.get_score(target).await.unwrap().score.score, 0.8));
  assert_eq!(
    latest_history(&svc, target).await.trigger,
    Trigger::Challenge(challenge.challenge_id)
  );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_writes_converge_without_drift() {
  let svc = service().await;
  let target = claim(&svc).await;
  let src = trusted_source(&svc).await;

  let mut tasks = Vec::new();
  for i in 0..20 {
    let svc = svc.clone();
    let direction = if i % 4 == 0 { Direction::Refuting } else { Direction::Supporting };
    tasks.push(tokio::spawn(async move {
      svc.submit_evidence(evidence(target, src, direction, 0.5)).await.unwrap();
    }));
  }
  for task in tasks {
    task.await.unwrap();
  }
  svc.wait_idle().await;

  let view = svc.get_score(target).await.unwrap();
  assert_eq!(view.status, RecalcStatus::Clean);
  assert!(approx(view.score.score, 0.75));
  assert_eq!(view.score.evidence_count, 20);
  assert_eq!(latest_history(&svc, target).await.new_score, view.score.score);

  // Coalescing means fewer runs than writes, but never fewer than one.
  let history = svc.score_history(target, Page { limit: Some(100), offset: None }).await.unwrap();
  assert!(history.len() >= 2 && history.len() <= 21);

  // Nothing changed since the last run, so a forced pass records zero delta.
  let forced = svc.recalculate(target, Some("audit".into())).await.unwrap();
  assert_eq!(forced.history.delta, 0.0);
  assert_eq!(forced.history.reason, "audit");
}

#[tokio::test]
async fn independent_targets_are_scored_separately() {
  let svc = service().await;
  let src = trusted_source(&svc).await;
  let a = claim(&svc).await;
  let b = claim(&svc).await;

  svc.submit_evidence(evidence(a, src, Direction::Supporting, 1.0)).await.unwrap();
  svc.submit_evidence(evidence(b, src, Direction::Refuting, 1.0)).await.unwrap();
  svc.wait_idle().await;

  assert_eq!(svc.get_score(a).await.unwrap().score.score, 1.0);
  assert_eq!(svc.get_score(b).await.unwrap().score.score, 0.0);
}

// ─── Forced recalculation ────────────────────────────────────────────────────

#[tokio::test]
async fn forced_recalculation_of_fixed_target_stays_one() {
  let svc = service().await;
  let mut input = NewClaim::new("the speed of light in vacuum is constant");
  input.tier = Tier::Fixed;
  let target = TargetRef::Claim(svc.create_claim(input).await.unwrap().claim_id);

  let done = svc.recalculate(target, Some("audit".into())).await.unwrap();
  assert_eq!(done.score.score, 1.0);
  assert_eq!(done.history.delta, 0.0);
  assert_eq!(svc.status(target), RecalcStatus::Clean);
}

#[tokio::test]
async fn forced_recalculation_of_missing_target_is_rejected() {
  let svc = service().await;
  let target = TargetRef::Relationship(Uuid::new_v4());
  let err = svc.recalculate(target, None).await.unwrap_err();
  assert!(matches!(err, Error::Core(veracity_core::Error::TargetNotFound(_))));
  assert_eq!(svc.status(target), RecalcStatus::Clean);
}

// ─── Credibility ─────────────────────────────────────────────────────────────

#[tokio::test]
async fn override_rescores_every_target_of_the_source() {
  let svc = service().await;
  let src = svc
    .create_source(NewSource::new(SourceKind::Testimony, "witness"))
    .await
    .unwrap()
    .source_id;
  let a = claim(&svc).await;
  let b = claim(&svc).await;
  svc.submit_evidence(evidence(a, src, Direction::Supporting, 1.0)).await.unwrap();
  svc.submit_evidence(evidence(b, src, Direction::Supporting, 1.0)).await.unwrap();
  svc.wait_idle().await;

  svc
    .override_credibility(src, CredibilityOverride { score: 0.2, reason: "perjury".into() })
    .await
    .unwrap();
  svc.wait_idle().await;

  for target in [a, b] {
    assert_eq!(
      latest_history(&svc, target).await.trigger,
      Trigger::SourceCredibility(src)
    );
  }
  let source = svc.get_source(src).await.unwrap();
  assert_eq!(source.credibility.score, 0.2);
  assert!(source.credibility.is_overridden());
}

#[tokio::test]
async fn evidence_refreshes_source_credibility() {
  let svc = service().await;
  let src = svc
    .create_source(NewSource::new(SourceKind::Website, "blog"))
    .await
    .unwrap()
    .source_id;
  let target = claim(&svc).await;
  svc.submit_evidence(evidence(target, src, Direction::Supporting, 1.0)).await.unwrap();
  svc.wait_idle().await;

  let cred = svc.get_source(src).await.unwrap().credibility;
  assert_eq!(cred.evidence_count, 1);
  assert_ne!(cred.score, 0.5);
}

// ─── Decay refresh ───────────────────────────────────────────────────────────

#[tokio::test]
async fn expired_scores_are_refreshed() {
  let svc = service().await;
  let target = claim(&svc).await;
  let src = trusted_source(&svc).await;

  let mut input = evidence(target, src, Direction::Supporting, 1.0);
  input.relevance_date = Some(Utc::now() - Duration::days(10));
  svc.submit_evidence(input).await.unwrap();
  svc.submit_evidence(evidence(target, src, Direction::Refuting, 0.5)).await.unwrap();
  svc.wait_idle().await;
  let before = svc.get_score(target).await.unwrap().score;
  assert!(before.expires_at.is_some());

  assert_eq!(svc.refresh_expired(Utc::now()).await.unwrap(), 0);

  let later = Utc::now() + Duration::hours(25);
  assert_eq!(svc.refresh_expired(later).await.unwrap(), 1);
  svc.wait_idle().await;
  assert_eq!(latest_history(&svc, target).await.trigger, Trigger::DecayRefresh);
}

// ─── Failure handling ────────────────────────────────────────────────────────

/// A file-backed store, so a second raw connection can inject failures.
struct TempDb {
  path: PathBuf,
}

impl TempDb {
  fn new() -> Self {
    Self { path: std::env::temp_dir().join(format!("veracity-{}.db", Uuid::new_v4())) }
  }

  fn exec(&self, sql: &str) {
    let conn = rusqlite::Connection::open(&self.path).unwrap();
    conn.execute_batch(sql).unwrap();
  }
}

impl Drop for TempDb {
  fn drop(&mut self) {
    for suffix in ["", "-wal", "-shm"] {
      let mut p = self.path.clone().into_os_string();
      p.push(suffix);
      let _ = std::fs::remove_file(p);
    }
  }
}

#[tokio::test]
async fn failed_history_write_leaves_target_dirty_until_retried() {
  let db = TempDb::new();
  let store = SqliteStore::open(&db.path).await.unwrap();
  let svc = VeracityService::new(store, ScoringConfig::default(), DispatchConfig {
    max_retries:        1,
    initial_backoff_ms: 1,
    max_backoff_ms:     1,
  });
  let target = claim(&svc).await;
  let src = trusted_source(&svc).await;

  db.exec(
    "CREATE TRIGGER fail_history BEFORE INSERT ON score_history
     BEGIN SELECT RAISE(ABORT, 'audit log unavailable'); END;",
  );
  svc.submit_evidence(evidence(target, src, Direction::Supporting, 1.0)).await.unwrap();
  svc.wait_idle().await;

  let view = svc.get_score(target).await.unwrap();
  assert_eq!(view.status, RecalcStatus::Dirty);
  assert_eq!(view.score.score, 0.5);

  db.exec("DROP TRIGGER fail_history;");
  assert_eq!(svc.dispatcher().retry_stalled(), 1);
  svc.wait_idle().await;

  let view = svc.get_score(target).await.unwrap();
  assert_eq!(view.status, RecalcStatus::Clean);
  assert_eq!(view.score.score, 1.0);
  assert_eq!(latest_history(&svc, target).await.new_score, 1.0);
}

// ─── Challenges and overrides ────────────────────────────────────────────────

#[tokio::test]
async fn upheld_challenge_refreshes_the_discredited_source() {
  let svc = service().await;
  let target = claim(&svc).await;
  let witness = svc
    .create_source(NewSource::new(SourceKind::Testimony, "witness"))
    .await
    .unwrap()
    .source_id;
  let src = trusted_source(&svc).await;
  let bad = svc
    .submit_evidence(evidence(target, witness, Direction::Supporting, 1.0))
    .await
    .unwrap()
    .evidence_id;
  svc.submit_evidence(evidence(target, src, Direction::Refuting, 0.5)).await.unwrap();

  let mut input = NewChallenge::new(target, "witness recanted");
  input.disputed_evidence = vec![bad];
  let challenge = svc.open_challenge(input).await.unwrap();
  svc.wait_idle().await;
  let before = svc.get_source(witness).await.unwrap().credibility;
  assert_eq!(before.challenged_fraction, 0.0);

  svc
    .resolve_challenge(challenge.challenge_id, Resolution {
      outcome: ChallengeOutcome::Upheld,
      note:    None,
    })
    .await
    .unwrap();
  svc.wait_idle().await;

  let after = svc.get_source(witness).await.unwrap().credibility;
  assert_eq!(after.challenged_fraction, 1.0);
  assert!(after.updated_at > before.updated_at);
  assert_eq!(svc.get_evidence(bad).await.unwrap().review_status, ReviewStatus::Discredited);
  assert_eq!(svc.status(target), RecalcStatus::Clean);
}

#[tokio::test]
async fn upholding_a_challenge_without_disputed_evidence_is_rejected() {
  let svc = service().await;
  let target = claim(&svc).await;
  let src = trusted_source(&svc).await;
  svc.submit_evidence(evidence(target, src, Direction::Supporting, 0.8)).await.unwrap();
  svc.submit_evidence(evidence(target, src, Direction::Refuting, 0.2)).await.unwrap();
  let challenge = svc.open_challenge(NewChallenge::new(target, "gut feeling")).await.unwrap();
  svc.wait_idle().await;

  let err = svc
    .resolve_challenge(challenge.challenge_id, Resolution {
      outcome: ChallengeOutcome::Upheld,
      note:    None,
    })
    .await
    .unwrap_err();
  assert!(matches!(err, Error::Core(veracity_core::Error::InvalidInput(_))));

  svc.wait_idle().await;
  assert!(svc.get_challenge(challenge.challenge_id).await.unwrap().status.is_open());
  assert!(approx(svc.get_score(target).await.unwrap().score.score, 0.72));
}

#[tokio::test]
async fn cleared_override_rescores_with_assessed_credibility() {
  let svc = service().await;
  let src = svc
    .create_source(NewSource::new(SourceKind::Interview, "harbour master"))
    .await
    .unwrap()
    .source_id;
  let target = claim(&svc).await;
  svc.submit_evidence(evidence(target, src, Direction::Supporting, 1.0)).await.unwrap();
  svc.wait_idle().await;
  let assessed = svc
    .dispatcher()
    .store()
    .refresh_credibility(src, svc.scoring(), Utc::now())
    .await
    .unwrap()
    .new_score;

  svc
    .override_credibility(src, CredibilityOverride { score: 0.1, reason: "disputed".into() })
    .await
    .unwrap();
  svc.wait_idle().await;
  let pinned_runs = svc.score_history(target, Page::default()).await.unwrap().len();

  let change = svc.clear_credibility_override(src).await.unwrap();
  svc.wait_idle().await;
  assert_eq!(change.old_score, 0.1);
  assert!(approx(change.new_score, assessed));

  let cred = svc.get_source(src).await.unwrap().credibility;
  assert!(!cred.is_overridden());
  let history = svc.score_history(target, Page::default()).await.unwrap();
  assert_eq!(history.len(), pinned_runs + 1);
  assert_eq!(history[0].trigger, Trigger::SourceCredibility(src));
}

// ─── Retry and contention ────────────────────────────────────────────────────

/// Wraps a SQLite store so recalculation can be made to fail with a busy
/// database, or held open until the test releases it.
struct Scripted {
  inner:          SqliteStore,
  failures:       AtomicU32,
  recalculations: AtomicU32,
  gate:           Mutex<Option<oneshot::Receiver<()>>>,
}

impl Scripted {
  async fn new(failures: u32) -> Self {
    Self {
      inner:          SqliteStore::open_in_memory().await.unwrap(),
      failures:       AtomicU32::new(failures),
      recalculations: AtomicU32::new(0),
      gate:           Mutex::new(None),
    }
  }

  /// Hold the next recalculation until the returned sender fires.
  fn hold_next(&self) -> oneshot::Sender<()> {
    let (tx, rx) = oneshot::channel();
    *self.gate.lock().unwrap() = Some(rx);
    tx
  }
}

fn busy() -> veracity_store_sqlite::Error {
  veracity_store_sqlite::Error::Sqlite(rusqlite::Error::SqliteFailure(
    rusqlite::ffi::Error::new(rusqlite::ffi::SQLITE_BUSY),
    Some("database is locked".into()),
  ))
}

type ScriptedResult<T> = veracity_store_sqlite::Result<T>;

impl VeracityStore for Scripted {
  type Error = veracity_store_sqlite::Error;

  async fn create_claim(&self, input: NewClaim) -> ScriptedResult<Claim> {
    self.inner.create_claim(input).await
  }

  async fn create_relationship(&self, input: NewRelationship) -> ScriptedResult<Relationship> {
    self.inner.create_relationship(input).await
  }

  async fn get_claim(&self, id: Uuid) -> ScriptedResult<Option<Claim>> {
    self.inner.get_claim(id).await
  }

  async fn get_relationship(&self, id: Uuid) -> ScriptedResult<Option<Relationship>> {
    self.inner.get_relationship(id).await
  }

  async fn get_target(&self, target: TargetRef) -> ScriptedResult<Option<Target>> {
    self.inner.get_target(target).await
  }

  async fn create_source(&self, input: NewSource) -> ScriptedResult<Source> {
    self.inner.create_source(input).await
  }

  async fn get_source(&self, id: Uuid) -> ScriptedResult<Option<Source>> {
    self.inner.get_source(id).await
  }

  async fn list_sources(&self, page: Page) -> ScriptedResult<Vec<Source>> {
    self.inner.list_sources(page).await
  }

  async fn refresh_credibility<'a>(
    &'a self,
    source_id: Uuid,
    config: &'a ScoringConfig,
    now: DateTime<Utc>,
  ) -> ScriptedResult<CredibilityChange> {
    self.inner.refresh_credibility(source_id, config, now).await
  }

  async fn override_credibility(
    &self,
    source_id: Uuid,
    input: CredibilityOverride,
  ) -> ScriptedResult<CredibilityChange> {
    self.inner.override_credibility(source_id, input).await
  }

  async fn clear_credibility_override<'a>(
    &'a self,
    source_id: Uuid,
    config: &'a ScoringConfig,
    now: DateTime<Utc>,
  ) -> ScriptedResult<CredibilityChange> {
    self.inner.clear_credibility_override(source_id, config, now).await
  }

  async fn submit_evidence(&self, input: NewEvidence) -> ScriptedResult<Evidence> {
    self.inner.submit_evidence(input).await
  }

  async fn edit_evidence(&self, id: Uuid, edit: EvidenceEdit) -> ScriptedResult<Evidence> {
    self.inner.edit_evidence(id, edit).await
  }

  async fn remove_evidence(&self, id: Uuid, reason: Option<String>) -> ScriptedResult<Evidence> {
    self.inner.remove_evidence(id, reason).await
  }

  async fn set_review_status(&self, id: Uuid, status: ReviewStatus) -> ScriptedResult<Evidence> {
    self.inner.set_review_status(id, status).await
  }

  async fn get_evidence(&self, id: Uuid) -> ScriptedResult<Option<Evidence>> {
    self.inner.get_evidence(id).await
  }

  async fn list_evidence(
    &self,
    target: TargetRef,
    query: EvidenceQuery,
  ) -> ScriptedResult<Vec<Evidence>> {
    self.inner.list_evidence(target, query).await
  }

  async fn open_challenge(&self, input: NewChallenge) -> ScriptedResult<Challenge> {
    self.inner.open_challenge(input).await
  }

  async fn resolve_challenge(
    &self,
    id: Uuid,
    resolution: Resolution,
  ) -> ScriptedResult<ResolvedChallenge> {
    self.inner.resolve_challenge(id, resolution).await
  }

  async fn get_challenge(&self, id: Uuid) -> ScriptedResult<Option<Challenge>> {
    self.inner.get_challenge(id).await
  }

  async fn list_challenges(&self, target: TargetRef) -> ScriptedResult<Vec<Challenge>> {
    self.inner.list_challenges(target).await
  }

  async fn get_score(&self, target: TargetRef) -> ScriptedResult<Option<VeracityScore>> {
    self.inner.get_score(target).await
  }

  async fn score_history(
    &self,
    target: TargetRef,
    page: Page,
  ) -> ScriptedResult<Vec<ScoreHistoryEntry>> {
    self.inner.score_history(target, page).await
  }

  async fn disputed_targets(&self, query: DisputedQuery) -> ScriptedResult<Vec<VeracityScore>> {
    self.inner.disputed_targets(query).await
  }

  async fn expired_targets(&self, now: DateTime<Utc>) -> ScriptedResult<Vec<TargetRef>> {
    self.inner.expired_targets(now).await
  }

  async fn recalculate<'a>(
    &'a self,
    target: TargetRef,
    request: Recalculation,
    config: &'a ScoringConfig,
    now: DateTime<Utc>,
  ) -> ScriptedResult<Recalculated> {
    self.recalculations.fetch_add(1, Ordering::SeqCst);
    let gate = self.gate.lock().unwrap().take();
    if let Some(gate) = gate {
      let _ = gate.await;
    }
    let fail = self
      .failures
      .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
      .is_ok();
    if fail {
      return Err(busy());
    }
    self.inner.recalculate(target, request, config, now).await
  }
}

fn fast_retries(max_retries: u32) -> DispatchConfig {
  DispatchConfig { max_retries, initial_backoff_ms: 1, max_backoff_ms: 4 }
}

#[tokio::test]
async fn busy_database_is_retried_until_the_run_commits() {
  let store = Scripted::new(2).await;
  let svc = VeracityService::new(store, ScoringConfig::default(), fast_retries(3));
  let target = claim(&svc).await;
  let src = trusted_source(&svc).await;

  svc.submit_evidence(evidence(target, src, Direction::Supporting, 1.0)).await.unwrap();
  svc.wait_idle().await;

  let view = svc.get_score(target).await.unwrap();
  assert_eq!(view.status, RecalcStatus::Clean);
  assert_eq!(view.score.score, 1.0);
  assert_eq!(svc.dispatcher().store().recalculations.load(Ordering::SeqCst), 3);

  let history = svc.score_history(target, Page::default()).await.unwrap();
  assert_eq!(history.len(), 2);
  assert!(matches!(history[0].trigger, Trigger::Evidence(_)));
}

#[tokio::test]
async fn exhausted_retries_stall_the_target() {
  let store = Scripted::new(5).await;
  let svc = VeracityService::new(store, ScoringConfig::default(), fast_retries(2));
  let target = claim(&svc).await;
  let src = trusted_source(&svc).await;

  svc.submit_evidence(evidence(target, src, Direction::Supporting, 1.0)).await.unwrap();
  svc.wait_idle().await;
  let view = svc.get_score(target).await.unwrap();
  assert_eq!(view.status, RecalcStatus::Dirty);
  assert_eq!(view.score.score, 0.5);

  // Two failures remain; the next run absorbs them within its retries.
  assert_eq!(svc.dispatcher().retry_stalled(), 1);
  svc.wait_idle().await;
  let view = svc.get_score(target).await.unwrap();
  assert_eq!(view.status, RecalcStatus::Clean);
  assert_eq!(view.score.score, 1.0);
  assert_eq!(svc.dispatcher().store().recalculations.load(Ordering::SeqCst), 6);
}

#[tokio::test]
async fn forced_recalculation_waits_for_a_running_pass() {
  let store = Scripted::new(0).await;
  let svc = VeracityService::new(store, ScoringConfig::default(), DispatchConfig::default());
  let target = claim(&svc).await;
  let src = trusted_source(&svc).await;

  let release = svc.dispatcher().store().hold_next();
  svc.submit_evidence(evidence(target, src, Direction::Supporting, 1.0)).await.unwrap();
  while svc.status(target) != RecalcStatus::Recalculating {
    tokio::task::yield_now().await;
  }

  let forced = tokio::spawn({
    let svc = svc.clone();
    async move { svc.recalculate(target, Some("audit".into())).await }
  });
  for _ in 0..10 {
    tokio::task::yield_now().await;
  }
  assert!(!forced.is_finished());
  assert_eq!(svc.dispatcher().store().recalculations.load(Ordering::SeqCst), 1);

  release.send(()).unwrap();
  let done = forced.await.unwrap().unwrap();
  svc.wait_idle().await;

  assert_eq!(done.history.reason, "audit");
  assert_eq!(done.history.delta, 0.0);
  assert_eq!(svc.status(target), RecalcStatus::Clean);

  let history = svc.score_history(target, Page::default()).await.unwrap();
  assert_eq!(history.len(), 3);
  assert!(matches!(history[1].trigger, Trigger::Evidence(_)));
  assert_eq!(history[0].history_id, done.history.history_id);
  assert_eq!(svc.get_score(target).await.unwrap().score.score, history[0].new_score);
}
