//! The recomputation dispatcher.
//!
//! Each target moves through a small state machine:
//!
//! ```text
//!           mark_dirty             run starts                 commit
//!   clean ────────────▶ dirty ─────────────────▶ recalculating ────────▶ clean
//!                       ▲  ▲                        │    │
//!                       │  └── commit, rerun set ───┘    │ permanent failure
//!                       └──────── (stalled) ◀────────────┘
//! ```
//!
//! A target without an entry in the state map is clean. Marking a target
//! dirty while it is recalculating never starts a second run; it records a
//! rerun, which the running pass picks up once it commits.
//!
//! Every run holds the target's token (a per-target async mutex) from the
//! ledger read to the history write. Runs for different targets share
//! nothing and proceed in parallel.

use std::{
  future::Future,
  sync::{
    Arc,
    atomic::{AtomicUsize, Ordering},
  },
};

use chrono::{DateTime, Utc};
use dashmap::{DashMap, mapref::entry::Entry};
use serde::Serialize;
use tokio::sync::{Mutex, Notify, OwnedMutexGuard};
use tracing::{Instrument as _, debug, error, info, warn};
use uuid::Uuid;
use veracity_core::{
  ScoringConfig, StoreError,
  score::{Recalculated, Recalculation, Trigger},
  store::VeracityStore,
  target::TargetRef,
};

use crate::{DispatchConfig, retry::Backoff};

/// Where a target currently sits in the recalculation state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RecalcStatus {
  Clean,
  Dirty,
  Recalculating,
}

#[derive(Debug)]
enum TargetState {
  /// Waiting for a run. `scheduled` is false once a permanent failure has
  /// stalled the target; [`Dispatcher::retry_stalled`] picks it up again.
  Dirty { pending: Recalculation, scheduled: bool },
  /// A run holds the token. `rerun` records a trigger that arrived meanwhile.
  Recalculating { rerun: Option<Recalculation> },
}

struct Inner<S> {
  store:     Arc<S>,
  scoring:   ScoringConfig,
  config:    DispatchConfig,
  states:    DashMap<TargetRef, TargetState>,
  tokens:    DashMap<TargetRef, Arc<Mutex<()>>>,
  in_flight: AtomicUsize,
  idle:      Notify,
}

/// Schedules score recalculations in response to ledger writes.
///
/// Cloning is cheap; clones share all state.
pub struct Dispatcher<S> {
  inner: Arc<Inner<S>>,
}

impl<S> Clone for Dispatcher<S> {
  fn clone(&self) -> Self { Self { inner: Arc::clone(&self.inner) } }
}

impl<S: VeracityStore + 'static> Dispatcher<S> {
  pub fn new(store: Arc<S>, scoring: ScoringConfig, config: DispatchConfig) -> Self {
    Self {
      inner: Arc::new(Inner {
        store,
        scoring,
        config,
        states: DashMap::new(),
        tokens: DashMap::new(),
        in_flight: AtomicUsize::new(0),
        idle: Notify::new(),
      }),
    }
  }

  pub fn store(&self) -> &Arc<S> { &self.inner.store }

  pub fn scoring(&self) -> &ScoringConfig { &self.inner.scoring }

  pub fn status(&self, target: TargetRef) -> RecalcStatus {
    match self.inner.states.get(&target).as_deref() {
      None => RecalcStatus::Clean,
      Some(TargetState::Dirty { .. }) => RecalcStatus::Dirty,
      Some(TargetState::Recalculating { .. }) => RecalcStatus::Recalculating,
    }
  }

  /// Record that `target`'s ledger changed and schedule a run if none is
  /// pending. Returns immediately.
  pub fn mark_dirty(&self, target: TargetRef, request: Recalculation) {
    self.inner.mark_dirty(target, request);
  }

  /// Mark every target dirty with the same trigger.
  pub fn rescore(&self, targets: impl IntoIterator<Item = TargetRef>, trigger: Trigger) {
    for target in targets {
      self.inner.mark_dirty(target, Recalculation::new(trigger));
    }
  }

  /// Recalculate `target` now and wait until the score and history row are
  /// committed. Waits for any run already holding the target's token.
  #[tracing::instrument(skip_all, fields(%target))]
  pub async fn recalculate_now(
    &self,
    target: TargetRef,
    request: Recalculation,
  ) -> Result<Recalculated, S::Error> {
    let inner = &self.inner;
    let token = inner.token(target);
    let guard = inner.acquire(target, &token).await;

    // This pass reads the latest ledger, so it satisfies any pending trigger.
    inner.states.insert(target, TargetState::Recalculating { rerun: None });
    let result = inner.recalculate_with_retry(target, &request).await;
    let rerun = match &result {
      Ok(done) => {
        log_commit(target, done);
        inner.finish(target)
      }
      Err(err) => {
        inner.abandon(target, request, err);
        false
      }
    };

    drop(guard);
    inner.release_token(target, token);
    if rerun {
      inner.spawn_run(target);
    }
    result
  }

  /// Refresh a source's credibility in the background. When the score moves
  /// by more than the configured threshold, every target with evidence from
  /// the source is rescored.
  pub fn refresh_source(&self, source_id: Uuid) {
    let inner = Arc::clone(&self.inner);
    let task = async move {
      let now = Utc::now();
      match inner.store.refresh_credibility(source_id, &inner.scoring, now).await {
        Ok(change) if change.exceeds(inner.scoring.credibility_rescore_threshold) => {
          info!(
            %source_id,
            old = change.old_score,
            new = change.new_score,
            targets = change.affected_targets.len(),
            "source credibility changed; rescoring its targets"
          );
          for target in change.affected_targets {
            inner.mark_dirty(target, Recalculation::new(Trigger::SourceCredibility(source_id)));
          }
        }
        Ok(change) => {
          debug!(%source_id, delta = change.delta(), "credibility change below threshold");
        }
        Err(err) => warn!(%source_id, error = %err, "credibility refresh failed"),
      }
    };
    self.inner.spawn_tracked(task.instrument(tracing::info_span!("refresh_source")));
  }

  /// Mark every target whose score expired at or before `now` dirty with a
  /// decay-refresh trigger. Returns how many were enqueued.
  pub async fn refresh_expired(&self, now: DateTime<Utc>) -> Result<usize, S::Error> {
    let expired = self.inner.store.expired_targets(now).await?;
    for target in &expired {
      self.inner.mark_dirty(*target, Recalculation::new(Trigger::DecayRefresh));
    }
    if !expired.is_empty() {
      info!(count = expired.len(), "expired scores queued for decay refresh");
    }
    Ok(expired.len())
  }

  /// Reschedule every target a permanent failure left dirty.
  pub fn retry_stalled(&self) -> usize {
    let mut stalled = Vec::new();
    for mut entry in self.inner.states.iter_mut() {
      let target = *entry.key();
      if let TargetState::Dirty { scheduled, .. } = entry.value_mut() {
        if !*scheduled {
          *scheduled = true;
          stalled.push(target);
        }
      }
    }
    for target in &stalled {
      self.inner.spawn_run(*target);
    }
    stalled.len()
  }

  /// Resolve once no background run or credibility refresh is in flight.
  pub async fn wait_idle(&self) {
    loop {
      let notified = self.inner.idle.notified();
      let mut notified = std::pin::pin!(notified);
      notified.as_mut().enable();
      if self.inner.in_flight.load(Ordering::SeqCst) == 0 {
        return;
      }
      notified.await;
    }
  }
}

fn log_commit(target: TargetRef, done: &Recalculated) {
  info!(
    %target,
    old = ?done.history.old_score,
    new = done.score.score,
    delta = done.history.delta,
    reason = %done.history.reason,
    "score recalculated"
  );
}

// ─── State transitions ───────────────────────────────────────────────────────

impl<S: VeracityStore + 'static> Inner<S> {
  fn mark_dirty(self: &Arc<Self>, target: TargetRef, request: Recalculation) {
    let spawn = match self.states.entry(target) {
      Entry::Vacant(slot) => {
        slot.insert(TargetState::Dirty { pending: request, scheduled: true });
        debug!(%target, "clean -> dirty");
        true
      }
      // Triggers coalesce: the first pending one is what the run records.
      Entry::Occupied(mut slot) => match slot.get_mut() {
        TargetState::Dirty { scheduled, .. } => !std::mem::replace(scheduled, true),
        TargetState::Recalculating { rerun } => {
          rerun.get_or_insert(request);
          debug!(%target, "dirty while recalculating; rerun queued");
          false
        }
      },
    };
    if spawn {
      self.spawn_run(target);
    }
  }

  /// Dirty → recalculating. `None` when there is nothing left to do.
  fn begin(&self, target: TargetRef) -> Option<Recalculation> {
    let mut slot = self.states.get_mut(&target)?;
    match std::mem::replace(&mut *slot, TargetState::Recalculating { rerun: None }) {
      TargetState::Dirty { pending, .. } => {
        debug!(%target, "dirty -> recalculating");
        Some(pending)
      }
      running @ TargetState::Recalculating { .. } => {
        *slot = running;
        None
      }
    }
  }

  /// Recalculating → clean, or back to dirty when a rerun was queued.
  /// Returns whether another pass is needed.
  fn finish(&self, target: TargetRef) -> bool {
    let Entry::Occupied(mut slot) = self.states.entry(target) else {
      return false;
    };
    let rerun = match slot.get_mut() {
      TargetState::Recalculating { rerun } => rerun.take(),
      TargetState::Dirty { .. } => return true,
    };
    match rerun {
      Some(pending) => {
        slot.insert(TargetState::Dirty { pending, scheduled: true });
        debug!(%target, "recalculating -> dirty (rerun)");
        true
      }
      None => {
        slot.remove();
        debug!(%target, "recalculating -> clean");
        false
      }
    }
  }

  /// A run failed. Rejected requests are dropped; anything else leaves the
  /// target stalled in `dirty` so it is never falsely reported clean.
  fn abandon(&self, target: TargetRef, request: Recalculation, err: &S::Error) {
    if err.is_rejection() {
      warn!(%target, error = %err, "recalculation rejected; clearing target state");
      self.states.remove(&target);
      return;
    }

    error!(%target, error = %err, "recalculation failed; target stays dirty");
    let mut slot = self
      .states
      .entry(target)
      .or_insert(TargetState::Recalculating { rerun: None });
    let pending = match &mut *slot {
      TargetState::Recalculating { rerun } => rerun.take().unwrap_or(request),
      TargetState::Dirty { .. } => return,
    };
    *slot = TargetState::Dirty { pending, scheduled: false };
  }

  // ── Tokens ────────────────────────────────────────────────────────────────

  fn token(&self, target: TargetRef) -> Arc<Mutex<()>> {
    Arc::clone(self.tokens.entry(target).or_default().value())
  }

  /// Drop our handle and forget the token once nobody else holds it.
  fn release_token(&self, target: TargetRef, token: Arc<Mutex<()>>) {
    drop(token);
    self.tokens.remove_if(&target, |_, t| Arc::strong_count(t) == 1);
  }

  async fn acquire(&self, target: TargetRef, token: &Arc<Mutex<()>>) -> OwnedMutexGuard<()> {
    match Arc::clone(token).try_lock_owned() {
      Ok(guard) => guard,
      Err(_) => {
        let conflict = veracity_core::Error::RecalculationConflict(target);
        debug!(%target, "{conflict}; waiting for the running pass");
        Arc::clone(token).lock_owned().await
      }
    }
  }

  // ── Runs ──────────────────────────────────────────────────────────────────

  fn spawn_run(self: &Arc<Self>, target: TargetRef) {
    let inner = Arc::clone(self);
    let span = tracing::info_span!("recalculate", %target);
    self.spawn_tracked(inner.run(target).instrument(span));
  }

  fn spawn_tracked<F>(self: &Arc<Self>, task: F)
  where
    F: Future<Output = ()> + Send + 'static,
  {
    self.in_flight.fetch_add(1, Ordering::SeqCst);
    let inner = Arc::clone(self);
    tokio::spawn(async move {
      task.await;
      if inner.in_flight.fetch_sub(1, Ordering::SeqCst) == 1 {
        inner.idle.notify_waiters();
      }
    });
  }

  async fn run(self: Arc<Self>, target: TargetRef) {
    loop {
      let token = self.token(target);
      let guard = self.acquire(target, &token).await;

      let again = match self.begin(target) {
        None => false,
        Some(request) => match self.recalculate_with_retry(target, &request).await {
          Ok(done) => {
            log_commit(target, &done);
            self.finish(target)
          }
          Err(err) => {
            self.abandon(target, request, &err);
            false
          }
        },
      };

      drop(guard);
      self.release_token(target, token);
      if !again {
        return;
      }
    }
  }

  async fn recalculate_with_retry(
    &self,
    target: TargetRef,
    request: &Recalculation,
  ) -> Result<Recalculated, S::Error> {
    let mut backoff = Backoff::new(&self.config);
    let mut attempt = 0;
    loop {
      let now = Utc::now();
      match self.store.recalculate(target, request.clone(), &self.scoring, now).await {
        Ok(done) => return Ok(done),
        Err(err) if err.is_transient() && attempt < self.config.max_retries => {
          attempt += 1;
          let delay = backoff.next_delay();
          warn!(
            %target,
            attempt,
            max = self.config.max_retries,
            ?delay,
            error = %err,
            "transient storage error; retrying"
          );
          tokio::time::sleep(delay).await;
        }
        Err(err) => return Err(err),
      }
    }
  }
}
