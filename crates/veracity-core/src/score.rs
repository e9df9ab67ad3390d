//! Veracity scores and their audit trail.
//!
//! [`VeracityScore`] is the single current row per target. Every recalculation
//! appends one [`ScoreHistoryEntry`]; history is never rewritten, so it records
//! what was decided at the time rather than a live view.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{scoring::ScoreBreakdown, target::TargetRef};

/// Score reported for a mutable target with no evidence and no challenges.
pub const NEUTRAL_SCORE: f64 = 0.5;

/// Score of every tier-0 target.
pub const FIXED_SCORE: f64 = 1.0;

// ─── Current score ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VeracityScore {
  pub target:            TargetRef,
  pub score:             f64,
  /// Evidence records that contributed a positive weight.
  pub evidence_count:    u32,
  pub consensus:         f64,
  pub challenge_impact:  f64,
  /// Sum of decay-adjusted effective weights, both directions.
  pub weighted_evidence: f64,
  pub support_weight:    f64,
  pub refute_weight:     f64,
  pub open_challenges:   u32,
  pub calculated_at:     DateTime<Utc>,
  /// After this instant the score must be recomputed even without new
  /// evidence, because decay has moved it.
  pub expires_at:        Option<DateTime<Utc>>,
}

impl VeracityScore {
  /// The constant score of a tier-0 target.
  pub fn fixed(target: TargetRef, now: DateTime<Utc>) -> Self {
    Self {
      target,
      score: FIXED_SCORE,
      evidence_count: 0,
      consensus: FIXED_SCORE,
      challenge_impact: 1.0,
      weighted_evidence: 0.0,
      support_weight: 0.0,
      refute_weight: 0.0,
      open_challenges: 0,
      calculated_at: now,
      expires_at: None,
    }
  }

  /// The "no evidence" score of a tier-1 target.
  pub fn neutral(target: TargetRef, now: DateTime<Utc>) -> Self {
    Self {
      score: NEUTRAL_SCORE,
      consensus: NEUTRAL_SCORE,
      ..Self::fixed(target, now)
    }
  }

  pub fn from_breakdown(
    target: TargetRef,
    breakdown: &ScoreBreakdown,
    calculated_at: DateTime<Utc>,
    expires_at: Option<DateTime<Utc>>,
  ) -> Self {
    Self {
      target,
      score: breakdown.score,
      evidence_count: breakdown.evidence_count,
      consensus: breakdown.consensus,
      challenge_impact: breakdown.challenge_impact,
      weighted_evidence: breakdown.support_weight + breakdown.refute_weight,
      support_weight: breakdown.support_weight,
      refute_weight: breakdown.refute_weight,
      open_challenges: breakdown.open_challenges,
      calculated_at,
      expires_at,
    }
  }
}

// ─── History ─────────────────────────────────────────────────────────────────

/// What caused a recalculation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum Trigger {
  /// Initial row written when the target was created.
  Created,
  Evidence(Uuid),
  Challenge(Uuid),
  SourceCredibility(Uuid),
  Manual,
  DecayRefresh,
}

impl Trigger {
  /// Default human-readable reason used when the caller gives none.
  pub fn describe(&self) -> String {
    match self {
      Self::Created => "target created".to_owned(),
      Self::Evidence(id) => format!("evidence {id} changed"),
      Self::Challenge(id) => format!("challenge {id} changed"),
      Self::SourceCredibility(id) => format!("credibility of source {id} changed"),
      Self::Manual => "manual recalculation".to_owned(),
      Self::DecayRefresh => "scheduled decay refresh".to_owned(),
    }
  }
}

/// One append-only audit row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoreHistoryEntry {
  pub history_id:      Uuid,
  pub target:          TargetRef,
  /// `None` for the row written at creation.
  pub old_score:       Option<f64>,
  pub new_score:       f64,
  pub delta:           f64,
  pub reason:          String,
  pub trigger:         Trigger,
  /// SHA-256 over the ledger rows this run read; equal digests mean the two
  /// runs observed the same ledger state.
  pub snapshot_digest: String,
  pub recorded_at:     DateTime<Utc>,
}

// ─── Requests and results ────────────────────────────────────────────────────

/// Why a recalculation is being run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Recalculation {
  pub trigger: Trigger,
  pub reason:  Option<String>,
}

impl Recalculation {
  pub fn new(trigger: Trigger) -> Self { Self { trigger, reason: None } }

  pub fn manual(reason: impl Into<String>) -> Self {
    Self { trigger: Trigger::Manual, reason: Some(reason.into()) }
  }

  pub fn reason(&self) -> String {
    self.reason.clone().unwrap_or_else(|| self.trigger.describe())
  }
}

/// The committed result of one recalculation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Recalculated {
  pub score:   VeracityScore,
  pub history: ScoreHistoryEntry,
}

/// Limit/offset pagination.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Page {
  pub limit:  Option<usize>,
  pub offset: Option<usize>,
}

impl Page {
  pub const DEFAULT_LIMIT: usize = 50;

  pub fn limit(&self) -> usize { self.limit.unwrap_or(Self::DEFAULT_LIMIT) }

  pub fn offset(&self) -> usize { self.offset.unwrap_or(0) }
}
