//! Challenge ledger types.
//!
//! An open challenge applies an ongoing penalty to its target's score. When a
//! challenge is upheld, the evidence it disputed is marked
//! [`ReviewStatus::Discredited`](crate::evidence::ReviewStatus::Discredited)
//! and the penalty lifts; the discount then flows through the ordinary
//! evidence weighting.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{Error, Result, target::TargetRef};

/// How a resolved challenge ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChallengeOutcome {
  /// The challenge succeeded; disputed evidence is discredited.
  Upheld,
  /// The challenge failed; no lasting effect.
  Rejected,
}

/// Lifecycle status of a challenge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ChallengeStatus {
  Open,
  Resolved {
    outcome: ChallengeOutcome,
    note:    Option<String>,
    at:      DateTime<Utc>,
  },
}

impl ChallengeStatus {
  pub fn is_open(&self) -> bool { matches!(self, Self::Open) }
}

/// A dispute raised against a claim or relationship.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Challenge {
  pub challenge_id:      Uuid,
  pub target:            TargetRef,
  pub reason:            String,
  /// Evidence records on the same target that the challenge calls faulty.
  pub disputed_evidence: Vec<Uuid>,
  pub status:            ChallengeStatus,
  pub opened_at:         DateTime<Utc>,
}

/// Input to [`crate::store::VeracityStore::open_challenge`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewChallenge {
  pub target:            TargetRef,
  pub reason:            String,
  #[serde(default)]
  pub disputed_evidence: Vec<Uuid>,
}

impl NewChallenge {
  pub fn new(target: TargetRef, reason: impl Into<String>) -> Self {
    Self { target, reason: reason.into(), disputed_evidence: Vec::new() }
  }

  pub fn validate(&self) -> Result<()> {
    if self.reason.trim().is_empty() {
      return Err(Error::InvalidInput("challenge reason is empty".into()));
    }
    Ok(())
  }
}

/// Input to [`crate::store::VeracityStore::resolve_challenge`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Resolution {
  pub outcome: ChallengeOutcome,
  pub note:    Option<String>,
}

impl Resolution {
  /// Check this resolution against the challenge it closes. Upholding a
  /// challenge requires disputed evidence to discredit.
  pub fn validate_for(&self, challenge: &Challenge) -> Result<()> {
    if self.outcome == ChallengeOutcome::Upheld && challenge.disputed_evidence.is_empty() {
      return Err(Error::InvalidInput(format!(
        "challenge {} disputes no evidence and cannot be upheld",
        challenge.challenge_id
      )));
    }
    Ok(())
  }
}

/// A challenge just resolved, with the sources whose evidence it
/// discredited. `discredited_sources` is empty unless the challenge was
/// upheld.
#[derive(Debug, Clone)]
pub struct ResolvedChallenge {
  pub challenge:           Challenge,
  pub discredited_sources: Vec<Uuid>,
}
