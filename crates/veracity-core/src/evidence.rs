//! Evidence ledger types.
//!
//! Evidence links one source to one target. Records are never hard-deleted:
//! removal stamps `removed_at` so the audit trail can still explain scores
//! computed while the record was live.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
  Error, Result,
  scoring::{check_decay_rate, check_unit},
  target::TargetRef,
};

/// Whether the evidence argues for or against its target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
  Supporting,
  Refuting,
}

/// Peer-review state of a piece of evidence.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum ReviewStatus {
  #[default]
  Unreviewed,
  Verified,
  /// Found faulty by an upheld challenge; weight is discounted.
  Discredited,
}

/// A stored evidence record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Evidence {
  pub evidence_id:    Uuid,
  pub target:         TargetRef,
  pub source_id:      Uuid,
  pub direction:      Direction,
  pub base_weight:    f64,
  pub confidence:     f64,
  pub content:        String,
  /// Start point for temporal decay. `None` means the evidence never decays.
  pub relevance_date: Option<DateTime<Utc>>,
  /// Per-evidence decay constant (per day); overrides domain and default.
  pub decay_rate:     Option<f64>,
  pub review_status:  ReviewStatus,
  pub submitted_at:   DateTime<Utc>,
  pub updated_at:     DateTime<Utc>,
  pub removed_at:     Option<DateTime<Utc>>,
  pub removal_reason: Option<String>,
}

impl Evidence {
  pub fn is_removed(&self) -> bool { self.removed_at.is_some() }
}

/// Input to [`crate::store::VeracityStore::submit_evidence`].
#[derive(Debug, Clone)]
pub struct NewEvidence {
  pub target:         TargetRef,
  pub source_id:      Uuid,
  pub direction:      Direction,
  pub base_weight:    f64,
  pub confidence:     f64,
  pub content:        String,
  pub relevance_date: Option<DateTime<Utc>>,
  pub decay_rate:     Option<f64>,
}

impl NewEvidence {
  /// Full-weight, full-confidence evidence with no decay information.
  pub fn new(
    target: TargetRef,
    source_id: Uuid,
    direction: Direction,
    content: impl Into<String>,
  ) -> Self {
    Self {
      target,
      source_id,
      direction,
      base_weight: 1.0,
      confidence: 1.0,
      content: content.into(),
      relevance_date: None,
      decay_rate: None,
    }
  }

  /// Reject out-of-range numbers instead of clamping them.
  pub fn validate(&self) -> Result<()> {
    check_unit("base_weight", self.base_weight)?;
    check_unit("confidence", self.confidence)?;
    if let Some(rate) = self.decay_rate {
      check_decay_rate(rate)?;
    }
    Ok(())
  }
}

/// A partial update applied by
/// [`crate::store::VeracityStore::edit_evidence`]. `None` leaves a field as is.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EvidenceEdit {
  pub base_weight:          Option<f64>,
  pub confidence:           Option<f64>,
  pub content:              Option<String>,
  pub relevance_date:       Option<DateTime<Utc>>,
  /// Drop the relevance date so the evidence stops decaying.
  #[serde(default)]
  pub clear_relevance_date: bool,
  pub decay_rate:           Option<f64>,
}

impl EvidenceEdit {
  pub fn validate(&self) -> Result<()> {
    if let Some(w) = self.base_weight {
      check_unit("base_weight", w)?;
    }
    if let Some(c) = self.confidence {
      check_unit("confidence", c)?;
    }
    if let Some(rate) = self.decay_rate {
      check_decay_rate(rate)?;
    }
    if self.clear_relevance_date && self.relevance_date.is_some() {
      return Err(Error::InvalidInput(
        "relevance_date and clear_relevance_date are mutually exclusive".into(),
      ));
    }
    Ok(())
  }

  pub fn is_empty(&self) -> bool {
    self.base_weight.is_none()
      && self.confidence.is_none()
      && self.content.is_none()
      && self.relevance_date.is_none()
      && !self.clear_relevance_date
      && self.decay_rate.is_none()
  }

  /// Apply the edit to `evidence`, stamping `updated_at`.
  pub fn apply(self, evidence: &mut Evidence, now: DateTime<Utc>) {
    if let Some(w) = self.base_weight {
      evidence.base_weight = w;
    }
    if let Some(c) = self.confidence {
      evidence.confidence = c;
    }
    if let Some(content) = self.content {
      evidence.content = content;
    }
    if self.clear_relevance_date {
      evidence.relevance_date = None;
    } else if let Some(d) = self.relevance_date {
      evidence.relevance_date = Some(d);
    }
    if let Some(rate) = self.decay_rate {
      evidence.decay_rate = Some(rate);
    }
    evidence.updated_at = now;
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn sample() -> NewEvidence {
    NewEvidence::new(
      TargetRef::Claim(Uuid::new_v4()),
      Uuid::new_v4(),
      Direction::Supporting,
      "lab report",
    )
  }

  #[test]
  fn out_of_range_weight_is_rejected_not_clamped() {
    let mut input = sample();
    input.base_weight = 1.2;
    assert!(matches!(input.validate(), Err(Error::InvalidInput(_))));

    let mut input = sample();
    input.confidence = -0.1;
    assert!(matches!(input.validate(), Err(Error::InvalidInput(_))));

    let mut input = sample();
    input.confidence = f64::NAN;
    assert!(matches!(input.validate(), Err(Error::InvalidInput(_))));
  }

  #[test]
  fn negative_decay_rate_is_rejected() {
    let mut input = sample();
    input.decay_rate = Some(-0.5);
    assert!(input.validate().is_err());
  }

  #[test]
  fn edit_applies_only_present_fields() {
    let now = Utc::now();
    let mut evidence = Evidence {
      evidence_id:    Uuid::new_v4(),
      target:         TargetRef::Claim(Uuid::new_v4()),
      source_id:      Uuid::new_v4(),
      direction:      Direction::Refuting,
      base_weight:    0.4,
      confidence:     0.9,
      content:        "before".into(),
      relevance_date: Some(now),
      decay_rate:     None,
      review_status:  ReviewStatus::Unreviewed,
      submitted_at:   now,
      updated_at:     now,
      removed_at:     None,
      removal_reason: None,
    };

    let edit = EvidenceEdit {
      confidence: Some(0.5),
      clear_relevance_date: true,
      ..Default::default()
    };
    edit.validate().unwrap();
    let later = now + chrono::Duration::seconds(5);
    edit.apply(&mut evidence, later);

    assert_eq!(evidence.base_weight, 0.4);
    assert_eq!(evidence.confidence, 0.5);
    assert_eq!(evidence.content, "before");
    assert!(evidence.relevance_date.is_none());
    assert_eq!(evidence.updated_at, later);
  }
}
