//! Source registry types.
//!
//! A source is anything evidence can be cited from. Each source owns exactly
//! one [`SourceCredibility`] record, which is independent of any single claim
//! and feeds into the weight of every future piece of evidence from it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{Error, Result, scoring::check_unit, target::TargetRef};

/// What kind of material a source is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
  Document,
  Testimony,
  Interview,
  Dataset,
  Publication,
  Website,
  Other,
}

/// Rolling trust value for a source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceCredibility {
  /// In [0, 1]; 0.5 is neutral.
  pub score:               f64,
  /// Non-removed evidence submitted from this source.
  pub evidence_count:      u32,
  /// Fraction of that evidence later discredited by an upheld challenge.
  pub challenged_fraction: f64,
  /// Fraction of evidence agreeing with its target's current consensus.
  pub consensus_alignment: f64,
  /// Set when an administrator pinned the score.
  pub overridden_at:       Option<DateTime<Utc>>,
  pub override_reason:     Option<String>,
  pub updated_at:          DateTime<Utc>,
}

impl SourceCredibility {
  /// The record every new source starts with.
  pub fn neutral(now: DateTime<Utc>) -> Self {
    Self {
      score:               0.5,
      evidence_count:      0,
      challenged_fraction: 0.0,
      consensus_alignment: 0.5,
      overridden_at:       None,
      override_reason:     None,
      updated_at:          now,
    }
  }

  pub fn is_overridden(&self) -> bool { self.overridden_at.is_some() }
}

/// A catalogued source together with its credibility.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Source {
  pub source_id:   Uuid,
  pub kind:        SourceKind,
  pub title:       String,
  pub url:         Option<String>,
  pub description: Option<String>,
  pub created_at:  DateTime<Utc>,
  pub credibility: SourceCredibility,
}

/// Input to [`crate::store::VeracityStore::create_source`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewSource {
  pub kind:        SourceKind,
  pub title:       String,
  pub url:         Option<String>,
  pub description: Option<String>,
}

impl NewSource {
  pub fn new(kind: SourceKind, title: impl Into<String>) -> Self {
    Self { kind, title: title.into(), url: None, description: None }
  }

  pub fn validate(&self) -> Result<()> {
    if self.title.trim().is_empty() {
      return Err(Error::InvalidInput("source title is empty".into()));
    }
    Ok(())
  }
}

/// An administrative credibility override.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CredibilityOverride {
  pub score:  f64,
  pub reason: String,
}

impl CredibilityOverride {
  pub fn validate(&self) -> Result<()> {
    check_unit("credibility", self.score)?;
    if self.reason.trim().is_empty() {
      return Err(Error::InvalidInput(
        "a credibility override needs a reason".into(),
      ));
    }
    Ok(())
  }
}

/// The outcome of recomputing (or overriding) one source's credibility.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CredibilityChange {
  pub source_id:        Uuid,
  pub old_score:        f64,
  pub new_score:        f64,
  /// Every target with non-removed evidence from this source.
  pub affected_targets: Vec<TargetRef>,
}

impl CredibilityChange {
  pub fn delta(&self) -> f64 { self.new_score - self.old_score }

  /// Whether the move is large enough to justify rescoring the targets.
  pub fn exceeds(&self, threshold: f64) -> bool { self.delta().abs() > threshold }
}
