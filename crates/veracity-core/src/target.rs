//! Scored targets: the claims (graph nodes) and relationships (graph edges)
//! that carry a veracity score.
//!
//! A target's tier is fixed at creation. Tier-0 targets are accepted truths:
//! their score is 1.0 for their entire lifetime and they accept neither
//! evidence nor challenges.

use std::{fmt, str::FromStr};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{Error, Result};

// ─── References ──────────────────────────────────────────────────────────────

/// Which table a target lives in.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum TargetKind {
  Claim,
  Relationship,
}

impl TargetKind {
  pub fn as_str(self) -> &'static str {
    match self {
      Self::Claim => "claim",
      Self::Relationship => "relationship",
    }
  }
}

impl FromStr for TargetKind {
  type Err = Error;

  fn from_str(s: &str) -> Result<Self> {
    match s {
      "claim" => Ok(Self::Claim),
      "relationship" => Ok(Self::Relationship),
      other => Err(Error::InvalidInput(format!("unknown target kind: {other:?}"))),
    }
  }
}

/// A reference to exactly one claim or one relationship.
///
/// Evidence, challenges, and scores all point at a `TargetRef`, so "both" or
/// "neither" cannot be represented once a reference has been built.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(tag = "kind", content = "id", rename_all = "lowercase")]
pub enum TargetRef {
  Claim(Uuid),
  Relationship(Uuid),
}

impl TargetRef {
  pub fn new(kind: TargetKind, id: Uuid) -> Self {
    match kind {
      TargetKind::Claim => Self::Claim(id),
      TargetKind::Relationship => Self::Relationship(id),
    }
  }

  /// Build a reference from the two optional foreign keys used on the wire.
  /// Exactly one must be present.
  pub fn from_parts(
    claim_id: Option<Uuid>,
    relationship_id: Option<Uuid>,
  ) -> Result<Self> {
    match (claim_id, relationship_id) {
      (Some(id), None) => Ok(Self::Claim(id)),
      (None, Some(id)) => Ok(Self::Relationship(id)),
      (None, None) => Err(Error::InvalidInput(
        "a claim_id or relationship_id is required".into(),
      )),
      (Some(_), Some(_)) => Err(Error::InvalidInput(
        "claim_id and relationship_id are mutually exclusive".into(),
      )),
    }
  }

  pub fn id(&self) -> Uuid {
    match self {
      Self::Claim(id) | Self::Relationship(id) => *id,
    }
  }

  pub fn kind(&self) -> TargetKind {
    match self {
      Self::Claim(_) => TargetKind::Claim,
      Self::Relationship(_) => TargetKind::Relationship,
    }
  }

  /// The `(claim_id, relationship_id)` column pair for this reference.
  pub fn into_parts(self) -> (Option<Uuid>, Option<Uuid>) {
    match self {
      Self::Claim(id) => (Some(id), None),
      Self::Relationship(id) => (None, Some(id)),
    }
  }
}

impl fmt::Display for TargetRef {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}/{}", self.kind().as_str(), self.id())
  }
}

// ─── Tier ────────────────────────────────────────────────────────────────────

/// Immutability tier. Stored as `0` / `1`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
  /// Tier 0: fixed truth. Score frozen at 1.0.
  Fixed,
  /// Tier 1: score computed from the ledgers.
  #[default]
  Mutable,
}

impl Tier {
  pub fn level(self) -> u8 {
    match self {
      Self::Fixed => 0,
      Self::Mutable => 1,
    }
  }

  pub fn from_level(level: u8) -> Result<Self> {
    match level {
      0 => Ok(Self::Fixed),
      1 => Ok(Self::Mutable),
      other => Err(Error::InvalidInput(format!("unknown tier: {other}"))),
    }
  }

  pub fn is_fixed(self) -> bool { matches!(self, Self::Fixed) }
}

// ─── Entities ────────────────────────────────────────────────────────────────

/// A graph node: a single assertion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claim {
  pub claim_id:   Uuid,
  pub statement:  String,
  pub tier:       Tier,
  /// Subject area; selects a per-domain decay rate when configured.
  pub domain:     Option<String>,
  pub created_at: DateTime<Utc>,
}

/// A graph edge between two claims.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Relationship {
  pub relationship_id: Uuid,
  pub from_claim:      Uuid,
  pub to_claim:        Uuid,
  /// Human-readable label, e.g. "causes", "contradicts".
  pub relation:        String,
  pub tier:            Tier,
  pub domain:          Option<String>,
  pub created_at:      DateTime<Utc>,
}

/// The part of a claim or relationship the scoring engine cares about.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Target {
  pub target:     TargetRef,
  pub tier:       Tier,
  pub domain:     Option<String>,
  pub created_at: DateTime<Utc>,
}

impl Claim {
  pub fn as_target(&self) -> Target {
    Target {
      target:     TargetRef::Claim(self.claim_id),
      tier:       self.tier,
      domain:     self.domain.clone(),
      created_at: self.created_at,
    }
  }
}

impl Relationship {
  pub fn as_target(&self) -> Target {
    Target {
      target:     TargetRef::Relationship(self.relationship_id),
      tier:       self.tier,
      domain:     self.domain.clone(),
      created_at: self.created_at,
    }
  }
}

// ─── Inputs ──────────────────────────────────────────────────────────────────

/// Input to [`crate::store::VeracityStore::create_claim`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewClaim {
  pub statement: String,
  #[serde(default)]
  pub tier:      Tier,
  pub domain:    Option<String>,
}

impl NewClaim {
  /// A mutable (tier-1) claim with no domain.
  pub fn new(statement: impl Into<String>) -> Self {
    Self { statement: statement.into(), tier: Tier::Mutable, domain: None }
  }

  pub fn validate(&self) -> Result<()> {
    if self.statement.trim().is_empty() {
      return Err(Error::InvalidInput("claim statement is empty".into()));
    }
    Ok(())
  }
}

/// Input to [`crate::store::VeracityStore::create_relationship`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewRelationship {
  pub from_claim: Uuid,
  pub to_claim:   Uuid,
  pub relation:   String,
  #[serde(default)]
  pub tier:       Tier,
  pub domain:     Option<String>,
}

impl NewRelationship {
  pub fn new(from_claim: Uuid, to_claim: Uuid, relation: impl Into<String>) -> Self {
    Self {
      from_claim,
      to_claim,
      relation: relation.into(),
      tier: Tier::Mutable,
      domain: None,
    }
  }

  pub fn validate(&self) -> Result<()> {
    if self.from_claim == self.to_claim {
      return Err(Error::SelfRelationship(self.from_claim));
    }
    if self.relation.trim().is_empty() {
      return Err(Error::InvalidInput("relationship label is empty".into()));
    }
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn from_parts_requires_exactly_one_reference() {
    let id = Uuid::new_v4();
    assert_eq!(TargetRef::from_parts(Some(id), None).unwrap(), TargetRef::Claim(id));
    assert_eq!(
      TargetRef::from_parts(None, Some(id)).unwrap(),
      TargetRef::Relationship(id)
    );
    assert!(matches!(
      TargetRef::from_parts(None, None),
      Err(Error::InvalidInput(_))
    ));
    assert!(matches!(
      TargetRef::from_parts(Some(id), Some(Uuid::new_v4())),
      Err(Error::InvalidInput(_))
    ));
  }

  #[test]
  fn target_ref_serialises_with_kind_tag() {
    let id = Uuid::nil();
    let json = serde_json::to_value(TargetRef::Relationship(id)).unwrap();
    assert_eq!(json["kind"], "relationship");
    assert_eq!(json["id"], id.to_string());
  }

  #[test]
  fn tier_levels() {
    assert_eq!(Tier::Fixed.level(), 0);
    assert_eq!(Tier::from_level(1).unwrap(), Tier::Mutable);
    assert!(Tier::from_level(2).is_err());
  }

  #[test]
  fn self_relationship_is_rejected() {
    let id = Uuid::new_v4();
    let err = NewRelationship::new(id, id, "supports").validate().unwrap_err();
    assert!(matches!(err, Error::SelfRelationship(_)));
  }
}
